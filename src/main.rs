use anyhow::{bail, Result};
use clap::{Parser, Subcommand};
use geoproxy::{
    config::AppConfig,
    geocode::Geocoder,
    proxy::{
        AcceptancePolicy, CredentialBuilder, ProxyProbe, ProxySelector, SelectionOutcome,
        Targeting, DEFAULT_MAX_ATTEMPTS, DEFAULT_MAX_DISTANCE_MILES,
    },
    server,
};
use std::net::SocketAddr;
use std::sync::Arc;
use tracing_subscriber::EnvFilter;

/// Geo-targeted residential proxy finder
#[derive(Parser)]
#[command(name = "geoproxy")]
#[command(about = "Find a residential proxy that exits near a street address")]
struct Cli {
    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the web front end
    Serve {
        /// Address to bind the server to
        #[arg(short, long, default_value = server::DEFAULT_BIND)]
        bind: SocketAddr,
    },
    /// One-shot search from the terminal
    Find {
        /// Target street address
        address: String,
        /// Mapbox API key for geocoding
        #[arg(short, long)]
        mapbox_key: String,
        /// Maximum distance from the target in miles
        #[arg(short = 'd', long, default_value_t = DEFAULT_MAX_DISTANCE_MILES)]
        max_distance: f64,
        /// Maximum number of candidate credentials to probe
        #[arg(short = 'n', long, default_value_t = DEFAULT_MAX_ATTEMPTS)]
        max_attempts: usize,
    },
    /// Check provider connectivity with one untargeted credential
    TestProxy,
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("geoproxy=info")),
        )
        .init();

    let cli = Cli::parse();
    let config = Arc::new(AppConfig::from_env());

    match cli.command {
        Some(Commands::Serve { bind }) => {
            server::serve(bind, config).await?;
        }
        None => {
            // Default to serving the front end
            server::serve(server::DEFAULT_BIND.parse()?, config).await?;
        }
        Some(Commands::Find {
            address,
            mapbox_key,
            max_distance,
            max_attempts,
        }) => {
            find(&config, &address, &mapbox_key, max_distance, max_attempts).await?;
        }
        Some(Commands::TestProxy) => {
            test_proxy(&config).await?;
        }
    }

    Ok(())
}

async fn find(
    config: &AppConfig,
    address: &str,
    mapbox_key: &str,
    max_distance: f64,
    max_attempts: usize,
) -> Result<()> {
    config.ensure_ready()?;

    let geocoder = Geocoder::new()?;
    let Some(location) = geocoder.geocode(address, mapbox_key).await? else {
        bail!("Could not geocode address. Please check the address format.");
    };
    println!(
        "Target: {} ({:.4}, {:.4})",
        location.place_name, location.lat, location.lon
    );

    let builder = CredentialBuilder::new(&config.soax_package_id, &config.soax_password);
    let credentials = builder.batch(max_attempts, &Targeting::for_location(&location));

    let prober = ProxyProbe::new(&config.ipapi_key, AcceptancePolicy::new(max_distance))?;
    let selector = ProxySelector::new(prober);

    match selector.select(&location, credentials).await {
        SelectionOutcome::Accepted {
            credential,
            report,
            attempts_used,
        } => {
            println!("Found a proxy in {} attempt(s):", attempts_used);
            println!("  {}", credential.full_string);
            println!("  Server:   {}:{}", credential.server, credential.port);
            println!("  Exit IP:  {}", report.ip);
            println!("  Location: {}, {}", report.city, report.region);
            println!("  ISP:      {}", report.isp);
            println!("  Distance: {:.1} miles", report.distance_miles);
        }
        SelectionOutcome::Exhausted {
            attempts,
            last_fail_reasons,
            last,
        } => {
            println!(
                "Could not find a proxy within {} miles after {} attempts.",
                max_distance, attempts
            );
            if !last_fail_reasons.is_empty() {
                println!("  Last failure: {}", last_fail_reasons.join("; "));
            }
            if let Some(snapshot) = last {
                if let (Some(city), Some(distance)) = (snapshot.city, snapshot.distance) {
                    println!("  Last exit seen: {} ({:.1} miles away)", city, distance);
                }
            }
            bail!("no acceptable proxy found");
        }
    }

    Ok(())
}

async fn test_proxy(config: &AppConfig) -> Result<()> {
    if !config.has_soax() {
        bail!("SOAX not configured");
    }

    let builder = CredentialBuilder::new(&config.soax_package_id, &config.soax_password);
    let credential = builder.build(&Targeting::default());
    println!("Trying {}", credential.full_string);

    match server::handlers::fetch_ip_through(&credential).await {
        Ok(ip) => println!("Connected, exit IP {}", ip),
        Err(error) => bail!("connectivity check failed: {}", error),
    }

    Ok(())
}
