//! Selection loop: probe candidate credentials in fixed-size waves
//! until one passes the acceptance policy
//!
//! Waves run sequentially; within a wave every probe runs in parallel
//! and verdicts are observed in completion order. The first accepted
//! verdict wins the whole batch, so two runs with identical inputs may
//! legitimately pick different credentials when network timing
//! differs.

use crate::geocode::TargetLocation;
use crate::proxy::models::{ProbeVerdict, ProxyCredential, SelectionOutcome, VerdictSnapshot};
use crate::proxy::probe::Prober;
use futures::stream::{FuturesUnordered, StreamExt};
use std::sync::Arc;
use tracing::{debug, info};

/// Number of probes dispatched concurrently per wave
pub const DEFAULT_WAVE_SIZE: usize = 5;

/// Default candidate batch size
pub const DEFAULT_MAX_ATTEMPTS: usize = 10;

/// Configuration for the selection loop
#[derive(Debug, Clone)]
pub struct SelectorConfig {
    pub wave_size: usize,
}

impl Default for SelectorConfig {
    fn default() -> Self {
        Self {
            wave_size: DEFAULT_WAVE_SIZE,
        }
    }
}

/// Runs the candidate batch against a [`Prober`] and returns the first
/// acceptable credential
pub struct ProxySelector<P> {
    prober: Arc<P>,
    config: SelectorConfig,
}

impl<P: Prober + 'static> ProxySelector<P> {
    pub fn new(prober: P) -> Self {
        Self::with_config(prober, SelectorConfig::default())
    }

    pub fn with_config(prober: P, config: SelectorConfig) -> Self {
        Self {
            prober: Arc::new(prober),
            config,
        }
    }

    /// Probe the batch wave by wave, returning on the first accepted
    /// verdict. Probes still in flight when an accept is observed are
    /// abandoned: their tasks run to completion in the background and
    /// their results are discarded. Rejections and errors overwrite a
    /// single last-observed diagnostic slot consumed only here, so the
    /// failure report reflects whichever probe reported most recently.
    pub async fn select(
        &self,
        target: &TargetLocation,
        credentials: Vec<ProxyCredential>,
    ) -> SelectionOutcome {
        let mut completed = 0usize;
        let mut last_fail_reasons: Vec<String> = Vec::new();
        let mut last_snapshot: Option<VerdictSnapshot> = None;

        for (wave_index, wave) in credentials.chunks(self.config.wave_size).enumerate() {
            debug!(wave = wave_index, size = wave.len(), "dispatching wave");

            let mut inflight: FuturesUnordered<_> = wave
                .iter()
                .cloned()
                .map(|credential| {
                    let prober = Arc::clone(&self.prober);
                    let target = target.clone();
                    tokio::spawn(async move {
                        let verdict = prober.probe(&credential, &target).await;
                        (credential, verdict)
                    })
                })
                .collect();

            while let Some(joined) = inflight.next().await {
                completed += 1;

                let (credential, verdict) = match joined {
                    Ok(pair) => pair,
                    Err(e) => {
                        last_fail_reasons = vec![format!("Error: {e}")];
                        continue;
                    }
                };

                match verdict {
                    ProbeVerdict::Accepted { report } => {
                        info!(
                            session = %credential.session_id,
                            ip = %report.ip,
                            distance = report.distance_miles,
                            attempts = completed,
                            "accepted proxy"
                        );
                        return SelectionOutcome::Accepted {
                            credential,
                            report,
                            attempts_used: completed,
                        };
                    }
                    ProbeVerdict::Rejected {
                        ref fail_reasons, ..
                    } => {
                        debug!(session = %credential.session_id, reasons = ?fail_reasons, "rejected");
                        last_fail_reasons = fail_reasons.clone();
                        last_snapshot = Some(VerdictSnapshot::from(&verdict));
                    }
                    ProbeVerdict::Error { ref message } => {
                        debug!(session = %credential.session_id, %message, "probe error");
                        last_fail_reasons = vec![message.clone()];
                        last_snapshot = Some(VerdictSnapshot::from(&verdict));
                    }
                }
            }
        }

        info!(attempts = completed, "batch exhausted without an accept");
        SelectionOutcome::Exhausted {
            attempts: completed,
            last_fail_reasons,
            last: last_snapshot,
        }
    }
}
