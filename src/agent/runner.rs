use std::sync::Arc;
use std::time::Duration;

use tokio::time::Instant;
use tracing::{debug, info, warn};

use crate::error::CampaignError;
use crate::platform::{AgentPlatform, Run, RunStatus};

/// How long and how often to wait for a run
#[derive(Debug, Clone)]
pub struct PollPolicy {
    pub interval: Duration,
    /// Give up after this much wall time
    pub max_wait: Option<Duration>,
    /// Give up after this many status polls
    pub max_polls: Option<usize>,
}

impl Default for PollPolicy {
    fn default() -> Self {
        Self {
            interval: Duration::from_secs(1),
            max_wait: Some(Duration::from_secs(600)),
            max_polls: None,
        }
    }
}

/// Last observed state of a run
#[derive(Debug, Clone)]
pub struct RunOutcome {
    pub run: Run,
    /// Waiting was abandoned before a terminal status
    pub timed_out: bool,
    pub polls: usize,
}

/// Polls a run until the platform reports a terminal status
pub struct RunDriver {
    platform: Arc<dyn AgentPlatform>,
    policy: PollPolicy,
}

impl RunDriver {
    pub fn new(platform: Arc<dyn AgentPlatform>, policy: PollPolicy) -> Self {
        Self { platform, policy }
    }

    pub async fn wait(&self, thread_id: &str, run: Run) -> Result<RunOutcome, CampaignError> {
        let started = Instant::now();
        let mut run = run;
        let mut polls = 0;

        while !run.status.is_terminal() {
            if self.exhausted(started, polls) {
                warn!(
                    run_id = %run.id,
                    status = %run.status,
                    polls,
                    "stopped waiting for run before it finished"
                );
                return Ok(RunOutcome {
                    run,
                    timed_out: true,
                    polls,
                });
            }

            tokio::time::sleep(self.policy.interval).await;

            let next = self
                .platform
                .get_run(thread_id, &run.id)
                .await
                .map_err(|e| CampaignError::RunPoll {
                    run_id: run.id.clone(),
                    source: e,
                })?;
            polls += 1;

            if next.status != run.status {
                debug!(run_id = %next.id, from = %run.status, to = %next.status, "run status changed");
            }
            if next.status == RunStatus::RequiresAction && run.status != RunStatus::RequiresAction {
                warn!(run_id = %next.id, "run requires client-side action; waiting for the platform");
            }
            run = next;
        }

        info!(run_id = %run.id, status = %run.status, polls, "run finished");
        Ok(RunOutcome {
            run,
            timed_out: false,
            polls,
        })
    }

    fn exhausted(&self, started: Instant, polls: usize) -> bool {
        let out_of_time = self
            .policy
            .max_wait
            .map(|max| started.elapsed() >= max)
            .unwrap_or(false);
        let out_of_polls = self.policy.max_polls.map(|max| polls >= max).unwrap_or(false);
        out_of_time || out_of_polls
    }
}
