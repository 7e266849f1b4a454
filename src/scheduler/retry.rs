/*!
 * Retry state machine for translation jobs.
 *
 * ```text
 * pending -> in-flight -> succeeded
 *                      -> retry-wait -> in-flight -> ...
 *                      -> failed
 * ```
 *
 * Transient failures move a job to retry-wait until the attempt budget is
 * spent; permanent failures fail it at once. Cancellation fails a job that
 * is not in flight.
 */

use log::warn;
use std::time::Duration;

use crate::errors::FailureKind;

/// Backoff and attempt budget
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Attempts in total, the first one included
    pub max_attempts: u32,
    /// Delay after the first failure
    pub base_backoff: Duration,
    /// Upper bound of any delay
    pub max_backoff: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            base_backoff: Duration::from_millis(500),
            max_backoff: Duration::from_secs(8),
        }
    }
}

impl RetryPolicy {
    /// Create a policy
    pub fn new(max_attempts: u32, base_backoff: Duration, max_backoff: Duration) -> Self {
        Self {
            max_attempts: max_attempts.max(1),
            base_backoff,
            max_backoff,
        }
    }

    /// Delay after failed attempt number `attempt` (1-based): base × 2^(attempt-1), capped
    pub fn backoff_for(&self, attempt: u32) -> Duration {
        let exponent = attempt.saturating_sub(1).min(31);
        let factor = 1u32 << exponent;
        self.base_backoff
            .checked_mul(factor)
            .unwrap_or(self.max_backoff)
            .min(self.max_backoff)
    }
}

/// Lifecycle of a translation job
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JobState {
    /// Not dispatched yet
    Pending,
    /// Provider call `attempt` is running
    InFlight { attempt: u32 },
    /// Attempt `attempt` failed transiently; waiting `delay` before the next
    RetryWait { attempt: u32, delay: Duration },
    /// Resolved after `attempts` calls
    Succeeded { attempts: u32 },
    /// Given up after `attempts` calls
    Failed { attempts: u32 },
}

/// Something that happens to a job
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JobEvent {
    /// A provider call starts
    Dispatch,
    /// The provider call returned a translation
    Success,
    /// The provider call failed
    Failure(FailureKind),
    /// The run was cancelled
    Cancel,
}

impl JobState {
    /// Next state after `event`
    ///
    /// Events that make no sense in the current state leave it unchanged.
    pub fn on_event(self, event: JobEvent, policy: &RetryPolicy) -> JobState {
        match (self, event) {
            (JobState::Pending, JobEvent::Dispatch) => JobState::InFlight { attempt: 1 },
            (JobState::RetryWait { attempt, .. }, JobEvent::Dispatch) => JobState::InFlight { attempt: attempt + 1 },
            (JobState::InFlight { attempt }, JobEvent::Success) => JobState::Succeeded { attempts: attempt },
            (JobState::InFlight { attempt }, JobEvent::Failure(FailureKind::Transient))
                if attempt < policy.max_attempts =>
            {
                JobState::RetryWait {
                    attempt,
                    delay: policy.backoff_for(attempt),
                }
            }
            (JobState::InFlight { attempt }, JobEvent::Failure(_)) => JobState::Failed { attempts: attempt },
            (JobState::Pending, JobEvent::Cancel) => JobState::Failed { attempts: 0 },
            (JobState::RetryWait { attempt, .. }, JobEvent::Cancel) => JobState::Failed { attempts: attempt },
            (state, event) => {
                warn!("Ignoring {:?} for job in state {:?}", event, state);
                state
            }
        }
    }

    /// Provider calls made so far
    pub fn attempts(&self) -> u32 {
        match self {
            JobState::Pending => 0,
            JobState::InFlight { attempt } | JobState::RetryWait { attempt, .. } => *attempt,
            JobState::Succeeded { attempts } | JobState::Failed { attempts } => *attempts,
        }
    }

    /// Whether the job reached a final state
    pub fn is_terminal(&self) -> bool {
        matches!(self, JobState::Succeeded { .. } | JobState::Failed { .. })
    }
}
