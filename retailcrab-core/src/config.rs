//! Operational parameters fixed at pipeline startup.

use std::time::Duration;

use anyhow::{Context, Result, bail};
use serde::{Deserialize, Serialize};

use crate::time::duration_millis;
use crate::types::EventTime;

/// Bounded exponential backoff used by sink workers.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RetryPolicy {
    /// Total attempts per write or flush, including the first one.
    pub max_attempts: u32,
    pub initial_backoff: Duration,
    pub max_backoff: Duration,
}

impl RetryPolicy {
    /// Delay to wait after the failed attempt number `attempt` (1-based).
    pub fn backoff(&self, attempt: u32) -> Duration {
        let shift = attempt.saturating_sub(1).min(31);
        self.initial_backoff
            .saturating_mul(1u32 << shift)
            .min(self.max_backoff)
    }

    /// No retries and no waiting. Handy in tests.
    pub fn no_retry() -> Self {
        Self {
            max_attempts: 1,
            initial_backoff: Duration::ZERO,
            max_backoff: Duration::ZERO,
        }
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 5,
            initial_backoff: Duration::from_millis(100),
            max_backoff: Duration::from_secs(5),
        }
    }
}

/// Pipeline configuration.
///
/// Windows are tumbling: `window_slide` exists so callers can state it
/// explicitly, but it must equal `window_size`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PipelineConfig {
    /// Upper bound on how long one poll waits for messages.
    pub trigger_interval: Duration,
    pub watermark_delay: Duration,
    pub window_size: Duration,
    pub window_slide: Duration,
    /// Grace period after a window's end before it is finalized.
    pub allowed_lateness: Duration,
    pub max_batch_size: usize,
    /// Write a checkpoint every N processed batches.
    pub checkpoint_every: u32,
    /// How long a checkpoint waits for sinks to acknowledge a flush.
    pub sink_barrier_timeout: Duration,
    pub retry: RetryPolicy,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            trigger_interval: Duration::from_secs(60),
            watermark_delay: Duration::from_secs(60),
            window_size: Duration::from_secs(60),
            window_slide: Duration::from_secs(60),
            allowed_lateness: Duration::ZERO,
            max_batch_size: 10_000,
            checkpoint_every: 1,
            sink_barrier_timeout: Duration::from_secs(30),
            retry: RetryPolicy::default(),
        }
    }
}

impl PipelineConfig {
    /// Reject settings the pipeline cannot run with. Every duration that
    /// ends up in event-time arithmetic must be a whole number of
    /// milliseconds that fits in an [`EventTime`].
    pub fn validate(&self) -> Result<()> {
        if event_time_millis("window size", self.window_size)? == 0 {
            bail!("window size must be at least 1ms, got {:?}", self.window_size);
        }
        event_time_millis("allowed lateness", self.allowed_lateness)?;
        event_time_millis("watermark delay", self.watermark_delay)?;
        if self.window_slide != self.window_size {
            bail!(
                "only tumbling windows are supported: slide {:?} != size {:?}",
                self.window_slide,
                self.window_size
            );
        }
        if self.max_batch_size == 0 {
            bail!("max batch size must be positive");
        }
        if self.checkpoint_every == 0 {
            bail!("checkpoint_every must be at least 1");
        }
        if self.retry.max_attempts == 0 {
            bail!("sink retry policy needs at least one attempt");
        }
        Ok(())
    }
}

fn event_time_millis(name: &str, duration: Duration) -> Result<EventTime> {
    duration_millis(duration)
        .with_context(|| format!("{name} {duration:?} is too large for event-time milliseconds"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config_is_valid() {
        let config = PipelineConfig::default();
        config.validate().unwrap();
        assert_eq!(config.window_size, config.window_slide);
        assert_eq!(config.allowed_lateness, Duration::ZERO);
    }

    #[test]
    fn test_sliding_windows_rejected() {
        let config = PipelineConfig {
            window_slide: Duration::from_secs(30),
            ..PipelineConfig::default()
        };
        let err = config.validate().unwrap_err();
        assert!(err.to_string().contains("tumbling"), "unexpected error: {err}");
    }

    #[test]
    fn test_zero_batch_size_rejected() {
        let config = PipelineConfig {
            max_batch_size: 0,
            ..PipelineConfig::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_sub_millisecond_window_rejected() {
        let size = Duration::from_micros(500);
        let config = PipelineConfig {
            window_size: size,
            window_slide: size,
            ..PipelineConfig::default()
        };
        let err = config.validate().unwrap_err();
        assert!(err.to_string().contains("at least 1ms"), "unexpected error: {err}");
    }

    #[test]
    fn test_oversized_durations_rejected() {
        let huge = Duration::from_secs(u64::MAX);
        let window = PipelineConfig {
            window_size: huge,
            window_slide: huge,
            ..PipelineConfig::default()
        };
        assert!(window.validate().is_err());

        let lateness = PipelineConfig {
            allowed_lateness: huge,
            ..PipelineConfig::default()
        };
        assert!(lateness.validate().is_err());

        let delay = PipelineConfig {
            watermark_delay: huge,
            ..PipelineConfig::default()
        };
        let err = delay.validate().unwrap_err();
        assert!(err.to_string().contains("watermark delay"), "unexpected error: {err}");
    }

    #[test]
    fn test_largest_representable_window_accepted() {
        let size = Duration::from_millis(i64::MAX as u64);
        let config = PipelineConfig {
            window_size: size,
            window_slide: size,
            ..PipelineConfig::default()
        };
        config.validate().unwrap();
    }

    #[test]
    fn test_backoff_doubles_and_caps() {
        let policy = RetryPolicy {
            max_attempts: 10,
            initial_backoff: Duration::from_millis(100),
            max_backoff: Duration::from_millis(500),
        };
        assert_eq!(policy.backoff(1), Duration::from_millis(100));
        assert_eq!(policy.backoff(2), Duration::from_millis(200));
        assert_eq!(policy.backoff(3), Duration::from_millis(400));
        assert_eq!(policy.backoff(4), Duration::from_millis(500));
        assert_eq!(policy.backoff(40), Duration::from_millis(500));
    }
}
