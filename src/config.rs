//! Playback timing, retry and motion-profile configuration.
//!
//! # Example
//!
//! ```
//! use body_player::config::PlaybackConfig;
//! use std::time::Duration;
//!
//! // Legacy defaults: 100ms ticks, 3s/0.2s/3s settle delays
//! let config = PlaybackConfig::new();
//!
//! // Faster playback for a simulation
//! let config = PlaybackConfig::new()
//!     .tick_period(Duration::from_millis(10))
//!     .encoder_attempts(5);
//! ```

use std::time::Duration;

/// Delay after each stage of the move to the starting pose.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct SettleDelays {
    /// After both arms are commanded
    pub arms: Duration,
    /// After both legs are commanded
    pub legs: Duration,
    /// After the torso is commanded
    pub torso: Duration,
}

impl Default for SettleDelays {
    fn default() -> Self {
        Self {
            arms: Duration::from_secs(3),
            legs: Duration::from_millis(200),
            torso: Duration::from_secs(3),
        }
    }
}

/// Bounded retry with exponential backoff for encoder reads.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct RetryPolicy {
    /// Total read attempts per limb group, including the first.
    pub max_attempts: u32,
    /// Delay after the first failure.
    pub initial_backoff: Duration,
    /// Upper limit for the doubled delay.
    pub max_backoff: Duration,
}

impl RetryPolicy {
    /// Delay to wait after failed attempt number `attempt` (1-based).
    pub fn backoff(&self, attempt: u32) -> Duration {
        let factor = 1u32 << attempt.saturating_sub(1).min(16);
        self.initial_backoff
            .saturating_mul(factor)
            .min(self.max_backoff)
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 20,
            initial_backoff: Duration::from_millis(100),
            max_backoff: Duration::from_secs(1),
        }
    }
}

/// Reference trajectory generator settings applied to every limb before
/// the first move.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct MotionProfile {
    /// deg/s
    pub ref_speed: f64,
    /// deg/s²
    pub ref_acceleration: f64,
}

impl Default for MotionProfile {
    fn default() -> Self {
        Self {
            ref_speed: 5.0,
            ref_acceleration: 50.0,
        }
    }
}

/// Everything the playback controller needs besides its inputs.
#[derive(Clone, Debug, PartialEq)]
pub struct PlaybackConfig {
    /// Fixed sleep after every playback tick
    pub tick_period: Duration,
    /// Per-stage delays while moving to the starting pose
    pub settle: SettleDelays,
    /// Pause between the play confirmation and the first tick
    pub lead_in: Duration,
    /// Pause after the last tick before the session finishes
    pub settle_after_play: Duration,
    pub encoder_retry: RetryPolicy,
    pub profile: MotionProfile,
}

impl PlaybackConfig {
    /// Create a config with the legacy defaults.
    pub fn new() -> Self {
        Self {
            tick_period: Duration::from_millis(100),
            settle: SettleDelays::default(),
            lead_in: Duration::from_secs(1),
            settle_after_play: Duration::from_secs(1),
            encoder_retry: RetryPolicy::default(),
            profile: MotionProfile::default(),
        }
    }

    pub fn tick_period(mut self, period: Duration) -> Self {
        self.tick_period = period;
        self
    }

    pub fn settle(mut self, settle: SettleDelays) -> Self {
        self.settle = settle;
        self
    }

    pub fn lead_in(mut self, delay: Duration) -> Self {
        self.lead_in = delay;
        self
    }

    pub fn settle_after_play(mut self, delay: Duration) -> Self {
        self.settle_after_play = delay;
        self
    }

    /// Set the total number of encoder read attempts per limb group.
    pub fn encoder_attempts(mut self, attempts: u32) -> Self {
        self.encoder_retry.max_attempts = attempts.max(1);
        self
    }

    pub fn encoder_retry(mut self, policy: RetryPolicy) -> Self {
        self.encoder_retry = policy;
        self
    }

    pub fn profile(mut self, profile: MotionProfile) -> Self {
        self.profile = profile;
        self
    }
}

impl Default for PlaybackConfig {
    fn default() -> Self {
        Self::new()
    }
}
