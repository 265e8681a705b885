// SPDX-License-Identifier: PolyForm-Noncommercial-1.0.0
// Copyright (c) 2025 Sylvex. All rights reserved.

//! Reconnection policy for transport-level recovery.
//!
//! Reconnection is executed by the transport layer itself; this module only
//! defines the policy surface handed to it at construction: how many
//! attempts, and how the delay between attempts grows. The defaults mirror
//! the bridge's production profile: unbounded retries, 5 second initial
//! delay, doubling, capped at 30 seconds.

use std::time::Duration;

use serde::{Deserialize, Serialize};

// =============================================================================
// ReconnectPolicy
// =============================================================================

/// Policy for transport reconnection backoff.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReconnectPolicy {
    /// Maximum number of reconnection attempts. `None` means retry forever.
    #[serde(default)]
    pub max_retries: Option<u32>,

    /// Delay before the first reconnection attempt.
    #[serde(default = "default_initial_delay", with = "duration_millis")]
    pub initial_delay: Duration,

    /// Upper bound on the delay between attempts.
    #[serde(default = "default_max_delay", with = "duration_millis")]
    pub max_delay: Duration,

    /// Growth factor applied per attempt.
    #[serde(default = "default_multiplier")]
    pub multiplier: f64,

    /// Jitter factor (0.0 to 1.0) randomizing each delay to avoid
    /// synchronized reconnect storms across endpoints.
    #[serde(default)]
    pub jitter: f64,
}

fn default_initial_delay() -> Duration {
    Duration::from_secs(5)
}

fn default_max_delay() -> Duration {
    Duration::from_secs(30)
}

fn default_multiplier() -> f64 {
    2.0
}

impl Default for ReconnectPolicy {
    fn default() -> Self {
        Self {
            max_retries: None,
            initial_delay: default_initial_delay(),
            max_delay: default_max_delay(),
            multiplier: default_multiplier(),
            jitter: 0.0,
        }
    }
}

impl ReconnectPolicy {
    /// Creates a policy with a bounded number of retries.
    pub fn bounded(max_retries: u32) -> Self {
        Self {
            max_retries: Some(max_retries),
            ..Default::default()
        }
    }

    /// Creates a policy that never reconnects.
    pub fn disabled() -> Self {
        Self {
            max_retries: Some(0),
            ..Default::default()
        }
    }

    /// Sets the initial delay.
    pub fn with_initial_delay(mut self, delay: Duration) -> Self {
        self.initial_delay = delay;
        self
    }

    /// Sets the maximum delay.
    pub fn with_max_delay(mut self, delay: Duration) -> Self {
        self.max_delay = delay;
        self
    }

    /// Sets the jitter factor, clamped to `[0.0, 1.0]`.
    pub fn with_jitter(mut self, jitter: f64) -> Self {
        self.jitter = jitter.clamp(0.0, 1.0);
        self
    }

    /// Returns `true` if another attempt is allowed after `attempt` failures.
    pub fn allows_attempt(&self, attempt: u32) -> bool {
        match self.max_retries {
            None => true,
            Some(max) => attempt < max,
        }
    }

    /// Computes the delay before the given attempt (zero-based), growing by
    /// `multiplier` per attempt and capped at `max_delay`.
    pub fn delay_for_attempt(&self, attempt: u32) -> Duration {
        let base = self.initial_delay.as_secs_f64();
        let factor = self.multiplier.max(1.0).powi(attempt.min(63) as i32);
        let mut delay = base * factor;

        let cap = self.max_delay.as_secs_f64();
        if delay > cap {
            delay = cap;
        }

        if self.jitter > 0.0 {
            // Randomize within [delay * (1 - jitter), delay].
            let spread = delay * self.jitter;
            delay -= spread * rand::random::<f64>();
        }

        Duration::from_secs_f64(delay)
    }
}

/// Serialization helper for `Duration` as milliseconds.
mod duration_millis {
    use serde::{Deserialize, Deserializer, Serialize, Serializer};
    use std::time::Duration;

    pub fn serialize<S>(duration: &Duration, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        (duration.as_millis() as u64).serialize(serializer)
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Duration, D::Error>
    where
        D: Deserializer<'de>,
    {
        let millis = u64::deserialize(deserializer)?;
        Ok(Duration::from_millis(millis))
    }
}

// =============================================================================
// Tests
// =============================================================================
