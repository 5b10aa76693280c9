//! Session countdown.
//!
//! A timer is either idle, running toward an absolute deadline, or paused
//! with a frozen remaining duration. Encoding the three cases as one enum
//! means only one representation of "time left" exists at a time.

use std::time::Duration;

use tokio::time::Instant;

/// Longest countdown a timer will hold. Longer requests are clamped.
pub const MAX_COUNTDOWN: Duration = Duration::from_secs(24 * 60 * 60);

/// Countdown state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Timer {
    /// No countdown.
    #[default]
    Idle,
    /// Counting down toward `deadline`.
    Running {
        /// Absolute instant at which the countdown reaches zero
        deadline: Instant,
    },
    /// Countdown frozen with `remaining` left.
    Paused {
        /// Time left when the countdown was paused
        remaining: Duration,
    },
}

impl Timer {
    /// Starts a countdown of `duration` from `now`, clamped to [`MAX_COUNTDOWN`].
    #[must_use]
    pub fn start(now: Instant, duration: Duration) -> Self {
        let deadline = now
            .checked_add(duration.min(MAX_COUNTDOWN))
            .unwrap_or(now);
        Self::Running { deadline }
    }

    /// Time left, floored at zero.
    #[must_use]
    pub fn remaining(&self, now: Instant) -> Duration {
        match *self {
            Self::Idle => Duration::ZERO,
            Self::Running { deadline } => deadline.saturating_duration_since(now),
            Self::Paused { remaining } => remaining,
        }
    }

    /// Time left in whole seconds (rounded down).
    #[must_use]
    pub fn remaining_secs(&self, now: Instant) -> u64 {
        self.remaining(now).as_secs()
    }

    /// Whether the countdown is paused.
    #[must_use]
    pub const fn is_paused(&self) -> bool {
        matches!(self, Self::Paused { .. })
    }

    /// Whether a deadline is set.
    #[must_use]
    pub const fn has_deadline(&self) -> bool {
        matches!(self, Self::Running { .. })
    }

    /// Whether a running countdown has reached zero. Paused timers never expire.
    #[must_use]
    pub fn is_expired(&self, now: Instant) -> bool {
        match self {
            Self::Running { .. } => self.remaining(now).is_zero(),
            Self::Idle | Self::Paused { .. } => false,
        }
    }

    /// Freezes a running countdown. Returns `false` if nothing was running.
    pub fn pause(&mut self, now: Instant) -> bool {
        if let Self::Running { .. } = self {
            *self = Self::Paused {
                remaining: self.remaining(now),
            };
            return true;
        }
        false
    }

    /// Restarts a paused countdown from `now`. Returns `false` if not paused.
    pub fn resume(&mut self, now: Instant) -> bool {
        if let Self::Paused { remaining } = *self {
            *self = Self::start(now, remaining);
            return true;
        }
        false
    }

    /// Adds `delta_secs` (possibly negative) to the time left, flooring at
    /// zero and capping at [`MAX_COUNTDOWN`].
    ///
    /// Applies to whichever representation is authoritative. Returns
    /// `false` for an idle timer.
    pub fn adjust(&mut self, now: Instant, delta_secs: i64) -> bool {
        let shifted = |current: Duration| {
            let delta = Duration::from_secs(delta_secs.unsigned_abs());
            if delta_secs >= 0 {
                current.saturating_add(delta).min(MAX_COUNTDOWN)
            } else {
                current.saturating_sub(delta)
            }
        };
        match *self {
            Self::Idle => false,
            Self::Running { .. } => {
                *self = Self::start(now, shifted(self.remaining(now)));
                true
            }
            Self::Paused { remaining } => {
                *self = Self::Paused {
                    remaining: shifted(remaining),
                };
                true
            }
        }
    }

    /// Clears the countdown.
    pub fn clear(&mut self) {
        *self = Self::Idle;
    }
}
