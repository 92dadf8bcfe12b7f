//! Cooldown gating for repeated alerts.
//!
//! A dispatched alert opens a suppression window; identical alerts arriving
//! inside the window are dropped on the floor. The gate only advances when a
//! dispatch is confirmed, so a failed send does not consume the window and
//! the next alert retries immediately.

use std::time::{Duration, Instant};

/// Outcome of consulting the gate for an incoming alert.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GateDecision {
    /// Outside the cooldown window; the alert should be dispatched.
    Dispatch,
    /// Inside the cooldown window; the alert is suppressed.
    Suppress {
        /// Time left until the window closes.
        remaining: Duration,
    },
}

/// Tracks the instant of the last successful dispatch.
///
/// `last_sent` is unset until the first dispatch, so the first alert of the
/// process lifetime always passes. Instants come from the monotonic clock;
/// the window cannot move if wall time is adjusted mid-run.
#[derive(Debug)]
pub struct CooldownGate {
    cooldown: Duration,
    last_sent: Option<Instant>,
}

impl CooldownGate {
    /// Create a gate with the given cooldown duration.
    pub fn new(cooldown: Duration) -> Self {
        Self {
            cooldown,
            last_sent: None,
        }
    }

    /// Decide whether an alert arriving at `now` may be dispatched.
    ///
    /// Does not mutate the gate; call
    /// [`record_dispatch`](Self::record_dispatch) once the send is confirmed.
    pub fn evaluate(&self, now: Instant) -> GateDecision {
        match self.last_sent {
            None => GateDecision::Dispatch,
            Some(last) => {
                let elapsed = now.duration_since(last);
                if elapsed > self.cooldown {
                    GateDecision::Dispatch
                } else {
                    GateDecision::Suppress {
                        remaining: self.cooldown - elapsed,
                    }
                }
            }
        }
    }

    /// Advance the gate after a confirmed dispatch at `now`.
    pub fn record_dispatch(&mut self, now: Instant) {
        self.last_sent = Some(now);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn first_alert_always_dispatches() {
        let gate = CooldownGate::new(Duration::from_secs(10));
        assert_eq!(gate.evaluate(Instant::now()), GateDecision::Dispatch);
    }

    #[test]
    fn evaluate_does_not_advance_the_gate() {
        let gate = CooldownGate::new(Duration::from_secs(10));
        let t0 = Instant::now();

        assert_eq!(gate.evaluate(t0), GateDecision::Dispatch);
        // Still open: nothing was recorded.
        assert_eq!(gate.evaluate(t0), GateDecision::Dispatch);
    }

    #[test]
    fn suppresses_within_cooldown_and_reopens_after() {
        // Cooldown 10s: dispatch at t=0, suppressed at t=5, dispatch at t=11.
        let mut gate = CooldownGate::new(Duration::from_secs(10));
        let t0 = Instant::now();

        assert_eq!(gate.evaluate(t0), GateDecision::Dispatch);
        gate.record_dispatch(t0);

        let t5 = t0 + Duration::from_secs(5);
        assert_eq!(
            gate.evaluate(t5),
            GateDecision::Suppress {
                remaining: Duration::from_secs(5)
            }
        );

        let t11 = t0 + Duration::from_secs(11);
        assert_eq!(gate.evaluate(t11), GateDecision::Dispatch);
    }

    #[test]
    fn exactly_at_cooldown_is_still_suppressed() {
        // The window is open only strictly after the cooldown has elapsed.
        let mut gate = CooldownGate::new(Duration::from_secs(10));
        let t0 = Instant::now();
        gate.record_dispatch(t0);

        let t10 = t0 + Duration::from_secs(10);
        assert_eq!(
            gate.evaluate(t10),
            GateDecision::Suppress {
                remaining: Duration::ZERO
            }
        );
    }

    #[test]
    fn suppression_leaves_the_window_unchanged() {
        let mut gate = CooldownGate::new(Duration::from_secs(10));
        let t0 = Instant::now();
        gate.record_dispatch(t0);

        // A suppressed alert at t=9 must not extend the window past t=10.
        let t9 = t0 + Duration::from_secs(9);
        assert!(matches!(gate.evaluate(t9), GateDecision::Suppress { .. }));

        let t11 = t0 + Duration::from_secs(11);
        assert_eq!(gate.evaluate(t11), GateDecision::Dispatch);
    }

    #[test]
    fn record_dispatch_moves_the_window() {
        let mut gate = CooldownGate::new(Duration::from_secs(10));
        let t0 = Instant::now();
        gate.record_dispatch(t0);

        let t11 = t0 + Duration::from_secs(11);
        gate.record_dispatch(t11);

        // t=15 is within the second window even though it is past the first.
        let t15 = t0 + Duration::from_secs(15);
        assert!(matches!(gate.evaluate(t15), GateDecision::Suppress { .. }));
    }
}
