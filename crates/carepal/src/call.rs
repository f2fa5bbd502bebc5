//! Scripted call session.
//!
//! A [`CallSession`] walks idle → calling → ringing → connecting → active on
//! fixed delays, the way the call screen fakes a connection. Every scripted
//! step names the state it expects to leave; if the user has already moved
//! the session elsewhere (hung up, was rejected) the step is dropped. Ending
//! or rejecting a call cancels every pending timer. Timers live in the
//! session's own queue, so dropping the session discards them too.

use std::time::Duration;

use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::config::CallConfig;
use crate::error::Result;
use crate::lifecycle::{CallStatus, Lifecycle, TransitionPolicy};
use crate::timer::{Timed, TimerQueue};

/// Delays of each scripted step, measured from [`CallSession::start`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CallTimings {
    /// calling → ringing.
    pub ringing_after: Duration,
    /// ringing → connecting.
    pub connecting_after: Duration,
    /// connecting → active.
    pub active_after: Duration,
    /// ringing → no-answer.
    pub no_answer_after: Duration,
}

impl Default for CallTimings {
    fn default() -> Self {
        Self {
            ringing_after: Duration::from_millis(1500),
            connecting_after: Duration::from_millis(4500),
            active_after: Duration::from_millis(6000),
            no_answer_after: Duration::from_millis(30_000),
        }
    }
}

impl From<&CallConfig> for CallTimings {
    fn from(config: &CallConfig) -> Self {
        Self {
            ringing_after: Duration::from_millis(config.ringing_after_ms),
            connecting_after: Duration::from_millis(config.connecting_after_ms),
            active_after: Duration::from_millis(config.active_after_ms),
            no_answer_after: Duration::from_millis(config.no_answer_after_ms),
        }
    }
}

const TICK: Duration = Duration::from_secs(1);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum CallEvent {
    /// Scripted step, applied only if the session is still in `expect`.
    Advance { expect: CallStatus, to: CallStatus },
    /// One second of conversation.
    Tick,
}

/// One status change in a call's history.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct CallTransition {
    /// Session time of the change.
    #[serde(with = "millis")]
    pub at: Duration,
    /// Status before.
    pub from: CallStatus,
    /// Status after.
    pub to: CallStatus,
}

/// A simulated call with a single counterpart.
#[derive(Debug)]
pub struct CallSession {
    contact: String,
    status: CallStatus,
    duration_secs: u64,
    timings: CallTimings,
    timers: TimerQueue<CallEvent>,
    history: Vec<CallTransition>,
}

impl CallSession {
    /// Create an idle session with the default timings.
    #[must_use]
    pub fn new(contact: impl Into<String>) -> Self {
        Self::with_timings(contact, CallTimings::default())
    }

    /// Create an idle session with custom timings.
    #[must_use]
    pub fn with_timings(contact: impl Into<String>, timings: CallTimings) -> Self {
        Self {
            contact: contact.into(),
            status: CallStatus::Idle,
            duration_secs: 0,
            timings,
            timers: TimerQueue::new(),
            history: Vec::new(),
        }
    }

    /// Who is being called.
    #[must_use]
    pub fn contact(&self) -> &str {
        &self.contact
    }

    /// Current status.
    #[must_use]
    pub fn status(&self) -> CallStatus {
        self.status
    }

    /// Seconds spent in the active state.
    #[must_use]
    pub fn duration_secs(&self) -> u64 {
        self.duration_secs
    }

    /// Every status change so far, oldest first.
    #[must_use]
    pub fn history(&self) -> &[CallTransition] {
        &self.history
    }

    /// Number of timers still armed.
    #[must_use]
    pub fn pending_timers(&self) -> usize {
        self.timers.pending()
    }

    /// Dial: idle → calling, and arm the scripted steps.
    ///
    /// # Errors
    ///
    /// Returns [`Error::IllegalTransition`](crate::Error::IllegalTransition) if
    /// the session was already started.
    pub fn start(&mut self) -> Result<()> {
        self.transition(CallStatus::Calling)?;

        let t = self.timings;
        self.timers.schedule_after(
            t.ringing_after,
            CallEvent::Advance {
                expect: CallStatus::Calling,
                to: CallStatus::Ringing,
            },
        );
        self.timers.schedule_after(
            t.connecting_after,
            CallEvent::Advance {
                expect: CallStatus::Ringing,
                to: CallStatus::Connecting,
            },
        );
        self.timers.schedule_after(
            t.active_after,
            CallEvent::Advance {
                expect: CallStatus::Connecting,
                to: CallStatus::Active,
            },
        );
        self.timers.schedule_after(
            t.no_answer_after,
            CallEvent::Advance {
                expect: CallStatus::Ringing,
                to: CallStatus::NoAnswer,
            },
        );
        info!(contact = %self.contact, "call started");
        Ok(())
    }

    /// Hang up. Forces `ended` from any live state and cancels all timers.
    ///
    /// Ending an already finished call is a no-op.
    pub fn end(&mut self) {
        if self.status.is_terminal() {
            return;
        }
        if self.status == CallStatus::Idle {
            // Never dialed; nothing to hang up
            return;
        }
        self.force(CallStatus::Ended);
    }

    /// The callee declines.
    ///
    /// # Errors
    ///
    /// Returns [`Error::IllegalTransition`](crate::Error::IllegalTransition)
    /// unless the call is still calling or ringing.
    pub fn reject(&mut self) -> Result<()> {
        self.status
            .check_transition(&self.contact, CallStatus::Rejected, TransitionPolicy::Strict)?;
        self.force(CallStatus::Rejected);
        Ok(())
    }

    fn force(&mut self, to: CallStatus) {
        let cancelled = self.timers.cancel_all();
        debug!(cancelled, "call timers cancelled");
        self.record(to);
        info!(
            contact = %self.contact,
            status = %to,
            duration_secs = self.duration_secs,
            "call finished"
        );
    }

    fn transition(&mut self, to: CallStatus) -> Result<()> {
        self.status
            .check_transition(&self.contact, to, TransitionPolicy::Strict)?;
        self.record(to);
        Ok(())
    }

    fn record(&mut self, to: CallStatus) {
        let from = self.status;
        self.status = to;
        self.history.push(CallTransition {
            at: self.timers.now(),
            from,
            to,
        });
        debug!(from = %from, to = %to, at_ms = self.timers.now().as_millis(), "call status");
    }

    fn handle(&mut self, event: CallEvent) -> Option<CallTransition> {
        match event {
            CallEvent::Advance { expect, to } => {
                if self.status != expect {
                    debug!(expected = %expect, actual = %self.status, "stale call timer skipped");
                    return None;
                }
                if self.transition(to).is_err() {
                    return None;
                }
                match to {
                    CallStatus::Active => {
                        self.timers.schedule_after(TICK, CallEvent::Tick);
                    }
                    s if s.is_terminal() => {
                        self.timers.cancel_all();
                        info!(contact = %self.contact, status = %s, "call finished");
                    }
                    _ => {}
                }
                self.history.last().copied()
            }
            CallEvent::Tick => {
                if self.status == CallStatus::Active {
                    self.duration_secs += 1;
                    self.timers.schedule_after(TICK, CallEvent::Tick);
                }
                None
            }
        }
    }
}

impl Timed for CallSession {
    type Step = CallTransition;

    fn elapsed(&self) -> Duration {
        self.timers.now()
    }

    fn next_deadline(&self) -> Option<Duration> {
        self.timers.next_deadline()
    }

    /// Fire due timers; returns the status changes they caused.
    fn advance(&mut self, by: Duration) -> Vec<CallTransition> {
        let until = self.timers.now() + by;
        let mut changes = Vec::new();
        while let Some(fired) = self.timers.pop_due(until) {
            if let Some(change) = self.handle(fired.event) {
                changes.push(change);
            }
        }
        self.timers.settle(until);
        changes
    }
}

impl std::fmt::Display for CallTransition {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{:>6}ms  {} -> {}", self.at.as_millis(), self.from, self.to)
    }
}

mod millis {
    use std::time::Duration;

    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(d: &Duration, s: S) -> Result<S::Ok, S::Error> {
        s.serialize_u64(u64::try_from(d.as_millis()).unwrap_or(u64::MAX))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<Duration, D::Error> {
        u64::deserialize(d).map(Duration::from_millis)
    }
}

/// Build a session from configuration.
///
/// # Errors
///
/// Returns [`Error::ConfigValidation`](crate::Error::ConfigValidation) if the
/// configured timings are out of order.
pub fn session_from_config(contact: impl Into<String>, config: &CallConfig) -> Result<CallSession> {
    config.validate()?;
    Ok(CallSession::with_timings(contact, CallTimings::from(config)))
}
