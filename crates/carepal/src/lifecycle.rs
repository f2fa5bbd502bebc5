//! Status lifecycles and their transition tables.
//!
//! Every tracked entity has a status enum implementing [`Lifecycle`]. The
//! enum declares its legal successors explicitly; whether illegal changes
//! are rejected is decided by the [`TransitionPolicy`].

use std::fmt;
use std::str::FromStr;

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

/// How status updates outside the transition table are treated.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TransitionPolicy {
    /// Reject any change not listed in the transition table.
    #[default]
    Strict,
    /// Allow any status to be set from any other.
    Permissive,
}

impl fmt::Display for TransitionPolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Strict => write!(f, "strict"),
            Self::Permissive => write!(f, "permissive"),
        }
    }
}

/// A status enum with an explicit, forward-only transition table.
pub trait Lifecycle:
    Copy
    + Eq
    + fmt::Debug
    + fmt::Display
    + FromStr<Err = Error>
    + Serialize
    + DeserializeOwned
    + Send
    + Sync
    + 'static
{
    /// Entity name used in errors and logs.
    const ENTITY: &'static str;

    /// Every status, in lifecycle order.
    const ALL: &'static [Self];

    /// The status new entities start in.
    fn initial() -> Self;

    /// Stable string form.
    fn as_str(&self) -> &'static str;

    /// Statuses directly reachable from this one.
    fn successors(&self) -> &'static [Self];

    /// Whether no further transition is possible.
    fn is_terminal(&self) -> bool {
        self.successors().is_empty()
    }

    /// Whether `next` is a legal successor.
    fn can_transition_to(&self, next: Self) -> bool {
        self.successors().contains(&next)
    }

    /// Validate a change from `self` to `next` for entity `id` under `policy`.
    ///
    /// Setting the current status again is always allowed.
    ///
    /// # Errors
    ///
    /// Returns [`Error::IllegalTransition`] under the strict policy when `next`
    /// is not a successor.
    fn check_transition(self, id: &str, next: Self, policy: TransitionPolicy) -> Result<()> {
        if self == next || policy == TransitionPolicy::Permissive || self.can_transition_to(next) {
            Ok(())
        } else {
            Err(Error::illegal_transition(Self::ENTITY, id, self, next))
        }
    }
}

/// Lowercase and unify separators so `in_progress`, `In-Progress` and
/// `in progress` all parse the same.
fn normalize(input: &str) -> String {
    input
        .trim()
        .chars()
        .map(|c| match c {
            '_' | ' ' => '-',
            c => c.to_ascii_lowercase(),
        })
        .collect()
}

fn parse_status<S: Lifecycle>(input: &str) -> Result<S> {
    let wanted = normalize(input);
    S::ALL
        .iter()
        .copied()
        .find(|s| normalize(s.as_str()) == wanted)
        .ok_or_else(|| Error::unknown_status(S::ENTITY, input))
}

// === Orders ===

/// Status of a service order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum OrderStatus {
    /// Created, awaiting payment.
    Pending,
    /// Payment approved.
    Paid,
    /// Provider confirmed the order.
    Confirmed,
    /// Goods handed to delivery.
    Shipped,
    /// Fulfilled.
    Completed,
}

impl Lifecycle for OrderStatus {
    const ENTITY: &'static str = "order";
    const ALL: &'static [Self] = &[
        Self::Pending,
        Self::Paid,
        Self::Confirmed,
        Self::Shipped,
        Self::Completed,
    ];

    fn initial() -> Self {
        Self::Pending
    }

    fn as_str(&self) -> &'static str {
        match self {
            Self::Pending => "Pending",
            Self::Paid => "Paid",
            Self::Confirmed => "Confirmed",
            Self::Shipped => "Shipped",
            Self::Completed => "Completed",
        }
    }

    fn successors(&self) -> &'static [Self] {
        match self {
            Self::Pending => &[Self::Paid],
            Self::Paid => &[Self::Confirmed],
            // Services complete directly; goods ship first
            Self::Confirmed => &[Self::Shipped, Self::Completed],
            Self::Shipped => &[Self::Completed],
            Self::Completed => &[],
        }
    }
}

// === Bookings ===

/// Status of a pal booking.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BookingStatus {
    /// Waiting for coordinator approval.
    PendingApproval,
    /// Approved and a pal assigned.
    ApprovedAndAssigned,
    /// Pal accepted the match.
    Matched,
    /// Visit under way.
    Active,
    /// Visit finished.
    Completed,
}

impl Lifecycle for BookingStatus {
    const ENTITY: &'static str = "booking";
    const ALL: &'static [Self] = &[
        Self::PendingApproval,
        Self::ApprovedAndAssigned,
        Self::Matched,
        Self::Active,
        Self::Completed,
    ];

    fn initial() -> Self {
        Self::PendingApproval
    }

    fn as_str(&self) -> &'static str {
        match self {
            Self::PendingApproval => "pending_approval",
            Self::ApprovedAndAssigned => "approved_and_assigned",
            Self::Matched => "matched",
            Self::Active => "active",
            Self::Completed => "completed",
        }
    }

    fn successors(&self) -> &'static [Self] {
        match self {
            Self::PendingApproval => &[Self::ApprovedAndAssigned],
            // A pre-assigned pal may start without a separate match step
            Self::ApprovedAndAssigned => &[Self::Matched, Self::Active],
            Self::Matched => &[Self::Active],
            Self::Active => &[Self::Completed],
            Self::Completed => &[],
        }
    }
}

// === Errands ===

/// Status of an errand (gig).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ErrandStatus {
    /// Posted, nobody working on it yet.
    Pending,
    /// A pal is running the errand.
    InProgress,
    /// Done.
    Completed,
}

impl Lifecycle for ErrandStatus {
    const ENTITY: &'static str = "errand";
    const ALL: &'static [Self] = &[Self::Pending, Self::InProgress, Self::Completed];

    fn initial() -> Self {
        Self::Pending
    }

    fn as_str(&self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::InProgress => "in-progress",
            Self::Completed => "completed",
        }
    }

    fn successors(&self) -> &'static [Self] {
        match self {
            Self::Pending => &[Self::InProgress],
            Self::InProgress => &[Self::Completed],
            Self::Completed => &[],
        }
    }
}

// === Calls ===

/// Status of a simulated call session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum CallStatus {
    /// Screen mounted, nothing dialed.
    Idle,
    /// Dialing.
    Calling,
    /// Remote side is ringing.
    Ringing,
    /// Remote side picked up, media negotiating.
    Connecting,
    /// Conversation in progress.
    Active,
    /// Hung up.
    Ended,
    /// Callee declined.
    Rejected,
    /// Nobody answered in time.
    NoAnswer,
}

impl Lifecycle for CallStatus {
    const ENTITY: &'static str = "call";
    const ALL: &'static [Self] = &[
        Self::Idle,
        Self::Calling,
        Self::Ringing,
        Self::Connecting,
        Self::Active,
        Self::Ended,
        Self::Rejected,
        Self::NoAnswer,
    ];

    fn initial() -> Self {
        Self::Idle
    }

    fn as_str(&self) -> &'static str {
        match self {
            Self::Idle => "idle",
            Self::Calling => "calling",
            Self::Ringing => "ringing",
            Self::Connecting => "connecting",
            Self::Active => "active",
            Self::Ended => "ended",
            Self::Rejected => "rejected",
            Self::NoAnswer => "no-answer",
        }
    }

    fn successors(&self) -> &'static [Self] {
        match self {
            Self::Idle => &[Self::Calling],
            Self::Calling => &[Self::Ringing, Self::Ended, Self::Rejected, Self::NoAnswer],
            Self::Ringing => &[Self::Connecting, Self::Ended, Self::Rejected, Self::NoAnswer],
            Self::Connecting => &[Self::Active, Self::Ended, Self::NoAnswer],
            Self::Active => &[Self::Ended],
            Self::Ended | Self::Rejected | Self::NoAnswer => &[],
        }
    }
}

macro_rules! impl_status_text {
    ($($status:ty),+ $(,)?) => {
        $(
            impl fmt::Display for $status {
                fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                    f.write_str(self.as_str())
                }
            }

            impl FromStr for $status {
                type Err = Error;

                fn from_str(s: &str) -> Result<Self> {
                    parse_status(s)
                }
            }
        )+
    };
}

impl_status_text!(OrderStatus, BookingStatus, ErrandStatus, CallStatus);
