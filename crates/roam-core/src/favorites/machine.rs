//! Session state machine for favorites routing.
//!
//! `transition` is pure: it maps the current phase and an event to the next
//! phase plus the one side effect the driver must perform. All I/O lives in
//! [`super::FavoritesReconciler`].

use super::error::Precondition;
use crate::models::Identity;

/// Progress of the anonymous-to-account merge.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MergeAttempt {
    /// Remote calls outstanding; identity notifications do not restart it
    InFlight,
    /// Last attempt failed; the next sign-in notification or retry reruns it
    Failed,
}

/// Where favorites are read from and written to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Phase {
    /// No identity; the local cache is authoritative
    Anonymous,
    /// Signed in with local favorites still to be merged
    Merging {
        identity: Identity,
        attempt: MergeAttempt,
    },
    /// Signed in; the remote store is authoritative
    Authenticated { identity: Identity },
}

impl Phase {
    #[must_use]
    pub const fn identity(&self) -> Option<&Identity> {
        match self {
            Self::Anonymous => None,
            Self::Merging { identity, .. } | Self::Authenticated { identity } => Some(identity),
        }
    }

    #[must_use]
    pub const fn label(&self) -> &'static str {
        match self {
            Self::Anonymous => "anonymous",
            Self::Merging {
                attempt: MergeAttempt::InFlight,
                ..
            } => "merging",
            Self::Merging {
                attempt: MergeAttempt::Failed,
                ..
            } => "merge-failed",
            Self::Authenticated { .. } => "authenticated",
        }
    }
}

/// Inputs to the state machine.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionEvent {
    /// Identity provider reports a signed-in identity
    SignedIn {
        identity: Identity,
        /// Whether the local cache currently holds favorites
        local_pending: bool,
    },
    /// Identity provider reports no identity
    SignedOut,
    /// The merge's remote insert was confirmed and the local cache cleared
    MergeCommitted,
    /// The merge failed; the local cache is untouched
    MergeFailed,
    /// Caller asked to rerun a failed merge
    RetryRequested,
}

/// Work the driver performs after a transition.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Effect {
    None,
    /// Rebuild the view from the local cache
    LoadLocal,
    /// Merge the local cache into this identity's remote favorites
    RunMerge(Identity),
    /// Rebuild the view from this identity's remote favorites
    LoadRemote(Identity),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Step {
    pub next: Phase,
    pub effect: Effect,
    /// The session owner changed; results of earlier in-flight work are stale
    pub session_changed: bool,
}

impl Step {
    const fn stay(phase: Phase) -> Self {
        Self {
            next: phase,
            effect: Effect::None,
            session_changed: false,
        }
    }

    fn begin_session(identity: Identity, local_pending: bool) -> Self {
        if local_pending {
            Self {
                next: Phase::Merging {
                    identity: identity.clone(),
                    attempt: MergeAttempt::InFlight,
                },
                effect: Effect::RunMerge(identity),
                session_changed: true,
            }
        } else {
            Self {
                next: Phase::Authenticated {
                    identity: identity.clone(),
                },
                effect: Effect::LoadRemote(identity),
                session_changed: true,
            }
        }
    }

    const fn end_session() -> Self {
        Self {
            next: Phase::Anonymous,
            effect: Effect::LoadLocal,
            session_changed: true,
        }
    }
}

/// Compute the next phase for `event`.
///
/// A merge runs at most once per anonymous-to-signed-in edge: repeated
/// sign-in notifications for the same account never restart an in-flight or
/// completed merge. They do rerun a merge whose last attempt failed.
pub fn transition(phase: &Phase, event: SessionEvent) -> Result<Step, Precondition> {
    let step = match (phase, event) {
        (Phase::Anonymous, SessionEvent::SignedIn { identity, local_pending }) => {
            Step::begin_session(identity, local_pending)
        }
        (Phase::Anonymous, SessionEvent::RetryRequested) => {
            return Err(Precondition::NotAuthenticated);
        }
        (Phase::Anonymous, _) => Step::stay(Phase::Anonymous),

        (_, SessionEvent::SignedOut) => Step::end_session(),

        (
            Phase::Merging {
                identity: current,
                attempt,
            },
            SessionEvent::SignedIn {
                identity,
                local_pending,
            },
        ) => {
            if !current.same_account(&identity) {
                Step::begin_session(identity, local_pending)
            } else if *attempt == MergeAttempt::InFlight {
                // Role refresh only.
                Step::stay(Phase::Merging {
                    identity,
                    attempt: MergeAttempt::InFlight,
                })
            } else if local_pending {
                Step {
                    next: Phase::Merging {
                        identity: identity.clone(),
                        attempt: MergeAttempt::InFlight,
                    },
                    effect: Effect::RunMerge(identity),
                    session_changed: false,
                }
            } else {
                Step {
                    next: Phase::Authenticated {
                        identity: identity.clone(),
                    },
                    effect: Effect::LoadRemote(identity),
                    session_changed: false,
                }
            }
        }
        (
            Phase::Merging {
                identity,
                attempt: MergeAttempt::InFlight,
            },
            SessionEvent::MergeCommitted,
        ) => Step::stay(Phase::Authenticated {
            identity: identity.clone(),
        }),
        (
            Phase::Merging {
                identity,
                attempt: MergeAttempt::InFlight,
            },
            SessionEvent::MergeFailed,
        ) => Step::stay(Phase::Merging {
            identity: identity.clone(),
            attempt: MergeAttempt::Failed,
        }),
        (
            Phase::Merging {
                identity,
                attempt: MergeAttempt::Failed,
            },
            SessionEvent::RetryRequested,
        ) => Step {
            next: Phase::Merging {
                identity: identity.clone(),
                attempt: MergeAttempt::InFlight,
            },
            effect: Effect::RunMerge(identity.clone()),
            session_changed: false,
        },
        (Phase::Merging { .. }, _) => Step::stay(phase.clone()),

        (
            Phase::Authenticated { identity: current },
            SessionEvent::SignedIn {
                identity,
                local_pending,
            },
        ) => {
            if current.same_account(&identity) {
                Step::stay(Phase::Authenticated { identity })
            } else {
                Step::begin_session(identity, local_pending)
            }
        }
        (Phase::Authenticated { .. }, _) => Step::stay(phase.clone()),
    };
    Ok(step)
}
