//! Submission lifecycle.

use super::SubmissionHandle;
use tracing::debug;

/// The lifecycle state of a single submission.
///
/// A submission starts as [`SubmissionState::Built`] and ends in one of
/// [`SubmissionState::Included`], [`SubmissionState::Failed`] or
/// [`SubmissionState::TrackingTimeout`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SubmissionState {
    /// Intents are validated and the bundle is assembled.
    Built,
    /// The account is not delegated yet and an authorization signature was requested.
    AuthorizationPending,
    /// The authorization is signed.
    Signed,
    /// Sponsorship was requested from the gateway.
    SponsorshipRequested,
    /// The bundle was accepted by the bundler.
    Submitted,
    /// The bundle was included on chain.
    Included,
    /// The submission failed, either before submitting or on chain.
    Failed,
    /// The bundle was submitted but inclusion was not observed in time.
    ///
    /// The bundle may still be included later.
    TrackingTimeout,
}

impl SubmissionState {
    /// Whether the state is final.
    pub const fn is_terminal(&self) -> bool {
        matches!(self, Self::Included | Self::Failed | Self::TrackingTimeout)
    }

    /// Whether `next` may follow this state.
    ///
    /// Every submission passes through [`SubmissionState::SponsorshipRequested`] before it is
    /// submitted.
    pub const fn can_transition_to(&self, next: Self) -> bool {
        match (self, next) {
            (Self::Built, Self::AuthorizationPending | Self::SponsorshipRequested)
            | (Self::AuthorizationPending, Self::Signed)
            | (Self::Signed, Self::SponsorshipRequested)
            | (Self::SponsorshipRequested, Self::Submitted)
            | (Self::Submitted, Self::Included | Self::TrackingTimeout) => true,
            (state, Self::Failed) => !state.is_terminal(),
            _ => false,
        }
    }

    /// Name of the state, as used in logs.
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Built => "built",
            Self::AuthorizationPending => "authorization_pending",
            Self::Signed => "signed",
            Self::SponsorshipRequested => "sponsorship_requested",
            Self::Submitted => "submitted",
            Self::Included => "included",
            Self::Failed => "failed",
            Self::TrackingTimeout => "tracking_timeout",
        }
    }
}

impl std::fmt::Display for SubmissionState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Tracks the state of one submission and logs its transitions.
#[derive(Debug)]
pub struct Submission {
    state: SubmissionState,
    handle: Option<SubmissionHandle>,
}

impl Default for Submission {
    fn default() -> Self {
        Self::new()
    }
}

impl Submission {
    /// Creates a new submission in [`SubmissionState::Built`].
    pub fn new() -> Self {
        debug!(state = %SubmissionState::Built, "submission built");
        Self { state: SubmissionState::Built, handle: None }
    }

    /// The current state.
    pub const fn state(&self) -> SubmissionState {
        self.state
    }

    /// The handle, once submitted.
    pub const fn handle(&self) -> Option<SubmissionHandle> {
        self.handle
    }

    /// Moves to `next`.
    ///
    /// Returns `false` and leaves the state unchanged if the transition is not allowed.
    pub fn advance(&mut self, next: SubmissionState) -> bool {
        if !self.state.can_transition_to(next) {
            debug!(from = %self.state, to = %next, "ignoring invalid submission transition");
            return false;
        }
        debug!(from = %self.state, to = %next, handle = ?self.handle, "submission transition");
        self.state = next;
        true
    }

    /// Moves to [`SubmissionState::Submitted`], recording the handle.
    pub fn submitted(&mut self, handle: SubmissionHandle) -> bool {
        self.handle = Some(handle);
        self.advance(SubmissionState::Submitted)
    }
}
