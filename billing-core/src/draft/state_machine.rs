use serde::{Deserialize, Serialize};
use std::fmt;

use crate::models::PaymentType;

/// Draft state enumeration representing the stages of invoice submission.
///
/// The state machine progresses through these states:
/// - Editing: Cash draft being composed, submittable once valid
/// - CreditCheckRequired: Credit draft without a valid credit approval
/// - CreditApproved: Credit draft whose current client/total passed a check
/// - Submitting: Submission in flight against the billing API
/// - Submitted: Invoice persisted remotely (terminal state)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "state", rename_all = "snake_case")]
pub enum DraftState {
    Editing,

    CreditCheckRequired,

    CreditApproved,

    Submitting,

    Submitted { invoice_id: i64 },
}

impl DraftState {
    /// Whether the draft may still be edited.
    pub fn is_editable(&self) -> bool {
        matches!(
            self,
            DraftState::Editing | DraftState::CreditCheckRequired | DraftState::CreditApproved
        )
    }
}

impl fmt::Display for DraftState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DraftState::Editing => write!(f, "editing"),
            DraftState::CreditCheckRequired => write!(f, "credit_check_required"),
            DraftState::CreditApproved => write!(f, "credit_approved"),
            DraftState::Submitting => write!(f, "submitting"),
            DraftState::Submitted { invoice_id } => write!(f, "submitted({})", invoice_id),
        }
    }
}

/// Event that drives a draft from one state to the next.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DraftEvent {
    /// Client, lines or payment type changed; carries the payment type after the edit
    Edited { payment: PaymentType },

    /// A credit check ran with the given outcome
    CreditChecked { approved: bool },

    /// The user asked to save the invoice
    SubmitRequested,

    /// The billing API persisted the invoice
    SubmitSucceeded { invoice_id: i64 },

    /// The billing API call failed; carries the draft's payment type
    SubmitFailed { payment: PaymentType },
}

impl fmt::Display for DraftEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DraftEvent::Edited { payment } => write!(f, "edited({})", payment),
            DraftEvent::CreditChecked { approved } => write!(f, "credit_checked({})", approved),
            DraftEvent::SubmitRequested => write!(f, "submit_requested"),
            DraftEvent::SubmitSucceeded { invoice_id } => write!(f, "submit_succeeded({})", invoice_id),
            DraftEvent::SubmitFailed { payment } => write!(f, "submit_failed({})", payment),
        }
    }
}

/// Transition refused by the state machine.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum TransitionError {
    #[error("a credit check must pass before a credit invoice can be saved")]
    CreditCheckRequired,

    #[error("credit checks only apply to credit invoices")]
    CreditCheckNotApplicable,

    #[error("the invoice is already being saved")]
    SubmissionInProgress,

    #[error("the invoice was already saved")]
    AlreadySubmitted,

    #[error("event {event} is not valid in state {state}")]
    Invalid { state: DraftState, event: DraftEvent },
}

/// Trait for state transitions in the draft submission state machine.
///
/// Defines the logic for determining the next state from the current state
/// and an event.
pub trait Transition {
    /// Determines the next state for `event` in `current_state`.
    ///
    /// # Arguments
    ///
    /// * `current_state` - The current draft state
    /// * `event` - What just happened to the draft
    ///
    /// # Returns
    ///
    /// Returns the next state, or the reason the event is refused.
    fn transition(current_state: DraftState, event: DraftEvent) -> Result<DraftState, TransitionError>;

    /// Gets the initial state for a new draft paid with `payment`.
    fn initial_state(payment: PaymentType) -> DraftState {
        editing_state(payment)
    }
}

fn editing_state(payment: PaymentType) -> DraftState {
    match payment {
        PaymentType::Cash => DraftState::Editing,
        PaymentType::Credit => DraftState::CreditCheckRequired,
    }
}

/// Default implementation of the Transition trait for invoice drafts.
///
/// Implements the state machine logic:
/// - Any editing state -> Editing / CreditCheckRequired on edit (approval dropped)
/// - CreditCheckRequired / CreditApproved -> CreditApproved or CreditCheckRequired on check
/// - Editing / CreditApproved -> Submitting on submit
/// - Submitting -> Submitted on success
/// - Submitting -> Editing (cash) / CreditCheckRequired (credit) on failure
pub struct DraftStateMachine;

impl Transition for DraftStateMachine {
    fn transition(current_state: DraftState, event: DraftEvent) -> Result<DraftState, TransitionError> {
        use DraftEvent::*;
        use DraftState::*;

        match (current_state, event) {
            (Submitted { .. }, _) => Err(TransitionError::AlreadySubmitted),

            (Submitting, SubmitSucceeded { invoice_id }) => Ok(Submitted { invoice_id }),
            // The remote may have partially persisted the invoice, so a credit
            // approval is not trusted after a failure.
            (Submitting, SubmitFailed { payment }) => Ok(editing_state(payment)),
            (Submitting, _) => Err(TransitionError::SubmissionInProgress),

            (_, Edited { payment }) => Ok(editing_state(payment)),

            (Editing, CreditChecked { .. }) => Err(TransitionError::CreditCheckNotApplicable),
            (_, CreditChecked { approved: true }) => Ok(CreditApproved),
            (_, CreditChecked { approved: false }) => Ok(CreditCheckRequired),

            (Editing | CreditApproved, SubmitRequested) => Ok(Submitting),
            (CreditCheckRequired, SubmitRequested) => Err(TransitionError::CreditCheckRequired),

            (state, event) => Err(TransitionError::Invalid { state, event }),
        }
    }
}
