use crate::db_types::PaymentIntent;

/// The result of asking the backend to move a payment into a terminal state.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TransitionOutcome {
    /// This call performed the transition.
    Applied(PaymentIntent),
    /// The payment was already in the requested state. Nothing was written.
    AlreadyApplied(PaymentIntent),
    /// The payment is in the *other* terminal state. Nothing was written.
    Conflict(PaymentIntent),
}

impl TransitionOutcome {
    pub fn payment(&self) -> &PaymentIntent {
        match self {
            TransitionOutcome::Applied(p) | TransitionOutcome::AlreadyApplied(p) | TransitionOutcome::Conflict(p) => p,
        }
    }

    pub fn into_payment(self) -> PaymentIntent {
        match self {
            TransitionOutcome::Applied(p) | TransitionOutcome::AlreadyApplied(p) | TransitionOutcome::Conflict(p) => p,
        }
    }

    /// True only for the single call that performed the transition.
    pub fn is_fresh(&self) -> bool {
        matches!(self, TransitionOutcome::Applied(_))
    }

    pub fn is_conflict(&self) -> bool {
        matches!(self, TransitionOutcome::Conflict(_))
    }
}
