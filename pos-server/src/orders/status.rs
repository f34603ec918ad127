//! Order status state machine
//!
//! ```text
//! DRAFT -> PENDING_PAYMENT -> [AWAITING_CONFIRMATION ->] PAID -> PREPARING -> READY -> COMPLETED
//! ```
//!
//! CANCELLED and REFUNDED are reachable from every non-terminal status.
//! Kitchen steps may be skipped forward (PAID -> READY) but never backwards.
//! Reopening a cancelled order for a gateway retry is not a regular
//! transition and lives in the gateway flow.

use shared::models::OrderStatus;

use super::error::{PipelineError, PipelineResult};

/// Position on the happy path, `None` for the reversal statuses
fn rank(status: OrderStatus) -> Option<u8> {
    match status {
        OrderStatus::Draft => Some(0),
        OrderStatus::PendingPayment => Some(1),
        OrderStatus::AwaitingConfirmation => Some(2),
        OrderStatus::Paid => Some(3),
        OrderStatus::Preparing => Some(4),
        OrderStatus::Ready => Some(5),
        OrderStatus::Completed => Some(6),
        OrderStatus::Cancelled | OrderStatus::Refunded => None,
    }
}

/// Whether `from -> to` is a legal edge (re-entry excluded)
pub fn can_transition(from: OrderStatus, to: OrderStatus) -> bool {
    if from.is_terminal() || from == to {
        return false;
    }
    if matches!(to, OrderStatus::Cancelled | OrderStatus::Refunded) {
        return true;
    }
    match (from, to) {
        (OrderStatus::Draft, OrderStatus::PendingPayment) => true,
        (OrderStatus::PendingPayment, OrderStatus::AwaitingConfirmation) => true,
        (
            OrderStatus::Draft | OrderStatus::PendingPayment | OrderStatus::AwaitingConfirmation,
            OrderStatus::Paid,
        ) => true,
        // Kitchen progression, forward only
        (from, to) if from.is_settled() && to.is_settled() => {
            matches!((rank(from), rank(to)), (Some(a), Some(b)) if b > a)
        }
        _ => false,
    }
}

/// Validate a transition, with re-entry treated as a no-op
///
/// Returns `Ok(false)` when `to` equals `from` (nothing to write),
/// `Ok(true)` when the write should happen.
pub fn check_transition(from: OrderStatus, to: OrderStatus) -> PipelineResult<bool> {
    if from == to {
        return Ok(false);
    }
    if can_transition(from, to) {
        Ok(true)
    } else {
        Err(PipelineError::InvalidTransition { from, to })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use OrderStatus::*;

    const ALL: [OrderStatus; 9] = [
        Draft,
        PendingPayment,
        AwaitingConfirmation,
        Paid,
        Preparing,
        Ready,
        Completed,
        Cancelled,
        Refunded,
    ];

    #[test]
    fn test_happy_path() {
        assert!(can_transition(Draft, PendingPayment));
        assert!(can_transition(PendingPayment, Paid));
        assert!(can_transition(PendingPayment, AwaitingConfirmation));
        assert!(can_transition(AwaitingConfirmation, Paid));
        assert!(can_transition(Paid, Preparing));
        assert!(can_transition(Preparing, Ready));
        assert!(can_transition(Ready, Completed));
        assert!(can_transition(Paid, Completed));
    }

    #[test]
    fn test_no_backwards_kitchen_steps() {
        assert!(!can_transition(Ready, Preparing));
        assert!(!can_transition(Completed, Ready));
        assert!(!can_transition(Paid, PendingPayment));
        assert!(!can_transition(PendingPayment, Preparing));
    }

    #[test]
    fn test_terminal_states_are_final() {
        for from in [Completed, Cancelled, Refunded] {
            for to in ALL {
                assert!(!can_transition(from, to), "{from} -> {to} must be rejected");
            }
        }
    }

    #[test]
    fn test_reversals_from_any_non_terminal() {
        for from in ALL.into_iter().filter(|s| !s.is_terminal()) {
            assert!(can_transition(from, Cancelled));
            assert!(can_transition(from, Refunded));
        }
    }

    #[test]
    fn test_check_transition_reentry_is_noop() {
        assert!(!check_transition(Paid, Paid).unwrap());
        assert!(!check_transition(Cancelled, Cancelled).unwrap());
        assert!(check_transition(Paid, Preparing).unwrap());
        assert!(matches!(
            check_transition(Completed, Cancelled),
            Err(PipelineError::InvalidTransition { .. })
        ));
    }
}
