//! Saga phase machine for one order-creation attempt.

use serde::{Deserialize, Serialize};

/// The phase of a single order-creation attempt.
///
/// Phase transitions:
/// ```text
/// Validating ──► Reserving ──► Persisting ──► Enqueuing ──► Done
///     │              │              │
///     ▼              ▼              ▼
/// AbortedValidation  AbortedReservation  AbortedPersistence
/// ```
///
/// Phases are orchestrator-local: they live for the duration of one
/// `create_order` call and are never persisted. The order row's own status
/// is tracked separately by the store.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
pub enum SagaPhase {
    /// Checking the purchasing user exists.
    #[default]
    Validating,

    /// Reserving stock for each line item.
    Reserving,

    /// Inserting and confirming the order row.
    Persisting,

    /// Enqueuing the order.created event.
    Enqueuing,

    /// Order confirmed and event enqueued (terminal).
    Done,

    /// Aborted before any side effect (terminal).
    AbortedValidation,

    /// Aborted after releasing partial reservations (terminal).
    AbortedReservation,

    /// Aborted after releasing all reservations (terminal).
    AbortedPersistence,
}

impl SagaPhase {
    /// Returns the abort phase corresponding to this phase.
    ///
    /// Only meaningful for the non-terminal working phases; `Enqueuing`
    /// cannot abort (enqueue failure does not fail the order).
    pub fn abort(&self) -> SagaPhase {
        match self {
            SagaPhase::Validating => SagaPhase::AbortedValidation,
            SagaPhase::Reserving => SagaPhase::AbortedReservation,
            SagaPhase::Persisting => SagaPhase::AbortedPersistence,
            other => *other,
        }
    }

    /// Returns true if this is a terminal phase.
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            SagaPhase::Done
                | SagaPhase::AbortedValidation
                | SagaPhase::AbortedReservation
                | SagaPhase::AbortedPersistence
        )
    }

    /// Returns the phase name as a string.
    pub fn as_str(&self) -> &'static str {
        match self {
            SagaPhase::Validating => "Validating",
            SagaPhase::Reserving => "Reserving",
            SagaPhase::Persisting => "Persisting",
            SagaPhase::Enqueuing => "Enqueuing",
            SagaPhase::Done => "Done",
            SagaPhase::AbortedValidation => "AbortedValidation",
            SagaPhase::AbortedReservation => "AbortedReservation",
            SagaPhase::AbortedPersistence => "AbortedPersistence",
        }
    }
}

impl std::fmt::Display for SagaPhase {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_phase_is_validating() {
        assert_eq!(SagaPhase::default(), SagaPhase::Validating);
    }

    #[test]
    fn test_abort_mapping() {
        assert_eq!(SagaPhase::Validating.abort(), SagaPhase::AbortedValidation);
        assert_eq!(SagaPhase::Reserving.abort(), SagaPhase::AbortedReservation);
        assert_eq!(SagaPhase::Persisting.abort(), SagaPhase::AbortedPersistence);
        assert_eq!(SagaPhase::Done.abort(), SagaPhase::Done);
    }

    #[test]
    fn test_terminal_phases() {
        assert!(!SagaPhase::Validating.is_terminal());
        assert!(!SagaPhase::Reserving.is_terminal());
        assert!(!SagaPhase::Persisting.is_terminal());
        assert!(!SagaPhase::Enqueuing.is_terminal());
        assert!(SagaPhase::Done.is_terminal());
        assert!(SagaPhase::AbortedValidation.is_terminal());
        assert!(SagaPhase::AbortedReservation.is_terminal());
        assert!(SagaPhase::AbortedPersistence.is_terminal());
    }

    #[test]
    fn test_display() {
        assert_eq!(SagaPhase::Reserving.to_string(), "Reserving");
        assert_eq!(
            SagaPhase::AbortedPersistence.to_string(),
            "AbortedPersistence"
        );
    }
}
