//! Closed state machines for workflow entities.

use crate::error::{DomainError, DomainResult};

/// A workflow state with an explicit transition table.
///
/// Implementations list legal edges in `can_transition_to`; everything else is
/// refused with `DomainError::InvalidTransition`. Requesting the current state
/// again is never a legal edge, which is what makes re-completion of a terminal
/// purchase/sale/shipment a rejection rather than a second application.
pub trait Lifecycle: Copy + Eq + core::fmt::Debug + core::fmt::Display {
    /// Entity label used in error messages (e.g. "purchase").
    const ENTITY: &'static str;

    /// Whether `self -> next` is a legal edge.
    fn can_transition_to(self, next: Self) -> bool;

    /// Whether no edge leaves this state.
    fn is_terminal(self) -> bool;

    /// Check an edge, producing a contextual error when it is illegal.
    fn ensure_transition(self, id: impl core::fmt::Display, next: Self) -> DomainResult<()> {
        if self.can_transition_to(next) {
            Ok(())
        } else {
            Err(DomainError::invalid_transition(Self::ENTITY, id, self, next))
        }
    }
}
