//! The first-error slot: per-task errors land here; the orchestrator
//! checks it at each barrier.

use std::sync::Arc;

use parking_lot::Mutex;

use crate::error::MrError;

#[derive(Clone)]
pub struct ErrorSlot {
    first: Arc<Mutex<Option<MrError>>>,
}

impl ErrorSlot {
    pub fn new() -> Self {
        Self { first: Arc::new(Mutex::new(None)) }
    }

    /// Records `err` only if no error has been recorded yet.
    pub fn set_if_first(&self, err: MrError) {
        let mut slot = self.first.lock();
        if slot.is_none() {
            *slot = Some(err);
        }
    }

    pub fn has_error(&self) -> bool {
        self.first.lock().is_some()
    }

    /// Consumes the slot, returning the first recorded error if any.
    pub fn into_result(self) -> Result<(), MrError> {
        match Arc::try_unwrap(self.first) {
            Ok(mutex) => match mutex.into_inner() {
                Some(e) => Err(e),
                None => Ok(()),
            },
            // Still shared (shouldn't happen once all tasks have joined),
            // fall back to a clone of the inner state.
            Err(arc) => match arc.lock().take() {
                Some(e) => Err(e),
                None => Ok(()),
            },
        }
    }
}

impl Default for ErrorSlot {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn keeps_only_the_first_error() {
        let slot = ErrorSlot::new();
        slot.set_if_first(MrError::user_code("first"));
        slot.set_if_first(MrError::user_code("second"));
        match slot.into_result() {
            Err(MrError::UserCode { message }) => assert_eq!(message, "first"),
            other => panic!("unexpected: {other:?}"),
        }
    }

    #[test]
    fn ok_when_never_set() {
        let slot = ErrorSlot::new();
        assert!(slot.into_result().is_ok());
    }
}
