//! Runtime invariant checks with contract-test support.
//!
//! Lifecycle code asserts its invariants with [`assert_invariant!`]; every
//! checked message is recorded per thread so tests can prove the checks were
//! actually exercised on the path under test.
//!
//! ```rust,ignore
//! use camview::invariant_ppt::*;
//!
//! assert_invariant!(
//!     handle.tracks().is_empty(),
//!     "Stopped stream holds no tracks",
//!     "stream::stop"
//! );
//!
//! #[test]
//! fn contract_stream_release() {
//!     // ... drive a stream through open and stop ...
//!     contract_test("stream release", &["Stopped stream holds no tracks"]);
//! }
//! ```

use std::cell::RefCell;
use std::collections::HashSet;
use std::thread_local;

/// Invariant messages used by the crate, shared with contract tests.
pub mod names {
    pub const STOPPED_STREAM_EMPTY: &str = "Stopped stream holds no tracks";
    pub const DETACH_BEFORE_STOP: &str = "Surface is detached before its stream stops";
    pub const PREVIEW_KEYS_ENUMERATED: &str = "Preview map keys are enumerated devices";
    pub const SELECTION_STOPS_ALL: &str = "Selection leaves no preview running";
    pub const ESCAPE_LEAVES_FULLSCREEN: &str = "Escape leaves fullscreen";
    pub const PRIMARY_RELEASED_BEFORE_REASSIGN: &str =
        "Primary stream is released before reassignment";
    pub const LISTENERS_RELEASED: &str = "Viewer listeners are released on exit";
}

thread_local! {
    static INVARIANT_LOG: RefCell<HashSet<String>> = RefCell::new(HashSet::new());
}

/// Assert an invariant and record it for contract testing.
///
/// # Panics
/// Panics if the condition is false.
#[macro_export]
macro_rules! assert_invariant {
    ($condition:expr, $message:expr) => {
        $crate::invariant_ppt::__assert_invariant_impl($condition, $message, None)
    };
    ($condition:expr, $message:expr, $context:expr) => {
        $crate::invariant_ppt::__assert_invariant_impl($condition, $message, Some($context))
    };
}

#[doc(hidden)]
pub fn __assert_invariant_impl(condition: bool, message: &str, context: Option<&str>) {
    INVARIANT_LOG.with(|log| {
        log.borrow_mut().insert(message.to_string());
    });

    if !condition {
        let ctx = context.unwrap_or("unknown");
        panic!("INVARIANT VIOLATION [{}]: {}", ctx, message);
    }
}

/// Whether `message` has been checked on this thread since the last clear.
pub fn invariant_checked(message: &str) -> bool {
    INVARIANT_LOG.with(|log| log.borrow().contains(message))
}

/// Check that specific invariants were verified during test execution.
///
/// # Panics
/// Panics if any required invariant was not checked.
pub fn contract_test(test_name: &str, required_invariants: &[&str]) {
    let log = INVARIANT_LOG.with(|log| log.borrow().clone());

    let missing: Vec<&str> = required_invariants
        .iter()
        .copied()
        .filter(|invariant| !log.contains(*invariant))
        .collect();

    if !missing.is_empty() {
        panic!(
            "CONTRACT FAILURE [{}]: The following invariants were not checked:\n  - {}",
            test_name,
            missing.join("\n  - ")
        );
    }
}

pub fn clear_invariant_log() {
    INVARIANT_LOG.with(|log| {
        log.borrow_mut().clear();
    });
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_checked_invariants_are_recorded() {
        clear_invariant_log();
        assert_invariant!(true, "always holds", "tests");
        assert!(invariant_checked("always holds"));
        contract_test("recorded", &["always holds"]);
    }

    #[test]
    #[should_panic(expected = "CONTRACT FAILURE")]
    fn test_missing_invariant_fails_contract() {
        clear_invariant_log();
        contract_test("missing", &["never checked"]);
    }

    #[test]
    #[should_panic(expected = "INVARIANT VIOLATION [tests]")]
    fn test_violation_panics_with_context() {
        assert_invariant!(false, "cannot hold", "tests");
    }
}
