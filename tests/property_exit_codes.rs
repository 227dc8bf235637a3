// tests/property_exit_codes.rs

//! Property tests for exit-code reconciliation.

use proptest::prelude::*;

use runtick::types::{ExitKind, reconcile_exit_code};

proptest! {
    /// A normally exited process always reports its own exit code.
    #[test]
    fn normal_exit_passes_the_code_through(code in any::<i32>()) {
        prop_assert_eq!(reconcile_exit_code(code, ExitKind::Normal), code);
    }

    /// A crashed process reports the status value no matter what exit code
    /// it claims, including a misleading zero.
    #[test]
    fn crashed_exit_always_reports_the_status(code in any::<i32>()) {
        let reconciled = reconcile_exit_code(code, ExitKind::Crashed);
        prop_assert_eq!(reconciled, ExitKind::Crashed.status_value());
        prop_assert_ne!(reconciled, 0);
    }
}
