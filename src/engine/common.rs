// src/engine/common.rs
//
// Common utilities shared across engine modules.

use crate::error::StepdownError;
use std::panic::{catch_unwind, AssertUnwindSafe};

/// Run a codec closure, converting panics into typed errors.
///
/// mozjpeg signals some failure modes by panicking across the FFI boundary.
/// A panic must never escape the library, so every codec entry point runs
/// under this wrapper and surfaces as `InternalPanic` instead.
pub(crate) fn run_with_panic_policy<T>(
    stage: &'static str,
    f: impl FnOnce() -> Result<T, StepdownError>,
) -> Result<T, StepdownError> {
    match catch_unwind(AssertUnwindSafe(f)) {
        Ok(result) => result,
        Err(payload) => {
            let message = payload
                .downcast_ref::<&str>()
                .map(|s| (*s).to_string())
                .or_else(|| payload.downcast_ref::<String>().cloned())
                .unwrap_or_else(|| "unknown panic payload".to_string());
            Err(StepdownError::internal_panic(format!(
                "panic in {stage}: {message}"
            )))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorCategory;

    #[test]
    fn test_ok_result_passes_through() {
        let result = run_with_panic_policy("test:ok", || Ok(42));
        assert_eq!(result.unwrap(), 42);
    }

    #[test]
    fn test_error_result_passes_through() {
        let result: Result<(), _> = run_with_panic_policy("test:err", || {
            Err(StepdownError::encode_failed("jpeg", "boom"))
        });
        assert_eq!(result.unwrap_err().category(), ErrorCategory::CodecError);
    }

    #[test]
    fn test_panic_is_caught_and_classified() {
        let result: Result<(), _> =
            run_with_panic_policy("test:panic", || panic!("codec exploded"));
        let err = result.unwrap_err();
        assert_eq!(err.category(), ErrorCategory::InternalBug);
        assert!(err.to_string().contains("test:panic"));
        assert!(err.to_string().contains("codec exploded"));
    }
}
