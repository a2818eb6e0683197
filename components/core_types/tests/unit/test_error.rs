//! Unit tests for JsError and ErrorKind

use core_types::{ErrorKind, JsError, Value};

#[cfg(test)]
mod error_kind_tests {
    use super::*;

    #[test]
    fn test_error_kind_names() {
        assert_eq!(ErrorKind::Error.to_string(), "Error");
        assert_eq!(ErrorKind::TypeError.to_string(), "TypeError");
        assert_eq!(ErrorKind::RangeError.to_string(), "RangeError");
        assert_eq!(ErrorKind::InternalError.to_string(), "InternalError");
    }

    #[test]
    fn test_error_kind_clone() {
        let kind1 = ErrorKind::TypeError;
        let kind2 = kind1.clone();
        assert_eq!(kind1, kind2);
    }
}

#[cfg(test)]
mod js_error_tests {
    use super::*;

    #[test]
    fn test_new_sets_kind_and_message() {
        let error = JsError::new(ErrorKind::RangeError, "out of range");
        assert_eq!(error.kind, ErrorKind::RangeError);
        assert_eq!(error.message, "out of range");
        assert!(error.errors.is_empty());
        assert!(!error.is_aggregate());
    }

    #[test]
    fn test_display_format() {
        let error = JsError::internal("handler panicked");
        assert_eq!(error.to_string(), "InternalError: handler panicked");
    }

    #[test]
    fn test_is_std_error() {
        fn takes_error(_: &dyn std::error::Error) {}
        takes_error(&JsError::type_error("x"));
    }

    #[test]
    fn test_empty_aggregate() {
        let error = JsError::aggregate(vec![]);
        assert!(error.is_aggregate());
        assert!(error.errors.is_empty());
        assert_eq!(error.message, "All promises were rejected");
    }

    #[test]
    fn test_aggregate_carries_mixed_reasons() {
        let error = JsError::aggregate(vec![
            Value::from("first"),
            Value::from(JsError::type_error("second")),
        ]);
        assert_eq!(error.errors.len(), 2);
        assert_eq!(error.errors[0], Value::from("first"));
        assert!(error.errors[1].as_error().is_some());
    }
}
