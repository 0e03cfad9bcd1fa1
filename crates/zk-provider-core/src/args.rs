//! Canonical encoding of witness arguments.
//!
//! Arguments travel to the engine as compact JSON: field elements as decimal
//! strings or numbers, arrays in order, structs as objects. The exact grammar
//! the engine accepts is its own business.

use std::fmt::Display;

use serde::Serialize;
use serde_json::Value;

use crate::error::{ProviderError, Result};

/// Encode `args` as a compact JSON string.
pub fn encode_args<T: Serialize + ?Sized>(args: &T) -> Result<String> {
    let value = serde_json::to_value(args).map_err(ProviderError::ArgumentEncoding)?;
    serde_json::to_string(&value).map_err(ProviderError::ArgumentEncoding)
}

/// A field element literal, written as a decimal string.
pub fn field(value: impl Display) -> Value {
    Value::String(value.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use std::collections::HashMap;

    #[test]
    fn test_empty_args() {
        let args: [Value; 0] = [];
        assert_eq!(encode_args(&args).unwrap(), "[]");
    }

    #[test]
    fn test_arrays_keep_order() {
        let args = json!([field(3), [field(1), field(2)], true]);
        assert_eq!(encode_args(&args).unwrap(), r#"["3",["1","2"],true]"#);
    }

    #[test]
    fn test_numbers_pass_through() {
        assert_eq!(encode_args(&vec![1u64, 2, 3]).unwrap(), "[1,2,3]");
    }

    #[test]
    fn test_non_string_keys_fail() {
        let mut bad = HashMap::new();
        bad.insert((1u8, 2u8), 3u8);
        let err = encode_args(&bad).unwrap_err();
        assert!(matches!(err, ProviderError::ArgumentEncoding(_)));
    }
}
