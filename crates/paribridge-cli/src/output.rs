//! Rendering results for the terminal

use num_bigint::BigInt;
use paribridge_runtime::Value;
use serde_json::json;

/// Human-readable rendering
pub fn render_text(value: &Value) -> String {
    value.to_string()
}

/// JSON rendering
///
/// Integers that fit in 64 bits become numbers, larger ones decimal strings.
/// Rationals become `{"num": .., "den": ..}`; handles and functions their
/// display form.
pub fn to_json(value: &Value) -> serde_json::Value {
    match value {
        Value::Null => serde_json::Value::Null,
        Value::Integer(n) => integer_json(n),
        Value::Rational(q) => json!({
            "num": integer_json(q.numer()),
            "den": integer_json(q.denom()),
        }),
        Value::Sequence(elements) => elements.iter().map(to_json).collect(),
        Value::Text(bytes) => json!(String::from_utf8_lossy(bytes)),
        Value::Permutation(p) => json!({ "cycles": p.to_string() }),
        Value::Handle(_) | Value::Function(_) => json!(value.to_string()),
    }
}

fn integer_json(n: &BigInt) -> serde_json::Value {
    match i64::try_from(n) {
        Ok(small) => json!(small),
        Err(_) => json!(n.to_string()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_json_integers() {
        assert_eq!(to_json(&Value::integer(-5)), json!(-5));
        let big: BigInt = "100000000000000000000".parse().unwrap();
        assert_eq!(
            to_json(&Value::Integer(big)),
            json!("100000000000000000000")
        );
    }

    #[test]
    fn test_json_nested() {
        let value = Value::sequence(vec![
            Value::integer(1),
            Value::sequence(vec![]),
            Value::rational(BigInt::from(1), BigInt::from(3)).unwrap(),
        ]);
        assert_eq!(
            to_json(&value),
            json!([1, [], {"num": 1, "den": 3}])
        );
    }

    #[test]
    fn test_text_rendering() {
        let value = Value::sequence(vec![Value::integer(1), Value::text("a")]);
        insta::assert_snapshot!(render_text(&value), @r#"[1, "a"]"#);
    }
}
