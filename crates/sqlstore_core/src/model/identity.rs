//! Identity keys, identifiable items and the emptiness rule.
//!
//! # Invariants
//! - Only missing values and objects without properties are empty.
//!   `0`, `false` and `""` are values, not emptiness.
//! - Generated string ids are 32 lowercase hex characters.

use super::row::Row;
use rand::Rng;
use rusqlite::types::Value;
use std::fmt::Debug;
use uuid::Uuid;

pub const ID_COLUMN: &str = "id";

/// Key type usable as a table id.
pub trait IdKey: Clone + Debug + Into<Value> + MaybeEmpty + Send + Sync + 'static {
    /// Produces a new unique key.
    fn generate() -> Self;
}

impl IdKey for String {
    fn generate() -> Self {
        Uuid::new_v4().simple().to_string()
    }
}

impl IdKey for i64 {
    fn generate() -> Self {
        rand::thread_rng().gen_range(1..i64::MAX)
    }
}

impl IdKey for Value {
    fn generate() -> Self {
        Value::Text(String::generate())
    }
}

/// Item carrying an optional id of type `K`.
pub trait Identifiable<K> {
    fn id(&self) -> Option<&K>;
    fn set_id(&mut self, id: K);
}

impl Identifiable<Value> for Row {
    fn id(&self) -> Option<&Value> {
        self.get(ID_COLUMN).filter(|value| !is_empty(*value))
    }

    fn set_id(&mut self, id: Value) {
        self.insert(ID_COLUMN, id);
    }
}

/// Values that may be "empty" under the short-circuit rule.
pub trait MaybeEmpty {
    fn is_empty_value(&self) -> bool;
}

/// Returns true for missing values and for objects without properties.
pub fn is_empty<T: MaybeEmpty + ?Sized>(value: &T) -> bool {
    value.is_empty_value()
}

impl<T: MaybeEmpty> MaybeEmpty for Option<T> {
    fn is_empty_value(&self) -> bool {
        match self {
            None => true,
            Some(value) => value.is_empty_value(),
        }
    }
}

impl<T: MaybeEmpty + ?Sized> MaybeEmpty for &T {
    fn is_empty_value(&self) -> bool {
        (**self).is_empty_value()
    }
}

impl MaybeEmpty for serde_json::Value {
    fn is_empty_value(&self) -> bool {
        match self {
            serde_json::Value::Null => true,
            serde_json::Value::Object(map) => map.is_empty(),
            serde_json::Value::Array(items) => items.is_empty(),
            _ => false,
        }
    }
}

impl MaybeEmpty for Value {
    fn is_empty_value(&self) -> bool {
        matches!(self, Value::Null)
    }
}

impl MaybeEmpty for Row {
    fn is_empty_value(&self) -> bool {
        self.is_empty()
    }
}

macro_rules! never_empty {
    ($($ty:ty),*) => {
        $(impl MaybeEmpty for $ty {
            fn is_empty_value(&self) -> bool {
                false
            }
        })*
    };
}

never_empty!(str, String, bool, i32, i64, u32, u64, f64);

#[cfg(test)]
mod tests {
    use super::{is_empty, IdKey, Identifiable};
    use crate::model::row::Row;
    use rusqlite::types::Value;
    use serde_json::json;

    #[test]
    fn only_missing_values_and_empty_objects_are_empty() {
        assert!(is_empty(&json!(null)));
        assert!(is_empty(&json!({})));
        assert!(is_empty(&None::<String>));
        assert!(is_empty(&Row::new()));

        assert!(!is_empty(&json!(0)));
        assert!(!is_empty(&json!("")));
        assert!(!is_empty(&json!(false)));
        assert!(!is_empty(&json!({ "key": "A" })));
        assert!(!is_empty(""));
        assert!(!is_empty(&0_i64));
        assert!(!is_empty(&Some(String::new())));
    }

    #[test]
    fn generated_string_ids_are_unique_hex() {
        let first = String::generate();
        let second = String::generate();
        assert_eq!(first.len(), 32);
        assert!(first.chars().all(|ch| ch.is_ascii_hexdigit()));
        assert_ne!(first, second);
    }

    #[test]
    fn generated_integer_ids_are_positive() {
        assert!(i64::generate() > 0);
    }

    #[test]
    fn row_id_ignores_null_column() {
        let mut row = Row::new().with("id", Value::Null).with("key", "A".to_string());
        assert!(row.id().is_none());

        row.set_id(Value::Text("1".to_string()));
        assert_eq!(row.id(), Some(&Value::Text("1".to_string())));
        assert_eq!(row.columns().collect::<Vec<_>>(), vec!["id", "key"]);
    }
}
