// Tuple and value representation
//
// Executors pass column values around as self-describing datums; on a
// page a tuple is nothing but the bincode image of its datum vector.

use std::cmp::Ordering;
use std::fmt;
use std::hash::{Hash, Hasher};

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// A single column value
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Datum {
    Null,
    Bool(bool),
    Int(i64),
    Double(f64),
    Str(String),
}

impl Datum {
    pub fn is_null(&self) -> bool {
        matches!(self, Datum::Null)
    }

    /// Predicate truthiness: only an actual true passes
    pub fn is_true(&self) -> bool {
        matches!(self, Datum::Bool(true))
    }

    // hash discriminant; variants must never share one
    fn tag(&self) -> u8 {
        match self {
            Datum::Null => b'n',
            Datum::Bool(_) => b'b',
            Datum::Int(_) => b'i',
            Datum::Double(_) => b'd',
            Datum::Str(_) => b's',
        }
    }

    // numeric view, promoting ints for mixed comparison
    fn as_double(&self) -> Option<f64> {
        match self {
            Datum::Int(i) => Some(*i as f64),
            Datum::Double(d) => Some(*d),
            _ => None,
        }
    }
}

impl Eq for Datum {}

impl Hash for Datum {
    fn hash<H: Hasher>(&self, state: &mut H) {
        state.write_u8(self.tag());
        match self {
            Datum::Null => {}
            Datum::Bool(b) => b.hash(state),
            Datum::Int(i) => i.hash(state),
            // bit pattern keeps NaN hashable; grouping treats each NaN
            // encoding as its own key
            Datum::Double(d) => state.write_u64(d.to_bits()),
            Datum::Str(s) => s.hash(state),
        }
    }
}

impl PartialOrd for Datum {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        match (self, other) {
            // nothing compares against NULL
            (Datum::Null, _) | (_, Datum::Null) => None,
            (Datum::Bool(a), Datum::Bool(b)) => a.partial_cmp(b),
            (Datum::Str(a), Datum::Str(b)) => a.partial_cmp(b),
            (Datum::Int(a), Datum::Int(b)) => a.partial_cmp(b),
            _ => match (self.as_double(), other.as_double()) {
                (Some(a), Some(b)) => a.partial_cmp(&b),
                _ => None,
            },
        }
    }
}

impl fmt::Display for Datum {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Datum::Null => f.write_str("NULL"),
            Datum::Bool(b) => write!(f, "{}", b),
            Datum::Int(i) => write!(f, "{}", i),
            Datum::Double(d) => write!(f, "{}", d),
            Datum::Str(s) => write!(f, "'{}'", s),
        }
    }
}

#[derive(Error, Debug)]
pub enum TupleError {
    #[error("Failed to encode tuple: {0}")]
    EncodeError(String),
    #[error("Failed to decode tuple: {0}")]
    DecodeError(String),
}

/// A row of values, positionally addressed. The schema lives in the
/// catalog; tuples themselves are schema-free.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Tuple {
    values: Vec<Datum>,
}

impl Tuple {
    pub fn new(values: Vec<Datum>) -> Self {
        Self { values }
    }

    pub fn empty() -> Self {
        Self { values: Vec::new() }
    }

    pub fn value(&self, idx: usize) -> Option<&Datum> {
        self.values.get(idx)
    }

    pub fn values(&self) -> &[Datum] {
        &self.values
    }

    pub fn arity(&self) -> usize {
        self.values.len()
    }

    /// Project the columns named by `key_attrs` into an index key tuple
    pub fn key_from_tuple(&self, key_attrs: &[usize]) -> Tuple {
        let values = key_attrs
            .iter()
            .map(|&i| self.values.get(i).cloned().unwrap_or(Datum::Null))
            .collect();
        Tuple::new(values)
    }

    /// Concatenate two tuples (used by the join operators)
    pub fn join(&self, other: &Tuple) -> Tuple {
        let mut values = self.values.clone();
        values.extend(other.values.iter().cloned());
        Tuple::new(values)
    }

    pub fn to_bytes(&self) -> Result<Vec<u8>, TupleError> {
        bincode::serialize(&self.values).map_err(|e| TupleError::EncodeError(e.to_string()))
    }

    pub fn from_bytes(bytes: &[u8]) -> Result<Self, TupleError> {
        let values =
            bincode::deserialize(bytes).map_err(|e| TupleError::DecodeError(e.to_string()))?;
        Ok(Self { values })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::hash_map::DefaultHasher;

    fn hash_of(datum: &Datum) -> u64 {
        let mut hasher = DefaultHasher::new();
        datum.hash(&mut hasher);
        hasher.finish()
    }

    #[test]
    fn test_roundtrip_through_bytes() {
        let tuple = Tuple::new(vec![
            Datum::Int(42),
            Datum::Str("hello".to_string()),
            Datum::Null,
            Datum::Bool(true),
            Datum::Double(2.5),
        ]);
        let bytes = tuple.to_bytes().unwrap();
        assert_eq!(Tuple::from_bytes(&bytes).unwrap(), tuple);
    }

    #[test]
    fn test_key_projection() {
        let tuple = Tuple::new(vec![
            Datum::Int(1),
            Datum::Str("a".to_string()),
            Datum::Int(9),
        ]);
        let key = tuple.key_from_tuple(&[2, 0]);
        assert_eq!(key.values(), &[Datum::Int(9), Datum::Int(1)]);
    }

    #[test]
    fn test_mixed_numeric_comparison() {
        assert!(Datum::Int(2) < Datum::Double(2.5));
        assert!(Datum::Double(1.5) < Datum::Int(2));
        assert!(Datum::Null.partial_cmp(&Datum::Int(1)).is_none());
        assert!(Datum::Int(1).partial_cmp(&Datum::Str("1".into())).is_none());
    }

    #[test]
    fn test_hash_separates_variants() {
        // equal payloads of different types must not collide
        assert_ne!(hash_of(&Datum::Int(1)), hash_of(&Datum::Bool(true)));
        assert_ne!(hash_of(&Datum::Int(0)), hash_of(&Datum::Null));
        assert_eq!(hash_of(&Datum::Int(7)), hash_of(&Datum::Int(7)));
    }
}
