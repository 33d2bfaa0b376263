//! Index key patterns.

use serde::{Deserialize, Serialize};

/// One component of an index key pattern: a field name and its sort
/// sign (+1 ascending, -1 descending).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct KeyPatternField {
    /// Field name
    pub name: String,
    /// Sort sign, normalized to +1 or -1
    pub sign: i32,
}

/// An ordered list of (field, sign) components describing an index's
/// sort order, e.g. `{a: +1, b: -1}`.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct KeyPattern {
    fields: Vec<KeyPatternField>,
}

impl KeyPattern {
    /// Creates a key pattern from (name, sign) pairs.
    ///
    /// Signs are normalized: any nonnegative sign becomes +1, any
    /// negative sign becomes -1.
    pub fn new<N: Into<String>>(fields: impl IntoIterator<Item = (N, i32)>) -> Self {
        Self {
            fields: fields
                .into_iter()
                .map(|(name, sign)| KeyPatternField {
                    name: name.into(),
                    sign: if sign >= 0 { 1 } else { -1 },
                })
                .collect(),
        }
    }

    /// Creates an all-ascending pattern from field names.
    pub fn ascending<N: Into<String>>(names: impl IntoIterator<Item = N>) -> Self {
        Self::new(names.into_iter().map(|n| (n, 1)))
    }

    /// Returns the components in index order
    pub fn fields(&self) -> &[KeyPatternField] {
        &self.fields
    }

    /// Returns the number of components
    pub fn len(&self) -> usize {
        self.fields.len()
    }

    /// Returns true if the pattern has no components
    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    /// Returns true if the pattern names the given field
    pub fn contains(&self, name: &str) -> bool {
        self.fields.iter().any(|f| f.name == name)
    }

    /// Iterates over the component field names
    pub fn field_names(&self) -> impl Iterator<Item = &str> {
        self.fields.iter().map(|f| f.name.as_str())
    }
}
