//! Ordered column schema

use serde::{Deserialize, Serialize};

use crate::data::DataType;

/// Column definition: name + logical type
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Field {
    pub name: String,
    pub data_type: DataType,
}

/// Ordered list of fields.
///
/// Name uniqueness is assumed by callers, not enforced here: lookups
/// return the first match and behavior on duplicates beyond that is
/// unspecified.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct Schema {
    fields: Vec<Field>,
}

impl Schema {
    pub fn new() -> Self {
        Self { fields: Vec::new() }
    }

    pub fn from_fields(fields: Vec<Field>) -> Self {
        Self { fields }
    }

    pub fn push(&mut self, name: impl Into<String>, data_type: DataType) {
        self.fields.push(Field {
            name: name.into(),
            data_type,
        });
    }

    pub fn fields(&self) -> &[Field] {
        &self.fields
    }

    pub fn len(&self) -> usize {
        self.fields.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    pub fn field(&self, index: usize) -> &Field {
        &self.fields[index]
    }

    /// Index of the first field with this name
    pub fn index_of(&self, name: &str) -> Option<usize> {
        self.fields.iter().position(|f| f.name == name)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.index_of(name).is_some()
    }

    pub fn names(&self) -> Vec<&str> {
        self.fields.iter().map(|f| f.name.as_str()).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_first_match_on_duplicates() {
        let mut schema = Schema::new();
        schema.push("x", DataType::Int64);
        schema.push("y", DataType::Float64);
        schema.push("x", DataType::Utf8);
        assert_eq!(schema.index_of("x"), Some(0));
        assert_eq!(schema.index_of("y"), Some(1));
        assert_eq!(schema.index_of("z"), None);
    }
}
