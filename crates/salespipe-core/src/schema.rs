//! Expected column types
//!
//! A [`Schema`] maps column names to [`DataType`]s, keeping declaration
//! order. It is built once at startup and never mutated.

use serde::de::{MapAccess, Visitor};
use serde::ser::SerializeMap;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;

use crate::table::DataType;

/// Ordered mapping from column name to expected type
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Schema {
    fields: Vec<(String, DataType)>,
}

impl Schema {
    /// Build a schema from `(name, type)` pairs.
    ///
    /// A repeated name keeps its first position and takes the last type.
    pub fn new<I, S>(fields: I) -> Self
    where
        I: IntoIterator<Item = (S, DataType)>,
        S: Into<String>,
    {
        let mut schema = Self::default();
        for (name, dtype) in fields {
            let name = name.into();
            match schema.fields.iter_mut().find(|(n, _)| *n == name) {
                Some(slot) => slot.1 = dtype,
                None => schema.fields.push((name, dtype)),
            }
        }
        schema
    }

    /// The schema of the coffee-sales export the pipeline was built for
    pub fn coffee_sales() -> Self {
        Self::new([
            ("date", DataType::Str),
            ("datetime", DataType::DateTime),
            ("cash_type", DataType::Str),
            ("card", DataType::Str),
            ("money", DataType::Float64),
            ("coffee_name", DataType::Str),
        ])
    }

    /// Expected type of a column
    pub fn get(&self, name: &str) -> Option<DataType> {
        self.fields
            .iter()
            .find(|(n, _)| n == name)
            .map(|(_, dtype)| *dtype)
    }

    /// Column names in declaration order
    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.fields.iter().map(|(n, _)| n.as_str())
    }

    /// `(name, type)` pairs in declaration order
    pub fn iter(&self) -> impl Iterator<Item = (&str, DataType)> {
        self.fields.iter().map(|(n, t)| (n.as_str(), *t))
    }

    /// Number of columns
    pub fn len(&self) -> usize {
        self.fields.len()
    }

    /// Whether no columns are expected
    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }
}

impl Serialize for Schema {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.fields.len()))?;
        for (name, dtype) in &self.fields {
            map.serialize_entry(name, dtype)?;
        }
        map.end()
    }
}

struct SchemaVisitor;

impl<'de> Visitor<'de> for SchemaVisitor {
    type Value = Schema;

    fn expecting(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("a mapping of column names to data types")
    }

    fn visit_map<A: MapAccess<'de>>(self, mut access: A) -> Result<Schema, A::Error> {
        let mut fields = Vec::with_capacity(access.size_hint().unwrap_or(0));
        while let Some((name, dtype)) = access.next_entry::<String, DataType>()? {
            fields.push((name, dtype));
        }
        Ok(Schema::new(fields))
    }
}

impl<'de> Deserialize<'de> for Schema {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        deserializer.deserialize_map(SchemaVisitor)
    }
}
