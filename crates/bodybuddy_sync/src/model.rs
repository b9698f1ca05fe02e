//! Catalog row types and their attribute tables.
//!
//! Each row type lists its attributes once, in a static table. An entry
//! names the local attribute, the remote field it is read from and how the
//! JSON value is converted. Relationship attributes are declared so they
//! show up in the mapping, but carry no setter and are never written.

use crate::registry::EntityKind;
use bodybuddy_store::StoredRow;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;
use thiserror::Error;

/// Storage kind of an attribute.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AttributeKind {
    /// Signed integer.
    Integer,
    /// Floating point number.
    Float,
    /// UTF-8 text.
    Text,
    /// True or false.
    Boolean,
    /// Point in time, kept in the server's textual form.
    Timestamp,
    /// Link to rows of another kind. Not supported by the merge.
    Relationship,
}

impl fmt::Display for AttributeKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            AttributeKind::Integer => "integer",
            AttributeKind::Float => "float",
            AttributeKind::Text => "text",
            AttributeKind::Boolean => "boolean",
            AttributeKind::Timestamp => "timestamp",
            AttributeKind::Relationship => "relationship",
        };
        f.write_str(name)
    }
}

/// A JSON value that does not fit the attribute it was mapped to.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("expected {expected}, found {found}")]
pub struct ValueMismatch {
    /// Kind the attribute expects.
    pub expected: AttributeKind,
    /// JSON type that was found.
    pub found: &'static str,
}

/// Writes a converted JSON value into a row.
pub type Setter<R> = fn(&mut R, &Value) -> Result<(), ValueMismatch>;

/// One entry of a row type's attribute table.
pub struct Attribute<R> {
    /// Local attribute name.
    pub local: &'static str,
    /// Remote field name.
    pub remote: &'static str,
    /// Storage kind.
    pub kind: AttributeKind,
    setter: Option<Setter<R>>,
}

impl<R> Attribute<R> {
    /// An attribute copied from the remote field through `setter`.
    pub const fn value(
        local: &'static str,
        remote: &'static str,
        kind: AttributeKind,
        setter: Setter<R>,
    ) -> Self {
        Self {
            local,
            remote,
            kind,
            setter: Some(setter),
        }
    }

    /// A relationship attribute; declared, never written.
    pub const fn relationship(local: &'static str, remote: &'static str) -> Self {
        Self {
            local,
            remote,
            kind: AttributeKind::Relationship,
            setter: None,
        }
    }

    /// Returns false for attribute kinds the merge cannot write.
    pub fn is_supported(&self) -> bool {
        self.setter.is_some()
    }

    /// Writes `value` into `row`. Returns `Ok(false)` if the attribute is
    /// unsupported and nothing was written.
    ///
    /// # Errors
    ///
    /// Returns a [`ValueMismatch`] if the JSON type does not fit.
    pub fn apply(&self, row: &mut R, value: &Value) -> Result<bool, ValueMismatch> {
        match self.setter {
            Some(set) => set(row, value).map(|()| true),
            None => Ok(false),
        }
    }
}

impl<R> fmt::Debug for Attribute<R> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Attribute")
            .field("local", &self.local)
            .field("remote", &self.remote)
            .field("kind", &self.kind)
            .finish()
    }
}

/// Conversion from a JSON value into an optional attribute value.
///
/// `null` converts to `None`, which clears the attribute.
pub trait FromJson: Sized {
    /// Converts `value`, reporting the JSON type on mismatch.
    fn from_json(value: &Value) -> Result<Option<Self>, &'static str>;
}

pub(crate) fn json_type(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

impl FromJson for i64 {
    fn from_json(value: &Value) -> Result<Option<Self>, &'static str> {
        match value {
            Value::Null => Ok(None),
            Value::Number(n) => n.as_i64().map(Some).ok_or("non-integer number"),
            other => Err(json_type(other)),
        }
    }
}

impl FromJson for f64 {
    fn from_json(value: &Value) -> Result<Option<Self>, &'static str> {
        match value {
            Value::Null => Ok(None),
            Value::Number(n) => n.as_f64().map(Some).ok_or("number"),
            other => Err(json_type(other)),
        }
    }
}

impl FromJson for String {
    fn from_json(value: &Value) -> Result<Option<Self>, &'static str> {
        match value {
            Value::Null => Ok(None),
            Value::String(s) => Ok(Some(s.clone())),
            other => Err(json_type(other)),
        }
    }
}

impl FromJson for bool {
    fn from_json(value: &Value) -> Result<Option<Self>, &'static str> {
        match value {
            Value::Null => Ok(None),
            Value::Bool(b) => Ok(Some(*b)),
            other => Err(json_type(other)),
        }
    }
}

/// Checks that the remote `id` matches the row it is merged into.
fn identity<R: StoredRow>(row: &mut R, value: &Value) -> Result<(), ValueMismatch> {
    match value.as_i64() {
        Some(id) if id == row.remote_id() => Ok(()),
        _ => Err(ValueMismatch {
            expected: AttributeKind::Integer,
            found: json_type(value),
        }),
    }
}

impl<R: StoredRow> Attribute<R> {
    /// The `id` attribute, which is the row's key and never rewritten.
    pub const fn identity() -> Self {
        Self::value("id", "id", AttributeKind::Integer, identity::<R>)
    }
}

/// Builds a value attribute whose setter converts by the field's type.
macro_rules! attribute {
    ($row:ty, $field:ident <- $remote:expr, $kind:ident) => {
        Attribute::value(
            stringify!($field),
            $remote,
            AttributeKind::$kind,
            |row: &mut $row, value: &Value| {
                row.$field = FromJson::from_json(value).map_err(|found| ValueMismatch {
                    expected: AttributeKind::$kind,
                    found,
                })?;
                Ok(())
            },
        )
    };
    ($row:ty, $field:ident, $kind:ident) => {
        attribute!($row, $field <- stringify!($field), $kind)
    };
}

/// A row type synced from the remote catalog.
pub trait CatalogRow: StoredRow + PartialEq + fmt::Debug {
    /// Entity kind the row belongs to.
    const KIND: EntityKind;

    /// The attribute table, `id` first.
    fn attributes() -> &'static [Attribute<Self>];
}

/// An exercise of the catalog.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Exercise {
    /// Remote id.
    pub id: i64,
    /// Display name.
    pub name: Option<String>,
    /// Description, read from the remote `description` field.
    pub desc: Option<String>,
    /// Remote UUID.
    pub uuid: Option<String>,
    /// Creation timestamp as sent by the server.
    pub creation_date: Option<String>,
    /// Review status.
    pub status: Option<String>,
    /// Author named in the license.
    pub license_author: Option<String>,
}

impl StoredRow for Exercise {
    const TABLE: &'static str = "Exercise";

    fn remote_id(&self) -> i64 {
        self.id
    }

    fn with_remote_id(id: i64) -> Self {
        Self {
            id,
            name: None,
            desc: None,
            uuid: None,
            creation_date: None,
            status: None,
            license_author: None,
        }
    }
}

impl CatalogRow for Exercise {
    const KIND: EntityKind = EntityKind::Exercise;

    fn attributes() -> &'static [Attribute<Self>] {
        static ATTRIBUTES: [Attribute<Exercise>; 11] = [
            Attribute::identity(),
            attribute!(Exercise, name, Text),
            attribute!(Exercise, desc <- "description", Text),
            attribute!(Exercise, uuid, Text),
            attribute!(Exercise, creation_date, Timestamp),
            attribute!(Exercise, status, Text),
            attribute!(Exercise, license_author, Text),
            Attribute::relationship("category", "category"),
            Attribute::relationship("language", "language"),
            Attribute::relationship("muscles", "muscles"),
            Attribute::relationship("equipment", "equipment"),
        ];
        &ATTRIBUTES
    }
}

/// A language exercises can be described in.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Language {
    /// Remote id.
    pub id: i64,
    /// Short code, e.g. `de`.
    pub short_name: Option<String>,
    /// Full name, e.g. `Deutsch`.
    pub full_name: Option<String>,
}

impl StoredRow for Language {
    const TABLE: &'static str = "Language";

    fn remote_id(&self) -> i64 {
        self.id
    }

    fn with_remote_id(id: i64) -> Self {
        Self {
            id,
            short_name: None,
            full_name: None,
        }
    }
}

impl CatalogRow for Language {
    const KIND: EntityKind = EntityKind::Language;

    fn attributes() -> &'static [Attribute<Self>] {
        static ATTRIBUTES: [Attribute<Language>; 3] = [
            Attribute::identity(),
            attribute!(Language, short_name, Text),
            attribute!(Language, full_name, Text),
        ];
        &ATTRIBUTES
    }
}

/// A unit for logging weights.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WeightUnit {
    /// Remote id.
    pub id: i64,
    /// Unit name, e.g. `kg`.
    pub name: Option<String>,
}

impl StoredRow for WeightUnit {
    const TABLE: &'static str = "WeightUnit";

    fn remote_id(&self) -> i64 {
        self.id
    }

    fn with_remote_id(id: i64) -> Self {
        Self { id, name: None }
    }
}

impl CatalogRow for WeightUnit {
    const KIND: EntityKind = EntityKind::WeightUnit;

    fn attributes() -> &'static [Attribute<Self>] {
        static ATTRIBUTES: [Attribute<WeightUnit>; 2] =
            [Attribute::identity(), attribute!(WeightUnit, name, Text)];
        &ATTRIBUTES
    }
}

/// An exercise category, e.g. `Arms`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Category {
    /// Remote id.
    pub id: i64,
    /// Category name.
    pub name: Option<String>,
}

impl StoredRow for Category {
    const TABLE: &'static str = "Category";

    fn remote_id(&self) -> i64 {
        self.id
    }

    fn with_remote_id(id: i64) -> Self {
        Self { id, name: None }
    }
}

impl CatalogRow for Category {
    const KIND: EntityKind = EntityKind::Category;

    fn attributes() -> &'static [Attribute<Self>] {
        static ATTRIBUTES: [Attribute<Category>; 2] =
            [Attribute::identity(), attribute!(Category, name, Text)];
        &ATTRIBUTES
    }
}
