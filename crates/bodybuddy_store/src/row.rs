//! Typed rows and their on-disk encoding.

use crate::error::{StoreError, StoreResult};
use serde::de::DeserializeOwned;
use serde::Serialize;

/// A type that can be stored as a row of a table.
///
/// Every row carries a stable remote identifier; the store keeps a unique
/// index on it per table, so at most one row exists per remote id.
///
/// # Example
///
/// ```rust
/// use bodybuddy_store::StoredRow;
/// use serde::{Deserialize, Serialize};
///
/// #[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
/// struct Unit {
///     id: i64,
///     name: Option<String>,
/// }
///
/// impl StoredRow for Unit {
///     const TABLE: &'static str = "Unit";
///
///     fn remote_id(&self) -> i64 {
///         self.id
///     }
///
///     fn with_remote_id(id: i64) -> Self {
///         Self { id, name: None }
///     }
/// }
/// ```
pub trait StoredRow: Serialize + DeserializeOwned + Clone + Send + Sync + 'static {
    /// Name of the table holding rows of this type.
    const TABLE: &'static str;

    /// Returns the stable remote identifier of the row.
    fn remote_id(&self) -> i64;

    /// Creates a row with default attribute values for a remote id.
    fn with_remote_id(id: i64) -> Self;
}

/// Encodes a row to CBOR bytes.
pub(crate) fn encode_row<T: StoredRow>(row: &T) -> StoreResult<Vec<u8>> {
    let mut bytes = Vec::new();
    ciborium::into_writer(row, &mut bytes).map_err(StoreError::codec)?;
    Ok(bytes)
}

/// Decodes a row from CBOR bytes.
pub fn decode_row<T: StoredRow>(bytes: &[u8]) -> StoreResult<T> {
    ciborium::from_reader(bytes).map_err(|e| {
        StoreError::codec(format!("cannot decode {} row: {e}", T::TABLE))
    })
}
