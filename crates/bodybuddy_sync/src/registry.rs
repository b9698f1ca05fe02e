//! Entity kinds and their remote and local names.

use crate::model::{AttributeKind, CatalogRow, Category, Exercise, Language, WeightUnit};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

/// A kind of catalog entity that can be synced.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum EntityKind {
    /// Exercises, restricted to the catalog's default language.
    Exercise,
    /// Languages.
    Language,
    /// Weight units.
    WeightUnit,
    /// Exercise categories.
    Category,
}

/// Type-erased view of one attribute table entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AttributeInfo {
    /// Local attribute name.
    pub local: &'static str,
    /// Remote field name.
    pub remote: &'static str,
    /// Storage kind.
    pub kind: AttributeKind,
}

impl EntityKind {
    /// Every kind, in registry order.
    pub const ALL: [EntityKind; 4] = [
        EntityKind::Exercise,
        EntityKind::Language,
        EntityKind::WeightUnit,
        EntityKind::Category,
    ];

    /// Endpoint path relative to the API base URL.
    pub const fn endpoint(self) -> &'static str {
        match self {
            EntityKind::Exercise => "exercise?language=2",
            EntityKind::Language => "language",
            EntityKind::WeightUnit => "weightunit",
            EntityKind::Category => "exercisecategory",
        }
    }

    /// Name of the local table holding rows of this kind.
    pub const fn table(self) -> &'static str {
        match self {
            EntityKind::Exercise => "Exercise",
            EntityKind::Language => "Language",
            EntityKind::WeightUnit => "WeightUnit",
            EntityKind::Category => "Category",
        }
    }

    /// Every attribute of the kind with its kind of storage.
    pub fn attributes(self) -> Vec<AttributeInfo> {
        match self {
            EntityKind::Exercise => infos::<Exercise>(),
            EntityKind::Language => infos::<Language>(),
            EntityKind::WeightUnit => infos::<WeightUnit>(),
            EntityKind::Category => infos::<Category>(),
        }
    }

    /// `(local, remote)` name pairs of every attribute.
    pub fn attribute_map(self) -> Vec<(&'static str, &'static str)> {
        self.attributes()
            .into_iter()
            .map(|a| (a.local, a.remote))
            .collect()
    }

    /// Default sort attribute for listings.
    pub const fn default_sort(self) -> &'static str {
        match self {
            EntityKind::Language => "short_name",
            _ => "name",
        }
    }
}

fn infos<R: CatalogRow>() -> Vec<AttributeInfo> {
    R::attributes()
        .iter()
        .map(|a| AttributeInfo {
            local: a.local,
            remote: a.remote,
            kind: a.kind,
        })
        .collect()
}

impl fmt::Display for EntityKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.table())
    }
}

/// Error returned when parsing an unknown kind name.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("unknown entity kind `{0}` (expected exercise, language, weightunit or category)")]
pub struct UnknownKind(pub String);

impl FromStr for EntityKind {
    type Err = UnknownKind;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().replace(['-', '_'], "").as_str() {
            "exercise" | "exercises" => Ok(EntityKind::Exercise),
            "language" | "languages" => Ok(EntityKind::Language),
            "weightunit" | "weightunits" => Ok(EntityKind::WeightUnit),
            "category" | "categories" | "exercisecategory" => Ok(EntityKind::Category),
            _ => Err(UnknownKind(s.to_string())),
        }
    }
}
