//! # BodyBuddy Sync
//!
//! Mirrors the remote exercise catalog into a [`bodybuddy_store::Store`].
//!
//! This crate provides:
//! - An entity registry naming each syncable kind, its endpoint and its
//!   local-to-remote attribute mapping
//! - A fetch loop that walks a paginated collection by its `next` links
//! - A merge that upserts each page by remote id in one atomic commit
//! - A sync engine that ties them together and reports progress
//!
//! ## Key Invariants
//!
//! - Page N+1 is requested only after page N was merged and committed
//! - Syncing the same data twice leaves the store unchanged
//! - A failure stops the sync; pages committed before it are kept
//! - Relationship attributes are never written
//!
//! ## Example
//!
//! ```rust,ignore
//! use bodybuddy_store::Store;
//! use bodybuddy_sync::{EntityKind, SyncConfig, SyncEngine};
//! use std::sync::Arc;
//!
//! let store = Arc::new(Store::open("catalog.bbj".as_ref())?);
//! let engine = SyncEngine::connect(store, SyncConfig::new(base_url, token))?;
//! let report = engine.sync(EntityKind::Exercise).await?;
//! println!("{} records in {} pages", report.fetch.records, report.fetch.pages);
//! ```

#![deny(unsafe_code)]
#![warn(missing_docs)]

mod config;
mod engine;
mod envelope;
mod error;
mod fetch;
mod http;
mod merge;
mod model;
mod registry;

pub use config::{SyncConfig, DEFAULT_BASE_URL};
pub use engine::{SyncEngine, SyncEvent, SyncReport, SyncState, SyncStats};
pub use envelope::{Page, RemoteRecord};
pub use error::{SyncError, SyncResult};
pub use fetch::{FetchSummary, PageFetcher};
pub use http::{HttpClient, HttpResponse, MockHttpClient, RecordedRequest, ReqwestClient};
pub use merge::{merge, merge_rows, MergeReport};
pub use model::{
    Attribute, AttributeKind, CatalogRow, Category, Exercise, FromJson, Language, Setter,
    ValueMismatch, WeightUnit,
};
pub use registry::{AttributeInfo, EntityKind, UnknownKind};
