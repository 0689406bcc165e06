//! tabsync core library: domain types, property codec, config, errors.
//!
//! Public API surface:
//! - [`types`]: records, rows, property types/values, schemas
//! - [`codec`]: per-type `encode` / `decode`
//! - [`config`]: [`SyncConfig`] load / validate / template
//! - [`remote`]: [`RecordStore`] and [`SheetStore`] collaborator traits
//! - [`error`]: [`CodecError`], [`ConfigError`], [`RemoteError`]

pub mod codec;
pub mod config;
pub mod error;
pub mod remote;
pub mod types;

pub use config::SyncConfig;
pub use error::{CodecError, ConfigError, RemoteError};
pub use remote::{RecordStore, SheetStore};
pub use types::{
    Properties, PropertySchema, PropertyType, PropertyValue, Record, RecordId, Row, RowNumber,
    SheetSchema,
};
