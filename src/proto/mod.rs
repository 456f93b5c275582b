//! Protocol Buffers decoding.
//!
//! Two strategies share the same wire primitives in [`wire`]:
//!
//! - [`config`]: schema-driven decoding (via `prost`) of the notetype, field
//!   and template configuration blobs, plus package metadata.
//! - [`manifest`]: a hand-written walk of the media manifest, for which no
//!   schema is available.

pub mod config;
pub mod manifest;
pub mod wire;

pub use config::{
    ConfigBlob, FieldConfig, NotetypeConfig, NotetypeKind, PackageMetadata, PackageVersion,
    TemplateConfig, decode_config,
};
pub use manifest::{MediaManifestEntry, decode_media_manifest};
