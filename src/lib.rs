//! # apkg-decode
//!
//! A decoder for exported Anki flashcard packages (`.apkg`).
//!
//! A package is a ZIP archive holding a collection database, a media
//! manifest and numbered media payloads. Three generations of the format are
//! in circulation, and all of them decode through the same entry point:
//!
//! - `collection.anki2` / `collection.anki21`: a flat schema whose models and
//!   decks are JSON objects in the `col` row
//! - `collection.anki21b`: a zstd-framed, normalized schema whose notetype,
//!   field and template settings are protobuf blobs
//!
//! ## Features
//!
//! - STORED and DEFLATE entries, ZIP64 archives, CRC-32 verification
//! - Transparent Zstandard decompression of the collection, manifest and media
//! - JSON and protobuf media manifests, with a missing/unreferenced report
//! - Per-deck card and template counts and a package display name
//!
//! ## Example
//!
//! ```no_run
//! use apkg_decode::{DecodeOptions, decode_with};
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let bytes = std::fs::read("Spanish.apkg")?;
//!     let options = DecodeOptions {
//!         media_concurrency: 8,
//!         ..Default::default()
//!     };
//!     let package = decode_with(bytes, &options).await?;
//!
//!     for card in &package.cards {
//!         for (field, value) in card.values.iter() {
//!             println!("{field}: {}", value.unwrap_or("<empty>"));
//!         }
//!     }
//!     for name in package.media_files.keys() {
//!         println!("media: {name}");
//!     }
//!
//!     Ok(())
//! }
//! ```

pub mod deck;
pub mod error;
pub mod extract;
pub mod frame;
pub mod io;
pub mod media;
pub mod options;
pub mod package;
pub mod proto;
pub mod schema;
pub mod store;
pub mod zip;

pub use deck::{DeckInfo, DeckSummary};
pub use error::{DecodeError, Result};
pub use extract::{Card, Deck, Field, FieldValues, ModelKind, Notetype, Template};
pub use io::{MemoryReader, ReadAt};
pub use media::{MediaFile, MediaReport};
pub use options::DecodeOptions;
pub use package::{AnkiPackage, decode, decode_with};
pub use proto::MediaManifestEntry;
pub use schema::CollectionSchema;
pub use store::{SqliteStore, TabularStore};
pub use zip::{Container, ZipFileEntry};
