//! Collection schema resolution.
//!
//! Decides which extraction pipeline applies to a package and opens the
//! collection database it will run against. Entry names are the primary
//! signal; when none of the known collection names is present, candidate
//! entries are opened and their tables inspected.

use serde::Serialize;

use crate::error::{DecodeError, Result};
use crate::frame::maybe_decompress;
use crate::io::ReadAt;
use crate::options::DecodeOptions;
use crate::proto::{PackageMetadata, PackageVersion, decode_config};
use crate::store::{SqliteStore, TabularStore};
use crate::zip::{Container, ZipFileEntry, is_media_index};

/// Zstd-framed collection with protobuf config blobs.
pub const MODERN_COLLECTION: &str = "collection.anki21b";
/// Legacy collection names, most preferred first.
pub const LEGACY_COLLECTIONS: [&str; 2] = ["collection.anki21", "collection.anki2"];

pub const MEDIA_ENTRY: &str = "media";
pub const META_ENTRY: &str = "meta";

const SQLITE_HEADER: &[u8] = b"SQLite format 3\0";

/// The two collection layouts a package can carry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum CollectionSchema {
    /// `col` row with JSON models and decks.
    Legacy,
    /// `notetypes`/`fields`/`templates` tables with protobuf configs.
    Modern,
}

/// Pick the schema from entry names alone.
///
/// Returns the schema together with the name of the entry holding the
/// collection, or `None` if no known collection name is present.
pub fn resolve_by_name(entries: &[ZipFileEntry]) -> Option<(CollectionSchema, &str)> {
    let find = |name: &str| {
        entries
            .iter()
            .find(|e| !e.is_directory && e.file_name == name)
            .map(|e| e.file_name.as_str())
    };

    if let Some(name) = find(MODERN_COLLECTION) {
        return Some((CollectionSchema::Modern, name));
    }
    LEGACY_COLLECTIONS
        .iter()
        .find_map(|candidate| find(candidate))
        .map(|name| (CollectionSchema::Legacy, name))
}

/// Pick the schema by inspecting the tables of an opened collection.
///
/// # Errors
///
/// Returns [`DecodeError::UnrecognizedCollection`] if the store has neither
/// a `notetypes` table nor both `notes` and `col`.
pub async fn resolve_by_store(store: &dyn TabularStore) -> Result<CollectionSchema> {
    let tables = store.table_names().await?;
    let has = |name: &str| tables.iter().any(|t| t == name);

    if has("notetypes") {
        Ok(CollectionSchema::Modern)
    } else if has("notes") && has("col") {
        Ok(CollectionSchema::Legacy)
    } else {
        log::debug!("Store tables do not identify a collection: {tables:?}");
        Err(DecodeError::UnrecognizedCollection)
    }
}

/// Resolve the schema of a package and open its collection.
///
/// The resolved store is returned open; the caller closes it once extraction
/// is finished.
///
/// # Errors
///
/// - [`DecodeError::UnrecognizedCollection`] if no entry holds a recognizable collection
/// - [`DecodeError::DecompressionError`] if the collection is a corrupt zstd frame
/// - [`DecodeError::Store`] if the collection cannot be opened as a database
pub async fn resolve<R: ReadAt>(
    container: &Container<R>,
    options: &DecodeOptions,
) -> Result<(CollectionSchema, SqliteStore)> {
    let declared = read_package_version(container).await;

    if let Some((schema, name)) = resolve_by_name(container.entries()) {
        log::debug!("Collection entry {name} selects the {schema:?} schema");
        cross_check(schema, declared);
        let bytes = maybe_decompress(container.read(name).await?)?;
        let store = SqliteStore::open(&bytes).await?;
        return Ok((schema, store));
    }

    for entry in container.entries() {
        if !is_probe_candidate(entry, options) {
            continue;
        }
        let bytes = maybe_decompress(container.read(&entry.file_name).await?)?;
        if !bytes.starts_with(SQLITE_HEADER) {
            continue;
        }

        let store = SqliteStore::open(&bytes).await?;
        match resolve_by_store(&store).await {
            Ok(schema) => {
                log::info!(
                    "Entry {} identified as a {schema:?} collection by its tables",
                    entry.file_name
                );
                cross_check(schema, declared);
                return Ok((schema, store));
            }
            Err(DecodeError::UnrecognizedCollection) => store.close().await,
            Err(e) => {
                store.close().await;
                return Err(e);
            }
        }
    }

    Err(DecodeError::UnrecognizedCollection)
}

fn is_probe_candidate(entry: &ZipFileEntry, options: &DecodeOptions) -> bool {
    if entry.is_directory || is_media_index(&entry.file_name) {
        return false;
    }
    if entry.file_name == MEDIA_ENTRY || entry.file_name == META_ENTRY {
        return false;
    }
    options
        .max_entry_size
        .is_none_or(|limit| entry.uncompressed_size <= limit)
}

/// Version declared by the `meta` entry, if present and readable.
async fn read_package_version<R: ReadAt>(container: &Container<R>) -> Option<PackageVersion> {
    if !container.contains(META_ENTRY) {
        return None;
    }
    let decoded = match container.read(META_ENTRY).await.and_then(maybe_decompress) {
        Ok(bytes) => decode_config::<PackageMetadata>(&bytes),
        Err(e) => Err(e),
    };
    match decoded {
        Ok(meta) => {
            let version = meta.version();
            log::debug!("Package declares version {version:?}");
            Some(version)
        }
        Err(e) => {
            log::warn!("Ignoring unreadable package metadata: {e}");
            None
        }
    }
}

fn cross_check(schema: CollectionSchema, declared: Option<PackageVersion>) {
    let expected = match declared {
        Some(PackageVersion::Latest) => CollectionSchema::Modern,
        Some(PackageVersion::Legacy1 | PackageVersion::Legacy2) => CollectionSchema::Legacy,
        Some(PackageVersion::Unknown) | None => return,
    };
    if expected != schema {
        log::warn!("Package metadata declares a {expected:?} collection but found {schema:?}");
    }
}
