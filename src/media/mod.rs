//! Media resolution.
//!
//! Media payloads are stored under numbered archive entries (`"0"`, `"1"`,
//! ...) and the `media` entry maps those numbers back to filenames. The
//! manifest is JSON in older packages and protobuf in newer ones.
//!
//! Disagreement between manifest and archive is not an error: entries the
//! manifest names but the archive lacks are reported as missing, numbered
//! entries the manifest never mentions are reported as unreferenced.

mod mime;

pub use mime::{OCTET_STREAM, content_type_for};

use std::collections::{BTreeMap, HashSet};
use std::sync::Arc;

use serde::Serialize;
use tokio::sync::Semaphore;
use tokio::task::JoinSet;

use crate::error::{DecodeError, Result};
use crate::frame::maybe_decompress;
use crate::io::ReadAt;
use crate::options::DecodeOptions;
use crate::proto::{MediaManifestEntry, decode_media_manifest};
use crate::zip::{Container, is_media_index};

/// A resolved media file.
///
/// Cloning is cheap: the payload is shared, never copied.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct MediaFile {
    pub filename: String,
    pub content_type: &'static str,
    #[serde(skip)]
    pub data: Arc<[u8]>,
}

impl MediaFile {
    pub fn new(filename: impl Into<String>, data: impl Into<Arc<[u8]>>) -> Self {
        let filename = filename.into();
        Self {
            content_type: content_type_for(&filename),
            filename,
            data: data.into(),
        }
    }

    pub fn bytes(&self) -> &[u8] {
        &self.data
    }

    pub fn len(&self) -> usize {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }
}

/// Manifest/archive reconciliation.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct MediaReport {
    /// Manifest entries whose numbered archive entry does not exist.
    pub missing: Vec<MediaManifestEntry>,
    /// Numbered archive entries absent from the manifest.
    pub unreferenced: Vec<String>,
}

impl MediaReport {
    pub fn is_clean(&self) -> bool {
        self.missing.is_empty() && self.unreferenced.is_empty()
    }
}

#[derive(Debug, Clone, Default)]
pub struct MediaResolution {
    /// Resolved files keyed by filename.
    pub files: BTreeMap<String, MediaFile>,
    pub report: MediaReport,
}

/// Decode a media manifest, JSON first, protobuf second.
///
/// An empty buffer is an empty manifest. Entries come back sorted by
/// numeric index.
///
/// # Errors
///
/// Returns [`DecodeError::MalformedMediaManifest`] if the buffer is JSON with
/// a non-numeric key, or is neither JSON nor a decodable protobuf manifest.
pub fn parse_manifest(bytes: &[u8]) -> Result<Vec<MediaManifestEntry>> {
    if bytes.iter().all(u8::is_ascii_whitespace) {
        return Ok(Vec::new());
    }

    match serde_json::from_slice::<BTreeMap<String, String>>(bytes) {
        Ok(map) => {
            let mut entries = Vec::with_capacity(map.len());
            for (index, filename) in map {
                if !is_media_index(&index) {
                    return Err(DecodeError::MalformedMediaManifest(format!(
                        "key {index:?} is not a media index"
                    )));
                }
                entries.push(MediaManifestEntry::new(index, filename));
            }
            entries.sort_by(|a, b| {
                (a.index.len(), &a.index).cmp(&(b.index.len(), &b.index))
            });
            log::debug!("Decoded JSON media manifest with {} entries", entries.len());
            Ok(entries)
        }
        Err(json_err) => {
            log::trace!("Media manifest is not JSON ({json_err}), trying protobuf");
            decode_media_manifest(bytes)
        }
    }
}

/// Resolve every manifest entry against the archive.
///
/// Payloads are read and decompressed concurrently, at most
/// `options.media_concurrency` at a time.
///
/// # Errors
///
/// - [`DecodeError::MalformedMediaManifest`] if the manifest cannot be decoded
/// - [`DecodeError::DecompressionError`] if a payload is a corrupt zstd frame
/// - any container error raised while reading a payload
pub async fn resolve<R: ReadAt + 'static>(
    container: Arc<Container<R>>,
    manifest_bytes: Vec<u8>,
    options: &DecodeOptions,
) -> Result<MediaResolution> {
    let manifest = parse_manifest(&maybe_decompress(manifest_bytes)?)?;
    let mut report = MediaReport::default();

    let referenced: HashSet<&str> = manifest.iter().map(|e| e.index.as_str()).collect();
    report.unreferenced = container
        .entries()
        .iter()
        .filter(|e| e.is_numbered() && !referenced.contains(e.file_name.as_str()))
        .map(|e| e.file_name.clone())
        .collect();
    report
        .unreferenced
        .sort_by(|a, b| (a.len(), a).cmp(&(b.len(), b)));

    let semaphore = Arc::new(Semaphore::new(options.media_concurrency.max(1)));
    let mut tasks = JoinSet::new();
    for entry in manifest {
        if !container.entry(&entry.index).is_some_and(|e| e.is_numbered()) {
            log::warn!(
                "Media {:?} is listed as entry {} which the archive lacks",
                entry.filename,
                entry.index
            );
            report.missing.push(entry);
            continue;
        }

        let container = Arc::clone(&container);
        let semaphore = Arc::clone(&semaphore);
        tasks.spawn(async move {
            let _permit = semaphore
                .acquire_owned()
                .await
                .map_err(|e| DecodeError::Io(std::io::Error::other(e)))?;
            let data = maybe_decompress(container.read(&entry.index).await?)?;
            Ok::<_, DecodeError>((entry, data))
        });
    }

    let mut files = BTreeMap::new();
    while let Some(joined) = tasks.join_next().await {
        let (entry, data) = joined??;
        log::trace!("Resolved media {} ({} bytes)", entry.filename, data.len());
        let file = MediaFile::new(entry.filename.clone(), data);
        if files.insert(entry.filename.clone(), file).is_some() {
            log::warn!("Media filename {:?} appears more than once", entry.filename);
        }
    }

    for entry in &report.unreferenced {
        log::warn!("Archive entry {entry} is not listed in the media manifest");
    }
    log::info!(
        "Resolved {} media files ({} missing, {} unreferenced)",
        files.len(),
        report.missing.len(),
        report.unreferenced.len()
    );
    Ok(MediaResolution { files, report })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn json_manifest_sorts_numerically() {
        let entries = parse_manifest(br#"{"10":"k.png","2":"b.png","0":"a.png"}"#).unwrap();
        let indices: Vec<_> = entries.iter().map(|e| e.index.as_str()).collect();
        assert_eq!(indices, vec!["0", "2", "10"]);
        assert_eq!(entries[1].filename, "b.png");
    }

    #[test]
    fn empty_manifests_are_valid() {
        assert!(parse_manifest(b"").unwrap().is_empty());
        assert!(parse_manifest(b"{}").unwrap().is_empty());
    }

    #[test]
    fn non_numeric_json_key_is_rejected() {
        assert!(matches!(
            parse_manifest(br#"{"cover":"x.png"}"#),
            Err(DecodeError::MalformedMediaManifest(_))
        ));
    }

    #[test]
    fn protobuf_is_the_fallback() {
        let buf = [0x0A, 0x07, 0x0A, 0x05, b'a', b'.', b'm', b'p', b'3'];
        assert_eq!(
            parse_manifest(&buf).unwrap(),
            vec![MediaManifestEntry::new("0", "a.mp3")]
        );
    }

    #[test]
    fn garbage_is_malformed() {
        assert!(matches!(
            parse_manifest(b"{not json"),
            Err(DecodeError::MalformedMediaManifest(_))
        ));
    }

    #[test]
    fn media_file_shares_its_payload() {
        let file = MediaFile::new("x.PNG", b"\x89PNG".to_vec());
        let copy = file.clone();
        assert_eq!(copy.content_type, "image/png");
        assert!(Arc::ptr_eq(&file.data, &copy.data));
        assert_eq!(copy.len(), 4);
    }
}
