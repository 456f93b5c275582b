//! The end-to-end decode pipeline.

use std::collections::BTreeMap;
use std::sync::Arc;

use serde::Serialize;

use crate::deck::{self, DeckInfo};
use crate::error::Result;
use crate::extract::{self, Card, Deck, Extraction, Notetype};
use crate::media::{self, MediaFile, MediaReport, MediaResolution};
use crate::options::DecodeOptions;
use crate::schema::{self, CollectionSchema, MEDIA_ENTRY};
use crate::zip::Container;

/// A fully decoded package.
#[derive(Debug, Clone, Serialize)]
pub struct AnkiPackage {
    pub schema: CollectionSchema,
    pub cards: Vec<Card>,
    /// `None` for legacy collections; their cards carry templates inline.
    pub notetypes: Option<Vec<Notetype>>,
    /// Decks keyed by id.
    pub decks: BTreeMap<String, Deck>,
    pub deck_name: String,
    pub deck_info: DeckInfo,
    /// Media keyed by filename. Empty when media resolution is disabled.
    pub media_files: BTreeMap<String, MediaFile>,
    pub media_report: MediaReport,
}

/// Decode a package with default options.
///
/// ```no_run
/// # async fn run(bytes: Vec<u8>) -> apkg_decode::Result<()> {
/// let package = apkg_decode::decode(bytes).await?;
/// println!("{}: {} notes", package.deck_name, package.cards.len());
/// # Ok(())
/// # }
/// ```
pub async fn decode(bytes: impl Into<Arc<[u8]>>) -> Result<AnkiPackage> {
    decode_with(bytes, &DecodeOptions::default()).await
}

/// Decode a package.
///
/// Either a complete [`AnkiPackage`] is returned or the first error
/// encountered; nothing partial is exposed.
pub async fn decode_with(
    bytes: impl Into<Arc<[u8]>>,
    options: &DecodeOptions,
) -> Result<AnkiPackage> {
    let container = Arc::new(
        Container::open_with(bytes, options.max_entry_size, options.verify_crc).await?,
    );

    let (schema, store) = schema::resolve(container.as_ref(), options).await?;
    let extracted = match schema {
        CollectionSchema::Legacy => extract::legacy::extract(&store).await,
        CollectionSchema::Modern => extract::modern::extract(&store).await,
    };
    store.close().await;
    let Extraction {
        cards,
        notetypes,
        decks,
    } = extracted?;

    let MediaResolution { files, report } = if options.resolve_media {
        let manifest = if container.contains(MEDIA_ENTRY) {
            container.read(MEDIA_ENTRY).await?
        } else {
            log::debug!("Package has no media manifest");
            Vec::new()
        };
        media::resolve(Arc::clone(&container), manifest, options).await?
    } else {
        MediaResolution::default()
    };

    let deck_info = deck::assemble(&cards, &decks);
    log::info!(
        "Decoded {schema:?} package {:?}: {} notes, {} decks, {} media files",
        deck_info.display_name,
        cards.len(),
        decks.len(),
        files.len()
    );

    Ok(AnkiPackage {
        schema,
        cards,
        notetypes,
        decks,
        deck_name: deck_info.display_name.clone(),
        deck_info,
        media_files: files,
        media_report: report,
    })
}
