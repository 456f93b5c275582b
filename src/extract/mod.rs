//! Collection extraction.
//!
//! Both schema generations are projected onto the same canonical model:
//! one [`Card`] per note, carrying its field values keyed by field name, its
//! tags, the full ordered template list of its notetype, and its deck.
//!
//! - [`legacy`]: the single `col` row with JSON model/deck definitions.
//! - [`modern`]: the normalized `notetypes`/`fields`/`templates` tables with
//!   protobuf config blobs.

pub mod legacy;
pub mod modern;

use std::collections::{BTreeMap, HashMap};

use serde::Serialize;
use serde::ser::SerializeMap;

use crate::error::Result;
use crate::proto::NotetypeKind;
use crate::store::TabularStore;

/// Separates field values in `notes.flds`, and deck path components in modern deck names.
pub const FIELD_SEPARATOR: char = '\u{1f}';

/// Separates deck path components in display names.
pub const DECK_SEPARATOR: &str = "::";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
pub enum ModelKind {
    #[default]
    Normal,
    Cloze,
}

impl From<NotetypeKind> for ModelKind {
    fn from(kind: NotetypeKind) -> Self {
        match kind {
            NotetypeKind::Normal => ModelKind::Normal,
            NotetypeKind::Cloze => ModelKind::Cloze,
        }
    }
}

impl ModelKind {
    /// Legacy JSON `type`: 1 is cloze, anything else standard.
    pub fn from_legacy(value: i64) -> Self {
        if value == 1 {
            ModelKind::Cloze
        } else {
            ModelKind::Normal
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Notetype {
    pub id: String,
    pub name: String,
    pub css: String,
    pub latex_pre: String,
    pub latex_post: String,
    pub kind: ModelKind,
    pub latex_svg: bool,
}

/// Editor presentation settings of a field.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize)]
pub struct FontConfig {
    pub font_name: String,
    pub font_size: u32,
    pub rtl: bool,
    pub sticky: bool,
    pub plain_text: bool,
    pub description: String,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Field {
    pub notetype_id: String,
    pub ordinal: u32,
    pub name: String,
    pub font: FontConfig,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Template {
    pub notetype_id: String,
    pub ordinal: u32,
    pub name: String,
    pub question_format: String,
    pub answer_format: String,
}

/// Field values of a note in notetype field order.
///
/// Every field of the notetype is present; a field with no raw value is `None`.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct FieldValues(Vec<(String, Option<String>)>);

impl FieldValues {
    /// Pair `names` positionally with the 0x1F-separated values in `flds`.
    pub fn from_flds(names: &[String], flds: &str) -> Self {
        let mut raw = split_fields(flds).into_iter();
        let values = names
            .iter()
            .map(|name| (name.clone(), raw.next().map(str::to_string)))
            .collect();
        let extra = raw.count();
        if extra > 0 {
            log::debug!("Dropping {extra} field values beyond the notetype's field count");
        }
        Self(values)
    }

    /// `None` if the notetype has no such field, `Some(None)` if the field is unfilled.
    pub fn get(&self, name: &str) -> Option<Option<&str>> {
        self.0
            .iter()
            .find(|(n, _)| n == name)
            .map(|(_, v)| v.as_deref())
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, Option<&str>)> {
        self.0.iter().map(|(n, v)| (n.as_str(), v.as_deref()))
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.0.iter().map(|(n, _)| n.as_str())
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl Serialize for FieldValues {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.0.len()))?;
        for (name, value) in &self.0 {
            map.serialize_entry(name, value)?;
        }
        map.end()
    }
}

/// A note projected for rendering.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Card {
    pub note_id: String,
    pub notetype_id: String,
    pub values: FieldValues,
    pub tags: Vec<String>,
    pub templates: Vec<Template>,
    pub deck_name: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Deck {
    pub id: String,
    pub name: String,
}

/// Output of either extractor.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Extraction {
    pub cards: Vec<Card>,
    /// `None` for legacy collections, whose cards carry their templates inline.
    pub notetypes: Option<Vec<Notetype>>,
    pub decks: BTreeMap<String, Deck>,
}

pub fn split_fields(flds: &str) -> Vec<&str> {
    flds.split(FIELD_SEPARATOR).collect()
}

/// Split a tag string on 0x1F and whitespace, dropping empty pieces.
pub fn split_tags(tags: &str) -> Vec<String> {
    tags.split(|c: char| c == FIELD_SEPARATOR || c.is_whitespace())
        .filter(|t| !t.is_empty())
        .map(str::to_string)
        .collect()
}

/// Convert a stored deck name to `::`-separated display form.
pub fn normalize_deck_name(name: &str) -> String {
    name.split(FIELD_SEPARATOR).collect::<Vec<_>>().join(DECK_SEPARATOR)
}

/// Deck name of each note: the deck of its lowest-ordinal card.
pub(crate) async fn note_decks(
    store: &dyn TabularStore,
    decks: &BTreeMap<String, Deck>,
) -> Result<HashMap<i64, String>> {
    let mut out = HashMap::new();
    if !store.has_table("cards").await? {
        return Ok(out);
    }
    let rows = store
        .query("SELECT nid, did FROM cards ORDER BY nid, ord")
        .await?;
    for row in &rows {
        let nid = row.int(0)?;
        if out.contains_key(&nid) {
            continue;
        }
        let did = row.int(1)?.to_string();
        match decks.get(&did) {
            Some(deck) => {
                out.insert(nid, deck.name.clone());
            }
            None => log::debug!("Card of note {nid} references unknown deck {did}"),
        }
    }
    Ok(out)
}
