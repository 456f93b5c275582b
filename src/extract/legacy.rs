//! Extraction from legacy collections (`collection.anki2` / `collection.anki21`).
//!
//! Models and decks live as JSON objects in the single `col` row; notes
//! reference their model by `mid`.

use std::collections::{BTreeMap, HashMap};

use serde::{Deserialize, Deserializer};

use super::{Card, Deck, Extraction, FieldValues, ModelKind, Template, note_decks, split_tags};
use crate::error::{DecodeError, Result};
use crate::store::TabularStore;

#[derive(Debug, Deserialize)]
struct LegacyModel {
    #[serde(deserialize_with = "id_string")]
    id: String,
    #[serde(default)]
    name: String,
    css: String,
    flds: Vec<LegacyField>,
    tmpls: Vec<LegacyTemplate>,
    #[serde(default, rename = "type")]
    kind: i64,
}

#[derive(Debug, Deserialize)]
struct LegacyField {
    name: String,
    #[serde(default)]
    ord: Option<u32>,
}

#[derive(Debug, Deserialize)]
struct LegacyTemplate {
    name: String,
    qfmt: String,
    afmt: String,
    ord: u32,
}

#[derive(Debug, Deserialize)]
struct LegacyDeck {
    #[serde(deserialize_with = "id_string")]
    id: String,
    name: String,
}

/// Ids appear as JSON numbers in most collections and as strings in a few.
fn id_string<'de, D: Deserializer<'de>>(deserializer: D) -> std::result::Result<String, D::Error> {
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Id {
        Int(i64),
        Str(String),
    }
    Ok(match Id::deserialize(deserializer)? {
        Id::Int(v) => v.to_string(),
        Id::Str(s) => s,
    })
}

/// A model ready for joining notes against.
struct Model {
    field_names: Vec<String>,
    templates: Vec<Template>,
}

impl Model {
    fn from_json(model: LegacyModel) -> Result<Self> {
        if model.tmpls.is_empty() {
            return Err(DecodeError::InvalidLegacyModelJson(format!(
                "model {} has no templates",
                model.id
            )));
        }
        let mut flds = model.flds;
        // Array order is authoritative unless every field carries an ord
        if flds.iter().all(|f| f.ord.is_some()) {
            flds.sort_by_key(|f| f.ord);
        }
        let mut tmpls = model.tmpls;
        tmpls.sort_by_key(|t| t.ord);

        log::trace!(
            "Legacy model {} {:?} ({:?}): {} fields, {} templates, {} bytes of css",
            model.id,
            model.name,
            ModelKind::from_legacy(model.kind),
            flds.len(),
            tmpls.len(),
            model.css.len()
        );

        let templates = tmpls
            .into_iter()
            .map(|t| Template {
                notetype_id: model.id.clone(),
                ordinal: t.ord,
                name: t.name,
                question_format: t.qfmt,
                answer_format: t.afmt,
            })
            .collect();
        Ok(Self {
            field_names: flds.into_iter().map(|f| f.name).collect(),
            templates,
        })
    }
}

fn parse_models(json: &str) -> Result<HashMap<String, Model>> {
    let raw: HashMap<String, LegacyModel> = serde_json::from_str(json)
        .map_err(|e| DecodeError::InvalidLegacyModelJson(format!("col.models: {e}")))?;
    raw.into_values()
        .map(|m| Ok((m.id.clone(), Model::from_json(m)?)))
        .collect()
}

fn parse_decks(json: &str) -> Result<BTreeMap<String, Deck>> {
    if json.trim().is_empty() {
        return Ok(BTreeMap::new());
    }
    let raw: HashMap<String, LegacyDeck> = serde_json::from_str(json)
        .map_err(|e| DecodeError::InvalidLegacyModelJson(format!("col.decks: {e}")))?;
    Ok(raw
        .into_values()
        .map(|d| {
            (
                d.id.clone(),
                Deck {
                    id: d.id,
                    name: d.name,
                },
            )
        })
        .collect())
}

/// Extract cards and decks from a legacy collection.
///
/// # Errors
///
/// - [`DecodeError::InvalidLegacyModelJson`] if `col.models` or `col.decks` is not shaped as expected
/// - [`DecodeError::ModelNotFound`] if a note's `mid` names no model
pub async fn extract(store: &dyn TabularStore) -> Result<Extraction> {
    let col = store.query("SELECT models, decks FROM col LIMIT 1").await?;
    let col = col
        .first()
        .ok_or_else(|| DecodeError::InvalidLegacyModelJson("col table is empty".into()))?;
    let models = parse_models(&col.text(0)?)?;
    let decks = parse_decks(&col.text(1)?)?;
    let deck_of_note = note_decks(store, &decks).await?;

    let notes = store
        .query("SELECT id, mid, tags, flds FROM notes ORDER BY id")
        .await?;

    let mut cards = Vec::with_capacity(notes.len());
    for row in &notes {
        let note_id = row.int(0)?;
        let mid = row.int(1)?.to_string();
        let model = models
            .get(&mid)
            .ok_or_else(|| DecodeError::ModelNotFound(mid.clone()))?;

        cards.push(Card {
            note_id: note_id.to_string(),
            notetype_id: mid,
            values: FieldValues::from_flds(&model.field_names, &row.text(3)?),
            tags: split_tags(&row.text(2)?),
            templates: model.templates.clone(),
            deck_name: deck_of_note.get(&note_id).cloned(),
        });
    }

    log::info!(
        "Extracted {} notes across {} models from legacy collection",
        cards.len(),
        models.len()
    );
    Ok(Extraction {
        cards,
        notetypes: None,
        decks,
    })
}
