//! Extraction from modern collections (`collection.anki21b`).
//!
//! Notetypes, fields and templates live in their own tables, each row
//! carrying a protobuf `config` blob. Fields and templates join to their
//! notetype on `ntid` and are ordered by `ord`.

use std::collections::{BTreeMap, HashMap};

use super::{
    Card, Deck, Extraction, Field, FieldValues, FontConfig, ModelKind, Notetype, Template,
    normalize_deck_name, note_decks, split_tags,
};
use crate::error::{DecodeError, Result};
use crate::proto::{FieldConfig, NotetypeConfig, TemplateConfig, decode_config};
use crate::store::TabularStore;

/// Fields grouped by notetype id, each group sorted by ordinal.
pub async fn read_fields(store: &dyn TabularStore) -> Result<HashMap<i64, Vec<Field>>> {
    let rows = store
        .query("SELECT ntid, ord, name, config FROM fields ORDER BY ntid, ord")
        .await?;

    let mut groups: HashMap<i64, Vec<Field>> = HashMap::new();
    for row in &rows {
        let ntid = row.int(0)?;
        let config: FieldConfig = decode_config(row.blob(3)?)?;
        groups.entry(ntid).or_default().push(Field {
            notetype_id: ntid.to_string(),
            ordinal: ordinal(row.int(1)?)?,
            name: row.text(2)?,
            font: FontConfig {
                font_name: config.font_name,
                font_size: config.font_size,
                rtl: config.rtl,
                sticky: config.sticky,
                plain_text: config.plain_text,
                description: config.description,
            },
        });
    }
    for group in groups.values_mut() {
        group.sort_by_key(|f| f.ordinal);
    }
    Ok(groups)
}

/// Templates grouped by notetype id, in table order.
pub async fn read_templates(store: &dyn TabularStore) -> Result<HashMap<i64, Vec<Template>>> {
    let rows = store
        .query("SELECT ntid, ord, name, config FROM templates")
        .await?;

    let mut groups: HashMap<i64, Vec<Template>> = HashMap::new();
    for row in &rows {
        let ntid = row.int(0)?;
        let config: TemplateConfig = decode_config(row.blob(3)?)?;
        groups.entry(ntid).or_default().push(Template {
            notetype_id: ntid.to_string(),
            ordinal: ordinal(row.int(1)?)?,
            name: row.text(2)?,
            question_format: config.q_format,
            answer_format: config.a_format,
        });
    }
    Ok(groups)
}

pub async fn read_notetypes(store: &dyn TabularStore) -> Result<Vec<Notetype>> {
    let rows = store
        .query("SELECT id, name, config FROM notetypes ORDER BY id")
        .await?;

    rows.iter()
        .map(|row| {
            let config: NotetypeConfig = decode_config(row.blob(2)?)?;
            Ok(Notetype {
                id: row.int(0)?.to_string(),
                name: row.text(1)?,
                kind: ModelKind::from(config.kind()),
                css: config.css,
                latex_pre: config.latex_pre,
                latex_post: config.latex_post,
                latex_svg: config.latex_svg,
            })
        })
        .collect()
}

pub async fn read_decks(store: &dyn TabularStore) -> Result<BTreeMap<String, Deck>> {
    if !store.has_table("decks").await? {
        return Ok(BTreeMap::new());
    }
    let rows = store.query("SELECT id, name FROM decks").await?;
    rows.iter()
        .map(|row| {
            let id = row.int(0)?.to_string();
            let name = normalize_deck_name(&row.text(1)?);
            Ok((id.clone(), Deck { id, name }))
        })
        .collect()
}

fn ordinal(value: i64) -> Result<u32> {
    u32::try_from(value).map_err(|_| DecodeError::Store(format!("invalid ordinal {value}")))
}

/// Extract cards, notetypes and decks from a modern collection.
///
/// # Errors
///
/// - [`DecodeError::MalformedConfigBlob`] if any config blob fails to decode
/// - [`DecodeError::TemplateGroupNotFound`] if a note's `mid` has no templates
pub async fn extract(store: &dyn TabularStore) -> Result<Extraction> {
    let fields = read_fields(store).await?;
    let templates = read_templates(store).await?;
    let notetypes = read_notetypes(store).await?;
    let decks = read_decks(store).await?;
    let deck_of_note = note_decks(store, &decks).await?;

    let field_names: HashMap<i64, Vec<String>> = fields
        .iter()
        .map(|(ntid, group)| (*ntid, group.iter().map(|f| f.name.clone()).collect()))
        .collect();

    let notes = store
        .query("SELECT id, mid, tags, flds FROM notes ORDER BY id")
        .await?;

    let mut cards = Vec::with_capacity(notes.len());
    for row in &notes {
        let note_id = row.int(0)?;
        let mid = row.int(1)?;
        let group = templates
            .get(&mid)
            .ok_or_else(|| DecodeError::TemplateGroupNotFound(mid.to_string()))?;
        let names = match field_names.get(&mid) {
            Some(names) => names.as_slice(),
            None => {
                log::warn!("Notetype {mid} has templates but no fields");
                &[]
            }
        };

        cards.push(Card {
            note_id: note_id.to_string(),
            notetype_id: mid.to_string(),
            values: FieldValues::from_flds(names, &row.text(3)?),
            tags: split_tags(&row.text(2)?),
            templates: group.clone(),
            deck_name: deck_of_note.get(&note_id).cloned(),
        });
    }

    log::info!(
        "Extracted {} notes across {} notetypes from modern collection",
        cards.len(),
        notetypes.len()
    );
    Ok(Extraction {
        cards,
        notetypes: Some(notetypes),
        decks,
    })
}
