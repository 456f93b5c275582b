//! Deck summaries and the package display name.

use std::collections::{BTreeMap, BTreeSet};

use serde::Serialize;

use crate::extract::{Card, DECK_SEPARATOR, Deck};

/// Name of the deck every collection starts with.
pub const DEFAULT_DECK_NAME: &str = "Default";

/// Id of the built-in default deck.
const DEFAULT_DECK_ID: &str = "1";

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DeckSummary {
    pub name: String,
    pub card_count: usize,
    /// Distinct templates used by the cards of this deck.
    pub template_count: usize,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DeckInfo {
    pub display_name: String,
    /// Decks holding at least one card, sorted by name.
    pub decks: Vec<DeckSummary>,
}

/// Summarize `cards` per deck and choose a display name for the package.
///
/// Cards without a resolved deck are not counted anywhere. When the primary
/// deck is the placeholder `Default` and every non-empty deck sits under one
/// top-level name, that name is shown instead.
pub fn assemble(cards: &[Card], decks: &BTreeMap<String, Deck>) -> DeckInfo {
    let mut groups: BTreeMap<&str, (usize, BTreeSet<(&str, u32)>)> = BTreeMap::new();
    for card in cards {
        let Some(deck) = card.deck_name.as_deref() else {
            continue;
        };
        let (count, templates) = groups.entry(deck).or_default();
        *count += 1;
        templates.extend(
            card.templates
                .iter()
                .map(|t| (t.notetype_id.as_str(), t.ordinal)),
        );
    }

    let summaries: Vec<DeckSummary> = groups
        .into_iter()
        .map(|(name, (card_count, templates))| DeckSummary {
            name: name.to_string(),
            card_count,
            template_count: templates.len(),
        })
        .collect();

    let primary = primary_deck(decks).map_or(DEFAULT_DECK_NAME, |d| d.name.as_str());
    let display_name = match shared_top_level(&summaries) {
        Some(top) if primary == DEFAULT_DECK_NAME => top.to_string(),
        _ => primary.to_string(),
    };

    log::debug!(
        "Assembled {} non-empty decks, display name {display_name:?}",
        summaries.len()
    );
    DeckInfo {
        display_name,
        decks: summaries,
    }
}

/// The default deck if present, else the one with the lowest id.
fn primary_deck(decks: &BTreeMap<String, Deck>) -> Option<&Deck> {
    decks.get(DEFAULT_DECK_ID).or_else(|| {
        decks
            .values()
            .min_by_key(|d| (d.id.parse::<i64>().unwrap_or(i64::MAX), d.id.as_str()))
    })
}

fn shared_top_level(summaries: &[DeckSummary]) -> Option<&str> {
    let mut tops = summaries
        .iter()
        .map(|s| s.name.split(DECK_SEPARATOR).next().unwrap_or(&s.name));
    let first = tops.next()?;
    tops.all(|t| t == first).then_some(first)
}
