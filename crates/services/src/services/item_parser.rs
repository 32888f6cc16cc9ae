//! Typed view of item documents and extraction of catalog fields from them.
//!
//! Item documents describe an item as a tooltip: a list of info blocks whose
//! elements carry localized labels. Known fields are found by translation key
//! first and by their label in a fixed language second.

use std::collections::BTreeMap;

use db::models::{
    artefact::ArtefactEffect,
    item::{ItemStat, LocalizedName},
};
use serde::Deserialize;
use thiserror::Error;

use super::item_source::ItemCategory;

#[derive(Debug, Clone, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum Text {
    Translation {
        key: String,
        #[serde(default)]
        lines: BTreeMap<String, String>,
    },
    Text {
        text: String,
    },
}

impl Text {
    pub fn key(&self) -> Option<&str> {
        match self {
            Text::Translation { key, .. } => Some(key.as_str()),
            Text::Text { .. } => None,
        }
    }

    pub fn in_lang(&self, lang: &str) -> Option<&str> {
        match self {
            Text::Translation { lines, .. } => lines.get(lang).map(String::as_str),
            Text::Text { text } => Some(text.as_str()),
        }
        .map(str::trim)
        .filter(|s| !s.is_empty())
    }

    /// Every non-empty translation; plain text is attributed to `lang`.
    fn localized(&self, lang: &str) -> Vec<LocalizedName> {
        match self {
            Text::Translation { lines, .. } => lines
                .iter()
                .filter(|(_, name)| !name.trim().is_empty())
                .map(|(lang, name)| LocalizedName {
                    lang: lang.clone(),
                    name: name.trim().to_string(),
                })
                .collect(),
            Text::Text { text } if !text.trim().is_empty() => vec![LocalizedName {
                lang: lang.to_string(),
                name: text.trim().to_string(),
            }],
            Text::Text { .. } => Vec::new(),
        }
    }

    /// Stable identifier for stats: translation key, else the label.
    fn stat_key(&self, lang: &str) -> Option<String> {
        self.key()
            .map(str::to_string)
            .or_else(|| self.in_lang(lang).map(str::to_string))
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum InfoBlock {
    List {
        #[serde(default)]
        elements: Vec<InfoElement>,
    },
    Text {
        text: Text,
    },
    #[serde(other)]
    Other,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(tag = "type", rename_all = "kebab-case")]
pub enum InfoElement {
    KeyValue { key: Text, value: Text },
    Numeric { name: Text, value: f64 },
    Range { name: Text, min: f64, max: f64 },
    Text { text: Text },
    #[serde(other)]
    Other,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct ItemStatus {
    #[serde(default)]
    pub state: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ItemDocument {
    #[serde(default)]
    pub id: String,
    #[serde(default)]
    pub category: String,
    #[serde(default)]
    pub name: Option<Text>,
    #[serde(default)]
    pub color: Option<String>,
    #[serde(default)]
    pub status: Option<ItemStatus>,
    #[serde(default)]
    pub info_blocks: Vec<InfoBlock>,
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ItemParseError {
    #[error("item document has no id")]
    MissingId,
    #[error("item {0} has no name")]
    MissingNames(String),
}

/// Catalog fields extracted from one item document.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ParsedItem {
    pub id: String,
    pub category: String,
    pub names: Vec<LocalizedName>,
    pub color: Option<String>,
    pub state: Option<String>,
    pub rank: Option<String>,
    pub class: Option<String>,
    pub weight: Option<f64>,
    pub price: Option<f64>,
    pub durability: Option<f64>,
    pub capacity: Option<i64>,
    pub description: Option<String>,
    pub stats: Vec<ItemStat>,
    pub effects: Vec<ArtefactEffect>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum KnownField {
    Rank,
    Class,
    Weight,
    Price,
    Durability,
    Capacity,
}

impl KnownField {
    const ALL: [KnownField; 6] = [
        KnownField::Rank,
        KnownField::Class,
        KnownField::Weight,
        KnownField::Price,
        KnownField::Durability,
        KnownField::Capacity,
    ];

    fn keys(self) -> &'static [&'static str] {
        match self {
            KnownField::Rank => &["core.tooltip.info.rank"],
            KnownField::Class => &["core.tooltip.info.category", "core.tooltip.info.class"],
            KnownField::Weight => &["core.tooltip.info.weight"],
            KnownField::Price => &["core.tooltip.info.price"],
            KnownField::Durability => &["core.tooltip.info.durability"],
            KnownField::Capacity => &[
                "stalker.tooltip.backpack.info.capacity",
                "core.tooltip.info.capacity",
            ],
        }
    }

    fn label(self, lang: &str) -> Option<&'static str> {
        let label = match (lang, self) {
            ("ru", KnownField::Rank) => "Ранг",
            ("ru", KnownField::Class) => "Класс",
            ("ru", KnownField::Weight) => "Вес",
            ("ru", KnownField::Price) => "Цена",
            ("ru", KnownField::Durability) => "Прочность",
            ("ru", KnownField::Capacity) => "Вместимость",
            ("en", KnownField::Rank) => "Rank",
            ("en", KnownField::Class) => "Class",
            ("en", KnownField::Weight) => "Weight",
            ("en", KnownField::Price) => "Price",
            ("en", KnownField::Durability) => "Durability",
            ("en", KnownField::Capacity) => "Capacity",
            _ => return None,
        };
        Some(label)
    }
}

/// First number in `text`, accepting a decimal comma and ignoring spaces ("1 200,5 кг").
fn leading_number(text: &str) -> Option<f64> {
    let cleaned: String = text
        .chars()
        .filter(|c| !c.is_whitespace())
        .skip_while(|c| !(c.is_ascii_digit() || *c == '-'))
        .take_while(|c| c.is_ascii_digit() || matches!(c, '.' | ',' | '-'))
        .map(|c| if c == ',' { '.' } else { c })
        .collect();
    cleaned.parse().ok()
}

#[derive(Debug, Clone)]
pub struct ItemParser {
    lang: String,
}

impl ItemParser {
    pub fn new(lang: impl Into<String>) -> Self {
        Self { lang: lang.into() }
    }

    pub fn lang(&self) -> &str {
        &self.lang
    }

    fn known_field(&self, label: &Text) -> Option<KnownField> {
        let by_key = label
            .key()
            .and_then(|key| KnownField::ALL.into_iter().find(|f| f.keys().contains(&key)));
        if by_key.is_some() {
            return by_key;
        }
        let text = label.in_lang(&self.lang)?;
        KnownField::ALL
            .into_iter()
            .find(|f| f.label(&self.lang).is_some_and(|l| l.eq_ignore_ascii_case(text)))
    }

    pub fn parse(
        &self,
        doc: &ItemDocument,
        kind: ItemCategory,
    ) -> Result<ParsedItem, ItemParseError> {
        let id = doc.id.trim();
        if id.is_empty() {
            return Err(ItemParseError::MissingId);
        }

        let names = doc
            .name
            .as_ref()
            .map(|n| n.localized(&self.lang))
            .unwrap_or_default();
        if names.is_empty() {
            return Err(ItemParseError::MissingNames(id.to_string()));
        }

        let category = match doc.category.trim() {
            "" => kind.to_string(),
            category => category.to_string(),
        };

        let mut item = ParsedItem {
            id: id.to_string(),
            category,
            names,
            color: doc.color.clone().filter(|c| !c.is_empty()),
            state: doc.status.as_ref().and_then(|s| s.state.clone()),
            ..Default::default()
        };

        for block in &doc.info_blocks {
            match block {
                InfoBlock::List { elements, .. } => {
                    for element in elements {
                        self.apply_element(&mut item, element, kind);
                    }
                }
                InfoBlock::Text { text, .. } => {
                    if item.description.is_none() {
                        item.description = text.in_lang(&self.lang).map(str::to_string);
                    }
                }
                InfoBlock::Other => {}
            }
        }

        Ok(item)
    }

    fn apply_element(&self, item: &mut ParsedItem, element: &InfoElement, kind: ItemCategory) {
        match element {
            InfoElement::KeyValue { key, value } => {
                let Some(field) = self.known_field(key) else {
                    return;
                };
                let Some(value) = value.in_lang(&self.lang) else {
                    return;
                };
                match field {
                    KnownField::Rank => set_once(&mut item.rank, value.to_string()),
                    KnownField::Class => set_once(&mut item.class, value.to_string()),
                    numeric => {
                        if let Some(number) = leading_number(value) {
                            set_number(item, numeric, number);
                        }
                    }
                }
            }
            InfoElement::Numeric { name, value } => match self.known_field(name) {
                Some(KnownField::Rank) => set_once(&mut item.rank, value.to_string()),
                Some(KnownField::Class) => set_once(&mut item.class, value.to_string()),
                Some(field) => set_number(item, field, *value),
                None => {
                    let Some(stat_key) = name.stat_key(&self.lang) else {
                        return;
                    };
                    if kind == ItemCategory::Artefact {
                        push_effect(item, stat_key, *value, *value, true);
                    } else if !item.stats.iter().any(|s| s.stat_key == stat_key) {
                        item.stats.push(ItemStat {
                            stat_key,
                            value: *value,
                        });
                    }
                }
            },
            InfoElement::Range { name, min, max } => {
                if let Some(effect_key) = name.stat_key(&self.lang) {
                    push_effect(item, effect_key, *min, *max, false);
                }
            }
            InfoElement::Text { .. } | InfoElement::Other => {}
        }
    }
}

fn set_once(slot: &mut Option<String>, value: String) {
    if slot.is_none() {
        *slot = Some(value);
    }
}

fn set_number(item: &mut ParsedItem, field: KnownField, value: f64) {
    match field {
        KnownField::Weight => item.weight = item.weight.or(Some(value)),
        KnownField::Price => item.price = item.price.or(Some(value)),
        KnownField::Durability => item.durability = item.durability.or(Some(value)),
        KnownField::Capacity => item.capacity = item.capacity.or(Some(value.round() as i64)),
        KnownField::Rank | KnownField::Class => {}
    }
}

fn push_effect(item: &mut ParsedItem, effect_key: String, min: f64, max: f64, is_threshold: bool) {
    if item.effects.iter().any(|e| e.effect_key == effect_key) {
        return;
    }
    item.effects.push(ArtefactEffect {
        effect_key,
        min_value: min.min(max),
        max_value: min.max(max),
        is_threshold,
    });
}
