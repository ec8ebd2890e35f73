//! Card page parsing.
//!
//! Each attribute is resolved from an ordered alias table through
//! [`extract_field`]. Earlier aliases win, so specific names ("HP_max") come
//! before generic ones ("HP").

use crate::config::wiki_url;
use crate::content::clean_wiki;
use crate::error::SkipReason;
use crate::fields::extract_field;
use crate::models::{Card, CardType, EzaVariant, Rarity};
use once_cell::sync::Lazy;
use regex::Regex;
use tracing::{debug, warn};

pub const CONTAINER_MARKER: &str = "{{Characters";

/// Used for `max_level` when the level field carries the LR marker instead.
pub const LR_DEFAULT_MAX_LEVEL: &str = "150";

const TITLE: &[&str] = &["name1"];
const NAME: &[&str] = &["name2"];
const TYPE: &[&str] = &["type"];
const RARITY: &[&str] = &["rarity"];
const COST: &[&str] = &["cost"];
const MAX_LEVEL: &[&str] = &["max lv", "max_lv"];
const LR_MAX_LEVEL: &[&str] = &["lv_max", "lv max", "max_level"];

const BASE_HP: &[&str] = &["HP1", "HP_1", "base HP", "HP base", "HP"];
const BASE_ATK: &[&str] = &["ATK1", "ATK_1", "base ATK", "ATK base", "ATK"];
const BASE_DEF: &[&str] = &["DEF1", "DEF_1", "base DEF", "DEF base", "DEF"];
const MAX_HP: &[&str] = &[
    "HP_max", "HP2", "max HP", "HP max", "HP_lv120", "HP_lv150", "HP_lv200",
];
const MAX_ATK: &[&str] = &[
    "ATK_max", "ATK2", "max ATK", "ATK max", "ATK_lv120", "ATK_lv150", "ATK_lv200",
];
const MAX_DEF: &[&str] = &[
    "DEF_max", "DEF2", "max DEF", "DEF max", "DEF_lv120", "DEF_lv150", "DEF_lv200",
];

const LEADER_SKILL: &[&str] = &["LS description"];
const SA_NAME: &[&str] = &["SA name", "MSA name"];
const SUPER_ATTACK: &[&str] = &["SA description"];
const PASSIVE_SKILL: &[&str] = &["PS description"];

const EZA_LEADER_SKILL: &[&str] = &["LS description Z"];
const EZA_SA_NAME: &[&str] = &["UltraSA name", "SA name Z"];
const EZA_SUPER_ATTACK: &[&str] = &["UltraSA description Z", "SA description Z"];
const EZA_PASSIVE_SKILL: &[&str] = &["PS description Z"];
const EZA_MAX_HP: &[&str] = &["EZA HP", "HP_eza"];
const EZA_MAX_ATK: &[&str] = &["EZA ATK", "ATK_eza"];
const EZA_MAX_DEF: &[&str] = &["EZA DEF", "DEF_eza"];

const LINKS: &[&str] = &["Link_skill", "Link skill", "links"];
const CATEGORIES: &[&str] = &["Category", "categories"];

/// Image aliases: animated thumbnail, static thumbnail, animated artwork.
const IMAGE_KEYS: [&str; 3] = ["thumb apng", "thumb", "artwork apng"];

static NUMBERED_LINK_REGEX: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)\|\s*link\s*\d+\s*=\s*([^|}\n]+)").unwrap());

static NUMBERED_CATEGORY_REGEX: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)\|\s*categor(?:y|ies)\s*\d*\s*=\s*([^|}]+)").unwrap());

static IMAGE_REGEXES: Lazy<Vec<Regex>> = Lazy::new(|| {
    IMAGE_KEYS
        .iter()
        .map(|key| {
            let key = regex::escape(key).replace(' ', r"\s+");
            Regex::new(&format!(r"(?i)\|\s*{key}\s*=\s*(https?://[^\s|{{}}]+)")).unwrap()
        })
        .collect()
});

static STAT_FIELD_REGEX: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)\|\s*([^|}\n]*(?:HP|ATK|DEF)[^|}\n]*?)\s*=\s*(\d+)").unwrap()
});

static LIST_SPLIT_REGEX: Lazy<Regex> = Lazy::new(|| Regex::new(r"[\n,]").unwrap());

/// True when the page carries the card container template or any rarity field.
pub fn is_card_page(wikitext: &str) -> bool {
    wikitext.contains(CONTAINER_MARKER) || wikitext.to_lowercase().contains("rarity")
}

/// Parses one card page into a [`Card`].
pub fn parse_card(wikitext: &str, page_title: &str) -> Result<Card, SkipReason> {
    if !is_card_page(wikitext) {
        return Err(SkipReason::NotACardPage);
    }

    let card_type = field(wikitext, TYPE).and_then(|raw| {
        let parsed = CardType::from_wiki(&raw);
        if parsed.is_none() {
            debug!(page = page_title, raw = %raw, "Unrecognised card type");
        }
        parsed
    });

    let mut rarity = field(wikitext, RARITY).and_then(|raw| {
        let parsed = raw.parse::<Rarity>().ok();
        if parsed.is_none() {
            debug!(page = page_title, raw = %raw, "Unrecognised rarity");
        }
        parsed
    });

    // The wiki marks LR cards through the level field rather than the rarity field.
    let raw_max_level = field(wikitext, MAX_LEVEL);
    let max_level = match raw_max_level {
        Some(level) if level.eq_ignore_ascii_case("LR") => {
            rarity = Some(Rarity::Lr);
            Some(field(wikitext, LR_MAX_LEVEL).unwrap_or_else(|| LR_DEFAULT_MAX_LEVEL.to_string()))
        }
        other => other,
    };

    if rarity.is_none() && card_type.is_none() {
        return Err(SkipReason::UnusableRecord);
    }

    let base_hp = field(wikitext, BASE_HP);
    if base_hp.is_none() {
        report_unmatched_stats(wikitext, page_title);
    }

    let eza = EzaVariant {
        leader_skill: field(wikitext, EZA_LEADER_SKILL),
        super_attack: field(wikitext, EZA_SUPER_ATTACK),
        sa_name: field(wikitext, EZA_SA_NAME),
        passive_skill: field(wikitext, EZA_PASSIVE_SKILL),
        max_hp: field(wikitext, EZA_MAX_HP),
        max_atk: field(wikitext, EZA_MAX_ATK),
        max_def: field(wikitext, EZA_MAX_DEF),
    };

    Ok(Card {
        page_title: page_title.to_string(),
        title: field(wikitext, TITLE),
        name: field(wikitext, NAME),
        card_type,
        rarity,
        cost: field(wikitext, COST),
        max_level,
        base_hp,
        base_atk: field(wikitext, BASE_ATK),
        base_def: field(wikitext, BASE_DEF),
        max_hp: field(wikitext, MAX_HP),
        max_atk: field(wikitext, MAX_ATK),
        max_def: field(wikitext, MAX_DEF),
        leader_skill: field(wikitext, LEADER_SKILL),
        super_attack: field(wikitext, SUPER_ATTACK),
        sa_name: field(wikitext, SA_NAME),
        passive_skill: field(wikitext, PASSIVE_SKILL),
        links: parse_links(wikitext),
        categories: parse_categories(wikitext),
        image: parse_image(wikitext),
        wiki_url: wiki_url(page_title),
        eza: (!eza.is_empty()).then_some(eza),
    })
}

/// Non-empty cleaned value for the first matching alias.
fn field(wikitext: &str, aliases: &[&str]) -> Option<String> {
    extract_field(wikitext, aliases).filter(|v| !v.is_empty())
}

/// Link skills in page order; duplicates are kept.
fn parse_links(wikitext: &str) -> Vec<String> {
    match extract_field(wikitext, LINKS) {
        Some(value) => split_list(&value).collect(),
        None => NUMBERED_LINK_REGEX
            .captures_iter(wikitext)
            .map(|c| clean_wiki(&c[1]))
            .filter(|s| !s.is_empty())
            .collect(),
    }
}

/// Categories in page order with duplicates dropped.
fn parse_categories(wikitext: &str) -> Vec<String> {
    let raw: Vec<String> = match extract_field(wikitext, CATEGORIES) {
        Some(value) => split_list(&value).collect(),
        None => NUMBERED_CATEGORY_REGEX
            .captures_iter(wikitext)
            .map(|c| clean_wiki(&c[1]))
            .collect(),
    };
    dedup_preserving_order(raw)
}

fn split_list(value: &str) -> impl Iterator<Item = String> + '_ {
    LIST_SPLIT_REGEX
        .split(value)
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
}

pub(crate) fn dedup_preserving_order(items: Vec<String>) -> Vec<String> {
    let mut seen = rustc_hash::FxHashSet::default();
    items
        .into_iter()
        .filter(|s| !s.is_empty() && seen.insert(s.clone()))
        .collect()
}

fn parse_image(wikitext: &str) -> Option<String> {
    IMAGE_REGEXES
        .iter()
        .find_map(|re| re.captures(wikitext))
        .map(|c| c[1].trim().to_string())
}

fn report_unmatched_stats(wikitext: &str, page_title: &str) {
    let candidates: Vec<String> = STAT_FIELD_REGEX
        .captures_iter(wikitext)
        .take(10)
        .map(|c| format!("{}={}", c[1].trim(), &c[2]))
        .collect();
    if !candidates.is_empty() {
        warn!(
            page = page_title,
            fields = ?candidates,
            "Stat fields present but not matched"
        );
    }
}
