use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum CardType {
    Agl,
    Teq,
    Int,
    Str,
    Phy,
}

impl CardType {
    pub const ALL: [CardType; 5] = [
        CardType::Agl,
        CardType::Teq,
        CardType::Int,
        CardType::Str,
        CardType::Phy,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            CardType::Agl => "AGL",
            CardType::Teq => "TEQ",
            CardType::Int => "INT",
            CardType::Str => "STR",
            CardType::Phy => "PHY",
        }
    }

    /// Suffix match so that "Super STR" and "Extreme PHY" resolve to their base type.
    pub fn from_wiki(raw: &str) -> Option<Self> {
        let upper = raw.trim().to_ascii_uppercase();
        Self::ALL
            .into_iter()
            .find(|t| !upper.is_empty() && upper.ends_with(t.as_str()))
    }
}

impl fmt::Display for CardType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for CardType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|t| t.as_str().eq_ignore_ascii_case(s.trim()))
            .ok_or_else(|| format!("unknown card type: {s}"))
    }
}

/// Rarity tiers, ordered from least to most desirable.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Rarity {
    N,
    R,
    Sr,
    Ssr,
    Ur,
    Lr,
}

impl Rarity {
    pub const ALL: [Rarity; 6] = [
        Rarity::N,
        Rarity::R,
        Rarity::Sr,
        Rarity::Ssr,
        Rarity::Ur,
        Rarity::Lr,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Rarity::N => "N",
            Rarity::R => "R",
            Rarity::Sr => "SR",
            Rarity::Ssr => "SSR",
            Rarity::Ur => "UR",
            Rarity::Lr => "LR",
        }
    }
}

impl fmt::Display for Rarity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Rarity {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|r| r.as_str().eq_ignore_ascii_case(s.trim()))
            .ok_or_else(|| format!("unknown rarity: {s}"))
    }
}

/// Extreme Z-Awakened variant of a card's skills and stats.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct EzaVariant {
    pub leader_skill: Option<String>,
    pub super_attack: Option<String>,
    pub sa_name: Option<String>,
    pub passive_skill: Option<String>,
    pub max_hp: Option<String>,
    pub max_atk: Option<String>,
    pub max_def: Option<String>,
}

impl EzaVariant {
    pub fn is_empty(&self) -> bool {
        self.leader_skill.is_none()
            && self.super_attack.is_none()
            && self.sa_name.is_none()
            && self.passive_skill.is_none()
            && self.max_hp.is_none()
            && self.max_atk.is_none()
            && self.max_def.is_none()
    }
}

/// One card page. Stats stay as wiki text because the source is not always numeric.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Card {
    pub page_title: String,
    pub title: Option<String>,
    pub name: Option<String>,
    pub card_type: Option<CardType>,
    pub rarity: Option<Rarity>,
    pub cost: Option<String>,
    pub max_level: Option<String>,
    pub base_hp: Option<String>,
    pub base_atk: Option<String>,
    pub base_def: Option<String>,
    pub max_hp: Option<String>,
    pub max_atk: Option<String>,
    pub max_def: Option<String>,
    pub leader_skill: Option<String>,
    pub super_attack: Option<String>,
    pub sa_name: Option<String>,
    pub passive_skill: Option<String>,
    pub links: Vec<String>,
    pub categories: Vec<String>,
    pub image: Option<String>,
    pub wiki_url: String,
    pub eza: Option<EzaVariant>,
}

impl Card {
    /// Display name preferring the card title, then the character name, then the page.
    pub fn display_name(&self) -> &str {
        self.title
            .as_deref()
            .or(self.name.as_deref())
            .unwrap_or(&self.page_title)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct StoredCard {
    #[serde(flatten)]
    pub card: Card,
    pub synced_at: Option<String>,
}

/// Snapshot row of the upcoming-releases table.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ScheduleEntry {
    pub title: String,
    pub name: Option<String>,
    pub card_type: Option<String>,
    pub rarity: Option<String>,
    pub image: Option<String>,
    pub wiki_url: Option<String>,
    pub synced_at: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SyncMode {
    /// Every discovered title
    Full,
    /// Every discovered title, announced as a forced overwrite
    Resync,
    /// New titles plus titles edited inside the recent window
    Update,
}

impl fmt::Display for SyncMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SyncMode::Full => f.write_str("full"),
            SyncMode::Resync => f.write_str("resync"),
            SyncMode::Update => f.write_str("update"),
        }
    }
}

/// What happened to one title during a run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Outcome {
    /// Record stored
    Synced,
    /// Fetched but not a usable card page
    Skipped,
    /// Fetch or storage error for this title only
    Failed,
}

/// Orchestrator state, reported through logs.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    Discovering,
    Fetching { batch: usize, of: usize },
    Persisting { batch: usize },
    SchedulingRefresh,
    Done,
}

impl fmt::Display for Phase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Phase::Discovering => f.write_str("discovering"),
            Phase::Fetching { batch, of } => write!(f, "fetching batch {batch}/{of}"),
            Phase::Persisting { batch } => write!(f, "persisting batch {batch}"),
            Phase::SchedulingRefresh => f.write_str("refreshing schedule"),
            Phase::Done => f.write_str("done"),
        }
    }
}
