//! SQLite persistence for cards and the upcoming-release schedule.
//!
//! The database is shared with the bot, which owns a `community_teams` table in the
//! same file. Nothing here reads or writes that table.

use crate::models::{Card, CardType, EzaVariant, Rarity, ScheduleEntry, StoredCard};
use anyhow::{Context, Result};
use rusqlite::types::Value;
use rusqlite::{params, Connection, OptionalExtension, Row};
use rustc_hash::FxHashSet;
use std::path::Path;
use tracing::debug;

/// Separator for list columns (`links`, `categories`)
pub const LIST_SEPARATOR: &str = "|";

const CREATE_CARDS: &str = "CREATE TABLE IF NOT EXISTS cards (
    id                INTEGER PRIMARY KEY AUTOINCREMENT,
    page_title        TEXT UNIQUE NOT NULL,
    title             TEXT,
    name              TEXT,
    type              TEXT,
    rarity            TEXT,
    cost              TEXT,
    max_level         TEXT,
    base_hp           TEXT,
    base_atk          TEXT,
    base_def          TEXT,
    max_hp            TEXT,
    max_atk           TEXT,
    max_def           TEXT,
    leader_skill      TEXT,
    super_attack      TEXT,
    sa_name           TEXT,
    passive_skill     TEXT,
    links             TEXT,
    categories        TEXT,
    image             TEXT,
    wiki_url          TEXT,
    synced_at         TEXT,
    eza_leader_skill  TEXT,
    eza_super_attack  TEXT,
    eza_sa_name       TEXT,
    eza_passive_skill TEXT,
    eza_max_hp        TEXT,
    eza_max_atk       TEXT,
    eza_max_def       TEXT
)";

const CREATE_SCHEDULE: &str = "CREATE TABLE IF NOT EXISTS schedule (
    id          INTEGER PRIMARY KEY AUTOINCREMENT,
    title       TEXT,
    name        TEXT,
    type        TEXT,
    rarity      TEXT,
    image       TEXT,
    wiki_url    TEXT,
    synced_at   TEXT
)";

const CARD_INDEXES: &str = "CREATE INDEX IF NOT EXISTS idx_name ON cards(name);
CREATE INDEX IF NOT EXISTS idx_title ON cards(title);
CREATE INDEX IF NOT EXISTS idx_type ON cards(type);
CREATE INDEX IF NOT EXISTS idx_rarity ON cards(rarity);";

/// Columns added after the first release; older databases gain them on open.
const EZA_COLUMNS: [&str; 7] = [
    "eza_leader_skill",
    "eza_super_attack",
    "eza_sa_name",
    "eza_passive_skill",
    "eza_max_hp",
    "eza_max_atk",
    "eza_max_def",
];

const UPSERT_CARD: &str = "INSERT OR REPLACE INTO cards (
    page_title, title, name, type, rarity, cost, max_level,
    base_hp, base_atk, base_def, max_hp, max_atk, max_def,
    leader_skill, super_attack, sa_name, passive_skill,
    links, categories, image, wiki_url, synced_at,
    eza_leader_skill, eza_super_attack, eza_sa_name, eza_passive_skill,
    eza_max_hp, eza_max_atk, eza_max_def
) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14, ?15,
          ?16, ?17, ?18, ?19, ?20, ?21, ?22, ?23, ?24, ?25, ?26, ?27, ?28, ?29)";

const SELECT_CARD_COLUMNS: &str = "page_title, title, name, type, rarity, cost, max_level,
    base_hp, base_atk, base_def, max_hp, max_atk, max_def,
    leader_skill, super_attack, sa_name, passive_skill,
    links, categories, image, wiki_url, synced_at,
    eza_leader_skill, eza_super_attack, eza_sa_name, eza_passive_skill,
    eza_max_hp, eza_max_atk, eza_max_def";

/// Orders LR first, then UR, SSR, SR, everything else last.
const RARITY_ORDER: &str = "CASE rarity
    WHEN 'LR'  THEN 1
    WHEN 'UR'  THEN 2
    WHEN 'SSR' THEN 3
    WHEN 'SR'  THEN 4
    ELSE 5
END";

/// Card fields copied into a schedule entry.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScheduleMatch {
    pub title: Option<String>,
    pub name: Option<String>,
    pub card_type: Option<String>,
    pub rarity: Option<String>,
    pub image: Option<String>,
    pub wiki_url: Option<String>,
}

/// Row count and freshness of the cards table.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoreStats {
    pub cards: u64,
    pub last_synced: Option<String>,
}

/// Filters for [`Store::search_cards`].
#[derive(Debug, Clone, Default)]
pub struct CardQuery {
    pub text: String,
    pub card_type: Option<CardType>,
    pub rarity: Option<Rarity>,
    pub limit: usize,
}

pub struct Store {
    conn: Connection,
}

impl Store {
    pub fn open(path: &Path) -> Result<Self> {
        let conn = Connection::open(path)
            .with_context(|| format!("Failed to open database: {}", path.display()))?;
        Self::init(conn)
    }

    pub fn open_in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory().context("Failed to open in-memory database")?;
        Self::init(conn)
    }

    fn init(conn: Connection) -> Result<Self> {
        conn.execute_batch("PRAGMA journal_mode = WAL; PRAGMA synchronous = NORMAL;")
            .context("Failed to configure database")?;
        conn.execute(CREATE_CARDS, [])
            .context("Failed to create cards table")?;
        for column in EZA_COLUMNS {
            add_column_if_missing(&conn, "cards", column)?;
        }
        conn.execute_batch(CARD_INDEXES)
            .context("Failed to create card indexes")?;
        conn.execute(CREATE_SCHEDULE, [])
            .context("Failed to create schedule table")?;
        Ok(Self { conn })
    }

    /// Direct access for maintenance and tests.
    pub fn connection(&self) -> &Connection {
        &self.conn
    }

    /// Inserts or fully replaces the row for `card.page_title`.
    pub fn upsert_card(&self, card: &Card, synced_at: &str) -> Result<()> {
        let eza = card.eza.clone().unwrap_or_default();
        self.conn
            .prepare_cached(UPSERT_CARD)?
            .execute(params![
                card.page_title,
                card.title,
                card.name,
                card.card_type.map(|t| t.as_str()),
                card.rarity.map(|r| r.as_str()),
                card.cost,
                card.max_level,
                card.base_hp,
                card.base_atk,
                card.base_def,
                card.max_hp,
                card.max_atk,
                card.max_def,
                card.leader_skill,
                card.super_attack,
                card.sa_name,
                card.passive_skill,
                card.links.join(LIST_SEPARATOR),
                card.categories.join(LIST_SEPARATOR),
                card.image,
                card.wiki_url,
                synced_at,
                eza.leader_skill,
                eza.super_attack,
                eza.sa_name,
                eza.passive_skill,
                eza.max_hp,
                eza.max_atk,
                eza.max_def,
            ])
            .with_context(|| format!("Failed to store card: {}", card.page_title))?;
        debug!(page = %card.page_title, "Stored card");
        Ok(())
    }

    pub fn known_titles(&self) -> Result<FxHashSet<String>> {
        let mut stmt = self.conn.prepare("SELECT page_title FROM cards")?;
        let titles = stmt
            .query_map([], |row| row.get::<_, String>(0))?
            .collect::<rusqlite::Result<FxHashSet<_>>>()
            .context("Failed to read stored titles")?;
        Ok(titles)
    }

    pub fn card_count(&self) -> Result<u64> {
        let count: i64 = self
            .conn
            .query_row("SELECT COUNT(*) FROM cards", [], |row| row.get(0))
            .context("Failed to count cards")?;
        Ok(count as u64)
    }

    pub fn stats(&self) -> Result<StoreStats> {
        let (count, last_synced): (i64, Option<String>) = self
            .conn
            .query_row("SELECT COUNT(*), MAX(synced_at) FROM cards", [], |row| {
                Ok((row.get(0)?, row.get(1)?))
            })
            .context("Failed to read card stats")?;
        Ok(StoreStats {
            cards: count as u64,
            last_synced,
        })
    }

    pub fn get_card(&self, page_title: &str) -> Result<Option<StoredCard>> {
        let sql = format!("SELECT {SELECT_CARD_COLUMNS} FROM cards WHERE page_title = ?1");
        self.conn
            .query_row(&sql, [page_title], card_from_row)
            .optional()
            .with_context(|| format!("Failed to read card: {page_title}"))
    }

    /// Substring search over name, title and page title, best rarity first.
    ///
    /// Without a rarity filter, UR cards are hidden when an LR card with the same
    /// character name is in the result set.
    pub fn search_cards(&self, query: &CardQuery) -> Result<Vec<StoredCard>> {
        let pattern = format!("%{}%", escape_like(&query.text));
        let mut sql = format!(
            "SELECT {SELECT_CARD_COLUMNS} FROM cards \
             WHERE (name LIKE ?1 ESCAPE '\\' OR title LIKE ?1 ESCAPE '\\' \
             OR page_title LIKE ?1 ESCAPE '\\')"
        );
        let mut args: Vec<Value> = vec![Value::Text(pattern)];
        if let Some(card_type) = query.card_type {
            args.push(Value::Text(card_type.as_str().to_string()));
            sql.push_str(&format!(" AND type = ?{}", args.len()));
        }
        if let Some(rarity) = query.rarity {
            args.push(Value::Text(rarity.as_str().to_string()));
            sql.push_str(&format!(" AND rarity = ?{}", args.len()));
        }
        // Over-fetch so LR/UR de-duplication still leaves `limit` rows.
        let fetch_limit = query.limit.saturating_mul(3).min(i64::MAX as usize) as i64;
        args.push(Value::Integer(fetch_limit));
        sql.push_str(&format!(" ORDER BY {RARITY_ORDER} LIMIT ?{}", args.len()));

        let mut stmt = self.conn.prepare(&sql)?;
        let mut cards = stmt
            .query_map(rusqlite::params_from_iter(args.iter()), card_from_row)?
            .collect::<rusqlite::Result<Vec<_>>>()
            .context("Failed to search cards")?;

        if query.rarity.is_none() {
            cards = hide_ur_with_lr_version(cards);
        }
        cards.truncate(query.limit);
        Ok(cards)
    }

    /// Card fields for a schedule title, matched on page title or display title.
    pub fn find_schedule_match(&self, title: &str) -> Result<Option<ScheduleMatch>> {
        self.conn
            .query_row(
                "SELECT title, name, type, rarity, image, wiki_url FROM cards \
                 WHERE page_title = ?1 OR title = ?1 LIMIT 1",
                [title],
                |row| {
                    Ok(ScheduleMatch {
                        title: row.get(0)?,
                        name: row.get(1)?,
                        card_type: row.get(2)?,
                        rarity: row.get(3)?,
                        image: row.get(4)?,
                        wiki_url: row.get(5)?,
                    })
                },
            )
            .optional()
            .with_context(|| format!("Failed to look up schedule title: {title}"))
    }

    /// Clears the schedule and writes `entries` in one transaction.
    pub fn replace_schedule(&mut self, entries: &[ScheduleEntry]) -> Result<usize> {
        let tx = self.conn.transaction()?;
        tx.execute("DELETE FROM schedule", [])
            .context("Failed to clear schedule")?;
        {
            let mut stmt = tx.prepare_cached(
                "INSERT INTO schedule (title, name, type, rarity, image, wiki_url, synced_at)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
            )?;
            for entry in entries {
                stmt.execute(params![
                    entry.title,
                    entry.name,
                    entry.card_type,
                    entry.rarity,
                    entry.image,
                    entry.wiki_url,
                    entry.synced_at,
                ])
                .with_context(|| format!("Failed to store schedule entry: {}", entry.title))?;
            }
        }
        tx.commit().context("Failed to commit schedule")?;
        Ok(entries.len())
    }

    /// Stored schedule in insertion order, optionally matching a type or rarity.
    pub fn schedule(&self, filter: Option<&str>) -> Result<Vec<ScheduleEntry>> {
        let base = "SELECT title, name, type, rarity, image, wiki_url, synced_at FROM schedule";
        let entries = match filter {
            Some(f) => {
                let f = f.trim().to_ascii_uppercase();
                let mut stmt = self.conn.prepare(&format!(
                    "{base} WHERE type = ?1 OR rarity = ?1 ORDER BY id"
                ))?;
                let rows = stmt.query_map([f], schedule_from_row)?;
                rows.collect::<rusqlite::Result<Vec<_>>>()
            }
            None => {
                let mut stmt = self.conn.prepare(&format!("{base} ORDER BY id"))?;
                let rows = stmt.query_map([], schedule_from_row)?;
                rows.collect::<rusqlite::Result<Vec<_>>>()
            }
        };
        entries.context("Failed to read schedule")
    }
}

/// Makes `%`, `_` and the escape character itself match literally under `ESCAPE '\'`.
fn escape_like(text: &str) -> String {
    let mut escaped = String::with_capacity(text.len());
    for c in text.chars() {
        if matches!(c, '\\' | '%' | '_') {
            escaped.push('\\');
        }
        escaped.push(c);
    }
    escaped
}

fn add_column_if_missing(conn: &Connection, table: &str, column: &str) -> Result<()> {
    let columns = {
        let mut stmt = conn.prepare(&format!("PRAGMA table_info({table})"))?;
        let rows = stmt.query_map([], |row| row.get::<_, String>(1))?;
        rows.collect::<rusqlite::Result<Vec<_>>>()?
    };
    let exists = columns.iter().any(|c| c == column);
    if !exists {
        conn.execute(&format!("ALTER TABLE {table} ADD COLUMN {column} TEXT"), [])
            .with_context(|| format!("Failed to add column {table}.{column}"))?;
        debug!(table, column, "Added missing column");
    }
    Ok(())
}

fn schedule_from_row(row: &Row<'_>) -> rusqlite::Result<ScheduleEntry> {
    Ok(ScheduleEntry {
        title: row.get::<_, Option<String>>(0)?.unwrap_or_default(),
        name: row.get(1)?,
        card_type: row.get(2)?,
        rarity: row.get(3)?,
        image: row.get(4)?,
        wiki_url: row.get(5)?,
        synced_at: row.get::<_, Option<String>>(6)?.unwrap_or_default(),
    })
}

fn split_list_column(value: Option<String>) -> Vec<String> {
    value
        .unwrap_or_default()
        .split(LIST_SEPARATOR)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
        .collect()
}

fn card_from_row(row: &Row<'_>) -> rusqlite::Result<StoredCard> {
    let card_type: Option<String> = row.get(3)?;
    let rarity: Option<String> = row.get(4)?;
    let eza = EzaVariant {
        leader_skill: row.get(22)?,
        super_attack: row.get(23)?,
        sa_name: row.get(24)?,
        passive_skill: row.get(25)?,
        max_hp: row.get(26)?,
        max_atk: row.get(27)?,
        max_def: row.get(28)?,
    };
    let card = Card {
        page_title: row.get(0)?,
        title: row.get(1)?,
        name: row.get(2)?,
        card_type: card_type.and_then(|t| t.parse().ok()),
        rarity: rarity.and_then(|r| r.parse().ok()),
        cost: row.get(5)?,
        max_level: row.get(6)?,
        base_hp: row.get(7)?,
        base_atk: row.get(8)?,
        base_def: row.get(9)?,
        max_hp: row.get(10)?,
        max_atk: row.get(11)?,
        max_def: row.get(12)?,
        leader_skill: row.get(13)?,
        super_attack: row.get(14)?,
        sa_name: row.get(15)?,
        passive_skill: row.get(16)?,
        links: split_list_column(row.get(17)?),
        categories: split_list_column(row.get(18)?),
        image: row.get(19)?,
        wiki_url: row.get::<_, Option<String>>(20)?.unwrap_or_default(),
        eza: (!eza.is_empty()).then_some(eza),
    };
    Ok(StoredCard {
        card,
        synced_at: row.get(21)?,
    })
}

fn hide_ur_with_lr_version(cards: Vec<StoredCard>) -> Vec<StoredCard> {
    let lr_names: FxHashSet<String> = cards
        .iter()
        .filter(|c| c.card.rarity == Some(Rarity::Lr))
        .filter_map(|c| c.card.name.as_deref())
        .map(|n| n.trim().to_lowercase())
        .collect();

    cards
        .into_iter()
        .filter(|c| {
            !(c.card.rarity == Some(Rarity::Ur)
                && c.card
                    .name
                    .as_deref()
                    .is_some_and(|n| lr_names.contains(&n.trim().to_lowercase())))
        })
        .collect()
}
