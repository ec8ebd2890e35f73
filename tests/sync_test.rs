//! End-to-end sync runs against an in-memory wiki.
//!
//! `FakeWiki` serves category listings (paged two titles at a time), a
//! recent-changes feed and page wikitext from plain maps, and records every page
//! it is asked for so tests can check which titles a mode actually fetched.
//! Each test gets its own database, either in memory or in a `TempDir`.
//!
//! `SlowWiki` wraps a `FakeWiki` with a fixed fetch latency and tracks how many
//! page requests are in flight; its tests run on tokio's paused clock.

use async_trait::async_trait;
use dokkan_sync::config::{SyncConfig, SCHEDULE_PAGE};
use dokkan_sync::error::WikiError;
use dokkan_sync::models::{CardType, Rarity, ScheduleEntry, SyncMode};
use dokkan_sync::store::{CardQuery, Store};
use dokkan_sync::sync::run_sync;
use dokkan_sync::wiki::{Listing, RecentWindow, WikiSource};
use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;
use std::time::Duration;
use tempfile::TempDir;

const PAGE_SIZE: usize = 2;

#[derive(Default)]
struct FakeWiki {
    categories: HashMap<String, Vec<String>>,
    recent: Vec<String>,
    pages: HashMap<String, String>,
    broken: HashSet<String>,
    fetched: Mutex<Vec<String>>,
}

impl FakeWiki {
    fn with_category(mut self, category: &str, titles: &[&str]) -> Self {
        self.categories.insert(
            category.to_string(),
            titles.iter().map(|t| t.to_string()).collect(),
        );
        self
    }

    fn with_page(mut self, title: &str, wikitext: &str) -> Self {
        self.pages.insert(title.to_string(), wikitext.to_string());
        self
    }

    fn with_recent(mut self, titles: &[&str]) -> Self {
        self.recent = titles.iter().map(|t| t.to_string()).collect();
        self
    }

    fn with_broken(mut self, title: &str) -> Self {
        self.broken.insert(title.to_string());
        self
    }

    fn fetched(&self) -> Vec<String> {
        let mut fetched = self.fetched.lock().unwrap().clone();
        fetched.sort();
        fetched
    }
}

fn page_of(all: &[String], cont: Option<&str>) -> Listing {
    let offset: usize = cont.map(|c| c.parse().unwrap()).unwrap_or(0);
    let end = (offset + PAGE_SIZE).min(all.len());
    Listing {
        titles: all[offset.min(end)..end].to_vec(),
        next: (end < all.len()).then(|| end.to_string()),
    }
}

#[async_trait]
impl WikiSource for FakeWiki {
    async fn category_members(
        &self,
        category: &str,
        cont: Option<&str>,
    ) -> Result<Listing, WikiError> {
        Ok(self
            .categories
            .get(category)
            .map(|titles| page_of(titles, cont))
            .unwrap_or_default())
    }

    async fn recent_changes(
        &self,
        _window: RecentWindow,
        cont: Option<&str>,
    ) -> Result<Listing, WikiError> {
        Ok(page_of(&self.recent, cont))
    }

    async fn page_wikitext(&self, title: &str) -> Result<Option<String>, WikiError> {
        self.fetched.lock().unwrap().push(title.to_string());
        if self.broken.contains(title) {
            return Err(WikiError::Api {
                code: "internal_api_error_DBQueryError".to_string(),
                info: "Database query error".to_string(),
            });
        }
        Ok(self.pages.get(title).cloned())
    }
}

fn card_page(name: &str, card_type: &str, rarity: &str) -> String {
    format!(
        "{{{{Characters\n|name1 = {name} Title\n|name2 = {name}\n|type = {card_type}\n\
         |rarity = {rarity}\n|cost = 30\n|HP1 = 5000\n|HP_max = 12000\n\
         |LS description = [[Category:Saiyans|Saiyans]] Category Ki +3\n\
         |Link_skill = [[Saiyan Warrior Race]]\n[[Prepared for Battle]]\n\
         |Category = [[Pure Saiyans]], [[Goku's Family]]\n}}}}"
    )
}

fn quiet_config() -> SyncConfig {
    SyncConfig {
        batch_size: 2,
        show_progress: false,
        ..SyncConfig::default()
    }
    .without_delays()
}

fn sample_wiki() -> FakeWiki {
    FakeWiki::default()
        .with_category("Category:LR", &["Broly LR"])
        .with_category("Category:SSR", &["Goku SSR", "Vegeta SSR", "Shenron Gallery"])
        .with_category("Category:R", &["Missing Card", "Goku SSR"])
        .with_page("Goku SSR", &card_page("Goku", "Super AGL", "SSR"))
        .with_page("Vegeta SSR", &card_page("Vegeta", "Extreme TEQ", "SSR"))
        .with_page(
            "Broly LR",
            "{{Characters\n|name1 = Legendary Super Saiyan\n|name2 = Broly\n|type = STR\n\
             |max lv = LR\n|HP_max = 20000\n}}",
        )
        .with_page("Shenron Gallery", "A gallery of Shenron artwork.")
        .with_page(
            SCHEDULE_PAGE,
            "== Coming soon ==\n* [[Goku SSR]]\n* [[File:Banner.png|300px]]\n* [[New Gohan]]",
        )
}

// ---------------------------------------------------------------------------
// Full and resync runs
// ---------------------------------------------------------------------------

#[tokio::test]
async fn full_sync_stores_cards_and_counts_outcomes() {
    let wiki = sample_wiki();
    let mut store = Store::open_in_memory().unwrap();

    let report = run_sync(&wiki, &mut store, &quiet_config(), SyncMode::Full)
        .await
        .unwrap();

    assert_eq!(report.attempted, 5);
    assert_eq!(report.synced, 3);
    assert_eq!(report.skipped, 2);
    assert_eq!(report.failed, 0);
    assert_eq!(report.total_in_db, 3);

    let goku = store.get_card("Goku SSR").unwrap().unwrap().card;
    assert_eq!(goku.card_type, Some(CardType::Agl));
    assert_eq!(goku.rarity, Some(Rarity::Ssr));
    assert_eq!(goku.base_hp.as_deref(), Some("5000"));
    assert_eq!(goku.max_hp.as_deref(), Some("12000"));
    assert_eq!(goku.leader_skill.as_deref(), Some("Saiyans Category Ki +3"));
    assert_eq!(goku.links, vec!["Saiyan Warrior Race", "Prepared for Battle"]);
    assert_eq!(goku.categories, vec!["Pure Saiyans", "Goku's Family"]);
    assert_eq!(
        goku.wiki_url,
        "https://dbz-dokkanbattle.fandom.com/wiki/Goku_SSR"
    );

    let broly = store.get_card("Broly LR").unwrap().unwrap().card;
    assert_eq!(broly.rarity, Some(Rarity::Lr));
    assert_eq!(broly.max_level.as_deref(), Some("150"));
}

#[tokio::test]
async fn resync_overwrites_with_identical_records() {
    let wiki = sample_wiki();
    let mut store = Store::open_in_memory().unwrap();
    let config = quiet_config();

    run_sync(&wiki, &mut store, &config, SyncMode::Full)
        .await
        .unwrap();
    let first = store.get_card("Vegeta SSR").unwrap().unwrap();

    let report = run_sync(&wiki, &mut store, &config, SyncMode::Resync)
        .await
        .unwrap();
    let second = store.get_card("Vegeta SSR").unwrap().unwrap();

    assert_eq!(report.total_in_db, 3);
    assert_eq!(first.card, second.card);
    assert!(second.synced_at.is_some());
}

#[tokio::test]
async fn fetch_failures_do_not_stop_the_batch() {
    let wiki = sample_wiki().with_broken("Vegeta SSR");
    let mut store = Store::open_in_memory().unwrap();

    let report = run_sync(&wiki, &mut store, &quiet_config(), SyncMode::Full)
        .await
        .unwrap();

    assert_eq!(report.failed, 1);
    assert_eq!(report.synced, 2);
    assert!(store.get_card("Vegeta SSR").unwrap().is_none());
    assert!(store.get_card("Goku SSR").unwrap().is_some());
}

#[tokio::test]
async fn no_discovered_titles_is_an_error() {
    let wiki = FakeWiki::default().with_page(SCHEDULE_PAGE, "[[Goku SSR]]");
    let mut store = Store::open_in_memory().unwrap();

    let result = run_sync(&wiki, &mut store, &quiet_config(), SyncMode::Full).await;
    assert!(result.is_err());
    assert!(wiki.fetched().is_empty());
}

// ---------------------------------------------------------------------------
// Update mode
// ---------------------------------------------------------------------------

#[tokio::test]
async fn update_fetches_only_new_and_recently_edited() {
    let wiki = sample_wiki().with_recent(&["Goku SSR", "Some Article", "File:Goku.png"]);
    let mut store = Store::open_in_memory().unwrap();

    // Seed the store with a first full run, then forget what was fetched.
    run_sync(&wiki, &mut store, &quiet_config(), SyncMode::Full)
        .await
        .unwrap();
    wiki.fetched.lock().unwrap().clear();

    let report = run_sync(&wiki, &mut store, &quiet_config(), SyncMode::Update)
        .await
        .unwrap();

    // Stored: Broly, Goku, Vegeta. Never stored: Missing Card, Shenron Gallery.
    assert_eq!(report.attempted, 3);
    assert_eq!(
        wiki.fetched(),
        vec!["Goku SSR", "Missing Card", "Shenron Gallery", SCHEDULE_PAGE]
    );
}

#[tokio::test]
async fn update_with_nothing_changed_still_refreshes_schedule() {
    let wiki = FakeWiki::default()
        .with_category("Category:UR", &["Goku SSR"])
        .with_page("Goku SSR", &card_page("Goku", "AGL", "UR"))
        .with_page(SCHEDULE_PAGE, "[[Goku SSR]]");
    let mut store = Store::open_in_memory().unwrap();

    run_sync(&wiki, &mut store, &quiet_config(), SyncMode::Full)
        .await
        .unwrap();
    let report = run_sync(&wiki, &mut store, &quiet_config(), SyncMode::Update)
        .await
        .unwrap();

    assert_eq!(report.attempted, 0);
    assert_eq!(report.synced, 0);
    assert_eq!(report.scheduled, 1);
}

// ---------------------------------------------------------------------------
// Schedule
// ---------------------------------------------------------------------------

#[tokio::test]
async fn schedule_copies_known_cards_and_stubs_unknown() {
    let wiki = sample_wiki();
    let mut store = Store::open_in_memory().unwrap();

    let report = run_sync(&wiki, &mut store, &quiet_config(), SyncMode::Full)
        .await
        .unwrap();
    assert_eq!(report.scheduled, 2);

    let entries = store.schedule(None).unwrap();
    assert_eq!(entries[0].title, "Goku Title");
    assert_eq!(entries[0].name.as_deref(), Some("Goku"));
    assert_eq!(entries[0].rarity.as_deref(), Some("SSR"));
    assert_eq!(entries[1].title, "New Gohan");
    assert_eq!(entries[1].name, None);
    assert_eq!(
        entries[1].wiki_url.as_deref(),
        Some("https://dbz-dokkanbattle.fandom.com/wiki/New_Gohan")
    );

    let agl = store.schedule(Some("agl")).unwrap();
    assert_eq!(agl.len(), 1);
}

#[tokio::test]
async fn missing_schedule_page_keeps_previous_schedule() {
    let mut wiki = sample_wiki();
    wiki.pages.remove(SCHEDULE_PAGE);
    let mut store = Store::open_in_memory().unwrap();
    let previous = ScheduleEntry {
        title: "Old Entry".to_string(),
        name: None,
        card_type: None,
        rarity: None,
        image: None,
        wiki_url: None,
        synced_at: "2024-01-01T00:00:00".to_string(),
    };
    store.replace_schedule(&[previous.clone()]).unwrap();

    let report = run_sync(&wiki, &mut store, &quiet_config(), SyncMode::Full)
        .await
        .unwrap();

    assert_eq!(report.scheduled, 0);
    assert_eq!(store.schedule(None).unwrap(), vec![previous]);
}

// ---------------------------------------------------------------------------
// Shared database file
// ---------------------------------------------------------------------------

#[tokio::test]
async fn foreign_tables_survive_a_sync() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("dokkan.db");

    {
        let store = Store::open(&path).unwrap();
        store
            .connection()
            .execute_batch(
                "CREATE TABLE community_teams (id INTEGER PRIMARY KEY, name TEXT);
                 INSERT INTO community_teams (name) VALUES ('Saiyan Pride');",
            )
            .unwrap();
    }

    let wiki = sample_wiki();
    let mut store = Store::open(&path).unwrap();
    run_sync(&wiki, &mut store, &quiet_config(), SyncMode::Resync)
        .await
        .unwrap();
    drop(store);

    let store = Store::open(&path).unwrap();
    let team: String = store
        .connection()
        .query_row("SELECT name FROM community_teams", [], |row| row.get(0))
        .unwrap();
    assert_eq!(team, "Saiyan Pride");
    assert_eq!(store.stats().unwrap().cards, 3);
}

#[tokio::test]
async fn synced_cards_are_searchable() {
    let wiki = sample_wiki();
    let mut store = Store::open_in_memory().unwrap();
    run_sync(&wiki, &mut store, &quiet_config(), SyncMode::Full)
        .await
        .unwrap();

    let query = CardQuery {
        text: "saiyan".to_string(),
        limit: 10,
        ..CardQuery::default()
    };
    let found = store.search_cards(&query).unwrap();
    assert_eq!(found.len(), 1);
    assert_eq!(found[0].card.page_title, "Broly LR");
}

// ============================================================================
// Batching and throttling
// ============================================================================

const FETCH_LATENCY: Duration = Duration::from_millis(10);

struct SlowWiki {
    inner: FakeWiki,
    in_flight: AtomicUsize,
    peak: AtomicUsize,
}

impl SlowWiki {
    fn new(inner: FakeWiki) -> Self {
        Self {
            inner,
            in_flight: AtomicUsize::new(0),
            peak: AtomicUsize::new(0),
        }
    }

    fn peak(&self) -> usize {
        self.peak.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl WikiSource for SlowWiki {
    async fn category_members(
        &self,
        category: &str,
        cont: Option<&str>,
    ) -> Result<Listing, WikiError> {
        self.inner.category_members(category, cont).await
    }

    async fn recent_changes(
        &self,
        window: RecentWindow,
        cont: Option<&str>,
    ) -> Result<Listing, WikiError> {
        self.inner.recent_changes(window, cont).await
    }

    async fn page_wikitext(&self, title: &str) -> Result<Option<String>, WikiError> {
        let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.peak.fetch_max(now, Ordering::SeqCst);
        tokio::time::sleep(FETCH_LATENCY).await;
        let result = self.inner.page_wikitext(title).await;
        self.in_flight.fetch_sub(1, Ordering::SeqCst);
        result
    }
}

fn six_card_wiki() -> SlowWiki {
    let titles = ["Card A", "Card B", "Card C", "Card D", "Card E", "Card F"];
    let mut wiki = FakeWiki::default().with_category("Category:UR", &titles);
    for title in titles {
        wiki = wiki.with_page(title, &card_page(title, "PHY", "UR"));
    }
    SlowWiki::new(wiki.with_page(SCHEDULE_PAGE, "* [[Card A]]"))
}

fn throttled_config(batch_size: usize, batch_delay: Duration) -> SyncConfig {
    SyncConfig {
        batch_size,
        batch_delay,
        show_progress: false,
        ..SyncConfig::default().without_delays()
    }
}

#[tokio::test(start_paused = true)]
async fn batch_pages_are_fetched_concurrently_and_batches_are_spaced() {
    let wiki = six_card_wiki();
    let mut store = Store::open_in_memory().unwrap();
    let batch_delay = Duration::from_millis(500);
    let config = throttled_config(3, batch_delay);

    let start = tokio::time::Instant::now();
    let report = run_sync(&wiki, &mut store, &config, SyncMode::Full)
        .await
        .unwrap();
    let elapsed = start.elapsed();

    assert_eq!(report.synced, 6);
    assert_eq!(wiki.peak(), 3);
    // Two batches: one pause between them.
    assert!(elapsed >= batch_delay, "elapsed {elapsed:?}");
    // Six sequential fetches alone would add 60ms on top of the pause.
    assert!(elapsed < batch_delay + 6 * FETCH_LATENCY, "elapsed {elapsed:?}");
}

#[tokio::test(start_paused = true)]
async fn batch_size_one_fetches_pages_one_at_a_time() {
    let wiki = six_card_wiki();
    let mut store = Store::open_in_memory().unwrap();
    let batch_delay = Duration::from_millis(100);
    let config = throttled_config(1, batch_delay);

    let start = tokio::time::Instant::now();
    let report = run_sync(&wiki, &mut store, &config, SyncMode::Full)
        .await
        .unwrap();

    assert_eq!(report.synced, 6);
    assert_eq!(wiki.peak(), 1);
    assert!(start.elapsed() >= 5 * batch_delay + 6 * FETCH_LATENCY);
}
