use std::time::Duration;

/// MediaWiki API endpoint of the Dokkan Battle wiki
pub const WIKI_API: &str = "https://dbz-dokkanbattle.fandom.com/api.php";

/// Article URLs are `WIKI_BASE_URL` + title with spaces replaced by underscores
pub const WIKI_BASE_URL: &str = "https://dbz-dokkanbattle.fandom.com/wiki/";

pub const USER_AGENT: &str =
    "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 dokkan-sync";

pub const DEFAULT_DB_PATH: &str = "dokkan.db";

/// Titles fetched concurrently per batch
pub const BATCH_SIZE: usize = 50;

/// Pause between batches
pub const BATCH_DELAY_MS: u64 = 300;

/// Pause between continuation pages of a listing
pub const PAGE_DELAY_MS: u64 = 200;

/// Pause between rarity categories during discovery
pub const CATEGORY_DELAY_MS: u64 = 300;

pub const REQUEST_TIMEOUT_SECS: u64 = 20;

/// Trailing window for the recent-changes feed in update mode
pub const RECENT_WINDOW_HOURS: i64 = 24;

/// Page size for category and recent-changes listings (API maximum)
pub const LISTING_LIMIT: u32 = 500;

/// One category per rarity tier; together they cover every card page.
pub const RARITY_CATEGORIES: [&str; 6] = [
    "Category:LR",
    "Category:UR",
    "Category:SSR",
    "Category:SR",
    "Category:R",
    "Category:N",
];

pub const SCHEDULE_PAGE: &str = "Upcoming Cards";

/// Upper bound on schedule entries kept per refresh
pub const SCHEDULE_LIMIT: usize = 50;

/// Link targets with these prefixes are never cards
pub const NON_CARD_PREFIXES: [&str; 6] =
    ["File:", "Image:", "Category:", "Template:", "User:", "Talk:"];

/// Upper bound on innermost-template stripping passes in the cleaner
pub const CLEAN_MAX_PASSES: usize = 64;

/// Runtime settings for one sync run.
#[derive(Debug, Clone)]
pub struct SyncConfig {
    pub api_url: String,
    pub batch_size: usize,
    pub batch_delay: Duration,
    pub page_delay: Duration,
    pub category_delay: Duration,
    pub request_timeout: Duration,
    pub recent_window_hours: i64,
    pub show_progress: bool,
}

impl SyncConfig {
    /// Same settings with every throttle removed.
    pub fn without_delays(mut self) -> Self {
        self.batch_delay = Duration::ZERO;
        self.page_delay = Duration::ZERO;
        self.category_delay = Duration::ZERO;
        self
    }
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            api_url: WIKI_API.to_string(),
            batch_size: BATCH_SIZE,
            batch_delay: Duration::from_millis(BATCH_DELAY_MS),
            page_delay: Duration::from_millis(PAGE_DELAY_MS),
            category_delay: Duration::from_millis(CATEGORY_DELAY_MS),
            request_timeout: Duration::from_secs(REQUEST_TIMEOUT_SECS),
            recent_window_hours: RECENT_WINDOW_HOURS,
            show_progress: true,
        }
    }
}

/// Sleeps for `delay` unless it is zero.
pub async fn pause(delay: Duration) {
    if !delay.is_zero() {
        tokio::time::sleep(delay).await;
    }
}

/// Canonical article URL for a page title.
pub fn wiki_url(page_title: &str) -> String {
    format!("{}{}", WIKI_BASE_URL, page_title.replace(' ', "_"))
}
