//! MediaWiki API access.
//!
//! [`WikiSource`] is the seam between the pipeline and the network: discovery,
//! card sync and the schedule scraper only ever talk to the trait. [`WikiClient`]
//! is the HTTP implementation used by the binary.

use crate::config::{SyncConfig, LISTING_LIMIT, USER_AGENT};
use crate::error::WikiError;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use reqwest::Client;
use serde::Deserialize;
use tracing::debug;

/// One page of a paginated listing.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Listing {
    pub titles: Vec<String>,
    /// Continuation token for the next page, if any
    pub next: Option<String>,
}

/// Time range for the recent-changes feed, newest first.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RecentWindow {
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
}

impl RecentWindow {
    /// The `hours` leading up to `now`.
    pub fn trailing(now: DateTime<Utc>, hours: i64) -> Self {
        Self {
            start: now,
            end: now - chrono::Duration::hours(hours),
        }
    }
}

#[async_trait]
pub trait WikiSource: Send + Sync {
    /// Main-namespace pages in `category`, one page of results.
    async fn category_members(
        &self,
        category: &str,
        cont: Option<&str>,
    ) -> Result<Listing, WikiError>;

    /// Titles of edits and page creations inside `window`, one page of results.
    async fn recent_changes(
        &self,
        window: RecentWindow,
        cont: Option<&str>,
    ) -> Result<Listing, WikiError>;

    /// Raw wikitext of `title`; `None` when the page does not exist.
    async fn page_wikitext(&self, title: &str) -> Result<Option<String>, WikiError>;
}

#[derive(Debug, Deserialize)]
struct QueryResponse {
    #[serde(default)]
    query: Option<QueryBody>,
    #[serde(rename = "continue", default)]
    continuation: Option<Continuation>,
    #[serde(default)]
    error: Option<ApiErrorBody>,
}

#[derive(Debug, Default, Deserialize)]
struct QueryBody {
    #[serde(default)]
    categorymembers: Vec<PageRef>,
    #[serde(default)]
    recentchanges: Vec<PageRef>,
}

#[derive(Debug, Deserialize)]
struct PageRef {
    #[serde(default)]
    title: String,
}

#[derive(Debug, Default, Deserialize)]
struct Continuation {
    cmcontinue: Option<String>,
    rccontinue: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ParseResponse {
    #[serde(default)]
    parse: Option<ParseBody>,
    #[serde(default)]
    error: Option<ApiErrorBody>,
}

#[derive(Debug, Deserialize)]
struct ParseBody {
    #[serde(default)]
    wikitext: String,
}

#[derive(Debug, Deserialize)]
struct ApiErrorBody {
    code: String,
    #[serde(default)]
    info: String,
}

impl From<ApiErrorBody> for WikiError {
    fn from(e: ApiErrorBody) -> Self {
        WikiError::Api {
            code: e.code,
            info: e.info,
        }
    }
}

/// HTTP client for the wiki's `api.php`, shared for a whole run.
pub struct WikiClient {
    client: Client,
    api_url: String,
}

impl WikiClient {
    pub fn new(config: &SyncConfig) -> Result<Self, WikiError> {
        let client = Client::builder()
            .user_agent(USER_AGENT)
            .timeout(config.request_timeout)
            .build()?;
        Ok(Self {
            client,
            api_url: config.api_url.clone(),
        })
    }

    async fn get<T: for<'de> Deserialize<'de>>(
        &self,
        action: &'static str,
        params: &[(&str, &str)],
    ) -> Result<T, WikiError> {
        debug!(action, ?params, "Wiki API request");
        let response = self
            .client
            .get(&self.api_url)
            .query(&[("action", action), ("format", "json")])
            .query(params)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            return Err(WikiError::Status { action, status });
        }
        Ok(response.json::<T>().await?)
    }
}

#[async_trait]
impl WikiSource for WikiClient {
    async fn category_members(
        &self,
        category: &str,
        cont: Option<&str>,
    ) -> Result<Listing, WikiError> {
        let limit = LISTING_LIMIT.to_string();
        let params = category_params(category, &limit, cont);
        let response: QueryResponse = self.get("query", &params).await?;
        category_listing(response)
    }

    async fn recent_changes(
        &self,
        window: RecentWindow,
        cont: Option<&str>,
    ) -> Result<Listing, WikiError> {
        let limit = LISTING_LIMIT.to_string();
        let start = format_api_timestamp(window.start);
        let end = format_api_timestamp(window.end);
        let params = recent_params(&start, &end, &limit, cont);
        let response: QueryResponse = self.get("query", &params).await?;
        recent_listing(response)
    }

    async fn page_wikitext(&self, title: &str) -> Result<Option<String>, WikiError> {
        let params = parse_params(title);
        let response: ParseResponse = self.get("parse", &params).await?;
        parsed_wikitext(response)
    }
}

/// Main-namespace pages only, subcategories and files excluded.
fn category_params<'a>(
    category: &'a str,
    limit: &'a str,
    cont: Option<&'a str>,
) -> Vec<(&'a str, &'a str)> {
    let mut params = vec![
        ("list", "categorymembers"),
        ("cmtitle", category),
        ("cmlimit", limit),
        ("cmtype", "page"),
    ];
    if let Some(token) = cont {
        params.push(("cmcontinue", token));
    }
    params
}

/// Edits and page creations in the main namespace, titles only.
fn recent_params<'a>(
    start: &'a str,
    end: &'a str,
    limit: &'a str,
    cont: Option<&'a str>,
) -> Vec<(&'a str, &'a str)> {
    let mut params = vec![
        ("list", "recentchanges"),
        ("rcstart", start),
        ("rcend", end),
        ("rclimit", limit),
        ("rcnamespace", "0"),
        ("rctype", "edit|new"),
        ("rcprop", "title"),
    ];
    if let Some(token) = cont {
        params.push(("rccontinue", token));
    }
    params
}

fn parse_params(title: &str) -> [(&str, &str); 3] {
    [("page", title), ("prop", "wikitext"), ("formatversion", "2")]
}

fn format_api_timestamp(ts: DateTime<Utc>) -> String {
    ts.format("%Y-%m-%dT%H:%M:%SZ").to_string()
}

fn category_listing(response: QueryResponse) -> Result<Listing, WikiError> {
    if let Some(error) = response.error {
        return Err(error.into());
    }
    Ok(Listing {
        titles: response
            .query
            .unwrap_or_default()
            .categorymembers
            .into_iter()
            .map(|p| p.title)
            .filter(|t| !t.is_empty())
            .collect(),
        next: response.continuation.and_then(|c| c.cmcontinue),
    })
}

fn recent_listing(response: QueryResponse) -> Result<Listing, WikiError> {
    if let Some(error) = response.error {
        return Err(error.into());
    }
    Ok(Listing {
        titles: response
            .query
            .unwrap_or_default()
            .recentchanges
            .into_iter()
            .map(|p| p.title)
            .filter(|t| !t.is_empty())
            .collect(),
        next: response.continuation.and_then(|c| c.rccontinue),
    })
}

fn parsed_wikitext(response: ParseResponse) -> Result<Option<String>, WikiError> {
    match (response.parse, response.error) {
        (Some(body), _) => Ok(Some(body.wikitext)),
        (None, Some(error)) if error.code == "missingtitle" => Ok(None),
        (None, Some(error)) => Err(error.into()),
        (None, None) => Ok(None),
    }
}
