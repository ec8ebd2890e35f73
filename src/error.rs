use thiserror::Error;

/// Failures talking to the wiki API.
#[derive(Error, Debug)]
pub enum WikiError {
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("wiki API returned status {status} for {action}")]
    Status {
        action: &'static str,
        status: reqwest::StatusCode,
    },

    #[error("wiki API error {code}: {info}")]
    Api { code: String, info: String },
}

/// Why a fetched page was not stored. These are expected outcomes, not failures.
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum SkipReason {
    #[error("page has no wikitext")]
    MissingWikitext,

    #[error("not a card page")]
    NotACardPage,

    #[error("card has neither type nor rarity")]
    UnusableRecord,
}

/// Result of fetching and parsing a single title.
#[derive(Error, Debug)]
pub enum CardError {
    #[error(transparent)]
    Skip(#[from] SkipReason),

    #[error(transparent)]
    Wiki(#[from] WikiError),
}
