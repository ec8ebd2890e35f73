use crate::card::dedup_preserving_order;
use crate::config::{wiki_url, NON_CARD_PREFIXES, SCHEDULE_LIMIT, SCHEDULE_PAGE};
use crate::content::extract_link_targets;
use crate::models::ScheduleEntry;
use crate::store::Store;
use crate::wiki::WikiSource;
use anyhow::Result;
use chrono::Utc;
use tracing::{info, warn};

/// Candidate card titles linked from the schedule page, first-seen order, capped.
pub fn schedule_titles(wikitext: &str) -> Vec<String> {
    let targets = extract_link_targets(wikitext)
        .into_iter()
        .filter(|t| !NON_CARD_PREFIXES.iter().any(|p| t.starts_with(p)))
        .collect();
    let mut titles = dedup_preserving_order(targets);
    titles.truncate(SCHEDULE_LIMIT);
    titles
}

/// One entry per title, copying card fields when the title is already synced.
pub fn build_entries(
    store: &Store,
    titles: &[String],
    synced_at: &str,
) -> Result<Vec<ScheduleEntry>> {
    titles
        .iter()
        .map(|title| {
            let entry = match store.find_schedule_match(title)? {
                Some(found) => ScheduleEntry {
                    title: found.title.unwrap_or_else(|| title.clone()),
                    name: found.name,
                    card_type: found.card_type,
                    rarity: found.rarity,
                    image: found.image,
                    wiki_url: found.wiki_url,
                    synced_at: synced_at.to_string(),
                },
                None => ScheduleEntry {
                    title: title.clone(),
                    name: None,
                    card_type: None,
                    rarity: None,
                    image: None,
                    wiki_url: Some(wiki_url(title)),
                    synced_at: synced_at.to_string(),
                },
            };
            Ok(entry)
        })
        .collect()
}

/// Rebuilds the schedule table from the upcoming-releases page.
///
/// When the page cannot be fetched or lists nothing, the previous schedule is
/// left in place and `0` is returned.
pub async fn refresh_schedule<S: WikiSource + ?Sized>(
    source: &S,
    store: &mut Store,
) -> Result<usize> {
    let wikitext = match source.page_wikitext(SCHEDULE_PAGE).await {
        Ok(Some(text)) if !text.trim().is_empty() => text,
        Ok(_) => {
            warn!(page = SCHEDULE_PAGE, "Schedule page returned no wikitext");
            return Ok(0);
        }
        Err(e) => {
            warn!(page = SCHEDULE_PAGE, error = %e, "Failed to fetch schedule page");
            return Ok(0);
        }
    };

    let titles = schedule_titles(&wikitext);
    if titles.is_empty() {
        warn!(page = SCHEDULE_PAGE, "No card entries found on schedule page");
        return Ok(0);
    }
    info!(entries = titles.len(), "Found upcoming card entries");

    let synced_at = Utc::now().format("%Y-%m-%dT%H:%M:%S").to_string();
    let entries = build_entries(store, &titles, &synced_at)?;
    let written = store.replace_schedule(&entries)?;
    info!(written, "Schedule table rebuilt");
    Ok(written)
}
