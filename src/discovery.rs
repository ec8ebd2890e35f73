use crate::config::{pause, SyncConfig, RARITY_CATEGORIES};
use crate::wiki::{RecentWindow, WikiSource};
use rustc_hash::FxHashSet;
use std::collections::BTreeSet;
use tracing::{info, warn};

/// Every card title across the rarity categories, sorted and de-duplicated.
///
/// A category whose listing fails part-way keeps whatever was collected before the
/// failure; the caller decides whether an empty result is fatal.
pub async fn discover_all_titles<S: WikiSource + ?Sized>(
    source: &S,
    config: &SyncConfig,
) -> Vec<String> {
    let mut titles = BTreeSet::new();

    for (i, category) in RARITY_CATEGORIES.iter().enumerate() {
        if i > 0 {
            pause(config.category_delay).await;
        }
        let mut cont: Option<String> = None;
        loop {
            let listing = match source.category_members(category, cont.as_deref()).await {
                Ok(listing) => listing,
                Err(e) => {
                    warn!(category, error = %e, "Category listing failed");
                    break;
                }
            };
            titles.extend(listing.titles);
            match listing.next {
                Some(next) => {
                    cont = Some(next);
                    pause(config.page_delay).await;
                }
                None => break,
            }
        }
        info!(category, total = titles.len(), "Category listed");
    }

    info!(titles = titles.len(), "Discovered card pages");
    titles.into_iter().collect()
}

/// Main-namespace titles edited or created inside `window`, de-duplicated.
///
/// Titles containing a namespace separator (`File:`, `Category:` ...) are dropped.
/// A failed page ends the walk with what was gathered so far.
pub async fn recently_changed_titles<S: WikiSource + ?Sized>(
    source: &S,
    window: RecentWindow,
    config: &SyncConfig,
) -> FxHashSet<String> {
    let mut titles = FxHashSet::default();
    let mut cont: Option<String> = None;

    loop {
        let listing = match source.recent_changes(window, cont.as_deref()).await {
            Ok(listing) => listing,
            Err(e) => {
                warn!(error = %e, "Recent changes listing failed");
                break;
            }
        };
        titles.extend(listing.titles.into_iter().filter(|t| !t.contains(':')));
        match listing.next {
            Some(next) => {
                cont = Some(next);
                pause(config.page_delay).await;
            }
            None => break,
        }
    }

    titles
}

/// Titles to fetch in update mode: (all - known) ∪ (recent ∩ all), in `all` order.
pub fn incremental_titles(
    all: &[String],
    known: &FxHashSet<String>,
    recent: &FxHashSet<String>,
) -> Vec<String> {
    let selected: Vec<String> = all
        .iter()
        .filter(|t| !known.contains(*t) || recent.contains(*t))
        .cloned()
        .collect();

    let new = all.iter().filter(|t| !known.contains(*t)).count();
    info!(
        new,
        edited = selected.len() - new,
        total = selected.len(),
        "Selected titles for update"
    );
    selected
}
