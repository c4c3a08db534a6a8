use std::fmt;

use tracing::{info, warn};

use crate::cache::RotatingCache;
use crate::cli::CacheKey;
use crate::dispatch::{Dispatcher, validate_magnet};
use crate::feed::FeedEntry;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Field {
    Title,
    Link,
    EpisodeId,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum EntryOutcome {
    Dispatched(String),
    SkippedDuplicate,
    SkippedMissingField(Field),
    SkippedMalformed(String),
    Failed(String),
}

/// Handles one entry: required fields, dedup, hand-off, bookkeeping.
pub(crate) fn process_entry<D: Dispatcher + ?Sized>(
    entry: &FeedEntry,
    key: CacheKey,
    dispatcher: &mut D,
    cache: &mut RotatingCache,
) -> EntryOutcome {
    let Some(title) = entry.title.as_deref() else {
        warn!("Item with missing title found ... skipping");
        return EntryOutcome::SkippedMissingField(Field::Title);
    };

    let Some(link) = entry.link.as_deref() else {
        warn!("Entry \"{title}\": no link available ... skipping");
        return EntryOutcome::SkippedMissingField(Field::Link);
    };

    let id = match key {
        CacheKey::Episode => match entry.episode_id.as_deref() {
            Some(id) => id.to_string(),
            None => {
                warn!("Entry \"{title}\": no episode id available ... skipping");
                return EntryOutcome::SkippedMissingField(Field::EpisodeId);
            }
        },
        CacheKey::Hash => match validate_magnet(link) {
            Ok(hash) => hash.to_ascii_lowercase(),
            Err(err) => {
                warn!("Entry \"{title}\": {err} ... skipping");
                return EntryOutcome::SkippedMalformed(err.to_string());
            }
        },
    };

    if cache.contains(&id) {
        info!("Entry \"{title}\" already downloaded ... skipping");
        return EntryOutcome::SkippedDuplicate;
    }

    match dispatcher.send(link) {
        Ok(()) => {
            match entry.show_name.as_deref() {
                Some(show) => info!("Entry \"{title}\" of {show} sent"),
                None => info!("Entry \"{title}\" sent"),
            }
            cache.add(id.clone());
            EntryOutcome::Dispatched(id)
        }
        Err(err) => {
            warn!("Entry \"{title}\": {err} ... skipping");
            if err.is_malformed() {
                EntryOutcome::SkippedMalformed(err.to_string())
            } else {
                EntryOutcome::Failed(err.to_string())
            }
        }
    }
}

/// Walks the feed oldest first; showRSS lists the newest entry at the top.
pub(crate) fn process_entries<D: Dispatcher + ?Sized>(
    entries: &[FeedEntry],
    key: CacheKey,
    dispatcher: &mut D,
    cache: &mut RotatingCache,
) -> Vec<EntryOutcome> {
    entries
        .iter()
        .rev()
        .map(|entry| process_entry(entry, key, dispatcher, cache))
        .collect()
}

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub(crate) struct RunSummary {
    pub(crate) dispatched: usize,
    pub(crate) duplicates: usize,
    pub(crate) skipped: usize,
    pub(crate) failed: usize,
}

impl RunSummary {
    pub(crate) fn from_outcomes(outcomes: &[EntryOutcome]) -> Self {
        let mut summary = Self::default();
        for outcome in outcomes {
            match outcome {
                EntryOutcome::Dispatched(_) => summary.dispatched += 1,
                EntryOutcome::SkippedDuplicate => summary.duplicates += 1,
                EntryOutcome::SkippedMissingField(_) | EntryOutcome::SkippedMalformed(_) => {
                    summary.skipped += 1
                }
                EntryOutcome::Failed(_) => summary.failed += 1,
            }
        }
        summary
    }
}

impl fmt::Display for RunSummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} new, {} already downloaded, {} skipped, {} failed",
            self.dispatched, self.duplicates, self.skipped, self.failed
        )
    }
}
