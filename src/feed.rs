use std::time::Duration;

use anyhow::{Context, Result};
use rss::Channel;
use url::Url;

use crate::http::HttpClient;

const FEED_ATTEMPTS: usize = 3;
const FEED_RETRY_DELAY: Duration = Duration::from_secs(2);

/// One `<item>` of a showRSS feed. Any field may be missing.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FeedEntry {
    pub title: Option<String>,
    pub link: Option<String>,
    pub episode_id: Option<String>,
    pub show_name: Option<String>,
}

pub fn normalize_feed_url(raw: &str) -> Result<Url> {
    let mut url =
        Url::parse(raw.trim()).with_context(|| format!("invalid feed url \"{raw}\""))?;
    if !has_query_flag(&url, "namespaces") {
        url.query_pairs_mut().append_pair("namespaces", "true");
    }
    Ok(url)
}

pub fn wants_magnets(url: &Url) -> bool {
    has_query_flag(url, "magnets")
}

fn has_query_flag(url: &Url, key: &str) -> bool {
    url.query_pairs()
        .any(|(k, v)| k == key && v.eq_ignore_ascii_case("true"))
}

pub fn fetch_feed(url: &Url, timeout: Duration) -> Result<Vec<FeedEntry>> {
    let body = HttpClient::new(timeout, timeout)
        .with_retries(FEED_ATTEMPTS, FEED_RETRY_DELAY)
        .get_text(url.as_str())
        .with_context(|| format!("failed to fetch feed \"{url}\""))?;
    parse_feed(&body).with_context(|| format!("bad feed in \"{url}\""))
}

pub fn parse_feed(xml: &str) -> Result<Vec<FeedEntry>> {
    let channel = xml.parse::<Channel>().context("RSS parse error")?;
    Ok(channel.items().iter().map(entry_from_item).collect())
}

fn entry_from_item(item: &rss::Item) -> FeedEntry {
    FeedEntry {
        title: non_empty(item.title()),
        link: non_empty(item.link()),
        // Current feeds use `tv:episode_id`, older ones `showrss:episode`.
        episode_id: extension_value(item, "episode_id")
            .or_else(|| extension_value(item, "episode")),
        show_name: extension_value(item, "show_name"),
    }
}

fn extension_value(item: &rss::Item, name: &str) -> Option<String> {
    item.extensions()
        .values()
        .filter_map(|elements| elements.get(name))
        .flatten()
        .find_map(|ext| non_empty(ext.value()))
}

fn non_empty(value: Option<&str>) -> Option<String> {
    value
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .map(str::to_string)
}
