// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

use chrono::{DateTime, FixedOffset, Utc};
use sha2::{Digest, Sha256};

/// A parsed podcast feed
#[derive(Debug, Clone)]
pub struct ParsedFeed {
    pub title: String,
    pub image_url: Option<String>,
    pub feed_url: String,
    pub episodes: Vec<ParsedEpisode>,
}

/// One feed entry, normalized for persistence
#[derive(Debug, Clone)]
pub struct ParsedEpisode {
    /// Feed-supplied GUID, or a hash derived from the entry link
    pub id: String,
    pub title: String,
    pub link: Option<String>,
    /// Resolved enclosure URL
    pub direct_link: Option<String>,
    pub summary: Option<String>,
    pub published_raw: Option<String>,
    /// RFC 3339 in UTC, computed once at parse time
    pub published_normalized: Option<String>,
    pub episode_number: Option<i64>,
    pub season_number: Option<i64>,
    pub episode_image_url: Option<String>,
}

/// Parse RSS feed XML bytes into a [`ParsedFeed`]
pub fn parse_feed(xml_bytes: &[u8], feed_url: &str) -> Result<ParsedFeed, rss::Error> {
    let channel = rss::Channel::read_from(xml_bytes)?;

    let image_url = channel
        .image()
        .map(|img| img.url().to_string())
        .or_else(|| {
            channel
                .itunes_ext()
                .and_then(|ext| ext.image())
                .map(String::from)
        })
        .filter(|url| !url.is_empty());

    let episodes = channel.items().iter().map(parse_item).collect();

    let title = channel.title().trim().to_string();
    Ok(ParsedFeed {
        title: if title.is_empty() {
            "unknown_podcast".to_string()
        } else {
            title
        },
        image_url,
        feed_url: feed_url.to_string(),
        episodes,
    })
}

fn parse_item(item: &rss::Item) -> ParsedEpisode {
    let title = item
        .title()
        .map(|t| t.trim().to_string())
        .filter(|t| !t.is_empty())
        .unwrap_or_else(|| "Untitled Episode".to_string());

    let link = item.link().map(String::from).filter(|l| !l.is_empty());
    let direct_link = item
        .enclosure()
        .map(|enc| enc.url().to_string())
        .filter(|u| !u.is_empty());

    let id = item
        .guid()
        .map(|guid| guid.value().to_string())
        .filter(|v| !v.is_empty())
        .unwrap_or_else(|| {
            let basis = link
                .as_deref()
                .or(direct_link.as_deref())
                .unwrap_or(&title);
            derived_id(basis)
        });

    let published_raw = item.pub_date().map(String::from);
    let published_normalized = published_raw
        .as_deref()
        .and_then(parse_pub_date)
        .map(|dt| dt.with_timezone(&Utc).to_rfc3339());

    let summary = item
        .description()
        .map(|d| html_escape::decode_html_entities(d).trim().to_string())
        .filter(|s| !s.is_empty());

    let itunes = item.itunes_ext();

    ParsedEpisode {
        id,
        title,
        link,
        direct_link,
        summary,
        published_raw,
        published_normalized,
        episode_number: itunes
            .and_then(|ext| ext.episode())
            .and_then(|v| v.trim().parse().ok()),
        season_number: itunes
            .and_then(|ext| ext.season())
            .and_then(|v| v.trim().parse().ok()),
        episode_image_url: itunes
            .and_then(|ext| ext.image())
            .map(String::from)
            .filter(|u| !u.is_empty()),
    }
}

/// Stable identifier for entries without a GUID
fn derived_id(source: &str) -> String {
    let digest = Sha256::digest(source.as_bytes());
    digest.iter().map(|b| format!("{:02x}", b)).collect()
}

/// Parse publication dates, tolerating common non-RFC-2822 formats
fn parse_pub_date(date_str: &str) -> Option<DateTime<FixedOffset>> {
    if let Ok(dt) = DateTime::parse_from_rfc2822(date_str) {
        return Some(dt);
    }
    if let Ok(dt) = DateTime::parse_from_rfc3339(date_str) {
        return Some(dt);
    }

    let formats = ["%a, %d %b %Y %H:%M:%S %z", "%Y-%m-%d %H:%M:%S %z"];
    for format in formats {
        if let Ok(dt) = DateTime::parse_from_str(date_str, format) {
            return Some(dt);
        }
    }

    None
}
