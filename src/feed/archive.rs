// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

/// Extract the original `<item>` element for one episode and re-wrap it
/// in a minimal channel so the fragment stands alone as valid RSS.
///
/// Entries are matched by GUID first, then by link, then by title, which
/// also covers episodes whose stored id was derived rather than supplied
/// by the feed. Returns `Ok(None)` when no entry matches.
pub fn extract_item_xml(
    feed_xml: &[u8],
    episode_id: &str,
    title: &str,
    link: Option<&str>,
) -> Result<Option<String>, rss::Error> {
    let channel = rss::Channel::read_from(feed_xml)?;

    let item = channel
        .items()
        .iter()
        .find(|item| matches_episode(item, episode_id, title, link));

    match item {
        Some(item) => render_fragment(&channel, item).map(Some),
        None => Ok(None),
    }
}

fn matches_episode(item: &rss::Item, episode_id: &str, title: &str, link: Option<&str>) -> bool {
    if let Some(guid) = item.guid() {
        let value = guid.value();
        if !value.is_empty() && (value == episode_id || value.contains(episode_id)) {
            return true;
        }
    }

    if let Some(item_link) = item.link()
        && !item_link.is_empty()
    {
        if item_link == episode_id {
            return true;
        }
        if let Some(link) = link
            && item_link == link
        {
            return true;
        }
    }

    item.title().is_some_and(|t| t == title)
}

fn render_fragment(channel: &rss::Channel, item: &rss::Item) -> Result<String, rss::Error> {
    let mut wrapper = rss::Channel::default();
    wrapper.set_title(channel.title());
    wrapper.set_link(channel.link());
    wrapper.set_description(channel.description());
    // Namespaces must travel with the fragment or itunes tags dangle
    wrapper.set_namespaces(channel.namespaces().clone());
    wrapper.set_items(vec![item.clone()]);

    let mut buffer = Vec::new();
    buffer.extend_from_slice(b"<?xml version=\"1.0\" encoding=\"UTF-8\"?>\n");
    let buffer = wrapper.pretty_write_to(buffer, b' ', 2)?;

    Ok(String::from_utf8_lossy(&buffer).into_owned())
}
