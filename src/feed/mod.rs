mod archive;
mod parse;

pub use archive::extract_item_xml;
pub use parse::{ParsedEpisode, ParsedFeed, parse_feed};
