use feed_rs::model::Link;
use feed_rs::parser;

/// A feed document reduced to what the engine stores.
#[derive(Debug, Clone, Default)]
pub struct ParsedFeed {
    pub title: Option<String>,
    /// Entries in document order
    pub items: Vec<ParsedItem>,
}

/// One candidate entry. Nothing is validated here: a missing link is the
/// ingestor's decision to make.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ParsedItem {
    pub link: Option<String>,
    pub title: Option<String>,
    /// Full content, or the summary when the entry has no content body
    pub content: Option<String>,
    /// Published (or updated) time in Unix milliseconds
    pub published: Option<i64>,
}

pub fn parse_feed(bytes: &[u8]) -> Result<ParsedFeed, parser::ParseFeedError> {
    let feed = parser::parse(bytes)?;

    let title = feed
        .title
        .map(|t| t.content.trim().to_string())
        .filter(|t| !t.is_empty());

    let items = feed
        .entries
        .into_iter()
        .map(|entry| {
            let link = entry_link(&entry.links);
            let published = entry
                .published
                .or(entry.updated)
                .map(|dt| dt.timestamp_millis());
            let content = entry
                .content
                .and_then(|c| c.body)
                .or_else(|| entry.summary.map(|s| s.content));
            let title = entry.title.map(|t| t.content);

            ParsedItem {
                link,
                title,
                content,
                published,
            }
        })
        .collect();

    Ok(ParsedFeed { title, items })
}

/// The entry's own page: the first `alternate` (or rel-less) link, else the
/// first link of any kind.
fn entry_link(links: &[Link]) -> Option<String> {
    links
        .iter()
        .find(|l| matches!(l.rel.as_deref(), None | Some("alternate")))
        .or_else(|| links.first())
        .map(|l| l.href.trim().to_string())
        .filter(|href| !href.is_empty())
}
