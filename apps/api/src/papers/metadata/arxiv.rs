use async_trait::async_trait;
use chrono::DateTime;
use quick_xml::events::Event;
use quick_xml::Reader;
use reqwest::Client;
use tracing::debug;

use super::{get_with_retry, MetadataBundle, MetadataError, MetadataSource};

pub const DEFAULT_ARXIV_URL: &str = "http://export.arxiv.org/api/query";
const ARXIV_JOURNAL: &str = "arXiv";

/// arXiv metadata from the export API's Atom feed.
#[derive(Clone)]
pub struct ArxivSource {
    client: Client,
    base_url: String,
}

impl ArxivSource {
    pub fn new(client: Client, base_url: impl Into<String>) -> Self {
        Self {
            client,
            base_url: base_url.into(),
        }
    }
}

#[async_trait]
impl MetadataSource for ArxivSource {
    fn name(&self) -> &'static str {
        "arXiv"
    }

    async fn fetch(&self, arxiv_id: &str) -> Result<MetadataBundle, MetadataError> {
        let clean_id = strip_version(arxiv_id);
        let url = format!("{}?id_list={}", self.base_url, clean_id);
        debug!("Querying arXiv: {url}");

        let response = get_with_retry(&self.client, &url, self.name()).await?;
        let status = response.status();
        if !status.is_success() {
            return Err(MetadataError::LookupFailed(format!(
                "arXiv returned {status} for {clean_id}"
            )));
        }

        parse_feed(&response.text().await?, clean_id)
    }
}

/// Drops a trailing version suffix: "1706.03762v5" -> "1706.03762".
pub fn strip_version(arxiv_id: &str) -> &str {
    let without_digits = arxiv_id.trim_end_matches(|c: char| c.is_ascii_digit());
    if without_digits.len() < arxiv_id.len() {
        if let Some(stripped) = without_digits.strip_suffix('v') {
            return stripped;
        }
    }
    arxiv_id
}

#[derive(Default)]
struct Entry {
    id: Option<String>,
    title: Option<String>,
    summary: Option<String>,
    published: Option<String>,
    authors: Vec<String>,
}

/// Reads the first `<entry>` of an Atom feed.
fn parse_feed(xml: &str, arxiv_id: &str) -> Result<MetadataBundle, MetadataError> {
    let mut reader = Reader::from_str(xml);
    reader.config_mut().trim_text(true);

    let mut path: Vec<String> = Vec::new();
    let mut text = String::new();
    let mut entry: Option<Entry> = None;

    loop {
        match reader.read_event()? {
            Event::Start(e) => {
                let name = String::from_utf8_lossy(e.local_name().as_ref()).into_owned();
                if name == "entry" && path.len() == 1 {
                    entry = Some(Entry::default());
                }
                path.push(name);
                text.clear();
            }
            Event::Text(t) => text.push_str(&t.unescape()?),
            Event::End(_) => {
                let at: Vec<&str> = path.iter().map(String::as_str).collect();
                if let Some(current) = entry.as_mut() {
                    let value = text.trim().to_string();
                    match at.as_slice() {
                        [_, "entry"] => break,
                        [_, "entry", "id"] => current.id = Some(value),
                        [_, "entry", "title"] => current.title = Some(value),
                        [_, "entry", "summary"] => current.summary = Some(value),
                        [_, "entry", "published"] => current.published = Some(value),
                        [_, "entry", "author", "name"] => current.authors.push(value),
                        _ => {}
                    }
                }
                path.pop();
                text.clear();
            }
            Event::Eof => break,
            _ => {}
        }
    }

    let entry = entry.ok_or_else(|| MetadataError::NotFound(arxiv_id.to_string()))?;
    if entry.id.as_deref().is_some_and(|id| id.contains("/api/errors")) {
        return Err(MetadataError::NotFound(arxiv_id.to_string()));
    }

    let missing = |field: &str| MetadataError::LookupFailed(format!("arXiv entry has no {field}"));
    let published = entry.published.ok_or_else(|| missing("published date"))?;
    let published_date = DateTime::parse_from_rfc3339(&published)
        .map_err(|e| MetadataError::LookupFailed(format!("bad published date '{published}': {e}")))?
        .date_naive();

    Ok(MetadataBundle {
        title: entry.title.ok_or_else(|| missing("title"))?,
        authors: entry.authors.join(", "),
        abstract_text: entry.summary.ok_or_else(|| missing("summary"))?,
        published_date: Some(published_date),
        journal: ARXIV_JOURNAL.to_string(),
    })
}
