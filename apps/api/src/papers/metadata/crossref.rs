use async_trait::async_trait;
use chrono::NaiveDate;
use reqwest::{Client, StatusCode};
use serde::Deserialize;
use tracing::debug;

use super::{get_with_retry, MetadataBundle, MetadataError, MetadataSource};

pub const DEFAULT_CROSSREF_URL: &str = "https://api.crossref.org";

/// DOI metadata from the CrossRef works API.
#[derive(Clone)]
pub struct CrossrefSource {
    client: Client,
    base_url: String,
}

impl CrossrefSource {
    pub fn new(client: Client, base_url: impl Into<String>) -> Self {
        Self {
            client,
            base_url: base_url.into(),
        }
    }
}

#[derive(Debug, Deserialize)]
struct WorkEnvelope {
    message: Work,
}

#[derive(Debug, Deserialize)]
struct Work {
    #[serde(default)]
    title: Vec<String>,
    #[serde(default)]
    author: Vec<WorkAuthor>,
    #[serde(rename = "abstract")]
    abstract_text: Option<String>,
    #[serde(rename = "published-print")]
    published_print: Option<WorkDate>,
    #[serde(rename = "container-title", default)]
    container_title: Vec<String>,
}

#[derive(Debug, Deserialize)]
struct WorkAuthor {
    given: Option<String>,
    family: Option<String>,
}

#[derive(Debug, Deserialize)]
struct WorkDate {
    #[serde(rename = "date-parts", default)]
    date_parts: Vec<Vec<Option<i64>>>,
}

#[async_trait]
impl MetadataSource for CrossrefSource {
    fn name(&self) -> &'static str {
        "CrossRef"
    }

    async fn fetch(&self, doi: &str) -> Result<MetadataBundle, MetadataError> {
        let url = format!("{}/works/{}", self.base_url.trim_end_matches('/'), doi);
        debug!("Querying CrossRef: {url}");

        let response = get_with_retry(&self.client, &url, self.name()).await?;
        let status = response.status();
        if status == StatusCode::NOT_FOUND {
            return Err(MetadataError::NotFound(doi.to_string()));
        }
        if !status.is_success() {
            return Err(MetadataError::LookupFailed(format!(
                "CrossRef returned {status} for {doi}"
            )));
        }

        parse_work(&response.text().await?)
    }
}

fn parse_work(body: &str) -> Result<MetadataBundle, MetadataError> {
    let work = serde_json::from_str::<WorkEnvelope>(body)?.message;

    let title = work
        .title
        .first()
        .map(|t| t.trim())
        .filter(|t| !t.is_empty())
        .ok_or_else(|| MetadataError::LookupFailed("CrossRef record has no title".to_string()))?
        .to_string();

    let authors = work
        .author
        .iter()
        .map(|a| {
            format!(
                "{} {}",
                a.given.as_deref().unwrap_or(""),
                a.family.as_deref().unwrap_or("")
            )
            .trim()
            .to_string()
        })
        .collect::<Vec<_>>()
        .join(", ");

    let published_date = work
        .published_print
        .as_ref()
        .and_then(|d| d.date_parts.first())
        .and_then(|parts| date_from_parts(parts));

    Ok(MetadataBundle {
        title,
        authors,
        abstract_text: work.abstract_text.unwrap_or_default(),
        published_date,
        journal: work.container_title.into_iter().next().unwrap_or_default(),
    })
}

/// Full (year, month, day) when present, otherwise January 1 of the year.
fn date_from_parts(parts: &[Option<i64>]) -> Option<NaiveDate> {
    let num = |i: usize| parts.get(i).copied().flatten();
    let year = i32::try_from(num(0)?).ok()?;
    match (num(1), num(2)) {
        (Some(month), Some(day)) => {
            NaiveDate::from_ymd_opt(year, u32::try_from(month).ok()?, u32::try_from(day).ok()?)
        }
        _ => NaiveDate::from_ymd_opt(year, 1, 1),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_full_record() {
        let body = r#"{
            "status": "ok",
            "message": {
                "title": ["Deep Residual Learning"],
                "author": [
                    {"given": "Kaiming", "family": "He"},
                    {"family": "Zhang"}
                ],
                "abstract": "<jats:p>Deeper networks.</jats:p>",
                "published-print": {"date-parts": [[2016, 6, 27]]},
                "container-title": ["CVPR", "Proceedings"]
            }
        }"#;
        let bundle = parse_work(body).unwrap();
        assert_eq!(bundle.title, "Deep Residual Learning");
        assert_eq!(bundle.authors, "Kaiming He, Zhang");
        assert_eq!(bundle.abstract_text, "<jats:p>Deeper networks.</jats:p>");
        assert_eq!(bundle.published_date, NaiveDate::from_ymd_opt(2016, 6, 27));
        assert_eq!(bundle.journal, "CVPR");
    }

    #[test]
    fn test_sparse_record_defaults() {
        let body = r#"{"message": {"title": ["Untitled Draft"]}}"#;
        let bundle = parse_work(body).unwrap();
        assert_eq!(bundle.authors, "");
        assert_eq!(bundle.abstract_text, "");
        assert_eq!(bundle.journal, "");
        assert_eq!(bundle.published_date, None);
    }

    #[test]
    fn test_missing_title_fails() {
        let body = r#"{"message": {"title": []}}"#;
        assert!(matches!(
            parse_work(body),
            Err(MetadataError::LookupFailed(_))
        ));
    }

    #[test]
    fn test_year_only_defaults_to_january_first() {
        assert_eq!(
            date_from_parts(&[Some(2019)]),
            NaiveDate::from_ymd_opt(2019, 1, 1)
        );
        assert_eq!(
            date_from_parts(&[Some(2019), Some(7)]),
            NaiveDate::from_ymd_opt(2019, 1, 1)
        );
    }

    #[test]
    fn test_no_year_means_no_date() {
        assert_eq!(date_from_parts(&[]), None);
        assert_eq!(date_from_parts(&[None]), None);
    }

    #[test]
    fn test_impossible_date_is_dropped() {
        assert_eq!(date_from_parts(&[Some(2019), Some(2), Some(30)]), None);
    }
}
