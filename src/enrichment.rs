//! Encyclopedia lookup for a recognised label.

use std::{collections::HashMap, future::Future, time::Duration};

use serde::Deserialize;

use crate::error::EnrichmentError;

pub const DEFAULT_ENDPOINT: &str = "https://en.wikipedia.org/w/api.php";
pub const DEFAULT_THUMBNAIL_SIZE: u32 = 500;
const USER_AGENT: &str = concat!(env!("CARGO_PKG_NAME"), "/", env!("CARGO_PKG_VERSION"));

/// Summary and optional thumbnail for a label.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct EnrichmentRecord {
    pub summary_text: String,
    pub thumbnail_url: Option<String>,
}

/// Anything able to look up a summary for a label.
pub trait Enricher: Send + Sync + 'static {
    fn fetch_summary(
        &self,
        label: &str,
    ) -> impl Future<Output = Result<EnrichmentRecord, EnrichmentError>> + Send;
}

#[derive(Clone, Debug)]
pub struct EnrichmentConfig {
    /// Action API endpoint.
    pub endpoint: String,
    /// Requested thumbnail width in pixels; `None` asks for the extract only.
    pub thumbnail_size: Option<u32>,
    /// Overall request timeout; `None` keeps the transport default.
    pub timeout: Option<Duration>,
    pub user_agent: String,
}

impl Default for EnrichmentConfig {
    fn default() -> Self {
        Self {
            endpoint: DEFAULT_ENDPOINT.to_string(),
            thumbnail_size: Some(DEFAULT_THUMBNAIL_SIZE),
            timeout: None,
            user_agent: USER_AGENT.to_string(),
        }
    }
}

/// Queries the encyclopedia's action API, once per call, with no retries.
#[derive(Clone, Debug)]
pub struct EnrichmentClient {
    client: reqwest::Client,
    config: EnrichmentConfig,
}

impl EnrichmentClient {
    pub fn new(config: EnrichmentConfig) -> Result<Self, EnrichmentError> {
        let mut builder = reqwest::Client::builder().user_agent(config.user_agent.clone());
        if let Some(timeout) = config.timeout {
            builder = builder.timeout(timeout);
        }
        Ok(Self {
            client: builder.build()?,
            config,
        })
    }

    pub fn config(&self) -> &EnrichmentConfig {
        &self.config
    }

    fn query_params(&self, label: &str) -> Vec<(&'static str, String)> {
        let mut params = vec![
            ("format", "json".to_string()),
            ("action", "query".to_string()),
            (
                "prop",
                if self.config.thumbnail_size.is_some() {
                    "extracts|pageimages".to_string()
                } else {
                    "extracts".to_string()
                },
            ),
            ("exintro", String::new()),
            ("explaintext", String::new()),
            ("titles", label.to_string()),
            ("indexpageids", String::new()),
            ("redirects", "1".to_string()),
        ];
        if let Some(size) = self.config.thumbnail_size {
            params.push(("pithumbsize", size.to_string()));
        }
        params
    }
}

impl Enricher for EnrichmentClient {
    async fn fetch_summary(&self, label: &str) -> Result<EnrichmentRecord, EnrichmentError> {
        log::debug!("Fetching summary for {label:?}");

        let body = self
            .client
            .get(&self.config.endpoint)
            .query(&self.query_params(label))
            .send()
            .await?
            .error_for_status()?
            .text()
            .await?;

        parse_summary(label, &body)
    }
}

#[derive(Debug, Deserialize)]
struct QueryResponse {
    query: Option<QueryBody>,
}

#[derive(Debug, Deserialize)]
struct QueryBody {
    #[serde(default)]
    pageids: Vec<String>,
    #[serde(default)]
    pages: HashMap<String, Page>,
}

#[derive(Debug, Deserialize)]
struct Page {
    extract: Option<String>,
    thumbnail: Option<Thumbnail>,
}

#[derive(Debug, Deserialize)]
struct Thumbnail {
    source: Option<String>,
}

/// Decodes an action API response into a record.
///
/// Uses the first page id only. A missing `query`, an empty id list, a page id
/// absent from `pages`, or a page without an `extract` all mean
/// [`EnrichmentError::NotFound`].
pub fn parse_summary(label: &str, body: &str) -> Result<EnrichmentRecord, EnrichmentError> {
    let response: QueryResponse = serde_json::from_str(body)?;
    let not_found = || EnrichmentError::NotFound {
        label: label.to_string(),
    };

    let mut query = response.query.ok_or_else(not_found)?;
    let page_id = query.pageids.first().ok_or_else(not_found)?;
    let page = query.pages.remove(page_id).ok_or_else(not_found)?;
    let summary_text = page.extract.ok_or_else(not_found)?;

    Ok(EnrichmentRecord {
        summary_text,
        thumbnail_url: page.thumbnail.and_then(|t| t.source),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn parses_extract_and_thumbnail() {
        let body = r#"{"query":{"pageids":["42"],"pages":{"42":{"extract":"A rose is...","thumbnail":{"source":"http://x/img.png"}}}}}"#;
        assert_eq!(
            parse_summary("rose", body).unwrap(),
            EnrichmentRecord {
                summary_text: "A rose is...".to_string(),
                thumbnail_url: Some("http://x/img.png".to_string()),
            }
        );
    }

    #[test]
    fn thumbnail_is_optional() {
        let body = r#"{"query":{"pageids":["7"],"pages":{"7":{"pageid":7,"title":"Tulip","extract":"Tulips are..."}}}}"#;
        let record = parse_summary("tulip", body).unwrap();
        assert_eq!(record.summary_text, "Tulips are...");
        assert_eq!(record.thumbnail_url, None);
    }

    #[test]
    fn only_the_first_page_is_used() {
        let body = r#"{"query":{"pageids":["1","2"],"pages":{"1":{"extract":"first"},"2":{"extract":"second"}}}}"#;
        assert_eq!(parse_summary("x", body).unwrap().summary_text, "first");
    }

    #[test]
    fn empty_pageids_is_not_found() {
        let body = r#"{"query":{"pageids":[],"pages":{}}}"#;
        assert!(matches!(
            parse_summary("rose", body),
            Err(EnrichmentError::NotFound { label }) if label == "rose"
        ));
    }

    #[test]
    fn missing_paths_are_not_found() {
        for body in [
            r#"{}"#,
            r#"{"query":{}}"#,
            r#"{"query":{"pageids":["9"],"pages":{}}}"#,
            r#"{"query":{"pageids":["-1"],"pages":{"-1":{"ns":0,"title":"Xyz","missing":""}}}}"#,
        ] {
            assert!(
                matches!(parse_summary("xyz", body), Err(EnrichmentError::NotFound { .. })),
                "expected not found for {body}"
            );
        }
    }

    #[test]
    fn non_json_is_malformed() {
        assert!(matches!(
            parse_summary("rose", "<html>"),
            Err(EnrichmentError::MalformedResponse(_))
        ));
    }

    #[test]
    fn query_requests_thumbnail_when_configured() {
        let client = EnrichmentClient::new(EnrichmentConfig::default()).unwrap();
        let params = client.query_params("Rose");
        assert!(params.contains(&("prop", "extracts|pageimages".to_string())));
        assert!(params.contains(&("pithumbsize", "500".to_string())));
        assert!(params.contains(&("titles", "Rose".to_string())));
        assert!(params.contains(&("redirects", "1".to_string())));

        let client = EnrichmentClient::new(EnrichmentConfig {
            thumbnail_size: None,
            ..EnrichmentConfig::default()
        })
        .unwrap();
        let params = client.query_params("Rose");
        assert!(params.contains(&("prop", "extracts".to_string())));
        assert!(params.iter().all(|(key, _)| *key != "pithumbsize"));
    }
}
