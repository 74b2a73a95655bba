use serde::Deserialize;
use tracing::debug;

use super::{KeywordSearch, ProviderFuture, SearchItem, SearchResult, classify_status};
use crate::error::{StudioError, StudioResult};

pub(crate) const BASE_URL: &str = "https://openapi.naver.com/v1/search/blog.json";
const DISPLAY: u32 = 10;

/// Naver blog search. The total hit count is the competition signal.
#[derive(Debug, Clone)]
pub struct NaverSearch {
    client_id: String,
    client_secret: String,
    base_url: String,
    client: reqwest::Client,
}

impl NaverSearch {
    pub fn new(client_id: impl Into<String>, client_secret: impl Into<String>) -> Self {
        Self {
            client_id: client_id.into(),
            client_secret: client_secret.into(),
            base_url: BASE_URL.to_string(),
            client: reqwest::Client::new(),
        }
    }

    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        let base_url = base_url.into();
        if !base_url.trim().is_empty() {
            self.base_url = base_url;
        }
        self
    }
}

impl KeywordSearch for NaverSearch {
    fn search(&self, term: &str) -> ProviderFuture<SearchResult> {
        let this = self.clone();
        let term = term.to_string();
        Box::pin(async move {
            debug!("naver search: {}", term);
            let display = DISPLAY.to_string();
            let response = this
                .client
                .get(&this.base_url)
                .query(&[
                    ("query", term.as_str()),
                    ("display", display.as_str()),
                    ("start", "1"),
                    ("sort", "sim"),
                ])
                .header("X-Naver-Client-Id", this.client_id.as_str())
                .header("X-Naver-Client-Secret", this.client_secret.as_str())
                .send()
                .await
                .map_err(|err| StudioError::Transport(format!("naver: {}", err)))?;

            let status = response.status();
            let text = response.text().await.unwrap_or_default();
            debug!("naver response status: {}", status);
            if status.is_success() {
                return parse_search_result(&text);
            }
            let message = match status.as_u16() {
                401 => "invalid Naver API credentials".to_string(),
                403 => "Naver API access denied".to_string(),
                _ => extract_naver_error(&text).unwrap_or(text),
            };
            Err(classify_status("naver", status.as_u16(), message))
        })
    }
}

pub(crate) fn parse_search_result(body: &str) -> StudioResult<SearchResult> {
    #[derive(Deserialize)]
    struct BlogSearch {
        #[serde(default)]
        total: u64,
        #[serde(default)]
        items: Vec<BlogItem>,
    }

    #[derive(Deserialize)]
    struct BlogItem {
        #[serde(default)]
        title: String,
    }

    let parsed: BlogSearch = serde_json::from_str(body)
        .map_err(|err| StudioError::MalformedResponse(format!("naver: {}", err)))?;
    Ok(SearchResult {
        total: parsed.total,
        items: parsed
            .items
            .into_iter()
            .map(|item| SearchItem { title: item.title })
            .collect(),
    })
}

fn extract_naver_error(body: &str) -> Option<String> {
    #[derive(Deserialize)]
    struct ErrorBody {
        #[serde(rename = "errorMessage")]
        message: Option<String>,
        #[serde(rename = "errorCode")]
        code: Option<String>,
    }

    let parsed: ErrorBody = serde_json::from_str(body).ok()?;
    Some(super::format_error_parts(parsed.message, None, parsed.code))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::keyword::{Competition, analyze_search_result};

    #[test]
    fn search_fixture_is_scored() {
        let payload = include_str!(concat!(
            env!("CARGO_MANIFEST_DIR"),
            "/tests/fixtures/naver_blog_search.json"
        ));
        let result = parse_search_result(payload).unwrap();
        assert_eq!(result.total, 48_213);
        assert_eq!(result.items.len(), 3);

        let analysis = analyze_search_result("캠핑", &result);
        assert_eq!(analysis.competition, Competition::Medium);
        assert_eq!(analysis.score, 70);
        assert_eq!(
            analysis.related_keywords,
            vec!["장비", "추천", "총정리", "초보", "가이드", "가을", "리스트"]
        );
    }

    #[test]
    fn error_body_is_summarized() {
        let body = r#"{"errorMessage":"Incorrect query request.","errorCode":"SE01"}"#;
        assert_eq!(
            extract_naver_error(body).unwrap(),
            "Incorrect query request. | code: SE01"
        );
    }

    #[test]
    fn missing_fields_default_to_empty() {
        let result = parse_search_result("{}").unwrap();
        assert_eq!(result.total, 0);
        assert!(result.items.is_empty());
    }
}
