//! X API v2 wire types

use serde::{Deserialize, Serialize};

/// Every successful v2 response wraps its payload in `data`
#[derive(Debug, Clone, Deserialize)]
pub struct DataEnvelope<T> {
    pub data: T,
}

/// Response body of `GET /users/me`
#[derive(Debug, Clone, Deserialize)]
pub struct TwitterUser {
    pub id: String,
    pub name: String,
    pub username: String,
}

/// Response body of `POST /tweets`
#[derive(Debug, Clone, Deserialize)]
pub struct TweetData {
    pub id: String,
}

/// Response body of `POST /media/upload`
#[derive(Debug, Clone, Deserialize)]
pub struct MediaUpload {
    pub id: String,
}

/// Request body of `POST /tweets`
#[derive(Debug, Clone, Serialize)]
pub struct CreateTweetRequest<'a> {
    pub text: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub media: Option<TweetMedia>,
}

#[derive(Debug, Clone, Serialize)]
pub struct TweetMedia {
    pub media_ids: Vec<String>,
}

/// Error body returned by the API (RFC 7807 problem, plus legacy `errors`)
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ApiProblem {
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default)]
    pub detail: Option<String>,
    #[serde(default)]
    pub errors: Vec<ApiErrorItem>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct ApiErrorItem {
    #[serde(default)]
    pub code: Option<i64>,
    #[serde(default)]
    pub message: Option<String>,
}

impl ApiProblem {
    /// Human readable summary, falling back to the raw body
    pub fn summary(&self, raw: &str) -> String {
        let mut parts: Vec<&str> = Vec::new();
        if let Some(title) = self.title.as_deref() {
            parts.push(title);
        }
        if let Some(detail) = self.detail.as_deref() {
            parts.push(detail);
        }
        parts.extend(self.errors.iter().filter_map(|e| e.message.as_deref()));

        if parts.is_empty() {
            raw.to_string()
        } else {
            parts.join(": ")
        }
    }
}
