//! X/Twitter API client
//!
//! Provides the three calls the relay needs: credential verification, image
//! upload and status creation.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::multipart::{Form, Part};
use reqwest::{Client, Response};
use starboard_core::{PostedStatus, PublishError, StatusPublisher};
use tracing::{debug, instrument};
use url::Url;

use crate::config::TwitterConfig;
use crate::error::TwitterError;
use crate::types::{
    ApiProblem, CreateTweetRequest, DataEnvelope, MediaUpload, TweetData, TweetMedia, TwitterUser,
};

/// Largest image the media endpoint accepts (5 MB)
const MAX_IMAGE_BYTES: usize = 5 * 1024 * 1024;

/// Legacy error code for an over-length status
const STATUS_TOO_LONG_CODE: i64 = 186;

/// X API v2 client
#[derive(Clone)]
pub struct TwitterClient {
    client: Client,
    api_base: String,
    access_token: String,
}

impl TwitterClient {
    /// Create a new client authenticated as the posting account
    pub fn new(config: &TwitterConfig) -> Self {
        let client = Client::builder()
            .timeout(Duration::from_secs(30))
            .build()
            .expect("Failed to create HTTP client");

        Self {
            client,
            api_base: config.api_base.clone(),
            access_token: config.access_token.clone(),
        }
    }

    /// Look up the authenticated account
    #[instrument(skip(self))]
    pub async fn verify_credentials(&self) -> Result<TwitterUser, TwitterError> {
        let url = format!("{}/users/me", self.api_base);

        let response = self
            .client
            .get(&url)
            .bearer_auth(&self.access_token)
            .send()
            .await
            .map_err(|e| TwitterError::RequestFailed(format!("Failed to verify credentials: {}", e)))?;

        let response = check_status(response, 0).await?;
        let envelope: DataEnvelope<TwitterUser> = response
            .json()
            .await
            .map_err(|e| TwitterError::ParseError(format!("Failed to parse user: {}", e)))?;

        Ok(envelope.data)
    }

    /// Post a status, attaching already-uploaded media
    #[instrument(skip(self, text), fields(chars = text.chars().count()))]
    pub async fn post_tweet(&self, text: &str, media_ids: &[String]) -> Result<TweetData, TwitterError> {
        let url = format!("{}/tweets", self.api_base);
        let body = CreateTweetRequest {
            text,
            media: (!media_ids.is_empty()).then(|| TweetMedia {
                media_ids: media_ids.to_vec(),
            }),
        };

        let response = self
            .client
            .post(&url)
            .bearer_auth(&self.access_token)
            .json(&body)
            .send()
            .await
            .map_err(|e| TwitterError::RequestFailed(format!("Failed to post status: {}", e)))?;

        let response = check_status(response, text.chars().count()).await?;
        let envelope: DataEnvelope<TweetData> = response
            .json()
            .await
            .map_err(|e| TwitterError::ParseError(format!("Failed to parse status: {}", e)))?;

        debug!("Posted status {}", envelope.data.id);
        Ok(envelope.data)
    }

    /// Download the image at `image_url` and upload it, returning the media id
    #[instrument(skip(self))]
    pub async fn upload_image(&self, image_url: &Url) -> Result<String, TwitterError> {
        let download = self
            .client
            .get(image_url.as_str())
            .send()
            .await
            .map_err(|e| TwitterError::Media(format!("Failed to download image: {}", e)))?;

        if !download.status().is_success() {
            return Err(TwitterError::Media(format!(
                "Image download returned {}",
                download.status()
            )));
        }

        let content_type = download
            .headers()
            .get(reqwest::header::CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .filter(|v| v.starts_with("image/"))
            .map(str::to_string)
            .unwrap_or_else(|| mime_from_path(image_url.path()).to_string());

        let bytes = download
            .bytes()
            .await
            .map_err(|e| TwitterError::Media(format!("Failed to read image: {}", e)))?;

        if bytes.len() > MAX_IMAGE_BYTES {
            return Err(TwitterError::Media(format!(
                "Image is {} bytes, limit is {}",
                bytes.len(),
                MAX_IMAGE_BYTES
            )));
        }

        let file_name = image_url
            .path_segments()
            .and_then(|mut segments| segments.next_back())
            .filter(|name| !name.is_empty())
            .unwrap_or("image")
            .to_string();

        let part = Part::bytes(bytes.to_vec())
            .file_name(file_name)
            .mime_str(&content_type)
            .map_err(|e| TwitterError::Media(format!("Invalid image type {}: {}", content_type, e)))?;
        let form = Form::new()
            .text("media_category", "tweet_image")
            .part("media", part);

        let url = format!("{}/media/upload", self.api_base);
        let response = self
            .client
            .post(&url)
            .bearer_auth(&self.access_token)
            .multipart(form)
            .send()
            .await
            .map_err(|e| TwitterError::Media(format!("Failed to upload image: {}", e)))?;

        let response = check_status(response, 0).await.map_err(|e| match e {
            TwitterError::ApiError { status, message } => {
                TwitterError::Media(format!("Upload rejected ({}): {}", status, message))
            }
            other => other,
        })?;

        let envelope: DataEnvelope<MediaUpload> = response
            .json()
            .await
            .map_err(|e| TwitterError::ParseError(format!("Failed to parse media upload: {}", e)))?;

        debug!("Uploaded image as media {}", envelope.data.id);
        Ok(envelope.data.id)
    }
}

#[async_trait]
impl StatusPublisher for TwitterClient {
    async fn publish(
        &self,
        text: &str,
        image_url: Option<&Url>,
    ) -> Result<PostedStatus, PublishError> {
        let media_ids = match image_url {
            Some(url) => vec![self.upload_image(url).await?],
            None => Vec::new(),
        };

        let tweet = self.post_tweet(text, &media_ids).await?;
        Ok(PostedStatus { id: tweet.id })
    }
}

/// Pass successful responses through, turn the rest into [`TwitterError`]
async fn check_status(response: Response, text_len: usize) -> Result<Response, TwitterError> {
    if response.status().is_success() {
        return Ok(response);
    }

    let status = response.status().as_u16();
    let body = response.text().await.unwrap_or_default();
    Err(classify_error(status, &body, text_len))
}

/// Map an error response onto [`TwitterError`]
///
/// Over-length statuses come back as 400 or 403 whose body mentions the
/// length, or as legacy error code 186.
pub fn classify_error(status: u16, body: &str, text_len: usize) -> TwitterError {
    let problem: ApiProblem = serde_json::from_str(body).unwrap_or_default();
    let message = problem.summary(body);

    let legacy_too_long = problem
        .errors
        .iter()
        .any(|e| e.code == Some(STATUS_TOO_LONG_CODE));
    let lowered = message.to_lowercase();
    let says_too_long = lowered.contains("too long") || lowered.contains("over 140 characters");

    if matches!(status, 400 | 403) && (legacy_too_long || says_too_long) {
        return TwitterError::TooLong { length: text_len };
    }

    TwitterError::ApiError { status, message }
}

fn mime_from_path(path: &str) -> &'static str {
    let ext = path
        .rsplit_once('.')
        .map(|(_, ext)| ext.to_ascii_lowercase())
        .unwrap_or_default();
    match ext.as_str() {
        "png" => "image/png",
        "gif" => "image/gif",
        "webp" => "image/webp",
        _ => "image/jpeg",
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_classify_too_long_detail() {
        let body = r#"{"title":"Forbidden","detail":"Your Tweet text is too long. For more information on how X counts characters, see https://x.com","type":"about:blank","status":403}"#;
        match classify_error(403, body, 200) {
            TwitterError::TooLong { length } => assert_eq!(length, 200),
            other => panic!("expected TooLong, got {other:?}"),
        }
    }

    #[test]
    fn test_classify_legacy_code() {
        let body = r#"{"errors":[{"code":186,"message":"Status is over 140 characters."}]}"#;
        assert!(matches!(classify_error(403, body, 150), TwitterError::TooLong { .. }));
    }

    #[test]
    fn test_classify_other_errors() {
        let body = r#"{"title":"Unauthorized","detail":"Unauthorized","type":"about:blank","status":401}"#;
        match classify_error(401, body, 10) {
            TwitterError::ApiError { status, message } => {
                assert_eq!(status, 401);
                assert_eq!(message, "Unauthorized: Unauthorized");
            }
            other => panic!("expected ApiError, got {other:?}"),
        }

        // Unparsable bodies are passed through verbatim
        match classify_error(503, "upstream unavailable", 10) {
            TwitterError::ApiError { message, .. } => assert_eq!(message, "upstream unavailable"),
            other => panic!("expected ApiError, got {other:?}"),
        }
    }

    #[test]
    fn test_too_long_maps_to_publish_error() {
        let err: PublishError = TwitterError::TooLong { length: 321 }.into();
        assert_eq!(err, PublishError::ContentTooLong { length: 321 });
    }

    #[test]
    fn test_mime_from_path() {
        assert_eq!(mime_from_path("/a/b/photo.PNG"), "image/png");
        assert_eq!(mime_from_path("/a/b/clip.gif"), "image/gif");
        assert_eq!(mime_from_path("/a/b/photo.jpeg"), "image/jpeg");
        assert_eq!(mime_from_path("/a/b/noext"), "image/jpeg");
    }

    #[test]
    fn test_create_tweet_body() {
        let with_media = CreateTweetRequest {
            text: "hello",
            media: Some(TweetMedia {
                media_ids: vec!["123".to_string()],
            }),
        };
        assert_eq!(
            serde_json::to_string(&with_media).unwrap(),
            r#"{"text":"hello","media":{"media_ids":["123"]}}"#
        );

        let plain = CreateTweetRequest { text: "hello", media: None };
        assert_eq!(serde_json::to_string(&plain).unwrap(), r#"{"text":"hello"}"#);
    }
}
