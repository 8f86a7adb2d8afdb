//! Seam between the relay and the microblogging service

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use url::Url;

use crate::error::PublishError;

/// A status the service accepted
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PostedStatus {
    pub id: String,
}

/// The external `publish(text, imageURL)` capability
///
/// Implementations make a single attempt. Retry policy lives with the caller.
#[async_trait]
pub trait StatusPublisher: Send + Sync {
    async fn publish(
        &self,
        text: &str,
        image_url: Option<&Url>,
    ) -> Result<PostedStatus, PublishError>;
}
