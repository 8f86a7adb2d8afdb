//! Publisher adapter
//!
//! Wraps a [`StatusPublisher`] with the relay's retry policy: a status the
//! service rejects as too long is truncated and tried exactly once more; any
//! other failure drops the post. Publishing is at-most-once.

use std::sync::Arc;

use starboard_core::{PublishError, StatusPublisher};
use tracing::{error, info, warn};
use url::Url;

/// How over-length statuses are cut down
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TruncationPolicy {
    /// Platform limit, in characters
    pub max_chars: usize,
    /// Characters kept free below the limit
    pub margin: usize,
}

impl TruncationPolicy {
    pub fn new(max_chars: usize, margin: usize) -> Self {
        Self { max_chars, margin }
    }

    /// Length a truncated status is cut to, never zero
    pub fn target_len(&self) -> usize {
        self.max_chars.saturating_sub(self.margin).max(1)
    }

    /// Cut `text` to [`TruncationPolicy::target_len`] characters
    ///
    /// `None` when the text is already that short, since a retry could not
    /// change anything.
    pub fn truncate(&self, text: &str) -> Option<String> {
        let target = self.target_len();
        if text.chars().count() <= target {
            return None;
        }
        Some(text.chars().take(target).collect())
    }
}

impl Default for TruncationPolicy {
    fn default() -> Self {
        Self::new(140, 1)
    }
}

/// What happened to one publish request
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PublishOutcome {
    Published { status_id: String },
    /// Posted on the retry after cutting the text down
    Truncated {
        status_id: String,
        original_chars: usize,
        truncated_chars: usize,
    },
    /// Not posted and will not be retried
    Dropped { error: PublishError },
}

impl PublishOutcome {
    pub fn is_posted(&self) -> bool {
        !matches!(self, PublishOutcome::Dropped { .. })
    }
}

/// Applies the truncate-and-retry policy around a [`StatusPublisher`]
#[derive(Clone)]
pub struct PublisherAdapter {
    publisher: Arc<dyn StatusPublisher>,
    policy: TruncationPolicy,
}

impl PublisherAdapter {
    pub fn new(publisher: Arc<dyn StatusPublisher>, policy: TruncationPolicy) -> Self {
        Self { publisher, policy }
    }

    /// Publish `text` with an optional image, logging the outcome
    pub async fn publish(&self, text: &str, image_url: Option<&Url>) -> PublishOutcome {
        let error = match self.publisher.publish(text, image_url).await {
            Ok(status) => {
                info!(status_id = %status.id, image = image_url.is_some(), "Status posted");
                return PublishOutcome::Published {
                    status_id: status.id,
                };
            }
            Err(error) => error,
        };

        if !matches!(error, PublishError::ContentTooLong { .. }) {
            error!(%error, "Publish failed, dropping status");
            return PublishOutcome::Dropped { error };
        }

        let Some(truncated) = self.policy.truncate(text) else {
            warn!(
                chars = text.chars().count(),
                limit = self.policy.target_len(),
                "Status rejected as too long but already within the limit, dropping"
            );
            return PublishOutcome::Dropped { error };
        };

        let original_chars = text.chars().count();
        let truncated_chars = truncated.chars().count();

        match self.publisher.publish(&truncated, image_url).await {
            Ok(status) => {
                info!(
                    status_id = %status.id,
                    original_chars,
                    truncated_chars,
                    "Truncated status posted"
                );
                PublishOutcome::Truncated {
                    status_id: status.id,
                    original_chars,
                    truncated_chars,
                }
            }
            Err(error) => {
                error!(%error, truncated_chars, "Truncated retry failed, dropping status");
                PublishOutcome::Dropped { error }
            }
        }
    }
}
