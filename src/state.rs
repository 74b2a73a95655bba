//! Session state owned by the command layer.
//!
//! [`AppState`] replaces the dashboard's shared globals: the studio owns it
//! and hands out snapshots. [`InFlight`] makes "one request per action" an
//! enforced rule.

use serde::Serialize;
use std::collections::HashSet;
use std::sync::{Arc, Mutex};

use crate::error::{StudioError, StudioResult};
use crate::keyword::KeywordAnalysis;
use crate::parser::{PlatformSections, TopicList};
use crate::post::PostHandoff;
use crate::prompts::{TopicKind, WritingStyle};
use crate::providers::{ImageSize, ImageStyle};
use crate::storage::Theme;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Action {
    Topics,
    Keyword,
    Post,
    Sns,
    Image,
}

impl Action {
    pub fn as_str(&self) -> &'static str {
        match self {
            Action::Topics => "topic generation",
            Action::Keyword => "keyword analysis",
            Action::Post => "post generation",
            Action::Sns => "SNS copy generation",
            Action::Image => "image generation",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TopicResult {
    pub kind: TopicKind,
    pub heading: String,
    pub input: String,
    pub raw: String,
    pub topics: TopicList,
    pub timestamp: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PostDraft {
    pub title: String,
    pub style: WritingStyle,
    pub html: String,
    pub tags: Vec<String>,
    /// Set when an optional step failed but the draft itself is usable.
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub warnings: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ImageRecord {
    pub prompt: String,
    pub revised_prompt: String,
    pub style: ImageStyle,
    pub size: ImageSize,
    pub data_uri: String,
    pub timestamp: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SnsCopy {
    pub title: String,
    pub summary: String,
    pub sections: PlatformSections,
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct AppState {
    pub theme: Theme,
    pub writing_style: WritingStyle,
    pub generated_topics: Vec<TopicResult>,
    /// Only the latest analysis is kept.
    pub keyword_analysis: Option<KeywordAnalysis>,
    pub generated_post: Option<PostDraft>,
    pub last_post: Option<PostHandoff>,
    pub generated_images: Vec<ImageRecord>,
    pub sns_content: Option<SnsCopy>,
}

impl AppState {
    pub fn clear_topics(&mut self) {
        self.generated_topics.clear();
    }

    pub fn latest_image(&self) -> Option<&ImageRecord> {
        self.generated_images.last()
    }
}

/// Tracks which actions currently have a request outstanding.
#[derive(Debug, Clone, Default)]
pub struct InFlight {
    active: Arc<Mutex<HashSet<Action>>>,
}

impl InFlight {
    pub fn new() -> Self {
        Self::default()
    }

    /// Fails with [`StudioError::Busy`] while another request for `action`
    /// holds its guard.
    pub fn begin(&self, action: Action) -> StudioResult<InFlightGuard> {
        let mut active = self
            .active
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        if !active.insert(action) {
            return Err(StudioError::Busy(action));
        }
        Ok(InFlightGuard {
            action,
            active: Arc::clone(&self.active),
        })
    }

    pub fn is_active(&self, action: Action) -> bool {
        self.active
            .lock()
            .map(|active| active.contains(&action))
            .unwrap_or(false)
    }
}

/// Releases its action when dropped, including when the owning future is
/// cancelled.
#[derive(Debug)]
pub struct InFlightGuard {
    action: Action,
    active: Arc<Mutex<HashSet<Action>>>,
}

impl InFlightGuard {
    pub fn action(&self) -> Action {
        self.action
    }
}

impl Drop for InFlightGuard {
    fn drop(&mut self) {
        let mut active = self
            .active
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        active.remove(&self.action);
    }
}
