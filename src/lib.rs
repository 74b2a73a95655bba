use anyhow::{Context, Result};
use std::path::Path;
use std::sync::Arc;

pub mod canvas;
pub mod error;
pub mod keyword;
pub mod layout;
pub mod logging;
pub mod parser;
pub mod paths;
pub mod post;
pub mod prompts;
pub mod providers;
pub mod server;
pub mod settings;
pub mod state;
pub mod storage;
pub mod studio;
pub mod thumbnail;

pub use error::{Credential, StudioError, StudioResult};
pub use parser::{PlatformSections, RegexResponseParser, ResponseParser, TopicList};
pub use providers::{Credentials, ImageGenerator, KeywordSearch, TextGenerator};
pub use settings::Settings;
pub use storage::{JsonStore, Store};
pub use studio::{Collaborators, PostRequest, Studio};
pub use thumbnail::{AspectRatio, ThumbnailCompositor, ThumbnailEdit};

#[derive(Debug, Clone, Default)]
pub struct Config {
    /// Gemini key that wins over the environment and stored credentials.
    pub key: Option<String>,
    pub settings_path: Option<String>,
    /// Store file; defaults to the data dir.
    pub store_path: Option<String>,
}

/// Loads settings, opens the persistent store and connects collaborators.
pub fn open_studio(config: &Config) -> Result<Studio> {
    let settings = settings::load_settings(config.settings_path.as_deref().map(Path::new))?;
    let store_path = config
        .store_path
        .as_deref()
        .map(Into::into)
        .unwrap_or_else(paths::store_path);
    let store = JsonStore::open(&store_path, settings.history_limit)
        .with_context(|| format!("failed to open store: {}", store_path.display()))?;
    Ok(Studio::open(settings, Arc::new(store), config.key.as_deref()))
}
