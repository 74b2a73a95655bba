use anyhow::{Context, Result, anyhow};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::{Mutex, MutexGuard};
use std::time::{Duration, SystemTime, UNIX_EPOCH};
use time::OffsetDateTime;
use time::format_description::well_known::Rfc3339;

use crate::providers::Credentials;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Theme {
    #[default]
    Light,
    Dark,
}

impl Theme {
    pub fn parse(value: &str) -> Option<Self> {
        match value.trim().to_lowercase().as_str() {
            "light" => Some(Theme::Light),
            "dark" => Some(Theme::Dark),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Theme::Light => "light",
            Theme::Dark => "dark",
        }
    }

    pub fn toggled(&self) -> Self {
        match self {
            Theme::Light => Theme::Dark,
            Theme::Dark => Theme::Light,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum HistoryKind {
    Topic,
    Keyword,
    Post,
    Sns,
    Image,
}

impl HistoryKind {
    pub fn parse(value: &str) -> Option<Self> {
        match value.trim().to_lowercase().as_str() {
            "topic" | "topics" => Some(HistoryKind::Topic),
            "keyword" => Some(HistoryKind::Keyword),
            "post" => Some(HistoryKind::Post),
            "sns" => Some(HistoryKind::Sns),
            "image" => Some(HistoryKind::Image),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            HistoryKind::Topic => "topic",
            HistoryKind::Keyword => "keyword",
            HistoryKind::Post => "post",
            HistoryKind::Sns => "sns",
            HistoryKind::Image => "image",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HistoryEntry {
    /// Unix milliseconds, strictly increasing within one store.
    pub id: u64,
    #[serde(rename = "type")]
    pub kind: HistoryKind,
    pub payload: Value,
    pub timestamp: String,
}

/// Persistence collaborator: credentials, theme and the history log.
pub trait Store: Send + Sync {
    fn credentials(&self) -> Result<Credentials>;
    /// Merges `incoming` into what is stored and returns the result.
    fn save_credentials(&self, incoming: Credentials) -> Result<Credentials>;
    fn theme(&self) -> Result<Theme>;
    fn save_theme(&self, theme: Theme) -> Result<()>;
    fn record_history(&self, kind: HistoryKind, payload: Value) -> Result<HistoryEntry>;
    fn histories(&self, kind: Option<HistoryKind>) -> Result<Vec<HistoryEntry>>;
    fn clear_history(&self) -> Result<()>;
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
struct StoreFile {
    #[serde(default)]
    credentials: Credentials,
    #[serde(default)]
    theme: Theme,
    #[serde(default)]
    history: Vec<HistoryEntry>,
}

/// JSON-file store. Without a path it only lives in memory.
#[derive(Debug)]
pub struct JsonStore {
    path: Option<PathBuf>,
    limit: usize,
    data: Mutex<StoreFile>,
}

impl JsonStore {
    pub fn open(path: impl Into<PathBuf>, limit: usize) -> Result<Self> {
        let path = path.into();
        let data = read_store(&path)?;
        Ok(Self {
            path: Some(path),
            limit,
            data: Mutex::new(data),
        })
    }

    pub fn in_memory(limit: usize) -> Self {
        Self {
            path: None,
            limit,
            data: Mutex::new(StoreFile::default()),
        }
    }

    pub fn path(&self) -> Option<&Path> {
        self.path.as_deref()
    }

    fn lock(&self) -> Result<MutexGuard<'_, StoreFile>> {
        self.data.lock().map_err(|_| anyhow!("store lock poisoned"))
    }

    fn persist(&self, data: &StoreFile) -> Result<()> {
        let Some(path) = &self.path else {
            return Ok(());
        };
        if let Some(dir) = path.parent()
            && !dir.as_os_str().is_empty()
        {
            fs::create_dir_all(dir)
                .with_context(|| format!("failed to create store directory: {}", dir.display()))?;
        }
        let content = serde_json::to_string_pretty(data)?;
        fs::write(path, content)
            .with_context(|| format!("failed to write store: {}", path.display()))?;
        Ok(())
    }

    /// Writes `next` and only then makes it the in-memory copy.
    fn commit(&self, data: &mut StoreFile, next: StoreFile) -> Result<()> {
        self.persist(&next)?;
        *data = next;
        Ok(())
    }
}

impl Store for JsonStore {
    fn credentials(&self) -> Result<Credentials> {
        Ok(self.lock()?.credentials.clone())
    }

    fn save_credentials(&self, incoming: Credentials) -> Result<Credentials> {
        let mut data = self.lock()?;
        data.credentials.merge(incoming);
        self.persist(&data)?;
        Ok(data.credentials.clone())
    }

    fn theme(&self) -> Result<Theme> {
        Ok(self.lock()?.theme)
    }

    fn save_theme(&self, theme: Theme) -> Result<()> {
        let mut data = self.lock()?;
        data.theme = theme;
        self.persist(&data)
    }

    fn record_history(&self, kind: HistoryKind, payload: Value) -> Result<HistoryEntry> {
        let mut data = self.lock()?;
        let newest = data.history.first().map(|entry| entry.id).unwrap_or(0);
        let entry = HistoryEntry {
            id: now_millis().max(newest + 1),
            kind,
            payload,
            timestamp: now_rfc3339(),
        };
        data.history.insert(0, entry.clone());
        if self.limit > 0 && data.history.len() > self.limit {
            data.history.truncate(self.limit);
        }
        self.persist(&data)?;
        Ok(entry)
    }

    fn histories(&self, kind: Option<HistoryKind>) -> Result<Vec<HistoryEntry>> {
        let data = self.lock()?;
        Ok(data
            .history
            .iter()
            .filter(|entry| kind.is_none_or(|kind| entry.kind == kind))
            .cloned()
            .collect())
    }

    fn clear_history(&self) -> Result<()> {
        let mut data = self.lock()?;
        let next = StoreFile {
            history: Vec::new(),
            ..data.clone()
        };
        self.commit(&mut data, next)
    }
}

fn read_store(path: &Path) -> Result<StoreFile> {
    if !path.exists() {
        return Ok(StoreFile::default());
    }
    let content = fs::read_to_string(path)
        .with_context(|| format!("failed to read store: {}", path.display()))?;
    if content.trim().is_empty() {
        return Ok(StoreFile::default());
    }
    serde_json::from_str(&content)
        .with_context(|| format!("failed to parse store JSON: {}", path.display()))
}

fn now_millis() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or(Duration::from_secs(0))
        .as_millis() as u64
}

pub(crate) fn now_rfc3339() -> String {
    OffsetDateTime::now_utc()
        .format(&Rfc3339)
        .unwrap_or_else(|_| "1970-01-01T00:00:00Z".to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn history_is_newest_first_and_capped() {
        let store = JsonStore::in_memory(3);
        for idx in 0..5 {
            store
                .record_history(HistoryKind::Topic, json!({ "n": idx }))
                .unwrap();
        }
        let entries = store.histories(None).unwrap();
        let ns = entries
            .iter()
            .map(|entry| entry.payload["n"].as_i64().unwrap())
            .collect::<Vec<_>>();
        assert_eq!(ns, vec![4, 3, 2]);
        assert!(entries.windows(2).all(|pair| pair[0].id > pair[1].id));
    }

    #[test]
    fn default_cap_evicts_oldest() {
        let store = JsonStore::in_memory(100);
        for idx in 0..101 {
            store
                .record_history(HistoryKind::Image, json!(idx))
                .unwrap();
        }
        let entries = store.histories(None).unwrap();
        assert_eq!(entries.len(), 100);
        assert_eq!(entries[0].payload, json!(100));
        assert_eq!(entries[99].payload, json!(1));
    }

    #[test]
    fn filter_by_kind() {
        let store = JsonStore::in_memory(10);
        store.record_history(HistoryKind::Post, json!("p")).unwrap();
        store.record_history(HistoryKind::Sns, json!("s")).unwrap();
        store.record_history(HistoryKind::Post, json!("p2")).unwrap();
        let posts = store.histories(Some(HistoryKind::Post)).unwrap();
        assert_eq!(posts.len(), 2);
        assert_eq!(posts[0].payload, json!("p2"));
        store.clear_history().unwrap();
        assert!(store.histories(None).unwrap().is_empty());
    }

    #[test]
    fn file_store_round_trips() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("store.json");
        {
            let store = JsonStore::open(&path, 100).unwrap();
            store.save_theme(Theme::Dark).unwrap();
            store
                .save_credentials(Credentials {
                    gemini: Some("key".into()),
                    ..Credentials::default()
                })
                .unwrap();
            store
                .record_history(HistoryKind::Keyword, json!({ "keyword": "캠핑" }))
                .unwrap();
        }
        let reopened = JsonStore::open(&path, 100).unwrap();
        assert_eq!(reopened.theme().unwrap(), Theme::Dark);
        assert_eq!(reopened.credentials().unwrap().gemini.as_deref(), Some("key"));
        let entries = reopened.histories(None).unwrap();
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].kind, HistoryKind::Keyword);

        let raw: Value = serde_json::from_str(&fs::read_to_string(&path).unwrap()).unwrap();
        assert_eq!(raw["history"][0]["type"], json!("keyword"));
        assert!(raw["history"][0]["timestamp"].as_str().unwrap().contains('T'));
    }

    #[test]
    fn credentials_merge_on_save() {
        let store = JsonStore::in_memory(10);
        store
            .save_credentials(Credentials {
                naver_id: Some("id".into()),
                naver_secret: Some("secret".into()),
                ..Credentials::default()
            })
            .unwrap();
        let merged = store
            .save_credentials(Credentials {
                gemini: Some("g".into()),
                ..Credentials::default()
            })
            .unwrap();
        assert_eq!(merged.naver_id.as_deref(), Some("id"));
        assert_eq!(merged.gemini.as_deref(), Some("g"));
    }

    #[test]
    fn failed_write_leaves_memory_unchanged() {
        let dir = tempfile::tempdir().unwrap();
        let blocker = dir.path().join("blocker");
        fs::write(&blocker, "a file, not a directory").unwrap();
        let store = JsonStore::open(blocker.join("store.json"), 10).unwrap();

        assert!(
            store
                .save_credentials(Credentials {
                    gemini: Some("g".into()),
                    ..Credentials::default()
                })
                .is_err()
        );
        assert_eq!(store.credentials().unwrap(), Credentials::default());
        assert!(store.record_history(HistoryKind::Post, json!("p")).is_err());
        assert!(store.histories(None).unwrap().is_empty());
        assert!(store.save_theme(Theme::Dark).is_err());
        assert_eq!(store.theme().unwrap(), Theme::default());
    }

    #[test]
    fn corrupt_file_is_reported() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("store.json");
        fs::write(&path, "{not json").unwrap();
        assert!(JsonStore::open(&path, 10).is_err());
    }

    #[test]
    fn theme_toggles() {
        assert_eq!(Theme::default(), Theme::Light);
        assert_eq!(Theme::Light.toggled(), Theme::Dark);
        assert_eq!(Theme::parse("DARK"), Some(Theme::Dark));
    }
}
