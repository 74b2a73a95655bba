//! Command handlers for the dashboard.
//!
//! A [`Studio`] owns the session state, the thumbnail compositor and the
//! collaborators. Every long-running command takes an in-flight guard for
//! its action first, so a duplicate request fails fast instead of racing.
//! Locks are only held between await points.

use serde::{Deserialize, Serialize};
use serde_json::{Value, json};
use std::sync::{Arc, Mutex, MutexGuard, RwLock};
use tracing::{info, warn};

use crate::error::{Credential, StudioError, StudioResult};
use crate::keyword::{self, KeywordAnalysis};
use crate::parser::{RegexResponseParser, ResponseParser, parse_tags};
use crate::post::{self, PostHandoff};
use crate::prompts::{self, BlogImageKind, TopicKind, WritingStyle};
use crate::providers::{
    Credentials, Gemini, ImageGenerator, ImageSize, ImageStyle, Imagen, KeywordSearch,
    NaverSearch, TextGenerator, Unconfigured, resolve_gemini_key, resolve_naver_keys,
};
use crate::settings::Settings;
use crate::state::{
    Action, AppState, ImageRecord, InFlight, PostDraft, SnsCopy, TopicResult,
};
use crate::storage::{HistoryEntry, HistoryKind, Store, Theme, now_rfc3339};
use crate::thumbnail::ThumbnailCompositor;

const MEMO_HISTORY_CHARS: usize = 200;

#[derive(Clone)]
pub struct Collaborators {
    pub text: Arc<dyn TextGenerator>,
    pub images: Arc<dyn ImageGenerator>,
    pub search: Arc<dyn KeywordSearch>,
}

impl Collaborators {
    /// Builds live clients for every credential that resolves; the rest
    /// fail with [`StudioError::MissingCredential`] when used.
    pub fn connect(
        settings: &Settings,
        stored: &Credentials,
        gemini_override: Option<&str>,
    ) -> Self {
        let generation = &settings.generation;
        let (text, images): (Arc<dyn TextGenerator>, Arc<dyn ImageGenerator>) =
            match resolve_gemini_key(gemini_override, stored) {
                Ok(key) => {
                    let base_url = settings.api.gemini.clone().unwrap_or_default();
                    (
                        Arc::new(
                            Gemini::new(key.clone())
                                .with_model(generation.model.as_str())
                                .with_base_url(base_url.as_str()),
                        ),
                        Arc::new(
                            Imagen::new(key)
                                .with_model(generation.image_model.as_str())
                                .with_base_url(base_url),
                        ),
                    )
                }
                Err(_) => (
                    Arc::new(Unconfigured(Credential::Gemini)),
                    Arc::new(Unconfigured(Credential::Gemini)),
                ),
            };
        let search: Arc<dyn KeywordSearch> = match resolve_naver_keys(stored) {
            Ok((id, secret)) => Arc::new(
                NaverSearch::new(id, secret)
                    .with_base_url(settings.api.naver.clone().unwrap_or_default()),
            ),
            Err(_) => Arc::new(Unconfigured(Credential::Naver)),
        };
        Self {
            text,
            images,
            search,
        }
    }
}

/// Input for post drafting.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PostRequest {
    pub title: String,
    #[serde(default)]
    pub style: Option<WritingStyle>,
    #[serde(default)]
    pub additional_requests: Option<String>,
    #[serde(default)]
    pub main_image: bool,
}

pub struct Studio {
    settings: Settings,
    collaborators: RwLock<Collaborators>,
    parser: Arc<dyn ResponseParser>,
    store: Arc<dyn Store>,
    state: Mutex<AppState>,
    thumbnail: Mutex<ThumbnailCompositor>,
    in_flight: InFlight,
}

impl Studio {
    pub fn new(settings: Settings, collaborators: Collaborators, store: Arc<dyn Store>) -> Self {
        let state = AppState {
            theme: store.theme().unwrap_or_else(|err| {
                warn!("failed to load theme: {:#}", err);
                Theme::default()
            }),
            ..AppState::default()
        };
        let thumbnail = ThumbnailCompositor::from_settings(&settings.thumbnail);
        Self {
            settings,
            collaborators: RwLock::new(collaborators),
            parser: Arc::new(RegexResponseParser),
            store,
            state: Mutex::new(state),
            thumbnail: Mutex::new(thumbnail),
            in_flight: InFlight::new(),
        }
    }

    /// Connects live collaborators using stored credentials.
    pub fn open(settings: Settings, store: Arc<dyn Store>, gemini_override: Option<&str>) -> Self {
        let stored = store.credentials().unwrap_or_else(|err| {
            warn!("failed to load stored credentials: {:#}", err);
            Credentials::default()
        });
        info!("credentials: {}", stored.describe());
        let collaborators = Collaborators::connect(&settings, &stored, gemini_override);
        Self::new(settings, collaborators, store)
    }

    pub fn with_parser(mut self, parser: Arc<dyn ResponseParser>) -> Self {
        self.parser = parser;
        self
    }

    pub fn settings(&self) -> &Settings {
        &self.settings
    }

    pub fn in_flight(&self) -> &InFlight {
        &self.in_flight
    }

    /// Persists new credentials and reconnects the collaborators with them.
    pub fn save_credentials(&self, incoming: Credentials) -> StudioResult<()> {
        let merged = self
            .store
            .save_credentials(incoming)
            .map_err(StudioError::storage)?;
        let collaborators = Collaborators::connect(&self.settings, &merged, None);
        self.set_collaborators(collaborators);
        Ok(())
    }

    pub fn set_collaborators(&self, collaborators: Collaborators) {
        match self.collaborators.write() {
            Ok(mut slot) => *slot = collaborators,
            Err(poisoned) => *poisoned.into_inner() = collaborators,
        }
    }

    pub fn snapshot(&self) -> AppState {
        self.state().clone()
    }

    pub fn generate_topics(
        &self,
        kind: TopicKind,
        input: &str,
    ) -> impl Future<Output = StudioResult<TopicResult>> + Send + '_ {
        let input = input.trim().to_string();
        async move {
            if input.is_empty() {
                return Err(StudioError::InvalidInput(format!(
                    "{} input is required",
                    kind.as_str()
                )));
            }
            let _guard = self.in_flight.begin(Action::Topics)?;
            let prompt =
                prompts::render_topics_prompt(kind, &input).map_err(StudioError::internal)?;
            let raw = self
                .text()
                .generate_text(prompt, self.settings.generation.options())
                .await?;

            let result = TopicResult {
                kind,
                heading: kind.heading().to_string(),
                topics: self.parser.parse_topics(&raw),
                input: input.clone(),
                raw,
                timestamp: now_rfc3339(),
            };
            let history_input = match kind {
                TopicKind::Memo => input.chars().take(MEMO_HISTORY_CHARS).collect(),
                _ => input,
            };
            self.remember(
                HistoryKind::Topic,
                json!({ "type": kind, "input": history_input, "result": result.raw }),
            );
            self.state().generated_topics.push(result.clone());
            Ok(result)
        }
    }

    pub fn clear_topics(&self) {
        self.state().clear_topics();
    }

    pub fn analyze_keyword(
        &self,
        term: &str,
    ) -> impl Future<Output = StudioResult<KeywordAnalysis>> + Send + '_ {
        let term = term.trim().to_string();
        async move {
            if term.is_empty() {
                return Err(StudioError::InvalidInput("keyword is required".to_string()));
            }
            let _guard = self.in_flight.begin(Action::Keyword)?;
            let search = self.search();
            let analysis = keyword::analyze_keyword(search.as_ref(), &term).await?;
            self.remember(
                HistoryKind::Keyword,
                json!({ "keyword": term, "analysis": analysis }),
            );
            self.state().keyword_analysis = Some(analysis.clone());
            Ok(analysis)
        }
    }

    /// Pre-fills a post request from the current keyword analysis.
    pub fn post_request_from_keyword(&self) -> StudioResult<PostRequest> {
        let state = self.state();
        let analysis = state.keyword_analysis.as_ref().ok_or_else(|| {
            StudioError::InvalidInput("analyze a keyword first".to_string())
        })?;
        Ok(PostRequest {
            title: analysis.keyword.clone(),
            style: Some(state.writing_style),
            additional_requests: Some(format!(
                "키워드: {}\n경쟁도: {}\n연관 키워드: {}",
                analysis.keyword,
                analysis.competition.as_str(),
                analysis.related_keywords.join(", ")
            )),
            main_image: false,
        })
    }

    pub fn set_writing_style(&self, style: WritingStyle) {
        self.state().writing_style = style;
    }

    pub fn generate_post(
        &self,
        request: PostRequest,
    ) -> impl Future<Output = StudioResult<PostDraft>> + Send + '_ {
        async move {
            let title = request.title.trim().to_string();
            if title.is_empty() {
                return Err(StudioError::InvalidInput("post title is required".to_string()));
            }
            let _guard = self.in_flight.begin(Action::Post)?;
            let style = request
                .style
                .unwrap_or_else(|| self.state().writing_style);
            let prompt = prompts::render_post_prompt(
                &title,
                style,
                request.additional_requests.as_deref(),
            )
            .map_err(StudioError::internal)?;

            let text = self.text();
            let raw = text
                .generate_text(prompt, self.settings.generation.post_options())
                .await?;
            let body = post::normalize_post_body(&raw);
            let mut warnings = Vec::new();

            let tags = match self.generate_tags(text.as_ref(), &body).await {
                Ok(tags) => tags,
                Err(err) => {
                    warn!("tag generation failed: {}", err);
                    warnings.push(format!("tag generation failed: {}", err));
                    Vec::new()
                }
            };

            let mut html = body.clone();
            if request.main_image {
                let prompt = prompts::blog_image_prompt(&title, BlogImageKind::Main);
                match self
                    .images()
                    .generate_image(prompt, ImageStyle::Realistic, ImageSize::Landscape)
                    .await
                {
                    Ok(image) => html = post::prepend_main_image(&body, &image.data_uri, &title),
                    Err(err) => {
                        warn!("main image generation failed: {}", err);
                        warnings.push(format!(
                            "image generation failed (text was generated): {}",
                            err
                        ));
                    }
                }
            }

            let draft = PostDraft {
                title: title.clone(),
                style,
                html,
                tags,
                warnings,
            };
            self.remember(
                HistoryKind::Post,
                json!({
                    "title": title,
                    "style": style,
                    "content": body,
                    "tags": draft.tags,
                }),
            );
            let mut state = self.state();
            state.last_post = Some(PostHandoff::new(&title, &body));
            state.generated_post = Some(draft.clone());
            Ok(draft)
        }
    }

    async fn generate_tags(&self, text: &dyn TextGenerator, body: &str) -> StudioResult<Vec<String>> {
        let prompt = prompts::render_tags_prompt(body).map_err(StudioError::internal)?;
        let reply = text
            .generate_text(prompt, self.settings.generation.tags_options())
            .await?;
        Ok(parse_tags(&reply))
    }

    /// `<script>` blocks of the current draft, wrapped for pasting.
    pub fn interactive_code(&self) -> StudioResult<Option<String>> {
        let state = self.state();
        let draft = state.generated_post.as_ref().ok_or_else(|| {
            StudioError::InvalidInput("generate a post first".to_string())
        })?;
        Ok(post::extract_interactive_code(&draft.html))
    }

    /// Title and summary default to the last drafted post.
    pub fn generate_sns(
        &self,
        title: Option<String>,
        summary: Option<String>,
    ) -> impl Future<Output = StudioResult<SnsCopy>> + Send + '_ {
        async move {
            let last_post = self.state().last_post.clone();
            let title = non_empty(title)
                .or_else(|| last_post.as_ref().map(|post| post.title.clone()))
                .ok_or_else(|| StudioError::InvalidInput("post title is required".to_string()))?;
            let summary = non_empty(summary)
                .or_else(|| last_post.as_ref().map(|post| post.summary.clone()))
                .ok_or_else(|| StudioError::InvalidInput("post summary is required".to_string()))?;

            let _guard = self.in_flight.begin(Action::Sns)?;
            let prompt =
                prompts::render_sns_prompt(&title, &summary).map_err(StudioError::internal)?;
            let raw = self
                .text()
                .generate_text(prompt, self.settings.generation.options())
                .await?;
            let copy = SnsCopy {
                sections: self.parser.parse_platform_sections(&raw),
                title,
                summary,
            };
            self.remember(
                HistoryKind::Sns,
                json!({
                    "title": copy.title,
                    "summary": copy.summary,
                    "content": copy.sections,
                }),
            );
            self.state().sns_content = Some(copy.clone());
            Ok(copy)
        }
    }

    pub fn generate_image(
        &self,
        prompt: &str,
        style: ImageStyle,
        size: ImageSize,
    ) -> impl Future<Output = StudioResult<ImageRecord>> + Send + '_ {
        let prompt = prompt.trim().to_string();
        async move {
            if prompt.is_empty() {
                return Err(StudioError::InvalidInput("image prompt is required".to_string()));
            }
            let _guard = self.in_flight.begin(Action::Image)?;
            let image = self
                .images()
                .generate_image(prompt.clone(), style, size)
                .await?;
            let record = ImageRecord {
                prompt,
                revised_prompt: image.revised_prompt,
                style,
                size,
                data_uri: image.data_uri,
                timestamp: now_rfc3339(),
            };
            self.remember(
                HistoryKind::Image,
                json!({
                    "prompt": record.prompt,
                    "style": style,
                    "size": size,
                    "revised_prompt": record.revised_prompt,
                }),
            );
            self.state().generated_images.push(record.clone());
            Ok(record)
        }
    }

    pub fn generate_blog_image(
        &self,
        topic: &str,
        kind: BlogImageKind,
    ) -> impl Future<Output = StudioResult<ImageRecord>> + Send + '_ {
        let prompt = prompts::blog_image_prompt(topic, kind);
        let size = match kind {
            BlogImageKind::Main => ImageSize::Landscape,
            BlogImageKind::Sub => ImageSize::Square,
        };
        async move { self.generate_image(&prompt, ImageStyle::Realistic, size).await }
    }

    /// Generates a background and loads it into the compositor.
    pub fn generate_thumbnail_background(
        &self,
        description: &str,
    ) -> impl Future<Output = StudioResult<ImageRecord>> + Send + '_ {
        let prompt = prompts::thumbnail_background_prompt(description);
        async move {
            let record = self
                .generate_image(&prompt, ImageStyle::Realistic, ImageSize::Landscape)
                .await?;
            self.thumbnail()
                .set_background_data_uri(&record.data_uri)?;
            Ok(record)
        }
    }

    pub fn latest_image_uri(&self) -> StudioResult<String> {
        self.state()
            .latest_image()
            .map(|image| image.data_uri.clone())
            .ok_or_else(|| StudioError::InvalidInput("generate an image first".to_string()))
    }

    pub fn use_latest_image_for_thumbnail(&self) -> StudioResult<()> {
        let data_uri = self.latest_image_uri()?;
        self.thumbnail().set_background_data_uri(&data_uri)
    }

    pub fn with_thumbnail<R>(&self, edit: impl FnOnce(&mut ThumbnailCompositor) -> R) -> R {
        edit(&mut self.thumbnail())
    }

    /// Runs `edit` against a copy of the compositor and keeps the copy only
    /// when every step succeeds.
    pub fn edit_thumbnail<R>(
        &self,
        edit: impl FnOnce(&mut ThumbnailCompositor) -> StudioResult<R>,
    ) -> StudioResult<R> {
        let mut thumbnail = self.thumbnail();
        let mut draft = thumbnail.clone();
        let output = edit(&mut draft)?;
        *thumbnail = draft;
        Ok(output)
    }

    pub fn theme(&self) -> Theme {
        self.state().theme
    }

    pub fn set_theme(&self, theme: Theme) -> StudioResult<Theme> {
        self.store.save_theme(theme).map_err(StudioError::storage)?;
        self.state().theme = theme;
        Ok(theme)
    }

    pub fn toggle_theme(&self) -> StudioResult<Theme> {
        let next = self.theme().toggled();
        self.set_theme(next)
    }

    pub fn histories(&self, kind: Option<HistoryKind>) -> StudioResult<Vec<HistoryEntry>> {
        self.store.histories(kind).map_err(StudioError::storage)
    }

    pub fn clear_history(&self) -> StudioResult<()> {
        self.store.clear_history().map_err(StudioError::storage)
    }

    fn remember(&self, kind: HistoryKind, payload: Value) {
        if let Err(err) = self.store.record_history(kind, payload) {
            warn!("failed to record {} history: {:#}", kind.as_str(), err);
        }
    }

    fn state(&self) -> MutexGuard<'_, AppState> {
        self.state
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn thumbnail(&self) -> MutexGuard<'_, ThumbnailCompositor> {
        self.thumbnail
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn collaborators(&self) -> Collaborators {
        match self.collaborators.read() {
            Ok(slot) => slot.clone(),
            Err(poisoned) => poisoned.into_inner().clone(),
        }
    }

    fn text(&self) -> Arc<dyn TextGenerator> {
        self.collaborators().text
    }

    fn images(&self) -> Arc<dyn ImageGenerator> {
        self.collaborators().images
    }

    fn search(&self) -> Arc<dyn KeywordSearch> {
        self.collaborators().search
    }
}

fn non_empty(value: Option<String>) -> Option<String> {
    value
        .map(|value| value.trim().to_string())
        .filter(|value| !value.is_empty())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::canvas::png_fixture;
    use crate::keyword::Competition;
    use crate::providers::{
        GeneratedImage, GenerationOptions, ProviderFuture, SearchItem, SearchResult,
    };
    use crate::storage::JsonStore;
    use base64::Engine;
    use base64::engine::general_purpose::STANDARD as BASE64;
    use std::collections::VecDeque;
    use std::time::Duration;

    struct Reply {
        delay: Duration,
        result: StudioResult<String>,
    }

    #[derive(Default)]
    struct ScriptedText {
        replies: Mutex<VecDeque<Reply>>,
        calls: Mutex<Vec<(String, u32)>>,
    }

    impl ScriptedText {
        fn new(replies: Vec<StudioResult<String>>) -> Arc<Self> {
            Self::with_delays(
                replies
                    .into_iter()
                    .map(|result| (Duration::ZERO, result))
                    .collect(),
            )
        }

        fn with_delays(replies: Vec<(Duration, StudioResult<String>)>) -> Arc<Self> {
            Arc::new(Self {
                replies: Mutex::new(
                    replies
                        .into_iter()
                        .map(|(delay, result)| Reply { delay, result })
                        .collect(),
                ),
                calls: Mutex::new(Vec::new()),
            })
        }

        fn prompts(&self) -> Vec<(String, u32)> {
            self.calls.lock().unwrap().clone()
        }
    }

    impl TextGenerator for ScriptedText {
        fn generate_text(
            &self,
            prompt: String,
            options: GenerationOptions,
        ) -> ProviderFuture<String> {
            self.calls.lock().unwrap().push((prompt, options.max_tokens));
            let reply = self.replies.lock().unwrap().pop_front().unwrap_or(Reply {
                delay: Duration::ZERO,
                result: Err(StudioError::Transport("no scripted reply".to_string())),
            });
            Box::pin(async move {
                if !reply.delay.is_zero() {
                    tokio::time::sleep(reply.delay).await;
                }
                reply.result
            })
        }
    }

    struct FixedImage(Option<String>);

    impl ImageGenerator for FixedImage {
        fn generate_image(
            &self,
            prompt: String,
            style: ImageStyle,
            _size: ImageSize,
        ) -> ProviderFuture<GeneratedImage> {
            let result = match &self.0 {
                Some(data_uri) => Ok(GeneratedImage {
                    data_uri: data_uri.clone(),
                    revised_prompt: format!("{}, {}", prompt, style.enhancement()),
                }),
                None => Err(StudioError::Api {
                    status: 400,
                    message: "blocked by safety filter".to_string(),
                }),
            };
            Box::pin(async move { result })
        }
    }

    struct FixedSearch(u64);

    impl KeywordSearch for FixedSearch {
        fn search(&self, term: &str) -> ProviderFuture<SearchResult> {
            let result = SearchResult {
                total: self.0,
                items: vec![SearchItem {
                    title: format!("<b>{}</b> 입문 가이드", term),
                }],
            };
            Box::pin(async move { Ok(result) })
        }
    }

    fn png_data_uri() -> String {
        format!("data:image/png;base64,{}", BASE64.encode(png_fixture(32, 18)))
    }

    fn studio_with(
        text: Arc<ScriptedText>,
        image: Option<String>,
    ) -> (Studio, Arc<JsonStore>) {
        let store = Arc::new(JsonStore::in_memory(100));
        let collaborators = Collaborators {
            text,
            images: Arc::new(FixedImage(image)),
            search: Arc::new(FixedSearch(5_000)),
        };
        let studio = Studio::new(Settings::default(), collaborators, store.clone());
        (studio, store)
    }

    #[tokio::test]
    async fn topics_are_parsed_stored_and_recorded() {
        let text = ScriptedText::new(vec![Ok(
            "추천 주제입니다\n1. 캠핑 장비 - 입문 장비 정리\n2. 캠핑 요리\n".to_string(),
        )]);
        let (studio, store) = studio_with(text.clone(), None);

        let result = studio
            .generate_topics(TopicKind::Category, " 여행 ")
            .await
            .unwrap();
        assert_eq!(result.heading, "카테고리별 추천");
        assert_eq!(result.topics.titles(), vec!["캠핑 장비"]);
        assert_eq!(result.topics.items().count(), 2);
        assert_eq!(text.prompts()[0].1, 8192);
        assert!(text.prompts()[0].0.contains("\"여행\""));

        assert_eq!(studio.snapshot().generated_topics.len(), 1);
        let history = store.histories(Some(HistoryKind::Topic)).unwrap();
        assert_eq!(history[0].payload["type"], json!("category"));
        assert_eq!(history[0].payload["input"], json!("여행"));
    }

    #[tokio::test]
    async fn memo_history_keeps_only_the_head() {
        let text = ScriptedText::new(vec![Ok("1. A - b".to_string())]);
        let (studio, store) = studio_with(text, None);
        let memo = "메".repeat(500);
        studio.generate_topics(TopicKind::Memo, &memo).await.unwrap();
        let history = store.histories(None).unwrap();
        let stored = history[0].payload["input"].as_str().unwrap();
        assert_eq!(stored.chars().count(), MEMO_HISTORY_CHARS);
        assert_eq!(studio.snapshot().generated_topics[0].input.chars().count(), 500);
    }

    #[tokio::test]
    async fn empty_input_is_rejected_before_any_request() {
        let text = ScriptedText::new(vec![]);
        let (studio, _) = studio_with(text.clone(), None);
        let err = studio
            .generate_topics(TopicKind::Eeat, "   ")
            .await
            .unwrap_err();
        assert!(matches!(err, StudioError::InvalidInput(_)));
        assert!(text.prompts().is_empty());
    }

    #[tokio::test]
    async fn duplicate_request_fails_fast_and_leaves_state_alone() {
        let text = ScriptedText::with_delays(vec![(
            Duration::from_millis(50),
            Ok("1. A - a".to_string()),
        )]);
        let (studio, _) = studio_with(text.clone(), None);

        let (first, second) = tokio::join!(
            studio.generate_topics(TopicKind::Category, "IT"),
            studio.generate_topics(TopicKind::Category, "IT"),
        );
        assert!(first.is_ok());
        assert!(matches!(second, Err(StudioError::Busy(Action::Topics))));
        assert_eq!(text.prompts().len(), 1);
        assert_eq!(studio.snapshot().generated_topics.len(), 1);
        assert!(!studio.in_flight().is_active(Action::Topics));
    }

    #[tokio::test]
    async fn cancelled_request_releases_its_guard() {
        let text = ScriptedText::with_delays(vec![
            (Duration::from_secs(10), Ok("late".to_string())),
            (Duration::ZERO, Ok("1. B - b".to_string())),
        ]);
        let (studio, _) = studio_with(text, None);
        let timed_out = tokio::time::timeout(
            Duration::from_millis(10),
            studio.generate_topics(TopicKind::Evergreen, "재테크"),
        )
        .await;
        assert!(timed_out.is_err());
        assert!(!studio.in_flight().is_active(Action::Topics));
        let result = studio
            .generate_topics(TopicKind::Evergreen, "재테크")
            .await
            .unwrap();
        assert_eq!(result.topics.titles(), vec!["B"]);
    }

    #[tokio::test]
    async fn keyword_analysis_supersedes_previous_and_feeds_post_request() {
        let (studio, store) = studio_with(ScriptedText::new(vec![]), None);
        studio.analyze_keyword("캠핑").await.unwrap();
        let analysis = studio.analyze_keyword("러스트").await.unwrap();
        assert_eq!(analysis.competition, Competition::Low);
        assert_eq!(analysis.score, 90);
        assert_eq!(
            studio.snapshot().keyword_analysis.map(|analysis| analysis.keyword),
            Some("러스트".to_string())
        );
        assert_eq!(store.histories(Some(HistoryKind::Keyword)).unwrap().len(), 2);

        let request = studio.post_request_from_keyword().unwrap();
        assert_eq!(request.title, "러스트");
        assert_eq!(
            request.additional_requests.as_deref(),
            Some("키워드: 러스트\n경쟁도: low\n연관 키워드: 입문, 가이드")
        );
    }

    #[tokio::test]
    async fn post_request_needs_an_analysis() {
        let (studio, _) = studio_with(ScriptedText::new(vec![]), None);
        assert!(matches!(
            studio.post_request_from_keyword(),
            Err(StudioError::InvalidInput(_))
        ));
    }

    #[tokio::test]
    async fn post_draft_collects_tags_and_hands_off_to_sns() {
        let body = format!("<article><h1>캠핑</h1><p>{}</p></article>", "즐거운 캠핑 ".repeat(40));
        let text = ScriptedText::new(vec![
            Ok(body.clone()),
            Ok("캠핑, 장비 ,, 입문".to_string()),
            Ok("[Threads/X]\n짧게\n[Instagram]\n#캠핑\n[Facebook]\n공유해요".to_string()),
        ]);
        let (studio, store) = studio_with(text.clone(), None);
        studio.set_writing_style(WritingStyle::Expert);

        let draft = studio
            .generate_post(PostRequest {
                title: "캠핑 입문".to_string(),
                ..PostRequest::default()
            })
            .await
            .unwrap();
        assert_eq!(draft.style, WritingStyle::Expert);
        assert_eq!(draft.tags, vec!["캠핑", "장비", "입문"]);
        assert!(draft.warnings.is_empty());
        assert_eq!(draft.html, body);

        let calls = text.prompts();
        assert_eq!(calls[0].1, 4096);
        assert_eq!(calls[1].1, 200);
        assert!(calls[0].0.contains("전문적이고"));

        let handoff = studio.snapshot().last_post.unwrap();
        assert!(handoff.summary.starts_with("캠핑즐거운 캠핑"));
        assert!(handoff.summary.ends_with("..."));

        let copy = studio.generate_sns(None, None).await.unwrap();
        assert_eq!(copy.title, "캠핑 입문");
        assert_eq!(copy.sections.instagram, "#캠핑");
        assert!(calls_contain(&text, "글 요약: 캠핑즐거운"));
        assert_eq!(store.histories(Some(HistoryKind::Sns)).unwrap().len(), 1);
        assert_eq!(store.histories(Some(HistoryKind::Post)).unwrap().len(), 1);
    }

    fn calls_contain(text: &ScriptedText, needle: &str) -> bool {
        text.prompts().iter().any(|(prompt, _)| prompt.contains(needle))
    }

    #[tokio::test]
    async fn tag_and_image_failures_keep_the_text() {
        let text = ScriptedText::new(vec![
            Ok("# 제목\n\n본문".to_string()),
            Err(StudioError::Transport("timeout".to_string())),
        ]);
        let (studio, _) = studio_with(text, None);
        let draft = studio
            .generate_post(PostRequest {
                title: "제목".to_string(),
                main_image: true,
                ..PostRequest::default()
            })
            .await
            .unwrap();
        assert!(draft.html.contains("<h1>제목</h1>"));
        assert!(draft.tags.is_empty());
        assert_eq!(draft.warnings.len(), 2);
        assert!(draft.warnings[1].contains("text was generated"));
    }

    #[tokio::test]
    async fn main_image_is_prepended() {
        let text = ScriptedText::new(vec![
            Ok("<article><p>x</p></article>".to_string()),
            Ok("a, b".to_string()),
        ]);
        let (studio, _) = studio_with(text, Some("data:image/png;base64,AA".to_string()));
        let draft = studio
            .generate_post(PostRequest {
                title: "제목".to_string(),
                main_image: true,
                ..PostRequest::default()
            })
            .await
            .unwrap();
        assert!(draft.html.starts_with("<div class=\"main-image\">"));
        let handoff = studio.snapshot().last_post.unwrap();
        assert_eq!(handoff.full_content, "<article><p>x</p></article>");
    }

    #[tokio::test]
    async fn post_failure_leaves_no_draft() {
        let text = ScriptedText::new(vec![Err(StudioError::Unauthorized("bad key".to_string()))]);
        let (studio, _) = studio_with(text, None);
        let err = studio
            .generate_post(PostRequest {
                title: "x".to_string(),
                ..PostRequest::default()
            })
            .await
            .unwrap_err();
        assert!(matches!(err, StudioError::Unauthorized(_)));
        assert!(studio.snapshot().generated_post.is_none());
        assert!(!studio.in_flight().is_active(Action::Post));
    }

    #[tokio::test]
    async fn sns_requires_title_and_summary() {
        let (studio, _) = studio_with(ScriptedText::new(vec![]), None);
        let err = studio
            .generate_sns(Some("제목".to_string()), Some("  ".to_string()))
            .await
            .unwrap_err();
        assert!(matches!(err, StudioError::InvalidInput(_)));
    }

    #[tokio::test]
    async fn interactive_code_comes_from_the_draft() {
        let text = ScriptedText::new(vec![
            Ok("<article><p>x</p><script>run()</script></article>".to_string()),
            Ok("a".to_string()),
        ]);
        let (studio, _) = studio_with(text, None);
        assert!(studio.interactive_code().is_err());
        studio
            .generate_post(PostRequest {
                title: "t".to_string(),
                ..PostRequest::default()
            })
            .await
            .unwrap();
        let code = studio.interactive_code().unwrap().unwrap();
        assert!(code.contains("<script>run()</script>"));
    }

    #[tokio::test]
    async fn generated_image_can_become_thumbnail_background() {
        let (studio, store) = studio_with(ScriptedText::new(vec![]), Some(png_data_uri()));
        assert!(studio.use_latest_image_for_thumbnail().is_err());

        let record = studio
            .generate_image("가을 숲", ImageStyle::Minimal, ImageSize::Landscape)
            .await
            .unwrap();
        assert!(record.revised_prompt.contains("minimalist design"));
        studio.use_latest_image_for_thumbnail().unwrap();
        assert!(studio.with_thumbnail(|thumbnail| thumbnail.has_background()));
        let history = store.histories(Some(HistoryKind::Image)).unwrap();
        assert_eq!(history[0].payload["size"], json!("1792x1024"));
    }

    #[test]
    fn failed_thumbnail_edit_keeps_previous_surface() {
        let (studio, _) = studio_with(ScriptedText::new(vec![]), None);
        let err = studio
            .edit_thumbnail(|thumbnail| {
                thumbnail.set_background_data_uri(&png_data_uri())?;
                thumbnail.set_font_size(0)
            })
            .unwrap_err();
        assert!(matches!(err, StudioError::InvalidInput(_)));
        assert!(!studio.with_thumbnail(|thumbnail| thumbnail.has_background()));

        let size = studio
            .edit_thumbnail(|thumbnail| {
                thumbnail.set_background_data_uri(&png_data_uri())?;
                thumbnail.set_ratio(crate::thumbnail::AspectRatio::Original);
                Ok(thumbnail.size())
            })
            .unwrap();
        assert_eq!(size, (32, 18));
        assert!(studio.with_thumbnail(|thumbnail| thumbnail.has_background()));
    }

    #[tokio::test]
    async fn thumbnail_background_generation_loads_compositor() {
        let (studio, _) = studio_with(ScriptedText::new(vec![]), Some(png_data_uri()));
        studio.generate_thumbnail_background("가을 캠핑").await.unwrap();
        let png = studio
            .with_thumbnail(|thumbnail| thumbnail.export("image/png"))
            .unwrap();
        assert!(png.starts_with(&[0x89, b'P', b'N', b'G']));
    }

    #[tokio::test]
    async fn missing_credential_surfaces_from_unconfigured_collaborators() {
        let store = Arc::new(JsonStore::in_memory(10));
        let studio = Studio::new(
            Settings::default(),
            Collaborators {
                text: Arc::new(Unconfigured(Credential::Gemini)),
                images: Arc::new(Unconfigured(Credential::Gemini)),
                search: Arc::new(Unconfigured(Credential::Naver)),
            },
            store,
        );
        let err = studio.analyze_keyword("캠핑").await.unwrap_err();
        assert!(matches!(err, StudioError::MissingCredential(Credential::Naver)));
        let err = studio
            .generate_topics(TopicKind::Longtail, "캠핑")
            .await
            .unwrap_err();
        assert!(matches!(err, StudioError::MissingCredential(Credential::Gemini)));
    }

    #[test]
    fn theme_is_persisted() {
        let (studio, store) = studio_with(ScriptedText::new(vec![]), None);
        assert_eq!(studio.theme(), Theme::Light);
        assert_eq!(studio.toggle_theme().unwrap(), Theme::Dark);
        assert_eq!(store.theme().unwrap(), Theme::Dark);
    }
}
