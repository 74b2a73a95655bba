use anyhow::{Context, Result};
use axum::body::Body;
use axum::extract::{Query, State};
use axum::http::{HeaderMap, HeaderValue, Method, Request, Response, StatusCode};
use axum::middleware::Next;
use axum::response::IntoResponse;
use axum::routing::{get, post};
use axum::{Json, Router};
use base64::Engine;
use base64::engine::general_purpose::STANDARD as BASE64;
use std::sync::Arc;
use tracing::info;

use super::models::{
    BackgroundRequest, BlogImageRequest, ErrorResponse, HistoryQuery, ImageRequest,
    KeywordRequest, SnsRequest, ThemeRequest, ThumbnailRequest, ThumbnailResponse, TopicsRequest,
};
use super::state::ServerState;
use crate::error::StudioError;
use crate::keyword::KeywordAnalysis;
use crate::state::{AppState, ImageRecord, PostDraft, SnsCopy, TopicResult};
use crate::storage::{HistoryEntry, HistoryKind, Theme};
use crate::studio::{PostRequest, Studio};
use crate::thumbnail::ThumbnailEdit;

type ApiError = (StatusCode, Json<ErrorResponse>);
type ApiResult<T> = Result<Json<T>, ApiError>;

const DEFAULT_EXPORT_MIME: &str = "image/png";

pub fn router(studio: Arc<Studio>) -> Router {
    let state = ServerState { studio };
    Router::new()
        .route("/health", get(health))
        .route("/state", get(snapshot))
        .route("/topics", post(topics))
        .route("/topics/clear", post(clear_topics))
        .route("/keyword", post(keyword))
        .route("/keyword/post-request", get(post_request_from_keyword))
        .route("/post", post(draft_post))
        .route("/post/interactive", get(interactive_code))
        .route("/sns", post(sns))
        .route("/image", post(image))
        .route("/image/blog", post(blog_image))
        .route("/thumbnail", post(thumbnail))
        .route("/thumbnail/background", post(thumbnail_background))
        .route("/histories", get(histories).delete(clear_histories))
        .route("/theme", get(theme).post(set_theme))
        .with_state(state)
        .layer(axum::middleware::from_fn(cors_middleware))
}

pub async fn run_server(studio: Arc<Studio>, addr: String) -> Result<()> {
    let app = router(studio);
    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .with_context(|| format!("failed to bind server address: {}", addr))?;
    info!("listening on {}", addr);
    axum::serve(listener, app).await?;
    Ok(())
}

async fn health() -> impl IntoResponse {
    (StatusCode::OK, Json(serde_json::json!({ "status": "ok" })))
}

async fn cors_middleware(req: Request<Body>, next: Next) -> Result<Response<Body>, StatusCode> {
    if req.method() == Method::OPTIONS {
        let mut response = Response::new(Body::empty());
        *response.status_mut() = StatusCode::NO_CONTENT;
        apply_cors_headers(response.headers_mut());
        return Ok(response);
    }
    let mut response = next.run(req).await;
    apply_cors_headers(response.headers_mut());
    Ok(response)
}

fn apply_cors_headers(headers: &mut HeaderMap) {
    headers.insert("access-control-allow-origin", HeaderValue::from_static("*"));
    headers.insert(
        "access-control-allow-methods",
        HeaderValue::from_static("GET,POST,DELETE,OPTIONS"),
    );
    headers.insert(
        "access-control-allow-headers",
        HeaderValue::from_static("content-type"),
    );
}

pub(crate) fn status_for(err: &StudioError) -> StatusCode {
    match err {
        StudioError::InvalidInput(_) | StudioError::NoBackground => StatusCode::BAD_REQUEST,
        StudioError::MissingCredential(_) | StudioError::Unauthorized(_) => {
            StatusCode::UNAUTHORIZED
        }
        StudioError::Forbidden(_) => StatusCode::FORBIDDEN,
        StudioError::Busy(_) => StatusCode::CONFLICT,
        StudioError::Transport(_)
        | StudioError::Api { .. }
        | StudioError::MalformedResponse(_) => StatusCode::BAD_GATEWAY,
        StudioError::Image(_) => StatusCode::UNPROCESSABLE_ENTITY,
        StudioError::Storage(_) | StudioError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
    }
}

fn api_error(err: StudioError) -> ApiError {
    (
        status_for(&err),
        Json(ErrorResponse {
            error: err.to_string(),
        }),
    )
}

fn bad_request(message: impl Into<String>) -> ApiError {
    api_error(StudioError::InvalidInput(message.into()))
}

async fn snapshot(State(state): State<ServerState>) -> Json<AppState> {
    Json(state.studio.snapshot())
}

async fn topics(
    State(state): State<ServerState>,
    Json(payload): Json<TopicsRequest>,
) -> ApiResult<TopicResult> {
    state
        .studio
        .generate_topics(payload.kind, &payload.input)
        .await
        .map(Json)
        .map_err(api_error)
}

async fn clear_topics(State(state): State<ServerState>) -> StatusCode {
    state.studio.clear_topics();
    StatusCode::NO_CONTENT
}

async fn keyword(
    State(state): State<ServerState>,
    Json(payload): Json<KeywordRequest>,
) -> ApiResult<KeywordAnalysis> {
    state
        .studio
        .analyze_keyword(&payload.keyword)
        .await
        .map(Json)
        .map_err(api_error)
}

async fn post_request_from_keyword(
    State(state): State<ServerState>,
) -> ApiResult<PostRequest> {
    state
        .studio
        .post_request_from_keyword()
        .map(Json)
        .map_err(api_error)
}

async fn draft_post(
    State(state): State<ServerState>,
    Json(payload): Json<PostRequest>,
) -> ApiResult<PostDraft> {
    state
        .studio
        .generate_post(payload)
        .await
        .map(Json)
        .map_err(api_error)
}

async fn interactive_code(
    State(state): State<ServerState>,
) -> ApiResult<serde_json::Value> {
    let code = state.studio.interactive_code().map_err(api_error)?;
    Ok(Json(serde_json::json!({ "code": code })))
}

async fn sns(
    State(state): State<ServerState>,
    Json(payload): Json<SnsRequest>,
) -> ApiResult<SnsCopy> {
    state
        .studio
        .generate_sns(payload.title, payload.summary)
        .await
        .map(Json)
        .map_err(api_error)
}

async fn image(
    State(state): State<ServerState>,
    Json(payload): Json<ImageRequest>,
) -> ApiResult<ImageRecord> {
    state
        .studio
        .generate_image(&payload.prompt, payload.style, payload.size)
        .await
        .map(Json)
        .map_err(api_error)
}

async fn blog_image(
    State(state): State<ServerState>,
    Json(payload): Json<BlogImageRequest>,
) -> ApiResult<ImageRecord> {
    state
        .studio
        .generate_blog_image(&payload.topic, payload.kind)
        .await
        .map(Json)
        .map_err(api_error)
}

async fn thumbnail_background(
    State(state): State<ServerState>,
    Json(payload): Json<BackgroundRequest>,
) -> ApiResult<ImageRecord> {
    state
        .studio
        .generate_thumbnail_background(&payload.description)
        .await
        .map(Json)
        .map_err(api_error)
}

async fn thumbnail(
    State(state): State<ServerState>,
    Json(payload): Json<ThumbnailRequest>,
) -> ApiResult<ThumbnailResponse> {
    let mut edit = ThumbnailEdit::parse(payload.ratio.as_deref(), payload.font.as_deref())
        .map_err(api_error)?;
    edit.text = payload.text;
    edit.font_size = payload.font_size;
    edit.fill_color = payload.fill_color;
    edit.stroke_color = payload.stroke_color;
    edit.stroke_width = payload.stroke_width;

    let background = payload
        .background_base64
        .as_deref()
        .map(|data| BASE64.decode(data.trim()))
        .transpose()
        .map_err(|err| bad_request(format!("invalid background_base64: {}", err)))?;
    let latest_image = if payload.use_latest_image {
        Some(state.studio.latest_image_uri().map_err(api_error)?)
    } else {
        None
    };

    let mime = payload
        .mime
        .unwrap_or_else(|| DEFAULT_EXPORT_MIME.to_string());
    let (job, (width, height)) = state
        .studio
        .edit_thumbnail(|compositor| {
            if let Some(uri) = &latest_image {
                compositor.set_background_data_uri(uri)?;
            }
            if let Some(bytes) = &background {
                compositor.set_background_bytes(bytes)?;
            }
            compositor.apply(edit)?;
            Ok((compositor.export_job(&mime)?, compositor.size()))
        })
        .map_err(api_error)?;
    let bytes = tokio::task::spawn_blocking(move || job.render())
        .await
        .map_err(|err| api_error(StudioError::Internal(format!("render task failed: {}", err))))?
        .map_err(api_error)?;
    Ok(Json(ThumbnailResponse {
        mime,
        width,
        height,
        data_base64: BASE64.encode(bytes),
    }))
}

async fn histories(
    State(state): State<ServerState>,
    Query(query): Query<HistoryQuery>,
) -> ApiResult<Vec<HistoryEntry>> {
    let kind = match query.kind.as_deref().map(str::trim) {
        None | Some("") | Some("all") => None,
        Some(value) => Some(
            HistoryKind::parse(value)
                .ok_or_else(|| bad_request(format!("unknown history kind: {}", value)))?,
        ),
    };
    state.studio.histories(kind).map(Json).map_err(api_error)
}

async fn clear_histories(State(state): State<ServerState>) -> Result<StatusCode, ApiError> {
    state.studio.clear_history().map_err(api_error)?;
    Ok(StatusCode::NO_CONTENT)
}

async fn theme(State(state): State<ServerState>) -> Json<serde_json::Value> {
    Json(serde_json::json!({ "theme": state.studio.theme() }))
}

/// Sets the theme, or toggles it when none is given.
async fn set_theme(
    State(state): State<ServerState>,
    Json(payload): Json<ThemeRequest>,
) -> ApiResult<serde_json::Value> {
    let theme = match payload.theme.as_deref() {
        Some(value) => {
            let theme = Theme::parse(value)
                .ok_or_else(|| bad_request(format!("unknown theme: {}", value)))?;
            state.studio.set_theme(theme)
        }
        None => state.studio.toggle_theme(),
    }
    .map_err(api_error)?;
    Ok(Json(serde_json::json!({ "theme": theme })))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::canvas::png_fixture;
    use crate::error::Credential;
    use crate::providers::Unconfigured;
    use crate::settings::Settings;
    use crate::state::Action;
    use crate::storage::JsonStore;
    use crate::studio::Collaborators;

    #[test]
    fn errors_map_to_statuses() {
        assert_eq!(
            status_for(&StudioError::InvalidInput("x".into())),
            StatusCode::BAD_REQUEST
        );
        assert_eq!(
            status_for(&StudioError::MissingCredential(Credential::Gemini)),
            StatusCode::UNAUTHORIZED
        );
        assert_eq!(
            status_for(&StudioError::Busy(Action::Post)),
            StatusCode::CONFLICT
        );
        assert_eq!(
            status_for(&StudioError::Api {
                status: 500,
                message: "boom".into()
            }),
            StatusCode::BAD_GATEWAY
        );
        assert_eq!(status_for(&StudioError::NoBackground), StatusCode::BAD_REQUEST);
    }

    #[test]
    fn error_body_carries_message() {
        let (status, Json(body)) = api_error(StudioError::Busy(Action::Image));
        assert_eq!(status, StatusCode::CONFLICT);
        assert_eq!(body.error, "image generation is already in progress");
    }

    fn server_state() -> ServerState {
        let offline = Collaborators {
            text: Arc::new(Unconfigured(Credential::Gemini)),
            images: Arc::new(Unconfigured(Credential::Gemini)),
            search: Arc::new(Unconfigured(Credential::Naver)),
        };
        let studio = Studio::new(
            Settings::default(),
            offline,
            Arc::new(JsonStore::in_memory(100)),
        );
        ServerState {
            studio: Arc::new(studio),
        }
    }

    #[tokio::test]
    async fn rejected_thumbnail_request_leaves_compositor_untouched() {
        let state = server_state();
        let request = ThumbnailRequest {
            font_size: Some(0),
            background_base64: Some(BASE64.encode(png_fixture(8, 4))),
            ..ThumbnailRequest::default()
        };
        let (status, _) = thumbnail(State(state.clone()), Json(request))
            .await
            .unwrap_err();
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert!(!state.studio.with_thumbnail(|compositor| compositor.has_background()));
    }

    #[tokio::test]
    async fn thumbnail_request_renders_and_keeps_edit() {
        let state = server_state();
        let request = ThumbnailRequest {
            text: Some("가을/캠핑".to_string()),
            ratio: Some("original".to_string()),
            font_size: Some(2),
            background_base64: Some(BASE64.encode(png_fixture(8, 4))),
            ..ThumbnailRequest::default()
        };
        let Json(response) = thumbnail(State(state.clone()), Json(request))
            .await
            .unwrap();
        assert_eq!((response.width, response.height), (8, 4));
        assert_eq!(response.mime, "image/png");
        let png = BASE64.decode(response.data_base64).unwrap();
        assert!(png.starts_with(&[0x89, b'P', b'N', b'G']));
        assert_eq!(
            state.studio.with_thumbnail(|compositor| compositor.text().to_string()),
            "가을/캠핑"
        );
    }

    #[tokio::test]
    async fn unsupported_export_mime_is_a_bad_request() {
        let state = server_state();
        let request = ThumbnailRequest {
            background_base64: Some(BASE64.encode(png_fixture(8, 4))),
            mime: Some("image/x-unknown".to_string()),
            ..ThumbnailRequest::default()
        };
        let (status, _) = thumbnail(State(state.clone()), Json(request))
            .await
            .unwrap_err();
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert!(!state.studio.with_thumbnail(|compositor| compositor.has_background()));
    }

    #[test]
    fn cors_headers_allow_dashboard_origin() {
        let mut headers = HeaderMap::new();
        apply_cors_headers(&mut headers);
        assert_eq!(headers["access-control-allow-origin"], "*");
        assert!(
            headers["access-control-allow-methods"]
                .to_str()
                .unwrap()
                .contains("DELETE")
        );
    }
}
