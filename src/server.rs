// src/server.rs — HTTP 接口：路由、处理函数、静态文件

use crate::config::Config;
use crate::error::{ApiError, ValidationError};
use crate::payload;
use crate::qr::{self, Encoder};
use crate::types::{ContentKind, ContentRequest, OutputFormat, RenderOptions, WireOptions};
use axum::extract::{FromRequest, Request, State};
use axum::handler::HandlerWithoutStateExt;
use axum::http::{header, Uri};
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use chrono::{DateTime, Utc};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::any::Any;
use std::path::Path;
use tower_http::catch_panic::CatchPanicLayer;
use tower_http::cors::CorsLayer;
use tower_http::services::ServeDir;
use tower_http::trace::TraceLayer;
use tracing::{error, info, warn};

// ════════════════════════════════════════════════════════════════
// 共享状态（只读）
// ════════════════════════════════════════════════════════════════

#[derive(Debug, Clone)]
pub struct AppState {
    encoder: Encoder,
    default_size: u32,
}

impl AppState {
    pub fn new(encoder: Encoder, default_size: u32) -> Self {
        Self {
            encoder,
            default_size,
        }
    }

    pub fn from_config(cfg: &Config) -> Self {
        Self::new(Encoder::new(cfg.max_size), cfg.default_size)
    }
}

// ════════════════════════════════════════════════════════════════
// 请求 / 响应体
// ════════════════════════════════════════════════════════════════

/// 三个 POST 接口共用的请求体
#[derive(Debug, Deserialize)]
pub struct QrRequestBody {
    #[serde(default)]
    pub text: Option<String>,
    #[serde(default, rename = "type")]
    pub kind: ContentKind,
    #[serde(default)]
    pub fields: Option<Map<String, Value>>,
    #[serde(default)]
    pub options: WireOptions,
    /// 仅 download 使用
    #[serde(default)]
    pub format: Option<String>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct GenerateResponse {
    success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    qr_code: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    svg: Option<String>,
    data: String,
    #[serde(rename = "type")]
    kind: ContentKind,
}

#[derive(Debug, Serialize)]
struct HealthResponse {
    success: bool,
    message: &'static str,
    timestamp: DateTime<Utc>,
}

/// JSON 提取器：解析失败时也返回统一的错误体
pub struct ApiJson<T>(pub T);

impl<T, S> FromRequest<S> for ApiJson<T>
where
    T: DeserializeOwned + Send,
    S: Send + Sync,
{
    type Rejection = ApiError;

    async fn from_request(req: Request, state: &S) -> Result<Self, Self::Rejection> {
        let Json(value) = Json::<T>::from_request(req, state)
            .await
            .map_err(|rej| ValidationError::MalformedBody(rej.body_text()))?;
        Ok(Self(value))
    }
}

// ════════════════════════════════════════════════════════════════
// 路由
// ════════════════════════════════════════════════════════════════

/// `public_dir` 为 None 时不挂载静态文件
pub fn router(state: AppState, public_dir: Option<&Path>) -> Router {
    let api = Router::new()
        .route("/generate", post(generate))
        .route("/generate-svg", post(generate_svg))
        .route("/generate-vector", post(generate_svg))
        .route("/download", post(download))
        .route("/health", get(health))
        .fallback(not_found);

    let app = Router::new().nest("/api", api);
    let app = match public_dir {
        Some(dir) => {
            app.fallback_service(ServeDir::new(dir).not_found_service(not_found.into_service()))
        }
        None => app.fallback(not_found),
    };

    app.layer(CatchPanicLayer::custom(handle_panic))
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// 格式化载荷并解析选项；校验失败时不会走到编码库
fn prepare(state: &AppState, body: &QrRequestBody) -> Result<(String, RenderOptions), ApiError> {
    let request = ContentRequest::from_wire(body.kind, body.text.as_deref(), body.fields.as_ref())?;
    let payload = payload::format(&request)?;
    let options = RenderOptions::from_wire(&body.options, state.default_size)?;
    Ok((payload, options))
}

// ════════════════════════════════════════════════════════════════
// 处理函数
// ════════════════════════════════════════════════════════════════

async fn generate(
    State(state): State<AppState>,
    ApiJson(body): ApiJson<QrRequestBody>,
) -> Result<Json<GenerateResponse>, ApiError> {
    let (payload, options) = prepare(&state, &body)?;
    let encoder = state.encoder;
    let data = payload.clone();
    let qr_code = qr::run_blocking(move || encoder.data_url(&data, &options)).await?;

    info!(kind = %body.kind, bytes = payload.len(), "已生成二维码");
    Ok(Json(GenerateResponse {
        success: true,
        qr_code: Some(qr_code),
        svg: None,
        data: payload,
        kind: body.kind,
    }))
}

async fn generate_svg(
    State(state): State<AppState>,
    ApiJson(body): ApiJson<QrRequestBody>,
) -> Result<Json<GenerateResponse>, ApiError> {
    let (payload, options) = prepare(&state, &body)?;
    let encoder = state.encoder;
    let data = payload.clone();
    let svg = qr::run_blocking(move || encoder.svg(&data, &options)).await?;

    info!(kind = %body.kind, bytes = payload.len(), "已生成 SVG 二维码");
    Ok(Json(GenerateResponse {
        success: true,
        qr_code: None,
        svg: Some(svg),
        data: payload,
        kind: body.kind,
    }))
}

async fn download(
    State(state): State<AppState>,
    ApiJson(body): ApiJson<QrRequestBody>,
) -> Result<Response, ApiError> {
    let format: OutputFormat = body.format.as_deref().unwrap_or("png").parse()?;
    let (payload, options) = prepare(&state, &body)?;
    let encoder = state.encoder;
    let artifact = qr::run_blocking(move || encoder.download(&payload, &options, format)).await?;

    let filename = format!(
        "qr-code-{}.{}",
        Utc::now().timestamp_millis(),
        artifact.extension()
    );
    info!(kind = %body.kind, %filename, "下载二维码");

    let headers = [
        (header::CONTENT_TYPE, artifact.content_type().to_string()),
        (
            header::CONTENT_DISPOSITION,
            format!("attachment; filename=\"{filename}\""),
        ),
    ];
    Ok((headers, artifact.into_bytes()).into_response())
}

async fn health() -> Json<HealthResponse> {
    Json(HealthResponse {
        success: true,
        message: "二维码生成服务运行中",
        timestamp: Utc::now(),
    })
}

async fn not_found(uri: Uri) -> ApiError {
    warn!(%uri, "未知路由");
    ApiError::NotFound
}

fn handle_panic(err: Box<dyn Any + Send + 'static>) -> Response {
    let detail = err
        .downcast_ref::<String>()
        .map(String::as_str)
        .or_else(|| err.downcast_ref::<&str>().copied())
        .unwrap_or("unknown panic");
    error!(detail, "处理请求时发生 panic");
    ApiError::Internal.into_response()
}
