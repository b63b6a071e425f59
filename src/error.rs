// src/error.rs — 错误类型：校验错误 4xx，编码错误 5xx

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::Serialize;
use thiserror::Error;
use tracing::{error, warn};

/// 请求内容不完整或格式不对，在调用编码库之前就拒绝
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    #[error("文本不能为空")]
    EmptyInput,
    #[error("缺少必填字段: {0}")]
    MissingField(&'static str),
    #[error("名字和姓氏至少填写一项")]
    MissingName,
    #[error("字段 {0} 的类型无效")]
    InvalidField(String),
    #[error("无法解析字段 JSON: {0}")]
    MalformedFields(String),
    #[error("请求体无效: {0}")]
    MalformedBody(String),
    #[error("不支持的下载格式: {0}")]
    UnknownFormat(String),
}

/// 编码库拒绝了载荷或选项
#[derive(Debug, Error)]
pub enum EncodeError {
    #[error("{0}")]
    Qr(#[from] qrcode::types::QrError),
    #[error("无效的颜色值: {0}")]
    InvalidColor(String),
    #[error("无效的纠错等级: {0}")]
    InvalidLevel(String),
    #[error("尺寸 {size} 超出范围 (1–{max})")]
    SizeOutOfRange { size: u32, max: u32 },
    #[error("无效的尺寸: {0}")]
    InvalidSize(String),
    #[error("PNG 编码失败: {0}")]
    Image(#[from] image::ImageError),
    #[error("编码任务异常退出: {0}")]
    Worker(String),
}

/// HTTP 层统一错误，渲染为 `{success:false, error}`
#[derive(Debug, Error)]
pub enum ApiError {
    #[error(transparent)]
    Validation(#[from] ValidationError),
    #[error("二维码生成失败: {0}")]
    Encode(#[from] EncodeError),
    #[error("接口不存在")]
    NotFound,
    #[error("服务器内部错误")]
    Internal,
}

#[derive(Serialize)]
struct ErrorBody {
    success: bool,
    error: String,
}

impl ApiError {
    pub fn status(&self) -> StatusCode {
        match self {
            ApiError::Validation(_) => StatusCode::BAD_REQUEST,
            ApiError::NotFound => StatusCode::NOT_FOUND,
            ApiError::Encode(_) | ApiError::Internal => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        match &self {
            ApiError::Validation(e) => warn!(error = %e, "请求校验失败"),
            ApiError::Encode(e) => error!(error = %e, "二维码生成失败"),
            ApiError::NotFound | ApiError::Internal => {}
        }

        let body = ErrorBody {
            success: false,
            error: self.to_string(),
        };
        (self.status(), Json(body)).into_response()
    }
}
