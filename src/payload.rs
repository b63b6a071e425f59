// src/payload.rs — 把表单字段拼成二维码载荷字符串（纯函数，无状态）

use crate::error::ValidationError;
use crate::types::{ContentKind, ContentRequest, Security};

/// 按内容类型生成载荷；缺少必填字段时在编码前直接拒绝
pub fn format(req: &ContentRequest) -> Result<String, ValidationError> {
    let payload = match req.kind {
        ContentKind::Text => req.require("text")?.to_string(),
        ContentKind::Url => url(req.require("url")?),
        ContentKind::Wifi => wifi(req)?,
        ContentKind::Vcard => vcard(req)?,
        ContentKind::Sms => sms(req)?,
        ContentKind::Email => email(req)?,
    };
    Ok(payload)
}

fn url(raw: &str) -> String {
    if raw.starts_with("http") {
        raw.to_string()
    } else {
        format!("https://{raw}")
    }
}

fn wifi(req: &ContentRequest) -> Result<String, ValidationError> {
    let ssid = escape_wifi_field(req.require("ssid")?);
    let security = req.text("security").map(Security::from).unwrap_or_default();
    let hidden = req.flag("hidden").unwrap_or(false);

    // 无密码时省略 P: 段
    let password = req
        .text("password")
        .map(|p| format!("P:{};", escape_wifi_field(p)))
        .unwrap_or_default();

    Ok(format!(
        "WIFI:T:{};S:{ssid};{password}H:{hidden};;",
        security.payload_token()
    ))
}

/// 转义 Wi-Fi QR 格式中的保留字符
fn escape_wifi_field(s: &str) -> String {
    let mut out = String::with_capacity(s.len() + 4);
    for c in s.chars() {
        match c {
            '\\' | ';' | ',' | '"' | ':' => {
                out.push('\\');
                out.push(c);
            }
            _ => out.push(c),
        }
    }
    out
}

fn vcard(req: &ContentRequest) -> Result<String, ValidationError> {
    let first = req.text("firstName").unwrap_or_default();
    let last = req.text("lastName").unwrap_or_default();
    if first.is_empty() && last.is_empty() {
        return Err(ValidationError::MissingName);
    }

    // FN/N 两行始终输出，其余字段有值才输出
    let mut lines = vec![
        "BEGIN:VCARD".to_string(),
        "VERSION:3.0".to_string(),
        format!("FN:{first} {last}"),
        format!("N:{last};{first};;;"),
    ];
    for (key, prop) in [
        ("organization", "ORG"),
        ("phone", "TEL"),
        ("email", "EMAIL"),
        ("website", "URL"),
    ] {
        if let Some(value) = req.text(key) {
            lines.push(format!("{prop}:{value}"));
        }
    }
    if let Some(address) = req.text("address") {
        lines.push(format!("ADR:;;{address};;;;"));
    }
    lines.push("END:VCARD".to_string());

    Ok(lines.join("\n"))
}

fn sms(req: &ContentRequest) -> Result<String, ValidationError> {
    let phone = req.require("phone")?;
    Ok(match req.text("message") {
        Some(msg) => format!("sms:{phone}?body={}", urlencoding::encode(msg)),
        None => format!("sms:{phone}"),
    })
}

fn email(req: &ContentRequest) -> Result<String, ValidationError> {
    let to = req.require("to")?;
    let params: Vec<String> = ["subject", "body"]
        .into_iter()
        .filter_map(|key| {
            req.text(key)
                .map(|v| format!("{key}={}", urlencoding::encode(v)))
        })
        .collect();

    if params.is_empty() {
        Ok(format!("mailto:{to}"))
    } else {
        Ok(format!("mailto:{to}?{}", params.join("&")))
    }
}
