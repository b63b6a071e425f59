// src/types.rs — 所有核心数据类型

use crate::error::{EncodeError, ValidationError};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::collections::BTreeMap;
use std::str::FromStr;

// ════════════════════════════════════════════════════════════════
// 内容请求
// ════════════════════════════════════════════════════════════════

/// 二维码内容类型
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, clap::ValueEnum,
)]
#[serde(rename_all = "lowercase")]
pub enum ContentKind {
    #[default]
    Text,
    Url,
    Wifi,
    Vcard,
    Sms,
    Email,
}

impl ContentKind {
    /// 单字段类型对应的字段名；结构化类型返回 None
    pub fn primary_field(&self) -> Option<&'static str> {
        match self {
            ContentKind::Text => Some("text"),
            ContentKind::Url => Some("url"),
            _ => None,
        }
    }
}

impl std::fmt::Display for ContentKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            ContentKind::Text => "text",
            ContentKind::Url => "url",
            ContentKind::Wifi => "wifi",
            ContentKind::Vcard => "vcard",
            ContentKind::Sms => "sms",
            ContentKind::Email => "email",
        };
        f.write_str(s)
    }
}

/// 表单字段值：字符串或勾选框
#[derive(Debug, Clone, PartialEq)]
pub enum FieldValue {
    Text(String),
    Bool(bool),
}

impl From<&str> for FieldValue {
    fn from(s: &str) -> Self {
        FieldValue::Text(s.to_string())
    }
}

impl From<String> for FieldValue {
    fn from(s: String) -> Self {
        FieldValue::Text(s)
    }
}

impl From<bool> for FieldValue {
    fn from(b: bool) -> Self {
        FieldValue::Bool(b)
    }
}

pub type Fields = BTreeMap<String, FieldValue>;

/// 一次生成请求的类型 + 字段，不落盘
#[derive(Debug, Clone, PartialEq)]
pub struct ContentRequest {
    pub kind: ContentKind,
    pub fields: Fields,
}

impl ContentRequest {
    pub fn new(kind: ContentKind) -> Self {
        Self {
            kind,
            fields: Fields::new(),
        }
    }

    pub fn with_field(mut self, key: impl Into<String>, value: impl Into<FieldValue>) -> Self {
        self.fields.insert(key.into(), value.into());
        self
    }

    /// 从 HTTP 请求体还原请求
    ///
    /// 单字段类型直接取 `text`；结构化类型优先用 `fields` 对象，
    /// 否则把 `text` 当作 JSON 对象解析（前端旧版的传参方式）。
    pub fn from_wire(
        kind: ContentKind,
        text: Option<&str>,
        fields: Option<&Map<String, Value>>,
    ) -> Result<Self, ValidationError> {
        let mut request = Self::new(kind);
        if let Some(map) = fields {
            request.extend_json(map)?;
        }

        if let Some(raw) = text.filter(|t| !t.trim().is_empty()) {
            match kind.primary_field() {
                Some(key) => {
                    request
                        .fields
                        .entry(key.to_string())
                        .or_insert_with(|| FieldValue::Text(raw.to_string()));
                }
                None if fields.is_none() => {
                    let map: Map<String, Value> = serde_json::from_str(raw)
                        .map_err(|e| ValidationError::MalformedFields(e.to_string()))?;
                    request.extend_json(&map)?;
                }
                None => {}
            }
        }

        if request.fields.is_empty() {
            return Err(ValidationError::EmptyInput);
        }
        Ok(request)
    }

    fn extend_json(&mut self, map: &Map<String, Value>) -> Result<(), ValidationError> {
        for (key, value) in map {
            let field = match value {
                Value::String(s) => FieldValue::Text(s.clone()),
                Value::Bool(b) => FieldValue::Bool(*b),
                Value::Number(n) => FieldValue::Text(n.to_string()),
                Value::Null => continue,
                _ => return Err(ValidationError::InvalidField(key.clone())),
            };
            self.fields.insert(key.clone(), field);
        }
        Ok(())
    }

    /// 取字符串字段，trim 后为空视为缺失
    pub fn text(&self, key: &str) -> Option<&str> {
        match self.fields.get(key)? {
            FieldValue::Text(s) => Some(s.trim()).filter(|s| !s.is_empty()),
            FieldValue::Bool(_) => None,
        }
    }

    /// 取布尔字段，兼容 "true"/"false" 字符串
    pub fn flag(&self, key: &str) -> Option<bool> {
        match self.fields.get(key)? {
            FieldValue::Bool(b) => Some(*b),
            FieldValue::Text(s) => {
                let s = s.trim();
                if s.eq_ignore_ascii_case("true") {
                    Some(true)
                } else if s.eq_ignore_ascii_case("false") {
                    Some(false)
                } else {
                    None
                }
            }
        }
    }

    pub fn require(&self, key: &'static str) -> Result<&str, ValidationError> {
        self.text(key).ok_or(ValidationError::MissingField(key))
    }
}

/// Wi-Fi 加密类型
#[derive(Debug, Clone, PartialEq, Default)]
pub enum Security {
    Open,
    Wep,
    #[default]
    Wpa,
    Unknown(String),
}

impl Security {
    /// WIFI: 载荷中 `T:` 段使用的标记
    pub fn payload_token(&self) -> &str {
        match self {
            Security::Open => "nopass",
            Security::Wep => "WEP",
            Security::Wpa => "WPA",
            Security::Unknown(s) => s.as_str(),
        }
    }
}

impl From<&str> for Security {
    fn from(s: &str) -> Self {
        let up = s.trim().to_uppercase();
        if up.contains("WPA") {
            Security::Wpa
        } else if up.contains("WEP") {
            Security::Wep
        } else if matches!(up.as_str(), "" | "--" | "NOPASS" | "OPEN" | "NONE") {
            Security::Open
        } else {
            Security::Unknown(s.trim().to_string())
        }
    }
}

// ════════════════════════════════════════════════════════════════
// 渲染选项
// ════════════════════════════════════════════════════════════════

/// 纠错等级
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ErrorLevel {
    L,
    #[default]
    M,
    Q,
    H,
}

impl From<ErrorLevel> for qrcode::EcLevel {
    fn from(level: ErrorLevel) -> Self {
        match level {
            ErrorLevel::L => qrcode::EcLevel::L,
            ErrorLevel::M => qrcode::EcLevel::M,
            ErrorLevel::Q => qrcode::EcLevel::Q,
            ErrorLevel::H => qrcode::EcLevel::H,
        }
    }
}

impl FromStr for ErrorLevel {
    type Err = EncodeError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_uppercase().as_str() {
            "L" | "LOW" => Ok(ErrorLevel::L),
            "M" | "MEDIUM" => Ok(ErrorLevel::M),
            "Q" | "QUARTILE" => Ok(ErrorLevel::Q),
            "H" | "HIGH" => Ok(ErrorLevel::H),
            _ => Err(EncodeError::InvalidLevel(s.to_string())),
        }
    }
}

impl std::fmt::Display for ErrorLevel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            ErrorLevel::L => "L",
            ErrorLevel::M => "M",
            ErrorLevel::Q => "Q",
            ErrorLevel::H => "H",
        };
        f.write_str(s)
    }
}

/// 模块颜色（RGBA）
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Color {
    pub r: u8,
    pub g: u8,
    pub b: u8,
    pub a: u8,
}

impl Color {
    pub const BLACK: Color = Color { r: 0, g: 0, b: 0, a: 255 };
    pub const WHITE: Color = Color { r: 255, g: 255, b: 255, a: 255 };

    pub fn rgba(&self) -> [u8; 4] {
        [self.r, self.g, self.b, self.a]
    }

    /// 不透明时输出 `#rrggbb`，否则 `#rrggbbaa`
    pub fn to_hex(&self) -> String {
        if self.a == 255 {
            format!("#{:02x}{:02x}{:02x}", self.r, self.g, self.b)
        } else {
            format!("#{:02x}{:02x}{:02x}{:02x}", self.r, self.g, self.b, self.a)
        }
    }
}

impl FromStr for Color {
    type Err = EncodeError;

    /// 支持 `#RGB`、`#RRGGBB`、`#RRGGBBAA`，`#` 可省略
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let invalid = || EncodeError::InvalidColor(s.to_string());
        let hex = s.trim().trim_start_matches('#');
        if !hex.chars().all(|c| c.is_ascii_hexdigit()) {
            return Err(invalid());
        }

        let expanded: String = match hex.len() {
            3 => hex.chars().flat_map(|c| [c, c]).collect(),
            6 | 8 => hex.to_string(),
            _ => return Err(invalid()),
        };
        let channel = |i: usize| u8::from_str_radix(&expanded[i..i + 2], 16).map_err(|_| invalid());

        Ok(Color {
            r: channel(0)?,
            g: channel(2)?,
            b: channel(4)?,
            a: if expanded.len() == 8 { channel(6)? } else { 255 },
        })
    }
}

/// 请求体里的渲染选项（字段都可缺省）
#[derive(Debug, Clone, Default, Deserialize)]
pub struct WireOptions {
    /// 数字或数字字符串，校验放到 `RenderOptions::from_wire`
    #[serde(default)]
    pub size: Option<Value>,
    #[serde(default)]
    pub foreground: Option<String>,
    #[serde(default)]
    pub background: Option<String>,
    #[serde(default, rename = "errorLevel", alias = "errorCorrectionLevel")]
    pub error_level: Option<String>,
}

/// 渲染选项：尺寸、前景/背景色、纠错等级
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RenderOptions {
    pub size: u32,
    pub foreground: Color,
    pub background: Color,
    pub level: ErrorLevel,
}

impl Default for RenderOptions {
    fn default() -> Self {
        Self {
            size: 300,
            foreground: Color::BLACK,
            background: Color::WHITE,
            level: ErrorLevel::M,
        }
    }
}

impl RenderOptions {
    /// 缺省或为 0 的尺寸回落到 `default_size`，空字符串视为未设置
    pub fn from_wire(wire: &WireOptions, default_size: u32) -> Result<Self, EncodeError> {
        let present = |v: &Option<String>| {
            v.as_deref()
                .map(str::trim)
                .filter(|s| !s.is_empty())
                .map(str::to_string)
        };

        Ok(Self {
            size: wire_size(wire.size.as_ref(), default_size)?,
            foreground: match present(&wire.foreground) {
                Some(s) => s.parse()?,
                None => Color::BLACK,
            },
            background: match present(&wire.background) {
                Some(s) => s.parse()?,
                None => Color::WHITE,
            },
            level: match present(&wire.error_level) {
                Some(s) => s.parse()?,
                None => ErrorLevel::M,
            },
        })
    }
}

/// 0、null、空字符串回落到默认值；负数或非数字是编码错误
fn wire_size(raw: Option<&Value>, default_size: u32) -> Result<u32, EncodeError> {
    let invalid = || EncodeError::InvalidSize(raw.map(Value::to_string).unwrap_or_default());
    let n = match raw {
        None | Some(Value::Null) => return Ok(default_size),
        Some(Value::String(s)) if s.trim().is_empty() => return Ok(default_size),
        Some(Value::String(s)) => s.trim().parse::<i64>().ok(),
        Some(Value::Number(n)) => n
            .as_i64()
            .or_else(|| n.as_f64().filter(|f| f.fract() == 0.0).map(|f| f as i64)),
        Some(_) => None,
    };
    match n {
        Some(0) => Ok(default_size),
        Some(n) => u32::try_from(n).map_err(|_| invalid()),
        None => Err(invalid()),
    }
}

// ════════════════════════════════════════════════════════════════
// 输出
// ════════════════════════════════════════════════════════════════

/// 下载格式
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutputFormat {
    Png,
    Svg,
}

impl FromStr for OutputFormat {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "png" | "raster" => Ok(OutputFormat::Png),
            "svg" | "vector" => Ok(OutputFormat::Svg),
            _ => Err(ValidationError::UnknownFormat(s.to_string())),
        }
    }
}

/// 下载用的生成结果，每次请求临时产出（内联预览直接用 data URL 字符串）
#[derive(Debug, Clone, PartialEq)]
pub enum Artifact {
    Png(Vec<u8>),
    Svg(String),
}

impl Artifact {
    pub fn content_type(&self) -> &'static str {
        match self {
            Artifact::Png(_) => "image/png",
            Artifact::Svg(_) => "image/svg+xml",
        }
    }

    pub fn extension(&self) -> &'static str {
        match self {
            Artifact::Png(_) => "png",
            Artifact::Svg(_) => "svg",
        }
    }

    pub fn into_bytes(self) -> Vec<u8> {
        match self {
            Artifact::Svg(s) => s.into_bytes(),
            Artifact::Png(b) => b,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn object(v: Value) -> Map<String, Value> {
        match v {
            Value::Object(m) => m,
            _ => panic!("expected object"),
        }
    }

    #[test]
    fn text_kind_takes_raw_text() {
        let req = ContentRequest::from_wire(ContentKind::Text, Some("hello"), None).unwrap();
        assert_eq!(req.text("text"), Some("hello"));
    }

    #[test]
    fn structured_kind_parses_text_as_json() {
        let raw = r#"{"ssid":"Home","password":"secret","hidden":true}"#;
        let req = ContentRequest::from_wire(ContentKind::Wifi, Some(raw), None).unwrap();
        assert_eq!(req.text("ssid"), Some("Home"));
        assert_eq!(req.flag("hidden"), Some(true));
    }

    #[test]
    fn fields_object_wins_over_text() {
        let fields = object(json!({ "phone": "+100", "message": "hi" }));
        let req = ContentRequest::from_wire(ContentKind::Sms, Some("not json"), Some(&fields)).unwrap();
        assert_eq!(req.text("phone"), Some("+100"));
    }

    #[test]
    fn blank_input_is_rejected() {
        assert_eq!(
            ContentRequest::from_wire(ContentKind::Text, Some("   "), None),
            Err(ValidationError::EmptyInput)
        );
        assert_eq!(
            ContentRequest::from_wire(ContentKind::Email, None, None),
            Err(ValidationError::EmptyInput)
        );
    }

    #[test]
    fn malformed_field_json_is_a_validation_error() {
        let err = ContentRequest::from_wire(ContentKind::Vcard, Some("{oops"), None).unwrap_err();
        assert!(matches!(err, ValidationError::MalformedFields(_)));
    }

    #[test]
    fn nested_field_values_are_rejected() {
        let fields = object(json!({ "to": ["a@b.c"] }));
        let err = ContentRequest::from_wire(ContentKind::Email, None, Some(&fields)).unwrap_err();
        assert_eq!(err, ValidationError::InvalidField("to".into()));
    }

    #[test]
    fn security_maps_to_payload_tokens() {
        assert_eq!(Security::from("WPA2").payload_token(), "WPA");
        assert_eq!(Security::from("wep").payload_token(), "WEP");
        assert_eq!(Security::from("nopass").payload_token(), "nopass");
        assert_eq!(Security::from("SAE").payload_token(), "SAE");
    }

    #[test]
    fn colors_parse_short_long_and_alpha_forms() {
        assert_eq!("#000".parse::<Color>().unwrap(), Color::BLACK);
        assert_eq!("FFFFFF".parse::<Color>().unwrap(), Color::WHITE);
        let c: Color = "#11223380".parse().unwrap();
        assert_eq!(c.rgba(), [0x11, 0x22, 0x33, 0x80]);
        assert_eq!(c.to_hex(), "#11223380");
        assert!("#12345".parse::<Color>().is_err());
        assert!("red".parse::<Color>().is_err());
    }

    #[test]
    fn wire_options_fall_back_to_defaults() {
        let opts = RenderOptions::from_wire(&WireOptions::default(), 300).unwrap();
        assert_eq!(opts, RenderOptions::default());

        let wire = WireOptions {
            size: Some(json!(0)),
            foreground: Some("#ff0000".into()),
            background: Some("".into()),
            error_level: Some("h".into()),
        };
        let opts = RenderOptions::from_wire(&wire, 512).unwrap();
        assert_eq!(opts.size, 512);
        assert_eq!(opts.foreground.to_hex(), "#ff0000");
        assert_eq!(opts.background, Color::WHITE);
        assert_eq!(opts.level, ErrorLevel::H);
    }

    #[test]
    fn wire_size_accepts_numeric_strings() {
        let wire = WireOptions {
            size: Some(json!("400")),
            ..Default::default()
        };
        assert_eq!(RenderOptions::from_wire(&wire, 300).unwrap().size, 400);

        let blank = WireOptions {
            size: Some(json!(" ")),
            ..Default::default()
        };
        assert_eq!(RenderOptions::from_wire(&blank, 300).unwrap().size, 300);
    }

    #[test]
    fn negative_or_garbage_size_is_an_encoding_error() {
        for raw in [json!(-5), json!("abc"), json!(12.5), json!([300])] {
            let wire = WireOptions {
                size: Some(raw.clone()),
                ..Default::default()
            };
            assert!(
                matches!(
                    RenderOptions::from_wire(&wire, 300),
                    Err(EncodeError::InvalidSize(_))
                ),
                "{raw}"
            );
        }
    }

    #[test]
    fn invalid_level_is_an_encoding_error() {
        let wire = WireOptions {
            error_level: Some("X".into()),
            ..Default::default()
        };
        assert!(matches!(
            RenderOptions::from_wire(&wire, 300),
            Err(EncodeError::InvalidLevel(_))
        ));
    }

    #[test]
    fn output_format_accepts_aliases() {
        assert_eq!("raster".parse::<OutputFormat>().unwrap(), OutputFormat::Png);
        assert_eq!("SVG".parse::<OutputFormat>().unwrap(), OutputFormat::Svg);
        assert!("gif".parse::<OutputFormat>().is_err());
    }
}
