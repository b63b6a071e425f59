// src/qr.rs — 编码网关：载荷 + 渲染选项 → PNG / data URL / SVG / 终端块字符

use crate::error::EncodeError;
use crate::types::{Artifact, OutputFormat, RenderOptions};
use base64::{engine::general_purpose::STANDARD, Engine as _};
use image::imageops::{self, FilterType};
use image::{DynamicImage, ImageFormat, Rgba};
use qrcode::render::{svg, unicode};
use qrcode::QrCode;
use std::io::Cursor;

/// qrcode 渲染器的静区宽度（模块数，单边）
const QUIET_ZONE: u32 = 4;

/// 对外部二维码库的薄封装，只负责转发选项和错误
#[derive(Debug, Clone, Copy)]
pub struct Encoder {
    max_size: u32,
}

impl Encoder {
    pub fn new(max_size: u32) -> Self {
        Self { max_size }
    }

    fn symbol(&self, payload: &str, opts: &RenderOptions) -> Result<QrCode, EncodeError> {
        if opts.size == 0 || opts.size > self.max_size {
            return Err(EncodeError::SizeOutOfRange {
                size: opts.size,
                max: self.max_size,
            });
        }
        Ok(QrCode::with_error_correction_level(
            payload.as_bytes(),
            opts.level.into(),
        )?)
    }

    /// PNG 字节，边长恰好为 `size`（`size` 小于模块数时按 1 像素/模块输出）
    pub fn png(&self, payload: &str, opts: &RenderOptions) -> Result<Vec<u8>, EncodeError> {
        let code = self.symbol(payload, opts)?;
        let mut image = code
            .render::<Rgba<u8>>()
            .dark_color(Rgba(opts.foreground.rgba()))
            .light_color(Rgba(opts.background.rgba()))
            .min_dimensions(opts.size, opts.size)
            .build();

        let modules = code.width() as u32 + 2 * QUIET_ZONE;
        if opts.size >= modules && image.width() != opts.size {
            image = imageops::resize(&image, opts.size, opts.size, FilterType::Nearest);
        }

        let mut out = Cursor::new(Vec::new());
        DynamicImage::ImageRgba8(image).write_to(&mut out, ImageFormat::Png)?;
        Ok(out.into_inner())
    }

    /// 内联预览用的 `data:image/png;base64,...`
    pub fn data_url(&self, payload: &str, opts: &RenderOptions) -> Result<String, EncodeError> {
        let png = self.png(payload, opts)?;
        Ok(format!("data:image/png;base64,{}", STANDARD.encode(png)))
    }

    pub fn svg(&self, payload: &str, opts: &RenderOptions) -> Result<String, EncodeError> {
        let code = self.symbol(payload, opts)?;
        let dark = opts.foreground.to_hex();
        let light = opts.background.to_hex();
        Ok(code
            .render::<svg::Color<'_>>()
            .min_dimensions(opts.size, opts.size)
            .dark_color(svg::Color(&dark))
            .light_color(svg::Color(&light))
            .build())
    }

    /// UTF-8 块字符二维码，颜色与尺寸选项不生效
    pub fn terminal(&self, payload: &str, opts: &RenderOptions) -> Result<String, EncodeError> {
        let code = QrCode::with_error_correction_level(payload.as_bytes(), opts.level.into())?;
        let image = code
            .render::<unicode::Dense1x2>()
            .quiet_zone(true)
            .build();

        // 每行加两个前导空格，终端里稍微居中
        let padded = image
            .lines()
            .map(|l| format!("  {l}"))
            .collect::<Vec<_>>()
            .join("\n");

        Ok(padded)
    }

    /// 下载用：按格式产出 PNG 或 SVG
    pub fn download(
        &self,
        payload: &str,
        opts: &RenderOptions,
        format: OutputFormat,
    ) -> Result<Artifact, EncodeError> {
        match format {
            OutputFormat::Png => self.png(payload, opts).map(Artifact::Png),
            OutputFormat::Svg => self.svg(payload, opts).map(Artifact::Svg),
        }
    }
}

/// 编码是 CPU 密集操作，放到阻塞线程池里跑
pub async fn run_blocking<T, F>(f: F) -> Result<T, EncodeError>
where
    F: FnOnce() -> Result<T, EncodeError> + Send + 'static,
    T: Send + 'static,
{
    tokio::task::spawn_blocking(f)
        .await
        .map_err(|e| EncodeError::Worker(e.to_string()))?
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{Color, ErrorLevel};

    fn encoder() -> Encoder {
        Encoder::new(2048)
    }

    #[test]
    fn png_is_deterministic_and_sized() {
        let opts = RenderOptions::default();
        let a = encoder().png("hello", &opts).unwrap();
        let b = encoder().png("hello", &opts).unwrap();
        assert_eq!(a, b);

        let decoded = image::load_from_memory(&a).unwrap();
        assert_eq!((decoded.width(), decoded.height()), (300, 300));
    }

    #[test]
    fn png_uses_requested_colors() {
        let opts = RenderOptions {
            foreground: "#ff0000".parse().unwrap(),
            background: "#00ff00".parse().unwrap(),
            ..Default::default()
        };
        let png = encoder().png("colors", &opts).unwrap();
        let img = image::load_from_memory(&png).unwrap().to_rgba8();

        // 左上角落在静区内
        assert_eq!(img.get_pixel(0, 0).0, [0, 255, 0, 255]);
        assert!(img.pixels().any(|p| p.0 == [255, 0, 0, 255]));
    }

    #[test]
    fn svg_is_deterministic_and_colored() {
        let opts = RenderOptions {
            foreground: Color { r: 0x12, g: 0x34, b: 0x56, a: 255 },
            ..Default::default()
        };
        let a = encoder().svg("hello", &opts).unwrap();
        let b = encoder().svg("hello", &opts).unwrap();
        assert_eq!(a, b);
        assert!(a.contains("<svg"));
        assert!(a.contains("#123456"));
        assert!(a.contains("#ffffff"));
    }

    #[test]
    fn data_url_wraps_png() {
        let url = encoder().data_url("hello", &RenderOptions::default()).unwrap();
        let encoded = url.strip_prefix("data:image/png;base64,").unwrap();
        let png = STANDARD.decode(encoded).unwrap();
        assert_eq!(&png[..4], b"\x89PNG");
    }

    #[test]
    fn oversized_payload_is_rejected() {
        let payload = "a".repeat(3000);
        let opts = RenderOptions {
            level: ErrorLevel::H,
            ..Default::default()
        };
        assert!(matches!(
            encoder().png(&payload, &opts),
            Err(EncodeError::Qr(_))
        ));
    }

    #[test]
    fn size_limits_are_enforced() {
        let opts = RenderOptions {
            size: 4096,
            ..Default::default()
        };
        assert!(matches!(
            encoder().svg("hello", &opts),
            Err(EncodeError::SizeOutOfRange { size: 4096, max: 2048 })
        ));
    }

    #[test]
    fn download_picks_artifact_by_format() {
        let opts = RenderOptions::default();
        let png = encoder().download("x", &opts, OutputFormat::Png).unwrap();
        assert_eq!(png.content_type(), "image/png");
        let svg = encoder().download("x", &opts, OutputFormat::Svg).unwrap();
        assert_eq!(svg.extension(), "svg");
    }

    #[test]
    fn terminal_output_is_indented_blocks() {
        let text = encoder().terminal("hello", &RenderOptions::default()).unwrap();
        assert!(text.lines().all(|l| l.starts_with("  ")));
        assert!(text.lines().count() > 10);
    }

    #[tokio::test]
    async fn blocking_runner_propagates_results() {
        let enc = encoder();
        let svg = run_blocking(move || enc.svg("async", &RenderOptions::default()))
            .await
            .unwrap();
        assert!(svg.contains("<svg"));
    }
}
