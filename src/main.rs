// src/main.rs — 主入口：HTTP 服务 & 离线渲染命令
mod config;
mod error;
mod payload;
mod qr;
mod server;
mod types;

use anyhow::{bail, Context, Result};
use clap::{Args, Parser, Subcommand};
use config::Config;
use qr::Encoder;
use std::path::PathBuf;
use tracing::info;
use tracing_subscriber::EnvFilter;
use types::{Color, ContentKind, ContentRequest, ErrorLevel, OutputFormat, RenderOptions};

// ════════════════════════════════════════════════════════════════
// CLI 参数
// ════════════════════════════════════════════════════════════════

#[derive(Parser)]
#[command(name = "qrgen", about = "二维码生成服务", version)]
struct Cli {
    /// 指定配置文件（默认按 ./qrgen.toml → 程序目录 → ~/.config/qrgen 查找）
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    cmd: Option<Cmd>,
}

#[derive(Subcommand)]
enum Cmd {
    /// 启动 HTTP 服务（默认）
    Serve(ServeArgs),
    /// 离线生成二维码到文件或终端
    Render(RenderArgs),
}

#[derive(Args, Default)]
struct ServeArgs {
    /// 监听地址
    #[arg(long)]
    bind: Option<String>,
    /// 监听端口
    #[arg(short, long)]
    port: Option<u16>,
    /// 前端静态文件目录
    #[arg(long)]
    public: Option<PathBuf>,
}

#[derive(Args)]
struct RenderArgs {
    /// 内容类型
    #[arg(short = 't', long = "type", value_enum, default_value_t = ContentKind::Text)]
    kind: ContentKind,
    /// 文本 / URL，结构化类型可传 JSON 对象
    #[arg(long)]
    text: Option<String>,
    /// 结构化字段，形如 ssid=Home，可重复
    #[arg(short, long = "field", value_parser = parse_field)]
    fields: Vec<(String, String)>,
    /// 边长（像素）
    #[arg(short, long)]
    size: Option<u32>,
    /// 前景色，如 #000000
    #[arg(long)]
    foreground: Option<Color>,
    /// 背景色，如 #ffffff
    #[arg(long)]
    background: Option<Color>,
    /// 纠错等级 L/M/Q/H
    #[arg(short, long, default_value_t = ErrorLevel::M)]
    level: ErrorLevel,
    /// 输出文件，按扩展名选择 .png / .svg
    #[arg(short, long, required_unless_present = "terminal", conflicts_with = "terminal")]
    output: Option<PathBuf>,
    /// 直接在终端打印块字符二维码
    #[arg(long)]
    terminal: bool,
}

fn parse_field(raw: &str) -> Result<(String, String), String> {
    match raw.split_once('=') {
        Some((k, v)) if !k.trim().is_empty() => Ok((k.trim().to_string(), v.to_string())),
        _ => Err(format!("字段格式应为 key=value: {raw}")),
    }
}

// ════════════════════════════════════════════════════════════════
// 入口
// ════════════════════════════════════════════════════════════════

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    let cfg = Config::load(cli.config.as_deref())?;
    init_tracing(&cfg.log_level);

    match cli.cmd {
        Some(Cmd::Render(args)) => render(&cfg, args).await?,
        Some(Cmd::Serve(args)) => serve(cfg, args).await?,
        None => serve(cfg, ServeArgs::default()).await?,
    }

    Ok(())
}

/// RUST_LOG 优先，其次配置文件里的 log_level
fn init_tracing(default_level: &str) {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .init();
}

// ════════════════════════════════════════════════════════════════
// HTTP 服务
// ════════════════════════════════════════════════════════════════

async fn serve(mut cfg: Config, args: ServeArgs) -> Result<()> {
    if let Some(bind) = args.bind {
        cfg.bind = bind;
    }
    if let Some(port) = args.port {
        cfg.port = port;
    }
    if let Some(public) = args.public {
        cfg.public_dir = public;
    }

    let public_dir = if cfg.public_dir.is_dir() {
        Some(cfg.public_dir.as_path())
    } else {
        tracing::warn!(dir = %cfg.public_dir.display(), "静态目录不存在，仅提供 API");
        None
    };

    let app = server::router(server::AppState::from_config(&cfg), public_dir);
    let addr = cfg.listen_addr();
    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .with_context(|| format!("无法监听 {addr}"))?;

    info!("二维码生成服务已启动: http://{addr}");
    info!("API 入口: http://{addr}/api/generate");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("HTTP 服务异常退出")?;

    info!("服务已停止");
    Ok(())
}

/// Ctrl-C 或 SIGTERM 触发优雅退出，等待进行中的请求完成
async fn shutdown_signal() {
    let ctrl_c = async {
        let _ = tokio::signal::ctrl_c().await;
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut sig) => {
                sig.recv().await;
            }
            Err(_) => std::future::pending::<()>().await,
        }
    };
    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
    info!("收到退出信号，正在关闭…");
}

// ════════════════════════════════════════════════════════════════
// 离线渲染
// ════════════════════════════════════════════════════════════════

async fn render(cfg: &Config, args: RenderArgs) -> Result<()> {
    let mut request = match args.text.as_deref() {
        Some(text) => ContentRequest::from_wire(args.kind, Some(text), None)?,
        None => ContentRequest::new(args.kind),
    };
    for (key, value) in args.fields {
        request = request.with_field(key, value);
    }

    let payload = payload::format(&request)?;
    let options = RenderOptions {
        size: args.size.filter(|&s| s > 0).unwrap_or(cfg.default_size),
        foreground: args.foreground.unwrap_or(Color::BLACK),
        background: args.background.unwrap_or(Color::WHITE),
        level: args.level,
    };
    let encoder = Encoder::new(cfg.max_size);

    if args.terminal {
        println!("{}", encoder.terminal(&payload, &options)?);
        return Ok(());
    }

    let Some(path) = args.output else {
        bail!("需要 --output 或 --terminal");
    };
    let format = match path.extension().and_then(|e| e.to_str()) {
        Some(ext) if ext.eq_ignore_ascii_case("svg") => OutputFormat::Svg,
        _ => OutputFormat::Png,
    };

    let artifact = qr::run_blocking(move || encoder.download(&payload, &options, format)).await?;
    tokio::fs::write(&path, artifact.into_bytes())
        .await
        .with_context(|| format!("无法写入 {}", path.display()))?;
    println!("已保存到 {}", path.display());
    Ok(())
}
