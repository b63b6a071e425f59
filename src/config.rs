// src/config.rs — 配置加载，支持文件 / 环境变量 / 命令行覆盖

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// 监听地址
    pub bind: String,
    /// 监听端口（环境变量 PORT 优先）
    pub port: u16,
    /// 前端静态文件目录
    pub public_dir: PathBuf,
    /// 请求未指定尺寸时的默认边长（像素）
    pub default_size: u32,
    /// 允许的最大边长（像素）
    pub max_size: u32,
    /// 日志级别，RUST_LOG 未设置时生效
    pub log_level: String,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            bind: "0.0.0.0".into(),
            port: 3000,
            public_dir: PathBuf::from("public"),
            default_size: 300,
            max_size: 2048,
            log_level: "info".into(),
        }
    }
}

impl Config {
    /// 显式路径必须存在；否则按优先级查找候选文件，都没有则用默认值
    pub fn load(explicit: Option<&Path>) -> Result<Self> {
        let mut cfg = match explicit {
            Some(path) => Self::from_file(path)?,
            None => match config_candidates().iter().find(|p| p.exists()) {
                Some(path) => Self::from_file(path)?,
                None => Config::default(),
            },
        };
        cfg.apply_port(std::env::var("PORT").ok().as_deref());
        Ok(cfg)
    }

    pub fn from_file(path: &Path) -> Result<Self> {
        let text = std::fs::read_to_string(path)
            .with_context(|| format!("无法读取配置文件 {}", path.display()))?;
        let cfg: Config = toml::from_str(&text)
            .with_context(|| format!("配置文件格式错误 {}", path.display()))?;
        Ok(cfg)
    }

    /// 无法解析的端口值直接忽略
    pub fn apply_port(&mut self, raw: Option<&str>) {
        if let Some(port) = raw.and_then(|s| s.trim().parse().ok()) {
            self.port = port;
        }
    }

    pub fn listen_addr(&self) -> String {
        format!("{}:{}", self.bind, self.port)
    }
}

fn config_candidates() -> Vec<PathBuf> {
    let mut v = vec![PathBuf::from("qrgen.toml")];
    // 可执行文件同目录下的 config.toml
    if let Ok(exe) = std::env::current_exe() {
        if let Some(dir) = exe.parent() {
            v.push(dir.join("config.toml"));
        }
    }
    // ~/.config/qrgen/config.toml
    if let Some(dir) = dirs::config_dir() {
        v.push(dir.join("qrgen/config.toml"));
    }
    v
}
