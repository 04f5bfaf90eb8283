//! 配置与加载模块：
//! - 定义每次调用构造一次的 `Settings`（端口、等待时长、查看器、浏览器）
//! - 优先级：命令行 > 环境变量 > YAML 配置文件 > 内置默认值
//! - 暴露配置来源信息，便于日志打印

use std::{
    fs,
    path::{Path, PathBuf},
};

use anyhow::{bail, Context, Result};
use serde::Deserialize;

use crate::utils::{env_opt_path, env_opt_string};

pub const DEFAULT_PORT: u16 = 8080;
pub const DEFAULT_SLEEP: f64 = 4.0;
pub const DEFAULT_URL: usize = 1;
pub const DEFAULT_SERVER_COMMAND: &str = "webview-server";

/// 启动器等待时长范围（秒）
pub const SLEEP_RANGE: (f64, f64) = (1.0, 3600.0);
/// 服务端看门狗时长范围（秒），0 表示不限时
pub const SERVER_SLEEP_RANGE: (f64, f64) = (0.0, 3600.0);

/// YAML 配置文件结构（所有字段可选）
#[derive(Debug, Default, Deserialize, PartialEq)]
#[serde(deny_unknown_fields)]
pub struct FileConfig {
    #[serde(default)]
    pub port: Option<u16>,
    #[serde(default)]
    pub sleep: Option<f64>,
    /// 默认查看器编号
    #[serde(default)]
    pub url: Option<usize>,
    /// 默认浏览器编号
    #[serde(default)]
    pub browser: Option<usize>,
    /// 服务端命令名（默认 webview-server）
    #[serde(default)]
    pub server: Option<String>,
}

/// 配置来源（用于打印和调试）
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConfigSource {
    Builtin,
    LocalExplicit(PathBuf),
    LocalAuto(PathBuf),
}

/// 人类可读的来源描述
pub fn describe_source(src: &ConfigSource) -> String {
    match src {
        ConfigSource::Builtin => "内置默认值".to_string(),
        ConfigSource::LocalExplicit(p) => format!("本地文件: {}", p.display()),
        ConfigSource::LocalAuto(p) => format!("本地文件(自动发现): {}", p.display()),
    }
}

/// 命令行提供的覆盖项
#[derive(Debug, Default, Clone)]
pub struct Overrides {
    pub config: Option<PathBuf>,
    pub port: Option<u16>,
    pub sleep: Option<f64>,
    pub url: Option<usize>,
    pub browser: Option<usize>,
}

/// 一次调用的有效配置
#[derive(Debug, Clone, PartialEq)]
pub struct Settings {
    pub port: u16,
    pub sleep: f64,
    pub url: usize,
    pub browser: usize,
    pub server_command: String,
    pub source: ConfigSource,
}

/// 检查浮点数位于闭区间内
pub fn check_range(v: f64, (lo, hi): (f64, f64)) -> Result<f64> {
    if !v.is_finite() || v < lo || v > hi {
        bail!("must be in range [{} .. {}]", lo, hi);
    }
    Ok(v)
}

/// 按优先级合并出有效配置；`default_browser` 由浏览器目录按平台给出
pub fn resolve_settings(cli: &Overrides, default_browser: usize) -> Result<Settings> {
    let explicit = cli.config.clone().or_else(|| env_opt_path("WEBVIEW_CONFIG"));
    let (file, source) = load_file_config(explicit.as_deref())?;

    let port = match cli.port {
        Some(p) => p,
        None => match env_opt_string("WEBVIEW_PORT") {
            Some(s) => s.parse::<u16>().with_context(|| format!("WEBVIEW_PORT 无效: {} (0-65535)", s))?,
            None => file.port.unwrap_or(DEFAULT_PORT),
        },
    };
    let sleep = match cli.sleep {
        Some(s) => s,
        None => match env_opt_string("WEBVIEW_SLEEP") {
            Some(s) => s.parse::<f64>().with_context(|| format!("WEBVIEW_SLEEP 无效: {}", s))?,
            None => file.sleep.unwrap_or(DEFAULT_SLEEP),
        },
    };
    let sleep = check_range(sleep, SLEEP_RANGE).context("sleep")?;
    let url = match cli.url {
        Some(u) => u,
        None => match env_opt_string("WEBVIEW_URL") {
            Some(s) => s.parse::<usize>().with_context(|| format!("WEBVIEW_URL 无效: {}", s))?,
            None => file.url.unwrap_or(DEFAULT_URL),
        },
    };
    let browser = match cli.browser {
        Some(b) => b,
        None => match env_opt_string("WEBVIEW_BROWSER") {
            Some(s) => s.parse::<usize>().with_context(|| format!("WEBVIEW_BROWSER 无效: {}", s))?,
            None => file.browser.unwrap_or(default_browser),
        },
    };
    let server_command = env_opt_string("WEBVIEW_SERVER")
        .or(file.server)
        .unwrap_or_else(|| DEFAULT_SERVER_COMMAND.to_string());

    Ok(Settings { port, sleep, url, browser, server_command, source })
}

// 自动发现本地配置：webview.yaml / webview.yml
fn resolve_local_config_path() -> Option<PathBuf> {
    ["webview.yaml", "webview.yml"].into_iter().map(PathBuf::from).find(|p| p.is_file())
}

fn load_file_config(explicit: Option<&Path>) -> Result<(FileConfig, ConfigSource)> {
    if let Some(path) = explicit {
        let cfg = parse_file(path)?;
        return Ok((cfg, ConfigSource::LocalExplicit(path.to_path_buf())));
    }
    if let Some(path) = resolve_local_config_path() {
        let cfg = parse_file(&path)?;
        return Ok((cfg, ConfigSource::LocalAuto(path)));
    }
    Ok((FileConfig::default(), ConfigSource::Builtin))
}

fn parse_file(path: &Path) -> Result<FileConfig> {
    let text = fs::read_to_string(path).with_context(|| format!("读取配置失败: {}", path.display()))?;
    if text.trim().is_empty() {
        return Ok(FileConfig::default());
    }
    serde_yaml::from_str(&text).with_context(|| format!("解析 YAML 失败: {}", path.display()))
}
