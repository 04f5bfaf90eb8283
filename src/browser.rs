//! 浏览器选择与打开模块：
//! - 每个平台一份浏览器路径目录（Linux / Windows / WSL / 其它）
//! - 目录末尾总是追加“系统默认浏览器”（webbrowser crate）
//! - 指定路径的浏览器以后台进程方式启动，不等待其退出

use std::{
    path::PathBuf,
    process::{Command, Stdio},
};

use anyhow::{Context, Result};
use tracing::debug;

use crate::{error::WebviewError, utils::in_wsl};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BrowserTarget {
    Path(PathBuf),
    SystemDefault,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BrowserEntry {
    pub label: String,
    pub target: BrowserTarget,
}

/// 平台相关的浏览器目录
pub trait BrowserCatalog {
    fn name(&self) -> &'static str;
    /// 不含“系统默认”的固定路径条目
    fn fixed_entries(&self) -> Vec<BrowserEntry>;
    fn default_index(&self) -> usize;

    /// 完整列表：固定条目 + 系统默认
    fn entries(&self) -> Vec<BrowserEntry> {
        let mut all = self.fixed_entries();
        all.push(BrowserEntry { label: "System default browser".into(), target: BrowserTarget::SystemDefault });
        all
    }

    /// 按 1 起始编号选择，0 与越界返回 None
    fn select(&self, index: usize) -> Option<BrowserEntry> {
        if index == 0 { return None; }
        self.entries().into_iter().nth(index - 1)
    }
}

fn entry(label: &str, path: String) -> BrowserEntry {
    BrowserEntry { label: label.to_string(), target: BrowserTarget::Path(PathBuf::from(path)) }
}

pub struct LinuxCatalog;

impl BrowserCatalog for LinuxCatalog {
    fn name(&self) -> &'static str { "linux" }

    fn fixed_entries(&self) -> Vec<BrowserEntry> {
        vec![
            entry("Microsoft Edge", "/usr/bin/msedge".into()),
            entry("Chrome", "/usr/bin/google-chrome".into()),
            entry("Firefox", "/snap/bin/firefox".into()),
        ]
    }

    fn default_index(&self) -> usize { 2 }
}

/// Windows 路径目录；WSL 下前缀为 /mnt/c
pub struct WindowsCatalog {
    pub prefix: &'static str,
}

impl BrowserCatalog for WindowsCatalog {
    fn name(&self) -> &'static str {
        if self.prefix == "C:" { "windows" } else { "wsl" }
    }

    fn fixed_entries(&self) -> Vec<BrowserEntry> {
        let p = self.prefix;
        vec![
            entry("Microsoft Edge", format!("{}/Program Files (x86)/Microsoft/Edge/Application/msedge.exe", p)),
            entry("Chrome", format!("{}/Program Files (x86)/Google/Chrome/Application/chrome.exe", p)),
            entry("Firefox", format!("{}/Program Files/Mozilla Firefox/firefox.exe", p)),
        ]
    }

    fn default_index(&self) -> usize { 1 }
}

/// 没有固定路径表的平台，只提供系统默认浏览器
pub struct DefaultOnlyCatalog;

impl BrowserCatalog for DefaultOnlyCatalog {
    fn name(&self) -> &'static str { "other" }

    fn fixed_entries(&self) -> Vec<BrowserEntry> { Vec::new() }

    fn default_index(&self) -> usize { 1 }
}

/// 启动时按平台选定一次
pub fn platform_catalog() -> Box<dyn BrowserCatalog> {
    if cfg!(windows) {
        Box::new(WindowsCatalog { prefix: "C:" })
    } else if cfg!(target_os = "linux") {
        if in_wsl() { Box::new(WindowsCatalog { prefix: "/mnt/c" }) } else { Box::new(LinuxCatalog) }
    } else {
        Box::new(DefaultOnlyCatalog)
    }
}

/// 生成浏览器列表文本
pub fn browser_listing(catalog: &dyn BrowserCatalog) -> Vec<String> {
    let mut lines = vec!["0 - listing (set the default with --browser, WEBVIEW_BROWSER or the config file)".to_string()];
    for (i, e) in catalog.entries().iter().enumerate() {
        lines.push(format!("{} - {}", i + 1, e.label));
    }
    lines
}

/// 确认所选浏览器可用；路径不存在视为致命错误
pub fn verify(entry: &BrowserEntry) -> Result<()> {
    if let BrowserTarget::Path(p) = &entry.target {
        if !p.is_file() {
            return Err(WebviewError::BrowserNotFound(p.clone()).into());
        }
    }
    Ok(())
}

/// 在后台打开 URL，立即返回
pub fn open(entry: &BrowserEntry, url: &str) -> Result<()> {
    debug!(browser = %entry.label, url, "opening browser");
    match &entry.target {
        BrowserTarget::Path(p) => {
            Command::new(p)
                .arg(url)
                .stdin(Stdio::null())
                .stdout(Stdio::null())
                .stderr(Stdio::null())
                .spawn()
                .with_context(|| format!("启动浏览器失败: {}", p.display()))?;
            Ok(())
        }
        BrowserTarget::SystemDefault => {
            webbrowser::open(url).with_context(|| "打开系统默认浏览器失败")
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn catalogs_end_with_system_default() {
        let linux = LinuxCatalog;
        assert_eq!(linux.entries().len(), 4);
        assert_eq!(linux.select(4).unwrap().target, BrowserTarget::SystemDefault);
        assert_eq!(linux.select(2).unwrap().label, "Chrome");
        assert!(linux.select(0).is_none());
        assert!(linux.select(5).is_none());
        assert_eq!(DefaultOnlyCatalog.select(DefaultOnlyCatalog.default_index()).unwrap().target, BrowserTarget::SystemDefault);
    }

    #[test]
    fn wsl_paths_use_mount_prefix() {
        let wsl = WindowsCatalog { prefix: "/mnt/c" };
        assert_eq!(wsl.name(), "wsl");
        assert_eq!(
            wsl.select(3).unwrap().target,
            BrowserTarget::Path(PathBuf::from("/mnt/c/Program Files/Mozilla Firefox/firefox.exe"))
        );
    }

    #[test]
    fn missing_browser_path_is_fatal() {
        let e = BrowserEntry { label: "x".into(), target: BrowserTarget::Path(PathBuf::from("/nonexistent/browser")) };
        let err = verify(&e).unwrap_err();
        assert!(matches!(err.downcast_ref::<WebviewError>(), Some(WebviewError::BrowserNotFound(_))));
        assert!(verify(&BrowserEntry { label: "d".into(), target: BrowserTarget::SystemDefault }).is_ok());
    }

    #[test]
    fn listing_numbers_from_zero() {
        let lines = browser_listing(&LinuxCatalog);
        assert_eq!(lines[0].split(" - ").next(), Some("0"));
        assert_eq!(lines[2], "2 - Chrome");
    }
}
