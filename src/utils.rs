//! 通用辅助函数：
//! - 环境变量读取与解析
//! - 安全的子路径处理
//! - 平台探测（WSL）

use std::{env, path::PathBuf};

/// 将字符串转为安全子路径（过滤 `.` / `..` 等危险片段）。
pub fn safe_subpath(s: &str) -> Option<PathBuf> {
    let mut p = PathBuf::new();
    for seg in s.split(['/', '\\']) {
        let t = seg.trim();
        if t.is_empty() || t == "." || t == ".." || t.contains(':') { continue; }
        p.push(t);
    }
    if p.components().next().is_none() { None } else { Some(p) }
}

/// 可选读取 PATH 类环境变量为 PathBuf。
pub fn env_opt_path(key: &str) -> Option<PathBuf> {
    env::var_os(key).filter(|v| !v.is_empty()).map(PathBuf::from)
}

/// 可选读取 String 环境变量。
pub fn env_opt_string(key: &str) -> Option<String> {
    env::var(key).ok().map(|s| s.trim().to_string()).filter(|s| !s.is_empty())
}

/// 读取布尔环境变量的真值（1/true/on/yes/y）。
pub fn env_bool_truthy(key: &str) -> Option<bool> {
    env::var(key).ok().map(|v| {
        matches!(v.trim().to_ascii_lowercase().as_str(), "1" | "true" | "on" | "yes" | "y")
    })
}

/// 是否运行在 WSL 中
#[cfg(target_os = "linux")]
pub fn in_wsl() -> bool {
    std::fs::read_to_string("/proc/sys/kernel/osrelease")
        .map(|r| r.contains("microsoft-standard"))
        .unwrap_or(false)
}

#[cfg(not(target_os = "linux"))]
pub fn in_wsl() -> bool { false }

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::Path;

    #[test]
    fn safe_subpath_drops_traversal() {
        assert_eq!(safe_subpath("/a/../b/./c.off"), Some(PathBuf::from("a/b/c.off")));
        assert_eq!(safe_subpath("..\\..\\x.wrl"), Some(PathBuf::from("x.wrl")));
        assert_eq!(safe_subpath("/C:/Windows/x"), Some(Path::new("Windows").join("x")));
        assert_eq!(safe_subpath("/"), None);
    }
}
