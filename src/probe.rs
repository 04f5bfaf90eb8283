//! 命令可用性探测模块：
//! - 在 PATH 中查找可执行文件（先裸名，再带平台后缀）
//! - Unix 下额外询问交互式 shell 是否定义了同名 alias
//! - 探测策略按平台在启动时选定一次

use std::{
    env,
    ffi::OsString,
    path::{Path, PathBuf},
    process::{Command, Stdio},
};

use tracing::debug;

/// 命令的解析结果
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Resolution {
    Executable(PathBuf),
    /// 交互式 shell 中的 alias，只能经由该 shell 调用
    Alias { shell: PathBuf, name: String },
}

impl Resolution {
    /// 构造调用该命令的 `Command`
    pub fn command<S: AsRef<str>>(&self, args: &[S]) -> Command {
        match self {
            Resolution::Executable(path) => {
                let mut cmd = Command::new(path);
                cmd.args(args.iter().map(|a| a.as_ref()));
                cmd
            }
            Resolution::Alias { shell, name } => {
                let mut line = name.clone();
                for a in args {
                    line.push(' ');
                    line.push_str(&shell_quote(a.as_ref()));
                }
                let mut cmd = Command::new(shell);
                cmd.arg("-i").arg("-c").arg(line);
                cmd
            }
        }
    }
}

/// 探测结果：是否找到、实际确认的名字、以及如何调用
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Probe {
    pub found: bool,
    pub name: String,
    pub resolution: Option<Resolution>,
}

impl Probe {
    fn missing(name: String) -> Self { Self { found: false, name, resolution: None } }

    fn hit(name: String, resolution: Resolution) -> Self {
        Self { found: true, name, resolution: Some(resolution) }
    }
}

pub trait CapabilityProber {
    fn probe(&self, name: &str) -> Probe;
}

/// 纯 PATH 查找，失败后追加可执行后缀再试一次
#[derive(Debug, Clone)]
pub struct PathProber {
    path: Option<OsString>,
    suffix: &'static str,
}

impl PathProber {
    pub fn new(path: Option<OsString>, suffix: &'static str) -> Self { Self { path, suffix } }

    pub fn from_env() -> Self { Self::new(env::var_os("PATH"), ".exe") }
}

impl CapabilityProber for PathProber {
    fn probe(&self, name: &str) -> Probe {
        let Some(path) = self.path.as_ref() else { return Probe::missing(name.to_string()) };
        if let Some(found) = find_in_path(path, name) {
            return Probe::hit(name.to_string(), Resolution::Executable(found));
        }
        let suffixed = format!("{}{}", name, self.suffix);
        match find_in_path(path, &suffixed) {
            Some(found) => Probe::hit(suffixed, Resolution::Executable(found)),
            None => Probe::missing(name.to_string()),
        }
    }
}

/// 先查交互式 shell 的 alias，再退回 PATH 查找
#[derive(Debug, Clone)]
pub struct ShellAliasProber {
    shell: PathBuf,
    fallback: PathProber,
}

impl ShellAliasProber {
    pub fn new(shell: PathBuf, fallback: PathProber) -> Self { Self { shell, fallback } }

    fn has_alias(&self, name: &str) -> bool {
        // 非法名字直接跳过，避免拼进 shell 命令行
        if name.is_empty() || !name.chars().all(|c| c.is_ascii_alphanumeric() || "._-+".contains(c)) {
            return false;
        }
        let status = Command::new(&self.shell)
            .arg("-i")
            .arg("-c")
            .arg(format!("alias {}", name))
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .status();
        matches!(status, Ok(s) if s.success())
    }
}

impl CapabilityProber for ShellAliasProber {
    fn probe(&self, name: &str) -> Probe {
        if self.has_alias(name) {
            debug!(name, shell = %self.shell.display(), "resolved as shell alias");
            return Probe::hit(name.to_string(), Resolution::Alias { shell: self.shell.clone(), name: name.to_string() });
        }
        self.fallback.probe(name)
    }
}

/// 按当前平台选择探测策略
pub fn platform_prober() -> Box<dyn CapabilityProber> {
    if cfg!(unix) {
        // 只信任支持 `alias NAME` 查询语义的 sh 系 shell
        let shell = env::var_os("SHELL")
            .map(PathBuf::from)
            .filter(|s| matches!(s.file_name().and_then(|n| n.to_str()), Some("bash" | "zsh")))
            .unwrap_or_else(|| PathBuf::from("/bin/bash"));
        if shell.is_file() {
            return Box::new(ShellAliasProber::new(shell, PathProber::from_env()));
        }
    }
    Box::new(PathProber::from_env())
}

fn find_in_path(path_env: &OsString, exe_name: &str) -> Option<PathBuf> {
    for dir in env::split_paths(path_env) {
        let candidate = dir.join(exe_name);
        if is_executable(&candidate) {
            return Some(candidate);
        }
    }
    None
}

#[cfg(unix)]
pub(crate) fn is_executable(p: &Path) -> bool {
    use std::os::unix::fs::PermissionsExt;
    p.metadata().map(|m| m.is_file() && m.permissions().mode() & 0o111 != 0).unwrap_or(false)
}

#[cfg(not(unix))]
pub(crate) fn is_executable(p: &Path) -> bool {
    p.is_file()
}

fn shell_quote(s: &str) -> String {
    if !s.is_empty() && s.chars().all(|c| c.is_ascii_alphanumeric() || "._-/=:,".contains(c)) {
        return s.to_string();
    }
    format!("'{}'", s.replace('\'', r"'\''"))
}
