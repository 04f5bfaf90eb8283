//! 服务进程生命周期模块：
//! - 启动器侧：以独立进程启动 webview-server，并通过标准输出的就绪行确认启动
//! - 服务端侧：看门狗线程到时后向自身进程发送 SIGTERM
//! - 两边的倒计时指向同一截止时间，任意一方先触发都能回收资源

use std::{
    env,
    io::{BufRead, BufReader},
    path::Path,
    process::{Child, Stdio},
    sync::mpsc,
    thread,
    time::{Duration, Instant},
};

use anyhow::{Context, Result};
use tracing::{debug, info, warn};

use crate::{
    error::WebviewError,
    probe::{is_executable, CapabilityProber, Probe, Resolution},
    server::READY_PREFIX,
};

/// 等待就绪行的上限
pub const STARTUP_TIMEOUT: Duration = Duration::from_secs(10);
/// 发送 SIGTERM 后等待退出的时长，超时则强制结束
const TERMINATE_GRACE: Duration = Duration::from_secs(1);

/// 查找服务端命令：先按探测策略查找，再看启动器可执行文件所在目录
pub fn locate_server(prober: &dyn CapabilityProber, command: &str) -> Probe {
    let probe = prober.probe(command);
    if probe.found {
        return probe;
    }
    let sibling = env::current_exe()
        .ok()
        .and_then(|exe| exe.parent().map(|dir| dir.join(format!("{}{}", command, env::consts::EXE_SUFFIX))));
    match sibling {
        Some(p) if is_executable(&p) => {
            debug!(path = %p.display(), "server found next to launcher");
            Probe { found: true, name: command.to_string(), resolution: Some(Resolution::Executable(p)) }
        }
        _ => probe,
    }
}

/// 已启动的服务进程
#[derive(Debug)]
pub struct ServerHandle {
    child: Child,
    port: u16,
}

impl ServerHandle {
    /// 实际监听端口（请求 0 时由系统分配）
    pub fn port(&self) -> u16 { self.port }

    pub fn pid(&self) -> u32 { self.child.id() }

    pub fn is_running(&mut self) -> bool {
        matches!(self.child.try_wait(), Ok(None))
    }

    /// 若服务仍在运行则结束它：先 SIGTERM，宽限期后强制 kill
    pub fn terminate(mut self) -> Result<()> {
        if !self.is_running() {
            debug!(pid = self.pid(), "server already exited");
            return Ok(());
        }
        send_terminate(&self.child);
        let deadline = Instant::now() + TERMINATE_GRACE;
        while Instant::now() < deadline {
            if !self.is_running() {
                debug!(pid = self.pid(), "server terminated");
                return Ok(());
            }
            thread::sleep(Duration::from_millis(20));
        }
        warn!(pid = self.pid(), "server ignored SIGTERM, killing");
        self.child.kill().context("结束服务进程失败")?;
        let _ = self.child.wait();
        Ok(())
    }
}

impl Drop for ServerHandle {
    // 未经 terminate 就被丢弃（例如中途 panic）时，不留下无人管理的服务进程
    fn drop(&mut self) {
        if self.is_running() {
            warn!(pid = self.pid(), "server handle dropped while running, killing");
            let _ = self.child.kill();
            let _ = self.child.wait();
        }
    }
}

/// 启动参数
#[derive(Debug, Clone)]
pub struct SpawnRequest<'a> {
    pub resolution: &'a Resolution,
    pub root: &'a Path,
    pub port: u16,
    /// 服务端看门狗秒数，0 表示不限时
    pub sleep: f64,
    /// 保留服务端 stderr
    pub verbose: bool,
}

/// 以独立进程启动服务，阻塞到就绪行出现（或超时/提前退出）
pub fn spawn_server(req: &SpawnRequest<'_>) -> Result<ServerHandle> {
    let root = req.root.display().to_string();
    let port = req.port.to_string();
    let sleep = req.sleep.to_string();
    let mut args = vec!["--root", root.as_str(), "--port", port.as_str(), "--sleep", sleep.as_str()];
    if req.verbose {
        args.push("--verbose");
    }
    let mut cmd = req.resolution.command(&args);
    cmd.current_dir(req.root)
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(if req.verbose { Stdio::inherit() } else { Stdio::null() });
    if matches!(req.resolution, Resolution::Executable(_)) {
        detach(&mut cmd);
    }
    let mut child = cmd.spawn().context("启动服务进程失败")?;
    debug!(pid = child.id(), port = req.port, sleep = req.sleep, "server spawned");

    let stdout = child.stdout.take().context("无法读取服务进程输出")?;
    let (tx, rx) = mpsc::channel();
    thread::spawn(move || {
        let _ = tx.send(read_ready_port(BufReader::new(stdout)));
    });

    let start_error = |child: &mut Child, reason: String| -> anyhow::Error {
        let _ = child.kill();
        let _ = child.wait();
        WebviewError::ServerStart { port: req.port, reason }.into()
    };

    match rx.recv_timeout(STARTUP_TIMEOUT) {
        Ok(Some(bound)) => {
            info!(pid = child.id(), port = bound, "server ready");
            Ok(ServerHandle { child, port: bound })
        }
        Ok(None) => {
            let status = child.wait().map(|s| s.to_string()).unwrap_or_else(|e| e.to_string());
            Err(start_error(&mut child, format!("exited before listening ({}); is the port already in use?", status)))
        }
        Err(_) => Err(start_error(&mut child, format!("no readiness line within {:?}", STARTUP_TIMEOUT))),
    }
}

/// 读取直到出现 `LISTENING <port>`；EOF 返回 None
fn read_ready_port(reader: impl BufRead) -> Option<u16> {
    for line in reader.lines() {
        let line = line.ok()?;
        if let Some(rest) = line.trim().strip_prefix(READY_PREFIX) {
            if let Ok(p) = rest.trim().parse::<u16>() {
                return Some(p);
            }
        }
    }
    None
}

#[cfg(unix)]
fn detach(cmd: &mut std::process::Command) {
    use std::os::unix::process::CommandExt;
    // 独立进程组：终端的 Ctrl-C 不会波及服务
    cmd.process_group(0);
}

#[cfg(windows)]
fn detach(cmd: &mut std::process::Command) {
    use std::os::windows::process::CommandExt;
    const CREATE_NEW_PROCESS_GROUP: u32 = 0x0000_0200;
    const CREATE_NO_WINDOW: u32 = 0x0800_0000;
    cmd.creation_flags(CREATE_NEW_PROCESS_GROUP | CREATE_NO_WINDOW);
}

#[cfg(not(any(unix, windows)))]
fn detach(_cmd: &mut std::process::Command) {}

#[cfg(unix)]
fn send_terminate(child: &Child) {
    use nix::{sys::signal::{kill, Signal}, unistd::Pid};
    let _ = kill(Pid::from_raw(child.id() as i32), Signal::SIGTERM);
}

#[cfg(not(unix))]
fn send_terminate(_child: &Child) {}

/// 服务端看门狗：`sleep` 秒后终止当前进程；0 表示不限时
pub fn arm_watchdog(sleep: f64) -> Result<Option<thread::JoinHandle<()>>> {
    if sleep <= 0.0 {
        debug!("watchdog disabled, running until killed");
        return Ok(None);
    }
    let window = Duration::from_secs_f64(sleep);
    let handle = thread::Builder::new()
        .name("webview-watchdog".into())
        .spawn(move || {
            thread::sleep(window);
            info!(seconds = window.as_secs_f64(), "time window elapsed, shutting down");
            terminate_self();
        })
        .context("启动看门狗线程失败")?;
    Ok(Some(handle))
}

#[cfg(unix)]
fn terminate_self() {
    use nix::{sys::signal::{kill, Signal}, unistd::Pid};
    if kill(Pid::this(), Signal::SIGTERM).is_err() {
        std::process::exit(0);
    }
}

#[cfg(not(unix))]
fn terminate_self() {
    std::process::exit(0);
}
