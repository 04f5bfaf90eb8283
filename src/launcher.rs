//! 启动器编排模块：
//! - 状态机：暂存 → 探测 → 服务 → 交接 → 等待 → 清理，任一阶段可转入错误
//! - 错误路径上暂存目录同样被删除，已启动的服务同样被结束
//! - 平台相关部分（命令探测、浏览器目录、打开方式）通过 `Deps` 注入

use std::{fmt, io::Write, thread, time::Duration};

use anyhow::{bail, Context, Result};
use tracing::{debug, info};

use crate::{
    browser::{browser_listing, verify, BrowserCatalog, BrowserEntry},
    cli::X3dArgs,
    config::Settings,
    convert::run_pipeline,
    error::WebviewError,
    handoff::{build_handoff_url, variant_listing, DisplayConfig, ModelKind},
    lifecycle::{locate_server, spawn_server, ServerHandle, SpawnRequest},
    probe::CapabilityProber,
    stage::{stage_input, Input, StagedArtifact},
};

/// 会话阶段
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    Staging,
    Probing,
    Serving,
    HandedOff,
    Waiting,
    CleanedUp,
    Error,
}

impl fmt::Display for Phase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Phase::Staging => "staging",
            Phase::Probing => "probing",
            Phase::Serving => "serving",
            Phase::HandedOff => "handed-off",
            Phase::Waiting => "waiting",
            Phase::CleanedUp => "cleaned-up",
            Phase::Error => "error",
        };
        f.write_str(s)
    }
}

/// 记录阶段迁移，便于调试和测试
#[derive(Debug, Default)]
pub struct PhaseLog {
    pub history: Vec<Phase>,
}

impl PhaseLog {
    fn enter(&mut self, phase: Phase) {
        debug!(from = ?self.history.last(), to = %phase, "phase");
        self.history.push(phase);
    }

    pub fn current(&self) -> Option<Phase> { self.history.last().copied() }
}

/// 一次会话的输入
#[derive(Debug, Clone)]
pub struct Session {
    pub kind: ModelKind,
    pub input: Input,
    pub settings: Settings,
    pub display: DisplayConfig,
    /// 仅 x3d 子命令有效
    pub convert: Option<X3dArgs>,
    pub verbose: bool,
}

/// 平台相关的协作者
pub struct Deps<'a> {
    pub prober: &'a dyn CapabilityProber,
    pub catalog: &'a dyn BrowserCatalog,
    pub opener: &'a dyn Fn(&BrowserEntry, &str) -> Result<()>,
    /// 等待窗口的实现（测试中可替换）
    pub wait: &'a dyn Fn(Duration),
}

/// 会话结果
#[derive(Debug, Clone, PartialEq)]
pub enum Outcome {
    /// 仅打印了列表
    Listed,
    /// 转换结果写到了标准输出
    WrittenOut,
    Served { url: String, port: u16 },
}

/// 运行一次完整会话；无论成败最后都进入 CleanedUp
pub fn run_session(session: &Session, deps: &Deps<'_>, log: &mut PhaseLog) -> Result<Outcome> {
    let mut staged: Option<StagedArtifact> = None;
    let mut server: Option<ServerHandle> = None;
    let result = drive(session, deps, log, &mut staged, &mut server);
    let started = log.current().is_some();
    if let Err(e) = &result {
        debug!(error = %e, "session failed");
        if started {
            log.enter(Phase::Error);
        }
    }
    let mut cleanup = Ok(());
    if let Some(handle) = server.take() {
        cleanup = cleanup.and(handle.terminate());
    }
    if let Some(artifact) = staged.take() {
        cleanup = cleanup.and(artifact.cleanup());
    }
    if started {
        log.enter(Phase::CleanedUp);
    }
    // 会话本身的错误优先于清理错误
    let outcome = result?;
    cleanup?;
    Ok(outcome)
}

fn drive(
    session: &Session,
    deps: &Deps<'_>,
    log: &mut PhaseLog,
    staged: &mut Option<StagedArtifact>,
    server: &mut Option<ServerHandle>,
) -> Result<Outcome> {
    let settings = &session.settings;

    // 列表与浏览器检查都在申请任何资源之前完成
    if settings.url == 0 {
        print_listing(&variant_listing(session.kind));
        return Ok(Outcome::Listed);
    }
    let variants = session.kind.variants();
    let Some(variant) = session.kind.variant(settings.url) else {
        bail!("url must be a number from 0 to {}", variants.len());
    };
    if settings.browser == 0 {
        print_listing(&browser_listing(deps.catalog));
        return Ok(Outcome::Listed);
    }
    let Some(browser) = deps.catalog.select(settings.browser) else {
        bail!("browser must be a number from 0 to {}", deps.catalog.entries().len());
    };
    verify(&browser)?;

    log.enter(Phase::Staging);
    let artifact = staged.insert(stage_input(&session.input, session.kind.artifact_name())?);
    if let Some(convert) = &session.convert {
        run_pipeline(artifact.path(), convert, deps.prober)?;
        if convert.writeout {
            let bytes = std::fs::read(artifact.path()).context("读取转换结果失败")?;
            let mut out = std::io::stdout().lock();
            out.write_all(&bytes)?;
            out.flush()?;
            return Ok(Outcome::WrittenOut);
        }
    }

    log.enter(Phase::Probing);
    let probe = locate_server(deps.prober, &settings.server_command);
    let Some(resolution) = probe.resolution.filter(|_| probe.found) else {
        return Err(WebviewError::MissingCommand(settings.server_command.clone()).into());
    };

    log.enter(Phase::Serving);
    let handle = server.insert(spawn_server(&SpawnRequest {
        resolution: &resolution,
        root: artifact.dir(),
        port: settings.port,
        sleep: settings.sleep,
        verbose: session.verbose,
    })?);
    let port = handle.port();

    log.enter(Phase::HandedOff);
    let url = build_handoff_url(variant, port, &session.display);
    url::Url::parse(&url).with_context(|| format!("生成的 URL 无效: {}", url))?;
    info!(%url, browser = %browser.label, "handing off");
    if let Err(e) = (deps.opener)(&browser, &url) {
        eprintln!("⚠️ warning: {:#}", e);
        eprintln!("🔗 open manually: {}", url);
    }

    log.enter(Phase::Waiting);
    (deps.wait)(Duration::from_secs_f64(settings.sleep));
    Ok(Outcome::Served { url, port })
}

fn print_listing(lines: &[String]) {
    eprintln!("{}", lines.join("\n"));
}

/// 默认等待实现
pub fn sleep_window(d: Duration) {
    thread::sleep(d);
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        browser::{BrowserTarget, LinuxCatalog},
        config::ConfigSource,
        probe::PathProber,
    };
    use std::cell::RefCell;

    fn settings(url: usize, browser: usize) -> Settings {
        Settings {
            port: 0,
            sleep: 1.0,
            url,
            browser,
            server_command: "webview-server-missing-for-tests".into(),
            source: ConfigSource::Builtin,
        }
    }

    fn session(input: Input, url: usize, browser: usize) -> Session {
        Session {
            kind: ModelKind::Off,
            input,
            settings: settings(url, browser),
            display: DisplayConfig::default(),
            convert: None,
            verbose: false,
        }
    }

    fn run(s: &Session) -> (Result<Outcome>, PhaseLog, usize) {
        let dir = tempfile::tempdir().unwrap();
        let prober = PathProber::new(Some(dir.path().as_os_str().to_owned()), ".exe");
        let opened = RefCell::new(0usize);
        let opener = |_: &BrowserEntry, _: &str| -> Result<()> {
            *opened.borrow_mut() += 1;
            Ok(())
        };
        let deps = Deps { prober: &prober, catalog: &LinuxCatalog, opener: &opener, wait: &|_: Duration| {} };
        let mut log = PhaseLog::default();
        let r = run_session(s, &deps, &mut log);
        let n = *opened.borrow();
        (r, log, n)
    }

    fn model_file(body: &[u8]) -> tempfile::NamedTempFile {
        let f = tempfile::NamedTempFile::new().unwrap();
        std::fs::write(f.path(), body).unwrap();
        f
    }

    #[test]
    fn listing_acquires_nothing() {
        let (r, log, opened) = run(&session(Input::Stdin, 0, 4));
        assert_eq!(r.unwrap(), Outcome::Listed);
        assert!(log.history.is_empty());
        assert_eq!(opened, 0);

        let (r, _, _) = run(&session(Input::Stdin, 1, 0));
        assert_eq!(r.unwrap(), Outcome::Listed);
    }

    #[test]
    fn unknown_variant_is_rejected() {
        let (r, log, _) = run(&session(Input::Stdin, 9, 4));
        assert!(r.is_err());
        assert!(log.history.is_empty());
    }

    #[test]
    fn unresolved_browser_fails_before_staging() {
        let catalog = LinuxCatalog;
        let entry = catalog.select(1).unwrap();
        if let BrowserTarget::Path(p) = &entry.target {
            if p.exists() {
                return;
            }
        }
        let (r, log, _) = run(&session(Input::Stdin, 1, 1));
        let err = r.unwrap_err();
        assert!(matches!(err.downcast_ref::<WebviewError>(), Some(WebviewError::BrowserNotFound(_))));
        assert!(log.history.is_empty());
    }

    #[test]
    fn empty_input_goes_to_error_then_cleanup() {
        let f = model_file(b"");
        let (r, log, opened) = run(&session(Input::File(f.path().to_path_buf()), 1, 4));
        let err = r.unwrap_err();
        assert!(matches!(err.downcast_ref::<WebviewError>(), Some(WebviewError::EmptyInput)));
        assert_eq!(log.history, vec![Phase::Staging, Phase::Error, Phase::CleanedUp]);
        assert_eq!(opened, 0);
    }

    #[test]
    fn missing_server_is_fatal() {
        let f = model_file(b"OFF\n4 4 6\n");
        let (r, log, opened) = run(&session(Input::File(f.path().to_path_buf()), 1, 4));
        let err = r.unwrap_err();
        assert!(matches!(err.downcast_ref::<WebviewError>(), Some(WebviewError::MissingCommand(_))));
        assert_eq!(log.history, vec![Phase::Staging, Phase::Probing, Phase::Error, Phase::CleanedUp]);
        assert_eq!(opened, 0);
    }
}
