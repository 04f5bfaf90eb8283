//! 命令调度模块：
//! - 接收解析好的 CLI 参数，计算“有效参数”（命令行 > 环境变量 > 配置文件）
//! - 组装会话与平台协作者，调用启动器或服务端

use std::io;

use anyhow::Result;
use tracing::{debug, info};

use crate::{
    browser::{self, platform_catalog},
    cli::{Cli, Command, CommonArgs, ServerCli},
    config::{describe_source, resolve_settings},
    handoff::{DisplayConfig, ModelKind},
    launcher::{run_session, sleep_window, Deps, Outcome, PhaseLog, Session},
    lifecycle::arm_watchdog,
    logging::init_logging,
    probe::platform_prober,
    server::FileServer,
    stage::Input,
    utils::env_bool_truthy,
};

/// 运行启动器子命令
pub fn run(cli: Cli) -> Result<()> {
    let (kind, common, display, convert) = match cli.command {
        Command::Off { common, display } => (ModelKind::Off, common, display.to_display(), None),
        Command::X3d { common, convert } => (ModelKind::X3d, common, DisplayConfig::default(), Some(convert)),
    };
    let verbose = effective_verbose(&common);
    init_logging(verbose);

    let catalog = platform_catalog();
    let prober = platform_prober();
    let settings = resolve_settings(&common.overrides(), catalog.default_index())?;
    debug!(catalog = catalog.name(), source = %describe_source(&settings.source), ?settings, "effective settings");

    let session = Session {
        kind,
        input: Input::from_arg(common.input.as_deref()),
        settings,
        display,
        convert,
        verbose,
    };
    let deps = Deps {
        prober: prober.as_ref(),
        catalog: catalog.as_ref(),
        opener: &browser::open,
        wait: &sleep_window,
    };
    let mut log = PhaseLog::default();
    match run_session(&session, &deps, &mut log)? {
        Outcome::Served { url, port } => info!(%url, port, "session finished"),
        Outcome::Listed | Outcome::WrittenOut => {}
    }
    Ok(())
}

/// 运行临时文件服务：绑定 → 就绪行 → 看门狗 → 服务
pub fn run_server(cli: ServerCli) -> Result<()> {
    init_logging(cli.verbose);
    let server = FileServer::bind(&cli.root, cli.port)?;
    server.announce(io::stdout().lock())?;
    let _watchdog = arm_watchdog(cli.sleep)?;
    server.serve_forever()
}

fn effective_verbose(common: &CommonArgs) -> bool {
    common.verbose || env_bool_truthy("WEBVIEW_VERBOSE").unwrap_or(false)
}
