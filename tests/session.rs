use std::{
    cell::RefCell,
    fs,
    io::Read,
    net::TcpStream,
    path::Path,
    process::{Command, Stdio},
    time::Duration,
};

use webview::{
    browser::{BrowserEntry, DefaultOnlyCatalog},
    config::{ConfigSource, Settings},
    handoff::{DisplayConfig, ModelKind},
    launcher::{run_session, Deps, Outcome, Phase, PhaseLog, Session},
    probe::PathProber,
    stage::Input,
};

fn bin_dir_prober() -> PathProber {
    let dir = Path::new(env!("CARGO_BIN_EXE_webview-server")).parent().unwrap();
    PathProber::new(Some(dir.as_os_str().to_owned()), std::env::consts::EXE_SUFFIX)
}

#[test]
fn full_session_serves_artifact_then_cleans_up() {
    let model = tempfile::NamedTempFile::new().unwrap();
    fs::write(model.path(), b"OFF\n4 4 6\n").unwrap();

    let session = Session {
        kind: ModelKind::Off,
        input: Input::File(model.path().to_path_buf()),
        settings: Settings {
            port: 0,
            sleep: 1.0,
            url: 1,
            browser: 1,
            server_command: "webview-server".into(),
            source: ConfigSource::Builtin,
        },
        display: DisplayConfig::default(),
        convert: None,
        verbose: false,
    };

    let fetched = RefCell::new(None::<(String, Vec<u8>)>);
    let opener = |_: &BrowserEntry, handoff: &str| -> anyhow::Result<()> {
        let parsed = url::Url::parse(handoff)?;
        let model_url = parsed
            .query_pairs()
            .find(|(k, _)| k == "url")
            .map(|(_, v)| v.into_owned())
            .expect("hand-off url carries the model url");
        let mut bytes = Vec::new();
        ureq::get(&model_url).call()?.into_reader().read_to_end(&mut bytes)?;
        *fetched.borrow_mut() = Some((model_url, bytes));
        Ok(())
    };
    let prober = bin_dir_prober();
    let deps = Deps {
        prober: &prober,
        catalog: &DefaultOnlyCatalog,
        opener: &opener,
        wait: &|_: Duration| {},
    };
    let mut log = PhaseLog::default();
    let outcome = run_session(&session, &deps, &mut log).unwrap();

    let Outcome::Served { url, port } = outcome else { panic!("expected a served session") };
    assert!(url.contains(&format!("http://127.0.0.1:{port}/offview.off&vertexRadius=0.03")));
    let (model_url, bytes) = fetched.into_inner().expect("opener was called");
    assert_eq!(model_url, format!("http://127.0.0.1:{port}/offview.off"));
    assert_eq!(bytes, b"OFF\n4 4 6\n");
    assert_eq!(
        log.history,
        vec![Phase::Staging, Phase::Probing, Phase::Serving, Phase::HandedOff, Phase::Waiting, Phase::CleanedUp]
    );
    assert!(TcpStream::connect(("127.0.0.1", port)).is_err());
}

#[test]
fn opener_failure_is_not_fatal() {
    let model = tempfile::NamedTempFile::new().unwrap();
    fs::write(model.path(), b"#VRML V2.0 utf8\n").unwrap();
    let session = Session {
        kind: ModelKind::X3d,
        input: Input::File(model.path().to_path_buf()),
        settings: Settings {
            port: 0,
            sleep: 1.0,
            url: 2,
            browser: 1,
            server_command: "webview-server".into(),
            source: ConfigSource::Builtin,
        },
        display: DisplayConfig::default(),
        convert: None,
        verbose: false,
    };
    let opener = |_: &BrowserEntry, _: &str| -> anyhow::Result<()> { anyhow::bail!("no display") };
    let prober = bin_dir_prober();
    let deps = Deps { prober: &prober, catalog: &DefaultOnlyCatalog, opener: &opener, wait: &|_: Duration| {} };
    let mut log = PhaseLog::default();
    let outcome = run_session(&session, &deps, &mut log).unwrap();
    assert!(matches!(outcome, Outcome::Served { .. }));
    assert_eq!(log.current(), Some(Phase::CleanedUp));
}

#[test]
fn launcher_lists_variants_and_exits_zero() {
    let out = Command::new(env!("CARGO_BIN_EXE_webview")).args(["off", "--url", "0"]).output().unwrap();
    assert!(out.status.success());
    let stderr = String::from_utf8_lossy(&out.stderr);
    assert!(stderr.contains("0 - listing"));
    assert!(stderr.contains("4 - "));
}

#[test]
fn launcher_rejects_bad_ranges_before_side_effects() {
    for args in [["off", "--port", "70000"], ["off", "--sleep", "0.5"], ["x3d", "--sleep", "4000"]] {
        let out = Command::new(env!("CARGO_BIN_EXE_webview")).args(args).output().unwrap();
        assert!(!out.status.success(), "{args:?} should fail");
        assert!(out.stdout.is_empty());
    }
}

const ENV_KEYS: [&str; 7] =
    ["WEBVIEW_PORT", "WEBVIEW_SLEEP", "WEBVIEW_URL", "WEBVIEW_BROWSER", "WEBVIEW_CONFIG", "WEBVIEW_SERVER", "WEBVIEW_VERBOSE"];

/// 在干净的工作目录和环境里运行启动器
fn launcher(cwd: &Path, env: &[(&str, &str)]) -> Command {
    let mut cmd = Command::new(env!("CARGO_BIN_EXE_webview"));
    cmd.current_dir(cwd).stdin(Stdio::null());
    for key in ENV_KEYS {
        cmd.env_remove(key);
    }
    cmd.envs(env.iter().copied());
    cmd
}

#[test]
fn environment_sits_between_cli_and_config_file() {
    let cwd = tempfile::tempdir().unwrap();

    // 环境变量单独生效
    let out = launcher(cwd.path(), &[("WEBVIEW_URL", "0")]).arg("off").output().unwrap();
    assert!(out.status.success());
    assert!(String::from_utf8_lossy(&out.stderr).contains("--url, WEBVIEW_URL"));

    // 命令行覆盖环境变量
    let out = launcher(cwd.path(), &[("WEBVIEW_URL", "9")]).args(["off", "--url", "0"]).output().unwrap();
    assert!(out.status.success());

    // 环境变量覆盖配置文件
    fs::write(cwd.path().join("webview.yaml"), "url: 9\nbrowser: 9\n").unwrap();
    let out = launcher(cwd.path(), &[("WEBVIEW_URL", "1"), ("WEBVIEW_BROWSER", "0")]).arg("off").output().unwrap();
    assert!(out.status.success());
    assert!(String::from_utf8_lossy(&out.stderr).contains("--browser, WEBVIEW_BROWSER"));

    // 只有配置文件时，配置文件生效
    let out = launcher(cwd.path(), &[]).arg("off").output().unwrap();
    assert!(!out.status.success());
    assert!(String::from_utf8_lossy(&out.stderr).contains("url must be a number from 0 to 4"));
}

#[test]
fn bad_environment_values_are_rejected() {
    let cwd = tempfile::tempdir().unwrap();
    for (key, value) in [("WEBVIEW_PORT", "70000"), ("WEBVIEW_PORT", "http"), ("WEBVIEW_SLEEP", "0.5"), ("WEBVIEW_URL", "-1")] {
        let out = launcher(cwd.path(), &[(key, value)]).args(["off", "--url", "0"]).output().unwrap();
        assert!(!out.status.success(), "{key}={value} should fail");
        assert!(out.stdout.is_empty());
        let stderr = String::from_utf8_lossy(&out.stderr);
        assert!(!stderr.contains("0 - listing"), "{key}={value} listed before failing");
    }
}

#[cfg(target_os = "linux")]
#[test]
fn writeout_prints_converted_model_without_serving() {
    let cwd = tempfile::tempdir().unwrap();
    let model = cwd.path().join("model.wrl");
    fs::write(&model, b"#VRML V2.0 utf8\n\xffShape {}\n").unwrap();

    // 4 号是系统默认浏览器（Linux 与 WSL 目录相同）；服务端命令指向不存在的名字
    let out = launcher(cwd.path(), &[("WEBVIEW_SERVER", "webview-server-not-installed")])
        .args(["x3d", "--writeout", "--browser", "4"])
        .arg(&model)
        .output()
        .unwrap();
    assert!(out.status.success(), "{}", String::from_utf8_lossy(&out.stderr));
    assert_eq!(out.stdout, b"#VRML V2.0 utf8\nShape {}\n");
}
