//! VRML/X3D 转换流水线：
//! - 对暂存副本依次执行解压、UTF-8 清理、可选的外部转换器与压缩
//! - 可选转换器缺失时给出警告并跳过；转换结果为空时报错

use std::{
    fs,
    path::Path,
    process::Stdio,
};

use anyhow::{bail, Context, Result};
use tracing::debug;

use crate::{
    cli::{X3dArgs, X3dEncoding},
    error::WebviewError,
    probe::CapabilityProber,
};

const GZIP_MAGIC: [u8; 2] = [0x1f, 0x8b];
const TEMP_NAME: &str = "x3dtemp.wrl";

/// 文件是否以 gzip 魔数开头
pub fn is_gzip(bytes: &[u8]) -> bool {
    bytes.starts_with(&GZIP_MAGIC)
}

/// 丢弃无效的 UTF-8 字节序列（等同于 `iconv -c -t UTF-8`）
pub fn strip_invalid_utf8(bytes: &[u8]) -> Vec<u8> {
    let mut out = Vec::with_capacity(bytes.len());
    for chunk in bytes.utf8_chunks() {
        out.extend_from_slice(chunk.valid().as_bytes());
    }
    out
}

/// 对暂存文件执行转换流水线
pub fn run_pipeline(artifact: &Path, args: &X3dArgs, prober: &dyn CapabilityProber) -> Result<()> {
    let raw = fs::read(artifact).with_context(|| format!("读取暂存文件失败: {}", artifact.display()))?;
    let text = if is_gzip(&raw) {
        filter(prober, "gzip", &["-dc"], artifact, Input::Stdin)?
    } else {
        Some(raw)
    };
    // 未能解压时保留原始压缩字节，不做 UTF-8 清理
    if let Some(text) = text {
        write_via_temp(artifact, &strip_invalid_utf8(&text))?;
    }

    if args.vrml2 {
        if let Some(out) = filter(prober, "vr1tovr2", &["-p"], artifact, Input::FileArg)? {
            write_via_temp(artifact, &out)?;
        }
    }

    if let Some(enc) = args.x3d {
        let encoding = match enc {
            X3dEncoding::X => "xml",
            X3dEncoding::C => "classic",
        };
        let probe_name = "tovrmlx3d";
        if let Some(out) = filter(prober, probe_name, &["--force-x3d", "--encoding", encoding], artifact, Input::FileArg)? {
            if out.is_empty() {
                return Err(WebviewError::ConversionFailed(probe_name.to_string()).into());
            }
            write_via_temp(artifact, &out)?;
        }
    }

    if args.gzip {
        if let Some(out) = filter(prober, "gzip", &["-f"], artifact, Input::Stdin)? {
            write_via_temp(artifact, &out)?;
        }
    }
    Ok(())
}

/// 外部命令读取输入的方式
#[derive(Debug, Clone, Copy)]
enum Input {
    Stdin,
    FileArg,
}

/// 运行可选外部过滤器并返回其标准输出；命令不存在时警告并返回 None
fn filter(
    prober: &dyn CapabilityProber,
    name: &str,
    args: &[&str],
    artifact: &Path,
    input: Input,
) -> Result<Option<Vec<u8>>> {
    let probe = prober.probe(name);
    let Some(resolution) = probe.resolution.filter(|_| probe.found) else {
        debug!(command = name, "optional converter unavailable");
        eprintln!("⚠️ warning: {} not found, skipping", name);
        return Ok(None);
    };
    let file_arg = artifact.display().to_string();
    let mut all_args: Vec<&str> = args.to_vec();
    let mut cmd = match input {
        Input::FileArg => {
            all_args.push(&file_arg);
            resolution.command(&all_args)
        }
        Input::Stdin => resolution.command(&all_args),
    };
    cmd.stderr(Stdio::null());
    match input {
        Input::Stdin => {
            let file = fs::File::open(artifact).with_context(|| format!("打开暂存文件失败: {}", artifact.display()))?;
            cmd.stdin(file);
        }
        Input::FileArg => {
            cmd.stdin(Stdio::null());
        }
    }
    debug!(command = %probe.name, ?args, "running converter");
    let output = cmd.output().with_context(|| format!("运行 {} 失败", probe.name))?;
    if !output.status.success() && output.stdout.is_empty() {
        bail!("{} 执行失败: {}", probe.name, output.status);
    }
    Ok(Some(output.stdout))
}

/// 先写临时文件再改名覆盖，保证暂存文件不会处于半写状态
fn write_via_temp(artifact: &Path, bytes: &[u8]) -> Result<()> {
    let tmp = artifact.with_file_name(TEMP_NAME);
    fs::write(&tmp, bytes).with_context(|| format!("写入临时文件失败: {}", tmp.display()))?;
    fs::rename(&tmp, artifact).with_context(|| format!("替换暂存文件失败: {}", artifact.display()))?;
    Ok(())
}
