//! 模型暂存模块：
//! - 把输入（文件或标准输入）原样写入新建的临时目录
//! - 临时目录由 `TempDir` 持有，任何退出路径上 drop 即删除

use std::{
    fs,
    io::{self, Read},
    path::{Path, PathBuf},
};

use anyhow::{Context, Result};
use tempfile::TempDir;
use tracing::debug;

use crate::error::WebviewError;

/// 模型输入来源
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Input {
    Stdin,
    File(PathBuf),
}

impl Input {
    /// 由命令行位置参数构造；缺省或 `-` 表示标准输入。
    /// 去掉 DOS 批处理可能带入的引号。
    pub fn from_arg(arg: Option<&str>) -> Self {
        match arg.map(|s| s.replace(['"', '\''], "")) {
            None => Input::Stdin,
            Some(s) if s.is_empty() || s == "-" => Input::Stdin,
            Some(s) => Input::File(PathBuf::from(s)),
        }
    }

    pub fn read_all(&self) -> Result<Vec<u8>> {
        match self {
            Input::Stdin => {
                let mut buf = Vec::new();
                io::stdin().lock().read_to_end(&mut buf).context("读取标准输入失败")?;
                Ok(buf)
            }
            Input::File(p) => fs::read(p).with_context(|| format!("读取输入文件失败: {}", p.display())),
        }
    }
}

/// 已暂存的模型：持有临时目录，drop 时目录被删除
#[derive(Debug)]
pub struct StagedArtifact {
    dir: TempDir,
    path: PathBuf,
}

impl StagedArtifact {
    pub fn dir(&self) -> &Path { self.dir.path() }

    pub fn path(&self) -> &Path { &self.path }

    pub fn size(&self) -> Result<u64> {
        Ok(fs::metadata(&self.path)
            .with_context(|| format!("读取文件信息失败: {}", self.path.display()))?
            .len())
    }

    /// 显式删除临时目录（drop 也会删除，这里便于记录错误）
    pub fn cleanup(self) -> Result<()> {
        let shown = self.dir.path().display().to_string();
        self.dir.close().with_context(|| format!("删除临时目录失败: {}", shown))?;
        debug!(dir = %shown, "staging directory removed");
        Ok(())
    }
}

/// 在新建临时目录中以 `file_name` 写入 `bytes`，写入后长度为 0 则报 `EmptyInput`
pub fn stage_bytes(bytes: &[u8], file_name: &str) -> Result<StagedArtifact> {
    let dir = tempfile::Builder::new()
        .prefix("webview-")
        .tempdir()
        .context("创建临时目录失败")?;
    let path = dir.path().join(file_name);
    fs::write(&path, bytes).with_context(|| format!("写入暂存文件失败: {}", path.display()))?;
    let staged = StagedArtifact { dir, path };
    if staged.size()? == 0 {
        // staged 在此处 drop，目录随之删除
        return Err(WebviewError::EmptyInput.into());
    }
    debug!(path = %staged.path.display(), bytes = bytes.len(), "artifact staged");
    Ok(staged)
}

/// 读取输入并暂存
pub fn stage_input(input: &Input, file_name: &str) -> Result<StagedArtifact> {
    let bytes = input.read_all()?;
    stage_bytes(&bytes, file_name)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn stages_bytes_verbatim() {
        let data: Vec<u8> = (0..=255u8).cycle().take(3000).collect();
        let staged = stage_bytes(&data, "offview.off").unwrap();
        assert_eq!(staged.path().file_name().unwrap(), "offview.off");
        assert_eq!(fs::read(staged.path()).unwrap(), data);
    }

    #[test]
    fn rejects_empty_input() {
        let err = stage_bytes(b"", "offview.off").unwrap_err();
        assert!(matches!(err.downcast_ref::<WebviewError>(), Some(WebviewError::EmptyInput)));
    }

    #[test]
    fn directory_removed_on_drop_and_cleanup() {
        let staged = stage_bytes(b"OFF\n", "offview.off").unwrap();
        let dir = staged.dir().to_path_buf();
        drop(staged);
        assert!(!dir.exists());

        let staged = stage_bytes(b"OFF\n", "offview.off").unwrap();
        let dir = staged.dir().to_path_buf();
        staged.cleanup().unwrap();
        assert!(!dir.exists());
    }

    #[test]
    fn stages_from_file_input() {
        let src = tempfile::NamedTempFile::new().unwrap();
        fs::write(src.path(), b"#VRML V2.0 utf8\n").unwrap();
        let input = Input::File(src.path().to_path_buf());
        let staged = stage_input(&input, "x3dview.wrl").unwrap();
        assert_eq!(fs::read(staged.path()).unwrap(), b"#VRML V2.0 utf8\n");
    }

    #[test]
    fn input_arg_strips_quotes() {
        assert_eq!(Input::from_arg(None), Input::Stdin);
        assert_eq!(Input::from_arg(Some("-")), Input::Stdin);
        assert_eq!(Input::from_arg(Some("\"C:/a b.off\"")), Input::File(PathBuf::from("C:/a b.off")));
    }
}
