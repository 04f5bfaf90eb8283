//! 错误类型模块：
//! - 启动器各阶段可匹配的错误（空输入、缺少命令、浏览器未找到等）
//! - 业务流程中统一用 anyhow 包装，测试中可 downcast 回具体变体

use std::path::PathBuf;

use thiserror::Error;

#[derive(Debug, Error)]
pub enum WebviewError {
    /// 暂存后的模型文件长度为 0
    #[error("empty input")]
    EmptyInput,
    /// 必需的可执行文件（如 webview-server）不可用
    #[error("{0} not found")]
    MissingCommand(String),
    #[error("browser {} not found", .0.display())]
    BrowserNotFound(PathBuf),
    /// 服务进程在就绪握手之前退出（多半是端口已被占用）
    #[error("server on port {port} failed to start: {reason}")]
    ServerStart { port: u16, reason: String },
    #[error("{0} conversion did not produce x3d")]
    ConversionFailed(String),
    #[error("invalid color `{0}`: expected `invisible` or 6/8 hex digits")]
    InvalidColor(String),
    #[error("coordinates must be x,y,z (got `{0}`)")]
    InvalidAxis(String),
}
