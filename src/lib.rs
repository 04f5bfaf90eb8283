//! webview：把本地生成的 3D 模型交给在线查看器
//! - `webview` 启动器：暂存模型、启动临时服务、拼接交接 URL、打开浏览器
//! - `webview-server`：只服务暂存目录的临时 CORS 文件服务，限时自动退出

pub mod browser;
pub mod cli;
pub mod commands;
pub mod config;
pub mod convert;
pub mod error;
pub mod handoff;
pub mod launcher;
pub mod lifecycle;
pub mod logging;
pub mod probe;
pub mod server;
pub mod stage;
pub mod utils;
