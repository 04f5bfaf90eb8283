//! 临时 CORS 静态文件服务模块：
//! - 仅监听 127.0.0.1，单次绑定，不重试
//! - 所有响应（含 404/405）都带固定的跨域与禁缓存头
//! - 自身没有空闲超时，生命周期由外部或看门狗控制

use std::{
    fs,
    io::Write,
    net::SocketAddr,
    path::{Path, PathBuf},
};

use anyhow::{anyhow, Result};
use tiny_http::{Header, Method, Request, Response, Server};
use tracing::{debug, info};

use crate::utils::safe_subpath;

/// 每个响应都附带的固定头。
/// 例外：请求行无法解析时 tiny_http 自行回复 400，不经过 `handle`，因此不带这些头。
pub const CORS_HEADERS: [(&str, &str); 3] = [
    ("Access-Control-Allow-Origin", "*"),
    ("Access-Control-Allow-Methods", "GET"),
    ("Cache-Control", "no-store, no-cache, must-revalidate"),
];

/// 就绪握手行前缀：`LISTENING <port>`
pub const READY_PREFIX: &str = "LISTENING";

/// 已绑定端口、尚未开始服务的文件服务器
pub struct FileServer {
    server: Server,
    root: PathBuf,
    addr: SocketAddr,
}

impl FileServer {
    /// 绑定 127.0.0.1:port；端口被占用时直接返回错误
    pub fn bind(root: &Path, port: u16) -> Result<Self> {
        let server = Server::http(("127.0.0.1", port))
            .map_err(|e| anyhow!("绑定地址失败: 127.0.0.1:{}: {}", port, e))?;
        let addr = server
            .server_addr()
            .to_ip()
            .ok_or_else(|| anyhow!("监听地址不是 IP 地址"))?;
        Ok(Self { server, root: root.to_path_buf(), addr })
    }

    pub fn port(&self) -> u16 { self.addr.port() }

    /// 向 `out` 写出就绪行并 flush
    pub fn announce(&self, mut out: impl Write) -> Result<()> {
        writeln!(out, "{} {}", READY_PREFIX, self.port())?;
        out.flush()?;
        Ok(())
    }

    /// 持续服务，直到进程被终止
    pub fn serve_forever(self) -> Result<()> {
        info!(addr = %self.addr, root = %self.root.display(), "serving");
        for rq in self.server.incoming_requests() {
            handle(&self.root, rq);
        }
        Ok(())
    }
}

fn handle(root: &Path, rq: Request) {
    let method = rq.method().clone();
    let url = rq.url().to_string();
    let (status, resp) = if method != Method::Get {
        (405, Response::from_string("Method Not Allowed").with_header(text_plain()))
    } else {
        match resolve(root, &url) {
            Some(fpath) => match fs::read(&fpath) {
                Ok(bytes) => (200, Response::from_data(bytes).with_header(content_type_header(&fpath))),
                Err(_) => (404, Response::from_string("Not Found").with_header(text_plain())),
            },
            None => (404, Response::from_string("Not Found").with_header(text_plain())),
        }
    };
    debug!(%method, %url, status, "request");
    let mut resp = resp.with_status_code(status);
    for (k, v) in CORS_HEADERS {
        resp.add_header(header(k, v));
    }
    let _ = rq.respond(resp);
}

/// 把请求路径解析为根目录下的已存在文件；`.`/`..`/空段被丢弃
fn resolve(root: &Path, url: &str) -> Option<PathBuf> {
    let path_only = url.split(['?', '#']).next().unwrap_or("/");
    let sub = safe_subpath(&percent_decode(path_only))?;
    let fpath = root.join(sub);
    if fpath.is_file() { Some(fpath) } else { None }
}

fn percent_decode(s: &str) -> String {
    let bytes = s.as_bytes();
    let mut out = Vec::with_capacity(bytes.len());
    let mut i = 0;
    while i < bytes.len() {
        if bytes[i] == b'%' && i + 2 < bytes.len() {
            let hex = std::str::from_utf8(&bytes[i + 1..i + 3]).ok();
            if let Some(b) = hex.and_then(|h| u8::from_str_radix(h, 16).ok()) {
                out.push(b);
                i += 3;
                continue;
            }
        }
        out.push(bytes[i]);
        i += 1;
    }
    String::from_utf8_lossy(&out).into_owned()
}

fn header(k: &'static str, v: &'static str) -> Header {
    Header::from_bytes(k.as_bytes(), v.as_bytes()).expect("static ASCII header")
}

fn text_plain() -> Header {
    header("Content-Type", "text/plain; charset=utf-8")
}

fn content_type_header(p: &Path) -> Header {
    header("Content-Type", content_type_for_path(p))
}

fn content_type_for_path(p: &Path) -> &'static str {
    match p.extension().and_then(|e| e.to_str()).unwrap_or("").to_ascii_lowercase().as_str() {
        "off" => "text/plain; charset=utf-8",
        "wrl" | "vrml" => "model/vrml",
        "x3d" => "model/x3d+xml",
        "x3dv" => "model/x3d-vrml",
        "gz" => "application/gzip",
        "html" => "text/html; charset=utf-8",
        "txt" => "text/plain; charset=utf-8",
        "json" => "application/json; charset=utf-8",
        "png" => "image/png",
        "jpg" | "jpeg" => "image/jpeg",
        _ => "application/octet-stream",
    }
}
