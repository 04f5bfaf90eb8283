//! CLI 定义模块：仅负责命令行参数结构体与解析
//! 将 clap 的声明与业务逻辑解耦；范围检查在解析阶段完成，不产生任何副作用。

use clap::{Args, Parser, Subcommand, ValueEnum};
use std::path::PathBuf;

use crate::{
    config::{check_range, Overrides, SERVER_SLEEP_RANGE, SLEEP_RANGE},
    handoff::{Color, DisplayConfig, RotationAxis},
};

/// 启动器入口
#[derive(Parser, Debug)]
#[command(name = "webview", about = "用在线查看器浏览本地 3D 模型（OFF / VRML / X3D）", version)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,
}

/// 子命令定义
#[derive(Subcommand, Debug)]
pub enum Command {
    /// 在在线 OFF 查看器中显示 OFF 文件
    Off {
        #[command(flatten)]
        common: CommonArgs,
        #[command(flatten)]
        display: OffArgs,
    },
    /// 在在线 VRML/X3D 查看器中显示模型（可压缩，可转换）
    X3d {
        #[command(flatten)]
        common: CommonArgs,
        #[command(flatten)]
        convert: X3dArgs,
    },
}

/// 两个子命令共用的参数
#[derive(Args, Debug, Clone)]
pub struct CommonArgs {
    /// 模型文件；缺省或 `-` 时读取标准输入
    #[arg(value_name = "FILE")]
    pub input: Option<String>,
    /// 在线查看器编号，0 列出全部
    #[arg(short = 'u', long, value_name = "N")]
    pub url: Option<usize>,
    /// 浏览器编号，0 列出全部
    #[arg(short = 'b', long, value_name = "N")]
    pub browser: Option<usize>,
    /// 服务端口（0-65535），默认 8080
    #[arg(short = 'p', long, value_name = "PORT")]
    pub port: Option<u16>,
    /// 服务关闭前的秒数（1-3600），默认 4
    #[arg(short = 's', long, value_name = "SECONDS", value_parser = parse_sleep)]
    pub sleep: Option<f64>,
    /// YAML 配置文件（默认自动发现 webview.yaml）
    #[arg(long, value_name = "FILE")]
    pub config: Option<PathBuf>,
    /// 输出调试日志并保留服务端 stderr
    #[arg(long)]
    pub verbose: bool,
}

impl CommonArgs {
    pub fn overrides(&self) -> Overrides {
        Overrides {
            config: self.config.clone(),
            port: self.port,
            sleep: self.sleep,
            url: self.url,
            browser: self.browser,
        }
    }
}

/// 可隐藏的元素
#[derive(ValueEnum, Debug, Clone, Copy, PartialEq, Eq)]
pub enum Element {
    V,
    E,
    F,
}

/// OFF 查看器显示参数
#[derive(Args, Debug, Clone)]
pub struct OffArgs {
    /// 顶点球半径（0.0-1.0）
    #[arg(short = 'v', long, default_value_t = 0.03, value_parser = parse_unit)]
    pub vertex_radius: f64,
    /// 边圆柱半径（0.0-1.0）
    #[arg(short = 'e', long, default_value_t = 0.02, value_parser = parse_unit)]
    pub edge_radius: f64,
    /// 隐藏元素：v 顶点，e 边，f 面
    #[arg(short = 'x', long = "hide", value_enum, num_args = 1.., value_delimiter = ',')]
    pub hide: Vec<Element>,
    /// 边线画成黑色（默认使用模型定义的颜色）
    #[arg(short = 'l', long)]
    pub black_edges: bool,
    /// 面的不透明度：0 不可见，1.0 不透明
    #[arg(short = 't', long, default_value_t = 1.0, value_parser = parse_unit)]
    pub transparency: f64,
    /// 背景色（十六进制或 invisible）
    #[arg(short = 'B', long, default_value = "cccccc", value_parser = parse_color)]
    pub background_color: Color,
    /// 顶点颜色覆盖（十六进制或 invisible）
    #[arg(long, value_parser = parse_color)]
    pub vertex_color: Option<Color>,
    /// 边颜色覆盖（十六进制或 invisible）
    #[arg(long, value_parser = parse_color)]
    pub edge_color: Option<Color>,
    /// 面颜色覆盖（十六进制或 invisible）
    #[arg(long, value_parser = parse_color)]
    pub face_color: Option<Color>,
    /// 旋转速度
    #[arg(short = 'r', long, default_value_t = 0.0, allow_hyphen_values = true)]
    pub rotation_speed: f64,
    /// 旋转轴 x,y,z（负数写作 -a=-1,0,0）
    #[arg(short = 'a', long, default_value = "0,1,0", allow_hyphen_values = true, value_parser = parse_axis)]
    pub rotation_axis: RotationAxis,
}

impl OffArgs {
    pub fn to_display(&self) -> DisplayConfig {
        DisplayConfig {
            vertex_radius: self.vertex_radius,
            edge_radius: self.edge_radius,
            vertices_active: !self.hide.contains(&Element::V),
            edges_active: !self.hide.contains(&Element::E),
            faces_active: !self.hide.contains(&Element::F),
            use_base_color: !self.black_edges,
            opacity: self.transparency,
            background_color: self.background_color.clone(),
            rotation_speed: self.rotation_speed,
            rotation_axis: self.rotation_axis,
            vertex_color: self.vertex_color.clone(),
            edge_color: self.edge_color.clone(),
            face_color: self.face_color.clone(),
        }
        .normalized()
    }
}

/// VRML 转 X3D 的编码
#[derive(ValueEnum, Debug, Clone, Copy, PartialEq, Eq)]
pub enum X3dEncoding {
    /// XML（.x3d）
    X,
    /// classic（.x3dv）
    C,
}

/// X3D 子命令的转换参数
#[derive(Args, Debug, Clone, Default)]
pub struct X3dArgs {
    /// 将 VRML 1.0 转为 VRML 2.0（在 --x3d 之前执行）
    #[arg(long)]
    pub vrml2: bool,
    /// 将 VRML 2.0 转为 xml (x) 或 classic (c) 编码的 X3D
    #[arg(short = 'x', long, value_enum)]
    pub x3d: Option<X3dEncoding>,
    /// 用 gzip 压缩输出
    #[arg(short = 'g', long)]
    pub gzip: bool,
    /// 输出到标准输出而不是发送到浏览器
    #[arg(short = 'w', long)]
    pub writeout: bool,
}

/// 服务端入口
#[derive(Parser, Debug)]
#[command(name = "webview-server", about = "为 webview 提供的临时 CORS 文件服务", version)]
pub struct ServerCli {
    /// 监听端口（0-65535）
    #[arg(short = 'p', long, default_value_t = crate::config::DEFAULT_PORT)]
    pub port: u16,
    /// 自动退出前的秒数（0 表示一直运行）
    #[arg(short = 's', long, default_value_t = 0.0, value_parser = parse_server_sleep)]
    pub sleep: f64,
    /// 服务根目录
    #[arg(long, value_name = "DIR", default_value = ".")]
    pub root: PathBuf,
    /// 输出调试日志
    #[arg(long)]
    pub verbose: bool,
}

fn parse_float(s: &str) -> Result<f64, String> {
    s.trim().parse::<f64>().map_err(|_| "must be a floating point number".to_string())
}

fn parse_unit(s: &str) -> Result<f64, String> {
    check_range(parse_float(s)?, (0.0, 1.0)).map_err(|e| e.to_string())
}

fn parse_sleep(s: &str) -> Result<f64, String> {
    check_range(parse_float(s)?, SLEEP_RANGE).map_err(|e| e.to_string())
}

fn parse_server_sleep(s: &str) -> Result<f64, String> {
    check_range(parse_float(s)?, SERVER_SLEEP_RANGE).map_err(|e| e.to_string())
}

fn parse_color(s: &str) -> Result<Color, String> {
    s.parse::<Color>().map_err(|e| e.to_string())
}

fn parse_axis(s: &str) -> Result<RotationAxis, String> {
    s.parse::<RotationAxis>().map_err(|e| e.to_string())
}
