//! 交接 URL 构建模块：
//! - 定义在线查看器（viewer variant）列表与各自的参数命名约定
//! - 将显示配置编码为查询参数，拼接到替换了端口的模板 URL 之后
//! - 纯函数，不访问网络与文件系统

use std::{fmt, str::FromStr};

use crate::error::WebviewError;

/// 模板中的端口占位符
pub const PORT_PLACEHOLDER: &str = "PORT";

/// 模型类型，决定暂存文件名与可选的查看器
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ModelKind {
    Off,
    X3d,
}

impl ModelKind {
    /// 暂存目录中的固定文件名（与查看器模板中的路径一致）
    pub fn artifact_name(self) -> &'static str {
        match self {
            ModelKind::Off => "offview.off",
            ModelKind::X3d => "x3dview.wrl",
        }
    }

    pub fn variants(self) -> &'static [ViewerVariant] {
        match self {
            ModelKind::Off => OFF_VARIANTS,
            ModelKind::X3d => X3D_VARIANTS,
        }
    }

    /// 按 1 起始的编号查找查看器（0 保留给“列出”）
    pub fn variant(self, id: usize) -> Option<&'static ViewerVariant> {
        if id == 0 { return None; }
        self.variants().get(id - 1)
    }
}

/// 查询参数命名约定
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Convention {
    /// `data-vertex-radius` 等带前缀的连字符键
    Hyphenated,
    /// `vertexRadius` 等驼峰键
    CamelCase,
    /// 只带模型地址，不附加显示参数
    Bare,
}

/// 透明度在查询串中的编码方式
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransparencyEncoding {
    /// 输出 `1 - opacity`
    Fade,
    /// 原样输出 opacity
    Raw,
    Omitted,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ViewerVariant {
    pub label: &'static str,
    pub template: &'static str,
    pub convention: Convention,
    pub transparency: TransparencyEncoding,
}

const OFF_VARIANTS: &[ViewerVariant] = &[
    ViewerVariant {
        label: "https://www.interocitors.com (full screen, python author's site)",
        template: "https://www.interocitors.com/polyhedra/offview.html?url=http://127.0.0.1:PORT/offview.off",
        convention: Convention::CamelCase,
        transparency: TransparencyEncoding::Fade,
    },
    ViewerVariant {
        label: "https://asliceofcuriosity.fr (threejs author's site)",
        template: "https://asliceofcuriosity.fr/blog/extra/polyhedra-viewer-antiprism.html?url=http://127.0.0.1:PORT/offview.off",
        convention: Convention::CamelCase,
        transparency: TransparencyEncoding::Raw,
    },
    ViewerVariant {
        label: "Simple-Off-Viewer Live Window at www.interocitors.com",
        template: "https://www.interocitors.com/polyhedra/offwin.html?url=http://127.0.0.1:PORT/offview.off",
        convention: Convention::CamelCase,
        transparency: TransparencyEncoding::Fade,
    },
    ViewerVariant {
        label: "Element view at www.interocitors.com (per-element colors)",
        template: "https://www.interocitors.com/polyhedra/offelem.html?url=http://127.0.0.1:PORT/offview.off",
        convention: Convention::Hyphenated,
        transparency: TransparencyEncoding::Omitted,
    },
];

const X3D_VARIANTS: &[ViewerVariant] = &[
    ViewerVariant {
        label: "Full screen view",
        template: "https://www.interocitors.com/polyhedra/x3dview.html?url=http://127.0.0.1:PORT/x3dview.wrl",
        convention: Convention::Bare,
        transparency: TransparencyEncoding::Omitted,
    },
    ViewerVariant {
        label: "Window view",
        template: "https://www.interocitors.com/polyhedra/x3dwin.html?url=http://127.0.0.1:PORT/x3dview.wrl",
        convention: Convention::Bare,
        transparency: TransparencyEncoding::Omitted,
    },
    ViewerVariant {
        label: "X_ite latest version",
        template: "https://www.interocitors.com/polyhedra/x3dlate.html?url=http://127.0.0.1:PORT/x3dview.wrl",
        convention: Convention::Bare,
        transparency: TransparencyEncoding::Omitted,
    },
];

/// 颜色取值：十六进制（6 或 8 位）或关键字 `invisible`
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Color {
    Hex(String),
    Invisible,
}

impl FromStr for Color {
    type Err = WebviewError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let t = s.trim().trim_start_matches('#');
        if t.eq_ignore_ascii_case("invisible") {
            return Ok(Color::Invisible);
        }
        if (t.len() == 6 || t.len() == 8) && t.chars().all(|c| c.is_ascii_hexdigit()) {
            return Ok(Color::Hex(t.to_string()));
        }
        Err(WebviewError::InvalidColor(s.to_string()))
    }
}

impl fmt::Display for Color {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Color::Hex(h) => f.write_str(h),
            Color::Invisible => f.write_str("invisible"),
        }
    }
}

/// 旋转轴 x,y,z
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RotationAxis(pub [f64; 3]);

impl Default for RotationAxis {
    fn default() -> Self { RotationAxis([0.0, 1.0, 0.0]) }
}

impl FromStr for RotationAxis {
    type Err = WebviewError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let parts: Vec<&str> = s.split(',').map(str::trim).collect();
        if parts.len() != 3 {
            return Err(WebviewError::InvalidAxis(s.to_string()));
        }
        let mut xyz = [0.0; 3];
        for (slot, p) in xyz.iter_mut().zip(&parts) {
            *slot = p.parse::<f64>().map_err(|_| WebviewError::InvalidAxis(s.to_string()))?;
            if !slot.is_finite() {
                return Err(WebviewError::InvalidAxis(s.to_string()));
            }
        }
        Ok(RotationAxis(xyz))
    }
}

impl fmt::Display for RotationAxis {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let [x, y, z] = self.0;
        write!(f, "{},{},{}", x, y, z)
    }
}

/// 查看器的显示配置
#[derive(Debug, Clone, PartialEq)]
pub struct DisplayConfig {
    pub vertex_radius: f64,
    pub edge_radius: f64,
    pub vertices_active: bool,
    pub edges_active: bool,
    pub faces_active: bool,
    /// false 表示边线统一画成黑色
    pub use_base_color: bool,
    /// 面的不透明度：0 不可见，1 完全不透明
    pub opacity: f64,
    pub background_color: Color,
    pub rotation_speed: f64,
    pub rotation_axis: RotationAxis,
    pub vertex_color: Option<Color>,
    pub edge_color: Option<Color>,
    pub face_color: Option<Color>,
}

impl Default for DisplayConfig {
    fn default() -> Self {
        Self {
            vertex_radius: 0.03,
            edge_radius: 0.02,
            vertices_active: true,
            edges_active: true,
            faces_active: true,
            use_base_color: true,
            opacity: 1.0,
            background_color: Color::Hex("cccccc".into()),
            rotation_speed: 0.0,
            rotation_axis: RotationAxis::default(),
            vertex_color: None,
            edge_color: None,
            face_color: None,
        }
    }
}

impl DisplayConfig {
    /// 应用 `invisible` 规则：覆盖色为 invisible 时关闭对应元素并清除覆盖色
    pub fn normalized(mut self) -> Self {
        fold_invisible(&mut self.vertex_color, &mut self.vertices_active);
        fold_invisible(&mut self.edge_color, &mut self.edges_active);
        fold_invisible(&mut self.face_color, &mut self.faces_active);
        self
    }
}

fn fold_invisible(color: &mut Option<Color>, active: &mut bool) {
    if matches!(color, Some(Color::Invisible)) {
        *active = false;
        *color = None;
    }
}

/// 构建交接 URL：替换端口占位符并按查看器约定追加显示参数
pub fn build_handoff_url(variant: &ViewerVariant, port: u16, display: &DisplayConfig) -> String {
    let mut url = variant.template.replace(PORT_PLACEHOLDER, &port.to_string());
    let display = display.clone().normalized();
    for (key, value) in query_params(variant, &display) {
        url.push('&');
        url.push_str(key);
        url.push('=');
        url.push_str(&value);
    }
    url
}

fn query_params(variant: &ViewerVariant, d: &DisplayConfig) -> Vec<(&'static str, String)> {
    match variant.convention {
        Convention::Bare => Vec::new(),
        Convention::CamelCase => {
            let mut out = vec![
                ("vertexRadius", d.vertex_radius.to_string()),
                ("edgeRadius", d.edge_radius.to_string()),
                ("verticesActive", d.vertices_active.to_string()),
                ("edgesActive", d.edges_active.to_string()),
                ("facesActive", d.faces_active.to_string()),
                ("useBaseColor", d.use_base_color.to_string()),
            ];
            match variant.transparency {
                TransparencyEncoding::Fade => out.push(("transparency", (1.0 - d.opacity).to_string())),
                TransparencyEncoding::Raw => out.push(("transparency", d.opacity.to_string())),
                TransparencyEncoding::Omitted => {}
            }
            if let Some(bg) = visible_hex(Some(&d.background_color)) {
                out.push(("backgroundColor", bg));
            }
            out.push(("rotationSpeed", d.rotation_speed.to_string()));
            out.push(("rotationDirection", d.rotation_axis.to_string()));
            out
        }
        Convention::Hyphenated => {
            let mut out = vec![
                ("data-vertex-radius", d.vertex_radius.to_string()),
                ("data-edge-radius", d.edge_radius.to_string()),
                ("data-vertices-active", d.vertices_active.to_string()),
                ("data-edges-active", d.edges_active.to_string()),
                ("data-faces-active", d.faces_active.to_string()),
            ];
            if let Some(c) = visible_hex(d.vertex_color.as_ref()) { out.push(("data-vertex-color", c)); }
            if let Some(c) = visible_hex(d.edge_color.as_ref()) { out.push(("data-edge-color", c)); }
            if let Some(c) = visible_hex(d.face_color.as_ref()) { out.push(("data-face-color", c)); }
            // 缺省背景色即视为 invisible
            if let Some(bg) = visible_hex(Some(&d.background_color)) {
                out.push(("data-background-color", bg));
            }
            out.push(("data-rotation-speed", d.rotation_speed.to_string()));
            out.push(("data-rotation-axis", d.rotation_axis.to_string()));
            out
        }
    }
}

fn visible_hex(c: Option<&Color>) -> Option<String> {
    match c {
        Some(Color::Hex(h)) => Some(h.clone()),
        _ => None,
    }
}

/// 生成查看器列表文本（编号 0 为“列出”本身）
pub fn variant_listing(kind: ModelKind) -> Vec<String> {
    let mut lines = vec!["0 - listing (set the default with --url, WEBVIEW_URL or the config file)".to_string()];
    for (i, v) in kind.variants().iter().enumerate() {
        lines.push(format!("{} - {}", i + 1, v.label));
    }
    lines
}
