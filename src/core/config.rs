//! 配置管理模块
//!
//! 提供引擎配置的加载、解析和校验功能。
//! 配置文件是可选的：不存在时使用默认值，程序不会写回任何文件。
//!
//! # 配置文件格式 (config.toml)
//!
//! ```toml
//! [window]
//! width = 1280
//! height = 720
//! title = "DistBootstrap"
//!
//! [graphics]
//! backend = "auto"        # auto, vulkan, opengl, d3d11, d3d12, metal
//! driver = "wgpu"         # wgpu 或 headless
//! vsync = true
//! pretransform = "optimal"
//!
//! [scene]
//! kind = "cube"           # empty, triangle, cube
//! fov = 45.0
//! near_clip = 0.1
//! far_clip = 100.0
//! rotation_speed = 1.0
//! clear_color = [0.35, 0.35, 0.35, 1.0]
//!
//! [logging]
//! level = "info"          # trace, debug, info, warn, error
//! file_output = false
//! ```

use serde::{Deserialize, Serialize};
use std::path::Path;

use super::error::{ConfigError, Result};
use crate::gfx::backend::BackendType;
use crate::gfx::desc::SurfaceTransform;

/// 引擎配置
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    /// 窗口配置
    #[serde(default)]
    pub window: WindowConfig,

    /// 图形配置
    #[serde(default)]
    pub graphics: GraphicsConfig,

    /// 场景配置
    #[serde(default)]
    pub scene: SceneConfig,

    /// 日志配置
    #[serde(default)]
    pub logging: LoggingConfig,
}

/// 窗口配置
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WindowConfig {
    /// 窗口宽度
    #[serde(default = "default_width")]
    pub width: u32,

    /// 窗口高度
    #[serde(default = "default_height")]
    pub height: u32,

    /// 窗口标题（后端名称会追加在括号里）
    #[serde(default = "default_title")]
    pub title: String,
}

/// 图形配置
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GraphicsConfig {
    /// 请求的后端，`auto` 表示按平台优先级自动选择
    #[serde(default)]
    pub backend: BackendType,

    /// 图形驱动实现
    #[serde(default)]
    pub driver: DriverKind,

    /// 垂直同步
    #[serde(default = "default_vsync")]
    pub vsync: bool,

    /// 请求的交换链预变换（`optimal` 由后端决定）
    #[serde(default)]
    pub pretransform: SurfaceTransform,

    /// headless 驱动运行的帧数，之后窗口报告关闭
    #[serde(default = "default_headless_frames")]
    pub headless_frames: u32,

    /// headless 驱动报告的可用后端；为空时使用平台默认集合
    #[serde(default)]
    pub headless_backends: Vec<BackendType>,
}

/// 图形驱动实现
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DriverKind {
    /// 基于 wgpu + winit 的真实驱动
    #[default]
    Wgpu,
    /// 不访问 GPU 的记录型驱动
    Headless,
}

/// 场景配置
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SceneConfig {
    /// 演示场景
    #[serde(default)]
    pub kind: SceneKind,

    /// 垂直视场角（度）
    #[serde(default = "default_fov")]
    pub fov: f32,

    /// 近裁剪面
    #[serde(default = "default_near_clip")]
    pub near_clip: f32,

    /// 远裁剪面
    #[serde(default = "default_far_clip")]
    pub far_clip: f32,

    /// 旋转速度（弧度 / 秒）
    #[serde(default = "default_rotation_speed")]
    pub rotation_speed: f32,

    /// 清屏颜色 RGBA
    #[serde(default = "default_clear_color")]
    pub clear_color: [f32; 4],
}

/// 演示场景类型
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SceneKind {
    /// 只清屏和呈现
    Empty,
    /// 彩色三角形（非索引绘制）
    Triangle,
    /// 旋转立方体（索引绘制）
    #[default]
    Cube,
}

/// 日志配置
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// 日志级别
    #[serde(default = "default_log_level")]
    pub level: LogLevel,

    /// 是否输出到文件
    #[serde(default = "default_file_output")]
    pub file_output: bool,

    /// 日志文件路径
    #[serde(default = "default_log_file")]
    pub log_file: String,
}

/// 日志级别
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogLevel {
    Trace,
    Debug,
    Info,
    Warn,
    Error,
}

// 默认值函数
fn default_width() -> u32 { 1280 }
fn default_height() -> u32 { 720 }
fn default_title() -> String { "DistBootstrap".to_string() }
fn default_vsync() -> bool { true }
fn default_headless_frames() -> u32 { 600 }
fn default_fov() -> f32 { 45.0 }
fn default_near_clip() -> f32 { 0.1 }
fn default_far_clip() -> f32 { 100.0 }
fn default_rotation_speed() -> f32 { 1.0 }
fn default_clear_color() -> [f32; 4] { [0.35, 0.35, 0.35, 1.0] }
fn default_log_level() -> LogLevel { LogLevel::Info }
fn default_file_output() -> bool { false }
fn default_log_file() -> String { "dist_bootstrap.log".to_string() }

impl Default for WindowConfig {
    fn default() -> Self {
        Self {
            width: default_width(),
            height: default_height(),
            title: default_title(),
        }
    }
}

impl Default for GraphicsConfig {
    fn default() -> Self {
        Self {
            backend: BackendType::default(),
            driver: DriverKind::default(),
            vsync: default_vsync(),
            pretransform: SurfaceTransform::default(),
            headless_frames: default_headless_frames(),
            headless_backends: Vec::new(),
        }
    }
}

impl Default for SceneConfig {
    fn default() -> Self {
        Self {
            kind: SceneKind::default(),
            fov: default_fov(),
            near_clip: default_near_clip(),
            far_clip: default_far_clip(),
            rotation_speed: default_rotation_speed(),
            clear_color: default_clear_color(),
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            file_output: default_file_output(),
            log_file: default_log_file(),
        }
    }
}

impl Config {
    /// 从配置文件加载
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path_str = path.as_ref().to_string_lossy().to_string();

        let contents = std::fs::read_to_string(path)
            .map_err(|_| ConfigError::FileNotFound(path_str.clone()))?;

        Self::from_toml_str(&contents)
    }

    /// 从 TOML 字符串解析
    pub fn from_toml_str(contents: &str) -> Result<Self> {
        toml::from_str(contents).map_err(|e| ConfigError::ParseError(e.to_string()).into())
    }

    /// 从配置文件加载，如果文件不存在或无法解析则使用默认配置
    pub fn from_file_or_default<P: AsRef<Path>>(path: P) -> Self {
        Self::from_file(path).unwrap_or_default()
    }

    /// 验证配置的有效性
    pub fn validate(&self) -> Result<()> {
        if self.window.width == 0 || self.window.height == 0 {
            return Err(invalid("window.width/height", "Window dimensions must be greater than 0"));
        }

        if !(self.scene.fov > 0.0 && self.scene.fov < 180.0) {
            return Err(invalid("scene.fov", "Field of view must be in (0, 180) degrees"));
        }

        if !(self.scene.near_clip > 0.0 && self.scene.far_clip > self.scene.near_clip) {
            return Err(invalid(
                "scene.near_clip/far_clip",
                "Clip planes must satisfy 0 < near < far",
            ));
        }

        if self
            .graphics
            .headless_backends
            .iter()
            .any(|b| *b == BackendType::Undefined)
        {
            return Err(invalid(
                "graphics.headless_backends",
                "Capability sets may only list concrete backends",
            ));
        }

        Ok(())
    }
}

fn invalid(field: &str, reason: &str) -> super::error::DistError {
    ConfigError::InvalidValue {
        field: field.to_string(),
        reason: reason.to_string(),
    }
    .into()
}
