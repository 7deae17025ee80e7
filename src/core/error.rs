//! 错误处理模块
//!
//! 定义了引导流程和帧循环中使用的统一错误类型。
//!
//! # 错误分类
//!
//! - `BootstrapError`：启动阶段的致命错误（窗口、引擎、后端选择）
//! - `GraphicsError`：图形对象创建、映射、提交过程中的错误
//! - `ConfigError`：配置文件加载与校验错误
//!
//! 启动阶段的错误不可恢复，只报告一次，由 `main` 以非零状态码退出。

use std::fmt;

use crate::gfx::backend::{BackendType, PlatformFamily};
use crate::gfx::desc::SurfaceTransform;

/// 统一的 Result 类型
pub type Result<T> = std::result::Result<T, DistError>;

/// 引擎错误类型
#[derive(Debug)]
pub enum DistError {
    /// 配置错误
    Config(ConfigError),

    /// 启动（引导）错误
    Bootstrap(BootstrapError),

    /// 图形 API 错误
    Graphics(GraphicsError),

    /// IO 错误
    Io(std::io::Error),

    /// 生命周期状态机错误（在错误的状态下请求了状态转换）
    Lifecycle(String),
}

/// 启动阶段的致命错误
#[derive(Debug)]
pub enum BootstrapError {
    /// 窗口创建失败
    WindowCreationFailed(String),

    /// 设备 / 立即上下文 / 交换链 三者未能全部创建
    EngineInitFailed(String),

    /// 平台不支持请求的后端
    UnsupportedBackend {
        requested: BackendType,
        platform: PlatformFamily,
    },
}

/// 配置相关的错误
#[derive(Debug)]
pub enum ConfigError {
    /// 配置文件未找到
    FileNotFound(String),

    /// 配置文件解析失败
    ParseError(String),

    /// 配置值无效
    InvalidValue { field: String, reason: String },
}

/// 图形 API 相关的错误
#[derive(Debug)]
pub enum GraphicsError {
    /// 表面变换无法在绘制时处理（镜像变换或 Optimal 哨兵值）
    UnsupportedSurfaceTransform(SurfaceTransform),

    /// 着色器创建失败
    ShaderCreation(String),

    /// 资源创建失败
    ResourceCreation(String),

    /// 句柄无效或已释放
    InvalidHandle(String),

    /// 缓冲区映射失败
    Map(String),

    /// 渲染命令执行失败
    CommandExecution(String),

    /// 交换链错误
    SwapchainError(String),
}

impl fmt::Display for DistError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DistError::Config(e) => write!(f, "Configuration error: {}", e),
            DistError::Bootstrap(e) => write!(f, "Bootstrap error: {}", e),
            DistError::Graphics(e) => write!(f, "Graphics error: {}", e),
            DistError::Io(e) => write!(f, "IO error: {}", e),
            DistError::Lifecycle(msg) => write!(f, "Lifecycle error: {}", msg),
        }
    }
}

impl fmt::Display for BootstrapError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            BootstrapError::WindowCreationFailed(msg) => {
                write!(f, "Failed to create window: {}", msg)
            }
            BootstrapError::EngineInitFailed(msg) => {
                write!(f, "Failed to initialize engine: {}", msg)
            }
            BootstrapError::UnsupportedBackend { requested, platform } => write!(
                f,
                "Backend {} is not supported on platform {:?}",
                requested.name(),
                platform
            ),
        }
    }
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConfigError::FileNotFound(path) => write!(f, "Config file not found: {}", path),
            ConfigError::ParseError(msg) => write!(f, "Failed to parse config: {}", msg),
            ConfigError::InvalidValue { field, reason } => {
                write!(f, "Invalid value for '{}': {}", field, reason)
            }
        }
    }
}

impl fmt::Display for GraphicsError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            GraphicsError::UnsupportedSurfaceTransform(transform) => {
                write!(f, "Unsupported surface transform: {:?}", transform)
            }
            GraphicsError::ShaderCreation(msg) => write!(f, "Shader creation failed: {}", msg),
            GraphicsError::ResourceCreation(msg) => write!(f, "Resource creation failed: {}", msg),
            GraphicsError::InvalidHandle(msg) => write!(f, "Invalid handle: {}", msg),
            GraphicsError::Map(msg) => write!(f, "Buffer map failed: {}", msg),
            GraphicsError::CommandExecution(msg) => write!(f, "Command execution failed: {}", msg),
            GraphicsError::SwapchainError(msg) => write!(f, "Swapchain error: {}", msg),
        }
    }
}

impl std::error::Error for DistError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            DistError::Io(e) => Some(e),
            DistError::Config(e) => Some(e),
            DistError::Bootstrap(e) => Some(e),
            DistError::Graphics(e) => Some(e),
            DistError::Lifecycle(_) => None,
        }
    }
}

impl std::error::Error for BootstrapError {}
impl std::error::Error for ConfigError {}
impl std::error::Error for GraphicsError {}

impl From<std::io::Error> for DistError {
    fn from(err: std::io::Error) -> Self {
        DistError::Io(err)
    }
}

impl From<ConfigError> for DistError {
    fn from(err: ConfigError) -> Self {
        DistError::Config(err)
    }
}

impl From<BootstrapError> for DistError {
    fn from(err: BootstrapError) -> Self {
        DistError::Bootstrap(err)
    }
}

impl From<GraphicsError> for DistError {
    fn from(err: GraphicsError) -> Self {
        DistError::Graphics(err)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_unsupported_backend_message() {
        let err: DistError = BootstrapError::UnsupportedBackend {
            requested: BackendType::D3D12,
            platform: PlatformFamily::UnixLike,
        }
        .into();
        let msg = err.to_string();
        assert!(msg.contains("D3D12"));
        assert!(msg.contains("UnixLike"));
    }

    #[test]
    fn test_error_source_chain() {
        let err: DistError = GraphicsError::Map("buffer 3 is immutable".to_string()).into();
        assert!(std::error::Error::source(&err).is_some());
    }
}
