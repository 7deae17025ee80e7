//! 后端类型与后端选择
//!
//! 本模块定义了可用的图形后端类型、平台能力集合，
//! 以及根据平台与请求决定具体后端的纯函数 [`select`]。
//!
//! # 选择策略
//!
//! | 平台族 | 自动选择优先级 |
//! |--------|----------------|
//! | Unix-like（Linux / BSD / Android） | Vulkan → OpenGL |
//! | Windows | D3D12 → D3D11 → Vulkan → OpenGL |
//! | Apple | D3D12 → D3D11 → Vulkan → OpenGL → Metal |

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::core::error::{BootstrapError, Result};

/// 图形后端类型
///
/// 每个进程只会激活一个后端，选定后不可更改。
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BackendType {
    D3D11,
    D3D12,
    #[serde(rename = "opengl", alias = "gl")]
    OpenGL,
    Vulkan,
    Metal,
    /// 未指定，由 [`select`] 根据平台决定
    #[default]
    #[serde(rename = "auto", alias = "undefined")]
    Undefined,
}

impl BackendType {
    /// 所有具体后端
    pub const CONCRETE: [BackendType; 5] = [
        BackendType::D3D11,
        BackendType::D3D12,
        BackendType::OpenGL,
        BackendType::Vulkan,
        BackendType::Metal,
    ];

    /// 后端显示名称（用于窗口标题和日志）
    pub fn name(&self) -> &'static str {
        match self {
            BackendType::D3D11 => "D3D11",
            BackendType::D3D12 => "D3D12",
            BackendType::OpenGL => "OPENGL",
            BackendType::Vulkan => "VULKAN",
            BackendType::Metal => "METAL",
            BackendType::Undefined => "UNDEFINED",
        }
    }

    pub fn is_concrete(&self) -> bool {
        !matches!(self, BackendType::Undefined)
    }

    pub fn is_gl(&self) -> bool {
        matches!(self, BackendType::OpenGL)
    }
}

impl FromStr for BackendType {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "d3d11" => Ok(BackendType::D3D11),
            "d3d12" => Ok(BackendType::D3D12),
            "opengl" | "gl" => Ok(BackendType::OpenGL),
            "vulkan" => Ok(BackendType::Vulkan),
            "metal" => Ok(BackendType::Metal),
            "auto" | "undefined" => Ok(BackendType::Undefined),
            other => Err(format!("unknown backend '{}'", other)),
        }
    }
}

impl fmt::Display for BackendType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// 平台族
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PlatformFamily {
    Windows,
    Apple,
    /// Linux、BSD、Android 等非桌面 / 类 Unix 平台
    UnixLike,
}

impl PlatformFamily {
    /// 当前编译目标所属的平台族
    pub fn current() -> Self {
        if cfg!(target_os = "windows") {
            PlatformFamily::Windows
        } else if cfg!(any(target_os = "macos", target_os = "ios")) {
            PlatformFamily::Apple
        } else {
            PlatformFamily::UnixLike
        }
    }

    /// 自动选择后端时的优先级
    pub fn backend_priority(&self) -> &'static [BackendType] {
        match self {
            PlatformFamily::UnixLike => &[BackendType::Vulkan, BackendType::OpenGL],
            PlatformFamily::Windows => &[
                BackendType::D3D12,
                BackendType::D3D11,
                BackendType::Vulkan,
                BackendType::OpenGL,
            ],
            PlatformFamily::Apple => &[
                BackendType::D3D12,
                BackendType::D3D11,
                BackendType::Vulkan,
                BackendType::OpenGL,
                BackendType::Metal,
            ],
        }
    }

    /// headless 驱动默认报告的后端集合
    pub fn default_backends(&self) -> Vec<BackendType> {
        match self {
            PlatformFamily::UnixLike => vec![BackendType::Vulkan, BackendType::OpenGL],
            PlatformFamily::Windows => vec![
                BackendType::D3D11,
                BackendType::D3D12,
                BackendType::Vulkan,
                BackendType::OpenGL,
            ],
            PlatformFamily::Apple => {
                vec![BackendType::Metal, BackendType::Vulkan, BackendType::OpenGL]
            }
        }
    }
}

/// 平台能力：平台族 + 可用的后端集合
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Capabilities {
    pub family: PlatformFamily,
    backends: Vec<BackendType>,
}

impl Capabilities {
    pub fn new(family: PlatformFamily, backends: impl IntoIterator<Item = BackendType>) -> Self {
        let mut list: Vec<BackendType> = Vec::new();
        for backend in backends {
            if backend.is_concrete() && !list.contains(&backend) {
                list.push(backend);
            }
        }
        Self { family, backends: list }
    }

    pub fn supports(&self, backend: BackendType) -> bool {
        self.backends.contains(&backend)
    }

    pub fn backends(&self) -> &[BackendType] {
        &self.backends
    }
}

/// 选择具体后端
///
/// - 请求为具体后端：平台支持则返回，否则 `UnsupportedBackend`
/// - 请求为 `Undefined`：按平台族优先级返回第一个可用后端
///
/// 纯函数，无副作用；相同输入总是得到相同输出。
pub fn select(requested: BackendType, capabilities: &Capabilities) -> Result<BackendType> {
    let unsupported = || BootstrapError::UnsupportedBackend {
        requested,
        platform: capabilities.family,
    };

    if requested.is_concrete() {
        return if capabilities.supports(requested) {
            Ok(requested)
        } else {
            Err(unsupported().into())
        };
    }

    capabilities
        .family
        .backend_priority()
        .iter()
        .copied()
        .find(|backend| capabilities.supports(*backend))
        .ok_or_else(|| unsupported().into())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::error::DistError;

    const FAMILIES: [PlatformFamily; 3] = [
        PlatformFamily::Windows,
        PlatformFamily::Apple,
        PlatformFamily::UnixLike,
    ];

    #[test]
    fn test_unix_prefers_vulkan() {
        let caps = Capabilities::new(
            PlatformFamily::UnixLike,
            [BackendType::OpenGL, BackendType::Vulkan],
        );
        assert_eq!(select(BackendType::Undefined, &caps).unwrap(), BackendType::Vulkan);
    }

    #[test]
    fn test_unix_falls_back_to_opengl() {
        let caps = Capabilities::new(PlatformFamily::UnixLike, [BackendType::OpenGL]);
        assert_eq!(select(BackendType::Undefined, &caps).unwrap(), BackendType::OpenGL);
    }

    #[test]
    fn test_windows_priority_order() {
        let all = Capabilities::new(PlatformFamily::Windows, BackendType::CONCRETE);
        assert_eq!(select(BackendType::Undefined, &all).unwrap(), BackendType::D3D12);

        let no_d3d12 = Capabilities::new(
            PlatformFamily::Windows,
            [BackendType::D3D11, BackendType::Vulkan, BackendType::OpenGL],
        );
        assert_eq!(select(BackendType::Undefined, &no_d3d12).unwrap(), BackendType::D3D11);

        let vk_gl = Capabilities::new(
            PlatformFamily::Windows,
            [BackendType::OpenGL, BackendType::Vulkan],
        );
        assert_eq!(select(BackendType::Undefined, &vk_gl).unwrap(), BackendType::Vulkan);
    }

    #[test]
    fn test_apple_metal_is_last_resort() {
        let metal_only = Capabilities::new(PlatformFamily::Apple, [BackendType::Metal]);
        assert_eq!(select(BackendType::Undefined, &metal_only).unwrap(), BackendType::Metal);

        let with_vulkan = Capabilities::new(
            PlatformFamily::Apple,
            [BackendType::Metal, BackendType::Vulkan],
        );
        assert_eq!(select(BackendType::Undefined, &with_vulkan).unwrap(), BackendType::Vulkan);
    }

    #[test]
    fn test_unsupported_request_fails() {
        for family in FAMILIES {
            let caps = Capabilities::new(family, [BackendType::OpenGL]);
            for backend in BackendType::CONCRETE {
                let result = select(backend, &caps);
                if backend == BackendType::OpenGL {
                    assert_eq!(result.unwrap(), BackendType::OpenGL);
                } else {
                    assert!(matches!(
                        result,
                        Err(DistError::Bootstrap(BootstrapError::UnsupportedBackend { .. }))
                    ));
                }
            }
        }
    }

    #[test]
    fn test_empty_capabilities_fail() {
        let caps = Capabilities::new(PlatformFamily::UnixLike, []);
        assert!(matches!(
            select(BackendType::Undefined, &caps),
            Err(DistError::Bootstrap(BootstrapError::UnsupportedBackend {
                requested: BackendType::Undefined,
                ..
            }))
        ));
    }

    #[test]
    fn test_select_is_deterministic() {
        // 遍历所有后端子集，重复调用结果一致
        let requests = [
            BackendType::Undefined,
            BackendType::D3D11,
            BackendType::D3D12,
            BackendType::OpenGL,
            BackendType::Vulkan,
            BackendType::Metal,
        ];

        for family in FAMILIES {
            for mask in 0u32..32 {
                let subset = BackendType::CONCRETE
                    .iter()
                    .enumerate()
                    .filter(|(i, _)| mask & (1 << i) != 0)
                    .map(|(_, b)| *b);
                let caps = Capabilities::new(family, subset);

                for requested in requests {
                    let first = select(requested, &caps).ok();
                    let second = select(requested, &caps).ok();
                    assert_eq!(first, second);
                }
            }
        }
    }

    #[test]
    fn test_capabilities_ignore_undefined_and_duplicates() {
        let caps = Capabilities::new(
            PlatformFamily::UnixLike,
            [BackendType::Undefined, BackendType::Vulkan, BackendType::Vulkan],
        );
        assert_eq!(caps.backends(), &[BackendType::Vulkan]);
    }
}
