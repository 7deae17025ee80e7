//! 窗口系统抽象
//!
//! 引导流程只通过 [`WindowSystem`] 与窗口交互：创建窗口、泵送事件、
//! 查询关闭标志和原生句柄。具体实现：
//!
//! - [`WinitWindowSystem`]：基于 winit 的桌面窗口
//! - [`HeadlessWindow`]：按脚本产生事件的无窗口实现，用于测试和 CI

pub mod headless;
pub mod winit_window;

pub use headless::HeadlessWindow;
pub use winit_window::WinitWindowSystem;

use raw_window_handle::{HasDisplayHandle, HasWindowHandle, RawWindowHandle};
use std::fmt;
use std::sync::Arc;

use crate::core::error::Result;
use crate::gfx::backend::{BackendType, PlatformFamily};

/// 创建窗口时的客户端 API 提示
///
/// 这只是一个提示。winit 窗口不会创建 GL 上下文，只记录日志；
/// wgpu 的 OpenGL 后端在创建设备时自行建立上下文，不保证 4.2 版本。
/// headless 窗口把收到的提示保存下来供检查。
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ClientApi {
    /// 窗口不创建任何图形上下文，由后端自行接管表面
    NoApi,
    /// 请求 OpenGL 上下文的最低版本
    OpenGl { major: u8, minor: u8 },
}

impl ClientApi {
    /// 根据后端和平台推导提示
    ///
    /// 只有非 Windows 平台上的 OpenGL 后端需要窗口层提供 GL 上下文，
    /// 并且至少是 4.2（计算着色器）。
    pub fn for_backend(backend: BackendType, family: PlatformFamily) -> Self {
        if backend.is_gl() && family != PlatformFamily::Windows {
            ClientApi::OpenGl { major: 4, minor: 2 }
        } else {
            ClientApi::NoApi
        }
    }
}

/// 窗口事件
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WindowEvent {
    /// 客户区尺寸变化
    Resized { width: u32, height: u32 },
    /// 用户请求关闭窗口
    CloseRequested,
}

/// 原生窗口所在的平台
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WindowPlatform {
    Win32,
    Xlib,
    Xcb,
    Wayland,
    AppKit,
    UiKit,
    Android,
    Other,
    Headless,
}

impl WindowPlatform {
    pub fn from_raw(handle: &RawWindowHandle) -> Self {
        match handle {
            RawWindowHandle::Win32(_) => WindowPlatform::Win32,
            RawWindowHandle::Xlib(_) => WindowPlatform::Xlib,
            RawWindowHandle::Xcb(_) => WindowPlatform::Xcb,
            RawWindowHandle::Wayland(_) => WindowPlatform::Wayland,
            RawWindowHandle::AppKit(_) => WindowPlatform::AppKit,
            RawWindowHandle::UiKit(_) => WindowPlatform::UiKit,
            RawWindowHandle::AndroidNdk(_) => WindowPlatform::Android,
            _ => WindowPlatform::Other,
        }
    }
}

/// 可以作为 GPU 表面目标的窗口
pub trait SurfaceHandle: HasWindowHandle + HasDisplayHandle + Send + Sync {}

impl<T: HasWindowHandle + HasDisplayHandle + Send + Sync> SurfaceHandle for T {}

/// 不透明的、带平台标记的原生窗口句柄
///
/// 持有窗口的共享引用，保证基于它创建的表面不会比窗口活得更久。
#[derive(Clone)]
pub struct NativeWindow {
    platform: WindowPlatform,
    handle: Option<Arc<dyn SurfaceHandle>>,
}

impl NativeWindow {
    pub fn new(platform: WindowPlatform, handle: Arc<dyn SurfaceHandle>) -> Self {
        Self {
            platform,
            handle: Some(handle),
        }
    }

    /// 没有可呈现表面的窗口
    pub fn headless() -> Self {
        Self {
            platform: WindowPlatform::Headless,
            handle: None,
        }
    }

    pub fn platform(&self) -> WindowPlatform {
        self.platform
    }

    pub fn surface_handle(&self) -> Option<Arc<dyn SurfaceHandle>> {
        self.handle.clone()
    }
}

impl fmt::Debug for NativeWindow {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("NativeWindow")
            .field("platform", &self.platform)
            .field("has_surface", &self.handle.is_some())
            .finish()
    }
}

/// 窗口系统接口
///
/// 所有方法都在帧循环线程上调用。
pub trait WindowSystem {
    /// 创建窗口；失败时返回 `WindowCreationFailed`
    fn create_window(&mut self, api: ClientApi, title: &str, width: u32, height: u32)
        -> Result<()>;

    /// 非阻塞地处理所有待处理事件
    ///
    /// 尺寸变化通过 `handler` 同步通知；关闭请求同时会设置关闭标志。
    fn pump_events(&mut self, handler: &mut dyn FnMut(WindowEvent));

    fn should_close(&self) -> bool;

    /// 当前客户区尺寸
    fn client_size(&self) -> (u32, u32);

    /// 窗口创建之后才有原生句柄
    fn native_window(&self) -> Option<NativeWindow>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_gl_hint_only_off_windows() {
        assert_eq!(
            ClientApi::for_backend(BackendType::OpenGL, PlatformFamily::UnixLike),
            ClientApi::OpenGl { major: 4, minor: 2 }
        );
        assert_eq!(
            ClientApi::for_backend(BackendType::OpenGL, PlatformFamily::Apple),
            ClientApi::OpenGl { major: 4, minor: 2 }
        );
        assert_eq!(
            ClientApi::for_backend(BackendType::OpenGL, PlatformFamily::Windows),
            ClientApi::NoApi
        );
        assert_eq!(
            ClientApi::for_backend(BackendType::Vulkan, PlatformFamily::UnixLike),
            ClientApi::NoApi
        );
    }

    #[test]
    fn test_headless_native_window() {
        let native = NativeWindow::headless();
        assert_eq!(native.platform(), WindowPlatform::Headless);
        assert!(native.surface_handle().is_none());
    }
}
