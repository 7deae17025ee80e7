//! 基于 winit 的窗口系统
//!
//! 使用 `pump_events` 在帧循环内非阻塞地处理事件，
//! 与引导流程的单线程模型保持一致：事件泵、尺寸变化、绘制都在同一线程上。

use raw_window_handle::HasWindowHandle;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, warn};
use winit::dpi::{LogicalSize, PhysicalSize};
use winit::event::{Event, WindowEvent as WinitEvent};
use winit::event_loop::EventLoop;
use winit::platform::pump_events::{EventLoopExtPumpEvents, PumpStatus};
use winit::window::{Window, WindowBuilder};

use super::{ClientApi, NativeWindow, WindowEvent, WindowPlatform, WindowSystem};
use crate::core::error::{BootstrapError, Result};

/// 窗口最小尺寸
const MIN_WINDOW_SIZE: (u32, u32) = (320, 240);

/// winit 窗口系统
pub struct WinitWindowSystem {
    event_loop: EventLoop<()>,
    window: Option<Arc<Window>>,
    close_requested: bool,
}

impl WinitWindowSystem {
    /// 创建事件循环；窗口在 [`WindowSystem::create_window`] 中创建
    pub fn new() -> Result<Self> {
        let event_loop = EventLoop::new().map_err(|e| {
            BootstrapError::WindowCreationFailed(format!("Failed to create event loop: {}", e))
        })?;

        Ok(Self {
            event_loop,
            window: None,
            close_requested: false,
        })
    }
}

impl WindowSystem for WinitWindowSystem {
    fn create_window(&mut self, api: ClientApi, title: &str, width: u32, height: u32) -> Result<()> {
        if let ClientApi::OpenGl { major, minor } = api {
            // wgpu 的 GL 后端通过 EGL 自己创建上下文
            debug!(major, minor, "GL context hint left to the backend");
        }

        let window = WindowBuilder::new()
            .with_title(title)
            .with_inner_size(LogicalSize::new(width, height))
            .with_min_inner_size(LogicalSize::new(MIN_WINDOW_SIZE.0, MIN_WINDOW_SIZE.1))
            .with_resizable(true)
            .build(&self.event_loop)
            .map_err(|e| BootstrapError::WindowCreationFailed(e.to_string()))?;

        info!(title, width, height, "Window created");
        self.window = Some(Arc::new(window));
        Ok(())
    }

    fn pump_events(&mut self, handler: &mut dyn FnMut(WindowEvent)) {
        let close_requested = &mut self.close_requested;

        let status = self
            .event_loop
            .pump_events(Some(Duration::ZERO), |event, _| {
                if let Event::WindowEvent { event, .. } = event {
                    match event {
                        WinitEvent::CloseRequested => {
                            *close_requested = true;
                            handler(WindowEvent::CloseRequested);
                        }
                        WinitEvent::Resized(PhysicalSize { width, height }) => {
                            handler(WindowEvent::Resized { width, height });
                        }
                        _ => (),
                    }
                }
            });

        if let PumpStatus::Exit(code) = status {
            debug!(code, "Event loop exited");
            self.close_requested = true;
        }
    }

    fn should_close(&self) -> bool {
        self.close_requested
    }

    fn client_size(&self) -> (u32, u32) {
        self.window
            .as_ref()
            .map(|w| {
                let size = w.inner_size();
                (size.width, size.height)
            })
            .unwrap_or((0, 0))
    }

    fn native_window(&self) -> Option<NativeWindow> {
        let window = self.window.as_ref()?;

        let platform = match window.window_handle() {
            Ok(handle) => WindowPlatform::from_raw(&handle.as_raw()),
            Err(e) => {
                warn!("Window handle unavailable: {}", e);
                return None;
            }
        };

        Some(NativeWindow::new(platform, window.clone()))
    }
}
