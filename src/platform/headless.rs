//! 无窗口实现
//!
//! 按预设脚本产生尺寸变化和关闭事件，不访问任何窗口系统。
//! 与 headless 图形驱动配合，可以在没有显示器的环境中跑完整个引导流程。

use std::collections::VecDeque;
use tracing::debug;

use super::{ClientApi, NativeWindow, WindowEvent, WindowSystem};
use crate::core::error::{BootstrapError, Result};

/// 脚本化的无窗口实现
#[derive(Debug)]
pub struct HeadlessWindow {
    width: u32,
    height: u32,
    created: bool,
    fail_creation: bool,
    api: Option<ClientApi>,
    title: Option<String>,
    /// 每次泵送取出一批事件
    script: VecDeque<Vec<WindowEvent>>,
    close_after_pumps: Option<u32>,
    pumps: u32,
    close_requested: bool,
}

impl HeadlessWindow {
    pub fn new(width: u32, height: u32) -> Self {
        Self {
            width,
            height,
            created: false,
            fail_creation: false,
            api: None,
            title: None,
            script: VecDeque::new(),
            close_after_pumps: None,
            pumps: 0,
            close_requested: false,
        }
    }

    /// 第 `pumps` 次泵送时报告关闭（0 表示第一次泵送即关闭）
    pub fn close_after(mut self, pumps: u32) -> Self {
        self.close_after_pumps = Some(pumps);
        self
    }

    /// 让 `create_window` 失败
    pub fn failing(mut self) -> Self {
        self.fail_creation = true;
        self
    }

    /// 在下一次泵送时产生一批事件
    pub fn push_events(&mut self, events: Vec<WindowEvent>) {
        self.script.push_back(events);
    }

    pub fn push_resize(&mut self, width: u32, height: u32) {
        self.push_events(vec![WindowEvent::Resized { width, height }]);
    }

    pub fn request_close(&mut self) {
        self.push_events(vec![WindowEvent::CloseRequested]);
    }

    /// 创建窗口时收到的客户端 API 提示
    pub fn requested_api(&self) -> Option<ClientApi> {
        self.api
    }

    pub fn title(&self) -> Option<&str> {
        self.title.as_deref()
    }

    pub fn pump_count(&self) -> u32 {
        self.pumps
    }
}

impl WindowSystem for HeadlessWindow {
    fn create_window(&mut self, api: ClientApi, title: &str, width: u32, height: u32) -> Result<()> {
        if self.fail_creation {
            return Err(BootstrapError::WindowCreationFailed(
                "headless window configured to fail".to_string(),
            )
            .into());
        }

        self.api = Some(api);
        self.title = Some(title.to_string());
        self.width = width;
        self.height = height;
        self.created = true;
        debug!(title, width, height, "Headless window created");
        Ok(())
    }

    fn pump_events(&mut self, handler: &mut dyn FnMut(WindowEvent)) {
        if let Some(events) = self.script.pop_front() {
            for event in events {
                match event {
                    WindowEvent::Resized { width, height } => {
                        self.width = width;
                        self.height = height;
                    }
                    WindowEvent::CloseRequested => self.close_requested = true,
                }
                handler(event);
            }
        }

        if self.close_after_pumps == Some(self.pumps) && !self.close_requested {
            self.close_requested = true;
            handler(WindowEvent::CloseRequested);
        }
        self.pumps += 1;
    }

    fn should_close(&self) -> bool {
        self.close_requested
    }

    fn client_size(&self) -> (u32, u32) {
        (self.width, self.height)
    }

    fn native_window(&self) -> Option<NativeWindow> {
        self.created.then(NativeWindow::headless)
    }
}
