//! DistBootstrap - 跨后端渲染上下文引导
//!
//! 选择图形后端、创建窗口与设备、构建管线，然后驱动每帧的
//! 事件泵送、动画、投影修正、绘制和呈现，最后有序关闭。
//!
//! # 模块结构
//!
//! - `core`: 核心功能模块（数学、日志、配置、错误处理）
//! - `platform`: 窗口系统抽象（winit 和 headless）
//! - `gfx`: 图形后端抽象层与驱动（wgpu 和 headless）
//! - `renderer`: 引导状态机、管线构建、投影修正和帧循环
//!
//! # 使用示例
//!
//! ```no_run
//! use dist_bootstrap::core::config::{Config, DriverKind};
//! use dist_bootstrap::platform::HeadlessWindow;
//!
//! let mut config = Config::default();
//! config.graphics.driver = DriverKind::Headless;
//!
//! let window = HeadlessWindow::new(1280, 720).close_after(60);
//! let summary = dist_bootstrap::renderer::run(&config, window).unwrap();
//! println!("{} frames on {}", summary.frames, summary.backend);
//! ```

pub mod core;
pub mod gfx;
pub mod platform;
pub mod renderer;
