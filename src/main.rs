//! DistBootstrap - 跨后端渲染上下文引导
//!
//! 选择图形后端、创建窗口和设备、构建管线并运行帧循环。
//! 后端和驱动只由可选的 `config.toml` 决定（例如 `driver = "headless"`），
//! 不读取命令行参数或环境变量。
//!
//! # 架构概览
//!
//! ```text
//! ┌─────────────┐
//! │   main.rs   │  程序入口：配置、日志、退出码
//! └──────┬──────┘
//!        │
//! ┌──────▼──────┐
//! │  Renderer   │  后端选择 → 设备上下文状态机 → 帧循环
//! └──────┬──────┘
//!        │
//!   ┌────┴────┐
//!   │         │
//! ┌─▼──┐   ┌──▼─────┐
//! │wgpu│   │headless│  图形驱动
//! └────┘   └────────┘
//! ```
//!
//! 引导失败时以状态码 1 退出。

use dist_bootstrap::core::config::{Config, DriverKind};
use dist_bootstrap::core::error::Result;
use dist_bootstrap::core::log;
use dist_bootstrap::platform::{HeadlessWindow, WinitWindowSystem};
use dist_bootstrap::renderer::{self, RunSummary};
use dist_bootstrap::{app_error, app_info};

fn launch(config: &Config) -> Result<RunSummary> {
    match config.graphics.driver {
        DriverKind::Wgpu => renderer::run(config, WinitWindowSystem::new()?),
        DriverKind::Headless => {
            let window = HeadlessWindow::new(config.window.width, config.window.height)
                .close_after(config.graphics.headless_frames);
            renderer::run(config, window)
        }
    }
}

fn main() {
    // 1. 加载配置（在初始化日志之前）
    let config = Config::from_file_or_default("config.toml");

    // 2. 验证配置
    if let Err(e) = config.validate() {
        eprintln!("Invalid configuration: {}", e);
        std::process::exit(1);
    }

    // 3. 初始化日志系统
    let log_file = config
        .logging
        .file_output
        .then_some(config.logging.log_file.as_str());
    log::init_logger(config.logging.level, config.logging.file_output, log_file);
    app_info!(version = env!("CARGO_PKG_VERSION"), "DistBootstrap starting");
    app_info!(
        backend = %config.graphics.backend,
        driver = ?config.graphics.driver,
        scene = ?config.scene.kind,
        width = config.window.width,
        height = config.window.height,
        "Configuration loaded"
    );

    // 4. 引导并运行
    match launch(&config) {
        Ok(summary) => {
            app_info!("Rendered {} frames on {}, exiting", summary.frames, summary.backend);
        }
        Err(e) => {
            app_error!("Fatal: {}", e);
            eprintln!("Fatal: {}", e);
            std::process::exit(1);
        }
    }
}
