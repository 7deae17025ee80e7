//! 渲染器模块
//!
//! 把后端选择、设备上下文状态机、管线构建和帧循环串成完整的引导流程。
//!
//! # 流程
//!
//! ```text
//! probe_capabilities → select → create_window → create_engine
//!   → build_pipeline → run（帧循环）→ shutdown
//! ```
//!
//! - `context`：`DeviceContext` 状态机与 `RenderContext`
//! - `pipeline`：一次性的管线构建器
//! - `projection`：表面预变换与投影矩阵修正
//! - `frame`：帧循环
//! - `scene`：演示场景

pub mod context;
pub mod frame;
pub mod pipeline;
pub mod projection;
pub mod scene;
pub mod shaders;
pub mod vertex;

pub use context::{DeviceContext, LifecycleState, RenderContext};
pub use frame::{FrameOrchestrator, FrameState, FrameStatus};
pub use pipeline::{PipelineBuilder, PipelineRecipe, PipelineResources};
pub use scene::{DemoScene, Scene};

use crate::core::config::Config;
use crate::core::error::Result;
use crate::gfx::backend::{self, BackendType, Capabilities, PlatformFamily};
use crate::gfx::desc::SwapchainDescriptor;
use crate::gfx::factory::{create_factory, probe_capabilities, GraphicsBackendFactory};
use crate::platform::WindowSystem;
use crate::{engine_error, engine_info};

/// 一次完整运行的结果
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RunSummary {
    pub backend: BackendType,
    pub frames: u64,
}

/// 按配置探测平台能力并运行
pub fn run<W: WindowSystem>(config: &Config, window: W) -> Result<RunSummary> {
    let family = PlatformFamily::current();
    let capabilities = probe_capabilities(&config.graphics, family);
    run_with(config, window, &capabilities, |backend| {
        create_factory(&config.graphics, backend)
    })
}

/// 使用给定的能力集合和工厂构造函数运行
pub fn run_with<W, F>(
    config: &Config,
    window: W,
    capabilities: &Capabilities,
    make_factory: F,
) -> Result<RunSummary>
where
    W: WindowSystem,
    F: FnOnce(BackendType) -> Box<dyn GraphicsBackendFactory>,
{
    let backend = match backend::select(config.graphics.backend, capabilities) {
        Ok(backend) => backend,
        Err(e) => {
            engine_error!("Backend selection failed: {}", e);
            return Err(e);
        }
    };
    engine_info!(
        "Selected backend {} (requested {}, available {:?})",
        backend,
        config.graphics.backend,
        capabilities.backends()
    );

    let mut device_context = DeviceContext::new(window);
    device_context.create_window(backend, capabilities.family, &config.window)?;

    let desc = SwapchainDescriptor {
        pre_transform: config.graphics.pretransform,
        ..Default::default()
    };
    device_context.create_engine(make_factory(backend), desc)?;

    let mut scene = DemoScene::from_config(&config.scene);
    device_context.build_pipeline(&mut scene)?;

    let mut orchestrator = FrameOrchestrator::new(&config.scene);
    device_context.run(&mut orchestrator, &mut scene)?;
    device_context.shutdown()?;

    Ok(RunSummary {
        backend,
        frames: orchestrator.frame().frame_index,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::config::{DriverKind, SceneKind};
    use crate::core::error::{BootstrapError, DistError};
    use crate::gfx::desc::{DrawAttribs, IndexType};
    use crate::gfx::headless::{Command, HeadlessFactory, HeadlessRecorder};
    use crate::platform::HeadlessWindow;
    use std::cell::RefCell;

    fn headless_config(kind: SceneKind) -> Config {
        let mut config = Config::default();
        config.graphics.driver = DriverKind::Headless;
        config.scene.kind = kind;
        config
    }

    fn run_headless(
        config: &Config,
        capabilities: &Capabilities,
        frames: u32,
    ) -> (Result<RunSummary>, Option<HeadlessRecorder>) {
        let recorder = RefCell::new(None);
        let window = HeadlessWindow::new(640, 480).close_after(frames);
        let result = run_with(config, window, capabilities, |backend| {
            let factory = HeadlessFactory::new(backend);
            *recorder.borrow_mut() = Some(factory.recorder());
            Box::new(factory)
        });
        (result, recorder.into_inner())
    }

    #[test]
    fn test_auto_selects_vulkan_on_unix() {
        let config = headless_config(SceneKind::Cube);
        let caps = Capabilities::new(
            PlatformFamily::UnixLike,
            [BackendType::Vulkan, BackendType::OpenGL],
        );

        let (result, recorder) = run_headless(&config, &caps, 5);
        let summary = result.unwrap();
        assert_eq!(summary.backend, BackendType::Vulkan);
        assert_eq!(summary.frames, 5);

        let recorder = recorder.unwrap();
        assert_eq!(recorder.present_count(), 5);
        assert_eq!(recorder.draws().len(), 5);
        assert_eq!(recorder.commands().last(), Some(&Command::Flush));
    }

    #[test]
    fn test_auto_falls_back_to_opengl() {
        let config = headless_config(SceneKind::Triangle);
        let caps = Capabilities::new(PlatformFamily::UnixLike, [BackendType::OpenGL]);

        let (result, recorder) = run_headless(&config, &caps, 2);
        assert_eq!(result.unwrap().backend, BackendType::OpenGL);

        let draws = recorder.unwrap().draws();
        assert_eq!(draws.len(), 2);
        assert!(draws
            .iter()
            .all(|d| d.attribs == DrawAttribs::NonIndexed { vertex_count: 3 }));
    }

    #[test]
    fn test_unsupported_backend_is_fatal() {
        let mut config = headless_config(SceneKind::Cube);
        config.graphics.backend = BackendType::D3D12;
        let caps = Capabilities::new(PlatformFamily::UnixLike, [BackendType::Vulkan]);

        let (result, recorder) = run_headless(&config, &caps, 1);
        assert!(matches!(
            result,
            Err(DistError::Bootstrap(BootstrapError::UnsupportedBackend {
                requested: BackendType::D3D12,
                platform: PlatformFamily::UnixLike,
            }))
        ));
        assert!(recorder.is_none());
    }

    #[test]
    fn test_cube_draws_36_indices_every_frame() {
        let config = headless_config(SceneKind::Cube);
        let caps = Capabilities::new(PlatformFamily::Windows, [BackendType::D3D11]);

        let (result, recorder) = run_headless(&config, &caps, 3);
        assert_eq!(result.unwrap().backend, BackendType::D3D11);

        for draw in recorder.unwrap().draws() {
            assert_eq!(
                draw.attribs,
                DrawAttribs::Indexed {
                    index_count: 36,
                    index_type: IndexType::U32
                }
            );
            assert_eq!(draw.constants.len(), 2);
        }
    }

    #[test]
    fn test_close_on_first_pump_runs_no_frames() {
        let config = headless_config(SceneKind::Empty);
        let caps = Capabilities::new(PlatformFamily::Apple, [BackendType::Metal]);

        let (result, recorder) = run_headless(&config, &caps, 0);
        let summary = result.unwrap();
        assert_eq!(summary.backend, BackendType::Metal);
        assert_eq!(summary.frames, 0);

        let recorder = recorder.unwrap();
        assert_eq!(recorder.present_count(), 0);
        assert_eq!(recorder.commands(), vec![Command::Flush]);
    }
}
