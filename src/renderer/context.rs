//! 设备上下文与引导状态机
//!
//! [`DeviceContext`] 驱动引导流程：
//!
//! ```text
//! Uninitialized → WindowCreated → EngineCreated → PipelineReady
//!              → Running → ShuttingDown → Closed
//! ```
//!
//! 设备、立即上下文、交换链和工厂只以 [`RenderContext`] 整体出现：
//! 要么四者齐全，要么都不存在。

use std::fmt;

use super::frame::FrameOrchestrator;
use super::scene::Scene;
use crate::core::config::WindowConfig;
use crate::core::error::{BootstrapError, DistError, Result};
use crate::gfx::backend::{BackendType, PlatformFamily};
use crate::gfx::desc::SwapchainDescriptor;
use crate::gfx::device::{ImmediateContext, RenderDevice, Swapchain};
use crate::gfx::factory::GraphicsBackendFactory;
use crate::platform::{ClientApi, WindowSystem};
use crate::{engine_error, engine_info, engine_warn};

/// 渲染上下文：设备 + 立即上下文 + 交换链 + 工厂
///
/// 字段按释放顺序排列。未经 [`flush`](Self::flush) 就被丢弃时，
/// 会先等待 GPU 完成已提交的工作。
pub struct RenderContext {
    swapchain: Box<dyn Swapchain>,
    context: Box<dyn ImmediateContext>,
    device: Box<dyn RenderDevice>,
    factory: Box<dyn GraphicsBackendFactory>,
    flushed: bool,
}

impl RenderContext {
    pub fn new(
        factory: Box<dyn GraphicsBackendFactory>,
        device: Box<dyn RenderDevice>,
        context: Box<dyn ImmediateContext>,
        swapchain: Box<dyn Swapchain>,
    ) -> Self {
        Self {
            swapchain,
            context,
            device,
            factory,
            flushed: false,
        }
    }

    pub fn device(&self) -> &dyn RenderDevice {
        self.device.as_ref()
    }

    pub fn context_mut(&mut self) -> &mut dyn ImmediateContext {
        self.context.as_mut()
    }

    pub fn swapchain(&self) -> &dyn Swapchain {
        self.swapchain.as_ref()
    }

    pub fn swapchain_mut(&mut self) -> &mut dyn Swapchain {
        self.swapchain.as_mut()
    }

    pub fn backend(&self) -> BackendType {
        self.factory.backend_type()
    }

    /// 原地调整交换链尺寸
    pub fn resize(&mut self, width: u32, height: u32) -> Result<()> {
        engine_info!("Swapchain resize to {}x{}", width, height);
        self.swapchain.resize(width, height)
    }

    /// 提交所有命令并等待 GPU 完成
    pub fn flush(&mut self) -> Result<()> {
        self.context.flush()?;
        self.flushed = true;
        Ok(())
    }
}

impl Drop for RenderContext {
    fn drop(&mut self) {
        if !self.flushed {
            if let Err(e) = self.context.flush() {
                engine_warn!("Flush on drop failed: {}", e);
            }
        }
    }
}

impl fmt::Debug for RenderContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RenderContext")
            .field("backend", &self.backend())
            .field("swapchain", self.swapchain.desc())
            .field("flushed", &self.flushed)
            .finish()
    }
}

/// 引导生命周期状态
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LifecycleState {
    Uninitialized,
    WindowCreated,
    EngineCreated,
    PipelineReady,
    Running,
    ShuttingDown,
    Closed,
}

/// 设备上下文
pub struct DeviceContext<W: WindowSystem> {
    state: LifecycleState,
    backend: Option<BackendType>,
    window: W,
    render: Option<RenderContext>,
}

impl<W: WindowSystem> DeviceContext<W> {
    pub fn new(window: W) -> Self {
        Self {
            state: LifecycleState::Uninitialized,
            backend: None,
            window,
            render: None,
        }
    }

    pub fn state(&self) -> LifecycleState {
        self.state
    }

    pub fn backend(&self) -> Option<BackendType> {
        self.backend
    }

    pub fn window(&self) -> &W {
        &self.window
    }

    pub fn window_mut(&mut self) -> &mut W {
        &mut self.window
    }

    pub fn render_context(&self) -> Option<&RenderContext> {
        self.render.as_ref()
    }

    pub fn render_context_mut(&mut self) -> Option<&mut RenderContext> {
        self.render.as_mut()
    }

    fn expect_state(&self, expected: LifecycleState, action: &str) -> Result<()> {
        if self.state == expected {
            Ok(())
        } else {
            Err(DistError::Lifecycle(format!(
                "cannot {} in state {:?} (expected {:?})",
                action, self.state, expected
            )))
        }
    }

    fn render_mut(&mut self) -> Result<&mut RenderContext> {
        self.render
            .as_mut()
            .ok_or_else(|| DistError::Lifecycle("render context missing".to_string()))
    }

    /// `Uninitialized → WindowCreated`
    pub fn create_window(
        &mut self,
        backend: BackendType,
        family: PlatformFamily,
        config: &WindowConfig,
    ) -> Result<()> {
        self.expect_state(LifecycleState::Uninitialized, "create window")?;

        let api = ClientApi::for_backend(backend, family);
        let title = format!("{} ({})", config.title, backend.name());
        engine_info!("Creating window '{}' with {:?}", title, api);

        if let Err(e) = self
            .window
            .create_window(api, &title, config.width, config.height)
        {
            engine_error!("Window creation failed: {}", e);
            return Err(e);
        }

        self.backend = Some(backend);
        self.state = LifecycleState::WindowCreated;
        Ok(())
    }

    /// `WindowCreated → EngineCreated`
    ///
    /// 描述中的零尺寸取窗口当前客户区尺寸。
    pub fn create_engine(
        &mut self,
        mut factory: Box<dyn GraphicsBackendFactory>,
        mut desc: SwapchainDescriptor,
    ) -> Result<()> {
        self.expect_state(LifecycleState::WindowCreated, "create engine")?;

        let init_failed = |reason: String| -> DistError {
            engine_error!("Engine initialization failed: {}", reason);
            BootstrapError::EngineInitFailed(reason).into()
        };

        if Some(factory.backend_type()) != self.backend {
            return Err(init_failed(format!(
                "factory serves {} but the window was created for {:?}",
                factory.backend_type(),
                self.backend
            )));
        }

        let native = self
            .window
            .native_window()
            .ok_or_else(|| init_failed("window has no native handle".to_string()))?;

        let (width, height) = self.window.client_size();
        if desc.width == 0 {
            desc.width = width;
        }
        if desc.height == 0 {
            desc.height = height;
        }

        let (device, context) = factory.create_device_and_contexts(&native);
        let swapchain = if device.is_some() && context.is_some() {
            factory.create_swapchain(&native, &desc)
        } else {
            None
        };

        let render = match (device, context, swapchain) {
            (Some(device), Some(context), Some(swapchain)) => {
                RenderContext::new(factory, device, context, swapchain)
            }
            (device, context, swapchain) => {
                let missing: Vec<&str> = [
                    ("device", device.is_none()),
                    ("immediate context", context.is_none()),
                    ("swapchain", swapchain.is_none()),
                ]
                .iter()
                .filter(|(_, absent)| *absent)
                .map(|(name, _)| *name)
                .collect();
                return Err(init_failed(format!("missing {}", missing.join(", "))));
            }
        };

        engine_info!(
            "Engine created on {} ({}), swapchain {:?}",
            render.backend(),
            render.device().info().adapter_name,
            render.swapchain().desc()
        );
        self.render = Some(render);
        self.state = LifecycleState::EngineCreated;
        Ok(())
    }

    /// `EngineCreated → PipelineReady`
    pub fn build_pipeline(&mut self, scene: &mut dyn Scene) -> Result<()> {
        self.expect_state(LifecycleState::EngineCreated, "build pipeline")?;

        let render = self.render_mut()?;
        scene.build(render)?;

        self.state = LifecycleState::PipelineReady;
        Ok(())
    }

    /// `PipelineReady → Running → ShuttingDown`
    ///
    /// 运行帧循环直到窗口报告关闭。帧内错误直接返回，状态停留在 `Running`。
    pub fn run(&mut self, orchestrator: &mut FrameOrchestrator, scene: &mut dyn Scene) -> Result<()> {
        self.expect_state(LifecycleState::PipelineReady, "run")?;
        self.state = LifecycleState::Running;
        engine_info!("Entering frame loop");

        let render = self
            .render
            .as_mut()
            .ok_or_else(|| DistError::Lifecycle("render context missing".to_string()))?;
        orchestrator.run(&mut self.window, render, scene)?;

        engine_info!(
            "Close requested after {} frames",
            orchestrator.frame().frame_index
        );
        self.state = LifecycleState::ShuttingDown;
        Ok(())
    }

    /// `ShuttingDown → Closed`：先刷新立即上下文，再释放 GPU 对象
    pub fn shutdown(&mut self) -> Result<()> {
        self.expect_state(LifecycleState::ShuttingDown, "shut down")?;

        self.render_mut()?.flush()?;
        self.render = None;

        engine_info!("Render context released");
        self.state = LifecycleState::Closed;
        Ok(())
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::core::config::SceneConfig;
    use crate::gfx::desc::SurfaceTransform;
    use crate::gfx::headless::{Command, HeadlessFactory, HeadlessRecorder};
    use crate::platform::HeadlessWindow;
    use crate::renderer::scene::EmptyScene;

    /// 直接构造一个 headless 渲染上下文
    pub(crate) fn headless_render_context(
        backend: BackendType,
        width: u32,
        height: u32,
        pre_transform: SurfaceTransform,
    ) -> (RenderContext, HeadlessRecorder) {
        let mut factory = HeadlessFactory::new(backend);
        let recorder = factory.recorder();
        let native = crate::platform::NativeWindow::headless();

        let (device, context) = factory.create_device_and_contexts(&native);
        let desc = SwapchainDescriptor {
            width,
            height,
            pre_transform,
            ..Default::default()
        };
        let swapchain = factory.create_swapchain(&native, &desc).unwrap();

        (
            RenderContext::new(Box::new(factory), device.unwrap(), context.unwrap(), swapchain),
            recorder,
        )
    }

    fn window_created(backend: BackendType) -> DeviceContext<HeadlessWindow> {
        let mut ctx = DeviceContext::new(HeadlessWindow::new(800, 600));
        ctx.create_window(backend, PlatformFamily::UnixLike, &WindowConfig::default())
            .unwrap();
        ctx
    }

    #[test]
    fn test_window_title_and_gl_hint() {
        let ctx = window_created(BackendType::OpenGL);

        assert_eq!(ctx.state(), LifecycleState::WindowCreated);
        assert_eq!(ctx.window().title(), Some("DistBootstrap (OPENGL)"));
        assert_eq!(
            ctx.window().requested_api(),
            Some(ClientApi::OpenGl { major: 4, minor: 2 })
        );
    }

    #[test]
    fn test_window_creation_failure() {
        let mut ctx = DeviceContext::new(HeadlessWindow::new(800, 600).failing());
        let err = ctx
            .create_window(BackendType::Vulkan, PlatformFamily::UnixLike, &WindowConfig::default())
            .unwrap_err();

        assert!(matches!(
            err,
            DistError::Bootstrap(BootstrapError::WindowCreationFailed(_))
        ));
        assert_eq!(ctx.state(), LifecycleState::Uninitialized);
    }

    #[test]
    fn test_engine_uses_window_size() {
        let mut ctx = window_created(BackendType::Vulkan);
        ctx.create_engine(
            Box::new(HeadlessFactory::new(BackendType::Vulkan)),
            SwapchainDescriptor::default(),
        )
        .unwrap();

        assert_eq!(ctx.state(), LifecycleState::EngineCreated);
        let desc = ctx.render_context().unwrap().swapchain().desc().clone();
        assert_eq!((desc.width, desc.height), (1280, 720));
        assert_eq!(desc.pre_transform, SurfaceTransform::Identity);
    }

    #[test]
    fn test_missing_swapchain_fails_engine_init() {
        let mut ctx = window_created(BackendType::Vulkan);
        let err = ctx
            .create_engine(
                Box::new(HeadlessFactory::new(BackendType::Vulkan).without_swapchain()),
                SwapchainDescriptor::default(),
            )
            .unwrap_err();

        assert!(matches!(
            err,
            DistError::Bootstrap(BootstrapError::EngineInitFailed(ref reason)) if reason.contains("swapchain")
        ));
        assert_eq!(ctx.state(), LifecycleState::WindowCreated);
        assert!(ctx.render_context().is_none());
    }

    #[test]
    fn test_missing_device_fails_engine_init() {
        let mut ctx = window_created(BackendType::Vulkan);
        let result = ctx.create_engine(
            Box::new(HeadlessFactory::new(BackendType::Vulkan).without_device()),
            SwapchainDescriptor::default(),
        );

        assert!(matches!(
            result,
            Err(DistError::Bootstrap(BootstrapError::EngineInitFailed(_)))
        ));
    }

    #[test]
    fn test_invalid_transitions_rejected() {
        let mut ctx = DeviceContext::new(HeadlessWindow::new(800, 600));
        let mut scene = EmptyScene;

        assert!(matches!(
            ctx.create_engine(
                Box::new(HeadlessFactory::new(BackendType::Vulkan)),
                SwapchainDescriptor::default()
            ),
            Err(DistError::Lifecycle(_))
        ));
        assert!(matches!(ctx.build_pipeline(&mut scene), Err(DistError::Lifecycle(_))));
        assert!(matches!(ctx.shutdown(), Err(DistError::Lifecycle(_))));
        assert_eq!(ctx.state(), LifecycleState::Uninitialized);

        ctx.create_window(BackendType::Vulkan, PlatformFamily::UnixLike, &WindowConfig::default())
            .unwrap();
        assert!(matches!(
            ctx.create_window(BackendType::Vulkan, PlatformFamily::UnixLike, &WindowConfig::default()),
            Err(DistError::Lifecycle(_))
        ));
        assert_eq!(ctx.state(), LifecycleState::WindowCreated);
    }

    fn is_resize(command: &Command) -> bool {
        matches!(command, Command::Resize { .. })
    }

    #[test]
    fn test_resize_before_swapchain_waits_for_frame_loop() {
        let factory = HeadlessFactory::new(BackendType::Vulkan);
        let recorder = factory.recorder();

        let mut ctx = DeviceContext::new(HeadlessWindow::new(800, 600).close_after(1));
        ctx.create_window(BackendType::Vulkan, PlatformFamily::UnixLike, &WindowConfig::default())
            .unwrap();
        ctx.window_mut().push_resize(1024, 768);
        ctx.create_engine(Box::new(factory), SwapchainDescriptor::default())
            .unwrap();

        let desc = ctx.render_context().unwrap().swapchain().desc();
        assert_eq!((desc.width, desc.height), (1280, 720));
        assert!(!recorder.commands().iter().any(is_resize));

        let mut scene = EmptyScene;
        ctx.build_pipeline(&mut scene).unwrap();
        let mut orchestrator = FrameOrchestrator::new(&SceneConfig::default());
        ctx.run(&mut orchestrator, &mut scene).unwrap();

        let desc = ctx.render_context().unwrap().swapchain().desc();
        assert_eq!((desc.width, desc.height), (1024, 768));
        let commands = recorder.commands();
        assert_eq!(commands.iter().filter(|c| is_resize(c)).count(), 1);
        let resize = commands.iter().position(is_resize).unwrap();
        let present = commands.iter().position(|c| *c == Command::Present).unwrap();
        assert!(resize < present);
    }

    #[test]
    fn test_run_resizes_swapchain_in_place() {
        let factory = HeadlessFactory::new(BackendType::Vulkan);
        let recorder = factory.recorder();

        let mut ctx = DeviceContext::new(HeadlessWindow::new(800, 600).close_after(3));
        ctx.create_window(BackendType::Vulkan, PlatformFamily::UnixLike, &WindowConfig::default())
            .unwrap();
        ctx.create_engine(Box::new(factory), SwapchainDescriptor::default())
            .unwrap();

        let mut scene = EmptyScene;
        ctx.build_pipeline(&mut scene).unwrap();
        ctx.window_mut().push_events(Vec::new());
        ctx.window_mut().push_resize(640, 360);
        let mut orchestrator = FrameOrchestrator::new(&SceneConfig::default());
        ctx.run(&mut orchestrator, &mut scene).unwrap();

        let render = ctx.render_context().unwrap();
        let desc = render.swapchain().desc();
        assert_eq!((desc.width, desc.height), (640, 360));
        assert_eq!(render.backend(), BackendType::Vulkan);
        assert_eq!(ctx.window().client_size(), (640, 360));

        let commands = recorder.commands();
        let presents_before_resize = commands
            .iter()
            .take_while(|c| !is_resize(c))
            .filter(|c| **c == Command::Present)
            .count();
        assert_eq!(presents_before_resize, 1);
        assert_eq!(recorder.present_count(), 3);
        assert_eq!(ctx.state(), LifecycleState::ShuttingDown);
    }

    #[test]
    fn test_shutdown_flushes_before_release() {
        let factory = HeadlessFactory::new(BackendType::Vulkan);
        let recorder = factory.recorder();

        let mut ctx = DeviceContext::new(HeadlessWindow::new(800, 600).close_after(2));
        ctx.create_window(BackendType::Vulkan, PlatformFamily::UnixLike, &WindowConfig::default())
            .unwrap();
        ctx.create_engine(Box::new(factory), SwapchainDescriptor::default())
            .unwrap();

        let mut scene = EmptyScene;
        ctx.build_pipeline(&mut scene).unwrap();
        let mut orchestrator = FrameOrchestrator::new(&SceneConfig::default());
        ctx.run(&mut orchestrator, &mut scene).unwrap();
        assert_eq!(ctx.state(), LifecycleState::ShuttingDown);

        ctx.shutdown().unwrap();
        assert_eq!(ctx.state(), LifecycleState::Closed);
        assert!(ctx.render_context().is_none());
        assert_eq!(recorder.commands().last(), Some(&Command::Flush));
        assert_eq!(recorder.flush_count(), 1);
        assert_eq!(recorder.present_count(), 2);
    }

    #[test]
    fn test_drop_flushes_when_not_shut_down() {
        let (render, recorder) =
            headless_render_context(BackendType::Vulkan, 64, 64, SurfaceTransform::Identity);
        drop(render);
        assert_eq!(recorder.flush_count(), 1);
    }
}
