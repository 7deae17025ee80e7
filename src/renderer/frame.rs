//! 帧循环
//!
//! 每次迭代：
//!
//! ```text
//! 泵送事件（同步处理尺寸变化）→ 检查关闭标志 → 计算 dt → 推进动画
//!   → 计算 WVP → 绑定并清空渲染目标 → 场景绘制 → 呈现
//! ```
//!
//! 客户区为零尺寸（窗口最小化）时仍推进动画，但跳过绘制和呈现。

use std::time::{Duration, Instant};
use tracing::{debug, trace};

use super::context::RenderContext;
use super::scene::Scene;
use crate::core::config::SceneConfig;
use crate::core::error::{DistError, Result};
use crate::core::math::Matrix4;
use crate::platform::{WindowEvent, WindowSystem};

/// 帧状态，每次迭代只修改一次
#[derive(Debug, Clone)]
pub struct FrameState {
    pub last_update: Instant,
    /// 上一帧的时间间隔
    pub dt: Duration,
    /// 动画计数器（弧度）
    pub counter: f32,
    pub world_view_proj: Matrix4,
    /// 已呈现的帧数
    pub frame_index: u64,
}

impl Default for FrameState {
    fn default() -> Self {
        Self {
            last_update: Instant::now(),
            dt: Duration::ZERO,
            counter: 0.0,
            world_view_proj: Matrix4::identity(),
            frame_index: 0,
        }
    }
}

/// 单次迭代的结果
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FrameStatus {
    Continue,
    Closed,
}

/// 帧循环调度器
pub struct FrameOrchestrator {
    frame: FrameState,
    clear_color: [f32; 4],
    rotation_speed: f32,
}

impl FrameOrchestrator {
    pub fn new(config: &SceneConfig) -> Self {
        Self {
            frame: FrameState::default(),
            clear_color: config.clear_color,
            rotation_speed: config.rotation_speed,
        }
    }

    pub fn frame(&self) -> &FrameState {
        &self.frame
    }

    /// 运行直到窗口报告关闭
    pub fn run(
        &mut self,
        window: &mut dyn WindowSystem,
        render: &mut RenderContext,
        scene: &mut dyn Scene,
    ) -> Result<()> {
        self.frame.last_update = Instant::now();
        while self.tick(window, render, scene)? == FrameStatus::Continue {}
        Ok(())
    }

    /// 执行一次迭代
    pub fn tick(
        &mut self,
        window: &mut dyn WindowSystem,
        render: &mut RenderContext,
        scene: &mut dyn Scene,
    ) -> Result<FrameStatus> {
        pump_window_events(window, render)?;

        if window.should_close() {
            return Ok(FrameStatus::Closed);
        }

        let now = Instant::now();
        self.frame.dt = now.duration_since(self.frame.last_update);
        self.frame.last_update = now;
        self.frame.counter += self.rotation_speed * self.frame.dt.as_secs_f32();

        self.frame.world_view_proj = scene.update(&self.frame, render)?;

        if render.swapchain().desc().is_zero_sized() {
            trace!("Zero-sized swapchain, frame skipped");
            return Ok(FrameStatus::Continue);
        }

        let back_buffer = render.swapchain_mut().current_back_buffer()?;
        let depth_buffer = render.swapchain().depth_buffer();

        let context = render.context_mut();
        context.set_render_targets(back_buffer, depth_buffer)?;
        context.clear_render_target(back_buffer, self.clear_color)?;
        if let Some(depth) = depth_buffer {
            context.clear_depth(depth, 1.0)?;
        }

        scene.draw(&self.frame, render)?;
        render.swapchain_mut().present()?;

        self.frame.frame_index += 1;
        if self.frame.frame_index % 600 == 0 {
            debug!(
                "Frame {} (dt {:.3} ms)",
                self.frame.frame_index,
                self.frame.dt.as_secs_f64() * 1000.0
            );
        }
        Ok(FrameStatus::Continue)
    }
}

/// 泵送窗口事件；尺寸变化在同一线程上原地调整交换链
///
/// 帧循环只通过这里响应窗口尺寸变化。
fn pump_window_events(window: &mut dyn WindowSystem, render: &mut RenderContext) -> Result<()> {
    let mut resize_error: Option<DistError> = None;
    window.pump_events(&mut |event| {
        if let WindowEvent::Resized { width, height } = event {
            if let Err(e) = render.resize(width, height) {
                resize_error.get_or_insert(e);
            }
        }
    });
    resize_error.map_or(Ok(()), Err)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::gfx::backend::BackendType;
    use crate::gfx::desc::SurfaceTransform;
    use crate::gfx::headless::Command;
    use crate::platform::{ClientApi, HeadlessWindow};
    use crate::renderer::context::tests::headless_render_context;
    use crate::renderer::scene::{CubeScene, EmptyScene, TriangleScene};

    fn window(width: u32, height: u32) -> HeadlessWindow {
        let mut window = HeadlessWindow::new(width, height);
        window
            .create_window(ClientApi::NoApi, "test", width, height)
            .unwrap();
        window
    }

    fn position(commands: &[Command], pred: impl Fn(&Command) -> bool) -> usize {
        commands.iter().position(pred).unwrap()
    }

    #[test]
    fn test_cube_frame_ordering() {
        let (mut render, recorder) =
            headless_render_context(BackendType::Vulkan, 1280, 720, SurfaceTransform::Identity);
        let mut scene = CubeScene::new(&SceneConfig::default());
        scene.build(&render).unwrap();
        recorder.take_commands();

        let mut window = window(1280, 720);
        let mut orchestrator = FrameOrchestrator::new(&SceneConfig::default());
        let status = orchestrator.tick(&mut window, &mut render, &mut scene).unwrap();
        assert_eq!(status, FrameStatus::Continue);

        let commands = recorder.take_commands();
        let clear = position(&commands, |c| matches!(c, Command::ClearRenderTarget { .. }));
        let last_unmap = commands
            .iter()
            .rposition(|c| matches!(c, Command::UnmapBuffer { .. }))
            .unwrap();
        let first_bind = position(&commands, |c| matches!(c, Command::SetVertexBuffers { .. }));
        let commit = position(&commands, |c| matches!(c, Command::CommitShaderResources(_)));
        let draw = position(&commands, |c| matches!(c, Command::Draw(_)));
        let present = position(&commands, |c| *c == Command::Present);

        assert!(clear < last_unmap);
        assert!(last_unmap < first_bind);
        assert!(commit < draw);
        assert!(draw < present);
        assert_eq!(present, commands.len() - 1);

        let clear_color = SceneConfig::default().clear_color;
        assert!(commands.contains(&Command::ClearRenderTarget {
            color: crate::gfx::device::TextureViewId(0),
            rgba: clear_color,
        }));
        assert_eq!(orchestrator.frame().frame_index, 1);
    }

    #[test]
    fn test_vs_constants_follow_current_frame() {
        let (mut render, recorder) =
            headless_render_context(BackendType::Vulkan, 800, 600, SurfaceTransform::Identity);
        let mut scene = CubeScene::new(&SceneConfig::default());
        scene.build(&render).unwrap();

        let mut window = window(800, 600);
        let mut orchestrator = FrameOrchestrator::new(&SceneConfig::default());

        for _ in 0..2 {
            orchestrator.tick(&mut window, &mut render, &mut scene).unwrap();

            let draw = recorder.last_draw().unwrap();
            let expected: [[f32; 4]; 4] = orchestrator.frame().world_view_proj.transpose().into();
            assert_eq!(draw.constants[0].1, bytemuck::bytes_of(&expected));
        }
        assert_eq!(recorder.draws().len(), 2);
    }

    #[test]
    fn test_counter_advances_with_dt() {
        let (mut render, _recorder) =
            headless_render_context(BackendType::Vulkan, 800, 600, SurfaceTransform::Identity);
        let mut scene = EmptyScene;
        let mut window = window(800, 600);

        let config = SceneConfig {
            rotation_speed: 2.0,
            ..Default::default()
        };
        let mut orchestrator = FrameOrchestrator::new(&config);
        orchestrator.frame.last_update = Instant::now() - Duration::from_millis(100);
        orchestrator.tick(&mut window, &mut render, &mut scene).unwrap();

        let frame = orchestrator.frame();
        assert!(frame.dt >= Duration::from_millis(100));
        assert!((frame.counter - 2.0 * frame.dt.as_secs_f32()).abs() < 1e-6);
    }

    #[test]
    fn test_resize_applied_before_draw() {
        let (mut render, recorder) =
            headless_render_context(BackendType::Vulkan, 800, 600, SurfaceTransform::Identity);
        let mut scene = TriangleScene::new(&SceneConfig::default());
        scene.build(&render).unwrap();
        recorder.take_commands();

        let mut window = window(800, 600);
        window.push_resize(1024, 768);
        let mut orchestrator = FrameOrchestrator::new(&SceneConfig::default());
        orchestrator.tick(&mut window, &mut render, &mut scene).unwrap();

        let commands = recorder.take_commands();
        assert_eq!(commands[0], Command::Resize { width: 1024, height: 768 });
        assert!(commands.iter().any(|c| matches!(c, Command::Draw(_))));
        assert_eq!(render.swapchain().desc().width, 1024);
    }

    #[test]
    fn test_zero_size_skips_draw_and_present() {
        let (mut render, recorder) =
            headless_render_context(BackendType::Vulkan, 800, 600, SurfaceTransform::Identity);
        let mut scene = CubeScene::new(&SceneConfig::default());
        scene.build(&render).unwrap();
        recorder.take_commands();

        let mut window = window(800, 600);
        window.push_resize(0, 0);
        let mut orchestrator = FrameOrchestrator::new(&SceneConfig::default());
        let status = orchestrator.tick(&mut window, &mut render, &mut scene).unwrap();

        assert_eq!(status, FrameStatus::Continue);
        assert_eq!(recorder.take_commands(), vec![Command::Resize { width: 0, height: 0 }]);
        assert_eq!(recorder.present_count(), 0);
        assert_eq!(orchestrator.frame().frame_index, 0);

        window.push_resize(800, 600);
        orchestrator.tick(&mut window, &mut render, &mut scene).unwrap();
        assert_eq!(recorder.present_count(), 1);
    }

    #[test]
    fn test_close_checked_before_drawing() {
        let (mut render, recorder) =
            headless_render_context(BackendType::Vulkan, 800, 600, SurfaceTransform::Identity);
        let mut scene = EmptyScene;
        let mut window = window(800, 600);
        window.request_close();

        let mut orchestrator = FrameOrchestrator::new(&SceneConfig::default());
        let status = orchestrator.tick(&mut window, &mut render, &mut scene).unwrap();

        assert_eq!(status, FrameStatus::Closed);
        assert!(recorder.commands().is_empty());
    }

    #[test]
    fn test_empty_scene_clears_and_presents() {
        let (mut render, recorder) =
            headless_render_context(BackendType::OpenGL, 320, 240, SurfaceTransform::Identity);
        let mut scene = EmptyScene;
        let mut window = window(320, 240).close_after(3);

        let mut orchestrator = FrameOrchestrator::new(&SceneConfig::default());
        orchestrator.run(&mut window, &mut render, &mut scene).unwrap();

        assert_eq!(recorder.present_count(), 3);
        assert!(recorder.draws().is_empty());
        assert_eq!(orchestrator.frame().frame_index, 3);
    }
}
