//! 演示场景
//!
//! 每个场景在引导阶段通过 [`PipelineBuilder`] 构建一次，
//! 之后每帧由 [`FrameOrchestrator`](super::frame::FrameOrchestrator) 调用
//! `update` 计算世界-观察-投影矩阵，再调用 `draw` 录制绘制命令。

use bytemuck::{Pod, Zeroable};
use tracing::info;

use super::context::RenderContext;
use super::frame::FrameState;
use super::pipeline::{PipelineBuilder, PipelineRecipe, PipelineResources, StaticGeometry, UniformSlot};
use super::projection::{adjusted_projection_matrix, surface_pretransform_matrix};
use super::shaders::{self, CONSTANTS, CUBE_WGSL, TRIANGLE_WGSL};
use super::vertex::{Vertex, CUBE_INDICES, CUBE_VERTICES, TRIANGLE_VERTICES};
use crate::core::config::{SceneConfig, SceneKind};
use crate::core::error::{DistError, Result};
use crate::core::math::{constants::PI, deg_to_rad, matrix, Matrix4, Vector3};
use crate::gfx::desc::{CullMode, MapMode, PrimitiveTopology, ShaderStage};
use crate::gfx::device::ScopedWrite;

/// 顶点常量：转置后的 WVP 矩阵
type VsConstants = [[f32; 4]; 4];

/// 像素常量
#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, Pod, Zeroable)]
pub struct PixelConstants {
    pub tint: [f32; 4],
    /// x 分量为混合权重
    pub weights: [f32; 4],
}

impl PixelConstants {
    pub const CUBE: PixelConstants = PixelConstants {
        tint: [1.0, 0.0, 0.0, 0.0],
        weights: [0.343, 0.0, 0.45, 0.0],
    };
}

/// 场景接口
pub trait Scene {
    /// 构建管线和静态资源
    fn build(&mut self, render: &RenderContext) -> Result<()>;

    /// 返回本帧的世界-观察-投影矩阵
    fn update(&mut self, frame: &FrameState, render: &RenderContext) -> Result<Matrix4>;

    /// 录制本帧的绘制命令；渲染目标已绑定并清空
    fn draw(&mut self, frame: &FrameState, render: &mut RenderContext) -> Result<()>;
}

/// 透视相机参数
#[derive(Debug, Clone, Copy)]
struct Camera {
    fov: f32,
    near: f32,
    far: f32,
    view_axis: Vector3,
    view: Matrix4,
}

impl Camera {
    fn new(config: &SceneConfig, distance: f32) -> Self {
        Self {
            fov: deg_to_rad(config.fov),
            near: config.near_clip,
            far: config.far_clip,
            view_axis: Vector3::new(0.0, 0.0, 1.0),
            view: matrix::translation(0.0, 0.0, distance),
        }
    }

    /// `model × view × pretransform × projection`
    fn world_view_proj(&self, model: &Matrix4, render: &RenderContext) -> Result<Matrix4> {
        let desc = render.swapchain().desc();
        let pretransform = surface_pretransform_matrix(&self.view_axis, desc.pre_transform)?;
        let proj = adjusted_projection_matrix(
            self.fov,
            self.near,
            self.far,
            desc.pre_transform,
            desc.aspect_ratio(),
            render.device().info().depth_range,
        );
        Ok(model * self.view * pretransform * proj)
    }
}

fn built<'a>(resources: &'a Option<PipelineResources>, scene: &str) -> Result<&'a PipelineResources> {
    resources
        .as_ref()
        .ok_or_else(|| DistError::Lifecycle(format!("{} scene drawn before build", scene)))
}

/// 只清屏和呈现
#[derive(Debug, Default, Clone, Copy)]
pub struct EmptyScene;

impl Scene for EmptyScene {
    fn build(&mut self, _render: &RenderContext) -> Result<()> {
        Ok(())
    }

    fn update(&mut self, _frame: &FrameState, _render: &RenderContext) -> Result<Matrix4> {
        Ok(Matrix4::identity())
    }

    fn draw(&mut self, _frame: &FrameState, _render: &mut RenderContext) -> Result<()> {
        Ok(())
    }
}

/// 绕 z 轴旋转的彩色三角形
pub struct TriangleScene {
    camera: Camera,
    resources: Option<PipelineResources>,
}

impl TriangleScene {
    pub fn new(config: &SceneConfig) -> Self {
        Self {
            camera: Camera::new(config, 2.0),
            resources: None,
        }
    }

    fn recipe() -> Result<PipelineRecipe> {
        Ok(PipelineRecipe {
            name: "Triangle PSO".to_string(),
            vertex_shader: shaders::vertex_shader("Triangle VS", TRIANGLE_WGSL),
            pixel_shader: shaders::pixel_shader("Triangle PS", TRIANGLE_WGSL),
            layout: Vertex::LAYOUT.to_vec(),
            topology: PrimitiveTopology::TriangleList,
            cull_mode: CullMode::None,
            depth_enable: true,
            geometry: StaticGeometry::new(&TRIANGLE_VERTICES, None)?,
            uniforms: vec![UniformSlot {
                stage: ShaderStage::Vertex,
                name: CONSTANTS.to_string(),
                binding: 0,
                size: std::mem::size_of::<VsConstants>() as u64,
            }],
        })
    }
}

impl Scene for TriangleScene {
    fn build(&mut self, render: &RenderContext) -> Result<()> {
        self.resources = Some(PipelineBuilder::new(Self::recipe()?).build(render)?);
        info!("Triangle scene ready");
        Ok(())
    }

    fn update(&mut self, frame: &FrameState, render: &RenderContext) -> Result<Matrix4> {
        self.camera
            .world_view_proj(&matrix::rotation_z(frame.counter), render)
    }

    fn draw(&mut self, frame: &FrameState, render: &mut RenderContext) -> Result<()> {
        let res = built(&self.resources, "triangle")?;
        let ctx = render.context_mut();

        {
            let mut constants =
                ScopedWrite::<VsConstants>::new(&mut *ctx, res.uniform_buffers[0], MapMode::WriteDiscard)?;
            *constants = frame.world_view_proj.transpose().into();
        }

        ctx.set_vertex_buffers(0, &[res.vertex_buffer])?;
        ctx.set_pipeline_state(res.pipeline)?;
        ctx.commit_shader_resources(res.binding)?;
        ctx.draw(&res.draw)
    }
}

/// 旋转的立方体（索引绘制，顶点 + 像素常量）
pub struct CubeScene {
    camera: Camera,
    tilt: Matrix4,
    resources: Option<PipelineResources>,
}

impl CubeScene {
    pub fn new(config: &SceneConfig) -> Self {
        Self {
            camera: Camera::new(config, 5.0),
            tilt: matrix::rotation_x(-PI * 0.1),
            resources: None,
        }
    }

    fn recipe() -> Result<PipelineRecipe> {
        Ok(PipelineRecipe {
            name: "Cube PSO".to_string(),
            vertex_shader: shaders::vertex_shader("Cube VS", CUBE_WGSL),
            pixel_shader: shaders::pixel_shader("Cube PS", CUBE_WGSL),
            layout: Vertex::LAYOUT.to_vec(),
            topology: PrimitiveTopology::TriangleList,
            cull_mode: CullMode::Back,
            depth_enable: true,
            geometry: StaticGeometry::new(&CUBE_VERTICES, Some(&CUBE_INDICES))?,
            uniforms: vec![
                UniformSlot {
                    stage: ShaderStage::Vertex,
                    name: CONSTANTS.to_string(),
                    binding: 0,
                    size: std::mem::size_of::<VsConstants>() as u64,
                },
                UniformSlot {
                    stage: ShaderStage::Pixel,
                    name: CONSTANTS.to_string(),
                    binding: 1,
                    size: std::mem::size_of::<PixelConstants>() as u64,
                },
            ],
        })
    }
}

impl Scene for CubeScene {
    fn build(&mut self, render: &RenderContext) -> Result<()> {
        self.resources = Some(PipelineBuilder::new(Self::recipe()?).build(render)?);
        info!("Cube scene ready");
        Ok(())
    }

    fn update(&mut self, frame: &FrameState, render: &RenderContext) -> Result<Matrix4> {
        let model = matrix::rotation_y(frame.counter) * self.tilt;
        self.camera.world_view_proj(&model, render)
    }

    fn draw(&mut self, frame: &FrameState, render: &mut RenderContext) -> Result<()> {
        let res = built(&self.resources, "cube")?;
        let ctx = render.context_mut();

        {
            let mut constants =
                ScopedWrite::<VsConstants>::new(&mut *ctx, res.uniform_buffers[0], MapMode::WriteDiscard)?;
            *constants = frame.world_view_proj.transpose().into();
        }
        {
            let mut constants =
                ScopedWrite::<PixelConstants>::new(&mut *ctx, res.uniform_buffers[1], MapMode::WriteDiscard)?;
            *constants = PixelConstants::CUBE;
        }

        ctx.set_vertex_buffers(0, &[res.vertex_buffer])?;
        if let Some(index_buffer) = res.index_buffer {
            ctx.set_index_buffer(index_buffer)?;
        }
        ctx.set_pipeline_state(res.pipeline)?;
        ctx.commit_shader_resources(res.binding)?;
        ctx.draw(&res.draw)
    }
}

/// 按配置选择的演示场景
pub enum DemoScene {
    Empty(EmptyScene),
    Triangle(TriangleScene),
    Cube(CubeScene),
}

impl DemoScene {
    pub fn from_config(config: &SceneConfig) -> Self {
        match config.kind {
            SceneKind::Empty => DemoScene::Empty(EmptyScene),
            SceneKind::Triangle => DemoScene::Triangle(TriangleScene::new(config)),
            SceneKind::Cube => DemoScene::Cube(CubeScene::new(config)),
        }
    }

    fn inner(&mut self) -> &mut dyn Scene {
        match self {
            DemoScene::Empty(scene) => scene,
            DemoScene::Triangle(scene) => scene,
            DemoScene::Cube(scene) => scene,
        }
    }
}

impl Scene for DemoScene {
    fn build(&mut self, render: &RenderContext) -> Result<()> {
        self.inner().build(render)
    }

    fn update(&mut self, frame: &FrameState, render: &RenderContext) -> Result<Matrix4> {
        self.inner().update(frame, render)
    }

    fn draw(&mut self, frame: &FrameState, render: &mut RenderContext) -> Result<()> {
        self.inner().draw(frame, render)
    }
}
