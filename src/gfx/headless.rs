//! 记录型 headless 驱动
//!
//! 不访问 GPU，按真实驱动的规则校验每个调用，并把结果保存下来：
//!
//! - 命令日志（[`Command`]），用于检查帧内调用顺序
//! - 每个缓冲区的当前内容
//! - 每次绘制时常量缓冲区的快照（[`DrawRecord`]）
//!
//! 设备、上下文和交换链共享同一份状态，通过 [`HeadlessRecorder`] 读取。

use std::cell::RefCell;
use std::rc::Rc;
use tracing::{debug, error, warn};

use super::backend::BackendType;
use super::desc::{
    layout_stride, BindFlags, BufferDesc, DepthRange, DrawAttribs, MapMode, PipelineStateDesc,
    ShaderDesc, ShaderSource, ShaderStage, StaticBinding, SurfaceTransform, SwapchainDescriptor,
    Usage,
};
use super::device::{
    BufferId, DeviceInfo, ImmediateContext, PipelineId, RenderDevice, ResourceBindingId, ShaderId,
    Swapchain, TextureViewId,
};
use super::factory::{DeviceAndContext, GraphicsBackendFactory};
use crate::core::error::{GraphicsError, Result};
use crate::platform::NativeWindow;

const BACK_BUFFER: TextureViewId = TextureViewId(0);
const DEPTH_BUFFER: TextureViewId = TextureViewId(1);

/// 录制的命令
#[derive(Debug, Clone, PartialEq)]
pub enum Command {
    SetRenderTargets {
        color: TextureViewId,
        depth: Option<TextureViewId>,
    },
    ClearRenderTarget {
        color: TextureViewId,
        rgba: [f32; 4],
    },
    ClearDepth {
        depth: TextureViewId,
        value: f32,
    },
    MapBuffer {
        buffer: BufferId,
        mode: MapMode,
    },
    UnmapBuffer {
        buffer: BufferId,
        bytes: usize,
    },
    SetVertexBuffers {
        start_slot: u32,
        buffers: Vec<BufferId>,
    },
    SetIndexBuffer(BufferId),
    SetPipelineState(PipelineId),
    CommitShaderResources(ResourceBindingId),
    Draw(DrawAttribs),
    Resize {
        width: u32,
        height: u32,
    },
    Present,
    Flush,
}

/// 一次绘制的记录
#[derive(Debug, Clone)]
pub struct DrawRecord {
    pub attribs: DrawAttribs,
    pub pipeline: PipelineId,
    pub binding: ResourceBindingId,
    /// 绘制时绑定的常量缓冲区内容：(变量名, 字节)
    pub constants: Vec<(String, Vec<u8>)>,
}

impl DrawRecord {
    pub fn constant(&self, name: &str) -> Option<&[u8]> {
        self.constants
            .iter()
            .find(|(n, _)| n == name)
            .map(|(_, bytes)| bytes.as_slice())
    }
}

struct HeadlessBuffer {
    desc: BufferDesc,
    data: Vec<u8>,
    mapped: bool,
}

struct HeadlessBinding {
    pipeline: PipelineId,
    buffers: Vec<(String, BufferId)>,
}

#[derive(Default)]
struct BoundState {
    color: Option<TextureViewId>,
    vertex_buffers: Vec<BufferId>,
    index_buffer: Option<BufferId>,
    pipeline: Option<PipelineId>,
    binding: Option<ResourceBindingId>,
}

#[derive(Default)]
struct HeadlessState {
    commands: Vec<Command>,
    buffers: Vec<HeadlessBuffer>,
    shaders: Vec<ShaderDesc>,
    pipelines: Vec<PipelineStateDesc>,
    bindings: Vec<HeadlessBinding>,
    draws: Vec<DrawRecord>,
    bound: BoundState,
    presents: u32,
    flushes: u32,
}

impl HeadlessState {
    fn buffer(&self, id: BufferId) -> Result<&HeadlessBuffer> {
        self.buffers
            .get(id.index())
            .ok_or_else(|| GraphicsError::InvalidHandle(format!("unknown buffer {:?}", id)).into())
    }

    fn buffer_mut(&mut self, id: BufferId) -> Result<&mut HeadlessBuffer> {
        self.buffers
            .get_mut(id.index())
            .ok_or_else(|| GraphicsError::InvalidHandle(format!("unknown buffer {:?}", id)).into())
    }

    fn shader(&self, id: ShaderId) -> Result<&ShaderDesc> {
        self.shaders
            .get(id.index())
            .ok_or_else(|| GraphicsError::InvalidHandle(format!("unknown shader {:?}", id)).into())
    }

    fn pipeline(&self, id: PipelineId) -> Result<&PipelineStateDesc> {
        self.pipelines.get(id.index()).ok_or_else(|| {
            GraphicsError::InvalidHandle(format!("unknown pipeline {:?}", id)).into()
        })
    }

    fn binding(&self, id: ResourceBindingId) -> Result<&HeadlessBinding> {
        self.bindings.get(id.index()).ok_or_else(|| {
            GraphicsError::InvalidHandle(format!("unknown resource binding {:?}", id)).into()
        })
    }
}

type SharedState = Rc<RefCell<HeadlessState>>;

/// headless 驱动状态的只读视图
#[derive(Clone)]
pub struct HeadlessRecorder(SharedState);

impl HeadlessRecorder {
    pub fn commands(&self) -> Vec<Command> {
        self.0.borrow().commands.clone()
    }

    /// 取出并清空命令日志
    pub fn take_commands(&self) -> Vec<Command> {
        std::mem::take(&mut self.0.borrow_mut().commands)
    }

    pub fn draws(&self) -> Vec<DrawRecord> {
        self.0.borrow().draws.clone()
    }

    pub fn last_draw(&self) -> Option<DrawRecord> {
        self.0.borrow().draws.last().cloned()
    }

    pub fn buffer_contents(&self, buffer: BufferId) -> Option<Vec<u8>> {
        self.0
            .borrow()
            .buffers
            .get(buffer.index())
            .map(|b| b.data.clone())
    }

    pub fn buffer_count(&self) -> usize {
        self.0.borrow().buffers.len()
    }

    pub fn present_count(&self) -> u32 {
        self.0.borrow().presents
    }

    pub fn flush_count(&self) -> u32 {
        self.0.borrow().flushes
    }
}

/// headless 后端工厂
pub struct HeadlessFactory {
    backend: BackendType,
    state: SharedState,
    fail_device: bool,
    fail_swapchain: bool,
}

impl HeadlessFactory {
    pub fn new(backend: BackendType) -> Self {
        Self {
            backend,
            state: SharedState::default(),
            fail_device: false,
            fail_swapchain: false,
        }
    }

    /// 设备创建失败
    pub fn without_device(mut self) -> Self {
        self.fail_device = true;
        self
    }

    /// 交换链创建失败
    pub fn without_swapchain(mut self) -> Self {
        self.fail_swapchain = true;
        self
    }

    pub fn recorder(&self) -> HeadlessRecorder {
        HeadlessRecorder(self.state.clone())
    }
}

impl GraphicsBackendFactory for HeadlessFactory {
    fn backend_type(&self) -> BackendType {
        self.backend
    }

    fn create_device_and_contexts(&mut self, window: &NativeWindow) -> DeviceAndContext {
        if self.fail_device {
            error!("Headless device creation disabled for {}", self.backend);
            return (None, None);
        }

        debug!("Creating headless device for {:?}", window.platform());
        let info = DeviceInfo {
            backend: self.backend,
            depth_range: DepthRange::native_for(self.backend),
            adapter_name: format!("Headless {}", self.backend),
        };

        let device = HeadlessDevice {
            info,
            state: self.state.clone(),
        };
        let context = HeadlessContext {
            state: self.state.clone(),
        };
        (Some(Box::new(device)), Some(Box::new(context)))
    }

    fn create_swapchain(
        &mut self,
        _window: &NativeWindow,
        desc: &SwapchainDescriptor,
    ) -> Option<Box<dyn Swapchain>> {
        if self.fail_swapchain {
            error!("Headless swapchain creation disabled for {}", self.backend);
            return None;
        }

        let mut desc = desc.clone();
        if desc.pre_transform == SurfaceTransform::Optimal {
            desc.pre_transform = SurfaceTransform::Identity;
        }

        debug!(
            "Headless swapchain {}x{} ({:?})",
            desc.width, desc.height, desc.pre_transform
        );
        Some(Box::new(HeadlessSwapchain {
            desc,
            state: self.state.clone(),
        }))
    }
}

/// 下一个句柄编号；超出 `u32` 范围时报告资源创建失败
fn next_handle(len: usize, kind: &str) -> Result<u32> {
    u32::try_from(len).map_err(|_| {
        GraphicsError::ResourceCreation(format!("{} handle space exhausted at {}", kind, len)).into()
    })
}

struct HeadlessDevice {
    info: DeviceInfo,
    state: SharedState,
}

impl RenderDevice for HeadlessDevice {
    fn info(&self) -> &DeviceInfo {
        &self.info
    }

    fn create_buffer(&self, desc: &BufferDesc, initial_data: Option<&[u8]>) -> Result<BufferId> {
        desc.validate(initial_data)
            .map_err(GraphicsError::ResourceCreation)?;

        let data = match initial_data {
            Some(data) => data.to_vec(),
            None => vec![0; desc.size as usize],
        };

        let mut state = self.state.borrow_mut();
        let id = BufferId(next_handle(state.buffers.len(), "buffer")?);
        state.buffers.push(HeadlessBuffer {
            desc: desc.clone(),
            data,
            mapped: false,
        });
        debug!("Created buffer '{}' ({} bytes) as {:?}", desc.name, desc.size, id);
        Ok(id)
    }

    fn create_shader(&self, desc: &ShaderDesc) -> Result<ShaderId> {
        let ShaderSource::Wgsl(source) = desc.source;
        if !source.contains(&format!("fn {}", desc.entry_point)) {
            return Err(GraphicsError::ShaderCreation(format!(
                "shader '{}' has no entry point '{}'",
                desc.name, desc.entry_point
            ))
            .into());
        }

        let mut state = self.state.borrow_mut();
        let id = ShaderId(next_handle(state.shaders.len(), "shader")?);
        state.shaders.push(desc.clone());
        Ok(id)
    }

    fn create_pipeline_state(&self, desc: &PipelineStateDesc) -> Result<PipelineId> {
        let mut state = self.state.borrow_mut();

        if state.shader(desc.vertex_shader)?.stage != ShaderStage::Vertex {
            return Err(GraphicsError::ResourceCreation(format!(
                "pipeline '{}': vertex slot holds a non-vertex shader",
                desc.name
            ))
            .into());
        }
        if state.shader(desc.pixel_shader)?.stage != ShaderStage::Pixel {
            return Err(GraphicsError::ResourceCreation(format!(
                "pipeline '{}': pixel slot holds a non-pixel shader",
                desc.name
            ))
            .into());
        }
        if desc.render_target_format.is_depth() || !desc.depth_format.is_depth() {
            return Err(GraphicsError::ResourceCreation(format!(
                "pipeline '{}': invalid target formats {:?}/{:?}",
                desc.name, desc.render_target_format, desc.depth_format
            ))
            .into());
        }
        if desc.layout.is_empty() {
            return Err(GraphicsError::ResourceCreation(format!(
                "pipeline '{}' has an empty input layout",
                desc.name
            ))
            .into());
        }

        let id = PipelineId(next_handle(state.pipelines.len(), "pipeline")?);
        state.pipelines.push(desc.clone());
        Ok(id)
    }

    fn create_resource_binding(
        &self,
        pipeline: PipelineId,
        bindings: &[StaticBinding],
    ) -> Result<ResourceBindingId> {
        let mut state = self.state.borrow_mut();
        let variables = state.pipeline(pipeline)?.variables.clone();

        for binding in bindings {
            if !variables
                .iter()
                .any(|v| v.stage == binding.stage && v.name == binding.name)
            {
                return Err(GraphicsError::InvalidHandle(format!(
                    "pipeline {:?} has no {:?} variable '{}'",
                    pipeline, binding.stage, binding.name
                ))
                .into());
            }
            if state.buffer(binding.buffer)?.desc.bind != BindFlags::UniformBuffer {
                return Err(GraphicsError::InvalidHandle(format!(
                    "variable '{}' bound to a non-uniform buffer",
                    binding.name
                ))
                .into());
            }
        }

        let mut buffers = Vec::with_capacity(variables.len());
        for variable in &variables {
            let bound = bindings
                .iter()
                .find(|b| b.stage == variable.stage && b.name == variable.name)
                .ok_or_else(|| {
                    GraphicsError::InvalidHandle(format!(
                        "static variable '{}' left unbound",
                        variable.name
                    ))
                })?;
            buffers.push((variable.name.clone(), bound.buffer));
        }

        let id = ResourceBindingId(next_handle(state.bindings.len(), "binding")?);
        state.bindings.push(HeadlessBinding { pipeline, buffers });
        Ok(id)
    }
}

struct HeadlessContext {
    state: SharedState,
}

impl HeadlessContext {
    fn check_target(view: TextureViewId, expected: TextureViewId) -> Result<()> {
        if view == expected {
            Ok(())
        } else {
            Err(GraphicsError::InvalidHandle(format!("unknown texture view {:?}", view)).into())
        }
    }

    fn validate_draw(state: &HeadlessState, attribs: &DrawAttribs) -> Result<DrawRecord> {
        let fail = |msg: &str| -> Result<DrawRecord> {
            Err(GraphicsError::CommandExecution(msg.to_string()).into())
        };

        if state.bound.color.is_none() {
            return fail("draw without a render target");
        }
        if let Some(buffer) = state.buffers.iter().find(|b| b.mapped) {
            return Err(GraphicsError::CommandExecution(format!(
                "draw while buffer '{}' is mapped",
                buffer.desc.name
            ))
            .into());
        }

        let (Some(pipeline_id), Some(binding_id)) = (state.bound.pipeline, state.bound.binding)
        else {
            return fail("draw without pipeline state or committed resources");
        };
        let pipeline = state.pipeline(pipeline_id)?;
        let binding = state.binding(binding_id)?;
        if binding.pipeline != pipeline_id {
            return fail("committed resources belong to another pipeline");
        }

        let Some(vertex_buffer) = state.bound.vertex_buffers.first() else {
            return fail("draw without vertex buffers");
        };

        match *attribs {
            DrawAttribs::Indexed { index_count, .. } => {
                let Some(index_buffer) = state.bound.index_buffer else {
                    return fail("indexed draw without an index buffer");
                };
                let available = state.buffer(index_buffer)?.desc.size / 4;
                if u64::from(index_count) > available {
                    return Err(GraphicsError::CommandExecution(format!(
                        "index count {} exceeds buffer capacity {}",
                        index_count, available
                    ))
                    .into());
                }
            }
            DrawAttribs::NonIndexed { vertex_count } => {
                let stride = u64::from(layout_stride(&pipeline.layout, 0));
                let size = state.buffer(*vertex_buffer)?.desc.size;
                if stride == 0 || u64::from(vertex_count) * stride > size {
                    return Err(GraphicsError::CommandExecution(format!(
                        "vertex count {} exceeds buffer capacity",
                        vertex_count
                    ))
                    .into());
                }
            }
        }

        let constants = binding
            .buffers
            .iter()
            .map(|(name, id)| Ok((name.clone(), state.buffer(*id)?.data.clone())))
            .collect::<Result<Vec<_>>>()?;

        Ok(DrawRecord {
            attribs: *attribs,
            pipeline: pipeline_id,
            binding: binding_id,
            constants,
        })
    }
}

impl ImmediateContext for HeadlessContext {
    fn set_render_targets(
        &mut self,
        color: TextureViewId,
        depth: Option<TextureViewId>,
    ) -> Result<()> {
        Self::check_target(color, BACK_BUFFER)?;
        if let Some(depth) = depth {
            Self::check_target(depth, DEPTH_BUFFER)?;
        }

        let mut state = self.state.borrow_mut();
        state.bound.color = Some(color);
        state.commands.push(Command::SetRenderTargets { color, depth });
        Ok(())
    }

    fn clear_render_target(&mut self, color: TextureViewId, rgba: [f32; 4]) -> Result<()> {
        Self::check_target(color, BACK_BUFFER)?;
        self.state
            .borrow_mut()
            .commands
            .push(Command::ClearRenderTarget { color, rgba });
        Ok(())
    }

    fn clear_depth(&mut self, depth: TextureViewId, value: f32) -> Result<()> {
        Self::check_target(depth, DEPTH_BUFFER)?;
        self.state
            .borrow_mut()
            .commands
            .push(Command::ClearDepth { depth, value });
        Ok(())
    }

    fn map_buffer(&mut self, buffer: BufferId, mode: MapMode) -> Result<u64> {
        let mut state = self.state.borrow_mut();
        let entry = state.buffer_mut(buffer)?;

        if entry.desc.usage != Usage::Dynamic {
            return Err(GraphicsError::Map(format!(
                "buffer '{}' is immutable",
                entry.desc.name
            ))
            .into());
        }
        if entry.mapped {
            return Err(GraphicsError::Map(format!(
                "buffer '{}' is already mapped",
                entry.desc.name
            ))
            .into());
        }

        entry.mapped = true;
        let size = entry.desc.size;
        state.commands.push(Command::MapBuffer { buffer, mode });
        Ok(size)
    }

    fn unmap_buffer(&mut self, buffer: BufferId, data: &[u8]) {
        let mut state = self.state.borrow_mut();
        let Ok(entry) = state.buffer_mut(buffer) else {
            warn!("Unmap of unknown buffer {:?}", buffer);
            return;
        };
        if !entry.mapped {
            warn!("Unmap of buffer '{}' that is not mapped", entry.desc.name);
            return;
        }

        let len = data.len().min(entry.data.len());
        entry.data[..len].copy_from_slice(&data[..len]);
        entry.mapped = false;
        state.commands.push(Command::UnmapBuffer { buffer, bytes: len });
    }

    fn set_vertex_buffers(&mut self, start_slot: u32, buffers: &[BufferId]) -> Result<()> {
        let mut state = self.state.borrow_mut();
        for id in buffers {
            if state.buffer(*id)?.desc.bind != BindFlags::VertexBuffer {
                return Err(GraphicsError::InvalidHandle(format!(
                    "{:?} is not a vertex buffer",
                    id
                ))
                .into());
            }
        }

        state.bound.vertex_buffers = buffers.to_vec();
        state.commands.push(Command::SetVertexBuffers {
            start_slot,
            buffers: buffers.to_vec(),
        });
        Ok(())
    }

    fn set_index_buffer(&mut self, buffer: BufferId) -> Result<()> {
        let mut state = self.state.borrow_mut();
        if state.buffer(buffer)?.desc.bind != BindFlags::IndexBuffer {
            return Err(
                GraphicsError::InvalidHandle(format!("{:?} is not an index buffer", buffer)).into(),
            );
        }

        state.bound.index_buffer = Some(buffer);
        state.commands.push(Command::SetIndexBuffer(buffer));
        Ok(())
    }

    fn set_pipeline_state(&mut self, pipeline: PipelineId) -> Result<()> {
        let mut state = self.state.borrow_mut();
        state.pipeline(pipeline)?;
        state.bound.pipeline = Some(pipeline);
        state.commands.push(Command::SetPipelineState(pipeline));
        Ok(())
    }

    fn commit_shader_resources(&mut self, binding: ResourceBindingId) -> Result<()> {
        let mut state = self.state.borrow_mut();
        state.binding(binding)?;
        state.bound.binding = Some(binding);
        state.commands.push(Command::CommitShaderResources(binding));
        Ok(())
    }

    fn draw(&mut self, attribs: &DrawAttribs) -> Result<()> {
        let mut state = self.state.borrow_mut();
        let record = Self::validate_draw(&state, attribs)?;

        state.draws.push(record);
        state.commands.push(Command::Draw(*attribs));
        Ok(())
    }

    fn flush(&mut self) -> Result<()> {
        let mut state = self.state.borrow_mut();
        state.flushes += 1;
        state.commands.push(Command::Flush);
        Ok(())
    }
}

struct HeadlessSwapchain {
    desc: SwapchainDescriptor,
    state: SharedState,
}

impl Swapchain for HeadlessSwapchain {
    fn desc(&self) -> &SwapchainDescriptor {
        &self.desc
    }

    fn resize(&mut self, width: u32, height: u32) -> Result<()> {
        self.desc.width = width;
        self.desc.height = height;
        self.state
            .borrow_mut()
            .commands
            .push(Command::Resize { width, height });
        Ok(())
    }

    fn current_back_buffer(&mut self) -> Result<TextureViewId> {
        if self.desc.is_zero_sized() {
            return Err(GraphicsError::SwapchainError(
                "no back buffer for a zero-sized swapchain".to_string(),
            )
            .into());
        }
        Ok(BACK_BUFFER)
    }

    fn depth_buffer(&self) -> Option<TextureViewId> {
        Some(DEPTH_BUFFER)
    }

    fn present(&mut self) -> Result<()> {
        let mut state = self.state.borrow_mut();
        state.presents += 1;
        state.bound.color = None;
        state.commands.push(Command::Present);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::gfx::desc::{
        CullMode, LayoutElement, PrimitiveTopology, ShaderVariableDesc, TextureFormat,
    };
    use crate::gfx::device::ScopedWrite;

    const WGSL: &str = "fn vs_main() {} fn ps_main() {}";

    fn setup() -> (
        HeadlessFactory,
        Box<dyn RenderDevice>,
        Box<dyn ImmediateContext>,
        Box<dyn Swapchain>,
    ) {
        let mut factory = HeadlessFactory::new(BackendType::Vulkan);
        let window = NativeWindow::headless();
        let (device, context) = factory.create_device_and_contexts(&window);
        let desc = SwapchainDescriptor {
            width: 640,
            height: 480,
            ..Default::default()
        };
        let swapchain = factory.create_swapchain(&window, &desc).unwrap();
        (factory, device.unwrap(), context.unwrap(), swapchain)
    }

    fn pipeline(device: &dyn RenderDevice) -> (PipelineId, BufferId, ResourceBindingId) {
        let shader = |stage, entry: &str| ShaderDesc {
            name: entry.to_string(),
            stage,
            entry_point: entry.to_string(),
            source: ShaderSource::Wgsl(WGSL),
        };
        let vs = device.create_shader(&shader(ShaderStage::Vertex, "vs_main")).unwrap();
        let ps = device.create_shader(&shader(ShaderStage::Pixel, "ps_main")).unwrap();

        let pso = device
            .create_pipeline_state(&PipelineStateDesc {
                name: "test".to_string(),
                vertex_shader: vs,
                pixel_shader: ps,
                render_target_format: TextureFormat::Rgba8UnormSrgb,
                depth_format: TextureFormat::D32Float,
                topology: PrimitiveTopology::TriangleList,
                cull_mode: CullMode::None,
                depth_enable: true,
                layout: vec![LayoutElement::float(0, 3), LayoutElement::float(1, 4)],
                variables: vec![ShaderVariableDesc {
                    stage: ShaderStage::Vertex,
                    name: "Constants".to_string(),
                    binding: 0,
                }],
            })
            .unwrap();

        let cb = device
            .create_buffer(&BufferDesc::dynamic_uniform("cb", 16), None)
            .unwrap();
        let srb = device
            .create_resource_binding(
                pso,
                &[StaticBinding {
                    stage: ShaderStage::Vertex,
                    name: "Constants".to_string(),
                    buffer: cb,
                }],
            )
            .unwrap();
        (pso, cb, srb)
    }

    #[test]
    fn test_optimal_resolves_to_identity() {
        let (_, _, _, swapchain) = setup();
        assert_eq!(swapchain.desc().pre_transform, SurfaceTransform::Identity);
    }

    #[test]
    fn test_depth_range_follows_backend() {
        let mut factory = HeadlessFactory::new(BackendType::OpenGL);
        let (device, _) = factory.create_device_and_contexts(&NativeWindow::headless());
        assert_eq!(
            device.unwrap().info().depth_range,
            DepthRange::NegativeOneToOne
        );
    }

    #[test]
    fn test_disabled_swapchain_yields_none() {
        let mut factory = HeadlessFactory::new(BackendType::Vulkan).without_swapchain();
        let window = NativeWindow::headless();
        let (device, context) = factory.create_device_and_contexts(&window);
        assert!(device.is_some() && context.is_some());
        assert!(factory
            .create_swapchain(&window, &SwapchainDescriptor::default())
            .is_none());
    }

    #[test]
    fn test_scoped_write_stores_contents() {
        let (factory, device, mut context, _) = setup();
        let (_, cb, _) = pipeline(device.as_ref());

        {
            let mut value = ScopedWrite::<[f32; 4]>::new(context.as_mut(), cb, MapMode::WriteDiscard)
                .unwrap();
            *value = [1.0, 2.0, 3.0, 4.0];
        }

        let recorder = factory.recorder();
        assert_eq!(
            recorder.buffer_contents(cb).unwrap(),
            bytemuck::bytes_of(&[1.0f32, 2.0, 3.0, 4.0]).to_vec()
        );
        assert_eq!(
            recorder.commands(),
            vec![
                Command::MapBuffer { buffer: cb, mode: MapMode::WriteDiscard },
                Command::UnmapBuffer { buffer: cb, bytes: 16 },
            ]
        );
    }

    #[test]
    fn test_scoped_write_rejects_small_buffer() {
        let (_, device, mut context, _) = setup();
        let (_, cb, _) = pipeline(device.as_ref());

        let result = ScopedWrite::<[[f32; 4]; 4]>::new(context.as_mut(), cb, MapMode::WriteDiscard);
        assert!(result.is_err());
        drop(result);

        // 失败后缓冲区已解除映射，可以再次映射
        assert!(context.map_buffer(cb, MapMode::WriteDiscard).is_ok());
    }

    #[test]
    fn test_immutable_buffer_cannot_be_mapped() {
        let (_, device, mut context, _) = setup();
        let vb = device
            .create_buffer(
                &BufferDesc::immutable("vb", BindFlags::VertexBuffer, 4),
                Some(&[0u8; 4]),
            )
            .unwrap();

        assert!(context.map_buffer(vb, MapMode::WriteDiscard).is_err());
    }

    #[test]
    fn test_draw_while_mapped_fails() {
        let (_, device, mut context, mut swapchain) = setup();
        let (pso, cb, srb) = pipeline(device.as_ref());
        let vb = device
            .create_buffer(
                &BufferDesc::immutable("vb", BindFlags::VertexBuffer, 84),
                Some(&[0u8; 84]),
            )
            .unwrap();

        let rt = swapchain.current_back_buffer().unwrap();
        context.set_render_targets(rt, swapchain.depth_buffer()).unwrap();
        context.set_vertex_buffers(0, &[vb]).unwrap();
        context.set_pipeline_state(pso).unwrap();
        context.commit_shader_resources(srb).unwrap();

        context.map_buffer(cb, MapMode::WriteDiscard).unwrap();
        let draw = DrawAttribs::NonIndexed { vertex_count: 3 };
        assert!(context.draw(&draw).is_err());

        context.unmap_buffer(cb, &[]);
        assert!(context.draw(&draw).is_ok());
    }

    #[test]
    fn test_binding_requires_every_variable() {
        let (_, device, _, _) = setup();
        let (pso, _, _) = pipeline(device.as_ref());

        assert!(device.create_resource_binding(pso, &[]).is_err());
    }

    #[test]
    fn test_shader_entry_point_checked() {
        let (_, device, _, _) = setup();
        let result = device.create_shader(&ShaderDesc {
            name: "bad".to_string(),
            stage: ShaderStage::Vertex,
            entry_point: "main".to_string(),
            source: ShaderSource::Wgsl(WGSL),
        });
        assert!(result.is_err());
    }

    #[test]
    fn test_handles_are_sequential() {
        let (_, device, _, _) = setup();
        let a = device
            .create_buffer(&BufferDesc::dynamic_uniform("a", 64), None)
            .unwrap();
        let b = device
            .create_buffer(&BufferDesc::dynamic_uniform("b", 64), None)
            .unwrap();

        assert_eq!((a, b), (BufferId(0), BufferId(1)));
        assert_eq!(next_handle(7, "shader").unwrap(), 7);
    }

    #[cfg(target_pointer_width = "64")]
    #[test]
    fn test_handle_overflow_is_resource_error() {
        let err = next_handle(u32::MAX as usize + 1, "buffer").unwrap_err();
        assert!(matches!(
            err,
            crate::core::error::DistError::Graphics(GraphicsError::ResourceCreation(ref msg))
                if msg.contains("buffer")
        ));
    }
}
