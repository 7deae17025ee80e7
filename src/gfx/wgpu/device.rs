//! wgpu 设备与立即上下文
//!
//! 设备、上下文和交换链共享一份 [`WgpuShared`]：逻辑设备、命令队列、
//! 按句柄索引的资源表，以及当前帧的渲染目标。
//!
//! 立即上下文的绑定调用只记录状态，`draw` 时把记录的状态编码成一个
//! 渲染通道并提交；清屏请求合并到下一个渲染通道的 load 操作中，
//! 没有绘制的帧在呈现前单独提交一个只清屏的通道。

use std::cell::RefCell;
use std::rc::Rc;
use tracing::{debug, warn};
use wgpu::util::DeviceExt;

use super::backend::to_wgpu_format;
use crate::core::error::{GraphicsError, Result};
use crate::gfx::desc::{
    layout_offsets, layout_stride, BindFlags, BufferDesc, CullMode, DrawAttribs, MapMode,
    PipelineStateDesc, PrimitiveTopology, ShaderDesc, ShaderSource, ShaderStage,
    ShaderVariableDesc, StaticBinding, Usage,
};
use crate::gfx::device::{
    BufferId, DeviceInfo, ImmediateContext, PipelineId, RenderDevice, ResourceBindingId, ShaderId,
    TextureViewId,
};

pub(super) const BACK_BUFFER: TextureViewId = TextureViewId(0);
pub(super) const DEPTH_BUFFER: TextureViewId = TextureViewId(1);

struct WgpuBuffer {
    buffer: wgpu::Buffer,
    desc: BufferDesc,
    mapped: bool,
}

struct WgpuShader {
    module: wgpu::ShaderModule,
    stage: ShaderStage,
    entry_point: String,
}

struct WgpuPipeline {
    pipeline: wgpu::RenderPipeline,
    bind_group_layout: wgpu::BindGroupLayout,
    variables: Vec<ShaderVariableDesc>,
}

#[derive(Default)]
struct ResourceTables {
    buffers: Vec<WgpuBuffer>,
    shaders: Vec<WgpuShader>,
    pipelines: Vec<WgpuPipeline>,
    bind_groups: Vec<(PipelineId, wgpu::BindGroup)>,
}

fn unknown<T>(what: &str, index: usize) -> Result<T> {
    Err(GraphicsError::InvalidHandle(format!("unknown {} #{}", what, index)).into())
}

impl ResourceTables {
    fn buffer(&self, id: BufferId) -> Result<&WgpuBuffer> {
        self.buffers
            .get(id.index())
            .map_or_else(|| unknown("buffer", id.index()), Ok)
    }

    fn shader(&self, id: ShaderId) -> Result<&WgpuShader> {
        self.shaders
            .get(id.index())
            .map_or_else(|| unknown("shader", id.index()), Ok)
    }

    fn pipeline(&self, id: PipelineId) -> Result<&WgpuPipeline> {
        self.pipelines
            .get(id.index())
            .map_or_else(|| unknown("pipeline", id.index()), Ok)
    }

    fn bind_group(&self, id: ResourceBindingId) -> Result<&(PipelineId, wgpu::BindGroup)> {
        self.bind_groups
            .get(id.index())
            .map_or_else(|| unknown("resource binding", id.index()), Ok)
    }
}

/// 当前帧的渲染目标和待执行的清屏
#[derive(Default)]
pub(super) struct FrameTargets {
    pub color: Option<wgpu::TextureView>,
    pub depth: Option<wgpu::TextureView>,
    pending_color: Option<wgpu::Color>,
    pending_depth: Option<f32>,
}

/// 设备、上下文、交换链共享的状态
pub struct WgpuShared {
    pub(super) device: wgpu::Device,
    pub(super) queue: wgpu::Queue,
    resources: RefCell<ResourceTables>,
    pub(super) frame: RefCell<FrameTargets>,
}

impl WgpuShared {
    pub(super) fn new(device: wgpu::Device, queue: wgpu::Queue) -> Self {
        Self {
            device,
            queue,
            resources: RefCell::default(),
            frame: RefCell::default(),
        }
    }

    /// 在验证错误作用域内执行创建操作
    fn validated<T>(&self, what: &str, create: impl FnOnce(&wgpu::Device) -> T) -> Result<T> {
        self.device.push_error_scope(wgpu::ErrorFilter::Validation);
        let value = create(&self.device);
        match pollster::block_on(self.device.pop_error_scope()) {
            Some(e) => Err(GraphicsError::ResourceCreation(format!("{}: {}", what, e)).into()),
            None => Ok(value),
        }
    }

    /// 提交尚未执行的清屏（本帧没有绘制时在呈现前调用）
    pub(super) fn flush_pending_clears(&self) {
        let mut frame = self.frame.borrow_mut();
        if frame.pending_color.is_none() && frame.pending_depth.is_none() {
            return;
        }
        let color_load = load_op(frame.pending_color.take());
        let depth_load = load_op(frame.pending_depth.take());

        let Some(color) = frame.color.as_ref() else {
            return;
        };

        let mut encoder = self
            .device
            .create_command_encoder(&wgpu::CommandEncoderDescriptor {
                label: Some("Clear Encoder"),
            });
        {
            let _pass = encoder.begin_render_pass(&wgpu::RenderPassDescriptor {
                label: Some("Clear Pass"),
                color_attachments: &[Some(color_attachment(color, color_load))],
                depth_stencil_attachment: frame
                    .depth
                    .as_ref()
                    .map(|view| depth_attachment(view, depth_load)),
                timestamp_writes: None,
                occlusion_query_set: None,
            });
        }
        self.queue.submit(Some(encoder.finish()));
    }
}

fn load_op<V>(clear: Option<V>) -> wgpu::LoadOp<V> {
    match clear {
        Some(value) => wgpu::LoadOp::Clear(value),
        None => wgpu::LoadOp::Load,
    }
}

fn color_attachment(
    view: &wgpu::TextureView,
    load: wgpu::LoadOp<wgpu::Color>,
) -> wgpu::RenderPassColorAttachment<'_> {
    wgpu::RenderPassColorAttachment {
        view,
        resolve_target: None,
        ops: wgpu::Operations {
            load,
            store: wgpu::StoreOp::Store,
        },
    }
}

fn depth_attachment(
    view: &wgpu::TextureView,
    load: wgpu::LoadOp<f32>,
) -> wgpu::RenderPassDepthStencilAttachment<'_> {
    wgpu::RenderPassDepthStencilAttachment {
        view,
        depth_ops: Some(wgpu::Operations {
            load,
            store: wgpu::StoreOp::Store,
        }),
        stencil_ops: None,
    }
}

fn shader_stages(stage: ShaderStage) -> wgpu::ShaderStages {
    match stage {
        ShaderStage::Vertex => wgpu::ShaderStages::VERTEX,
        ShaderStage::Pixel => wgpu::ShaderStages::FRAGMENT,
    }
}

fn vertex_format(components: u32) -> Result<wgpu::VertexFormat> {
    match components {
        1 => Ok(wgpu::VertexFormat::Float32),
        2 => Ok(wgpu::VertexFormat::Float32x2),
        3 => Ok(wgpu::VertexFormat::Float32x3),
        4 => Ok(wgpu::VertexFormat::Float32x4),
        n => Err(GraphicsError::ResourceCreation(format!(
            "unsupported vertex attribute width {}",
            n
        ))
        .into()),
    }
}

/// wgpu 渲染设备
pub struct WgpuDevice {
    info: DeviceInfo,
    shared: Rc<WgpuShared>,
}

impl WgpuDevice {
    pub(super) fn new(info: DeviceInfo, shared: Rc<WgpuShared>) -> Self {
        Self { info, shared }
    }
}

impl RenderDevice for WgpuDevice {
    fn info(&self) -> &DeviceInfo {
        &self.info
    }

    fn create_buffer(&self, desc: &BufferDesc, initial_data: Option<&[u8]>) -> Result<BufferId> {
        desc.validate(initial_data)
            .map_err(GraphicsError::ResourceCreation)?;

        let mut usage = match desc.bind {
            BindFlags::VertexBuffer => wgpu::BufferUsages::VERTEX,
            BindFlags::IndexBuffer => wgpu::BufferUsages::INDEX,
            BindFlags::UniformBuffer => wgpu::BufferUsages::UNIFORM,
        };
        if desc.usage == Usage::Dynamic {
            usage |= wgpu::BufferUsages::COPY_DST;
        }

        let buffer = self.shared.validated(&desc.name, |device| match initial_data {
            Some(contents) => device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
                label: Some(desc.name.as_str()),
                contents,
                usage,
            }),
            None => device.create_buffer(&wgpu::BufferDescriptor {
                label: Some(desc.name.as_str()),
                size: desc.size,
                usage,
                mapped_at_creation: false,
            }),
        })?;

        let mut resources = self.shared.resources.borrow_mut();
        let id = BufferId(resources.buffers.len() as u32);
        resources.buffers.push(WgpuBuffer {
            buffer,
            desc: desc.clone(),
            mapped: false,
        });
        debug!("Created buffer '{}' ({} bytes)", desc.name, desc.size);
        Ok(id)
    }

    fn create_shader(&self, desc: &ShaderDesc) -> Result<ShaderId> {
        let ShaderSource::Wgsl(source) = desc.source;

        let module = self
            .shared
            .validated(&desc.name, |device| {
                device.create_shader_module(wgpu::ShaderModuleDescriptor {
                    label: Some(desc.name.as_str()),
                    source: wgpu::ShaderSource::Wgsl(source.into()),
                })
            })
            .map_err(|e| GraphicsError::ShaderCreation(e.to_string()))?;

        let mut resources = self.shared.resources.borrow_mut();
        let id = ShaderId(resources.shaders.len() as u32);
        resources.shaders.push(WgpuShader {
            module,
            stage: desc.stage,
            entry_point: desc.entry_point.clone(),
        });
        Ok(id)
    }

    fn create_pipeline_state(&self, desc: &PipelineStateDesc) -> Result<PipelineId> {
        let mut resources = self.shared.resources.borrow_mut();
        let vs = resources.shader(desc.vertex_shader)?;
        let ps = resources.shader(desc.pixel_shader)?;
        if vs.stage != ShaderStage::Vertex || ps.stage != ShaderStage::Pixel {
            return Err(GraphicsError::ResourceCreation(format!(
                "pipeline '{}': shader stages do not match their slots",
                desc.name
            ))
            .into());
        }

        let layout_entries: Vec<wgpu::BindGroupLayoutEntry> = desc
            .variables
            .iter()
            .map(|variable| wgpu::BindGroupLayoutEntry {
                binding: variable.binding,
                visibility: shader_stages(variable.stage),
                ty: wgpu::BindingType::Buffer {
                    ty: wgpu::BufferBindingType::Uniform,
                    has_dynamic_offset: false,
                    min_binding_size: None,
                },
                count: None,
            })
            .collect();

        // 每个缓冲槽一组顶点属性，紧密排列
        let offsets = layout_offsets(&desc.layout);
        let slot_count = desc.layout.iter().map(|e| e.buffer_slot + 1).max().unwrap_or(0);
        let mut attributes: Vec<Vec<wgpu::VertexAttribute>> = vec![Vec::new(); slot_count as usize];
        for (element, offset) in desc.layout.iter().zip(offsets) {
            attributes[element.buffer_slot as usize].push(wgpu::VertexAttribute {
                offset: u64::from(offset),
                shader_location: element.input_index,
                format: vertex_format(element.num_components)?,
            });
        }
        let buffers: Vec<wgpu::VertexBufferLayout> = attributes
            .iter()
            .enumerate()
            .map(|(slot, attributes)| wgpu::VertexBufferLayout {
                array_stride: u64::from(layout_stride(&desc.layout, slot as u32)),
                step_mode: wgpu::VertexStepMode::Vertex,
                attributes,
            })
            .collect();

        let topology = match desc.topology {
            PrimitiveTopology::TriangleList => wgpu::PrimitiveTopology::TriangleList,
        };
        let cull_mode = match desc.cull_mode {
            CullMode::None => None,
            CullMode::Back => Some(wgpu::Face::Back),
        };

        let (bind_group_layout, pipeline) = self.shared.validated(&desc.name, |device| {
            let bind_group_layout =
                device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
                    label: Some(desc.name.as_str()),
                    entries: &layout_entries,
                });

            let pipeline_layout = device.create_pipeline_layout(&wgpu::PipelineLayoutDescriptor {
                label: Some(desc.name.as_str()),
                bind_group_layouts: &[&bind_group_layout],
                push_constant_ranges: &[],
            });

            let pipeline = device.create_render_pipeline(&wgpu::RenderPipelineDescriptor {
                label: Some(desc.name.as_str()),
                layout: Some(&pipeline_layout),
                vertex: wgpu::VertexState {
                    module: &vs.module,
                    entry_point: &vs.entry_point,
                    buffers: &buffers,
                },
                fragment: Some(wgpu::FragmentState {
                    module: &ps.module,
                    entry_point: &ps.entry_point,
                    targets: &[Some(wgpu::ColorTargetState {
                        format: to_wgpu_format(desc.render_target_format),
                        blend: Some(wgpu::BlendState::REPLACE),
                        write_mask: wgpu::ColorWrites::ALL,
                    })],
                }),
                primitive: wgpu::PrimitiveState {
                    topology,
                    strip_index_format: None,
                    // 顺时针为正面
                    front_face: wgpu::FrontFace::Cw,
                    cull_mode,
                    polygon_mode: wgpu::PolygonMode::Fill,
                    unclipped_depth: false,
                    conservative: false,
                },
                depth_stencil: Some(wgpu::DepthStencilState {
                    format: to_wgpu_format(desc.depth_format),
                    depth_write_enabled: desc.depth_enable,
                    depth_compare: if desc.depth_enable {
                        wgpu::CompareFunction::Less
                    } else {
                        wgpu::CompareFunction::Always
                    },
                    stencil: wgpu::StencilState::default(),
                    bias: wgpu::DepthBiasState::default(),
                }),
                multisample: wgpu::MultisampleState {
                    count: 1,
                    mask: !0,
                    alpha_to_coverage_enabled: false,
                },
                multiview: None,
            });

            (bind_group_layout, pipeline)
        })?;

        let id = PipelineId(resources.pipelines.len() as u32);
        resources.pipelines.push(WgpuPipeline {
            pipeline,
            bind_group_layout,
            variables: desc.variables.clone(),
        });
        debug!("Created pipeline '{}'", desc.name);
        Ok(id)
    }

    fn create_resource_binding(
        &self,
        pipeline: PipelineId,
        bindings: &[StaticBinding],
    ) -> Result<ResourceBindingId> {
        let mut resources = self.shared.resources.borrow_mut();
        let state = resources.pipeline(pipeline)?;

        let mut entries = Vec::with_capacity(state.variables.len());
        for variable in &state.variables {
            let bound = bindings
                .iter()
                .find(|b| b.stage == variable.stage && b.name == variable.name)
                .ok_or_else(|| {
                    GraphicsError::InvalidHandle(format!(
                        "static variable '{}' left unbound",
                        variable.name
                    ))
                })?;
            entries.push(wgpu::BindGroupEntry {
                binding: variable.binding,
                resource: resources.buffer(bound.buffer)?.buffer.as_entire_binding(),
            });
        }

        let bind_group = self.shared.validated("resource binding", |device| {
            device.create_bind_group(&wgpu::BindGroupDescriptor {
                label: Some("Static Resource Binding"),
                layout: &state.bind_group_layout,
                entries: &entries,
            })
        })?;
        drop(entries);

        let id = ResourceBindingId(resources.bind_groups.len() as u32);
        resources.bind_groups.push((pipeline, bind_group));
        Ok(id)
    }
}

/// 已记录、尚未编码的绑定状态
#[derive(Default)]
struct BoundState {
    vertex_buffers: Vec<(u32, BufferId)>,
    index_buffer: Option<BufferId>,
    pipeline: Option<PipelineId>,
    binding: Option<ResourceBindingId>,
    targets_bound: bool,
}

/// wgpu 立即上下文
pub struct WgpuContext {
    shared: Rc<WgpuShared>,
    bound: BoundState,
}

impl WgpuContext {
    pub(super) fn new(shared: Rc<WgpuShared>) -> Self {
        Self {
            shared,
            bound: BoundState::default(),
        }
    }

    fn check_view(view: TextureViewId, expected: TextureViewId) -> Result<()> {
        if view == expected {
            Ok(())
        } else {
            Err(GraphicsError::InvalidHandle(format!("unknown texture view {:?}", view)).into())
        }
    }
}

impl ImmediateContext for WgpuContext {
    fn set_render_targets(
        &mut self,
        color: TextureViewId,
        depth: Option<TextureViewId>,
    ) -> Result<()> {
        Self::check_view(color, BACK_BUFFER)?;
        if let Some(depth) = depth {
            Self::check_view(depth, DEPTH_BUFFER)?;
        }
        if self.shared.frame.borrow().color.is_none() {
            return Err(GraphicsError::CommandExecution(
                "back buffer has not been acquired".to_string(),
            )
            .into());
        }

        self.bound.targets_bound = true;
        Ok(())
    }

    fn clear_render_target(&mut self, color: TextureViewId, rgba: [f32; 4]) -> Result<()> {
        Self::check_view(color, BACK_BUFFER)?;
        self.shared.frame.borrow_mut().pending_color = Some(wgpu::Color {
            r: f64::from(rgba[0]),
            g: f64::from(rgba[1]),
            b: f64::from(rgba[2]),
            a: f64::from(rgba[3]),
        });
        Ok(())
    }

    fn clear_depth(&mut self, depth: TextureViewId, value: f32) -> Result<()> {
        Self::check_view(depth, DEPTH_BUFFER)?;
        self.shared.frame.borrow_mut().pending_depth = Some(value);
        Ok(())
    }

    fn map_buffer(&mut self, buffer: BufferId, _mode: MapMode) -> Result<u64> {
        let mut resources = self.shared.resources.borrow_mut();
        let Some(entry) = resources.buffers.get_mut(buffer.index()) else {
            return unknown("buffer", buffer.index());
        };

        if entry.desc.usage != Usage::Dynamic || entry.mapped {
            return Err(GraphicsError::Map(format!(
                "buffer '{}' cannot be mapped for writing",
                entry.desc.name
            ))
            .into());
        }

        entry.mapped = true;
        Ok(entry.desc.size)
    }

    fn unmap_buffer(&mut self, buffer: BufferId, data: &[u8]) {
        let mut resources = self.shared.resources.borrow_mut();
        let Some(entry) = resources.buffers.get_mut(buffer.index()) else {
            warn!("Unmap of unknown buffer {:?}", buffer);
            return;
        };

        entry.mapped = false;
        if !data.is_empty() {
            self.shared.queue.write_buffer(&entry.buffer, 0, data);
        }
    }

    fn set_vertex_buffers(&mut self, start_slot: u32, buffers: &[BufferId]) -> Result<()> {
        let resources = self.shared.resources.borrow();
        for id in buffers {
            resources.buffer(*id)?;
        }

        self.bound.vertex_buffers = buffers
            .iter()
            .enumerate()
            .map(|(i, id)| (start_slot + i as u32, *id))
            .collect();
        Ok(())
    }

    fn set_index_buffer(&mut self, buffer: BufferId) -> Result<()> {
        self.shared.resources.borrow().buffer(buffer)?;
        self.bound.index_buffer = Some(buffer);
        Ok(())
    }

    fn set_pipeline_state(&mut self, pipeline: PipelineId) -> Result<()> {
        self.shared.resources.borrow().pipeline(pipeline)?;
        self.bound.pipeline = Some(pipeline);
        Ok(())
    }

    fn commit_shader_resources(&mut self, binding: ResourceBindingId) -> Result<()> {
        self.shared.resources.borrow().bind_group(binding)?;
        self.bound.binding = Some(binding);
        Ok(())
    }

    fn draw(&mut self, attribs: &DrawAttribs) -> Result<()> {
        let fail = |msg: &str| GraphicsError::CommandExecution(msg.to_string());

        if !self.bound.targets_bound {
            return Err(fail("draw without render targets").into());
        }
        let pipeline_id = self.bound.pipeline.ok_or_else(|| fail("draw without pipeline"))?;
        let binding_id = self
            .bound
            .binding
            .ok_or_else(|| fail("draw without committed resources"))?;

        let shared = self.shared.clone();
        let resources = shared.resources.borrow();
        if resources.buffers.iter().any(|b| b.mapped) {
            return Err(fail("draw while a buffer is mapped").into());
        }

        let pipeline = resources.pipeline(pipeline_id)?;
        let (owner, bind_group) = resources.bind_group(binding_id)?;
        if *owner != pipeline_id {
            return Err(fail("committed resources belong to another pipeline").into());
        }

        let mut frame = shared.frame.borrow_mut();
        let color_load = load_op(frame.pending_color.take());
        let depth_load = load_op(frame.pending_depth.take());
        let color = frame
            .color
            .as_ref()
            .ok_or_else(|| fail("back buffer has not been acquired"))?;

        let mut encoder = shared
            .device
            .create_command_encoder(&wgpu::CommandEncoderDescriptor {
                label: Some("Render Encoder"),
            });
        {
            let mut pass = encoder.begin_render_pass(&wgpu::RenderPassDescriptor {
                label: Some("Render Pass"),
                color_attachments: &[Some(color_attachment(color, color_load))],
                depth_stencil_attachment: frame
                    .depth
                    .as_ref()
                    .map(|view| depth_attachment(view, depth_load)),
                timestamp_writes: None,
                occlusion_query_set: None,
            });

            pass.set_pipeline(&pipeline.pipeline);
            pass.set_bind_group(0, bind_group, &[]);
            for (slot, id) in &self.bound.vertex_buffers {
                pass.set_vertex_buffer(*slot, resources.buffer(*id)?.buffer.slice(..));
            }

            match *attribs {
                DrawAttribs::Indexed { index_count, .. } => {
                    let index_buffer = self
                        .bound
                        .index_buffer
                        .ok_or_else(|| fail("indexed draw without an index buffer"))?;
                    pass.set_index_buffer(
                        resources.buffer(index_buffer)?.buffer.slice(..),
                        wgpu::IndexFormat::Uint32,
                    );
                    pass.draw_indexed(0..index_count, 0, 0..1);
                }
                DrawAttribs::NonIndexed { vertex_count } => {
                    pass.draw(0..vertex_count, 0..1);
                }
            }
        }

        shared.queue.submit(Some(encoder.finish()));
        Ok(())
    }

    fn flush(&mut self) -> Result<()> {
        self.shared.queue.submit(std::iter::empty());
        self.shared.device.poll(wgpu::Maintain::Wait);
        debug!("GPU work flushed");
        Ok(())
    }
}
