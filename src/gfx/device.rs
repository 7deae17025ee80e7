//! 统一的图形设备接口
//!
//! 本模块定义了所有驱动（wgpu、headless）都必须实现的三个接口：
//!
//! - [`RenderDevice`]：创建缓冲区、着色器、管线状态和资源绑定
//! - [`ImmediateContext`]：录制并提交 GPU 命令
//! - [`Swapchain`]：管理可呈现的帧缓冲
//!
//! GPU 对象通过不透明句柄引用，真实对象由驱动持有，
//! 随设备一起释放。
//!
//! 动态缓冲区只能通过 [`ScopedWrite`] 写入：守卫在作用域结束时
//! 解除映射（包括提前返回和错误路径），并且在存活期间独占
//! 立即上下文，因此映射未释放时无法录制绘制命令。

use bytemuck::Pod;
use std::ops::{Deref, DerefMut};

use super::backend::BackendType;
use super::desc::{
    BufferDesc, DepthRange, DrawAttribs, MapMode, PipelineStateDesc, ShaderDesc, StaticBinding,
    SwapchainDescriptor,
};
use crate::core::error::{GraphicsError, Result};

macro_rules! handle_type {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
        pub struct $name(pub(crate) u32);

        impl $name {
            pub fn index(&self) -> usize {
                self.0 as usize
            }
        }
    };
}

handle_type!(
    /// 缓冲区句柄
    BufferId
);
handle_type!(
    /// 着色器句柄
    ShaderId
);
handle_type!(
    /// 管线状态句柄
    PipelineId
);
handle_type!(
    /// 资源绑定句柄
    ResourceBindingId
);
handle_type!(
    /// 渲染目标 / 深度视图句柄
    TextureViewId
);

/// 设备信息
#[derive(Debug, Clone)]
pub struct DeviceInfo {
    pub backend: BackendType,
    /// 投影矩阵使用的深度约定
    pub depth_range: DepthRange,
    pub adapter_name: String,
}

/// 渲染设备
///
/// 设备句柄在引导完成后只读共享，创建接口使用 `&self`。
pub trait RenderDevice {
    fn info(&self) -> &DeviceInfo;

    /// 创建缓冲区；不可变缓冲区必须提供初始数据
    fn create_buffer(&self, desc: &BufferDesc, initial_data: Option<&[u8]>) -> Result<BufferId>;

    fn create_shader(&self, desc: &ShaderDesc) -> Result<ShaderId>;

    fn create_pipeline_state(&self, desc: &PipelineStateDesc) -> Result<PipelineId>;

    /// 绑定管线的全部静态变量，生成之后每次绘制复用的资源绑定对象
    fn create_resource_binding(
        &self,
        pipeline: PipelineId,
        bindings: &[StaticBinding],
    ) -> Result<ResourceBindingId>;
}

/// 立即上下文
///
/// 所有 GPU 命令都通过它录制和提交，只在帧循环线程上使用。
pub trait ImmediateContext {
    fn set_render_targets(&mut self, color: TextureViewId, depth: Option<TextureViewId>)
        -> Result<()>;

    fn clear_render_target(&mut self, color: TextureViewId, rgba: [f32; 4]) -> Result<()>;

    fn clear_depth(&mut self, depth: TextureViewId, value: f32) -> Result<()>;

    /// 开始映射动态缓冲区，返回可写入的字节数
    ///
    /// 一般不直接调用，使用 [`ScopedWrite`]。
    fn map_buffer(&mut self, buffer: BufferId, mode: MapMode) -> Result<u64>;

    /// 提交映射期间写入的数据并解除映射
    fn unmap_buffer(&mut self, buffer: BufferId, data: &[u8]);

    fn set_vertex_buffers(&mut self, start_slot: u32, buffers: &[BufferId]) -> Result<()>;

    fn set_index_buffer(&mut self, buffer: BufferId) -> Result<()>;

    fn set_pipeline_state(&mut self, pipeline: PipelineId) -> Result<()>;

    fn commit_shader_resources(&mut self, binding: ResourceBindingId) -> Result<()>;

    fn draw(&mut self, attribs: &DrawAttribs) -> Result<()>;

    /// 提交所有命令并阻塞直到 GPU 完成
    fn flush(&mut self) -> Result<()>;
}

/// 交换链
pub trait Swapchain {
    /// 当前描述；尺寸总是窗口当前客户区尺寸
    fn desc(&self) -> &SwapchainDescriptor;

    /// 原地调整尺寸
    fn resize(&mut self, width: u32, height: u32) -> Result<()>;

    /// 当前帧的后台缓冲
    fn current_back_buffer(&mut self) -> Result<TextureViewId>;

    fn depth_buffer(&self) -> Option<TextureViewId>;

    /// 呈现当前帧；阻塞直到后端接受
    fn present(&mut self) -> Result<()>;
}

/// 动态缓冲区的作用域写入守卫
///
/// 创建时映射缓冲区，内容初始化为零；`Drop` 时把写入的数据
/// 交给驱动并解除映射。
///
/// ```ignore
/// {
///     let mut constants = ScopedWrite::<[[f32; 4]; 4]>::new(context, buffer, MapMode::WriteDiscard)?;
///     *constants = wvp.transpose().into();
/// } // 在此解除映射
/// context.draw(&attribs)?;
/// ```
pub struct ScopedWrite<'a, T: Pod> {
    context: &'a mut dyn ImmediateContext,
    buffer: BufferId,
    value: T,
}

impl<'a, T: Pod> ScopedWrite<'a, T> {
    pub fn new(
        context: &'a mut dyn ImmediateContext,
        buffer: BufferId,
        mode: MapMode,
    ) -> Result<Self> {
        let capacity = context.map_buffer(buffer, mode)?;
        let required = std::mem::size_of::<T>() as u64;

        if capacity < required {
            context.unmap_buffer(buffer, &[]);
            return Err(GraphicsError::Map(format!(
                "buffer {:?} holds {} bytes, {} required",
                buffer, capacity, required
            ))
            .into());
        }

        Ok(Self {
            context,
            buffer,
            value: T::zeroed(),
        })
    }

    pub fn buffer(&self) -> BufferId {
        self.buffer
    }
}

impl<T: Pod> Deref for ScopedWrite<'_, T> {
    type Target = T;

    fn deref(&self) -> &T {
        &self.value
    }
}

impl<T: Pod> DerefMut for ScopedWrite<'_, T> {
    fn deref_mut(&mut self) -> &mut T {
        &mut self.value
    }
}

impl<T: Pod> Drop for ScopedWrite<'_, T> {
    fn drop(&mut self) {
        self.context
            .unmap_buffer(self.buffer, bytemuck::bytes_of(&self.value));
    }
}
