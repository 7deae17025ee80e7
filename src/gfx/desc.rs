//! GPU 对象描述符
//!
//! 定义交换链、缓冲区、着色器、管线状态和绘制命令的描述信息。
//! 这些类型与具体图形 API 无关，由各个驱动翻译为原生描述。

use serde::{Deserialize, Serialize};

use super::backend::BackendType;

/// 纹理格式
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TextureFormat {
    /// RGBA 8位无符号归一化
    Rgba8Unorm,
    /// RGBA 8位 sRGB
    Rgba8UnormSrgb,
    /// BGRA 8位无符号归一化
    Bgra8Unorm,
    /// BGRA 8位 sRGB
    Bgra8UnormSrgb,
    /// 深度 32位浮点
    D32Float,
    /// 深度 24位 + 模板 8位
    D24UnormS8Uint,
}

impl TextureFormat {
    pub fn is_depth(&self) -> bool {
        matches!(self, TextureFormat::D32Float | TextureFormat::D24UnormS8Uint)
    }
}

/// 呈现表面在合成前施加的旋转 / 镜像
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SurfaceTransform {
    /// 仅在创建交换链时有效，由后端选择最合适的变换
    #[default]
    Optimal,
    Identity,
    Rotate90,
    Rotate180,
    Rotate270,
    HorizontalMirror,
    HorizontalMirrorRotate90,
    HorizontalMirrorRotate180,
    HorizontalMirrorRotate270,
}

impl SurfaceTransform {
    pub fn is_mirrored(&self) -> bool {
        matches!(
            self,
            SurfaceTransform::HorizontalMirror
                | SurfaceTransform::HorizontalMirrorRotate90
                | SurfaceTransform::HorizontalMirrorRotate180
                | SurfaceTransform::HorizontalMirrorRotate270
        )
    }

    /// 表面是否旋转了 90° 或 270°（宽高互换）
    pub fn swaps_axes(&self) -> bool {
        matches!(
            self,
            SurfaceTransform::Rotate90
                | SurfaceTransform::Rotate270
                | SurfaceTransform::HorizontalMirrorRotate90
                | SurfaceTransform::HorizontalMirrorRotate270
        )
    }
}

/// 裁剪空间深度范围约定
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DepthRange {
    /// [0, 1]（D3D / Vulkan / Metal / wgpu）
    ZeroToOne,
    /// [-1, 1]（OpenGL）
    NegativeOneToOne,
}

impl DepthRange {
    /// 原生后端使用的深度约定
    pub fn native_for(backend: BackendType) -> Self {
        if backend.is_gl() {
            DepthRange::NegativeOneToOne
        } else {
            DepthRange::ZeroToOne
        }
    }
}

/// 交换链描述
///
/// `width`/`height` 始终等于窗口当前客户区尺寸，
/// 绘制和投影代码每次使用时都从交换链读取，不做缓存。
#[derive(Debug, Clone, PartialEq)]
pub struct SwapchainDescriptor {
    pub width: u32,
    pub height: u32,
    pub color_format: TextureFormat,
    pub depth_format: TextureFormat,
    pub pre_transform: SurfaceTransform,
    pub buffer_count: u32,
}

impl Default for SwapchainDescriptor {
    fn default() -> Self {
        Self {
            // 0 表示使用窗口的客户区尺寸
            width: 0,
            height: 0,
            color_format: TextureFormat::Rgba8UnormSrgb,
            depth_format: TextureFormat::D32Float,
            pre_transform: SurfaceTransform::Optimal,
            buffer_count: 2,
        }
    }
}

impl SwapchainDescriptor {
    /// 宽高比；零尺寸时返回 1.0
    pub fn aspect_ratio(&self) -> f32 {
        if self.width == 0 || self.height == 0 {
            1.0
        } else {
            self.width as f32 / self.height as f32
        }
    }

    pub fn is_zero_sized(&self) -> bool {
        self.width == 0 || self.height == 0
    }
}

/// 缓冲区用途
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Usage {
    /// 创建时写入一次，之后不可修改
    Immutable,
    /// CPU 每帧通过映射写入
    Dynamic,
}

/// 缓冲区绑定类型
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BindFlags {
    VertexBuffer,
    IndexBuffer,
    UniformBuffer,
}

/// CPU 访问权限
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CpuAccess {
    None,
    Write,
}

/// 缓冲区描述信息
#[derive(Debug, Clone)]
pub struct BufferDesc {
    pub name: String,
    pub size: u64,
    pub usage: Usage,
    pub bind: BindFlags,
    pub cpu_access: CpuAccess,
}

impl BufferDesc {
    /// 不可变顶点 / 索引缓冲
    pub fn immutable(name: impl Into<String>, bind: BindFlags, size: u64) -> Self {
        Self {
            name: name.into(),
            size,
            usage: Usage::Immutable,
            bind,
            cpu_access: CpuAccess::None,
        }
    }

    /// 动态 uniform 缓冲（CPU 只写）
    pub fn dynamic_uniform(name: impl Into<String>, size: u64) -> Self {
        Self {
            name: name.into(),
            size,
            usage: Usage::Dynamic,
            bind: BindFlags::UniformBuffer,
            cpu_access: CpuAccess::Write,
        }
    }

    /// 检查描述与初始数据是否一致
    pub fn validate(&self, initial_data: Option<&[u8]>) -> Result<(), String> {
        if self.size == 0 {
            return Err(format!("buffer '{}' has zero size", self.name));
        }
        match self.usage {
            Usage::Immutable => match initial_data {
                None => Err(format!("immutable buffer '{}' requires initial data", self.name)),
                Some(data) if data.len() as u64 != self.size => Err(format!(
                    "immutable buffer '{}' expects {} bytes, got {}",
                    self.name,
                    self.size,
                    data.len()
                )),
                Some(_) => Ok(()),
            },
            Usage::Dynamic if self.cpu_access != CpuAccess::Write => Err(format!(
                "dynamic buffer '{}' must allow CPU write access",
                self.name
            )),
            Usage::Dynamic => Ok(()),
        }
    }
}

/// 映射方式（均为 CPU 只写）
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MapMode {
    /// 丢弃旧内容
    WriteDiscard,
    /// 保证不覆盖 GPU 仍在读取的区域
    WriteNoOverwrite,
}

/// 着色器阶段
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ShaderStage {
    Vertex,
    Pixel,
}

/// 着色器源码
#[derive(Debug, Clone)]
pub enum ShaderSource {
    Wgsl(&'static str),
}

/// 着色器描述
#[derive(Debug, Clone)]
pub struct ShaderDesc {
    pub name: String,
    pub stage: ShaderStage,
    pub entry_point: String,
    pub source: ShaderSource,
}

/// 顶点属性分量类型
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ValueType {
    Float32,
}

impl ValueType {
    pub fn size(&self) -> u32 {
        match self {
            ValueType::Float32 => 4,
        }
    }
}

/// 顶点输入布局元素
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LayoutElement {
    /// 着色器输入位置
    pub input_index: u32,
    /// 顶点缓冲槽
    pub buffer_slot: u32,
    pub num_components: u32,
    pub value_type: ValueType,
}

impl LayoutElement {
    pub const fn float(input_index: u32, num_components: u32) -> Self {
        Self {
            input_index,
            buffer_slot: 0,
            num_components,
            value_type: ValueType::Float32,
        }
    }

    pub fn size(&self) -> u32 {
        self.num_components * self.value_type.size()
    }
}

/// 紧密排列时一个槽位的跨度
pub fn layout_stride(elements: &[LayoutElement], slot: u32) -> u32 {
    elements
        .iter()
        .filter(|e| e.buffer_slot == slot)
        .map(LayoutElement::size)
        .sum()
}

/// 紧密排列时每个元素的偏移
pub fn layout_offsets(elements: &[LayoutElement]) -> Vec<u32> {
    let mut next = std::collections::HashMap::new();
    elements
        .iter()
        .map(|e| {
            let offset = next.entry(e.buffer_slot).or_insert(0u32);
            let current = *offset;
            *offset += e.size();
            current
        })
        .collect()
}

/// 图元拓扑
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PrimitiveTopology {
    TriangleList,
}

/// 剔除模式
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CullMode {
    None,
    Back,
}

/// 着色器资源变量（静态绑定）
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ShaderVariableDesc {
    pub stage: ShaderStage,
    pub name: String,
    /// 着色器中的绑定槽
    pub binding: u32,
}

/// 图形管线状态描述
#[derive(Debug, Clone)]
pub struct PipelineStateDesc {
    pub name: String,
    pub vertex_shader: super::device::ShaderId,
    pub pixel_shader: super::device::ShaderId,
    pub render_target_format: TextureFormat,
    pub depth_format: TextureFormat,
    pub topology: PrimitiveTopology,
    pub cull_mode: CullMode,
    pub depth_enable: bool,
    pub layout: Vec<LayoutElement>,
    pub variables: Vec<ShaderVariableDesc>,
}

/// 静态资源绑定：变量名 → 缓冲区
#[derive(Debug, Clone)]
pub struct StaticBinding {
    pub stage: ShaderStage,
    pub name: String,
    pub buffer: super::device::BufferId,
}

/// 索引类型
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IndexType {
    U32,
}

/// 绘制参数
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DrawAttribs {
    Indexed { index_count: u32, index_type: IndexType },
    NonIndexed { vertex_count: u32 },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_transform_classification() {
        assert!(SurfaceTransform::Rotate90.swaps_axes());
        assert!(SurfaceTransform::HorizontalMirrorRotate270.swaps_axes());
        assert!(!SurfaceTransform::Rotate180.swaps_axes());
        assert!(!SurfaceTransform::Optimal.swaps_axes());

        assert!(SurfaceTransform::HorizontalMirror.is_mirrored());
        assert!(!SurfaceTransform::Rotate270.is_mirrored());
    }

    #[test]
    fn test_buffer_desc_validation() {
        let vb = BufferDesc::immutable("vb", BindFlags::VertexBuffer, 8);
        assert!(vb.validate(None).is_err());
        assert!(vb.validate(Some(&[0u8; 4])).is_err());
        assert!(vb.validate(Some(&[0u8; 8])).is_ok());

        let mut cb = BufferDesc::dynamic_uniform("cb", 64);
        assert!(cb.validate(None).is_ok());
        cb.cpu_access = CpuAccess::None;
        assert!(cb.validate(None).is_err());
    }

    #[test]
    fn test_layout_packing() {
        let layout = [LayoutElement::float(0, 3), LayoutElement::float(1, 4)];
        assert_eq!(layout_stride(&layout, 0), 28);
        assert_eq!(layout_offsets(&layout), vec![0, 12]);
    }

    #[test]
    fn test_native_depth_range() {
        assert_eq!(DepthRange::native_for(BackendType::OpenGL), DepthRange::NegativeOneToOne);
        assert_eq!(DepthRange::native_for(BackendType::Vulkan), DepthRange::ZeroToOne);
    }
}
