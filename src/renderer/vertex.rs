//! 顶点数据定义
//!
//! 本模块定义了演示场景使用的顶点结构体和静态几何数据。
//!
//! # 设计说明
//!
//! - 使用 `#[repr(C)]` 确保内存布局与着色器输入一致
//! - 实现 `Pod` 和 `Zeroable` trait 以支持零拷贝传输到 GPU

use bytemuck::{Pod, Zeroable};

use crate::gfx::desc::LayoutElement;

/// 顶点结构体
///
/// # 内存布局
///
/// - `position`：前 12 字节（3 个 f32）
/// - `color`：后 16 字节（4 个 f32）
///
/// 总大小：28 字节
#[repr(C)]
#[derive(Default, Clone, Copy, Debug, PartialEq, Pod, Zeroable)]
pub struct Vertex {
    /// 顶点位置（模型空间）
    pub position: [f32; 3],
    /// 顶点颜色（RGBA，范围 0.0-1.0）
    pub color: [f32; 4],
}

impl Vertex {
    pub const fn new(position: [f32; 3], color: [f32; 4]) -> Self {
        Self { position, color }
    }

    /// 对应的输入布局：位置 (location 0) + 颜色 (location 1)
    pub const LAYOUT: [LayoutElement; 2] = [LayoutElement::float(0, 3), LayoutElement::float(1, 4)];
}

/// 立方体的 8 个顶点
///
/// ```text
///       (-1,+1,+1)________________(+1,+1,+1)
///                /|              /|
///               / |             / |
///              /  |            /  |
///             /   |           /   |
/// (-1,-1,+1) /____|__________/(+1,-1,+1)
///            |    |__________|____|
///            |   /(-1,+1,-1) |    /(+1,+1,-1)
///            |  /            |   /
///            | /             |  /
///            |/              | /
///            /_______________|/
///        (-1,-1,-1)       (+1,-1,-1)
/// ```
pub const CUBE_VERTICES: [Vertex; 8] = [
    Vertex::new([-1.0, -1.0, -1.0], [1.0, 0.0, 0.0, 1.0]),
    Vertex::new([-1.0, 1.0, -1.0], [0.0, 1.0, 0.0, 1.0]),
    Vertex::new([1.0, 1.0, -1.0], [0.0, 0.0, 1.0, 1.0]),
    Vertex::new([1.0, -1.0, -1.0], [1.0, 1.0, 1.0, 1.0]),
    Vertex::new([-1.0, -1.0, 1.0], [1.0, 1.0, 0.0, 1.0]),
    Vertex::new([-1.0, 1.0, 1.0], [0.0, 1.0, 1.0, 1.0]),
    Vertex::new([1.0, 1.0, 1.0], [1.0, 0.0, 1.0, 1.0]),
    Vertex::new([1.0, -1.0, 1.0], [0.2, 0.2, 0.2, 1.0]),
];

/// 立方体索引（12 个三角形，顺时针为正面）
pub const CUBE_INDICES: [u32; 36] = [
    2, 0, 1, 2, 3, 0, //
    4, 6, 5, 4, 7, 6, //
    0, 7, 4, 0, 3, 7, //
    1, 0, 4, 1, 4, 5, //
    1, 5, 2, 5, 6, 2, //
    3, 6, 7, 3, 2, 6,
];

/// 默认三角形（顺时针）
pub const TRIANGLE_VERTICES: [Vertex; 3] = [
    Vertex::new([-0.5, -0.5, 0.0], [1.0, 0.0, 0.0, 1.0]),
    Vertex::new([0.0, 0.5, 0.0], [0.0, 1.0, 0.0, 1.0]),
    Vertex::new([0.5, -0.5, 0.0], [0.0, 0.0, 1.0, 1.0]),
];
