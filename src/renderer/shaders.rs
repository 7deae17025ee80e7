//! 着色器定义
//!
//! 着色器源码为 WGSL，编译时通过 `include_str!` 嵌入，
//! 运行时由驱动翻译为目标后端的着色器语言。
//!
//! # 渲染管线
//!
//! ```text
//! 顶点数据 -> 顶点着色器 -> 图元装配 -> 光栅化 -> 像素着色器 -> 帧缓冲
//! ```

use crate::gfx::desc::{ShaderDesc, ShaderSource, ShaderStage};

/// 立方体着色器（顶点 + 像素常量）
pub const CUBE_WGSL: &str = include_str!("shaders/cube.wgsl");

/// 三角形着色器（仅顶点常量）
pub const TRIANGLE_WGSL: &str = include_str!("shaders/triangle.wgsl");

/// 顶点着色器入口
pub const VS_ENTRY: &str = "vs_main";

/// 像素着色器入口
pub const PS_ENTRY: &str = "ps_main";

/// 两个阶段共用的常量变量名，按阶段区分
pub const CONSTANTS: &str = "Constants";

pub fn vertex_shader(name: &str, source: &'static str) -> ShaderDesc {
    ShaderDesc {
        name: name.to_string(),
        stage: ShaderStage::Vertex,
        entry_point: VS_ENTRY.to_string(),
        source: ShaderSource::Wgsl(source),
    }
}

pub fn pixel_shader(name: &str, source: &'static str) -> ShaderDesc {
    ShaderDesc {
        name: name.to_string(),
        stage: ShaderStage::Pixel,
        entry_point: PS_ENTRY.to_string(),
        source: ShaderSource::Wgsl(source),
    }
}
