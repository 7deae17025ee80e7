//! wgpu 图形驱动
//!
//! wgpu 是一个跨平台的图形 API，可以在 Vulkan、Metal、DirectX 12、
//! OpenGL 等多种后端上运行。引导流程选中的后端类型映射为单一的
//! `wgpu::Backends`，实例只启用这一个后端。
//!
//! # 模块结构
//!
//! - `backend` - WgpuFactory（实例、适配器、设备、表面）
//! - `device` - RenderDevice / ImmediateContext 实现
//! - `swapchain` - Swapchain 实现

mod backend;
mod device;
mod swapchain;

pub use backend::{available_backends, wgpu_backends, WgpuFactory};
pub use device::{WgpuContext, WgpuDevice, WgpuShared};
pub use swapchain::WgpuSwapchain;
