//! 图形后端模块
//!
//! 本模块定义了引导流程使用的图形抽象和两个驱动实现：
//! - `backend`：后端类型、平台能力和后端选择
//! - `desc`：格式、交换链、缓冲区和管线描述
//! - `device`：`RenderDevice` / `ImmediateContext` / `Swapchain` 接口
//! - `factory`：按选中的后端创建设备、上下文和交换链
//! - `wgpu`：基于 wgpu 的真实驱动（Vulkan、Metal、DirectX 12、OpenGL）
//! - `headless`：不访问 GPU 的记录型驱动
//!
//! 所有驱动都实现同一组 trait，引导流程只通过 trait 对象访问它们。

pub mod backend;
pub mod desc;
pub mod device;
pub mod factory;
pub mod headless;
pub mod wgpu;

pub use backend::{select, BackendType, Capabilities, PlatformFamily};
pub use device::{ImmediateContext, RenderDevice, ScopedWrite, Swapchain};
pub use factory::{create_factory, probe_capabilities, GraphicsBackendFactory};
