//! 图形后端工厂
//!
//! 选择器确定后端类型之后，由 [`create_factory`] 得到对应的工厂对象，
//! 引导流程再通过它创建设备、立即上下文和交换链。
//!
//! 工厂的单个创建调用失败时只记录诊断信息并返回 `None`，不会中止流程；
//! 是否三者齐全由 `DeviceContext` 统一检查。

use tracing::{debug, info};

use super::backend::{BackendType, Capabilities, PlatformFamily};
use super::desc::SwapchainDescriptor;
use super::device::{ImmediateContext, RenderDevice, Swapchain};
use super::headless::HeadlessFactory;
use super::wgpu::WgpuFactory;
use crate::core::config::{DriverKind, GraphicsConfig};
use crate::platform::NativeWindow;

/// 设备与立即上下文
pub type DeviceAndContext = (
    Option<Box<dyn RenderDevice>>,
    Option<Box<dyn ImmediateContext>>,
);

/// 图形后端工厂
pub trait GraphicsBackendFactory {
    /// 工厂所服务的后端
    fn backend_type(&self) -> BackendType;

    /// 创建设备和立即上下文
    fn create_device_and_contexts(&mut self, window: &NativeWindow) -> DeviceAndContext;

    /// 为窗口创建交换链
    ///
    /// 必须在 [`create_device_and_contexts`](Self::create_device_and_contexts) 之后调用。
    fn create_swapchain(
        &mut self,
        window: &NativeWindow,
        desc: &SwapchainDescriptor,
    ) -> Option<Box<dyn Swapchain>>;
}

/// 根据驱动类型创建工厂
pub fn create_factory(
    graphics: &GraphicsConfig,
    backend: BackendType,
) -> Box<dyn GraphicsBackendFactory> {
    info!("Creating {:?} factory for {}", graphics.driver, backend);

    match graphics.driver {
        DriverKind::Wgpu => Box::new(WgpuFactory::new(backend, graphics.vsync)),
        DriverKind::Headless => Box::new(HeadlessFactory::new(backend)),
    }
}

/// 探测当前平台可用的后端
pub fn probe_capabilities(graphics: &GraphicsConfig, family: PlatformFamily) -> Capabilities {
    let capabilities = match graphics.driver {
        DriverKind::Wgpu => Capabilities::new(family, super::wgpu::available_backends()),
        DriverKind::Headless if graphics.headless_backends.is_empty() => {
            Capabilities::new(family, family.default_backends())
        }
        DriverKind::Headless => {
            Capabilities::new(family, graphics.headless_backends.iter().copied())
        }
    };

    debug!(
        "Capabilities for {:?}: {:?}",
        capabilities.family,
        capabilities.backends()
    );
    capabilities
}
