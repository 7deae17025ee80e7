//! wgpu 交换链
//!
//! 封装表面配置和深度纹理。wgpu 没有表面预变换，
//! 创建时统一解析为 `Identity`。

use std::rc::Rc;
use tracing::{debug, warn};

use super::backend::to_wgpu_format;
use super::device::{WgpuShared, BACK_BUFFER, DEPTH_BUFFER};
use crate::core::error::{GraphicsError, Result};
use crate::gfx::desc::{SurfaceTransform, SwapchainDescriptor};
use crate::gfx::device::{Swapchain, TextureViewId};

/// wgpu 交换链
pub struct WgpuSwapchain {
    shared: Rc<WgpuShared>,
    surface: wgpu::Surface<'static>,
    config: wgpu::SurfaceConfiguration,
    desc: SwapchainDescriptor,
    current: Option<wgpu::SurfaceTexture>,
}

impl WgpuSwapchain {
    pub(super) fn new(
        shared: Rc<WgpuShared>,
        surface: wgpu::Surface<'static>,
        config: wgpu::SurfaceConfiguration,
        mut desc: SwapchainDescriptor,
    ) -> Self {
        if !matches!(
            desc.pre_transform,
            SurfaceTransform::Optimal | SurfaceTransform::Identity
        ) {
            warn!(
                "Surface pretransform {:?} is not supported by wgpu, using Identity",
                desc.pre_transform
            );
        }
        desc.pre_transform = SurfaceTransform::Identity;

        let mut swapchain = Self {
            shared,
            surface,
            config,
            desc,
            current: None,
        };
        swapchain.configure();
        swapchain
    }

    /// 按当前尺寸配置表面并重建深度纹理；零尺寸时跳过
    fn configure(&mut self) {
        if self.desc.is_zero_sized() {
            debug!("Zero-sized surface, configuration deferred");
            self.shared.frame.borrow_mut().depth = None;
            return;
        }

        self.config.width = self.desc.width;
        self.config.height = self.desc.height;
        self.surface.configure(&self.shared.device, &self.config);

        let depth_texture = self
            .shared
            .device
            .create_texture(&wgpu::TextureDescriptor {
                label: Some("Depth Texture"),
                size: wgpu::Extent3d {
                    width: self.desc.width,
                    height: self.desc.height,
                    depth_or_array_layers: 1,
                },
                mip_level_count: 1,
                sample_count: 1,
                dimension: wgpu::TextureDimension::D2,
                format: to_wgpu_format(self.desc.depth_format),
                usage: wgpu::TextureUsages::RENDER_ATTACHMENT,
                view_formats: &[],
            });
        self.shared.frame.borrow_mut().depth =
            Some(depth_texture.create_view(&wgpu::TextureViewDescriptor::default()));
    }

    fn acquire(&mut self) -> Result<wgpu::SurfaceTexture> {
        match self.surface.get_current_texture() {
            Ok(texture) => Ok(texture),
            Err(wgpu::SurfaceError::Lost | wgpu::SurfaceError::Outdated) => {
                debug!("Surface lost or outdated, reconfiguring");
                self.configure();
                self.surface.get_current_texture().map_err(|e| {
                    GraphicsError::SwapchainError(format!("Failed to acquire next image: {}", e))
                        .into()
                })
            }
            Err(e) => Err(GraphicsError::SwapchainError(format!(
                "Failed to acquire next image: {}",
                e
            ))
            .into()),
        }
    }
}

impl Swapchain for WgpuSwapchain {
    fn desc(&self) -> &SwapchainDescriptor {
        &self.desc
    }

    fn resize(&mut self, width: u32, height: u32) -> Result<()> {
        debug!("Resizing swapchain to {}x{}", width, height);

        self.shared.frame.borrow_mut().color = None;
        self.current = None;
        self.desc.width = width;
        self.desc.height = height;
        self.configure();
        Ok(())
    }

    fn current_back_buffer(&mut self) -> Result<TextureViewId> {
        if self.desc.is_zero_sized() {
            return Err(GraphicsError::SwapchainError(
                "no back buffer for a zero-sized swapchain".to_string(),
            )
            .into());
        }

        if self.current.is_none() {
            let texture = self.acquire()?;
            let view = texture
                .texture
                .create_view(&wgpu::TextureViewDescriptor::default());
            self.shared.frame.borrow_mut().color = Some(view);
            self.current = Some(texture);
        }
        Ok(BACK_BUFFER)
    }

    fn depth_buffer(&self) -> Option<TextureViewId> {
        self.shared
            .frame
            .borrow()
            .depth
            .as_ref()
            .map(|_| DEPTH_BUFFER)
    }

    fn present(&mut self) -> Result<()> {
        self.shared.flush_pending_clears();
        self.shared.frame.borrow_mut().color = None;

        match self.current.take() {
            Some(texture) => {
                texture.present();
                Ok(())
            }
            None => Err(GraphicsError::SwapchainError(
                "present without an acquired back buffer".to_string(),
            )
            .into()),
        }
    }
}
