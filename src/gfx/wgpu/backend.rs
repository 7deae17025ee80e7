//! wgpu 后端工厂
//!
//! 本模块负责 wgpu 图形设备的初始化，包括：
//! - 创建 wgpu 实例（只启用选中的后端）
//! - 创建窗口表面
//! - 选择图形适配器、创建逻辑设备和命令队列
//! - 配置交换链

use std::rc::Rc;
use tracing::{debug, error, info, warn};

use super::device::{WgpuContext, WgpuDevice, WgpuShared};
use super::swapchain::WgpuSwapchain;
use crate::gfx::backend::BackendType;
use crate::gfx::desc::{DepthRange, SwapchainDescriptor, TextureFormat};
use crate::gfx::device::{DeviceInfo, Swapchain};
use crate::gfx::factory::{DeviceAndContext, GraphicsBackendFactory};
use crate::platform::NativeWindow;

/// 后端类型对应的 wgpu 后端集合
///
/// wgpu 没有 D3D11 实现，返回 `None`。
pub fn wgpu_backends(backend: BackendType) -> Option<wgpu::Backends> {
    match backend {
        BackendType::Vulkan => Some(wgpu::Backends::VULKAN),
        BackendType::D3D12 => Some(wgpu::Backends::DX12),
        BackendType::OpenGL => Some(wgpu::Backends::GL),
        BackendType::Metal => Some(wgpu::Backends::METAL),
        BackendType::D3D11 | BackendType::Undefined => None,
    }
}

fn create_instance(backends: wgpu::Backends) -> wgpu::Instance {
    wgpu::Instance::new(wgpu::InstanceDescriptor {
        backends,
        dx12_shader_compiler: Default::default(),
        flags: wgpu::InstanceFlags::default(),
        gles_minor_version: wgpu::Gles3MinorVersion::Automatic,
    })
}

/// 枚举适配器，得到本机可用的后端
pub fn available_backends() -> Vec<BackendType> {
    let instance = create_instance(wgpu::Backends::all());

    let mut found = Vec::new();
    for adapter in instance.enumerate_adapters(wgpu::Backends::all()) {
        let info = adapter.get_info();
        let backend = match info.backend {
            wgpu::Backend::Vulkan => BackendType::Vulkan,
            wgpu::Backend::Dx12 => BackendType::D3D12,
            wgpu::Backend::Gl => BackendType::OpenGL,
            wgpu::Backend::Metal => BackendType::Metal,
            _ => continue,
        };

        debug!("Found adapter '{}' on {}", info.name, backend);
        if !found.contains(&backend) {
            found.push(backend);
        }
    }
    found
}

pub(super) fn to_wgpu_format(format: TextureFormat) -> wgpu::TextureFormat {
    match format {
        TextureFormat::Rgba8Unorm => wgpu::TextureFormat::Rgba8Unorm,
        TextureFormat::Rgba8UnormSrgb => wgpu::TextureFormat::Rgba8UnormSrgb,
        TextureFormat::Bgra8Unorm => wgpu::TextureFormat::Bgra8Unorm,
        TextureFormat::Bgra8UnormSrgb => wgpu::TextureFormat::Bgra8UnormSrgb,
        TextureFormat::D32Float => wgpu::TextureFormat::Depth32Float,
        TextureFormat::D24UnormS8Uint => wgpu::TextureFormat::Depth24PlusStencil8,
    }
}

fn from_wgpu_format(format: wgpu::TextureFormat) -> Option<TextureFormat> {
    match format {
        wgpu::TextureFormat::Rgba8Unorm => Some(TextureFormat::Rgba8Unorm),
        wgpu::TextureFormat::Rgba8UnormSrgb => Some(TextureFormat::Rgba8UnormSrgb),
        wgpu::TextureFormat::Bgra8Unorm => Some(TextureFormat::Bgra8Unorm),
        wgpu::TextureFormat::Bgra8UnormSrgb => Some(TextureFormat::Bgra8UnormSrgb),
        _ => None,
    }
}

/// wgpu 后端工厂
///
/// 设备创建时生成的表面和适配器暂存在工厂中，供随后的交换链创建使用。
pub struct WgpuFactory {
    backend: BackendType,
    vsync: bool,
    instance: Option<wgpu::Instance>,
    adapter: Option<wgpu::Adapter>,
    surface: Option<wgpu::Surface<'static>>,
    shared: Option<Rc<WgpuShared>>,
}

impl WgpuFactory {
    pub fn new(backend: BackendType, vsync: bool) -> Self {
        Self {
            backend,
            vsync,
            instance: None,
            adapter: None,
            surface: None,
            shared: None,
        }
    }

    fn required_limits(&self, adapter: &wgpu::Adapter) -> wgpu::Limits {
        if self.backend.is_gl() {
            wgpu::Limits::downlevel_webgl2_defaults().using_resolution(adapter.limits())
        } else {
            wgpu::Limits::default()
        }
    }
}

impl GraphicsBackendFactory for WgpuFactory {
    fn backend_type(&self) -> BackendType {
        self.backend
    }

    fn create_device_and_contexts(&mut self, window: &NativeWindow) -> DeviceAndContext {
        info!("Initializing wgpu on {}", self.backend);

        let Some(backends) = wgpu_backends(self.backend) else {
            error!("{} is not available through wgpu", self.backend);
            return (None, None);
        };

        // 1. 创建 wgpu 实例
        let instance = create_instance(backends);

        // 2. 创建表面
        let surface = match window.surface_handle() {
            Some(handle) => match instance.create_surface(handle) {
                Ok(surface) => Some(surface),
                Err(e) => {
                    error!("Failed to create surface: {}", e);
                    None
                }
            },
            None => {
                warn!("Window has no native surface, presentation disabled");
                None
            }
        };

        // 3. 请求适配器
        let adapter = pollster::block_on(instance.request_adapter(&wgpu::RequestAdapterOptions {
            power_preference: wgpu::PowerPreference::HighPerformance,
            compatible_surface: surface.as_ref(),
            force_fallback_adapter: false,
        }));
        let Some(adapter) = adapter else {
            error!("No suitable {} adapter", self.backend);
            return (None, None);
        };

        let adapter_info = adapter.get_info();
        info!("Selected adapter: {} ({:?})", adapter_info.name, adapter_info.backend);

        // 4. 请求设备和队列
        let device_desc = wgpu::DeviceDescriptor {
            label: Some("Main Device"),
            required_features: wgpu::Features::empty(),
            required_limits: self.required_limits(&adapter),
        };
        let (device, queue) = match pollster::block_on(adapter.request_device(&device_desc, None))
        {
            Ok(pair) => pair,
            Err(e) => {
                error!("Failed to create device: {}", e);
                return (None, None);
            }
        };

        device.on_uncaptured_error(Box::new(|e: wgpu::Error| {
            error!("Uncaptured wgpu error: {}", e);
        }));

        let info = device_info(self.backend, adapter_info.name);

        let shared = Rc::new(WgpuShared::new(device, queue));
        self.shared = Some(shared.clone());
        self.instance = Some(instance);
        self.adapter = Some(adapter);
        self.surface = surface;

        (
            Some(Box::new(WgpuDevice::new(info, shared.clone()))),
            Some(Box::new(WgpuContext::new(shared))),
        )
    }

    fn create_swapchain(
        &mut self,
        _window: &NativeWindow,
        desc: &SwapchainDescriptor,
    ) -> Option<Box<dyn Swapchain>> {
        let (Some(shared), Some(adapter)) = (self.shared.clone(), self.adapter.as_ref()) else {
            error!("Swapchain requested before the device was created");
            return None;
        };
        let Some(surface) = self.surface.take() else {
            error!("No surface to build a swapchain on");
            return None;
        };

        let caps = surface.get_capabilities(adapter);

        // 优先使用请求的格式，其次是 sRGB 格式
        let requested = to_wgpu_format(desc.color_format);
        let surface_format = caps
            .formats
            .iter()
            .copied()
            .find(|f| *f == requested)
            .or_else(|| {
                caps.formats.iter().copied().find(|f| {
                    matches!(
                        f,
                        wgpu::TextureFormat::Bgra8UnormSrgb | wgpu::TextureFormat::Rgba8UnormSrgb
                    )
                })
            })
            .or_else(|| {
                caps.formats
                    .iter()
                    .copied()
                    .find(|f| from_wgpu_format(*f).is_some())
            });
        let Some((surface_format, color_format)) =
            surface_format.and_then(|f| from_wgpu_format(f).map(|c| (f, c)))
        else {
            error!("Surface offers no supported color format: {:?}", caps.formats);
            return None;
        };
        debug!("Surface format: {:?}", surface_format);

        let present_mode = if self.vsync || !caps.present_modes.contains(&wgpu::PresentMode::Immediate)
        {
            wgpu::PresentMode::Fifo
        } else {
            wgpu::PresentMode::Immediate
        };

        let Some(alpha_mode) = caps.alpha_modes.first().copied() else {
            error!("Surface reports no alpha modes");
            return None;
        };

        let config = wgpu::SurfaceConfiguration {
            usage: wgpu::TextureUsages::RENDER_ATTACHMENT,
            format: surface_format,
            width: desc.width,
            height: desc.height,
            present_mode,
            alpha_mode,
            view_formats: vec![],
            desired_maximum_frame_latency: desc.buffer_count.max(1),
        };

        let mut swap_desc = desc.clone();
        swap_desc.color_format = color_format;
        Some(Box::new(WgpuSwapchain::new(shared, surface, config, swap_desc)))
    }
}

/// wgpu 设备信息；OpenGL 也不使用原生的 [-1, 1] 深度范围
///
/// wgpu 在所有后端上把裁剪空间深度统一为 [0, 1]。
fn device_info(backend: BackendType, adapter_name: String) -> DeviceInfo {
    DeviceInfo {
        backend,
        depth_range: DepthRange::ZeroToOne,
        adapter_name,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_backend_mapping() {
        assert_eq!(wgpu_backends(BackendType::Vulkan), Some(wgpu::Backends::VULKAN));
        assert_eq!(wgpu_backends(BackendType::OpenGL), Some(wgpu::Backends::GL));
        assert_eq!(wgpu_backends(BackendType::D3D11), None);
        assert_eq!(wgpu_backends(BackendType::Undefined), None);
    }

    #[test]
    fn test_format_mapping() {
        for format in [
            TextureFormat::Rgba8Unorm,
            TextureFormat::Rgba8UnormSrgb,
            TextureFormat::Bgra8Unorm,
            TextureFormat::Bgra8UnormSrgb,
        ] {
            assert_eq!(from_wgpu_format(to_wgpu_format(format)), Some(format));
        }
        assert_eq!(
            to_wgpu_format(TextureFormat::D32Float),
            wgpu::TextureFormat::Depth32Float
        );
    }

    #[test]
    fn test_depth_range_is_zero_to_one_on_every_backend() {
        for backend in [
            BackendType::Vulkan,
            BackendType::D3D12,
            BackendType::Metal,
            BackendType::OpenGL,
        ] {
            let info = device_info(backend, "adapter".to_string());
            assert_eq!(info.backend, backend);
            assert_eq!(info.depth_range, DepthRange::ZeroToOne);
        }
        assert_ne!(
            device_info(BackendType::OpenGL, String::new()).depth_range,
            DepthRange::native_for(BackendType::OpenGL)
        );
    }

    #[test]
    fn test_opengl_projection_maps_near_plane_to_zero() {
        use crate::gfx::desc::SurfaceTransform;
        use crate::renderer::projection::adjusted_projection_matrix;

        let info = device_info(BackendType::OpenGL, String::new());
        let (near, far) = (0.1_f32, 100.0_f32);
        let proj = adjusted_projection_matrix(
            std::f32::consts::FRAC_PI_4,
            near,
            far,
            SurfaceTransform::Identity,
            16.0 / 9.0,
            info.depth_range,
        );

        let clip_z = |z: f32| (z * proj[(2, 2)] + proj[(3, 2)]) / z;
        assert!(clip_z(near).abs() < 1e-5);
        assert!((clip_z(far) - 1.0).abs() < 1e-4);
    }
}
