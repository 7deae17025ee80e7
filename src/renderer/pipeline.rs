//! 管线构建
//!
//! [`PipelineBuilder`] 在引导阶段运行一次：按配方创建着色器、管线状态、
//! 静态顶点 / 索引缓冲和动态常量缓冲，并绑定所有静态着色器变量。
//! 渲染目标和深度格式取自当前交换链描述，构建后不再改变。

use bytemuck::Pod;
use tracing::{debug, info};

use super::context::RenderContext;
use crate::core::error::{GraphicsError, Result};
use crate::gfx::desc::{
    layout_stride, BindFlags, BufferDesc, CullMode, DrawAttribs, IndexType, LayoutElement,
    PipelineStateDesc, PrimitiveTopology, ShaderDesc, ShaderStage, ShaderVariableDesc,
    StaticBinding, TextureFormat,
};
use crate::gfx::device::{BufferId, PipelineId, ResourceBindingId};

/// 静态几何数据
#[derive(Debug, Clone)]
pub struct StaticGeometry {
    pub vertices: Vec<u8>,
    pub vertex_count: u32,
    pub indices: Option<Vec<u32>>,
}

impl StaticGeometry {
    pub fn new<V: Pod>(vertices: &[V], indices: Option<&[u32]>) -> Result<Self> {
        if let Some(indices) = indices {
            count_u32(indices.len(), "index")?;
        }
        Ok(Self {
            vertices: bytemuck::cast_slice(vertices).to_vec(),
            vertex_count: count_u32(vertices.len(), "vertex")?,
            indices: indices.map(<[u32]>::to_vec),
        })
    }
}

/// 元素个数转换为绘制参数使用的 `u32`
pub(crate) fn count_u32(len: usize, what: &str) -> Result<u32> {
    u32::try_from(len).map_err(|_| {
        GraphicsError::ResourceCreation(format!("{} count {} does not fit in u32", what, len)).into()
    })
}

/// 动态常量缓冲槽
#[derive(Debug, Clone)]
pub struct UniformSlot {
    pub stage: ShaderStage,
    pub name: String,
    pub binding: u32,
    pub size: u64,
}

/// 管线配方
#[derive(Debug, Clone)]
pub struct PipelineRecipe {
    pub name: String,
    pub vertex_shader: ShaderDesc,
    pub pixel_shader: ShaderDesc,
    pub layout: Vec<LayoutElement>,
    pub topology: PrimitiveTopology,
    pub cull_mode: CullMode,
    pub depth_enable: bool,
    pub geometry: StaticGeometry,
    pub uniforms: Vec<UniformSlot>,
}

/// 构建结果：管线、资源绑定和所有缓冲区
#[derive(Debug, Clone)]
pub struct PipelineResources {
    pub pipeline: PipelineId,
    pub binding: ResourceBindingId,
    pub vertex_buffer: BufferId,
    pub index_buffer: Option<BufferId>,
    /// 与配方中 `uniforms` 一一对应
    pub uniform_buffers: Vec<BufferId>,
    pub render_target_format: TextureFormat,
    pub depth_format: TextureFormat,
    pub draw: DrawAttribs,
}

/// 管线构建器（一次性）
pub struct PipelineBuilder {
    recipe: PipelineRecipe,
}

impl PipelineBuilder {
    pub fn new(recipe: PipelineRecipe) -> Self {
        Self { recipe }
    }

    fn check_geometry(&self) -> Result<()> {
        let recipe = &self.recipe;
        let stride = layout_stride(&recipe.layout, 0) as usize;
        let expected = stride * recipe.geometry.vertex_count as usize;

        if recipe.geometry.vertex_count == 0 || expected != recipe.geometry.vertices.len() {
            return Err(GraphicsError::ResourceCreation(format!(
                "'{}': {} vertex bytes do not match {} vertices of stride {}",
                recipe.name,
                recipe.geometry.vertices.len(),
                recipe.geometry.vertex_count,
                stride
            ))
            .into());
        }

        if let Some(indices) = &recipe.geometry.indices {
            if let Some(bad) = indices.iter().find(|i| **i >= recipe.geometry.vertex_count) {
                return Err(GraphicsError::ResourceCreation(format!(
                    "'{}': index {} out of range",
                    recipe.name, bad
                ))
                .into());
            }
        }
        Ok(())
    }

    /// 构建管线和资源；构建器被消耗
    pub fn build(self, render: &RenderContext) -> Result<PipelineResources> {
        self.check_geometry()?;

        let recipe = self.recipe;
        let device = render.device();
        let swapchain_desc = render.swapchain().desc();
        let render_target_format = swapchain_desc.color_format;
        let depth_format = swapchain_desc.depth_format;

        info!(
            "Building pipeline '{}' ({:?} / {:?})",
            recipe.name, render_target_format, depth_format
        );

        // 1. 着色器
        let vertex_shader = device.create_shader(&recipe.vertex_shader)?;
        let pixel_shader = device.create_shader(&recipe.pixel_shader)?;

        // 2. 管线状态
        let variables = recipe
            .uniforms
            .iter()
            .map(|slot| ShaderVariableDesc {
                stage: slot.stage,
                name: slot.name.clone(),
                binding: slot.binding,
            })
            .collect();

        let pipeline = device.create_pipeline_state(&PipelineStateDesc {
            name: recipe.name.clone(),
            vertex_shader,
            pixel_shader,
            render_target_format,
            depth_format,
            topology: recipe.topology,
            cull_mode: recipe.cull_mode,
            depth_enable: recipe.depth_enable,
            layout: recipe.layout.clone(),
            variables,
        })?;

        // 3. 动态常量缓冲
        let mut uniform_buffers = Vec::with_capacity(recipe.uniforms.len());
        let mut bindings = Vec::with_capacity(recipe.uniforms.len());
        for slot in &recipe.uniforms {
            let name = format!("{} {:?} constants", recipe.name, slot.stage);
            let buffer = device.create_buffer(&BufferDesc::dynamic_uniform(name, slot.size), None)?;
            uniform_buffers.push(buffer);
            bindings.push(StaticBinding {
                stage: slot.stage,
                name: slot.name.clone(),
                buffer,
            });
        }

        // 4. 静态变量只绑定一次，生成的资源绑定每次绘制复用
        let binding = device.create_resource_binding(pipeline, &bindings)?;

        // 5. 不可变顶点 / 索引缓冲
        let geometry = &recipe.geometry;
        let vertex_buffer = device.create_buffer(
            &BufferDesc::immutable(
                format!("{} vertex buffer", recipe.name),
                BindFlags::VertexBuffer,
                geometry.vertices.len() as u64,
            ),
            Some(&geometry.vertices),
        )?;

        let index_buffer = match &geometry.indices {
            Some(indices) => {
                let bytes: &[u8] = bytemuck::cast_slice(indices);
                Some(device.create_buffer(
                    &BufferDesc::immutable(
                        format!("{} index buffer", recipe.name),
                        BindFlags::IndexBuffer,
                        bytes.len() as u64,
                    ),
                    Some(bytes),
                )?)
            }
            None => None,
        };

        let draw = match &geometry.indices {
            Some(indices) => DrawAttribs::Indexed {
                index_count: count_u32(indices.len(), "index")?,
                index_type: IndexType::U32,
            },
            None => DrawAttribs::NonIndexed {
                vertex_count: geometry.vertex_count,
            },
        };
        debug!("Pipeline '{}' draws {:?}", recipe.name, draw);

        Ok(PipelineResources {
            pipeline,
            binding,
            vertex_buffer,
            index_buffer,
            uniform_buffers,
            render_target_format,
            depth_format,
            draw,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::renderer::vertex::Vertex;

    #[test]
    fn test_geometry_counts() {
        let vertices = [Vertex::new([0.0; 3], [1.0; 4]); 4];
        let geometry = StaticGeometry::new(&vertices, Some(&[0, 1, 2, 2, 3, 0])).unwrap();

        assert_eq!(geometry.vertex_count, 4);
        assert_eq!(geometry.vertices.len(), 4 * std::mem::size_of::<Vertex>());
        assert_eq!(geometry.indices.as_deref().map(<[u32]>::len), Some(6));
    }

    #[test]
    fn test_count_u32_limits() {
        assert_eq!(count_u32(36, "index").unwrap(), 36);
        assert_eq!(count_u32(u32::MAX as usize, "index").unwrap(), u32::MAX);
    }

    #[cfg(target_pointer_width = "64")]
    #[test]
    fn test_count_u32_overflow_is_resource_error() {
        let err = count_u32(u32::MAX as usize + 1, "vertex").unwrap_err();
        assert!(matches!(
            err,
            crate::core::error::DistError::Graphics(GraphicsError::ResourceCreation(ref msg))
                if msg.contains("vertex count")
        ));
    }
}
