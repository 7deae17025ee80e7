//! 投影矩阵修正
//!
//! 移动平台上呈现表面可能带有旋转（预变换），合成器不再旋转画面，
//! 需要由投影阶段补上对应的旋转，并在宽高互换时交换视场缩放。
//!
//! 矩阵使用行向量约定（`clip = v * M`）。

use crate::core::error::{GraphicsError, Result};
use crate::core::math::{constants::PI, matrix, Matrix4, Vector3};
use crate::gfx::desc::{DepthRange, SurfaceTransform};

/// 表面预变换对应的修正矩阵
///
/// `Optimal` 只在创建交换链时有效，绘制时仍为 `Optimal` 说明交换链
/// 没有解析预变换，返回 `UnsupportedSurfaceTransform`；镜像变换同样不支持。
pub fn surface_pretransform_matrix(
    view_axis: &Vector3,
    pretransform: SurfaceTransform,
) -> Result<Matrix4> {
    match pretransform {
        SurfaceTransform::Identity => Ok(Matrix4::identity()),
        SurfaceTransform::Rotate90 => Ok(matrix::rotation_axis(view_axis, -PI / 2.0)),
        SurfaceTransform::Rotate180 => Ok(matrix::rotation_axis(view_axis, -PI)),
        SurfaceTransform::Rotate270 => Ok(matrix::rotation_axis(view_axis, -PI * 3.0 / 2.0)),
        SurfaceTransform::Optimal
        | SurfaceTransform::HorizontalMirror
        | SurfaceTransform::HorizontalMirrorRotate90
        | SurfaceTransform::HorizontalMirrorRotate180
        | SurfaceTransform::HorizontalMirrorRotate270 => {
            Err(GraphicsError::UnsupportedSurfaceTransform(pretransform).into())
        }
    }
}

/// 考虑表面旋转的透视投影矩阵
///
/// 表面旋转 90°/270° 时，宽高比作用在 y 方向。
pub fn adjusted_projection_matrix(
    fov: f32,
    near: f32,
    far: f32,
    pretransform: SurfaceTransform,
    aspect_ratio: f32,
    depth_range: DepthRange,
) -> Matrix4 {
    let base = 1.0 / (fov / 2.0).tan();

    let (x_scale, y_scale) = if pretransform.swaps_axes() {
        (base, base * aspect_ratio)
    } else {
        (base / aspect_ratio, base)
    };

    let mut proj = Matrix4::zeros();
    proj[(0, 0)] = x_scale;
    proj[(1, 1)] = y_scale;
    proj[(2, 3)] = 1.0;

    match depth_range {
        DepthRange::ZeroToOne => {
            proj[(2, 2)] = far / (far - near);
            proj[(3, 2)] = -near * far / (far - near);
        }
        DepthRange::NegativeOneToOne => {
            proj[(2, 2)] = (far + near) / (far - near);
            proj[(3, 2)] = -2.0 * near * far / (far - near);
        }
    }

    proj
}
