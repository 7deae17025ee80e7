//! 数学库模块
//!
//! 基于 `nalgebra` 提供渲染引导所需的矩阵与向量类型。
//!
//! # 约定
//!
//! 本模块的矩阵辅助函数使用**行向量**约定：顶点变换写作 `v * M`，
//! 平移量位于第 4 行。因此变换链按从左到右的顺序组合：
//!
//! ```text
//! world_view_proj = model * view * pretransform * projection
//! ```
//!
//! 写入 GPU 常量缓冲区时需要转置（着色器按列向量约定 `M * v` 使用矩阵）。

pub use nalgebra::{Matrix4 as Mat4, Unit, Vector3 as Vec3, Vector4 as Vec4};

pub type Vector3 = Vec3<f32>;
pub type Vector4 = Vec4<f32>;
pub type Matrix4 = Mat4<f32>;

/// 数学常量
pub mod constants {
    /// π
    pub const PI: f32 = std::f32::consts::PI;

    /// 角度转弧度的系数
    pub const DEG_TO_RAD: f32 = PI / 180.0;

    /// 浮点数比较的 epsilon
    pub const EPSILON: f32 = 1e-5;
}

/// 角度转弧度
pub fn deg_to_rad(degrees: f32) -> f32 {
    degrees * constants::DEG_TO_RAD
}

/// 检查两个浮点数是否近似相等
pub fn approx_eq(a: f32, b: f32, epsilon: f32) -> bool {
    (a - b).abs() < epsilon
}

/// 检查两个矩阵是否逐元素近似相等
pub fn matrix_approx_eq(a: &Matrix4, b: &Matrix4, epsilon: f32) -> bool {
    a.iter().zip(b.iter()).all(|(x, y)| approx_eq(*x, *y, epsilon))
}

/// 行向量约定的矩阵辅助函数
pub mod matrix {
    use super::*;

    /// 平移矩阵（平移量位于第 4 行）
    pub fn translation(x: f32, y: f32, z: f32) -> Matrix4 {
        let mut m = Matrix4::identity();
        m[(3, 0)] = x;
        m[(3, 1)] = y;
        m[(3, 2)] = z;
        m
    }

    /// 绕任意轴旋转
    ///
    /// `nalgebra` 生成的是列向量约定的旋转矩阵，转置后即为行向量约定。
    pub fn rotation_axis(axis: &Vector3, angle: f32) -> Matrix4 {
        Matrix4::from_axis_angle(&Unit::new_normalize(*axis), angle).transpose()
    }

    /// 绕 X 轴旋转
    pub fn rotation_x(angle: f32) -> Matrix4 {
        rotation_axis(&Vector3::x(), angle)
    }

    /// 绕 Y 轴旋转
    pub fn rotation_y(angle: f32) -> Matrix4 {
        rotation_axis(&Vector3::y(), angle)
    }

    /// 绕 Z 轴旋转
    pub fn rotation_z(angle: f32) -> Matrix4 {
        rotation_axis(&Vector3::z(), angle)
    }

    /// 按行向量约定变换一个点
    pub fn transform_point(point: &Vector3, m: &Matrix4) -> Vector4 {
        let v = Vector4::new(point.x, point.y, point.z, 1.0);
        (v.transpose() * m).transpose()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_translation_row_vector() {
        let m = matrix::translation(1.0, 2.0, 3.0);
        let p = matrix::transform_point(&Vector3::zeros(), &m);

        assert!(approx_eq(p.x, 1.0, 1e-6));
        assert!(approx_eq(p.y, 2.0, 1e-6));
        assert!(approx_eq(p.z, 3.0, 1e-6));
        assert!(approx_eq(p.w, 1.0, 1e-6));
    }

    #[test]
    fn test_rotation_z_quarter_turn() {
        // 行向量约定下绕 Z 轴 +90°：x 轴转到 y 轴
        let m = matrix::rotation_z(constants::PI / 2.0);
        let p = matrix::transform_point(&Vector3::x(), &m);

        assert!(approx_eq(p.x, 0.0, 1e-6));
        assert!(approx_eq(p.y, 1.0, 1e-6));
    }

    #[test]
    fn test_composition_order() {
        // 先旋转再平移
        let m = matrix::rotation_z(constants::PI / 2.0) * matrix::translation(10.0, 0.0, 0.0);
        let p = matrix::transform_point(&Vector3::x(), &m);

        assert!(approx_eq(p.x, 10.0, 1e-5));
        assert!(approx_eq(p.y, 1.0, 1e-5));
    }
}
