//! 核心功能模块
//!
//! 本模块提供了引导流程的基础功能，包括数学库、日志系统、配置管理和错误处理。
//! 这些模块独立于具体的图形驱动。
//!
//! # 模块组织
//!
//! - `math`：行向量约定的矩阵辅助函数（基于 nalgebra）
//! - `log`：日志系统，提供结构化的日志记录功能
//! - `config`：配置管理，支持从可选的配置文件加载设置
//! - `error`：错误处理，定义统一的错误类型

pub mod config;
pub mod error;
pub mod log;
pub mod math;

// 重新导出常用类型，方便使用
pub use config::{Config, SceneConfig};
pub use error::{DistError, Result};
pub use math::{Matrix4, Vector3, Vector4};
