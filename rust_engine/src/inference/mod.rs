//! 推理会话
//!
//! - `ModelInstance`：状态机 + 动态维度解析，对后端通用
//! - `OrtSession`：基于 ONNX Runtime 的后端
//! - `ModelAsset` / `InputLayout`：模型字节与输入拼装

mod asset;
mod input;
mod ort_backend;
mod session;
mod shape;

pub use asset::ModelAsset;
pub use input::{InputChannel, InputLayout};
pub use ort_backend::OrtSession;
pub use session::{ModelInstance, ModelState};
pub use shape::{resolve_input_dims, validate_concrete_shape};

#[cfg(test)]
pub(crate) use session::tests::FakeBackend;

use crate::config::get_config;
use crate::Result;

/// 会话创建参数
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionOptions {
    pub intra_op_threads: usize,
    /// 0 = 关闭，1 = 基础，2 = 扩展，3 = 全部
    pub optimization_level: u8,
}

impl SessionOptions {
    /// 从全局配置读取
    pub fn from_config() -> Self {
        let config = get_config();
        Self {
            intra_op_threads: config.intra_op_threads,
            optimization_level: config.optimization_level,
        }
    }
}

impl Default for SessionOptions {
    fn default() -> Self {
        Self {
            intra_op_threads: 1,
            optimization_level: 1,
        }
    }
}

/// 模型输入输出签名
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ModelSignature {
    /// 第一个输入名（推理时使用）
    pub input_name: String,
    /// 第一个输出名（推理时使用）
    pub output_name: String,
    /// 第一个输入的声明形状，负数表示动态维度
    pub input_shape: Vec<i64>,
    pub input_names: Vec<String>,
    pub output_names: Vec<String>,
}

impl ModelSignature {
    pub fn input_count(&self) -> usize {
        self.input_names.len()
    }

    pub fn output_count(&self) -> usize {
        self.output_names.len()
    }
}

/// 推理后端
///
/// 后端只负责会话本身：加载时报告签名，运行时接收已解析好的具体形状。
pub trait InferenceBackend: Sized {
    /// 从内存中的模型字节创建会话
    fn load(bytes: &[u8], options: &SessionOptions) -> Result<(Self, ModelSignature)>;

    /// 以单个命名输入运行，返回指定输出的全部浮点数
    fn run(&mut self, input_name: &str, dims: &[i64], input: &[f32], output_name: &str) -> Result<Vec<f32>>;
}
