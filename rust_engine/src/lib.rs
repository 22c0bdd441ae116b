//! Cloth Engine - 高模/低模网格映射与神经布料形变运行时
//!
//! 提供：
//! - 稀疏映射矩阵（CSR）的构建与应用
//! - 网格映射策略（KNN 空间哈希 / 表面投影）
//! - ONNX 推理会话封装（动态维度解析）
//! - 布料形变器：推理 + 映射，每帧输出低模顶点偏移

pub mod config;
pub mod deformer;
pub mod inference;
pub mod mapping;
pub mod mesh;
pub mod strategy;

pub use config::{get_config, reset_config, set_config, DeformerConfig};
pub use deformer::ClothDeformer;
pub use inference::{
    InferenceBackend, InputLayout, ModelAsset, ModelInstance, ModelSignature, ModelState, OrtSession, SessionOptions,
};
pub use mapping::{MeshMappingAsset, SparseMappingMatrix, Triplet};
pub use mesh::MeshData;
pub use strategy::{KnnMappingStrategy, MappingStrategy, StrategyKind, SurfaceProjectionStrategy};

use thiserror::Error;

#[derive(Error, Debug)]
pub enum ClothError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Invalid model: {0}")]
    InvalidModel(String),

    #[error("Model not initialized")]
    NotInitialized,

    #[error("Input shape mismatch: {0}")]
    ShapeMismatch(String),

    #[error("Inference backend error: {0}")]
    Backend(String),

    #[error("Mesh error: {0}")]
    Mesh(String),

    #[error("Mapping format error: {0}")]
    MappingFormat(String),

    #[error("Mapping matrix is empty ({rows} x {cols}, 0 non-zero)")]
    EmptyMapping { rows: usize, cols: usize },

    #[error("Unknown mapping strategy: {0}")]
    UnknownStrategy(String),

    #[error("Missing input channel: {0}")]
    MissingInput(String),
}

pub type Result<T> = std::result::Result<T, ClothError>;
