//! 网格映射策略
//!
//! 策略把高模/低模两份网格转换成 (低模顶点, 高模顶点, 权重) 三元组，
//! 再由 [`SparseMappingMatrix`] 压缩成 CSR。

mod knn;
mod surface_projection;

pub use knn::KnnMappingStrategy;
pub use surface_projection::SurfaceProjectionStrategy;

use std::fmt;
use std::str::FromStr;

use crate::config::get_config;
use crate::mapping::SparseMappingMatrix;
use crate::mesh::MeshData;
use crate::ClothError;

/// 映射策略
///
/// 结果矩阵为 低模顶点数 × 高模顶点数，同样的输入必须得到同样的矩阵。
pub trait MappingStrategy {
    fn build_mapping_matrix(&self, high_res: &MeshData, low_res: &MeshData) -> SparseMappingMatrix;

    /// 策略名（仅用于日志）
    fn name(&self) -> &str;
}

/// 可选的映射策略
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StrategyKind {
    Knn,
    SurfaceProjection,
}

impl StrategyKind {
    /// 按全局配置创建策略
    pub fn create(self) -> Box<dyn MappingStrategy> {
        match self {
            StrategyKind::Knn => {
                let config = get_config();
                Box::new(KnnMappingStrategy::new(config.knn_neighbors, config.knn_epsilon))
            }
            StrategyKind::SurfaceProjection => Box::new(SurfaceProjectionStrategy::new()),
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            StrategyKind::Knn => "knn",
            StrategyKind::SurfaceProjection => "surface_projection",
        }
    }
}

impl fmt::Display for StrategyKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for StrategyKind {
    type Err = ClothError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "knn" => Ok(StrategyKind::Knn),
            "surface_projection" => Ok(StrategyKind::SurfaceProjection),
            other => Err(ClothError::UnknownStrategy(other.to_string())),
        }
    }
}
