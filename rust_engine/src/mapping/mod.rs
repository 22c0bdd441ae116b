//! 高模 → 低模稀疏映射

mod asset;
mod sparse_matrix;

pub use asset::MeshMappingAsset;
pub use sparse_matrix::SparseMappingMatrix;

/// 未压缩的映射条目（COO 三元组）
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Triplet {
    /// 低模顶点索引
    pub row: u32,
    /// 高模顶点索引
    pub col: u32,
    pub weight: f32,
}

impl Triplet {
    pub fn new(row: u32, col: u32, weight: f32) -> Self {
        Self { row, col, weight }
    }
}
