//! 表面投影映射
//!
//! 低模顶点投影到高模最近的三角形上，用投影点的重心坐标作为三个角点的权重。

use super::MappingStrategy;
use crate::config::get_config;
use crate::mapping::{SparseMappingMatrix, Triplet};
use crate::mesh::{MeshData, TriangleSurface};

/// 表面投影策略（BVH 最近点）
#[derive(Debug, Clone, Default)]
pub struct SurfaceProjectionStrategy;

impl SurfaceProjectionStrategy {
    pub fn new() -> Self {
        Self
    }
}

impl MappingStrategy for SurfaceProjectionStrategy {
    fn build_mapping_matrix(&self, high_res: &MeshData, low_res: &MeshData) -> SparseMappingMatrix {
        let num_rows = low_res.vertex_count();
        let num_cols = high_res.vertex_count();

        let surface = match TriangleSurface::build(high_res) {
            Ok(surface) => surface,
            Err(e) => {
                log::warn!("[表面投影] 高模 '{}' 没有可用的三角形表面: {}", high_res.name, e);
                return SparseMappingMatrix::new(num_rows, num_cols);
            }
        };

        let mut triplets = Vec::with_capacity(num_rows * 3);
        let mut unmatched = 0usize;
        let mut max_distance = 0.0f32;

        for (low_index, &query) in low_res.positions.iter().enumerate() {
            let Some(hit) = surface.nearest(query) else {
                unmatched += 1;
                continue;
            };
            max_distance = max_distance.max(hit.point.distance(query));

            // 零权重也保留，每个顶点固定三项
            for (&corner, &weight) in hit.corners.iter().zip(&hit.barycentric) {
                triplets.push(Triplet::new(low_index as u32, corner, weight));
            }
        }

        if get_config().debug_log {
            log::debug!(
                "[表面投影] 三角形={}, 三元组={}, 最大投影距离={:.5}",
                surface.triangle_count(),
                triplets.len(),
                max_distance
            );
        }
        if unmatched > 0 {
            log::warn!(
                "[表面投影] {} / {} 个低模顶点没有找到三角形",
                unmatched,
                num_rows
            );
        }

        let matrix = SparseMappingMatrix::from_triplets(&triplets, num_rows, num_cols);
        log::info!(
            "[表面投影] 构建完成: {} x {}, {} 个非零项",
            matrix.num_rows(),
            matrix.num_cols(),
            matrix.nnz()
        );
        matrix
    }

    fn name(&self) -> &str {
        "Surface Projection (BVH)"
    }
}
