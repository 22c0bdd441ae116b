//! KNN 空间哈希映射
//!
//! 每个低模顶点取 k 个高模近邻，按 1/(d²+ε) 加权并归一化。
//! 近邻按网格遍历顺序先到先得，不保证是精确的 k 近邻。

use glam::Vec3;

use super::MappingStrategy;
use crate::config::get_config;
use crate::mapping::{SparseMappingMatrix, Triplet};
use crate::mesh::{MeshData, PointHashGrid};

/// KNN 映射策略
#[derive(Debug, Clone)]
pub struct KnnMappingStrategy {
    k: usize,
    epsilon: f64,
}

impl KnnMappingStrategy {
    pub fn new(k: usize, epsilon: f64) -> Self {
        Self {
            k: k.max(1),
            epsilon,
        }
    }

    pub fn k(&self) -> usize {
        self.k
    }

    pub fn epsilon(&self) -> f64 {
        self.epsilon
    }

    /// 逐步扩大半径收集近邻
    ///
    /// 前几轮找到的近邻保留，更大的半径只追加尚未收集的点，直到凑满 k 个。
    fn collect_neighbors(
        &self,
        grid: &PointHashGrid,
        query: Vec3,
        start_radius: f32,
        max_radius: f32,
        neighbors: &mut Vec<u32>,
    ) {
        neighbors.clear();
        let mut radius = start_radius;
        loop {
            grid.for_each_in_ball(query, radius, |index, _| {
                if !neighbors.contains(&index) {
                    neighbors.push(index);
                }
                neighbors.len() < self.k
            });

            if neighbors.len() >= self.k || radius >= max_radius {
                break;
            }
            radius *= 2.0;
        }
    }
}

impl Default for KnnMappingStrategy {
    fn default() -> Self {
        let config = get_config();
        Self::new(config.knn_neighbors, config.knn_epsilon)
    }
}

impl MappingStrategy for KnnMappingStrategy {
    fn build_mapping_matrix(&self, high_res: &MeshData, low_res: &MeshData) -> SparseMappingMatrix {
        let num_rows = low_res.vertex_count();
        let num_cols = high_res.vertex_count();

        let Some((min, max)) = high_res.bounds() else {
            log::warn!("[KNN 映射] 高模 '{}' 没有顶点", high_res.name);
            return SparseMappingMatrix::new(num_rows, num_cols);
        };

        // 格子尺寸 = 包围盒对角线 / sqrt(顶点数)，退化包围盒用 1.0
        let diagonal = (max - min).length();
        let mut cell_size = diagonal / (num_cols as f32).sqrt();
        if !(cell_size.is_finite() && cell_size > 0.0) {
            cell_size = 1.0;
        }
        let grid = PointHashGrid::build(&high_res.positions, cell_size);

        let mut triplets = Vec::with_capacity(num_rows * self.k);
        let mut neighbors = Vec::with_capacity(self.k);
        let mut weights = Vec::with_capacity(self.k);
        let mut unmatched = 0usize;

        for (low_index, &query) in low_res.positions.iter().enumerate() {
            self.collect_neighbors(&grid, query, cell_size, diagonal, &mut neighbors);
            if neighbors.is_empty() {
                unmatched += 1;
                continue;
            }

            weights.clear();
            let query = query.as_dvec3();
            let mut sum = 0.0f64;
            for &high_index in &neighbors {
                let dist_sq = query.distance_squared(high_res.positions[high_index as usize].as_dvec3());
                let w = 1.0 / (dist_sq + self.epsilon);
                weights.push(w);
                sum += w;
            }

            for (&high_index, &w) in neighbors.iter().zip(&weights) {
                triplets.push(Triplet::new(low_index as u32, high_index, (w / sum) as f32));
            }
        }

        if get_config().debug_log {
            log::debug!(
                "[KNN 映射] 格子尺寸={:.5}, 对角线={:.5}, 三元组={}, 未匹配低模顶点={}",
                cell_size,
                diagonal,
                triplets.len(),
                unmatched
            );
        }
        if unmatched > 0 {
            log::warn!(
                "[KNN 映射] {} / {} 个低模顶点没有找到近邻",
                unmatched,
                num_rows
            );
        }

        let matrix = SparseMappingMatrix::from_triplets(&triplets, num_rows, num_cols);
        log::info!(
            "[KNN 映射] 构建完成: {} x {}, {} 个非零项 (k={})",
            matrix.num_rows(),
            matrix.num_cols(),
            matrix.nnz(),
            self.k
        );
        matrix
    }

    fn name(&self) -> &str {
        "KNN"
    }
}
