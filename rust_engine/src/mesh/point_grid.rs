//! 均匀空间哈希网格（点云球查询）

use std::collections::HashMap;

use glam::{IVec3, Vec3};

/// 均匀空间哈希网格
///
/// 构建后只读。球查询的遍历顺序固定：格子按 z → y → x（x 变化最快），
/// 格子内按插入顺序，因此同样的输入总是得到同样的候选顺序。
pub struct PointHashGrid {
    cell_size: f32,
    inv_cell_size: f32,
    cells: HashMap<IVec3, Vec<(u32, Vec3)>>,
    /// 非空格子，按 (z, y, x) 排序
    sorted_keys: Vec<IVec3>,
    point_count: usize,
}

impl PointHashGrid {
    /// 以给定格子尺寸构建，点的索引即其在切片中的下标
    pub fn build(points: &[Vec3], cell_size: f32) -> Self {
        let cell_size = if cell_size.is_finite() && cell_size > 0.0 {
            cell_size
        } else {
            1.0
        };
        let inv_cell_size = 1.0 / cell_size;

        let mut cells: HashMap<IVec3, Vec<(u32, Vec3)>> = HashMap::with_capacity(points.len());
        for (index, &point) in points.iter().enumerate() {
            let key = cell_key(point, inv_cell_size);
            cells.entry(key).or_default().push((index as u32, point));
        }

        let mut sorted_keys: Vec<IVec3> = cells.keys().copied().collect();
        sorted_keys.sort_by_key(|k| (k.z, k.y, k.x));

        Self {
            cell_size,
            inv_cell_size,
            cells,
            sorted_keys,
            point_count: points.len(),
        }
    }

    pub fn cell_size(&self) -> f32 {
        self.cell_size
    }

    pub fn len(&self) -> usize {
        self.point_count
    }

    pub fn is_empty(&self) -> bool {
        self.point_count == 0
    }

    /// 枚举球内的点：回调参数为 (点索引, 距离平方)，返回 false 时停止枚举
    pub fn for_each_in_ball<F>(&self, center: Vec3, radius: f32, mut visit: F)
    where
        F: FnMut(u32, f32) -> bool,
    {
        if self.point_count == 0 || !(radius >= 0.0) {
            return;
        }
        let radius_sq = radius * radius;
        let min = cell_key(center - Vec3::splat(radius), self.inv_cell_size);
        let max = cell_key(center + Vec3::splat(radius), self.inv_cell_size);

        let mut visit_cell = |points: &Vec<(u32, Vec3)>| -> bool {
            for &(index, point) in points {
                let dist_sq = center.distance_squared(point);
                if dist_sq <= radius_sq && !visit(index, dist_sq) {
                    return false;
                }
            }
            true
        };

        // 范围内格子比非空格子还多时，改为遍历排好序的非空格子，顺序不变
        let span = (max - min + IVec3::ONE).as_dvec3();
        let range_volume = span.x * span.y * span.z;
        if range_volume > self.sorted_keys.len() as f64 {
            for key in &self.sorted_keys {
                if key.cmplt(min).any() || key.cmpgt(max).any() {
                    continue;
                }
                if let Some(points) = self.cells.get(key) {
                    if !visit_cell(points) {
                        return;
                    }
                }
            }
            return;
        }

        for z in min.z..=max.z {
            for y in min.y..=max.y {
                for x in min.x..=max.x {
                    if let Some(points) = self.cells.get(&IVec3::new(x, y, z)) {
                        if !visit_cell(points) {
                            return;
                        }
                    }
                }
            }
        }
    }
}

fn cell_key(point: Vec3, inv_cell_size: f32) -> IVec3 {
    (point * inv_cell_size).floor().as_ivec3()
}
