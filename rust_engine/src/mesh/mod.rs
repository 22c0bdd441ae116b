//! 网格数据与空间查询结构

mod point_grid;
mod surface;

pub use point_grid::PointHashGrid;
pub use surface::{SurfaceHit, TriangleSurface};

use glam::Vec3;

use crate::{ClothError, Result};

/// 映射用的网格数据（只需要位置与三角形）
#[derive(Clone, Debug, Default)]
pub struct MeshData {
    pub name: String,
    pub positions: Vec<Vec3>,
    pub triangles: Vec<[u32; 3]>,
}

impl MeshData {
    pub fn new(name: impl Into<String>, positions: Vec<Vec3>, triangles: Vec<[u32; 3]>) -> Self {
        Self {
            name: name.into(),
            positions,
            triangles,
        }
    }

    /// 只有点云（KNN 映射不需要三角形）
    pub fn from_points(name: impl Into<String>, positions: Vec<Vec3>) -> Self {
        Self::new(name, positions, Vec::new())
    }

    /// 从平铺缓冲区构建：positions = [x0, y0, z0, ...]，indices = [i0, i1, i2, ...]
    pub fn from_flat(name: impl Into<String>, positions: &[f32], indices: &[u32]) -> Result<Self> {
        if positions.len() % 3 != 0 {
            return Err(ClothError::Mesh(format!(
                "position buffer length {} is not a multiple of 3",
                positions.len()
            )));
        }
        if indices.len() % 3 != 0 {
            return Err(ClothError::Mesh(format!(
                "index buffer length {} is not a multiple of 3",
                indices.len()
            )));
        }

        let positions = positions
            .chunks_exact(3)
            .map(|p| Vec3::new(p[0], p[1], p[2]))
            .collect();
        let triangles = indices.chunks_exact(3).map(|t| [t[0], t[1], t[2]]).collect();

        let mesh = Self::new(name, positions, triangles);
        mesh.validate()?;
        Ok(mesh)
    }

    /// 获取顶点数量
    pub fn vertex_count(&self) -> usize {
        self.positions.len()
    }

    /// 获取三角形数量
    pub fn triangle_count(&self) -> usize {
        self.triangles.len()
    }

    pub fn is_empty(&self) -> bool {
        self.positions.is_empty()
    }

    /// 轴对齐包围盒 (min, max)，空网格返回 None
    pub fn bounds(&self) -> Option<(Vec3, Vec3)> {
        let first = *self.positions.first()?;
        Some(
            self.positions
                .iter()
                .fold((first, first), |(min, max), &p| (min.min(p), max.max(p))),
        )
    }

    /// 检查三角形索引是否越界
    pub fn validate(&self) -> Result<()> {
        let count = self.positions.len();
        for (i, tri) in self.triangles.iter().enumerate() {
            if tri.iter().any(|&v| v as usize >= count) {
                return Err(ClothError::Mesh(format!(
                    "triangle {} {:?} references vertex out of range (vertex count {})",
                    i, tri, count
                )));
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_from_flat() {
        let mesh = MeshData::from_flat("quad", &[0.0, 0.0, 0.0, 1.0, 0.0, 0.0, 0.0, 1.0, 0.0], &[0, 1, 2]).unwrap();
        assert_eq!(mesh.vertex_count(), 3);
        assert_eq!(mesh.triangle_count(), 1);
        assert_eq!(mesh.positions[1], Vec3::X);

        assert!(MeshData::from_flat("bad", &[0.0, 1.0], &[]).is_err());
        assert!(MeshData::from_flat("bad", &[0.0; 9], &[0, 1]).is_err());
        assert!(MeshData::from_flat("bad", &[0.0; 9], &[0, 1, 3]).is_err());
    }

    #[test]
    fn test_bounds() {
        let mesh = MeshData::from_points(
            "pts",
            vec![Vec3::new(1.0, -2.0, 0.5), Vec3::new(-1.0, 3.0, 0.0), Vec3::new(0.0, 0.0, 2.0)],
        );
        let (min, max) = mesh.bounds().unwrap();
        assert_eq!(min, Vec3::new(-1.0, -2.0, 0.0));
        assert_eq!(max, Vec3::new(1.0, 3.0, 2.0));
        assert!(MeshData::default().bounds().is_none());
    }
}
