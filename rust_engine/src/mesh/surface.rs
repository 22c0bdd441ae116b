//! 三角形表面最近点查询
//!
//! 使用 parry 的 TriMesh（内部带 BVH），通过 rapier3d 的 re-export 引入。

use glam::Vec3;
use rapier3d::na::Point3;
use rapier3d::parry::query::PointQueryWithLocation;
use rapier3d::parry::shape::{TriMesh, TriMeshFlags};

use super::MeshData;
use crate::{ClothError, Result};

/// 一次最近点查询的结果
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct SurfaceHit {
    /// 最近三角形 ID
    pub triangle: u32,
    /// 三角形的三个顶点索引
    pub corners: [u32; 3],
    /// 投影点在三角形上的重心坐标（和为 1）
    pub barycentric: [f32; 3],
    /// 表面上的最近点
    pub point: Vec3,
}

/// 三角形表面（BVH 加速）
pub struct TriangleSurface {
    trimesh: TriMesh,
}

impl TriangleSurface {
    /// 从网格构建；没有三角形的网格返回错误
    pub fn build(mesh: &MeshData) -> Result<Self> {
        if mesh.triangles.is_empty() {
            return Err(ClothError::Mesh(format!("mesh '{}' has no triangles", mesh.name)));
        }
        mesh.validate()?;

        let vertices: Vec<Point3<f32>> = mesh
            .positions
            .iter()
            .map(|p| Point3::new(p.x, p.y, p.z))
            .collect();

        let trimesh = TriMesh::with_flags(vertices, mesh.triangles.clone(), TriMeshFlags::empty())
            .map_err(|e| ClothError::Mesh(format!("failed to build triangle BVH for '{}': {:?}", mesh.name, e)))?;

        Ok(Self { trimesh })
    }

    pub fn triangle_count(&self) -> usize {
        self.trimesh.indices().len()
    }

    /// 查询最近表面点及其所在三角形
    pub fn nearest(&self, point: Vec3) -> Option<SurfaceHit> {
        let query = Point3::new(point.x, point.y, point.z);
        let (projection, (triangle, location)) =
            self.trimesh.project_local_point_and_get_location(&query, false);

        let barycentric = location.barycentric_coordinates()?;
        let corners = *self.trimesh.indices().get(triangle as usize)?;

        Some(SurfaceHit {
            triangle,
            corners,
            barycentric,
            point: Vec3::new(projection.point.x, projection.point.y, projection.point.z),
        })
    }
}
