//! Triangulated surface geometry

use nalgebra::Point3;
use serde::{Deserialize, Serialize};

/// An indexed triangle surface.
///
/// `indices` holds triangles as consecutive vertex-index triples; a trailing
/// partial triple is ignored by consumers.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct TriangleMesh {
    /// Vertex positions.
    pub vertices: Vec<Point3<f32>>,
    /// Triangle corner indices, three per face.
    pub indices: Vec<u32>,
}

impl TriangleMesh {
    /// Create a mesh from vertices and triangle indices.
    #[must_use]
    pub fn new(vertices: Vec<Point3<f32>>, indices: Vec<u32>) -> Self {
        Self { vertices, indices }
    }

    /// Number of vertices.
    #[must_use]
    pub fn vertex_count(&self) -> usize {
        self.vertices.len()
    }

    /// Number of complete triangles.
    #[must_use]
    pub fn triangle_count(&self) -> usize {
        self.indices.len() / 3
    }

    /// Iterate over complete triangles as index triples.
    pub fn triangles(&self) -> impl Iterator<Item = [u32; 3]> + '_ {
        self.indices
            .chunks_exact(3)
            .map(|tri| [tri[0], tri[1], tri[2]])
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_partial_triple_is_ignored() {
        let mesh = TriangleMesh::new(
            vec![
                Point3::origin(),
                Point3::new(1.0, 0.0, 0.0),
                Point3::new(0.0, 1.0, 0.0),
                Point3::new(0.0, 0.0, 1.0),
            ],
            vec![0, 1, 2, 3],
        );

        assert_eq!(mesh.vertex_count(), 4);
        assert_eq!(mesh.triangle_count(), 1);
        assert_eq!(mesh.triangles().collect::<Vec<_>>(), vec![[0, 1, 2]]);
    }
}
