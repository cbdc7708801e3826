//! Weighted graph over a triangle mesh
//!
//! Every triangle contributes its three edges; shared edges between adjacent
//! triangles are inserted once and mirrored in both directions with equal
//! Euclidean weight.

use std::cmp::Ordering;
use std::collections::{BinaryHeap, HashSet, VecDeque};

use nalgebra::Matrix4;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, warn};

use crate::mesh::TriangleMesh;

/// Errors from graph queries.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum MeshGraphError {
    /// A query referenced a vertex outside the graph.
    #[error("vertex {vertex} out of range for graph of {len} vertices")]
    InvalidIndex {
        /// The offending vertex index.
        vertex: u32,
        /// Number of vertices in the graph.
        len: usize,
    },

    /// No route exists between the queried vertices.
    #[error("no path from {start} to {end}")]
    PathNotFound {
        /// Query start vertex.
        start: u32,
        /// Query end vertex.
        end: u32,
    },
}

/// A directed half of an undirected mesh edge.
#[derive(Copy, Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Edge {
    /// Vertex the edge leads to.
    pub destination: u32,
    /// Euclidean edge length.
    pub weight: f32,
}

/// Adjacency-list graph over mesh vertices.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct MeshGraph {
    adjacency: Vec<Vec<Edge>>,
}

impl MeshGraph {
    /// Build the graph from a mesh.
    ///
    /// Edge weights are Euclidean distances between the untransformed vertex
    /// positions. Triangle edges referencing a vertex outside the mesh's
    /// vertex list are skipped with a diagnostic.
    // TODO: apply `transform` to vertex positions before measuring edge
    // lengths so weights reflect world-space geometry.
    #[must_use]
    pub fn from_mesh(mesh: &TriangleMesh, _transform: &Matrix4<f32>) -> Self {
        let n = mesh.vertex_count();
        let mut adjacency = vec![Vec::new(); n];
        let mut seen: HashSet<(u32, u32)> = HashSet::new();

        for [a, b, c] in mesh.triangles() {
            for (u, v) in [(a, b), (b, c), (c, a)] {
                if u as usize >= n || v as usize >= n {
                    warn!(u, v, vertices = n, "edge references missing vertex, skipped");
                    continue;
                }
                let key = (u.min(v), u.max(v));
                if !seen.insert(key) {
                    continue;
                }
                let weight =
                    (mesh.vertices[u as usize] - mesh.vertices[v as usize]).norm();
                adjacency[u as usize].push(Edge {
                    destination: v,
                    weight,
                });
                adjacency[v as usize].push(Edge {
                    destination: u,
                    weight,
                });
            }
        }

        debug!(
            vertices = adjacency.len(),
            edges = seen.len(),
            "mesh graph built"
        );
        Self { adjacency }
    }

    /// Number of vertices.
    #[must_use]
    pub fn vertex_count(&self) -> usize {
        self.adjacency.len()
    }

    /// Outgoing edges of a vertex.
    ///
    /// # Errors
    ///
    /// Returns [`MeshGraphError::InvalidIndex`] when the vertex is out of
    /// range.
    pub fn edges(&self, vertex: u32) -> Result<&[Edge], MeshGraphError> {
        self.adjacency
            .get(vertex as usize)
            .map(Vec::as_slice)
            .ok_or(MeshGraphError::InvalidIndex {
                vertex,
                len: self.adjacency.len(),
            })
    }

    /// Whether every vertex is reachable from vertex 0.
    ///
    /// The empty graph is trivially connected.
    #[must_use]
    pub fn is_connected(&self) -> bool {
        if self.adjacency.is_empty() {
            return true;
        }
        self.flood_from(0) == self.adjacency.len()
    }

    /// Whether a route exists between two vertices.
    ///
    /// # Errors
    ///
    /// Returns [`MeshGraphError::InvalidIndex`] when either endpoint is out
    /// of range.
    pub fn reachable(&self, start: u32, end: u32) -> Result<bool, MeshGraphError> {
        self.check_vertex(start)?;
        self.check_vertex(end)?;

        if start == end {
            return Ok(true);
        }

        let mut visited = vec![false; self.adjacency.len()];
        let mut queue = VecDeque::from([start]);
        visited[start as usize] = true;
        while let Some(current) = queue.pop_front() {
            for edge in &self.adjacency[current as usize] {
                if edge.destination == end {
                    return Ok(true);
                }
                if !visited[edge.destination as usize] {
                    visited[edge.destination as usize] = true;
                    queue.push_back(edge.destination);
                }
            }
        }
        Ok(false)
    }

    /// Shortest route between two vertices by summed edge weight.
    ///
    /// Returns the vertex sequence including both endpoints; `[start]` when
    /// start and end coincide.
    ///
    /// # Errors
    ///
    /// Returns [`MeshGraphError::InvalidIndex`] for an out-of-range endpoint
    /// and [`MeshGraphError::PathNotFound`] when no route exists.
    pub fn shortest_path(&self, start: u32, end: u32) -> Result<Vec<u32>, MeshGraphError> {
        self.check_vertex(start)?;
        self.check_vertex(end)?;

        if start == end {
            return Ok(vec![start]);
        }

        let n = self.adjacency.len();
        let mut distance = vec![f32::INFINITY; n];
        let mut parent: Vec<Option<u32>> = vec![None; n];
        let mut heap = BinaryHeap::new();

        distance[start as usize] = 0.0;
        heap.push(QueueEntry {
            cost: 0.0,
            vertex: start,
        });

        while let Some(QueueEntry { cost, vertex }) = heap.pop() {
            if vertex == end {
                break;
            }
            // Stale entry, a shorter route was already settled
            if cost > distance[vertex as usize] {
                continue;
            }
            for edge in &self.adjacency[vertex as usize] {
                let candidate = cost + edge.weight;
                if candidate < distance[edge.destination as usize] {
                    distance[edge.destination as usize] = candidate;
                    parent[edge.destination as usize] = Some(vertex);
                    heap.push(QueueEntry {
                        cost: candidate,
                        vertex: edge.destination,
                    });
                }
            }
        }

        if distance[end as usize].is_infinite() {
            return Err(MeshGraphError::PathNotFound { start, end });
        }

        let mut path = vec![end];
        let mut current = end;
        while let Some(previous) = parent[current as usize] {
            path.push(previous);
            current = previous;
        }
        path.reverse();
        Ok(path)
    }

    fn flood_from(&self, start: u32) -> usize {
        let mut visited = vec![false; self.adjacency.len()];
        let mut queue = VecDeque::from([start]);
        visited[start as usize] = true;
        let mut count = 0;
        while let Some(current) = queue.pop_front() {
            count += 1;
            for edge in &self.adjacency[current as usize] {
                if !visited[edge.destination as usize] {
                    visited[edge.destination as usize] = true;
                    queue.push_back(edge.destination);
                }
            }
        }
        count
    }

    fn check_vertex(&self, vertex: u32) -> Result<(), MeshGraphError> {
        if (vertex as usize) < self.adjacency.len() {
            Ok(())
        } else {
            Err(MeshGraphError::InvalidIndex {
                vertex,
                len: self.adjacency.len(),
            })
        }
    }
}

/// Min-queue entry ordered by cost.
#[derive(Copy, Clone, Debug)]
struct QueueEntry {
    cost: f32,
    vertex: u32,
}

impl PartialEq for QueueEntry {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}

impl Eq for QueueEntry {}

impl PartialOrd for QueueEntry {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for QueueEntry {
    fn cmp(&self, other: &Self) -> Ordering {
        // Reversed so the max-heap pops the cheapest entry
        other
            .cost
            .total_cmp(&self.cost)
            .then_with(|| other.vertex.cmp(&self.vertex))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use nalgebra::Point3;

    fn triangle_mesh() -> TriangleMesh {
        TriangleMesh::new(
            vec![
                Point3::origin(),
                Point3::new(3.0, 0.0, 0.0),
                Point3::new(0.0, 4.0, 0.0),
            ],
            vec![0, 1, 2],
        )
    }

    /// Chain 0-1-2-3 with a long 0-3 shortcut attached as two triangles.
    fn chain_mesh() -> TriangleMesh {
        TriangleMesh::new(
            vec![
                Point3::origin(),
                Point3::new(1.0, 0.0, 0.0),
                Point3::new(2.0, 0.0, 0.0),
                Point3::new(2.0, 10.0, 0.0),
            ],
            vec![0, 1, 2, 0, 2, 3],
        )
    }

    #[test]
    fn test_triangle_builds_mirrored_edges() {
        let graph = MeshGraph::from_mesh(&triangle_mesh(), &Matrix4::identity());

        assert_eq!(graph.vertex_count(), 3);
        let total: usize = (0..3).map(|v| graph.edges(v).unwrap().len()).sum();
        assert_eq!(total, 6);

        let edge_01 = graph.edges(0).unwrap().iter().find(|e| e.destination == 1);
        assert!((edge_01.unwrap().weight - 3.0).abs() < 1e-6);
        let edge_12 = graph.edges(1).unwrap().iter().find(|e| e.destination == 2);
        assert!((edge_12.unwrap().weight - 5.0).abs() < 1e-6);
    }

    #[test]
    fn test_shared_edges_are_not_duplicated() {
        let graph = MeshGraph::from_mesh(&chain_mesh(), &Matrix4::identity());

        // Edge 0-2 is shared by both triangles
        let from_zero = graph.edges(0).unwrap();
        assert_eq!(
            from_zero.iter().filter(|e| e.destination == 2).count(),
            1
        );
    }

    #[test]
    fn test_dangling_triangle_index_is_skipped() {
        // Second triangle references vertex 5 which the mesh does not have
        let mesh = TriangleMesh::new(
            vec![
                Point3::origin(),
                Point3::new(3.0, 0.0, 0.0),
                Point3::new(0.0, 4.0, 0.0),
            ],
            vec![0, 1, 2, 1, 2, 5],
        );
        let graph = MeshGraph::from_mesh(&mesh, &Matrix4::identity());

        assert_eq!(graph.vertex_count(), 3);
        // Only the valid triangle's three undirected edges survive
        let total: usize = (0..3).map(|v| graph.edges(v).unwrap().len()).sum();
        assert_eq!(total, 6);
        assert!(graph
            .edges(1)
            .unwrap()
            .iter()
            .all(|e| e.destination < 3));
    }

    #[test]
    fn test_connectivity() {
        let connected = MeshGraph::from_mesh(&triangle_mesh(), &Matrix4::identity());
        assert!(connected.is_connected());

        let empty = MeshGraph::from_mesh(&TriangleMesh::default(), &Matrix4::identity());
        assert!(empty.is_connected());

        // Two disjoint triangles
        let split = TriangleMesh::new(
            vec![
                Point3::origin(),
                Point3::new(1.0, 0.0, 0.0),
                Point3::new(0.0, 1.0, 0.0),
                Point3::new(5.0, 0.0, 0.0),
                Point3::new(6.0, 0.0, 0.0),
                Point3::new(5.0, 1.0, 0.0),
            ],
            vec![0, 1, 2, 3, 4, 5],
        );
        let graph = MeshGraph::from_mesh(&split, &Matrix4::identity());
        assert!(!graph.is_connected());
        assert!(!graph.reachable(0, 4).unwrap());
        assert!(graph.reachable(3, 5).unwrap());
    }

    #[test]
    fn test_shortest_path_prefers_lighter_route() {
        let graph = MeshGraph::from_mesh(&chain_mesh(), &Matrix4::identity());

        // Direct 0-3 edge weighs sqrt(104); via the chain it is 1+1+10
        let path = graph.shortest_path(0, 3).unwrap();
        assert_eq!(path, vec![0, 3]);

        // From 1 the chain through 2 narrowly beats hopping back to 0
        let path = graph.shortest_path(1, 3).unwrap();
        assert_eq!(path, vec![1, 2, 3]);
    }

    #[test]
    fn test_shortest_path_degenerate_and_error_cases() {
        let graph = MeshGraph::from_mesh(&triangle_mesh(), &Matrix4::identity());

        assert_eq!(graph.shortest_path(2, 2).unwrap(), vec![2]);
        assert_eq!(
            graph.shortest_path(0, 9).unwrap_err(),
            MeshGraphError::InvalidIndex { vertex: 9, len: 3 }
        );

        let split = TriangleMesh::new(
            vec![
                Point3::origin(),
                Point3::new(1.0, 0.0, 0.0),
                Point3::new(0.0, 1.0, 0.0),
                Point3::new(5.0, 0.0, 0.0),
                Point3::new(6.0, 0.0, 0.0),
                Point3::new(5.0, 1.0, 0.0),
            ],
            vec![0, 1, 2, 3, 4, 5],
        );
        let graph = MeshGraph::from_mesh(&split, &Matrix4::identity());
        assert_eq!(
            graph.shortest_path(0, 4).unwrap_err(),
            MeshGraphError::PathNotFound { start: 0, end: 4 }
        );
    }
}
