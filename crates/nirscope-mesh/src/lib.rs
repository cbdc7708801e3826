//! Head mesh graph engine
//!
//! Converts a triangulated head surface into a weighted undirected graph and
//! answers connectivity and geodesic path queries over it. Graphs are built
//! on demand from a mesh and not persisted.

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]
#![allow(clippy::must_use_candidate)]

pub mod graph;
pub mod mesh;

pub use graph::{Edge, MeshGraph, MeshGraphError};
pub use mesh::TriangleMesh;
