//! Geometry for crystal graphs
//!
//! Spatial hashing, periodic neighbor search and Gaussian distance
//! expansion.

pub mod cell_list;
pub mod gaussian;
pub mod neighbors;

pub use cell_list::CellList;
pub use gaussian::GaussianDistance;
pub use neighbors::{Neighbor, NeighborFinder, PeriodicNeighborFinder};
