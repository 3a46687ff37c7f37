//! Periodic neighbor search
//!
//! `NeighborFinder` is the seam between graph construction and geometry:
//! given a crystal and a cutoff, return every neighbor of every atom with
//! its distance. `PeriodicNeighborFinder` is the built-in implementation.

use crate::geometry::cell_list::CellList;
use crate::structure::Crystal;

/// Distances below this are the atom itself
const SELF_TOLERANCE: f64 = 1e-8;

/// One neighbor of an atom, possibly in a periodic image
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Neighbor {
    pub distance: f64,
    /// Index of the neighbor's site in the unit cell
    pub index: usize,
}

pub trait NeighborFinder: Send + Sync {
    /// Neighbors of each atom within `radius`, in no particular order
    fn all_neighbors(&self, crystal: &Crystal, radius: f64) -> Vec<Vec<Neighbor>>;
}

/// Neighbor search over all periodic images that can reach the cutoff
#[derive(Debug, Clone, Copy, Default)]
pub struct PeriodicNeighborFinder;

impl NeighborFinder for PeriodicNeighborFinder {
    fn all_neighbors(&self, crystal: &Crystal, radius: f64) -> Vec<Vec<Neighbor>> {
        if crystal.is_empty() || radius <= 0.0 {
            return vec![Vec::new(); crystal.num_atoms()];
        }

        let lattice = &crystal.lattice;
        let reps = lattice
            .perpendicular_widths()
            .map(|width| (radius / width).ceil() as i64);

        let wrapped: Vec<[f64; 3]> = crystal
            .frac_coords
            .iter()
            .map(|f| f.map(|x| x - x.floor()))
            .collect();
        let centers: Vec<[f64; 3]> = wrapped.iter().map(|f| lattice.to_cartesian(f)).collect();

        let num_images = reps.iter().map(|&r| (2 * r + 1) as usize).product::<usize>();
        let mut image_points = Vec::with_capacity(num_images * wrapped.len());
        let mut image_owner = Vec::with_capacity(num_images * wrapped.len());

        for na in -reps[0]..=reps[0] {
            for nb in -reps[1]..=reps[1] {
                for nc in -reps[2]..=reps[2] {
                    let shift = [na as f64, nb as f64, nc as f64];
                    for (j, f) in wrapped.iter().enumerate() {
                        let image = [f[0] + shift[0], f[1] + shift[1], f[2] + shift[2]];
                        image_points.push(lattice.to_cartesian(&image));
                        image_owner.push(j);
                    }
                }
            }
        }

        let cell_list = CellList::new(&image_points, radius);

        centers
            .iter()
            .map(|center| {
                cell_list
                    .query_within(center, &image_points, radius)
                    .into_iter()
                    .filter(|&(_, distance)| distance > SELF_TOLERANCE)
                    .map(|(point, distance)| Neighbor {
                        distance,
                        index: image_owner[point],
                    })
                    .collect()
            })
            .collect()
    }
}
