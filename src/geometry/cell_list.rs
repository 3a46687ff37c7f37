//! Cell list for fixed-radius neighbor queries
//!
//! Points are hashed into cubic cells of edge `cell_size`; a query with
//! `cutoff <= cell_size` only has to visit the 27 surrounding cells.

use std::collections::HashMap;

/// Cell index (grid position in 3D space)
type CellIndex = (i64, i64, i64);

pub struct CellList {
    cell_size: f64,
    /// Maps cell index to indices into the point array
    cells: HashMap<CellIndex, Vec<usize>>,
    min_coords: [f64; 3],
}

impl CellList {
    pub fn new(points: &[[f64; 3]], cell_size: f64) -> Self {
        let mut cells: HashMap<CellIndex, Vec<usize>> = HashMap::new();

        let mut min_coords = [f64::MAX; 3];
        for point in points {
            for i in 0..3 {
                min_coords[i] = min_coords[i].min(point[i]);
            }
        }
        if points.is_empty() {
            min_coords = [0.0; 3];
        }

        for (idx, point) in points.iter().enumerate() {
            let cell = Self::point_to_cell(point, &min_coords, cell_size);
            cells.entry(cell).or_default().push(idx);
        }

        Self {
            cell_size,
            cells,
            min_coords,
        }
    }

    fn point_to_cell(point: &[f64; 3], min_coords: &[f64; 3], cell_size: f64) -> CellIndex {
        (
            ((point[0] - min_coords[0]) / cell_size).floor() as i64,
            ((point[1] - min_coords[1]) / cell_size).floor() as i64,
            ((point[2] - min_coords[2]) / cell_size).floor() as i64,
        )
    }

    /// All points within `cutoff` of `query`, as `(point index, distance)`
    ///
    /// Requires `cutoff <= cell_size`. Results are ordered by cell visit,
    /// not by distance.
    pub fn query_within(
        &self,
        query: &[f64; 3],
        points: &[[f64; 3]],
        cutoff: f64,
    ) -> Vec<(usize, f64)> {
        let cutoff_sq = cutoff * cutoff;
        let (cx, cy, cz) = Self::point_to_cell(query, &self.min_coords, self.cell_size);

        let mut found = Vec::new();
        for dx in -1..=1 {
            for dy in -1..=1 {
                for dz in -1..=1 {
                    let Some(indices) = self.cells.get(&(cx + dx, cy + dy, cz + dz)) else {
                        continue;
                    };
                    for &idx in indices {
                        let dist_sq = distance_squared(&points[idx], query);
                        if dist_sq <= cutoff_sq {
                            found.push((idx, dist_sq.sqrt()));
                        }
                    }
                }
            }
        }
        found
    }

    pub fn num_occupied_cells(&self) -> usize {
        self.cells.len()
    }
}

/// Squared distance between two 3D points
#[inline]
pub fn distance_squared(a: &[f64; 3], b: &[f64; 3]) -> f64 {
    let dx = a[0] - b[0];
    let dy = a[1] - b[1];
    let dz = a[2] - b[2];
    dx * dx + dy * dy + dz * dz
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_query_within() {
        let points = [
            [0.0, 0.0, 0.0],
            [1.0, 0.0, 0.0],
            [0.0, 1.0, 0.0],
            [10.0, 10.0, 10.0],
        ];
        let cell_list = CellList::new(&points, 2.0);

        let found = cell_list.query_within(&[0.0, 0.0, 0.0], &points, 1.5);
        let mut indices: Vec<usize> = found.iter().map(|&(i, _)| i).collect();
        indices.sort();
        assert_eq!(indices, vec![0, 1, 2]);

        let (_, d) = found.iter().find(|&&(i, _)| i == 1).unwrap();
        assert!((d - 1.0).abs() < 1e-12);
    }

    #[test]
    fn test_query_across_cell_boundary() {
        // 0.95 and 1.05 hash into different cells but are 0.1 apart
        let points = [[0.0, 0.0, 0.0], [0.95, 0.0, 0.0], [1.05, 0.0, 0.0]];
        let cell_list = CellList::new(&points, 1.0);
        assert_eq!(cell_list.num_occupied_cells(), 2);
        let found = cell_list.query_within(&points[1], &points, 0.5);
        let mut indices: Vec<usize> = found.iter().map(|&(i, _)| i).collect();
        indices.sort();
        assert_eq!(indices, vec![1, 2]);
    }

    #[test]
    fn test_empty() {
        let cell_list = CellList::new(&[], 1.0);
        assert!(cell_list.query_within(&[0.0; 3], &[], 1.0).is_empty());
    }
}
