//! Proximity queries over unit locations.

use crate::{HashMap, unit::UnitId};

/// Given a point and a radius, yields every unit that might lie within the radius.
///
/// Candidates may include units slightly outside the radius; callers filter by exact distance.
pub trait SpatialIndex {
    fn candidates_within(&self, x: f64, y: f64, radius: f64) -> Vec<UnitId>;
}

/// A uniform grid of square cells keyed by cell coordinates.
#[derive(Clone, Debug)]
pub struct GridIndex {
    cell_size: f64,
    cells: HashMap<(i64, i64), Vec<UnitId>>,
}

impl GridIndex {
    /// Builds an index over `(id, x, y)` points. `cell_size` is in the same units as the points
    /// and should be close to the radius of typical queries.
    pub fn build(points: impl IntoIterator<Item = (UnitId, f64, f64)>, cell_size: f64) -> Self {
        let cell_size = if cell_size.is_finite() && cell_size > 0.0 { cell_size } else { 1.0 };
        let mut index = GridIndex {
            cell_size,
            cells: HashMap::default(),
        };
        for (unit_id, x, y) in points {
            let key = index.cell_of(x, y);
            index.cells.entry(key).or_default().push(unit_id);
        }
        index
    }

    #[allow(clippy::cast_possible_truncation)]
    fn cell_of(&self, x: f64, y: f64) -> (i64, i64) {
        ((x / self.cell_size).floor() as i64, (y / self.cell_size).floor() as i64)
    }

    #[must_use]
    pub fn cell_size(&self) -> f64 {
        self.cell_size
    }
}

impl SpatialIndex for GridIndex {
    fn candidates_within(&self, x: f64, y: f64, radius: f64) -> Vec<UnitId> {
        let (min_col, min_row) = self.cell_of(x - radius, y - radius);
        let (max_col, max_row) = self.cell_of(x + radius, y + radius);
        let span = (max_col - min_col + 1).saturating_mul(max_row - min_row + 1);

        let mut candidates: Vec<UnitId> = if usize::try_from(span).map_or(true, |n| n > self.cells.len()) {
            // The query covers more cells than are occupied: scan the occupied ones.
            self.cells
                .iter()
                .filter(|((col, row), _)| (min_col..=max_col).contains(col) && (min_row..=max_row).contains(row))
                .flat_map(|(_, ids)| ids.iter().copied())
                .collect()
        } else {
            let mut found = Vec::new();
            for col in min_col..=max_col {
                for row in min_row..=max_row {
                    if let Some(ids) = self.cells.get(&(col, row)) {
                        found.extend_from_slice(ids);
                    }
                }
            }
            found
        };
        candidates.sort_unstable();
        candidates
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn grid() -> GridIndex {
        GridIndex::build(
            vec![
                (UnitId(0), 0.0, 0.0),
                (UnitId(1), 0.5, 0.5),
                (UnitId(2), 10.0, 10.0),
                (UnitId(3), -3.0, 0.2),
            ],
            1.0,
        )
    }

    #[test]
    fn finds_nearby_units_only() {
        let candidates = grid().candidates_within(0.0, 0.0, 1.0);
        assert!(candidates.contains(&UnitId(0)));
        assert!(candidates.contains(&UnitId(1)));
        assert!(!candidates.contains(&UnitId(2)));
        assert!(!candidates.contains(&UnitId(3)));
    }

    #[test]
    fn huge_radius_scans_everything() {
        let candidates = grid().candidates_within(0.0, 0.0, 1.0e9);
        assert_eq!(candidates, vec![UnitId(0), UnitId(1), UnitId(2), UnitId(3)]);
    }

    #[test]
    fn negative_coordinates_use_floor() {
        let candidates = grid().candidates_within(-3.0, 0.0, 0.5);
        assert_eq!(candidates, vec![UnitId(3)]);
    }
}
