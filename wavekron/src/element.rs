//! Sparse-grid element table.
//!
//! An element is a pair of per-dimension integer vectors `(level, cell)` with
//! `0 <= level[d]` and `0 <= cell[d] < max(1, 2^(level[d] - 1))`. The table
//! enumerates all admissible elements in a deterministic order and provides
//! the bidirectional mapping between an element's linear index and its
//! coordinates: the inverse direction is an ordered list, the forward
//! direction a hash map keyed by the concatenation of the per-dimension 1D
//! indices.

use super::error::{Error, Result};
use arrayvec::ArrayVec;
use itertools::Itertools;
use rustc_hash::FxHashMap;

/// Largest supported number of dimensions.
pub const MAX_DIMS: usize = 6;

/// Per-dimension coordinate vector.
pub type Coords = ArrayVec<usize, MAX_DIMS>;

/// Grid admissibility rule.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum Grid {
    /// Keep only level tuples with `sum(level) <= level`.
    Sparse,
    /// Keep the full tensor product of levels `0..=level`.
    Full,
}

/// Linear index of a `(level, cell)` pair within one dimension.
#[must_use]
pub const fn idx1d(level: usize, cell: usize) -> usize {
    if level == 0 {
        cell
    } else {
        cell + (1 << (level - 1))
    }
}

/// Number of cells on one level of one dimension.
#[must_use]
pub const fn cells_on_level(level: usize) -> usize {
    if level == 0 {
        1
    } else {
        1 << (level - 1)
    }
}

/// Element coordinates: one level and one cell per dimension.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct Element {
    /// Hierarchical level per dimension.
    pub levels: Coords,
    /// Cell within the level, per dimension.
    pub cells: Coords,
}

impl Element {
    /// Concatenated per-dimension 1D indices; the forward-map key.
    #[must_use]
    pub fn key(&self) -> Coords {
        self.levels.iter().zip(&self.cells).map(|(&l, &c)| idx1d(l, c)).collect()
    }
}

/// Immutable table of all admissible elements for one run.
pub struct ElementTable {
    elements: Vec<Element>,
    forward: FxHashMap<Coords, usize>,
    num_dims: usize,
}

impl ElementTable {
    /// Enumerates the admissible elements for `num_dims` dimensions up to
    /// `level`.
    ///
    /// Level tuples are visited in lexicographic order, and cell tuples in
    /// lexicographic order within each level tuple, so the enumeration is
    /// stable across runs.
    ///
    /// # Errors
    ///
    /// Returns a configuration error if `num_dims` is zero or larger than
    /// [`MAX_DIMS`].
    pub fn new(level: usize, num_dims: usize, grid: Grid) -> Result<Self> {
        if num_dims == 0 || num_dims > MAX_DIMS {
            return Err(Error::Config(format!(
                "number of dimensions must be between 1 and {MAX_DIMS}, got {num_dims}"
            )));
        }

        let mut elements = Vec::new();
        for levels in (0..num_dims).map(|_| 0..=level).multi_cartesian_product() {
            let admissible = match grid {
                Grid::Sparse => levels.iter().sum::<usize>() <= level,
                Grid::Full => true,
            };
            if !admissible {
                continue;
            }

            let levels: Coords = levels.into_iter().collect();
            for cells in levels.iter().map(|&l| 0..cells_on_level(l)).multi_cartesian_product() {
                elements.push(Element {
                    levels: levels.clone(),
                    cells: cells.into_iter().collect(),
                });
            }
        }

        let forward = elements
            .iter()
            .enumerate()
            .map(|(index, element)| (element.key(), index))
            .collect();

        Ok(Self {
            elements,
            forward,
            num_dims,
        })
    }

    /// Number of elements.
    #[must_use]
    pub fn len(&self) -> usize {
        self.elements.len()
    }

    /// Returns `true` if the table holds no elements.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.elements.is_empty()
    }

    /// Number of dimensions.
    #[must_use]
    pub const fn num_dims(&self) -> usize {
        self.num_dims
    }

    /// Linear index of the element with the given coordinates, if present.
    #[must_use]
    pub fn forward(&self, levels: &[usize], cells: &[usize]) -> Option<usize> {
        assert_eq!(levels.len(), self.num_dims);
        assert_eq!(cells.len(), self.num_dims);

        let key: Coords = levels.iter().zip(cells).map(|(&l, &c)| idx1d(l, c)).collect();
        self.forward.get(&key).copied()
    }

    /// Coordinates of the element at `index`.
    ///
    /// # Panics
    ///
    /// Panics if `index` is out of range.
    #[must_use]
    pub fn inverse(&self, index: usize) -> &Element {
        assert!(index < self.elements.len(), "element index {index} is out of bounds for table of size {}", self.elements.len());
        &self.elements[index]
    }

    /// Iterator over the elements in enumeration order.
    pub fn iter(&self) -> impl Iterator<Item = &Element> {
        self.elements.iter()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn idx1d_layout() {
        assert_eq!(idx1d(0, 0), 0);
        assert_eq!(idx1d(1, 0), 1);
        assert_eq!(idx1d(2, 0), 2);
        assert_eq!(idx1d(2, 1), 3);
        assert_eq!(idx1d(3, 0), 4);
        assert_eq!(idx1d(3, 3), 7);
        assert_eq!(idx1d(4, 0), 8);
    }

    #[test]
    fn sparse_1d_level_2() {
        let table = ElementTable::new(2, 1, Grid::Sparse).unwrap();

        // levels 0, 1, 2 carry 1, 1 and 2 cells
        assert_eq!(table.len(), 4);
        assert_eq!(table.inverse(0).levels.as_slice(), &[0]);
        assert_eq!(table.inverse(2).levels.as_slice(), &[2]);
        assert_eq!(table.inverse(3).cells.as_slice(), &[1]);
    }

    #[test]
    fn forward_inverse_roundtrip() {
        let table = ElementTable::new(3, 2, Grid::Sparse).unwrap();

        for index in 0..table.len() {
            let element = table.inverse(index);
            assert_eq!(table.forward(&element.levels, &element.cells), Some(index));
        }

        // hash key concatenates per-dimension 1D indices, so a permutation of
        // coordinates addresses a different element
        assert_ne!(table.forward(&[1, 0], &[0, 0]), table.forward(&[0, 1], &[0, 0]));
    }

    #[test]
    fn sparse_3d_level_3_counts() {
        let table = ElementTable::new(3, 3, Grid::Sparse).unwrap();

        // admissible level tuples: sum(level) <= 3 over 3 dimensions
        let level_tuples = table.iter().map(|e| e.levels.clone()).dedup().count();
        assert_eq!(level_tuples, 20);

        // per-tuple cell products: 1*3 + 1*3 + (2*3 + 1*3) + (4*3 + 2*6 + 1)
        let elements: usize = table
            .iter()
            .map(|e| e.levels.clone())
            .dedup()
            .map(|levels| levels.iter().map(|&l| cells_on_level(l)).product::<usize>())
            .sum();
        assert_eq!(elements, table.len());
        assert_eq!(table.len(), 38);
    }

    #[test]
    fn full_grid_is_tensor_product() {
        let table = ElementTable::new(2, 2, Grid::Full).unwrap();

        // each dimension carries 2^2 one-dimensional indices
        assert_eq!(table.len(), 16);
        assert!(table.forward(&[2, 2], &[1, 1]).is_some());

        let sparse = ElementTable::new(2, 2, Grid::Sparse).unwrap();
        assert!(sparse.forward(&[2, 2], &[1, 1]).is_none());
        assert!(sparse.len() < table.len());
    }

    #[test]
    fn rejects_unsupported_dimension_counts() {
        assert!(ElementTable::new(1, 0, Grid::Sparse).is_err());
        assert!(ElementTable::new(1, MAX_DIMS + 1, Grid::Sparse).is_err());
    }
}
