//! Permutations and fill-reducing orderings.
use nalgebra::Point2;
use nalgebra_sparse::pattern::SparsityPattern;
use std::cmp::Ordering;
use std::error::Error;
use std::fmt;
use std::marker::PhantomData;

/// Vertex sets at or below this size are not dissected any further.
const LEAF_SIZE: usize = 64;

/// A representation of an index permutation.
///
/// Given `n` objects stored contiguously, the permutation stores an array `perm` such that for
/// *target index* `i` in `0 .. n`, the corresponding *source index* is given by
///
/// ```ignore
/// target[i] = source[perm[i]]
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Permutation {
    perm: Vec<usize>,
}

#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub struct InvalidPermutation {
    marker: PhantomData<()>,
}

impl fmt::Display for InvalidPermutation {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "Invalid permutation")
    }
}

impl Error for InvalidPermutation {}

impl Permutation {
    pub fn from_vec(perm: Vec<usize>) -> Result<Self, InvalidPermutation> {
        let mut visited = vec![false; perm.len()];
        for &index in &perm {
            if index >= perm.len() || visited[index] {
                return Err(InvalidPermutation { marker: PhantomData });
            } else {
                visited[index] = true;
            }
        }
        Ok(Self { perm })
    }

    pub fn identity(n: usize) -> Self {
        Self { perm: (0..n).collect() }
    }

    pub fn len(&self) -> usize {
        self.perm.len()
    }

    pub fn is_empty(&self) -> bool {
        self.perm.is_empty()
    }

    pub fn perm(&self) -> &[usize] {
        &self.perm
    }

    pub fn source_index(&self, target_index: usize) -> usize {
        self.perm[target_index]
    }

    pub fn inverse(&self) -> Permutation {
        let mut inverse_perm = vec![usize::MAX; self.len()];
        for (target_idx, &source_idx) in self.perm().iter().enumerate() {
            inverse_perm[source_idx] = target_idx;
        }
        Self { perm: inverse_perm }
    }

    pub fn apply_to_slice<T: Clone>(&self, slice: &[T]) -> Vec<T> {
        assert_eq!(slice.len(), self.len(), "Slice and permutation must have the same size.");
        self.perm()
            .iter()
            .map(|source_idx| slice[*source_idx].clone())
            .collect()
    }
}

/// Computes a nested dissection ordering for the graph of a symmetric sparsity pattern whose
/// vertices have known positions in the plane.
///
/// Vertex sets are bisected at the median coordinate along their longest bounding box extent.
/// Vertices of the first half that are adjacent to the second half form a separator, which is
/// ordered after both halves. Both halves are then dissected recursively.
///
/// # Panics
///
/// Panics if the pattern is not square or the number of coordinates does not match its dimension.
pub fn nested_dissection(pattern: &SparsityPattern, coordinates: &[Point2<f64>]) -> Permutation {
    assert_eq!(pattern.major_dim(), pattern.minor_dim(), "Matrix must be square.");
    assert_eq!(
        coordinates.len(),
        pattern.major_dim(),
        "Need exactly one coordinate per vertex."
    );

    let n = pattern.major_dim();
    let mut dissection = Dissection {
        pattern,
        coordinates,
        labels: vec![0; n],
        next_label: 1,
        ordering: Vec::with_capacity(n),
    };
    dissection.dissect((0..n).collect());

    Permutation::from_vec(dissection.ordering)
        .expect("Internal error: Nested dissection must order every vertex exactly once")
}

struct Dissection<'a> {
    pattern: &'a SparsityPattern,
    coordinates: &'a [Point2<f64>],
    // Marks the vertices of the most recently split half. Labels are never reused, so stale
    // labels can not be confused with the current split.
    labels: Vec<usize>,
    next_label: usize,
    ordering: Vec<usize>,
}

impl Dissection<'_> {
    fn dissect(&mut self, mut vertices: Vec<usize>) {
        if vertices.len() <= LEAF_SIZE {
            self.ordering.extend(vertices);
            return;
        }

        let axis = self.longest_axis(&vertices);
        let coordinates = self.coordinates;
        let mid = vertices.len() / 2;
        vertices.select_nth_unstable_by(mid, |&a, &b| {
            coordinates[a][axis]
                .partial_cmp(&coordinates[b][axis])
                .unwrap_or(Ordering::Equal)
        });
        let second_half = vertices.split_off(mid);
        let first_half = vertices;

        let label = self.next_label;
        self.next_label += 1;
        for &v in &second_half {
            self.labels[v] = label;
        }

        let (separator, interior): (Vec<_>, Vec<_>) = first_half.into_iter().partition(|&v| {
            self.pattern
                .lane(v)
                .iter()
                .any(|&neighbor| self.labels[neighbor] == label)
        });

        self.dissect(interior);
        self.dissect(second_half);
        self.ordering.extend(separator);
    }

    fn longest_axis(&self, vertices: &[usize]) -> usize {
        let mut min = [f64::INFINITY; 2];
        let mut max = [f64::NEG_INFINITY; 2];
        for &v in vertices {
            let x = &self.coordinates[v];
            for axis in 0..2 {
                min[axis] = min[axis].min(x[axis]);
                max[axis] = max[axis].max(x[axis]);
            }
        }
        if max[0] - min[0] >= max[1] - min[1] {
            0
        } else {
            1
        }
    }
}
