//! Exact nearest-neighbour index over fixed-dimension vectors.
//!
//! Vectors live row-major in a single contiguous buffer; the row number of a
//! vector is its id and equals its insertion order.


use itertools::Itertools;

use crate::{RagError, Result};

/// Brute-force L2 index
#[derive(Debug, Clone, PartialEq)]
pub struct VectorIndex {
    dimension: usize,
    data: Vec<f32>,
}

/// One search result: the row id of a stored vector and its squared L2 distance to the query
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Neighbor {
    pub id: usize,
    pub distance: f32,
}

impl VectorIndex {
    /// Empty index for vectors of `dimension` components; zero is rejected
    #[inline]
    pub fn new(dimension: usize) -> Result<Self> {
        if dimension == 0 {
            return Err(RagError::Config(
                "Vector dimension must be greater than zero".to_string(),
            ));
        }

        Ok(Self {
            dimension,
            data: Vec::new(),
        })
    }

    #[inline]
    pub fn dimension(&self) -> usize {
        self.dimension
    }

    /// Number of stored vectors
    #[inline]
    pub fn len(&self) -> usize {
        self.data.len() / self.dimension
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    /// Append vectors; either all of them are stored or none is
    #[inline]
    pub fn add(&mut self, vectors: &[Vec<f32>]) -> Result<()> {
        if let Some(bad) = vectors.iter().find(|v| v.len() != self.dimension) {
            return Err(RagError::DimensionMismatch {
                expected: self.dimension,
                actual: bad.len(),
            });
        }

        self.data.reserve(vectors.len() * self.dimension);
        for vector in vectors {
            self.data.extend_from_slice(vector);
        }

        Ok(())
    }

    #[inline]
    pub fn vector(&self, id: usize) -> Option<&[f32]> {
        let start = id.checked_mul(self.dimension)?;
        self.data.get(start..start + self.dimension)
    }

    /// Up to `k` stored vectors closest to `query`, nearest first.
    ///
    /// Equal distances keep insertion order.
    #[inline]
    pub fn search(&self, query: &[f32], k: usize) -> Result<Vec<Neighbor>> {
        if query.len() != self.dimension {
            return Err(RagError::DimensionMismatch {
                expected: self.dimension,
                actual: query.len(),
            });
        }

        let k = k.min(self.len());
        if k == 0 {
            return Ok(Vec::new());
        }

        let neighbors = self
            .data
            .chunks_exact(self.dimension)
            .enumerate()
            .map(|(id, vector)| Neighbor {
                id,
                distance: squared_l2(vector, query),
            })
            .k_smallest_by(k, |a, b| {
                a.distance
                    .total_cmp(&b.distance)
                    .then_with(|| a.id.cmp(&b.id))
            })
            .collect();

        Ok(neighbors)
    }
}

/// Squared Euclidean distance; ranks identically to L2 without the square root
#[inline]
pub fn squared_l2(a: &[f32], b: &[f32]) -> f32 {
    a.iter()
        .zip(b.iter())
        .map(|(x, y)| {
            let diff = x - y;
            diff * diff
        })
        .sum()
}
