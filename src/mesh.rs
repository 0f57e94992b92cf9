//! One-dimensional interval meshes.
use hpdwr_traits::{real_from_usize, Real};
use std::error::Error;
use std::fmt;

#[derive(Debug, Clone, PartialEq)]
pub enum MeshError {
    /// A mesh needs at least one cell.
    NoCells,
    /// Vertex `index` is not strictly greater than its predecessor.
    NotIncreasing { index: usize },
    /// The grading ratio must be positive and finite.
    InvalidRatio,
}

impl fmt::Display for MeshError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MeshError::NoCells => write!(f, "Mesh must contain at least one cell"),
            MeshError::NotIncreasing { index } => {
                write!(f, "Vertex {} is not strictly greater than the previous vertex", index)
            }
            MeshError::InvalidRatio => write!(f, "Grading ratio must be positive and finite"),
        }
    }
}

impl Error for MeshError {}

/// A mesh of the interval `[a, b]` given by strictly increasing vertex coordinates.
///
/// Cell `k` is the interval `[vertices[k], vertices[k + 1]]`.
#[derive(Debug, Clone, PartialEq)]
pub struct Mesh1d<T> {
    vertices: Vec<T>,
}

impl<T: Real> Mesh1d<T> {
    pub fn from_vertices(vertices: Vec<T>) -> Result<Self, MeshError> {
        if vertices.len() < 2 {
            return Err(MeshError::NoCells);
        }
        if let Some(index) = (1..vertices.len()).find(|&i| !(vertices[i] > vertices[i - 1])) {
            return Err(MeshError::NotIncreasing { index });
        }
        Ok(Self { vertices })
    }

    /// `num_cells` equally sized cells on `[a, b]`.
    pub fn uniform(a: T, b: T, num_cells: usize) -> Result<Self, MeshError> {
        let h = (b - a) / real_from_usize(num_cells.max(1));
        let vertices = (0..=num_cells)
            .map(|i| a + h * real_from_usize(i))
            .collect();
        Self::from_vertices(vertices)
    }

    /// `num_cells` cells on `[a, b]` whose sizes form a geometric sequence,
    /// `h_{k+1} = ratio * h_k`.
    pub fn graded(a: T, b: T, num_cells: usize, ratio: T) -> Result<Self, MeshError> {
        if !(ratio > T::zero()) || !ratio.is_finite() {
            return Err(MeshError::InvalidRatio);
        }
        let mut sizes = Vec::with_capacity(num_cells);
        let mut h = T::one();
        for _ in 0..num_cells {
            sizes.push(h);
            h *= ratio;
        }
        let total = sizes.iter().fold(T::zero(), |acc, h| acc + *h);
        let scale = (b - a) / total;

        let mut vertices = Vec::with_capacity(num_cells + 1);
        let mut x = a;
        vertices.push(x);
        for h in &sizes {
            x += *h * scale;
            vertices.push(x);
        }
        // Avoid round-off drift in the last vertex
        if let Some(last) = vertices.last_mut() {
            *last = b;
        }
        Self::from_vertices(vertices)
    }

    pub fn vertices(&self) -> &[T] {
        &self.vertices
    }

    pub fn num_cells(&self) -> usize {
        self.vertices.len() - 1
    }

    pub fn domain(&self) -> (T, T) {
        (self.vertices[0], self.vertices[self.vertices.len() - 1])
    }

    /// End points of cell `k`.
    ///
    /// # Panics
    ///
    /// Panics if the cell index is out of bounds.
    pub fn cell_interval(&self, k: usize) -> (T, T) {
        (self.vertices[k], self.vertices[k + 1])
    }

    pub fn cell_size(&self, k: usize) -> T {
        let (a, b) = self.cell_interval(k);
        b - a
    }

    pub fn cell_center(&self, k: usize) -> T {
        let (a, b) = self.cell_interval(k);
        (a + b) / (T::one() + T::one())
    }

    pub fn cell_sizes(&self) -> Vec<T> {
        (0..self.num_cells()).map(|k| self.cell_size(k)).collect()
    }

    pub fn cell_centers(&self) -> Vec<T> {
        (0..self.num_cells()).map(|k| self.cell_center(k)).collect()
    }

    /// Maps a physical coordinate in cell `k` to the reference coordinate in `[-1, 1]`.
    pub fn to_reference(&self, k: usize, x: T) -> T {
        let two = T::one() + T::one();
        two * (x - self.cell_center(k)) / self.cell_size(k)
    }

    /// Maps a reference coordinate in `[-1, 1]` to the physical coordinate in cell `k`.
    pub fn to_physical(&self, k: usize, xi: T) -> T {
        let two = T::one() + T::one();
        self.cell_center(k) + self.cell_size(k) * xi / two
    }

    /// Index of the cell containing `x`, or `None` outside the domain.
    ///
    /// Interior vertices belong to the cell on their right.
    pub fn find_cell(&self, x: T) -> Option<usize> {
        let (a, b) = self.domain();
        if x < a || x > b {
            return None;
        }
        let upper = self.vertices.partition_point(|v| *v <= x);
        Some(upper.saturating_sub(1).min(self.num_cells() - 1))
    }

    /// Splits every cell at its midpoint.
    pub fn refine_uniform(&self) -> Self {
        let mut vertices = Vec::with_capacity(2 * self.vertices.len() - 1);
        for k in 0..self.num_cells() {
            vertices.push(self.vertices[k]);
            vertices.push(self.cell_center(k));
        }
        vertices.push(self.domain().1);
        Self { vertices }
    }
}
