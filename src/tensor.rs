//! Dense multi-dimensional storage for solution fields and right-hand sides.
//!
//! A [`Tensor`] is indexed by per-axis degree-of-freedom indices and stored
//! row-major, so the *leading* axis is the slowest-varying one. The batched
//! 1D solvers in [`crate::lin`] always operate along the leading axis; the
//! dimensional-splitting sweep rotates axes between solves with
//! [`cyclic_transpose`] so every axis takes its turn at the front.
use std::ops::{Index, IndexMut};

#[derive(Debug, Clone, PartialEq)]
pub struct Tensor {
    shape: Vec<usize>,
    data: Vec<f64>,
}

impl Tensor {
    /// A zero-filled tensor with the given per-axis extents.
    ///
    /// # Panics
    ///
    /// Panics if the shape is empty or any extent is zero.
    pub fn zeros(shape: &[usize]) -> Self {
        assert!(!shape.is_empty(), "tensor must have at least one axis");
        assert!(shape.iter().all(|&n| n > 0), "tensor extents must be positive");
        let len = shape.iter().product();
        Self {
            shape: shape.to_vec(),
            data: vec![0.0; len],
        }
    }

    pub fn shape(&self) -> &[usize] {
        &self.shape
    }

    pub fn ndim(&self) -> usize {
        self.shape.len()
    }

    pub fn len(&self) -> usize {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    /// Resets all entries to zero, keeping the shape.
    pub fn zero(&mut self) {
        self.data.fill(0.0);
    }

    pub fn as_slice(&self) -> &[f64] {
        &self.data
    }

    pub fn as_mut_slice(&mut self) -> &mut [f64] {
        &mut self.data
    }

    /// Row-major flat offset of a multi-index.
    ///
    /// # Panics
    ///
    /// Panics on rank mismatch or an out-of-range index component.
    #[inline]
    pub fn flat_index(&self, index: &[usize]) -> usize {
        assert_eq!(index.len(), self.shape.len(), "tensor index rank mismatch");
        let mut flat = 0;
        for (&i, &n) in index.iter().zip(&self.shape) {
            debug_assert!(i < n, "tensor index out of bounds");
            flat = flat * n + i;
        }
        flat
    }

    #[inline]
    pub fn at(&self, index: &[usize]) -> f64 {
        self.data[self.flat_index(index)]
    }

    #[inline]
    pub fn at_mut(&mut self, index: &[usize]) -> &mut f64 {
        let flat = self.flat_index(index);
        &mut self.data[flat]
    }
}

macro_rules! impl_array_index {
    ($d:literal) => {
        impl Index<[usize; $d]> for Tensor {
            type Output = f64;

            #[inline]
            fn index(&self, index: [usize; $d]) -> &f64 {
                &self.data[self.flat_index(&index)]
            }
        }

        impl IndexMut<[usize; $d]> for Tensor {
            #[inline]
            fn index_mut(&mut self, index: [usize; $d]) -> &mut f64 {
                let flat = self.flat_index(&index);
                &mut self.data[flat]
            }
        }
    };
}

impl_array_index!(1);
impl_array_index!(2);
impl_array_index!(3);
impl_array_index!(4);

/// The shape produced by one cyclic axis rotation: `(n0, n1, ..., nk) -> (n1, ..., nk, n0)`.
pub fn rotated_shape(shape: &[usize]) -> Vec<usize> {
    let mut out = shape[1..].to_vec();
    out.push(shape[0]);
    out
}

/// Rotates the axis order of `src` so the leading axis becomes the trailing one.
///
/// `dst[i1, ..., ik, i0] = src[i0, i1, ..., ik]`. Applying the rotation once
/// per axis returns the original layout exactly (no arithmetic is performed on
/// the values, so the round trip is bitwise).
///
/// # Panics
///
/// Panics if `dst` does not have the rotated shape of `src`.
pub fn cyclic_transpose(src: &Tensor, dst: &mut Tensor) {
    assert_eq!(
        dst.shape(),
        rotated_shape(src.shape()).as_slice(),
        "destination shape must be the cyclic rotation of the source shape"
    );
    // Row-major layout makes this a plain (n x m) matrix transpose: the leading
    // index selects a contiguous block of length m.
    let n = src.shape[0];
    let m = src.len() / n;
    let src_data = src.as_slice();
    let dst_data = dst.as_mut_slice();
    for i in 0..n {
        let row = &src_data[i * m..(i + 1) * m];
        for (r, &value) in row.iter().enumerate() {
            dst_data[r * n + i] = value;
        }
    }
}
