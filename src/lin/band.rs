//! Banded storage for 1D discretized operators.
use crate::error::LinError;

/// A square band matrix with `lower` sub-diagonals and `upper` super-diagonals.
///
/// For spline bases of degree `p` the mass/stiffness/advection operators all
/// have bandwidth `p` on each side. Storage is row-major over the band: row
/// `i` holds entries for columns `i - lower ..= i + upper`, clamped to the
/// matrix.
#[derive(Debug, Clone, PartialEq)]
pub struct BandMatrix {
    n: usize,
    lower: usize,
    upper: usize,
    data: Vec<f64>,
}

impl BandMatrix {
    pub fn new(lower: usize, upper: usize, n: usize) -> Self {
        Self {
            n,
            lower,
            upper,
            data: vec![0.0; n * (lower + upper + 1)],
        }
    }

    pub fn size(&self) -> usize {
        self.n
    }

    pub fn lower_bandwidth(&self) -> usize {
        self.lower
    }

    pub fn upper_bandwidth(&self) -> usize {
        self.upper
    }

    /// Resets all stored entries to zero. Required before reassembly.
    pub fn zero(&mut self) {
        self.data.fill(0.0);
    }

    #[inline]
    pub fn in_band(&self, i: usize, j: usize) -> bool {
        i < self.n && j < self.n && j + self.lower >= i && i + self.upper >= j
    }

    #[inline]
    fn offset(&self, i: usize, j: usize) -> usize {
        debug_assert!(self.in_band(i, j));
        i * (self.lower + self.upper + 1) + (j + self.lower - i)
    }

    /// Accumulates `value` into entry `(i, j)`.
    ///
    /// Accumulation is commutative, so assembly order does not affect the
    /// stored values beyond floating-point rounding.
    pub fn add(&mut self, i: usize, j: usize, value: f64) -> Result<(), LinError> {
        if !self.in_band(i, j) {
            return Err(LinError::OutOfBand {
                row: i,
                col: j,
                lower: self.lower,
                upper: self.upper,
            });
        }
        let offset = self.offset(i, j);
        self.data[offset] += value;
        Ok(())
    }

    /// Entry `(i, j)`, zero outside the band.
    #[inline]
    pub fn get(&self, i: usize, j: usize) -> f64 {
        if self.in_band(i, j) {
            self.data[self.offset(i, j)]
        } else {
            0.0
        }
    }

    #[inline]
    pub fn set(&mut self, i: usize, j: usize, value: f64) -> Result<(), LinError> {
        if !self.in_band(i, j) {
            return Err(LinError::OutOfBand {
                row: i,
                col: j,
                lower: self.lower,
                upper: self.upper,
            });
        }
        let offset = self.offset(i, j);
        self.data[offset] = value;
        Ok(())
    }

    /// Enforces a Dirichlet condition on DOF `i`: zeroes the row and puts a
    /// unit entry on the diagonal. Must be applied before factorization; the
    /// corresponding right-hand side entries are overwritten separately after
    /// assembly.
    pub fn fix_dof(&mut self, i: usize) {
        let lo = i.saturating_sub(self.lower);
        let hi = (i + self.upper).min(self.n - 1);
        for j in lo..=hi {
            let offset = self.offset(i, j);
            self.data[offset] = 0.0;
        }
        let diag = self.offset(i, i);
        self.data[diag] = 1.0;
    }

    /// Largest absolute entry, used to scale the singularity tolerance.
    pub fn max_abs(&self) -> f64 {
        self.data.iter().fold(0.0, |acc: f64, &v| acc.max(v.abs()))
    }
}

/// LU factors of a [`BandMatrix`], computed without pivoting.
///
/// The operators factorized here are Gram-type matrices of spline bases
/// (symmetric positive definite, possibly with unit rows from Dirichlet
/// fixing), for which unpivoted elimination is stable and produces no fill
/// outside the original band. A pivot that degenerates to zero within
/// tolerance reports [`LinError::SingularMatrix`].
#[derive(Debug, Clone)]
pub struct BandLu {
    lu: BandMatrix,
}

impl BandLu {
    pub fn factorize(matrix: &BandMatrix) -> Result<Self, LinError> {
        let mut lu = matrix.clone();
        let n = lu.n;
        let (kl, ku) = (lu.lower, lu.upper);
        let tol = f64::EPSILON * lu.max_abs() * n as f64;

        for k in 0..n {
            let pivot = lu.get(k, k);
            if pivot.abs() <= tol || !pivot.is_finite() {
                return Err(LinError::SingularMatrix { pivot_index: k });
            }
            let i_end = (k + kl).min(n - 1);
            let j_end = (k + ku).min(n - 1);
            for i in k + 1..=i_end {
                let factor = lu.get(i, k) / pivot;
                let offset = lu.offset(i, k);
                lu.data[offset] = factor;
                for j in k + 1..=j_end {
                    let update = factor * lu.get(k, j);
                    let offset = lu.offset(i, j);
                    lu.data[offset] -= update;
                }
            }
        }

        Ok(Self { lu })
    }

    pub fn size(&self) -> usize {
        self.lu.n
    }

    /// Solves `A X = B` for all `m` lines simultaneously, where `B` is an
    /// `n x m` row-major block. Lines are the columns of `B`; keeping them in
    /// the fast axis lets both substitution passes stream over contiguous rows.
    pub fn solve_block(&self, block: &mut [f64], m: usize) {
        let n = self.lu.n;
        assert_eq!(block.len(), n * m, "block shape mismatch in banded solve");
        let (kl, ku) = (self.lu.lower, self.lu.upper);

        // Forward substitution with unit lower factor
        for i in 0..n {
            let k_lo = i.saturating_sub(kl);
            for k in k_lo..i {
                let l = self.lu.get(i, k);
                if l != 0.0 {
                    let (head, tail) = block.split_at_mut(i * m);
                    let src = &head[k * m..(k + 1) * m];
                    let dst = &mut tail[..m];
                    for (d, s) in dst.iter_mut().zip(src) {
                        *d -= l * s;
                    }
                }
            }
        }

        // Back substitution with the upper factor
        for i in (0..n).rev() {
            let k_hi = (i + ku).min(n - 1);
            for k in i + 1..=k_hi {
                let u = self.lu.get(i, k);
                if u != 0.0 {
                    let (head, tail) = block.split_at_mut(k * m);
                    let src = &tail[..m];
                    let dst = &mut head[i * m..(i + 1) * m];
                    for (d, s) in dst.iter_mut().zip(src) {
                        *d -= u * s;
                    }
                }
            }
            let diag = self.lu.get(i, i);
            for v in &mut block[i * m..(i + 1) * m] {
                *v /= diag;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn tridiag(n: usize, sub: f64, diag: f64, sup: f64) -> BandMatrix {
        let mut a = BandMatrix::new(1, 1, n);
        for i in 0..n {
            a.add(i, i, diag).unwrap();
            if i > 0 {
                a.add(i, i - 1, sub).unwrap();
            }
            if i + 1 < n {
                a.add(i, i + 1, sup).unwrap();
            }
        }
        a
    }

    #[test]
    fn out_of_band_writes_are_rejected() {
        let mut a = BandMatrix::new(1, 1, 5);
        assert!(a.add(0, 2, 1.0).is_err());
        assert!(a.add(4, 1, 1.0).is_err());
        assert!(a.add(0, 1, 1.0).is_ok());
        // the rejected writes must not have touched stored entries
        assert_eq!(a.get(0, 2), 0.0);
        assert_eq!(a.get(4, 1), 0.0);
    }

    #[test]
    fn banded_lu_solves_tridiagonal_system() {
        let n = 6;
        let a = tridiag(n, -1.0, 4.0, -1.0);
        let lu = BandLu::factorize(&a).unwrap();

        // Manufacture rhs = A * x for known x
        let x: Vec<f64> = (0..n).map(|i| (i as f64 + 1.0) * 0.5).collect();
        let mut b = vec![0.0; n];
        for i in 0..n {
            for j in 0..n {
                b[i] += a.get(i, j) * x[j];
            }
        }

        lu.solve_block(&mut b, 1);
        for i in 0..n {
            assert!((b[i] - x[i]).abs() < 1e-12);
        }
    }

    #[test]
    fn singular_matrix_is_reported() {
        let mut a = BandMatrix::new(1, 1, 4);
        for i in 0..4 {
            a.add(i, i, 1.0).unwrap();
        }
        // wipe a row to make the matrix singular
        a.set(2, 1, 0.0).unwrap();
        a.set(2, 2, 0.0).unwrap();
        a.set(2, 3, 0.0).unwrap();
        match BandLu::factorize(&a) {
            Err(LinError::SingularMatrix { pivot_index }) => assert_eq!(pivot_index, 2),
            other => panic!("expected singular matrix error, got {:?}", other),
        }
    }

    #[test]
    fn fix_dof_leaves_unit_row() {
        let mut a = tridiag(5, -1.0, 2.0, -1.0);
        a.fix_dof(0);
        a.fix_dof(4);
        assert_eq!(a.get(0, 0), 1.0);
        assert_eq!(a.get(0, 1), 0.0);
        assert_eq!(a.get(4, 4), 1.0);
        assert_eq!(a.get(4, 3), 0.0);
    }
}
