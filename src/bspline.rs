//! B-spline bases on uniform open knot vectors and their precomputed
//! per-element quadrature tables.
//!
//! The assembly and solver layers never evaluate splines directly; they read
//! from a [`BasisData`] table that holds, for each element and quadrature
//! point, the values and first two derivatives of every basis function
//! supported on that element, together with quadrature weights and the element
//! Jacobian.
use crate::quadrature::{gauss, GaussRule};

/// Highest derivative order stored in a [`BasisData`] table.
pub const MAX_DERIVATIVE: usize = 2;

/// An open (clamped) uniform knot vector on `[a, b]`.
#[derive(Debug, Clone, PartialEq)]
pub struct KnotVector {
    degree: usize,
    elements: usize,
    a: f64,
    b: f64,
    knots: Vec<f64>,
}

impl KnotVector {
    /// # Panics
    ///
    /// Panics if `degree` or `elements` is zero, or if `b <= a`.
    pub fn open_uniform(degree: usize, elements: usize, a: f64, b: f64) -> Self {
        assert!(degree > 0, "spline degree must be positive");
        assert!(elements > 0, "element count must be positive");
        assert!(b > a, "domain must be non-degenerate");

        let n = elements;
        let p = degree;
        let mut knots = Vec::with_capacity(n + 2 * p + 1);
        knots.extend(std::iter::repeat(a).take(p));
        for i in 0..=n {
            knots.push(a + (b - a) * i as f64 / n as f64);
        }
        knots.extend(std::iter::repeat(b).take(p));

        Self { degree, elements, a, b, knots }
    }

    pub fn degree(&self) -> usize {
        self.degree
    }

    pub fn elements(&self) -> usize {
        self.elements
    }

    /// Number of basis functions (degrees of freedom) in the spline space.
    pub fn dofs(&self) -> usize {
        self.elements + self.degree
    }

    pub fn span(&self) -> (f64, f64) {
        (self.a, self.b)
    }

    /// Knot-interval index whose half-open interval is element `e`.
    fn span_for_element(&self, e: usize) -> usize {
        self.degree + e
    }

    /// Endpoints of element `e`.
    pub fn element_bounds(&self, e: usize) -> (f64, f64) {
        let span = self.span_for_element(e);
        (self.knots[span], self.knots[span + 1])
    }

    /// Values and derivatives (orders `0..=num_ders`) of the `degree + 1` basis
    /// functions supported on element `e`, evaluated at `x`.
    ///
    /// `out[der][local]` is the order-`der` derivative of the basis function
    /// with global index `e + local`. Derivatives of order above the degree
    /// are identically zero.
    ///
    /// This is the standard triangular-table recurrence for B-spline
    /// derivatives (Cox-de Boor generalized to derivative orders).
    pub fn eval_basis(&self, e: usize, x: f64, num_ders: usize, out: &mut [Vec<f64>]) {
        let p = self.degree;
        let span = self.span_for_element(e);
        let u = &self.knots;
        let nd = num_ders.min(p);

        assert!(out.len() > num_ders);
        for row in out.iter_mut() {
            assert_eq!(row.len(), p + 1);
            row.fill(0.0);
        }

        // ndu[j][r]: basis values of degree j (upper triangle) and knot
        // differences (lower triangle), as in the classical algorithm.
        let mut ndu = vec![vec![0.0; p + 1]; p + 1];
        let mut left = vec![0.0; p + 1];
        let mut right = vec![0.0; p + 1];

        ndu[0][0] = 1.0;
        for j in 1..=p {
            left[j] = x - u[span + 1 - j];
            right[j] = u[span + j] - x;
            let mut saved = 0.0;
            for r in 0..j {
                ndu[j][r] = right[r + 1] + left[j - r];
                let temp = ndu[r][j - 1] / ndu[j][r];
                ndu[r][j] = saved + right[r + 1] * temp;
                saved = left[j - r] * temp;
            }
            ndu[j][j] = saved;
        }

        for j in 0..=p {
            out[0][j] = ndu[j][p];
        }

        // Derivative pass: two alternating rows of intermediate coefficients.
        let mut a = vec![vec![0.0; p + 1]; 2];
        for r in 0..=p {
            let mut s1 = 0;
            let mut s2 = 1;
            a[0][0] = 1.0;
            a[1][0] = 0.0;

            for k in 1..=nd {
                let mut d = 0.0;
                let rk = r as isize - k as isize;
                let pk = p - k;

                if r >= k {
                    a[s2][0] = a[s1][0] / ndu[pk + 1][rk as usize];
                    d = a[s2][0] * ndu[rk as usize][pk];
                }

                let j1 = if rk >= -1 { 1 } else { (-rk) as usize };
                let j2 = if r as isize - 1 <= pk as isize { k - 1 } else { p - r };

                for j in j1..=j2 {
                    let idx = (rk + j as isize) as usize;
                    a[s2][j] = (a[s1][j] - a[s1][j - 1]) / ndu[pk + 1][idx];
                    d += a[s2][j] * ndu[idx][pk];
                }

                if r as isize <= pk as isize {
                    a[s2][k] = -a[s1][k - 1] / ndu[pk + 1][r];
                    d += a[s2][k] * ndu[r][pk];
                }

                out[k][r] = d;
                std::mem::swap(&mut s1, &mut s2);
            }
        }

        // Scale by p! / (p - k)!
        let mut factor = p as f64;
        for k in 1..=nd {
            for j in 0..=p {
                out[k][j] *= factor;
            }
            factor *= (p - k) as f64;
        }
    }
}

/// Precomputed basis tables for one axis: values and derivatives of all basis
/// functions at every quadrature point of every element.
#[derive(Debug, Clone)]
pub struct BasisData {
    degree: usize,
    elements: usize,
    quad_order: usize,
    knots: KnotVector,
    /// Gauss weights on the reference interval, shared by all elements.
    weights: Vec<f64>,
    /// Reference-to-physical Jacobian per element (half the element length).
    jacobians: Vec<f64>,
    /// Physical quadrature points, `[e * quad_order + q]`.
    points: Vec<f64>,
    /// Basis values, `[((e * quad_order + q) * (MAX_DERIVATIVE + 1) + der) * (degree + 1) + a]`.
    values: Vec<f64>,
}

impl BasisData {
    /// Tabulates a degree-`p` spline basis with `p + 1` Gauss points per element.
    pub fn new(degree: usize, elements: usize, a: f64, b: f64) -> Self {
        Self::with_quadrature(KnotVector::open_uniform(degree, elements, a, b), gauss(degree + 1))
    }

    pub fn with_quadrature(knots: KnotVector, rule: GaussRule) -> Self {
        let p = knots.degree();
        let n = knots.elements();
        let quad_order = rule.len();
        let dofs_per_element = p + 1;

        let mut jacobians = Vec::with_capacity(n);
        let mut points = Vec::with_capacity(n * quad_order);
        let mut values = vec![0.0; n * quad_order * (MAX_DERIVATIVE + 1) * dofs_per_element];

        let mut ders = vec![vec![0.0; dofs_per_element]; MAX_DERIVATIVE + 1];
        for e in 0..n {
            let (lo, hi) = knots.element_bounds(e);
            jacobians.push(0.5 * (hi - lo));

            for (q, &t) in rule.points.iter().enumerate() {
                let x = 0.5 * (lo + hi) + 0.5 * (hi - lo) * t;
                points.push(x);

                knots.eval_basis(e, x, MAX_DERIVATIVE, &mut ders);
                for (der, row) in ders.iter().enumerate() {
                    let base = ((e * quad_order + q) * (MAX_DERIVATIVE + 1) + der) * dofs_per_element;
                    values[base..base + dofs_per_element].copy_from_slice(row);
                }
            }
        }

        Self {
            degree: p,
            elements: n,
            quad_order,
            knots,
            weights: rule.weights,
            jacobians,
            points,
            values,
        }
    }

    pub fn degree(&self) -> usize {
        self.degree
    }

    pub fn elements(&self) -> usize {
        self.elements
    }

    pub fn dofs(&self) -> usize {
        self.elements + self.degree
    }

    pub fn dofs_per_element(&self) -> usize {
        self.degree + 1
    }

    pub fn quad_order(&self) -> usize {
        self.quad_order
    }

    pub fn knots(&self) -> &KnotVector {
        &self.knots
    }

    /// Global index of the first basis function supported on element `e`.
    #[inline]
    pub fn first_dof(&self, e: usize) -> usize {
        e
    }

    /// Global index of the last basis function supported on element `e`.
    #[inline]
    pub fn last_dof(&self, e: usize) -> usize {
        e + self.degree
    }

    #[inline]
    pub fn weight(&self, q: usize) -> f64 {
        self.weights[q]
    }

    #[inline]
    pub fn jacobian(&self, e: usize) -> f64 {
        self.jacobians[e]
    }

    /// Physical coordinate of quadrature point `q` in element `e`.
    #[inline]
    pub fn point(&self, e: usize, q: usize) -> f64 {
        self.points[e * self.quad_order + q]
    }

    /// Order-`der` derivative of the local basis function `a` of element `e`
    /// at quadrature point `q`.
    #[inline]
    pub fn value(&self, e: usize, q: usize, der: usize, a: usize) -> f64 {
        debug_assert!(der <= MAX_DERIVATIVE);
        debug_assert!(a <= self.degree);
        let base = ((e * self.quad_order + q) * (MAX_DERIVATIVE + 1) + der) * (self.degree + 1);
        self.values[base + a]
    }
}
