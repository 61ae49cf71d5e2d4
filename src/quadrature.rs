//! Gauss-Legendre quadrature on the reference interval `[-1, 1]`.
use std::f64::consts::PI;

/// A univariate quadrature rule: paired points and weights on `[-1, 1]`.
#[derive(Debug, Clone, PartialEq)]
pub struct GaussRule {
    pub points: Vec<f64>,
    pub weights: Vec<f64>,
}

impl GaussRule {
    /// Number of quadrature points.
    pub fn len(&self) -> usize {
        self.points.len()
    }

    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }
}

/// Value and first derivative of the Legendre polynomial `P_n` at `x`.
///
/// The three-term recurrence `m P_m = (2m - 1) x P_{m-1} - (m - 1) P_{m-2}`
/// yields the value; the derivative follows from
/// `(x^2 - 1) P_n' = n (x P_n - P_{n-1})`, which is only valid away from the
/// endpoints. All roots of `P_n` lie strictly inside the interval, so Newton
/// iteration never needs the endpoint values.
fn legendre(n: usize, x: f64) -> (f64, f64) {
    let mut value = 1.0;
    let mut below = 0.0;
    for m in 1..=n {
        let m = m as f64;
        let next = ((2.0 * m - 1.0) * x * value - (m - 1.0) * below) / m;
        below = value;
        value = next;
    }
    let dp = n as f64 * (x * value - below) / (x * x - 1.0);
    (value, dp)
}

/// Gauss quadrature rule with the given number of points.
///
/// An `n`-point rule integrates polynomials of degree up to `2n - 1` exactly.
///
/// # Panics
///
/// Panics if zero points are requested.
pub fn gauss(num_points: usize) -> GaussRule {
    let n = num_points;
    assert!(n > 0, "number of points must be positive");

    let mut points = vec![0.0; n];
    let mut weights = vec![0.0; n];

    // The roots of P_n come in +/- pairs (with 0 itself for odd n), so only
    // the non-negative half is computed; each root is polished by Newton
    // iteration from the Chebyshev-based initial guess.
    for i in 0..(n + 1) / 2 {
        let mut x = (PI * (i as f64 + 0.75) / (n as f64 + 0.5)).cos();
        let mut dp;
        loop {
            let (p, d) = legendre(n, x);
            dp = d;
            let dx = p / dp;
            x -= dx;
            if dx.abs() <= 1e-15 {
                break;
            }
        }
        let (_, d) = legendre(n, x);
        dp = d;

        let w = 2.0 / ((1.0 - x * x) * dp * dp);
        // The middle root of an odd rule is zero by symmetry; Newton leaves
        // it at rounding level, so pin it.
        points[i] = if 2 * i + 1 == n { 0.0 } else { x };
        weights[i] = w;
        points[n - 1 - i] = -points[i];
        weights[n - 1 - i] = w;
    }

    GaussRule { points, weights }
}
