//! Linear multistep scheme coefficients.

/// Coefficients of an s-step scheme
/// `u^{n+1} + sum_i a_i u^{n+1-i} = dt sum_i b_i f^{n+1-i}`
/// applied to `u_t = -L u + f`.
///
/// `a` holds `a_1 ..= a_s`; `b` holds `b_0 ..= b_s`. The leading coefficient
/// `b_0` scales the implicit operator `M + b_0 dt K` factorized per axis; the
/// remaining coefficients weight the history states in the right-hand side.
#[derive(Debug, Clone, PartialEq)]
pub struct Scheme {
    a: Vec<f64>,
    b: Vec<f64>,
}

impl Scheme {
    /// # Panics
    ///
    /// Panics unless `b.len() == a.len() + 1` and `a` is nonempty.
    pub fn new(a: Vec<f64>, b: Vec<f64>) -> Self {
        assert!(!a.is_empty(), "scheme must use at least one history state");
        assert_eq!(b.len(), a.len() + 1, "need one b coefficient per state plus the implicit one");
        Self { a, b }
    }

    pub fn backward_euler() -> Self {
        Self::new(vec![-1.0], vec![1.0, 0.0])
    }

    pub fn crank_nicolson() -> Self {
        Self::new(vec![-1.0], vec![0.5, 0.5])
    }

    pub fn bdf2() -> Self {
        Self::new(vec![-4.0 / 3.0, 1.0 / 3.0], vec![2.0 / 3.0, 0.0, 0.0])
    }

    /// Number of history states `s`.
    pub fn steps(&self) -> usize {
        self.a.len()
    }

    /// Coefficient `a_i`, `1 <= i <= s`.
    #[inline]
    pub fn a(&self, i: usize) -> f64 {
        self.a[i - 1]
    }

    /// Coefficient `b_i`, `0 <= i <= s`.
    #[inline]
    pub fn b(&self, i: usize) -> f64 {
        self.b[i]
    }
}

/// A scheme description that could not be parsed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParseSchemeError {
    description: String,
}

impl std::fmt::Display for ParseSchemeError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "cannot parse scheme description '{}'", self.description)
    }
}

impl std::error::Error for ParseSchemeError {}

/// Parses a scheme from a name (`"BDF2"`, `"CN"`, `"BE"`) or an explicit
/// coefficient list `"a_1 ... a_s | b_0 ... b_s"`.
impl std::str::FromStr for Scheme {
    type Err = ParseSchemeError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let err = || ParseSchemeError { description: s.to_string() };

        match s.trim() {
            "BE" => return Ok(Scheme::backward_euler()),
            "CN" => return Ok(Scheme::crank_nicolson()),
            "BDF2" => return Ok(Scheme::bdf2()),
            _ => {}
        }

        let (lhs, rhs) = s.split_once('|').ok_or_else(err)?;
        let parse_list = |part: &str| -> Result<Vec<f64>, ParseSchemeError> {
            part.split_whitespace()
                .map(|tok| tok.parse::<f64>().map_err(|_| err()))
                .collect()
        };
        let a = parse_list(lhs)?;
        let b = parse_list(rhs)?;
        if a.is_empty() || b.len() != a.len() + 1 {
            return Err(err());
        }
        Ok(Scheme::new(a, b))
    }
}
