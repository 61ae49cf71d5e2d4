//! Fork-join execution of per-element assembly work.
//!
//! Quadrature-based assembly is embarrassingly parallel across elements, but
//! contributions of neighboring elements overlap at shared DOFs. Rather than
//! a dependency-aware coloring scheme, each element computes its local
//! contribution in private scratch and merges it into the shared accumulator
//! under a single global lock; the critical section is a small scatter-add,
//! so contention stays negligible at the worker counts used here.
use itertools::Itertools;
use parking_lot::Mutex;
use rayon::prelude::*;
use std::ops::Range;

/// Fixed-width worker pool driving element loops.
#[derive(Debug)]
pub struct Executor {
    pool: rayon::ThreadPool,
    width: usize,
}

/// Default worker count used by simulations that do not configure one.
pub const DEFAULT_WIDTH: usize = 8;

impl Default for Executor {
    fn default() -> Self {
        Self::new(DEFAULT_WIDTH)
    }
}

impl Executor {
    /// # Panics
    ///
    /// Panics if `width` is zero or the thread pool cannot be spawned.
    pub fn new(width: usize) -> Self {
        assert!(width > 0, "executor width must be positive");
        let pool = rayon::ThreadPoolBuilder::new()
            .num_threads(width)
            .build()
            .expect("failed to build worker pool");
        Self { pool, width }
    }

    pub fn width(&self) -> usize {
        self.width
    }

    /// Invokes `f` for every multi-index in the Cartesian product of `ranges`,
    /// partitioned across the worker pool.
    ///
    /// `f` receives the element multi-index and a [`Shared`] handle to the
    /// accumulator; all mutation of `shared` must go through
    /// [`Shared::synchronized`]. Local scratch belongs inside the closure.
    /// The call returns only after every element has been processed (fork-join
    /// barrier); a panic in any worker propagates to the caller after the join.
    pub fn for_each<T, F, const D: usize>(&self, ranges: [Range<usize>; D], shared: &mut T, f: F)
    where
        T: Send,
        F: Fn([usize; D], &Shared<'_, T>) + Sync,
    {
        let elements = cartesian_product(&ranges);
        let guarded = Mutex::new(shared);
        self.pool.install(|| {
            elements.par_iter().for_each(|&e| {
                f(e, &Shared { inner: &guarded });
            });
        });
    }
}

/// Handle to the shared accumulator of a `for_each` pass.
pub struct Shared<'a, T> {
    inner: &'a Mutex<&'a mut T>,
}

impl<T> Shared<'_, T> {
    /// Runs `g` with exclusive access to the shared accumulator.
    ///
    /// There is no ordering guarantee between invocations from different
    /// elements, so the merged operation must be commutative (scatter-adds
    /// are, up to floating-point rounding).
    pub fn synchronized<R>(&self, g: impl FnOnce(&mut T) -> R) -> R {
        let mut guard = self.inner.lock();
        g(&mut **guard)
    }
}

fn cartesian_product<const D: usize>(ranges: &[Range<usize>; D]) -> Vec<[usize; D]> {
    ranges
        .iter()
        .cloned()
        .multi_cartesian_product()
        .map(|idx| {
            let mut e = [0; D];
            e.copy_from_slice(&idx);
            e
        })
        .collect()
}
