//! Isogeometric alternating-direction solvers for time-dependent PDEs on
//! tensor-product domains.
//!
//! The crate factors into three layers:
//!
//! - structured storage and operators: [`tensor`], [`bspline`], [`lin`];
//! - the parallel assembly executor and the dimensional-splitting solve:
//!   [`executor`], [`solver`];
//! - the simulation lifecycle and problem plumbing: [`sim`], [`problems`],
//!   [`output`], [`direct`].
//!
//! The central idea is that a tensor-product B-spline discretization turns
//! the global operator into a Kronecker product of small banded 1D operators,
//! so a d-dimensional implicit step reduces to d batched banded solves with
//! an axis rotation in between (see [`solver::ads_solve`]).

pub mod bspline;
pub mod direct;
pub mod error;
pub mod executor;
pub mod lin;
pub mod output;
pub mod problems;
pub mod quadrature;
pub mod sim;
pub mod solver;
pub mod tensor;

pub extern crate nalgebra;
