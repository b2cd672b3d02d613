//! # u-numchain
//!
//! Broadcasting arithmetic, precision-safe rounding and descriptive
//! statistics over numbers and arbitrarily nested collections, with a
//! chainable, deferrable pipeline API on top.
//!
//! ## Modules
//!
//! - [`value`]: The [`Value`] operand type (numbers, sequences, ordered mappings)
//! - [`flatten`]: Depth-first flattening of nested values
//! - [`broadcast`]: Shape rules for binary operators and the named arithmetic
//! - [`round`]: Decimal rounding without binary drift
//! - [`stats`]: Means, variance, covariance and correlation
//! - [`pipeline`]: [`Pipeline`], the [`Chain`] trait and [`wrap`]
//! - [`memo`]: First-argument memoization
//! - [`config`]: Pipeline configuration
//! - [`error`]: Strict-mode errors
//!
//! ## Quick start
//!
//! ```
//! use u_numchain::{wrap, Chain, Value};
//!
//! let total = wrap(vec![5.0, 7.0, 1.0, 4.0]).sum_all().value();
//! assert_eq!(total, Value::from(17));
//!
//! let batched = wrap(vec![5.0, 7.0, 1.0, 4.0])
//!     .aggregate()
//!     .sum(vec![1.0, 0.0, 2.0, -2.0])
//!     .multiply(2)
//!     .value();
//! assert_eq!(batched, Value::from(vec![12.0, 14.0, 6.0, 4.0]));
//! ```
//!
//! ## Design Philosophy
//!
//! - **Permissive by default**: mismatched shapes and non-numeric leaves
//!   degrade to NaN, infinities or pass-through; [`config::Mode::Strict`]
//!   turns them into [`error::BroadcastError`]s
//! - **One engine**: every arithmetic and statistical operation goes
//!   through [`broadcast::apply`]
//! - **Property-based testing**: Invariants verified via proptest

pub mod broadcast;
pub mod config;
pub mod error;
pub mod flatten;
pub mod memo;
pub mod pipeline;
pub mod round;
pub mod stats;
pub mod value;

pub use broadcast::{
    divide, ln, log, multiply, pow, power, root, rt, sqrt, square_root, subtract, sum, Operator,
};
pub use flatten::{linearize, size};
pub use memo::{memoize, memoize_recursive, Cache, Memoized};
pub use pipeline::{wrap, Chain, IntoPipeline, Operand, Pipeline};
pub use round::round;
pub use stats::{
    correlation, covariance, geometric_mean, harmonic_mean, mean, standard_deviation, variance,
    VarianceKind,
};
pub use value::Value;
