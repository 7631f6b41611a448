//! Numerical kernels for the injection-seismicity TPP engine.

pub mod error;
pub mod math;

pub use error::{MathError, Result};
pub use math::bounds;
pub use math::mixture::WeibullMixture;
pub use math::stable::*;
pub use math::weibull::WeibullComponent;
