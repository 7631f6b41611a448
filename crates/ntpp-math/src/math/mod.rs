//! Core math modules.

pub mod bounds;
pub mod mixture;
pub mod stable;
pub mod weibull;
