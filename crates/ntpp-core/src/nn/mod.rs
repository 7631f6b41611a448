//! Dense neural-network building blocks on `ndarray`.
//!
//! All layers operate on one sequence at a time, shaped `(steps, features)`.
//! Parameters are plain arrays so an external optimizer can update them between
//! forward calls; the engine itself never mutates them.

pub mod activation;
pub mod attention;
pub mod dropout;
pub mod linear;
pub mod norm;
pub mod transformer;

pub use activation::{gelu, sigmoid, PRelu};
pub use attention::MultiHeadAttention;
pub use dropout::{Dropout, Noise};
pub use linear::Linear;
pub use norm::LayerNorm;
pub use transformer::{TransformerDecoderLayer, TransformerEncoderLayer};
