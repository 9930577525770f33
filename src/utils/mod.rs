pub mod cache;
pub mod scalar;
