pub mod buffer;
pub mod catalog;
pub mod config;
pub mod cost;
pub mod error;
pub mod execution;
pub mod expression;
pub mod storage;
pub mod utils;
