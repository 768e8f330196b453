// src/config/mod.rs
pub mod frontpage;

pub use frontpage::{FrontpageConfig, GlobalSource};
