// src/upstream/mod.rs
pub mod client;
pub mod error;
pub mod retry;

pub use client::{ProbeReport, UpstreamClient};
pub use error::{Result, UpstreamError};
pub use retry::RetryPolicy;
