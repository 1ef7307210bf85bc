//! HTTP client for the mediactl web service.

pub mod middleware;
pub mod service;

pub use service::{join_path, ServiceClient};
