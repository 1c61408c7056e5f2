pub mod client;
pub mod config;
pub mod response;

pub use client::ApiClient;
pub use config::{ApiConfig, RetryPolicy};
pub use response::{ApiResponse, RequestOptions};
