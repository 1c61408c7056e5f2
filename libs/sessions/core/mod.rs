pub mod config;
pub mod manager;
pub mod record;
pub mod scheduler;
pub mod store;
