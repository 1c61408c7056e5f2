//! Keytone client - composition root
//!
//! Wires the realtime messaging layer, the session manager and the REST
//! client together for the `keytone_client` binary.
//!
//! ## Architecture
//!
//! - **bin_common**: configuration, logging and shutdown for binaries
//! - **pulsesocket**: realtime messaging (re-exported from workspace)
//! - **keytone_sessions**: session lifecycle (re-exported from workspace)
//! - **keytone_api**: REST collaborator (re-exported from workspace)
//!
//! ## Usage in Binaries
//!
//! ```rust,ignore
//! use keytone_client::bin_common::{init_tracing, load_config_from_env, AppConfig, ConfigType};
//!
//! let config = AppConfig::load(load_config_from_env(ConfigType::App))?;
//! init_tracing(&config.log_level);
//! ```

// Re-export workspace libraries for convenience
pub use keytone_api;
pub use keytone_sessions;
pub use pulsesocket;

// Binary common utilities
pub mod bin_common {
    //! Common utilities for binary executables

    pub mod cli;
    pub mod config;
    pub mod logging;
    pub mod shutdown;

    pub use cli::{load_config_from_env, parse_args, ConfigType};
    pub use config::{AppConfig, ConfigError};
    pub use logging::init_tracing;
    pub use shutdown::ShutdownManager;
}
