pub mod config;
pub mod error;
pub mod logging;
pub mod provider;
pub mod providers;
pub mod relay;
pub mod server;
pub mod translate;

pub use config::RelayConfig;
pub use error::{RelayError, Result};
pub use logging::SharedLogger;
pub use provider::{ChatProvider, OpenAiProvider};
pub use server::{build_router, AppState};
