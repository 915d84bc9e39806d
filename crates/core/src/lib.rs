pub mod config;
pub mod error;
pub mod session;
pub mod types;

pub use config::AppConfig;
pub use error::SimError;
pub use session::AuthSession;
pub use types::*;
