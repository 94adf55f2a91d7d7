pub mod config;
pub mod error;
pub mod llm;
pub mod tools;

// Re-exports for convenience
pub use config::Settings;
pub use error::{ParleyError, Result};
pub use llm::bus::EventBus;
pub use llm::history::MessageHistory;
pub use llm::provider::Provider;
