pub mod config;
pub mod constants;
pub mod environment;
pub mod error;
pub mod queue;
pub mod stack;

pub use config::Settings;
pub use environment::prepend_environment;
pub use error::Error;
pub use queue::QueueName;
pub use stack::{Stack, StackOutput};

pub type Result<T> = std::result::Result<T, Error>;
