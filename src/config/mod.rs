pub mod load;
pub mod model;

pub use load::load;
pub use model::{ConfigError, KafkaConfig, LoggingConfig, ManagerConfig, RegistryConfig, WorkerConfig};
