//! `WorkerConfig` — the validated, fully-resolved configuration the rest of
//! the crate runs on.

use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("missing mandatory setting: {0}")]
    MissingMandatory(&'static str),
    #[error("invalid value for {key}: {reason}")]
    InvalidValue { key: &'static str, reason: String },
    #[error("failed to load configuration: {0}")]
    Load(#[from] config::ConfigError),
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ManagerConfig {
    pub auth_user: String,
    pub auth_password: String,
    pub host: String,
    pub port: u16,
    pub protocol: String,
    pub request_timeout: u64,
    pub check_in_time: u64,
}

impl Default for ManagerConfig {
    fn default() -> Self {
        ManagerConfig {
            auth_user: String::new(),
            auth_password: String::new(),
            host: String::new(),
            port: 80,
            protocol: "http".to_string(),
            request_timeout: 60,
            check_in_time: 30,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RegistryConfig {
    pub auth_user: String,
    pub auth_password: String,
    pub host: String,
}

impl Default for RegistryConfig {
    fn default() -> Self {
        RegistryConfig {
            auth_user: String::new(),
            auth_password: String::new(),
            host: "https://index.docker.io/v1/".to_string(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct KafkaConfig {
    pub bootstrap_servers: String,
    pub security_protocol: String,
    pub sasl_mechanism: String,
    pub sasl_plain_username: String,
    pub sasl_plain_password: String,
    pub ssl_keyfile: String,
    pub ssl_password: String,
    pub ssl_certfile: String,
    pub ssl_cafile: String,
    pub ssl_crlfile: String,
    pub sasl_kerberos_service_name: String,
    pub sasl_kerberos_domain_name: String,
    pub topic: String,
    pub number_partitions: u16,
    pub number_of_replicas: u16,
}

impl Default for KafkaConfig {
    fn default() -> Self {
        KafkaConfig {
            bootstrap_servers: String::new(),
            security_protocol: "PLAINTEXT".to_string(),
            sasl_mechanism: String::new(),
            sasl_plain_username: String::new(),
            sasl_plain_password: String::new(),
            ssl_keyfile: String::new(),
            ssl_password: String::new(),
            ssl_certfile: String::new(),
            ssl_cafile: String::new(),
            ssl_crlfile: String::new(),
            sasl_kerberos_service_name: "kafka".to_string(),
            sasl_kerberos_domain_name: "kafka".to_string(),
            topic: "nebula-reports".to_string(),
            number_partitions: 1,
            number_of_replicas: 1,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    pub format: String,
    pub level: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        LoggingConfig {
            format: "pretty".to_string(),
            level: "info".to_string(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct WorkerConfig {
    pub device_group: String,
    pub max_restart_wait_in_seconds: u64,
    pub reporting_fail_hard: bool,
    pub docker_socket: String,
    pub manager: ManagerConfig,
    pub registry: RegistryConfig,
    pub kafka: KafkaConfig,
    pub logging: LoggingConfig,
}

impl Default for WorkerConfig {
    fn default() -> Self {
        WorkerConfig {
            device_group: String::new(),
            max_restart_wait_in_seconds: 0,
            reporting_fail_hard: true,
            docker_socket: String::new(),
            manager: ManagerConfig::default(),
            registry: RegistryConfig::default(),
            kafka: KafkaConfig::default(),
            logging: LoggingConfig::default(),
        }
    }
}

impl WorkerConfig {
    /// Checks mandatory fields. Config-file/env loading has already happened
    /// by the time this runs; this only enforces the invariants that are
    /// fatal configuration errors.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.device_group.is_empty() {
            return Err(ConfigError::MissingMandatory("device_group"));
        }
        if self.manager.host.is_empty() {
            return Err(ConfigError::MissingMandatory("nebula_manager_host"));
        }
        if self.manager.auth_user.is_empty() {
            return Err(ConfigError::MissingMandatory("nebula_manager_auth_user"));
        }
        if self.manager.auth_password.is_empty() {
            return Err(ConfigError::MissingMandatory("nebula_manager_auth_password"));
        }
        if self.manager.protocol != "http" && self.manager.protocol != "https" {
            return Err(ConfigError::InvalidValue {
                key: "nebula_manager_protocol",
                reason: format!("expected http or https, got {}", self.manager.protocol),
            });
        }
        Ok(())
    }

    pub fn reporting_enabled(&self) -> bool {
        !self.kafka.bootstrap_servers.is_empty()
    }

    pub fn manager_base_url(&self) -> String {
        format!(
            "{}://{}:{}",
            self.manager.protocol, self.manager.host, self.manager.port
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn valid() -> WorkerConfig {
        WorkerConfig {
            device_group: "g1".to_string(),
            manager: ManagerConfig {
                host: "manager.internal".to_string(),
                auth_user: "u".to_string(),
                auth_password: "p".to_string(),
                ..ManagerConfig::default()
            },
            ..WorkerConfig::default()
        }
    }

    #[test]
    fn validate_accepts_complete_config() {
        assert!(valid().validate().is_ok());
    }

    #[test]
    fn validate_rejects_missing_device_group() {
        let mut cfg = valid();
        cfg.device_group.clear();
        assert!(matches!(
            cfg.validate(),
            Err(ConfigError::MissingMandatory("device_group"))
        ));
    }

    #[test]
    fn validate_rejects_missing_manager_host() {
        let mut cfg = valid();
        cfg.manager.host.clear();
        assert!(cfg.validate().is_err());
    }

    #[test]
    fn validate_rejects_bad_protocol() {
        let mut cfg = valid();
        cfg.manager.protocol = "ftp".to_string();
        assert!(matches!(
            cfg.validate(),
            Err(ConfigError::InvalidValue { key: "nebula_manager_protocol", .. })
        ));
    }

    #[test]
    fn reporting_fail_hard_defaults_true_independent_of_kafka() {
        let cfg = valid();
        assert!(cfg.reporting_fail_hard);
        assert!(!cfg.reporting_enabled());
    }

    #[test]
    fn manager_base_url_formats_correctly() {
        let cfg = valid();
        assert_eq!(cfg.manager_base_url(), "http://manager.internal:80");
    }
}
