//! Layered configuration loading: default → file → environment, environment
//! wins. The file/default layering uses the `config` crate's builder; the
//! final environment override pass uses explicit per-key lookups rather than
//! `Environment::with_prefix`, because the env var names are flat
//! (`nebula_manager_host`, `kafka_bootstrap_servers`, …) rather than
//! separator-nested.

use std::env;
use std::path::Path;

use super::model::{ConfigError, WorkerConfig};

const DEFAULT_CONFIG_FILE: &str = "config/conf.json";

pub fn load() -> Result<WorkerConfig, ConfigError> {
    dotenvy::dotenv().ok();

    let file_path = env::var("WORKER_CONFIG_FILE").unwrap_or_else(|_| DEFAULT_CONFIG_FILE.to_string());

    let mut builder = config::Config::builder()
        .add_source(config::Config::try_from(&WorkerConfig::default())?);

    if Path::new(&file_path).exists() {
        builder = builder.add_source(config::File::new(&file_path, config::FileFormat::Json));
    }

    let layered = builder.build()?;
    let mut cfg: WorkerConfig = layered.try_deserialize()?;

    apply_env_overrides(&mut cfg);

    cfg.validate()?;
    Ok(cfg)
}

fn env_string(key: &str, current: &mut String) {
    if let Ok(v) = env::var(key) {
        *current = v;
    }
}

fn env_parsed<T: std::str::FromStr>(key: &str, current: &mut T) {
    if let Ok(v) = env::var(key) {
        if let Ok(parsed) = v.parse() {
            *current = parsed;
        }
    }
}

fn apply_env_overrides(cfg: &mut WorkerConfig) {
    env_string("device_group", &mut cfg.device_group);
    env_parsed("max_restart_wait_in_seconds", &mut cfg.max_restart_wait_in_seconds);
    env_parsed("reporting_fail_hard", &mut cfg.reporting_fail_hard);
    env_string("docker_socket", &mut cfg.docker_socket);

    env_string("nebula_manager_auth_user", &mut cfg.manager.auth_user);
    env_string("nebula_manager_auth_password", &mut cfg.manager.auth_password);
    env_string("nebula_manager_host", &mut cfg.manager.host);
    env_parsed("nebula_manager_port", &mut cfg.manager.port);
    env_string("nebula_manager_protocol", &mut cfg.manager.protocol);
    env_parsed("nebula_manager_request_timeout", &mut cfg.manager.request_timeout);
    env_parsed("nebula_manager_check_in_time", &mut cfg.manager.check_in_time);

    env_string("registry_auth_user", &mut cfg.registry.auth_user);
    env_string("registry_auth_password", &mut cfg.registry.auth_password);
    env_string("registry_host", &mut cfg.registry.host);

    env_string("kafka_bootstrap_servers", &mut cfg.kafka.bootstrap_servers);
    env_string("kafka_security_protocol", &mut cfg.kafka.security_protocol);
    env_string("kafka_sasl_mechanism", &mut cfg.kafka.sasl_mechanism);
    env_string("kafka_sasl_plain_username", &mut cfg.kafka.sasl_plain_username);
    env_string("kafka_sasl_plain_password", &mut cfg.kafka.sasl_plain_password);
    env_string("kafka_ssl_keyfile", &mut cfg.kafka.ssl_keyfile);
    env_string("kafka_ssl_password", &mut cfg.kafka.ssl_password);
    env_string("kafka_ssl_certfile", &mut cfg.kafka.ssl_certfile);
    env_string("kafka_ssl_cafile", &mut cfg.kafka.ssl_cafile);
    env_string("kafka_ssl_crlfile", &mut cfg.kafka.ssl_crlfile);
    env_string("kafka_sasl_kerberos_service_name", &mut cfg.kafka.sasl_kerberos_service_name);
    env_string("kafka_sasl_kerberos_domain_name", &mut cfg.kafka.sasl_kerberos_domain_name);
    env_string("kafka_topic", &mut cfg.kafka.topic);
    env_parsed("kafka_number_partitions", &mut cfg.kafka.number_partitions);
    env_parsed("kafka_number_of_replicas", &mut cfg.kafka.number_of_replicas);

    env_string("log_format", &mut cfg.logging.format);
    env_string("log_level", &mut cfg.logging.level);
}
