//! `rdkafka`-backed `ReportProducer`. SASL/SSL/Kerberos knobs are passed
//! straight through to `rdkafka::ClientConfig` unmodified.

use std::time::Duration;

use rdkafka::admin::{AdminClient, AdminOptions, NewTopic, TopicReplication};
use rdkafka::client::DefaultClientContext;
use rdkafka::config::ClientConfig;
use rdkafka::producer::{FutureProducer, FutureRecord};
use rdkafka::util::Timeout;
use tracing::info;

use crate::config::KafkaConfig;

use super::{ReportError, ReportProducer};
use crate::report::StateReport;

pub struct KafkaProducer {
    producer: FutureProducer,
    topic: String,
}

impl KafkaProducer {
    /// Builds the producer and ensures the configured topic exists with the
    /// configured partition/replica counts (`kafka_number_partitions` /
    /// `kafka_number_of_replicas`).
    pub async fn connect(config: &KafkaConfig) -> Result<Self, ReportError> {
        let client_config = build_client_config(config);

        let producer: FutureProducer = client_config
            .create()
            .map_err(|e| ReportError::Kafka(e.to_string()))?;

        ensure_topic(&client_config, config).await?;

        info!(topic = %config.topic, bootstrap = %config.bootstrap_servers, "kafka report producer ready");

        Ok(KafkaProducer { producer, topic: config.topic.clone() })
    }
}

fn build_client_config(config: &KafkaConfig) -> ClientConfig {
    let mut client_config = ClientConfig::new();
    client_config.set("bootstrap.servers", &config.bootstrap_servers);
    client_config.set("security.protocol", &config.security_protocol);

    if !config.sasl_mechanism.is_empty() {
        client_config.set("sasl.mechanism", &config.sasl_mechanism);
    }
    if !config.sasl_plain_username.is_empty() {
        client_config.set("sasl.username", &config.sasl_plain_username);
    }
    if !config.sasl_plain_password.is_empty() {
        client_config.set("sasl.password", &config.sasl_plain_password);
    }
    if !config.ssl_keyfile.is_empty() {
        client_config.set("ssl.key.location", &config.ssl_keyfile);
    }
    if !config.ssl_password.is_empty() {
        client_config.set("ssl.key.password", &config.ssl_password);
    }
    if !config.ssl_certfile.is_empty() {
        client_config.set("ssl.certificate.location", &config.ssl_certfile);
    }
    if !config.ssl_cafile.is_empty() {
        client_config.set("ssl.ca.location", &config.ssl_cafile);
    }
    if !config.ssl_crlfile.is_empty() {
        client_config.set("ssl.crl.location", &config.ssl_crlfile);
    }
    client_config.set("sasl.kerberos.service.name", &config.sasl_kerberos_service_name);
    client_config.set("sasl.kerberos.domain.name", &config.sasl_kerberos_domain_name);

    client_config
}

async fn ensure_topic(client_config: &ClientConfig, config: &KafkaConfig) -> Result<(), ReportError> {
    let admin: AdminClient<DefaultClientContext> =
        client_config.create().map_err(|e| ReportError::TopicAdmin(e.to_string()))?;

    let replication = TopicReplication::Fixed(config.number_of_replicas as i32);
    let new_topic = NewTopic::new(&config.topic, config.number_partitions as i32, replication);

    let results = admin
        .create_topics([&new_topic], &AdminOptions::new())
        .await
        .map_err(|e| ReportError::TopicAdmin(e.to_string()))?;

    for result in results {
        if let Err((topic, err)) = result {
            // already-exists is the expected steady-state outcome; anything
            // else is a real provisioning failure.
            if !err.to_string().to_lowercase().contains("already exists") {
                return Err(ReportError::TopicAdmin(format!("{topic}: {err}")));
            }
        }
    }

    Ok(())
}

impl ReportProducer for KafkaProducer {
    fn push_report<'a>(&'a self, report: &'a StateReport) -> super::Fut<'a, ()> {
        Box::pin(async move {
            let payload = serde_json::to_vec(report)?;
            let record: FutureRecord<'_, str, [u8]> = FutureRecord::to(&self.topic).payload(&payload);

            self.producer
                .send(record, Timeout::After(Duration::from_secs(10)))
                .await
                .map_err(|(err, _msg)| ReportError::Kafka(err.to_string()))?;

            Ok(())
        })
    }
}
