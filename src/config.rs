//! Process settings.
//!
//! Built once at startup from compiled defaults, an optional TOML file and
//! the environment (in that order of precedence, lowest first), then passed
//! by reference to everything that needs it.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::error::ConfigError;

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Settings {
    #[serde(default)]
    pub prometheus: PrometheusSettings,
    #[serde(default)]
    pub kafka: KafkaSettings,
    #[serde(default)]
    pub scheduler: SchedulerSettings,
    #[serde(default)]
    pub logging: LoggingSettings,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PrometheusSettings {
    #[serde(default = "default_prometheus_host")]
    pub host: String,
    #[serde(default = "default_prometheus_port")]
    pub port: u16,
    /// `http` or `https`.
    #[serde(default = "default_scheme")]
    pub scheme: String,
    /// Resolution step of every range query, as a Prometheus duration.
    #[serde(default = "default_polling_step")]
    pub polling_step: String,
    #[serde(default)]
    pub verify_tls: bool,
    #[serde(default)]
    pub bearer_token: Option<String>,
    #[serde(default = "default_namespace")]
    pub namespace: String,
    /// Range selector inside `rate(...)` / `avg_over_time(...)`.
    #[serde(default = "default_rate_window")]
    pub rate_window: String,
    #[serde(default = "default_workload_label")]
    pub workload_label: String,
    /// Label whose value becomes the record's `container_id`.
    #[serde(default = "default_identity_label")]
    pub identity_label: String,
    #[serde(default = "default_request_timeout_secs")]
    pub request_timeout_secs: u64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct KafkaSettings {
    #[serde(default = "default_kafka_host")]
    pub host: String,
    #[serde(default = "default_kafka_port")]
    pub port: u16,
    #[serde(default = "default_topic")]
    pub topic: String,
    #[serde(default = "default_client_id")]
    pub client_id: String,
    /// Informational only. The client negotiates protocol versions with each
    /// broker; this value is reported in the connect log line.
    #[serde(default = "default_api_version")]
    pub api_version: String,
    /// Pin every record to this partition. Unset spreads records round-robin
    /// over all partitions of the topic, like a key-less producer.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub partition: Option<i32>,
    #[serde(default = "default_ack_timeout_secs")]
    pub ack_timeout_secs: u64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SchedulerSettings {
    /// Seconds between cycles; also the lookback of each query window.
    #[serde(default = "default_interval_secs")]
    pub interval_secs: u64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LoggingSettings {
    #[serde(default = "default_level")]
    pub level: String,
    /// Directory for `publisher.log` and `error.log`. Console only if unset.
    #[serde(default)]
    pub log_dir: Option<PathBuf>,
}

fn default_prometheus_host() -> String {
    "10.100.176.57".into()
}

fn default_prometheus_port() -> u16 {
    31078
}

fn default_scheme() -> String {
    "http".into()
}

fn default_polling_step() -> String {
    "20s".into()
}

fn default_namespace() -> String {
    "default".into()
}

fn default_rate_window() -> String {
    "1m".into()
}

fn default_workload_label() -> String {
    "label_ow_action".into()
}

fn default_identity_label() -> String {
    "label_vim_id".into()
}

fn default_request_timeout_secs() -> u64 {
    10
}

fn default_kafka_host() -> String {
    "192.168.1.175".into()
}

fn default_kafka_port() -> u16 {
    9092
}

fn default_topic() -> String {
    "nfvi.ncsrd.kubernetes".into()
}

fn default_client_id() -> String {
    "kubernetes-prometheus-publisher".into()
}

fn default_api_version() -> String {
    "1.1.0".into()
}

fn default_ack_timeout_secs() -> u64 {
    3
}

fn default_interval_secs() -> u64 {
    20
}

fn default_level() -> String {
    "info".into()
}

impl Default for PrometheusSettings {
    fn default() -> Self {
        Self {
            host: default_prometheus_host(),
            port: default_prometheus_port(),
            scheme: default_scheme(),
            polling_step: default_polling_step(),
            verify_tls: false,
            bearer_token: None,
            namespace: default_namespace(),
            rate_window: default_rate_window(),
            workload_label: default_workload_label(),
            identity_label: default_identity_label(),
            request_timeout_secs: default_request_timeout_secs(),
        }
    }
}

impl PrometheusSettings {
    pub fn base_url(&self) -> String {
        format!("{}://{}:{}", self.scheme, self.host, self.port)
    }
}

impl Default for KafkaSettings {
    fn default() -> Self {
        Self {
            host: default_kafka_host(),
            port: default_kafka_port(),
            topic: default_topic(),
            client_id: default_client_id(),
            api_version: default_api_version(),
            partition: None,
            ack_timeout_secs: default_ack_timeout_secs(),
        }
    }
}

impl KafkaSettings {
    pub fn bootstrap_server(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

impl Default for SchedulerSettings {
    fn default() -> Self {
        Self { interval_secs: default_interval_secs() }
    }
}

impl Default for LoggingSettings {
    fn default() -> Self {
        Self { level: default_level(), log_dir: None }
    }
}

impl Settings {
    /// Defaults, overlaid with `path` (if any), overlaid with the process
    /// environment, then validated.
    pub fn load(path: Option<&Path>) -> Result<Self, ConfigError> {
        let mut settings = match path {
            Some(path) => Self::from_file(path)?,
            None => Self::default(),
        };
        settings.apply_env(|var| std::env::var(var).ok())?;
        settings.validate()?;
        Ok(settings)
    }

    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let text = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_toml(&text)
    }

    pub fn from_toml(text: &str) -> Result<Self, ConfigError> {
        Ok(toml::from_str(text)?)
    }

    pub fn to_toml(&self) -> Result<String, ConfigError> {
        Ok(toml::to_string_pretty(self)?)
    }

    /// Apply environment overrides. `lookup` returns the value of a variable.
    pub fn apply_env(&mut self, lookup: impl Fn(&str) -> Option<String>) -> Result<(), ConfigError> {
        if let Some(v) = lookup("PROMETHEUS_HOST") {
            self.prometheus.host = v;
        }
        if let Some(v) = lookup("PROMETHEUS_PORT") {
            self.prometheus.port = parse_env("PROMETHEUS_PORT", &v)?;
        }
        if let Some(v) = lookup("PROMETHEUS_SCHEME") {
            self.prometheus.scheme = v;
        }
        if let Some(v) = lookup("PROMETHEUS_POLLING_STEP") {
            self.prometheus.polling_step = v;
        }
        if let Some(v) = lookup("PROMETHEUS_VERIFY_TLS") {
            self.prometheus.verify_tls = parse_flag("PROMETHEUS_VERIFY_TLS", &v)?;
        }
        if let Some(v) = lookup("PROMETHEUS_BEARER_TOKEN") {
            self.prometheus.bearer_token = Some(v).filter(|t| !t.is_empty());
        }
        if let Some(v) = lookup("PROMETHEUS_NAMESPACE") {
            self.prometheus.namespace = v;
        }
        if let Some(v) = lookup("KAFKA_IP") {
            self.kafka.host = v;
        }
        if let Some(v) = lookup("KAFKA_PORT") {
            self.kafka.port = parse_env("KAFKA_PORT", &v)?;
        }
        if let Some(v) = lookup("KAFKA_KUBERNETES_TOPIC") {
            self.kafka.topic = v;
        }
        if let Some(v) = lookup("KAFKA_API_VERSION") {
            self.kafka.api_version = v;
        }
        if let Some(v) = lookup("KAFKA_PARTITION") {
            self.kafka.partition = Some(parse_env("KAFKA_PARTITION", &v)?);
        }
        if let Some(v) = lookup("SCHEDULER_SECONDS") {
            self.scheduler.interval_secs = parse_env("SCHEDULER_SECONDS", &v)?;
        }
        if let Some(v) = lookup("DEBUG") {
            let debug: i64 = parse_env("DEBUG", &v)?;
            if debug != 0 {
                self.logging.level = "debug".into();
            }
        }
        if let Some(v) = lookup("LOG_DIR") {
            self.logging.log_dir = Some(PathBuf::from(v)).filter(|p| !p.as_os_str().is_empty());
        }
        Ok(())
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.scheduler.interval_secs == 0 {
            return Err(ConfigError::Invalid {
                field: "scheduler.interval_secs",
                reason: "must be at least 1".into(),
            });
        }
        if self.kafka.ack_timeout_secs == 0 {
            return Err(ConfigError::Invalid {
                field: "kafka.ack_timeout_secs",
                reason: "must be at least 1".into(),
            });
        }
        if self.kafka.topic.trim().is_empty() {
            return Err(ConfigError::Invalid {
                field: "kafka.topic",
                reason: "must not be empty".into(),
            });
        }
        if !matches!(self.prometheus.scheme.as_str(), "http" | "https") {
            return Err(ConfigError::Invalid {
                field: "prometheus.scheme",
                reason: format!("expected http or https, got {:?}", self.prometheus.scheme),
            });
        }
        Ok(())
    }
}

fn parse_env<T>(var: &str, value: &str) -> Result<T, ConfigError>
where
    T: std::str::FromStr,
    T::Err: std::fmt::Display,
{
    value.trim().parse().map_err(|e: T::Err| ConfigError::Env {
        var: var.to_string(),
        value: value.to_string(),
        reason: e.to_string(),
    })
}

fn parse_flag(var: &str, value: &str) -> Result<bool, ConfigError> {
    match value.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Ok(true),
        "0" | "false" | "no" | "off" | "" => Ok(false),
        _ => Err(ConfigError::Env {
            var: var.to_string(),
            value: value.to_string(),
            reason: "expected a boolean".into(),
        }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;
    use std::io::Write;

    fn env(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> =
            pairs.iter().map(|(k, v)| (k.to_string(), v.to_string())).collect();
        move |k| map.get(k).cloned()
    }

    #[test]
    fn defaults() {
        let s = Settings::default();
        assert_eq!(s.prometheus.base_url(), "http://10.100.176.57:31078");
        assert_eq!(s.prometheus.polling_step, "20s");
        assert!(!s.prometheus.verify_tls);
        assert_eq!(s.kafka.bootstrap_server(), "192.168.1.175:9092");
        assert_eq!(s.kafka.topic, "nfvi.ncsrd.kubernetes");
        assert_eq!(s.kafka.ack_timeout_secs, 3);
        assert_eq!(s.scheduler.interval_secs, 20);
        assert_eq!(s.logging.level, "info");
        assert!(s.validate().is_ok());
    }

    #[test]
    fn env_overrides() {
        let mut s = Settings::default();
        s.apply_env(env(&[
            ("PROMETHEUS_HOST", "prom"),
            ("PROMETHEUS_PORT", "9090"),
            ("PROMETHEUS_VERIFY_TLS", "true"),
            ("KAFKA_IP", "kafka"),
            ("KAFKA_PORT", "29092"),
            ("KAFKA_KUBERNETES_TOPIC", "metrics"),
            ("SCHEDULER_SECONDS", "30"),
            ("DEBUG", "1"),
        ]))
        .unwrap();
        assert_eq!(s.prometheus.base_url(), "http://prom:9090");
        assert!(s.prometheus.verify_tls);
        assert_eq!(s.kafka.bootstrap_server(), "kafka:29092");
        assert_eq!(s.kafka.topic, "metrics");
        assert_eq!(s.scheduler.interval_secs, 30);
        assert_eq!(s.logging.level, "debug");
    }

    #[test]
    fn partition_is_unpinned_unless_set() {
        let mut s = Settings::default();
        assert_eq!(s.kafka.partition, None);
        s.apply_env(env(&[("KAFKA_PARTITION", "3")])).unwrap();
        assert_eq!(s.kafka.partition, Some(3));
    }

    #[test]
    fn debug_zero_keeps_level() {
        let mut s = Settings::default();
        s.apply_env(env(&[("DEBUG", "0")])).unwrap();
        assert_eq!(s.logging.level, "info");
    }

    #[test]
    fn invalid_port_is_rejected() {
        let mut s = Settings::default();
        let err = s.apply_env(env(&[("KAFKA_PORT", "not-a-port")])).unwrap_err();
        assert!(matches!(err, ConfigError::Env { ref var, .. } if var == "KAFKA_PORT"), "{err}");
    }

    #[test]
    fn invalid_flag_is_rejected() {
        let mut s = Settings::default();
        assert!(s.apply_env(env(&[("PROMETHEUS_VERIFY_TLS", "maybe")])).is_err());
    }

    #[test]
    fn zero_interval_fails_validation() {
        let mut s = Settings::default();
        s.scheduler.interval_secs = 0;
        assert!(matches!(s.validate(), Err(ConfigError::Invalid { field: "scheduler.interval_secs", .. })));
    }

    #[test]
    fn partial_toml_keeps_defaults() {
        let s = Settings::from_toml(
            r#"
            [prometheus]
            host = "prom.svc"
            namespace = "monitoring"

            [kafka]
            topic = "k8s.metrics"
            "#,
        )
        .unwrap();
        assert_eq!(s.prometheus.host, "prom.svc");
        assert_eq!(s.prometheus.port, 31078);
        assert_eq!(s.prometheus.namespace, "monitoring");
        assert_eq!(s.kafka.topic, "k8s.metrics");
        assert_eq!(s.kafka.port, 9092);
        assert_eq!(s.scheduler.interval_secs, 20);
    }

    #[test]
    fn toml_roundtrip() {
        let mut s = Settings::default();
        s.prometheus.bearer_token = Some("t".into());
        s.logging.log_dir = Some(PathBuf::from("/var/log/publisher"));
        let back = Settings::from_toml(&s.to_toml().unwrap()).unwrap();
        assert_eq!(back, s);
    }

    #[test]
    fn from_file_reads_toml() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "[scheduler]\ninterval_secs = 60").unwrap();
        let s = Settings::from_file(file.path()).unwrap();
        assert_eq!(s.scheduler.interval_secs, 60);
    }

    #[test]
    fn missing_file_is_a_read_error() {
        let err = Settings::from_file(Path::new("/nonexistent/publisher.toml")).unwrap_err();
        assert!(matches!(err, ConfigError::Read { .. }));
    }
}
