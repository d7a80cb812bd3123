//! Configuration loaded once at startup and passed explicitly.

use std::collections::HashMap;
use std::fmt;
use std::str::FromStr;
use std::sync::Arc;
use std::time::Duration;

use lookout_core::domain::{Coordinates, KeyLayout};
use lookout_core::ports::JobDeserializer;
use lookout_core::{StatusCaching, ViewOptions};

use crate::codec::ArqJsonCodec;

const DEFAULT_PORT: u16 = 6379;

/// Configuration errors. All of them are fatal at startup.
#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("No queues configured: set LOOKOUT_QUEUES to name=redis://host:port/db entries")]
    NoQueues,

    #[error("Invalid queue entry: {0}")]
    InvalidQueueEntry(String),

    #[error("Invalid Redis URL for queue {queue}: {url}")]
    InvalidUrl { queue: String, url: String },

    #[error("Queue configured twice: {0}")]
    DuplicateQueue(String),

    #[error("Invalid value for {var}: {value}")]
    InvalidValue { var: &'static str, value: String },
}

/// Redis connection configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RedisConfig {
    pub host: String,
    pub port: u16,
    pub database: i64,
    pub username: Option<String>,
    pub password: Option<String>,
    /// Connection timeout
    pub connect_timeout: Duration,
}

impl Default for RedisConfig {
    fn default() -> Self {
        Self {
            host: "localhost".to_string(),
            port: DEFAULT_PORT,
            database: 0,
            username: None,
            password: None,
            connect_timeout: Duration::from_secs(5),
        }
    }
}

impl RedisConfig {
    /// Parse `redis://[[username]:password@]host[:port][/database]`.
    pub fn from_url(url: &str) -> Option<Self> {
        let rest = url.strip_prefix("redis://")?;
        let (auth, rest) = match rest.rsplit_once('@') {
            Some((auth, rest)) => (Some(auth), rest),
            None => (None, rest),
        };
        let (authority, database) = match rest.split_once('/') {
            Some((authority, "")) => (authority, 0),
            Some((authority, db)) => (authority, db.parse().ok()?),
            None => (rest, 0),
        };
        let (host, port) = match authority.rsplit_once(':') {
            Some((host, port)) => (host, port.parse().ok()?),
            None => (authority, DEFAULT_PORT),
        };
        if host.is_empty() {
            return None;
        }
        let (username, password) = match auth.map(|a| a.split_once(':')) {
            Some(Some((user, pass))) => (
                (!user.is_empty()).then(|| user.to_string()),
                Some(pass.to_string()),
            ),
            Some(None) => (auth.map(str::to_string), None),
            None => (None, None),
        };

        Some(Self {
            host: host.to_string(),
            port,
            database,
            username,
            password,
            ..Self::default()
        })
    }

    pub fn url(&self) -> String {
        let auth = match (&self.username, &self.password) {
            (Some(user), Some(pass)) => format!("{user}:{pass}@"),
            (None, Some(pass)) => format!(":{pass}@"),
            (Some(user), None) => format!("{user}@"),
            (None, None) => String::new(),
        };
        format!("redis://{auth}{}:{}/{}", self.host, self.port, self.database)
    }

    pub fn coordinates(&self) -> Coordinates {
        Coordinates {
            host: self.host.clone(),
            port: self.port,
            database: self.database,
        }
    }
}

/// One monitored queue: its sorted set name, its Redis and its key namespace.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QueueConfig {
    pub name: String,
    pub redis: RedisConfig,
    pub layout: KeyLayout,
}

/// Everything the registry needs. Build it once and pass it in.
#[derive(Clone)]
pub struct AdminConfig {
    queues: Vec<QueueConfig>,
    pub view: ViewOptions,
    deserializers: HashMap<String, Arc<dyn JobDeserializer>>,
}

impl fmt::Debug for AdminConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut overrides: Vec<&String> = self.deserializers.keys().collect();
        overrides.sort();
        f.debug_struct("AdminConfig")
            .field("queues", &self.queues)
            .field("view", &self.view)
            .field("deserializer_overrides", &overrides)
            .finish()
    }
}

impl AdminConfig {
    pub fn new(queues: Vec<QueueConfig>) -> Result<Self, ConfigError> {
        if queues.is_empty() {
            return Err(ConfigError::NoQueues);
        }
        for (i, queue) in queues.iter().enumerate() {
            if queues[..i].iter().any(|q| q.name == queue.name) {
                return Err(ConfigError::DuplicateQueue(queue.name.clone()));
            }
        }
        Ok(Self {
            queues,
            view: ViewOptions::default(),
            deserializers: HashMap::new(),
        })
    }

    /// Load configuration from environment variables.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|var| std::env::var(var).ok())
    }

    /// Load configuration through `lookup`, which maps variable names to values.
    ///
    /// Format: LOOKOUT_QUEUES=<name>=<url>;<name>=<url>
    /// Example: LOOKOUT_QUEUES=arq:queue=redis://localhost:6379/0;reports=redis://cache:6379/2
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let layout = KeyLayout::new(lookup("LOOKOUT_NAMESPACE").unwrap_or_else(|| "arq".to_string()));
        let connect_timeout = Duration::from_secs(parse_var(&lookup, "REDIS_CONNECT_TIMEOUT_SECS", 5)?);

        let mut queues = Vec::new();
        for entry in lookup("LOOKOUT_QUEUES")
            .unwrap_or_default()
            .split(';')
            .map(str::trim)
            .filter(|entry| !entry.is_empty())
        {
            let (name, url) = entry
                .split_once('=')
                .map(|(name, url)| (name.trim(), url.trim()))
                .filter(|(name, _)| !name.is_empty())
                .ok_or_else(|| ConfigError::InvalidQueueEntry(entry.to_string()))?;
            let redis = RedisConfig::from_url(url).ok_or_else(|| ConfigError::InvalidUrl {
                queue: name.to_string(),
                url: url.to_string(),
            })?;
            queues.push(QueueConfig {
                name: name.to_string(),
                redis: RedisConfig {
                    connect_timeout,
                    ..redis
                },
                layout: layout.clone(),
            });
        }

        let caching = match lookup("LOOKOUT_STATUS_CACHE").as_deref() {
            None | Some("view") => StatusCaching::PerView,
            Some("call") => StatusCaching::PerCall,
            Some(other) => {
                return Err(ConfigError::InvalidValue {
                    var: "LOOKOUT_STATUS_CACHE",
                    value: other.to_string(),
                });
            }
        };
        let view = ViewOptions {
            caching,
            max_concurrency: parse_var(&lookup, "LOOKOUT_MAX_CONCURRENCY", 100)?,
            abort_timeout: Duration::from_secs(parse_var(&lookup, "LOOKOUT_ABORT_TIMEOUT_SECS", 5)?),
            abort_poll_interval: Duration::from_millis(parse_var(&lookup, "LOOKOUT_ABORT_POLL_MS", 500)?),
        };

        Ok(Self::new(queues)?.with_view_options(view))
    }

    pub fn with_view_options(mut self, view: ViewOptions) -> Self {
        self.view = view;
        self
    }

    /// Decode `queue`'s payloads with `deserializer` instead of the JSON default.
    pub fn with_deserializer(
        mut self,
        queue: impl Into<String>,
        deserializer: Arc<dyn JobDeserializer>,
    ) -> Self {
        self.deserializers.insert(queue.into(), deserializer);
        self
    }

    pub fn queues(&self) -> &[QueueConfig] {
        &self.queues
    }

    pub fn queue(&self, name: &str) -> Option<&QueueConfig> {
        self.queues.iter().find(|q| q.name == name)
    }

    pub fn deserializer_for(&self, queue: &str) -> Arc<dyn JobDeserializer> {
        self.deserializers
            .get(queue)
            .cloned()
            .unwrap_or_else(|| Arc::new(ArqJsonCodec))
    }
}

fn parse_var<T: FromStr>(
    lookup: &impl Fn(&str) -> Option<String>,
    var: &'static str,
    default: T,
) -> Result<T, ConfigError> {
    match lookup(var) {
        None => Ok(default),
        Some(value) => value
            .trim()
            .parse()
            .map_err(|_| ConfigError::InvalidValue { var, value }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use lookout_core::domain::{JobDefinition, JobInfo};
    use lookout_core::error::DeserializeError;

    fn vars(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |var: &str| map.get(var).cloned()
    }

    #[yare::parameterized(
        host_only     = { "redis://localhost",              "localhost", 6379, 0, None,          None },
        host_port     = { "redis://cache:6380",             "cache",     6380, 0, None,          None },
        with_db       = { "redis://cache:6380/3",           "cache",     6380, 3, None,          None },
        trailing      = { "redis://cache/",                 "cache",     6379, 0, None,          None },
        password      = { "redis://:s3cret@cache:6379/1",   "cache",     6379, 1, None,          Some("s3cret") },
        username_only = { "redis://admin@cache",            "cache",     6379, 0, Some("admin"), None },
        user_password = { "redis://admin:pw@10.0.0.5/2",    "10.0.0.5",  6379, 2, Some("admin"), Some("pw") },
    )]
    fn parses_redis_urls(
        url: &str,
        host: &str,
        port: u16,
        database: i64,
        username: Option<&str>,
        password: Option<&str>,
    ) {
        let config = RedisConfig::from_url(url).unwrap();
        assert_eq!(config.host, host);
        assert_eq!(config.port, port);
        assert_eq!(config.database, database);
        assert_eq!(config.username.as_deref(), username);
        assert_eq!(config.password.as_deref(), password);
    }

    #[yare::parameterized(
        wrong_scheme = { "http://localhost" },
        no_host      = { "redis://:6379" },
        bad_port     = { "redis://localhost:http" },
        bad_db       = { "redis://localhost/zero" },
    )]
    fn rejects_bad_urls(url: &str) {
        assert_eq!(RedisConfig::from_url(url), None);
    }

    #[test]
    fn url_round_trips_coordinates() {
        let config = RedisConfig::from_url("redis://:pw@cache:6380/4").unwrap();
        assert_eq!(config.url(), "redis://:pw@cache:6380/4");
        assert_eq!(
            config.coordinates(),
            Coordinates {
                host: "cache".into(),
                port: 6380,
                database: 4,
            }
        );
    }

    #[test]
    fn loads_queues_in_order() {
        let config = AdminConfig::from_lookup(vars(&[
            (
                "LOOKOUT_QUEUES",
                "arq:queue=redis://localhost:6379/0; reports = redis://cache:6380/2;",
            ),
            ("LOOKOUT_NAMESPACE", "jobs"),
            ("REDIS_CONNECT_TIMEOUT_SECS", "2"),
        ]))
        .unwrap();

        let names: Vec<&str> = config.queues().iter().map(|q| q.name.as_str()).collect();
        assert_eq!(names, ["arq:queue", "reports"]);
        let reports = config.queue("reports").unwrap();
        assert_eq!(reports.redis.port, 6380);
        assert_eq!(reports.redis.database, 2);
        assert_eq!(reports.redis.connect_timeout, Duration::from_secs(2));
        assert_eq!(reports.layout.namespace(), "jobs");
    }

    #[test]
    fn view_options_default_when_unset() {
        let config =
            AdminConfig::from_lookup(vars(&[("LOOKOUT_QUEUES", "q=redis://localhost")])).unwrap();

        assert_eq!(config.view.caching, StatusCaching::PerView);
        assert_eq!(config.view.max_concurrency, 100);
        assert_eq!(config.view.abort_timeout, Duration::from_secs(5));
        assert_eq!(config.view.abort_poll_interval, Duration::from_millis(500));
        assert_eq!(config.queue("q").unwrap().layout.namespace(), "arq");
    }

    #[test]
    fn view_options_from_env() {
        let config = AdminConfig::from_lookup(vars(&[
            ("LOOKOUT_QUEUES", "q=redis://localhost"),
            ("LOOKOUT_STATUS_CACHE", "call"),
            ("LOOKOUT_MAX_CONCURRENCY", "8"),
            ("LOOKOUT_ABORT_TIMEOUT_SECS", "30"),
            ("LOOKOUT_ABORT_POLL_MS", "50"),
        ]))
        .unwrap();

        assert_eq!(config.view.caching, StatusCaching::PerCall);
        assert_eq!(config.view.max_concurrency, 8);
        assert_eq!(config.view.abort_timeout, Duration::from_secs(30));
        assert_eq!(config.view.abort_poll_interval, Duration::from_millis(50));
    }

    #[test]
    fn missing_queues_is_fatal() {
        assert_eq!(
            AdminConfig::from_lookup(vars(&[])).unwrap_err(),
            ConfigError::NoQueues
        );
        assert_eq!(
            AdminConfig::from_lookup(vars(&[("LOOKOUT_QUEUES", " ; ")])).unwrap_err(),
            ConfigError::NoQueues
        );
    }

    #[yare::parameterized(
        no_equals   = { "LOOKOUT_QUEUES", "redis://localhost" },
        empty_name  = { "LOOKOUT_QUEUES", "=redis://localhost" },
        bad_url     = { "LOOKOUT_QUEUES", "q=localhost:6379" },
        duplicate   = { "LOOKOUT_QUEUES", "q=redis://a;q=redis://b" },
    )]
    fn malformed_queue_entries_are_rejected(var: &str, value: &str) {
        assert!(AdminConfig::from_lookup(vars(&[(var, value)])).is_err());
    }

    #[test]
    fn malformed_numbers_are_rejected() {
        let err = AdminConfig::from_lookup(vars(&[
            ("LOOKOUT_QUEUES", "q=redis://localhost"),
            ("LOOKOUT_MAX_CONCURRENCY", "lots"),
        ]))
        .unwrap_err();

        assert_eq!(
            err,
            ConfigError::InvalidValue {
                var: "LOOKOUT_MAX_CONCURRENCY",
                value: "lots".into(),
            }
        );
    }

    struct Rejecting;

    impl JobDeserializer for Rejecting {
        fn deserialize_definition(&self, _: &[u8]) -> Result<JobDefinition, DeserializeError> {
            Err(DeserializeError::Malformed("rejecting".into()))
        }

        fn deserialize_result(&self, _: &[u8]) -> Result<JobInfo, DeserializeError> {
            Err(DeserializeError::Malformed("rejecting".into()))
        }
    }

    #[test]
    fn deserializer_override_is_per_queue() {
        let config = AdminConfig::from_lookup(vars(&[(
            "LOOKOUT_QUEUES",
            "a=redis://localhost;b=redis://localhost",
        )]))
        .unwrap()
        .with_deserializer("a", Arc::new(Rejecting));

        let payload = br#"{"f": "task", "et": 0}"#;
        assert!(config.deserializer_for("a").deserialize_definition(payload).is_err());
        assert!(config.deserializer_for("b").deserialize_definition(payload).is_ok());
    }
}
