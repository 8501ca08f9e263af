use anyhow::anyhow;
use anyhow::Result;
use serde::Deserialize;

/// Default request body ceiling for submissions (1 MiB).
pub const DEFAULT_BODY_LIMIT: usize = 1024 * 1024;

#[derive(Debug, Clone, Deserialize, Default)]
pub struct AppConfig {
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub storage: StorageConfig,
    #[serde(default)]
    pub http: HttpConfig,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ServerConfig {
    #[serde(default = "default_host")]
    pub host: String,
    #[serde(default = "default_port")]
    pub port: u16,
    #[serde(default)]
    pub worker_threads: Option<usize>,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self { host: default_host(), port: default_port(), worker_threads: Some(4) }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct StorageConfig {
    #[serde(default = "default_storage_path")]
    pub path: String,
    /// Share of unparseable datafile lines tolerated on load.
    #[serde(default = "default_corrupt_alert_threshold")]
    pub corrupt_alert_threshold: f64,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self { path: default_storage_path(), corrupt_alert_threshold: default_corrupt_alert_threshold() }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct HttpConfig {
    #[serde(default = "default_body_limit")]
    pub body_limit_bytes: usize,
    #[serde(default = "default_static_dir")]
    pub static_dir: String,
}

impl Default for HttpConfig {
    fn default() -> Self {
        Self { body_limit_bytes: default_body_limit(), static_dir: default_static_dir() }
    }
}

fn default_host() -> String { "0.0.0.0".into() }
fn default_port() -> u16 { 3000 }
fn default_storage_path() -> String { "database.db".into() }
fn default_corrupt_alert_threshold() -> f64 { 0.1 }
fn default_body_limit() -> usize { DEFAULT_BODY_LIMIT }
fn default_static_dir() -> String { "public".into() }

pub fn load_from_file(path: &str) -> Result<AppConfig> {
    let content = std::fs::read_to_string(path)?;
    parse(&content)
}

fn is_not_found(err: &anyhow::Error) -> bool {
    err.downcast_ref::<std::io::Error>()
        .is_some_and(|e| e.kind() == std::io::ErrorKind::NotFound)
}

pub fn parse(content: &str) -> Result<AppConfig> {
    let cfg: AppConfig = toml::from_str(content)?;
    Ok(cfg)
}

impl AppConfig {
    /// Load `$CONFIG_PATH` (or `config.toml`) and validate it.
    ///
    /// Only a missing file falls back to defaults with `SERVER_HOST` /
    /// `SERVER_PORT` applied; unreadable or malformed files are errors.
    pub fn load_or_env() -> Result<Self> {
        let path = std::env::var("CONFIG_PATH").unwrap_or_else(|_| "config.toml".to_string());
        Self::load_or_env_from(&path)
    }

    pub fn load_or_env_from(path: &str) -> Result<Self> {
        let mut cfg = match load_from_file(path) {
            Ok(cfg) => cfg,
            Err(e) if is_not_found(&e) => {
                let mut cfg = AppConfig::default();
                cfg.server.apply_env();
                cfg
            }
            Err(e) => return Err(e.context(format!("failed to load {path}"))),
        };
        cfg.normalize_and_validate()?;
        Ok(cfg)
    }

    pub fn normalize_and_validate(&mut self) -> Result<()> {
        self.server.normalize()?;
        self.storage.validate()?;
        self.http.validate()?;
        Ok(())
    }

    pub fn bind_addr(&self) -> String {
        format!("{}:{}", self.server.host, self.server.port)
    }
}

impl ServerConfig {
    fn apply_env(&mut self) {
        if let Ok(host) = std::env::var("SERVER_HOST") {
            self.host = host;
        }
        if let Some(port) = std::env::var("SERVER_PORT").ok().and_then(|p| p.parse::<u16>().ok()) {
            self.port = port;
        }
    }

    fn normalize(&mut self) -> Result<()> {
        if self.host.trim().is_empty() {
            self.host = default_host();
        }
        if self.port == 0 {
            return Err(anyhow!("server.port must be in 1..=65535"));
        }
        match self.worker_threads {
            Some(w) if w > 0 => {}
            _ => self.worker_threads = Some(4),
        }
        Ok(())
    }
}

impl StorageConfig {
    pub fn validate(&self) -> Result<()> {
        if self.path.trim().is_empty() {
            return Err(anyhow!("storage.path must not be empty"));
        }
        if !(0.0..=1.0).contains(&self.corrupt_alert_threshold) {
            return Err(anyhow!("storage.corrupt_alert_threshold must be within 0..=1"));
        }
        Ok(())
    }
}

impl HttpConfig {
    pub fn validate(&self) -> Result<()> {
        if self.body_limit_bytes == 0 {
            return Err(anyhow!("http.body_limit_bytes must be > 0"));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_file_gives_defaults() {
        let mut cfg = parse("").unwrap();
        cfg.normalize_and_validate().unwrap();
        assert_eq!(cfg.bind_addr(), "0.0.0.0:3000");
        assert_eq!(cfg.storage.path, "database.db");
        assert_eq!(cfg.http.body_limit_bytes, 1_048_576);
        assert_eq!(cfg.http.static_dir, "public");
        assert_eq!(cfg.server.worker_threads, Some(4));
    }

    #[test]
    fn partial_sections_keep_remaining_defaults() {
        let cfg = parse(
            r#"
            [server]
            port = 8080

            [storage]
            path = "data/points.db"
            "#,
        )
        .unwrap();
        assert_eq!(cfg.server.host, "0.0.0.0");
        assert_eq!(cfg.server.port, 8080);
        assert_eq!(cfg.storage.path, "data/points.db");
        assert!((cfg.storage.corrupt_alert_threshold - 0.1).abs() < f64::EPSILON);
    }

    #[test]
    fn rejects_invalid_values() {
        let mut cfg = parse("[server]\nport = 0\n").unwrap();
        assert!(cfg.normalize_and_validate().is_err());

        let mut cfg = parse("[storage]\npath = \"  \"\n").unwrap();
        assert!(cfg.normalize_and_validate().is_err());

        let mut cfg = parse("[storage]\ncorrupt_alert_threshold = 1.5\n").unwrap();
        assert!(cfg.normalize_and_validate().is_err());

        let mut cfg = parse("[http]\nbody_limit_bytes = 0\n").unwrap();
        assert!(cfg.normalize_and_validate().is_err());
    }

    fn tmp_config(tag: &str) -> std::path::PathBuf {
        std::env::temp_dir().join(format!("configs_{tag}_{}.toml", std::process::id()))
    }

    #[test]
    fn missing_file_falls_back_to_defaults() {
        let path = tmp_config("absent");
        let _ = std::fs::remove_file(&path);
        let cfg = AppConfig::load_or_env_from(&path.to_string_lossy()).unwrap();
        assert_eq!(cfg.storage.path, "database.db");
    }

    #[test]
    fn malformed_file_is_an_error() {
        let path = tmp_config("malformed");
        std::fs::write(&path, "[storage]\npath = \"data/points.db\"\n[server\nport = \"x\"\n").unwrap();
        let err = AppConfig::load_or_env_from(&path.to_string_lossy()).unwrap_err();
        assert!(err.to_string().contains("failed to load"));

        std::fs::write(&path, "[server]\nport = \"not a number\"\n").unwrap();
        assert!(AppConfig::load_or_env_from(&path.to_string_lossy()).is_err());

        let _ = std::fs::remove_file(&path);
    }

    #[test]
    fn valid_file_is_used() {
        let path = tmp_config("valid");
        std::fs::write(&path, "[storage]\npath = \"data/points.db\"\n").unwrap();
        let cfg = AppConfig::load_or_env_from(&path.to_string_lossy()).unwrap();
        assert_eq!(cfg.storage.path, "data/points.db");
        let _ = std::fs::remove_file(&path);
    }

    #[test]
    fn zero_worker_threads_normalized() {
        let mut cfg = parse("[server]\nworker_threads = 0\n").unwrap();
        cfg.normalize_and_validate().unwrap();
        assert_eq!(cfg.server.worker_threads, Some(4));
    }
}
