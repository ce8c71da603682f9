/// Config schema types (telegram, registry, access, delivery).
use std::path::{Path, PathBuf};

use {
    herald_common::types::{AccessPolicy, DuplicatePolicy, UniquenessMode},
    secrecy::Secret,
    serde::Deserialize,
};

/// Root configuration. Every section is optional in the file.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct HeraldConfig {
    pub telegram: TelegramConfig,
    pub registry: RegistryConfig,
    pub access: AccessConfig,
    pub delivery: DeliveryConfig,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct TelegramConfig {
    /// Bot API token. Usually supplied through `TELEGRAM_BOT_TOKEN`.
    pub token: Option<Secret<String>>,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RegistryBackend {
    /// Single JSON table file, rewritten atomically.
    #[default]
    File,
    Sqlite,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct RegistryConfig {
    pub backend: RegistryBackend,
    /// Defaults to `registry.json` (or `registry.db`) in the data directory.
    pub path: Option<PathBuf>,
    pub uniqueness: UniquenessMode,
    pub on_duplicate: DuplicatePolicy,
}

impl RegistryConfig {
    /// Configured path, or the backend's default file under `data_dir`.
    pub fn resolved_path(&self, data_dir: &Path) -> PathBuf {
        if let Some(path) = &self.path {
            return path.clone();
        }
        let file = match self.backend {
            RegistryBackend::File => "registry.json",
            RegistryBackend::Sqlite => "registry.db",
        };
        data_dir.join(file)
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct AccessConfig {
    pub policy: AccessPolicy,
    /// User ids or usernames (`@` optional, `*` glob) allowed to manage
    /// subscriptions.
    pub allowlist: Vec<String>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct DeliveryConfig {
    pub queue_path: PathBuf,
    /// Send ceiling. `0` disables pacing.
    pub max_messages_per_second: u32,
    /// Where `broadcast` writes a Prometheus textfile after a run.
    pub metrics_textfile: Option<PathBuf>,
}

impl Default for DeliveryConfig {
    fn default() -> Self {
        Self {
            queue_path: PathBuf::from("messages.json"),
            max_messages_per_second: 10,
            metrics_textfile: None,
        }
    }
}

#[allow(clippy::unwrap_used, clippy::expect_used)]
#[cfg(test)]
mod tests {
    use {super::*, secrecy::ExposeSecret};

    #[test]
    fn empty_document_is_all_defaults() {
        let cfg: HeraldConfig = toml::from_str("").unwrap();
        assert!(cfg.telegram.token.is_none());
        assert_eq!(cfg.registry.backend, RegistryBackend::File);
        assert_eq!(cfg.registry.uniqueness, UniquenessMode::PerDestination);
        assert_eq!(cfg.registry.on_duplicate, DuplicatePolicy::Overwrite);
        assert_eq!(cfg.access.policy, AccessPolicy::Allowlist);
        assert!(cfg.access.allowlist.is_empty());
        assert_eq!(cfg.delivery.queue_path, PathBuf::from("messages.json"));
        assert_eq!(cfg.delivery.max_messages_per_second, 10);
    }

    #[test]
    fn parses_full_toml() {
        let cfg: HeraldConfig = toml::from_str(
            r#"
            [telegram]
            token = "123:abc"

            [registry]
            backend = "sqlite"
            path = "/var/lib/herald/subs.db"
            uniqueness = "per_destination_source"
            on_duplicate = "reject"

            [access]
            policy = "open"
            allowlist = ["@alice", "42"]

            [delivery]
            queue_path = "/tmp/q.json"
            max_messages_per_second = 0
            metrics_textfile = "/tmp/herald.prom"
            "#,
        )
        .unwrap();

        assert_eq!(
            cfg.telegram.token.as_ref().map(|t| t.expose_secret().as_str()),
            Some("123:abc")
        );
        assert_eq!(cfg.registry.backend, RegistryBackend::Sqlite);
        assert_eq!(cfg.registry.uniqueness, UniquenessMode::PerDestinationSource);
        assert_eq!(cfg.registry.on_duplicate, DuplicatePolicy::Reject);
        assert_eq!(cfg.access.policy, AccessPolicy::Open);
        assert_eq!(cfg.access.allowlist, vec!["@alice", "42"]);
        assert_eq!(cfg.delivery.max_messages_per_second, 0);
        assert_eq!(
            cfg.delivery.metrics_textfile,
            Some(PathBuf::from("/tmp/herald.prom"))
        );
    }

    #[test]
    fn token_is_redacted_in_debug() {
        let cfg: HeraldConfig = toml::from_str("[telegram]\ntoken = \"123:abc\"").unwrap();
        assert!(!format!("{cfg:?}").contains("123:abc"));
    }

    #[test]
    fn registry_path_defaults_per_backend() {
        let data = Path::new("/data");
        let mut registry = RegistryConfig::default();
        assert_eq!(registry.resolved_path(data), data.join("registry.json"));
        registry.backend = RegistryBackend::Sqlite;
        assert_eq!(registry.resolved_path(data), data.join("registry.db"));
        registry.path = Some(PathBuf::from("custom.db"));
        assert_eq!(registry.resolved_path(data), PathBuf::from("custom.db"));
    }
}
