use std::path::{Path, PathBuf};

use {
    secrecy::Secret,
    tracing::{debug, warn},
};

use crate::{env_subst::substitute_env, schema::HeraldConfig};

/// Standard config file names, checked in order.
const CONFIG_FILENAMES: &[&str] = &["herald.toml", "herald.yaml", "herald.yml", "herald.json"];

/// Load config from the given path (any supported format).
pub fn load_config(path: &Path) -> anyhow::Result<HeraldConfig> {
    let raw = std::fs::read_to_string(path)
        .map_err(|e| anyhow::anyhow!("failed to read {}: {e}", path.display()))?;
    let raw = substitute_env(&raw);
    parse_config(&raw, path)
        .map_err(|e| anyhow::anyhow!("failed to parse {}: {e}", path.display()))
}

/// Discover and load config from standard locations.
///
/// Search order:
/// 1. `./herald.{toml,yaml,yml,json}` (project-local)
/// 2. `~/.config/herald/herald.{toml,yaml,yml,json}` (user-global)
///
/// Returns `HeraldConfig::default()` if no config file is found or it fails
/// to parse.
pub fn discover_and_load() -> HeraldConfig {
    if let Some(path) = find_config_file() {
        debug!(path = %path.display(), "loading config");
        match load_config(&path) {
            Ok(cfg) => return cfg,
            Err(e) => {
                warn!(path = %path.display(), error = %e, "failed to load config, using defaults");
            },
        }
    } else {
        debug!("no config file found, using defaults");
    }
    HeraldConfig::default()
}

/// Load an explicitly named file (errors are fatal) or fall back to
/// discovery, then apply environment overrides.
pub fn load(explicit: Option<&Path>) -> anyhow::Result<HeraldConfig> {
    let config = match explicit {
        Some(path) => load_config(path)?,
        None => discover_and_load(),
    };
    Ok(apply_env_overrides(config))
}

/// Environment variables take precedence over file values.
///
/// - `TELEGRAM_BOT_TOKEN` (or `BOT_TOKEN`) → `telegram.token`
/// - `HERALD_REGISTRY_PATH` → `registry.path`
/// - `HERALD_QUEUE_PATH` → `delivery.queue_path`
pub fn apply_env_overrides(config: HeraldConfig) -> HeraldConfig {
    apply_overrides_with(config, |name| std::env::var(name).ok())
}

fn apply_overrides_with(
    mut config: HeraldConfig,
    lookup: impl Fn(&str) -> Option<String>,
) -> HeraldConfig {
    let var = |name: &str| lookup(name).filter(|v| !v.trim().is_empty());

    if let Some(token) = var("TELEGRAM_BOT_TOKEN").or_else(|| var("BOT_TOKEN")) {
        config.telegram.token = Some(Secret::new(token));
    }
    if let Some(path) = var("HERALD_REGISTRY_PATH") {
        config.registry.path = Some(PathBuf::from(path));
    }
    if let Some(path) = var("HERALD_QUEUE_PATH") {
        config.delivery.queue_path = PathBuf::from(path);
    }
    config
}

/// Find the first config file in standard locations.
fn find_config_file() -> Option<PathBuf> {
    // Project-local
    for name in CONFIG_FILENAMES {
        let p = PathBuf::from(name);
        if p.exists() {
            return Some(p);
        }
    }

    let config_dir = config_dir()?;
    CONFIG_FILENAMES
        .iter()
        .map(|name| config_dir.join(name))
        .find(|p| p.exists())
}

/// Returns the user-global config directory (`~/.config/herald/`).
pub fn config_dir() -> Option<PathBuf> {
    directories::ProjectDirs::from("", "", "herald").map(|d| d.config_dir().to_path_buf())
}

/// Returns the data directory holding the default registry file.
///
/// Falls back to the working directory when no home directory is known.
pub fn data_dir() -> PathBuf {
    directories::ProjectDirs::from("", "", "herald")
        .map(|d| d.data_dir().to_path_buf())
        .unwrap_or_else(|| PathBuf::from("."))
}

fn parse_config(raw: &str, path: &Path) -> anyhow::Result<HeraldConfig> {
    let ext = path.extension().and_then(|e| e.to_str()).unwrap_or("toml");

    match ext {
        "toml" => Ok(toml::from_str(raw)?),
        "yaml" | "yml" => Ok(serde_yaml::from_str(raw)?),
        "json" => Ok(serde_json::from_str(raw)?),
        _ => anyhow::bail!("unsupported config format: .{ext}"),
    }
}

#[allow(clippy::unwrap_used, clippy::expect_used)]
#[cfg(test)]
mod tests {
    use {
        super::*,
        herald_common::types::{AccessPolicy, DuplicatePolicy},
        secrecy::ExposeSecret,
        tempfile::TempDir,
    };

    #[test]
    fn loads_each_format() {
        let tmp = TempDir::new().unwrap();
        let cases = [
            ("herald.toml", "[access]\npolicy = \"open\"\n"),
            ("herald.yaml", "access:\n  policy: open\n"),
            ("herald.json", r#"{"access": {"policy": "open"}}"#),
        ];
        for (name, body) in cases {
            let path = tmp.path().join(name);
            std::fs::write(&path, body).unwrap();
            let cfg = load_config(&path).unwrap();
            assert_eq!(cfg.access.policy, AccessPolicy::Open, "{name}");
        }
    }

    #[test]
    fn unsupported_extension_fails() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("herald.ini");
        std::fs::write(&path, "policy=open").unwrap();
        let err = load_config(&path).unwrap_err().to_string();
        assert!(err.contains("unsupported config format"), "{err}");
    }

    #[test]
    fn explicit_missing_file_is_an_error() {
        let tmp = TempDir::new().unwrap();
        assert!(load(Some(&tmp.path().join("nope.toml"))).is_err());
    }

    #[test]
    fn env_overrides_win() {
        let mut cfg: HeraldConfig = toml::from_str(
            "[telegram]\ntoken = \"file-token\"\n[registry]\non_duplicate = \"reject\"\n",
        )
        .unwrap();
        cfg = apply_overrides_with(cfg, |name| match name {
            "BOT_TOKEN" => Some("env-token".into()),
            "HERALD_QUEUE_PATH" => Some("/srv/queue.json".into()),
            "HERALD_REGISTRY_PATH" => Some("  ".into()),
            _ => None,
        });

        assert_eq!(
            cfg.telegram.token.as_ref().map(|t| t.expose_secret().clone()),
            Some("env-token".to_string())
        );
        assert_eq!(cfg.delivery.queue_path, PathBuf::from("/srv/queue.json"));
        // Blank values are ignored.
        assert!(cfg.registry.path.is_none());
        assert_eq!(cfg.registry.on_duplicate, DuplicatePolicy::Reject);
    }

    #[test]
    fn telegram_bot_token_beats_bot_token() {
        let cfg = apply_overrides_with(HeraldConfig::default(), |name| match name {
            "TELEGRAM_BOT_TOKEN" => Some("primary".into()),
            "BOT_TOKEN" => Some("legacy".into()),
            _ => None,
        });
        assert_eq!(
            cfg.telegram.token.as_ref().map(|t| t.expose_secret().clone()),
            Some("primary".to_string())
        );
    }
}
