//! Configuration loading and env substitution.
//!
//! Config files: `herald.toml`, `herald.yaml`, `herald.yml` or `herald.json`,
//! searched in `./` then `~/.config/herald/`.
//!
//! Supports `${ENV_VAR}` substitution in all string values.

pub mod env_subst;
pub mod loader;
pub mod schema;

pub use {
    loader::{apply_env_overrides, config_dir, data_dir, discover_and_load, load, load_config},
    schema::{AccessConfig, DeliveryConfig, HeraldConfig, RegistryBackend, RegistryConfig, TelegramConfig},
};
