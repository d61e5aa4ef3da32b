use std::path::Path;

use liftsync_core::config::{ConfigError, RemoteConfig};
use liftsync_core::util::{is_http_url, normalize_text_option};

use crate::cli::ConfigCommands;
use crate::commands::common::CliContext;
use crate::error::CliError;

/// Values given to `config init`; unset fields keep the stored value.
#[derive(Debug, Default)]
pub struct ConfigInit {
    pub supabase_url: Option<String>,
    pub supabase_anon_key: Option<String>,
    pub access_token: Option<String>,
    pub user_id: Option<String>,
    pub sync_interval: Option<u64>,
    pub request_timeout: Option<u64>,
}

pub fn run_config(command: ConfigCommands, context: &CliContext) -> Result<(), CliError> {
    match command {
        ConfigCommands::Init {
            supabase_url,
            supabase_anon_key,
            access_token,
            user_id,
            sync_interval,
            request_timeout,
        } => run_config_init(
            &context.config_path,
            ConfigInit {
                supabase_url,
                supabase_anon_key,
                access_token,
                user_id,
                sync_interval,
                request_timeout,
            },
        ),
        ConfigCommands::Show => {
            println!("config file: {}", context.config_path.display());
            println!("database:    {}", context.db_path.display());
            println!("{:#?}", context.config);
            Ok(())
        }
    }
}

pub fn run_config_init(path: &Path, init: ConfigInit) -> Result<(), CliError> {
    // Environment overrides are not persisted.
    let existing = RemoteConfig::load(path)?;
    let config = merge_config_init(existing, init)?;
    config.save(path)?;

    println!("Saved config to {}", path.display());
    if config.endpoint().is_err() {
        println!(
            "Sync needs supabase_url, supabase_anon_key and access_token \
             before `liftsync sync` works."
        );
    }
    Ok(())
}

pub fn merge_config_init(
    mut config: RemoteConfig,
    init: ConfigInit,
) -> Result<RemoteConfig, CliError> {
    if let Some(url) = normalize_text_option(init.supabase_url) {
        if !is_http_url(&url) {
            return Err(ConfigError::InvalidUrl {
                field: "supabase_url",
            }
            .into());
        }
        config.supabase_url = Some(url.trim_end_matches('/').to_string());
    }
    if let Some(key) = normalize_text_option(init.supabase_anon_key) {
        config.supabase_anon_key = Some(key);
    }
    if let Some(token) = normalize_text_option(init.access_token) {
        config.access_token = Some(token);
    }
    if let Some(user_id) = normalize_text_option(init.user_id) {
        config.user_id = Some(user_id);
    }
    if init.sync_interval.is_some() {
        config.sync_interval_secs = init.sync_interval;
    }
    if init.request_timeout.is_some() {
        config.request_timeout_secs = init.request_timeout;
    }
    Ok(config)
}
