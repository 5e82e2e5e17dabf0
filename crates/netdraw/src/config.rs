//! CLI configuration: thin wrapper around `netdraw_config`.
//!
//! Adds the resolution that respects `GlobalOpts` flag overrides
//! (--server, --inventory, --token, --insecure, --timeout).

use std::time::Duration;

use secrecy::SecretString;

use netdraw_core::{SessionConfig, TlsVerification};

use crate::cli::GlobalOpts;
use crate::error::CliError;

pub use netdraw_config::{Config, config_path, load_config_or_default};

/// Resolve the active profile name from CLI flags and config.
pub fn active_profile_name(global: &GlobalOpts, config: &Config) -> String {
    global
        .profile
        .clone()
        .or_else(|| config.default_profile.clone())
        .unwrap_or_else(|| "default".into())
}

/// Build a `SessionConfig` from the config file, the active profile and
/// CLI overrides. Flags win over profile values.
pub fn resolve_session(global: &GlobalOpts, cfg: &Config) -> Result<SessionConfig, CliError> {
    let profile_name = active_profile_name(global, cfg);

    let Some(profile) = cfg.profiles.get(&profile_name) else {
        // An explicitly named profile must exist.
        if global.profile.is_some() {
            let mut available: Vec<_> = cfg.profiles.keys().cloned().collect();
            available.sort();
            return Err(CliError::ProfileNotFound {
                name: profile_name,
                available: if available.is_empty() {
                    "(none)".into()
                } else {
                    available.join(", ")
                },
            });
        }
        return from_flags(global);
    };

    let mut session = {
        // Flag overrides are layered onto a copy so validation sees them.
        let mut merged = profile.clone();
        if let Some(ref server) = global.server {
            merged.server.clone_from(server);
        }
        if global.inventory.is_some() {
            merged.inventory = global.inventory;
        }
        netdraw_config::profile_to_session_config(&merged, &profile_name, &cfg.defaults)?
    };

    if let Some(ref token) = global.token {
        session.token = Some(SecretString::from(token.clone()));
    }
    if global.insecure {
        session.tls = TlsVerification::DangerAcceptInvalid;
    }
    if let Some(secs) = global.timeout {
        session.timeout = Duration::from_secs(secs);
    }
    Ok(session)
}

/// No profile on disk: everything comes from flags and env vars.
fn from_flags(global: &GlobalOpts) -> Result<SessionConfig, CliError> {
    let server = global.server.as_deref().ok_or_else(|| CliError::NoConfig {
        path: config_path().display().to_string(),
    })?;
    let url = netdraw_config::parse_server_url(server)?;
    let inventory = global.inventory.ok_or_else(|| CliError::Validation {
        field: "inventory".into(),
        reason: "pass --inventory or set NETDRAW_INVENTORY".into(),
    })?;

    let mut session = SessionConfig::new(url, inventory);
    session.token = global.token.clone().map(SecretString::from);
    if global.insecure {
        session.tls = TlsVerification::DangerAcceptInvalid;
    }
    if let Some(secs) = global.timeout {
        session.timeout = Duration::from_secs(secs);
    }
    Ok(session)
}
