//! Bootstrap: first-start checks and idempotent seeding.
//!
//! When tricored starts:
//! 1. Verify the config has a session secret, a client id and a data dir.
//! 2. Ensure the configured groups and levels exist.
//! 3. Drop expired sessions.

use tracing::info;

use tricore_auth::model::{Group, GroupLevel, GroupLevelId};
use tricore_auth::service::{AuthService, MAX_SESSION_TTL_SECS};

use crate::config::{GroupSeed, ServerConfig};

/// Verify server configuration is ready for use.
pub fn verify_config(config: &ServerConfig) -> anyhow::Result<()> {
    if config.session.secret.is_empty() {
        anyhow::bail!("Session secret is empty in configuration.");
    }
    if config.session.ttl_secs <= 0 || config.session.ttl_secs > MAX_SESSION_TTL_SECS {
        anyhow::bail!(
            "Session ttl_secs must be between 1 and {}.",
            MAX_SESSION_TTL_SECS
        );
    }
    if config.oidc.client_id.is_empty() {
        anyhow::bail!("OIDC client_id is empty in configuration.");
    }
    if config.storage.data_dir.is_empty() {
        anyhow::bail!("Storage data_dir is empty in configuration.");
    }
    if config.oidc.provider != "google"
        && (config.oidc.auth_url.is_none() || config.oidc.token_url.is_none())
    {
        anyhow::bail!(
            "OIDC provider '{}' needs auth_url and token_url.",
            config.oidc.provider
        );
    }
    Ok(())
}

/// Ensure every configured group and level exists. Existing rows are left alone.
pub fn ensure_groups(svc: &AuthService, seeds: &[GroupSeed]) -> anyhow::Result<()> {
    for seed in seeds {
        if svc.groups().exists_by_id(&seed.name)? {
            info!(group = %seed.name, "group already exists");
        } else {
            svc.groups().save(&Group::new(&seed.name))?;
            info!(group = %seed.name, "created group");
        }

        for level in &seed.levels {
            let id = GroupLevelId::new(&seed.name, level);
            if !svc.group_levels().exists_by_id(&id)? {
                svc.group_levels().save(&GroupLevel::new(&seed.name, level))?;
                info!(group = %seed.name, level = %level, "created group level");
            }
        }
    }
    Ok(())
}

/// Drop expired and revoked sessions left over from previous runs.
pub fn purge_sessions(svc: &AuthService) -> anyhow::Result<()> {
    let purged = svc.purge_expired_sessions()?;
    if purged > 0 {
        info!(purged, "purged stale sessions");
    }
    Ok(())
}
