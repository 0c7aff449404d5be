//! Configuration check.

use tradepost_storefront::config::StorefrontConfig;
use tradepost_storefront::db;

use super::CommandError;

/// Load the storefront configuration and, unless `offline`, ping the
/// session database.
///
/// # Errors
///
/// Returns an error for invalid configuration or an unreachable database.
pub async fn config(offline: bool) -> Result<(), CommandError> {
    let config = StorefrontConfig::from_env()?;
    tracing::info!(
        addr = %config.socket_addr(),
        api = %config.api.base_url,
        currency = ?config.currency,
        secure_cookies = config.is_secure(),
        "Configuration is valid"
    );

    if offline {
        return Ok(());
    }

    let pool = db::create_pool(&config.database_url).await?;
    db::ping(&pool).await?;
    tracing::info!("Session database reachable");
    Ok(())
}
