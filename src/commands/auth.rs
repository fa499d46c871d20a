use anyhow::Result;
use log::{error, info};
use std::sync::Arc;

use crate::api::auth::TokenIssuer;
use crate::api::client::HttpTransport;
use crate::config::SyncConfig;

/// Request one token with the configured client credentials
pub async fn auth_command(config: &SyncConfig) -> Result<()> {
    info!("Executing auth command");
    config.validate()?;

    println!("Unily Authentication Check");
    println!("==========================");
    println!("  Base URL: {}", config.base_url);
    println!("  Client ID: {}", config.client_id);

    let transport = Arc::new(HttpTransport::new(config.accept_invalid_certs)?);
    let issuer = TokenIssuer::new(transport, &config.base_url, config.credentials());

    match issuer.issue().await {
        Ok(_) => {
            info!("Authentication test successful");
            println!("✓ Authentication successful");
            Ok(())
        }
        Err(e) => {
            error!("Authentication test failed: {}", e);
            println!("✗ Authentication failed: {}", e);
            Err(e.into())
        }
    }
}
