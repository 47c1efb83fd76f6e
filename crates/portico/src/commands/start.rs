//! Start command - launches the portico server.

use std::sync::Arc;

use anyhow::{Context as _, Result};
use clap::Args;
use tracing::info;

use portico_oauth::HttpTokenService;
use portico_server::Server;

use super::Context;
use super::settings::Settings;

/// Arguments for the start command.
#[derive(Args, Debug)]
pub struct StartArgs {
    #[command(flatten)]
    pub settings: Settings,
}

/// Run the start command.
pub async fn run(args: StartArgs, ctx: &Context) -> Result<()> {
    let settings = args.settings;

    // ── Authorization server ────────────────────────────────────────────

    let oauth = settings.oauth_config();
    let client = reqwest::Client::builder()
        .timeout(settings.upstream_timeout())
        .build()
        .context("Failed to build authorization-server client")?;
    let tokens = HttpTokenService::with_client(oauth, client)
        .context("Invalid authorization-server configuration")?;

    // ── Server ──────────────────────────────────────────────────────────

    let config = settings.server_config();
    if config.api_base().is_none() {
        tracing::warn!("DRUPAL_API_BASE is not set; /proxy requests will fail with 500");
    }
    if ctx.verbose {
        let summary = settings.summary();
        info!(
            bind = %summary.bind,
            api_base = ?summary.api_base,
            token_url = %summary.token_url,
            secure_cookies = summary.secure_cookies,
            ui_dir = ?summary.ui_dir,
            "Resolved configuration"
        );
    }

    let server = Server::new(config, Arc::new(tokens))?;
    println!("Portico listening on http://{}", server.bind_address());
    server.run().await?;

    Ok(())
}
