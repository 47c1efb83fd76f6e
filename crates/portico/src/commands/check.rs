//! Check command - validates configuration without starting the server.

use anyhow::Result;
use clap::Args;
use portico_oauth::OAuthError;

use super::Context;
use super::settings::{Settings, SettingsSummary};

/// Arguments for the check command.
#[derive(Args, Debug)]
pub struct CheckArgs {
    #[command(flatten)]
    pub settings: Settings,
}

#[derive(serde::Serialize)]
struct CheckOutput {
    valid: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    error: Option<String>,
    settings: SettingsSummary,
}

/// Run the check command.
pub async fn run(args: CheckArgs, ctx: &Context) -> Result<()> {
    let settings = args.settings;
    let validation = settings.oauth_config().validate();
    let error = validation.as_ref().err().map(OAuthError::to_string);

    if ctx.json_output {
        let output = CheckOutput {
            valid: error.is_none(),
            error: error.clone(),
            settings: settings.summary(),
        };
        println!("{}", serde_json::to_string_pretty(&output)?);
    } else {
        print_summary(&settings.summary());
    }

    validation?;
    if !ctx.json_output {
        println!("Configuration OK");
    }
    Ok(())
}

fn print_summary(summary: &SettingsSummary) {
    let unset = || "(unset)".to_string();
    println!("bind:             {}", summary.bind);
    println!("api base:         {}", summary.api_base.clone().unwrap_or_else(unset));
    println!("token url:        {}", summary.token_url);
    println!("revoke url:       {}", summary.revoke_url.clone().unwrap_or_else(unset));
    println!("userinfo url:     {}", summary.userinfo_url.clone().unwrap_or_else(unset));
    println!("client id:        {}", summary.client_id);
    println!("client secret:    {}", summary.client_secret.clone().unwrap_or_else(unset));
    println!("scope:            {}", summary.scope.clone().unwrap_or_else(unset));
    println!("secure cookies:   {}", summary.secure_cookies);
    println!("ui dir:           {}", summary.ui_dir.clone().unwrap_or_else(unset));
    println!("upstream timeout: {}s", summary.upstream_timeout_secs);
    if !summary.cors_origins.is_empty() {
        println!("cors origins:     {}", summary.cors_origins.join(", "));
    }
}
