//! Session commands for the hosted backend.

use anyhow::{Context, Result};
use colored::Colorize;
use leafid_core::{Config, LeafError, SessionGate, User};

fn describe(user: &User) -> String {
    match &user.email {
        Some(email) => format!("{email} ({})", user.id),
        None => user.id.to_string(),
    }
}

/// Store an access token issued by the identity provider.
pub async fn login(config: &Config, token: String, quiet: bool) -> Result<()> {
    let session = config.token_session()?;
    let user = session.sign_in(&token).await.context("Sign-in failed")?;

    if !quiet {
        println!("{} {}", "Signed in as".green(), describe(&user).bold());
    }
    Ok(())
}

pub async fn logout(config: &Config, quiet: bool) -> Result<()> {
    let session = config.token_session()?;
    session.sign_out().await.context("Failed to remove session token")?;

    if !quiet {
        println!("{}", "Signed out".green());
    }
    Ok(())
}

pub async fn whoami(config: &Config) -> Result<()> {
    let session = config.token_session()?;
    match session.current_user().await {
        Some(user) => {
            println!("{}", describe(&user));
            Ok(())
        }
        None => Err(LeafError::Unauthenticated("not signed in".into()).into()),
    }
}
