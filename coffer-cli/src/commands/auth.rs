//! Account commands: register, login, logout.

use anyhow::{Context, Result};
use coffer_types::Credentials;

use super::Options;
use crate::config::Session;

/// Create an account and save the session.
pub async fn register(opts: &Options, user: &str) -> Result<()> {
    let session = authenticate(opts, user, true).await?;
    println!("Registered '{}' on {}", session.username, session.server);
    Ok(())
}

/// Log in and save the session.
pub async fn login(opts: &Options, user: &str) -> Result<()> {
    let session = authenticate(opts, user, false).await?;
    println!("Logged in as '{}' on {}", session.username, session.server);
    Ok(())
}

async fn authenticate(opts: &Options, user: &str, register: bool) -> Result<Session> {
    if user.is_empty() {
        anyhow::bail!("Username cannot be empty");
    }

    let saved = Session::load_optional(&opts.data_dir).await.ok().flatten();
    let server = opts.server_url(saved.as_ref());
    let mut client = opts.client(&server).await?;

    let password = opts.password(&format!("Password for {user}: "))?;
    let creds = Credentials::new(user, password);

    let result = if register {
        client.register(&creds).await
    } else {
        client.login(&creds).await
    };
    result.context(if register {
        "Registration failed"
    } else {
        "Login failed"
    })?;

    let token = client
        .token()
        .context("Server did not issue a token")?;
    let session = Session::new(&server, user, token);
    session.save(&opts.data_dir).await?;
    Ok(session)
}

/// Forget the saved session.
pub async fn logout(opts: &Options) -> Result<()> {
    if Session::remove(&opts.data_dir).await? {
        println!("Logged out.");
    } else {
        println!("No active session.");
    }
    Ok(())
}
