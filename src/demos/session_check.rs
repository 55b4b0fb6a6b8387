//! Session Check Example
//!
//! Checks whether the server still knows us, logging in only when needed.
//!
//! Run with: RUST_LOG=odoorpc_rs=info cargo run --example session_check

use odoorpc_rs::{Client, Config};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    let config = Config::load("config.json").unwrap_or_default().with_verbose(true);
    let client = Client::from_config(&config);

    if client.has_session().await {
        println!("Session still valid (uid {})", client.session().uid);
    } else {
        let username = config.username.as_deref().unwrap_or("admin");
        let password = config.password.as_deref().unwrap_or("admin");
        client.login(username, password).await?;
        println!("Logged in again (uid {})", client.session().uid);
    }

    Ok(())
}
