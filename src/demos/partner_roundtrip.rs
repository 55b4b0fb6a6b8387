//! Partner Round Trip Example
//!
//! Logs in, creates a partner, reads it back, renders a report and logs out.
//!
//! Run with: cargo run --example partner_roundtrip -- config.json

use odoorpc_rs::{Client, Config, Domain};
use serde_json::json;
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

fn init_telemetry() -> anyhow::Result<()> {
    let env_filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("partner_roundtrip=info,odoorpc_rs=debug"));

    tracing_subscriber::registry()
        .with(env_filter)
        .with(fmt::layer().with_target(false))
        .try_init()?;
    Ok(())
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    init_telemetry()?;

    let path = std::env::args().nth(1).unwrap_or_else(|| "config.json".to_string());
    let config = Config::load(&path).unwrap_or_else(|_| {
        tracing::warn!("Failed to load {}, using local defaults", path);
        Config::default().with_credentials("admin", "admin")
    });

    let client = Client::connect(&config).await?;
    let session = client.session();
    tracing::info!("✓ Logged in as uid {} on {}", session.uid, session.dbname);

    let partners = client.model("res.partner");
    let ids = partners.create(&json!({"name": "odoorpc: Test Partner"})).await?;
    tracing::info!("📝 Created partner {:?}", ids);

    let found = client
        .model("res.partner")
        .search(Domain::new().filter("name", "=", "odoorpc: Test Partner"))?
        .read(&["name", "email"])
        .await?;
    for record in &found {
        tracing::info!("   {} {}", record["id"], record["name"]);
    }

    partners.write(&ids, &json!({"name": "odoorpc: Test Partner Updated"})).await?;
    partners.unlink(&ids).await?;
    tracing::info!("🗑  Removed partner {:?}", ids);

    let companies = client.model("res.company").read(&["id"]).await?;
    if let Some(company_id) = companies.first().and_then(|c| c["id"].as_i64()) {
        let pdf = client
            .model("res.company")
            .print("web.preview_internalreport", &[company_id])
            .await?;
        tracing::info!("📄 Report rendered ({} bytes)", pdf.len());
    }

    client.logout().await?;
    tracing::info!("Logged out");
    Ok(())
}
