//! Demo binary: runs the subscription bootstrap against in-memory adapters
//! and a mock billing provider, then prints the user's ledger.
//!
//! ```text
//! credit-sync <user-id> [product-id]
//! ```

use std::error::Error;
use std::sync::Arc;

use secrecy::SecretString;

use credit_sync::adapters::{InMemoryDocumentStore, InMemoryEventBus, MockBillingProvider};
use credit_sync::application::CreditSyncState;
use credit_sync::config::AppConfig;
use credit_sync::domain::foundation::UserId;
use credit_sync::ports::Package;

const DEMO_API_KEY: &str = "demo_mock_key";

#[tokio::main]
async fn main() -> Result<(), Box<dyn Error>> {
    let mut args = std::env::args().skip(1);
    let user_id = UserId::new(args.next().unwrap_or_else(|| "demo-user".to_string()))?;
    let product_id = args.next();

    let mut config = AppConfig::load()?;
    config.telemetry.init_tracing()?;

    // The mock provider accepts any key
    if config.provider.api_key().is_none() {
        tracing::warn!("No provider API key configured, using the mock key");
        config.provider.api_key = Some(SecretString::new(DEMO_API_KEY.to_string()));
    }
    config.validate()?;

    let state = CreditSyncState::new(
        &config,
        Arc::new(InMemoryDocumentStore::new()),
        Arc::new(MockBillingProvider::with_entitlement(
            config.provider.entitlement_id.clone(),
        )),
        Arc::new(InMemoryEventBus::new()),
    );

    let report = state.initialize_subscription_system(&user_id).await;
    println!("{}", serde_json::to_string_pretty(&report)?);
    if !report.success {
        tracing::warn!("Continuing without subscription gating");
        return Ok(());
    }

    if let Some(product_id) = product_id {
        let package = Package::new(product_id.clone(), product_id);
        state.sync.purchase(&user_id, &package).await?;
    }

    let record = state.ledger.read(&user_id).await?;
    println!("{}", serde_json::to_string_pretty(&record)?);
    Ok(())
}
