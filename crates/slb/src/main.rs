use std::sync::Arc;

use slb_core::{config::Settings, dispatcher::CommandDispatcher, errors::Error};
use slb_sheets::{auth::ServiceAccountKey, SheetsClient};

#[tokio::main]
async fn main() -> Result<(), Error> {
    slb_core::logging::init("slb")?;

    let settings = Settings::load()?;
    let key = ServiceAccountKey::from_json(&settings.service_account)?;

    let store = Arc::new(SheetsClient::connect(&settings.sheet_id, key).await?);
    let dispatcher = CommandDispatcher::new(store);
    dispatcher.prepare().await?;

    slb_telegram::router::run_polling(&settings.bot_token, dispatcher)
        .await
        .map_err(|e| Error::External(format!("telegram bot failed: {e}")))?;

    tracing::info!("dispatcher stopped");
    Ok(())
}
