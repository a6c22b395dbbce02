//! Field engine initialization

use crate::config::ServerConfig;
use anyhow::Result;
use tracing::{info, warn};
use yap_sdk::{FieldEngine, FieldEngineBuilder};

/// Build the engine from the server configuration and, when asked, import
/// the sync directory before serving
pub async fn init_engine(config: &ServerConfig) -> Result<FieldEngine> {
    let engine = FieldEngineBuilder::from_config(config.engine.clone())
        .build()
        .await?;

    if config.sync_on_start && config.engine.sync_dir.is_some() {
        match engine.sync_from_directory().await {
            Ok(reports) => {
                for report in &reports {
                    info!(
                        "Synced group '{}' ({} field(s), {:?})",
                        report.group, report.fields_imported, report.status
                    );
                }
            }
            Err(e) => warn!("Initial sync failed, serving without it: {}", e),
        }
    }

    Ok(engine)
}
