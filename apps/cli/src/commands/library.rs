//! Remote library commands: `test-connection` and `list`.

use tonton_core::library::total_size;
use tonton_sync::SyncService;
use tracing::info;

use super::Output;
use crate::error::Result;

pub async fn test_connection(service: &SyncService) -> Result<Output> {
    let result = service.test_connection().await;
    if result.success {
        info!("PC reachable");
    }
    Output::new(&result, result.success)
}

pub async fn list(service: &SyncService) -> Result<Output> {
    let result = service.list_remote_games().await;
    if result.success {
        info!(
            games = result.games.len(),
            total_bytes = total_size(&result.games),
            "Fetched remote library"
        );
    }
    Output::new(&result, result.success)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tonton_sync::TonTonConfig;

    #[tokio::test]
    async fn test_unconfigured_connection_reports_failure() {
        let service = SyncService::in_memory(TonTonConfig::default());

        let output = test_connection(&service).await.unwrap();
        assert!(!output.success);
        assert!(output.rendered.contains("Configure PC connection first"));
    }

    #[tokio::test]
    async fn test_unconfigured_list_reports_failure() {
        let service = SyncService::in_memory(TonTonConfig::default());

        let output = list(&service).await.unwrap();
        assert!(!output.success);
        assert!(output.rendered.contains("\"games\": []"));
    }
}
