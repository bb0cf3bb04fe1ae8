//! Engine state - wiring and lifecycle
//!
//! `EngineState` holds the shared service singletons (campaign store,
//! sale manager) and supervises the background sweeper. Cloneable via the
//! inner `Arc`s; the embedding process keeps one instance and calls
//! [`EngineState::shutdown`] on exit.

use crate::campaigns::CampaignStore;
use crate::core::tasks::{BackgroundTasks, TaskKind};
use crate::core::Config;
use crate::orders::{ExpirySweeper, SaleManager};
use parking_lot::Mutex;
use shared::SaleResult;
use std::sync::Arc;
use std::time::Duration;

/// 引擎状态 - 持有所有服务的单例引用
pub struct EngineState {
    /// 引擎配置
    pub config: Config,
    campaigns: Arc<CampaignStore>,
    manager: Arc<SaleManager>,
    /// Supervised background tasks; taken out on shutdown
    tasks: Mutex<Option<BackgroundTasks>>,
}

impl EngineState {
    /// Initialize all services and start the background sweeper.
    ///
    /// Must run inside a tokio runtime (the sweeper is spawned here).
    pub async fn initialize(config: Config) -> SaleResult<Self> {
        let campaigns = Arc::new(CampaignStore::new());
        let manager = Arc::new(SaleManager::new(&config, campaigns.clone())?);

        let mut tasks = BackgroundTasks::new();
        let sweeper = ExpirySweeper::new(
            manager.clone(),
            Duration::from_secs(config.sweep_interval_secs),
            tasks.shutdown_token(),
        );
        tasks.spawn("expiry_sweeper", TaskKind::Periodic, sweeper.run());

        tracing::info!(
            epoch = %manager.epoch(),
            environment = %config.environment,
            sweep_interval_secs = config.sweep_interval_secs,
            "Sale engine initialized"
        );

        Ok(Self {
            config,
            campaigns,
            manager,
            tasks: Mutex::new(Some(tasks)),
        })
    }

    /// The order lifecycle manager
    pub fn manager(&self) -> Arc<SaleManager> {
        self.manager.clone()
    }

    /// The campaign store (admin operations)
    pub fn campaigns(&self) -> Arc<CampaignStore> {
        self.campaigns.clone()
    }

    /// Background task health: number of tasks that died unexpectedly
    pub fn check_health(&self) -> usize {
        self.tasks
            .lock()
            .as_ref()
            .map(|t| t.check_health())
            .unwrap_or(0)
    }

    /// Graceful shutdown: stop the sweeper and wait for it
    pub async fn shutdown(&self) {
        let tasks = self.tasks.lock().take();
        if let Some(tasks) = tasks {
            tasks.shutdown().await;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_initialize_and_shutdown() {
        let dir = tempfile::tempdir().unwrap();
        let config = Config::with_overrides(dir.path().to_str().unwrap(), 600);

        let state = EngineState::initialize(config).await.unwrap();
        assert_eq!(state.check_health(), 0);
        assert!(state.campaigns().is_empty());

        state.shutdown().await;
        // Second shutdown is a no-op
        state.shutdown().await;
    }
}
