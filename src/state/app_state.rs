//! 应用状态
//!
//! 持有配置、日志中心和引擎，由 `main` 显式创建并传递

use chrono::{DateTime, Utc};
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;

use crate::config::EngineConfig;
use crate::error::HornetResult;
use crate::infra::{CommandExecutor, ProcessExecutor};
use crate::services::SwarmEngine;

use super::log_hub::LogHub;

/// 日志通道清理间隔
const LOG_CLEANUP_INTERVAL: Duration = Duration::from_secs(600);

/// 无订阅者通道的最长保留时间（小时）
const LOG_CHANNEL_MAX_AGE_HOURS: i64 = 24;

/// 应用状态
pub struct AppState {
    /// 环境配置
    pub config: EngineConfig,
    /// 服务启动时间
    pub started_at: DateTime<Utc>,
    /// 日志中心
    pub log_hub: Arc<LogHub>,
    /// 编排引擎
    pub engine: SwarmEngine,
    /// 关闭信号，后台任务据此退出
    shutdown: CancellationToken,
}

impl AppState {
    /// 启动引擎并创建应用状态
    pub async fn init(config: EngineConfig) -> HornetResult<Arc<Self>> {
        tracing::info!(
            init_swarm = config.init_swarm,
            registry = %config.registry_address(),
            default_network = ?config.default_network,
            discover_runtime = config.discover_runtime,
            add_service_timeout = ?config.add_service_timeout,
            build_root = %config.build_root.display(),
            "Loaded configuration"
        );

        let log_hub = Arc::new(LogHub::new());
        let executor: Arc<dyn CommandExecutor> =
            Arc::new(ProcessExecutor::new(log_hub.clone(), config.log_commands));
        let engine = SwarmEngine::start(config.clone(), executor, log_hub.clone()).await?;

        let state = Arc::new(Self::with_engine(config, log_hub, engine));
        state.spawn_log_janitor();
        Ok(state)
    }

    /// 使用已构建的引擎创建状态（不启动后台任务）
    pub fn with_engine(config: EngineConfig, log_hub: Arc<LogHub>, engine: SwarmEngine) -> Self {
        Self {
            config,
            started_at: Utc::now(),
            log_hub,
            engine,
            shutdown: CancellationToken::new(),
        }
    }

    /// 关闭信号
    pub fn shutdown_token(&self) -> CancellationToken {
        self.shutdown.clone()
    }

    /// 停止后台任务并清理 swarm
    pub async fn shutdown(&self) -> HornetResult<()> {
        self.shutdown.cancel();
        tracing::info!(
            uptime_secs = (Utc::now() - self.started_at).num_seconds(),
            "Shutting down"
        );
        self.engine.clean_swarm(None).await
    }

    /// 定期回收过期的日志通道
    fn spawn_log_janitor(&self) {
        tokio::spawn(run_log_janitor(
            self.log_hub.clone(),
            LOG_CLEANUP_INTERVAL,
            self.shutdown.clone(),
        ));
    }
}

/// 日志通道清理循环，收到关闭信号后退出
async fn run_log_janitor(log_hub: Arc<LogHub>, period: Duration, shutdown: CancellationToken) {
    let mut interval = tokio::time::interval(period);
    interval.tick().await;
    loop {
        tokio::select! {
            _ = shutdown.cancelled() => break,
            _ = interval.tick() => {
                log_hub.cleanup_expired(LOG_CHANNEL_MAX_AGE_HOURS).await;
                let channels = log_hub.count().await;
                tracing::debug!(channels, "Log channel cleanup");
            }
        }
    }
}
