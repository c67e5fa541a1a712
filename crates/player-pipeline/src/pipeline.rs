//! 파이프라인 오케스트레이션 — 감시/파싱/저장/알림의 전체 흐름을 관리합니다.
//!
//! [`PlayerPipeline`]은 core의 [`Pipeline`](gatewatch_core::pipeline::Pipeline)
//! trait을 구현하여 상위 호스트(CLI 등)에서 동일한 생명주기로 관리됩니다.
//!
//! # 내부 아키텍처
//! ```text
//! per-source watch task -> LineParser -> GeoCache -> PlayerStore -> mpsc -> downstream
//! ```
//!
//! 소스 태스크는 서로 독립적이며, 전역 취소 토큰으로만 함께 정지합니다.
//! 취소 시 각 태스크는 진행 중인 폴 사이클을 마치고 종료합니다.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

use gatewatch_core::error::{GatewatchError, PipelineError};
use gatewatch_core::event::AlertEvent;
use gatewatch_core::pipeline::{HealthStatus, Pipeline};

use crate::config::PipelineConfig;
use crate::error::PlayerPipelineError;
use crate::geo::{GeoCache, HttpGeoProvider};
use crate::monitor::{BatchStats, LogMonitor};
use crate::store::PlayerStore;

/// 파이프라인 실행 상태
#[derive(Debug, Clone, PartialEq, Eq)]
enum PipelineState {
    /// 초기화됨, 아직 시작하지 않음
    Initialized,
    /// 실행 중
    Running,
    /// 정지됨
    Stopped,
}

/// 플레이어 파이프라인
///
/// # 사용 예시
/// ```ignore
/// use gatewatch_core::pipeline::Pipeline;
/// use gatewatch_player_pipeline::{PlayerPipeline, PlayerPipelineBuilder};
///
/// let (mut pipeline, alert_rx) = PlayerPipelineBuilder::new()
///     .config(config)
///     .build()?;
///
/// pipeline.start().await?;
/// ```
pub struct PlayerPipeline {
    /// 파이프라인 설정
    config: PipelineConfig,
    /// 현재 상태
    state: PipelineState,
    /// 신원 저장소
    store: Arc<PlayerStore>,
    /// 로그 모니터 (소스 태스크들이 공유)
    monitor: Arc<LogMonitor<HttpGeoProvider>>,
    /// 전역 종료 토큰
    cancel: CancellationToken,
    /// 소스별 감시 태스크 핸들
    tasks: Vec<tokio::task::JoinHandle<()>>,
}

impl PlayerPipeline {
    /// 현재 상태 이름을 반환합니다.
    pub fn state_name(&self) -> &str {
        match self.state {
            PipelineState::Initialized => "initialized",
            PipelineState::Running => "running",
            PipelineState::Stopped => "stopped",
        }
    }

    /// 신원 저장소 핸들을 반환합니다.
    ///
    /// 조회/관리 연산(알트 질의, 제재 북키핑 등)은 이 핸들로 수행합니다.
    pub fn store(&self) -> Arc<PlayerStore> {
        Arc::clone(&self.store)
    }

    /// 설정된 소스 수를 반환합니다.
    pub fn source_count(&self) -> usize {
        self.config.sources.len()
    }

    /// 과거 로그 파일들을 배치로 임포트합니다.
    ///
    /// 연속 감시와 독립적으로, 시작 전/후 어느 시점에든 호출할 수 있습니다.
    pub async fn import_files(
        &self,
        source: &str,
        paths: &[impl AsRef<std::path::Path>],
    ) -> BatchStats {
        self.monitor.import_files(source, paths).await
    }

    /// 보존 기간을 지난 접속 이벤트를 정리합니다.
    pub fn prune_events(&self) -> Result<usize, PlayerPipelineError> {
        self.store.prune_events(self.config.retention_days)
    }
}

impl Pipeline for PlayerPipeline {
    async fn start(&mut self) -> Result<(), GatewatchError> {
        if self.state == PipelineState::Running {
            return Err(PipelineError::AlreadyRunning.into());
        }

        tracing::info!(sources = self.config.sources.len(), "starting player pipeline");

        if self.config.sources.is_empty() {
            tracing::warn!("no sources configured, pipeline will only serve queries");
        }

        // 재시작을 지원하기 위해 토큰을 새로 만든다
        self.cancel = CancellationToken::new();

        for source in &self.config.sources {
            let monitor = Arc::clone(&self.monitor);
            let source = source.clone();
            let cancel = self.cancel.child_token();
            self.tasks.push(tokio::spawn(async move {
                monitor.watch_source(&source, cancel).await;
            }));
        }

        self.state = PipelineState::Running;
        tracing::info!("player pipeline started");
        Ok(())
    }

    async fn stop(&mut self) -> Result<(), GatewatchError> {
        if self.state != PipelineState::Running {
            return Err(PipelineError::NotRunning.into());
        }

        tracing::info!("stopping player pipeline");

        // 소스 태스크들이 진행 중인 폴 사이클을 마치고 내려오도록 기다린다
        self.cancel.cancel();
        for task in self.tasks.drain(..) {
            if let Err(e) = task.await {
                tracing::error!(error = %e, "source watch task panicked");
            }
        }

        self.state = PipelineState::Stopped;
        tracing::info!("player pipeline stopped");
        Ok(())
    }

    async fn health_check(&self) -> HealthStatus {
        match self.state {
            PipelineState::Running => {
                if let Err(e) = self.store.ping() {
                    return HealthStatus::Degraded(format!("store unreachable: {e}"));
                }
                let dead = self.tasks.iter().filter(|t| t.is_finished()).count();
                if dead > 0 {
                    return HealthStatus::Degraded(format!("{dead} source task(s) stopped"));
                }
                HealthStatus::Healthy
            }
            PipelineState::Initialized => HealthStatus::Unhealthy("not started".to_owned()),
            PipelineState::Stopped => HealthStatus::Unhealthy("stopped".to_owned()),
        }
    }
}

/// 플레이어 파이프라인 빌더
///
/// 설정에 따라 저장소/지오 캐시/모니터를 조립하고 알림 채널을 만듭니다.
pub struct PlayerPipelineBuilder {
    config: PipelineConfig,
    alert_tx: Option<mpsc::Sender<AlertEvent>>,
}

impl PlayerPipelineBuilder {
    /// 새 빌더를 생성합니다.
    pub fn new() -> Self {
        Self {
            config: PipelineConfig::default(),
            alert_tx: None,
        }
    }

    /// 파이프라인 설정을 지정합니다.
    pub fn config(mut self, config: PipelineConfig) -> Self {
        self.config = config;
        self
    }

    /// 외부 알림 전송 채널을 설정합니다.
    ///
    /// 설정하지 않으면 빌더가 새 채널을 생성합니다.
    pub fn alert_sender(mut self, tx: mpsc::Sender<AlertEvent>) -> Self {
        self.alert_tx = Some(tx);
        self
    }

    /// 파이프라인을 빌드합니다.
    ///
    /// # Returns
    /// - `PlayerPipeline`: 파이프라인 인스턴스
    /// - `Option<mpsc::Receiver<AlertEvent>>`: 알림 수신 채널
    ///   (외부 alert_sender를 설정한 경우 None)
    pub fn build(
        self,
    ) -> Result<(PlayerPipeline, Option<mpsc::Receiver<AlertEvent>>), PlayerPipelineError> {
        self.config.validate()?;

        let (alert_tx, alert_rx) = match self.alert_tx {
            Some(tx) => (tx, None),
            None => {
                let (tx, rx) = mpsc::channel(self.config.alert_channel_capacity);
                (tx, Some(rx))
            }
        };

        let store = Arc::new(PlayerStore::open(&self.config.db_path)?);

        let geo = if self.config.geo_enabled {
            let provider =
                HttpGeoProvider::new(&self.config.geo_api_url, &self.config.geo_api_key)?;
            Some(Arc::new(GeoCache::new(
                provider,
                Duration::from_secs(self.config.geo_cache_ttl_secs),
            )))
        } else {
            None
        };

        let monitor = Arc::new(LogMonitor::new(
            Arc::clone(&store),
            geo,
            alert_tx,
            Duration::from_secs(self.config.poll_interval_secs),
        )?);

        let pipeline = PlayerPipeline {
            config: self.config,
            state: PipelineState::Initialized,
            store,
            monitor,
            cancel: CancellationToken::new(),
            tasks: Vec::new(),
        };

        Ok((pipeline, alert_rx))
    }
}

impl Default for PlayerPipelineBuilder {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::PipelineConfigBuilder;

    fn temp_config(dir: &tempfile::TempDir) -> PipelineConfig {
        PipelineConfigBuilder::new()
            .db_path(dir.path().join("players.db").to_string_lossy().into_owned())
            .build()
            .unwrap()
    }

    #[test]
    fn builder_creates_pipeline() {
        let dir = tempfile::tempdir().unwrap();
        let (pipeline, alert_rx) = PlayerPipelineBuilder::new()
            .config(temp_config(&dir))
            .build()
            .unwrap();
        assert_eq!(pipeline.state_name(), "initialized");
        assert!(alert_rx.is_some());
        assert_eq!(pipeline.source_count(), 0);
    }

    #[test]
    fn builder_with_external_alert_sender() {
        let dir = tempfile::tempdir().unwrap();
        let (alert_tx, _alert_rx) = mpsc::channel(16);
        let (_pipeline, rx) = PlayerPipelineBuilder::new()
            .config(temp_config(&dir))
            .alert_sender(alert_tx)
            .build()
            .unwrap();
        assert!(rx.is_none()); // no internal receiver when external sender is provided
    }

    #[test]
    fn builder_with_invalid_config_fails() {
        let mut config = PipelineConfig::default();
        config.poll_interval_secs = 0;
        let result = PlayerPipelineBuilder::new().config(config).build();
        assert!(result.is_err());
    }

    #[tokio::test]
    async fn pipeline_lifecycle() {
        let dir = tempfile::tempdir().unwrap();
        let (mut pipeline, _alert_rx) = PlayerPipelineBuilder::new()
            .config(temp_config(&dir))
            .build()
            .unwrap();

        // 시작 전에는 unhealthy
        assert!(pipeline.health_check().await.is_unhealthy());

        // 시작 전 stop은 에러
        assert!(pipeline.stop().await.is_err());

        pipeline.start().await.unwrap();
        assert_eq!(pipeline.state_name(), "running");
        assert!(pipeline.health_check().await.is_healthy());

        // 이중 시작은 에러
        assert!(pipeline.start().await.is_err());

        pipeline.stop().await.unwrap();
        assert_eq!(pipeline.state_name(), "stopped");
        assert!(pipeline.health_check().await.is_unhealthy());
    }

    #[tokio::test]
    async fn pipeline_restarts_after_stop() {
        let dir = tempfile::tempdir().unwrap();
        let (mut pipeline, _alert_rx) = PlayerPipelineBuilder::new()
            .config(temp_config(&dir))
            .build()
            .unwrap();

        pipeline.start().await.unwrap();
        pipeline.stop().await.unwrap();
        pipeline.start().await.unwrap();
        assert_eq!(pipeline.state_name(), "running");
        pipeline.stop().await.unwrap();
    }

    #[tokio::test]
    async fn prune_events_runs_on_empty_store() {
        let dir = tempfile::tempdir().unwrap();
        let (pipeline, _alert_rx) = PlayerPipelineBuilder::new()
            .config(temp_config(&dir))
            .build()
            .unwrap();
        assert_eq!(pipeline.prune_events().unwrap(), 0);
    }
}
