//! 플레이어 파이프라인 설정
//!
//! [`PipelineConfig`]는 core의 [`GatewatchConfig`](gatewatch_core::config::GatewatchConfig)에서
//! 파이프라인에 필요한 값만 모은 평탄화된 설정입니다.
//!
//! # 사용 예시
//! ```ignore
//! use gatewatch_core::config::GatewatchConfig;
//! use gatewatch_player_pipeline::config::PipelineConfig;
//!
//! let core_config = GatewatchConfig::default();
//! let config = PipelineConfig::from_core(&core_config);
//! ```

use serde::{Deserialize, Serialize};

use gatewatch_core::config::{GatewatchConfig, SourceConfig};

use crate::error::PlayerPipelineError;

/// 플레이어 파이프라인 설정
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PipelineConfig {
    /// SQLite 데이터베이스 파일 경로
    pub db_path: String,
    /// 감시 대상 소스 목록
    pub sources: Vec<SourceConfig>,
    /// 연속 감시 폴링 주기 (초)
    pub poll_interval_secs: u64,
    /// 접속 이벤트 보존 기간 (일)
    pub retention_days: u32,
    /// 지오로케이션 보강 활성화 여부
    pub geo_enabled: bool,
    /// 지오로케이션 API 엔드포인트
    pub geo_api_url: String,
    /// 지오로케이션 API 키
    pub geo_api_key: String,
    /// 지오로케이션 캐시 TTL (초)
    pub geo_cache_ttl_secs: u64,
    /// 알림 채널 용량
    pub alert_channel_capacity: usize,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self::from_core(&GatewatchConfig::default())
    }
}

impl PipelineConfig {
    /// core 통합 설정에서 파이프라인 설정을 만듭니다.
    pub fn from_core(core: &GatewatchConfig) -> Self {
        Self {
            db_path: core.store.db_path.clone(),
            sources: core.monitor.sources.clone(),
            poll_interval_secs: core.monitor.poll_interval_secs,
            retention_days: core.store.retention_days,
            geo_enabled: core.geo.enabled,
            geo_api_url: core.geo.api_url.clone(),
            geo_api_key: core.geo.api_key.clone(),
            geo_cache_ttl_secs: core.geo.cache_ttl_secs,
            alert_channel_capacity: core.notify.channel_capacity,
        }
    }

    /// 설정값의 유효성을 검증합니다.
    pub fn validate(&self) -> Result<(), PlayerPipelineError> {
        const MAX_POLL_INTERVAL_SECS: u64 = 3600; // 1 hour
        const MAX_CHANNEL_CAPACITY: usize = 1_000_000;

        if self.db_path.is_empty() {
            return Err(PlayerPipelineError::Config {
                field: "db_path".to_owned(),
                reason: "must not be empty".to_owned(),
            });
        }

        if self.poll_interval_secs == 0 || self.poll_interval_secs > MAX_POLL_INTERVAL_SECS {
            return Err(PlayerPipelineError::Config {
                field: "poll_interval_secs".to_owned(),
                reason: format!("must be 1-{MAX_POLL_INTERVAL_SECS}"),
            });
        }

        if self.retention_days == 0 {
            return Err(PlayerPipelineError::Config {
                field: "retention_days".to_owned(),
                reason: "must be greater than 0".to_owned(),
            });
        }

        if self.alert_channel_capacity == 0 || self.alert_channel_capacity > MAX_CHANNEL_CAPACITY {
            return Err(PlayerPipelineError::Config {
                field: "alert_channel_capacity".to_owned(),
                reason: format!("must be 1-{MAX_CHANNEL_CAPACITY}"),
            });
        }

        if self.geo_enabled {
            if self.geo_api_key.is_empty() {
                return Err(PlayerPipelineError::Config {
                    field: "geo_api_key".to_owned(),
                    reason: "must not be empty when geo is enabled".to_owned(),
                });
            }
            if self.geo_cache_ttl_secs == 0 {
                return Err(PlayerPipelineError::Config {
                    field: "geo_cache_ttl_secs".to_owned(),
                    reason: "must be greater than 0".to_owned(),
                });
            }
        }

        for source in &self.sources {
            if source.name.is_empty() || source.path.is_empty() {
                return Err(PlayerPipelineError::Config {
                    field: "sources".to_owned(),
                    reason: "source name and path must not be empty".to_owned(),
                });
            }
        }

        Ok(())
    }
}

/// 파이프라인 설정 빌더
#[derive(Default)]
pub struct PipelineConfigBuilder {
    config: PipelineConfig,
}

impl PipelineConfigBuilder {
    /// 새 빌더를 생성합니다.
    pub fn new() -> Self {
        Self {
            config: PipelineConfig::default(),
        }
    }

    /// 데이터베이스 경로를 설정합니다.
    pub fn db_path(mut self, path: impl Into<String>) -> Self {
        self.config.db_path = path.into();
        self
    }

    /// 감시 대상 소스를 추가합니다.
    pub fn source(mut self, name: impl Into<String>, path: impl Into<String>) -> Self {
        self.config.sources.push(SourceConfig {
            name: name.into(),
            path: path.into(),
        });
        self
    }

    /// 폴링 주기(초)를 설정합니다.
    pub fn poll_interval_secs(mut self, secs: u64) -> Self {
        self.config.poll_interval_secs = secs;
        self
    }

    /// 보존 기간(일)을 설정합니다.
    pub fn retention_days(mut self, days: u32) -> Self {
        self.config.retention_days = days;
        self
    }

    /// 지오로케이션 보강을 설정합니다.
    pub fn geo(mut self, enabled: bool, api_key: impl Into<String>) -> Self {
        self.config.geo_enabled = enabled;
        self.config.geo_api_key = api_key.into();
        self
    }

    /// 알림 채널 용량을 설정합니다.
    pub fn alert_channel_capacity(mut self, capacity: usize) -> Self {
        self.config.alert_channel_capacity = capacity;
        self
    }

    /// 설정을 검증하고 `PipelineConfig`를 생성합니다.
    pub fn build(self) -> Result<PipelineConfig, PlayerPipelineError> {
        self.config.validate()?;
        Ok(self.config)
    }
}
