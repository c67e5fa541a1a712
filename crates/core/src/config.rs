//! 설정 관리 — gatewatch.toml 파싱 및 런타임 설정
//!
//! [`GatewatchConfig`]는 모든 모듈의 설정을 담는 최상위 구조체입니다.
//!
//! # 설정 로딩 우선순위
//! 1. CLI 인자 (최고 우선)
//! 2. 환경변수 (`GATEWATCH_STORE_DB_PATH=/srv/players.db` 형식)
//! 3. 설정 파일 (`gatewatch.toml`)
//! 4. 기본값 (`Default` 구현)
//!
//! # 사용 예시
//! ```no_run
//! # async fn example() -> Result<(), gatewatch_core::error::GatewatchError> {
//! use gatewatch_core::config::GatewatchConfig;
//!
//! // 파일에서 로드 + 환경변수 오버라이드
//! let config = GatewatchConfig::load("gatewatch.toml").await?;
//!
//! // TOML 문자열에서 직접 파싱
//! let config = GatewatchConfig::parse("[general]\nlog_level = \"debug\"")?;
//! # Ok(())
//! # }
//! ```

use std::path::Path;

use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::error::{ConfigError, GatewatchError};

/// Gatewatch 통합 설정
///
/// `gatewatch.toml` 파일의 최상위 구조를 나타냅니다.
/// 각 모듈은 자기 섹션만 읽어 사용합니다.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct GatewatchConfig {
    /// 일반 설정
    #[serde(default)]
    pub general: GeneralConfig,
    /// 신원 저장소 설정
    #[serde(default)]
    pub store: StoreConfig,
    /// 로그 모니터 설정
    #[serde(default)]
    pub monitor: MonitorConfig,
    /// 지오로케이션 조회 설정
    #[serde(default)]
    pub geo: GeoConfig,
    /// 알림 전달 설정
    #[serde(default)]
    pub notify: NotifyConfig,
}

impl GatewatchConfig {
    /// TOML 파일에서 설정을 로드하고 환경변수 오버라이드를 적용합니다.
    pub async fn load(path: impl AsRef<Path>) -> Result<Self, GatewatchError> {
        let mut config = Self::from_file(path).await?;
        config.apply_env_overrides();
        config.validate()?;
        Ok(config)
    }

    /// TOML 파일에서 설정을 로드합니다 (환경변수 오버라이드 없음).
    pub async fn from_file(path: impl AsRef<Path>) -> Result<Self, GatewatchError> {
        let path = path.as_ref();
        let content = tokio::fs::read_to_string(path).await.map_err(|e| {
            if e.kind() == std::io::ErrorKind::NotFound {
                GatewatchError::Config(ConfigError::FileNotFound {
                    path: path.display().to_string(),
                })
            } else {
                GatewatchError::Io(e)
            }
        })?;
        let config = Self::parse(&content)?;
        config.validate()?;
        Ok(config)
    }

    /// TOML 문자열에서 설정을 파싱합니다.
    pub fn parse(toml_str: &str) -> Result<Self, GatewatchError> {
        toml::from_str(toml_str).map_err(|e| {
            GatewatchError::Config(ConfigError::ParseFailed {
                reason: e.to_string(),
            })
        })
    }

    /// 환경변수로 설정값을 오버라이드합니다.
    ///
    /// 환경변수 네이밍 규칙: `GATEWATCH_{SECTION}_{FIELD}`
    /// 예: `GATEWATCH_GEO_API_KEY=abc123`
    ///
    /// 모니터 소스 목록은 구조가 복잡하므로 설정 파일로만 지정합니다.
    pub fn apply_env_overrides(&mut self) {
        // General
        override_string(&mut self.general.log_level, "GATEWATCH_GENERAL_LOG_LEVEL");
        override_string(&mut self.general.log_format, "GATEWATCH_GENERAL_LOG_FORMAT");
        override_string(&mut self.general.data_dir, "GATEWATCH_GENERAL_DATA_DIR");

        // Store
        override_string(&mut self.store.db_path, "GATEWATCH_STORE_DB_PATH");
        override_u32(
            &mut self.store.retention_days,
            "GATEWATCH_STORE_RETENTION_DAYS",
        );

        // Monitor
        override_bool(&mut self.monitor.enabled, "GATEWATCH_MONITOR_ENABLED");
        override_u64(
            &mut self.monitor.poll_interval_secs,
            "GATEWATCH_MONITOR_POLL_INTERVAL_SECS",
        );

        // Geo
        override_bool(&mut self.geo.enabled, "GATEWATCH_GEO_ENABLED");
        override_string(&mut self.geo.api_url, "GATEWATCH_GEO_API_URL");
        override_string(&mut self.geo.api_key, "GATEWATCH_GEO_API_KEY");
        override_u64(&mut self.geo.cache_ttl_secs, "GATEWATCH_GEO_CACHE_TTL_SECS");

        // Notify
        override_usize(
            &mut self.notify.channel_capacity,
            "GATEWATCH_NOTIFY_CHANNEL_CAPACITY",
        );
    }

    /// 설정값의 유효성을 검증합니다.
    pub fn validate(&self) -> Result<(), GatewatchError> {
        // log_level 검증
        let valid_levels = ["trace", "debug", "info", "warn", "error"];
        if !valid_levels.contains(&self.general.log_level.as_str()) {
            return Err(ConfigError::InvalidValue {
                field: "general.log_level".to_owned(),
                reason: format!("must be one of: {}", valid_levels.join(", ")),
            }
            .into());
        }

        // log_format 검증
        let valid_formats = ["json", "pretty"];
        if !valid_formats.contains(&self.general.log_format.as_str()) {
            return Err(ConfigError::InvalidValue {
                field: "general.log_format".to_owned(),
                reason: format!("must be one of: {}", valid_formats.join(", ")),
            }
            .into());
        }

        if self.store.db_path.is_empty() {
            return Err(ConfigError::InvalidValue {
                field: "store.db_path".to_owned(),
                reason: "must not be empty".to_owned(),
            }
            .into());
        }

        if self.store.retention_days == 0 {
            return Err(ConfigError::InvalidValue {
                field: "store.retention_days".to_owned(),
                reason: "must be greater than 0".to_owned(),
            }
            .into());
        }

        if self.monitor.poll_interval_secs == 0 {
            return Err(ConfigError::InvalidValue {
                field: "monitor.poll_interval_secs".to_owned(),
                reason: "must be greater than 0".to_owned(),
            }
            .into());
        }

        // 소스 검증: 이름/경로 비어있지 않고 이름 중복 없음
        let mut seen = std::collections::HashSet::new();
        for source in &self.monitor.sources {
            if source.name.is_empty() {
                return Err(ConfigError::InvalidValue {
                    field: "monitor.sources.name".to_owned(),
                    reason: "source name must not be empty".to_owned(),
                }
                .into());
            }
            if source.path.is_empty() {
                return Err(ConfigError::InvalidValue {
                    field: "monitor.sources.path".to_owned(),
                    reason: format!("source '{}' has an empty path", source.name),
                }
                .into());
            }
            if !seen.insert(source.name.as_str()) {
                return Err(ConfigError::InvalidValue {
                    field: "monitor.sources".to_owned(),
                    reason: format!("duplicate source name '{}'", source.name),
                }
                .into());
            }
        }

        if self.geo.enabled {
            if self.geo.api_key.is_empty() {
                return Err(ConfigError::InvalidValue {
                    field: "geo.api_key".to_owned(),
                    reason: "api_key must not be empty when geo is enabled".to_owned(),
                }
                .into());
            }
            if self.geo.cache_ttl_secs == 0 {
                return Err(ConfigError::InvalidValue {
                    field: "geo.cache_ttl_secs".to_owned(),
                    reason: "must be greater than 0".to_owned(),
                }
                .into());
            }
        }

        if self.notify.channel_capacity == 0 {
            return Err(ConfigError::InvalidValue {
                field: "notify.channel_capacity".to_owned(),
                reason: "must be greater than 0".to_owned(),
            }
            .into());
        }

        Ok(())
    }
}

/// 일반 설정
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct GeneralConfig {
    /// 로그 레벨 (trace, debug, info, warn, error)
    pub log_level: String,
    /// 로그 형식 (json, pretty)
    pub log_format: String,
    /// 데이터 디렉토리
    pub data_dir: String,
}

impl Default for GeneralConfig {
    fn default() -> Self {
        Self {
            log_level: "info".to_owned(),
            log_format: "json".to_owned(),
            data_dir: "/var/lib/gatewatch".to_owned(),
        }
    }
}

/// 신원 저장소 설정
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct StoreConfig {
    /// SQLite 데이터베이스 파일 경로
    pub db_path: String,
    /// 접속 이벤트 보존 기간 (일)
    pub retention_days: u32,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            db_path: "/var/lib/gatewatch/players.db".to_owned(),
            retention_days: 30,
        }
    }
}

/// 감시 대상 로그 소스
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SourceConfig {
    /// 소스(게임 서버) 이름 — 접속 이벤트에 기록됨
    pub name: String,
    /// 감시할 로그 파일 경로
    pub path: String,
}

/// 로그 모니터 설정
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct MonitorConfig {
    /// 활성화 여부
    pub enabled: bool,
    /// 폴링 주기 (초)
    pub poll_interval_secs: u64,
    /// 감시 대상 소스 목록
    pub sources: Vec<SourceConfig>,
}

impl Default for MonitorConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            poll_interval_secs: 1,
            sources: Vec::new(),
        }
    }
}

/// 지오로케이션 조회 설정
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct GeoConfig {
    /// 활성화 여부 — 비활성 시 지오 정보 없이 관측을 기록합니다
    pub enabled: bool,
    /// 조회 API 엔드포인트
    pub api_url: String,
    /// API 키
    pub api_key: String,
    /// 조회 결과 캐시 TTL (초)
    pub cache_ttl_secs: u64,
}

impl Default for GeoConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            api_url: "https://api.ipgeolocation.io/ipgeo".to_owned(),
            api_key: String::new(),
            cache_ttl_secs: 3600,
        }
    }
}

/// 알림 전달 설정
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct NotifyConfig {
    /// 알림 채널 용량
    pub channel_capacity: usize,
}

impl Default for NotifyConfig {
    fn default() -> Self {
        Self {
            channel_capacity: 256,
        }
    }
}

// --- 환경변수 오버라이드 헬퍼 ---

fn override_string(target: &mut String, key: &str) {
    if let Ok(value) = std::env::var(key) {
        *target = value;
    }
}

fn override_bool(target: &mut bool, key: &str) {
    if let Ok(value) = std::env::var(key) {
        match value.parse() {
            Ok(parsed) => *target = parsed,
            Err(_) => warn!(key, value, "ignoring invalid bool env override"),
        }
    }
}

fn override_u32(target: &mut u32, key: &str) {
    if let Ok(value) = std::env::var(key) {
        match value.parse() {
            Ok(parsed) => *target = parsed,
            Err(_) => warn!(key, value, "ignoring invalid u32 env override"),
        }
    }
}

fn override_u64(target: &mut u64, key: &str) {
    if let Ok(value) = std::env::var(key) {
        match value.parse() {
            Ok(parsed) => *target = parsed,
            Err(_) => warn!(key, value, "ignoring invalid u64 env override"),
        }
    }
}

fn override_usize(target: &mut usize, key: &str) {
    if let Ok(value) = std::env::var(key) {
        match value.parse() {
            Ok(parsed) => *target = parsed,
            Err(_) => warn!(key, value, "ignoring invalid usize env override"),
        }
    }
}
