//! 이벤트 시스템 — 알림 전달의 기본 단위
//!
//! 저장소가 생성한 알림은 [`AlertEvent`]로 포장되어 mpsc 채널을 통해
//! 외부 전달 협력자(채팅 봇 등)에게 전달됩니다.
//! [`EventMetadata`]는 모든 이벤트에 공통으로 포함되는 추적 정보입니다.

use std::fmt;
use std::time::SystemTime;

use serde::{Deserialize, Serialize};

use crate::types::{Alert, Severity};

// --- 모듈명 상수 ---

/// 플레이어 파이프라인 모듈명
pub const MODULE_PLAYER_PIPELINE: &str = "player-pipeline";

// --- 이벤트 타입 상수 ---

/// 알림 이벤트 타입
pub const EVENT_TYPE_ALERT: &str = "alert";

/// 이벤트 메타데이터 — 모든 이벤트에 공통으로 포함되는 추적 정보
///
/// 각 이벤트의 발생 시각, 생성 모듈, 분산 추적 ID를 담고 있어
/// 이벤트 흐름을 추적하고 디버깅할 수 있습니다.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EventMetadata {
    /// 이벤트 발생 시각
    pub timestamp: SystemTime,
    /// 이벤트를 생성한 모듈명
    pub source_module: String,
    /// 분산 추적 ID — 같은 흐름의 이벤트를 연결합니다
    pub trace_id: String,
}

impl EventMetadata {
    /// 기존 trace_id를 사용하여 새 메타데이터를 생성합니다.
    pub fn new(source_module: impl Into<String>, trace_id: impl Into<String>) -> Self {
        Self {
            timestamp: SystemTime::now(),
            source_module: source_module.into(),
            trace_id: trace_id.into(),
        }
    }

    /// 새로운 UUID v4 trace_id를 생성하여 메타데이터를 만듭니다.
    ///
    /// 새로운 이벤트 체인의 시작점에서 사용합니다.
    pub fn with_new_trace(source_module: impl Into<String>) -> Self {
        Self {
            timestamp: SystemTime::now(),
            source_module: source_module.into(),
            trace_id: uuid::Uuid::new_v4().to_string(),
        }
    }
}

/// 모든 이벤트가 구현해야 하는 기본 trait
///
/// `Send + Sync + 'static` 바운드로 `tokio::mpsc` 채널을 통한
/// 안전한 전송을 보장합니다.
pub trait Event: Send + Sync + 'static {
    /// 이벤트 고유 ID (UUID v4)
    fn event_id(&self) -> &str;

    /// 이벤트 메타데이터 (timestamp, source_module, trace_id)
    fn metadata(&self) -> &EventMetadata;

    /// 이벤트 타입명 (로깅 및 라우팅에 사용)
    fn event_type(&self) -> &str;
}

/// 알림 이벤트
///
/// 저장소의 `update` 트랜잭션이 생성한 [`Alert`]를 전달 채널에 싣기 위한
/// 래퍼입니다. 전달은 best-effort이며, 전달 실패가 저장소 기록을
/// 되돌리지 않습니다.
#[derive(Debug, Clone)]
pub struct AlertEvent {
    /// 이벤트 고유 ID
    pub id: String,
    /// 이벤트 메타데이터
    pub metadata: EventMetadata,
    /// 알림 본문
    pub alert: Alert,
    /// 알림 심각도
    pub severity: Severity,
}

impl AlertEvent {
    /// 새로운 trace를 시작하는 알림 이벤트를 생성합니다.
    pub fn new(alert: Alert) -> Self {
        let severity = alert.kind.severity();
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            metadata: EventMetadata::with_new_trace(MODULE_PLAYER_PIPELINE),
            alert,
            severity,
        }
    }

    /// 기존 trace에 연결된 알림 이벤트를 생성합니다.
    pub fn with_trace(alert: Alert, trace_id: impl Into<String>) -> Self {
        let severity = alert.kind.severity();
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            metadata: EventMetadata::new(MODULE_PLAYER_PIPELINE, trace_id),
            alert,
            severity,
        }
    }
}

impl Event for AlertEvent {
    fn event_id(&self) -> &str {
        &self.id
    }

    fn metadata(&self) -> &EventMetadata {
        &self.metadata
    }

    fn event_type(&self) -> &str {
        EVENT_TYPE_ALERT
    }
}

impl fmt::Display for AlertEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "AlertEvent[{}] [{}] {}",
            &self.id[..8.min(self.id.len())],
            self.severity,
            self.alert,
        )
    }
}
