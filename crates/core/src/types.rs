//! 도메인 타입 — 시스템 전역에서 사용되는 공통 타입
//!
//! 플레이어 신원 추적의 모든 모듈이 공유하는 데이터 구조를 정의합니다.
//! 저장소의 6개 릴레이션(Identity, NameUse, AddressUse, ProtocolIdChange,
//! ConnectionEvent, Alert)과 파서 출력(Observation)이 여기에 있습니다.

use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// 플레이어 신원 — 저장소의 기본 레코드
///
/// `identity_id`는 게임 플랫폼이 발급한 불변 키이며 로컬에서 생성하지 않습니다.
/// 동일 `identity_id`의 레코드는 정확히 하나만 존재합니다.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Identity {
    /// 플랫폼 발급 고유 ID (불변)
    pub identity_id: String,
    /// 제재 집행용 보조 식별자 — 수명 중 재발급될 수 있음
    pub protocol_ban_id: Option<String>,
    /// 마지막으로 관측된 표시 이름
    pub current_name: String,
    /// 마지막으로 관측된 네트워크 주소 (포트 제외)
    pub current_address: Option<String>,
    /// 최초 관측 시각
    pub first_seen: DateTime<Utc>,
    /// 마지막 관측 시각
    pub last_seen: DateTime<Utc>,
    /// 누적 접속 수 (단조 증가)
    pub connection_count: u64,
    /// 제재 여부
    pub banned: bool,
    /// 제재 사유
    pub ban_reason: Option<String>,
    /// 운영자 메모
    pub notes: Option<String>,
}

impl fmt::Display for Identity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} ({}) connections={} banned={}",
            self.current_name,
            &self.identity_id[..8.min(self.identity_id.len())],
            self.connection_count,
            self.banned,
        )
    }
}

/// 이름 사용 이력 — (identity_id, name) 쌍당 하나
///
/// 같은 쌍이 다시 관측되면 `use_count`와 `last_used`만 갱신됩니다.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NameUse {
    /// 신원 ID
    pub identity_id: String,
    /// 사용된 표시 이름
    pub name: String,
    /// 최초 사용 시각
    pub first_used: DateTime<Utc>,
    /// 마지막 사용 시각
    pub last_used: DateTime<Utc>,
    /// 사용 횟수
    pub use_count: u64,
}

/// 주소 사용 이력 — (identity_id, address) 쌍당 하나
///
/// 지오로케이션 스냅샷은 관측할 때마다 최신 값으로 덮어씁니다 (버전 관리 없음).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AddressUse {
    /// 신원 ID
    pub identity_id: String,
    /// 네트워크 주소 (포트 제외)
    pub address: String,
    /// 국가명
    pub country: Option<String>,
    /// ISP명
    pub isp: Option<String>,
    /// VPN 주소 여부
    pub is_vpn: bool,
    /// 프록시/호스팅 주소 여부
    pub is_proxy: bool,
    /// 원시 지오로케이션 응답 (JSON)
    pub geo_payload: Option<String>,
    /// 최초 사용 시각
    pub first_used: DateTime<Utc>,
    /// 마지막 사용 시각
    pub last_used: DateTime<Utc>,
    /// 사용 횟수
    pub use_count: u64,
}

/// 프로토콜 제재 ID 변경 기록 (append-only)
///
/// 기존 ID가 있는 신원에서 다른 ID가 관측될 때만 기록됩니다.
/// 최초 할당은 변경이 아니므로 기록하지 않습니다.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProtocolIdChange {
    /// 신원 ID
    pub identity_id: String,
    /// 교체 전 ID
    pub old_id: String,
    /// 교체 후 ID
    pub new_id: String,
    /// 변경 시각
    pub changed_at: DateTime<Utc>,
}

/// 접속 이벤트 종류
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EventKind {
    /// 서버 접속
    Connect,
    /// 서버 이탈
    Disconnect,
    /// 프로토콜 계층 인증 완료
    Auth,
}

impl EventKind {
    /// 저장소에 기록되는 문자열 표현을 반환합니다.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Connect => "connect",
            Self::Disconnect => "disconnect",
            Self::Auth => "authenticated",
        }
    }

    /// 저장소 문자열 표현에서 이벤트 종류를 파싱합니다.
    pub fn from_str_loose(s: &str) -> Option<Self> {
        match s {
            "connect" => Some(Self::Connect),
            "disconnect" => Some(Self::Disconnect),
            "authenticated" | "auth" => Some(Self::Auth),
            _ => None,
        }
    }
}

impl fmt::Display for EventKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// 접속 이벤트 감사 로그 (append-only)
///
/// 모든 관측을 있는 그대로 기록합니다. 갱신/중복 제거 대상이 아니며,
/// 이력 재구성과 보존 기간 정리의 근거 데이터입니다.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConnectionEvent {
    /// 신원 ID
    pub identity_id: String,
    /// 이벤트 종류
    pub event_type: EventKind,
    /// 관측된 소스 서버 이름
    pub source_server: String,
    /// 관측 시각
    pub timestamp: DateTime<Utc>,
    /// 당시 사용된 이름
    pub name_used: String,
    /// 당시 사용된 주소
    pub address_used: Option<String>,
}

/// 알림 종류
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AlertKind {
    /// 최초 관측된 신원
    NewIdentity,
    /// 표시 이름 변경
    NameChange,
    /// 네트워크 주소 변경
    AddressChange,
    /// 프로토콜 제재 ID 교체
    ProtocolIdChange,
    /// VPN/프록시 주소 관측
    AnonymizerDetected,
}

impl AlertKind {
    /// 저장소에 기록되는 문자열 표현을 반환합니다.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::NewIdentity => "new_identity",
            Self::NameChange => "name_change",
            Self::AddressChange => "address_change",
            Self::ProtocolIdChange => "protocol_id_change",
            Self::AnonymizerDetected => "anonymizer_detected",
        }
    }

    /// 저장소 문자열 표현에서 알림 종류를 파싱합니다.
    pub fn from_str_loose(s: &str) -> Option<Self> {
        match s {
            "new_identity" => Some(Self::NewIdentity),
            "name_change" => Some(Self::NameChange),
            "address_change" => Some(Self::AddressChange),
            "protocol_id_change" => Some(Self::ProtocolIdChange),
            "anonymizer_detected" => Some(Self::AnonymizerDetected),
            _ => None,
        }
    }

    /// 알림 종류별 기본 심각도를 반환합니다.
    pub fn severity(&self) -> Severity {
        match self {
            Self::NewIdentity => Severity::Info,
            Self::NameChange | Self::AddressChange => Severity::Medium,
            Self::ProtocolIdChange | Self::AnonymizerDetected => Severity::High,
        }
    }
}

impl fmt::Display for AlertKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// 보안 알림
///
/// 저장소의 `update` 트랜잭션 안에서 변화 감지 결과로 생성되며,
/// 감지된 전환당 정확히 하나씩 기록됩니다. 재시도/중복 제거 없음.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Alert {
    /// 알림 ID (저장소 발급)
    pub id: i64,
    /// 대상 신원 ID
    pub identity_id: String,
    /// 알림 종류
    pub kind: AlertKind,
    /// 사람이 읽는 메시지
    pub message: String,
    /// 변경 전 값 (해당되는 경우)
    pub old_value: Option<String>,
    /// 변경 후 값 (해당되는 경우)
    pub new_value: Option<String>,
    /// 생성 시각
    pub created_at: DateTime<Utc>,
    /// 운영자 확인 여부
    pub acknowledged: bool,
}

impl fmt::Display for Alert {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}] {}", self.kind, self.message)
    }
}

/// 관측 — 로그 한 줄을 파싱한 구조화 결과
///
/// 특정 시점의 이름/주소/식별자 부분 스냅샷입니다.
/// 안정 식별자(`identity_id`)가 추출된 경우에만 생성됩니다.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Observation {
    /// 플랫폼 발급 신원 ID
    pub identity_id: String,
    /// 표시 이름
    pub name: String,
    /// 네트워크 주소 (포트 제거됨)
    pub address: Option<String>,
    /// 프로토콜 제재 ID
    pub protocol_ban_id: Option<String>,
    /// 이벤트 종류
    pub kind: EventKind,
    /// 관측된 소스 서버 이름
    pub source: String,
}

impl fmt::Display for Observation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} {} ({})",
            self.kind,
            self.name,
            &self.identity_id[..8.min(self.identity_id.len())],
        )?;
        if let Some(addr) = &self.address {
            write!(f, " from {addr}")?;
        }
        Ok(())
    }
}

/// 지오로케이션 조회 결과
///
/// 외부 조회 기능이 반환한 주소 평가 스냅샷입니다.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct GeoInfo {
    /// 국가명
    pub country: Option<String>,
    /// ISP명
    pub isp: Option<String>,
    /// VPN 주소 여부
    pub is_vpn: bool,
    /// 프록시/호스팅 주소 여부
    pub is_proxy: bool,
    /// 원시 응답 페이로드 (JSON)
    pub payload: Option<serde_json::Value>,
}

impl GeoInfo {
    /// 익명화 네트워크(VPN 또는 프록시) 주소인지 확인합니다.
    pub fn is_anonymizer(&self) -> bool {
        self.is_vpn || self.is_proxy
    }
}

/// 알트 상관 질의 결과 — 신원 요약
///
/// `find_by_address` / `find_by_name`이 반환하며,
/// `last_used` 내림차순(최근 사용 우선)으로 정렬됩니다.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IdentitySummary {
    /// 신원 ID
    pub identity_id: String,
    /// 현재 표시 이름
    pub current_name: String,
    /// 현재 주소
    pub current_address: Option<String>,
    /// 해당 주소/이름의 최초 사용 시각
    pub first_used: DateTime<Utc>,
    /// 해당 주소/이름의 마지막 사용 시각
    pub last_used: DateTime<Utc>,
}

/// 신원 전체 이력
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IdentityHistory {
    /// 사용한 모든 이름 (최근 사용 우선)
    pub names: Vec<NameUse>,
    /// 사용한 모든 주소 (최근 사용 우선)
    pub addresses: Vec<AddressUse>,
    /// 프로토콜 제재 ID 변경 기록
    pub protocol_id_changes: Vec<ProtocolIdChange>,
    /// 최근 알림
    pub alerts: Vec<Alert>,
    /// 최근 접속 이벤트
    pub connections: Vec<ConnectionEvent>,
}

/// 저장소 통계
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct StoreStats {
    /// 전체 신원 수
    pub total_identities: u64,
    /// 제재된 신원 수
    pub banned_identities: u64,
    /// 미확인 알림 수
    pub unacknowledged_alerts: u64,
    /// VPN으로 표시된 고유 주소 수
    pub anonymizer_addresses: u64,
}

/// 심각도 레벨
///
/// 알림의 심각도를 나타냅니다.
/// `Ord` 구현으로 심각도 비교가 가능합니다 (`Info < Low < Medium < High < Critical`).
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
pub enum Severity {
    /// 정보성 이벤트
    #[default]
    Info,
    /// 낮은 심각도
    Low,
    /// 중간 심각도
    Medium,
    /// 높은 심각도
    High,
    /// 치명적 — 즉시 대응 필요
    Critical,
}

impl Severity {
    /// 문자열에서 심각도를 파싱합니다.
    ///
    /// 대소문자를 구분하지 않습니다.
    pub fn from_str_loose(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "info" | "informational" => Some(Self::Info),
            "low" => Some(Self::Low),
            "medium" | "med" => Some(Self::Medium),
            "high" => Some(Self::High),
            "critical" | "crit" => Some(Self::Critical),
            _ => None,
        }
    }
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Info => write!(f, "Info"),
            Self::Low => write!(f, "Low"),
            Self::Medium => write!(f, "Medium"),
            Self::High => write!(f, "High"),
            Self::Critical => write!(f, "Critical"),
        }
    }
}
