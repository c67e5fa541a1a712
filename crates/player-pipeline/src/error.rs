//! 플레이어 파이프라인 에러 타입
//!
//! [`PlayerPipelineError`]는 파이프라인 내부에서 발생하는 모든 에러를 표현합니다.
//! `From<PlayerPipelineError> for GatewatchError` 변환이 구현되어 있어
//! 상위 레이어에서 `?` 연산자로 자연스럽게 전파할 수 있습니다.

use gatewatch_core::error::{
    EnforceError, GatewatchError, GeoError, ParseError, PipelineError, StorageError,
};

/// 플레이어 파이프라인 도메인 에러
///
/// 다이얼렉트 컴파일, 저장소 접근, 지오로케이션 조회, 제재 집행,
/// 채널 통신 등 파이프라인 내부의 모든 에러 상황을 포괄합니다.
#[derive(Debug, thiserror::Error)]
pub enum PlayerPipelineError {
    /// 저장소 연결 실패
    #[error("store connection failed: {path}: {reason}")]
    StoreConnection {
        /// 데이터베이스 파일 경로
        path: String,
        /// 실패 사유
        reason: String,
    },

    /// 저장소 쿼리/트랜잭션 실패
    #[error("store error: {0}")]
    Store(String),

    /// 지오로케이션 조회 실패
    #[error("geo lookup failed for {address}: {reason}")]
    Geo {
        /// 조회 대상 주소
        address: String,
        /// 실패 사유
        reason: String,
    },

    /// 제재 집행 대상 신원에 프로토콜 제재 ID가 없음
    #[error("identity {identity_id} has no protocol ban id on file")]
    NoProtocolId {
        /// 대상 신원 ID
        identity_id: String,
    },

    /// 제재 집행 실패
    #[error("enforcement failed: {0}")]
    Enforce(String),

    /// 설정 에러
    #[error("config error: {field}: {reason}")]
    Config {
        /// 설정 필드명
        field: String,
        /// 에러 사유
        reason: String,
    },

    /// 채널 통신 에러
    #[error("channel error: {0}")]
    Channel(String),

    /// I/O 에러
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    /// 정규식 컴파일 에러
    #[error("regex error: {0}")]
    Regex(#[from] regex::Error),
}

impl From<rusqlite::Error> for PlayerPipelineError {
    fn from(err: rusqlite::Error) -> Self {
        PlayerPipelineError::Store(err.to_string())
    }
}

impl From<PlayerPipelineError> for GatewatchError {
    fn from(err: PlayerPipelineError) -> Self {
        match err {
            PlayerPipelineError::StoreConnection { path, reason } => {
                GatewatchError::Storage(StorageError::Connection(format!("{path}: {reason}")))
            }
            PlayerPipelineError::Store(reason) => {
                GatewatchError::Storage(StorageError::Query(reason))
            }
            PlayerPipelineError::Geo { address, reason } => {
                GatewatchError::Geo(GeoError::Lookup { address, reason })
            }
            PlayerPipelineError::NoProtocolId { identity_id } => {
                GatewatchError::Enforce(EnforceError::NoProtocolId { identity_id })
            }
            PlayerPipelineError::Enforce(reason) => {
                GatewatchError::Enforce(EnforceError::Failed { reason })
            }
            PlayerPipelineError::Regex(e) => GatewatchError::Parse(ParseError::Pattern {
                dialect: "unknown".to_owned(),
                reason: e.to_string(),
            }),
            PlayerPipelineError::Io(e) => GatewatchError::Io(e),
            other => GatewatchError::Pipeline(PipelineError::InitFailed(other.to_string())),
        }
    }
}
