//! 에러 타입 — 도메인별 에러 정의

/// Gatewatch 최상위 에러 타입
#[derive(Debug, thiserror::Error)]
pub enum GatewatchError {
    /// 설정 관련 에러
    #[error("config error: {0}")]
    Config(#[from] ConfigError),

    /// 파이프라인 처리 에러
    #[error("pipeline error: {0}")]
    Pipeline(#[from] PipelineError),

    /// 로그 라인 파싱 에러
    #[error("parse error: {0}")]
    Parse(#[from] ParseError),

    /// 스토리지 에러
    #[error("storage error: {0}")]
    Storage(#[from] StorageError),

    /// 지오로케이션 조회 에러
    #[error("geo error: {0}")]
    Geo(#[from] GeoError),

    /// 제재 집행 에러
    #[error("enforce error: {0}")]
    Enforce(#[from] EnforceError),

    /// I/O 에러
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

/// 설정 관련 에러
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// 설정 파일을 찾을 수 없음
    #[error("config file not found: {path}")]
    FileNotFound { path: String },

    /// 설정 파싱 실패
    #[error("failed to parse config: {reason}")]
    ParseFailed { reason: String },

    /// 유효하지 않은 설정 값
    #[error("invalid config value for '{field}': {reason}")]
    InvalidValue { field: String, reason: String },
}

/// 파이프라인 처리 에러
#[derive(Debug, thiserror::Error)]
pub enum PipelineError {
    /// 채널 전송 실패
    #[error("channel send failed: {0}")]
    ChannelSend(String),

    /// 파이프라인 초기화 실패
    #[error("pipeline init failed: {0}")]
    InitFailed(String),

    /// 이미 실행 중
    #[error("pipeline already running")]
    AlreadyRunning,

    /// 실행 중이 아님
    #[error("pipeline not running")]
    NotRunning,
}

/// 파싱 에러
///
/// 인식되지 않는 라인은 에러가 아니라 `None`으로 처리됩니다.
/// 이 타입은 파서 구성(정규식 컴파일) 단계의 실패만 표현합니다.
#[derive(Debug, thiserror::Error)]
pub enum ParseError {
    /// 다이얼렉트 패턴 컴파일 실패
    #[error("invalid dialect pattern '{dialect}': {reason}")]
    Pattern { dialect: String, reason: String },
}

/// 스토리지 에러
#[derive(Debug, thiserror::Error)]
pub enum StorageError {
    /// 연결 실패
    #[error("connection failed: {0}")]
    Connection(String),

    /// 쿼리 실패
    #[error("query failed: {0}")]
    Query(String),

    /// 스키마 초기화 실패
    #[error("schema init failed: {0}")]
    Schema(String),
}

/// 지오로케이션 조회 에러
#[derive(Debug, thiserror::Error)]
pub enum GeoError {
    /// 외부 조회 실패
    #[error("lookup failed for {address}: {reason}")]
    Lookup { address: String, reason: String },

    /// 응답 형식이 예상과 다름
    #[error("invalid lookup response: {reason}")]
    InvalidResponse { reason: String },
}

/// 제재 집행 에러
#[derive(Debug, thiserror::Error)]
pub enum EnforceError {
    /// 프로토콜 제재 ID가 없는 신원
    #[error("identity {identity_id} has no protocol ban id on file")]
    NoProtocolId { identity_id: String },

    /// 집행 기능이 실패를 보고함
    #[error("enforcement failed: {reason}")]
    Failed { reason: String },
}
