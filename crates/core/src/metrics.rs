//! 메트릭 상수 및 설명 등록
//!
//! 모든 Prometheus 메트릭의 이름을 중앙에서 정의합니다.
//! 각 모듈은 이 상수를 사용하여 `metrics::counter!()`, `metrics::gauge!()`
//! 매크로를 호출합니다.
//!
//! # 네이밍 컨벤션
//!
//! - 접두어: `gatewatch_`
//! - 모듈명: `pipeline_`, `store_`, `geo_`
//! - 접미어: `_total` (counter), 없음 (gauge)
//!
//! # 사용 예시
//!
//! ```ignore
//! use metrics::counter;
//!
//! counter!(gatewatch_core::metrics::PIPELINE_LINES_TOTAL).increment(1);
//! ```

// ─── 레이블 키 상수 ────────────────────────────────────────────────

/// 소스 서버 레이블 키
pub const LABEL_SOURCE: &str = "source";

/// 알림 종류 레이블 키 (new_identity, name_change 등)
pub const LABEL_ALERT_KIND: &str = "kind";

// ─── Pipeline 메트릭 ───────────────────────────────────────────────

/// Pipeline: 읽은 전체 로그 라인 수 (counter)
pub const PIPELINE_LINES_TOTAL: &str = "gatewatch_pipeline_lines_total";

/// Pipeline: 신원 관측으로 변환된 라인 수 (counter)
pub const PIPELINE_OBSERVATIONS_TOTAL: &str = "gatewatch_pipeline_observations_total";

/// Pipeline: 생성된 알림 수 (counter)
pub const PIPELINE_ALERTS_TOTAL: &str = "gatewatch_pipeline_alerts_total";

/// Pipeline: 알림 채널 전달 실패 수 (counter)
pub const PIPELINE_NOTIFY_DROPPED_TOTAL: &str = "gatewatch_pipeline_notify_dropped_total";

// ─── Store 메트릭 ──────────────────────────────────────────────────

/// Store: 성공한 update 호출 수 (counter)
pub const STORE_UPDATES_TOTAL: &str = "gatewatch_store_updates_total";

/// Store: 실패한 update 호출 수 (counter)
pub const STORE_ERRORS_TOTAL: &str = "gatewatch_store_errors_total";

// ─── Geo 메트릭 ────────────────────────────────────────────────────

/// Geo: 캐시 히트 수 (counter)
pub const GEO_CACHE_HITS_TOTAL: &str = "gatewatch_geo_cache_hits_total";

/// Geo: 캐시 미스 수 (counter)
pub const GEO_CACHE_MISSES_TOTAL: &str = "gatewatch_geo_cache_misses_total";

/// Geo: 외부 조회 실패 수 (counter)
pub const GEO_LOOKUP_FAILURES_TOTAL: &str = "gatewatch_geo_lookup_failures_total";
