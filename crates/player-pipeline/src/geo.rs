//! 지오로케이션 조회 — TTL 캐시와 HTTP 제공자
//!
//! [`GeoCache`]는 외부 조회 기능([`GeoLookup`]) 앞의 시간 만료 캐시입니다.
//! 같은 주소에 대한 중복 외부 호출을 TTL 윈도우 안에서 제거합니다.
//!
//! # 캐시 정책
//! - TTL 안의 히트는 외부 호출 없이 캐시 값을 반환
//! - 미스/만료는 외부 호출 한 번 후 현재 시각과 함께 저장
//! - 조회 실패는 캐시되지 않음 — 다음 관측이 재시도하므로 일시 장애가
//!   특정 주소의 보강을 영구히 막지 않음
//! - 크기 기반 축출 없음: 주소 수는 실제 플레이어 수로 유계이므로
//!   TTL 만료가 유일한 무효화 정책 (만료 엔트리는 `purge_expired`로 정리)
//!
//! 같은 주소에 대한 동시 미스는 외부 호출을 두 번 할 수 있습니다 —
//! 외부 비용이 저렴한 단일 요청이므로 병합하지 않습니다.

use std::collections::HashMap;
use std::sync::Mutex;
use std::time::{Duration, Instant};

use metrics::counter;

use gatewatch_core::error::{GatewatchError, GeoError};
use gatewatch_core::metrics::{
    GEO_CACHE_HITS_TOTAL, GEO_CACHE_MISSES_TOTAL, GEO_LOOKUP_FAILURES_TOTAL,
};
use gatewatch_core::pipeline::GeoLookup;
use gatewatch_core::types::GeoInfo;

use crate::error::PlayerPipelineError;

/// 지오로케이션 TTL 캐시
///
/// 여러 소스 태스크가 `Arc<GeoCache<_>>`를 공유하며 동시에 접근합니다.
pub struct GeoCache<P: GeoLookup> {
    /// 외부 조회 제공자
    provider: P,
    /// 캐시 유효 기간
    ttl: Duration,
    /// 주소별 캐시: address -> (결과, 저장 시각)
    entries: Mutex<HashMap<String, (GeoInfo, Instant)>>,
}

impl<P: GeoLookup> GeoCache<P> {
    /// 새 캐시를 생성합니다.
    pub fn new(provider: P, ttl: Duration) -> Self {
        Self {
            provider,
            ttl,
            entries: Mutex::new(HashMap::new()),
        }
    }

    /// 주소의 지오로케이션 정보를 조회합니다.
    ///
    /// TTL 안의 캐시 히트는 외부 호출 없이 반환합니다.
    /// 미스/만료는 외부 호출 후 결과를 캐시합니다. 실패는 캐시하지 않습니다.
    pub async fn resolve(&self, address: &str) -> Result<GeoInfo, PlayerPipelineError> {
        // 캐시 확인 — await 전에 락을 해제해야 하므로 블록으로 한정
        {
            let entries = self
                .entries
                .lock()
                .map_err(|_| PlayerPipelineError::Geo {
                    address: address.to_owned(),
                    reason: "cache mutex poisoned".to_owned(),
                })?;
            if let Some((cached, stored_at)) = entries.get(address)
                && stored_at.elapsed() < self.ttl
            {
                counter!(GEO_CACHE_HITS_TOTAL).increment(1);
                return Ok(cached.clone());
            }
        }

        counter!(GEO_CACHE_MISSES_TOTAL).increment(1);
        let info = self.provider.lookup(address).await.map_err(|e| {
            counter!(GEO_LOOKUP_FAILURES_TOTAL).increment(1);
            PlayerPipelineError::Geo {
                address: address.to_owned(),
                reason: e.to_string(),
            }
        })?;

        let mut entries = self.entries.lock().map_err(|_| PlayerPipelineError::Geo {
            address: address.to_owned(),
            reason: "cache mutex poisoned".to_owned(),
        })?;
        entries.insert(address.to_owned(), (info.clone(), Instant::now()));
        Ok(info)
    }

    /// 만료된 캐시 엔트리를 정리합니다.
    ///
    /// 주기적으로 호출하여 죽은 엔트리의 누적을 방지합니다.
    pub fn purge_expired(&self) {
        if let Ok(mut entries) = self.entries.lock() {
            entries.retain(|_, (_, stored_at)| stored_at.elapsed() < self.ttl);
        }
    }

    /// 현재 캐시된 주소 수를 반환합니다.
    pub fn len(&self) -> usize {
        self.entries.lock().map(|e| e.len()).unwrap_or(0)
    }

    /// 캐시가 비어 있는지 확인합니다.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// HTTP 지오로케이션 제공자
///
/// ipgeolocation 스타일 API를 호출합니다:
/// `GET {api_url}?apiKey=...&ip=...&fields=country_name,isp,organization&include=security`
///
/// 응답에서 `country_name`, `isp`, `security.is_vpn`, `security.is_proxy`를
/// 추출하고 원시 페이로드를 보존합니다.
pub struct HttpGeoProvider {
    /// HTTP 클라이언트 (타임아웃 포함)
    client: reqwest::Client,
    /// API 엔드포인트
    api_url: String,
    /// API 키
    api_key: String,
}

/// 외부 조회 요청 타임아웃
const LOOKUP_TIMEOUT: Duration = Duration::from_secs(5);

impl HttpGeoProvider {
    /// 새 제공자를 생성합니다.
    pub fn new(
        api_url: impl Into<String>,
        api_key: impl Into<String>,
    ) -> Result<Self, PlayerPipelineError> {
        let client = reqwest::Client::builder()
            .timeout(LOOKUP_TIMEOUT)
            .build()
            .map_err(|e| PlayerPipelineError::Geo {
                address: String::new(),
                reason: format!("failed to build http client: {e}"),
            })?;
        Ok(Self {
            client,
            api_url: api_url.into(),
            api_key: api_key.into(),
        })
    }
}

impl GeoLookup for HttpGeoProvider {
    async fn lookup(&self, address: &str) -> Result<GeoInfo, GatewatchError> {
        let response = self
            .client
            .get(&self.api_url)
            .query(&[
                ("apiKey", self.api_key.as_str()),
                ("ip", address),
                ("fields", "country_name,isp,organization"),
                ("include", "security"),
            ])
            .send()
            .await
            .map_err(|e| {
                GatewatchError::Geo(GeoError::Lookup {
                    address: address.to_owned(),
                    reason: e.to_string(),
                })
            })?;

        let status = response.status();
        if !status.is_success() {
            return Err(GatewatchError::Geo(GeoError::Lookup {
                address: address.to_owned(),
                reason: format!("api returned status {status}"),
            }));
        }

        let payload: serde_json::Value = response.json().await.map_err(|e| {
            GatewatchError::Geo(GeoError::InvalidResponse {
                reason: e.to_string(),
            })
        })?;

        let country = payload
            .get("country_name")
            .and_then(|v| v.as_str())
            .map(str::to_owned);
        let isp = payload.get("isp").and_then(|v| v.as_str()).map(str::to_owned);
        let security = payload.get("security");
        let is_vpn = security
            .and_then(|s| s.get("is_vpn"))
            .and_then(|v| v.as_bool())
            .unwrap_or(false);
        let is_proxy = security
            .and_then(|s| s.get("is_proxy"))
            .and_then(|v| v.as_bool())
            .unwrap_or(false);

        Ok(GeoInfo {
            country,
            isp,
            is_vpn,
            is_proxy,
            payload: Some(payload),
        })
    }
}
