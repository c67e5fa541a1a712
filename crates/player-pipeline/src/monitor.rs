//! 로그 모니터 — 배치 임포트와 연속 감시
//!
//! 파이프라인의 구동부입니다. 소스별 로그 파일에서 새 라인을 읽어
//! 파서 → 지오 캐시 → 저장소 순으로 흘려보내고, 생성된 알림을
//! 알림 채널로 전달합니다.
//!
//! # 동작 모드
//! - **배치**: 과거 로그 파일을 처음부터 끝까지 읽어 집계 카운터를 반환
//! - **연속**: 소스별 바이트 오프셋을 추적하며 폴링 주기마다 추가된
//!   라인만 처리 (`tail -f` 방식). 처음 만난 파일은 끝에서 시작하며
//!   과거 내용을 재처리하지 않습니다 — 과거 백필은 배치 모드의 몫입니다.
//!
//! 한 라인의 실패(파싱 불가, 지오 실패, 저장 실패)는 기록만 하고
//! 다음 라인으로 진행합니다. 라인 하나가 배치나 감시를 중단시키지 않습니다.

use std::io::SeekFrom;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use metrics::counter;
use serde::{Deserialize, Serialize};
use tokio::io::{AsyncBufReadExt, AsyncReadExt, AsyncSeekExt, BufReader};
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

use gatewatch_core::config::SourceConfig;
use gatewatch_core::event::AlertEvent;
use gatewatch_core::metrics::{
    PIPELINE_ALERTS_TOTAL, PIPELINE_LINES_TOTAL, PIPELINE_NOTIFY_DROPPED_TOTAL,
    PIPELINE_OBSERVATIONS_TOTAL, STORE_ERRORS_TOTAL,
};
use gatewatch_core::pipeline::GeoLookup;
use gatewatch_core::types::GeoInfo;

use crate::error::PlayerPipelineError;
use crate::geo::GeoCache;
use crate::parser::LineParser;
use crate::store::PlayerStore;

/// 배치/감시 처리 집계 카운터
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct BatchStats {
    /// 읽은 라인 수
    pub lines: u64,
    /// 신원 관측으로 변환된 라인 수
    pub observations: u64,
    /// 생성된 알림 수
    pub alerts: u64,
    /// 지오로케이션 조회 실패 수 (관측은 지오 없이 진행됨)
    pub geo_failures: u64,
    /// 저장소 기록 실패 수 (해당 관측은 유실됨)
    pub store_errors: u64,
    /// 파일 I/O 실패 수
    pub io_errors: u64,
}

impl BatchStats {
    /// 다른 집계를 합산합니다.
    pub fn merge(&mut self, other: &BatchStats) {
        self.lines += other.lines;
        self.observations += other.observations;
        self.alerts += other.alerts;
        self.geo_failures += other.geo_failures;
        self.store_errors += other.store_errors;
        self.io_errors += other.io_errors;
    }
}

impl std::fmt::Display for BatchStats {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "lines={} observations={} alerts={} geo_failures={} store_errors={} io_errors={}",
            self.lines,
            self.observations,
            self.alerts,
            self.geo_failures,
            self.store_errors,
            self.io_errors,
        )
    }
}

/// 로그 모니터
///
/// 파서/저장소/지오 캐시를 묶어 라인 처리 경로 하나를 제공하며,
/// 배치 임포트와 소스별 연속 감시가 이 경로를 공유합니다.
pub struct LogMonitor<P: GeoLookup> {
    /// 라인 파서
    parser: LineParser,
    /// 신원 저장소 (모든 소스 태스크가 공유)
    store: Arc<PlayerStore>,
    /// 지오로케이션 캐시 — None이면 보강 없이 기록
    geo: Option<Arc<GeoCache<P>>>,
    /// 알림 전달 채널
    alert_tx: mpsc::Sender<AlertEvent>,
    /// 연속 감시 폴링 주기
    poll_interval: Duration,
}

impl<P: GeoLookup> LogMonitor<P> {
    /// 새 모니터를 생성합니다.
    pub fn new(
        store: Arc<PlayerStore>,
        geo: Option<Arc<GeoCache<P>>>,
        alert_tx: mpsc::Sender<AlertEvent>,
        poll_interval: Duration,
    ) -> Result<Self, PlayerPipelineError> {
        Ok(Self {
            parser: LineParser::new()?,
            store,
            geo,
            alert_tx,
            poll_interval,
        })
    }

    /// 라인 하나를 파이프라인에 흘려보냅니다.
    ///
    /// 파싱 불가 라인은 조용히 건너뛰고, 지오 실패는 보강 없이 진행하며,
    /// 저장 실패는 카운터에 기록하고 계속합니다.
    pub async fn process_line(&self, line: &str, source: &str, stats: &mut BatchStats) {
        stats.lines += 1;
        counter!(PIPELINE_LINES_TOTAL).increment(1);

        let Some(observation) = self.parser.parse(line, source) else {
            return;
        };
        stats.observations += 1;
        counter!(PIPELINE_OBSERVATIONS_TOTAL).increment(1);

        // 주소가 있으면 지오로케이션 보강 시도 — 실패해도 관측은 진행
        let geo: Option<GeoInfo> = match (&self.geo, &observation.address) {
            (Some(cache), Some(address)) => match cache.resolve(address).await {
                Ok(info) => Some(info),
                Err(e) => {
                    stats.geo_failures += 1;
                    tracing::warn!(
                        source = %source,
                        address = %address,
                        error = %e,
                        "geo enrichment failed, recording observation without geo"
                    );
                    None
                }
            },
            _ => None,
        };

        match self.store.update(&observation, geo.as_ref()) {
            Ok(alerts) => {
                stats.alerts += alerts.len() as u64;
                for alert in alerts {
                    counter!(PIPELINE_ALERTS_TOTAL).increment(1);
                    tracing::info!(
                        identity = %alert.identity_id,
                        kind = %alert.kind,
                        source = %source,
                        "{alert}"
                    );
                    // 전달은 best-effort — 채널이 가득 차거나 닫혀도
                    // 저장소 기록은 이미 완료된 상태
                    if let Err(e) = self.alert_tx.try_send(AlertEvent::new(alert)) {
                        counter!(PIPELINE_NOTIFY_DROPPED_TOTAL).increment(1);
                        tracing::warn!(error = %e, "alert notification dropped");
                    }
                }
            }
            Err(e) => {
                stats.store_errors += 1;
                counter!(STORE_ERRORS_TOTAL).increment(1);
                tracing::error!(
                    source = %source,
                    identity = %observation.identity_id,
                    error = %e,
                    "store update failed, observation lost"
                );
            }
        }
    }

    /// 과거 로그 파일들을 배치로 임포트합니다.
    ///
    /// 파일 순서대로, 각 파일을 처음부터 끝까지 처리합니다.
    /// 어떤 라인/파일의 실패도 배치를 중단시키지 않습니다.
    pub async fn import_files(
        &self,
        source: &str,
        paths: &[impl AsRef<Path>],
    ) -> BatchStats {
        let mut stats = BatchStats::default();

        for path in paths {
            let path = path.as_ref();
            let file = match tokio::fs::File::open(path).await {
                Ok(file) => file,
                Err(e) => {
                    stats.io_errors += 1;
                    tracing::warn!(path = %path.display(), error = %e, "skipping unreadable log file");
                    continue;
                }
            };

            let reader = BufReader::new(file);
            let mut lines = reader.lines();
            loop {
                match lines.next_line().await {
                    Ok(Some(line)) => self.process_line(&line, source, &mut stats).await,
                    Ok(None) => break,
                    Err(e) => {
                        stats.io_errors += 1;
                        tracing::warn!(path = %path.display(), error = %e, "read error, skipping rest of file");
                        break;
                    }
                }
            }

            tracing::info!(path = %path.display(), source = %source, %stats, "imported log file");
        }

        stats
    }

    /// 소스 하나를 연속 감시합니다. 취소될 때까지 실행됩니다.
    ///
    /// `tokio::spawn`으로 소스별 태스크에서 호출하세요. 처음 만난 파일은
    /// 끝에서 시작하고, 파일 길이가 오프셋보다 줄어들면(로테이션/절단)
    /// 새 끝으로 다시 앵커합니다. 취소 시 진행 중인 폴 사이클을 마치고
    /// 종료합니다.
    pub async fn watch_source(&self, source: &SourceConfig, cancel: CancellationToken) {
        let path = Path::new(&source.path);
        // None이면 아직 파일 끝에 앵커하지 않은 상태
        let mut offset: Option<u64> = None;
        let mut remainder = String::new();
        let mut stats = BatchStats::default();

        tracing::info!(source = %source.name, path = %source.path, "starting source watch");

        loop {
            tokio::select! {
                _ = cancel.cancelled() => break,
                _ = tokio::time::sleep(self.poll_interval) => {}
            }

            let len = match tokio::fs::metadata(path).await {
                Ok(meta) => meta.len(),
                Err(e) => {
                    if offset.take().is_some() {
                        tracing::warn!(source = %source.name, error = %e, "log file disappeared, waiting for it to return");
                        remainder.clear();
                    }
                    continue;
                }
            };

            let anchored = match offset {
                None => {
                    // 첫 조우: 과거 내용은 건너뛰고 끝에서 시작
                    offset = Some(len);
                    tracing::info!(source = %source.name, offset = len, "anchored at end of file");
                    continue;
                }
                Some(current) if len < current => {
                    // 로테이션/절단: 새 끝으로 재앵커, 과거 내용 재처리 없음
                    tracing::info!(
                        source = %source.name,
                        old_offset = current,
                        new_len = len,
                        "file truncated or rotated, re-anchoring at end"
                    );
                    offset = Some(len);
                    remainder.clear();
                    continue;
                }
                Some(current) if len == current => continue,
                Some(current) => current,
            };

            match read_appended(path, anchored).await {
                Ok((chunk, new_offset)) => {
                    offset = Some(new_offset);
                    remainder.push_str(&chunk);

                    // 완성된 라인만 처리, 꼬리의 미완성 라인은 다음 사이클로
                    while let Some(newline_at) = remainder.find('\n') {
                        let line: String = remainder.drain(..=newline_at).collect();
                        let line = line.trim_end_matches(['\n', '\r']);
                        self.process_line(line, &source.name, &mut stats).await;
                    }
                }
                Err(e) => {
                    stats.io_errors += 1;
                    tracing::warn!(source = %source.name, error = %e, "failed to read appended bytes");
                }
            }
        }

        tracing::info!(source = %source.name, %stats, "source watch stopped");
    }
}

/// 오프셋 이후에 추가된 바이트를 읽습니다.
async fn read_appended(path: &Path, offset: u64) -> Result<(String, u64), PlayerPipelineError> {
    let mut file = tokio::fs::File::open(path).await?;
    file.seek(SeekFrom::Start(offset)).await?;
    let mut buf = Vec::new();
    let read = file.read_to_end(&mut buf).await?;
    Ok((
        String::from_utf8_lossy(&buf).into_owned(),
        offset + read as u64,
    ))
}
