//! 신원 저장소 — 이력 데이터베이스와 변화 감지
//!
//! [`PlayerStore`]는 시스템의 단일 진실 공급원입니다. 신원 스냅샷,
//! 이름/주소 이력, 프로토콜 제재 ID 변경 기록, 접속 이벤트 감사 로그,
//! 알림 로그를 SQLite 파일 하나에 보관합니다.
//!
//! [`update`](PlayerStore::update)는 핵심 상태 전이입니다. 관측 하나를
//! 현재 스냅샷과 비교하여 알림을 생성하고, 모든 변경을 트랜잭션 하나로
//! 원자적으로 기록합니다. 실패 시 아무것도 기록되지 않고 알림도 없습니다.
//!
//! # 동시성
//! 연결은 Mutex 뒤에 있고 `update`마다 트랜잭션 하나를 사용하므로,
//! 같은 신원에 대한 동시 갱신의 비교-후-기록 구간이 끼어들 수 없습니다.

pub mod schema;

use std::path::Path;
use std::sync::Mutex;

use chrono::{DateTime, Duration, SecondsFormat, Utc};
use metrics::counter;
use rusqlite::{Connection, OptionalExtension, Row, params};

use gatewatch_core::metrics::STORE_UPDATES_TOTAL;
use gatewatch_core::types::{
    AddressUse, Alert, AlertKind, ConnectionEvent, EventKind, GeoInfo, Identity, IdentityHistory,
    IdentitySummary, NameUse, Observation, ProtocolIdChange, StoreStats,
};

use crate::error::PlayerPipelineError;

pub use schema::STORE_SCHEMA;

/// 신원 저장소
///
/// 모든 연산은 `&self`로 호출하며 내부 Mutex로 직렬화됩니다.
/// 여러 소스 태스크가 `Arc<PlayerStore>`를 공유합니다.
pub struct PlayerStore {
    /// SQLite 연결 — 논리적 쓰기당 트랜잭션 하나
    conn: Mutex<Connection>,
}

impl PlayerStore {
    /// 파일 데이터베이스를 열고 스키마를 보장합니다.
    pub fn open(path: impl AsRef<Path>) -> Result<Self, PlayerPipelineError> {
        let path = path.as_ref();
        let conn = Connection::open(path).map_err(|e| PlayerPipelineError::StoreConnection {
            path: path.display().to_string(),
            reason: e.to_string(),
        })?;
        Self::init(conn)
    }

    /// 인메모리 데이터베이스를 엽니다 (테스트용).
    pub fn open_in_memory() -> Result<Self, PlayerPipelineError> {
        let conn =
            Connection::open_in_memory().map_err(|e| PlayerPipelineError::StoreConnection {
                path: ":memory:".to_owned(),
                reason: e.to_string(),
            })?;
        Self::init(conn)
    }

    fn init(conn: Connection) -> Result<Self, PlayerPipelineError> {
        conn.pragma_update(None, "journal_mode", "WAL")?;
        conn.pragma_update(None, "foreign_keys", "ON")?;
        conn.pragma_update(None, "busy_timeout", 5000)?;
        conn.execute_batch(STORE_SCHEMA)?;
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    fn lock(&self) -> Result<std::sync::MutexGuard<'_, Connection>, PlayerPipelineError> {
        self.conn
            .lock()
            .map_err(|_| PlayerPipelineError::Store("connection mutex poisoned".to_owned()))
    }

    /// 저장소 연결 상태를 확인합니다.
    pub fn ping(&self) -> Result<(), PlayerPipelineError> {
        let conn = self.lock()?;
        let _: i64 = conn.query_row("SELECT 1", [], |row| row.get(0))?;
        Ok(())
    }

    /// 관측 하나를 반영하고 감지된 변화의 알림 목록을 반환합니다.
    ///
    /// 전체가 트랜잭션 하나로 실행됩니다. 어느 단계든 실패하면
    /// 아무것도 기록되지 않고 알림 없이 에러가 반환됩니다.
    ///
    /// # 상태 전이
    /// 1. 신원이 없으면 생성 + `new_identity` 알림
    /// 2. 있으면 이름/주소/프로토콜 ID를 비교하여 변화마다 알림
    ///    (프로토콜 ID의 최초 할당은 변화가 아님)
    /// 3. 이름/주소 이력 upsert
    /// 4. 익명화 주소면 관측할 때마다 `anonymizer_detected` 알림
    /// 5. 접속 이벤트 기록
    pub fn update(
        &self,
        obs: &Observation,
        geo: Option<&GeoInfo>,
    ) -> Result<Vec<Alert>, PlayerPipelineError> {
        let now = Utc::now();
        let now_s = fmt_ts(now);
        let mut conn = self.lock()?;
        let tx = conn.transaction()?;

        // (kind, message, old_value, new_value)
        let mut pending: Vec<(AlertKind, String, Option<String>, Option<String>)> = Vec::new();

        let existing = tx
            .query_row(
                "SELECT current_name, current_address, protocol_ban_id
                 FROM identities WHERE identity_id = ?1",
                params![obs.identity_id],
                |row| {
                    Ok((
                        row.get::<_, String>(0)?,
                        row.get::<_, Option<String>>(1)?,
                        row.get::<_, Option<String>>(2)?,
                    ))
                },
            )
            .optional()?;

        match existing {
            None => {
                tx.execute(
                    "INSERT INTO identities
                     (identity_id, protocol_ban_id, current_name, current_address,
                      first_seen, last_seen)
                     VALUES (?1, ?2, ?3, ?4, ?5, ?5)",
                    params![
                        obs.identity_id,
                        obs.protocol_ban_id,
                        obs.name,
                        obs.address,
                        now_s
                    ],
                )?;
                pending.push((
                    AlertKind::NewIdentity,
                    format!(
                        "new identity: {} ({})",
                        obs.name,
                        &obs.identity_id[..8.min(obs.identity_id.len())]
                    ),
                    None,
                    Some(obs.name.clone()),
                ));
            }
            Some((old_name, old_address, old_ban_id)) => {
                if obs.name != old_name {
                    pending.push((
                        AlertKind::NameChange,
                        format!("name change: '{}' -> '{}'", old_name, obs.name),
                        Some(old_name),
                        Some(obs.name.clone()),
                    ));
                }

                if let Some(address) = &obs.address
                    && old_address.as_ref() != Some(address)
                {
                    pending.push((
                        AlertKind::AddressChange,
                        format!(
                            "address change: {} -> {}",
                            old_address.as_deref().unwrap_or("(none)"),
                            address
                        ),
                        old_address.clone(),
                        Some(address.clone()),
                    ));
                }

                // 프로토콜 ID: 기존 값이 있을 때의 교체만 변화로 취급
                if let Some(new_id) = &obs.protocol_ban_id
                    && let Some(old_id) = &old_ban_id
                    && new_id != old_id
                {
                    pending.push((
                        AlertKind::ProtocolIdChange,
                        format!("protocol ban id change: {old_id} -> {new_id}"),
                        Some(old_id.clone()),
                        Some(new_id.clone()),
                    ));
                    tx.execute(
                        "INSERT INTO protocol_id_changes (identity_id, old_id, new_id, changed_at)
                         VALUES (?1, ?2, ?3, ?4)",
                        params![obs.identity_id, old_id, new_id, now_s],
                    )?;
                }

                // 주소/프로토콜 ID는 관측에 없으면 기존 값을 유지
                let next_address = obs.address.clone().or(old_address);
                let next_ban_id = obs.protocol_ban_id.clone().or(old_ban_id);
                tx.execute(
                    "UPDATE identities
                     SET current_name = ?1, current_address = ?2, protocol_ban_id = ?3,
                         last_seen = ?4, connection_count = connection_count + 1
                     WHERE identity_id = ?5",
                    params![obs.name, next_address, next_ban_id, now_s, obs.identity_id],
                )?;
            }
        }

        // 이름 사용 이력
        tx.execute(
            "INSERT INTO name_uses (identity_id, name, first_used, last_used)
             VALUES (?1, ?2, ?3, ?3)
             ON CONFLICT(identity_id, name) DO UPDATE SET
                 last_used = ?3,
                 use_count = use_count + 1",
            params![obs.identity_id, obs.name, now_s],
        )?;

        // 주소 사용 이력 + 익명화 감지
        if let Some(address) = &obs.address {
            let country = geo.and_then(|g| g.country.clone());
            let isp = geo.and_then(|g| g.isp.clone());
            let is_vpn = geo.is_some_and(|g| g.is_vpn);
            let is_proxy = geo.is_some_and(|g| g.is_proxy);
            let payload = geo.and_then(|g| g.payload.as_ref().map(|v| v.to_string()));

            tx.execute(
                "INSERT INTO address_uses
                 (identity_id, address, country, isp, is_vpn, is_proxy, geo_payload,
                  first_used, last_used)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?8)
                 ON CONFLICT(identity_id, address) DO UPDATE SET
                     last_used = ?8,
                     use_count = use_count + 1,
                     country = ?3,
                     isp = ?4,
                     is_vpn = ?5,
                     is_proxy = ?6,
                     geo_payload = ?7",
                params![
                    obs.identity_id,
                    address,
                    country,
                    isp,
                    is_vpn,
                    is_proxy,
                    payload,
                    now_s
                ],
            )?;

            // 이미 알려진 주소라도 익명화 주소면 관측할 때마다 알림
            if let Some(g) = geo
                && g.is_anonymizer()
            {
                let label = if g.is_vpn { "VPN" } else { "proxy" };
                pending.push((
                    AlertKind::AnonymizerDetected,
                    format!("{} detected: {} from {}", label, obs.name, address),
                    None,
                    Some(address.clone()),
                ));
            }
        }

        // 접속 이벤트 감사 로그
        tx.execute(
            "INSERT INTO connection_events
             (identity_id, event_type, source_server, timestamp, name_used, address_used)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
            params![
                obs.identity_id,
                obs.kind.as_str(),
                obs.source,
                now_s,
                obs.name,
                obs.address
            ],
        )?;

        // 알림 기록 — 같은 트랜잭션 안에서 영속화
        let mut alerts = Vec::with_capacity(pending.len());
        for (kind, message, old_value, new_value) in pending {
            tx.execute(
                "INSERT INTO alerts
                 (identity_id, alert_type, message, old_value, new_value, created_at)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
                params![
                    obs.identity_id,
                    kind.as_str(),
                    message,
                    old_value,
                    new_value,
                    now_s
                ],
            )?;
            alerts.push(Alert {
                id: tx.last_insert_rowid(),
                identity_id: obs.identity_id.clone(),
                kind,
                message,
                old_value,
                new_value,
                created_at: now,
                acknowledged: false,
            });
        }

        tx.commit()?;
        counter!(STORE_UPDATES_TOTAL).increment(1);
        Ok(alerts)
    }

    /// 신원 ID로 신원을 조회합니다.
    pub fn identity(&self, identity_id: &str) -> Result<Option<Identity>, PlayerPipelineError> {
        let conn = self.lock()?;
        let identity = conn
            .query_row(
                "SELECT identity_id, protocol_ban_id, current_name, current_address,
                        first_seen, last_seen, connection_count, banned, ban_reason, notes
                 FROM identities WHERE identity_id = ?1",
                params![identity_id],
                identity_from_row,
            )
            .optional()?;
        Ok(identity)
    }

    /// 현재 이름의 부분 일치로 신원 하나를 조회합니다.
    pub fn identity_by_name(&self, name: &str) -> Result<Option<Identity>, PlayerPipelineError> {
        let conn = self.lock()?;
        let identity = conn
            .query_row(
                "SELECT identity_id, protocol_ban_id, current_name, current_address,
                        first_seen, last_seen, connection_count, banned, ban_reason, notes
                 FROM identities WHERE current_name LIKE '%' || ?1 || '%'
                 ORDER BY last_seen DESC LIMIT 1",
                params![name],
                identity_from_row,
            )
            .optional()?;
        Ok(identity)
    }

    /// 신원의 전체 이력을 조회합니다.
    ///
    /// 이름/주소는 전체, 알림은 최근 20건, 접속 이벤트는 최근 50건입니다.
    pub fn identity_history(
        &self,
        identity_id: &str,
    ) -> Result<IdentityHistory, PlayerPipelineError> {
        let conn = self.lock()?;

        let names = conn
            .prepare(
                "SELECT identity_id, name, first_used, last_used, use_count
                 FROM name_uses WHERE identity_id = ?1 ORDER BY last_used DESC",
            )?
            .query_map(params![identity_id], name_use_from_row)?
            .collect::<Result<Vec<_>, _>>()?;

        let addresses = conn
            .prepare(
                "SELECT identity_id, address, country, isp, is_vpn, is_proxy, geo_payload,
                        first_used, last_used, use_count
                 FROM address_uses WHERE identity_id = ?1 ORDER BY last_used DESC",
            )?
            .query_map(params![identity_id], address_use_from_row)?
            .collect::<Result<Vec<_>, _>>()?;

        let protocol_id_changes = conn
            .prepare(
                "SELECT identity_id, old_id, new_id, changed_at
                 FROM protocol_id_changes WHERE identity_id = ?1 ORDER BY changed_at DESC",
            )?
            .query_map(params![identity_id], |row| {
                Ok(ProtocolIdChange {
                    identity_id: row.get(0)?,
                    old_id: row.get(1)?,
                    new_id: row.get(2)?,
                    changed_at: ts_col(row, 3)?,
                })
            })?
            .collect::<Result<Vec<_>, _>>()?;

        let alerts = conn
            .prepare(
                "SELECT id, identity_id, alert_type, message, old_value, new_value,
                        created_at, acknowledged
                 FROM alerts WHERE identity_id = ?1 ORDER BY created_at DESC, id DESC LIMIT 20",
            )?
            .query_map(params![identity_id], alert_from_row)?
            .collect::<Result<Vec<_>, _>>()?;

        let connections = conn
            .prepare(
                "SELECT identity_id, event_type, source_server, timestamp, name_used, address_used
                 FROM connection_events WHERE identity_id = ?1
                 ORDER BY timestamp DESC, id DESC LIMIT 50",
            )?
            .query_map(params![identity_id], connection_event_from_row)?
            .collect::<Result<Vec<_>, _>>()?;

        Ok(IdentityHistory {
            names,
            addresses,
            protocol_id_changes,
            alerts,
            connections,
        })
    }

    /// 해당 주소를 사용한 적 있는 모든 신원을 반환합니다 (최근 사용 우선).
    pub fn find_by_address(
        &self,
        address: &str,
    ) -> Result<Vec<IdentitySummary>, PlayerPipelineError> {
        let conn = self.lock()?;
        let rows = conn
            .prepare(
                "SELECT p.identity_id, p.current_name, p.current_address,
                        au.first_used, au.last_used
                 FROM identities p
                 JOIN address_uses au ON p.identity_id = au.identity_id
                 WHERE au.address = ?1
                 ORDER BY au.last_used DESC",
            )?
            .query_map(params![address], summary_from_row)?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(rows)
    }

    /// 해당 이름(부분 일치, 대소문자 무시)을 사용한 적 있는 모든 신원을 반환합니다.
    pub fn find_by_name(&self, name: &str) -> Result<Vec<IdentitySummary>, PlayerPipelineError> {
        let conn = self.lock()?;
        let rows = conn
            .prepare(
                "SELECT p.identity_id, p.current_name, p.current_address,
                        MIN(pn.first_used), MAX(pn.last_used)
                 FROM identities p
                 JOIN name_uses pn ON p.identity_id = pn.identity_id
                 WHERE pn.name LIKE '%' || ?1 || '%'
                 GROUP BY p.identity_id, p.current_name, p.current_address
                 ORDER BY MAX(pn.last_used) DESC",
            )?
            .query_map(params![name], summary_from_row)?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(rows)
    }

    /// 미확인 알림을 최신순으로 반환합니다.
    pub fn unacknowledged_alerts(&self, limit: u32) -> Result<Vec<Alert>, PlayerPipelineError> {
        let conn = self.lock()?;
        let rows = conn
            .prepare(
                "SELECT id, identity_id, alert_type, message, old_value, new_value,
                        created_at, acknowledged
                 FROM alerts WHERE acknowledged = 0
                 ORDER BY created_at DESC, id DESC LIMIT ?1",
            )?
            .query_map(params![limit], alert_from_row)?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(rows)
    }

    /// 알림을 확인 처리합니다. 해당 ID가 있었으면 true를 반환합니다.
    pub fn acknowledge_alert(&self, alert_id: i64) -> Result<bool, PlayerPipelineError> {
        let conn = self.lock()?;
        let changed = conn.execute(
            "UPDATE alerts SET acknowledged = 1 WHERE id = ?1",
            params![alert_id],
        )?;
        Ok(changed > 0)
    }

    /// 신원을 제재 상태로 표시합니다.
    ///
    /// 외부 집행 기능이 성공한 뒤에만 호출해야 합니다
    /// ([`enforce::ban_identity`](crate::enforce::ban_identity) 참고).
    pub fn set_banned(
        &self,
        identity_id: &str,
        reason: &str,
    ) -> Result<bool, PlayerPipelineError> {
        let conn = self.lock()?;
        let changed = conn.execute(
            "UPDATE identities SET banned = 1, ban_reason = ?2 WHERE identity_id = ?1",
            params![identity_id, reason],
        )?;
        Ok(changed > 0)
    }

    /// 신원의 제재 상태를 해제합니다.
    pub fn clear_ban(&self, identity_id: &str) -> Result<bool, PlayerPipelineError> {
        let conn = self.lock()?;
        let changed = conn.execute(
            "UPDATE identities SET banned = 0, ban_reason = NULL WHERE identity_id = ?1",
            params![identity_id],
        )?;
        Ok(changed > 0)
    }

    /// 운영자 메모를 기록합니다.
    pub fn set_notes(&self, identity_id: &str, notes: &str) -> Result<bool, PlayerPipelineError> {
        let conn = self.lock()?;
        let changed = conn.execute(
            "UPDATE identities SET notes = ?2 WHERE identity_id = ?1",
            params![identity_id, notes],
        )?;
        Ok(changed > 0)
    }

    /// 저장소 통계를 반환합니다.
    pub fn stats(&self) -> Result<StoreStats, PlayerPipelineError> {
        let conn = self.lock()?;
        let total_identities: u64 =
            conn.query_row("SELECT COUNT(*) FROM identities", [], |row| row.get(0))?;
        let banned_identities: u64 = conn.query_row(
            "SELECT COUNT(*) FROM identities WHERE banned = 1",
            [],
            |row| row.get(0),
        )?;
        let unacknowledged_alerts: u64 = conn.query_row(
            "SELECT COUNT(*) FROM alerts WHERE acknowledged = 0",
            [],
            |row| row.get(0),
        )?;
        let anonymizer_addresses: u64 = conn.query_row(
            "SELECT COUNT(DISTINCT address) FROM address_uses WHERE is_vpn = 1 OR is_proxy = 1",
            [],
            |row| row.get(0),
        )?;
        Ok(StoreStats {
            total_identities,
            banned_identities,
            unacknowledged_alerts,
            anonymizer_addresses,
        })
    }

    /// 보존 기간을 지난 접속 이벤트를 삭제합니다.
    ///
    /// 감사 로그(`connection_events`)만 대상이며, 신원/알림 행은 읽지도
    /// 건드리지도 않습니다. 삭제된 행 수를 반환합니다.
    pub fn prune_events(&self, retention_days: u32) -> Result<usize, PlayerPipelineError> {
        let cutoff = fmt_ts(Utc::now() - Duration::days(i64::from(retention_days)));
        let conn = self.lock()?;
        let deleted = conn.execute(
            "DELETE FROM connection_events WHERE timestamp < ?1",
            params![cutoff],
        )?;
        Ok(deleted)
    }
}

// --- 타임스탬프 헬퍼 ---
// RFC 3339 고정 폭(마이크로초, Z 접미사)으로 기록하여 문자열 비교가
// 시간 순서와 일치하도록 유지합니다.

fn fmt_ts(ts: DateTime<Utc>) -> String {
    ts.to_rfc3339_opts(SecondsFormat::Micros, true)
}

fn ts_col(row: &Row<'_>, idx: usize) -> rusqlite::Result<DateTime<Utc>> {
    let raw: String = row.get(idx)?;
    DateTime::parse_from_rfc3339(&raw)
        .map(|ts| ts.with_timezone(&Utc))
        .map_err(|e| {
            rusqlite::Error::FromSqlConversionFailure(idx, rusqlite::types::Type::Text, Box::new(e))
        })
}

// --- 행 매퍼 ---

fn identity_from_row(row: &Row<'_>) -> rusqlite::Result<Identity> {
    Ok(Identity {
        identity_id: row.get(0)?,
        protocol_ban_id: row.get(1)?,
        current_name: row.get(2)?,
        current_address: row.get(3)?,
        first_seen: ts_col(row, 4)?,
        last_seen: ts_col(row, 5)?,
        connection_count: row.get(6)?,
        banned: row.get(7)?,
        ban_reason: row.get(8)?,
        notes: row.get(9)?,
    })
}

fn name_use_from_row(row: &Row<'_>) -> rusqlite::Result<NameUse> {
    Ok(NameUse {
        identity_id: row.get(0)?,
        name: row.get(1)?,
        first_used: ts_col(row, 2)?,
        last_used: ts_col(row, 3)?,
        use_count: row.get(4)?,
    })
}

fn address_use_from_row(row: &Row<'_>) -> rusqlite::Result<AddressUse> {
    Ok(AddressUse {
        identity_id: row.get(0)?,
        address: row.get(1)?,
        country: row.get(2)?,
        isp: row.get(3)?,
        is_vpn: row.get(4)?,
        is_proxy: row.get(5)?,
        geo_payload: row.get(6)?,
        first_used: ts_col(row, 7)?,
        last_used: ts_col(row, 8)?,
        use_count: row.get(9)?,
    })
}

fn alert_from_row(row: &Row<'_>) -> rusqlite::Result<Alert> {
    let kind_raw: String = row.get(2)?;
    let kind = AlertKind::from_str_loose(&kind_raw).ok_or_else(|| {
        rusqlite::Error::FromSqlConversionFailure(
            2,
            rusqlite::types::Type::Text,
            format!("unknown alert type: {kind_raw}").into(),
        )
    })?;
    Ok(Alert {
        id: row.get(0)?,
        identity_id: row.get(1)?,
        kind,
        message: row.get(3)?,
        old_value: row.get(4)?,
        new_value: row.get(5)?,
        created_at: ts_col(row, 6)?,
        acknowledged: row.get(7)?,
    })
}

fn connection_event_from_row(row: &Row<'_>) -> rusqlite::Result<ConnectionEvent> {
    let kind_raw: String = row.get(1)?;
    let event_type = EventKind::from_str_loose(&kind_raw).ok_or_else(|| {
        rusqlite::Error::FromSqlConversionFailure(
            1,
            rusqlite::types::Type::Text,
            format!("unknown event type: {kind_raw}").into(),
        )
    })?;
    Ok(ConnectionEvent {
        identity_id: row.get(0)?,
        event_type,
        source_server: row.get::<_, Option<String>>(2)?.unwrap_or_default(),
        timestamp: ts_col(row, 3)?,
        name_used: row.get::<_, Option<String>>(4)?.unwrap_or_default(),
        address_used: row.get(5)?,
    })
}

fn summary_from_row(row: &Row<'_>) -> rusqlite::Result<IdentitySummary> {
    Ok(IdentitySummary {
        identity_id: row.get(0)?,
        current_name: row.get(1)?,
        current_address: row.get(2)?,
        first_used: ts_col(row, 3)?,
        last_used: ts_col(row, 4)?,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn store() -> PlayerStore {
        PlayerStore::open_in_memory().expect("in-memory store")
    }

    fn obs(identity_id: &str, name: &str, address: Option<&str>) -> Observation {
        Observation {
            identity_id: identity_id.to_owned(),
            name: name.to_owned(),
            address: address.map(str::to_owned),
            protocol_ban_id: None,
            kind: EventKind::Auth,
            source: "ttt1".to_owned(),
        }
    }

    fn vpn_geo() -> GeoInfo {
        GeoInfo {
            country: Some("Netherlands".to_owned()),
            isp: Some("ExampleVPN B.V.".to_owned()),
            is_vpn: true,
            is_proxy: false,
            payload: Some(serde_json::json!({"country_name": "Netherlands"})),
        }
    }

    #[test]
    fn first_observation_creates_identity_with_alert() {
        let store = store();
        let alerts = store.update(&obs("P1", "Alice", Some("1.2.3.4")), None).unwrap();

        assert_eq!(alerts.len(), 1);
        assert_eq!(alerts[0].kind, AlertKind::NewIdentity);

        let identity = store.identity("P1").unwrap().expect("identity exists");
        assert_eq!(identity.current_name, "Alice");
        assert_eq!(identity.current_address.as_deref(), Some("1.2.3.4"));
        assert_eq!(identity.connection_count, 1);
        assert!(!identity.banned);
    }

    #[test]
    fn repeat_observation_is_idempotent_for_alerts() {
        let store = store();
        let first = store.update(&obs("P1", "Alice", Some("1.2.3.4")), None).unwrap();
        assert_eq!(first.len(), 1);

        let second = store.update(&obs("P1", "Alice", Some("1.2.3.4")), None).unwrap();
        assert!(second.is_empty());

        // 알림은 없지만 카운터는 올라간다
        let identity = store.identity("P1").unwrap().unwrap();
        assert_eq!(identity.connection_count, 2);

        let history = store.identity_history("P1").unwrap();
        assert_eq!(history.names.len(), 1);
        assert_eq!(history.names[0].use_count, 2);
        assert_eq!(history.addresses.len(), 1);
        assert_eq!(history.addresses[0].use_count, 2);
    }

    #[test]
    fn connection_count_increases_by_one_per_update() {
        let store = store();
        for expected in 1..=5u64 {
            store.update(&obs("P1", "Alice", None), None).unwrap();
            let identity = store.identity("P1").unwrap().unwrap();
            assert_eq!(identity.connection_count, expected);
        }
    }

    #[test]
    fn name_change_produces_exactly_one_alert() {
        let store = store();
        store.update(&obs("P1", "A", None), None).unwrap();
        let alerts = store.update(&obs("P1", "B", None), None).unwrap();

        assert_eq!(alerts.len(), 1);
        assert_eq!(alerts[0].kind, AlertKind::NameChange);
        assert_eq!(alerts[0].old_value.as_deref(), Some("A"));
        assert_eq!(alerts[0].new_value.as_deref(), Some("B"));

        let identity = store.identity("P1").unwrap().unwrap();
        assert_eq!(identity.current_name, "B");

        let history = store.identity_history("P1").unwrap();
        assert_eq!(history.names.len(), 2);
    }

    #[test]
    fn address_change_detected() {
        let store = store();
        store.update(&obs("P1", "Alice", Some("1.2.3.4")), None).unwrap();
        let alerts = store.update(&obs("P1", "Alice", Some("5.6.7.8")), None).unwrap();

        assert_eq!(alerts.len(), 1);
        assert_eq!(alerts[0].kind, AlertKind::AddressChange);
        assert_eq!(alerts[0].old_value.as_deref(), Some("1.2.3.4"));
        assert_eq!(alerts[0].new_value.as_deref(), Some("5.6.7.8"));
    }

    #[test]
    fn missing_address_keeps_current_address() {
        let store = store();
        store.update(&obs("P1", "Alice", Some("1.2.3.4")), None).unwrap();
        let alerts = store.update(&obs("P1", "Alice", None), None).unwrap();

        assert!(alerts.is_empty());
        let identity = store.identity("P1").unwrap().unwrap();
        assert_eq!(identity.current_address.as_deref(), Some("1.2.3.4"));
    }

    #[test]
    fn protocol_id_first_assignment_is_silent() {
        let store = store();
        store.update(&obs("P1", "Alice", None), None).unwrap();

        let mut with_id = obs("P1", "Alice", None);
        with_id.protocol_ban_id = Some("be-aaa".to_owned());
        let alerts = store.update(&with_id, None).unwrap();

        assert!(alerts.is_empty());
        let identity = store.identity("P1").unwrap().unwrap();
        assert_eq!(identity.protocol_ban_id.as_deref(), Some("be-aaa"));
        assert!(store.identity_history("P1").unwrap().protocol_id_changes.is_empty());
    }

    #[test]
    fn protocol_id_replacement_alerts_and_logs() {
        let store = store();
        let mut first = obs("P1", "Alice", None);
        first.protocol_ban_id = Some("be-aaa".to_owned());
        store.update(&first, None).unwrap();

        let mut second = obs("P1", "Alice", None);
        second.protocol_ban_id = Some("be-bbb".to_owned());
        let alerts = store.update(&second, None).unwrap();

        assert_eq!(alerts.len(), 1);
        assert_eq!(alerts[0].kind, AlertKind::ProtocolIdChange);
        assert_eq!(alerts[0].old_value.as_deref(), Some("be-aaa"));
        assert_eq!(alerts[0].new_value.as_deref(), Some("be-bbb"));

        let history = store.identity_history("P1").unwrap();
        assert_eq!(history.protocol_id_changes.len(), 1);
        assert_eq!(history.protocol_id_changes[0].old_id, "be-aaa");
        assert_eq!(history.protocol_id_changes[0].new_id, "be-bbb");

        let identity = store.identity("P1").unwrap().unwrap();
        assert_eq!(identity.protocol_ban_id.as_deref(), Some("be-bbb"));
    }

    #[test]
    fn anonymizer_alert_fires_on_every_flagged_observation() {
        let store = store();
        let observation = obs("P1", "Alice", Some("5.6.7.8"));
        let geo = vpn_geo();

        let first = store.update(&observation, Some(&geo)).unwrap();
        // new_identity + anonymizer
        assert_eq!(first.len(), 2);
        assert!(first.iter().any(|a| a.kind == AlertKind::AnonymizerDetected));

        // 같은 주소를 다시 관측해도 또 알림
        let second = store.update(&observation, Some(&geo)).unwrap();
        assert_eq!(second.len(), 1);
        assert_eq!(second[0].kind, AlertKind::AnonymizerDetected);
    }

    #[test]
    fn geo_snapshot_is_overwritten_latest_wins() {
        let store = store();
        let observation = obs("P1", "Alice", Some("5.6.7.8"));

        store.update(&observation, Some(&vpn_geo())).unwrap();
        let clean = GeoInfo {
            country: Some("Germany".to_owned()),
            isp: Some("Deutsche Telekom".to_owned()),
            is_vpn: false,
            is_proxy: false,
            payload: None,
        };
        store.update(&observation, Some(&clean)).unwrap();

        let history = store.identity_history("P1").unwrap();
        assert_eq!(history.addresses.len(), 1);
        let address = &history.addresses[0];
        assert_eq!(address.country.as_deref(), Some("Germany"));
        assert!(!address.is_vpn);
        assert_eq!(address.use_count, 2);
    }

    #[test]
    fn spec_scenario_alice_bob_vpn() {
        let store = store();

        // 빈 저장소: 최초 관측
        let a1 = store.update(&obs("P1", "Alice", Some("1.2.3.4")), None).unwrap();
        assert_eq!(a1.len(), 1);
        assert_eq!(a1[0].kind, AlertKind::NewIdentity);
        assert_eq!(
            store.identity("P1").unwrap().unwrap().current_name,
            "Alice"
        );

        // 이름 변경
        let a2 = store.update(&obs("P1", "Bob", Some("1.2.3.4")), None).unwrap();
        assert_eq!(a2.len(), 1);
        assert_eq!(a2[0].kind, AlertKind::NameChange);
        assert_eq!(a2[0].old_value.as_deref(), Some("Alice"));
        assert_eq!(a2[0].new_value.as_deref(), Some("Bob"));

        // 주소 변경 + VPN
        let a3 = store
            .update(&obs("P1", "Bob", Some("5.6.7.8")), Some(&vpn_geo()))
            .unwrap();
        assert_eq!(a3.len(), 2);
        assert_eq!(a3[0].kind, AlertKind::AddressChange);
        assert_eq!(a3[0].old_value.as_deref(), Some("1.2.3.4"));
        assert_eq!(a3[0].new_value.as_deref(), Some("5.6.7.8"));
        assert_eq!(a3[1].kind, AlertKind::AnonymizerDetected);
    }

    #[test]
    fn find_by_address_returns_all_users_of_address() {
        let store = store();
        store.update(&obs("P1", "Alice", Some("9.9.9.9")), None).unwrap();
        store.update(&obs("P2", "Bob", Some("9.9.9.9")), None).unwrap();
        store.update(&obs("P3", "Carol", Some("8.8.8.8")), None).unwrap();

        let matches = store.find_by_address("9.9.9.9").unwrap();
        let ids: Vec<_> = matches.iter().map(|m| m.identity_id.as_str()).collect();
        assert_eq!(matches.len(), 2);
        assert!(ids.contains(&"P1"));
        assert!(ids.contains(&"P2"));
        assert!(!ids.contains(&"P3"));

        // 가장 최근 사용자가 먼저
        assert_eq!(matches[0].identity_id, "P2");
    }

    #[test]
    fn find_by_address_empty_when_unknown() {
        let store = store();
        assert!(store.find_by_address("203.0.113.9").unwrap().is_empty());
    }

    #[test]
    fn find_by_name_substring_case_insensitive() {
        let store = store();
        store.update(&obs("P1", "CrowBar", None), None).unwrap();
        store.update(&obs("P2", "crowbar_alt", None), None).unwrap();
        store.update(&obs("P3", "Sparrow", None), None).unwrap();

        let matches = store.find_by_name("crowbar").unwrap();
        assert_eq!(matches.len(), 2);

        // 이름을 바꿔도 이력으로 찾는다
        store.update(&obs("P1", "NewName", None), None).unwrap();
        let still = store.find_by_name("CROWBAR").unwrap();
        assert!(still.iter().any(|m| m.identity_id == "P1"));
    }

    #[test]
    fn find_by_name_does_not_duplicate_identities() {
        let store = store();
        store.update(&obs("P1", "Ghost", None), None).unwrap();
        store.update(&obs("P1", "Ghost2", None), None).unwrap();
        store.update(&obs("P1", "Ghost3", None), None).unwrap();

        let matches = store.find_by_name("ghost").unwrap();
        assert_eq!(matches.len(), 1);
        assert_eq!(matches[0].identity_id, "P1");
    }

    #[test]
    fn identity_by_name_partial_match() {
        let store = store();
        store.update(&obs("P1", "Heck Let Loose", None), None).unwrap();
        let found = store.identity_by_name("Let").unwrap();
        assert_eq!(found.unwrap().identity_id, "P1");
        assert!(store.identity_by_name("nobody").unwrap().is_none());
    }

    #[test]
    fn unacknowledged_alerts_and_ack_flow() {
        let store = store();
        store.update(&obs("P1", "Alice", None), None).unwrap();
        store.update(&obs("P1", "Bob", None), None).unwrap();

        let unack = store.unacknowledged_alerts(50).unwrap();
        assert_eq!(unack.len(), 2);

        assert!(store.acknowledge_alert(unack[0].id).unwrap());
        let after = store.unacknowledged_alerts(50).unwrap();
        assert_eq!(after.len(), 1);

        // 없는 ID는 false
        assert!(!store.acknowledge_alert(9999).unwrap());
    }

    #[test]
    fn ban_and_unban_bookkeeping() {
        let store = store();
        store.update(&obs("P1", "Alice", None), None).unwrap();

        assert!(store.set_banned("P1", "cheating").unwrap());
        let identity = store.identity("P1").unwrap().unwrap();
        assert!(identity.banned);
        assert_eq!(identity.ban_reason.as_deref(), Some("cheating"));

        assert!(store.clear_ban("P1").unwrap());
        let identity = store.identity("P1").unwrap().unwrap();
        assert!(!identity.banned);
        assert!(identity.ban_reason.is_none());

        assert!(!store.set_banned("missing", "x").unwrap());
    }

    #[test]
    fn notes_are_stored() {
        let store = store();
        store.update(&obs("P1", "Alice", None), None).unwrap();
        assert!(store.set_notes("P1", "suspected alt of P9").unwrap());
        let identity = store.identity("P1").unwrap().unwrap();
        assert_eq!(identity.notes.as_deref(), Some("suspected alt of P9"));
    }

    #[test]
    fn stats_reflect_store_contents() {
        let store = store();
        store.update(&obs("P1", "Alice", Some("1.1.1.1")), Some(&vpn_geo())).unwrap();
        store.update(&obs("P2", "Bob", None), None).unwrap();
        store.set_banned("P2", "toxic").unwrap();

        let stats = store.stats().unwrap();
        assert_eq!(stats.total_identities, 2);
        assert_eq!(stats.banned_identities, 1);
        // new_identity x2 + anonymizer x1
        assert_eq!(stats.unacknowledged_alerts, 3);
        assert_eq!(stats.anonymizer_addresses, 1);
    }

    #[test]
    fn prune_events_removes_only_old_rows() {
        let store = store();
        store.update(&obs("P1", "Alice", None), None).unwrap();
        store.update(&obs("P1", "Alice", None), None).unwrap();

        // 모든 이벤트가 방금 생성되었으므로 아무것도 지워지지 않아야 한다
        assert_eq!(store.prune_events(30).unwrap(), 0);

        // 오래된 이벤트를 직접 심어서 정리 대상인지 확인
        {
            let conn = store.conn.lock().unwrap();
            conn.execute(
                "INSERT INTO connection_events
                 (identity_id, event_type, source_server, timestamp, name_used)
                 VALUES ('P1', 'connect', 'ttt1', '2020-01-01T00:00:00.000000Z', 'Alice')",
                [],
            )
            .unwrap();
        }
        assert_eq!(store.prune_events(30).unwrap(), 1);

        // 신원/알림은 건드리지 않는다
        assert!(store.identity("P1").unwrap().is_some());
        assert_eq!(store.stats().unwrap().unacknowledged_alerts, 1);
    }

    #[test]
    fn connection_events_are_recorded_verbatim() {
        let store = store();
        let mut observation = obs("P1", "Alice", Some("1.2.3.4"));
        observation.kind = EventKind::Connect;
        observation.source = "main-server".to_owned();
        store.update(&observation, None).unwrap();

        let history = store.identity_history("P1").unwrap();
        assert_eq!(history.connections.len(), 1);
        let event = &history.connections[0];
        assert_eq!(event.event_type, EventKind::Connect);
        assert_eq!(event.source_server, "main-server");
        assert_eq!(event.name_used, "Alice");
        assert_eq!(event.address_used.as_deref(), Some("1.2.3.4"));
    }

    #[test]
    fn concurrent_updates_serialize_without_losing_counts() {
        use std::sync::Arc;

        let store = Arc::new(store());
        let mut handles = Vec::new();
        for _ in 0..8 {
            let store = Arc::clone(&store);
            handles.push(std::thread::spawn(move || {
                for _ in 0..10 {
                    store.update(&obs("P1", "Alice", None), None).unwrap();
                }
            }));
        }
        for handle in handles {
            handle.join().unwrap();
        }

        let identity = store.identity("P1").unwrap().unwrap();
        assert_eq!(identity.connection_count, 80);
        // new_identity는 정확히 한 번
        let history = store.identity_history("P1").unwrap();
        let new_identity_alerts = history
            .alerts
            .iter()
            .filter(|a| a.kind == AlertKind::NewIdentity)
            .count();
        assert_eq!(new_identity_alerts, 1);
    }

    #[test]
    fn ping_succeeds_on_open_store() {
        assert!(store().ping().is_ok());
    }
}
