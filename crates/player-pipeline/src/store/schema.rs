//! 신원 저장소 SQLite 스키마
//!
//! 테이블:
//! - `identities`: 신원 스냅샷 (identity_id당 정확히 1행)
//! - `name_uses`: 이름 사용 이력 (identity_id, name 쌍당 1행)
//! - `address_uses`: 주소 사용 이력 + 지오로케이션 스냅샷
//! - `protocol_id_changes`: 프로토콜 제재 ID 교체 기록 (append-only)
//! - `connection_events`: 접속 이벤트 감사 로그 (append-only, 보존 기간 정리 대상)
//! - `alerts`: 변화 감지 알림 (append-only + acknowledged 플래그)

/// 신원 저장소 DDL
///
/// 모든 구문은 멱등(IF NOT EXISTS)이므로 매 기동 시 실행해도 안전합니다.
pub const STORE_SCHEMA: &str = r#"
-- 신원 스냅샷
CREATE TABLE IF NOT EXISTS identities (
    identity_id       TEXT PRIMARY KEY,
    protocol_ban_id   TEXT,
    current_name      TEXT NOT NULL,
    current_address   TEXT,
    first_seen        TEXT NOT NULL,
    last_seen         TEXT NOT NULL,
    connection_count  INTEGER NOT NULL DEFAULT 1,
    banned            INTEGER NOT NULL DEFAULT 0,
    ban_reason        TEXT,
    notes             TEXT
);

-- 이름 사용 이력
CREATE TABLE IF NOT EXISTS name_uses (
    id           INTEGER PRIMARY KEY AUTOINCREMENT,
    identity_id  TEXT NOT NULL REFERENCES identities(identity_id),
    name         TEXT NOT NULL,
    first_used   TEXT NOT NULL,
    last_used    TEXT NOT NULL,
    use_count    INTEGER NOT NULL DEFAULT 1,
    UNIQUE(identity_id, name)
);

-- 주소 사용 이력 (지오로케이션 스냅샷은 최신 값으로 덮어씀)
CREATE TABLE IF NOT EXISTS address_uses (
    id           INTEGER PRIMARY KEY AUTOINCREMENT,
    identity_id  TEXT NOT NULL REFERENCES identities(identity_id),
    address      TEXT NOT NULL,
    country      TEXT,
    isp          TEXT,
    is_vpn       INTEGER NOT NULL DEFAULT 0,
    is_proxy     INTEGER NOT NULL DEFAULT 0,
    geo_payload  TEXT,
    first_used   TEXT NOT NULL,
    last_used    TEXT NOT NULL,
    use_count    INTEGER NOT NULL DEFAULT 1,
    UNIQUE(identity_id, address)
);

-- 프로토콜 제재 ID 교체 기록 (append-only)
CREATE TABLE IF NOT EXISTS protocol_id_changes (
    id           INTEGER PRIMARY KEY AUTOINCREMENT,
    identity_id  TEXT NOT NULL REFERENCES identities(identity_id),
    old_id       TEXT NOT NULL,
    new_id       TEXT NOT NULL,
    changed_at   TEXT NOT NULL
);

-- 접속 이벤트 감사 로그 (append-only)
CREATE TABLE IF NOT EXISTS connection_events (
    id             INTEGER PRIMARY KEY AUTOINCREMENT,
    identity_id    TEXT NOT NULL REFERENCES identities(identity_id),
    event_type     TEXT NOT NULL,
    source_server  TEXT,
    timestamp      TEXT NOT NULL,
    name_used      TEXT,
    address_used   TEXT
);

-- 변화 감지 알림 (append-only)
CREATE TABLE IF NOT EXISTS alerts (
    id            INTEGER PRIMARY KEY AUTOINCREMENT,
    identity_id   TEXT NOT NULL REFERENCES identities(identity_id),
    alert_type    TEXT NOT NULL,
    message       TEXT NOT NULL,
    old_value     TEXT,
    new_value     TEXT,
    created_at    TEXT NOT NULL,
    acknowledged  INTEGER NOT NULL DEFAULT 0
);

-- 조회용 인덱스
CREATE INDEX IF NOT EXISTS idx_identities_name     ON identities(current_name);
CREATE INDEX IF NOT EXISTS idx_identities_address  ON identities(current_address);
CREATE INDEX IF NOT EXISTS idx_identities_ban_id   ON identities(protocol_ban_id);
CREATE INDEX IF NOT EXISTS idx_name_uses_identity  ON name_uses(identity_id);
CREATE INDEX IF NOT EXISTS idx_name_uses_name      ON name_uses(name);
CREATE INDEX IF NOT EXISTS idx_address_uses_identity ON address_uses(identity_id);
CREATE INDEX IF NOT EXISTS idx_address_uses_address  ON address_uses(address);
CREATE INDEX IF NOT EXISTS idx_alerts_identity     ON alerts(identity_id);
CREATE INDEX IF NOT EXISTS idx_alerts_unack        ON alerts(acknowledged);
CREATE INDEX IF NOT EXISTS idx_events_identity     ON connection_events(identity_id);
"#;

#[cfg(test)]
mod tests {
    use super::*;
    use rusqlite::Connection;

    #[test]
    fn schema_is_valid_sql() {
        let conn = Connection::open_in_memory().unwrap();
        conn.execute_batch(STORE_SCHEMA).unwrap();
    }

    #[test]
    fn schema_is_idempotent() {
        let conn = Connection::open_in_memory().unwrap();
        conn.execute_batch(STORE_SCHEMA).unwrap();
        conn.execute_batch(STORE_SCHEMA).unwrap();
    }

    #[test]
    fn name_uses_unique_per_identity_and_name() {
        let conn = Connection::open_in_memory().unwrap();
        conn.execute_batch(STORE_SCHEMA).unwrap();
        conn.execute(
            "INSERT INTO identities (identity_id, current_name, first_seen, last_seen)
             VALUES ('p1', 'Alice', '2026-01-01T00:00:00Z', '2026-01-01T00:00:00Z')",
            [],
        )
        .unwrap();
        conn.execute(
            "INSERT INTO name_uses (identity_id, name, first_used, last_used)
             VALUES ('p1', 'Alice', '2026-01-01T00:00:00Z', '2026-01-01T00:00:00Z')",
            [],
        )
        .unwrap();
        let dup = conn.execute(
            "INSERT INTO name_uses (identity_id, name, first_used, last_used)
             VALUES ('p1', 'Alice', '2026-01-01T00:00:00Z', '2026-01-01T00:00:00Z')",
            [],
        );
        assert!(dup.is_err());
    }
}
