//! 제재 집행 연동 — 외부 집행 성공 후에만 저장소 플래그 갱신
//!
//! 제재 자체는 외부 기능([`BanEnforcer`], 예: RCON)이 수행합니다.
//! 이 모듈은 신원의 프로토콜 제재 ID를 찾아 집행을 요청하고,
//! 성공한 경우에만 저장소에 `banned = true`를 기록합니다.
//! 집행이 실패하면 저장소 상태는 바뀌지 않습니다 (부분 상태 없음).

use gatewatch_core::pipeline::BanEnforcer;

use crate::error::PlayerPipelineError;
use crate::store::PlayerStore;

/// 신원을 제재합니다.
///
/// 1. 신원의 프로토콜 제재 ID를 조회 (없으면 에러)
/// 2. 외부 집행 기능 호출
/// 3. 성공 시에만 저장소에 제재 플래그와 사유 기록
pub async fn ban_identity<E: BanEnforcer>(
    store: &PlayerStore,
    enforcer: &E,
    identity_id: &str,
    duration_minutes: u32,
    reason: &str,
) -> Result<(), PlayerPipelineError> {
    let identity = store
        .identity(identity_id)?
        .ok_or_else(|| PlayerPipelineError::Enforce(format!("unknown identity: {identity_id}")))?;

    let protocol_ban_id =
        identity
            .protocol_ban_id
            .ok_or_else(|| PlayerPipelineError::NoProtocolId {
                identity_id: identity_id.to_owned(),
            })?;

    enforcer
        .ban(&protocol_ban_id, duration_minutes, reason)
        .await
        .map_err(|e| PlayerPipelineError::Enforce(e.to_string()))?;

    store.set_banned(identity_id, reason)?;
    tracing::info!(
        identity = %identity_id,
        protocol_ban_id = %protocol_ban_id,
        duration_minutes,
        "identity banned"
    );
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use gatewatch_core::error::{EnforceError, GatewatchError};
    use gatewatch_core::types::{EventKind, Observation};
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct MockEnforcer {
        calls: AtomicUsize,
        succeed: bool,
    }

    impl MockEnforcer {
        fn new(succeed: bool) -> Self {
            Self {
                calls: AtomicUsize::new(0),
                succeed,
            }
        }
    }

    impl BanEnforcer for MockEnforcer {
        async fn ban(
            &self,
            _protocol_ban_id: &str,
            _duration_minutes: u32,
            _reason: &str,
        ) -> Result<(), GatewatchError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            if self.succeed {
                Ok(())
            } else {
                Err(GatewatchError::Enforce(EnforceError::Failed {
                    reason: "rcon timeout".to_owned(),
                }))
            }
        }
    }

    fn seeded_store(protocol_ban_id: Option<&str>) -> PlayerStore {
        let store = PlayerStore::open_in_memory().unwrap();
        let obs = Observation {
            identity_id: "P1".to_owned(),
            name: "Alice".to_owned(),
            address: None,
            protocol_ban_id: protocol_ban_id.map(str::to_owned),
            kind: EventKind::Auth,
            source: "ttt1".to_owned(),
        };
        store.update(&obs, None).unwrap();
        store
    }

    #[tokio::test]
    async fn ban_sets_flag_after_successful_enforcement() {
        let store = seeded_store(Some("be-123"));
        let enforcer = MockEnforcer::new(true);

        ban_identity(&store, &enforcer, "P1", 60, "cheating")
            .await
            .unwrap();

        assert_eq!(enforcer.calls.load(Ordering::SeqCst), 1);
        let identity = store.identity("P1").unwrap().unwrap();
        assert!(identity.banned);
        assert_eq!(identity.ban_reason.as_deref(), Some("cheating"));
    }

    #[tokio::test]
    async fn failed_enforcement_leaves_flag_unchanged() {
        let store = seeded_store(Some("be-123"));
        let enforcer = MockEnforcer::new(false);

        let result = ban_identity(&store, &enforcer, "P1", 60, "cheating").await;
        assert!(matches!(result, Err(PlayerPipelineError::Enforce(_))));

        let identity = store.identity("P1").unwrap().unwrap();
        assert!(!identity.banned);
        assert!(identity.ban_reason.is_none());
    }

    #[tokio::test]
    async fn missing_protocol_id_is_an_error_without_enforcement_call() {
        let store = seeded_store(None);
        let enforcer = MockEnforcer::new(true);

        let result = ban_identity(&store, &enforcer, "P1", 60, "cheating").await;
        assert!(matches!(
            result,
            Err(PlayerPipelineError::NoProtocolId { .. })
        ));
        assert_eq!(enforcer.calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn unknown_identity_is_an_error() {
        let store = PlayerStore::open_in_memory().unwrap();
        let enforcer = MockEnforcer::new(true);

        let result = ban_identity(&store, &enforcer, "ghost", 60, "x").await;
        assert!(matches!(result, Err(PlayerPipelineError::Enforce(_))));
    }
}
