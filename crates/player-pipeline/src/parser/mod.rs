//! 로그 파싱 모듈 — 다이얼렉트 매칭과 신원 관측 변환
//!
//! [`LineParser`]는 원시 로그 한 줄을 고정된 순서의 다이얼렉트 매처에 시도하고,
//! 안정 신원 ID가 추출된 경우에만 [`Observation`]을 생성합니다.
//!
//! # 지원 다이얼렉트
//! 1. 관리 도구 join 라인 (세션 ID + 이름 + 플랫폼 신원 ID)
//! 2. 프로토콜 계층 인증 라인 (이름 + 신원 ID + 선택적 주소/제재 ID)
//! 3. 프로토콜 계층 접속/이탈 공지 (세션 번호 + 이름 + 주소)
//! 4. 프로토콜 계층 제재 ID 공지 (세션 번호 + 이름 + 제재 ID)
//!
//! 다이얼렉트 3/4는 안정 신원 ID를 담지 않으므로 매칭은 되지만
//! `parse`에서는 `None`이 됩니다 — 표시 이름은 위조 가능하므로
//! 이름만으로 신원을 만들지 않습니다.
//!
//! # 사용 예시
//! ```ignore
//! use gatewatch_player_pipeline::parser::LineParser;
//!
//! let parser = LineParser::new()?;
//! let obs = parser.parse(
//!     "Player id=1 Alice (12345678) has been authenticated. IP: 1.2.3.4:2302",
//!     "ttt1",
//! );
//! assert!(obs.is_some());
//! ```

pub mod dialect;

pub use dialect::{DialectSet, LineEvent, strip_port};

use gatewatch_core::types::{EventKind, Observation};

use crate::error::PlayerPipelineError;

/// 라인 파서 — 다이얼렉트 매칭 + 신원 관측 변환
///
/// 부작용과 I/O가 없으며, 인식되지 않는 입력에 대해 절대 에러를 내지 않습니다.
pub struct LineParser {
    /// 다이얼렉트 매처 세트 (생성 시 컴파일됨)
    dialects: DialectSet,
}

impl LineParser {
    /// 새 파서를 생성합니다. 다이얼렉트 정규식을 컴파일합니다.
    pub fn new() -> Result<Self, PlayerPipelineError> {
        Ok(Self {
            dialects: DialectSet::new()?,
        })
    }

    /// 라인을 다이얼렉트에 매칭하여 원시 매칭 결과를 반환합니다.
    ///
    /// 안정 신원 ID가 없는 다이얼렉트(접속/이탈 공지, 제재 ID 공지)도
    /// 여기서는 매칭 결과를 그대로 반환합니다.
    pub fn match_line(&self, line: &str) -> Option<LineEvent> {
        self.dialects.match_line(line)
    }

    /// 라인을 파싱하여 신원 관측을 반환합니다.
    ///
    /// 안정 신원 ID를 담은 다이얼렉트(1, 2)만 [`Observation`]이 됩니다.
    /// 그 외의 매칭과 비매칭은 모두 `None`입니다.
    pub fn parse(&self, line: &str, source: &str) -> Option<Observation> {
        match self.match_line(line)? {
            LineEvent::AdminJoin {
                name, identity_id, ..
            } => Some(Observation {
                identity_id,
                name,
                address: None,
                protocol_ban_id: None,
                kind: EventKind::Connect,
                source: source.to_owned(),
            }),
            LineEvent::Authenticated {
                name,
                identity_id,
                address,
                protocol_ban_id,
            } => Some(Observation {
                identity_id,
                name,
                address,
                protocol_ban_id,
                kind: EventKind::Auth,
                source: source.to_owned(),
            }),
            // 안정 신원 ID가 없는 다이얼렉트는 신원으로 해석하지 않음
            LineEvent::Connected { .. }
            | LineEvent::Disconnected { .. }
            | LineEvent::BanId { .. } => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parser() -> LineParser {
        LineParser::new().expect("parser builds")
    }

    #[test]
    fn parse_authenticated_line_yields_observation() {
        let obs = parser()
            .parse(
                "Player id=1 TestPlayer (12345678) has been authenticated. \
                 IP: 192.168.1.1:2302 BE GUID: be12345678",
                "ttt1",
            )
            .expect("observation");
        assert_eq!(obs.identity_id, "12345678");
        assert_eq!(obs.name, "TestPlayer");
        assert_eq!(obs.address.as_deref(), Some("192.168.1.1"));
        assert_eq!(obs.protocol_ban_id.as_deref(), Some("be12345678"));
        assert_eq!(obs.kind, EventKind::Auth);
        assert_eq!(obs.source, "ttt1");
    }

    #[test]
    fn parse_admin_join_yields_connect_observation() {
        let obs = parser()
            .parse(
                "Player joined, id: 7, player: 0x1f, name: Alice, \
                 identityId: a1b2c3d4-0000-0000-0000-000000000000",
                "main",
            )
            .expect("observation");
        assert_eq!(obs.identity_id, "a1b2c3d4-0000-0000-0000-000000000000");
        assert_eq!(obs.name, "Alice");
        assert_eq!(obs.address, None);
        assert_eq!(obs.kind, EventKind::Connect);
    }

    #[test]
    fn parse_proto_connect_yields_none_without_stable_id() {
        let p = parser();
        let line = "BattlEye Server: 'Player #283 Crowbar™ (93.184.216.34:2304) connected'";
        // 매칭은 되지만
        assert!(p.match_line(line).is_some());
        // 신원 관측은 아님
        assert!(p.parse(line, "ttt1").is_none());
    }

    #[test]
    fn parse_proto_ban_id_yields_none_without_stable_id() {
        let p = parser();
        let line = "BattlEye Server: 'Player #283 Crowbar™ - BE GUID: 1a2b3c4d5e6f'";
        assert!(p.match_line(line).is_some());
        assert!(p.parse(line, "ttt1").is_none());
    }

    #[test]
    fn parse_unrecognized_line_yields_none() {
        let p = parser();
        assert!(p.parse("Server started on port 2001", "ttt1").is_none());
        assert!(p.parse("", "ttt1").is_none());
    }

    // Property-based tests using proptest
    #[cfg(test)]
    mod proptests {
        use super::*;
        use proptest::prelude::*;

        proptest! {
            #[test]
            fn parse_arbitrary_input_does_not_panic(line in "\\PC{0,300}") {
                let p = parser();
                let _ = p.parse(&line, "fuzz");
                // Should never panic
            }

            #[test]
            fn parse_arbitrary_bytes_lossy_does_not_panic(bytes in prop::collection::vec(any::<u8>(), 0..500)) {
                let p = parser();
                let line = String::from_utf8_lossy(&bytes);
                let _ = p.parse(&line, "fuzz");
                // Should never panic
            }

            #[test]
            fn authenticated_dialect_roundtrips_name(name in "[A-Za-z0-9_][A-Za-z0-9_ ]{0,29}") {
                let p = parser();
                let line = format!("Player id=1 {} (12345678) has been authenticated.", name.trim());
                if let Some(obs) = p.parse(&line, "ttt1") {
                    prop_assert_eq!(obs.name, name.trim());
                    prop_assert_eq!(obs.identity_id, "12345678");
                }
            }
        }
    }
}
