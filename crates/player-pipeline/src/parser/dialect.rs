//! 로그 다이얼렉트 매처 — 다이얼렉트별 정규식과 타입드 매칭 결과
//!
//! 각 다이얼렉트는 순수 함수로 동작하는 매처이며, 매칭 결과를
//! [`LineEvent`] 변형으로 반환합니다. 새 다이얼렉트는 매처를 추가하고
//! [`DialectSet::match_line`]의 시도 순서에 끼워 넣는 방식으로 확장합니다.
//!
//! 정규식 패턴은 실제 게임 서버(관리 도구 + 프로토콜 계층) 로그에서
//! 관측된 형식을 그대로 따릅니다.

use regex::Regex;

use crate::error::PlayerPipelineError;

/// 한 줄에서 추출된 다이얼렉트별 부분 관측
///
/// 다이얼렉트마다 담고 있는 필드가 다릅니다. 안정 신원 ID를 포함하는 것은
/// [`AdminJoin`](LineEvent::AdminJoin)과
/// [`Authenticated`](LineEvent::Authenticated)뿐입니다.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LineEvent {
    /// 관리 도구 join 라인: 세션 ID, 표시 이름, 플랫폼 신원 ID
    AdminJoin {
        /// 세션 ID
        session_id: u64,
        /// 표시 이름
        name: String,
        /// 플랫폼 신원 ID
        identity_id: String,
    },
    /// 프로토콜 계층 인증 라인: 이름, 신원 ID, 선택적 주소/제재 ID
    Authenticated {
        /// 표시 이름
        name: String,
        /// 플랫폼 신원 ID
        identity_id: String,
        /// 네트워크 주소 (포트 제거됨)
        address: Option<String>,
        /// 프로토콜 제재 ID
        protocol_ban_id: Option<String>,
    },
    /// 프로토콜 계층 접속 공지: 세션 번호, 이름, 주소
    Connected {
        /// 세션 번호
        session: u64,
        /// 표시 이름
        name: String,
        /// 네트워크 주소 (포트 제거됨)
        address: String,
    },
    /// 프로토콜 계층 이탈 공지: 세션 번호, 이름
    Disconnected {
        /// 세션 번호
        session: u64,
        /// 표시 이름
        name: String,
    },
    /// 프로토콜 계층 제재 ID 공지: 세션 번호, 이름, 제재 ID
    BanId {
        /// 세션 번호
        session: u64,
        /// 표시 이름
        name: String,
        /// 프로토콜 제재 ID
        protocol_ban_id: String,
    },
}

/// 다이얼렉트 매처 세트
///
/// 모든 정규식은 생성 시 한 번만 컴파일됩니다.
pub struct DialectSet {
    /// 관리 도구 join 라인
    admin_join: Regex,
    /// 인증 완료 라인
    authenticated: Regex,
    /// 인증 라인 안의 주소 (포트는 그룹 밖)
    address: Regex,
    /// 인증 라인 안의 제재 ID
    inline_ban_id: Regex,
    /// 프로토콜 접속 공지
    proto_connect: Regex,
    /// 프로토콜 이탈 공지
    proto_disconnect: Regex,
    /// 프로토콜 제재 ID 공지
    proto_ban_id: Regex,
}

impl DialectSet {
    /// 다이얼렉트 정규식을 컴파일합니다.
    pub fn new() -> Result<Self, PlayerPipelineError> {
        Ok(Self {
            admin_join: Regex::new(
                r"Player joined, id: (\d+),.*name: ([^,]+), identityId: ([0-9a-f-]+)",
            )?,
            authenticated: Regex::new(r"Player (?:id=(\d+) )?(.+?) \((\d+)\) has been authenticated\.")?,
            address: Regex::new(r"(\d{1,3}\.\d{1,3}\.\d{1,3}\.\d{1,3})(?::\d+)?")?,
            inline_ban_id: Regex::new(r"BE GUID: (\w+)")?,
            proto_connect: Regex::new(
                r"BattlEye Server: 'Player #(\d+) ([^(]+) \(([^)]+)\) connected'",
            )?,
            proto_disconnect: Regex::new(r"BattlEye Server: 'Player #(\d+) (\S+) disconnected'")?,
            proto_ban_id: Regex::new(
                r"BattlEye Server: 'Player #(\d+) ([^-]+) - BE GUID: ([0-9a-f]+)'",
            )?,
        })
    }

    /// 라인을 고정된 순서로 각 다이얼렉트에 시도하여 첫 매칭을 반환합니다.
    ///
    /// 어떤 다이얼렉트에도 매칭되지 않으면 `None`을 반환하며,
    /// 입력이 무엇이든 에러를 내지 않습니다.
    pub fn match_line(&self, line: &str) -> Option<LineEvent> {
        if let Some(event) = self.match_authenticated(line) {
            return Some(event);
        }
        if let Some(event) = self.match_admin_join(line) {
            return Some(event);
        }
        if let Some(event) = self.match_proto_ban_id(line) {
            return Some(event);
        }
        if let Some(event) = self.match_proto_connect(line) {
            return Some(event);
        }
        self.match_proto_disconnect(line)
    }

    /// 다이얼렉트 1: 관리 도구 join 라인
    fn match_admin_join(&self, line: &str) -> Option<LineEvent> {
        let caps = self.admin_join.captures(line)?;
        Some(LineEvent::AdminJoin {
            session_id: caps[1].parse().ok()?,
            name: caps[2].trim().to_owned(),
            identity_id: caps[3].to_owned(),
        })
    }

    /// 다이얼렉트 2: 프로토콜 계층 인증 라인
    ///
    /// 주소와 제재 ID는 같은 라인에 있을 때만 추출되는 선택 필드입니다.
    fn match_authenticated(&self, line: &str) -> Option<LineEvent> {
        let caps = self.authenticated.captures(line)?;
        let address = self
            .address
            .captures(line)
            .map(|addr_caps| addr_caps[1].to_owned());
        let protocol_ban_id = self
            .inline_ban_id
            .captures(line)
            .map(|id_caps| id_caps[1].to_owned());
        Some(LineEvent::Authenticated {
            name: caps[2].trim().to_owned(),
            identity_id: caps[3].to_owned(),
            address,
            protocol_ban_id,
        })
    }

    /// 다이얼렉트 3: 프로토콜 접속/이탈 공지 (접속)
    fn match_proto_connect(&self, line: &str) -> Option<LineEvent> {
        let caps = self.proto_connect.captures(line)?;
        Some(LineEvent::Connected {
            session: caps[1].parse().ok()?,
            name: caps[2].trim().to_owned(),
            address: strip_port(&caps[3]).to_owned(),
        })
    }

    /// 다이얼렉트 3: 프로토콜 접속/이탈 공지 (이탈)
    fn match_proto_disconnect(&self, line: &str) -> Option<LineEvent> {
        let caps = self.proto_disconnect.captures(line)?;
        Some(LineEvent::Disconnected {
            session: caps[1].parse().ok()?,
            name: caps[2].to_owned(),
        })
    }

    /// 다이얼렉트 4: 프로토콜 제재 ID 공지
    fn match_proto_ban_id(&self, line: &str) -> Option<LineEvent> {
        let caps = self.proto_ban_id.captures(line)?;
        Some(LineEvent::BanId {
            session: caps[1].parse().ok()?,
            name: caps[2].trim().to_owned(),
            protocol_ban_id: caps[3].to_owned(),
        })
    }
}

/// 주소 끝의 포트 세그먼트를 제거합니다.
///
/// 포트가 없으면 입력을 그대로 반환합니다.
pub fn strip_port(address: &str) -> &str {
    if let Some((host, port)) = address.rsplit_once(':')
        && !port.is_empty()
        && port.chars().all(|c| c.is_ascii_digit())
    {
        return host;
    }
    address
}
