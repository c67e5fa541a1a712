//! 라인 파서 벤치마크
//!
//! 다이얼렉트별 매칭 처리량과 비매칭 라인의 거부 비용을 측정합니다.

use criterion::{Criterion, Throughput, black_box, criterion_group, criterion_main};

use gatewatch_player_pipeline::parser::LineParser;

/// 인증 라인 (주소 + 제재 ID 포함)
const AUTHENTICATED_FULL: &str =
    "Player id=1 TestPlayer (12345678) has been authenticated. IP: 192.168.1.1:2302 BE GUID: be12345678";

/// 인증 라인 (이름/ID만)
const AUTHENTICATED_BARE: &str = "Player Alice (87654321) has been authenticated.";

/// 관리 도구 join 라인
const ADMIN_JOIN: &str = "21:45:51 DEFAULT : Player joined, id: 131, player: 0x7f3a, \
                          name: Heck Let Loose, identityId: a1b2c3d4-e5f6-7890-abcd-ef1234567890";

/// 프로토콜 접속 공지
const PROTO_CONNECT: &str = "BattlEye Server: 'Player #283 Crowbar (93.184.216.34:2304) connected'";

/// 어떤 다이얼렉트에도 매칭되지 않는 라인
const NO_MATCH: &str = "21:45:51 NETWORK : Connection stats: in 1024 out 2048 loss 0.1%";

fn bench_dialects(c: &mut Criterion) {
    let parser = LineParser::new().expect("parser builds");

    let mut group = c.benchmark_group("line_parser");
    group.throughput(Throughput::Elements(1));

    group.bench_function("authenticated_full", |b| {
        b.iter(|| parser.parse(black_box(AUTHENTICATED_FULL), "bench"))
    });

    group.bench_function("authenticated_bare", |b| {
        b.iter(|| parser.parse(black_box(AUTHENTICATED_BARE), "bench"))
    });

    group.bench_function("admin_join", |b| {
        b.iter(|| parser.parse(black_box(ADMIN_JOIN), "bench"))
    });

    group.bench_function("proto_connect_match_only", |b| {
        b.iter(|| parser.match_line(black_box(PROTO_CONNECT)))
    });

    group.bench_function("no_match_rejection", |b| {
        b.iter(|| parser.parse(black_box(NO_MATCH), "bench"))
    });

    // 1000건 반복 처리량
    group.throughput(Throughput::Elements(1000));
    group.bench_function("throughput_1000_mixed", |b| {
        b.iter(|| {
            for _ in 0..250 {
                parser.parse(black_box(AUTHENTICATED_FULL), "bench");
                parser.parse(black_box(ADMIN_JOIN), "bench");
                parser.parse(black_box(PROTO_CONNECT), "bench");
                parser.parse(black_box(NO_MATCH), "bench");
            }
        })
    });

    group.finish();
}

criterion_group!(benches, bench_dialects);
criterion_main!(benches);
