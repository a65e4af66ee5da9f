use criterion::{Criterion, Throughput, criterion_group, criterion_main};
use slirc_bot::isupport::NetworkCapabilities;
use slirc_bot::{EventKind, classify};
use std::hint::black_box;

// Classification runs on every inbound line, so it sits on the hot path of
// every worker.

fn classify_benchmark(c: &mut Criterion) {
    let mut caps = NetworkCapabilities::new();
    caps.apply_isupport_line(&[
        "irc.test",
        "005",
        "bot",
        "PREFIX=(qaohv)~&@%+",
        "CHANTYPES=#&",
        "CHANMODES=beI,k,l,imnpst",
        ":are supported by this server",
    ]);

    let lines = [
        ("privmsg", ":alice!a@alice.host PRIVMSG #rust :!seen bob please"),
        ("ctcp", ":alice!a@alice.host PRIVMSG bot :\x01VERSION\x01"),
        ("mode", ":op!o@op.host MODE #rust +ov-v alice bob carol"),
        ("who", ":irc.test 352 bot #rust ~alice alice.host irc.test alice H@ :0 Alice"),
        ("ipv6", ":alice!a@2001:db8::1 PRIVMSG #rust :hello: world"),
    ];

    let mut group = c.benchmark_group("classify");
    for (name, line) in lines {
        group.throughput(Throughput::Bytes(line.len() as u64));
        group.bench_function(name, |b| {
            b.iter(|| {
                let event = classify(black_box(line), &caps);
                assert_ne!(event.kind, EventKind::ServerMessage);
                event
            })
        });
    }
    group.finish();
}

criterion_group!(benches, classify_benchmark);
criterion_main!(benches);
