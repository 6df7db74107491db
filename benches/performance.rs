use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};
use portgate::core::SessionStore;
use portgate::modes::MockStore;
use portgate::protocol::{inject_session_key, substitute, Statement, StatementRequest};
use portgate::utils::generate_token;
use serde_json::json;
use tokio::runtime::Runtime;

/// Session table throughput
fn bench_session_store(c: &mut Criterion) {
    let rt = Runtime::new().unwrap();

    let mut group = c.benchmark_group("session_store");

    for session_count in [10, 1000].iter() {
        group.bench_with_input(
            BenchmarkId::new("login", session_count),
            session_count,
            |b, &session_count| {
                b.to_async(&rt).iter(|| async move {
                    let store = SessionStore::new();
                    for _ in 0..session_count {
                        let token = generate_token();
                        store.get_or_create(&token).await;
                        black_box(store.login(&token, "ivan", "ivan").await.unwrap());
                    }
                });
            },
        );
    }

    let store = SessionStore::new();
    let token = generate_token();
    rt.block_on(store.login(&token, "ivan", "ivan")).unwrap();
    group.bench_function("lookup_logged_in", |b| {
        b.to_async(&rt).iter(|| async {
            black_box(store.get_or_create(&token).await);
        });
    });

    group.finish();
}

/// Request rewriting on the forwarding path
fn bench_protocol(c: &mut Criterion) {
    let mut group = c.benchmark_group("protocol");

    let body = br#"{"phone_number":"89999734509","operator_name":"Yota"}"#;
    group.bench_function("inject_session_key", |b| {
        b.iter(|| black_box(inject_session_key(body, 42).unwrap()));
    });

    let params = vec![json!("89999734509"), json!("Yota")];
    group.bench_function("substitute", |b| {
        b.iter(|| black_box(substitute(Statement::AddMnp.template(), &params)));
    });

    group.finish();
}

/// Mock store statement execution
fn bench_store(c: &mut Criterion) {
    let rt = Runtime::new().unwrap();
    let store = MockStore::new();
    rt.block_on(store.seed("89999734509", vec!["МТС".to_string(), "Yota".to_string()]));

    let mut group = c.benchmark_group("store");

    let read = StatementRequest::new(Statement::GetMnpHistory, vec![json!("89999734509")]).unwrap();
    group.bench_function("exec_read", |b| {
        b.to_async(&rt).iter(|| async {
            black_box(store.exec(&read).await.unwrap());
        });
    });

    let write = StatementRequest::new(Statement::AddMnp, vec![json!("79990000000"), json!("Yota")]).unwrap();
    group.bench_function("exec_write", |b| {
        b.to_async(&rt).iter(|| async {
            black_box(store.exec(&write).await.unwrap());
        });
    });

    group.finish();
}

criterion_group!(benches, bench_session_store, bench_protocol, bench_store);
criterion_main!(benches);
