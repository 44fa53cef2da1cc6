use std::sync::Arc;
use std::time::Instant;

use criterion::{criterion_group, criterion_main, Criterion, Throughput};

use graphview::{Address, InMemoryStore, MemoryRender, View};

const NODES: u64 = 256;

fn make_view() -> (Arc<InMemoryStore>, View) {
    let store = Arc::new(InMemoryStore::new());

    // 256 records, each with a name and four comments.
    for i in 0..NODES {
        let ea = Address::new(0x1000 + i * 0x10);
        store.set(ea, "name", format!("sub_{i:x}")).unwrap();
        for j in 0..4u64 {
            store
                .set_content(ea, Address::new(ea.get() + j * 4), "comment", "seed")
                .unwrap();
        }
    }

    let render = Arc::new(MemoryRender::new());
    let mut view = View::new(store.clone(), render, ["name", "comment"]).unwrap();
    view.add((0..NODES).map(|i| Address::new(0x1000 + i * 0x10))).unwrap();
    view.sync().unwrap();
    (store, view)
}

fn bench_sync_idle(c: &mut Criterion) {
    let mut group = c.benchmark_group("sync");
    group.throughput(Throughput::Elements(NODES));

    group.bench_function("idle_256_nodes", |b| {
        b.iter_custom(|iters| {
            let (_store, mut view) = make_view();
            let start = Instant::now();
            for _ in 0..iters {
                let _ = view.sync().unwrap();
            }
            start.elapsed()
        });
    });

    group.finish();
}

fn bench_sync_one_change(c: &mut Criterion) {
    c.bench_function("sync/one_change_256_nodes", |b| {
        b.iter_custom(|iters| {
            // Fresh state per sample so accumulated stamps do not leak between samples.
            let (store, mut view) = make_view();
            let ea = Address::new(0x1000);
            let mut elapsed = std::time::Duration::ZERO;
            for n in 0..iters {
                store.set(ea, "name", format!("rename_{n}")).unwrap();
                let start = Instant::now();
                let _ = view.sync().unwrap();
                elapsed += start.elapsed();
            }
            elapsed
        });
    });
}

fn bench_full_resync(c: &mut Criterion) {
    c.bench_function("sync/dirty_256_nodes", |b| {
        b.iter_custom(|iters| {
            let (_store, mut view) = make_view();
            let start = Instant::now();
            for _ in 0..iters {
                view.dirty();
                let _ = view.sync().unwrap();
            }
            start.elapsed()
        });
    });
}

criterion_group!(benches, bench_sync_idle, bench_sync_one_change, bench_full_resync);
criterion_main!(benches);
