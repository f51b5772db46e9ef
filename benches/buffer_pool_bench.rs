use std::sync::Arc;

use criterion::{criterion_group, criterion_main, Criterion};
use tempfile::NamedTempFile;

use ferrodb::storage::buffer::ParallelBufferPool;
use ferrodb::storage::disk::DiskManager;

fn setup_pool(num_instances: usize, pool_size: usize) -> (Arc<ParallelBufferPool>, NamedTempFile) {
    let file = NamedTempFile::new().expect("temp file");
    let disk_manager = Arc::new(DiskManager::new(file.path()).expect("disk manager"));
    (
        Arc::new(ParallelBufferPool::new(num_instances, pool_size, disk_manager)),
        file,
    )
}

fn bench_new_page(c: &mut Criterion) {
    let (pool, _file) = setup_pool(4, 256);
    c.bench_function("new_page_unpin", |b| {
        b.iter(|| {
            let (pid, _page) = pool.new_page().expect("new page");
            pool.unpin_page(pid, false).expect("unpin");
        })
    });
}

fn bench_fetch_hit(c: &mut Criterion) {
    let (pool, _file) = setup_pool(4, 256);
    let mut pids = Vec::new();
    for _ in 0..64 {
        let (pid, _page) = pool.new_page().expect("new page");
        pool.unpin_page(pid, true).expect("unpin");
        pids.push(pid);
    }

    let mut cursor = 0usize;
    c.bench_function("fetch_page_resident", |b| {
        b.iter(|| {
            let pid = pids[cursor % pids.len()];
            cursor += 1;
            let _page = pool.fetch_page(pid).expect("fetch");
            pool.unpin_page(pid, false).expect("unpin");
        })
    });
}

fn bench_fetch_with_eviction(c: &mut Criterion) {
    // pool much smaller than the working set, so most fetches evict
    let (pool, _file) = setup_pool(1, 8);
    let mut pids = Vec::new();
    for _ in 0..64 {
        let (pid, _page) = pool.new_page().expect("new page");
        pool.unpin_page(pid, true).expect("unpin");
        pids.push(pid);
    }

    let mut cursor = 0usize;
    c.bench_function("fetch_page_evicting", |b| {
        b.iter(|| {
            let pid = pids[cursor % pids.len()];
            cursor += 1;
            let _page = pool.fetch_page(pid).expect("fetch");
            pool.unpin_page(pid, false).expect("unpin");
        })
    });
}

criterion_group!(
    benches,
    bench_new_page,
    bench_fetch_hit,
    bench_fetch_with_eviction
);
criterion_main!(benches);
