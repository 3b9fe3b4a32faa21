use std::fs;

use criterion::{criterion_group, criterion_main, Criterion};

use fwextract::analysis::rootfs::find_unix_root;

fn bench_find_unix_root(c: &mut Criterion) {
    let dir = tempfile::tempdir().unwrap();
    for sub in ["bin", "etc", "lib", "usr", "www", "data"] {
        fs::create_dir_all(dir.path().join(sub)).unwrap();
    }
    for sub in ["www/css", "www/js", "data/db"] {
        fs::create_dir_all(dir.path().join(sub)).unwrap();
    }
    for file in ["version", "www/index.html"] {
        fs::write(dir.path().join(file), "x").unwrap();
    }

    c.bench_function("find_unix_root", |b| {
        b.iter(|| find_unix_root(dir.path(), true))
    });
}

criterion_group!(benches, bench_find_unix_root);
criterion_main!(benches);
