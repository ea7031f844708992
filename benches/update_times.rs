use chrono::DateTime;
use criterion::{black_box, criterion_group, criterion_main, Criterion};
use mdtoc::git_utils::{HistoryResolver, RepoCache};
use std::collections::HashSet;
use std::path::Path;
use std::process::Command;

fn bench_update_times(c: &mut Criterion) {
    let base = Path::new(".");
    let mut resolver = HistoryResolver::new(RepoCache::new(), HashSet::new());

    // Warm the repository cache before measuring.
    let warm = resolver.resolve_update_time("Cargo.toml", base);
    assert!(warm >= 0);

    c.bench_function("resolver_update_time", |b| {
        b.iter(|| resolver.resolve_update_time(black_box("Cargo.toml"), black_box(base)))
    });

    c.bench_function("cli_update_time", |b| {
        b.iter(|| cli_update_time(black_box(base), black_box("Cargo.toml")))
    });
}

fn cli_update_time(git_root: &Path, path: &str) -> Option<i64> {
    let output = Command::new("git")
        .arg("-C")
        .arg(git_root)
        .arg("log")
        .arg("--format=%cI")
        .arg("-1")
        .arg("--")
        .arg(path)
        .output()
        .ok()?;

    if !output.status.success() {
        return None;
    }

    let timestamp = String::from_utf8_lossy(&output.stdout)
        .lines()
        .next()?
        .trim()
        .to_string();

    if timestamp.is_empty() {
        return None;
    }

    DateTime::parse_from_rfc3339(&timestamp)
        .ok()
        .map(|dt| dt.timestamp())
}

criterion_group!(benches, bench_update_times);
criterion_main!(benches);
