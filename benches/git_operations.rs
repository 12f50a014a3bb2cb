use criterion::{BenchmarkId, Criterion, black_box, criterion_group, criterion_main};
use gitpulse::git::parser::{parse_branch_list, parse_log, parse_status_porcelain_v1};
use gitpulse::graph::layout;
use std::path::Path;

// Sample git outputs for realistic benchmarking
const SMALL_STATUS: &str = "M  README.md\n M src/main.rs\n?? untracked.txt\n";

const MEDIUM_STATUS: &str = "M  README.md
 M src/main.rs
MM src/lib.rs
A  src/error.rs
 D old_file.rs
?? untracked1.txt
?? untracked2.txt
?? untracked3.txt
R  src/old.rs -> src/new.rs
M  Cargo.toml
 M Cargo.lock
UU docs/readme.md
 M tests/test.rs
A  benches/bench.rs
?? \"caf\\303\\251.txt\"
";

fn generate_large_status(num_files: usize) -> String {
    let mut output = String::new();
    for i in 0..num_files {
        output.push_str(&format!(" M src/module_{}/file_{}.rs\n", i % 10, i));
    }
    output
}

/// Linear history with a merge every `merge_every` commits
fn generate_log(num_commits: usize, merge_every: usize) -> String {
    let mut output = String::new();
    for i in 0..num_commits {
        let parent = format!("{:040x}", i + 1);
        let parents = if i % merge_every == 0 && i + 2 < num_commits {
            format!("{} {:040x}", parent, i + 2)
        } else if i + 1 < num_commits {
            parent
        } else {
            String::new()
        };
        output.push_str(&format!(
            "{:040x}\x1f{}\x1fTest User\x1f2024-01-01T12:00:00+00:00\x1fCommit message {}\x1f\n",
            i, parents, i
        ));
    }
    output
}

const BRANCH_LIST: &str = "*\0refs/heads/main
 \0refs/heads/feature-x
 \0refs/heads/bugfix-123
 \0refs/heads/experiment
 \0refs/remotes/origin/HEAD
 \0refs/remotes/origin/main
 \0refs/remotes/origin/release-v1.0
";

fn bench_parse_status(c: &mut Criterion) {
    let mut group = c.benchmark_group("parse_status_porcelain_v1");
    let root = Path::new("/home/user/project");

    group.bench_with_input(BenchmarkId::new("small", "3 files"), &SMALL_STATUS, |b, input| {
        b.iter(|| parse_status_porcelain_v1(root, black_box(input)))
    });

    group.bench_with_input(BenchmarkId::new("medium", "15 files"), &MEDIUM_STATUS, |b, input| {
        b.iter(|| parse_status_porcelain_v1(root, black_box(input)))
    });

    for count in [100, 1000] {
        let status = generate_large_status(count);
        group.bench_with_input(
            BenchmarkId::new("large", format!("{} files", count)),
            &status,
            |b, input| b.iter(|| parse_status_porcelain_v1(root, black_box(input))),
        );
    }

    group.finish();
}

fn bench_parse_log(c: &mut Criterion) {
    let mut group = c.benchmark_group("parse_log");

    for count in [50, 500] {
        let log = generate_log(count, 7);
        group.bench_with_input(
            BenchmarkId::new("commits", count),
            &log,
            |b, input| b.iter(|| parse_log(black_box(input))),
        );
    }

    group.finish();
}

fn bench_parse_branches(c: &mut Criterion) {
    c.bench_function("parse_branch_list", |b| {
        b.iter(|| parse_branch_list(black_box(BRANCH_LIST)))
    });
}

fn bench_graph_layout(c: &mut Criterion) {
    let mut group = c.benchmark_group("graph_layout");

    for count in [50, 500, 5000] {
        let commits = parse_log(&generate_log(count, 5));
        group.bench_with_input(
            BenchmarkId::new("commits", count),
            &commits,
            |b, input| b.iter(|| layout(black_box(input))),
        );
    }

    group.finish();
}

criterion_group!(
    benches,
    bench_parse_status,
    bench_parse_log,
    bench_parse_branches,
    bench_graph_layout
);
criterion_main!(benches);
