use goalign_scan::{
    Eligibility, EligibilityFilter, RewriteOptions, ScanError, TreeScanner, task_dirs,
};
use std::fs;
use std::path::Path;
use tempfile::TempDir;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

fn write(root: &Path, rel: &str, contents: &str) {
    let path = root.join(rel);
    fs::create_dir_all(path.parent().unwrap()).unwrap();
    fs::write(path, contents).unwrap();
}

#[test]
fn test_reflect_disqualifies_regardless_of_flags() {
    let temp = TempDir::new().unwrap();
    write(temp.path(), "codec/codec.go", "package codec\n\nimport (\n\t\"fmt\"\n\t\"reflect\"\n)\n");

    for generated_files in [false, true] {
        for test_files in [false, true] {
            let scanner = TreeScanner::new(RewriteOptions {
                generated_files,
                test_files,
            });
            let (tasks, summary) = scanner.plan(temp.path()).unwrap();
            assert!(tasks.is_empty());
            assert_eq!(summary.reflect_skipped, 1);
        }
    }
}

#[test]
fn test_directories_without_sources_emit_nothing() {
    let temp = TempDir::new().unwrap();
    write(temp.path(), "assets/logo.svg", "<svg/>");
    write(temp.path(), "scripts/build.sh", "#!/bin/sh\n");
    fs::create_dir_all(temp.path().join("empty")).unwrap();

    let scanner = TreeScanner::new(RewriteOptions::default());
    let (tasks, summary) = scanner.plan(temp.path()).unwrap();

    assert!(tasks.is_empty());
    // root, assets, empty, scripts
    assert_eq!(summary.without_sources, 4);
    assert_eq!(summary.dirs_visited, 4);
}

#[test]
fn test_nested_hidden_directories_are_pruned() {
    let temp = TempDir::new().unwrap();
    write(temp.path(), "pkg/a.go", "package pkg\n");
    write(temp.path(), "pkg/.cache/deep/b.go", "package deep\n");
    write(temp.path(), ".idea/c.go", "package idea\n");
    // Hidden files are not directories and do not prune anything.
    write(temp.path(), "pkg/.keep", "");

    let scanner = TreeScanner::new(RewriteOptions::default());
    let (tasks, summary) = scanner.plan(temp.path()).unwrap();

    assert_eq!(task_dirs(&tasks), vec![temp.path().join("pkg")]);
    assert_eq!(summary.hidden_skipped, 2);
}

#[test]
fn test_vendored_packages_are_scanned() {
    let temp = TempDir::new().unwrap();
    write(temp.path(), "go.mod", "module example.com/app\n");
    write(temp.path(), "vendor/modules.txt", "# example.com/dep v1.0.0\n");
    write(temp.path(), "vendor/example.com/dep/dep.go", "package dep\n");

    let scanner = TreeScanner::new(RewriteOptions::default());
    let (tasks, _) = scanner.plan(temp.path()).unwrap();

    assert_eq!(
        task_dirs(&tasks),
        vec![temp.path().join("vendor/example.com/dep")]
    );
}

#[tokio::test]
async fn test_scan_feeds_async_receiver() {
    let temp = TempDir::new().unwrap();
    for name in ["a", "b", "c"] {
        write(temp.path(), &format!("{name}/{name}.go"), &format!("package {name}\n"));
    }

    // A capacity of one forces the scanner to wait on the consumer.
    let (tx, mut rx) = mpsc::channel(1);
    let root = temp.path().to_path_buf();
    let producer = tokio::task::spawn_blocking(move || {
        TreeScanner::new(RewriteOptions::default()).scan(&root, &tx, &CancellationToken::new())
    });

    let mut received = Vec::new();
    while let Some(task) = rx.recv().await {
        received.push(task.dir);
    }
    received.sort();

    let summary = producer.await.unwrap().unwrap();
    assert_eq!(summary.eligible, 3);
    assert_eq!(summary.tasks_dispatched, 3);
    assert_eq!(
        received,
        vec![
            temp.path().join("a"),
            temp.path().join("b"),
            temp.path().join("c"),
        ]
    );
}

#[test]
fn test_parse_error_names_the_file() {
    let temp = TempDir::new().unwrap();
    write(temp.path(), "pkg/ok.go", "package pkg\n");
    write(temp.path(), "pkg/bad.go", "package pkg\n\nimport (\n\t\"fmt\"\n)\nimport 42\n");

    let filter = EligibilityFilter::new();
    match filter.classify(&temp.path().join("pkg")) {
        Err(ScanError::Parse { path, line, .. }) => {
            assert_eq!(path, temp.path().join("pkg/bad.go"));
            assert_eq!(line, 6);
        }
        other => panic!("expected parse error, got {other:?}"),
    }
}

#[test]
fn test_inspect_lists_sources() {
    let temp = TempDir::new().unwrap();
    write(temp.path(), "pkg/b.go", "package pkg\n");
    write(temp.path(), "pkg/a_test.go", "package pkg\n");
    write(temp.path(), "pkg/notes.txt", "");

    let package = EligibilityFilter::new()
        .inspect(&temp.path().join("pkg"))
        .unwrap();

    assert_eq!(package.eligibility, Eligibility::Eligible);
    assert_eq!(
        package.sources,
        vec![
            temp.path().join("pkg/a_test.go"),
            temp.path().join("pkg/b.go"),
        ]
    );
}
