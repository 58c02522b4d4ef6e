//! End-to-end load and reload behavior against real files.

use std::fs;
use std::path::PathBuf;
use std::sync::Arc;

use tempfile::TempDir;

use nexthop::{PolicyKind, RequestContext, SharedRegistry, StrategyFactory};

fn write(dir: &TempDir, name: &str, content: &str) -> PathBuf {
    let path = dir.path().join(name);
    fs::write(&path, content).unwrap();
    path
}

const INITIAL: &str = r#"
strategies:
  - strategy: primary
    policy: rr_strict
    groups:
      - hosts:
          - host: a.example.com
            port: 8080
          - host: b.example.com
            port: 8080
"#;

const UPDATED: &str = r#"
strategies:
  - strategy: primary
    policy: latched
    groups:
      - hosts:
          - host: a.example.com
            port: 8080
  - strategy: secondary
    policy: first_live
    groups:
      - hosts:
          - host: c.example.com
            port: 8080
"#;

#[test]
fn test_load_publish_reload() {
    let dir = TempDir::new().unwrap();
    let path = write(&dir, "strategies.yaml", INITIAL);

    let factory = StrategyFactory::new();
    let shared = SharedRegistry::new(factory.load(&path).unwrap());

    let snapshot = shared.current();
    assert_eq!(snapshot.len(), 1);
    let handle = snapshot.lookup("primary").unwrap();
    assert_eq!(handle.policy(), PolicyKind::RoundRobinStrict);

    // reload with changed content and publish
    fs::write(&path, UPDATED).unwrap();
    shared.publish(factory.load(&path).unwrap());

    let reloaded = shared.current();
    assert_eq!(reloaded.len(), 2);
    assert_eq!(
        reloaded.lookup("primary").unwrap().policy(),
        PolicyKind::Latched
    );
    assert_eq!(reloaded.lookup("secondary").unwrap().index(), 1);

    // the pre-reload handle still selects against its old host set
    let picked = handle.select(&RequestContext::default()).unwrap();
    assert_eq!(picked.name, "a.example.com");
    assert_eq!(picked.port, 8080);
}

#[test]
fn test_failed_reload_keeps_previous_registry() {
    let dir = TempDir::new().unwrap();
    let path = write(&dir, "strategies.yaml", INITIAL);

    let factory = StrategyFactory::new();
    let shared = SharedRegistry::new(factory.load(&path).unwrap());

    // a reload pulling in a missing include must fail without touching
    // the live registry
    let missing = dir.path().join("missing.yaml");
    fs::write(&path, format!("#include {}\n{INITIAL}", missing.display())).unwrap();

    let err = factory.load(&path).unwrap_err();
    assert!(err.is_fatal());

    let live = shared.current();
    assert!(live.lookup("primary").is_some());
    assert_eq!(live.len(), 1);
}

#[test]
fn test_include_composition_from_files() {
    let dir = TempDir::new().unwrap();
    let hosts = write(
        &dir,
        "hosts.yaml",
        r#"
hosts:
  - &p1
    host: p1.example.com
    port: 8080
  - &p2
    host: p2.example.com
    port: 8080
"#,
    );
    let path = write(
        &dir,
        "strategies.yaml",
        &format!(
            r#"#include {}
strategies:
  - strategy: anchored
    policy: first_live
    groups:
      - hosts:
          - *p1
          - *p2
"#,
            hosts.display()
        ),
    );

    let factory = StrategyFactory::new();
    let registry = factory.load(&path).unwrap();
    let handle = registry.lookup("anchored").unwrap();
    assert_eq!(handle.all_hosts().len(), 2);
    assert_eq!(
        handle.select(&RequestContext::default()).unwrap().name,
        "p1.example.com"
    );
}

#[test]
fn test_directory_source_composes_lexicographically() {
    let dir = TempDir::new().unwrap();
    // file names chosen so strategy order follows sort order, not
    // creation order
    write(
        &dir,
        "20-secondary.yaml",
        r#"
  - strategy: secondary
    policy: first_live
    groups:
      - hosts: [{host: s1.example.com}]
"#,
    );
    write(&dir, "10-header.yaml", "strategies:\n"); // opens the sequence
    write(
        &dir,
        "15-primary.yaml",
        r#"
  - strategy: primary
    policy: first_live
    groups:
      - hosts: [{host: p1.example.com}]
"#,
    );
    write(&dir, "README.txt", "not yaml, ignored\n");

    let factory = StrategyFactory::new();
    let registry = factory.load(dir.path()).unwrap();
    assert_eq!(registry.len(), 2);
    assert_eq!(registry.lookup("primary").unwrap().index(), 0);
    assert_eq!(registry.lookup("secondary").unwrap().index(), 1);
}

#[test]
fn test_missing_source_runs_with_no_strategies() {
    let dir = TempDir::new().unwrap();
    let factory = StrategyFactory::new();
    let registry = factory.load(&dir.path().join("nope.yaml")).unwrap();
    assert!(!registry.is_loaded());
    assert!(registry.lookup("primary").is_none());
}

#[tokio::test]
async fn test_watcher_delivers_reloaded_registry() {
    use nexthop::StrategyWatcher;
    use std::time::Duration;

    let dir = TempDir::new().unwrap();
    let path = write(&dir, "strategies.yaml", INITIAL);

    let factory = Arc::new(StrategyFactory::new());
    let (watcher, mut update_rx) = StrategyWatcher::new(&path, factory);
    let _guard = watcher.run().unwrap();

    // rewrite until the event loop picks the change up; backends may
    // coalesce or drop the first notification
    let mut received = None;
    for _ in 0..5 {
        fs::write(&path, UPDATED).unwrap();
        match tokio::time::timeout(Duration::from_secs(3), update_rx.recv()).await {
            Ok(Some(registry)) => {
                received = Some(registry);
                break;
            }
            _ => continue,
        }
    }

    let registry = received.expect("watcher never delivered a reload");
    assert!(registry.lookup("secondary").is_some());
}
