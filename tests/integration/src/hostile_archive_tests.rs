//! Adversarial archives and names against a real installer.
//!
//! Every case checks that nothing was written outside the managed roots and
//! that no scratch directory survives the failure.

use std::fs;
use std::path::Path;

use dxt_extensions::{ErrorKind, InstallationManager, InstallerConfig};
use dxt_test_utils::{ArchiveBuilder, TestEnv, sample_manifest};
use pretty_assertions::assert_eq;
use rstest::rstest;
use serde_json::json;

fn manager(env: &TestEnv) -> InstallationManager {
    InstallationManager::new(InstallerConfig::new(env.temp_root(), env.extensions_root()))
}

/// Every regular file under `root`, relative and sorted.
fn files_under(root: &Path) -> Vec<String> {
    fn walk(dir: &Path, root: &Path, out: &mut Vec<String>) {
        let Ok(entries) = fs::read_dir(dir) else {
            return;
        };
        for entry in entries.filter_map(|e| e.ok()) {
            let path = entry.path();
            if path.is_dir() {
                walk(&path, root, out);
            } else {
                let rel = path.strip_prefix(root).unwrap();
                out.push(rel.to_string_lossy().replace('\\', "/"));
            }
        }
    }
    let mut out = Vec::new();
    walk(root, root, &mut out);
    out.sort();
    out
}

#[rstest]
#[case::parent("../pwned.txt")]
#[case::deep_parent("../../../../pwned.txt")]
#[case::hidden_parent("server/../../pwned.txt")]
#[case::absolute("/tmp/pwned.txt")]
fn test_escaping_entries(#[case] entry: &str) {
    let env = TestEnv::new();
    let archive = ArchiveBuilder::extension("acme")
        .file(entry, "pwned")
        .write_to(&env.archive_path("evil.dxt"));

    let err = manager(&env).install(&archive).unwrap_err();

    assert_eq!(err.kind(), ErrorKind::ExtractionFailed);
    assert_eq!(files_under(env.root()), vec!["archives/evil.dxt"]);
    env.assert_no_scratch();
}

#[test]
fn test_symlink_to_outside_not_materialized() {
    let env = TestEnv::new();
    let secret = env.root().join("secret.txt");
    fs::write(&secret, "top secret").unwrap();
    let archive = ArchiveBuilder::extension("acme")
        .symlink("server/secret", secret.to_str().unwrap())
        .symlink("up", "../..")
        .write_to(&env.archive_path("links.dxt"));

    manager(&env).install(&archive).unwrap();

    let dir = env.installed_dir("acme");
    assert!(fs::symlink_metadata(dir.join("server/secret")).is_err());
    assert!(fs::symlink_metadata(dir.join("up")).is_err());
    assert_eq!(fs::read_to_string(&secret).unwrap(), "top secret");
}

#[rstest]
#[case::parent("..")]
#[case::nested("../outside")]
#[case::separator("a/b")]
#[case::backslash("a\\b")]
#[case::reserved("con:out")]
#[case::nul("acme\u{0}")]
#[case::whitespace(" acme")]
#[case::dots("...")]
fn test_unsafe_manifest_names(#[case] name: &str) {
    let env = TestEnv::new();
    let archive = ArchiveBuilder::new()
        .manifest(&sample_manifest(name))
        .write_to(&env.archive_path("evil.dxt"));

    let err = manager(&env).install(&archive).unwrap_err();

    assert_eq!(err.kind(), ErrorKind::InvalidName, "name {name:?}: {err}");
    assert!(env.extensions_entries().is_empty());
    env.assert_no_scratch();
}

#[test]
fn test_unicode_name_accepted() {
    let env = TestEnv::new();
    let archive = ArchiveBuilder::extension("ünïcødé-扩展").write_to(&env.archive_path("u.dxt"));

    manager(&env).install(&archive).unwrap();

    env.assert_installed("ünïcødé-扩展");
}

#[rstest]
#[case::not_json("this is not json")]
#[case::array("[1, 2, 3]")]
#[case::truncated(r#"{"dxt_version": "0.1", "name": "acme""#)]
fn test_unparseable_manifest(#[case] raw: &str) {
    let env = TestEnv::new();
    let archive = ArchiveBuilder::new()
        .raw_manifest(raw)
        .write_to(&env.archive_path("bad.dxt"));

    let err = manager(&env).install(&archive).unwrap_err();

    assert_eq!(err.kind(), ErrorKind::ManifestParseError);
    assert!(env.extensions_entries().is_empty());
    env.assert_no_scratch();
}

#[test]
fn test_manifest_in_subdirectory_is_not_found() {
    let env = TestEnv::new();
    let archive = ArchiveBuilder::new()
        .manifest(&json!({}))
        .write_to(&env.archive_path("placeholder.dxt"));
    let nested = ArchiveBuilder::new()
        .file("acme/manifest.json", sample_manifest("acme").to_string())
        .write_to(&env.archive_path("nested.dxt"));
    let manager = manager(&env);

    assert_eq!(
        manager.install(&archive).unwrap_err().kind(),
        ErrorKind::ManifestMissingField
    );
    assert_eq!(
        manager.install(&nested).unwrap_err().kind(),
        ErrorKind::ManifestParseError
    );
    env.assert_no_scratch();
}

#[test]
fn test_confine_used_for_uninstall_names() {
    let env = TestEnv::new();
    let manager = manager(&env);
    let archive = ArchiveBuilder::extension("acme").write_to(&env.archive_path("acme.dxt"));
    manager.install(&archive).unwrap();

    let root = env.extensions_root();
    assert!(dxt_fs::confine(&root, root.join("server-acme")).is_ok());
    assert!(dxt_fs::confine(&root, root.join("server-acme").join("..")).is_err());

    for name in ["", "../extensions", "acme/..", "acme/../../temp"] {
        assert!(!manager.uninstall(name), "uninstall({name:?}) removed something");
    }
    env.assert_installed("acme");
}
