//! End-to-end install lifecycle scenarios.
//!
//! Each test drives a fresh `InstallationManager` over isolated roots and
//! checks the resulting filesystem layout and launch configuration.

use std::fs;

use dxt_extensions::{
    CleanupOutcome, ErrorKind, ExtractionLimits, InstallationManager, InstallerConfig, Platform,
};
use dxt_test_utils::{ArchiveBuilder, TestEnv, sample_manifest};
use pretty_assertions::assert_eq;
use serde_json::json;

fn manager(env: &TestEnv) -> InstallationManager {
    InstallationManager::new(InstallerConfig::new(env.temp_root(), env.extensions_root()))
}

// =============================================================================
// Lifecycle
// =============================================================================

#[test]
fn test_install_resolve_reinstall_uninstall() {
    let env = TestEnv::new();
    let manager = manager(&env);

    // v1
    let v1 = ArchiveBuilder::extension("acme")
        .file("legacy/helper.js", "// v1 only")
        .write_to(&env.archive_path("acme-1.dxt"));
    let installed = manager.install(&v1).unwrap();
    assert_eq!(installed.manifest.version, "1.0.0");
    env.assert_installed("acme");

    let resolved = manager.resolve_installed("acme", None).unwrap();
    assert_eq!(
        resolved.args,
        vec![format!("{}/server/index.js", installed.install_dir.display())]
    );

    // v2 changes the entry point and drops legacy/
    let mut manifest = sample_manifest("acme");
    manifest["version"] = json!("2.0.0");
    manifest["server"]["mcp_config"]["args"] = json!(["${__dirname}/dist/main.js", "--stdio"]);
    let v2 = ArchiveBuilder::new()
        .manifest(&manifest)
        .file("dist/main.js", "// v2")
        .write_to(&env.archive_path("acme-2.dxt"));
    manager.install(&v2).unwrap();

    assert!(!env.installed_dir("acme").join("legacy").exists());
    let resolved = manager.resolve_installed("acme", None).unwrap();
    assert_eq!(resolved.args[1], "--stdio");
    assert!(resolved.args[0].ends_with("dist/main.js"));

    let listed = manager.list_installed().unwrap();
    assert_eq!(listed.len(), 1);
    assert_eq!(listed[0].manifest.version, "2.0.0");

    // uninstall
    assert!(manager.uninstall("acme"));
    assert!(manager.list_installed().unwrap().is_empty());
    assert!(manager.resolve_installed("acme", None).is_none());
    env.assert_no_scratch();
}

#[test]
fn test_several_extensions_side_by_side() {
    let env = TestEnv::new();
    let manager = manager(&env);
    for name in ["acme", "globex", "initech"] {
        let archive =
            ArchiveBuilder::extension(name).write_to(&env.archive_path(&format!("{name}.dxt")));
        manager.install(&archive).unwrap();
    }

    assert_eq!(
        env.extensions_entries(),
        vec!["server-acme", "server-globex", "server-initech"]
    );

    assert!(manager.uninstall("globex"));
    assert_eq!(
        env.extensions_entries(),
        vec!["server-acme", "server-initech"]
    );
}

#[test]
fn test_failed_reinstall_keeps_previous_version() {
    let env = TestEnv::new();
    let manager = manager(&env);
    let good = ArchiveBuilder::extension("acme").write_to(&env.archive_path("good.dxt"));
    manager.install(&good).unwrap();

    let mut manifest = sample_manifest("acme");
    manifest["server"]["mcp_config"]["args"] = json!({"not": "an array"});
    let bad = ArchiveBuilder::new()
        .manifest(&manifest)
        .write_to(&env.archive_path("bad.dxt"));

    let err = manager.install(&bad).unwrap_err();

    assert!(err.is_validation());
    env.assert_installed("acme");
    assert!(env.installed_dir("acme").join("server/index.js").is_file());
    env.assert_no_scratch();
}

// =============================================================================
// Launch configuration
// =============================================================================

#[test]
fn test_platform_override_for_host() {
    let env = TestEnv::new();
    let manager = manager(&env);
    let mut manifest = sample_manifest("acme");
    manifest["server"]["mcp_config"]["platform_overrides"] = json!({
        "darwin": { "command": "node-darwin", "env": { "OS_TAG": "mac" } },
        "win32":  { "command": "node-win32",  "env": { "OS_TAG": "win" } },
        "linux":  { "command": "node-linux",  "env": { "OS_TAG": "tux" } }
    });
    let archive = ArchiveBuilder::new()
        .manifest(&manifest)
        .write_to(&env.archive_path("acme.dxt"));
    manager.install(&archive).unwrap();

    let resolved = manager.resolve_installed("acme", None).unwrap();

    let env_map = resolved.env.unwrap();
    assert_eq!(env_map["EXT_NAME"], "acme");
    match Platform::current() {
        Platform::Darwin => assert_eq!(resolved.command, "node-darwin"),
        Platform::Win32 => assert_eq!(resolved.command, "node-win32"),
        Platform::Linux => assert_eq!(resolved.command, "node-linux"),
        Platform::Other(_) => {
            assert_eq!(resolved.command, "node");
            assert!(!env_map.contains_key("OS_TAG"));
        }
    }
}

#[test]
fn test_home_and_user_config_placeholders() {
    let env = TestEnv::new();
    let manager = manager(&env);
    let mut manifest = sample_manifest("acme");
    manifest["server"]["mcp_config"]["args"] = json!([
        "${__dirname}${/}server${pathSeparator}index.js",
        "--workspace=${user_config.workspace}",
        "--missing=${user_config.not_set}"
    ]);
    let archive = ArchiveBuilder::new()
        .manifest(&manifest)
        .write_to(&env.archive_path("acme.dxt"));
    let outcome = manager.install(&archive).unwrap();
    let user = json!({"workspace": "/srv/data"}).as_object().cloned().unwrap();

    let resolved = manager.resolve_installed("acme", Some(&user)).unwrap();

    let sep = std::path::MAIN_SEPARATOR;
    assert_eq!(
        resolved.args,
        vec![
            format!("{}{sep}server{sep}index.js", outcome.install_dir.display()),
            "--workspace=/srv/data".to_string(),
            "--missing=${user_config.not_set}".to_string(),
        ]
    );
}

#[test]
fn test_hostile_command_installs_but_never_resolves() {
    let env = TestEnv::new();
    let manager = manager(&env);
    let mut manifest = sample_manifest("acme");
    manifest["server"]["mcp_config"]["command"] = json!("../../bin/sh");
    let archive = ArchiveBuilder::new()
        .manifest(&manifest)
        .write_to(&env.archive_path("acme.dxt"));

    let outcome = manager.install(&archive).unwrap();

    assert!(manager.resolve_installed("acme", None).is_none());
    let err = manager
        .launch_config(&outcome.install_dir, None)
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::PathTraversal);
}

#[test]
fn test_null_byte_argument_never_resolves() {
    let env = TestEnv::new();
    let manager = manager(&env);
    let mut manifest = sample_manifest("acme");
    manifest["server"]["mcp_config"]["args"] = json!(["--flag\u{0}injected"]);
    let archive = ArchiveBuilder::new()
        .manifest(&manifest)
        .write_to(&env.archive_path("acme.dxt"));

    let outcome = manager.install(&archive).unwrap();

    let err = manager
        .launch_config(&outcome.install_dir, None)
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::NullByteInjection);
}

// =============================================================================
// Temp handling and configuration
// =============================================================================

#[test]
fn test_crash_residue_purged() {
    let env = TestEnv::new();
    let manager = manager(&env);
    let residue = env.uploads_dir().join("5b1e0c4e-crashed");
    fs::create_dir_all(residue.join("server")).unwrap();
    fs::write(residue.join("manifest.json"), "{}").unwrap();

    // A new install is unaffected by residue from an earlier one.
    let archive = ArchiveBuilder::extension("acme").write_to(&env.archive_path("acme.dxt"));
    manager.install(&archive).unwrap();
    assert!(residue.exists());

    assert!(matches!(manager.purge_temp(), CleanupOutcome::Removed));
    assert!(!env.uploads_dir().exists());
    env.assert_installed("acme");
}

#[test]
fn test_upload_consumed_by_install() {
    let env = TestEnv::new();
    let upload = ArchiveBuilder::extension("acme").write_to(&env.upload_path("acme.dxt"));

    manager(&env).install(&upload).unwrap();

    assert!(!upload.exists());
    env.assert_installed("acme");
}

#[test]
fn test_configured_limits_enforced() {
    let env = TestEnv::new();
    let config = InstallerConfig::from_toml(&format!(
        "temp_root = {:?}\nextensions_root = {:?}\n\n[limits]\nmax_extracted_bytes = 2048\n",
        env.temp_root().display().to_string(),
        env.extensions_root().display().to_string()
    ))
    .unwrap();
    assert_eq!(
        config.limits,
        ExtractionLimits {
            max_extracted_bytes: 2048,
            ..ExtractionLimits::default()
        }
    );
    let manager = InstallationManager::new(config);
    let archive = ArchiveBuilder::extension("acme")
        .file("blob.bin", vec![0u8; 8192])
        .write_to(&env.archive_path("acme.dxt"));

    let err = manager.install(&archive).unwrap_err();

    assert_eq!(err.kind(), ErrorKind::ExtractionFailed);
    env.assert_not_installed("acme");
    env.assert_no_scratch();
}

#[cfg(unix)]
#[test]
fn test_executable_entry_point_survives_install() {
    use std::os::unix::fs::PermissionsExt;

    let env = TestEnv::new();
    let mut manifest = sample_manifest("acme");
    manifest["server"]["type"] = json!("binary");
    manifest["server"]["mcp_config"]["command"] = json!("${__dirname}/bin/acme-server");
    manifest["server"]["mcp_config"]["args"] = json!([]);
    let archive = ArchiveBuilder::new()
        .manifest(&manifest)
        .executable("bin/acme-server", "#!/bin/sh\nexit 0\n")
        .write_to(&env.archive_path("acme.dxt"));
    let manager = manager(&env);

    let outcome = manager.install(&archive).unwrap();

    let binary = outcome.install_dir.join("bin/acme-server");
    let mode = fs::metadata(&binary).unwrap().permissions().mode();
    assert_eq!(mode & 0o100, 0o100);
    let resolved = manager.resolve_installed("acme", None).unwrap();
    assert_eq!(resolved.command, binary.display().to_string());
}
