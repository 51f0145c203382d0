//! Every workspace member inherits the workspace version, and the internal
//! path dependencies pin that same version.

use std::path::{Path, PathBuf};

fn workspace_root() -> PathBuf {
    Path::new(env!("CARGO_MANIFEST_DIR"))
        .ancestors()
        .nth(2)
        .unwrap()
        .to_path_buf()
}

fn manifest(dir: &Path) -> toml::Value {
    let raw = std::fs::read_to_string(dir.join("Cargo.toml")).unwrap();
    raw.parse().unwrap()
}

fn root_manifest() -> toml::Value {
    manifest(&workspace_root())
}

fn members() -> Vec<String> {
    root_manifest()["workspace"]["members"]
        .as_array()
        .unwrap()
        .iter()
        .map(|m| m.as_str().unwrap().to_string())
        .collect()
}

#[test]
fn members_inherit_workspace_version() {
    let members = members();
    assert!(!members.is_empty());
    for member in members {
        let doc = manifest(&workspace_root().join(&member));
        let inherits = doc["package"]["version"]
            .get("workspace")
            .and_then(toml::Value::as_bool);
        assert_eq!(
            inherits,
            Some(true),
            "{member} should use version.workspace = true"
        );
    }
}

#[test]
fn internal_dependencies_pin_workspace_version() {
    let root = root_manifest();
    let version = root["workspace"]["package"]["version"].as_str().unwrap();
    let deps = root["workspace"]["dependencies"].as_table().unwrap();

    for member in members() {
        let name = member.rsplit('/').next().unwrap();
        let dep = deps
            .get(name)
            .unwrap_or_else(|| panic!("{name} missing from workspace.dependencies"));
        assert_eq!(dep["version"].as_str(), Some(version), "{name} version");
        assert_eq!(dep["path"].as_str(), Some(member.as_str()), "{name} path");
    }
}

#[test]
fn workspace_version_matches_cargo_pkg() {
    let root = root_manifest();
    assert_eq!(
        root["workspace"]["package"]["version"].as_str(),
        Some(env!("CARGO_PKG_VERSION"))
    );
}
