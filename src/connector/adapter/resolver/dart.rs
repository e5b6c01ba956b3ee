use std::path::{Path, PathBuf};

use serde::Deserialize;

use crate::application::ImportResolver;
use crate::domain::{paths, Language};

#[derive(Deserialize)]
struct Pubspec {
    name: String,
}

#[derive(Deserialize)]
struct PackageConfig {
    packages: Vec<PackageEntry>,
}

#[derive(Deserialize)]
struct PackageEntry {
    name: String,
    #[serde(rename = "rootUri")]
    root_uri: String,
    #[serde(rename = "packageUri")]
    package_uri: Option<String>,
}

/// Dart import resolution: `package:` URIs via the pubspec name (own
/// package) or the `.dart_tool/package_config.json` table, plus plain
/// relative imports. `dart:` core libraries never resolve.
pub struct DartResolver;

impl DartResolver {
    fn gate(root: &Path, candidate: PathBuf) -> Option<PathBuf> {
        if candidate.is_file() && paths::contains(root, &candidate) {
            Some(candidate)
        } else {
            None
        }
    }

    fn own_package_name(root: &Path) -> Option<String> {
        let raw = std::fs::read_to_string(root.join("pubspec.yaml")).ok()?;
        serde_yaml::from_str::<Pubspec>(&raw).ok().map(|p| p.name)
    }

    fn resolve_package(import: &str, root: &Path) -> Option<PathBuf> {
        let spec = import.strip_prefix("package:")?;
        let (package, rel_path) = spec.split_once('/')?;

        if Self::own_package_name(root).as_deref() == Some(package) {
            return Self::gate(root, root.join("lib").join(rel_path));
        }

        let config_path = root.join(".dart_tool/package_config.json");
        let raw = std::fs::read_to_string(&config_path).ok()?;
        let config: PackageConfig = serde_json::from_str(&raw).ok()?;
        let entry = config.packages.iter().find(|p| p.name == package)?;

        // rootUri is relative to .dart_tool/; packageUri (usually lib/) is
        // relative to the package root.
        let package_root = if let Some(stripped) = entry.root_uri.strip_prefix("file://") {
            PathBuf::from(stripped)
        } else {
            root.join(".dart_tool").join(&entry.root_uri)
        };
        let lib_dir = match &entry.package_uri {
            Some(package_uri) => package_root.join(package_uri),
            None => package_root,
        };
        Self::gate(root, lib_dir.join(rel_path))
    }
}

impl ImportResolver for DartResolver {
    fn handles(&self, language: Language) -> bool {
        language == Language::Dart
    }

    fn resolve(
        &self,
        import: &str,
        source_file: &Path,
        project_root: &Path,
    ) -> Option<PathBuf> {
        if import.starts_with("dart:") {
            return None;
        }
        if import.starts_with("package:") {
            return Self::resolve_package(import, project_root);
        }
        let base = source_file.parent()?.join(import);
        Self::gate(project_root, base)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn fixture() -> tempfile::TempDir {
        let dir = tempfile::tempdir().unwrap();
        let root = dir.path();
        std::fs::create_dir_all(root.join("lib/screens")).unwrap();
        std::fs::write(root.join("pubspec.yaml"), "name: myapp\nversion: 1.0.0\n").unwrap();
        std::fs::write(root.join("lib/main.dart"), "void main() {}\n").unwrap();
        std::fs::write(
            root.join("lib/screens/login_screen.dart"),
            "class LoginScreen {}\n",
        )
        .unwrap();
        dir
    }

    #[test]
    fn test_own_package_import() {
        let dir = fixture();
        let root = dir.path();
        let resolver = DartResolver;

        let found = resolver
            .resolve(
                "package:myapp/screens/login_screen.dart",
                &root.join("lib/main.dart"),
                root,
            )
            .unwrap();
        assert!(found.ends_with("lib/screens/login_screen.dart"));
    }

    #[test]
    fn test_relative_import() {
        let dir = fixture();
        let root = dir.path();
        let resolver = DartResolver;

        let found = resolver
            .resolve(
                "screens/login_screen.dart",
                &root.join("lib/main.dart"),
                root,
            )
            .unwrap();
        assert!(found.ends_with("lib/screens/login_screen.dart"));
    }

    #[test]
    fn test_dart_core_never_resolves() {
        let dir = fixture();
        let root = dir.path();
        let resolver = DartResolver;
        assert!(resolver
            .resolve("dart:async", &root.join("lib/main.dart"), root)
            .is_none());
    }

    #[test]
    fn test_foreign_package_outside_root_rejected() {
        // Project lives in app/; the pub cache sits beside it, outside the
        // project root, so a resolved path into it must be discarded.
        let dir = tempfile::tempdir().unwrap();
        let root = dir.path().join("app");
        std::fs::create_dir_all(root.join("lib")).unwrap();
        std::fs::create_dir_all(root.join(".dart_tool")).unwrap();
        std::fs::write(root.join("pubspec.yaml"), "name: myapp\n").unwrap();
        std::fs::write(root.join("lib/main.dart"), "void main() {}\n").unwrap();
        std::fs::create_dir_all(dir.path().join("pub_cache/flutter/lib")).unwrap();
        std::fs::write(
            dir.path().join("pub_cache/flutter/lib/material.dart"),
            "library material;\n",
        )
        .unwrap();
        std::fs::write(
            root.join(".dart_tool/package_config.json"),
            r#"{"configVersion": 2, "packages": [
                {"name": "flutter", "rootUri": "../../pub_cache/flutter", "packageUri": "lib/"}
            ]}"#,
        )
        .unwrap();

        let resolver = DartResolver;
        assert!(resolver
            .resolve(
                "package:flutter/material.dart",
                &root.join("lib/main.dart"),
                &root
            )
            .is_none());
    }
}
