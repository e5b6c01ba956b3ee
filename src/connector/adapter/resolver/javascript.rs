use std::collections::HashMap;
use std::path::{Path, PathBuf};

use serde::Deserialize;

use crate::application::ImportResolver;
use crate::domain::{paths, Language};

/// Extension search order for extensionless specifiers.
const EXTENSIONS: &[&str] = &["ts", "tsx", "js", "jsx", "d.ts"];

#[derive(Deserialize)]
struct PackageJson {
    main: Option<String>,
}

#[derive(Deserialize)]
struct TsConfig {
    #[serde(rename = "compilerOptions")]
    compiler_options: Option<TsCompilerOptions>,
}

#[derive(Deserialize)]
struct TsCompilerOptions {
    #[serde(rename = "baseUrl")]
    base_url: Option<String>,
    paths: Option<HashMap<String, Vec<String>>>,
}

/// JS/TS import resolution: relative specifiers against the source file's
/// directory with the usual extension and `index.*` fallbacks; bare
/// specifiers via `node_modules/<name>/package.json` and `tsconfig.json`
/// path aliases.
pub struct JavaScriptResolver;

impl JavaScriptResolver {
    fn gate(root: &Path, candidate: PathBuf) -> Option<PathBuf> {
        if candidate.is_file() && paths::contains(root, &candidate) {
            Some(candidate)
        } else {
            None
        }
    }

    fn with_extensions(base: &Path, root: &Path) -> Option<PathBuf> {
        if let Some(found) = Self::gate(root, base.to_path_buf()) {
            return Some(found);
        }
        for ext in EXTENSIONS {
            let candidate = PathBuf::from(format!("{}.{ext}", base.to_string_lossy()));
            if let Some(found) = Self::gate(root, candidate) {
                return Some(found);
            }
        }
        if base.is_dir() {
            for ext in EXTENSIONS {
                let candidate = base.join(format!("index.{ext}"));
                if let Some(found) = Self::gate(root, candidate) {
                    return Some(found);
                }
            }
        }
        None
    }

    fn resolve_node_modules(import: &str, root: &Path) -> Option<PathBuf> {
        // Scoped packages keep their first two segments as the name.
        let mut segments = import.split('/');
        let first = segments.next()?;
        let package_name = if first.starts_with('@') {
            format!("{first}/{}", segments.next()?)
        } else {
            first.to_string()
        };
        let subpath: Vec<&str> = segments.collect();

        let package_dir = root.join("node_modules").join(&package_name);
        if !package_dir.is_dir() {
            return None;
        }

        if !subpath.is_empty() {
            return Self::with_extensions(&package_dir.join(subpath.join("/")), root);
        }

        let main = std::fs::read_to_string(package_dir.join("package.json"))
            .ok()
            .and_then(|raw| serde_json::from_str::<PackageJson>(&raw).ok())
            .and_then(|pkg| pkg.main)
            .unwrap_or_else(|| "index.js".to_string());
        Self::with_extensions(&package_dir.join(main), root)
    }

    fn resolve_tsconfig_alias(import: &str, root: &Path) -> Option<PathBuf> {
        let raw = std::fs::read_to_string(root.join("tsconfig.json")).ok()?;
        let config: TsConfig = serde_json::from_str(&raw).ok()?;
        let options = config.compiler_options?;
        let aliases = options.paths?;
        let base = root.join(options.base_url.as_deref().unwrap_or("."));

        for (pattern, targets) in &aliases {
            let prefix = pattern.trim_end_matches('*');
            if !import.starts_with(prefix) {
                continue;
            }
            let suffix = &import[prefix.len()..];
            for target in targets {
                let mapped = target.trim_end_matches('*').to_string() + suffix;
                if let Some(found) = Self::with_extensions(&base.join(mapped), root) {
                    return Some(found);
                }
            }
        }
        None
    }
}

impl ImportResolver for JavaScriptResolver {
    fn handles(&self, language: Language) -> bool {
        matches!(language, Language::JavaScript | Language::TypeScript)
    }

    fn resolve(
        &self,
        import: &str,
        source_file: &Path,
        project_root: &Path,
    ) -> Option<PathBuf> {
        if import.starts_with('.') {
            let base = source_file.parent()?.join(import);
            return Self::with_extensions(&base, project_root);
        }
        if import.starts_with('/') {
            return None;
        }
        Self::resolve_tsconfig_alias(import, project_root)
            .or_else(|| Self::resolve_node_modules(import, project_root))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn fixture() -> tempfile::TempDir {
        let dir = tempfile::tempdir().unwrap();
        let root = dir.path();
        std::fs::create_dir_all(root.join("src/components")).unwrap();
        std::fs::create_dir_all(root.join("node_modules/leftpad")).unwrap();
        std::fs::write(root.join("src/api.ts"), "export const api = 1;\n").unwrap();
        std::fs::write(root.join("src/components/index.tsx"), "export {};\n").unwrap();
        std::fs::write(root.join("src/app.ts"), "import { api } from './api';\n").unwrap();
        std::fs::write(
            root.join("node_modules/leftpad/package.json"),
            r#"{"name": "leftpad", "main": "lib/pad.js"}"#,
        )
        .unwrap();
        std::fs::create_dir_all(root.join("node_modules/leftpad/lib")).unwrap();
        std::fs::write(root.join("node_modules/leftpad/lib/pad.js"), "module.exports = {};\n")
            .unwrap();
        std::fs::write(
            root.join("tsconfig.json"),
            r#"{"compilerOptions": {"baseUrl": ".", "paths": {"@app/*": ["src/*"]}}}"#,
        )
        .unwrap();
        dir
    }

    #[test]
    fn test_relative_with_extension_probing() {
        let dir = fixture();
        let root = dir.path();
        let resolver = JavaScriptResolver;

        let found = resolver
            .resolve("./api", &root.join("src/app.ts"), root)
            .unwrap();
        assert!(found.ends_with("src/api.ts"));
    }

    #[test]
    fn test_directory_resolves_to_index() {
        let dir = fixture();
        let root = dir.path();
        let resolver = JavaScriptResolver;

        let found = resolver
            .resolve("./components", &root.join("src/app.ts"), root)
            .unwrap();
        assert!(found.ends_with("src/components/index.tsx"));
    }

    #[test]
    fn test_bare_specifier_uses_package_main() {
        let dir = fixture();
        let root = dir.path();
        let resolver = JavaScriptResolver;

        let found = resolver
            .resolve("leftpad", &root.join("src/app.ts"), root)
            .unwrap();
        assert!(found.ends_with("node_modules/leftpad/lib/pad.js"));
    }

    #[test]
    fn test_tsconfig_alias() {
        let dir = fixture();
        let root = dir.path();
        let resolver = JavaScriptResolver;

        let found = resolver
            .resolve("@app/api", &root.join("src/app.ts"), root)
            .unwrap();
        assert!(found.ends_with("src/api.ts"));
    }

    #[test]
    fn test_traversal_escape_rejected() {
        let dir = fixture();
        let root = dir.path();
        std::fs::write(dir.path().join("secrets.js"), "x\n").unwrap();
        // Project root is src/; climbing out of it resolves to a real file
        // that must still be discarded.
        let project_root = root.join("src");
        let resolver = JavaScriptResolver;
        assert!(resolver
            .resolve("../secrets", &project_root.join("app.ts"), &project_root)
            .is_none());
        assert!(resolver
            .resolve(
                "../../../../etc/passwd",
                &project_root.join("app.ts"),
                &project_root
            )
            .is_none());
    }
}
