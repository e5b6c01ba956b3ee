use std::path::Path;

/// Canonicalize a path string for stable hashing and lookup.
///
/// Backslashes become forward slashes, a Windows drive letter is lowercased,
/// redundant separators collapse, and `.` segments are dropped. `..` segments
/// are kept as-is and symlinks are never followed; escaping a root is caught
/// by [`contains`], not here.
pub fn normalize(path: &str) -> String {
    let slashed = path.replace('\\', "/");

    let mut out = String::with_capacity(slashed.len());
    let bytes = slashed.as_bytes();

    // Lowercase a leading drive letter ("C:/..." -> "c:/...").
    let rest = if bytes.len() >= 2 && bytes[1] == b':' && bytes[0].is_ascii_alphabetic() {
        out.push(bytes[0].to_ascii_lowercase() as char);
        out.push(':');
        &slashed[2..]
    } else {
        &slashed[..]
    };

    let absolute = rest.starts_with('/');
    let segments: Vec<&str> = rest
        .split('/')
        .filter(|s| !s.is_empty() && *s != ".")
        .collect();

    if absolute {
        out.push('/');
    }
    out.push_str(&segments.join("/"));

    if out.is_empty() {
        ".".to_string()
    } else {
        out
    }
}

/// True iff the realpath of `path` is equal to or below the realpath of
/// `root`. Both must exist; anything that fails to resolve is treated as
/// outside. Import resolvers use this to discard out-of-root results.
pub fn contains(root: &Path, path: &Path) -> bool {
    let (root_real, path_real) = match (root.canonicalize(), path.canonicalize()) {
        (Ok(r), Ok(p)) => (r, p),
        _ => return false,
    };
    path_real.starts_with(&root_real)
}

/// Project-root-relative, forward-slash form of `path`, used as the
/// `filename` stored on chunks.
pub fn relativize(root: &Path, path: &Path) -> String {
    let rel = path.strip_prefix(root).unwrap_or(path);
    normalize(&rel.to_string_lossy())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_backslashes_become_forward_slashes() {
        assert_eq!(normalize("src\\lib\\mod.rs"), "src/lib/mod.rs");
    }

    #[test]
    fn test_drive_letter_lowercased() {
        assert_eq!(normalize("C:\\Users\\dev\\proj"), "c:/Users/dev/proj");
        assert_eq!(normalize("c:/already/lower"), "c:/already/lower");
    }

    #[test]
    fn test_redundant_separators_collapse() {
        assert_eq!(normalize("a//b///c"), "a/b/c");
        assert_eq!(normalize("/a//b/"), "/a/b");
    }

    #[test]
    fn test_dot_segments_dropped() {
        assert_eq!(normalize("./a/./b"), "a/b");
    }

    #[test]
    fn test_dotdot_preserved() {
        assert_eq!(normalize("a/../b"), "a/../b");
    }

    #[test]
    fn test_idempotent() {
        for p in ["C:\\x\\.\\y", "a//b/./c", "/root/./proj", "../up"] {
            let once = normalize(p);
            assert_eq!(normalize(&once), once);
        }
    }

    #[test]
    fn test_contains_rejects_escape() {
        let dir = tempfile::tempdir().unwrap();
        let root = dir.path().join("proj");
        std::fs::create_dir_all(root.join("src")).unwrap();
        std::fs::write(root.join("src/a.py"), "x = 1\n").unwrap();
        std::fs::write(dir.path().join("outside.py"), "y = 2\n").unwrap();

        assert!(contains(&root, &root.join("src/a.py")));
        assert!(contains(&root, &root));
        assert!(!contains(&root, &dir.path().join("outside.py")));
        assert!(!contains(&root, &root.join("src/../../outside.py")));
        assert!(!contains(&root, &root.join("missing.py")));
    }
}
