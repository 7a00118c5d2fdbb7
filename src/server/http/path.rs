//! URL to filesystem path resolution.

use std::path::{Path, PathBuf};

/// Resolve a relative URL path under `serve_root`, handling index.html for
/// directories. `None` if missing or outside the root.
pub fn resolve_path(rel: &str, serve_root: &Path) -> Option<PathBuf> {
    let clean = rel.trim_matches('/');

    // Reject paths with suspicious patterns early
    if clean.split('/').any(|segment| segment == "..") {
        return None;
    }

    let local = serve_root.join(clean);

    // Canonicalize to resolve symlinks and verify path is under serve_root
    let canonical = local.canonicalize().ok()?;
    let root_canonical = serve_root.canonicalize().ok()?;

    if !canonical.starts_with(&root_canonical) {
        return None;
    }

    if canonical.is_file() {
        return Some(canonical);
    }

    if canonical.is_dir() {
        let index = canonical.join("index.html");
        if index.is_file() {
            return Some(index);
        }
    }

    None
}

/// Locate rendered output for `rel` (`{block root...}/{file}`).
///
/// The output of a block root lives at `{workspace}/{block root}/{output_dir}`.
/// Shorter block-root prefixes are tried first, starting with the workspace
/// root itself; the result must stay inside the workspace.
pub fn resolve_rendered(rel: &str, workspace: &Path, output_dir: &Path) -> Option<PathBuf> {
    let workspace_canonical = workspace.canonicalize().ok()?;
    let segments: Vec<&str> = rel.split('/').filter(|s| !s.is_empty()).collect();
    if segments.iter().any(|s| *s == "..") {
        return None;
    }

    // split 0 is a block at the workspace root
    (0..segments.len()).find_map(|split| {
        let (project, file) = segments.split_at(split);
        let serve_root = workspace.join(project.join("/")).join(output_dir);
        resolve_path(&file.join("/"), &serve_root)
            .filter(|path| path.starts_with(&workspace_canonical))
    })
}

/// Normalize a request URL: strip the query string, percent-decode.
pub fn normalize_url(url: &str) -> String {
    use percent_encoding::percent_decode_str;

    let path = url.split(['?', '#']).next().unwrap_or(url);
    percent_decode_str(path)
        .decode_utf8()
        .map(std::borrow::Cow::into_owned)
        .unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    #[test]
    fn test_normalize_url() {
        assert_eq!(normalize_url("/app/index.html?v=1"), "/app/index.html");
        assert_eq!(normalize_url("/rendered/docs/a%20b.html"), "/rendered/docs/a b.html");
        assert_eq!(normalize_url("/app#top"), "/app");
    }

    #[test]
    fn test_resolve_path() {
        let dir = TempDir::new().unwrap();
        fs::create_dir_all(dir.path().join("assets")).unwrap();
        fs::write(dir.path().join("assets/app.js"), "").unwrap();
        fs::write(dir.path().join("index.html"), "").unwrap();

        assert!(resolve_path("assets/app.js", dir.path()).is_some());
        assert!(resolve_path("/", dir.path()).unwrap().ends_with("index.html"));
        assert!(resolve_path("missing.js", dir.path()).is_none());
        assert!(resolve_path("assets/../../etc/passwd", dir.path()).is_none());
    }

    #[test]
    fn test_resolve_rendered_prefers_shortest_prefix() {
        let dir = TempDir::new().unwrap();
        let ws = dir.path();
        fs::create_dir_all(ws.join("docs/build/html/guide")).unwrap();
        fs::write(ws.join("docs/build/html/guide/intro.html"), "short").unwrap();
        fs::create_dir_all(ws.join("docs/guide/build/html")).unwrap();
        fs::write(ws.join("docs/guide/build/html/intro.html"), "long").unwrap();

        let output = Path::new("build/html");
        let found = resolve_rendered("docs/guide/intro.html", ws, output).unwrap();
        assert_eq!(fs::read_to_string(found).unwrap(), "short");

        fs::remove_file(ws.join("docs/build/html/guide/intro.html")).unwrap();
        let found = resolve_rendered("docs/guide/intro.html", ws, output).unwrap();
        assert_eq!(fs::read_to_string(found).unwrap(), "long");
    }

    #[test]
    fn test_resolve_rendered_nested_project() {
        let dir = TempDir::new().unwrap();
        let ws = dir.path();
        fs::create_dir_all(ws.join("courses/intro/build/html")).unwrap();
        fs::write(ws.join("courses/intro/build/html/index.html"), "").unwrap();

        let output = Path::new("build/html");
        assert!(resolve_rendered("courses/intro/index.html", ws, output).is_some());
        assert!(resolve_rendered("courses/intro/missing.html", ws, output).is_none());
        assert!(resolve_rendered("index.html", ws, output).is_none());
    }

    #[test]
    fn test_resolve_rendered_workspace_root_block() {
        let dir = TempDir::new().unwrap();
        let ws = dir.path();
        fs::create_dir_all(ws.join("build/html/guide")).unwrap();
        fs::write(ws.join("build/html/index.html"), "root").unwrap();
        fs::write(ws.join("build/html/guide/intro.html"), "").unwrap();

        let output = Path::new("build/html");
        let found = resolve_rendered("index.html", ws, output).unwrap();
        assert_eq!(fs::read_to_string(found).unwrap(), "root");
        assert!(resolve_rendered("guide/intro.html", ws, output).is_some());
        assert!(resolve_rendered("", ws, output).is_none());
    }

    #[cfg(unix)]
    #[test]
    fn test_resolve_rendered_rejects_escape() {
        let dir = TempDir::new().unwrap();
        let outside = TempDir::new().unwrap();
        fs::write(outside.path().join("secret.html"), "").unwrap();
        fs::create_dir_all(dir.path().join("docs/build")).unwrap();
        std::os::unix::fs::symlink(outside.path(), dir.path().join("docs/build/html")).unwrap();

        let output = Path::new("build/html");
        assert!(resolve_rendered("docs/secret.html", dir.path(), output).is_none());
        assert!(resolve_rendered("docs/../../secret.html", dir.path(), output).is_none());
    }
}
