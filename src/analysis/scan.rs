//! Repository traversal: which Go files take part in the analysis.

use anyhow::{Context, Result, bail};
use ignore::WalkBuilder;
use std::path::{Path, PathBuf};

/// Directory holding the generated protocol message types. It is the catalog,
/// not analyzed source, so the walker skips it.
pub const PROTO_DIR: &str = "internal/protobuf";

/// Directory holding the packet handler implementations.
pub const HANDLERS_DIR: &str = "internal/answer";

#[derive(Debug, Clone)]
pub struct GoFile {
    pub rel_path: String,
    pub abs_path: PathBuf,
    pub source: String,
}

/// Locate the module root by walking upward until a `go.mod` appears. The
/// start path is resolved lexically and need not exist; only an ancestor with
/// a `go.mod` has to.
pub fn find_repo_root(start: &Path) -> Result<PathBuf> {
    let absolute = if start.is_absolute() {
        start.to_path_buf()
    } else {
        std::env::current_dir()
            .context("resolve working directory")?
            .join(start)
    };
    let absolute = lexical_normalize(&absolute);
    let mut current = absolute.as_path();
    loop {
        if current.join("go.mod").is_file() {
            return Ok(current.to_path_buf());
        }
        match current.parent() {
            Some(parent) => current = parent,
            None => bail!("go.mod not found from {}", start.display()),
        }
    }
}

/// Collapse `.` and `..` components without touching the filesystem.
fn lexical_normalize(path: &Path) -> PathBuf {
    let mut normalized = PathBuf::new();
    for component in path.components() {
        match component {
            std::path::Component::CurDir => {}
            std::path::Component::ParentDir => {
                normalized.pop();
            }
            other => normalized.push(other.as_os_str()),
        }
    }
    normalized
}

/// Read the `module` directive from the repo's `go.mod`.
pub fn load_module_path(repo_root: &Path) -> Result<String> {
    let path = repo_root.join("go.mod");
    let data = crate::util::read_to_string(&path)?;
    for line in data.lines() {
        let line = line.trim();
        if let Some(rest) = line.strip_prefix("module ") {
            return Ok(rest.trim().to_string());
        }
    }
    bail!("module path not found in {}", path.display())
}

/// Import path of the package containing `rel_path`.
pub fn package_import_path(module_path: &str, rel_path: &str) -> String {
    match rel_path.rsplit_once('/') {
        Some((dir, _)) => format!("{module_path}/{dir}"),
        None => module_path.to_string(),
    }
}

/// Collect every non-test Go source file, skipping `.git`, `vendor` and the
/// generated protocol directory. Results come back sorted by relative path so
/// the run is deterministic regardless of filesystem order.
pub fn scan_go_files(repo_root: &Path) -> Result<Vec<GoFile>> {
    let proto_dir = repo_root.join(PROTO_DIR);
    let walker = WalkBuilder::new(repo_root)
        .ignore(false)
        .git_ignore(false)
        .git_global(false)
        .git_exclude(false)
        .parents(false)
        .hidden(false)
        .sort_by_file_path(|a, b| a.cmp(b))
        .filter_entry(move |entry| {
            let is_dir = entry.file_type().map(|ft| ft.is_dir()).unwrap_or(false);
            if !is_dir {
                return true;
            }
            let name = entry.file_name();
            if name == ".git" || name == "vendor" {
                return false;
            }
            entry.path() != proto_dir
        })
        .build();

    let mut files = Vec::new();
    for entry in walker {
        let entry = entry.context("walk repository")?;
        if !entry.file_type().map(|ft| ft.is_file()).unwrap_or(false) {
            continue;
        }
        let path = entry.path();
        if path.extension().and_then(|ext| ext.to_str()) != Some("go") {
            continue;
        }
        let rel_path = crate::util::normalize_rel_path(repo_root, path)?;
        if rel_path.ends_with("_test.go") {
            continue;
        }
        let source = crate::util::read_to_string(path)?;
        files.push(GoFile {
            rel_path,
            abs_path: path.to_path_buf(),
            source,
        });
    }
    Ok(files)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    fn write(root: &Path, rel: &str, content: &str) {
        let path = root.join(rel);
        fs::create_dir_all(path.parent().unwrap()).unwrap();
        fs::write(path, content).unwrap();
    }

    #[test]
    fn skips_tests_vendor_and_proto_dir() {
        let dir = tempfile::tempdir().unwrap();
        let root = dir.path();
        write(root, "go.mod", "module game.example/server\n");
        write(root, "main.go", "package main\n");
        write(root, "main_test.go", "package main\n");
        write(root, "vendor/dep/dep.go", "package dep\n");
        write(root, "internal/protobuf/gen.go", "package protobuf\n");
        write(root, "internal/answer/login.go", "package answer\n");
        write(root, "docs/readme.md", "hi\n");

        let files = scan_go_files(root).unwrap();
        let rels: Vec<&str> = files.iter().map(|f| f.rel_path.as_str()).collect();
        assert_eq!(rels, vec!["internal/answer/login.go", "main.go"]);
    }

    #[test]
    fn finds_repo_root_upward() {
        let dir = tempfile::tempdir().unwrap();
        let root = dir.path();
        write(root, "go.mod", "module game.example/server\n");
        write(root, "cmd/server/main.go", "package main\n");

        let found = find_repo_root(&root.join("cmd/server")).unwrap();
        assert_eq!(found, root.to_path_buf());
        assert_eq!(
            load_module_path(&found).unwrap(),
            "game.example/server"
        );
    }

    #[test]
    fn start_path_does_not_need_to_exist() {
        let dir = tempfile::tempdir().unwrap();
        let root = dir.path();
        write(root, "go.mod", "module game.example/server\n");

        // The conventional main location may be absent; an existing ancestor
        // with go.mod is enough.
        let found = find_repo_root(&root.join("cmd/server")).unwrap();
        assert_eq!(found, root.to_path_buf());

        let found = find_repo_root(&root.join("cmd/./server/../server")).unwrap();
        assert_eq!(found, root.to_path_buf());
    }

    #[test]
    fn derives_package_import_paths() {
        assert_eq!(
            package_import_path("game.example/server", "internal/answer/login.go"),
            "game.example/server/internal/answer"
        );
        assert_eq!(
            package_import_path("game.example/server", "main.go"),
            "game.example/server"
        );
    }
}
