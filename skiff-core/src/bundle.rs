//! Runtime bundle resolution - locates the self-contained interpreter,
//! bundled packages, and application entry point
//!
//! A bundle is a directory shipped next to the shell:
//!
//! - `runtime/` - self-contained Python runtime (`runtime/bin/python3` on
//!   unix, `runtime/python.exe` on windows)
//! - `packages/` - flat directory of installed dependency packages
//! - `app/main.py` - backend entry point
//!
//! An optional `runtime.json` at the bundle root overrides the interpreter
//! and entry-point locations with bundle-relative paths.

use serde::Deserialize;
use std::collections::HashMap;
use std::path::{Path, PathBuf};

const MANIFEST_NAME: &str = "runtime.json";

#[derive(Debug, Deserialize)]
struct BundleManifest {
    python: Option<String>,
    entrypoint: Option<String>,
}

#[derive(Debug, thiserror::Error)]
pub enum BundleError {
    #[error("Bundled runtime not found at {0}")]
    MissingRuntime(PathBuf),

    #[error("Backend entry point not found at {0}")]
    MissingEntrypoint(PathBuf),

    #[error("Failed to read bundle manifest {path}: {source}")]
    ManifestRead {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to parse bundle manifest {path}: {source}")]
    ManifestParse {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
}

/// Everything the supervisor needs to launch the backend once.
///
/// Immutable after construction; scoped to a single startup attempt.
#[derive(Debug, Clone)]
pub struct StartupContext {
    /// Launch command (interpreter path, entry-point path). The allocated
    /// port is appended as the final argument at spawn time.
    pub command: Vec<String>,
    /// Environment overrides overlaid onto the parent environment.
    pub env: HashMap<String, String>,
    /// Working directory for the child.
    pub cwd: PathBuf,
}

impl StartupContext {
    /// Resolve a context from a runtime bundle directory.
    pub fn from_bundle(root: &Path) -> Result<Self, BundleError> {
        let manifest = read_manifest(root)?;

        let python = match manifest.as_ref().and_then(|m| m.python.as_deref()) {
            Some(rel) => root.join(rel),
            None => default_python_path(root),
        };
        if !python.is_file() {
            return Err(BundleError::MissingRuntime(python));
        }

        let entrypoint = match manifest.as_ref().and_then(|m| m.entrypoint.as_deref()) {
            Some(rel) => root.join(rel),
            None => root.join("app").join("main.py"),
        };
        if !entrypoint.is_file() {
            return Err(BundleError::MissingEntrypoint(entrypoint));
        }

        let packages = root.join("packages");
        let mut env = HashMap::new();
        // No .pyc artifacts inside the (often read-only) bundle.
        env.insert("PYTHONDONTWRITEBYTECODE".to_string(), "1".to_string());
        env.insert(
            "PYTHONPATH".to_string(),
            packages.to_string_lossy().to_string(),
        );

        Ok(Self {
            command: vec![
                python.to_string_lossy().to_string(),
                entrypoint.to_string_lossy().to_string(),
            ],
            env,
            cwd: root.to_path_buf(),
        })
    }
}

fn default_python_path(root: &Path) -> PathBuf {
    if cfg!(windows) {
        root.join("runtime").join("python.exe")
    } else {
        root.join("runtime").join("bin").join("python3")
    }
}

fn read_manifest(root: &Path) -> Result<Option<BundleManifest>, BundleError> {
    let path = root.join(MANIFEST_NAME);
    if !path.exists() {
        return Ok(None);
    }

    let raw = std::fs::read_to_string(&path).map_err(|source| BundleError::ManifestRead {
        path: path.clone(),
        source,
    })?;
    let manifest =
        serde_json::from_str(&raw).map_err(|source| BundleError::ManifestParse {
            path: path.clone(),
            source,
        })?;
    Ok(Some(manifest))
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn write_file(path: &Path) {
        std::fs::create_dir_all(path.parent().unwrap()).unwrap();
        std::fs::write(path, "").unwrap();
    }

    fn scaffold_bundle(root: &Path) {
        write_file(&default_python_path(root));
        write_file(&root.join("app").join("main.py"));
        std::fs::create_dir_all(root.join("packages")).unwrap();
    }

    #[test]
    fn resolves_conventional_layout() {
        let dir = TempDir::new().unwrap();
        scaffold_bundle(dir.path());

        let context = StartupContext::from_bundle(dir.path()).unwrap();
        assert_eq!(context.command.len(), 2);
        assert!(context.command[0].contains("runtime"));
        assert!(context.command[1].ends_with("main.py"));
        assert_eq!(
            context.env.get("PYTHONDONTWRITEBYTECODE").map(String::as_str),
            Some("1")
        );
        assert!(context.env.get("PYTHONPATH").unwrap().ends_with("packages"));
        assert_eq!(context.cwd, dir.path());
    }

    #[test]
    fn manifest_overrides_conventional_paths() {
        let dir = TempDir::new().unwrap();
        write_file(&dir.path().join("rt").join("py"));
        write_file(&dir.path().join("srv").join("serve.py"));
        std::fs::write(
            dir.path().join(MANIFEST_NAME),
            r#"{"python": "rt/py", "entrypoint": "srv/serve.py"}"#,
        )
        .unwrap();

        let context = StartupContext::from_bundle(dir.path()).unwrap();
        assert!(context.command[0].ends_with("py"));
        assert!(context.command[1].ends_with("serve.py"));
    }

    #[test]
    fn missing_runtime_is_reported() {
        let dir = TempDir::new().unwrap();
        write_file(&dir.path().join("app").join("main.py"));

        let err = StartupContext::from_bundle(dir.path()).unwrap_err();
        assert!(matches!(err, BundleError::MissingRuntime(_)));
    }

    #[test]
    fn missing_entrypoint_is_reported() {
        let dir = TempDir::new().unwrap();
        write_file(&default_python_path(dir.path()));

        let err = StartupContext::from_bundle(dir.path()).unwrap_err();
        assert!(matches!(err, BundleError::MissingEntrypoint(_)));
    }

    #[test]
    fn malformed_manifest_is_reported() {
        let dir = TempDir::new().unwrap();
        scaffold_bundle(dir.path());
        std::fs::write(dir.path().join(MANIFEST_NAME), "not json").unwrap();

        let err = StartupContext::from_bundle(dir.path()).unwrap_err();
        assert!(matches!(err, BundleError::ManifestParse { .. }));
    }
}
