use std::path::{Path, PathBuf};

/// Packaged layout: the runtime bundle sits in `resources/backend` next to
/// the shell executable.
pub fn packaged_bundle_dir_from_exe(exe_path: &Path) -> Option<PathBuf> {
    exe_path
        .parent()
        .map(|dir| dir.join("resources").join("backend"))
}

/// If the shell is being run from a path under a `target/` directory,
/// return the repo root directory (the parent of `target/`).
pub fn repo_root_from_exe(exe_path: &Path) -> Option<PathBuf> {
    let mut cur = exe_path;
    loop {
        if cur.file_name().is_some_and(|n| n == "target") {
            return cur.parent().map(|p| p.to_path_buf());
        }
        cur = cur.parent()?;
    }
}

/// Default bundle dir for debug builds when running from a source checkout.
///
/// Example: `{repo}/local-dev/bundle`
pub fn debug_default_bundle_from_exe(exe_path: &Path) -> Option<PathBuf> {
    repo_root_from_exe(exe_path).map(|root| root.join("local-dev").join("bundle"))
}

/// Resolve the bundle directory for this invocation: packaged layout first,
/// then the source-checkout fallback in debug builds.
pub fn default_bundle_dir() -> Option<PathBuf> {
    let exe = std::env::current_exe().ok()?;

    if let Some(packaged) = packaged_bundle_dir_from_exe(&exe)
        && packaged.is_dir()
    {
        return Some(packaged);
    }

    if cfg!(debug_assertions)
        && let Some(dev) = debug_default_bundle_from_exe(&exe)
        && dev.is_dir()
    {
        return Some(dev);
    }

    None
}
