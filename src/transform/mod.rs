//! Transform tasks, one module per asset class. Every task reads a fixed
//! source glob, applies exactly one external transformation, and writes
//! under the environment's output root. Tasks keep no state between runs.

pub mod data;
pub mod images;
pub mod scripts;
pub mod styles;
pub mod templates;

use std::fs;

use camino::{Utf8Path, Utf8PathBuf};

pub(crate) const SRC_STYLES: &str = "src/assets/scss";
pub(crate) const SRC_TEMPLATES: &str = "src/templates";
pub(crate) const SRC_SCRIPTS: &str = "src/assets/js";
pub(crate) const SRC_IMAGES: &str = "src/assets/images";
pub(crate) const SRC_DATA: &str = "src/data";

/// Run a glob and collect UTF-8 paths, surfacing pattern and traversal
/// errors immediately.
pub(crate) fn glob_utf8(pattern: &str) -> anyhow::Result<Vec<Utf8PathBuf>> {
    let mut paths = Vec::new();

    for entry in glob::glob(pattern)? {
        paths.push(Utf8PathBuf::try_from(entry?)?);
    }

    Ok(paths)
}

/// Write a finished artifact, creating parent directories on demand.
pub(crate) fn write_output(path: &Utf8Path, bytes: impl AsRef<[u8]>) -> std::io::Result<()> {
    if let Some(dir) = path.parent() {
        fs::create_dir_all(dir)?;
    }

    fs::write(path, bytes)
}

/// Source files and directories prefixed with `_` are partials; they are
/// loadable from other sources but never compiled to a standalone output.
pub(crate) fn is_partial(path: &Utf8Path) -> bool {
    path.components()
        .any(|c| c.as_str().starts_with('_'))
}
