//! Stylesheet compilation and minification.
//!
//! `compile` turns every non-partial `.scss` entry at the source root into
//! expanded CSS under `assets/css`; partials (`_*.scss`) are inlined into
//! whichever entry imports them and never emitted standalone. Entries may
//! import whole directories of partials with a glob (`@import
//! "parts/**/*.scss"`), expanded before compilation. `minify` then
//! re-reads the compiled CSS from disk and emits a compressed `.min.css`
//! twin with a `@charset` header, which is why it must run after `compile`
//! in the chain.

use std::fs;

use anyhow::Context;
use camino::Utf8Path;

use crate::config::EnvConfig;
use crate::transform::{SRC_STYLES, glob_utf8, write_output};

const OUT_SUBDIR: &str = "assets/css";

pub fn compile(config: &EnvConfig) -> anyhow::Result<()> {
    compile_from(Utf8Path::new(SRC_STYLES), config)
}

pub(crate) fn compile_from(src_root: &Utf8Path, config: &EnvConfig) -> anyhow::Result<()> {
    let out_dir = config.output_root.join(OUT_SUBDIR);

    for entry in glob_utf8(src_root.join("[!_]*.scss").as_str())? {
        let options = grass::Options::default()
            .style(grass::OutputStyle::Expanded)
            .load_path(src_root);

        let source = fs::read_to_string(&entry)?;
        let source = expand_glob_imports(&source, src_root)?;

        let css = grass::from_string(source, &options)
            .map_err(|e| anyhow::anyhow!("{e}"))
            .with_context(|| format!("compiling {entry}"))?;

        let name = entry
            .file_stem()
            .with_context(|| format!("stylesheet without a stem: {entry}"))?;

        write_output(&out_dir.join(name).with_extension("css"), css)?;
    }

    Ok(())
}

/// Rewrite glob imports (`@import "parts/**/*.scss"`) into one import per
/// matched partial, since the compiler itself resolves only literal paths.
/// Matches are expanded in glob order, so partial ordering is stable.
pub(crate) fn expand_glob_imports(source: &str, src_root: &Utf8Path) -> anyhow::Result<String> {
    let mut out = String::with_capacity(source.len());

    for line in source.lines() {
        match glob_import_target(line) {
            Some(target) => {
                for path in glob_utf8(src_root.join(target).as_str())? {
                    if path.extension() != Some("scss") {
                        continue;
                    }

                    let rel = path.strip_prefix(src_root).unwrap_or(&path);
                    out.push_str(&format!("@import \"{}\";\n", rel.with_extension("")));
                }
            }
            None => {
                out.push_str(line);
                out.push('\n');
            }
        }
    }

    Ok(out)
}

/// A line is a glob import when it is an `@import` or `@use` whose quoted
/// target contains a `*`.
fn glob_import_target(line: &str) -> Option<&str> {
    let rest = line
        .trim_start()
        .strip_prefix("@import")
        .or_else(|| line.trim_start().strip_prefix("@use"))?;

    let start = rest.find('"')? + 1;
    let end = rest[start..].find('"')? + start;
    let target = &rest[start..end];

    target.contains('*').then_some(target)
}

pub fn minify(config: &EnvConfig) -> anyhow::Result<()> {
    let out_dir = config.output_root.join(OUT_SUBDIR);

    for entry in glob_utf8(out_dir.join("*.css").as_str())? {
        if entry.as_str().ends_with(".min.css") {
            continue;
        }

        let css = fs::read_to_string(&entry)?;
        let minified = minify_str(&css).with_context(|| format!("minifying {entry}"))?;

        let name = entry
            .file_stem()
            .with_context(|| format!("stylesheet without a stem: {entry}"))?;

        write_output(&out_dir.join(format!("{name}.min.css")), minified)?;
    }

    Ok(())
}

/// Compress a stylesheet and prepend the `@charset` header. Plain CSS is
/// valid SCSS, so the compiler doubles as the minifier.
pub(crate) fn minify_str(css: &str) -> anyhow::Result<String> {
    let options = grass::Options::default().style(grass::OutputStyle::Compressed);
    let minified = grass::from_string(css, &options).map_err(|e| anyhow::anyhow!("{e}"))?;

    Ok(format!("@charset \"utf-8\";\n{minified}"))
}
