//! Script bundling and minification via the `esbuild` binary, which must be
//! available on the PATH. The bundle task resolves and concatenates the
//! module graph of the fixed entry point; the minify task re-reads the
//! emitted bundle and writes the `.min.js` twin, so it must run after the
//! bundle task in the chain.

use std::process::{Command, Stdio};

use anyhow::Context;
use camino::Utf8Path;

use crate::config::EnvConfig;
use crate::transform::SRC_SCRIPTS;

const ENTRY: &str = "script.js";
const OUT_SUBDIR: &str = "assets/js";

pub fn bundle(config: &EnvConfig) -> anyhow::Result<()> {
    let entry = Utf8Path::new(SRC_SCRIPTS).join(ENTRY);
    let out = config.output_root.join(OUT_SUBDIR).join("bundle.js");

    // Production bundles are minified in place, like a production-mode
    // bundler build; development bundles stay readable.
    run_esbuild(bundle_args(&entry, &out, config.environment.is_production()))
}

pub fn minify(config: &EnvConfig) -> anyhow::Result<()> {
    let bundle = config.output_root.join(OUT_SUBDIR).join("bundle.js");
    let out = config.output_root.join(OUT_SUBDIR).join("bundle.min.js");

    anyhow::ensure!(bundle.exists(), "missing bundle: {bundle}");

    run_esbuild(minify_args(&bundle, &out))
}

pub(crate) fn bundle_args(entry: &Utf8Path, out: &Utf8Path, minify: bool) -> Vec<String> {
    let mut args = vec![
        entry.to_string(),
        "--bundle".to_string(),
        format!("--outfile={out}"),
    ];

    if minify {
        args.push("--minify".to_string());
    }

    args
}

pub(crate) fn minify_args(bundle: &Utf8Path, out: &Utf8Path) -> Vec<String> {
    vec![
        bundle.to_string(),
        "--minify".to_string(),
        format!("--outfile={out}"),
    ]
}

fn run_esbuild(args: Vec<String>) -> anyhow::Result<()> {
    let output = Command::new("esbuild")
        .args(&args)
        .stdout(Stdio::null())
        .stderr(Stdio::piped())
        .output()
        .context("esbuild invocation failed (is esbuild on the PATH?)")?;

    if !output.status.success() {
        anyhow::bail!("esbuild: {}", String::from_utf8_lossy(&output.stderr));
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_bundle_args_modes() {
        let entry = Utf8Path::new("src/assets/js/script.js");
        let out = Utf8Path::new("dist/assets/js/bundle.js");

        let dev = bundle_args(entry, out, false);
        assert_eq!(
            dev,
            vec![
                "src/assets/js/script.js",
                "--bundle",
                "--outfile=dist/assets/js/bundle.js",
            ],
        );

        let prod = bundle_args(entry, out, true);
        assert!(prod.contains(&"--minify".to_string()));
    }

    #[test]
    fn test_minify_args() {
        let args = minify_args(
            Utf8Path::new("prod/assets/js/bundle.js"),
            Utf8Path::new("prod/assets/js/bundle.min.js"),
        );

        assert_eq!(
            args,
            vec![
                "prod/assets/js/bundle.js",
                "--minify",
                "--outfile=prod/assets/js/bundle.min.js",
            ],
        );
    }
}
