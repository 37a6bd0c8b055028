//! JSON data minification: every file under the data root is parsed and
//! re-emitted in compact form under `data/` at the output root, keeping its
//! relative path. Malformed JSON is a transform error, not a pass-through.

use std::fs;

use anyhow::Context;
use camino::Utf8Path;

use crate::config::EnvConfig;
use crate::transform::{SRC_DATA, glob_utf8, write_output};

const OUT_SUBDIR: &str = "data";

pub fn minify(config: &EnvConfig) -> anyhow::Result<()> {
    minify_from(Utf8Path::new(SRC_DATA), config)
}

pub(crate) fn minify_from(src_root: &Utf8Path, config: &EnvConfig) -> anyhow::Result<()> {
    let out_dir = config.output_root.join(OUT_SUBDIR);

    for entry in glob_utf8(src_root.join("**/*.json").as_str())? {
        let text = fs::read_to_string(&entry)?;
        let minified = minify_str(&text).with_context(|| format!("minifying {entry}"))?;

        let rel = entry.strip_prefix(src_root).unwrap_or(&entry);
        write_output(&out_dir.join(rel), minified)?;
    }

    Ok(())
}

pub(crate) fn minify_str(text: &str) -> serde_json::Result<String> {
    let value: serde_json::Value = serde_json::from_str(text)?;
    serde_json::to_string(&value)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Environment;
    use camino::Utf8PathBuf;

    #[test]
    fn test_minify_str_strips_whitespace() {
        let pretty = "{\n  \"name\": \"site\",\n  \"tags\": [1, 2, 3]\n}\n";
        assert_eq!(minify_str(pretty).unwrap(), r#"{"name":"site","tags":[1,2,3]}"#);
    }

    #[test]
    fn test_minify_str_rejects_malformed() {
        assert!(minify_str("{ \"name\": ").is_err());
    }

    #[test]
    fn test_minify_keeps_relative_layout() {
        let dir = tempfile::tempdir().unwrap();
        let src = Utf8PathBuf::try_from(dir.path().join("data")).unwrap();
        fs::create_dir_all(src.join("nested")).unwrap();
        fs::write(src.join("nested/feed.json"), "{ \"a\": 1 }").unwrap();

        let mut config = Environment::Development.config();
        config.output_root = Utf8PathBuf::try_from(dir.path().join("out")).unwrap();

        minify_from(&src, &config).unwrap();

        let out = config.output_root.join("data/nested/feed.json");
        assert_eq!(fs::read_to_string(out).unwrap(), r#"{"a":1}"#);
    }
}
