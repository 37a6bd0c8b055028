//! Template rendering.
//!
//! `render` turns every non-partial template under the source root into an
//! `.html` page at the output root. The render context is the `data.json`
//! file at the source root (parsed fresh on every invocation, never cached)
//! merged with the environment's base paths under `path`.
//!
//! `fragments` is the production-only pass: it re-renders the templates
//! under `play/` as `.inc` fragments for server-side inclusion, skipping
//! any source whose stem starts with `panel`. In development it completes
//! immediately without touching the filesystem.

use std::fs;

use anyhow::Context;
use camino::Utf8Path;
use minijinja::context;

use crate::config::EnvConfig;
use crate::transform::{SRC_TEMPLATES, glob_utf8, is_partial, write_output};

/// Subdirectory of the template root holding fragment sources.
const FRAGMENT_SUBDIR: &str = "play";

pub fn render(config: &EnvConfig) -> anyhow::Result<()> {
    render_from(Utf8Path::new(SRC_TEMPLATES), config)
}

pub(crate) fn render_from(src_root: &Utf8Path, config: &EnvConfig) -> anyhow::Result<()> {
    let env = loader_env(src_root);
    let data = load_data(src_root)?;

    let ctx = context! {
        path => path_context(config),
        ..minijinja::Value::from_serialize(&data)
    };

    for source in glob_utf8(src_root.join("**/*.html").as_str())? {
        let rel = source
            .strip_prefix(src_root)
            .unwrap_or(&source)
            .to_path_buf();

        if is_partial(&rel) {
            continue;
        }

        let html = env
            .get_template(rel.as_str())?
            .render(&ctx)
            .with_context(|| format!("rendering {source}"))?;

        write_output(&config.output_root.join(&rel), html)?;
    }

    Ok(())
}

pub fn fragments(config: &EnvConfig) -> anyhow::Result<()> {
    fragments_from(Utf8Path::new(SRC_TEMPLATES), config)
}

pub(crate) fn fragments_from(src_root: &Utf8Path, config: &EnvConfig) -> anyhow::Result<()> {
    // Fragment rendering is a production-only optimization.
    if !config.environment.is_production() {
        return Ok(());
    }

    let env = loader_env(src_root);
    let play = src_root.join(FRAGMENT_SUBDIR);
    let ctx = context! { path => path_context(config) };

    for source in glob_utf8(play.join("**/*.html").as_str())? {
        let rel = source.strip_prefix(&play).unwrap_or(&source).to_path_buf();

        if !is_fragment_source(&rel) {
            continue;
        }

        let name = Utf8Path::new(FRAGMENT_SUBDIR).join(&rel);
        let inc = env
            .get_template(name.as_str())?
            .render(&ctx)
            .with_context(|| format!("rendering {source}"))?;

        write_output(&config.output_root.join(rel.with_extension("inc")), inc)?;
    }

    Ok(())
}

/// Fragments follow the partial convention and additionally exclude the
/// `panel*` sources, which are only ever rendered as full pages.
pub(crate) fn is_fragment_source(rel: &Utf8Path) -> bool {
    if is_partial(rel) {
        return false;
    }

    !rel.file_stem().is_some_and(|stem| stem.starts_with("panel"))
}

fn loader_env(src_root: &Utf8Path) -> minijinja::Environment<'static> {
    let mut env = minijinja::Environment::new();
    env.set_loader(minijinja::path_loader(src_root));
    // Sources author their own markup; context values like the base paths
    // must land in the output verbatim, not HTML-escaped.
    env.set_auto_escape_callback(|_| minijinja::AutoEscape::None);
    env
}

/// Parse the template context data file. Absent file means an empty
/// context, a malformed one is a transform error.
fn load_data(src_root: &Utf8Path) -> anyhow::Result<serde_json::Value> {
    let path = src_root.join("data.json");

    if !path.exists() {
        return Ok(serde_json::Value::Object(Default::default()));
    }

    let text = fs::read_to_string(&path)?;
    serde_json::from_str(&text).with_context(|| format!("parsing {path}"))
}

fn path_context(config: &EnvConfig) -> minijinja::Value {
    context! {
        absolute => config.base_path.absolute,
        relative => config.base_path.relative.as_str(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Environment;
    use camino::Utf8PathBuf;

    fn test_config(env: Environment, root: &std::path::Path) -> EnvConfig {
        let mut config = env.config();
        config.output_root = Utf8PathBuf::try_from(root.join("out")).unwrap();
        fs::create_dir_all(&config.output_root).unwrap();
        config
    }

    fn template_tree(root: &std::path::Path) -> Utf8PathBuf {
        let src = Utf8PathBuf::try_from(root.join("templates")).unwrap();
        fs::create_dir_all(src.join("play")).unwrap();

        fs::write(src.join("_head.html"), "<title>{{ title }}</title>").unwrap();
        fs::write(
            src.join("index.html"),
            "{% include '_head.html' %}<p>{{ path.relative }}</p>",
        )
        .unwrap();
        fs::write(src.join("play/panel.html"), "<aside>panel</aside>").unwrap();
        fs::write(src.join("play/other.html"), "<section>{{ path.absolute }}</section>").unwrap();
        fs::write(src.join("data.json"), r#"{ "title": "Home" }"#).unwrap();

        src
    }

    #[test]
    fn test_render_emits_pages_not_partials() {
        let dir = tempfile::tempdir().unwrap();
        let src = template_tree(dir.path());
        let config = test_config(Environment::Development, dir.path());

        render_from(&src, &config).unwrap();

        let html = fs::read_to_string(config.output_root.join("index.html")).unwrap();
        assert!(html.contains("<title>Home</title>"));

        // Base paths render verbatim, never entity-escaped.
        assert!(html.contains("<p>/</p>"));
        assert!(!html.contains("&#x2f;"));

        // Partials are inlined, never emitted standalone.
        assert!(!config.output_root.join("_head.html").exists());
    }

    #[test]
    fn test_fragments_noop_in_development() {
        let dir = tempfile::tempdir().unwrap();
        let src = template_tree(dir.path());
        let config = test_config(Environment::Development, dir.path());

        fragments_from(&src, &config).unwrap();

        // Zero filesystem writes.
        let entries: Vec<_> = fs::read_dir(&config.output_root).unwrap().collect();
        assert!(entries.is_empty());
    }

    #[test]
    fn test_fragments_skip_panel_in_production() {
        let dir = tempfile::tempdir().unwrap();
        let src = template_tree(dir.path());
        let config = test_config(Environment::Production, dir.path());

        fragments_from(&src, &config).unwrap();

        let inc = fs::read_to_string(config.output_root.join("other.inc")).unwrap();
        assert!(inc.contains("http://localhost:3000"));
        assert!(!inc.contains("&#x2f;"));

        assert!(!config.output_root.join("panel.inc").exists());
    }

    #[test]
    fn test_is_fragment_source() {
        assert!(is_fragment_source(Utf8Path::new("other.html")));
        assert!(is_fragment_source(Utf8Path::new("nested/card.html")));
        assert!(!is_fragment_source(Utf8Path::new("panel.html")));
        assert!(!is_fragment_source(Utf8Path::new("panel-wide.html")));
        assert!(!is_fragment_source(Utf8Path::new("_shared.html")));
    }

    #[test]
    fn test_load_data_missing_file_is_empty_context() {
        let dir = tempfile::tempdir().unwrap();
        let src = Utf8PathBuf::try_from(dir.path().to_path_buf()).unwrap();

        let data = load_data(&src).unwrap();
        assert!(data.as_object().is_some_and(|o| o.is_empty()));
    }
}
