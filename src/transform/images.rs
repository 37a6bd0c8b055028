//! Image recompression and WebP conversion.
//!
//! `compress` re-encodes every jpeg (quality 85) and png under the image
//! source root into the output tree, copying gif and svg through untouched.
//! `webp` emits a lossless `.webp` twin for every jpeg and png. The two
//! tasks share the same output subtree but disjoint output names, so they
//! run as independent chains.

use std::fs;
use std::io::BufWriter;
use std::time::Instant;

use anyhow::Context;
use camino::{Utf8Path, Utf8PathBuf};
use image::codecs::jpeg::JpegEncoder;
use image::codecs::webp::WebPEncoder;
use indicatif::ProgressBar;
use rayon::iter::{IntoParallelRefIterator, ParallelIterator};

use crate::config::EnvConfig;
use crate::transform::{SRC_IMAGES, glob_utf8};

const OUT_SUBDIR: &str = "assets/images";
const JPEG_QUALITY: u8 = 85;

const COMPRESS_EXTS: &[&str] = &["jpg", "jpeg", "png", "gif", "svg"];
const WEBP_EXTS: &[&str] = &["jpg", "jpeg", "png"];

pub fn compress(config: &EnvConfig) -> anyhow::Result<()> {
    compress_from(Utf8Path::new(SRC_IMAGES), config)
}

pub(crate) fn compress_from(src_root: &Utf8Path, config: &EnvConfig) -> anyhow::Result<()> {
    let s = Instant::now();
    let out_dir = config.output_root.join(OUT_SUBDIR);
    let sources = image_sources(src_root, COMPRESS_EXTS)?;

    let bar = ProgressBar::new(sources.len() as u64);

    sources.par_iter().try_for_each(|path| -> anyhow::Result<()> {
        let rel = path.strip_prefix(src_root).unwrap_or(path);
        let out = out_dir.join(rel);

        if let Some(dir) = out.parent() {
            fs::create_dir_all(dir)?;
        }

        match path.extension().map(str::to_ascii_lowercase).as_deref() {
            Some("jpg" | "jpeg") => recompress_jpeg(path, &out)?,
            Some("png") => recompress_png(path, &out)?,
            // gif and svg pass through unchanged.
            _ => {
                fs::copy(path, &out)?;
            }
        }

        bar.inc(1);
        Ok(())
    })?;

    bar.finish_with_message(format!(
        "Compressed images {}",
        crate::clean::as_overhead(s)
    ));

    Ok(())
}

pub fn webp(config: &EnvConfig) -> anyhow::Result<()> {
    webp_from(Utf8Path::new(SRC_IMAGES), config)
}

pub(crate) fn webp_from(src_root: &Utf8Path, config: &EnvConfig) -> anyhow::Result<()> {
    let out_dir = config.output_root.join(OUT_SUBDIR);
    let sources = image_sources(src_root, WEBP_EXTS)?;

    sources.par_iter().try_for_each(|path| -> anyhow::Result<()> {
        let rel = path.strip_prefix(src_root).unwrap_or(path);
        let out = out_dir.join(rel).with_extension("webp");

        if let Some(dir) = out.parent() {
            fs::create_dir_all(dir)?;
        }

        encode_webp(path, &out)
    })
}

fn image_sources(src_root: &Utf8Path, extensions: &[&str]) -> anyhow::Result<Vec<Utf8PathBuf>> {
    let paths = glob_utf8(src_root.join("**/*").as_str())?;

    Ok(paths
        .into_iter()
        .filter(|path| {
            path.extension()
                .map(str::to_ascii_lowercase)
                .is_some_and(|ext| extensions.contains(&ext.as_str()))
        })
        .filter(|path| path.is_file())
        .collect())
}

fn recompress_jpeg(path: &Utf8Path, out: &Utf8Path) -> anyhow::Result<()> {
    let img = image::open(path).with_context(|| format!("decoding {path}"))?;
    let rgb = img.to_rgb8();

    let mut writer = BufWriter::new(fs::File::create(out)?);
    let mut encoder = JpegEncoder::new_with_quality(&mut writer, JPEG_QUALITY);
    encoder
        .encode_image(&rgb)
        .with_context(|| format!("encoding {out}"))?;

    Ok(())
}

fn recompress_png(path: &Utf8Path, out: &Utf8Path) -> anyhow::Result<()> {
    let img = image::open(path).with_context(|| format!("decoding {path}"))?;
    img.save_with_format(out, image::ImageFormat::Png)
        .with_context(|| format!("encoding {out}"))?;

    Ok(())
}

fn encode_webp(path: &Utf8Path, out: &Utf8Path) -> anyhow::Result<()> {
    let img = image::open(path).with_context(|| format!("decoding {path}"))?;
    let rgba = img.to_rgba8();

    let writer = BufWriter::new(fs::File::create(out)?);
    let encoder = WebPEncoder::new_lossless(writer);
    encoder
        .encode(
            rgba.as_raw(),
            rgba.width(),
            rgba.height(),
            image::ExtendedColorType::Rgba8,
        )
        .with_context(|| format!("encoding {out}"))?;

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Environment;
    use image::{ImageBuffer, Rgb};

    fn test_config(root: &std::path::Path) -> EnvConfig {
        let mut config = Environment::Development.config();
        config.output_root = Utf8PathBuf::try_from(root.join("out")).unwrap();
        config
    }

    fn image_tree(root: &std::path::Path) -> Utf8PathBuf {
        let src = Utf8PathBuf::try_from(root.join("images")).unwrap();
        fs::create_dir_all(src.join("icons")).unwrap();

        let pixels = ImageBuffer::from_pixel(4, 4, Rgb::<u8>([200, 30, 30]));
        pixels.save(src.join("photo.png").as_std_path()).unwrap();
        pixels.save(src.join("icons/logo.jpg").as_std_path()).unwrap();
        fs::write(src.join("icons/mark.svg"), "<svg></svg>").unwrap();

        src
    }

    #[test]
    fn test_compress_reencodes_and_copies() {
        let dir = tempfile::tempdir().unwrap();
        let src = image_tree(dir.path());
        let config = test_config(dir.path());

        compress_from(&src, &config).unwrap();

        let out_dir = config.output_root.join(OUT_SUBDIR);

        // Re-encoded outputs decode back to the same dimensions.
        let png = image::open(out_dir.join("photo.png").as_std_path()).unwrap();
        assert_eq!((png.width(), png.height()), (4, 4));
        assert!(out_dir.join("icons/logo.jpg").exists());

        // svg passes through byte for byte.
        let svg = fs::read_to_string(out_dir.join("icons/mark.svg")).unwrap();
        assert_eq!(svg, "<svg></svg>");
    }

    #[test]
    fn test_webp_twins_keep_directory_layout() {
        let dir = tempfile::tempdir().unwrap();
        let src = image_tree(dir.path());
        let config = test_config(dir.path());

        webp_from(&src, &config).unwrap();

        let out_dir = config.output_root.join(OUT_SUBDIR);
        assert!(out_dir.join("photo.webp").exists());
        assert!(out_dir.join("icons/logo.webp").exists());

        // svg never gets a webp twin.
        assert!(!out_dir.join("icons/mark.webp").exists());

        let webp = image::open(out_dir.join("photo.webp").as_std_path()).unwrap();
        assert_eq!((webp.width(), webp.height()), (4, 4));
    }
}
