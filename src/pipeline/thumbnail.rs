//! Slide thumbnails that outlive the working area.
//!
//! Images are PNG-encoded because slides are mostly text and flat colour,
//! where lossy artefacts are most visible. A thumbnail failure never fails
//! the slide; it is logged and the reference falls back to the file name.

use crate::config::ThumbnailMode;
use crate::output::ThumbnailRef;
use crate::pipeline::rasterize::{page_file_name, SlideImage};
use base64::{engine::general_purpose::STANDARD, Engine as _};
use image::imageops::FilterType;
use std::io::Cursor;
use std::path::Path;
use tracing::{debug, warn};

/// Build the thumbnail reference for `image` under `mode`.
pub async fn make_thumbnail(image: &SlideImage, mode: &ThumbnailMode) -> ThumbnailRef {
    let mut thumb = ThumbnailRef {
        file_name: page_file_name(image.index),
        ..Default::default()
    };

    match mode {
        ThumbnailMode::Reference => {}
        ThumbnailMode::Embed { max_width } => {
            let path = image.path.clone();
            let max_width = *max_width;
            match tokio::task::spawn_blocking(move || encode_data_uri(&path, max_width)).await {
                Ok(Ok(uri)) => thumb.data_uri = Some(uri),
                Ok(Err(e)) => warn!("Slide {}: thumbnail encoding failed: {}", image.index, e),
                Err(e) => warn!("Slide {}: thumbnail task panicked: {}", image.index, e),
            }
        }
        ThumbnailMode::Export(dir) => {
            let target = dir.join(&thumb.file_name);
            let copied = async {
                tokio::fs::create_dir_all(dir).await?;
                tokio::fs::copy(&image.path, &target).await
            }
            .await;
            match copied {
                Ok(_) => thumb.path = Some(target),
                Err(e) => warn!(
                    "Slide {}: could not export thumbnail to {}: {}",
                    image.index,
                    dir.display(),
                    e
                ),
            }
        }
    }

    thumb
}

/// Downscale to at most `max_width` pixels wide and encode as a PNG data URI.
pub fn encode_data_uri(path: &Path, max_width: u32) -> Result<String, image::ImageError> {
    let img = image::open(path)?;
    let img = if img.width() > max_width && max_width > 0 {
        let height = (u64::from(img.height()) * u64::from(max_width) / u64::from(img.width()))
            .max(1) as u32;
        img.resize_exact(max_width, height, FilterType::Triangle)
    } else {
        img
    };

    let mut buf = Vec::new();
    img.write_to(&mut Cursor::new(&mut buf), image::ImageFormat::Png)?;
    let b64 = STANDARD.encode(&buf);
    debug!("Encoded thumbnail → {} bytes base64", b64.len());
    Ok(format!("data:image/png;base64,{b64}"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::{DynamicImage, Rgba, RgbaImage};
    use std::path::PathBuf;

    fn write_png(dir: &Path, w: u32, h: u32) -> PathBuf {
        let path = dir.join("src.png");
        DynamicImage::ImageRgba8(RgbaImage::from_pixel(w, h, Rgba([0, 0, 255, 255])))
            .save(&path)
            .unwrap();
        path
    }

    #[test]
    fn data_uri_is_downscaled_png() {
        let dir = tempfile::tempdir().unwrap();
        let path = write_png(dir.path(), 640, 360);
        let uri = encode_data_uri(&path, 320).unwrap();
        let b64 = uri.strip_prefix("data:image/png;base64,").unwrap();
        let bytes = STANDARD.decode(b64).unwrap();
        let decoded = image::load_from_memory(&bytes).unwrap();
        assert_eq!((decoded.width(), decoded.height()), (320, 180));
    }

    #[test]
    fn small_images_are_not_upscaled() {
        let dir = tempfile::tempdir().unwrap();
        let path = write_png(dir.path(), 100, 50);
        let uri = encode_data_uri(&path, 320).unwrap();
        let bytes = STANDARD
            .decode(uri.trim_start_matches("data:image/png;base64,"))
            .unwrap();
        assert_eq!(image::load_from_memory(&bytes).unwrap().width(), 100);
    }

    #[tokio::test]
    async fn reference_mode_records_name_only() {
        let slide = SlideImage {
            index: 7,
            path: PathBuf::from("/nowhere/slide-7.png"),
        };
        let t = make_thumbnail(&slide, &ThumbnailMode::Reference).await;
        assert_eq!(t.file_name, "slide-0007.png");
        assert!(t.path.is_none() && t.data_uri.is_none());
    }

    #[tokio::test]
    async fn export_copies_into_directory() {
        let dir = tempfile::tempdir().unwrap();
        let src = write_png(dir.path(), 8, 8);
        let out = dir.path().join("thumbs");
        let slide = SlideImage { index: 2, path: src };
        let t = make_thumbnail(&slide, &ThumbnailMode::Export(out.clone())).await;
        assert_eq!(t.path, Some(out.join("slide-0002.png")));
        assert!(out.join("slide-0002.png").is_file());
    }

    #[tokio::test]
    async fn unreadable_image_degrades_to_reference() {
        let slide = SlideImage {
            index: 1,
            path: PathBuf::from("/nowhere/slide-1.png"),
        };
        let t = make_thumbnail(&slide, &ThumbnailMode::Embed { max_width: 100 }).await;
        assert!(t.data_uri.is_none());
        assert_eq!(t.file_name, "slide-0001.png");
    }
}
