use crate::library;
use anyhow::{Context, Result};
use image::DynamicImage;
use image::imageops::FilterType;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;

pub const ART_SIZE: u32 = 200;

#[derive(Debug, Default)]
pub struct AlbumArtCache {
    images: HashMap<PathBuf, Arc<DynamicImage>>,
}

impl AlbumArtCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get_or_load(&mut self, path: &Path) -> Option<Arc<DynamicImage>> {
        if let Some(hit) = self.images.get(path) {
            return Some(Arc::clone(hit));
        }

        let Some(bytes) = library::embedded_cover_art(path) else {
            log::debug!("no embedded art in {}", path.display());
            return None;
        };

        match decode_cover(&bytes) {
            Ok(image) => {
                let image = Arc::new(image);
                self.images.insert(path.to_path_buf(), Arc::clone(&image));
                Some(image)
            }
            Err(err) => {
                log::debug!("album art for {} unusable: {err:#}", path.display());
                None
            }
        }
    }

    #[cfg(test)]
    pub(crate) fn insert(&mut self, path: PathBuf, image: DynamicImage) -> Arc<DynamicImage> {
        let image = Arc::new(image);
        self.images.insert(path, Arc::clone(&image));
        image
    }

    #[cfg(test)]
    pub(crate) fn len(&self) -> usize {
        self.images.len()
    }

    pub fn clear(&mut self) {
        self.images.clear();
    }
}

pub fn decode_cover(bytes: &[u8]) -> Result<DynamicImage> {
    let image = image::load_from_memory(bytes).context("failed to decode cover image")?;
    Ok(image.resize_exact(ART_SIZE, ART_SIZE, FilterType::Triangle))
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::{ImageFormat, Rgb, RgbImage};
    use std::fs;
    use std::io::Cursor;
    use tempfile::tempdir;

    fn png_bytes(width: u32, height: u32) -> Vec<u8> {
        let image = DynamicImage::ImageRgb8(RgbImage::from_pixel(width, height, Rgb([200, 40, 40])));
        let mut out = Cursor::new(Vec::new());
        image
            .write_to(&mut out, ImageFormat::Png)
            .expect("encode png");
        out.into_inner()
    }

    #[test]
    fn decode_resizes_to_art_size() {
        let image = decode_cover(&png_bytes(640, 480)).expect("decode");
        assert_eq!(image.width(), ART_SIZE);
        assert_eq!(image.height(), ART_SIZE);
    }

    #[test]
    fn decode_rejects_garbage() {
        assert!(decode_cover(b"not an image").is_err());
    }

    #[test]
    fn files_without_art_are_not_cached() {
        let dir = tempdir().expect("tempdir");
        let track = dir.path().join("plain.mp3");
        fs::write(&track, b"no tags here").expect("write");

        let mut cache = AlbumArtCache::new();
        assert!(cache.get_or_load(&track).is_none());
        assert_eq!(cache.len(), 0);
    }

    #[test]
    fn hits_return_the_same_image() {
        let mut cache = AlbumArtCache::new();
        let path = PathBuf::from("cached.flac");
        let stored = cache.insert(path.clone(), decode_cover(&png_bytes(10, 10)).expect("decode"));

        let hit = cache.get_or_load(&path).expect("cache hit");
        assert!(Arc::ptr_eq(&stored, &hit));
        assert_eq!(cache.len(), 1);

        cache.clear();
        assert_eq!(cache.len(), 0);
    }
}
