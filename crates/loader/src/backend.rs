//! Reference implementations of the host collaborators.
//!
//! `ImageFileDecoder` reads images from disk with the `image` crate,
//! `MemoryTextureCache` stands in for a GPU texture cache and
//! `MemoryFrameCache` records sprite-sheet registrations.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::{Mutex, MutexGuard, PoisonError};

use image::RgbaImage;
use serde::Serialize;

use crate::error::LoadError;
use crate::host::{FrameCache, ImageDecoder, TextureCache};

/// Handle to an uploaded texture.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TextureHandle {
    id: u64,
    key: String,
    width: u32,
    height: u32,
}

impl TextureHandle {
    pub fn id(&self) -> u64 {
        self.id
    }

    pub fn key(&self) -> &str {
        &self.key
    }

    pub fn dimensions(&self) -> (u32, u32) {
        (self.width, self.height)
    }
}

/// Decodes image keys relative to a root directory into RGBA8 pixels.
#[derive(Debug, Clone)]
pub struct ImageFileDecoder {
    root: PathBuf,
}

impl ImageFileDecoder {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }
}

impl ImageDecoder for ImageFileDecoder {
    type Image = RgbaImage;

    fn decode(&self, key: &str) -> Result<RgbaImage, LoadError> {
        let path = self.root.join(key);
        let image = image::open(&path).map_err(|err| LoadError::Decode {
            key: key.to_string(),
            reason: format!("{} ({})", err, path.display()),
        })?;
        Ok(image.into_rgba8())
    }
}

#[derive(Debug, Default)]
pub struct MemoryTextureCache {
    textures: HashMap<String, TextureHandle>,
    next_id: u64,
    resident_bytes: u64,
}

impl MemoryTextureCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.textures.len()
    }

    pub fn is_empty(&self) -> bool {
        self.textures.is_empty()
    }

    /// Bytes of RGBA8 texel data uploaded so far.
    pub fn resident_bytes(&self) -> u64 {
        self.resident_bytes
    }

    pub fn remove(&mut self, key: &str) -> Option<TextureHandle> {
        let handle = self.textures.remove(key)?;
        let (width, height) = handle.dimensions();
        self.resident_bytes = self
            .resident_bytes
            .saturating_sub(u64::from(width) * u64::from(height) * 4);
        Some(handle)
    }
}

impl TextureCache for MemoryTextureCache {
    type Image = RgbaImage;
    type Texture = TextureHandle;

    fn texture_for_key(&self, key: &str) -> Option<TextureHandle> {
        self.textures.get(key).cloned()
    }

    fn add_image(&mut self, image: RgbaImage, key: &str) -> Result<TextureHandle, LoadError> {
        if let Some(existing) = self.textures.get(key) {
            return Ok(existing.clone());
        }

        let (width, height) = image.dimensions();
        if width == 0 || height == 0 {
            return Err(LoadError::Upload {
                key: key.to_string(),
                reason: format!("image has no texels ({width}x{height})"),
            });
        }

        self.next_id += 1;
        let handle = TextureHandle {
            id: self.next_id,
            key: key.to_string(),
            width,
            height,
        };
        self.resident_bytes += image.as_raw().len() as u64;
        self.textures.insert(key.to_string(), handle.clone());
        Ok(handle)
    }
}

#[derive(Debug, Clone)]
struct SheetEntry {
    texture: TextureHandle,
    registrations: u32,
}

/// Thread-safe registry of sprite sheets keyed by manifest name. When built
/// with a manifest root, registration fails for manifests missing on disk.
#[derive(Debug, Default)]
pub struct MemoryFrameCache {
    manifest_root: Option<PathBuf>,
    sheets: Mutex<HashMap<String, SheetEntry>>,
}

impl MemoryFrameCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_manifest_root(root: impl Into<PathBuf>) -> Self {
        Self {
            manifest_root: Some(root.into()),
            sheets: Mutex::default(),
        }
    }

    pub fn contains(&self, manifest: &str) -> bool {
        self.lock().contains_key(manifest)
    }

    pub fn texture_for(&self, manifest: &str) -> Option<TextureHandle> {
        self.lock().get(manifest).map(|entry| entry.texture.clone())
    }

    /// How many times `manifest` has been registered.
    pub fn registrations(&self, manifest: &str) -> u32 {
        self.lock()
            .get(manifest)
            .map_or(0, |entry| entry.registrations)
    }

    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.lock().is_empty()
    }

    pub fn manifests(&self) -> Vec<String> {
        let mut names: Vec<String> = self.lock().keys().cloned().collect();
        names.sort();
        names
    }

    fn lock(&self) -> MutexGuard<'_, HashMap<String, SheetEntry>> {
        self.sheets.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl FrameCache for MemoryFrameCache {
    type Texture = TextureHandle;

    fn add_sprite_frames(&self, manifest: &str, texture: &TextureHandle) -> Result<(), LoadError> {
        if let Some(root) = &self.manifest_root {
            let path = root.join(manifest);
            if !path.is_file() {
                return Err(LoadError::Register {
                    manifest: manifest.to_string(),
                    reason: format!("manifest not found at {}", path.display()),
                });
            }
        }

        let mut sheets = self.lock();
        let entry = sheets
            .entry(manifest.to_string())
            .or_insert_with(|| SheetEntry {
                texture: texture.clone(),
                registrations: 0,
            });
        entry.texture = texture.clone();
        entry.registrations += 1;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn write_png(dir: &Path, name: &str, width: u32, height: u32) {
        let image = RgbaImage::from_pixel(width, height, image::Rgba([10, 20, 30, 255]));
        image.save(dir.join(name)).unwrap();
    }

    #[test]
    fn decodes_png_relative_to_root() {
        let dir = TempDir::new().unwrap();
        write_png(dir.path(), "sheet.png", 4, 2);
        let decoder = ImageFileDecoder::new(dir.path());
        let image = decoder.decode("sheet.png").unwrap();
        assert_eq!(image.dimensions(), (4, 2));
    }

    #[test]
    fn missing_image_is_a_decode_error() {
        let dir = TempDir::new().unwrap();
        let decoder = ImageFileDecoder::new(dir.path());
        let err = decoder.decode("missing.png").unwrap_err();
        assert!(matches!(err, LoadError::Decode { key, .. } if key == "missing.png"));
    }

    #[test]
    fn corrupt_image_is_a_decode_error() {
        let dir = TempDir::new().unwrap();
        std::fs::write(dir.path().join("bad.png"), b"not a png").unwrap();
        let decoder = ImageFileDecoder::new(dir.path());
        assert!(matches!(
            decoder.decode("bad.png"),
            Err(LoadError::Decode { .. })
        ));
    }

    #[test]
    fn texture_cache_reuses_existing_key() {
        let mut cache = MemoryTextureCache::new();
        let first = cache.add_image(RgbaImage::new(2, 2), "a.png").unwrap();
        let second = cache.add_image(RgbaImage::new(8, 8), "a.png").unwrap();
        assert_eq!(first, second);
        assert_eq!(cache.len(), 1);
        assert_eq!(cache.resident_bytes(), 16);
        assert_eq!(cache.texture_for_key("a.png"), Some(first));
        assert!(cache.texture_for_key("b.png").is_none());
    }

    #[test]
    fn texture_cache_rejects_empty_image() {
        let mut cache = MemoryTextureCache::new();
        let err = cache.add_image(RgbaImage::new(0, 3), "empty.png").unwrap_err();
        assert!(matches!(err, LoadError::Upload { .. }));
        assert!(cache.is_empty());
    }

    #[test]
    fn texture_cache_remove_releases_bytes() {
        let mut cache = MemoryTextureCache::new();
        cache.add_image(RgbaImage::new(2, 2), "a.png").unwrap();
        assert!(cache.remove("a.png").is_some());
        assert_eq!(cache.resident_bytes(), 0);
        assert!(cache.remove("a.png").is_none());
    }

    #[test]
    fn frame_cache_counts_registrations() {
        let mut textures = MemoryTextureCache::new();
        let texture = textures.add_image(RgbaImage::new(1, 1), "hud.png").unwrap();
        let frames = MemoryFrameCache::new();
        frames.add_sprite_frames("hud.plist", &texture).unwrap();
        frames.add_sprite_frames("hud.plist", &texture).unwrap();
        assert_eq!(frames.registrations("hud.plist"), 2);
        assert_eq!(frames.registrations("other.plist"), 0);
        assert_eq!(frames.texture_for("hud.plist"), Some(texture));
        assert_eq!(frames.manifests(), vec!["hud.plist".to_string()]);
    }

    #[test]
    fn frame_cache_with_root_requires_manifest_file() {
        let dir = TempDir::new().unwrap();
        std::fs::write(dir.path().join("present.plist"), "<plist/>").unwrap();
        let mut textures = MemoryTextureCache::new();
        let texture = textures.add_image(RgbaImage::new(1, 1), "x.png").unwrap();
        let frames = MemoryFrameCache::with_manifest_root(dir.path());
        frames.add_sprite_frames("present.plist", &texture).unwrap();
        let err = frames
            .add_sprite_frames("absent.plist", &texture)
            .unwrap_err();
        assert!(matches!(err, LoadError::Register { .. }));
        assert!(!frames.contains("absent.plist"));
    }
}
