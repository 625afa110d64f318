use std::collections::{HashMap, HashSet};
use std::path::{Path, PathBuf};

use image::ImageReader;
use thiserror::Error;
use tracing::{debug, warn};

use crate::sprite_keys::{validate_sprite_key, SpriteKeyError};

const BACKGROUND_PLACEHOLDER_COLOR: [u8; 4] = [38, 52, 40, 255];

#[derive(Debug, Error)]
pub enum AssetError {
    #[error("asset root does not exist: {0}")]
    RootMissing(PathBuf),
    #[error("invalid sprite key '{key}': {source}")]
    InvalidKey {
        key: String,
        #[source]
        source: SpriteKeyError,
    },
    #[error("no frames found for sequence '{0}'")]
    EmptySequence(String),
    #[error("failed to open image {path}: {source}")]
    Open {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to decode image {path}: {source}")]
    Decode {
        path: PathBuf,
        #[source]
        source: image::ImageError,
    },
}

/// One decoded RGBA8 image.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Frame {
    pub width: u32,
    pub height: u32,
    pub rgba: Vec<u8>,
}

impl Frame {
    pub fn solid(width: u32, height: u32, color: [u8; 4]) -> Self {
        let width = width.max(1);
        let height = height.max(1);
        let mut rgba = Vec::with_capacity(width as usize * height as usize * 4);
        for _ in 0..(width as usize * height as usize) {
            rgba.extend_from_slice(&color);
        }
        Self {
            width,
            height,
            rgba,
        }
    }

    pub fn pixel(&self, x: u32, y: u32) -> Option<[u8; 4]> {
        if x >= self.width || y >= self.height {
            return None;
        }
        let offset = (y as usize * self.width as usize + x as usize) * 4;
        let bytes = self.rgba.get(offset..offset + 4)?;
        Some([bytes[0], bytes[1], bytes[2], bytes[3]])
    }
}

/// Immutable frame lists keyed by `<kind>/<action>_<direction>`, loaded from
/// `<assets>/sprites/<key>/<n>.png`. Missing sequences resolve to a single
/// solid placeholder frame and are warned about once.
pub struct SpriteLibrary {
    asset_root: PathBuf,
    sequences: HashMap<String, Vec<Frame>>,
    backgrounds: HashMap<u32, Frame>,
    warned_missing: HashSet<String>,
}

impl SpriteLibrary {
    pub fn new(asset_root: impl Into<PathBuf>) -> Self {
        Self {
            asset_root: asset_root.into(),
            sequences: HashMap::new(),
            backgrounds: HashMap::new(),
            warned_missing: HashSet::new(),
        }
    }

    /// Like [`SpriteLibrary::new`] but fails when the asset root is absent,
    /// which callers treat as unrecoverable for a level.
    pub fn open(asset_root: impl Into<PathBuf>) -> Result<Self, AssetError> {
        let asset_root = asset_root.into();
        if !asset_root.is_dir() {
            return Err(AssetError::RootMissing(asset_root));
        }
        Ok(Self::new(asset_root))
    }

    pub fn asset_root(&self) -> &Path {
        &self.asset_root
    }

    /// Counts frames on disk without decoding them.
    pub fn sequence_len(&self, key: &str) -> Option<usize> {
        validate_sprite_key(key).ok()?;
        let dir = self.sequence_dir(key);
        let count = (0..)
            .take_while(|index| frame_path(&dir, *index).is_file())
            .count();
        (count > 0).then_some(count)
    }

    pub fn sequence(&mut self, key: &str, placeholder_size: (u32, u32)) -> &[Frame] {
        if !self.sequences.contains_key(key) {
            let frames = match self.load_sequence(key) {
                Ok(frames) => {
                    debug!(sprite_key = key, frames = frames.len(), "sprite_sequence_loaded");
                    frames
                }
                Err(error) => {
                    self.warn_missing_once(key, &error);
                    vec![Frame::solid(
                        placeholder_size.0,
                        placeholder_size.1,
                        placeholder_color(key),
                    )]
                }
            };
            self.sequences.insert(key.to_string(), frames);
        }
        self.sequences.get(key).map(Vec::as_slice).unwrap_or(&[])
    }

    /// Frame `index` of a sequence, wrapping around its length.
    pub fn frame(
        &mut self,
        key: &str,
        index: usize,
        placeholder_size: (u32, u32),
    ) -> Option<&Frame> {
        let frames = self.sequence(key, placeholder_size);
        if frames.is_empty() {
            return None;
        }
        frames.get(index % frames.len())
    }

    /// Background for `level`, from `<assets>/backgrounds/level_<n>.png`.
    pub fn background(&mut self, level: u32, size: (u32, u32)) -> &Frame {
        if !self.backgrounds.contains_key(&level) {
            let path = self
                .asset_root
                .join("backgrounds")
                .join(format!("level_{level}.png"));
            let frame = match load_frame(&path) {
                Ok(frame) => frame,
                Err(error) => {
                    self.warn_missing_once(&format!("background/level_{level}"), &error);
                    Frame::solid(size.0, size.1, BACKGROUND_PLACEHOLDER_COLOR)
                }
            };
            self.backgrounds.insert(level, frame);
        }
        self.backgrounds
            .entry(level)
            .or_insert_with(|| Frame::solid(size.0, size.1, BACKGROUND_PLACEHOLDER_COLOR))
    }

    pub fn missing_warning_count(&self) -> usize {
        self.warned_missing.len()
    }

    fn sequence_dir(&self, key: &str) -> PathBuf {
        self.asset_root.join("sprites").join(key)
    }

    fn load_sequence(&self, key: &str) -> Result<Vec<Frame>, AssetError> {
        validate_sprite_key(key).map_err(|source| AssetError::InvalidKey {
            key: key.to_string(),
            source,
        })?;
        let dir = self.sequence_dir(key);
        let mut frames = Vec::new();
        for index in 0.. {
            let path = frame_path(&dir, index);
            if !path.is_file() {
                break;
            }
            frames.push(load_frame(&path)?);
        }
        if frames.is_empty() {
            return Err(AssetError::EmptySequence(key.to_string()));
        }
        Ok(frames)
    }

    fn warn_missing_once(&mut self, key: &str, error: &AssetError) {
        if !self.warned_missing.insert(key.to_string()) {
            return;
        }
        warn!(
            sprite_key = key,
            error = %error,
            "asset_missing_using_placeholder"
        );
    }
}

fn frame_path(dir: &Path, index: usize) -> PathBuf {
    dir.join(format!("{index}.png"))
}

fn load_frame(path: &Path) -> Result<Frame, AssetError> {
    let reader = ImageReader::open(path).map_err(|source| AssetError::Open {
        path: path.to_path_buf(),
        source,
    })?;
    let decoded = reader.decode().map_err(|source| AssetError::Decode {
        path: path.to_path_buf(),
        source,
    })?;
    let image = decoded.to_rgba8();
    Ok(Frame {
        width: image.width(),
        height: image.height(),
        rgba: image.into_raw(),
    })
}

/// Stable per-key tint so distinct missing sequences stay distinguishable.
fn placeholder_color(key: &str) -> [u8; 4] {
    let hash = key
        .bytes()
        .fold(2166136261u32, |acc, byte| (acc ^ byte as u32).wrapping_mul(16777619));
    [
        96 + (hash & 0x7f) as u8,
        96 + ((hash >> 8) & 0x7f) as u8,
        96 + ((hash >> 16) & 0x7f) as u8,
        255,
    ]
}

#[cfg(test)]
mod tests {
    use std::fs;

    use image::{ImageBuffer, Rgba};

    use super::*;

    fn write_png(path: &Path, width: u32, height: u32) {
        fs::create_dir_all(path.parent().expect("parent")).expect("mkdir");
        let image = ImageBuffer::from_pixel(width, height, Rgba([10u8, 20, 30, 255]));
        image.save(path).expect("save png");
    }

    #[test]
    fn open_rejects_missing_root() {
        let dir = tempfile::tempdir().expect("tempdir");
        let missing = dir.path().join("assets");
        assert!(matches!(
            SpriteLibrary::open(&missing),
            Err(AssetError::RootMissing(_))
        ));
    }

    #[test]
    fn missing_sequence_becomes_sized_placeholder_and_warns_once() {
        let dir = tempfile::tempdir().expect("tempdir");
        let mut library = SpriteLibrary::new(dir.path());

        let frames = library.sequence("worm/walk_left", (64, 64));
        assert_eq!(frames.len(), 1);
        assert_eq!((frames[0].width, frames[0].height), (64, 64));
        let _ = library.sequence("worm/walk_left", (64, 64));
        assert_eq!(library.missing_warning_count(), 1);
        assert_eq!(library.sequence_len("worm/walk_left"), None);
    }

    #[test]
    fn sequence_loads_numbered_frames_in_order() {
        let dir = tempfile::tempdir().expect("tempdir");
        let seq_dir = dir.path().join("sprites").join("juan").join("attack_right");
        write_png(&seq_dir.join("0.png"), 4, 4);
        write_png(&seq_dir.join("1.png"), 5, 4);
        write_png(&seq_dir.join("2.png"), 6, 4);

        let mut library = SpriteLibrary::new(dir.path());
        assert_eq!(library.sequence_len("juan/attack_right"), Some(3));
        let widths: Vec<u32> = library
            .sequence("juan/attack_right", (64, 64))
            .iter()
            .map(|frame| frame.width)
            .collect();
        assert_eq!(widths, vec![4, 5, 6]);
        let wrapped = library
            .frame("juan/attack_right", 4, (64, 64))
            .expect("frame");
        assert_eq!(wrapped.width, 5);
        assert_eq!(wrapped.pixel(0, 0), Some([10, 20, 30, 255]));
    }

    #[test]
    fn missing_background_uses_world_size() {
        let dir = tempfile::tempdir().expect("tempdir");
        let mut library = SpriteLibrary::new(dir.path());
        let background = library.background(2, (320, 200));
        assert_eq!((background.width, background.height), (320, 200));
    }
}
