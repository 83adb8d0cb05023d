use std::{
    fs, io,
    path::{Path, PathBuf},
};

use ab_glyph::FontVec;
use tracing::info;

use crate::{
    error::{CloudError, Result},
    mask::{Mask, MaskPreset, DEFAULT_MASK_THRESHOLD},
};

/// Fixed file name of the cloud font inside an asset directory.
pub const FONT_FILE: &str = "NanumSquareR.ttf";

/// A parsed font ready for glyph layout.
pub struct FontHandle {
    name: String,
    font: FontVec,
}

impl FontHandle {
    pub fn from_bytes(name: impl Into<String>, bytes: Vec<u8>) -> Result<Self> {
        let name = name.into();
        let font = FontVec::try_from_vec(bytes)
            .map_err(|err| CloudError::unavailable(format!("font '{name}'"), err))?;

        Ok(FontHandle { name, font })
    }

    pub fn from_path(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let bytes = fs::read(path)
            .map_err(|err| CloudError::unavailable(format!("font {}", path.display()), err))?;

        FontHandle::from_bytes(path.display().to_string(), bytes)
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn font(&self) -> &FontVec {
        &self.font
    }
}

/// Directory holding the mask presets and the font under their fixed names.
#[derive(Clone, Debug)]
pub struct AssetStore {
    root: PathBuf,
    mask_threshold: u8,
}

impl AssetStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        AssetStore {
            root: root.into(),
            mask_threshold: DEFAULT_MASK_THRESHOLD,
        }
    }

    pub fn with_mask_threshold(mut self, value: u8) -> Self {
        self.mask_threshold = value;
        self
    }

    pub fn mask_path(&self, preset: MaskPreset) -> PathBuf {
        self.root.join(preset.file_name())
    }

    pub fn font_path(&self) -> PathBuf {
        self.root.join(FONT_FILE)
    }

    pub fn load_mask(&self, preset: MaskPreset) -> Result<Mask> {
        let path = self.mask_path(preset);
        let image = image::open(&path).map_err(|err| {
            CloudError::unavailable(format!("mask '{preset}' ({})", path.display()), err)
        })?;

        info!(mask = %preset, width = image.width(), height = image.height(), "mask loaded");
        Ok(Mask::from_image(&image, self.mask_threshold))
    }

    pub fn load_font(&self) -> Result<FontHandle> {
        let font = FontHandle::from_path(self.font_path())?;
        info!(font = font.name(), "font loaded");
        Ok(font)
    }

    /// Regenerates the four mask files as `size` x `size` squares.
    pub fn write_presets(&self, size: u32) -> Result<Vec<PathBuf>> {
        fs::create_dir_all(&self.root)?;

        MaskPreset::ALL
            .iter()
            .map(|&preset| -> Result<PathBuf> {
                let path = self.mask_path(preset);
                preset
                    .synthesize(size, size)
                    .save(&path)
                    .map_err(|err| io::Error::new(io::ErrorKind::Other, err))?;
                info!(mask = %preset, path = %path.display(), "mask preset written");
                Ok(path)
            })
            .collect()
    }
}
