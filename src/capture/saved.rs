use std::ops::Deref;
use std::path::{Path, PathBuf};

use super::bitmap::ImageCapture;
use crate::error::Result;
use crate::paths;

/// Reference image loaded from disk.
///
/// Has no screen binding: use it for pixel comparison, never to compute
/// click coordinates.
#[derive(Clone, Debug)]
pub struct SavedImage {
    path: PathBuf,
    image: ImageCapture,
}

impl SavedImage {
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref().to_path_buf();
        let image = image::open(&path)?.into();
        Ok(Self { path, image })
    }

    /// Loads `relative` from the reference image directory.
    pub fn from_reference(relative: impl AsRef<Path>) -> Result<Self> {
        Self::load(paths::get_reference_dir().join(relative))
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn into_capture(self) -> ImageCapture {
        self.image
    }
}

impl Deref for SavedImage {
    type Target = ImageCapture;

    fn deref(&self) -> &ImageCapture {
        &self.image
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::VisualError;
    use image::{Rgb, RgbImage};

    #[test]
    fn test_load_png() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("reference.png");
        let mut img = RgbImage::from_pixel(12, 7, Rgb([10, 20, 30]));
        img.put_pixel(4, 2, Rgb([255, 0, 0]));
        img.save(&path).unwrap();

        let saved = SavedImage::load(&path).unwrap();
        assert_eq!(saved.path(), path.as_path());
        assert_eq!(saved.dimensions(), (12, 7));
        assert_eq!(saved.pixel_rgb(4, 2), [255, 0, 0]);
        assert_eq!(saved.into_capture().pixel_rgb(0, 0), [10, 20, 30]);
    }

    #[test]
    fn test_missing_file() {
        let dir = tempfile::tempdir().unwrap();
        let result = SavedImage::load(dir.path().join("absent.png"));
        assert!(matches!(result, Err(VisualError::Image(_))));
    }
}
