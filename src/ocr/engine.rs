use anyhow::{anyhow, Result};
use image::GrayImage;
use std::path::PathBuf;
use std::process::Command;
use tempfile::NamedTempFile;

use super::setup::find_tesseract;
use crate::config::VisualConfig;

/// What the OCR engine is asked to read.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum OcrMode {
    Text,
    /// Restricts the character set to 0-9
    Digits,
}

impl OcrMode {
    /// Tesseract options selecting this mode.
    pub fn config_args(self, page_segmentation_mode: u8) -> Vec<String> {
        let mut args = vec![
            "--oem".to_string(),
            "3".to_string(),
            "--psm".to_string(),
            page_segmentation_mode.to_string(),
            "-l".to_string(),
            "eng".to_string(),
        ];
        if self == OcrMode::Digits {
            args.push("-c".to_string());
            args.push("tessedit_char_whitelist=0123456789".to_string());
        }
        args
    }
}

/// Reads text from a prepared grayscale crop.
pub trait OcrEngine: Send + Sync {
    fn image_to_string(&self, image: &GrayImage, mode: OcrMode) -> Result<String>;
}

/// Runs the Tesseract command line tool once per image.
#[derive(Clone, Debug)]
pub struct TesseractCli {
    executable: PathBuf,
    tessdata: Option<PathBuf>,
    page_segmentation_mode: u8,
}

impl TesseractCli {
    pub fn new(executable: PathBuf, tessdata: Option<PathBuf>) -> Self {
        Self {
            executable,
            tessdata,
            page_segmentation_mode: VisualConfig::default().page_segmentation_mode,
        }
    }

    /// Locates Tesseract the way `setup::find_tesseract` does.
    pub fn from_config(config: &VisualConfig) -> Result<Self> {
        let paths = find_tesseract(config)?;
        Ok(Self::new(paths.executable, paths.tessdata)
            .with_page_segmentation_mode(config.page_segmentation_mode))
    }

    pub fn with_page_segmentation_mode(mut self, mode: u8) -> Self {
        self.page_segmentation_mode = mode;
        self
    }

    /// Full argument list for reading `input` to stdout.
    fn arguments(&self, input: &std::path::Path, mode: OcrMode) -> Vec<std::ffi::OsString> {
        let mut args: Vec<std::ffi::OsString> = vec![input.into(), "stdout".into()];
        if let Some(tessdata) = &self.tessdata {
            args.push("--tessdata-dir".into());
            args.push(tessdata.into());
        }
        args.extend(
            mode.config_args(self.page_segmentation_mode)
                .into_iter()
                .map(Into::into),
        );
        args
    }
}

impl OcrEngine for TesseractCli {
    fn image_to_string(&self, image: &GrayImage, mode: OcrMode) -> Result<String> {
        // Save image to temporary file
        let temp_input = NamedTempFile::with_suffix(".png")?;
        image.save(temp_input.path())?;

        let output = Command::new(&self.executable)
            .args(self.arguments(temp_input.path(), mode))
            .output()?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(anyhow!("Tesseract failed: {}", stderr));
        }

        Ok(String::from_utf8_lossy(&output.stdout).to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::Luma;

    #[test]
    fn test_text_mode_config() {
        assert_eq!(
            OcrMode::Text.config_args(6).join(" "),
            "--oem 3 --psm 6 -l eng"
        );
    }

    #[test]
    fn test_digits_mode_whitelist() {
        assert_eq!(
            OcrMode::Digits.config_args(7).join(" "),
            "--oem 3 --psm 7 -l eng -c tessedit_char_whitelist=0123456789"
        );
    }

    #[test]
    fn test_arguments_include_tessdata() {
        let cli = TesseractCli::new(PathBuf::from("tesseract"), Some(PathBuf::from("/data/tessdata")));
        let args: Vec<String> = cli
            .arguments(std::path::Path::new("in.png"), OcrMode::Text)
            .into_iter()
            .map(|a| a.to_string_lossy().into_owned())
            .collect();
        assert_eq!(
            args.join(" "),
            "in.png stdout --tessdata-dir /data/tessdata --oem 3 --psm 6 -l eng"
        );
    }

    #[test]
    fn test_missing_executable_fails() {
        let cli = TesseractCli::new(PathBuf::from("/nonexistent/tesseract-binary"), None);
        let img = GrayImage::from_pixel(10, 10, Luma([255]));
        assert!(cli.image_to_string(&img, OcrMode::Text).is_err());
    }
}
