use anyhow::{anyhow, Result};
use std::path::PathBuf;

use crate::config::VisualConfig;
use crate::log;
use crate::paths::get_tesseract_dir;

const TESSDATA_ENV: &str = "TESSDATA_PREFIX";

#[cfg(windows)]
const EXECUTABLE_NAME: &str = "tesseract.exe";
#[cfg(not(windows))]
const EXECUTABLE_NAME: &str = "tesseract";

#[cfg(windows)]
const COMMON_EXECUTABLES: &[&str] = &[
    r"C:\Program Files\Tesseract-OCR\tesseract.exe",
    r"C:\Program Files (x86)\Tesseract-OCR\tesseract.exe",
];
#[cfg(not(windows))]
const COMMON_EXECUTABLES: &[&str] = &[
    "/usr/bin/tesseract",
    "/usr/local/bin/tesseract",
    "/opt/homebrew/bin/tesseract",
];

#[cfg(windows)]
const COMMON_TESSDATA: &[&str] = &[
    r"C:\Program Files\Tesseract-OCR\tessdata",
    r"C:\Program Files (x86)\Tesseract-OCR\tessdata",
];
#[cfg(not(windows))]
const COMMON_TESSDATA: &[&str] = &[
    "/usr/share/tesseract-ocr/5/tessdata",
    "/usr/share/tesseract-ocr/4.00/tessdata",
    "/usr/share/tessdata",
    "/usr/local/share/tessdata",
    "/opt/homebrew/share/tessdata",
];

pub struct TesseractPaths {
    pub executable: PathBuf,
    /// `None` leaves the choice to the executable's built-in default
    pub tessdata: Option<PathBuf>,
}

/// Locates Tesseract and its English language data.
pub fn find_tesseract(config: &VisualConfig) -> Result<TesseractPaths> {
    let executable = find_tesseract_executable(config)?;
    let tessdata = find_tessdata_dir(config);
    log(&format!(
        "Tesseract: {} (tessdata: {})",
        executable.display(),
        tessdata
            .as_ref()
            .map(|p| p.display().to_string())
            .unwrap_or_else(|| "default".to_string())
    ));
    Ok(TesseractPaths {
        executable,
        tessdata,
    })
}

/// Finds the Tesseract executable: configured path, our local dir, `PATH`,
/// then common install locations.
pub fn find_tesseract_executable(config: &VisualConfig) -> Result<PathBuf> {
    if let Some(configured) = &config.tesseract_executable {
        if configured.exists() {
            return Ok(configured.clone());
        }
        return Err(anyhow!(
            "Configured Tesseract executable not found: {}",
            configured.display()
        ));
    }

    let local_exe = get_tesseract_dir().join(EXECUTABLE_NAME);
    if local_exe.exists() {
        return Ok(local_exe);
    }

    // Check PATH
    if let Ok(output) = std::process::Command::new("tesseract")
        .arg("--version")
        .output()
    {
        if output.status.success() {
            return Ok(PathBuf::from("tesseract"));
        }
    }

    for path in COMMON_EXECUTABLES {
        let p = PathBuf::from(path);
        if p.exists() {
            return Ok(p);
        }
    }

    Err(anyhow!(
        "Tesseract not found. Install Tesseract-OCR, add it to PATH or copy it to {}",
        get_tesseract_dir().display()
    ))
}

/// Finds a directory holding `eng.traineddata`.
pub fn find_tessdata_dir(config: &VisualConfig) -> Option<PathBuf> {
    if let Some(configured) = &config.tessdata_dir {
        return Some(configured.clone());
    }

    let local_tessdata = get_tesseract_dir().join("tessdata");
    if has_english(&local_tessdata) {
        return Some(local_tessdata);
    }

    if let Some(prefix) = std::env::var_os(TESSDATA_ENV).map(PathBuf::from) {
        if has_english(&prefix) {
            return Some(prefix);
        }
        let nested = prefix.join("tessdata");
        if has_english(&nested) {
            return Some(nested);
        }
    }

    COMMON_TESSDATA
        .iter()
        .map(PathBuf::from)
        .find(|p| has_english(p))
}

fn has_english(dir: &std::path::Path) -> bool {
    dir.join("eng.traineddata").exists()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_configured_paths_take_precedence() {
        let dir = tempfile::tempdir().unwrap();
        let exe = dir.path().join(EXECUTABLE_NAME);
        std::fs::write(&exe, b"").unwrap();

        let config = VisualConfig {
            tesseract_executable: Some(exe.clone()),
            tessdata_dir: Some(dir.path().to_path_buf()),
            ..VisualConfig::default()
        };
        assert_eq!(find_tesseract_executable(&config).unwrap(), exe);
        assert_eq!(find_tessdata_dir(&config), Some(dir.path().to_path_buf()));
    }

    #[test]
    fn test_missing_configured_executable_is_error() {
        let config = VisualConfig {
            tesseract_executable: Some(PathBuf::from("/nonexistent/tesseract")),
            ..VisualConfig::default()
        };
        assert!(find_tesseract_executable(&config).is_err());
    }
}
