use std::path::PathBuf;
use std::sync::OnceLock;

static HOME_DIR: OnceLock<PathBuf> = OnceLock::new();

/// Environment variable overriding the data directory.
pub const HOME_ENV: &str = "VISUAL_VERIFY_HOME";

/// Returns the data directory: `$VISUAL_VERIFY_HOME`, or `<local data>/visual-verify/`.
pub fn get_home_dir() -> &'static PathBuf {
    HOME_DIR.get_or_init(|| {
        std::env::var_os(HOME_ENV)
            .map(PathBuf::from)
            .unwrap_or_else(|| {
                dirs::data_local_dir()
                    .unwrap_or_else(|| PathBuf::from("."))
                    .join("visual-verify")
            })
    })
}

/// Returns the logs directory: `<home>/logs/`
pub fn get_logs_dir() -> PathBuf {
    get_home_dir().join("logs")
}

/// Returns the reference image directory: `<home>/references/`
///
/// `SavedImage::from_reference` resolves relative paths against it.
pub fn get_reference_dir() -> PathBuf {
    get_home_dir().join("references")
}

/// Returns the local tesseract directory: `<home>/tesseract/`
pub fn get_tesseract_dir() -> PathBuf {
    get_home_dir().join("tesseract")
}

/// Ensures all output directories exist.
pub fn ensure_directories() -> std::io::Result<()> {
    std::fs::create_dir_all(get_logs_dir())?;
    std::fs::create_dir_all(get_reference_dir())?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_dirs_share_home() {
        let home = get_home_dir();
        assert!(get_logs_dir().starts_with(home));
        assert!(get_reference_dir().starts_with(home));
        assert!(get_tesseract_dir().ends_with("tesseract"));
    }
}
