//! Tunable thresholds for visual verification.
//!
//! Loads settings from visual_config.json at startup. Every field has a
//! default, so a partial file only overrides what it names.

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::OnceLock;
use std::time::Duration;

/// Global configuration instance, initialized once at startup.
static CONFIG: OnceLock<VisualConfig> = OnceLock::new();

const CONFIG_FILE_NAME: &str = "visual_config.json";

/// Complete visual verification configuration.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct VisualConfig {
    /// Correlation an image must exceed to count as similar (-1.0 to 1.0)
    #[serde(default = "default_similarity_correlation")]
    pub similarity_correlation: f64,
    /// Maximum aspect ratio difference tolerated before comparing pixels
    #[serde(default = "default_aspect_ratio_error")]
    pub aspect_ratio_error: f64,
    /// Smallest needle scale tried by the occurrence search
    #[serde(default = "default_occurrence_min_scale")]
    pub occurrence_min_scale: f64,
    /// Largest needle scale tried by the occurrence search
    #[serde(default = "default_occurrence_max_scale")]
    pub occurrence_max_scale: f64,
    /// Number of scales between min and max
    #[serde(default = "default_occurrence_scale_steps")]
    pub occurrence_scale_steps: usize,
    /// Correlation a location must reach to count as an occurrence
    #[serde(default = "default_occurrence_threshold")]
    pub occurrence_threshold: f64,
    /// Lower bound for the smaller side of the detector input
    #[serde(default = "default_detector_min_side")]
    pub detector_min_side: u32,
    /// Upper bound for the larger side of the detector input
    #[serde(default = "default_detector_max_side")]
    pub detector_max_side: u32,
    /// Text probability above which a detector pixel is text
    #[serde(default = "default_probability_threshold")]
    pub probability_threshold: f32,
    /// Detected boxes with a smaller side below this are noise
    #[serde(default = "default_min_box_side")]
    pub min_box_side: u32,
    /// Context added around a detected box, as a multiple of its height
    #[serde(default = "default_border_factor")]
    pub border_factor: f64,
    /// Smallest glyph height handed to the OCR engine
    #[serde(default = "default_min_font_size")]
    pub min_font_size: u32,
    /// Largest glyph height handed to the OCR engine
    #[serde(default = "default_max_font_size")]
    pub max_font_size: u32,
    /// Time to wait for each recognized box (milliseconds)
    #[serde(default = "default_ocr_timeout_ms")]
    pub ocr_timeout_ms: u64,
    /// OCR worker threads; `None` means available parallelism + 4
    #[serde(default)]
    pub ocr_workers: Option<usize>,
    /// Tesseract page segmentation mode
    #[serde(default = "default_page_segmentation_mode")]
    pub page_segmentation_mode: u8,
    /// Explicit tesseract executable, skips discovery when set
    #[serde(default)]
    pub tesseract_executable: Option<PathBuf>,
    /// Explicit tessdata directory, skips discovery when set
    #[serde(default)]
    pub tessdata_dir: Option<PathBuf>,
}

fn default_similarity_correlation() -> f64 {
    0.85
}

fn default_aspect_ratio_error() -> f64 {
    0.02
}

fn default_occurrence_min_scale() -> f64 {
    0.2
}

fn default_occurrence_max_scale() -> f64 {
    1.0
}

fn default_occurrence_scale_steps() -> usize {
    40
}

fn default_occurrence_threshold() -> f64 {
    0.9
}

fn default_detector_min_side() -> u32 {
    32 * 20
}

fn default_detector_max_side() -> u32 {
    32 * 45
}

fn default_probability_threshold() -> f32 {
    0.05
}

fn default_min_box_side() -> u32 {
    5
}

fn default_border_factor() -> f64 {
    2.5
}

fn default_min_font_size() -> u32 {
    5
}

fn default_max_font_size() -> u32 {
    50
}

fn default_ocr_timeout_ms() -> u64 {
    5000
}

fn default_page_segmentation_mode() -> u8 {
    6 // Assume single uniform block of text
}

impl Default for VisualConfig {
    fn default() -> Self {
        Self {
            similarity_correlation: default_similarity_correlation(),
            aspect_ratio_error: default_aspect_ratio_error(),
            occurrence_min_scale: default_occurrence_min_scale(),
            occurrence_max_scale: default_occurrence_max_scale(),
            occurrence_scale_steps: default_occurrence_scale_steps(),
            occurrence_threshold: default_occurrence_threshold(),
            detector_min_side: default_detector_min_side(),
            detector_max_side: default_detector_max_side(),
            probability_threshold: default_probability_threshold(),
            min_box_side: default_min_box_side(),
            border_factor: default_border_factor(),
            min_font_size: default_min_font_size(),
            max_font_size: default_max_font_size(),
            ocr_timeout_ms: default_ocr_timeout_ms(),
            ocr_workers: None,
            page_segmentation_mode: default_page_segmentation_mode(),
            tesseract_executable: None,
            tessdata_dir: None,
        }
    }
}

impl VisualConfig {
    /// Per-box OCR timeout.
    pub fn ocr_timeout(&self) -> Duration {
        Duration::from_millis(self.ocr_timeout_ms)
    }

    /// OCR worker count: CPU count plus four when unset.
    pub fn ocr_worker_count(&self) -> usize {
        self.ocr_workers.unwrap_or_else(|| {
            std::thread::available_parallelism()
                .map(|n| n.get())
                .unwrap_or(1)
                + 4
        })
    }

    /// Reads a configuration file. Missing fields take their defaults.
    pub fn from_file(path: &Path) -> Result<Self> {
        let contents = fs::read_to_string(path)
            .with_context(|| format!("Failed to read {}", path.display()))?;
        serde_json::from_str(&contents)
            .with_context(|| format!("Failed to parse {}", path.display()))
    }
}

/// Candidate config locations: next to the executable, then the working directory.
fn config_candidates() -> Vec<PathBuf> {
    let mut candidates = Vec::new();
    if let Some(dir) = std::env::current_exe()
        .ok()
        .and_then(|exe| exe.parent().map(|p| p.to_path_buf()))
    {
        candidates.push(dir.join(CONFIG_FILE_NAME));
    }
    candidates.push(PathBuf::from(CONFIG_FILE_NAME));
    candidates
}

/// Loads configuration from visual_config.json or returns defaults.
fn load_config() -> VisualConfig {
    for config_path in config_candidates() {
        if !config_path.exists() {
            continue;
        }
        crate::log(&format!("Loading config from: {}", config_path.display()));
        match VisualConfig::from_file(&config_path) {
            Ok(config) => return config,
            Err(e) => {
                crate::log(&format!("{:#}. Using defaults.", e));
                return VisualConfig::default();
            }
        }
    }

    crate::log("visual_config.json not found. Using default config.");
    VisualConfig::default()
}

/// Initializes the global configuration. Call once at startup.
pub fn init_config() {
    let _ = CONFIG.set(load_config());
}

/// Returns the global configuration, loading it on first use.
pub fn get_config() -> &'static VisualConfig {
    CONFIG.get_or_init(load_config)
}
