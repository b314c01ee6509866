//! Per-box OCR and the layout-aware queries built on it.
//!
//! Detected boxes are recognized concurrently on a small thread pool.
//! Results come back in detection order, so a line index is also an
//! index into the detected boxes and maps to a clickable rectangle.

use image::GrayImage;
use regex::Regex;
use std::sync::mpsc::{self, RecvTimeoutError};
use std::sync::{Arc, Mutex, OnceLock};
use std::thread;
use std::time::Duration;

use super::detector::{get_scale_factor, TextDetector};
use super::engine::{OcrEngine, OcrMode};
use super::text::{clean_line, parse_datetime};
use crate::capture::Screenshot;
use crate::config::VisualConfig;
use crate::error::{Result, VisualError};
use crate::geometry::ScreenRectangle;

/// How detected boxes are prepared and recognized.
#[derive(Clone, Debug, PartialEq)]
pub struct RecognitionSettings {
    /// Border added on every side, in box heights (halved)
    pub border_factor: f64,
    /// Box heights outside `[min_font_size, max_font_size]` are rescaled into it
    pub min_font_size: f64,
    pub max_font_size: f64,
    pub workers: usize,
    /// Longest wait for the next result in order
    pub timeout: Duration,
}

impl Default for RecognitionSettings {
    fn default() -> Self {
        Self::from_config(&VisualConfig::default())
    }
}

impl RecognitionSettings {
    pub fn from_config(config: &VisualConfig) -> Self {
        Self {
            border_factor: config.border_factor,
            min_font_size: config.min_font_size as f64,
            max_font_size: config.max_font_size as f64,
            workers: config.ocr_worker_count(),
            timeout: config.ocr_timeout(),
        }
    }
}

/// A text region found by the detector.
///
/// Keeps its screenshot alive so the region can be cropped and mapped to
/// screen coordinates later. Recognized text is computed once per mode.
#[derive(Debug)]
pub struct DetectedTextBox {
    rectangle: ScreenRectangle,
    screenshot: Arc<Screenshot>,
    text: OnceLock<String>,
    digits: OnceLock<String>,
}

impl DetectedTextBox {
    pub fn new(rectangle: ScreenRectangle, screenshot: Arc<Screenshot>) -> Self {
        Self {
            rectangle,
            screenshot,
            text: OnceLock::new(),
            digits: OnceLock::new(),
        }
    }

    /// Rectangle in screenshot pixels.
    pub fn rectangle(&self) -> ScreenRectangle {
        self.rectangle
    }

    /// Rectangle in absolute screen coordinates.
    pub fn box_to_image_region(&self) -> ScreenRectangle {
        let r = self.rectangle;
        self.screenshot.region_bounds(r.x, r.y, r.width, r.height)
    }

    /// Grayscale crop handed to the OCR engine: the box with a border
    /// around it, scaled so the text height is within the font size window.
    pub fn prepare(&self, settings: &RecognitionSettings) -> Result<GrayImage> {
        if self.rectangle.width == 0 || self.rectangle.height == 0 {
            return Err(VisualError::TextNotFound(format!(
                "Text box {} has no pixels",
                self.rectangle
            )));
        }
        let scale = get_scale_factor(
            settings.min_font_size,
            settings.max_font_size,
            self.rectangle.height as f64,
            None,
        );
        let (width, height) = self.screenshot.dimensions();
        let bordered = self.rectangle.add_borders(settings.border_factor, width, height);
        let crop = self
            .screenshot
            .get_grayscale()
            .crop_rectangle(&bordered)?
            .scale(scale);
        Ok(crop.to_gray_image())
    }

    /// Recognized text in `mode`, computed on first use.
    pub fn recognize(
        &self,
        engine: &dyn OcrEngine,
        mode: OcrMode,
        settings: &RecognitionSettings,
    ) -> Result<String> {
        let cell = match mode {
            OcrMode::Text => &self.text,
            OcrMode::Digits => &self.digits,
        };
        if let Some(text) = cell.get() {
            return Ok(text.clone());
        }
        let image = self.prepare(settings)?;
        let text = engine
            .image_to_string(&image, mode)
            .map_err(|e| VisualError::TextNotFound(format!("Failed to recognize text: {}", e)))?;
        Ok(cell.get_or_init(|| text).clone())
    }
}

/// Recognizes every box on a pool of `min(workers, boxes)` threads.
///
/// Results are returned in box order. The first failure in that order is
/// returned; waiting longer than `settings.timeout` for the next result
/// fails with `RecognitionTimeout`.
pub fn recognize_boxes(
    boxes: &[Arc<DetectedTextBox>],
    engine: &Arc<dyn OcrEngine>,
    mode: OcrMode,
    settings: &RecognitionSettings,
) -> Result<Vec<String>> {
    if boxes.is_empty() {
        return Ok(Vec::new());
    }

    let (job_tx, job_rx) = mpsc::channel::<(usize, Arc<DetectedTextBox>)>();
    for (index, text_box) in boxes.iter().enumerate() {
        // Receiver outlives this loop
        let _ = job_tx.send((index, Arc::clone(text_box)));
    }
    drop(job_tx);

    let job_rx = Arc::new(Mutex::new(job_rx));
    let (result_tx, result_rx) = mpsc::channel::<(usize, Result<String>)>();
    let workers = settings.workers.max(1).min(boxes.len());
    for _ in 0..workers {
        let job_rx = Arc::clone(&job_rx);
        let result_tx = result_tx.clone();
        let engine = Arc::clone(engine);
        let settings = settings.clone();
        thread::spawn(move || loop {
            let job = match job_rx.lock() {
                Ok(rx) => rx.recv(),
                Err(_) => break,
            };
            let Ok((index, text_box)) = job else {
                break;
            };
            let result = text_box.recognize(engine.as_ref(), mode, &settings);
            if result_tx.send((index, result)).is_err() {
                // Collector gave up
                break;
            }
        });
    }
    drop(result_tx);

    let mut pending: Vec<Option<Result<String>>> = (0..boxes.len()).map(|_| None).collect();
    let mut texts = Vec::with_capacity(boxes.len());
    for index in 0..boxes.len() {
        while pending[index].is_none() {
            match result_rx.recv_timeout(settings.timeout) {
                Ok((done, result)) => pending[done] = Some(result),
                Err(RecvTimeoutError::Timeout) => {
                    return Err(VisualError::RecognitionTimeout {
                        index,
                        timeout: settings.timeout,
                    });
                }
                Err(RecvTimeoutError::Disconnected) => {
                    return Err(VisualError::TextNotFound(format!(
                        "Recognition of box {} stopped unexpectedly",
                        index
                    )));
                }
            }
        }
        if let Some(result) = pending[index].take() {
            texts.push(result?);
        }
    }

    crate::log(&format!("Recognized text {:?}", texts));
    Ok(texts)
}

/// Text queries over the boxes detected on one screenshot.
///
/// Every query compares lowercased text with punctuation collapsed to
/// spaces (`:` kept), on both the expected text and the recognized lines.
pub struct ImageTextRecognition {
    boxes: Vec<Arc<DetectedTextBox>>,
    engine: Arc<dyn OcrEngine>,
    settings: RecognitionSettings,
    lines: OnceLock<Vec<String>>,
}

impl ImageTextRecognition {
    /// Detects the text boxes of `screenshot`; recognition runs on first query.
    pub fn new(
        detector: &TextDetector,
        engine: Arc<dyn OcrEngine>,
        screenshot: Arc<Screenshot>,
        settings: RecognitionSettings,
    ) -> Result<Self> {
        let boxes = detector.detect(&screenshot)?;
        Ok(Self::from_boxes(boxes, engine, settings))
    }

    pub fn from_boxes(
        boxes: Vec<DetectedTextBox>,
        engine: Arc<dyn OcrEngine>,
        settings: RecognitionSettings,
    ) -> Self {
        Self {
            boxes: boxes.into_iter().map(Arc::new).collect(),
            engine,
            settings,
            lines: OnceLock::new(),
        }
    }

    pub fn boxes(&self) -> &[Arc<DetectedTextBox>] {
        &self.boxes
    }

    /// Raw OCR output of every box, in detection order.
    pub fn recognized_lines(&self) -> Result<&[String]> {
        if let Some(lines) = self.lines.get() {
            return Ok(lines);
        }
        let lines = recognize_boxes(&self.boxes, &self.engine, OcrMode::Text, &self.settings)?;
        Ok(self.lines.get_or_init(|| lines))
    }

    fn cleaned_lines(&self) -> Result<Vec<String>> {
        Ok(self.recognized_lines()?.iter().map(|l| clean_line(l)).collect())
    }

    /// Index of the first line containing `expected`.
    pub fn line_index(&self, expected: &str) -> Result<usize> {
        let cleaned = clean_line(expected);
        self.cleaned_lines()?
            .iter()
            .position(|line| line.contains(&cleaned))
            .ok_or_else(|| VisualError::TextNotFound(format!("Expected text {:?} not found", expected)))
    }

    pub fn has_line(&self, expected: &str) -> Result<bool> {
        match self.line_index(expected) {
            Ok(_) => Ok(true),
            Err(VisualError::TextNotFound(_)) => Ok(false),
            Err(e) => Err(e),
        }
    }

    /// True if `expected` appears in all lines joined with spaces, so it
    /// may span boxes.
    pub fn has_paragraph(&self, expected: &str) -> Result<bool> {
        let cleaned = clean_line(expected);
        let paragraph = self.cleaned_lines()?.join(" ");
        if paragraph.contains(&cleaned) {
            return Ok(true);
        }
        crate::log(&format!("Expected text {:?} not found", expected));
        Ok(false)
    }

    /// Index of the first cleaned line that `pattern` matches at its start.
    pub fn line_index_by_pattern(&self, pattern: &Regex) -> Result<usize> {
        self.cleaned_lines()?
            .iter()
            .position(|line| pattern.find(line).is_some_and(|m| m.start() == 0))
            .ok_or_else(|| {
                VisualError::TextNotFound(format!(
                    "No text matching the pattern {:?} was found",
                    pattern.as_str()
                ))
            })
    }

    pub fn multiple_line_indexes(&self, expected: &[&str]) -> Result<Vec<usize>> {
        expected.iter().map(|text| self.line_index(text)).collect()
    }

    /// Screen rectangle of the first line containing `expected`.
    pub fn get_phrase_rectangle(&self, expected: &str) -> Result<ScreenRectangle> {
        let index = self.line_index(expected)?;
        self.get_rectangle_by_index(index)
            .ok_or_else(|| VisualError::TextNotFound(format!("No text box {}", index)))
    }

    /// Screen rectangle of box `index`.
    pub fn get_rectangle_by_index(&self, index: usize) -> Option<ScreenRectangle> {
        self.boxes.get(index).map(|b| b.box_to_image_region())
    }

    /// Screenshot-local rectangle of box `index`.
    pub fn get_raw_rectangle_by_index(&self, index: usize) -> Option<ScreenRectangle> {
        self.boxes.get(index).map(|b| b.rectangle())
    }

    /// Index of the first line that parses as an overlay timestamp.
    pub fn datetime_index(&self) -> Result<usize> {
        let mut errors = vec!["No texts were recognized".to_string()];
        for (index, line) in self.cleaned_lines()?.iter().enumerate() {
            match parse_datetime(line) {
                Ok(_) => return Ok(index),
                Err(e) => errors.push(format!("{:?}: {}", line, e)),
            }
        }
        Err(VisualError::WrongFormat(errors.join(" ")))
    }
}

/// Numeric queries over the boxes detected on one screenshot.
pub struct ImageDigitsRecognition {
    boxes: Vec<Arc<DetectedTextBox>>,
    engine: Arc<dyn OcrEngine>,
    settings: RecognitionSettings,
    lines: OnceLock<Vec<String>>,
}

impl ImageDigitsRecognition {
    pub fn new(
        detector: &TextDetector,
        engine: Arc<dyn OcrEngine>,
        screenshot: Arc<Screenshot>,
        settings: RecognitionSettings,
    ) -> Result<Self> {
        let boxes = detector.detect(&screenshot)?;
        Ok(Self::from_boxes(boxes, engine, settings))
    }

    pub fn from_boxes(
        boxes: Vec<DetectedTextBox>,
        engine: Arc<dyn OcrEngine>,
        settings: RecognitionSettings,
    ) -> Self {
        Self {
            boxes: boxes.into_iter().map(Arc::new).collect(),
            engine,
            settings,
            lines: OnceLock::new(),
        }
    }

    /// Raw digit-mode OCR output of every box, in detection order.
    pub fn recognized_lines(&self) -> Result<&[String]> {
        if let Some(lines) = self.lines.get() {
            return Ok(lines);
        }
        let lines = recognize_boxes(&self.boxes, &self.engine, OcrMode::Digits, &self.settings)?;
        Ok(self.lines.get_or_init(|| lines))
    }

    /// Lines that parse as integers; the rest are skipped.
    pub fn numbers(&self) -> Result<Vec<i64>> {
        Ok(self
            .recognized_lines()?
            .iter()
            .filter_map(|line| line.trim().parse().ok())
            .collect())
    }

    /// True if some number here plus `offset` equals some number in `other`.
    pub fn compare_ocr_results(&self, other: &ImageDigitsRecognition, offset: i64) -> Result<bool> {
        let right = other.numbers()?;
        Ok(self
            .numbers()?
            .iter()
            .any(|left| right.contains(&(left + offset))))
    }

    /// True if some number is within `delta` of `expected`.
    pub fn has_in_delta_neighborhood(&self, expected: i64, delta: f64) -> Result<bool> {
        Ok(self
            .numbers()?
            .iter()
            .any(|&n| ((expected - n) as f64).abs() <= delta.abs()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::capture::ImageCapture;
    use crate::ocr::detector::tests::{page_with_words, DarkPixelModel};
    use crate::ocr::detector::DetectorSettings;
    use std::collections::HashMap;
    use std::sync::atomic::{AtomicUsize, Ordering};

    /// Answers by crop width, so each box can get its own text.
    struct WidthEngine {
        by_width: HashMap<u32, String>,
        fallback: String,
        calls: AtomicUsize,
        delay: Duration,
    }

    impl WidthEngine {
        fn constant(text: &str) -> Self {
            Self {
                by_width: HashMap::new(),
                fallback: text.to_string(),
                calls: AtomicUsize::new(0),
                delay: Duration::ZERO,
            }
        }
    }

    impl OcrEngine for WidthEngine {
        fn image_to_string(&self, image: &GrayImage, _mode: OcrMode) -> anyhow::Result<String> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            thread::sleep(self.delay);
            Ok(self
                .by_width
                .get(&image.width())
                .cloned()
                .unwrap_or_else(|| self.fallback.clone()))
        }
    }

    struct FailingEngine;

    impl OcrEngine for FailingEngine {
        fn image_to_string(&self, _image: &GrayImage, _mode: OcrMode) -> anyhow::Result<String> {
            Err(anyhow::anyhow!("engine crashed"))
        }
    }

    fn screenshot(words: &[ScreenRectangle]) -> Arc<Screenshot> {
        let frame: ImageCapture = page_with_words(640, 640, words).into();
        Arc::new(Screenshot::from_capture(frame, ScreenRectangle::new(0, 0, 640, 640)).unwrap())
    }

    fn detector() -> TextDetector {
        TextDetector::new(Arc::new(DarkPixelModel), DetectorSettings::default())
    }

    /// Three boxes of distinct widths, each answered with its own text.
    fn three_lines(texts: [&str; 3]) -> (Arc<Screenshot>, WidthEngine) {
        let words = [
            ScreenRectangle::new(50, 50, 100, 20),
            ScreenRectangle::new(50, 150, 160, 20),
            ScreenRectangle::new(50, 250, 220, 20),
        ];
        let shot = screenshot(&words);
        let settings = RecognitionSettings::default();
        let mut engine = WidthEngine::constant("");
        for (word, text) in words.iter().zip(texts) {
            let sample = DetectedTextBox::new(*word, Arc::clone(&shot));
            let width = sample.prepare(&settings).unwrap().width();
            engine.by_width.insert(width, text.to_string());
        }
        (shot, engine)
    }

    #[test]
    fn test_prepare_adds_border_and_scales() {
        let shot = screenshot(&[]);
        let text_box = DetectedTextBox::new(ScreenRectangle::new(100, 100, 40, 10), Arc::clone(&shot));
        let settings = RecognitionSettings::default();
        // Border of round(10 * 2.5 / 2) = 12 on each side, height 10 needs no scaling
        assert_eq!(text_box.prepare(&settings).unwrap().dimensions(), (64, 34));

        let tall = DetectedTextBox::new(ScreenRectangle::new(200, 200, 40, 100), shot);
        // Height 100 exceeds 50: the bordered 290x350 crop is halved
        assert_eq!(tall.prepare(&settings).unwrap().dimensions(), (145, 175));
    }

    #[test]
    fn test_zero_height_box_is_not_recognized() {
        let shot = screenshot(&[]);
        let flat = DetectedTextBox::new(ScreenRectangle::new(20, 10, 99, 0), shot);
        assert!(matches!(
            flat.prepare(&RecognitionSettings::default()),
            Err(VisualError::TextNotFound(_))
        ));

        let engine = WidthEngine::constant("never");
        assert!(flat.recognize(&engine, OcrMode::Text, &RecognitionSettings::default()).is_err());
        assert_eq!(engine.calls.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn test_has_line() {
        let word = ScreenRectangle::new(100, 100, 200, 30);
        let engine: Arc<dyn OcrEngine> = Arc::new(WidthEngine::constant("Hello World\n"));
        let recognition =
            ImageTextRecognition::new(&detector(), engine, screenshot(&[word]), RecognitionSettings::default())
                .unwrap();

        assert!(recognition.has_line("Hello World").unwrap());
        assert!(recognition.has_line("hello, world!").unwrap());
        assert!(!recognition.has_line("Goodbye").unwrap());
        assert_eq!(recognition.get_phrase_rectangle("world").unwrap(), word);
    }

    #[test]
    fn test_lines_keep_detection_order() {
        let (shot, engine) = three_lines(["Camera 1", "Server: main", "Layout 7"]);
        let recognition =
            ImageTextRecognition::new(&detector(), Arc::new(engine), shot, RecognitionSettings::default()).unwrap();

        assert_eq!(
            recognition.recognized_lines().unwrap(),
            &["Camera 1", "Server: main", "Layout 7"]
        );
        assert_eq!(recognition.line_index("layout").unwrap(), 2);
        assert_eq!(
            recognition.multiple_line_indexes(&["server: main", "camera"]).unwrap(),
            vec![1, 0]
        );
        assert_eq!(
            recognition.get_rectangle_by_index(1),
            Some(ScreenRectangle::new(50, 150, 160, 20))
        );
        assert!(matches!(
            recognition.line_index("missing"),
            Err(VisualError::TextNotFound(_))
        ));
    }

    #[test]
    fn test_paragraph_spans_boxes() {
        let (shot, engine) = three_lines(["The quick", "brown fox", "jumps"]);
        let recognition =
            ImageTextRecognition::new(&detector(), Arc::new(engine), shot, RecognitionSettings::default()).unwrap();

        assert!(recognition.has_paragraph("quick brown").unwrap());
        assert!(!recognition.has_line("quick brown").unwrap());
        assert!(!recognition.has_paragraph("lazy dog").unwrap());
    }

    #[test]
    fn test_line_index_by_pattern_anchors_at_start() {
        let (shot, engine) = three_lines(["Camera 12", "Record 3", "Rec 44"]);
        let recognition =
            ImageTextRecognition::new(&detector(), Arc::new(engine), shot, RecognitionSettings::default()).unwrap();

        let pattern = Regex::new(r"rec\w* \d+").unwrap();
        assert_eq!(recognition.line_index_by_pattern(&pattern).unwrap(), 1);
        let digits_only = Regex::new(r"\d+").unwrap();
        assert!(recognition.line_index_by_pattern(&digits_only).is_err());
    }

    #[test]
    fn test_datetime_index() {
        let (shot, engine) = three_lines(["Camera 1", "Monday, January 02, 2023 10:15:30 PM", "x"]);
        let recognition =
            ImageTextRecognition::new(&detector(), Arc::new(engine), shot, RecognitionSettings::default()).unwrap();
        assert_eq!(recognition.datetime_index().unwrap(), 1);

        // Weekday disagrees with the date
        let (shot, engine) = three_lines(["Camera 1", "x", "Tuesday, January 02, 2023 10:15:30 PM"]);
        let recognition =
            ImageTextRecognition::new(&detector(), Arc::new(engine), shot, RecognitionSettings::default()).unwrap();
        assert_eq!(recognition.datetime_index().unwrap(), 2);

        let (shot, engine) = three_lines(["Camera 1", "Server", "x"]);
        let recognition =
            ImageTextRecognition::new(&detector(), Arc::new(engine), shot, RecognitionSettings::default()).unwrap();
        match recognition.datetime_index() {
            Err(VisualError::WrongFormat(msg)) => assert!(msg.starts_with("No texts were recognized")),
            other => panic!("unexpected {:?}", other),
        }
    }

    #[test]
    fn test_recognition_is_memoized() {
        let (shot, engine) = three_lines(["a", "b", "c"]);
        let engine = Arc::new(engine);
        let recognition = ImageTextRecognition::new(
            &detector(),
            Arc::clone(&engine) as Arc<dyn OcrEngine>,
            shot,
            RecognitionSettings::default(),
        )
        .unwrap();

        recognition.has_line("a").unwrap();
        recognition.has_line("z").unwrap();
        recognition.datetime_index().unwrap_err();
        assert_eq!(engine.calls.load(Ordering::SeqCst), 3);
    }

    #[test]
    fn test_timeout() {
        let word = ScreenRectangle::new(100, 100, 200, 30);
        let mut engine = WidthEngine::constant("slow");
        engine.delay = Duration::from_millis(500);
        let settings = RecognitionSettings {
            timeout: Duration::from_millis(20),
            ..RecognitionSettings::default()
        };
        let recognition =
            ImageTextRecognition::new(&detector(), Arc::new(engine), screenshot(&[word]), settings).unwrap();

        assert!(matches!(
            recognition.recognized_lines(),
            Err(VisualError::RecognitionTimeout { index: 0, .. })
        ));
    }

    #[test]
    fn test_engine_failure_is_text_not_found() {
        let word = ScreenRectangle::new(100, 100, 200, 30);
        let recognition = ImageTextRecognition::new(
            &detector(),
            Arc::new(FailingEngine),
            screenshot(&[word]),
            RecognitionSettings::default(),
        )
        .unwrap();
        assert!(matches!(recognition.recognized_lines(), Err(VisualError::TextNotFound(_))));
    }

    #[test]
    fn test_no_boxes_means_no_lines() {
        let recognition = ImageTextRecognition::new(
            &detector(),
            Arc::new(FailingEngine),
            screenshot(&[]),
            RecognitionSettings::default(),
        )
        .unwrap();
        assert!(recognition.recognized_lines().unwrap().is_empty());
        assert!(!recognition.has_line("anything").unwrap());
        assert_eq!(recognition.get_raw_rectangle_by_index(0), None);
    }

    #[test]
    fn test_digits() {
        let (shot, engine) = three_lines(["120\n", "abc", " 7 "]);
        let digits = ImageDigitsRecognition::new(
            &detector(),
            Arc::new(engine),
            Arc::clone(&shot),
            RecognitionSettings::default(),
        )
        .unwrap();
        assert_eq!(digits.numbers().unwrap(), vec![120, 7]);
        assert!(digits.has_in_delta_neighborhood(118, 2.0).unwrap());
        assert!(digits.has_in_delta_neighborhood(5, -2.0).unwrap());
        assert!(!digits.has_in_delta_neighborhood(100, 5.0).unwrap());

        let (shot, engine) = three_lines(["125", "", ""]);
        let later = ImageDigitsRecognition::new(&detector(), Arc::new(engine), shot, RecognitionSettings::default())
            .unwrap();
        assert!(digits.compare_ocr_results(&later, 5).unwrap());
        assert!(!digits.compare_ocr_results(&later, 4).unwrap());
    }
}
