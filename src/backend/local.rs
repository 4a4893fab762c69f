use log::{debug, info};

use crate::backend::RecognitionBackend;
use crate::models::{AttemptOutcome, RawFrame};
use crate::processing::{MrzExtractor, OcrConfig, OcrEngine, PreprocessOptions, Preprocessor};
use crate::utils::ScanError;
use crate::validation::MrzParser;

/// In-process recognition: preprocess, OCR, extract, parse.
pub struct LocalOcrBackend {
    engine: OcrEngine,
    preprocess: PreprocessOptions,
    extractor: MrzExtractor,
}

impl LocalOcrBackend {
    /// Builds the backend and loads the recognition engine. Engine
    /// loading is the expensive step and happens exactly once; keep the
    /// backend alive across sessions when the scan flow may reopen.
    pub fn new(ocr: &OcrConfig, preprocess: PreprocessOptions) -> Result<Self, ScanError> {
        let engine = OcrEngine::new(ocr)?;
        Ok(LocalOcrBackend {
            engine,
            preprocess,
            extractor: MrzExtractor::new(),
        })
    }

    #[cfg(test)]
    pub(crate) fn disconnected(preprocess: PreprocessOptions) -> Self {
        LocalOcrBackend {
            engine: OcrEngine::disconnected(),
            preprocess,
            extractor: MrzExtractor::new(),
        }
    }
}

impl RecognitionBackend for LocalOcrBackend {
    fn name(&self) -> &str {
        "local-ocr"
    }

    fn recognize_frame(&mut self, frame: &RawFrame) -> Result<AttemptOutcome, ScanError> {
        let raster = Preprocessor::preprocess(frame, &self.preprocess)?;
        let ocr = self.engine.recognize(&raster)?;
        if ocr.text.trim().is_empty() {
            return Ok(AttemptOutcome::NoMrz);
        }

        let candidate = match self.extractor.extract(&ocr.text) {
            Some(candidate) => candidate,
            None => return Ok(AttemptOutcome::NoMrz),
        };
        debug!(
            "candidate window: {:?}, ocr confidence {:.0}",
            candidate.format, ocr.confidence
        );

        let fields = MrzParser::parse(&candidate.lines);
        if fields.valid {
            return Ok(AttemptOutcome::Parsed(fields));
        }

        // Recovery pass: retry with the filler-confusion substitution.
        // Scoped here so a window that already validates can never be
        // damaged by the heuristic.
        let corrected = MrzParser::parse(&candidate.corrected_lines());
        if corrected.valid {
            info!("zone recovered after filler correction");
            return Ok(AttemptOutcome::Parsed(corrected));
        }

        Ok(AttemptOutcome::InvalidChecksum(fields))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn degenerate_frame_flows_to_no_detection_without_an_engine() {
        // A 1x1 frame shrinks to a raster below the recognizable minimum,
        // so the whole stage chain completes without touching Tesseract.
        let mut backend = LocalOcrBackend::disconnected(PreprocessOptions::default());
        let frame = RawFrame::from_rgba(1, 1, vec![0, 0, 0, 255]).unwrap();
        let outcome = backend.recognize_frame(&frame).unwrap();
        assert!(matches!(outcome, AttemptOutcome::NoMrz));
    }

    #[test]
    fn zero_frame_is_invalid_input() {
        let mut backend = LocalOcrBackend::disconnected(PreprocessOptions::default());
        let frame = RawFrame::from_rgba(0, 5, Vec::new()).unwrap();
        assert!(matches!(
            backend.recognize_frame(&frame),
            Err(ScanError::InvalidInput(_))
        ));
    }
}
