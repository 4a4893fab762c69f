use image::GrayImage;
use log::debug;
use tesseract::Tesseract;

use crate::models::OcrResult;
use crate::utils::ScanError;

/// The full MRZ alphabet. Restricting the recognizer to it removes a
/// large class of substitutions before they happen.
pub const MRZ_CHAR_WHITELIST: &str = "ABCDEFGHIJKLMNOPQRSTUVWXYZ0123456789<";

/// Rasters thinner than this in either dimension carry no recognizable
/// glyphs; they produce an empty result instead of an engine call.
const MIN_RASTER_DIM: u32 = 3;

#[derive(Debug, Clone)]
pub struct OcrConfig {
    /// Traineddata language. "ocrb" gives the best results on the MRZ
    /// font when installed; "eng" is the universal fallback.
    pub language: String,
    /// Directory holding `tessdata/`, or `None` for the system default.
    pub datapath: Option<String>,
}

impl Default for OcrConfig {
    fn default() -> Self {
        OcrConfig {
            language: "eng".to_string(),
            datapath: None,
        }
    }
}

/// Owned Tesseract instance configured once for MRZ recognition and
/// reused for every frame. Loading the language model is expensive, so
/// construction happens once per session, never per frame.
pub struct OcrEngine {
    tess: Option<Tesseract>,
}

impl OcrEngine {
    pub fn new(config: &OcrConfig) -> Result<Self, ScanError> {
        let tess = Tesseract::new(config.datapath.as_deref(), Some(config.language.as_str()))
            .map_err(|e| ScanError::EngineInit(format!("tesseract init: {}", e)))?
            .set_variable("tessedit_char_whitelist", MRZ_CHAR_WHITELIST)
            .map_err(|e| ScanError::EngineInit(format!("set whitelist: {}", e)))?
            // PSM 6: one uniform block of text, which is what an MRZ is.
            .set_variable("tessedit_pageseg_mode", "6")
            .map_err(|e| ScanError::EngineInit(format!("set segmentation mode: {}", e)))?
            .set_variable("preserve_interword_spaces", "0")
            .map_err(|e| ScanError::EngineInit(format!("set spacing: {}", e)))?;
        Ok(OcrEngine { tess: Some(tess) })
    }

    /// Recognize one binarized raster. A degenerate raster is a normal
    /// no-detection outcome, not an error.
    pub fn recognize(&mut self, raster: &GrayImage) -> Result<OcrResult, ScanError> {
        if raster.width() < MIN_RASTER_DIM || raster.height() < MIN_RASTER_DIM {
            debug!(
                "raster {}x{} too small to recognize",
                raster.width(),
                raster.height()
            );
            return Ok(OcrResult::empty());
        }

        // The bindings consume the handle on every call; a failed call
        // therefore loses the engine, which surfaces as a fatal error on
        // the next frame rather than a silent retry storm.
        let tess = self
            .tess
            .take()
            .ok_or_else(|| ScanError::EngineInit("engine not initialized".to_string()))?;

        let width = raster.width() as i32;
        let height = raster.height() as i32;
        let mut tess = tess
            .set_frame(raster.as_raw(), width, height, 1, width)
            .map_err(|e| ScanError::EngineInit(format!("set frame: {}", e)))?
            .recognize()
            .map_err(|e| ScanError::EngineInit(format!("recognize: {}", e)))?;

        let text = tess
            .get_text()
            .map_err(|e| ScanError::EngineInit(format!("get text: {}", e)))?;
        let confidence = tess.mean_text_conf().clamp(0, 100) as f32;
        self.tess = Some(tess);

        debug!(
            "ocr produced {} chars at confidence {:.0}",
            text.len(),
            confidence
        );
        Ok(OcrResult { text, confidence })
    }

    /// Engine shell with no loaded model, for exercising the paths that
    /// must not touch the engine at all.
    #[cfg(test)]
    pub(crate) fn disconnected() -> Self {
        OcrEngine { tess: None }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn degenerate_raster_is_empty_result_not_error() {
        let mut engine = OcrEngine::disconnected();
        let tiny = GrayImage::new(2, 2);
        let result = engine.recognize(&tiny).unwrap();
        assert!(result.text.is_empty());
        assert_eq!(result.confidence, 0.0);
    }

    #[test]
    fn missing_engine_is_fatal_for_real_rasters() {
        let mut engine = OcrEngine::disconnected();
        let raster = GrayImage::new(100, 30);
        assert!(matches!(
            engine.recognize(&raster),
            Err(ScanError::EngineInit(_))
        ));
    }

    #[test]
    fn whitelist_is_exactly_the_mrz_alphabet() {
        assert_eq!(MRZ_CHAR_WHITELIST.len(), 37);
        assert!(MRZ_CHAR_WHITELIST.ends_with('<'));
        assert!(!MRZ_CHAR_WHITELIST.contains(' '));
    }
}
