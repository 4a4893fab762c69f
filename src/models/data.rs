use std::io::Cursor;

use image::{DynamicImage, ImageFormat, RgbaImage};
use serde::{Deserialize, Serialize};

use crate::utils::ScanError;

/// ICAO Doc 9303 machine-readable document formats.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum DocumentFormat {
    TD1, // ID card, 3 lines of 30
    TD2, // ID card, 2 lines of 36
    TD3, // Passport, 2 lines of 44
}

impl DocumentFormat {
    pub fn line_count(&self) -> usize {
        match self {
            DocumentFormat::TD1 => 3,
            DocumentFormat::TD2 | DocumentFormat::TD3 => 2,
        }
    }

    pub fn line_length(&self) -> usize {
        match self {
            DocumentFormat::TD1 => 30,
            DocumentFormat::TD2 => 36,
            DocumentFormat::TD3 => 44,
        }
    }
}

/// One captured camera frame or decoded upload, RGBA, row-major.
/// Ephemeral; lives for a single scan attempt.
#[derive(Debug, Clone)]
pub struct RawFrame {
    width: u32,
    height: u32,
    pixels: Vec<u8>,
}

impl RawFrame {
    pub fn from_rgba(width: u32, height: u32, pixels: Vec<u8>) -> Result<Self, ScanError> {
        let expected = width as usize * height as usize * 4;
        if pixels.len() != expected {
            return Err(ScanError::InvalidInput(format!(
                "frame buffer is {} bytes, expected {} for {}x{} RGBA",
                pixels.len(),
                expected,
                width,
                height
            )));
        }
        Ok(RawFrame {
            width,
            height,
            pixels,
        })
    }

    pub fn from_dynamic_image(image: &DynamicImage) -> Self {
        let rgba = image.to_rgba8();
        RawFrame {
            width: rgba.width(),
            height: rgba.height(),
            pixels: rgba.into_raw(),
        }
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    pub fn to_rgba_image(&self) -> Result<RgbaImage, ScanError> {
        RgbaImage::from_raw(self.width, self.height, self.pixels.clone())
            .ok_or_else(|| ScanError::InvalidInput("frame buffer size mismatch".to_string()))
    }

    /// PNG-encode the frame, e.g. for shipping to a remote OCR service.
    pub fn to_png(&self) -> Result<Vec<u8>, ScanError> {
        let image = DynamicImage::ImageRgba8(self.to_rgba_image()?);
        let mut buffer = Cursor::new(Vec::new());
        image
            .write_to(&mut buffer, ImageFormat::Png)
            .map_err(|e| ScanError::InvalidInput(format!("failed to encode frame: {}", e)))?;
        Ok(buffer.into_inner())
    }
}

/// Raw text recognized from one raster, with the engine's mean confidence
/// on a 0 to 100 scale.
#[derive(Debug, Clone, Default)]
pub struct OcrResult {
    pub text: String,
    pub confidence: f32,
}

impl OcrResult {
    pub fn empty() -> Self {
        OcrResult::default()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Sex {
    Male,
    Female,
    Unspecified,
}

impl Sex {
    pub fn from_mrz_char(c: char) -> Sex {
        match c {
            'M' => Sex::Male,
            'F' => Sex::Female,
            _ => Sex::Unspecified,
        }
    }

    pub fn as_char(&self) -> char {
        match self {
            Sex::Male => 'M',
            Sex::Female => 'F',
            Sex::Unspecified => '<',
        }
    }
}

/// Outcome of every check digit present in the decoded zone.
/// `personal_number` is only present for TD3 documents.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CheckDigitReport {
    pub document_number: bool,
    pub birth_date: bool,
    pub expiry_date: bool,
    pub personal_number: Option<bool>,
    pub composite: bool,
    /// No illegal characters in non-filler positions.
    pub fields_legal: bool,
}

impl CheckDigitReport {
    pub fn failed() -> Self {
        CheckDigitReport {
            document_number: false,
            birth_date: false,
            expiry_date: false,
            personal_number: None,
            composite: false,
            fields_legal: false,
        }
    }

    /// Used for results validated by an external service, where the
    /// individual digits were checked on the other side.
    pub fn assumed_valid() -> Self {
        CheckDigitReport {
            document_number: true,
            birth_date: true,
            expiry_date: true,
            personal_number: None,
            composite: true,
            fields_legal: true,
        }
    }

    pub fn all_passed(&self) -> bool {
        self.document_number
            && self.birth_date
            && self.expiry_date
            && self.personal_number.unwrap_or(true)
            && self.composite
            && self.fields_legal
    }
}

/// Structured decode of a machine-readable zone. Dates stay in the
/// verbatim YYMMDD form they were read in; century resolution is a
/// separate concern.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MrzFields {
    pub document_format: Option<DocumentFormat>,
    pub document_type: String,
    pub issuing_country: String,
    pub surname: String,
    pub given_names: String,
    pub document_number: String,
    pub nationality: String,
    pub birth_date: String,
    pub sex: Sex,
    pub expiry_date: String,
    pub personal_number: Option<String>,
    pub optional_data: Option<String>,
    pub checks: CheckDigitReport,
    pub valid: bool,
}

impl MrzFields {
    /// Empty field set carrying a failed verdict, returned for input that
    /// does not match any known document shape.
    pub fn invalid(format: Option<DocumentFormat>) -> Self {
        MrzFields {
            document_format: format,
            document_type: String::new(),
            issuing_country: String::new(),
            surname: String::new(),
            given_names: String::new(),
            document_number: String::new(),
            nationality: String::new(),
            birth_date: String::new(),
            sex: Sex::Unspecified,
            expiry_date: String::new(),
            personal_number: None,
            optional_data: None,
            checks: CheckDigitReport::failed(),
            valid: false,
        }
    }
}

/// Soft outcome of running recognition on a single frame. Only `Parsed`
/// carries a result the session may surface; the fields inside
/// `InvalidChecksum` exist for diagnostics and are never handed out.
#[derive(Debug, Clone)]
pub enum AttemptOutcome {
    Parsed(MrzFields),
    NoMrz,
    InvalidChecksum(MrzFields),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn frame_buffer_length_is_validated() {
        assert!(RawFrame::from_rgba(2, 2, vec![0u8; 16]).is_ok());
        assert!(RawFrame::from_rgba(2, 2, vec![0u8; 15]).is_err());
    }

    #[test]
    fn frame_png_round_trip_keeps_dimensions() {
        let frame = RawFrame::from_rgba(3, 2, vec![128u8; 24]).unwrap();
        let png = frame.to_png().unwrap();
        let decoded = image::load_from_memory(&png).unwrap();
        assert_eq!((decoded.width(), decoded.height()), (3, 2));
    }

    #[test]
    fn sex_maps_filler_to_unspecified() {
        assert_eq!(Sex::from_mrz_char('M'), Sex::Male);
        assert_eq!(Sex::from_mrz_char('F'), Sex::Female);
        assert_eq!(Sex::from_mrz_char('<'), Sex::Unspecified);
        assert_eq!(Sex::Unspecified.as_char(), '<');
    }

    #[test]
    fn format_dimensions() {
        assert_eq!(DocumentFormat::TD1.line_count(), 3);
        assert_eq!(DocumentFormat::TD1.line_length(), 30);
        assert_eq!(DocumentFormat::TD2.line_length(), 36);
        assert_eq!(DocumentFormat::TD3.line_length(), 44);
    }
}
