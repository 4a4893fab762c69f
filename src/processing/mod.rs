pub mod extractor;
pub mod image;
pub mod ocr;

pub use extractor::{MrzCandidate, MrzExtractor};
pub use image::{PreprocessOptions, Preprocessor};
pub use ocr::{OcrConfig, OcrEngine};
