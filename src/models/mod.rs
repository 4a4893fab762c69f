pub mod data;

pub use data::{
    AttemptOutcome, CheckDigitReport, DocumentFormat, MrzFields, OcrResult, RawFrame, Sex,
};
