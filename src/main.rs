// Command line harness for the MRZ scanning pipeline: reads one still
// image, runs the configured recognition backend and prints the result.

use std::path::PathBuf;
use std::process::ExitCode;

use clap::{Parser, ValueEnum};
use mrzscan::backend::{LocalOcrBackend, RecognitionBackend, RemoteOcrBackend, RemoteOcrConfig};
use mrzscan::models::MrzFields;
use mrzscan::processing::{OcrConfig, PreprocessOptions};
use mrzscan::scanner::{
    ScanConfig, ScanController, ScanObserver, ScanState, StillImageSource,
};
use mrzscan::utils::ScanError;
use mrzscan::validation::date;

#[derive(Debug, Clone, Copy, ValueEnum)]
enum BackendKind {
    /// In-process Tesseract pipeline
    Local,
    /// Server-side OCR endpoint
    Remote,
}

#[derive(Parser)]
#[command(
    name = "mrzscan",
    about = "Read and validate the machine-readable zone of a document image"
)]
struct Cli {
    /// Path to the document image
    image: PathBuf,

    #[arg(long, value_enum, default_value_t = BackendKind::Local)]
    backend: BackendKind,

    /// Remote OCR endpoint (remote backend only)
    #[arg(long, default_value = "http://localhost:8000/ocr/process")]
    endpoint: String,

    /// Tesseract language ("ocrb" when the traineddata is installed)
    #[arg(long, default_value = "eng")]
    lang: String,

    /// Directory containing tessdata
    #[arg(long)]
    tessdata: Option<String>,

    /// Binarization threshold
    #[arg(long, default_value_t = 140)]
    threshold: u8,

    /// Treat the image as already cropped to the document
    #[arg(long)]
    full_frame: bool,

    /// Retry budget for the single image
    #[arg(long, default_value_t = 1)]
    attempts: u32,

    /// Print the parsed fields as JSON instead of the report
    #[arg(long)]
    json: bool,
}

struct ConsoleObserver;

impl ScanObserver for ConsoleObserver {
    fn on_status(&mut self, _state: ScanState, message: &str) {
        println!("  [scan] {}", message);
    }
}

fn build_backend(cli: &Cli) -> Result<Box<dyn RecognitionBackend>, ScanError> {
    match cli.backend {
        BackendKind::Local => {
            let ocr = OcrConfig {
                language: cli.lang.clone(),
                datapath: cli.tessdata.clone(),
            };
            let preprocess = PreprocessOptions {
                threshold: cli.threshold,
                full_frame: cli.full_frame,
                ..PreprocessOptions::default()
            };
            Ok(Box::new(LocalOcrBackend::new(&ocr, preprocess)?))
        }
        BackendKind::Remote => Ok(Box::new(RemoteOcrBackend::new(RemoteOcrConfig::new(
            cli.endpoint.clone(),
        ))?)),
    }
}

fn print_report(fields: &MrzFields) {
    println!("\n===============================================");
    println!("            DOCUMENT SCAN REPORT");
    println!("===============================================\n");

    println!("  Format: {:?}", fields.document_format);
    println!("  Document Type: {}", fields.document_type);
    println!("  Issuing Country: {}", fields.issuing_country);
    println!("  Document Number: {}", fields.document_number);
    println!("  Surname: {}", fields.surname);
    println!("  Given Names: {}", fields.given_names);
    println!("  Nationality: {}", fields.nationality);
    println!("  Sex: {}", fields.sex.as_char());

    match date::resolve_birth_date(&fields.birth_date) {
        Some(born) => println!("  Date of Birth: {} ({})", fields.birth_date, born),
        None => println!("  Date of Birth: {}", fields.birth_date),
    }
    match date::resolve_expiry_date(&fields.expiry_date) {
        Some(expiry) => println!("  Date of Expiry: {} ({})", fields.expiry_date, expiry),
        None => println!("  Date of Expiry: {}", fields.expiry_date),
    }
    if let Some(personal) = &fields.personal_number {
        println!("  Personal Number: {}", personal);
    }

    let today = chrono::Local::now().date_naive();
    if date::is_expired(&fields.expiry_date, today) == Some(true) {
        println!("\n  NOTE: document is expired");
    }

    println!(
        "\nValidation result: {}",
        if fields.valid { "VALID" } else { "INVALID" }
    );
}

fn main() -> ExitCode {
    env_logger::init();
    let cli = Cli::parse();

    println!("Scanning document image: {:?}", cli.image);

    let mut source = match StillImageSource::open(&cli.image) {
        Ok(source) => source,
        Err(err) => {
            eprintln!("Cannot load image: {}", err);
            return ExitCode::FAILURE;
        }
    };
    let backend = match build_backend(&cli) {
        Ok(backend) => backend,
        Err(err) => {
            eprintln!("Cannot initialize backend: {}", err);
            return ExitCode::FAILURE;
        }
    };

    let mut controller = ScanController::new(ScanConfig::single_shot(cli.attempts), backend);
    match controller.run(&mut source, &mut ConsoleObserver) {
        Ok(fields) => {
            if cli.json {
                match serde_json::to_string_pretty(&fields) {
                    Ok(body) => println!("{}", body),
                    Err(err) => eprintln!("Cannot serialize result: {}", err),
                }
            } else {
                print_report(&fields);
            }
            ExitCode::SUCCESS
        }
        Err(err) => {
            eprintln!("Scan failed: {}", err);
            ExitCode::FAILURE
        }
    }
}
