use std::time::Duration;

use log::debug;
use reqwest::blocking::multipart::{Form, Part};
use reqwest::blocking::Client;
use serde::Deserialize;

use crate::backend::RecognitionBackend;
use crate::models::{AttemptOutcome, CheckDigitReport, MrzFields, RawFrame, Sex};
use crate::utils::ScanError;

#[derive(Debug, Clone)]
pub struct RemoteOcrConfig {
    /// Endpoint accepting a multipart `image` field and answering with
    /// the `{status, data}` JSON contract.
    pub endpoint: String,
    pub timeout: Duration,
}

impl RemoteOcrConfig {
    pub fn new(endpoint: impl Into<String>) -> Self {
        RemoteOcrConfig {
            endpoint: endpoint.into(),
            timeout: Duration::from_secs(20),
        }
    }
}

/// Recognition delegated to a server-side OCR service. Drop-in
/// replacement for the local pipeline: same frame in, same outcome out,
/// different transport.
pub struct RemoteOcrBackend {
    client: Client,
    config: RemoteOcrConfig,
}

impl RemoteOcrBackend {
    pub fn new(config: RemoteOcrConfig) -> Result<Self, ScanError> {
        let client = Client::builder()
            .timeout(config.timeout)
            .build()
            .map_err(|e| ScanError::EngineInit(format!("http client: {}", e)))?;
        Ok(RemoteOcrBackend { client, config })
    }
}

impl RecognitionBackend for RemoteOcrBackend {
    fn name(&self) -> &str {
        "remote-ocr"
    }

    fn recognize_frame(&mut self, frame: &RawFrame) -> Result<AttemptOutcome, ScanError> {
        let png = frame.to_png()?;
        let part = Part::bytes(png)
            .file_name("frame.png")
            .mime_str("image/png")
            .map_err(|e| ScanError::Remote(e.to_string()))?;
        let form = Form::new().part("image", part);

        let response = self
            .client
            .post(self.config.endpoint.as_str())
            .multipart(form)
            .send()
            .map_err(|e| ScanError::Remote(e.to_string()))?;
        if !response.status().is_success() {
            return Err(ScanError::Remote(format!("HTTP {}", response.status())));
        }

        let parsed: RemoteScanResponse = response
            .json()
            .map_err(|e| ScanError::Remote(format!("bad response body: {}", e)))?;
        Ok(parsed.into_outcome())
    }
}

#[derive(Debug, Deserialize)]
struct RemoteScanResponse {
    status: String,
    #[serde(default)]
    data: Option<RemoteFields>,
    #[serde(default)]
    message: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
struct RemoteFields {
    #[serde(default)]
    document_type: String,
    #[serde(default)]
    document_number: String,
    #[serde(default)]
    surname: String,
    /// The service reports given names under `name`.
    #[serde(default, alias = "given_names")]
    name: String,
    #[serde(default)]
    birth_date: String,
    #[serde(default)]
    sex: String,
    #[serde(default)]
    nationality: String,
    #[serde(default)]
    issuing_country: String,
    #[serde(default)]
    expiry_date: String,
    #[serde(default)]
    personal_number: Option<String>,
}

impl RemoteScanResponse {
    fn into_outcome(self) -> AttemptOutcome {
        if self.status == "success" {
            if let Some(data) = self.data {
                let issuing = if data.issuing_country.is_empty() {
                    data.nationality.clone()
                } else {
                    data.issuing_country
                };
                let sex = data
                    .sex
                    .chars()
                    .next()
                    .map(Sex::from_mrz_char)
                    .unwrap_or(Sex::Unspecified);
                return AttemptOutcome::Parsed(MrzFields {
                    document_format: None,
                    document_type: data.document_type,
                    issuing_country: issuing,
                    surname: data.surname,
                    given_names: data.name,
                    document_number: data.document_number,
                    nationality: data.nationality,
                    birth_date: data.birth_date,
                    sex,
                    expiry_date: data.expiry_date,
                    personal_number: data.personal_number,
                    optional_data: None,
                    // The service runs the check digits before answering
                    // with success.
                    checks: CheckDigitReport::assumed_valid(),
                    valid: true,
                });
            }
        }
        if let Some(message) = self.message {
            debug!("remote OCR reported: {}", message);
        }
        AttemptOutcome::NoMrz
    }
}
