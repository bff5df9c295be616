// src/portal/captcha.rs
//
// CAPTCHA acquisition: fetch a fresh image, OCR it, and keep going until the
// candidate passes the portal's rules. Each attempt is independent; the only
// state is the attempt counter, and the cap turns the original unbounded loop
// into a `CaptchaExhausted` failure.

use crate::utils::error::PortalError;
use once_cell::sync::Lazy;
use regex::Regex;
use std::future::Future;
use std::io::Write;
use std::process::Command;

pub const CAPTCHA_LEN: usize = 6;

static ONLY_NUMERIC_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^[0-9]+$").expect("Failed to compile ONLY_NUMERIC_RE"));
// Valid charset = [0-9A-Z] (no lower case).
static CHARSET_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^[A-Z0-9]+$").expect("Failed to compile CHARSET_RE"));

/// Image-to-text backend. The acquisition contract only cares about the
/// validation predicate, so any engine can sit behind this seam.
pub trait OcrEngine {
    fn image_to_text(&self, image: &[u8]) -> Result<String, PortalError>;
}

/// Shells out to the `tesseract` binary, feeding it the image via a scratch
/// file and reading the recognized text from stdout.
pub struct TesseractOcr;

impl OcrEngine for TesseractOcr {
    fn image_to_text(&self, image: &[u8]) -> Result<String, PortalError> {
        let mut scratch = tempfile::Builder::new()
            .prefix("captcha-")
            .suffix(".png")
            .tempfile()
            .map_err(|e| PortalError::Ocr(format!("scratch file: {e}")))?;
        scratch
            .write_all(image)
            .map_err(|e| PortalError::Ocr(format!("scratch file: {e}")))?;

        let output = Command::new("tesseract")
            .arg(scratch.path())
            .arg("stdout")
            .args(["--psm", "7"]) // single line of text
            .output()
            .map_err(|e| PortalError::Ocr(format!("failed to run tesseract: {e}")))?;
        if !output.status.success() {
            return Err(PortalError::Ocr(format!(
                "tesseract exited with {}: {}",
                output.status,
                String::from_utf8_lossy(&output.stderr).trim()
            )));
        }
        Ok(String::from_utf8_lossy(&output.stdout).trim().to_string())
    }
}

/// The portal's CAPTCHA rules: exactly 6 characters, uppercase alphanumeric,
/// and never all digits.
pub fn validate_captcha(candidate: &str) -> bool {
    if candidate.len() != CAPTCHA_LEN {
        tracing::debug!("Rejecting captcha '{}' [length != {}]", candidate, CAPTCHA_LEN);
        return false;
    }
    if ONLY_NUMERIC_RE.is_match(candidate) {
        tracing::debug!("Rejecting captcha '{}' [only numeric]", candidate);
        return false;
    }
    if !CHARSET_RE.is_match(candidate) {
        tracing::debug!("Rejecting captcha '{}' [outside A-Z0-9]", candidate);
        return false;
    }
    true
}

/// Fetches fresh CAPTCHA images and runs OCR until a candidate validates.
///
/// Every rejected attempt discards its input entirely; a new image is fetched
/// each time because the portal invalidates the previous one per session.
pub async fn acquire<F, Fut>(
    mut fetch_image: F,
    ocr: &dyn OcrEngine,
    max_attempts: u32,
) -> Result<String, PortalError>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<Vec<u8>, PortalError>>,
{
    for attempt in 1..=max_attempts {
        let image = fetch_image().await?;
        let candidate = ocr.image_to_text(&image)?.trim().to_string();
        if validate_captcha(&candidate) {
            tracing::debug!("Accepted captcha '{}' on attempt {}", candidate, attempt);
            return Ok(candidate);
        }
    }
    Err(PortalError::CaptchaExhausted(max_attempts))
}
