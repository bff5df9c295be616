// src/portal/mod.rs
pub mod captcha;
pub mod client;
pub mod models;

// Re-export the types the orchestrator works with
#[allow(unused_imports)]
pub use captcha::{acquire, validate_captcha, OcrEngine, TesseractOcr};
#[allow(unused_imports)]
pub use client::PortalClient;
#[allow(unused_imports)]
pub use models::{survey_identifier, ExtractRequest, LocationCodes, OneOrMany};
