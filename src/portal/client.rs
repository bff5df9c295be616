// src/portal/client.rs
use crate::portal::models::{CodeListResponse, ExtractRequest, LocationCodes};
use crate::utils::error::PortalError;
use reqwest::header;
use std::time::Duration;

const PATTA_CHECK_URL: &str =
    "https://eservices.tn.gov.in/eservicesnew/land/chittaCheckNewRural_en.html?lan=en";
const PATTA_EXTRACT_URL: &str =
    "https://eservices.tn.gov.in/eservicesnew/land/chittaExtract_en.html?lan=en";
const ESERVICES_AJAX_URL: &str = "https://eservices.tn.gov.in/eservicesnew/land/ajax.html";
const CAPTCHA_URL: &str = "https://eservices.tn.gov.in/eservicesnew/land/simpleCaptcha.html";
const PORTAL_REFERER: &str = "https://eservices.tn.gov.in/";
// Sequential, polite access only; the portal rate-limits and the CAPTCHA is
// single-use per session anyway.
const PORTAL_REQUEST_DELAY_MS: u64 = 250;

/// HTTP session against the eservices portal. Owns the cookie jar and the
/// referer header the extract endpoint insists on.
pub struct PortalClient {
    http: reqwest::Client,
}

impl PortalClient {
    pub fn new() -> Result<Self, PortalError> {
        let mut headers = header::HeaderMap::new();
        headers.insert(
            header::REFERER,
            header::HeaderValue::from_static(PORTAL_REFERER),
        );
        let http = reqwest::Client::builder()
            .cookie_store(true)
            .default_headers(headers)
            // The portal's TLS chain does not validate against stock roots.
            .danger_accept_invalid_certs(true)
            .timeout(Duration::from_secs(60))
            .build()?;
        Ok(Self { http })
    }

    /// Loads the check page once so the session cookie is established before
    /// any CAPTCHA or extract request.
    pub async fn prime_session(&self) -> Result<(), PortalError> {
        tokio::time::sleep(Duration::from_millis(PORTAL_REQUEST_DELAY_MS)).await;
        let response = self.http.get(PATTA_CHECK_URL).send().await?;
        check_status(&response, PATTA_CHECK_URL)?;
        tracing::debug!("Session primed against {}", PATTA_CHECK_URL);
        Ok(())
    }

    /// Resolves a display name (district, taluk, village) to its portal code
    /// via the ajax code-list endpoint.
    pub async fn lookup_code(
        &self,
        display_name: &str,
        params: &[(&str, &str)],
    ) -> Result<String, PortalError> {
        tokio::time::sleep(Duration::from_millis(PORTAL_REQUEST_DELAY_MS)).await;
        let response = self
            .http
            .get(ESERVICES_AJAX_URL)
            .query(params)
            .query(&[("lang", "en")])
            .send()
            .await?;
        check_status(&response, ESERVICES_AJAX_URL)?;

        let list: CodeListResponse = response.json().await?;
        resolve_code(list, display_name)
    }

    /// Enumerates the subdivision codes of a survey number. The endpoint
    /// answers XML, with a lone `<subdiv>` element when only one exists.
    pub async fn subdivision_numbers(
        &self,
        codes: &LocationCodes,
        survey_no: &str,
    ) -> Result<Vec<String>, PortalError> {
        tokio::time::sleep(Duration::from_millis(PORTAL_REQUEST_DELAY_MS)).await;
        let response = self
            .http
            .get(ESERVICES_AJAX_URL)
            .query(&[
                ("page", "getSubdivNo"),
                ("districtCode", &codes.district),
                ("talukCode", &codes.taluk),
                ("villageCode", &codes.village),
                ("surveyno", survey_no),
            ])
            .send()
            .await?;
        check_status(&response, ESERVICES_AJAX_URL)?;

        let body = response.text().await?;
        parse_subdivision_codes(&body)
    }

    /// Fetches a fresh CAPTCHA image for the current session.
    pub async fn fetch_captcha_image(&self) -> Result<Vec<u8>, PortalError> {
        tokio::time::sleep(Duration::from_millis(PORTAL_REQUEST_DELAY_MS)).await;
        let response = self.http.get(CAPTCHA_URL).send().await?;
        check_status(&response, CAPTCHA_URL)?;
        let bytes = response.bytes().await?;
        tracing::debug!("Fetched CAPTCHA image ({} bytes)", bytes.len());
        Ok(bytes.to_vec())
    }

    /// Submits the extract form and returns the response HTML for extraction.
    pub async fn submit_extract(&self, request: &ExtractRequest) -> Result<String, PortalError> {
        tokio::time::sleep(Duration::from_millis(PORTAL_REQUEST_DELAY_MS)).await;
        let response = self
            .http
            .post(PATTA_EXTRACT_URL)
            .form(request)
            .send()
            .await?;
        let status = response.status();
        tracing::info!(
            "Extract submission for survey {} returned {}",
            request.survey_no,
            status
        );
        check_status(&response, PATTA_EXTRACT_URL)?;
        Ok(response.text().await?)
    }
}

fn check_status(response: &reqwest::Response, url: &str) -> Result<(), PortalError> {
    let status = response.status();
    if !status.is_success() {
        tracing::error!("HTTP error status: {} for URL: {}", status, url);
        return Err(PortalError::Http(status));
    }
    Ok(())
}

/// Picks the code whose display name matches. The endpoint's field names are
/// inverted: `value` is the display name, `name` the code; "00" entries are
/// placeholders and never match.
fn resolve_code(list: CodeListResponse, display_name: &str) -> Result<String, PortalError> {
    list.landrecords
        .response
        .into_vec()
        .into_iter()
        .filter(|entry| entry.name != "00")
        .find(|entry| entry.value == display_name)
        .map(|entry| entry.name)
        .ok_or_else(|| PortalError::CodeNotFound(display_name.to_string()))
}

fn parse_subdivision_codes(xml: &str) -> Result<Vec<String>, PortalError> {
    let doc = roxmltree::Document::parse(xml)
        .map_err(|e| PortalError::Parse(format!("subdivision XML: {e}")))?;
    Ok(doc
        .descendants()
        .filter(|node| node.has_tag_name("subdivcode"))
        .filter_map(|node| node.text())
        .map(|text| text.trim().to_string())
        .collect())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn resolves_code_by_display_name() {
        let json = r#"{"landrecords":{"response":[
            {"name":"00","value":"Select District"},
            {"name":"29","value":"Tirunelveli"},
            {"name":"31","value":"Madurai"}
        ]}}"#;
        let list: CodeListResponse = serde_json::from_str(json).unwrap();
        assert_eq!(resolve_code(list, "Tirunelveli").unwrap(), "29");
    }

    #[test]
    fn placeholder_entries_never_match() {
        let json = r#"{"landrecords":{"response":[{"name":"00","value":"Select District"}]}}"#;
        let list: CodeListResponse = serde_json::from_str(json).unwrap();
        let err = resolve_code(list, "Select District").unwrap_err();
        assert!(matches!(err, PortalError::CodeNotFound(_)));
    }

    #[test]
    fn parses_subdivision_list() {
        let xml = r#"<root>
            <subdiv><subdivcode>1A</subdivcode></subdiv>
            <subdiv><subdivcode>2</subdivcode></subdiv>
        </root>"#;
        assert_eq!(parse_subdivision_codes(xml).unwrap(), vec!["1A", "2"]);
    }

    #[test]
    fn parses_single_subdivision() {
        let xml = "<root><subdiv><subdivcode>0</subdivcode></subdiv></root>";
        assert_eq!(parse_subdivision_codes(xml).unwrap(), vec!["0"]);
    }

    #[test]
    fn malformed_subdivision_xml_is_a_parse_error() {
        assert!(matches!(
            parse_subdivision_codes("<root><subdiv>").unwrap_err(),
            PortalError::Parse(_)
        ));
    }
}
