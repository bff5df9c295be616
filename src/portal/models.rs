// src/portal/models.rs
use serde::{Deserialize, Serialize};

/// A value that the portal serializes either as a lone element or as a list.
/// Normalized to a `Vec` immediately at the parsing boundary.
#[derive(Debug, Deserialize)]
#[serde(untagged)]
pub enum OneOrMany<T> {
    One(T),
    Many(Vec<T>),
}

impl<T> OneOrMany<T> {
    pub fn into_vec(self) -> Vec<T> {
        match self {
            OneOrMany::One(v) => vec![v],
            OneOrMany::Many(vs) => vs,
        }
    }
}

/// Envelope of the ajax code-list endpoint.
/// Example: `{"landrecords": {"response": [{"name": "29", "value": "Tirunelveli"}]}}`
#[derive(Debug, Deserialize)]
pub struct CodeListResponse {
    pub landrecords: CodeListEnvelope,
}

#[derive(Debug, Deserialize)]
pub struct CodeListEnvelope {
    pub response: OneOrMany<CodeEntry>,
}

/// One code-list entry. Counterintuitively, `name` carries the code and
/// `value` the display name; `name == "00"` entries are placeholders.
#[derive(Debug, Clone, Deserialize)]
pub struct CodeEntry {
    pub name: String,
    pub value: String,
}

/// Resolved location codes for one rural extract lookup.
#[derive(Debug, Clone)]
pub struct LocationCodes {
    pub district: String,
    pub taluk: String,
    pub village: String,
}

/// Form payload for the chitta extract submission.
#[derive(Debug, Clone, Serialize)]
pub struct ExtractRequest {
    pub task: &'static str,
    pub role: &'static str,
    #[serde(rename = "viewOption")]
    pub view_option: &'static str,
    #[serde(rename = "districtCode")]
    pub district_code: String,
    #[serde(rename = "talukCode")]
    pub taluk_code: String,
    #[serde(rename = "villageCode")]
    pub village_code: String,
    #[serde(rename = "viewOpt")]
    pub view_opt: &'static str,
    #[serde(rename = "pattaNo")]
    pub patta_no: &'static str,
    #[serde(rename = "surveyNo")]
    pub survey_no: String,
    #[serde(rename = "subdivNo")]
    pub subdiv_no: String,
    pub captcha: String,
}

impl ExtractRequest {
    /// Builds the fixed-shape extract payload the portal expects for a
    /// survey-number lookup ("view" of the English chitta).
    pub fn survey_lookup(
        codes: &LocationCodes,
        survey_no: &str,
        subdiv_no: &str,
        captcha: String,
    ) -> Self {
        Self {
            task: "chittaEng",
            role: "",
            view_option: "view",
            district_code: codes.district.clone(),
            taluk_code: codes.taluk.clone(),
            village_code: codes.village.clone(),
            view_opt: "sur",
            patta_no: "",
            survey_no: survey_no.to_string(),
            subdiv_no: subdiv_no.to_string(),
            captcha,
        }
    }
}

/// Composite cache key for one parcel lookup: the survey number alone when
/// the subdivision is the "0" sentinel, `survey/subdiv` otherwise.
pub fn survey_identifier(survey_no: &str, subdiv_no: &str) -> String {
    if subdiv_no == "0" {
        survey_no.to_string()
    } else {
        format!("{survey_no}/{subdiv_no}")
    }
}
