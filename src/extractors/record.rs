// src/extractors/record.rs

// --- Imports ---
use crate::extractors::selectors;
use crate::extractors::table::{self, nearest_table, RawTable};
use crate::utils::error::ExtractError;
use once_cell::sync::Lazy;
use regex::Regex;
use rust_decimal::Decimal;
use scraper::{ElementRef, Html};
use std::collections::BTreeMap;
use std::str::FromStr;

// --- Constants ---
// The extract page labels the title number in Tamil; the trailing token on
// that line is the number itself.
const PATTA_LABEL: &str = "பட்டா எண்";

static WSPACE_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\s+").expect("Failed to compile WSPACE_RE"));

// 1 hectare = 100 ares = 2.47 acres = 247 cents.
static ARES_TO_CENTS: Lazy<Decimal> = Lazy::new(|| Decimal::new(247, 2));

// --- Data Structures ---

/// Land classification derived from the survey table's column headers.
/// Nanjai (wetland) and Punjai (dryland) in the portal's own terms.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LandType {
    Dry,
    Wet,
    Other,
}

impl LandType {
    pub fn as_str(&self) -> &'static str {
        match self {
            LandType::Dry => "dryland",
            LandType::Wet => "wetland",
            LandType::Other => "other",
        }
    }
}

impl FromStr for LandType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "dryland" => Ok(LandType::Dry),
            "wetland" => Ok(LandType::Wet),
            "other" => Ok(LandType::Other),
            other => Err(format!("unknown land type '{other}'")),
        }
    }
}

/// Non-zero area measurement for one parcel. The fields travel together:
/// a row whose spread column parses to zero carries no `ParcelArea` at all.
#[derive(Debug, Clone, PartialEq)]
pub struct ParcelArea {
    pub land_type: LandType,
    pub hectares: f64,
    pub ares: f64,
    /// (hectares * 100 + ares) * 2.47, quantized before the multiply.
    pub cents: Decimal,
}

impl ParcelArea {
    pub fn new(land_type: LandType, hectares: f64, ares: f64) -> Self {
        Self {
            land_type,
            hectares,
            ares,
            cents: cents_from(hectares, ares),
        }
    }
}

/// One survey/subdivision row of the measurement table.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct ParcelMeasurement {
    pub area: Option<ParcelArea>,
    /// Assessment amount, kept only when its column's land type matches the
    /// recorded spread; guards against amounts for an unrelated zero-area type.
    pub amount: Option<String>,
    pub details: Option<String>,
}

/// A fully-extracted patta record. All three parts are present together or
/// the extraction fails as a whole; partial records are never produced.
#[derive(Debug, Clone, PartialEq)]
pub struct LandRecord {
    pub patta_number: u32,
    /// Person index (1-based, as printed) to ownership/share description.
    pub people: BTreeMap<u32, String>,
    /// "surveyNo" or "surveyNo/subdivision" to its measurement.
    pub survey: BTreeMap<String, ParcelMeasurement>,
}

/// Extraction result plus row-level warnings for rows that failed the
/// expected schema and were skipped.
#[derive(Debug, Clone)]
pub struct Extraction {
    pub record: LandRecord,
    pub warnings: Vec<String>,
}

/// Role of a nested table inside the outer results table.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum TableRole {
    People,
    Survey,
}

// The portal renders the ownership table first and the measurement table
// second. Layout drift only requires reordering this list.
const NESTED_TABLE_ROLES: &[TableRole] = &[TableRole::People, TableRole::Survey];

/// Column meaning at each index of the normalized survey table.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ColumnRole {
    SurveyNo,
    Subdivision,
    Spread(LandType),
    Amount(LandType),
    Details,
}

const SURVEY_COLUMNS: &[ColumnRole] = &[
    ColumnRole::SurveyNo,
    ColumnRole::Subdivision,
    ColumnRole::Spread(LandType::Dry),
    ColumnRole::Amount(LandType::Dry),
    ColumnRole::Spread(LandType::Wet),
    ColumnRole::Amount(LandType::Wet),
    ColumnRole::Spread(LandType::Other),
    ColumnRole::Amount(LandType::Other),
    ColumnRole::Details,
];

// --- Main Extractor Structure ---
pub struct RecordExtractor;

impl RecordExtractor {
    pub fn new() -> Self {
        Self {}
    }

    /// Extracts a `LandRecord` from an extract-page response.
    ///
    /// When the outer results table is missing the failure shape depends on
    /// what else is present: an error banner inside the portal's form becomes
    /// `FormError` with the portal's message verbatim; otherwise `NotFound`.
    pub fn extract(&self, html: &str) -> Result<Extraction, ExtractError> {
        let document = Html::parse_document(html);

        let Some(outer) = document.select(&selectors::TABLE).next() else {
            if document.select(&selectors::LAND_FORM).next().is_some() {
                let message = document
                    .select(&selectors::ERROR_BANNER)
                    .next()
                    .map(|el| clean_text(&el.text().collect::<String>()))
                    .unwrap_or_else(|| "portal rejected the request".to_string());
                return Err(ExtractError::FormError(message));
            }
            return Err(ExtractError::NotFound);
        };

        let mut warnings = Vec::new();
        let mut people = None;
        let mut survey = None;

        // Nested tables directly under the outer table, in document order,
        // paired with their expected roles.
        let nested = outer
            .select(&selectors::TABLE)
            .filter(|t| nearest_table(*t).map(|a| a.id()) == Some(outer.id()));
        for (el, role) in nested.zip(NESTED_TABLE_ROLES) {
            match role {
                TableRole::People => people = Some(self.person_details(el, &mut warnings)),
                TableRole::Survey => survey = Some(self.survey_details(el, &mut warnings)),
            }
        }

        let mut patta_number = None;
        for td in outer.select(&selectors::TD) {
            if td.select(&selectors::TABLE).next().is_some() {
                continue;
            }
            let text = clean_text(&td.text().collect::<String>());
            if !text.contains(PATTA_LABEL) {
                continue;
            }
            match text.split_whitespace().last().map(str::parse::<u32>) {
                Some(Ok(number)) => patta_number = Some(number),
                _ => warnings.push(format!("unparseable patta number in '{text}'")),
            }
        }

        let patta_number =
            patta_number.ok_or(ExtractError::MissingSection("patta number label"))?;
        let people = people.ok_or(ExtractError::MissingSection("person table"))?;
        let survey = survey.ok_or(ExtractError::MissingSection("survey table"))?;

        Ok(Extraction {
            record: LandRecord {
                patta_number,
                people,
                survey,
            },
            warnings,
        })
    }

    /// Person/ownership table: rows keyed by the integer index in the first
    /// column, value is the remaining columns joined by single spaces. Rows
    /// with a non-integer index are skipped with a warning.
    fn person_details(
        &self,
        table_el: ElementRef,
        warnings: &mut Vec<String>,
    ) -> BTreeMap<u32, String> {
        let matrix = table::normalize(&RawTable::from_element(table_el));
        let mut people = BTreeMap::new();
        for row in &matrix {
            let Some(first) = row.first().and_then(|c| c.as_deref()) else {
                continue;
            };
            let index = first.trim().trim_matches('.').trim();
            if index.is_empty() {
                continue;
            }
            match index.parse::<u32>() {
                Ok(idx) => {
                    let description = row[1..]
                        .iter()
                        .filter_map(|c| c.as_deref())
                        .map(|c| c.trim().trim_matches('.').trim())
                        .filter(|c| !c.is_empty())
                        .collect::<Vec<_>>()
                        .join(" ");
                    people.insert(idx, description);
                }
                Err(_) => {
                    warnings.push(format!("skipping person row with index '{index}'"));
                }
            }
        }
        people
    }

    /// Survey/measurement table: blank rows dropped, then the two header rows
    /// and the trailing totals row, then each remaining row classified by the
    /// fixed column schema.
    fn survey_details(
        &self,
        table_el: ElementRef,
        warnings: &mut Vec<String>,
    ) -> BTreeMap<String, ParcelMeasurement> {
        let matrix = table::normalize(&RawTable::from_element(table_el));
        let rows: Vec<Vec<String>> = matrix
            .iter()
            .filter(|row| row.iter().any(|c| c.is_some()))
            .map(|row| {
                row.iter()
                    .map(|c| c.as_deref().unwrap_or("").trim().to_string())
                    .collect()
            })
            .collect();

        let mut survey = BTreeMap::new();
        if rows.len() < 4 {
            // Two header rows and a totals row leave no data.
            return survey;
        }

        for row in &rows[2..rows.len() - 1] {
            let (Some(survey_no), Some(subdiv)) = (row.first(), row.get(1)) else {
                continue;
            };
            if survey_no.is_empty() {
                continue;
            }
            let key = if subdiv.starts_with('-') {
                survey_no.clone()
            } else {
                format!("{survey_no}/{subdiv}")
            };

            let mut parcel = ParcelMeasurement::default();
            for (idx, value) in row.iter().enumerate().skip(2) {
                let Some(role) = SURVEY_COLUMNS.get(idx) else {
                    break;
                };
                match role {
                    ColumnRole::Spread(land_type) => match parse_spread(value) {
                        Ok((hectares, ares)) => {
                            if hectares != 0.0 || ares != 0.0 {
                                parcel.area = Some(ParcelArea::new(*land_type, hectares, ares));
                            }
                        }
                        Err(reason) => {
                            warnings.push(format!(
                                "survey {key}: bad spread value '{value}': {reason}"
                            ));
                        }
                    },
                    ColumnRole::Amount(land_type) => {
                        let recorded = parcel.area.as_ref().map(|a| a.land_type);
                        if recorded == Some(*land_type) && !value.is_empty() {
                            parcel.amount = Some(value.clone());
                        }
                    }
                    ColumnRole::Details => {
                        if !value.is_empty() {
                            parcel.details = Some(value.clone());
                        }
                    }
                    ColumnRole::SurveyNo | ColumnRole::Subdivision => {}
                }
            }
            survey.insert(key, parcel);
        }
        survey
    }
}

impl Default for RecordExtractor {
    fn default() -> Self {
        Self::new()
    }
}

/// Parses a spread column of the form `"<hectares> - <ares>"`; either side
/// may be blank and defaults to 0.
fn parse_spread(value: &str) -> Result<(f64, f64), String> {
    let Some((hectares, ares)) = value.split_once('-') else {
        return Err("expected '<hectares> - <ares>'".to_string());
    };
    Ok((parse_area_side(hectares)?, parse_area_side(ares)?))
}

fn parse_area_side(side: &str) -> Result<f64, String> {
    let side = side.trim();
    if side.is_empty() {
        return Ok(0.0);
    }
    side.parse::<f64>().map_err(|e| e.to_string())
}

/// Hectares/ares to cents, via the fixed 2.47 acre conversion. The float sum
/// is quantized to a decimal before the multiply so the monetary-adjacent
/// value never carries binary rounding drift.
fn cents_from(hectares: f64, ares: f64) -> Decimal {
    let total_ares = hectares * 100.0 + ares;
    // Shortest-roundtrip display is exact for every value the portal prints.
    Decimal::from_str(&total_ares.to_string()).unwrap_or_default() * *ARES_TO_CENTS
}

fn clean_text(text: &str) -> String {
    WSPACE_RE.replace_all(text.trim(), " ").to_string()
}

// --- Tests ---
#[cfg(test)]
mod tests {
    use super::*;

    const EXTRACT_PAGE: &str = r#"
        <!DOCTYPE html>
        <html><body>
        <table>
          <tr><td> பட்டா எண் : <b>1289</b> </td></tr>
          <tr><td>
            <table>
              <tr><td>1.</td><td>Raman</td><td>s/o Krishnan</td></tr>
              <tr><td>2.</td><td>Lakshmi</td><td>w/o Raman</td></tr>
              <tr><td></td><td>continuation text</td><td></td></tr>
            </table>
          </td></tr>
          <tr><td>
            <table>
              <tr>
                <th rowspan="2">Survey No</th><th rowspan="2">Subdiv</th>
                <th colspan="2">Punjai</th><th colspan="2">Nanjai</th>
                <th colspan="2">Other</th><th rowspan="2">Details</th>
              </tr>
              <tr>
                <th>Spread</th><th>Tax</th><th>Spread</th><th>Tax</th>
                <th>Spread</th><th>Tax</th>
              </tr>
              <tr>
                <td>120</td><td>-</td>
                <td> 1 - 25</td><td>2.50</td>
                <td> - </td><td></td>
                <td> - </td><td></td>
                <td>ancestral</td>
              </tr>
              <tr>
                <td>120</td><td>4</td>
                <td> - </td><td>9.99</td>
                <td>0 - 50</td><td>1.00</td>
                <td> - </td><td></td>
                <td></td>
              </tr>
              <tr>
                <td>Total</td><td></td>
                <td>1 - 75</td><td>3.50</td>
                <td>0 - 50</td><td>1.00</td>
                <td> - </td><td></td>
                <td></td>
              </tr>
            </table>
          </td></tr>
        </table>
        </body></html>
    "#;

    #[test]
    fn extracts_full_record() {
        let extraction = RecordExtractor::new().extract(EXTRACT_PAGE).unwrap();
        let record = &extraction.record;

        assert_eq!(record.patta_number, 1289);

        assert_eq!(record.people.len(), 2);
        assert_eq!(record.people[&1], "Raman s/o Krishnan");
        assert_eq!(record.people[&2], "Lakshmi w/o Raman");

        assert_eq!(record.survey.len(), 2);

        let dry = &record.survey["120"];
        let area = dry.area.as_ref().unwrap();
        assert_eq!(area.land_type, LandType::Dry);
        assert_eq!(area.hectares, 1.0);
        assert_eq!(area.ares, 25.0);
        assert_eq!(area.cents, Decimal::from_str("308.75").unwrap());
        assert_eq!(dry.amount.as_deref(), Some("2.50"));
        assert_eq!(dry.details.as_deref(), Some("ancestral"));

        let wet = &record.survey["120/4"];
        let area = wet.area.as_ref().unwrap();
        assert_eq!(area.land_type, LandType::Wet);
        assert_eq!(area.hectares, 0.0);
        assert_eq!(area.ares, 50.0);
        // The dry amount 9.99 must not leak in: its spread parsed to zero.
        assert_eq!(wet.amount.as_deref(), Some("1.00"));
        assert_eq!(wet.details, None);

        assert!(extraction.warnings.is_empty(), "{:?}", extraction.warnings);
    }

    #[test]
    fn extraction_is_idempotent() {
        let extractor = RecordExtractor::new();
        let first = extractor.extract(EXTRACT_PAGE).unwrap();
        let second = extractor.extract(EXTRACT_PAGE).unwrap();
        assert_eq!(first.record, second.record);
    }

    #[test]
    fn missing_table_with_error_banner_is_form_error() {
        let html = r#"
            <html><body>
            <form name="landForm">
              <font class="normal_text_red"> Invalid  Survey Number </font>
            </form>
            </body></html>
        "#;
        let err = RecordExtractor::new().extract(html).unwrap_err();
        match err {
            ExtractError::FormError(msg) => assert_eq!(msg, "Invalid Survey Number"),
            other => panic!("expected FormError, got {other:?}"),
        }
    }

    #[test]
    fn missing_table_without_banner_is_not_found() {
        let err = RecordExtractor::new()
            .extract("<html><body><p>maintenance window</p></body></html>")
            .unwrap_err();
        assert!(matches!(err, ExtractError::NotFound));
    }

    #[test]
    fn outer_table_without_nested_tables_fails_whole() {
        let html = r#"<html><body><table><tr><td>பட்டா எண் : 5</td></tr></table></body></html>"#;
        let err = RecordExtractor::new().extract(html).unwrap_err();
        assert!(matches!(err, ExtractError::MissingSection(_)));
    }

    #[test]
    fn malformed_person_row_is_skipped_with_warning() {
        let html = r#"
            <html><body><table>
              <tr><td>பட்டா எண் : 7</td></tr>
              <tr><td><table>
                <tr><td>1.</td><td>Good Row</td></tr>
                <tr><td>xx</td><td>Bad Row</td></tr>
              </table></td></tr>
              <tr><td><table>
                <tr><th>h</th></tr><tr><th>h</th></tr>
                <tr><td>t</td></tr>
              </table></td></tr>
            </table></body></html>
        "#;
        let extraction = RecordExtractor::new().extract(html).unwrap();
        assert_eq!(extraction.record.people.len(), 1);
        assert_eq!(extraction.record.people[&1], "Good Row");
        assert_eq!(extraction.warnings.len(), 1);
        assert!(extraction.warnings[0].contains("xx"));
    }

    #[test]
    fn spread_parse_vectors() {
        assert_eq!(parse_spread(" 1 - 25").unwrap(), (1.0, 25.0));
        assert_eq!(parse_spread(" - ").unwrap(), (0.0, 0.0));
        assert_eq!(parse_spread("0.5-").unwrap(), (0.5, 0.0));
        assert!(parse_spread("no separator").is_err());
    }

    #[test]
    fn cents_conversion_matches_fixed_constant() {
        assert_eq!(cents_from(1.0, 25.0), Decimal::from_str("308.75").unwrap());
        assert_eq!(cents_from(0.0, 0.0), Decimal::from_str("0").unwrap());
    }
}
