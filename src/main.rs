// src/main.rs
mod extractors;
mod portal;
mod storage;
mod utils;

use clap::Parser;
use extractors::record::{LandRecord, RecordExtractor};
use portal::captcha::{self, OcrEngine, TesseractOcr};
use portal::models::{ExtractRequest, LocationCodes};
use portal::PortalClient;
use storage::RecordCache;
use utils::AppError;

/// Command Line Interface for the Tamil Nadu patta/chitta extractor
#[derive(Parser, Debug)]
#[command(author, version, about = "Extract patta records for a survey number", long_about = None)]
struct Args {
    /// Name of the district
    #[arg(short, long, default_value = "Tirunelveli")]
    district: String,

    /// Name of the taluk
    #[arg(short, long, default_value = "Palayamkottai")]
    taluk: String,

    /// Name of the village
    #[arg(short, long, default_value = "Tharuvai")]
    village: String,

    /// Survey number
    #[arg(short, long)]
    survey: String,

    /// Comma-separated subdivision numbers (defaults to all the portal lists)
    #[arg(long = "sdiv", value_delimiter = ',')]
    subdivisions: Option<Vec<String>>,

    /// Path of the SQLite record cache
    #[arg(long, default_value = "patta.db")]
    db: String,

    /// CAPTCHA attempts per lookup before giving up
    #[arg(long, default_value = "25")]
    captcha_attempts: u32,
}

#[tokio::main]
async fn main() -> Result<(), AppError> {
    // 1. Setup Logging (reads RUST_LOG env var)
    utils::logging::setup_logging();

    // 2. Parse CLI Arguments
    let args = Args::parse();
    tracing::info!("Starting lookup for args: {:?}", args);

    // 3. Open the record cache
    let mut cache = RecordCache::open(&args.db)?;

    // 4. Establish the portal session
    let client = PortalClient::new()?;
    client.prime_session().await?;

    // 5. Cascading code lookups; parameters accumulate down the chain
    let district = client
        .lookup_code(&args.district, &[("page", "ruralservice"), ("ser", "dist")])
        .await?;
    let taluk = client
        .lookup_code(
            &args.taluk,
            &[
                ("page", "ruralservice"),
                ("ser", "tlk"),
                ("distcode", &district),
            ],
        )
        .await?;
    let village = client
        .lookup_code(
            &args.village,
            &[
                ("page", "ruralservice"),
                ("ser", "vill"),
                ("distcode", &district),
                ("talukcode", &taluk),
            ],
        )
        .await?;
    let codes = LocationCodes {
        district,
        taluk,
        village,
    };
    tracing::info!(
        "Resolved codes: district={} taluk={} village={}",
        codes.district,
        codes.taluk,
        codes.village
    );

    // 6. Enumerate subdivisions, honoring the --sdiv filter
    let mut subdivisions = client.subdivision_numbers(&codes, &args.survey).await?;
    tracing::info!(
        "Portal lists {} subdivision(s) for survey {}: {:?}",
        subdivisions.len(),
        args.survey,
        subdivisions
    );
    if let Some(filter) = &args.subdivisions {
        subdivisions.retain(|s| filter.contains(s));
    }
    if subdivisions.is_empty() {
        return Err(AppError::Config(format!(
            "No subdivisions to process for survey {}",
            args.survey
        )));
    }

    // 7. Process each parcel; a failed lookup never aborts the batch
    let extractor = RecordExtractor::new();
    let ocr = TesseractOcr;
    let mut success_count = 0;
    let mut failure_count = 0;

    for subdiv in &subdivisions {
        let identifier = portal::survey_identifier(&args.survey, subdiv);
        match process_parcel(
            &client, &extractor, &ocr, &mut cache, &codes, &args, subdiv, &identifier,
        )
        .await
        {
            Ok(record) => {
                success_count += 1;
                print_record(&identifier, &record);
            }
            Err(e) => {
                failure_count += 1;
                tracing::error!("Survey {}: {}", identifier, e);
            }
        }
    }

    tracing::info!(
        "Processing finished. Success: {}, Failures: {}",
        success_count,
        failure_count
    );

    if success_count == 0 {
        return Err(AppError::Processing(format!(
            "No records extracted for survey {} from {} lookups",
            args.survey, failure_count
        )));
    }

    Ok(())
}

/// One parcel lookup: cache first, then CAPTCHA, form submission, extraction,
/// cache write.
#[allow(clippy::too_many_arguments)]
async fn process_parcel(
    client: &PortalClient,
    extractor: &RecordExtractor,
    ocr: &dyn OcrEngine,
    cache: &mut RecordCache,
    codes: &LocationCodes,
    args: &Args,
    subdiv: &str,
    identifier: &str,
) -> Result<LandRecord, AppError> {
    if let Some(record) = cache.lookup(identifier)? {
        tracing::info!("Survey {}: served from cache", identifier);
        return Ok(record);
    }

    let captcha_value = captcha::acquire(
        || client.fetch_captcha_image(),
        ocr,
        args.captcha_attempts,
    )
    .await?;

    let request = ExtractRequest::survey_lookup(codes, &args.survey, subdiv, captcha_value);
    let html = client.submit_extract(&request).await?;

    let extraction = extractor.extract(&html)?;
    for warning in &extraction.warnings {
        tracing::warn!("Survey {}: {}", identifier, warning);
    }

    cache.insert(&extraction.record)?;
    Ok(extraction.record)
}

fn print_record(identifier: &str, record: &LandRecord) {
    println!("Survey {identifier}:");
    println!("  Patta Number: {}", record.patta_number);
    println!("  Person Details:");
    for (idx, person) in &record.people {
        println!("    {idx}: {person}");
    }
    println!("  Survey Details:");
    for (key, parcel) in &record.survey {
        let mut line = format!("    {key}:");
        if let Some(area) = &parcel.area {
            line.push_str(&format!(
                " {} {} ha {} ares ({} cents)",
                area.land_type.as_str(),
                area.hectares,
                area.ares,
                area.cents
            ));
        }
        if let Some(amount) = &parcel.amount {
            line.push_str(&format!(", assessment {amount}"));
        }
        if let Some(details) = &parcel.details {
            line.push_str(&format!(" [{details}]"));
        }
        println!("{line}");
    }
}
