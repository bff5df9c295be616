// src/extractors/mod.rs
pub mod record;
pub mod table;

pub(crate) mod selectors {
    use once_cell::sync::Lazy;
    use scraper::Selector;

    pub static TABLE: Lazy<Selector> =
        Lazy::new(|| Selector::parse("table").expect("Failed to compile TABLE selector"));
    pub static TR: Lazy<Selector> =
        Lazy::new(|| Selector::parse("tr").expect("Failed to compile TR selector"));
    pub static TD: Lazy<Selector> =
        Lazy::new(|| Selector::parse("td").expect("Failed to compile TD selector"));
    pub static LAND_FORM: Lazy<Selector> = Lazy::new(|| {
        Selector::parse(r#"form[name="landForm"]"#).expect("Failed to compile LAND_FORM selector")
    });
    pub static ERROR_BANNER: Lazy<Selector> = Lazy::new(|| {
        Selector::parse("font.normal_text_red").expect("Failed to compile ERROR_BANNER selector")
    });
}

// Re-export key extraction types for convenience
#[allow(unused_imports)]
pub use record::{Extraction, LandRecord, LandType, ParcelArea, ParcelMeasurement, RecordExtractor};
#[allow(unused_imports)]
pub use table::{normalize, NormalizedMatrix, RawCell, RawTable};
