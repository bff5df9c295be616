// src/storage/mod.rs
//
// SQLite cache of extracted records, consulted before any network attempt.
// One row per survey/subdivision parcel; the people mapping is serialized to
// JSON and duplicated across every row sharing the patta number, so a lookup
// by any parcel key can rebuild the whole multi-subdivision record.

use crate::extractors::record::{LandRecord, LandType, ParcelArea, ParcelMeasurement};
use crate::utils::error::StorageError;
use rusqlite::{params, Connection};
use rust_decimal::Decimal;
use std::collections::BTreeMap;
use std::path::Path;
use std::str::FromStr;
use std::time::Duration;

pub struct RecordCache {
    conn: Connection,
}

impl RecordCache {
    /// Opens (creating if needed) the cache database at `path`.
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self, StorageError> {
        let conn = Connection::open(path)?;
        init_schema(&conn)?;
        Ok(Self { conn })
    }

    pub fn open_in_memory() -> Result<Self, StorageError> {
        let conn = Connection::open_in_memory()?;
        init_schema(&conn)?;
        Ok(Self { conn })
    }

    /// Writes one row per parcel inside a single transaction, so a record is
    /// either fully cached or not at all.
    pub fn insert(&mut self, record: &LandRecord) -> Result<(), StorageError> {
        let people_json = serde_json::to_string(&record.people)?;
        let fetched_at = chrono::Utc::now().to_rfc3339();

        let tx = self.conn.transaction()?;
        {
            let mut stmt = tx.prepare(
                "INSERT OR REPLACE INTO patta_survey_details
                 (survey_identifier, patta_number, land_type, hectares, ares,
                  cents, amount, details, people, fetched_at)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10)",
            )?;
            for (identifier, parcel) in &record.survey {
                let area = parcel.area.as_ref();
                stmt.execute(params![
                    identifier,
                    record.patta_number,
                    area.map(|a| a.land_type.as_str()),
                    area.map(|a| a.hectares),
                    area.map(|a| a.ares),
                    area.map(|a| a.cents.to_string()),
                    parcel.amount,
                    parcel.details,
                    people_json,
                    fetched_at,
                ])?;
            }
        }
        tx.commit()?;
        tracing::debug!(
            "Cached patta {} ({} parcel rows)",
            record.patta_number,
            record.survey.len()
        );
        Ok(())
    }

    /// Reconstructs the full record containing `survey_identifier`: resolves
    /// the patta number that parcel belongs to, then loads every row sharing
    /// it. `None` when the parcel has never been cached.
    pub fn lookup(&self, survey_identifier: &str) -> Result<Option<LandRecord>, StorageError> {
        let mut stmt = self.conn.prepare(
            "SELECT survey_identifier, patta_number, land_type, hectares, ares,
                    cents, amount, details, people
             FROM patta_survey_details
             WHERE patta_number IN
                   (SELECT patta_number FROM patta_survey_details
                    WHERE survey_identifier = ?1)",
        )?;
        let mut rows = stmt.query(params![survey_identifier])?;

        let mut patta_number: Option<u32> = None;
        let mut people: Option<BTreeMap<u32, String>> = None;
        let mut survey: BTreeMap<String, ParcelMeasurement> = BTreeMap::new();

        while let Some(row) = rows.next()? {
            let identifier: String = row.get("survey_identifier")?;
            patta_number = Some(row.get("patta_number")?);
            if people.is_none() {
                let json: String = row.get("people")?;
                people = Some(serde_json::from_str(&json)?);
            }

            let land_type: Option<String> = row.get("land_type")?;
            let area = match land_type {
                Some(name) => {
                    let land_type = name
                        .parse::<LandType>()
                        .map_err(|e| StorageError::Corrupt(identifier.clone(), e))?;
                    let hectares: Option<f64> = row.get("hectares")?;
                    let ares: Option<f64> = row.get("ares")?;
                    let cents: Option<String> = row.get("cents")?;
                    match (hectares, ares, cents) {
                        (Some(hectares), Some(ares), Some(cents)) => Some(ParcelArea {
                            land_type,
                            hectares,
                            ares,
                            cents: Decimal::from_str(&cents).map_err(|e| {
                                StorageError::Corrupt(identifier.clone(), e.to_string())
                            })?,
                        }),
                        _ => {
                            return Err(StorageError::Corrupt(
                                identifier,
                                "area columns are half-present".to_string(),
                            ))
                        }
                    }
                }
                None => None,
            };

            survey.insert(
                identifier,
                ParcelMeasurement {
                    area,
                    amount: row.get("amount")?,
                    details: row.get("details")?,
                },
            );
        }

        match (patta_number, people) {
            (Some(patta_number), Some(people)) => Ok(Some(LandRecord {
                patta_number,
                people,
                survey,
            })),
            _ => Ok(None),
        }
    }
}

fn init_schema(conn: &Connection) -> Result<(), StorageError> {
    conn.busy_timeout(Duration::from_secs(5))?;
    conn.execute(
        "CREATE TABLE IF NOT EXISTS patta_survey_details
         (
           survey_identifier  TEXT PRIMARY KEY  NOT NULL,
           patta_number       INTEGER           NOT NULL,
           land_type          TEXT,
           hectares           REAL,
           ares               REAL,
           cents              TEXT,
           amount             TEXT,
           details            TEXT,
           people             TEXT              NOT NULL,
           fetched_at         TEXT              NOT NULL
         )",
        [],
    )?;
    Ok(())
}
