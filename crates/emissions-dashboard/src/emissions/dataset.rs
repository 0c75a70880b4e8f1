//! Read-only access to the emissions database.

use std::path::{Path, PathBuf};

use rusqlite::types::ValueRef;
use rusqlite::{Connection, OpenFlags};
use thiserror::Error;
use tracing::{debug, info, warn};

use super::quarter::CalendarQuarter;

pub const EMISSIONS_TABLE: &str = "greenhouse_gas_emissions";
pub const QUARTER_COLUMN: &str = "Quarter";
pub const GAS_TYPE_COLUMN: &str = "gas_type";
pub const EMISSIONS_COLUMN: &str = "GHG Emissions (MtCO2e)";

pub const CONTINENT_TABLE: &str = "emissions";
pub const CONTINENT_COLUMN: &str = "continent";
pub const EMISSION_RATE_COLUMN: &str = "emission_rate";
pub const CONTINENT_QUARTER_COLUMN: &str = "quarter";

/// Schema problems in the source data. All of them are fatal: no chart is
/// produced from a partially readable table.
#[derive(Debug, Error)]
pub enum DatasetError {
    #[error("emissions database not found at {0}")]
    MissingDatabase(PathBuf),
    #[error("table '{table}' not found in emissions database")]
    MissingTable { table: String },
    #[error("column '{column}' missing from table '{table}'")]
    MissingColumn { table: String, column: String },
    #[error("unparseable quarter '{value}' in table '{table}'")]
    InvalidQuarter { table: String, value: String },
    #[error("non-numeric value '{value}' in column '{column}' of table '{table}'")]
    InvalidValue {
        table: String,
        column: String,
        value: String,
    },
    #[error(transparent)]
    Sqlite(#[from] rusqlite::Error),
}

#[derive(Debug, Clone, PartialEq)]
pub struct EmissionRecord {
    pub quarter: CalendarQuarter,
    pub gas_type: String,
    /// `None` for NULL cells; ignored by every aggregate.
    pub emissions: Option<f64>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ContinentRecord {
    pub continent: String,
    pub emission_rate: Option<f64>,
    /// Compared as a literal string, never parsed.
    pub quarter: String,
}

#[derive(Debug, Clone)]
pub struct EmissionsSource {
    path: PathBuf,
}

impl EmissionsSource {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn open(&self) -> Result<Connection, DatasetError> {
        if !self.path.exists() {
            return Err(DatasetError::MissingDatabase(self.path.clone()));
        }
        let conn = Connection::open_with_flags(
            &self.path,
            OpenFlags::SQLITE_OPEN_READ_ONLY | OpenFlags::SQLITE_OPEN_NO_MUTEX,
        )?;
        Ok(conn)
    }

    /// Checks both source tables without reading any rows.
    pub fn verify_schema(&self) -> Result<(), DatasetError> {
        let conn = self.open()?;
        require_columns(&conn, EMISSIONS_TABLE, &[QUARTER_COLUMN, GAS_TYPE_COLUMN, EMISSIONS_COLUMN])?;
        require_columns(
            &conn,
            CONTINENT_TABLE,
            &[CONTINENT_COLUMN, EMISSION_RATE_COLUMN, CONTINENT_QUARTER_COLUMN],
        )?;
        info!("Emissions schema verified at {}", self.path.display());
        Ok(())
    }

    pub fn load_emissions(&self) -> Result<Vec<EmissionRecord>, DatasetError> {
        let conn = self.open()?;
        require_columns(&conn, EMISSIONS_TABLE, &[QUARTER_COLUMN, GAS_TYPE_COLUMN, EMISSIONS_COLUMN])?;

        let sql = format!(
            "SELECT \"{}\", \"{}\", \"{}\" FROM \"{}\"",
            QUARTER_COLUMN, GAS_TYPE_COLUMN, EMISSIONS_COLUMN, EMISSIONS_TABLE
        );
        let mut stmt = conn.prepare(&sql)?;
        let mut rows = stmt.query([])?;
        let mut records = Vec::new();
        let mut skipped = 0usize;

        while let Some(row) = rows.next()? {
            let raw_quarter = text_value(row.get_ref(0)?);
            let quarter = raw_quarter
                .as_deref()
                .and_then(CalendarQuarter::parse)
                .ok_or_else(|| DatasetError::InvalidQuarter {
                    table: EMISSIONS_TABLE.to_string(),
                    value: raw_quarter.clone().unwrap_or_else(|| "NULL".to_string()),
                })?;

            let Some(gas_type) = text_value(row.get_ref(1)?) else {
                skipped += 1;
                continue;
            };

            let emissions = numeric_value(row.get_ref(2)?, EMISSIONS_TABLE, EMISSIONS_COLUMN)?;
            records.push(EmissionRecord {
                quarter,
                gas_type,
                emissions,
            });
        }

        if skipped > 0 {
            warn!("Skipped {} emission rows without a gas type", skipped);
        }
        debug!("Loaded {} emission rows", records.len());
        Ok(records)
    }

    pub fn load_continents(&self) -> Result<Vec<ContinentRecord>, DatasetError> {
        let conn = self.open()?;
        require_columns(
            &conn,
            CONTINENT_TABLE,
            &[CONTINENT_COLUMN, EMISSION_RATE_COLUMN, CONTINENT_QUARTER_COLUMN],
        )?;

        let sql = format!(
            "SELECT \"{}\", \"{}\", \"{}\" FROM \"{}\"",
            CONTINENT_COLUMN, EMISSION_RATE_COLUMN, CONTINENT_QUARTER_COLUMN, CONTINENT_TABLE
        );
        let mut stmt = conn.prepare(&sql)?;
        let mut rows = stmt.query([])?;
        let mut records = Vec::new();

        while let Some(row) = rows.next()? {
            let (Some(continent), Some(quarter)) = (text_value(row.get_ref(0)?), text_value(row.get_ref(2)?)) else {
                continue;
            };
            let emission_rate = numeric_value(row.get_ref(1)?, CONTINENT_TABLE, EMISSION_RATE_COLUMN)?;
            records.push(ContinentRecord {
                continent,
                emission_rate,
                quarter,
            });
        }

        debug!("Loaded {} continent rows", records.len());
        Ok(records)
    }
}

fn require_columns(conn: &Connection, table: &str, columns: &[&str]) -> Result<(), DatasetError> {
    let exists: i64 = conn.query_row(
        "SELECT COUNT(*) FROM sqlite_master WHERE type IN ('table', 'view') AND name = ?1",
        [table],
        |row| row.get(0),
    )?;
    if exists == 0 {
        return Err(DatasetError::MissingTable {
            table: table.to_string(),
        });
    }

    let mut stmt = conn.prepare("SELECT name FROM pragma_table_info(?1)")?;
    let present = stmt
        .query_map([table], |row| row.get::<_, String>(0))?
        .collect::<rusqlite::Result<Vec<_>>>()?;

    for column in columns {
        if !present.iter().any(|name| name == column) {
            return Err(DatasetError::MissingColumn {
                table: table.to_string(),
                column: column.to_string(),
            });
        }
    }
    Ok(())
}

/// Text form of a cell; numbers are stringified the way a dataframe would.
fn text_value(value: ValueRef<'_>) -> Option<String> {
    match value {
        ValueRef::Null => None,
        ValueRef::Integer(i) => Some(i.to_string()),
        ValueRef::Real(f) => Some(f.to_string()),
        ValueRef::Text(bytes) | ValueRef::Blob(bytes) => {
            Some(String::from_utf8_lossy(bytes).into_owned())
        }
    }
}

fn numeric_value(value: ValueRef<'_>, table: &str, column: &str) -> Result<Option<f64>, DatasetError> {
    match value {
        ValueRef::Null => Ok(None),
        ValueRef::Integer(i) => Ok(Some(i as f64)),
        ValueRef::Real(f) if f.is_nan() => Ok(None),
        ValueRef::Real(f) => Ok(Some(f)),
        ValueRef::Text(bytes) | ValueRef::Blob(bytes) => {
            let text = String::from_utf8_lossy(bytes);
            let trimmed = text.trim().replace(',', "");
            if trimmed.is_empty() {
                return Ok(None);
            }
            trimmed
                .parse::<f64>()
                .map(Some)
                .map_err(|_| DatasetError::InvalidValue {
                    table: table.to_string(),
                    column: column.to_string(),
                    value: text.into_owned(),
                })
        }
    }
}


#[cfg(test)]
mod tests {
    use super::fixtures::create_emissions_db;
    use super::*;
    use crate::emissions::quarter::QuarterLabel;

    #[test]
    fn test_load_emissions_derives_calendar_features() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("cleaned_data.db");
        create_emissions_db(
            &path,
            &[("2023-01-01", "CO2", 10.0), ("2023-04-01 00:00:00", "CH4", 4.5)],
            &[("Asia", 20.0, "2024Q2")],
        );

        let source = EmissionsSource::new(&path);
        source.verify_schema().unwrap();
        let records = source.load_emissions().unwrap();
        assert_eq!(records.len(), 2);
        assert_eq!(records[0].quarter.year, 2023);
        assert_eq!(records[0].quarter.label, QuarterLabel::Q1);
        assert_eq!(records[1].quarter.label, QuarterLabel::Q2);
        assert_eq!(records[1].gas_type, "CH4");
        assert_eq!(records[1].emissions, Some(4.5));

        let continents = source.load_continents().unwrap();
        assert_eq!(continents[0].quarter, "2024Q2");
    }

    #[test]
    fn test_missing_gas_type_column_is_fatal() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("cleaned_data.db");
        let conn = Connection::open(&path).unwrap();
        conn.execute_batch(
            "CREATE TABLE greenhouse_gas_emissions (\"Quarter\" TEXT, \"GHG Emissions (MtCO2e)\" REAL);
             INSERT INTO greenhouse_gas_emissions VALUES ('2023-01-01', 1.0);",
        )
        .unwrap();
        drop(conn);

        let err = EmissionsSource::new(&path).load_emissions().unwrap_err();
        match err {
            DatasetError::MissingColumn { table, column } => {
                assert_eq!(table, EMISSIONS_TABLE);
                assert_eq!(column, GAS_TYPE_COLUMN);
            }
            other => panic!("expected MissingColumn, got {:?}", other),
        }
    }

    #[test]
    fn test_missing_table_and_database() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("cleaned_data.db");
        Connection::open(&path).unwrap().execute_batch("CREATE TABLE other (x INTEGER);").unwrap();

        assert!(matches!(
            EmissionsSource::new(&path).load_continents(),
            Err(DatasetError::MissingTable { .. })
        ));
        assert!(matches!(
            EmissionsSource::new(dir.path().join("absent.db")).verify_schema(),
            Err(DatasetError::MissingDatabase(_))
        ));
    }

    #[test]
    fn test_unparseable_quarter_is_fatal() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("cleaned_data.db");
        create_emissions_db(&path, &[("sometime", "CO2", 1.0)], &[]);

        assert!(matches!(
            EmissionsSource::new(&path).load_emissions(),
            Err(DatasetError::InvalidQuarter { .. })
        ));
    }

    #[test]
    fn test_numeric_value_handles_text_cells() {
        assert_eq!(numeric_value(ValueRef::Text(b"1,234.5"), "t", "c").unwrap(), Some(1234.5));
        assert_eq!(numeric_value(ValueRef::Text(b"  "), "t", "c").unwrap(), None);
        assert_eq!(numeric_value(ValueRef::Null, "t", "c").unwrap(), None);
        assert!(numeric_value(ValueRef::Text(b"n/a"), "t", "c").is_err());
    }
}
