//! SQLite-backed segment index.
//!
//! Reads the archive's `waveforms` table. Times are epoch seconds stored as
//! INTEGER (or REAL for sub-second boundaries); the file lives at
//! `path/waveform_basename`.

use super::{ComponentFilter, SegmentIndex, SegmentRecord, StationFilter, segment_matches, tolerance_micros};
use crate::constants::MICROS_PER_SEC;
use crate::error::{Error, Result};
use crate::time::{QueryWindow, Timestamp};
use rusqlite::types::Value;
use rusqlite::{Connection, OpenFlags, Row, params_from_iter};
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

const SELECT_COLUMNS: &str = "SELECT starttime, endtime, orig_network, new_network, station, \
     component, location, waveform_basename, path, ASDF_tag FROM waveforms";

const CREATE_TABLE: &str = "CREATE TABLE IF NOT EXISTS waveforms (
    starttime INTEGER,
    endtime INTEGER,
    orig_network VARCHAR(2) NOT NULL,
    new_network VARCHAR(2) NOT NULL,
    station VARCHAR(5) NOT NULL,
    component VARCHAR(3) NOT NULL,
    location VARCHAR(2) NOT NULL,
    waveform_basename VARCHAR(40) NOT NULL PRIMARY KEY,
    path VARCHAR(100) NOT NULL,
    ASDF_tag VARCHAR(100) NOT NULL
)";

/// Segment index over an SQLite archive database.
pub struct SqliteIndex {
    conn: Connection,
    path: PathBuf,
}

impl SqliteIndex {
    /// Open an existing archive read-only.
    pub fn open(path: &Path) -> Result<Self> {
        let conn = Connection::open_with_flags(
            path,
            OpenFlags::SQLITE_OPEN_READ_ONLY | OpenFlags::SQLITE_OPEN_NO_MUTEX,
        )
        .map_err(|e| Error::Sqlite {
            path: path.to_path_buf(),
            source: e,
        })?;
        Ok(Self {
            conn,
            path: path.to_path_buf(),
        })
    }

    /// Create (or open for writing) an archive and ensure the table exists.
    pub fn create(path: &Path) -> Result<Self> {
        let conn = Connection::open(path).map_err(|e| Error::Sqlite {
            path: path.to_path_buf(),
            source: e,
        })?;
        let index = Self {
            conn,
            path: path.to_path_buf(),
        };
        index
            .conn
            .execute(CREATE_TABLE, [])
            .map_err(|e| index.sql_error(e))?;
        Ok(index)
    }

    /// Insert records in one transaction.
    pub fn insert<'a, I>(&mut self, records: I) -> Result<usize>
    where
        I: IntoIterator<Item = &'a SegmentRecord>,
    {
        let path = self.path.clone();
        let to_err = |e| Error::Sqlite {
            path: path.clone(),
            source: e,
        };

        let tx = self.conn.transaction().map_err(to_err)?;
        let mut inserted = 0;
        {
            let mut stmt = tx
                .prepare(
                    "INSERT INTO waveforms (starttime, endtime, orig_network, new_network, \
                     station, component, location, waveform_basename, path, ASDF_tag) \
                     VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10)",
                )
                .map_err(to_err)?;

            for record in records {
                record.validate()?;
                let basename = record
                    .storage_path
                    .file_name()
                    .map(|n| n.to_string_lossy().into_owned())
                    .unwrap_or_default();
                let dir = record
                    .storage_path
                    .parent()
                    .map(|p| p.to_string_lossy().into_owned())
                    .unwrap_or_default();

                stmt.execute(rusqlite::params![
                    time_value(record.start_time),
                    time_value(record.end_time),
                    record.network_original,
                    record.network_relabel,
                    record.station,
                    record.component,
                    record.location,
                    basename,
                    dir,
                    record.content_id,
                ])
                .map_err(to_err)?;
                inserted += 1;
            }
        }
        tx.commit().map_err(to_err)?;
        Ok(inserted)
    }

    fn sql_error(&self, source: rusqlite::Error) -> Error {
        Error::Sqlite {
            path: self.path.clone(),
            source,
        }
    }

    fn query(&self, sql: &str, params: Vec<Value>) -> Result<Vec<SegmentRecord>> {
        let mut stmt = self.conn.prepare(sql).map_err(|e| self.sql_error(e))?;
        let rows = stmt
            .query_map(params_from_iter(params), decode_row)
            .map_err(|e| self.sql_error(e))?;

        let mut records = Vec::new();
        for row in rows {
            let record = match row {
                Ok(Ok(record)) => record,
                Ok(Err(reason)) => {
                    warn!("Skipping archive row: {reason}");
                    continue;
                }
                Err(
                    e @ (rusqlite::Error::InvalidColumnType(..)
                    | rusqlite::Error::FromSqlConversionFailure(..)),
                ) => {
                    warn!("Skipping archive row: {e}");
                    continue;
                }
                Err(e) => return Err(self.sql_error(e)),
            };
            if let Err(e) = record.validate() {
                warn!("Skipping archive row: {e}");
                continue;
            }
            records.push(record);
        }
        Ok(records)
    }
}

impl SegmentIndex for SqliteIndex {
    fn find_segments(
        &self,
        stations: &StationFilter,
        components: &ComponentFilter,
        window: &QueryWindow,
        tolerance_secs: Option<f64>,
    ) -> Result<Vec<SegmentRecord>> {
        let t = window.start();
        let upper = t + tolerance_micros(window, tolerance_secs);

        // Coarse superset in SQL (whole seconds), exact predicate in Rust.
        let mut sql = format!("{SELECT_COLUMNS} WHERE endtime >= ?1 AND starttime <= ?2");
        let mut params = vec![
            Value::Integer(t.as_micros().div_euclid(MICROS_PER_SEC)),
            Value::Integer(ceil_secs(upper)),
        ];

        if !stations.is_unrestricted() {
            let codes: Vec<&str> = stations.codes().collect();
            let placeholders: Vec<String> =
                (0..codes.len()).map(|i| format!("?{}", i + 3)).collect();
            sql.push_str(&format!(" AND station IN ({})", placeholders.join(", ")));
            params.extend(codes.into_iter().map(|c| Value::Text(c.to_string())));
        }

        let candidates = self.query(&sql, params)?;
        let matched: Vec<SegmentRecord> = candidates
            .into_iter()
            .filter(|r| segment_matches(r, stations, components, window, tolerance_secs))
            .collect();
        debug!(
            "SQLite index {} matched {} segment(s) at {t}",
            self.path.display(),
            matched.len()
        );
        Ok(matched)
    }

    fn station_segments(&self, station: &str) -> Result<Vec<SegmentRecord>> {
        self.query(
            &format!("{SELECT_COLUMNS} WHERE station = ?1"),
            vec![Value::Text(station.to_string())],
        )
    }

    fn stations(&self) -> Result<Vec<String>> {
        let mut stmt = self
            .conn
            .prepare("SELECT DISTINCT station FROM waveforms ORDER BY station")
            .map_err(|e| self.sql_error(e))?;
        let rows = stmt
            .query_map([], |row| row.get::<_, String>(0))
            .map_err(|e| self.sql_error(e))?;
        rows.collect::<rusqlite::Result<Vec<_>>>()
            .map_err(|e| self.sql_error(e))
    }

    fn len(&self) -> Result<usize> {
        let count: i64 = self
            .conn
            .query_row("SELECT COUNT(*) FROM waveforms", [], |row| row.get(0))
            .map_err(|e| self.sql_error(e))?;
        usize::try_from(count).map_err(|_| Error::Internal {
            message: format!("negative row count {count}"),
        })
    }
}

/// Decode one row; a row without both times decodes to `Err(reason)`.
fn decode_row(row: &Row<'_>) -> rusqlite::Result<std::result::Result<SegmentRecord, String>> {
    let start: Option<f64> = row.get(0)?;
    let end: Option<f64> = row.get(1)?;
    let basename: String = row.get(7)?;
    let dir: String = row.get(8)?;
    let (Some(start), Some(end)) = (start, end) else {
        return Ok(Err(format!("'{basename}' has no start or end time")));
    };
    Ok(Ok(SegmentRecord {
        start_time: Timestamp::from_secs_f64(start),
        end_time: Timestamp::from_secs_f64(end),
        network_original: row.get(2)?,
        network_relabel: row.get(3)?,
        station: row.get(4)?,
        component: row.get(5)?,
        location: row.get(6)?,
        storage_path: Path::new(&dir).join(basename),
        content_id: row.get(9)?,
    }))
}

/// Whole seconds stay INTEGER so archives written by other tools compare cleanly.
fn time_value(ts: Timestamp) -> Value {
    let micros = ts.as_micros();
    if micros % MICROS_PER_SEC == 0 {
        Value::Integer(micros / MICROS_PER_SEC)
    } else {
        Value::Real(ts.as_secs_f64())
    }
}

fn ceil_secs(ts: Timestamp) -> i64 {
    let micros = ts.as_micros();
    micros.div_euclid(MICROS_PER_SEC) + i64::from(micros.rem_euclid(MICROS_PER_SEC) != 0)
}
