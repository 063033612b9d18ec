use std::path::Path;

use anyhow::{Context, Result};
use rusqlite::Connection;
use tracing::info;

use crate::extract::ProviderRecord;

pub const DEFAULT_DB_PATH: &str = "data/qcor.sqlite";

pub fn connect(path: &Path) -> Result<Connection> {
    if let Some(dir) = path.parent().filter(|d| !d.as_os_str().is_empty()) {
        std::fs::create_dir_all(dir)
            .with_context(|| format!("Failed to create {}", dir.display()))?;
    }
    let conn = Connection::open(path)
        .with_context(|| format!("Failed to open database {}", path.display()))?;
    conn.execute_batch("PRAGMA journal_mode=WAL;")?;
    Ok(conn)
}

/// Delete an existing database so the run starts from an empty table.
pub fn remove_existing(path: &Path) -> Result<bool> {
    if !path.exists() {
        return Ok(false);
    }
    std::fs::remove_file(path).with_context(|| format!("Failed to remove {}", path.display()))?;
    for suffix in ["-wal", "-shm"] {
        let mut side = path.as_os_str().to_owned();
        side.push(suffix);
        let _ = std::fs::remove_file(side);
    }
    info!("Removed existing database {}", path.display());
    Ok(true)
}

pub fn init_schema(conn: &Connection) -> Result<()> {
    conn.execute_batch(
        r#"
        CREATE TABLE IF NOT EXISTS qcor_mh (
            "CCN"                         TEXT,
            "Provider Name"               TEXT,
            "Address"                     TEXT,
            "City"                        TEXT,
            "State"                       TEXT,
            "Zip Code"                    TEXT,
            "Provider Type"               TEXT,
            "Original Participation Date" TEXT
        );
        "#,
    )?;
    Ok(())
}

// ── Sink ──

/// Destination for extracted records. Nothing appended is durable until
/// `commit_all`.
pub trait RecordSink {
    fn append(&mut self, record: &ProviderRecord) -> Result<()>;

    /// Make every appended record durable. Calling it again with nothing
    /// new appended changes nothing.
    fn commit_all(&mut self) -> Result<()>;
}

pub struct SqliteSink {
    conn: Connection,
}

impl SqliteSink {
    pub fn new(conn: Connection) -> Self {
        Self { conn }
    }

    #[cfg(test)]
    pub fn connection(&self) -> &Connection {
        &self.conn
    }
}

impl RecordSink for SqliteSink {
    fn append(&mut self, r: &ProviderRecord) -> Result<()> {
        if self.conn.is_autocommit() {
            self.conn.execute_batch("BEGIN TRANSACTION")?;
        }
        let mut stmt = self.conn.prepare_cached(
            r#"INSERT INTO qcor_mh
               ("CCN", "Provider Name", "Address", "City", "State", "Zip Code",
                "Provider Type", "Original Participation Date")
               VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)"#,
        )?;
        stmt.execute(rusqlite::params![
            r.ccn, r.provider_name, r.address, r.city, r.state, r.zip_code,
            r.provider_type, r.participation_date,
        ])?;
        Ok(())
    }

    fn commit_all(&mut self) -> Result<()> {
        if !self.conn.is_autocommit() {
            self.conn.execute_batch("COMMIT")?;
        }
        Ok(())
    }
}

// ── Queries ──

pub fn fetch_records(conn: &Connection, limit: Option<usize>) -> Result<Vec<ProviderRecord>> {
    let sql = format!(
        r#"SELECT "CCN", "Provider Name", "Address", "City", "State", "Zip Code",
                  "Provider Type", "Original Participation Date"
           FROM qcor_mh ORDER BY rowid{}"#,
        match limit {
            Some(n) => format!(" LIMIT {}", n),
            None => String::new(),
        }
    );
    let mut stmt = conn.prepare(&sql)?;
    let rows = stmt
        .query_map([], |row| {
            Ok(ProviderRecord {
                ccn: row.get::<_, Option<String>>(0)?.unwrap_or_default(),
                provider_name: row.get::<_, Option<String>>(1)?.unwrap_or_default(),
                address: row.get::<_, Option<String>>(2)?.unwrap_or_default(),
                city: row.get(3)?,
                state: row.get(4)?,
                zip_code: row.get(5)?,
                provider_type: row.get::<_, Option<String>>(6)?.unwrap_or_default(),
                participation_date: row.get::<_, Option<String>>(7)?.unwrap_or_default(),
            })
        })?
        .collect::<Result<Vec<_>, _>>()?;
    Ok(rows)
}

pub struct Stats {
    pub total: usize,
    pub unparsed_address: usize,
    pub by_state: Vec<(String, usize)>,
}

pub fn get_stats(conn: &Connection) -> Result<Stats> {
    let total: usize = conn.query_row("SELECT COUNT(*) FROM qcor_mh", [], |r| r.get(0))?;
    let unparsed_address: usize = conn.query_row(
        r#"SELECT COUNT(*) FROM qcor_mh WHERE "State" IS NULL"#,
        [],
        |r| r.get(0),
    )?;
    let mut stmt = conn.prepare(
        r#"SELECT "State", COUNT(*) FROM qcor_mh
           WHERE "State" IS NOT NULL
           GROUP BY "State" ORDER BY COUNT(*) DESC, "State""#,
    )?;
    let by_state = stmt
        .query_map([], |row| Ok((row.get(0)?, row.get(1)?)))?
        .collect::<Result<Vec<_>, _>>()?;
    Ok(Stats {
        total,
        unparsed_address,
        by_state,
    })
}

// ── Tests ──
