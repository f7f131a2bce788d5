use std::path::PathBuf;
use std::sync::Arc;
use std::time::{Duration, SystemTime, UNIX_EPOCH};

use anyhow::{anyhow, bail, Context, Result};
use chrono::{DateTime, TimeZone, Utc};
use parking_lot::Mutex;
use rusqlite::{params, Connection, OptionalExtension, Row};

#[derive(Debug, Clone)]
pub struct Store {
    conn: Arc<Mutex<Connection>>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FnameEntry {
    pub fid: u64,
    pub fname: String,
    pub fetched_at: DateTime<Utc>,
}

#[derive(Debug, Default, Clone)]
pub struct Options {
    pub path: Option<PathBuf>,
}

impl Store {
    pub fn open(opts: Options) -> Result<Self> {
        let path = if let Some(path) = opts.path {
            path
        } else {
            default_path().context("storage: resolve default path")?
        };

        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)
                .with_context(|| format!("storage: create directory {}", parent.display()))?;
        }

        let conn = Connection::open(&path)
            .with_context(|| format!("storage: open database at {}", path.display()))?;
        conn.pragma_update(None, "journal_mode", &"WAL")
            .context("storage: set WAL")?;
        conn.pragma_update(None, "busy_timeout", &5000)
            .context("storage: set busy timeout")?;
        migrate(&conn)?;

        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
        })
    }

    pub fn close(self) -> Result<()> {
        let conn = Arc::try_unwrap(self.conn)
            .map_err(|_| anyhow!("storage: connection still in use"))?
            .into_inner();
        conn.close()
            .map_err(|(_, err)| err)
            .context("storage: close connection")
    }

    pub fn put_fname(&self, fid: u64, fname: &str) -> Result<()> {
        let fname = fname.trim();
        if fname.is_empty() {
            bail!("storage: fname required for fid {fid}");
        }
        let conn = self.conn.lock();
        conn.execute(
            r#"
INSERT INTO fnames (fid, fname, fetched_at)
VALUES (?1, ?2, ?3)
ON CONFLICT(fid) DO UPDATE SET
  fname = excluded.fname,
  fetched_at = excluded.fetched_at
"#,
            params![sql_fid(fid)?, fname, Utc::now().timestamp()],
        )
        .context("storage: upsert fname")?;
        Ok(())
    }

    pub fn get_fname(&self, fid: u64) -> Result<Option<FnameEntry>> {
        let conn = self.conn.lock();
        conn.query_row(
            r#"
SELECT fid, fname, fetched_at
FROM fnames
WHERE fid = ?1
"#,
            params![sql_fid(fid)?],
            fname_from_row,
        )
        .optional()
        .context("storage: query fname")
    }

    pub fn fresh_fname(&self, fid: u64, ttl: Duration) -> Result<Option<String>> {
        let entry = self.get_fname(fid)?;
        let cutoff = Utc::now().timestamp() - ttl.as_secs().min(i64::MAX as u64) as i64;
        Ok(entry
            .filter(|entry| entry.fetched_at.timestamp() >= cutoff)
            .map(|entry| entry.fname))
    }

    pub fn fid_for_fname(&self, fname: &str) -> Result<Option<u64>> {
        let conn = self.conn.lock();
        let fid: Option<i64> = conn
            .query_row(
                r#"
SELECT fid
FROM fnames
WHERE fname = ?1
ORDER BY fetched_at DESC
LIMIT 1
"#,
                params![fname.trim()],
                |row| row.get(0),
            )
            .optional()
            .context("storage: query fid by fname")?;
        fid.map(|fid| u64::try_from(fid).context("storage: negative fid"))
            .transpose()
    }
}

fn sql_fid(fid: u64) -> Result<i64> {
    i64::try_from(fid).with_context(|| format!("storage: fid {fid} out of range"))
}

fn fname_from_row(row: &Row<'_>) -> rusqlite::Result<FnameEntry> {
    let fid: i64 = row.get(0)?;
    let fetched: i64 = row.get(2)?;
    Ok(FnameEntry {
        fid: fid.max(0) as u64,
        fname: row.get(1)?,
        fetched_at: Utc
            .timestamp_opt(fetched, 0)
            .single()
            .unwrap_or_else(Utc::now),
    })
}

fn migrate(conn: &Connection) -> Result<()> {
    conn.execute(
        r#"
CREATE TABLE IF NOT EXISTS schema_migrations (
  version INTEGER PRIMARY KEY,
  applied_at INTEGER NOT NULL
)
"#,
        [],
    )?;

    let current: i64 = conn
        .query_row(
            "SELECT COALESCE(MAX(version), 0) FROM schema_migrations",
            [],
            |row| row.get(0),
        )
        .unwrap_or(0);

    for (idx, sql) in migrations().iter().enumerate() {
        let version = (idx + 1) as i64;
        if version <= current {
            continue;
        }
        conn.execute_batch(sql)
            .with_context(|| format!("storage: apply migration {version}"))?;
        conn.execute(
            "INSERT INTO schema_migrations (version, applied_at) VALUES (?1, ?2)",
            params![
                version,
                SystemTime::now()
                    .duration_since(UNIX_EPOCH)
                    .unwrap_or(Duration::from_secs(0))
                    .as_secs() as i64,
            ],
        )?;
    }
    Ok(())
}

fn migrations() -> Vec<&'static str> {
    vec![
        r#"
CREATE TABLE IF NOT EXISTS fnames (
  fid INTEGER PRIMARY KEY,
  fname TEXT NOT NULL,
  fetched_at INTEGER NOT NULL
);

CREATE INDEX IF NOT EXISTS idx_fnames_fname ON fnames(fname);
"#,
    ]
}

pub fn default_path() -> Option<PathBuf> {
    dirs::data_local_dir().map(|dir| dir.join("fargo").join("cache.db"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    fn open(dir: &tempfile::TempDir) -> Store {
        Store::open(Options {
            path: Some(dir.path().join("cache.db")),
        })
        .unwrap()
    }

    #[test]
    fn open_creates_database() {
        let dir = tempdir().unwrap();
        let store = open(&dir);
        assert!(dir.path().join("cache.db").exists());
        store.close().unwrap();
    }

    #[test]
    fn fname_round_trip_and_overwrite() {
        let dir = tempdir().unwrap();
        let store = open(&dir);
        assert_eq!(store.get_fname(3).unwrap(), None);
        store.put_fname(3, "dwr").unwrap();
        store.put_fname(3, " dwr.eth ").unwrap();
        let entry = store.get_fname(3).unwrap().unwrap();
        assert_eq!(entry.fid, 3);
        assert_eq!(entry.fname, "dwr.eth");
        assert_eq!(store.fid_for_fname("dwr.eth").unwrap(), Some(3));
        assert_eq!(store.fid_for_fname("dwr").unwrap(), None);
        assert!(store.put_fname(4, "  ").is_err());
    }

    #[test]
    fn stale_entries_are_not_fresh() {
        let dir = tempdir().unwrap();
        let store = open(&dir);
        store.put_fname(7, "v").unwrap();
        {
            let conn = store.conn.lock();
            conn.execute("UPDATE fnames SET fetched_at = fetched_at - 3600", [])
                .unwrap();
        }
        assert_eq!(
            store.fresh_fname(7, Duration::from_secs(7200)).unwrap(),
            Some("v".to_string())
        );
        assert_eq!(store.fresh_fname(7, Duration::from_secs(60)).unwrap(), None);
        assert!(store.get_fname(7).unwrap().is_some());
    }

    #[test]
    fn reopening_keeps_entries() {
        let dir = tempdir().unwrap();
        let store = open(&dir);
        store.put_fname(11, "eleven").unwrap();
        store.close().unwrap();
        let store = open(&dir);
        assert_eq!(store.get_fname(11).unwrap().unwrap().fname, "eleven");
    }
}
