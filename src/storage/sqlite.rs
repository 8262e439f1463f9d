use crate::auditor::scoring::{HIGH_PROSPECT_SCORE, MEDIUM_PROSPECT_SCORE, calculate_score};
use crate::config::{SettingKey, Settings};
use crate::model::{
    AuditResult, AuditSignals, Business, BusinessStats, JobStatus, NewBusiness, ScrapeJob, Source,
    StorageError, UpsertOutcome,
};
use chrono::Utc;
use rusqlite::types::Type;
use rusqlite::{Connection, ErrorCode, OptionalExtension, Row, params};
use std::collections::HashMap;
use std::str::FromStr;
use tracing::debug;

const BUSINESS_COLUMNS: &str = "id, name, category, phone, email, address, city, province, website_url,
     source, needs_audit, scraped_at, created_at";

const JOB_COLUMNS: &str = "id, source, category, location, status, results_count, error_message,
     started_at, completed_at, created_at";

#[cfg(test)]
const AUDIT_COLUMNS: &str = "business_id, has_website, has_ssl, is_mobile_friendly, cms_detected,
     load_time_ms, copyright_year, score, issues, audited_at";

pub struct SqliteStorage {
    conn: Connection,
}

impl SqliteStorage {
    /// Opens the database and creates the schema if needed. `":memory:"` works for tests.
    pub fn new(db_path: &str) -> Result<Self, StorageError> {
        let conn = Connection::open(db_path)?;

        conn.execute_batch(
            "
            PRAGMA foreign_keys = ON;

            CREATE TABLE IF NOT EXISTS businesses (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                name TEXT NOT NULL,
                category TEXT,
                phone TEXT,
                email TEXT,
                address TEXT,
                city TEXT,
                province TEXT,
                website_url TEXT,
                source TEXT NOT NULL DEFAULT 'manual',
                needs_audit INTEGER NOT NULL DEFAULT 1,
                scraped_at TEXT,
                created_at TEXT NOT NULL,
                updated_at TEXT NOT NULL
            );
            CREATE UNIQUE INDEX IF NOT EXISTS index_businesses_on_name_and_city
                ON businesses (name COLLATE NOCASE, IFNULL(city, ''));
            CREATE INDEX IF NOT EXISTS index_businesses_on_needs_audit ON businesses (needs_audit);
            CREATE INDEX IF NOT EXISTS index_businesses_on_source ON businesses (source);

            CREATE TABLE IF NOT EXISTS audit_results (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                business_id INTEGER NOT NULL UNIQUE REFERENCES businesses (id) ON DELETE CASCADE,
                has_website INTEGER NOT NULL DEFAULT 0,
                has_ssl INTEGER NOT NULL DEFAULT 0,
                is_mobile_friendly INTEGER NOT NULL DEFAULT 0,
                cms_detected TEXT,
                load_time_ms INTEGER,
                copyright_year INTEGER,
                score INTEGER NOT NULL DEFAULT 0,
                issues TEXT,
                audited_at TEXT NOT NULL
            );
            CREATE INDEX IF NOT EXISTS index_audit_results_on_score ON audit_results (score);

            CREATE TABLE IF NOT EXISTS scrape_jobs (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                source TEXT NOT NULL,
                category TEXT,
                location TEXT,
                status TEXT NOT NULL DEFAULT 'pending',
                results_count INTEGER NOT NULL DEFAULT 0,
                error_message TEXT,
                started_at TEXT,
                completed_at TEXT,
                created_at TEXT NOT NULL
            );
            CREATE INDEX IF NOT EXISTS index_scrape_jobs_on_status ON scrape_jobs (status);

            CREATE TABLE IF NOT EXISTS settings (
                key TEXT PRIMARY KEY,
                value TEXT,
                updated_at TEXT NOT NULL
            );
            ",
        )?;

        Ok(Self { conn })
    }

    /// Creates a business on first sight of (name, city); on repeat sight only
    /// fills a phone or website that is currently empty.
    pub fn upsert_business(&self, record: &NewBusiness) -> Result<UpsertOutcome, StorageError> {
        let existing = self
            .conn
            .query_row(
                "SELECT id, phone, website_url FROM businesses WHERE name = ?1 AND city IS ?2",
                params![record.name, record.city],
                |row| {
                    Ok((
                        row.get::<_, i64>(0)?,
                        row.get::<_, Option<String>>(1)?,
                        row.get::<_, Option<String>>(2)?,
                    ))
                },
            )
            .optional()?;

        if let Some((id, phone, website_url)) = existing {
            let fill_phone = is_blank(&phone) && !is_blank(&record.phone);
            let fill_website = is_blank(&website_url) && !is_blank(&record.website_url);
            if !fill_phone && !fill_website {
                return Ok(UpsertOutcome::Unchanged);
            }

            self.conn.execute(
                "UPDATE businesses
                 SET phone = CASE WHEN ?2 THEN ?3 ELSE phone END,
                     website_url = CASE WHEN ?4 THEN ?5 ELSE website_url END,
                     updated_at = ?6
                 WHERE id = ?1",
                params![id, fill_phone, record.phone, fill_website, record.website_url, Utc::now()],
            )?;
            return Ok(UpsertOutcome::Backfilled);
        }

        let now = Utc::now();
        let inserted = self.conn.execute(
            "INSERT INTO businesses (
                name, category, phone, email, address, city, province, website_url,
                source, needs_audit, scraped_at, created_at, updated_at
            )
            VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, 1, ?10, ?11, ?11)",
            params![
                record.name,
                record.category,
                record.phone,
                record.email,
                record.address,
                record.city,
                record.province,
                record.website_url,
                record.source.as_str(),
                record.scraped_at,
                now,
            ],
        );

        match inserted {
            Ok(_) => Ok(UpsertOutcome::Created),
            Err(e) if is_constraint_violation(&e) => {
                debug!("Skipping duplicate business {:?} in {:?}", record.name, record.city);
                Ok(UpsertOutcome::Unchanged)
            }
            Err(e) => Err(e.into()),
        }
    }

    pub fn get_business(&self, id: i64) -> Result<Option<Business>, StorageError> {
        let sql = format!("SELECT {} FROM businesses WHERE id = ?1", BUSINESS_COLUMNS);
        Ok(self.conn.query_row(&sql, params![id], Self::map_business).optional()?)
    }

    #[cfg(test)]
    pub fn find_business(&self, name: &str, city: Option<&str>) -> Result<Option<Business>, StorageError> {
        let sql = format!(
            "SELECT {} FROM businesses WHERE name = ?1 AND city IS ?2",
            BUSINESS_COLUMNS
        );
        Ok(self.conn.query_row(&sql, params![name, city], Self::map_business).optional()?)
    }

    /// Businesses still waiting for an audit, oldest first.
    pub fn businesses_needing_audit(&self, limit: usize) -> Result<Vec<Business>, StorageError> {
        let sql = format!(
            "SELECT {} FROM businesses WHERE needs_audit = 1 ORDER BY created_at ASC, id ASC LIMIT ?1",
            BUSINESS_COLUMNS
        );
        let mut stmt = self.conn.prepare(&sql)?;
        let rows = stmt.query_map(params![limit as i64], Self::map_business)?;
        Ok(rows.collect::<Result<_, _>>()?)
    }

    #[cfg(test)]
    pub fn count_businesses(&self) -> Result<usize, StorageError> {
        let count: i64 = self.conn.query_row("SELECT COUNT(*) FROM businesses", [], |row| row.get(0))?;
        Ok(count as usize)
    }

    /// Deletes a business and, through the foreign key, its audit result.
    #[cfg(test)]
    pub fn delete_business(&self, id: i64) -> Result<bool, StorageError> {
        let deleted = self.conn.execute("DELETE FROM businesses WHERE id = ?1", params![id])?;
        Ok(deleted > 0)
    }

    /// (category, city) pairs of a source's businesses that still lack a phone number.
    pub fn backfill_combos(&self, source: Source) -> Result<Vec<(String, String)>, StorageError> {
        let mut stmt = self.conn.prepare(
            "SELECT DISTINCT category, city FROM businesses
             WHERE source = ?1
               AND (phone IS NULL OR TRIM(phone) = '')
               AND category IS NOT NULL AND TRIM(category) <> ''
               AND city IS NOT NULL AND TRIM(city) <> ''
             ORDER BY category, city",
        )?;
        let rows = stmt.query_map(params![source.as_str()], |row| Ok((row.get(0)?, row.get(1)?)))?;
        Ok(rows.collect::<Result<_, _>>()?)
    }

    /// Replaces the business's audit result and clears its `needs_audit` flag.
    pub fn save_audit_result(&mut self, business_id: i64, signals: &AuditSignals) -> Result<AuditResult, StorageError> {
        let (score, issues) = calculate_score(signals);
        let issues_json = serde_json::to_string(&issues)?;
        let audited_at = Utc::now();

        let tx = self.conn.transaction()?;
        let exists = tx
            .query_row("SELECT 1 FROM businesses WHERE id = ?1", params![business_id], |_| Ok(()))
            .optional()?
            .is_some();
        if !exists {
            return Err(StorageError::NotFound);
        }

        tx.execute(
            "INSERT INTO audit_results (
                business_id, has_website, has_ssl, is_mobile_friendly, cms_detected,
                load_time_ms, copyright_year, score, issues, audited_at
            )
            VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10)
            ON CONFLICT (business_id) DO UPDATE SET
                has_website = excluded.has_website,
                has_ssl = excluded.has_ssl,
                is_mobile_friendly = excluded.is_mobile_friendly,
                cms_detected = excluded.cms_detected,
                load_time_ms = excluded.load_time_ms,
                copyright_year = excluded.copyright_year,
                score = excluded.score,
                issues = excluded.issues,
                audited_at = excluded.audited_at",
            params![
                business_id,
                signals.has_website,
                signals.has_ssl,
                signals.is_mobile_friendly,
                signals.cms_detected,
                signals.load_time_ms,
                signals.copyright_year,
                score,
                issues_json,
                audited_at,
            ],
        )?;
        tx.execute(
            "UPDATE businesses SET needs_audit = 0, updated_at = ?2 WHERE id = ?1",
            params![business_id, audited_at],
        )?;
        tx.commit()?;

        Ok(AuditResult {
            business_id,
            signals: signals.clone(),
            score,
            issues,
            audited_at,
        })
    }

    #[cfg(test)]
    pub fn get_audit_result(&self, business_id: i64) -> Result<Option<AuditResult>, StorageError> {
        let sql = format!("SELECT {} FROM audit_results WHERE business_id = ?1", AUDIT_COLUMNS);
        Ok(self.conn.query_row(&sql, params![business_id], Self::map_audit).optional()?)
    }

    pub fn create_scrape_job(
        &self,
        source: Source,
        category: Option<&str>,
        location: Option<&str>,
    ) -> Result<ScrapeJob, StorageError> {
        self.insert_scrape_job(source.as_str(), category, location)
    }

    /// Inserts a job with a raw source identifier. Other writers of the table
    /// are not bound by [`Source`], so the worker re-validates on run.
    pub fn insert_scrape_job(
        &self,
        source: &str,
        category: Option<&str>,
        location: Option<&str>,
    ) -> Result<ScrapeJob, StorageError> {
        self.conn.execute(
            "INSERT INTO scrape_jobs (source, category, location, status, results_count, created_at)
             VALUES (?1, ?2, ?3, 'pending', 0, ?4)",
            params![source, category, location, Utc::now()],
        )?;
        let id = self.conn.last_insert_rowid();
        self.get_scrape_job(id)?.ok_or(StorageError::NotFound)
    }

    pub fn get_scrape_job(&self, id: i64) -> Result<Option<ScrapeJob>, StorageError> {
        let sql = format!("SELECT {} FROM scrape_jobs WHERE id = ?1", JOB_COLUMNS);
        Ok(self.conn.query_row(&sql, params![id], Self::map_job).optional()?)
    }

    #[cfg(test)]
    pub fn delete_scrape_jobs(&self) -> Result<usize, StorageError> {
        Ok(self.conn.execute("DELETE FROM scrape_jobs", [])?)
    }

    pub fn recent_scrape_jobs(&self, limit: usize) -> Result<Vec<ScrapeJob>, StorageError> {
        let sql = format!(
            "SELECT {} FROM scrape_jobs ORDER BY created_at DESC, id DESC LIMIT ?1",
            JOB_COLUMNS
        );
        let mut stmt = self.conn.prepare(&sql)?;
        let rows = stmt.query_map(params![limit as i64], Self::map_job)?;
        Ok(rows.collect::<Result<_, _>>()?)
    }

    pub fn mark_job_running(&self, id: i64) -> Result<ScrapeJob, StorageError> {
        self.transition_job(id, JobStatus::Running, |conn| {
            conn.execute(
                "UPDATE scrape_jobs SET status = 'running', started_at = ?2
                 WHERE id = ?1 AND status = 'pending'",
                params![id, Utc::now()],
            )
        })
    }

    pub fn mark_job_completed(&self, id: i64, results_count: usize) -> Result<ScrapeJob, StorageError> {
        self.transition_job(id, JobStatus::Completed, |conn| {
            conn.execute(
                "UPDATE scrape_jobs SET status = 'completed', completed_at = ?2, results_count = ?3
                 WHERE id = ?1 AND status = 'running'",
                params![id, Utc::now(), results_count as i64],
            )
        })
    }

    pub fn mark_job_failed(&self, id: i64, message: &str) -> Result<ScrapeJob, StorageError> {
        self.transition_job(id, JobStatus::Failed, |conn| {
            conn.execute(
                "UPDATE scrape_jobs SET status = 'failed', completed_at = ?2, error_message = ?3
                 WHERE id = ?1 AND status = 'running'",
                params![id, Utc::now(), message],
            )
        })
    }

    fn transition_job<F>(&self, id: i64, to: JobStatus, update: F) -> Result<ScrapeJob, StorageError>
    where
        F: FnOnce(&Connection) -> rusqlite::Result<usize>,
    {
        let current = self.get_scrape_job(id)?.ok_or(StorageError::NotFound)?;
        if !current.status.can_transition_to(to) {
            return Err(StorageError::InvalidTransition { from: current.status, to });
        }

        // The status guard in the UPDATE catches a concurrent transition.
        if update(&self.conn)? == 0 {
            let latest = self.get_scrape_job(id)?.ok_or(StorageError::NotFound)?;
            return Err(StorageError::InvalidTransition { from: latest.status, to });
        }

        self.get_scrape_job(id)?.ok_or(StorageError::NotFound)
    }

    /// Inserts default values for any setting that has never been written.
    pub fn seed_default_settings(&self) -> Result<(), StorageError> {
        let now = Utc::now();
        for key in SettingKey::ALL {
            self.conn.execute(
                "INSERT OR IGNORE INTO settings (key, value, updated_at) VALUES (?1, ?2, ?3)",
                params![key.as_str(), key.default_value(), now],
            )?;
        }
        Ok(())
    }

    pub fn get_setting(&self, key: SettingKey) -> Result<String, StorageError> {
        let value: Option<Option<String>> = self
            .conn
            .query_row(
                "SELECT value FROM settings WHERE key = ?1",
                params![key.as_str()],
                |row| row.get(0),
            )
            .optional()?;
        Ok(value
            .flatten()
            .unwrap_or_else(|| key.default_value().to_string()))
    }

    /// Last writer wins. Keys outside the allow-list are rejected.
    pub fn set_setting(&self, key: &str, value: &str) -> Result<(), StorageError> {
        let key = SettingKey::from_str(key).map_err(StorageError::UnknownSetting)?;
        self.conn.execute(
            "INSERT INTO settings (key, value, updated_at) VALUES (?1, ?2, ?3)
             ON CONFLICT (key) DO UPDATE SET value = excluded.value, updated_at = excluded.updated_at",
            params![key.as_str(), value, Utc::now()],
        )?;
        Ok(())
    }

    pub fn load_settings(&self) -> Result<Settings, StorageError> {
        let mut stmt = self.conn.prepare("SELECT key, value FROM settings WHERE value IS NOT NULL")?;
        let rows = stmt.query_map([], |row| Ok((row.get::<_, String>(0)?, row.get::<_, String>(1)?)))?;

        let mut values = HashMap::new();
        for row in rows {
            let (key, value) = row?;
            if let Ok(key) = key.parse::<SettingKey>() {
                values.insert(key, value);
            }
        }
        Ok(Settings::from_values(&values))
    }

    pub fn stats(&self) -> Result<BusinessStats, StorageError> {
        let count = |sql: &str| -> Result<usize, StorageError> {
            let n: i64 = self.conn.query_row(sql, [], |row| row.get(0))?;
            Ok(n as usize)
        };

        let high_sql = format!("SELECT COUNT(*) FROM audit_results WHERE score >= {}", HIGH_PROSPECT_SCORE);
        let medium_sql = format!(
            "SELECT COUNT(*) FROM audit_results WHERE score >= {} AND score < {}",
            MEDIUM_PROSPECT_SCORE, HIGH_PROSPECT_SCORE
        );

        Ok(BusinessStats {
            total: count("SELECT COUNT(*) FROM businesses")?,
            no_website: count(
                "SELECT COUNT(*) FROM businesses WHERE website_url IS NULL OR TRIM(website_url) = ''",
            )?,
            needs_audit: count("SELECT COUNT(*) FROM businesses WHERE needs_audit = 1")?,
            audited: count("SELECT COUNT(*) FROM audit_results")?,
            high_prospects: count(&high_sql)?,
            medium_prospects: count(&medium_sql)?,
            sources: self.grouped_counts(
                "SELECT source, COUNT(*) FROM businesses GROUP BY source ORDER BY source",
            )?,
            cities: self.grouped_counts(
                "SELECT city, COUNT(*) AS n FROM businesses WHERE city IS NOT NULL
                 GROUP BY city ORDER BY n DESC, city ASC LIMIT 10",
            )?,
        })
    }

    fn grouped_counts(&self, sql: &str) -> Result<Vec<(String, usize)>, StorageError> {
        let mut stmt = self.conn.prepare(sql)?;
        let rows = stmt.query_map([], |row| {
            let key: String = row.get(0)?;
            let count: i64 = row.get(1)?;
            Ok((key, count as usize))
        })?;
        Ok(rows.collect::<Result<_, _>>()?)
    }

    fn map_business(row: &Row) -> Result<Business, rusqlite::Error> {
        Ok(Business {
            id: row.get(0)?,
            name: row.get(1)?,
            category: row.get(2)?,
            phone: row.get(3)?,
            email: row.get(4)?,
            address: row.get(5)?,
            city: row.get(6)?,
            province: row.get(7)?,
            website_url: row.get(8)?,
            source: parse_column(row, 9)?,
            needs_audit: row.get(10)?,
            scraped_at: row.get(11)?,
            created_at: row.get(12)?,
        })
    }

    fn map_job(row: &Row) -> Result<ScrapeJob, rusqlite::Error> {
        Ok(ScrapeJob {
            id: row.get(0)?,
            source: row.get(1)?,
            category: row.get(2)?,
            location: row.get(3)?,
            status: parse_column(row, 4)?,
            results_count: row.get(5)?,
            error_message: row.get(6)?,
            started_at: row.get(7)?,
            completed_at: row.get(8)?,
            created_at: row.get(9)?,
        })
    }

    #[cfg(test)]
    fn map_audit(row: &Row) -> Result<AuditResult, rusqlite::Error> {
        let issues_json: Option<String> = row.get(8)?;
        let issues = match issues_json {
            Some(json) => serde_json::from_str(&json)
                .map_err(|e| rusqlite::Error::FromSqlConversionFailure(8, Type::Text, Box::new(e)))?,
            None => Vec::new(),
        };

        Ok(AuditResult {
            business_id: row.get(0)?,
            signals: AuditSignals {
                has_website: row.get(1)?,
                has_ssl: row.get(2)?,
                is_mobile_friendly: row.get(3)?,
                cms_detected: row.get(4)?,
                load_time_ms: row.get(5)?,
                copyright_year: row.get(6)?,
            },
            score: row.get(7)?,
            issues,
            audited_at: row.get(9)?,
        })
    }
}

fn parse_column<T>(row: &Row, idx: usize) -> Result<T, rusqlite::Error>
where
    T: FromStr,
    T::Err: std::error::Error + Send + Sync + 'static,
{
    let raw: String = row.get(idx)?;
    raw.parse()
        .map_err(|e| rusqlite::Error::FromSqlConversionFailure(idx, Type::Text, Box::new(e)))
}

fn is_blank(value: &Option<String>) -> bool {
    value.as_deref().is_none_or(|v| v.trim().is_empty())
}

fn is_constraint_violation(err: &rusqlite::Error) -> bool {
    matches!(err, rusqlite::Error::SqliteFailure(e, _) if e.code == ErrorCode::ConstraintViolation)
}
