//! Repository pattern for lead persistence
//!
//! Business logic depends on the [`LeadRepository`] trait only, so the
//! emission loop and HTTP handlers can run against SQLite in production and
//! an in-memory store in tests.
//!
//! ```text
//! ┌──────────────────────────────────────────────┐
//! │  EmissionScheduler / API handlers / commands │
//! └──────────────────────┬───────────────────────┘
//!                        ▼
//!              ┌───────────────────┐
//!              │  LeadRepository   │
//!              └─────────┬─────────┘
//!             ┌──────────┴──────────┐
//!             ▼                     ▼
//!   ┌──────────────────┐  ┌──────────────────┐
//!   │      SQLite      │  │    In-memory     │
//!   └──────────────────┘  └──────────────────┘
//! ```

use std::path::Path;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, RwLock};

use async_trait::async_trait;
use chrono::{DateTime, SecondsFormat, Utc};
use rusqlite::{params, params_from_iter, Connection, OptionalExtension};

use super::{StorageError, StorageResult};
use crate::models::{Lead, LeadPage, LeadQuery, LeadUpdate};

// ============================================================================
// Repository Trait
// ============================================================================

/// Access to the persisted lead collection
#[async_trait]
pub trait LeadRepository: Send + Sync {
    /// Every stored lead, newest first; may be empty
    async fn fetch_all(&self) -> StorageResult<Vec<Lead>>;

    /// Number of stored leads
    async fn count(&self) -> StorageResult<u64>;

    /// Filtered, paginated listing, newest first
    ///
    /// Search is a Unicode case-insensitive substring match on name, mobile
    /// or address, identical across backends.
    async fn list(&self, query: &LeadQuery) -> StorageResult<LeadPage>;

    /// Lead by id
    async fn get(&self, id: &str) -> StorageResult<Option<Lead>>;

    /// Store a new lead
    async fn insert(&self, lead: &Lead) -> StorageResult<()>;

    /// Apply a partial update and return the stored result
    async fn update(&self, id: &str, update: LeadUpdate) -> StorageResult<Lead>;

    /// Delete by id; `false` when nothing matched
    async fn delete(&self, id: &str) -> StorageResult<bool>;

    /// Drop every stored lead and insert `leads` in one step
    async fn replace_all(&self, leads: &[Lead]) -> StorageResult<usize>;
}

/// Thread-safe shared repository handle
pub type SharedLeadRepository = Arc<dyn LeadRepository>;

// ============================================================================
// SQLite Implementation
// ============================================================================

const LEAD_COLUMNS: &str = "id, name, mobile, address, city, source, status, priority, \
                            price, property_type, locality, timestamp";

/// SQLite-backed lead store
pub struct SqliteLeadRepository {
    conn: Mutex<Connection>,
}

impl SqliteLeadRepository {
    /// Open (or create) the database file, creating parent directories
    pub fn new(path: impl AsRef<Path>) -> StorageResult<Self> {
        let path = path.as_ref();
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent)?;
        }
        let conn = Connection::open(path)?;
        Self::init_schema(&conn)?;
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    /// Volatile database, mostly for tests
    pub fn in_memory() -> StorageResult<Self> {
        let conn = Connection::open_in_memory()?;
        Self::init_schema(&conn)?;
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    fn init_schema(conn: &Connection) -> StorageResult<()> {
        conn.execute_batch(
            "CREATE TABLE IF NOT EXISTS leads (
                id TEXT PRIMARY KEY,
                name TEXT NOT NULL,
                mobile TEXT NOT NULL,
                address TEXT NOT NULL DEFAULT '',
                city TEXT NOT NULL,
                source TEXT NOT NULL,
                status TEXT NOT NULL,
                priority TEXT NOT NULL,
                price REAL NOT NULL DEFAULT 0,
                property_type TEXT NOT NULL,
                locality TEXT NOT NULL,
                timestamp TEXT NOT NULL
            );
            CREATE INDEX IF NOT EXISTS idx_leads_timestamp ON leads(timestamp);
            CREATE INDEX IF NOT EXISTS idx_leads_priority ON leads(priority);
            CREATE INDEX IF NOT EXISTS idx_leads_source ON leads(source);",
        )?;
        Ok(())
    }

    fn lock(&self) -> StorageResult<std::sync::MutexGuard<'_, Connection>> {
        self.conn.lock().map_err(|_| StorageError::LockPoisoned)
    }

    fn query_leads(
        conn: &Connection,
        sql: &str,
        args: &[String],
    ) -> StorageResult<Vec<Lead>> {
        let mut stmt = conn.prepare(sql)?;
        let rows = stmt
            .query_map(params_from_iter(args.iter()), LeadRow::from_row)?
            .collect::<Result<Vec<_>, _>>()?;
        rows.into_iter().map(LeadRow::into_lead).collect()
    }

    fn insert_with(conn: &Connection, lead: &Lead) -> StorageResult<()> {
        conn.execute(
            "INSERT INTO leads (id, name, mobile, address, city, source, status, priority,
                                price, property_type, locality, timestamp)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12)",
            params![
                lead.id,
                lead.name,
                lead.mobile,
                lead.address,
                lead.city,
                lead.source.as_str(),
                lead.status.as_str(),
                lead.priority.as_str(),
                lead.price,
                lead.property_type.as_str(),
                lead.locality,
                encode_timestamp(&lead.timestamp),
            ],
        )?;
        Ok(())
    }

    /// WHERE clause and positional args for the exact-match filters
    ///
    /// Search is not expressed in SQL: `LIKE` folds case for ASCII only, so the
    /// term is matched with [`LeadQuery::matches`] like the in-memory store.
    fn filter_clause(query: &LeadQuery) -> (String, Vec<String>) {
        let mut clauses = Vec::new();
        let mut args = Vec::new();

        if let Some(priority) = query.priority {
            args.push(priority.as_str().to_string());
            clauses.push(format!("priority = ?{}", args.len()));
        }
        if let Some(source) = query.source {
            args.push(source.as_str().to_string());
            clauses.push(format!("source = ?{}", args.len()));
        }

        if clauses.is_empty() {
            (String::new(), args)
        } else {
            (format!(" WHERE {}", clauses.join(" AND ")), args)
        }
    }
}

#[async_trait]
impl LeadRepository for SqliteLeadRepository {
    async fn fetch_all(&self) -> StorageResult<Vec<Lead>> {
        let conn = self.lock()?;
        Self::query_leads(
            &conn,
            &format!("SELECT {LEAD_COLUMNS} FROM leads ORDER BY timestamp DESC"),
            &[],
        )
    }

    async fn count(&self) -> StorageResult<u64> {
        let conn = self.lock()?;
        let total: i64 = conn.query_row("SELECT COUNT(*) FROM leads", [], |row| row.get(0))?;
        Ok(total.max(0) as u64)
    }

    async fn list(&self, query: &LeadQuery) -> StorageResult<LeadPage> {
        let conn = self.lock()?;
        let (filter, args) = Self::filter_clause(query);

        if query.search_term().is_some() {
            let candidates = Self::query_leads(
                &conn,
                &format!("SELECT {LEAD_COLUMNS} FROM leads{filter} ORDER BY timestamp DESC"),
                &args,
            )?;
            let matching: Vec<Lead> = candidates
                .into_iter()
                .filter(|lead| query.matches(lead))
                .collect();
            let total = matching.len() as u64;
            let leads = matching
                .into_iter()
                .skip(query.offset() as usize)
                .take(query.limit() as usize)
                .collect();
            return Ok(LeadPage::new(total, query, leads));
        }

        let total: i64 = conn.query_row(
            &format!("SELECT COUNT(*) FROM leads{filter}"),
            params_from_iter(args.iter()),
            |row| row.get(0),
        )?;

        let sql = format!(
            "SELECT {LEAD_COLUMNS} FROM leads{filter} ORDER BY timestamp DESC LIMIT {} OFFSET {}",
            query.limit(),
            query.offset()
        );
        let leads = Self::query_leads(&conn, &sql, &args)?;

        Ok(LeadPage::new(total.max(0) as u64, query, leads))
    }

    async fn get(&self, id: &str) -> StorageResult<Option<Lead>> {
        let conn = self.lock()?;
        let row = conn
            .query_row(
                &format!("SELECT {LEAD_COLUMNS} FROM leads WHERE id = ?1"),
                params![id],
                LeadRow::from_row,
            )
            .optional()?;
        row.map(LeadRow::into_lead).transpose()
    }

    async fn insert(&self, lead: &Lead) -> StorageResult<()> {
        let conn = self.lock()?;
        Self::insert_with(&conn, lead)
    }

    async fn update(&self, id: &str, update: LeadUpdate) -> StorageResult<Lead> {
        let conn = self.lock()?;
        let mut lead = conn
            .query_row(
                &format!("SELECT {LEAD_COLUMNS} FROM leads WHERE id = ?1"),
                params![id],
                LeadRow::from_row,
            )
            .optional()?
            .ok_or_else(|| StorageError::not_found(id))?
            .into_lead()?;

        update.apply(&mut lead).map_err(StorageError::Validation)?;

        conn.execute(
            "UPDATE leads SET name = ?2, mobile = ?3, address = ?4, city = ?5, source = ?6,
                              status = ?7, priority = ?8, price = ?9, property_type = ?10,
                              locality = ?11
             WHERE id = ?1",
            params![
                lead.id,
                lead.name,
                lead.mobile,
                lead.address,
                lead.city,
                lead.source.as_str(),
                lead.status.as_str(),
                lead.priority.as_str(),
                lead.price,
                lead.property_type.as_str(),
                lead.locality,
            ],
        )?;
        Ok(lead)
    }

    async fn delete(&self, id: &str) -> StorageResult<bool> {
        let conn = self.lock()?;
        let removed = conn.execute("DELETE FROM leads WHERE id = ?1", params![id])?;
        Ok(removed > 0)
    }

    async fn replace_all(&self, leads: &[Lead]) -> StorageResult<usize> {
        let mut conn = self.lock()?;
        let tx = conn.transaction()?;
        tx.execute("DELETE FROM leads", [])?;
        for lead in leads {
            Self::insert_with(&tx, lead)?;
        }
        tx.commit()?;
        Ok(leads.len())
    }
}

/// Raw column values, decoded into a [`Lead`] outside the rusqlite callback
struct LeadRow {
    id: String,
    name: String,
    mobile: String,
    address: String,
    city: String,
    source: String,
    status: String,
    priority: String,
    price: f64,
    property_type: String,
    locality: String,
    timestamp: String,
}

impl LeadRow {
    fn from_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<Self> {
        Ok(Self {
            id: row.get(0)?,
            name: row.get(1)?,
            mobile: row.get(2)?,
            address: row.get(3)?,
            city: row.get(4)?,
            source: row.get(5)?,
            status: row.get(6)?,
            priority: row.get(7)?,
            price: row.get(8)?,
            property_type: row.get(9)?,
            locality: row.get(10)?,
            timestamp: row.get(11)?,
        })
    }

    fn into_lead(self) -> StorageResult<Lead> {
        let corrupt = |reason: String| StorageError::Corrupt {
            id: self.id.clone(),
            reason,
        };

        let source = self.source.parse().map_err(|e| corrupt(format!("{e}")))?;
        let status = self.status.parse().map_err(|e| corrupt(format!("{e}")))?;
        let priority = self.priority.parse().map_err(|e| corrupt(format!("{e}")))?;
        let property_type = self
            .property_type
            .parse()
            .map_err(|e| corrupt(format!("{e}")))?;
        let timestamp = DateTime::parse_from_rfc3339(&self.timestamp)
            .map(|dt| dt.with_timezone(&Utc))
            .map_err(|e| corrupt(format!("bad timestamp: {e}")))?;

        Ok(Lead {
            id: self.id,
            name: self.name,
            mobile: self.mobile,
            address: self.address,
            city: self.city,
            source,
            status,
            priority,
            price: self.price,
            property_type,
            locality: self.locality,
            timestamp,
        })
    }
}

/// Fixed-width RFC 3339 so lexical order matches chronological order
fn encode_timestamp(ts: &DateTime<Utc>) -> String {
    ts.to_rfc3339_opts(SecondsFormat::Nanos, true)
}

// ============================================================================
// In-memory Implementation (for testing)
// ============================================================================

/// Volatile lead store
///
/// `set_unavailable(true)` makes every call fail with
/// [`StorageError::Unavailable`], simulating a dropped database connection.
pub struct InMemoryLeadRepository {
    leads: RwLock<Vec<Lead>>,
    unavailable: AtomicBool,
}

impl InMemoryLeadRepository {
    pub fn new() -> Self {
        Self {
            leads: RwLock::new(Vec::new()),
            unavailable: AtomicBool::new(false),
        }
    }

    /// Store pre-populated with `leads`
    pub fn with_leads(leads: Vec<Lead>) -> Self {
        Self {
            leads: RwLock::new(leads),
            unavailable: AtomicBool::new(false),
        }
    }

    /// Toggle simulated outage
    pub fn set_unavailable(&self, unavailable: bool) {
        self.unavailable.store(unavailable, Ordering::SeqCst);
    }

    fn check_available(&self) -> StorageResult<()> {
        if self.unavailable.load(Ordering::SeqCst) {
            return Err(StorageError::Unavailable(
                "in-memory store marked unavailable".to_string(),
            ));
        }
        Ok(())
    }

    fn read(&self) -> StorageResult<std::sync::RwLockReadGuard<'_, Vec<Lead>>> {
        self.check_available()?;
        self.leads.read().map_err(|_| StorageError::LockPoisoned)
    }

    fn write(&self) -> StorageResult<std::sync::RwLockWriteGuard<'_, Vec<Lead>>> {
        self.check_available()?;
        self.leads.write().map_err(|_| StorageError::LockPoisoned)
    }

    fn newest_first(mut leads: Vec<Lead>) -> Vec<Lead> {
        leads.sort_by(|a, b| b.timestamp.cmp(&a.timestamp));
        leads
    }
}

impl Default for InMemoryLeadRepository {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl LeadRepository for InMemoryLeadRepository {
    async fn fetch_all(&self) -> StorageResult<Vec<Lead>> {
        Ok(Self::newest_first(self.read()?.clone()))
    }

    async fn count(&self) -> StorageResult<u64> {
        Ok(self.read()?.len() as u64)
    }

    async fn list(&self, query: &LeadQuery) -> StorageResult<LeadPage> {
        let matching: Vec<Lead> = self
            .read()?
            .iter()
            .filter(|lead| query.matches(lead))
            .cloned()
            .collect();
        let total = matching.len() as u64;
        let leads = Self::newest_first(matching)
            .into_iter()
            .skip(query.offset() as usize)
            .take(query.limit() as usize)
            .collect();
        Ok(LeadPage::new(total, query, leads))
    }

    async fn get(&self, id: &str) -> StorageResult<Option<Lead>> {
        Ok(self.read()?.iter().find(|lead| lead.id == id).cloned())
    }

    async fn insert(&self, lead: &Lead) -> StorageResult<()> {
        let mut leads = self.write()?;
        if leads.iter().any(|existing| existing.id == lead.id) {
            return Err(StorageError::validation(format!(
                "duplicate lead id {}",
                lead.id
            )));
        }
        leads.push(lead.clone());
        Ok(())
    }

    async fn update(&self, id: &str, update: LeadUpdate) -> StorageResult<Lead> {
        let mut leads = self.write()?;
        let lead = leads
            .iter_mut()
            .find(|lead| lead.id == id)
            .ok_or_else(|| StorageError::not_found(id))?;
        let mut updated = lead.clone();
        update
            .apply(&mut updated)
            .map_err(StorageError::Validation)?;
        *lead = updated.clone();
        Ok(updated)
    }

    async fn delete(&self, id: &str) -> StorageResult<bool> {
        let mut leads = self.write()?;
        let before = leads.len();
        leads.retain(|lead| lead.id != id);
        Ok(leads.len() != before)
    }

    async fn replace_all(&self, replacement: &[Lead]) -> StorageResult<usize> {
        let mut leads = self.write()?;
        *leads = replacement.to_vec();
        Ok(leads.len())
    }
}

// ============================================================================
// Shared Repository Constructors
// ============================================================================

/// Create a shared SQLite repository
pub fn create_sqlite_repository(path: impl AsRef<Path>) -> StorageResult<SharedLeadRepository> {
    Ok(Arc::new(SqliteLeadRepository::new(path)?))
}

/// Create a shared in-memory repository
pub fn create_memory_repository(leads: Vec<Lead>) -> SharedLeadRepository {
    Arc::new(InMemoryLeadRepository::with_leads(leads))
}

// ============================================================================
// Tests
// ============================================================================
