//! Local fallback buffer on SQLite.
//!
//! Every backend variant may write here when its own call fails, so each
//! write runs in one transaction: insert, then trim to the cap. Callers never
//! observe a buffer above its cap.

use crate::error::StorageError;
use crate::event::AnalyticsEvent;
use crate::schema;
use crate::session::SessionRecord;
use log::debug;
use rusqlite::{params, Connection, OptionalExtension};
use serde::Serialize;
use std::collections::BTreeMap;
use std::path::Path;
use std::sync::{Arc, Mutex, MutexGuard};

/// Events kept before the oldest is evicted.
pub const DEFAULT_EVENT_CAPACITY: usize = 1000;
/// Sessions kept before the least recently saved is evicted.
pub const DEFAULT_SESSION_CAPACITY: usize = 50;

/// Aggregate view of the buffered data.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BufferSummary {
    pub total_events: usize,
    pub total_sessions: usize,
    pub languages: Vec<String>,
    pub device_classes: Vec<String>,
    pub event_types: BTreeMap<String, usize>,
    pub last_activity: Option<String>,
}

/// Bounded FIFO store shared by every backend. Cheap to clone; clones share
/// the same connection.
#[derive(Clone)]
pub struct LocalBuffer {
    conn: Arc<Mutex<Connection>>,
    event_capacity: usize,
    session_capacity: usize,
}

impl std::fmt::Debug for LocalBuffer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LocalBuffer")
            .field("event_capacity", &self.event_capacity)
            .field("session_capacity", &self.session_capacity)
            .finish()
    }
}

impl LocalBuffer {
    /// A buffer that lives as long as the process.
    pub fn in_memory() -> Result<Self, StorageError> {
        Self::from_connection(Connection::open_in_memory()?)
    }

    /// A buffer persisted to a SQLite file, created if absent.
    pub fn open(path: impl AsRef<Path>) -> Result<Self, StorageError> {
        Self::from_connection(Connection::open(path)?)
    }

    fn from_connection(conn: Connection) -> Result<Self, StorageError> {
        conn.execute_batch(schema::create_schema())?;
        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
            event_capacity: DEFAULT_EVENT_CAPACITY,
            session_capacity: DEFAULT_SESSION_CAPACITY,
        })
    }

    /// Change the event cap. Takes effect on the next write.
    pub fn with_event_capacity(mut self, capacity: usize) -> Self {
        self.event_capacity = capacity;
        self
    }

    pub fn with_session_capacity(mut self, capacity: usize) -> Self {
        self.session_capacity = capacity;
        self
    }

    pub fn event_capacity(&self) -> usize {
        self.event_capacity
    }

    fn lock(&self) -> Result<MutexGuard<'_, Connection>, StorageError> {
        self.conn
            .lock()
            .map_err(|_| StorageError::LockPoisoned)
    }

    /// Append an event, evicting the oldest past the cap.
    pub fn save_event(&self, event: &AnalyticsEvent) -> Result<(), StorageError> {
        let payload = serde_json::to_string(event)?;
        let mut conn = self.lock()?;
        let tx = conn.transaction()?;
        tx.execute(
            "INSERT INTO events (event_name, session_id, timestamp, payload)
             VALUES (?1, ?2, ?3, ?4)",
            params![event.event_name, event.session_id, event.timestamp, payload],
        )?;
        let evicted = tx.execute(
            "DELETE FROM events WHERE id NOT IN
                (SELECT id FROM events ORDER BY id DESC LIMIT ?1)",
            params![self.event_capacity as i64],
        )?;
        tx.commit()?;
        if evicted > 0 {
            debug!("Local buffer evicted {} old event(s)", evicted);
        }
        Ok(())
    }

    /// Insert or replace a session by id, evicting the least recently saved
    /// past the cap.
    pub fn save_session(&self, session: &SessionRecord) -> Result<(), StorageError> {
        let payload = serde_json::to_string(session)?;
        let mut conn = self.lock()?;
        let tx = conn.transaction()?;
        let revision: i64 =
            tx.query_row("SELECT COALESCE(MAX(revision), 0) + 1 FROM sessions", [], |row| {
                row.get(0)
            })?;
        tx.execute(
            "INSERT INTO sessions (session_id, start_time, language, device_class, revision, payload)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6)
             ON CONFLICT(session_id) DO UPDATE SET
                revision = excluded.revision,
                payload = excluded.payload",
            params![
                session.session_id,
                session.start_time,
                session.language,
                session.device_class.as_str(),
                revision,
                payload
            ],
        )?;
        tx.execute(
            "DELETE FROM sessions WHERE session_id NOT IN
                (SELECT session_id FROM sessions ORDER BY revision DESC LIMIT ?1)",
            params![self.session_capacity as i64],
        )?;
        tx.commit()?;
        Ok(())
    }

    /// Buffered events, oldest first.
    pub fn events(&self) -> Result<Vec<AnalyticsEvent>, StorageError> {
        let conn = self.lock()?;
        let mut stmt = conn.prepare("SELECT payload FROM events ORDER BY id")?;
        let payloads = stmt
            .query_map([], |row| row.get::<_, String>(0))?
            .collect::<Result<Vec<_>, _>>()?;
        payloads
            .iter()
            .map(|p| serde_json::from_str(p).map_err(StorageError::from))
            .collect()
    }

    /// Buffered sessions, most recently saved first.
    pub fn sessions(&self) -> Result<Vec<SessionRecord>, StorageError> {
        let conn = self.lock()?;
        let mut stmt = conn.prepare("SELECT payload FROM sessions ORDER BY revision DESC")?;
        let payloads = stmt
            .query_map([], |row| row.get::<_, String>(0))?
            .collect::<Result<Vec<_>, _>>()?;
        payloads
            .iter()
            .map(|p| serde_json::from_str(p).map_err(StorageError::from))
            .collect()
    }

    pub fn event_count(&self) -> Result<usize, StorageError> {
        let conn = self.lock()?;
        let count: i64 = conn.query_row("SELECT COUNT(*) FROM events", [], |row| row.get(0))?;
        Ok(count as usize)
    }

    pub fn summary(&self) -> Result<BufferSummary, StorageError> {
        let conn = self.lock()?;
        let total_events: i64 = conn.query_row("SELECT COUNT(*) FROM events", [], |row| row.get(0))?;
        let total_sessions: i64 =
            conn.query_row("SELECT COUNT(*) FROM sessions", [], |row| row.get(0))?;

        let mut stmt = conn.prepare("SELECT DISTINCT language FROM sessions ORDER BY language")?;
        let languages = stmt
            .query_map([], |row| row.get(0))?
            .collect::<Result<Vec<String>, _>>()?;

        let mut stmt =
            conn.prepare("SELECT DISTINCT device_class FROM sessions ORDER BY device_class")?;
        let device_classes = stmt
            .query_map([], |row| row.get(0))?
            .collect::<Result<Vec<String>, _>>()?;

        let mut stmt = conn.prepare(
            "SELECT event_name, COUNT(*) FROM events GROUP BY event_name ORDER BY event_name",
        )?;
        let event_types = stmt
            .query_map([], |row| {
                Ok((row.get::<_, String>(0)?, row.get::<_, i64>(1)? as usize))
            })?
            .collect::<Result<BTreeMap<_, _>, _>>()?;

        let last_activity: Option<String> = conn
            .query_row(
                "SELECT timestamp FROM events ORDER BY id DESC LIMIT 1",
                [],
                |row| row.get(0),
            )
            .optional()?;

        Ok(BufferSummary {
            total_events: total_events as usize,
            total_sessions: total_sessions as usize,
            languages,
            device_classes,
            event_types,
            last_activity,
        })
    }

    /// Drop everything (data-removal requests).
    pub fn clear_all(&self) -> Result<(), StorageError> {
        let conn = self.lock()?;
        conn.execute_batch("DELETE FROM events; DELETE FROM sessions;")?;
        log::info!("Local analytics buffer cleared");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::session::ClientContext;
    use chrono::{TimeDelta, TimeZone, Utc};

    fn event(name: &str, minute: i64) -> AnalyticsEvent {
        let at = Utc.with_ymd_and_hms(2025, 6, 3, 8, 0, 0).unwrap() + TimeDelta::minutes(minute);
        AnalyticsEvent::new(name, "sess_test", None, &at)
    }

    fn session(width: u32, lang: &str) -> SessionRecord {
        let context = ClientContext {
            language_tag: lang.to_string(),
            screen_width: width,
            ..ClientContext::default()
        };
        SessionRecord::start(&context, &Utc::now())
    }

    #[test]
    fn test_events_are_capped_fifo() {
        let buffer = LocalBuffer::in_memory().unwrap().with_event_capacity(3);
        for i in 0..5 {
            buffer.save_event(&event(&format!("e{i}"), i)).unwrap();
        }
        let names: Vec<_> = buffer.events().unwrap().into_iter().map(|e| e.event_name).collect();
        assert_eq!(names, vec!["e2", "e3", "e4"]);
    }

    #[test]
    fn test_sessions_upsert_and_cap() {
        let buffer = LocalBuffer::in_memory().unwrap().with_session_capacity(2);
        let mut a = session(1280, "en");
        buffer.save_session(&a).unwrap();
        a.consent_given = true;
        buffer.save_session(&a).unwrap();
        assert_eq!(buffer.sessions().unwrap().len(), 1);
        assert!(buffer.sessions().unwrap()[0].consent_given);

        let b = session(390, "fr");
        let c = session(800, "fr");
        buffer.save_session(&b).unwrap();
        buffer.save_session(&c).unwrap();
        let ids: Vec<_> = buffer.sessions().unwrap().into_iter().map(|s| s.session_id).collect();
        assert_eq!(ids, vec![c.session_id, b.session_id]);
    }

    #[test]
    fn test_summary() {
        let buffer = LocalBuffer::in_memory().unwrap();
        assert_eq!(buffer.summary().unwrap().last_activity, None);
        buffer.save_session(&session(390, "fr-CA")).unwrap();
        buffer.save_session(&session(1440, "en-US")).unwrap();
        buffer.save_event(&event("page_view", 0)).unwrap();
        buffer.save_event(&event("page_view", 1)).unwrap();
        buffer.save_event(&event("tab_hidden", 2)).unwrap();
        let summary = buffer.summary().unwrap();
        assert_eq!(summary.total_events, 3);
        assert_eq!(summary.total_sessions, 2);
        assert_eq!(summary.languages, vec!["en", "fr"]);
        assert_eq!(summary.device_classes, vec!["desktop", "mobile"]);
        assert_eq!(summary.event_types["page_view"], 2);
        assert_eq!(summary.last_activity.as_deref(), Some("2025-06-03T08:02:00.000Z"));
    }

    #[test]
    fn test_clear_all() {
        let buffer = LocalBuffer::in_memory().unwrap();
        buffer.save_event(&event("page_view", 0)).unwrap();
        buffer.save_session(&session(390, "fr")).unwrap();
        buffer.clear_all().unwrap();
        assert_eq!(buffer.event_count().unwrap(), 0);
        assert!(buffer.sessions().unwrap().is_empty());
    }

    #[test]
    fn test_file_buffer_survives_reopen() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("buffer.sqlite");
        {
            let buffer = LocalBuffer::open(&path).unwrap();
            buffer.save_event(&event("page_view", 0)).unwrap();
        }
        let reopened = LocalBuffer::open(&path).unwrap();
        assert_eq!(reopened.event_count().unwrap(), 1);
    }

    #[test]
    fn test_clones_share_storage() {
        let buffer = LocalBuffer::in_memory().unwrap();
        let other = buffer.clone();
        other.save_event(&event("page_view", 0)).unwrap();
        assert_eq!(buffer.event_count().unwrap(), 1);
    }
}
