//! SQL schema for the local fallback buffer.
//!
//! Events and sessions are stored as their JSON payload plus the columns the
//! summary query groups on.

/// Returns the full SQL schema as a single batch string.
///
/// - `events` - buffered analytics events, oldest evicted first
/// - `sessions` - latest state of each session, keyed by session id
pub fn create_schema() -> &'static str {
    r#"
    CREATE TABLE IF NOT EXISTS events (
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        event_name TEXT NOT NULL,
        session_id TEXT NOT NULL,
        timestamp TEXT NOT NULL,
        payload TEXT NOT NULL
    );
    CREATE INDEX IF NOT EXISTS idx_events_name ON events(event_name);

    CREATE TABLE IF NOT EXISTS sessions (
        session_id TEXT PRIMARY KEY,
        start_time TEXT NOT NULL,
        language TEXT NOT NULL,
        device_class TEXT NOT NULL,
        revision INTEGER NOT NULL,
        payload TEXT NOT NULL
    );
    "#
}
