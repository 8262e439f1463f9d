// Storage module: SQLite persistence for businesses, audits, jobs and settings.

pub mod sqlite;

pub use sqlite::SqliteStorage;
