/*!
 * Database module for persistent storage.
 *
 * This module provides SQLite-based persistence for:
 * - Translation memory entries, surviving process restarts
 * - Global glossary terms and their revision history
 */

pub mod connection;
pub mod models;
pub mod repository;
pub mod schema;

// Re-export main types
pub use connection::DatabaseConnection;
pub use repository::Repository;
