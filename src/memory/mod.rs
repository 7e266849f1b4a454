/*!
 * Translation memory.
 *
 * Persistent cache of previously produced translations with exact and fuzzy
 * lookup and TMX interchange:
 * - `store`: sharded in-memory index with SQLite write-through
 * - `similarity`: the fuzzy match score
 * - `tmx`: TMX 1.4 import/export
 */

pub mod similarity;
pub mod store;
pub mod tmx;

pub use similarity::similarity;
pub use store::{FuzzyMatch, MemoryStats, MergeOutcome, TmEntry, TranslationMemory};
pub use tmx::ImportSummary;
