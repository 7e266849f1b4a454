/*!
 * Tests for the translation memory through its public API
 */

use rand::Rng;
use std::sync::Arc;

use pagetrans::memory::{TranslationMemory, similarity};
use pagetrans::memory::store::DEFAULT_SHARD_COUNT;

use crate::common;

const SENTENCES: &[&str] = &[
    "Hello world",
    "Total amount due",
    "Please check the invoice",
    "The invoice was sent yesterday",
    "Payment received, thank you",
    "Your order has shipped",
];

/// Entries and counters survive closing and reopening the database
#[test]
fn test_open_afterRestart_shouldServeRecordedEntries() {
    let dir = common::create_temp_dir().unwrap();
    let path = common::database_path(dir.path());

    {
        let memory = TranslationMemory::open(common::open_repository(&path), DEFAULT_SHARD_COUNT).unwrap();
        memory.record("Hello world", "Ciao mondo", "en", "it").unwrap();
        memory.record("Total amount due", "Importo totale dovuto", "en", "it").unwrap();
        assert!(memory.lookup_exact("Hello world", "en", "it").is_some());
        memory.flush().unwrap();
    }

    let reopened = TranslationMemory::open(common::open_repository(&path), 4).unwrap();
    assert_eq!(reopened.len(), 2);

    let entry = reopened.lookup_exact("Hello world", "en", "it").unwrap();
    assert_eq!(entry.target_text, "Ciao mondo");
    // record + lookup before the restart, lookup after
    assert_eq!(entry.usage_count, 3);
}

/// A TMX export imported into an empty memory reproduces the entries
#[test]
fn test_exportTmx_importedElsewhere_shouldReproduceEntries() {
    let source = TranslationMemory::in_memory();
    for (i, text) in SENTENCES.iter().enumerate() {
        source.record(text, &format!("traduzione {}", i), "en", "it").unwrap();
    }
    source.record("Hello world", "Hallo Welt", "en", "de").unwrap();

    let tmx = source.export_tmx("en", "it").unwrap();
    let xml = String::from_utf8(tmx.to_vec()).unwrap();
    assert!(xml.contains("<tmx version=\"1.4\">"));
    assert!(!xml.contains("Hallo Welt"));

    let target = TranslationMemory::in_memory();
    let summary = target.import_tmx(&tmx).unwrap();
    assert_eq!(summary.inserted, SENTENCES.len());
    assert_eq!(summary.skipped, 0);

    for (i, text) in SENTENCES.iter().enumerate() {
        let entry = target.lookup_exact(text, "en", "it").unwrap();
        assert_eq!(entry.target_text, format!("traduzione {}", i));
    }
    assert!(target.lookup_exact("Hello world", "en", "de").is_none());
}

/// Importing the same document twice changes nothing the second time
#[test]
fn test_importTmx_twice_shouldKeepEntries() {
    let source = TranslationMemory::in_memory();
    source.record("Hello world", "Ciao mondo", "en", "it").unwrap();
    let tmx = source.export_tmx("en", "it").unwrap();

    let target = TranslationMemory::in_memory();
    target.import_tmx(&tmx).unwrap();
    let second = target.import_tmx(&tmx).unwrap();

    assert_eq!(second.inserted, 0);
    assert_eq!(second.kept, 1);
    assert_eq!(target.len(), 1);
}

/// Raising the threshold never turns a miss into a hit
#[test]
fn test_lookupFuzzy_randomThresholds_shouldBeMonotonic() {
    let memory = TranslationMemory::in_memory();
    for text in SENTENCES {
        memory.record(text, &text.to_uppercase(), "en", "it").unwrap();
    }

    let queries = [
        "Hello, world!",
        "Please check the invoices",
        "The invoice was sent",
        "Your orders have shipped",
        "Something else entirely",
    ];

    let mut rng = rand::rng();
    for _ in 0..200 {
        let query = queries[rng.random_range(0..queries.len())];
        let low: f64 = rng.random_range(0.05..0.95);
        let high: f64 = rng.random_range(low..=1.0);

        let at_high = memory.lookup_fuzzy(query, "en", "it", high);
        let at_low = memory.lookup_fuzzy(query, "en", "it", low);

        if let Some(found) = &at_high {
            let relaxed = at_low.as_ref().expect("lower threshold must also match");
            assert!(relaxed.similarity >= found.similarity);
            assert!(found.similarity >= high);
        }
        if let Some(found) = &at_low {
            assert!((similarity(query, &found.entry.source_text) - found.similarity).abs() < 1e-9);
        }
    }

    // Fuzzy lookups never add entries
    assert_eq!(memory.len(), SENTENCES.len());
}

/// Concurrent records of one key converge on a single entry
#[test]
fn test_record_concurrentWriters_shouldKeepOneEntry() {
    let memory = Arc::new(TranslationMemory::in_memory());

    let handles: Vec<_> = (0..8)
        .map(|_| {
            let memory = Arc::clone(&memory);
            std::thread::spawn(move || {
                for _ in 0..25 {
                    memory.record("Hello world", "Ciao mondo", "en", "it").unwrap();
                }
            })
        })
        .collect();
    for handle in handles {
        handle.join().unwrap();
    }

    assert_eq!(memory.len(), 1);
    let entry = memory.get(&memory.entries_for_pair("en", "it")[0].key).unwrap();
    assert_eq!(entry.usage_count, 200);
}
