/*!
 * TMX 1.4 import and export.
 *
 * Each translation unit carries exactly two variants (source and target).
 * Usage figures travel as the standard `creationdate`, `lastusagedate` and
 * `usagecount` attributes on `<tu>`, so a round trip keeps collision
 * resolution working on the receiving side.
 *
 * Segment text is written and read verbatim: indentation is only emitted
 * between structural elements and text outside `<seg>` is ignored on read.
 */

use bytes::Bytes;
use chrono::{DateTime, NaiveDateTime, Utc};
use log::{debug, warn};
use quick_xml::events::{BytesDecl, BytesEnd, BytesStart, BytesText, Event};
use quick_xml::{Reader, Writer};
use serde::{Deserialize, Serialize};

use crate::errors::EngineError;
use crate::language_utils::normalize_language_code;
use crate::segment::{memory_key, normalize_text};

use super::store::{MergeOutcome, TmEntry, TranslationMemory};

/// TMX date format (basic ISO 8601, UTC)
const TMX_DATE_FORMAT: &str = "%Y%m%dT%H%M%SZ";

/// Import figures
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ImportSummary {
    /// Units that created a new entry
    pub inserted: usize,
    /// Units that replaced an older entry
    pub replaced: usize,
    /// Units ignored because the stored entry was newer
    pub kept: usize,
    /// Units without a usable source/target pair
    pub skipped: usize,
}

fn format_date(date: &DateTime<Utc>) -> String {
    date.format(TMX_DATE_FORMAT).to_string()
}

fn parse_date(value: &str) -> Option<DateTime<Utc>> {
    NaiveDateTime::parse_from_str(value.trim(), TMX_DATE_FORMAT)
        .ok()
        .map(|naive| naive.and_utc())
}

fn xml_error<E: std::fmt::Display>(error: E) -> EngineError {
    EngineError::Tmx(error.to_string())
}

/// Writer adding newline + indentation text between structural elements
struct TmxWriter {
    writer: Writer<Vec<u8>>,
}

impl TmxWriter {
    fn new() -> Self {
        Self {
            writer: Writer::new(Vec::new()),
        }
    }

    fn event(&mut self, event: Event<'_>) -> Result<(), EngineError> {
        self.writer.write_event(event).map_err(xml_error)
    }

    fn indent(&mut self, depth: usize) -> Result<(), EngineError> {
        let padding = format!("\n{}", "  ".repeat(depth));
        self.event(Event::Text(BytesText::new(&padding)))
    }

    fn variant(&mut self, language: &str, text: &str) -> Result<(), EngineError> {
        self.indent(3)?;
        self.event(Event::Start(
            BytesStart::new("tuv").with_attributes([("xml:lang", language)]),
        ))?;
        self.event(Event::Start(BytesStart::new("seg")))?;
        self.event(Event::Text(BytesText::new(text)))?;
        self.event(Event::End(BytesEnd::new("seg")))?;
        self.event(Event::End(BytesEnd::new("tuv")))
    }

    fn into_bytes(self) -> Bytes {
        Bytes::from(self.writer.into_inner())
    }
}

/// Serialize entries of one language pair as a TMX 1.4 document
pub fn write_tmx(entries: &[TmEntry], source_language: &str) -> Result<Bytes, EngineError> {
    let mut w = TmxWriter::new();

    w.event(Event::Decl(BytesDecl::new("1.0", Some("UTF-8"), None)))?;
    w.indent(0)?;
    w.event(Event::Start(
        BytesStart::new("tmx").with_attributes([("version", "1.4")]),
    ))?;
    w.indent(1)?;
    w.event(Event::Empty(BytesStart::new("header").with_attributes([
        ("creationtool", "pagetrans"),
        ("creationtoolversion", env!("CARGO_PKG_VERSION")),
        ("segtype", "sentence"),
        ("o-tmf", "pagetrans"),
        ("adminlang", "en"),
        ("srclang", source_language),
        ("datatype", "plaintext"),
    ])))?;
    w.indent(1)?;
    w.event(Event::Start(BytesStart::new("body")))?;

    for entry in entries {
        let created = format_date(&entry.created_at);
        let last_used = format_date(&entry.last_used_at);
        let usage = entry.usage_count.to_string();

        w.indent(2)?;
        w.event(Event::Start(BytesStart::new("tu").with_attributes([
            ("creationdate", created.as_str()),
            ("lastusagedate", last_used.as_str()),
            ("usagecount", usage.as_str()),
        ])))?;
        w.variant(&entry.source_language, &entry.source_text)?;
        w.variant(&entry.target_language, &entry.target_text)?;
        w.indent(2)?;
        w.event(Event::End(BytesEnd::new("tu")))?;
    }

    w.indent(1)?;
    w.event(Event::End(BytesEnd::new("body")))?;
    w.indent(0)?;
    w.event(Event::End(BytesEnd::new("tmx")))?;
    w.indent(0)?;

    Ok(w.into_bytes())
}

/// Translation unit under construction while reading
#[derive(Debug, Default)]
struct PendingUnit {
    created_at: Option<DateTime<Utc>>,
    last_used_at: Option<DateTime<Utc>>,
    usage_count: Option<u64>,
    variants: Vec<(String, String)>,
}

impl PendingUnit {
    fn from_start(start: &BytesStart<'_>) -> Result<Self, EngineError> {
        let mut unit = PendingUnit::default();
        for attr in start.attributes() {
            let attr = attr.map_err(xml_error)?;
            let value = attr.unescape_value()?;
            match attr.key.as_ref() {
                b"creationdate" => unit.created_at = parse_date(&value),
                b"lastusagedate" => unit.last_used_at = parse_date(&value),
                b"usagecount" => unit.usage_count = value.trim().parse().ok(),
                _ => {}
            }
        }
        Ok(unit)
    }

    /// First variant is the source, the first differing language the target
    fn into_entry(self) -> Option<TmEntry> {
        let mut variants = self.variants.into_iter();
        let (source_language, source_text) = variants.next()?;
        let (target_language, target_text) = variants.find(|(lang, _)| *lang != source_language)?;

        if normalize_text(&source_text).is_empty() || target_text.trim().is_empty() {
            return None;
        }

        // Units without dates lose every collision against dated entries
        let created_at = self.created_at.unwrap_or(DateTime::<Utc>::UNIX_EPOCH);
        let last_used_at = self.last_used_at.unwrap_or(created_at);

        Some(TmEntry {
            key: memory_key(&source_text, &source_language, &target_language),
            normalized_form: normalize_text(&source_text),
            source_text,
            target_text,
            source_language,
            target_language,
            usage_count: self.usage_count.unwrap_or(1).max(1),
            created_at,
            last_used_at,
        })
    }
}

/// Parse a TMX document into entries
///
/// Returns the parsed entries and the number of units that were skipped.
pub fn parse_tmx(data: &[u8]) -> Result<(Vec<TmEntry>, usize), EngineError> {
    let mut reader = Reader::from_reader(data);
    reader.trim_text(false);

    let mut buf = Vec::new();
    let mut entries = Vec::new();
    let mut skipped = 0;

    let mut unit: Option<PendingUnit> = None;
    let mut variant_language: Option<String> = None;
    let mut seg_text: Option<String> = None;
    let mut seg_depth = 0usize;

    loop {
        match reader.read_event_into(&mut buf)? {
            Event::Eof => break,
            Event::Start(e) => match e.name().as_ref() {
                b"tu" => unit = Some(PendingUnit::from_start(&e)?),
                b"tuv" => {
                    variant_language = None;
                    for attr in e.attributes() {
                        let attr = attr.map_err(xml_error)?;
                        if matches!(attr.key.as_ref(), b"xml:lang" | b"lang") {
                            variant_language =
                                Some(normalize_language_code(&attr.unescape_value()?));
                        }
                    }
                }
                b"seg" => {
                    seg_text = Some(String::new());
                    seg_depth = 1;
                }
                // Inline markup inside <seg> keeps its text content
                _ if seg_text.is_some() => seg_depth += 1,
                _ => {}
            },
            Event::Text(e) => {
                if let Some(text) = seg_text.as_mut() {
                    text.push_str(&e.unescape()?);
                }
            }
            Event::CData(e) => {
                if let Some(text) = seg_text.as_mut() {
                    text.push_str(&String::from_utf8_lossy(&e));
                }
            }
            Event::End(e) => match e.name().as_ref() {
                b"seg" if seg_depth <= 1 => {
                    if let (Some(text), Some(unit), Some(lang)) =
                        (seg_text.take(), unit.as_mut(), variant_language.clone())
                    {
                        unit.variants.push((lang, text));
                    }
                    seg_depth = 0;
                }
                b"tu" => {
                    if let Some(finished) = unit.take() {
                        match finished.into_entry() {
                            Some(entry) => entries.push(entry),
                            None => skipped += 1,
                        }
                    }
                }
                _ if seg_text.is_some() => seg_depth = seg_depth.saturating_sub(1),
                _ => {}
            },
            _ => {}
        }
        buf.clear();
    }

    debug!("Parsed {} TMX units ({} skipped)", entries.len(), skipped);
    Ok((entries, skipped))
}

impl TranslationMemory {
    /// Export every entry of a language pair as TMX 1.4
    pub fn export_tmx(&self, source_language: &str, target_language: &str) -> Result<Bytes, EngineError> {
        let entries = self.entries_for_pair(source_language, target_language);
        debug!(
            "Exporting {} TM entries ({} -> {})",
            entries.len(),
            source_language,
            target_language
        );
        write_tmx(&entries, &normalize_language_code(source_language))
    }

    /// Merge a TMX document into the memory
    ///
    /// On exact-key collisions the entry with the later last-usage date
    /// wins. Merged entries are persisted before returning.
    pub fn import_tmx(&self, data: &[u8]) -> Result<ImportSummary, EngineError> {
        let (entries, skipped) = parse_tmx(data)?;
        let mut summary = ImportSummary {
            skipped,
            ..Default::default()
        };

        for entry in entries {
            match self.merge_entry(entry) {
                MergeOutcome::Inserted => summary.inserted += 1,
                MergeOutcome::Replaced => summary.replaced += 1,
                MergeOutcome::Kept => summary.kept += 1,
            }
        }

        if let Err(e) = self.flush() {
            warn!("Imported TMX entries are not persisted: {}", e);
            return Err(e);
        }

        Ok(summary)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    #[test]
    fn test_exportThenImport_shouldPreserveTextAndLanguages() {
        let tm = TranslationMemory::in_memory();
        tm.record("Hello world", "Ciao mondo", "en", "it").unwrap();
        tm.record("Price: 12.50 € & tax <incl.>", "Prezzo: 12,50 € e IVA <incl.>", "en", "it")
            .unwrap();
        tm.record("Only German", "Nur Deutsch", "en", "de").unwrap();

        let tmx = tm.export_tmx("en", "it").unwrap();
        let text = String::from_utf8(tmx.to_vec()).unwrap();
        assert!(text.contains("<tmx version=\"1.4\">"));
        assert!(text.contains("usagecount=\"1\""));
        assert!(!text.contains("Nur Deutsch"));

        let other = TranslationMemory::in_memory();
        let summary = other.import_tmx(&tmx).unwrap();
        assert_eq!(summary.inserted, 2);
        assert_eq!(summary.skipped, 0);

        let hit = other
            .lookup_exact("Price: 12.50 € & tax <incl.>", "en", "it")
            .unwrap();
        assert_eq!(hit.target_text, "Prezzo: 12,50 € e IVA <incl.>");
    }

    #[test]
    fn test_import_withCollision_shouldKeepNewerEntry() {
        let tm = TranslationMemory::in_memory();
        let stored = tm.record("Invoice", "Fattura", "en", "it").unwrap();

        let mut newer = TmEntry::new("Invoice", "Fattura commerciale", "en", "it");
        newer.last_used_at = stored.last_used_at + Duration::days(2);
        let mut older = TmEntry::new("Invoice", "Conto", "en", "it");
        older.last_used_at = stored.last_used_at - Duration::days(2);

        let newer_doc = write_tmx(&[newer], "en").unwrap();
        let older_doc = write_tmx(&[older], "en").unwrap();

        assert_eq!(tm.import_tmx(&older_doc).unwrap().kept, 1);
        assert_eq!(tm.import_tmx(&newer_doc).unwrap().replaced, 1);
        assert_eq!(tm.get(&stored.key).unwrap().target_text, "Fattura commerciale");
    }

    #[test]
    fn test_parseTmx_withoutDates_shouldUseEpochAndSkipIncompleteUnits() {
        let doc = br#"<?xml version="1.0"?>
<tmx version="1.4"><header srclang="en"/><body>
  <tu><tuv xml:lang="EN"><seg>Save</seg></tuv><tuv xml:lang="fr"><seg>Enregistrer</seg></tuv></tu>
  <tu><tuv xml:lang="en"><seg>Orphan</seg></tuv></tu>
</body></tmx>"#;

        let (entries, skipped) = parse_tmx(doc).unwrap();
        assert_eq!(entries.len(), 1);
        assert_eq!(skipped, 1);
        assert_eq!(entries[0].source_language, "en");
        assert_eq!(entries[0].target_text, "Enregistrer");
        assert_eq!(entries[0].last_used_at, DateTime::<Utc>::UNIX_EPOCH);
    }

    #[test]
    fn test_parseTmx_withInlineMarkup_shouldKeepText() {
        let doc = r#"<tmx version="1.4"><body><tu usagecount="4">
<tuv xml:lang="en"><seg>Press <bpt i="1">&lt;b&gt;</bpt>OK<ept i="1">&lt;/b&gt;</ept></seg></tuv>
<tuv xml:lang="de"><seg>OK drücken</seg></tuv></tu></body></tmx>"#.as_bytes();

        let (entries, _) = parse_tmx(doc).unwrap();
        assert_eq!(entries[0].source_text, "Press <b>OK</b>");
        assert_eq!(entries[0].usage_count, 4);
    }

    #[test]
    fn test_parseTmx_malformed_shouldFail() {
        let result = parse_tmx(b"<tmx><body><tu></body></tmx>");
        assert!(matches!(result, Err(EngineError::Tmx(_))));
    }

    #[test]
    fn test_dates_shouldRoundTripToTheSecond() {
        let now = Utc::now();
        let parsed = parse_date(&format_date(&now)).unwrap();
        assert_eq!(parsed.timestamp(), now.timestamp());
    }
}
