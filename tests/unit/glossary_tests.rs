/*!
 * Tests for the glossary and its persistence
 */

use pagetrans::glossary::{CustomRuleKind, Glossary, GlossaryScope, TermExtractor};

use crate::common;

/// Global entries are reloaded after a restart; batch entries are not
#[test]
fn test_open_afterRestart_shouldKeepOnlyGlobalTerms() {
    let dir = common::create_temp_dir().unwrap();
    let path = common::database_path(dir.path());

    {
        let glossary = Glossary::open(common::open_repository(&path)).unwrap();
        glossary.record("Invoice", "it", "Fattura", GlossaryScope::Global).unwrap();
        glossary.record("Invoice", "it", "Ricevuta", GlossaryScope::Global).unwrap();
        glossary.record("Receipt", "it", "Scontrino", GlossaryScope::Batch).unwrap();
        glossary.protect("Myriad", "it").unwrap();
    }

    let glossary = Glossary::open(common::open_repository(&path)).unwrap();

    let invoice = glossary.lookup("invoice", "it").unwrap();
    assert_eq!(invoice.preferred_translation, "Ricevuta");
    assert_eq!(invoice.scope, GlossaryScope::Global);
    assert_eq!(invoice.history.len(), 1);
    assert_eq!(invoice.history[0].previous, "Fattura");

    assert!(glossary.suggest("Receipt", "it").is_none());
    assert!(glossary.is_protected("Myriad", "it"));
}

/// Promoted batch terms are persisted like global ones
#[test]
fn test_promoteAll_shouldPersistBatchTerms() {
    let dir = common::create_temp_dir().unwrap();
    let path = common::database_path(dir.path());

    {
        let glossary = Glossary::open(common::open_repository(&path)).unwrap();
        assert!(glossary.record_if_absent("Invoice", "it", "Fattura"));
        assert_eq!(glossary.promote_all().unwrap(), 1);
        assert_eq!(glossary.clear_batch_scope(), 0);
    }

    let glossary = Glossary::open(common::open_repository(&path)).unwrap();
    assert_eq!(glossary.suggest("Invoice", "it").as_deref(), Some("Fattura"));
}

/// Entries are kept per target language
#[test]
fn test_suggest_otherLanguage_shouldBeIndependent() {
    let glossary = Glossary::new();
    glossary.record("Invoice", "it", "Fattura", GlossaryScope::Global).unwrap();
    glossary.record("Invoice", "de", "Rechnung", GlossaryScope::Global).unwrap();

    assert_eq!(glossary.suggest("Invoice", "it").as_deref(), Some("Fattura"));
    assert_eq!(glossary.suggest("Invoice", "deu").as_deref(), Some("Rechnung"));
    assert!(glossary.suggest("Invoice", "fr").is_none());
    assert_eq!(glossary.entries_for("it").len(), 1);
}

/// Hints only list terms found in the text
#[test]
fn test_hintsFor_shouldListTermsOfTheText() {
    let glossary = Glossary::new();
    glossary.record("Invoice", "it", "Fattura", GlossaryScope::Global).unwrap();
    glossary.record("Receipt", "it", "Ricevuta", GlossaryScope::Global).unwrap();

    let hints = glossary.hints_for("Please send the invoice today.", "it");
    assert_eq!(hints, vec![("Invoice".to_string(), "Fattura".to_string())]);
}

/// Extracted candidates are counted across texts
#[test]
fn test_termExtractor_count_shouldFindRepeatedTerms() {
    let extractor = TermExtractor::with_defaults();
    let counts = extractor.count([
        "Invoice",
        "Please send the Invoice to the customer today.",
        "The \"Payment Terms\" apply to every Invoice issued.",
    ]);

    assert_eq!(counts.get("invoice").map(|(_, n)| *n), Some(3));
    assert_eq!(counts.get("payment terms").map(|(_, n)| *n), Some(1));
}

/// Consistency rules and their on/off state survive a restart
#[test]
fn test_open_afterRestart_shouldReloadCustomRules() {
    let dir = common::create_temp_dir().unwrap();
    let path = common::database_path(dir.path());

    let (kept, disabled) = {
        let glossary = Glossary::open(common::open_repository(&path)).unwrap();
        let kept = glossary
            .add_custom_rule("E-mail", "email", "it", CustomRuleKind::Terminology, Some("Write email"))
            .unwrap();
        let disabled = glossary
            .add_custom_rule(r"\s+:", ":", "it", CustomRuleKind::Punctuation, None)
            .unwrap();
        assert!(glossary.set_custom_rule_active(disabled, false).unwrap());
        (kept, disabled)
    };
    assert!(kept > 0 && disabled > kept);

    let glossary = Glossary::open(common::open_repository(&path)).unwrap();
    let rules = glossary.custom_rules_for("it", None);
    assert_eq!(rules.len(), 1);
    assert_eq!(rules[0].id, kept);
    assert_eq!(rules[0].kind, CustomRuleKind::Terminology);
    assert_eq!(rules[0].apply("Scrivere una E-mail"), Some("Scrivere una email".to_string()));

    assert!(glossary.set_custom_rule_active(disabled, true).unwrap());
    assert_eq!(glossary.custom_rules_for("it", Some(CustomRuleKind::Punctuation)).len(), 1);
}
