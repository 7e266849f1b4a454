/*!
 * Tests for the consistency checker
 */

use rand::Rng;
use std::sync::Arc;

use pagetrans::consistency::{
    ConsistencyChecker, ConsistencyConfig, IssueType, NumericCheck, Severity, compare_numbers,
};
use pagetrans::glossary::{Glossary, GlossaryScope};

use crate::common;

fn checker() -> ConsistencyChecker {
    ConsistencyChecker::new(ConsistencyConfig::default(), Arc::new(Glossary::new()))
}

/// English grouping: 12345.67 -> "12,345.67"
fn english_amount(integer: u32, cents: u32) -> String {
    let digits = integer.to_string();
    let grouped = if digits.len() > 3 {
        let split = digits.len() - 3;
        format!("{},{}", &digits[..split], &digits[split..])
    } else {
        digits
    };
    format!("{}.{:02}", grouped, cents)
}

/// Corrections never change the value of a number
#[test]
fn test_check_randomAmounts_shouldPreserveNumericValues() {
    let checker = checker();
    let mut rng = rand::rng();

    for _ in 0..200 {
        let amount = english_amount(rng.random_range(1..1_000_000), rng.random_range(1..100));
        let source = format!("The total weight is {} kg.", amount);
        let translated = format!("Il peso totale è {} kg.", amount);

        let segment = common::segment(&source, "it");
        let outcome = checker.check(&segment, &translated);

        assert_eq!(
            compare_numbers(&source, "en", &outcome.corrected_text, "it"),
            NumericCheck::Preserved,
            "value changed: {} -> {}",
            source,
            outcome.corrected_text
        );
        assert!(
            outcome
                .issues
                .iter()
                .all(|i| i.issue_type != IssueType::NumericMismatch)
        );
    }
}

/// A dropped number is reported as an error and left alone
#[test]
fn test_check_randomMissingNumber_shouldReportWithoutFixing() {
    let checker = checker();
    let mut rng = rand::rng();

    for _ in 0..50 {
        let count: u32 = rng.random_range(2..500);
        let source = format!("Add {} screws to the left panel.", count);
        let translated = "Aggiungere le viti al pannello sinistro.";

        let outcome = checker.check(&common::segment(&source, "it"), translated);
        let issue = outcome
            .issues
            .iter()
            .find(|i| i.issue_type == IssueType::NumericMismatch)
            .expect("missing number must be reported");

        assert_eq!(issue.severity, Severity::Error);
        assert!(!issue.auto_fixed);
        assert_eq!(outcome.corrected_text, translated);
    }
}

/// Several fixes apply to one segment in a single pass
#[test]
fn test_check_multipleProblems_shouldFixAll() {
    let glossary = Arc::new(Glossary::new());
    glossary.record("Invoice", "it", "Fattura", GlossaryScope::Global).unwrap();
    let checker = ConsistencyChecker::new(ConsistencyConfig::default(), glossary);

    let segment = common::segment("The Invoice total is 1,250.50 \"net\".", "it");
    let outcome = checker.check(&segment, "il totale della invoice è 1,250.50 \"netto\" .");

    assert_eq!(outcome.corrected_text, "Il totale della fattura è 1.250,50 «netto».");
    assert!(outcome.was_corrected());
    assert!(outcome.issues.iter().all(|i| i.auto_fixed));
}

/// The same segment checked twice yields the same text
#[test]
fn test_check_correctedText_shouldBeStable() {
    let checker = checker();
    let segment = common::segment("Price: 3.50 \"EUR\" each", "fr");

    let first = checker.check(&segment, "prix : 3.50 \"EUR\" chacun");
    let second = checker.check(&segment, &first.corrected_text);

    assert_eq!(second.corrected_text, first.corrected_text);
    assert!(!second.was_corrected());
}
