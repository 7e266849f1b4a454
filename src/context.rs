/*!
 * Document domain detection.
 *
 * A document's text is scored against keyword profiles (English, Italian and
 * German keywords in each). The best profile above a minimum confidence
 * names the domain; the domain turns into a context hint sent with every
 * provider request of the run and into glossary suggestions for the user.
 */

use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::fmt;

/// Profiles scoring at or below this are ignored
const MIN_CONFIDENCE: f64 = 0.1;

/// Share of the score given to keyword frequency, the rest to variety
const FREQUENCY_SHARE: f64 = 0.6;

/// Kind of document being translated
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DocumentDomain {
    SafetyManual,
    ConstructionManual,
    TechnicalSpecification,
    MarketingBrochure,
    Generic,
}

impl DocumentDomain {
    /// Short description used in the context hint
    pub fn description(&self) -> &'static str {
        match self {
            DocumentDomain::SafetyManual => "Technical safety manual for fall protection systems",
            DocumentDomain::ConstructionManual => "Construction and installation manual",
            DocumentDomain::TechnicalSpecification => "Technical specifications document",
            DocumentDomain::MarketingBrochure => "Marketing and promotional material",
            DocumentDomain::Generic => "Generic document",
        }
    }

    /// Terminology guidance for the provider
    pub fn terminology_notes(&self) -> &'static str {
        match self {
            DocumentDomain::SafetyManual => {
                "Use precise safety terminology. Keep every safety warning and technical value exact."
            }
            DocumentDomain::ConstructionManual => {
                "Use standard construction terminology for tools and materials."
            }
            DocumentDomain::TechnicalSpecification => {
                "Keep all technical data, measurements and specifications exact."
            }
            DocumentDomain::MarketingBrochure => {
                "Keep a persuasive tone adapted to the target culture. Keep brand names unchanged."
            }
            DocumentDomain::Generic => "Use standard terminology for the domain.",
        }
    }

    /// Expected register
    pub fn tone(&self) -> &'static str {
        match self {
            DocumentDomain::SafetyManual => "formal, technical, safety-focused",
            DocumentDomain::ConstructionManual => "technical, instructional",
            DocumentDomain::TechnicalSpecification => "formal, precise, technical",
            DocumentDomain::MarketingBrochure => "persuasive, engaging, commercial",
            DocumentDomain::Generic => "neutral, professional",
        }
    }

    /// What the user may want to add to the glossary for this kind of document
    pub fn glossary_suggestions(&self) -> &'static [&'static str] {
        match self {
            DocumentDomain::SafetyManual => &[
                "Add safety equipment names to the glossary",
                "Include certification standards (CE, EN, DIN)",
                "Protect warning terms (DANGER, WARNING, CAUTION)",
                "Preserve technical specifications and load ratings",
            ],
            DocumentDomain::ConstructionManual => &[
                "Add tool names and materials to the glossary",
                "Include measurement units and technical specifications",
                "Protect brand names of tools and materials",
                "Preserve installation step numbering",
            ],
            DocumentDomain::TechnicalSpecification => &[
                "Protect all numerical values and units",
                "Add technical terms and standards to the glossary",
                "Preserve model numbers and part codes",
                "Keep references to technical drawings",
            ],
            DocumentDomain::MarketingBrochure => &[
                "Protect brand and product names",
                "Add company-specific terminology to the glossary",
                "Preserve contact information and URLs",
                "Keep call-to-action formatting",
            ],
            DocumentDomain::Generic => &[
                "Review the document for domain-specific terms",
                "Add product names to the glossary",
                "Protect technical specifications",
            ],
        }
    }
}

impl fmt::Display for DocumentDomain {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            DocumentDomain::SafetyManual => "safety_manual",
            DocumentDomain::ConstructionManual => "construction_manual",
            DocumentDomain::TechnicalSpecification => "technical_specification",
            DocumentDomain::MarketingBrochure => "marketing_brochure",
            DocumentDomain::Generic => "generic",
        };
        write!(f, "{}", name)
    }
}

/// Detected domain with its score
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DomainContext {
    /// Best-scoring domain
    pub domain: DocumentDomain,
    /// Score of that domain in [0.0, 1.0]
    pub confidence: f64,
}

impl Default for DomainContext {
    fn default() -> Self {
        Self::generic()
    }
}

impl DomainContext {
    /// No recognizable domain
    pub fn generic() -> Self {
        Self {
            domain: DocumentDomain::Generic,
            confidence: 0.0,
        }
    }

    /// Whether a specific domain was found
    pub fn is_specific(&self) -> bool {
        self.domain != DocumentDomain::Generic
    }

    /// One-line hint for provider requests
    pub fn prompt(&self) -> String {
        format!(
            "Document type: {}. Terminology: {} Tone: {}.",
            self.domain.description(),
            self.domain.terminology_notes(),
            self.domain.tone()
        )
    }
}

struct DomainProfile {
    domain: DocumentDomain,
    weight: f64,
    keyword_count: usize,
    pattern: Regex,
}

impl DomainProfile {
    fn new(domain: DocumentDomain, weight: f64, keywords: &[&str]) -> Self {
        let unique: HashSet<String> = keywords.iter().map(|k| k.to_lowercase()).collect();
        let mut alternatives: Vec<String> = unique.iter().map(|k| regex::escape(k)).collect();
        // Longest first so "fall protection" wins over "protection"
        alternatives.sort_by(|a, b| b.len().cmp(&a.len()).then_with(|| a.cmp(b)));

        let pattern = Regex::new(&format!(r"(?i)\b(?:{})\b", alternatives.join("|")))
            .expect("Invalid domain keyword regex");
        Self {
            domain,
            weight,
            keyword_count: unique.len(),
            pattern,
        }
    }

    fn score(&self, text: &str, segment_count: usize) -> f64 {
        let mut hits = 0usize;
        let mut distinct: HashSet<String> = HashSet::new();
        for found in self.pattern.find_iter(text) {
            hits += 1;
            distinct.insert(found.as_str().to_lowercase());
        }

        let frequency = (hits as f64 / segment_count as f64).min(1.0);
        let variety = distinct.len() as f64 / self.keyword_count as f64;
        (frequency * FREQUENCY_SHARE + variety * (1.0 - FREQUENCY_SHARE)) * self.weight
    }
}

static PROFILES: Lazy<Vec<DomainProfile>> = Lazy::new(|| {
    vec![
        DomainProfile::new(
            DocumentDomain::SafetyManual,
            1.0,
            &[
                "sicurezza", "anticaduta", "protezione", "dispositivo", "imbracatura", "ancoraggi",
                "dpi", "caduta", "installazione", "montaggio", "fissaggio", "avvertenze", "pericolo",
                "rischio", "normativa", "certificazione", "safety", "fall protection", "harness",
                "anchor", "installation", "mounting", "warning", "danger", "risk", "regulation",
                "certification", "sicherheit", "absturzsicherung", "gurt", "anker", "montage",
                "warnung", "gefahr", "risiko", "norm", "zertifizierung", "ce", "din", "iso", "uiaa",
                "kn",
            ],
        ),
        DomainProfile::new(
            DocumentDomain::ConstructionManual,
            0.8,
            &[
                "cemento", "calcestruzzo", "acciaio", "ferro", "legno", "metallo", "trapano", "vite",
                "bullone", "tassello", "ancoraggio", "concrete", "steel", "wood", "metal", "drill",
                "screw", "bolt", "beton", "stahl", "holz", "bohren", "schraube", "bolzen",
                "costruzione", "edificio", "struttura", "fondazione", "parete", "construction",
                "building", "structure", "foundation", "wall", "bau", "gebäude", "struktur",
                "fundament", "wand",
            ],
        ),
        DomainProfile::new(
            DocumentDomain::TechnicalSpecification,
            0.7,
            &[
                "specifica", "caratteristica", "prestazione", "capacità", "dimensione", "peso",
                "resistenza", "carico", "pressione", "specification", "characteristic",
                "performance", "capacity", "dimension", "weight", "resistance", "load", "pressure",
                "spezifikation", "eigenschaft", "leistung", "kapazität", "abmessung", "gewicht",
                "widerstand", "last", "druck", "mm", "cm", "kg", "mpa", "bar", "hz",
            ],
        ),
        DomainProfile::new(
            DocumentDomain::MarketingBrochure,
            0.6,
            &[
                "innovativo", "qualità", "eccellenza", "leader", "migliore", "soluzione", "vantaggi",
                "benefici", "conveniente", "innovative", "quality", "excellence", "best", "solution",
                "advantages", "benefits", "convenient", "innovativ", "qualität", "exzellenz",
                "führer", "beste", "lösung", "vorteile", "nutzen", "günstig", "contatta", "richiedi",
                "scopri", "scegli", "contact", "request", "discover", "choose", "kontakt", "anfrage",
                "entdecken", "wählen",
            ],
        ),
    ]
});

/// Best-matching domain for a document's texts
///
/// Each profile scores keyword hits per text (capped at one) and the share
/// of its keywords that occur at all. Ties keep the earlier profile.
pub fn detect_domain<'a, I>(texts: I) -> DomainContext
where
    I: IntoIterator<Item = &'a str>,
{
    let texts: Vec<&str> = texts.into_iter().filter(|t| !t.trim().is_empty()).collect();
    if texts.is_empty() {
        return DomainContext::generic();
    }
    let joined = texts.join(" ");

    let mut best = DomainContext::generic();
    for profile in PROFILES.iter() {
        let score = profile.score(&joined, texts.len());
        if score > best.confidence {
            best = DomainContext {
                domain: profile.domain,
                confidence: score,
            };
        }
    }

    if best.confidence > MIN_CONFIDENCE {
        best
    } else {
        DomainContext::generic()
    }
}

/// Context hint for a run: a user-supplied context wins over detection
pub fn context_prompt(detected: &DomainContext, custom: Option<&str>) -> Option<String> {
    match custom.map(str::trim).filter(|c| !c.is_empty()) {
        Some(custom) => Some(format!("Document context: {}", custom)),
        None if detected.is_specific() => Some(detected.prompt()),
        None => None,
    }
}
