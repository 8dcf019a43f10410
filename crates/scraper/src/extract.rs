//! Shared field-extraction rules
//!
//! Pure, synchronous helpers applied by every source scraper: CNJ process
//! number, role-labeled party names, and keyword classification. Extraction
//! is pattern-based; a miss always degrades to an absent or default value,
//! never an error.

use diario_common::db::models::PublicationType;
use diario_common::MAX_PARTIES;
use regex_lite::Regex;
use std::collections::HashSet;
use std::sync::OnceLock;

/// Canonical CNJ case-number pattern: NNNNNNN-DD.YYYY.D.BB.OOOO
const PROCESS_NUMBER_PATTERN: &str = r"\d{7}-\d{2}\.\d{4}\.\d\.\d{2}\.\d{4}";

/// Role labels that precede party names in bulletin text
const PARTY_LABELS: [&str; 4] = ["Requerente", "Requerido", "Autor", "Réu"];

fn process_number_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    // Literal pattern, checked by tests
    RE.get_or_init(|| Regex::new(PROCESS_NUMBER_PATTERN).expect("process number pattern"))
}

fn party_res() -> &'static Vec<Regex> {
    static RES: OnceLock<Vec<Regex>> = OnceLock::new();
    RES.get_or_init(|| {
        PARTY_LABELS
            .iter()
            .map(|label| {
                Regex::new(&format!(r"{}[:\s]+([A-ZÀ-Ú][A-Za-zÀ-ú\s]+)", label))
                    .expect("party label pattern")
            })
            .collect()
    })
}

/// Extract the first CNJ process number found in the text.
///
/// Absence is not an error; entries without a case number are valid.
pub fn extract_process_number(text: &str) -> Option<String> {
    process_number_re()
        .find(text)
        .map(|m| m.as_str().to_string())
}

/// A captured name run is greedy and can swallow the next role label when
/// labels follow each other with no punctuation in between; cut it there.
fn trim_trailing_label(name: &str) -> &str {
    let mut end = name.len();
    for label in PARTY_LABELS {
        if let Some(idx) = name.find(label) {
            end = end.min(idx);
        }
    }
    name[..end].trim()
}

/// Extract party names from role-labeled spans.
///
/// Scans all known role labels, deduplicates by exact string preserving
/// first-seen order, and caps the result to bound payload size.
pub fn extract_parties(text: &str) -> Vec<String> {
    let mut seen = HashSet::new();
    let mut parties = Vec::new();

    for re in party_res() {
        for captures in re.captures_iter(text) {
            if let Some(name) = captures.get(1) {
                let name = trim_trailing_label(name.as_str().trim()).to_string();
                if name.is_empty() {
                    continue;
                }
                if seen.insert(name.clone()) {
                    parties.push(name);
                }
                if parties.len() >= MAX_PARTIES {
                    return parties;
                }
            }
        }
    }

    parties
}

/// Classify an entry from title or body text.
///
/// Closed, case-insensitive keyword table; unmatched text falls to the
/// catch-all category.
pub fn classify(text: &str) -> PublicationType {
    let lower = text.to_lowercase();

    if lower.contains("decisão") || lower.contains("sentença") {
        PublicationType::Decisao
    } else if lower.contains("despacho") {
        PublicationType::Despacho
    } else if lower.contains("edital") {
        PublicationType::Edital
    } else if lower.contains("intimação") {
        PublicationType::Intimacao
    } else {
        PublicationType::Outros
    }
}
