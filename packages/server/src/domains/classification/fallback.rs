//! Regex fallback for when the external classifier is unavailable.
//!
//! A fixed, ordered set of patterns, each bound to a level and a fixed
//! confidence, tested in priority order. Embedded explicit numbers come
//! first (least ambiguous). Ambiguous positive phrases ("fine", "okay")
//! sit at the bottom with a confidence below the accept threshold, so they
//! always route to clarification rather than silent acceptance.

use lazy_static::lazy_static;
use regex::Regex;

pub struct FallbackPattern {
    pub pattern: Regex,
    pub level: i32,
    pub confidence: f64,
}

lazy_static! {
    /// Priority-ordered fallback ladder. First match wins.
    pub static ref FALLBACK_PATTERNS: Vec<FallbackPattern> = vec![
        // Embedded explicit number: "a 3", "level 2", "was a 4 today"
        FallbackPattern {
            pattern: Regex::new(
                r"(?i)\b(?:a|an|at|was|is|it's|its|like|level|about|around|maybe)\s+([1-5])\b",
            )
            .unwrap(),
            level: 0, // taken from the capture group
            confidence: 0.90,
        },
        // Level 5: total disability
        FallbackPattern {
            pattern: Regex::new(
                r"(?i)\b(?:can'?t\s+(?:get\s+out\s+of\s+bed|function|move|do\s+anything)|couldn'?t\s+(?:get\s+out\s+of\s+bed|function|move|do\s+anything)|bedridden|in\s+bed\s+all\s+day|worst\s+(?:day|headache|migraine|pain)|unbearable|completely\s+(?:disabled|down|out))\b",
            )
            .unwrap(),
            level: 5,
            confidence: 0.85,
        },
        // Level 4: cancelled or significantly modified activities
        FallbackPattern {
            pattern: Regex::new(
                r"(?i)\b(?:cancel(?:led|ed|ing)?|couldn'?t\s+(?:work|go|make\s+it)|called\s+in\s+sick|stayed\s+home|went\s+home\s+early|had\s+to\s+(?:leave|lie\s+down|stop)|skipped\s+(?:work|school))\b",
            )
            .unwrap(),
            level: 4,
            confidence: 0.80,
        },
        // Level 3: kept going despite the headache
        FallbackPattern {
            pattern: Regex::new(
                r"(?i)\b(?:pushed\s+through|powered\s+through|toughed\s+it\s+out|worked\s+through|struggled\s+through|got\s+through\s+(?:it|the\s+day)|made\s+it\s+through)\b",
            )
            .unwrap(),
            level: 3,
            confidence: 0.75,
        },
        // Level 3: acute medication use. Lower confidence than the phrase
        // patterns above; medication alone is a weaker signal.
        FallbackPattern {
            pattern: Regex::new(
                r"(?i)\b(?:took|needed|popped)\s+(?:my\s+|an?\s+|some\s+)?(?:tylenol|advil|ibuprofen|excedrin|aleve|naproxen|aspirin|sumatriptan|imitrex|triptans?|meds?|medication|painkillers?)\b",
            )
            .unwrap(),
            level: 3,
            confidence: 0.70,
        },
        // Level 2: headache explicitly present but minor
        FallbackPattern {
            pattern: Regex::new(
                r"(?i)\b(?:mild|slight|minor|small|little)\s+(?:headache|migraine|pain|ache)\b|\b(?:a\s+bit\s+of\s+a\s+headache|some\s+pain|manageable)\b",
            )
            .unwrap(),
            level: 2,
            confidence: 0.75,
        },
        // Level 2: ambiguous positive language. Deliberately below the
        // accept threshold so "fine" is clarified, never auto-accepted as
        // headache-free.
        FallbackPattern {
            pattern: Regex::new(
                r"(?i)^\s*(?:fine|ok|okay|meh|alright|all\s+right|not\s+bad|good|pretty\s+good|decent)\s*[.!]*\s*$",
            )
            .unwrap(),
            level: 2,
            confidence: 0.65,
        },
    ];
}

/// Test the fallback ladder in priority order. Returns (level, confidence)
/// for the first match, or None when nothing matches.
pub fn match_level(text: &str) -> Option<(i32, f64)> {
    for entry in FALLBACK_PATTERNS.iter() {
        if let Some(captures) = entry.pattern.captures(text) {
            let level = match captures.get(1) {
                // Embedded-number pattern: the level is the digit itself.
                Some(digit) => digit.as_str().parse().ok()?,
                None => entry.level,
            };
            return Some((level, entry.confidence));
        }
    }
    None
}
