//! # Relevance Filter
//!
//! Pure scoring function deciding whether an inbound group message describes
//! a real-estate listing. This is the sole gate in front of durable storage:
//! messages scored below the threshold are dropped, never queued, so the
//! threshold is an explicit tunable surfaced through configuration.

use std::sync::LazyLock;

use regex::Regex;

/// Default score threshold on the 0-100 scale.
pub const DEFAULT_SCORE_THRESHOLD: u32 = 60;

/// Minimum text length before conversational filler is scored at all.
const MIN_SCORABLE_LEN: usize = 20;

/// Result of classifying one message text.
#[derive(Debug, Clone, PartialEq)]
pub struct Classification {
    /// Whether the message qualifies for storage
    pub is_relevant: bool,
    /// Clamped score / 100
    pub confidence: f32,
    /// Names of the signals that contributed to the score
    pub matched_signals: Vec<String>,
}

impl Classification {
    fn irrelevant() -> Self {
        Self {
            is_relevant: false,
            confidence: 0.0,
            matched_signals: Vec::new(),
        }
    }
}

/// Domain keywords counted towards the tiered keyword score.
const KEYWORDS: &[&str] = &[
    "rent",
    "rental",
    "sale",
    "sell",
    "lease",
    "flat",
    "apartment",
    "house",
    "villa",
    "plot",
    "property",
    "bedroom",
    "bathroom",
    "kitchen",
    "balcony",
    "furnished",
    "unfurnished",
    "semifurnished",
    "deposit",
    "maintenance",
    "society",
    "tenant",
    "owner",
    "broker",
    "brokerage",
    "metro",
    "locality",
    "amenities",
    "parking",
    "vastu",
];

/// Conversational filler that short-circuits very short messages.
const FILLER: &[&str] = &[
    "hi",
    "hello",
    "hey",
    "ok",
    "okay",
    "thanks",
    "thank",
    "you",
    "welcome",
    "good",
    "morning",
    "afternoon",
    "evening",
    "night",
    "yes",
    "no",
    "sure",
    "done",
    "great",
    "nice",
];

// Structural pattern families. Each family contributes a fixed score once,
// regardless of how many times it matches.

static PRICE_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)(₹|rs\.?\s?|inr\s?)\d[\d,.]*|\d[\d,.]*\s*(lakh|lac|lakhs|crore|cr|k)\b|\d[\d,.]*\s*/\s*(month|mo|year|yr)")
        .expect("price pattern compiles")
});

static ROOMS_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)\b\d\s*(bhk|rk|bed|beds|bedroom|bedrooms)\b").expect("rooms pattern compiles")
});

static AREA_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)\b\d[\d,.]*\s*(sq\.?\s?ft|sqft|sq\.?\s?yards?|sq\.?\s?m|gaj|acres?)\b")
        .expect("area pattern compiles")
});

static CONTACT_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(\+?\d{1,3}[\s-]?)?\d{10}\b").expect("contact pattern compiles")
});

static FLOOR_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)\b(\d+)(st|nd|rd|th)?\s*floor\b|\bground\s*floor\b")
        .expect("floor pattern compiles")
});

/// Classify one message text with the default threshold.
///
/// Stateless and deterministic: identical input always yields an identical
/// classification, so it is safe to call inline on the hot message path.
pub fn classify(text: &str) -> Classification {
    classify_with_threshold(text, DEFAULT_SCORE_THRESHOLD)
}

/// Classify one message text against an explicit threshold.
pub fn classify_with_threshold(text: &str, threshold: u32) -> Classification {
    let trimmed = text.trim();
    if trimmed.is_empty() {
        return Classification::irrelevant();
    }

    let lower = trimmed.to_lowercase();

    // Short conversational filler never reaches scoring.
    if trimmed.len() < MIN_SCORABLE_LEN && is_filler_only(&lower) {
        return Classification::irrelevant();
    }

    let mut score: i64 = 0;
    let mut matched_signals = Vec::new();

    let keyword_count = KEYWORDS
        .iter()
        .filter(|keyword| lower.contains(*keyword))
        .count();

    if keyword_count >= 3 {
        score += 30;
        matched_signals.push(format!("keywords:{}", keyword_count));
    } else if keyword_count >= 1 {
        score += 15;
        matched_signals.push(format!("keywords:{}", keyword_count));
    }

    for (name, regex, points) in [
        ("price", &*PRICE_RE, 15),
        ("rooms", &*ROOMS_RE, 15),
        ("area", &*AREA_RE, 10),
        ("contact", &*CONTACT_RE, 10),
        ("floor", &*FLOOR_RE, 5),
    ] {
        if regex.is_match(trimmed) {
            score += points;
            matched_signals.push(name.to_string());
        }
    }

    // Message-structure bonuses
    let word_count = lower.split_whitespace().count();
    if trimmed.lines().count() >= 2 && word_count >= 8 {
        score += 5;
        matched_signals.push("multiline".to_string());
    }
    if trimmed.len() >= 40 && trimmed.chars().any(|c| c.is_ascii_digit()) {
        score += 5;
        matched_signals.push("numerals".to_string());
    }
    if keyword_count >= 1 && trimmed.chars().any(|c| !c.is_ascii()) {
        score += 5;
        matched_signals.push("glyphs".to_string());
    }
    if trimmed.len() > 120 {
        score += 5;
        matched_signals.push("length".to_string());
    }

    // Very short messages with almost no keywords are usually chatter.
    if trimmed.len() < 50 && keyword_count < 2 {
        score -= 15;
    }

    let score = score.clamp(0, 100) as u32;

    Classification {
        is_relevant: score >= threshold,
        confidence: score as f32 / 100.0,
        matched_signals,
    }
}

fn is_filler_only(lower: &str) -> bool {
    lower
        .split_whitespace()
        .map(|word| word.trim_matches(|c: char| !c.is_alphanumeric()))
        .filter(|word| !word.is_empty())
        .all(|word| FILLER.contains(&word))
}
