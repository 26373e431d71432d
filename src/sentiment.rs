//! Lexicon-based sentiment scoring for financial news text.
//!
//! Each token found in the lexicon contributes its valence (roughly -4..4);
//! a negation word within the three preceding tokens flips and dampens it.
//! Scores follow the familiar compound/pos/neg/neu shape:
//!
//! ```text
//! compound = sum / sqrt(sum^2 + 15)
//! ```

use crate::models::SentimentScores;
use once_cell::sync::Lazy;
use std::collections::HashMap;

const NEGATION_SCALAR: f64 = -0.74;
const NORMALIZATION_ALPHA: f64 = 15.0;

static LEXICON: Lazy<HashMap<&'static str, f64>> = Lazy::new(|| {
    [
        // positive
        ("gain", 1.9),
        ("gains", 1.9),
        ("gained", 1.9),
        ("surge", 1.8),
        ("surged", 1.8),
        ("soar", 2.2),
        ("soared", 2.2),
        ("rally", 1.9),
        ("rallied", 1.9),
        ("beat", 1.2),
        ("beats", 1.2),
        ("growth", 1.6),
        ("profit", 1.9),
        ("profits", 1.9),
        ("profitable", 2.1),
        ("strong", 2.3),
        ("stronger", 2.1),
        ("good", 1.9),
        ("great", 3.1),
        ("positive", 2.6),
        ("upgrade", 1.7),
        ("upgraded", 1.7),
        ("boost", 1.7),
        ("boosted", 1.7),
        ("success", 2.7),
        ("successful", 2.8),
        ("win", 2.8),
        ("won", 2.7),
        ("optimistic", 2.4),
        ("improve", 1.9),
        ("improved", 2.1),
        ("rise", 1.1),
        ("rose", 1.1),
        ("approval", 2.2),
        ("approved", 1.8),
        ("benefit", 2.0),
        ("confident", 2.2),
        ("recover", 1.5),
        ("recovery", 1.5),
        ("record", 0.9),
        // negative
        ("loss", -1.3),
        ("losses", -1.3),
        ("fall", -1.1),
        ("fell", -1.1),
        ("drop", -1.1),
        ("dropped", -1.1),
        ("plunge", -2.0),
        ("plunged", -2.0),
        ("slump", -2.0),
        ("slumped", -2.0),
        ("weak", -1.9),
        ("weaker", -1.9),
        ("bad", -2.5),
        ("fraud", -2.8),
        ("lawsuit", -1.8),
        ("sue", -1.9),
        ("sued", -1.9),
        ("subpoena", -1.5),
        ("probe", -1.1),
        ("investigation", -1.0),
        ("fined", -1.8),
        ("penalty", -1.9),
        ("downgrade", -1.7),
        ("downgraded", -1.7),
        ("miss", -1.2),
        ("missed", -1.2),
        ("decline", -1.3),
        ("declined", -1.3),
        ("crisis", -3.1),
        ("bankruptcy", -2.7),
        ("layoffs", -1.9),
        ("cut", -1.1),
        ("cuts", -1.1),
        ("negative", -2.7),
        ("risk", -1.1),
        ("concern", -1.4),
        ("concerns", -1.4),
        ("warn", -1.4),
        ("warned", -1.4),
        ("fail", -2.5),
        ("failed", -2.3),
        ("recall", -1.3),
        ("scandal", -2.8),
        ("crash", -1.7),
        ("fear", -2.2),
        ("fears", -2.2),
    ]
    .into_iter()
    .collect()
});

const NEGATIONS: &[&str] = &[
    "not", "no", "never", "without", "nor", "neither", "cannot", "none", "nothing",
];

fn is_negation(token: &str) -> bool {
    NEGATIONS.contains(&token) || token.ends_with("n't")
}

fn round3(x: f64) -> f64 {
    (x * 1000.0).round() / 1000.0
}

/// Score a span of text.
pub fn polarity_scores(text: &str) -> SentimentScores {
    let text = text.replace('’', "'");
    let tokens: Vec<String> = text
        .split(|c: char| !c.is_alphanumeric() && c != '\'')
        .filter(|t| !t.is_empty())
        .map(str::to_lowercase)
        .collect();

    let mut valences = Vec::with_capacity(tokens.len());
    for (i, token) in tokens.iter().enumerate() {
        let mut valence = LEXICON.get(token.as_str()).copied().unwrap_or(0.0);
        if valence != 0.0 {
            let start = i.saturating_sub(3);
            if tokens[start..i].iter().any(|t| is_negation(t)) {
                valence *= NEGATION_SCALAR;
            }
        }
        valences.push(valence);
    }

    let mut pos_sum = 0.0;
    let mut neg_sum = 0.0;
    let mut neu_count = 0.0;
    for &v in &valences {
        if v > 0.0 {
            pos_sum += v + 1.0;
        } else if v < 0.0 {
            neg_sum += v - 1.0;
        } else {
            neu_count += 1.0;
        }
    }

    let total = pos_sum + neg_sum.abs() + neu_count;
    if total == 0.0 {
        return SentimentScores::default();
    }

    let sum: f64 = valences.iter().sum();
    let compound = (sum / (sum * sum + NORMALIZATION_ALPHA).sqrt()).clamp(-1.0, 1.0);

    SentimentScores {
        compound: round3(compound),
        pos: round3(pos_sum / total),
        neg: round3(neg_sum.abs() / total),
        neu: round3(neu_count / total),
    }
}

/// Component-wise mean; `None` for an empty slice.
pub fn mean(scores: &[SentimentScores]) -> Option<SentimentScores> {
    if scores.is_empty() {
        return None;
    }
    let n = scores.len() as f64;
    let sum = scores.iter().fold(SentimentScores::default(), |acc, s| SentimentScores {
        compound: acc.compound + s.compound,
        pos: acc.pos + s.pos,
        neg: acc.neg + s.neg,
        neu: acc.neu + s.neu,
    });
    Some(SentimentScores {
        compound: round3(sum.compound / n),
        pos: round3(sum.pos / n),
        neg: round3(sum.neg / n),
        neu: round3(sum.neu / n),
    })
}
