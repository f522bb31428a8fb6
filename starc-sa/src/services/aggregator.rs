//! Score aggregation
//!
//! Reduces per-sentence [`SentenceScore`]s to one [`AggregateScore`]:
//!
//! - **Overall**: mean of per-sentence weighted scores, where a sentence scores
//!   `(Σ tone weight·value + Σ fls weight·value) / MAX_SCORE × 100`
//! - **Optimism**: `ΣPos / (ΣPos + ΣNeg) × 100`, 50 when the denominator is 0
//! - **Confidence**: `(ΣPos + ΣNeu) / (ΣPos + ΣNeu + ΣNeg) × 100`, 50 when 0
//! - **Specific FLS**: `ΣSpecific / (ΣSpecific + ΣNonSpecific) × 100`, 0 when 0
//!
//! The 50/50/0 fallbacks are intentionally asymmetric. All four outputs are
//! truncated (not rounded) to two decimal places.

use crate::types::{AggregateScore, SentenceScore};

/// Weight table applied to each category fraction
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ScoreWeights {
    pub positive: f64,
    pub neutral: f64,
    pub negative: f64,
    pub specific_fls: f64,
    pub non_specific_fls: f64,
    pub not_fls: f64,
}

/// Fixed production weights
pub const WEIGHTS: ScoreWeights = ScoreWeights {
    positive: 1.0,
    neutral: 0.7,
    negative: 0.0,
    specific_fls: 1.0,
    non_specific_fls: 0.0,
    not_fls: 1.0,
};

/// Highest tone weight plus highest FLS weight
pub const MAX_SCORE: f64 = 2.0;

const OPTIMISM_FALLBACK: f64 = 50.0;
const CONFIDENCE_FALLBACK: f64 = 50.0;
const SPECIFIC_FLS_FALLBACK: f64 = 0.0;

/// Truncate toward negative infinity at two decimals: `floor(x × 100) / 100`
pub fn truncate_2dp(value: f64) -> f64 {
    (value * 100.0).floor() / 100.0
}

/// Weighted score of one sentence on a 0-100 scale
pub fn sentence_score(score: &SentenceScore) -> f64 {
    let w = &WEIGHTS;
    let tone = w.positive * score.tone.positive
        + w.neutral * score.tone.neutral
        + w.negative * score.tone.negative;
    let fls = w.specific_fls * score.fls.specific
        + w.non_specific_fls * score.fls.non_specific
        + w.not_fls * score.fls.not_fls;
    (tone + fls) / MAX_SCORE * 100.0
}

#[derive(Debug, Default)]
struct Totals {
    positive: f64,
    neutral: f64,
    negative: f64,
    specific: f64,
    non_specific: f64,
    weighted: f64,
}

fn ratio_or(numerator: f64, denominator: f64, fallback: f64) -> f64 {
    if denominator > 0.0 {
        numerator / denominator * 100.0
    } else {
        fallback
    }
}

/// Aggregate per-sentence scores
///
/// Returns `None` for an empty slice; callers substitute
/// [`AggregateScore::NEUTRAL_DEFAULT`].
pub fn aggregate(scores: &[SentenceScore]) -> Option<AggregateScore> {
    if scores.is_empty() {
        return None;
    }

    let totals = scores.iter().fold(Totals::default(), |mut t, s| {
        t.positive += s.tone.positive;
        t.neutral += s.tone.neutral;
        t.negative += s.tone.negative;
        t.specific += s.fls.specific;
        t.non_specific += s.fls.non_specific;
        t.weighted += sentence_score(s);
        t
    });

    let overall = totals.weighted / scores.len() as f64;
    let optimism = ratio_or(
        totals.positive,
        totals.positive + totals.negative,
        OPTIMISM_FALLBACK,
    );
    let confidence = ratio_or(
        totals.positive + totals.neutral,
        totals.positive + totals.negative + totals.neutral,
        CONFIDENCE_FALLBACK,
    );
    let specific_fls = ratio_or(
        totals.specific,
        totals.specific + totals.non_specific,
        SPECIFIC_FLS_FALLBACK,
    );

    Some(AggregateScore {
        overall: truncate_2dp(overall),
        optimism: truncate_2dp(optimism),
        confidence: truncate_2dp(confidence),
        specific_fls: truncate_2dp(specific_fls),
    })
}
