//! Core types for the scoring pipeline
//!
//! - [`SentenceScore`]: raw per-sentence result from one scoring request
//! - [`AggregateScore`]: the four-number quality score returned to callers
//! - [`ScoreRequest`]: outbound request payload (single sentence or pair)

use serde::{Deserialize, Serialize};

// ============================================================================
// Raw scores
// ============================================================================

/// Three-way sentiment breakdown for one sentence
///
/// Fractions in [0, 1]; they need not sum to 1.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ToneScores {
    #[serde(alias = "Positive")]
    pub positive: f64,
    #[serde(alias = "Neutral")]
    pub neutral: f64,
    #[serde(alias = "Negative")]
    pub negative: f64,
}

/// Forward-looking statement breakdown for one sentence
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FlsScores {
    #[serde(alias = "Specific FLS", alias = "specific_fls")]
    pub specific: f64,
    #[serde(alias = "Non-specific FLS", alias = "non_specific_fls")]
    pub non_specific: f64,
    #[serde(alias = "Not FLS", alias = "not_fls")]
    pub not_fls: f64,
}

/// Raw result of scoring one sentence
///
/// Produced per request and consumed immediately by aggregation.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct SentenceScore {
    pub tone: ToneScores,
    pub fls: FlsScores,
}

impl SentenceScore {
    pub fn new(tone: ToneScores, fls: FlsScores) -> Self {
        Self { tone, fls }
    }
}

// ============================================================================
// Aggregate score
// ============================================================================

/// Four-number quality score, each a percentage truncated to 2 decimals
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct AggregateScore {
    pub overall: f64,
    pub optimism: f64,
    pub confidence: f64,
    /// Share of forward-looking statements that are specific ("trust")
    pub specific_fls: f64,
}

impl AggregateScore {
    /// Fallback returned when there is nothing to score or every request failed.
    ///
    /// The literal values are consumed downstream and must stay exactly as-is.
    pub const NEUTRAL_DEFAULT: AggregateScore = AggregateScore {
        overall: 0.33,
        optimism: 0.33,
        confidence: 0.34,
        specific_fls: 0.33,
    };

    /// Scores in the legacy tuple order: overall, optimism, confidence, specific FLS
    pub fn as_array(&self) -> [f64; 4] {
        [self.overall, self.optimism, self.confidence, self.specific_fls]
    }
}

// ============================================================================
// Request payloads
// ============================================================================

/// Body of one scoring request
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ScoreRequest {
    /// Two sentences in one request: `{"texts": [a, b]}`
    Pair { texts: [String; 2] },
    /// One sentence: `{"text": a}`
    Single { text: String },
}

impl ScoreRequest {
    pub fn single(text: impl Into<String>) -> Self {
        Self::Single { text: text.into() }
    }

    pub fn pair(first: impl Into<String>, second: impl Into<String>) -> Self {
        Self::Pair {
            texts: [first.into(), second.into()],
        }
    }

    /// Number of sentences carried by this request
    pub fn sentence_count(&self) -> usize {
        match self {
            Self::Single { .. } => 1,
            Self::Pair { .. } => 2,
        }
    }
}
