// 📝 Narrative Generator - (r, p) → plain-language interpretation
// Pure functions only: same inputs, same sentence

use crate::stats::{Correlation, Regression};
use serde::{Deserialize, Serialize};

/// Significance level for every verdict
pub const SIGNIFICANCE_LEVEL: f64 = 0.05;

/// |r| above this counts a company as positively/negatively related
pub const RELEVANT_R: f64 = 0.2;

const MODERATE_R: f64 = 0.3;
const STRONG_R: f64 = 0.7;

// ============================================================================
// CLASSIFICATION
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Strength {
    Weak,
    Moderate,
    Strong,
}

impl Strength {
    pub fn from_r(r: f64) -> Self {
        let abs = r.abs();
        if abs < MODERATE_R {
            Strength::Weak
        } else if abs < STRONG_R {
            Strength::Moderate
        } else {
            Strength::Strong
        }
    }

    pub fn word(&self) -> &'static str {
        match self {
            Strength::Weak => "weak",
            Strength::Moderate => "moderate",
            Strength::Strong => "strong",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Direction {
    Positive,
    Negative,
    None,
}

impl Direction {
    pub fn from_r(r: f64) -> Self {
        if r > 0.0 {
            Direction::Positive
        } else if r < 0.0 {
            Direction::Negative
        } else {
            Direction::None
        }
    }

    pub fn word(&self) -> &'static str {
        match self {
            Direction::Positive => "positive",
            Direction::Negative => "negative",
            Direction::None => "no",
        }
    }
}

/// Structured interpretation of one correlation
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Narrative {
    pub strength: Strength,
    pub direction: Direction,
    pub significant: bool,
    pub sentence: String,
}

impl Narrative {
    /// Short form, e.g. "strong positive, significant"
    pub fn label(&self) -> String {
        format!(
            "{} {}, {}",
            self.strength.word(),
            self.direction.word(),
            if self.significant { "significant" } else { "not significant" }
        )
    }
}

fn capitalize(word: &str) -> String {
    let mut chars = word.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().collect::<String>() + chars.as_str(),
        None => String::new(),
    }
}

// ============================================================================
// SENTENCES
// ============================================================================

/// Interpret a correlation coefficient and its p-value
pub fn describe(r: f64, p: f64) -> Narrative {
    let strength = Strength::from_r(r);
    let direction = Direction::from_r(r);
    let significant = p < SIGNIFICANCE_LEVEL;

    let sentence = format!(
        "{} {} correlation (r = {:.2}, p = {:.3}), {}.",
        capitalize(strength.word()),
        direction.word(),
        r,
        p,
        if significant {
            "statistically significant"
        } else {
            "not statistically significant"
        }
    );

    Narrative {
        strength,
        direction,
        significant,
        sentence,
    }
}

pub fn insufficient_data(n: usize) -> String {
    format!("Insufficient data: {n} observations are too few for a reliable correlation.")
}

/// Sentence for any correlation outcome
pub fn describe_correlation(correlation: &Correlation) -> String {
    match correlation {
        Correlation::Computed { r, p, .. } => describe(*r, *p).sentence,
        Correlation::Insufficient { n } => insufficient_data(*n),
    }
}

/// One-line interpretation used next to a company's time series
pub fn company_interpretation(company: &str, correlation: &Correlation) -> String {
    match correlation {
        Correlation::Computed { r, p, n } => {
            let verdict = if *p < SIGNIFICANCE_LEVEL && *r > 0.0 {
                "significant positive relationship"
            } else if *p < SIGNIFICANCE_LEVEL && *r < 0.0 {
                "significant negative relationship"
            } else {
                "no statistically significant relationship"
            };
            format!("{company}: r = {r:.2}, p = {p:.3}, n = {n} - {verdict}.")
        }
        Correlation::Insufficient { n } => {
            format!("{company}: too few observations for a reliable correlation (n = {n}).")
        }
    }
}

/// Detailed verdict for a single company's scatter plot
pub fn scatter_interpretation(r: f64, p: f64) -> &'static str {
    if p < SIGNIFICANCE_LEVEL {
        if r > RELEVANT_R {
            "There is a significant positive relationship between governance score and return."
        } else if r < -RELEVANT_R {
            "There is a significant negative relationship between governance score and return."
        } else {
            "The relationship is statistically significant but weak in substance."
        }
    } else {
        "For this company there is no statistically significant relationship between governance score and return."
    }
}

/// Verdict over the global regression of the scatter view
pub fn regression_verdict(regression: &Regression) -> &'static str {
    if regression.r > RELEVANT_R && regression.p < SIGNIFICANCE_LEVEL {
        "Significant positive relationship (global)."
    } else if regression.r < -RELEVANT_R && regression.p < SIGNIFICANCE_LEVEL {
        "Significant negative relationship (global)."
    } else {
        "No statistically significant relationship (global)."
    }
}

// ============================================================================
// AGGREGATE SUMMARY
// ============================================================================

/// How many companies fall into each correlation class
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct CorrelationCounts {
    pub total: usize,
    pub positive: usize,
    pub negative: usize,
    pub neutral: usize,
}

impl CorrelationCounts {
    pub fn from_coefficients(rs: impl IntoIterator<Item = f64>) -> Self {
        let mut counts = CorrelationCounts::default();
        for r in rs {
            counts.total += 1;
            if r > RELEVANT_R {
                counts.positive += 1;
            } else if r < -RELEVANT_R {
                counts.negative += 1;
            } else {
                counts.neutral += 1;
            }
        }
        counts
    }
}

/// Majority statement over many companies
pub fn aggregate_summary(counts: &CorrelationCounts) -> &'static str {
    let CorrelationCounts {
        positive: pos,
        negative: neg,
        neutral,
        ..
    } = *counts;

    if pos > neg && pos > neutral {
        "Most companies show a positive relationship between governance score and return."
    } else if neg > pos && neg > neutral {
        "Most companies show a negative relationship between governance score and return."
    } else if neutral > pos && neutral > neg {
        "For most companies there is no significant relationship between governance score and return."
    } else {
        "The correlations are evenly distributed and show no clear trend."
    }
}
