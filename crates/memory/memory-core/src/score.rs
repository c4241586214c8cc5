//! # Scores
//!
//! A [`Score`] is a scorer's verdict on one piece. The value is kept as a string and interpreted
//! per [`ScoreType`]:
//!
//! | Type | Accepted values | `get_value()` |
//! |------|-----------------|---------------|
//! | `true_false` | `"true"` / `"false"`, any case | `ScoreValue::Bool` |
//! | `float_scale` | a number in `[0, 1]` | `ScoreValue::Float` |
//!
//! ## Example
//!
//! ```rust
//! use memory_core::{Score, ScoreType, ScoreValue};
//! use uuid::Uuid;
//!
//! let score = Score::new(ScoreType::FloatScale, "0.7", Uuid::new_v4()).unwrap();
//! assert_eq!(score.get_value().unwrap(), ScoreValue::Float(0.7));
//! assert!(Score::new(ScoreType::FloatScale, "1.5", Uuid::new_v4()).is_err());
//! ```

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::condition::{Column, Record, Value};
use crate::error::{MemoryError, Result};
use crate::types::Identifier;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ScoreType {
    TrueFalse,
    FloatScale,
}

impl ScoreType {
    pub fn as_str(&self) -> &'static str {
        match self {
            ScoreType::TrueFalse => "true_false",
            ScoreType::FloatScale => "float_scale",
        }
    }
}

impl fmt::Display for ScoreType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ScoreType {
    type Err = MemoryError;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "true_false" => Ok(ScoreType::TrueFalse),
            "float_scale" => Ok(ScoreType::FloatScale),
            other => Err(MemoryError::validation(format!("Unknown scorer type: {}", other))),
        }
    }
}

/// Interpreted score value.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum ScoreValue {
    Bool(bool),
    Float(f64),
}

impl ScoreValue {
    pub fn as_bool(&self) -> Option<bool> {
        match self {
            ScoreValue::Bool(b) => Some(*b),
            ScoreValue::Float(_) => None,
        }
    }

    pub fn as_f64(&self) -> Option<f64> {
        match self {
            ScoreValue::Float(f) => Some(*f),
            ScoreValue::Bool(_) => None,
        }
    }
}

/// A scoring result attached to a specific piece.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Score {
    pub id: Uuid,
    pub score_value: String,
    #[serde(default)]
    pub score_value_description: String,
    pub score_type: ScoreType,
    /// Harm category, e.g. "hate" or "violence".
    #[serde(default)]
    pub score_category: String,
    #[serde(default)]
    pub score_rationale: String,
    #[serde(default)]
    pub score_metadata: String,
    #[serde(default)]
    pub scorer_class_identifier: Identifier,
    /// The piece being scored. Re-pointed to the canonical piece when the score is stored.
    pub prompt_request_response_id: Uuid,
    pub timestamp: DateTime<Utc>,
}

impl Score {
    /// Creates a score, failing if `score_value` does not fit `score_type`.
    pub fn new(
        score_type: ScoreType,
        score_value: impl Into<String>,
        prompt_request_response_id: Uuid,
    ) -> Result<Self> {
        let score_value = score_value.into();
        Self::validate_value(score_type, &score_value)?;
        Ok(Self {
            id: Uuid::new_v4(),
            score_value,
            score_value_description: String::new(),
            score_type,
            score_category: String::new(),
            score_rationale: String::new(),
            score_metadata: String::new(),
            scorer_class_identifier: Identifier::new(),
            prompt_request_response_id,
            timestamp: Utc::now(),
        })
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.score_value_description = description.into();
        self
    }

    pub fn with_category(mut self, category: impl Into<String>) -> Self {
        self.score_category = category.into();
        self
    }

    pub fn with_rationale(mut self, rationale: impl Into<String>) -> Self {
        self.score_rationale = rationale.into();
        self
    }

    pub fn with_metadata(mut self, metadata: impl Into<String>) -> Self {
        self.score_metadata = metadata.into();
        self
    }

    pub fn with_scorer_class_identifier(mut self, identifier: Identifier) -> Self {
        self.scorer_class_identifier = identifier;
        self
    }

    pub fn get_value(&self) -> Result<ScoreValue> {
        match self.score_type {
            ScoreType::TrueFalse => Ok(ScoreValue::Bool(
                self.score_value.eq_ignore_ascii_case("true"),
            )),
            ScoreType::FloatScale => parse_float(&self.score_value).map(ScoreValue::Float),
        }
    }

    /// Re-checks the value, for scores whose fields were changed after construction.
    pub fn validate(&self) -> Result<()> {
        Self::validate_value(self.score_type, &self.score_value)
    }

    fn validate_value(score_type: ScoreType, score_value: &str) -> Result<()> {
        match score_type {
            ScoreType::TrueFalse => {
                let lowered = score_value.to_ascii_lowercase();
                if lowered != "true" && lowered != "false" {
                    return Err(MemoryError::validation(format!(
                        "True False scorers must have a score value of 'true' or 'false' not {}",
                        score_value
                    )));
                }
            }
            ScoreType::FloatScale => {
                let score = parse_float(score_value)?;
                if !(0.0..=1.0).contains(&score) {
                    return Err(MemoryError::validation(format!(
                        "Float scale scorers must have a score value between 0 and 1. Got {}",
                        score_value
                    )));
                }
            }
        }
        Ok(())
    }
}

fn parse_float(score_value: &str) -> Result<f64> {
    score_value.trim().parse::<f64>().map_err(|_| {
        MemoryError::validation(format!(
            "Float scale scorers require a numeric score value. Got {}",
            score_value
        ))
    })
}

impl fmt::Display for Score {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let scorer = self
            .scorer_class_identifier
            .get("__type__")
            .map(String::as_str)
            .unwrap_or("UnknownScorer");
        write!(f, "{}: {}: {}", scorer, self.score_category, self.score_value)
    }
}

impl Record for Score {
    fn column_value(&self, column: Column) -> Option<Value> {
        let value = match column {
            Column::Id => self.id.into(),
            Column::ScoreValue => self.score_value.clone().into(),
            Column::ScoreValueDescription => self.score_value_description.clone().into(),
            Column::ScoreType => self.score_type.as_str().into(),
            Column::ScoreCategory => self.score_category.clone().into(),
            Column::ScoreRationale => self.score_rationale.clone().into(),
            Column::ScoreMetadata => self.score_metadata.clone().into(),
            Column::ScorerClassIdentifier => self.scorer_class_identifier.clone().into(),
            Column::PromptRequestResponseId => self.prompt_request_response_id.into(),
            Column::Timestamp => self.timestamp.into(),
            _ => return None,
        };
        Some(value)
    }
}
