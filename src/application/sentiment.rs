//! Sentiment classification behind an injected classifier capability.
//!
//! Whether a classifier is available is decided once at start-up and never
//! changes afterwards; an unavailable classifier fails every request.

use std::sync::Arc;

use async_trait::async_trait;
use serde::Serialize;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ClassifierError {
    #[error("classifier request failed: {0}")]
    Transport(String),
    #[error("classifier returned an out-of-range score {0}")]
    InvalidScore(f64),
}

/// A model returning the probability that a text is positive, in `[0, 1]`.
#[async_trait]
pub trait SentimentClassifier: Send + Sync {
    async fn score(&self, text: &str) -> Result<f64, ClassifierError>;
}

#[derive(Clone)]
pub enum ClassifierState {
    Ready(Arc<dyn SentimentClassifier>),
    Unavailable { reason: String },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Sentiment {
    Positive,
    Negative,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct SentimentVerdict {
    pub sentiment: Sentiment,
    pub confidence: f64,
}

impl SentimentVerdict {
    /// Scores at or above 0.5 are positive; confidence is rounded to two decimals.
    pub fn from_score(score: f64) -> Self {
        let (sentiment, confidence) = if score >= 0.5 {
            (Sentiment::Positive, score)
        } else {
            (Sentiment::Negative, 1.0 - score)
        };
        Self {
            sentiment,
            confidence: (confidence * 100.0).round() / 100.0,
        }
    }
}

#[derive(Debug, Error)]
pub enum SentimentError {
    #[error("sentiment classifier is unavailable: {0}")]
    Unavailable(String),
    #[error("text must not be empty")]
    EmptyText,
    #[error(transparent)]
    Classifier(#[from] ClassifierError),
}

#[derive(Clone)]
pub struct SentimentService {
    state: ClassifierState,
}

impl SentimentService {
    pub fn new(state: ClassifierState) -> Self {
        Self { state }
    }

    pub fn is_ready(&self) -> bool {
        matches!(self.state, ClassifierState::Ready(_))
    }

    pub async fn analyze(&self, text: &str) -> Result<SentimentVerdict, SentimentError> {
        let classifier = match &self.state {
            ClassifierState::Ready(classifier) => classifier,
            ClassifierState::Unavailable { reason } => {
                return Err(SentimentError::Unavailable(reason.clone()));
            }
        };
        if text.trim().is_empty() {
            return Err(SentimentError::EmptyText);
        }

        let score = classifier.score(&text.to_lowercase()).await?;
        if !(0.0..=1.0).contains(&score) {
            return Err(ClassifierError::InvalidScore(score).into());
        }
        Ok(SentimentVerdict::from_score(score))
    }
}
