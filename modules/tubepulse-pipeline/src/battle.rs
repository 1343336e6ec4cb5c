//! Head-to-head comparison of two video aggregates.
//!
//! `score = sentiment · positive_ratio + volume · volume_norm`, where
//! `volume_norm` is each side's engagement volume divided by the larger of the
//! two (0 when both are 0). Scores within `epsilon` are a tie. Every step is
//! symmetric in its two inputs, so swapping A and B mirrors the verdict.

use serde::{Deserialize, Serialize};

use tubepulse_common::{
    BattleOutcome, BattleSide, BattleVerdict, CategoryComparison, Leader, SentimentLabel,
    TopicLabel, VideoAggregate,
};

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct BattleWeights {
    pub sentiment: f64,
    pub volume: f64,
    pub epsilon: f64,
}

impl Default for BattleWeights {
    fn default() -> Self {
        Self {
            sentiment: 0.7,
            volume: 0.3,
            epsilon: 1e-6,
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct BattleComparator {
    weights: BattleWeights,
}

impl BattleComparator {
    pub fn new(weights: BattleWeights) -> Self {
        Self { weights }
    }

    pub fn weights(&self) -> &BattleWeights {
        &self.weights
    }

    pub fn compare(&self, a: &VideoAggregate, b: &VideoAggregate) -> BattleVerdict {
        let max_volume = a.engagement_volume.max(b.engagement_volume);
        let side = |agg: &VideoAggregate| {
            let positive_ratio = agg.positive_ratio();
            let volume_norm = if max_volume > 0.0 {
                agg.engagement_volume / max_volume
            } else {
                0.0
            };
            BattleSide {
                video_id: agg.video_id.clone(),
                score: self.weights.sentiment * positive_ratio + self.weights.volume * volume_norm,
                positive_ratio,
                volume_norm,
            }
        };
        let side_a = side(a);
        let side_b = side(b);

        let outcome = match self.leader(side_a.score, side_b.score) {
            Leader::A => BattleOutcome::Winner {
                video_id: side_a.video_id.clone(),
            },
            Leader::B => BattleOutcome::Winner {
                video_id: side_b.video_id.clone(),
            },
            Leader::Tie => BattleOutcome::Tie,
        };

        BattleVerdict {
            categories: self.categories(a, b),
            a: side_a,
            b: side_b,
            outcome,
        }
    }

    fn leader(&self, a: f64, b: f64) -> Leader {
        if (a - b).abs() <= self.weights.epsilon {
            Leader::Tie
        } else if a > b {
            Leader::A
        } else {
            Leader::B
        }
    }

    /// Share of every topic and sentiment label on both sides.
    fn categories(&self, a: &VideoAggregate, b: &VideoAggregate) -> Vec<CategoryComparison> {
        let topics = TopicLabel::ALL.iter().map(|label| {
            (
                format!("topic:{label}"),
                a.topic_share(*label),
                b.topic_share(*label),
            )
        });
        let sentiments = SentimentLabel::ALL.iter().map(|label| {
            (
                format!("sentiment:{label}"),
                a.sentiment_share(*label),
                b.sentiment_share(*label),
            )
        });
        topics
            .chain(sentiments)
            .map(|(metric, share_a, share_b)| CategoryComparison {
                leader: self.leader(share_a, share_b),
                metric,
                share_a,
                share_b,
            })
            .collect()
    }
}
