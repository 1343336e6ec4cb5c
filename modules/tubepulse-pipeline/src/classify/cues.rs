use std::collections::HashSet;

use async_trait::async_trait;
use unicode_segmentation::UnicodeSegmentation;

use tubepulse_common::{ClassificationError, NormalizedComment, Prediction, TopicLabel, Video};

use super::TopicScorer;
use crate::preprocess::stopwords::{self, fold};

/// Words that address or describe whoever made the video.
const CREATOR_CUES: &[&str] = &[
    "you", "your", "youre", "yourself", "channel", "creator", "editing", "edit", "edited",
    "upload", "uploads", "uploaded", "subscribe", "subscribed", "subscriber", "subscribers",
    "bro", "sir", "host", "voice", "sen", "sana", "seni", "senin", "siz", "size", "sizin",
    "kanal", "kanalı", "kanalın", "kanala", "abi", "abla", "hocam", "emeğine", "emeğinize",
    "eline", "ellerine", "teşekkürler", "abone",
];

/// Words about the thing the video presents.
const SUBJECT_CUES: &[&str] = &[
    "song", "songs", "lyrics", "melody", "beat", "chorus", "verse", "track", "album", "music",
    "guitar", "drums", "vocals", "product", "phone", "price", "game", "match", "goal", "movie",
    "film", "scene", "ending", "recipe", "şarkı", "şarkının", "şarkıyı", "söz", "sözleri",
    "klip", "beste", "nakarat", "müzik", "ürün", "fiyat", "oyun", "maç", "gol", "sahne",
];

/// Lowercased, diacritic-folded words of at least 3 chars, minus stop words.
fn salient_words(text: &str) -> HashSet<String> {
    text.unicode_words()
        .map(fold)
        .filter(|w| w.chars().count() >= 3 && !stopwords::is_stopword(w))
        .collect()
}

/// Canonical topic model: counts creator and subject cues, where the video's
/// channel name adds creator cues and its title adds subject cues.
#[derive(Debug, Clone)]
pub struct CueTopicClassifier {
    creator: HashSet<String>,
    subject: HashSet<String>,
}

impl Default for CueTopicClassifier {
    fn default() -> Self {
        Self::new()
    }
}

impl CueTopicClassifier {
    pub fn new() -> Self {
        Self {
            creator: CREATOR_CUES.iter().map(|w| fold(w)).collect(),
            subject: SUBJECT_CUES.iter().map(|w| fold(w)).collect(),
        }
    }

    pub fn classify(&self, video: &Video, comment: &NormalizedComment) -> Prediction<TopicLabel> {
        let channel = video
            .channel_title
            .as_deref()
            .map(salient_words)
            .unwrap_or_default();
        let title: HashSet<String> = salient_words(&video.title)
            .into_iter()
            .filter(|w| !channel.contains(w))
            .collect();

        let mut creator_hits = 0usize;
        let mut subject_hits = 0usize;
        for token in &comment.tokens {
            let token = fold(token);
            if self.creator.contains(&token) || channel.contains(&token) {
                creator_hits += 1;
            } else if self.subject.contains(&token) || title.contains(&token) {
                subject_hits += 1;
            }
        }

        let (label, best, other) = if creator_hits > subject_hits {
            (TopicLabel::Creator, creator_hits, subject_hits)
        } else if subject_hits > creator_hits {
            (TopicLabel::Subject, subject_hits, creator_hits)
        } else {
            return Prediction {
                label: TopicLabel::General,
                confidence: 0.5,
            };
        };
        Prediction {
            label,
            confidence: 0.5 + 0.5 * (best - other) as f64 / (best + other) as f64,
        }
    }
}

#[async_trait]
impl TopicScorer for CueTopicClassifier {
    fn name(&self) -> &str {
        "keyword"
    }

    async fn score_topic(
        &self,
        video: &Video,
        comment: &NormalizedComment,
    ) -> Result<Prediction<TopicLabel>, ClassificationError> {
        Ok(self.classify(video, comment))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{normalized, titled_video, video};

    #[test]
    fn channel_name_signals_creator() {
        let v = titled_video("v1", "Midnight Drive (Official Video)", "Lena Park");
        let c = CueTopicClassifier::new().classify(&v, &normalized("v1", "c1", "lena you are amazing"));
        assert_eq!(c.label, TopicLabel::Creator);
        assert_eq!(c.confidence, 1.0);
    }

    #[test]
    fn title_words_signal_subject() {
        let v = titled_video("v1", "Midnight Drive (Official Video)", "Lena Park");
        let c = CueTopicClassifier::new().classify(&v, &normalized("v1", "c1", "midnight drive on repeat"));
        assert_eq!(c.label, TopicLabel::Subject);
    }

    #[test]
    fn turkish_cues_fold_diacritics() {
        let v = video("v1");
        let c = CueTopicClassifier::new().classify(&v, &normalized("v1", "c1", "sarki harika"));
        assert_eq!(c.label, TopicLabel::Subject);
    }

    #[test]
    fn title_stop_words_with_diacritics_are_not_cues() {
        let words = salient_words("Çok Güzel Şarkı İçin");
        let mut words: Vec<_> = words.into_iter().collect();
        words.sort();
        assert_eq!(words, vec!["guzel", "sarki"]);

        let v = titled_video("v1", "Çok Güzel Şarkı İçin", "Lena Park");
        let c = CueTopicClassifier::new().classify(&v, &normalized("v1", "c1", "icin cok"));
        assert_eq!(c.label, TopicLabel::General);
    }

    #[test]
    fn no_cues_is_general() {
        let v = video("v1");
        let c = CueTopicClassifier::new().classify(&v, &normalized("v1", "c1", "first"));
        assert_eq!(c.label, TopicLabel::General);
        assert_eq!(c.confidence, 0.5);
    }
}
