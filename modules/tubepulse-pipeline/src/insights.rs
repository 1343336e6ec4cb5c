//! Audience insights: which comments ask, request, suggest, complain or praise.
//!
//! Pattern based. A comment may land in several categories; its confidence in
//! a category is the share of that category's patterns it matches, saturating
//! at three.

use std::sync::LazyLock;

use regex::Regex;
use serde::{Deserialize, Serialize};

use ai_client::truncate_chars;
use tubepulse_common::ClassifiedComment;

/// Insights kept per category.
pub const TOP_INSIGHTS: usize = 20;
/// Characters kept from each insight's comment.
pub const INSIGHT_CHARS: usize = 200;
/// Shorter comments are never insights.
const MIN_CHARS: usize = 5;
/// Matches at which confidence reaches 1.0.
const SATURATION: f64 = 3.0;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum InsightKind {
    Question,
    Request,
    Suggestion,
    Complaint,
    Praise,
}

impl InsightKind {
    pub const ALL: [InsightKind; 5] = [
        InsightKind::Question,
        InsightKind::Request,
        InsightKind::Suggestion,
        InsightKind::Complaint,
        InsightKind::Praise,
    ];

    fn patterns(self) -> &'static [Regex] {
        match self {
            InsightKind::Question => &QUESTION,
            InsightKind::Request => &REQUEST,
            InsightKind::Suggestion => &SUGGESTION,
            InsightKind::Complaint => &COMPLAINT,
            InsightKind::Praise => &PRAISE,
        }
    }
}

impl std::fmt::Display for InsightKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            InsightKind::Question => "questions",
            InsightKind::Request => "requests",
            InsightKind::Suggestion => "suggestions",
            InsightKind::Complaint => "complaints",
            InsightKind::Praise => "praise",
        };
        f.write_str(name)
    }
}

// ---------------------------------------------------------------------------
// Patterns (English and Turkish)
// ---------------------------------------------------------------------------

fn compile(patterns: &[&str]) -> Vec<Regex> {
    patterns
        .iter()
        .map(|p| Regex::new(&format!("(?i){p}")).expect("valid regex"))
        .collect()
}

static QUESTION: LazyLock<Vec<Regex>> = LazyLock::new(|| {
    compile(&[
        r".+\?$",
        r"^(how|what|when|why|where|who|which)\s+.+",
        r"^(can|could|will|would|is|are|do|does|did)\s+.+\?",
        r"nasıl\s+.+",
        r"ne\s+zaman\s+.+",
        r"neden\s+.+",
        r"niye\s+.+",
        r"kim\s+.+",
        r"hangi\s+.+",
        r"kaç\s+.+",
        r"ne\s+kadar\s+.+",
        r"nerede\s+.+",
        r".+\s+m[ıiuü]\b\??",
    ])
});

static REQUEST: LazyLock<Vec<Regex>> = LazyLock::new(|| {
    compile(&[
        r"\bplease\s+.+",
        r"\b(can|could|would)\s+you\s+(please\s+)?(make|do|play|cover|upload|share|react|post)\b",
        r"\bpart\s*(2|two|ii)\b",
        r"\bwe\s+(need|want)\s+.+",
        r"\bi\s+(want|hope)\s+(you|to\s+see)\b",
        r"\bmore\s+(videos|content|of\s+this)\b",
        r"lütfen\s+.+",
        r"rica\s+.+",
        r".+\s+yapar\s*mısınız",
        r".+\s+yapar\s*mısın",
        r".+\s+yapabilir\s*misiniz",
        r".+\s+yapabilir\s*misin",
        r".+\s+ister\s*misiniz",
        r".+\s+ister\s*misin",
        r".+\s+bekl[ie]yoru[mz]",
        r".+\s+istiyoru[mz]",
        r"devamını\s+.+",
        r".+\s+çek\s*(in|siniz)\b",
        r".+\s+yap\s*(ın|sanız)\b",
        r".+\s+paylaş\s*(ın|sanız)\b",
        r".+\s+at\s*(ın|sanız)\b",
        r"daha\s+fazla\s+.+",
    ])
});

static SUGGESTION: LazyLock<Vec<Regex>> = LazyLock::new(|| {
    compile(&[
        r"\byou\s+should\b",
        r"\bit\s+would\s+be\s+(nice|better|great|cool)\b",
        r"\bi\s+(suggest|recommend)\b",
        r"\bmaybe\s+(try|add|do|make)\b",
        r"\bnext\s+time\b",
        r".+\s+olsa\s+güzel\s+olur",
        r".+\s+olabilir",
        r".+\s+olmalı",
        r".+\s+yapılmalı",
        r".+\s+daha\s+iyi\s+olur",
        r".+\s+tavsiye\s+ederim",
        r".+\s+öneririm",
        r"keşke\s+.+",
        r"bence\s+.+",
        r".+\s+düşünüyorum",
    ])
});

static COMPLAINT: LazyLock<Vec<Regex>> = LazyLock::new(|| {
    compile(&[
        r"\b(terrible|awful|horrible|worst)\b",
        r"\b(boring|cringe|clickbait)\b",
        r"\bwaste\s+of\s+time\b",
        r"\bdisappoint(ed|ing)\b",
        r"\bnot\s+(good|worth)\b",
        r".+\s+berbat",
        r".+\s+kötü",
        r".+\s+rezalet",
        r".+\s+beğenmedim",
        r".+\s+hayal\s+kırıklığı",
        r".+\s+beklentimi\s+karşılamadı",
        r".+\s+vakit\s+kaybı",
        r".+\s+saçma",
        r".+\s+anlamsız",
        r"hiç\s+.+\s+değil",
        r".+\s+sıkıcı",
        r".+\s+eksik",
    ])
});

static PRAISE: LazyLock<Vec<Regex>> = LazyLock::new(|| {
    compile(&[
        r"\b(amazing|awesome|brilliant|beautiful|masterpiece|perfect|legendary)\b",
        r"\blove\s+(this|it|you|your)\b",
        r"\bwell\s+done\b",
        r"\bgreat\s+(job|work|video|song)\b",
        r"\b10\s*/\s*10\b",
        r".+\s+harika",
        r".+\s+muhteşem",
        r".+\s+mükemmel",
        r".+\s+süper",
        r".+\s+efsane",
        r".+\s+çok\s+güzel",
        r".+\s+çok\s+iyi",
        r".+\s+bayıldım",
        r".+\s+aşık\s+oldum",
        r".+\s+beğendim",
        r".+\s+tebrikler",
        r".+\s+bravo",
        r".+\s+helal\s+olsun",
        r"10\s*numara",
        r"5\s*yıldız",
    ])
});

/// Categories `text` falls into, most confident first.
pub fn classify_text(text: &str) -> Vec<(InsightKind, f64)> {
    let text = text.trim();
    if text.chars().count() < MIN_CHARS {
        return Vec::new();
    }
    let mut found: Vec<(InsightKind, f64)> = InsightKind::ALL
        .iter()
        .filter_map(|kind| {
            let matches = kind.patterns().iter().filter(|p| p.is_match(text)).count();
            (matches > 0).then(|| (*kind, (matches as f64 / SATURATION).min(1.0)))
        })
        .collect();
    found.sort_by(|a, b| b.1.total_cmp(&a.1));
    found
}

// ---------------------------------------------------------------------------
// Per-video insights
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Insight {
    pub comment_id: String,
    pub text: String,
    pub confidence: f64,
    pub like_count: u64,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CategoryInsights {
    /// Every matching comment, not just those in `top`.
    pub count: usize,
    /// `count` over the video's analysed comments.
    pub ratio: f64,
    /// Most confident first, then most liked.
    pub top: Vec<Insight>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AudienceInsights {
    pub total_comments: usize,
    pub questions: CategoryInsights,
    pub requests: CategoryInsights,
    pub suggestions: CategoryInsights,
    pub complaints: CategoryInsights,
    pub praise: CategoryInsights,
}

impl AudienceInsights {
    pub fn category(&self, kind: InsightKind) -> &CategoryInsights {
        match kind {
            InsightKind::Question => &self.questions,
            InsightKind::Request => &self.requests,
            InsightKind::Suggestion => &self.suggestions,
            InsightKind::Complaint => &self.complaints,
            InsightKind::Praise => &self.praise,
        }
    }

    fn category_mut(&mut self, kind: InsightKind) -> &mut CategoryInsights {
        match kind {
            InsightKind::Question => &mut self.questions,
            InsightKind::Request => &mut self.requests,
            InsightKind::Suggestion => &mut self.suggestions,
            InsightKind::Complaint => &mut self.complaints,
            InsightKind::Praise => &mut self.praise,
        }
    }
}

/// Scan the cleaned text of every comment. Input order does not affect the result.
pub fn extract(comments: &[ClassifiedComment], top_n: usize) -> AudienceInsights {
    let mut insights = AudienceInsights {
        total_comments: comments.len(),
        ..Default::default()
    };

    for comment in comments {
        let text = comment.comment.cleaned_text.trim();
        for (kind, confidence) in classify_text(text) {
            insights.category_mut(kind).top.push(Insight {
                comment_id: comment.comment_id().to_string(),
                text: truncate_chars(text, INSIGHT_CHARS).to_string(),
                confidence,
                like_count: comment.comment.raw.like_count,
            });
        }
    }

    let total = comments.len();
    for kind in InsightKind::ALL {
        let category = insights.category_mut(kind);
        category.count = category.top.len();
        category.ratio = if total == 0 {
            0.0
        } else {
            category.count as f64 / total as f64
        };
        category.top.sort_by(|a, b| {
            b.confidence
                .total_cmp(&a.confidence)
                .then_with(|| b.like_count.cmp(&a.like_count))
                .then_with(|| a.comment_id.cmp(&b.comment_id))
        });
        category.top.truncate(top_n);
    }
    insights
}
