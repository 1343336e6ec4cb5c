use serde::Serialize;

use crate::pipeline::VideoOutcome;

/// Cross-video roll-up of one run.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct RunStats {
    pub videos_analyzed: u32,
    pub videos_no_data: u32,
    pub videos_failed: u32,
    pub comments_fetched: u32,
    pub comments_duplicate: u32,
    pub comments_skipped: u32,
    pub comments_classified: u32,
    pub classification_failures: u32,
    pub fetch_warnings: u32,
}

impl RunStats {
    pub fn record(&mut self, outcome: &VideoOutcome) {
        match outcome {
            VideoOutcome::Analyzed(analysis) => {
                self.videos_analyzed += 1;
                self.comments_fetched += analysis.fetch.collected as u32;
                self.comments_duplicate += analysis.fetch.duplicates as u32;
                self.fetch_warnings += analysis.fetch.warnings.len() as u32;
                self.comments_skipped += analysis.skipped.len() as u32;
                self.comments_classified += analysis.comments.len() as u32;
                self.classification_failures += analysis.classification_failures.len() as u32;
            }
            VideoOutcome::NoData {
                fetched,
                skipped,
                warnings,
                ..
            } => {
                self.videos_no_data += 1;
                self.comments_fetched += *fetched as u32;
                self.comments_skipped += *skipped as u32;
                self.fetch_warnings += warnings.len() as u32;
            }
            VideoOutcome::Failed { .. } => self.videos_failed += 1,
        }
    }
}

impl std::fmt::Display for RunStats {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        writeln!(f, "\n=== Analysis Run Complete ===")?;
        writeln!(f, "Videos analyzed:      {}", self.videos_analyzed)?;
        writeln!(f, "Videos with no data:  {}", self.videos_no_data)?;
        writeln!(f, "Videos failed:        {}", self.videos_failed)?;
        writeln!(f, "Comments fetched:     {}", self.comments_fetched)?;
        writeln!(f, "Duplicates dropped:   {}", self.comments_duplicate)?;
        writeln!(f, "Comments skipped:     {}", self.comments_skipped)?;
        writeln!(f, "Comments classified:  {}", self.comments_classified)?;
        writeln!(f, "Classify failures:    {}", self.classification_failures)?;
        writeln!(f, "Fetch warnings:       {}", self.fetch_warnings)?;
        let fetched = self.comments_fetched.max(1);
        writeln!(
            f,
            "Yield:                {:.0}%",
            self.comments_classified as f64 / fetched as f64 * 100.0
        )?;
        Ok(())
    }
}
