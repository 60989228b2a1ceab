//! Frequency statistics over text runs: body size and per-role style votes.

use crate::fonts;
use crate::model::{Alignment, RawRun, StyleRule};

/// Font size statistics for body-region text.
#[derive(Debug, Clone, Default)]
pub struct FontStatistics {
    /// Body text font size (most common)
    pub body_size: f32,
    /// Font sizes larger than body (potential headings), largest first
    pub heading_sizes: Vec<f32>,
    /// Observed sizes (tenths of a point) with frequency, in first-seen order
    size_histogram: Vec<(i32, usize)>,
}

impl FontStatistics {
    /// Size used when nothing was observed.
    pub const FALLBACK_BODY_SIZE: f32 = 12.0;

    /// Add a font size observation. Sizes that are not positive are ignored.
    pub fn add_size(&mut self, size: f32) {
        if !is_usable_size(size) {
            return;
        }
        let key = size_key(size);
        match self.size_histogram.iter_mut().find(|(k, _)| *k == key) {
            Some((_, count)) => *count += 1,
            None => self.size_histogram.push((key, 1)),
        }
    }

    /// Number of observations.
    pub fn observations(&self) -> usize {
        self.size_histogram.iter().map(|(_, c)| c).sum()
    }

    /// Calculate body size and heading sizes. Ties go to the size seen first.
    pub fn analyze(&mut self) {
        let mut best: Option<(i32, usize)> = None;
        for &(key, count) in &self.size_histogram {
            if best.map_or(true, |(_, c)| count > c) {
                best = Some((key, count));
            }
        }
        self.body_size = match best {
            Some((key, _)) => key as f32 / 10.0,
            None => Self::FALLBACK_BODY_SIZE,
        };

        let mut larger: Vec<f32> = self
            .size_histogram
            .iter()
            .map(|(k, _)| *k as f32 / 10.0)
            .filter(|size| *size > self.body_size)
            .collect();
        larger.sort_by(|a, b| b.total_cmp(a));
        self.heading_sizes = larger;
    }

    /// Check if a size counts as body size.
    pub fn is_body_size(&self, size: f32) -> bool {
        (size - self.body_size).abs() < 0.5
    }
}

fn size_key(size: f32) -> i32 {
    (size * 10.0).round() as i32
}

/// Effective family, size, weight and style of a run.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
struct StyleKey {
    family: String,
    size: i32,
    bold: bool,
    italic: bool,
}

/// Font size of a run when it is a finite positive number.
pub fn run_size(run: &RawRun) -> Option<f32> {
    run.font_size.filter(|s| is_usable_size(*s))
}

/// A font size that can be laid out.
pub fn is_usable_size(size: f32) -> bool {
    size.is_finite() && size > 0.0
}

/// Paragraph spacing that can be laid out.
pub fn is_usable_spacing(points: f32) -> bool {
    points.is_finite() && points >= 0.0
}

/// Font family, weight and style of a run, with weight and style also
/// inferred from the font name.
pub fn run_family(run: &RawRun) -> Option<(String, bool, bool)> {
    let name = fonts::parse_font_name(run.font_name.as_deref()?);
    Some((name.family, run.bold || name.bold, run.italic || name.italic))
}

#[derive(Debug, Clone)]
struct Ballot {
    key: StyleKey,
    count: usize,
    color: Option<String>,
    alignment: Option<Alignment>,
    space_before: Vec<f32>,
    space_after: Vec<f32>,
}

/// Majority vote over the style tuples of the runs of one role.
#[derive(Debug, Clone, Default)]
pub struct StyleVotes {
    ballots: Vec<Ballot>,
}

impl StyleVotes {
    /// Count a run. Runs without font or usable size carry no style and are
    /// ignored.
    pub fn add(&mut self, run: &RawRun) {
        let (Some((family, bold, italic)), Some(size)) = (run_family(run), run_size(run)) else {
            return;
        };
        let key = StyleKey {
            family,
            size: size_key(size),
            bold,
            italic,
        };
        let index = match self.ballots.iter().position(|b| b.key == key) {
            Some(index) => index,
            None => {
                self.ballots.push(Ballot {
                    key,
                    count: 0,
                    color: run.color.clone(),
                    alignment: run.alignment,
                    space_before: Vec::new(),
                    space_after: Vec::new(),
                });
                self.ballots.len() - 1
            }
        };
        let ballot = &mut self.ballots[index];
        ballot.count += 1;
        ballot.space_before.extend(run.space_before.filter(|v| is_usable_spacing(*v)));
        ballot.space_after.extend(run.space_after.filter(|v| is_usable_spacing(*v)));
    }

    /// Number of runs counted.
    pub fn total(&self) -> usize {
        self.ballots.iter().map(|b| b.count).sum()
    }

    /// The rule of the most frequent tuple; ties go to the tuple seen first.
    /// Color and alignment come from its first run, spacing is the median.
    pub fn winner(&self) -> Option<StyleRule> {
        let mut best: Option<&Ballot> = None;
        for ballot in &self.ballots {
            if best.map_or(true, |b| ballot.count > b.count) {
                best = Some(ballot);
            }
        }
        let ballot = best?;

        let mut rule = StyleRule::new(ballot.key.family.clone(), ballot.key.size as f32 / 10.0)
            .bold(ballot.key.bold)
            .italic(ballot.key.italic)
            .with_alignment(ballot.alignment.unwrap_or_default())
            .with_spacing(median(&ballot.space_before), median(&ballot.space_after));
        rule.color = ballot.color.clone();
        Some(rule)
    }
}

fn median(values: &[f32]) -> f32 {
    if values.is_empty() {
        return 0.0;
    }
    let mut sorted = values.to_vec();
    sorted.sort_by(|a, b| a.total_cmp(b));
    sorted[sorted.len() / 2]
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_body_size_is_most_frequent() {
        let mut stats = FontStatistics::default();
        for size in [24.0, 12.0, 12.0, 12.0, 18.0] {
            stats.add_size(size);
        }
        stats.analyze();
        assert_eq!(stats.body_size, 12.0);
        assert_eq!(stats.heading_sizes, vec![24.0, 18.0]);
        assert_eq!(stats.observations(), 5);
    }

    #[test]
    fn test_body_size_tie_goes_to_first_seen() {
        let mut stats = FontStatistics::default();
        for size in [10.0, 11.0, 11.0, 10.0] {
            stats.add_size(size);
        }
        stats.analyze();
        assert_eq!(stats.body_size, 10.0);
    }

    #[test]
    fn test_empty_statistics() {
        let mut stats = FontStatistics::default();
        stats.analyze();
        assert_eq!(stats.body_size, FontStatistics::FALLBACK_BODY_SIZE);
    }

    #[test]
    fn test_vote_majority_and_tie() {
        let mut votes = StyleVotes::default();
        votes.add(&RawRun::new("a", "Arial", 11.0));
        votes.add(&RawRun::new("b", "Times-Roman", 12.0));
        votes.add(&RawRun::new("c", "Times-Roman", 12.0));
        votes.add(&RawRun::new("d", "Arial", 11.0));
        let rule = votes.winner().unwrap();
        assert_eq!(rule.font_family, "Arial");
        assert_eq!(rule.size, 11.0);
        assert_eq!(votes.total(), 4);
    }

    #[test]
    fn test_vote_weight_from_font_name() {
        let mut votes = StyleVotes::default();
        votes.add(&RawRun::new("Title", "ABCDEF+Helvetica-Bold", 24.0));
        let rule = votes.winner().unwrap();
        assert_eq!(rule.font_family, "Helvetica");
        assert!(rule.bold);
    }

    #[test]
    fn test_spacing_median() {
        let mut votes = StyleVotes::default();
        for before in [2.0, 10.0, 4.0] {
            let mut run = RawRun::new("x", "Arial", 11.0);
            run.space_before = Some(before);
            votes.add(&run);
        }
        let rule = votes.winner().unwrap();
        assert_eq!(rule.space_before, 4.0);
        assert_eq!(rule.space_after, 0.0);
    }

    #[test]
    fn test_unusable_sizes_and_spacing_ignored() {
        let mut stats = FontStatistics::default();
        for size in [0.0, -2.0, f32::NAN, f32::INFINITY, 11.0] {
            stats.add_size(size);
        }
        stats.analyze();
        assert_eq!(stats.observations(), 1);
        assert_eq!(stats.body_size, 11.0);

        let mut votes = StyleVotes::default();
        for size in [0.0, 0.0, f32::NAN, -4.0] {
            votes.add(&RawRun::new("bad", "Arial", size));
        }
        assert!(votes.winner().is_none());

        let mut run = RawRun::new("ok", "Arial", 10.0);
        run.space_before = Some(f32::NAN);
        run.space_after = Some(-3.0);
        votes.add(&run);
        let rule = votes.winner().unwrap();
        assert_eq!(rule.size, 10.0);
        assert_eq!(rule.space_before, 0.0);
        assert_eq!(rule.space_after, 0.0);
    }
}
