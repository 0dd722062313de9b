//! Fuzzy text scoring.
//!
//! A candidate's score is the strongest of three signals: edit-distance
//! similarity, literal substring containment, and the fraction of significant
//! query tokens present in the candidate. Signals are combined with `max`,
//! never blended.

use crate::lines::LineBox;
use crate::ocr::WordBox;
use crate::Region;

/// Query tokens shorter than this are ignored for token overlap.
pub const MIN_TOKEN_LEN: usize = 3;
/// Floor applied when the query is a literal substring of the candidate.
pub const SUBSTRING_SCORE: f32 = 0.90;

/// A word or a reconstructed line, both matchable.
#[derive(Debug, Clone, PartialEq)]
pub enum Candidate {
    Word(WordBox),
    Line(LineBox),
}

impl Candidate {
    /// Words first, then lines.
    pub fn gather(words: Vec<WordBox>, lines: Vec<LineBox>) -> Vec<Candidate> {
        words
            .into_iter()
            .map(Candidate::Word)
            .chain(lines.into_iter().map(Candidate::Line))
            .collect()
    }

    pub fn text(&self) -> &str {
        match self {
            Candidate::Word(w) => &w.text,
            Candidate::Line(l) => &l.text,
        }
    }

    /// `(left, top, width, height)` in frame-local pixels.
    pub fn bounds(&self) -> (i32, i32, i32, i32) {
        match self {
            Candidate::Word(w) => (w.left, w.top, w.width, w.height),
            Candidate::Line(l) => (l.left, l.top, l.width, l.height),
        }
    }

    pub fn area(&self) -> i64 {
        let (_, _, w, h) = self.bounds();
        w.max(0) as i64 * h.max(0) as i64
    }
}

/// Result of a successful lookup, in absolute screen coordinates.
#[derive(Debug, Clone, PartialEq)]
pub struct MatchResult {
    pub x: i32,
    pub y: i32,
    pub text: String,
    pub score: f32,
}

/// Everything computed for one query; `scores[i]` belongs to `candidates[i]`.
#[derive(Debug, Clone, Default)]
pub struct Evaluation {
    pub scores: Vec<f32>,
    /// Highest scoring candidate, whether or not it cleared the threshold.
    pub best: Option<usize>,
    pub threshold: f32,
    pub result: Option<MatchResult>,
}

impl Evaluation {
    /// Indices and scores of the `n` best candidates, highest first.
    pub fn top(&self, n: usize) -> Vec<(usize, f32)> {
        let mut ranked = self.scores.iter().copied().enumerate().collect::<Vec<_>>();
        ranked.sort_by(|a, b| b.1.total_cmp(&a.1));
        ranked.truncate(n);
        ranked
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FuzzyMatcher {
    /// Caller thresholds are clamped to at most this value.
    pub threshold_ceiling: f32,
    /// Candidates wider than this fraction of the frame are penalized.
    pub long_line_ratio: f32,
    pub long_line_penalty: f32,
}

impl Default for FuzzyMatcher {
    fn default() -> Self {
        Self {
            threshold_ceiling: 0.65,
            long_line_ratio: 0.8,
            long_line_penalty: 0.9,
        }
    }
}

impl FuzzyMatcher {
    /// Threshold actually applied for a caller-supplied one.
    #[inline]
    pub fn effective_threshold(&self, threshold: f32) -> f32 {
        threshold.min(self.threshold_ceiling)
    }

    /// Score of `candidate` for a lowercased, trimmed query.
    pub fn score(&self, candidate: &Candidate, query: &str, frame_width: u32) -> f32 {
        let tokens = query_tokens(query);
        self.score_with(candidate, query, &tokens, frame_width)
    }

    fn score_with(&self, candidate: &Candidate, query: &str, tokens: &[&str], frame_width: u32) -> f32 {
        let mut score = text_score(&candidate.text().trim().to_lowercase(), query, tokens);

        let (_, _, width, _) = candidate.bounds();
        if frame_width > 0 && width as f32 > self.long_line_ratio * frame_width as f32 {
            score *= self.long_line_penalty;
        }
        score
    }

    pub fn best_match(&self, candidates: &[Candidate], query: &str, threshold: f32, region: Region) -> Option<MatchResult> {
        self.evaluate(candidates, query, threshold, region).result
    }

    /// Score every candidate and resolve the winner to a screen point.
    ///
    /// Ties go to the smaller bounding area, then to the earlier candidate.
    pub fn evaluate(&self, candidates: &[Candidate], query: &str, threshold: f32, region: Region) -> Evaluation {
        let q = query.trim().to_lowercase();
        let threshold = self.effective_threshold(threshold);
        if q.is_empty() {
            return Evaluation {
                scores: vec![0.0; candidates.len()],
                threshold,
                ..Default::default()
            };
        }
        let tokens = query_tokens(&q);

        let scores = candidates
            .iter()
            .map(|c| self.score_with(c, &q, &tokens, region.width))
            .collect::<Vec<_>>();

        let mut best: Option<usize> = None;
        for (i, &score) in scores.iter().enumerate() {
            let better = match best {
                None => score > 0.0,
                Some(b) => score > scores[b] || (score == scores[b] && candidates[i].area() < candidates[b].area()),
            };
            if better {
                best = Some(i);
            }
        }

        let result = best.filter(|&b| scores[b] >= threshold).map(|b| {
            let candidate = &candidates[b];
            let (x, y) = click_point(candidate, &tokens);
            let (x, y) = region.to_absolute(x, y);
            MatchResult {
                x,
                y,
                text: candidate.text().to_owned(),
                score: scores[b],
            }
        });

        Evaluation {
            scores,
            best,
            threshold,
            result,
        }
    }
}

/// Tokens of a lowercased query long enough to count for overlap.
pub fn query_tokens(query: &str) -> Vec<&str> {
    query
        .split_whitespace()
        .filter(|t| t.chars().count() >= MIN_TOKEN_LEN)
        .collect()
}

/// Edit-distance similarity in `[0, 1]`.
pub fn similarity(a: &str, b: &str) -> f32 {
    let len = a.chars().count().max(b.chars().count());
    if len == 0 {
        return 1.0;
    }
    1.0 - levenshtein::levenshtein(a, b) as f32 / len as f32
}

fn text_score(text: &str, query: &str, tokens: &[&str]) -> f32 {
    let mut score = similarity(text, query);
    if text.contains(query) {
        score = score.max(SUBSTRING_SCORE);
    }
    if !tokens.is_empty() {
        let hits = tokens.iter().filter(|t| text.contains(*t)).count();
        score = score.max(hits as f32 / tokens.len() as f32);
    }
    score
}

/// Center of the candidate, narrowed to the matching words of a line.
fn click_point(candidate: &Candidate, tokens: &[&str]) -> (i32, i32) {
    let (left, top, width, height) = candidate.bounds();
    let center = (left + width / 2, top + height / 2);

    let Candidate::Line(line) = candidate else {
        return center;
    };
    if tokens.is_empty() {
        return center;
    }

    let mut span: Option<(i32, i32, i32, i32)> = None;
    for w in &line.words {
        let text = w.text.to_lowercase();
        if !tokens.iter().any(|t| text.contains(*t)) {
            continue;
        }
        span = Some(match span {
            None => (w.left, w.top, w.right(), w.bottom()),
            Some((l, t, r, b)) => (l.min(w.left), t.min(w.top), r.max(w.right()), b.max(w.bottom())),
        });
    }

    match span {
        Some((l, t, r, b)) => ((l + r) / 2, (t + b) / 2),
        None => center,
    }
}
