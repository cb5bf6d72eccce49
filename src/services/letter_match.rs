//! Scores OCR detections against the letter(s) a child was asked to write.
//!
//! Two modes exist. `easy` expects one letter and accepts it when the
//! strongest detection is that letter with strong confidence, or when the
//! letter dominates all detections. `hard` expects an ordered pair: both
//! letters must be present, must appear in order in the confident detection
//! sequence, and must either both be strongly detected or together dominate.

use std::collections::BTreeMap;

use serde::Serialize;
use thiserror::Error;

use crate::core::config::ScoringSettings;

pub(crate) const NOTHING_DETECTED_REASON: &str = "No letters detected by OCR.";

#[derive(Debug, Clone, Copy, PartialEq)]
pub(crate) struct DetectedSymbol {
    pub(crate) character: char,
    pub(crate) confidence: f64,
}

impl DetectedSymbol {
    pub(crate) fn new(character: char, confidence: f64) -> Self {
        Self { character, confidence }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum LetterCase {
    Capital,
    Small,
}

impl LetterCase {
    pub(crate) fn parse(value: &str) -> Result<Self, AnswerError> {
        match value {
            "capital" => Ok(Self::Capital),
            "small" => Ok(Self::Small),
            _ => Err(AnswerError::InvalidCase),
        }
    }

    pub(crate) fn as_str(self) -> &'static str {
        match self {
            Self::Capital => "capital",
            Self::Small => "small",
        }
    }

    fn apply(self, letter: char) -> char {
        match self {
            Self::Capital => letter.to_ascii_uppercase(),
            Self::Small => letter.to_ascii_lowercase(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Level {
    Easy,
    Hard,
}

impl Level {
    pub(crate) fn parse(value: &str) -> Result<Self, AnswerError> {
        match value {
            "easy" => Ok(Self::Easy),
            "hard" => Ok(Self::Hard),
            _ => Err(AnswerError::InvalidLevel),
        }
    }

    pub(crate) fn as_str(self) -> &'static str {
        match self {
            Self::Easy => "easy",
            Self::Hard => "hard",
        }
    }
}

#[derive(Debug, Error, PartialEq, Eq)]
pub(crate) enum AnswerError {
    #[error("expected_letter is required")]
    Missing,
    #[error("is_capital must be 'capital' or 'small'")]
    InvalidCase,
    #[error("level must be 'easy' or 'hard'")]
    InvalidLevel,
    #[error("expected_letter must be letters only")]
    NotLetters,
    #[error("For 'easy', expected_letter must be exactly 1 letter")]
    EasyLength,
    #[error("For 'hard', expected_letter must be exactly 2 letters, e.g. 'ab'")]
    HardLength,
}

/// One or two ASCII letters, already normalised to the requested case.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct ExpectedAnswer {
    letters: Vec<char>,
    case: LetterCase,
    level: Level,
}

impl ExpectedAnswer {
    pub(crate) fn parse(raw: &str, case: LetterCase, level: Level) -> Result<Self, AnswerError> {
        let trimmed = raw.trim();
        if trimmed.is_empty() {
            return Err(AnswerError::Missing);
        }
        if !trimmed.chars().all(|letter| letter.is_ascii_alphabetic()) {
            return Err(AnswerError::NotLetters);
        }

        let letters: Vec<char> = trimmed.chars().map(|letter| case.apply(letter)).collect();
        match (level, letters.len()) {
            (Level::Easy, 1) | (Level::Hard, 2) => Ok(Self { letters, case, level }),
            (Level::Easy, _) => Err(AnswerError::EasyLength),
            (Level::Hard, _) => Err(AnswerError::HardLength),
        }
    }

    pub(crate) fn as_string(&self) -> String {
        self.letters.iter().collect()
    }

    pub(crate) fn mode(&self) -> String {
        format!("{}-{}", self.case.as_str(), self.level.as_str())
    }
}

#[derive(Debug, Clone, Copy)]
pub(crate) struct Thresholds {
    pub(crate) strong_confidence: f64,
    pub(crate) dominance_ratio: f64,
    /// Detections below this confidence are left out of the ordered sequence.
    pub(crate) min_symbol_confidence: f64,
}

impl Default for Thresholds {
    fn default() -> Self {
        Self { strong_confidence: 0.70, dominance_ratio: 0.60, min_symbol_confidence: 0.30 }
    }
}

impl From<&ScoringSettings> for Thresholds {
    fn from(settings: &ScoringSettings) -> Self {
        Self {
            strong_confidence: settings.strong_confidence,
            dominance_ratio: settings.dominance_ratio,
            min_symbol_confidence: settings.min_symbol_confidence,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub(crate) struct DetectedLetter {
    pub(crate) letter: String,
    pub(crate) confidence: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub(crate) struct Mismatch {
    pub(crate) letter: String,
    pub(crate) count: usize,
    pub(crate) top_confidence: f64,
}

#[derive(Debug, Clone, Serialize)]
pub(crate) struct MatchResult {
    pub(crate) mode: String,
    pub(crate) expected_letter: String,
    pub(crate) is_correct: bool,
    pub(crate) reason: String,
    pub(crate) detected_count: usize,
    pub(crate) match_count: usize,
    pub(crate) top_match_confidence: f64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub(crate) top_match_confidence_per_letter: Option<BTreeMap<String, f64>>,
    pub(crate) match_ratio: f64,
    pub(crate) sequence: String,
    pub(crate) sequence_match: bool,
    pub(crate) letters: Vec<DetectedLetter>,
    pub(crate) mismatches: Vec<Mismatch>,
}

#[derive(Debug, Clone, Copy)]
struct LetterStats {
    letter: char,
    count: usize,
    top_confidence: f64,
}

struct Detections {
    letters: Vec<(char, f64)>,
    stats: Vec<LetterStats>,
    sequence: String,
}

impl Detections {
    fn collect(detected: &[DetectedSymbol], case: LetterCase, min_symbol_confidence: f64) -> Self {
        let mut letters = Vec::with_capacity(detected.len());
        let mut stats: Vec<LetterStats> = Vec::new();
        let mut sequence = String::new();

        for symbol in detected {
            if !symbol.character.is_ascii_alphabetic() {
                continue;
            }
            let letter = case.apply(symbol.character);
            let raw = symbol.confidence.clamp(0.0, 1.0);
            // Stats and thresholds see the reported (rounded) value; the
            // sequence filter sees the raw one.
            let confidence = round3(raw);
            letters.push((letter, confidence));

            if raw >= min_symbol_confidence {
                sequence.push(letter);
            }

            match stats.iter_mut().find(|entry| entry.letter == letter) {
                Some(entry) => {
                    entry.count += 1;
                    entry.top_confidence = entry.top_confidence.max(confidence);
                }
                None => stats.push(LetterStats { letter, count: 1, top_confidence: confidence }),
            }
        }

        Self { letters, stats, sequence }
    }

    fn total(&self) -> usize {
        self.letters.len()
    }

    fn count(&self, letter: char) -> usize {
        self.stats.iter().find(|entry| entry.letter == letter).map_or(0, |entry| entry.count)
    }

    fn top_confidence(&self, letter: char) -> f64 {
        self.stats
            .iter()
            .find(|entry| entry.letter == letter)
            .map_or(0.0, |entry| entry.top_confidence)
    }

    /// Letter with the highest single confidence; the earliest wins ties.
    fn primary(&self) -> Option<LetterStats> {
        self.stats.iter().copied().fold(None, |best, entry| match best {
            Some(current) if current.top_confidence >= entry.top_confidence => Some(current),
            _ => Some(entry),
        })
    }

    fn mismatches(&self, expected: &[char]) -> Vec<Mismatch> {
        let mut mismatches: Vec<Mismatch> = self
            .stats
            .iter()
            .filter(|entry| !expected.contains(&entry.letter))
            .map(|entry| Mismatch {
                letter: entry.letter.to_string(),
                count: entry.count,
                top_confidence: entry.top_confidence,
            })
            .collect();

        let mut missing: Vec<char> = Vec::new();
        for letter in expected {
            if self.count(*letter) == 0 && !missing.contains(letter) {
                missing.push(*letter);
            }
        }
        mismatches.extend(missing.into_iter().map(|letter| Mismatch {
            letter: letter.to_string(),
            count: 1,
            top_confidence: 0.0,
        }));

        mismatches.sort_by(|left, right| {
            right
                .count
                .cmp(&left.count)
                .then_with(|| right.top_confidence.total_cmp(&left.top_confidence))
        });
        mismatches
    }

    fn detected_letters(&self) -> Vec<DetectedLetter> {
        self.letters
            .iter()
            .map(|(letter, confidence)| DetectedLetter {
                letter: letter.to_string(),
                confidence: *confidence,
            })
            .collect()
    }
}

pub(crate) fn score(
    detected: &[DetectedSymbol],
    expected: &ExpectedAnswer,
    thresholds: &Thresholds,
) -> MatchResult {
    let detections = Detections::collect(detected, expected.case, thresholds.min_symbol_confidence);

    if detections.total() == 0 {
        return MatchResult {
            mode: expected.mode(),
            expected_letter: expected.as_string(),
            is_correct: false,
            reason: NOTHING_DETECTED_REASON.to_string(),
            detected_count: 0,
            match_count: 0,
            top_match_confidence: 0.0,
            top_match_confidence_per_letter: None,
            match_ratio: 0.0,
            sequence: detections.sequence,
            sequence_match: false,
            letters: Vec::new(),
            mismatches: Vec::new(),
        };
    }

    match expected.level {
        Level::Easy => score_single(&detections, expected, thresholds),
        Level::Hard => score_pair(&detections, expected, thresholds),
    }
}

fn score_single(
    detections: &Detections,
    expected: &ExpectedAnswer,
    thresholds: &Thresholds,
) -> MatchResult {
    let letter = expected.letters[0];
    let matches = detections.count(letter);
    let ratio = matches as f64 / detections.total() as f64;
    let top = detections.top_confidence(letter);

    let primary = detections.primary();
    let primary_is_expected = primary.is_some_and(|entry| entry.letter == letter);
    let primary_confidence = primary.map_or(0.0, |entry| entry.top_confidence);

    let strong_primary = primary_is_expected && primary_confidence >= thresholds.strong_confidence;
    let dominant = matches >= 1 && ratio >= thresholds.dominance_ratio;

    let reason = if strong_primary {
        "Primary letter matches expected with strong confidence.".to_string()
    } else if dominant {
        "Expected letter dominates detections.".to_string()
    } else if matches == 0 {
        "No matching letter detected.".to_string()
    } else if primary_is_expected {
        format!("Low confidence on primary ({primary_confidence:.2}).")
    } else {
        "Expected letter not primary.".to_string()
    };

    MatchResult {
        mode: expected.mode(),
        expected_letter: expected.as_string(),
        is_correct: strong_primary || dominant,
        reason,
        detected_count: detections.total(),
        match_count: matches,
        top_match_confidence: top,
        top_match_confidence_per_letter: None,
        match_ratio: round3(ratio),
        sequence: detections.sequence.clone(),
        sequence_match: detections.sequence.contains(letter),
        letters: detections.detected_letters(),
        mismatches: detections.mismatches(&expected.letters),
    }
}

fn score_pair(
    detections: &Detections,
    expected: &ExpectedAnswer,
    thresholds: &Thresholds,
) -> MatchResult {
    let (first, second) = (expected.letters[0], expected.letters[1]);
    let pair = expected.as_string();

    // A doubled letter ("ss") needs two detections, not one counted twice.
    let (match_count, both_present) = if first == second {
        let count = detections.count(first);
        (count, count >= 2)
    } else {
        let (first_count, second_count) = (detections.count(first), detections.count(second));
        (first_count + second_count, first_count >= 1 && second_count >= 1)
    };

    let first_top = detections.top_confidence(first);
    let second_top = detections.top_confidence(second);
    let ratio = match_count as f64 / detections.total() as f64;

    let sequence_ok = detections.sequence.contains(pair.as_str());
    let confidence_ok = first_top.min(second_top) >= thresholds.strong_confidence;
    let ratio_ok = ratio >= thresholds.dominance_ratio;

    let reason = if !both_present {
        "Both letters must be present at least once.".to_string()
    } else if !sequence_ok {
        format!("Letters not detected in the required order '{pair}'.")
    } else if confidence_ok {
        "Both letters detected with strong confidence.".to_string()
    } else if ratio_ok {
        "Expected pair dominates the detections.".to_string()
    } else {
        "Low confidence and low ratio for the expected pair.".to_string()
    };

    let mut per_letter = BTreeMap::new();
    per_letter.insert(first.to_string(), first_top);
    per_letter.insert(second.to_string(), second_top);

    MatchResult {
        mode: expected.mode(),
        expected_letter: pair,
        is_correct: both_present && sequence_ok && (confidence_ok || ratio_ok),
        reason,
        detected_count: detections.total(),
        match_count,
        top_match_confidence: first_top.min(second_top),
        top_match_confidence_per_letter: Some(per_letter),
        match_ratio: round3(ratio),
        sequence: detections.sequence.clone(),
        sequence_match: sequence_ok,
        letters: detections.detected_letters(),
        mismatches: detections.mismatches(&expected.letters),
    }
}

fn round3(value: f64) -> f64 {
    (value * 1000.0).round() / 1000.0
}

#[cfg(test)]
mod tests {
    use super::*;

    fn symbols(items: &[(char, f64)]) -> Vec<DetectedSymbol> {
        items.iter().map(|(letter, confidence)| DetectedSymbol::new(*letter, *confidence)).collect()
    }

    fn easy(letter: &str, case: LetterCase) -> ExpectedAnswer {
        ExpectedAnswer::parse(letter, case, Level::Easy).expect("easy answer")
    }

    fn hard(letters: &str, case: LetterCase) -> ExpectedAnswer {
        ExpectedAnswer::parse(letters, case, Level::Hard).expect("hard answer")
    }

    #[test]
    fn nothing_detected_is_incorrect_for_every_mode() {
        let thresholds = Thresholds::default();
        for expected in [easy("a", LetterCase::Small), hard("AB", LetterCase::Capital)] {
            let result = score(&[], &expected, &thresholds);
            assert!(!result.is_correct);
            assert_eq!(result.reason, NOTHING_DETECTED_REASON);
            assert_eq!(result.detected_count, 0);
            assert!(result.mismatches.is_empty());
        }
    }

    #[test]
    fn non_letters_are_ignored() {
        let detected = symbols(&[('7', 0.99), ('!', 0.9)]);
        let result = score(&detected, &easy("A", LetterCase::Capital), &Thresholds::default());
        assert_eq!(result.reason, NOTHING_DETECTED_REASON);
    }

    #[test]
    fn single_clean_match() {
        let result =
            score(&symbols(&[('A', 0.91)]), &easy("A", LetterCase::Capital), &Thresholds::default());

        assert!(result.is_correct);
        assert_eq!(result.mode, "capital-easy");
        assert_eq!(result.match_count, 1);
        assert_eq!(result.top_match_confidence, 0.91);
        assert_eq!(result.match_ratio, 1.0);
        assert!(result.mismatches.is_empty());
        assert_eq!(result.reason, "Primary letter matches expected with strong confidence.");
    }

    #[test]
    fn strong_primary_wins_over_noise() {
        let detected = symbols(&[('b', 0.4), ('a', 0.85), ('c', 0.5), ('d', 0.6), ('e', 0.3)]);
        let result = score(&detected, &easy("a", LetterCase::Small), &Thresholds::default());

        assert!(result.is_correct);
        assert_eq!(result.match_ratio, 0.2);
        assert_eq!(result.mismatches.len(), 4);
    }

    #[test]
    fn weak_and_outnumbered_is_incorrect() {
        let detected = symbols(&[('A', 0.50), ('C', 0.90)]);
        let result = score(&detected, &easy("A", LetterCase::Capital), &Thresholds::default());

        assert!(!result.is_correct);
        assert_eq!(result.reason, "Expected letter not primary.");
        assert_eq!(result.match_ratio, 0.5);
        assert_eq!(
            result.mismatches,
            vec![Mismatch { letter: "C".to_string(), count: 1, top_confidence: 0.9 }]
        );
    }

    #[test]
    fn dominance_accepts_low_confidence_majority() {
        let detected = symbols(&[('A', 0.4), ('A', 0.5), ('H', 0.3)]);
        let result = score(&detected, &easy("a", LetterCase::Capital), &Thresholds::default());

        assert!(result.is_correct);
        assert_eq!(result.expected_letter, "A");
        assert_eq!(result.reason, "Expected letter dominates detections.");
        assert_eq!(result.match_ratio, 0.667);
    }

    #[test]
    fn low_confidence_primary_reports_confidence() {
        let detected = symbols(&[('a', 0.55), ('o', 0.5), ('e', 0.2)]);
        let result = score(&detected, &easy("a", LetterCase::Small), &Thresholds::default());

        assert!(!result.is_correct);
        assert_eq!(result.reason, "Low confidence on primary (0.55).");
    }

    #[test]
    fn missing_letter_is_reported_as_mismatch() {
        let detected = symbols(&[('O', 0.9), ('O', 0.8), ('Q', 0.95)]);
        let result = score(&detected, &easy("C", LetterCase::Capital), &Thresholds::default());

        assert!(!result.is_correct);
        assert_eq!(result.reason, "No matching letter detected.");
        let letters: Vec<&str> =
            result.mismatches.iter().map(|mismatch| mismatch.letter.as_str()).collect();
        assert_eq!(letters, vec!["O", "Q", "C"]);
        assert_eq!(result.mismatches[2].top_confidence, 0.0);
    }

    #[test]
    fn detections_follow_requested_case() {
        let detected = symbols(&[('b', 0.92)]);
        let result = score(&detected, &easy("B", LetterCase::Capital), &Thresholds::default());

        assert!(result.is_correct);
        assert_eq!(result.letters[0].letter, "B");
        assert_eq!(result.sequence, "B");
    }

    #[test]
    fn pair_in_order_with_strong_confidence() {
        let detected = symbols(&[('a', 0.9), ('b', 0.8)]);
        let result = score(&detected, &hard("AB", LetterCase::Small), &Thresholds::default());

        assert!(result.is_correct);
        assert_eq!(result.mode, "small-hard");
        assert_eq!(result.reason, "Both letters detected with strong confidence.");
        assert_eq!(result.top_match_confidence, 0.8);
        let per_letter = result.top_match_confidence_per_letter.expect("per letter");
        assert_eq!(per_letter.get("a"), Some(&0.9));
        assert_eq!(per_letter.get("b"), Some(&0.8));
    }

    #[test]
    fn pair_missing_letter_fails_regardless_of_confidence() {
        let detected = symbols(&[('A', 0.99), ('A', 0.99)]);
        let result = score(&detected, &hard("AB", LetterCase::Capital), &Thresholds::default());

        assert!(!result.is_correct);
        assert_eq!(result.reason, "Both letters must be present at least once.");
        assert!(result.mismatches.iter().any(|mismatch| mismatch.letter == "B"));
    }

    #[test]
    fn pair_out_of_order_fails() {
        let detected = symbols(&[('B', 0.95), ('A', 0.95)]);
        let result = score(&detected, &hard("AB", LetterCase::Capital), &Thresholds::default());

        assert!(!result.is_correct);
        assert!(!result.sequence_match);
        assert_eq!(result.reason, "Letters not detected in the required order 'AB'.");
    }

    #[test]
    fn weak_symbols_do_not_form_the_sequence() {
        let detected = symbols(&[('A', 0.2), ('B', 0.9)]);
        let result = score(&detected, &hard("AB", LetterCase::Capital), &Thresholds::default());

        assert_eq!(result.sequence, "B");
        assert_eq!(result.detected_count, 2);
        assert!(!result.is_correct);
    }

    #[test]
    fn pair_dominance_with_moderate_confidence() {
        let detected = symbols(&[('c', 0.5), ('a', 0.6), ('t', 0.45)]);
        let result = score(&detected, &hard("at", LetterCase::Small), &Thresholds::default());

        assert!(result.is_correct);
        assert_eq!(result.reason, "Expected pair dominates the detections.");
        assert_eq!(result.match_count, 2);
    }

    #[test]
    fn pair_low_confidence_and_ratio() {
        let detected = symbols(&[('x', 0.9), ('y', 0.9), ('a', 0.5), ('t', 0.5), ('z', 0.9)]);
        let result = score(&detected, &hard("at", LetterCase::Small), &Thresholds::default());

        assert!(!result.is_correct);
        assert_eq!(result.reason, "Low confidence and low ratio for the expected pair.");
    }

    #[test]
    fn doubled_letter_needs_two_detections() {
        let thresholds = Thresholds::default();
        let expected = hard("ss", LetterCase::Small);

        let single = score(&symbols(&[('s', 0.95)]), &expected, &thresholds);
        assert!(!single.is_correct);
        assert_eq!(single.reason, "Both letters must be present at least once.");

        let double = score(&symbols(&[('s', 0.95), ('s', 0.9)]), &expected, &thresholds);
        assert!(double.is_correct);
        assert_eq!(double.match_ratio, 1.0);
    }

    #[test]
    fn mismatches_sort_by_count_then_confidence() {
        let detected = symbols(&[('x', 0.4), ('y', 0.9), ('x', 0.5), ('z', 0.95), ('a', 0.99)]);
        let result = score(&detected, &easy("a", LetterCase::Small), &Thresholds::default());

        let letters: Vec<&str> =
            result.mismatches.iter().map(|mismatch| mismatch.letter.as_str()).collect();
        assert_eq!(letters, vec!["x", "z", "y"]);
    }

    #[test]
    fn expected_answer_validation() {
        assert_eq!(
            ExpectedAnswer::parse("  ", LetterCase::Small, Level::Easy),
            Err(AnswerError::Missing)
        );
        assert_eq!(
            ExpectedAnswer::parse("a1", LetterCase::Small, Level::Hard),
            Err(AnswerError::NotLetters)
        );
        assert_eq!(
            ExpectedAnswer::parse("ab", LetterCase::Small, Level::Easy),
            Err(AnswerError::EasyLength)
        );
        assert_eq!(
            ExpectedAnswer::parse("a", LetterCase::Small, Level::Hard),
            Err(AnswerError::HardLength)
        );
        assert_eq!(
            ExpectedAnswer::parse("é", LetterCase::Small, Level::Easy),
            Err(AnswerError::NotLetters)
        );
        assert_eq!(LetterCase::parse("upper"), Err(AnswerError::InvalidCase));
        assert_eq!(Level::parse("medium"), Err(AnswerError::InvalidLevel));

        let answer = ExpectedAnswer::parse(" Ab ", LetterCase::Capital, Level::Hard).unwrap();
        assert_eq!(answer.as_string(), "AB");
    }

    #[test]
    fn thresholds_come_from_settings() {
        let settings = ScoringSettings {
            strong_confidence: 0.65,
            dominance_ratio: 0.5,
            min_symbol_confidence: 0.1,
        };
        let thresholds = Thresholds::from(&settings);
        let detected = symbols(&[('a', 0.66), ('b', 0.1)]);
        let result = score(&detected, &easy("a", LetterCase::Small), &thresholds);
        assert!(result.is_correct);
        assert_eq!(result.sequence, "ab");
    }

    #[test]
    fn sequence_filter_uses_unrounded_confidence() {
        let detected = symbols(&[('A', 0.2996), ('B', 0.9)]);
        let result = score(&detected, &hard("AB", LetterCase::Capital), &Thresholds::default());

        assert_eq!(result.sequence, "B");
        assert!(!result.sequence_match);
        assert!(!result.is_correct);
        assert_eq!(result.reason, "Letters not detected in the required order 'AB'.");
        assert_eq!(result.letters[0].confidence, 0.3);
        let per_letter = result.top_match_confidence_per_letter.expect("per letter");
        assert_eq!(per_letter["A"], 0.3);
        assert_eq!(per_letter["B"], 0.9);
        assert_eq!(result.top_match_confidence, 0.3);
    }
}
