use std::collections::HashMap;

use rand::seq::SliceRandom;
use rand::Rng;

const MAX_SHUFFLE_ATTEMPTS: usize = 50;

/// `_` and `-` become spaces, anything else outside `[A-Za-z0-9 ]` is dropped.
pub(crate) fn format_label(label: &str) -> String {
    label
        .chars()
        .map(|ch| if ch == '_' || ch == '-' { ' ' } else { ch })
        .filter(|ch| ch.is_ascii_alphanumeric() || *ch == ' ')
        .collect::<String>()
        .trim()
        .to_string()
}

/// Up to `count` distinct letter shuffles of `correct`, none of which equals
/// it ignoring case. Short labels may yield fewer, or none.
pub(crate) fn decoy_labels<R: Rng + ?Sized>(
    correct: &str,
    count: usize,
    rng: &mut R,
) -> Vec<String> {
    let mut chars: Vec<char> = correct.chars().collect();
    let lowered = correct.to_lowercase();
    let mut decoys: Vec<String> = Vec::new();

    for _ in 0..MAX_SHUFFLE_ATTEMPTS {
        if decoys.len() >= count {
            break;
        }
        chars.shuffle(rng);
        let shuffled: String = chars.iter().collect();
        if shuffled.to_lowercase() != lowered && !decoys.contains(&shuffled) {
            decoys.push(shuffled);
        }
    }
    decoys
}

/// The correct label mixed in with its decoys.
pub(crate) fn answer_options<R: Rng + ?Sized>(
    correct: &str,
    decoys: Vec<String>,
    rng: &mut R,
) -> Vec<String> {
    let mut options = Vec::with_capacity(decoys.len() + 1);
    options.push(correct.to_string());
    options.extend(decoys);
    options.shuffle(rng);
    options
}

/// Runs of ASCII letters and apostrophes.
pub(crate) fn label_words(label: &str) -> Vec<String> {
    label
        .split(|ch: char| !(ch.is_ascii_alphabetic() || ch == '\''))
        .filter(|word| !word.is_empty())
        .map(str::to_string)
        .collect()
}

/// Per-word ARPAbet joined with `" | "`; words without a pronunciation are
/// skipped.
pub(crate) fn arpabet_for(words: &[String], pronunciations: &HashMap<String, String>) -> String {
    words
        .iter()
        .filter_map(|word| pronunciations.get(&word.to_lowercase()))
        .map(String::as_str)
        .collect::<Vec<_>>()
        .join(" | ")
}
