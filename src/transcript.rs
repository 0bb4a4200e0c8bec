//! Transcript Command Parser (C6): converts word-timed transcript segments
//! into a typed command list with time windows.

use crate::config::CommandConfig;
use crate::time_range::TimeRange;

/// A word-level or phrase-level STT hypothesis. Input only.
#[derive(Debug, Clone, PartialEq)]
pub struct TranscriptSegment {
    pub start: f64,
    pub end: f64,
    pub text: String,
}

/// A single normalized, time-allocated token derived from a segment.
#[derive(Debug, Clone, PartialEq)]
pub struct TranscriptWord {
    pub start: f64,
    pub end: f64,
    pub text: String,
}

/// A parsed voice command and the time window it spans, from the wake
/// word's start to the close word's end inclusive.
#[derive(Debug, Clone, PartialEq)]
pub enum TranscriptCommand {
    BadTake { window: TimeRange },
    Filename { value: String, window: TimeRange },
    Edit { window: TimeRange },
    Note { value: String, window: TimeRange },
    Split { window: TimeRange },
    CombinePrevious { window: TimeRange },
    Nevermind { window: TimeRange },
}

impl TranscriptCommand {
    pub fn window(&self) -> TimeRange {
        match self {
            Self::BadTake { window }
            | Self::Filename { window, .. }
            | Self::Edit { window }
            | Self::Note { window, .. }
            | Self::Split { window }
            | Self::CombinePrevious { window }
            | Self::Nevermind { window } => *window,
        }
    }
}

/// Rescales segment times so the maximum alphanumeric segment end aligns to
/// `clip_duration`, but only when the discrepancy exceeds 2% (§3).
/// `has_token_times` corresponds to the STT engine reporting
/// `segmentsSource = "tokens"` (§6): when true, rescaling never applies.
pub fn rescale_segments(segments: &[TranscriptSegment], clip_duration: f64, has_token_times: bool) -> Vec<TranscriptSegment> {
    if has_token_times || clip_duration <= 0.0 {
        return segments.to_vec();
    }

    let max_end = segments
        .iter()
        .filter(|s| s.text.chars().any(|c| c.is_alphanumeric()))
        .map(|s| s.end)
        .fold(0.0_f64, f64::max);

    if max_end <= 0.0 {
        return segments.to_vec();
    }

    let discrepancy = (max_end - clip_duration).abs() / clip_duration;
    if discrepancy <= 0.02 {
        return segments.to_vec();
    }

    let scale = clip_duration / max_end;
    segments
        .iter()
        .map(|s| TranscriptSegment {
            start: s.start * scale,
            end: s.end * scale,
            text: s.text.clone(),
        })
        .collect()
}

/// Lowercases, collapses non-alphanumerics to whitespace, and splits a
/// segment's text into raw tokens, applying the corrections from §3
/// (`jervis` → `jarvis`; `badtake`/`batteik`/`batteke` → `bad`, `take`).
/// Segments that normalize to exactly "blank audio" are discarded entirely.
fn normalized_tokens(text: &str) -> Vec<String> {
    let lowered: String = text
        .chars()
        .map(|c| if c.is_alphanumeric() { c.to_ascii_lowercase() } else { ' ' })
        .collect();
    let collapsed = lowered.split_whitespace().collect::<Vec<_>>().join(" ");
    if collapsed == "blank audio" || collapsed == "blankaudio" {
        return Vec::new();
    }

    let mut tokens = Vec::new();
    for raw in collapsed.split_whitespace() {
        match raw {
            "jervis" => tokens.push("jarvis".to_string()),
            "badtake" | "batteik" | "batteke" => {
                tokens.push("bad".to_string());
                tokens.push("take".to_string());
            }
            other => tokens.push(other.to_string()),
        }
    }
    tokens
}

/// Flattens segments into time-allocated words. Each surviving token
/// inherits a uniform fractional slice of its segment's duration,
/// end-clamped to the segment end.
pub fn flatten_to_words(segments: &[TranscriptSegment]) -> Vec<TranscriptWord> {
    let mut words = Vec::new();
    for segment in segments {
        let tokens = normalized_tokens(&segment.text);
        if tokens.is_empty() {
            continue;
        }
        let duration = segment.end - segment.start;
        let slice = duration / tokens.len() as f64;
        for (i, token) in tokens.into_iter().enumerate() {
            let start = segment.start + slice * i as f64;
            let end = (segment.start + slice * (i as f64 + 1.0)).min(segment.end);
            words.push(TranscriptWord { start, end, text: token });
        }
    }
    words
}

fn find_next(words: &[TranscriptWord], from: usize, text: &str) -> Option<usize> {
    words.iter().enumerate().skip(from).find(|(_, w)| w.text == text).map(|(i, _)| i)
}

fn find_nevermind_before(words: &[TranscriptWord], from: usize, close_word: &str) -> Option<usize> {
    let mut j = from;
    while j < words.len() && words[j].text != close_word {
        if words[j].text == "nevermind" {
            return Some(j);
        }
        if words[j].text == "never" && words.get(j + 1).is_some_and(|w| w.text == "mind") {
            return Some(j);
        }
        j += 1;
    }
    None
}

/// Resolves a close-word index starting from `from`, falling back to the
/// last word as an implicit close when the tail is short enough (§4.6
/// step 4). Returns `None` when the wake-word occurrence should be skipped
/// outright (no close word, and the tail exceeds `command_tail_max_seconds`).
fn resolve_close(words: &[TranscriptWord], from: usize, wake_start: f64, config: &CommandConfig) -> Option<usize> {
    if let Some(idx) = find_next(words, from, &config.close_word) {
        return Some(idx);
    }
    let last = words.len().checked_sub(1)?;
    if last < from {
        return None;
    }
    let tail_seconds = words[last].end - wake_start;
    if tail_seconds > config.command_tail_max_seconds {
        None
    } else {
        Some(last)
    }
}

fn parse_body(starter: &str, body: &[TranscriptWord], window: TimeRange) -> Option<TranscriptCommand> {
    let text: Vec<&str> = body.iter().map(|w| w.text.as_str()).collect();
    match starter {
        "bad" => {
            if text.first() == Some(&"bad") && text.get(1) == Some(&"take") {
                Some(TranscriptCommand::BadTake { window })
            } else {
                None
            }
        }
        "filename" => {
            let value = text.get(1..).unwrap_or(&[]).join(" ");
            (!value.is_empty()).then_some(TranscriptCommand::Filename { value, window })
        }
        "file" => {
            if text.get(1) == Some(&"name") {
                let value = text.get(2..).unwrap_or(&[]).join(" ");
                (!value.is_empty()).then_some(TranscriptCommand::Filename { value, window })
            } else {
                None
            }
        }
        "edit" => Some(TranscriptCommand::Edit { window }),
        "note" => {
            let value = text.get(1..).unwrap_or(&[]).join(" ");
            (!value.is_empty()).then_some(TranscriptCommand::Note { value, window })
        }
        "split" => Some(TranscriptCommand::Split { window }),
        "new" => (text.get(1) == Some(&"chapter")).then_some(TranscriptCommand::Split { window }),
        "combine" => (text.get(1) == Some(&"previous")).then_some(TranscriptCommand::CombinePrevious { window }),
        _ => None,
    }
}

/// Scans the word sequence left-to-right and produces the ordered command
/// list (§4.6). A total function: malformed or ambiguous forms are
/// silently dropped rather than erroring.
pub fn parse_commands(words: &[TranscriptWord], config: &CommandConfig) -> Vec<TranscriptCommand> {
    let mut commands = Vec::new();
    let mut i = 0;
    while i < words.len() {
        if words[i].text != config.wake_word {
            i += 1;
            continue;
        }
        let wake_idx = i;
        let wake_start = words[wake_idx].start;
        let scan_from = wake_idx + 1;

        if let Some(nevermind_idx) = find_nevermind_before(words, scan_from, &config.close_word) {
            match resolve_close(words, nevermind_idx, wake_start, config) {
                Some(close_idx) => {
                    commands.push(TranscriptCommand::Nevermind {
                        window: TimeRange {
                            start: wake_start,
                            end: words[close_idx].end,
                        },
                    });
                    i = close_idx + 1;
                }
                None => i = scan_from,
            }
            continue;
        }

        let Some(starter_word) = words.get(scan_from) else {
            i = scan_from;
            continue;
        };
        if !config.command_starters.iter().any(|s| s == &starter_word.text) {
            i = scan_from;
            continue;
        }
        let starter = starter_word.text.clone();

        match resolve_close(words, scan_from, wake_start, config) {
            Some(close_idx) => {
                let body = &words[scan_from..close_idx];
                let window = TimeRange {
                    start: wake_start,
                    end: words[close_idx].end,
                };
                if let Some(command) = parse_body(&starter, body, window) {
                    commands.push(command);
                }
                i = close_idx + 1;
            }
            None => i = scan_from,
        }
    }
    commands
}
