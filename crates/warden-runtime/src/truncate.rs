//! Tool-result truncation (I): per-item head/tail truncation with an
//! optional JSON-aware boundary adjustment, plus proportional truncation
//! across a batch of results sharing one budget.
//!
//! The overhead reserved for the `"…truncated N chars…"` marker is
//! approximate rather than bit-exact: under extreme inputs (very large `N`)
//! the returned string can run `maxChars + 1` or `+2` bytes over budget.
//! This mirrors the donor's own reservation, which pads the marker with a
//! fixed digit-count slack rather than measuring `N` exactly before it is
//! known. Treat `max_chars` as an approximate, not hard, ceiling.

use serde::{Deserialize, Serialize};

use warden_core::truncate_to_boundary;

/// Fixed slack (in characters) reserved for the digit count of the
/// truncated-char total inside the marker, since that count isn't known
/// until after the cut is chosen.
const MARKER_DIGIT_SLACK: usize = 10;

/// The maximum number of characters the JSON-aware boundary search will
/// walk looking for a delimiter.
const MAX_JSON_ADJUST_CHARS: usize = 200;

/// Fraction of the target length the JSON-aware search is additionally
/// capped to.
const JSON_ADJUST_TARGET_FRACTION: f64 = 0.15;

fn marker(truncated_chars: usize) -> String {
    format!("\n[… truncated {truncated_chars} chars …]\n")
}

fn marker_overhead() -> usize {
    marker(0).len().saturating_add(MARKER_DIGIT_SLACK)
}

/// Options controlling [`truncate_tool_result`] / [`truncate_tool_results`].
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct TruncateOptions {
    /// Fraction of the available budget allotted to the head (default
    /// `0.6`).
    pub head_ratio: Option<f64>,
    /// Whether to adjust head/tail cuts to JSON-ish boundaries when the
    /// content looks like JSON (default `true`).
    pub json_aware: Option<bool>,
}

impl Default for TruncateOptions {
    fn default() -> Self {
        Self {
            head_ratio: Some(0.6),
            json_aware: Some(true),
        }
    }
}

fn adjust_head_backward(content: &str, head_end: usize, max_adjust: usize) -> usize {
    let bytes = content.as_bytes();
    let lower = head_end.saturating_sub(max_adjust);
    let mut i = head_end;
    while i > lower {
        if matches!(bytes.get(i.saturating_sub(1)), Some(b'\n' | b',' | b'}' | b']')) {
            return i;
        }
        i = i.saturating_sub(1);
    }
    head_end
}

fn adjust_tail_forward(content: &str, tail_start: usize, max_adjust: usize) -> usize {
    let bytes = content.as_bytes();
    let upper = tail_start.saturating_add(max_adjust).min(content.len());
    let mut i = tail_start;
    while i < upper {
        if matches!(bytes.get(i), Some(b'\n' | b'{' | b'[')) {
            return i;
        }
        i = i.saturating_add(1);
    }
    tail_start
}

/// Truncate a single tool result to fit `max_chars`, preserving head and
/// tail context around a middle marker.
///
/// Returns `content` unchanged if it already fits. `max_chars <= 0` yields
/// the literal `"[truncated entire content]"`. When the marker overhead
/// alone would exceed `max_chars`, emits a prefix plus a trailing marker
/// rather than a head/tail split.
#[must_use]
pub fn truncate_tool_result(content: &str, max_chars: usize, opts: &TruncateOptions) -> String {
    if content.len() <= max_chars {
        return content.to_string();
    }
    if max_chars == 0 {
        return "[truncated entire content]".to_string();
    }

    let overhead = marker_overhead();
    if max_chars <= overhead {
        let prefix = truncate_to_boundary(content, max_chars);
        let truncated_chars = content.len().saturating_sub(prefix.len());
        return format!("{prefix}{}", marker(truncated_chars));
    }

    // Safety: guarded by `max_chars <= overhead` returning above.
    #[allow(clippy::arithmetic_side_effects)]
    let available = max_chars - overhead;
    let head_ratio = opts.head_ratio.unwrap_or(0.6);
    #[allow(
        clippy::cast_precision_loss,
        clippy::cast_sign_loss,
        clippy::cast_possible_truncation,
        clippy::arithmetic_side_effects
    )]
    let head_len = ((available as f64) * head_ratio).floor() as usize;
    let head_len = head_len.min(content.len());
    let tail_len = available.saturating_sub(head_len).min(content.len().saturating_sub(head_len));

    let mut head_end = head_len;
    let mut tail_start = content.len().saturating_sub(tail_len);

    if opts.json_aware.unwrap_or(true) {
        let trimmed = content.trim_start();
        let looks_like_json = trimmed.starts_with('{') || trimmed.starts_with('[');
        if looks_like_json {
            #[allow(
                clippy::cast_precision_loss,
                clippy::cast_sign_loss,
                clippy::cast_possible_truncation,
                clippy::arithmetic_side_effects
            )]
            let max_adjust = MAX_JSON_ADJUST_CHARS.min((available as f64 * JSON_ADJUST_TARGET_FRACTION) as usize);
            head_end = adjust_head_backward(content, head_end, max_adjust);
            tail_start = adjust_tail_forward(content, tail_start, max_adjust).max(head_end);
        }
    }

    let head = truncate_to_boundary(content, head_end);
    let tail = if tail_start >= content.len() {
        ""
    } else {
        let start = {
            let mut s = tail_start;
            while s < content.len() && !content.is_char_boundary(s) {
                s = s.saturating_add(1);
            }
            s
        };
        &content[start..]
    };

    let truncated_chars = content.len().saturating_sub(head.len()).saturating_sub(tail.len());
    format!("{head}{}{tail}", marker(truncated_chars))
}

/// The result of truncating a batch of tool results.
#[derive(Debug, Clone)]
pub struct TruncateResultsOutput {
    /// The (possibly truncated) results, in the original order.
    pub results: Vec<String>,
    /// Whether any result was altered.
    pub was_truncated: bool,
}

/// Truncate a batch of tool results to fit `total_budget` chars combined.
///
/// If the combined size already fits, every result is passed through
/// unchanged. Otherwise each item is budgeted proportionally to its
/// original size (an equal split when the total size is zero) and
/// truncated individually via [`truncate_tool_result`].
#[must_use]
pub fn truncate_tool_results(contents: &[String], total_budget: usize, opts: &TruncateOptions) -> TruncateResultsOutput {
    let sizes: Vec<usize> = contents.iter().map(String::len).collect();
    let total_size: usize = sizes.iter().sum();

    if total_size <= total_budget {
        return TruncateResultsOutput {
            results: contents.to_vec(),
            was_truncated: false,
        };
    }

    let n = contents.len();
    let mut was_truncated = false;
    let mut results = Vec::with_capacity(n);

    for (content, &size) in contents.iter().zip(&sizes) {
        let item_budget = if total_size == 0 {
            if n == 0 {
                0
            } else {
                #[allow(clippy::arithmetic_side_effects)]
                {
                    total_budget / n
                }
            }
        } else {
            #[allow(
                clippy::cast_precision_loss,
                clippy::cast_sign_loss,
                clippy::cast_possible_truncation,
                clippy::arithmetic_side_effects
            )]
            {
                ((size as f64 / total_size as f64) * total_budget as f64).floor() as usize
            }
        };

        let truncated = truncate_tool_result(content, item_budget, opts);
        if truncated != *content {
            was_truncated = true;
        }
        results.push(truncated);
    }

    TruncateResultsOutput { results, was_truncated }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn content_within_budget_is_unchanged() {
        let opts = TruncateOptions::default();
        assert_eq!(truncate_tool_result("hello", 10, &opts), "hello");
    }

    #[test]
    fn zero_budget_yields_literal_marker() {
        let opts = TruncateOptions::default();
        assert_eq!(truncate_tool_result("hello world", 0, &opts), "[truncated entire content]");
    }

    #[test]
    fn head_and_tail_are_preserved_with_marker() {
        let opts = TruncateOptions::default();
        let content = format!("HEAD{}TAIL", "x".repeat(1000));
        let result = truncate_tool_result(&content, 200, &opts);
        assert!(result.starts_with("HEAD"));
        assert!(result.ends_with("TAIL"));
        assert!(result.contains("truncated "));
    }

    #[test]
    fn proportional_budget_favors_larger_items() {
        let opts = TruncateOptions::default();
        let a = "a".repeat(900);
        let b = "b".repeat(100);
        let output = truncate_tool_results(&[a.clone(), b.clone()], 200, &opts);
        assert!(output.was_truncated);
        // The larger item should retain at least as much content as the smaller one.
        assert!(output.results[0].len() >= output.results[1].len());
    }

    #[test]
    fn batch_within_budget_passes_through() {
        let opts = TruncateOptions::default();
        let contents = vec!["a".to_string(), "b".to_string()];
        let output = truncate_tool_results(&contents, 1_000, &opts);
        assert!(!output.was_truncated);
        assert_eq!(output.results, contents);
    }

    #[test]
    fn json_aware_adjusts_to_delimiter_boundaries() {
        let opts = TruncateOptions::default();
        let content = format!(r#"{{"a": "{}", "b": "{}"}}"#, "x".repeat(500), "y".repeat(500));
        let result = truncate_tool_result(&content, 300, &opts);
        assert!(result.contains("truncated "));
    }

    #[test]
    fn uniform_split_when_total_size_is_zero() {
        let opts = TruncateOptions::default();
        let contents = vec![String::new(), String::new()];
        let output = truncate_tool_results(&contents, 0, &opts);
        assert_eq!(output.results.len(), 2);
    }
}
