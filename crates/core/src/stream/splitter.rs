//! Think-tag splitting of streamed response text.
//!
//! The relay forwards model output verbatim, including `<think>` ...
//! `</think>` reasoning spans. This module classifies the cumulative text
//! into visible and reasoning segments, emitting append-only render
//! operations so a view never has to re-read earlier output.

/// Render operation emitted by [`ThinkSplitter`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RenderOp {
    /// Append text at the current visible insertion point. After a
    /// reasoning block, the first such op starts a new visible segment.
    AppendVisible(String),
    /// Open reasoning block `ordinal` (1-based within one response) and
    /// make it the target for reasoning text.
    OpenReasoning { ordinal: u32 },
    /// Append text to the open reasoning block.
    AppendReasoning(String),
}

pub const THINK_OPEN: &str = "<think>";
pub const THINK_CLOSE: &str = "</think>";

/// Incremental splitter over the cumulative response text.
///
/// Text is consumed strictly left to right. A tail that could be the start
/// of a marker is held back until enough text arrives to decide, so marker
/// detection is independent of chunk boundaries. After a block closes,
/// leading whitespace of the following visible text is dropped, across
/// append calls if necessary.
#[derive(Debug, Default)]
pub struct ThinkSplitter {
    text: String,
    consumed: usize,
    in_reasoning: bool,
    blocks_opened: u32,
    skip_leading_whitespace: bool,
}

impl ThinkSplitter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Byte offset of the cumulative text classified so far.
    pub fn consumed(&self) -> usize {
        self.consumed
    }

    /// Number of reasoning blocks opened so far.
    pub fn blocks_opened(&self) -> u32 {
        self.blocks_opened
    }

    /// Whether the cursor sits inside an unclosed reasoning block.
    pub fn in_reasoning(&self) -> bool {
        self.in_reasoning
    }

    /// Append one chunk of response text.
    pub fn append(&mut self, chunk: &str) -> Vec<RenderOp> {
        self.text.push_str(chunk);
        self.scan(false)
    }

    /// Signal end of the response. Held-back text is flushed; an unclosed
    /// reasoning block stays open with the content it captured.
    pub fn finish(&mut self) -> Vec<RenderOp> {
        self.scan(true)
    }

    /// Split an already complete response in one pass.
    pub fn split_complete(text: &str) -> Vec<RenderOp> {
        let mut splitter = Self::new();
        let mut ops = splitter.append(text);
        ops.extend(splitter.finish());
        ops
    }

    fn scan(&mut self, finalize: bool) -> Vec<RenderOp> {
        let mut ops = Vec::new();
        loop {
            if self.consumed >= self.text.len() {
                break;
            }
            if self.in_reasoning {
                let tail = &self.text[self.consumed..];
                match tail.find(THINK_CLOSE) {
                    Some(pos) => {
                        let segment = tail[..pos].to_string();
                        self.consumed += pos + THINK_CLOSE.len();
                        self.in_reasoning = false;
                        self.skip_leading_whitespace = true;
                        if !segment.is_empty() {
                            ops.push(RenderOp::AppendReasoning(segment));
                        }
                    }
                    None => {
                        let hold = if finalize {
                            0
                        } else {
                            longest_suffix_prefix(tail, THINK_CLOSE)
                        };
                        let segment = tail[..tail.len() - hold].to_string();
                        self.consumed += segment.len();
                        if !segment.is_empty() {
                            ops.push(RenderOp::AppendReasoning(segment));
                        }
                        break;
                    }
                }
            } else {
                let tail = &self.text[self.consumed..];
                let (segment, advance, opens_block) = match tail.find(THINK_OPEN) {
                    Some(pos) => (tail[..pos].to_string(), pos + THINK_OPEN.len(), true),
                    None => {
                        let hold = if finalize {
                            0
                        } else {
                            longest_suffix_prefix(tail, THINK_OPEN)
                        };
                        let end = tail.len() - hold;
                        (tail[..end].to_string(), end, false)
                    }
                };
                self.consumed += advance;
                if let Some(visible) = self.take_visible(segment) {
                    ops.push(RenderOp::AppendVisible(visible));
                }
                if opens_block {
                    self.in_reasoning = true;
                    self.skip_leading_whitespace = false;
                    self.blocks_opened += 1;
                    ops.push(RenderOp::OpenReasoning {
                        ordinal: self.blocks_opened,
                    });
                } else {
                    break;
                }
            }
        }
        ops
    }

    /// Apply the post-block whitespace rule. Never returns an empty string.
    fn take_visible(&mut self, segment: String) -> Option<String> {
        if segment.is_empty() {
            return None;
        }
        if !self.skip_leading_whitespace {
            return Some(segment);
        }
        let trimmed = segment.trim_start();
        if trimmed.is_empty() {
            // The whole segment was the whitespace run; keep skipping.
            return None;
        }
        self.skip_leading_whitespace = false;
        Some(trimmed.to_string())
    }
}

/// Length of the longest suffix of `haystack` that is a prefix of `needle`.
fn longest_suffix_prefix(haystack: &str, needle: &str) -> usize {
    let max = needle.len().min(haystack.len());
    for len in (1..=max).rev() {
        if haystack.ends_with(&needle[..len]) {
            return len;
        }
    }
    0
}

#[cfg(test)]
mod tests {
    use super::*;

    /// What a view would show after applying ops in order: one string per
    /// visible segment, one per reasoning block. An `AppendVisible` that
    /// follows reasoning output starts a new visible segment.
    #[derive(Debug, Default, PartialEq, Eq)]
    struct Rendered {
        visible: Vec<String>,
        reasoning: Vec<String>,
        ordinals: Vec<u32>,
    }

    fn materialize(batches: &[Vec<RenderOp>]) -> Rendered {
        let mut out = Rendered::default();
        let mut after_reasoning = true;
        for batch in batches {
            for op in batch {
                match op {
                    RenderOp::AppendVisible(text) => {
                        assert!(!text.is_empty(), "empty AppendVisible emitted");
                        if after_reasoning {
                            out.visible.push(String::new());
                            after_reasoning = false;
                        }
                        out.visible.last_mut().unwrap().push_str(text);
                    }
                    RenderOp::OpenReasoning { ordinal } => {
                        out.ordinals.push(*ordinal);
                        out.reasoning.push(String::new());
                        after_reasoning = true;
                    }
                    RenderOp::AppendReasoning(text) => {
                        out.reasoning.last_mut().unwrap().push_str(text);
                    }
                }
            }
        }
        out
    }

    fn split_one_shot(text: &str) -> Rendered {
        materialize(&[ThinkSplitter::split_complete(text)])
    }

    fn split_char_by_char(text: &str) -> Rendered {
        let mut splitter = ThinkSplitter::new();
        let mut batches = Vec::new();
        for ch in text.chars() {
            batches.push(splitter.append(&ch.to_string()));
        }
        batches.push(splitter.finish());
        materialize(&batches)
    }

    fn rendered(visible: &[&str], reasoning: &[&str]) -> Rendered {
        Rendered {
            visible: visible.iter().map(|s| s.to_string()).collect(),
            reasoning: reasoning.iter().map(|s| s.to_string()).collect(),
            ordinals: (1..=reasoning.len() as u32).collect(),
        }
    }

    #[test]
    fn test_plain_text_passes_through() {
        assert_eq!(split_one_shot("Hello world"), rendered(&["Hello world"], &[]));
    }

    #[test]
    fn test_single_block_splits_three_ways() {
        assert_eq!(
            split_one_shot("Before<think>inner</think>After"),
            rendered(&["Before", "After"], &["inner"])
        );
    }

    #[test]
    fn test_marker_split_across_appends() {
        let mut splitter = ThinkSplitter::new();
        let first = splitter.append("Before<thi");
        // Nothing after "Before" may leak: "<thi" could become a marker.
        assert_eq!(first, vec![RenderOp::AppendVisible("Before".to_string())]);
        let mut batches = vec![first];
        batches.push(splitter.append("nk>reason1</think>After"));
        batches.push(splitter.finish());
        assert_eq!(
            materialize(&batches),
            rendered(&["Before", "After"], &["reason1"])
        );
    }

    #[test]
    fn test_char_by_char_matches_one_shot() {
        let cases = [
            "no markers at all",
            "Before<think>inner</think>After",
            "<think>only reasoning</think>",
            "a<think>x</think> b <think>y</think> c",
            "héllo<think>日本語の思考</think> 🌍after",
            "text with < lone bracket <th not a marker",
            "end opens<think>and never closes",
            "<think>a</think><think>b</think>done",
            "stray close </think> is literal",
        ];
        for case in cases {
            assert_eq!(
                split_char_by_char(case),
                split_one_shot(case),
                "case {case:?} diverged"
            );
        }
    }

    #[test]
    fn test_multiple_blocks_get_increasing_ordinals() {
        let out = split_one_shot("a<think>one</think>b<think>two</think>c");
        assert_eq!(out.ordinals, vec![1, 2]);
        assert_eq!(out.reasoning, vec!["one", "two"]);
        assert_eq!(out.visible, vec!["a", "b", "c"]);
    }

    #[test]
    fn test_unclosed_block_stays_open() {
        let mut splitter = ThinkSplitter::new();
        let mut batches = vec![splitter.append("A<think>partial thought")];
        batches.push(splitter.finish());
        assert_eq!(
            materialize(&batches),
            rendered(&["A"], &["partial thought"])
        );
        assert!(splitter.in_reasoning());
    }

    #[test]
    fn test_whitespace_after_close_dropped() {
        assert_eq!(
            split_one_shot("x<think>r</think>\n\n  After"),
            rendered(&["x", "After"], &["r"])
        );
    }

    #[test]
    fn test_whitespace_drop_spans_chunks() {
        let mut splitter = ThinkSplitter::new();
        let mut batches = Vec::new();
        for piece in ["x<think>r</think>", " ", " \n", "After ok"] {
            batches.push(splitter.append(piece));
        }
        batches.push(splitter.finish());
        assert_eq!(materialize(&batches), rendered(&["x", "After ok"], &["r"]));
    }

    #[test]
    fn test_trailing_whitespace_after_close_never_rendered() {
        assert_eq!(
            split_one_shot("x<think>r</think>  \n"),
            rendered(&["x"], &["r"])
        );
    }

    #[test]
    fn test_adjacent_blocks_produce_no_empty_segment() {
        assert_eq!(
            split_one_shot("<think>a</think><think>b</think>done"),
            rendered(&["done"], &["a", "b"])
        );
    }

    #[test]
    fn test_open_marker_inside_reasoning_is_literal() {
        assert_eq!(
            split_one_shot("<think>a<think>b</think>"),
            rendered(&[], &["a<think>b"])
        );
    }

    #[test]
    fn test_consumed_covers_all_input() {
        let mut splitter = ThinkSplitter::new();
        let pieces = ["Before<thi", "nk>reason", "</think> After"];
        for piece in &pieces {
            splitter.append(piece);
        }
        splitter.finish();
        let total: usize = pieces.iter().map(|p| p.len()).sum();
        assert_eq!(splitter.consumed(), total);
    }

    #[test]
    fn test_longest_suffix_prefix() {
        assert_eq!(longest_suffix_prefix("abc<thi", THINK_OPEN), 4);
        assert_eq!(longest_suffix_prefix("abc<", THINK_OPEN), 1);
        assert_eq!(longest_suffix_prefix("abc", THINK_OPEN), 0);
        assert_eq!(longest_suffix_prefix("</think", THINK_CLOSE), 7);
        assert_eq!(longest_suffix_prefix("", THINK_OPEN), 0);
        // A full marker would have been consumed by find(); only proper
        // prefixes matter, but the helper tolerates the full needle.
        assert_eq!(longest_suffix_prefix("x<think>", THINK_OPEN), 7);
    }
}
