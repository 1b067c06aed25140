//! Plain stdout rendering for one-shot sends.
//!
//! Responsibilities:
//! - Streamed chunk printing, with reasoning inlined or reduced to markers
//! - Wait spinner while a non-streamed reply is pending
//! - Plain-text rendering of stored message bodies

use std::io::Write;
use std::time::Duration;

use indicatif::{ProgressBar, ProgressStyle};

use confab_core::{RenderOp, StreamSink, ThinkSplitter};

/// Prints stream output as it arrives.
///
/// Visible text goes to stdout verbatim. Reasoning is printed inline when
/// `show_thinking` is set, otherwise each block collapses to a one-line
/// marker.
pub struct StreamPrinter {
    show_thinking: bool,
    spinner: Option<ProgressBar>,
    at_line_start: bool,
    in_reasoning: bool,
}

impl StreamPrinter {
    pub fn new(show_thinking: bool, non_streamed: bool) -> Self {
        let mut printer = Self {
            show_thinking,
            spinner: None,
            at_line_start: true,
            in_reasoning: false,
        };
        if non_streamed {
            printer.start_spinner();
        }
        printer
    }

    fn start_spinner(&mut self) {
        let bar = ProgressBar::new_spinner().with_style(
            ProgressStyle::default_spinner()
                .template("{spinner} {msg}")
                .expect("valid template"),
        );
        bar.set_message("waiting for reply...");
        bar.enable_steady_tick(Duration::from_millis(120));
        self.spinner = Some(bar);
    }

    fn clear_spinner(&mut self) {
        if let Some(bar) = self.spinner.take() {
            bar.finish_and_clear();
        }
    }

    fn print(&mut self, text: &str) {
        print!("{text}");
        let _ = std::io::stdout().flush();
        if let Some(last) = text.chars().last() {
            self.at_line_start = last == '\n';
        }
    }

    fn break_line(&mut self) {
        if !self.at_line_start {
            self.print("\n");
        }
    }

    /// Ensure output ends with a newline.
    pub fn finish(&mut self) {
        self.clear_spinner();
        self.break_line();
    }
}

impl StreamSink for StreamPrinter {
    fn user_shown(&mut self, _text: &str) {}

    fn response_begin(&mut self) {
        self.clear_spinner();
    }

    fn render(&mut self, op: RenderOp) {
        match op {
            RenderOp::AppendVisible(text) => {
                if self.in_reasoning {
                    self.in_reasoning = false;
                    self.break_line();
                }
                self.print(&text);
            }
            RenderOp::OpenReasoning { ordinal } => {
                self.in_reasoning = true;
                self.break_line();
                if self.show_thinking {
                    self.print(&format!("[thinking #{ordinal}]\n"));
                } else {
                    self.print(&format!("[thinking #{ordinal} hidden]\n"));
                }
            }
            RenderOp::AppendReasoning(text) => {
                if self.show_thinking {
                    self.print(&text);
                }
            }
        }
    }

    fn response_end(&mut self) {
        self.clear_spinner();
    }

    fn exchange_discarded(&mut self) {
        self.clear_spinner();
        self.break_line();
        self.print("(partial reply discarded)\n");
    }

    fn fallback_started(&mut self, reason: &str) {
        self.clear_spinner();
        self.break_line();
        eprintln!("stream failed ({reason}); retrying without streaming");
        self.start_spinner();
    }
}

/// Render a stored message body for plain output: visible text as-is,
/// reasoning blocks inlined or summarized.
pub fn render_plain(content: &str, show_thinking: bool) -> String {
    let mut out = String::new();
    let mut in_reasoning = false;
    for op in ThinkSplitter::split_complete(content) {
        match op {
            RenderOp::AppendVisible(text) => {
                if in_reasoning {
                    in_reasoning = false;
                    ensure_newline(&mut out);
                }
                out.push_str(&text);
            }
            RenderOp::OpenReasoning { ordinal } => {
                in_reasoning = true;
                ensure_newline(&mut out);
                if show_thinking {
                    out.push_str(&format!("[thinking #{ordinal}]\n"));
                } else {
                    out.push_str(&format!("[thinking #{ordinal} hidden]\n"));
                }
            }
            RenderOp::AppendReasoning(text) => {
                if show_thinking {
                    out.push_str(&text);
                }
            }
        }
    }
    out
}

fn ensure_newline(out: &mut String) {
    if !out.is_empty() && !out.ends_with('\n') {
        out.push('\n');
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_render_plain_without_markers() {
        assert_eq!(render_plain("Hello world", false), "Hello world");
    }

    #[test]
    fn test_render_plain_hides_reasoning_by_default() {
        let out = render_plain("Before<think>secret sauce</think>After", false);
        assert_eq!(out, "Before\n[thinking #1 hidden]\nAfter");
        assert!(!out.contains("secret sauce"));
    }

    #[test]
    fn test_render_plain_inlines_reasoning_when_asked() {
        let out = render_plain("Before<think>sauce</think>After", true);
        assert_eq!(out, "Before\n[thinking #1]\nsauce\nAfter");
    }

    #[test]
    fn test_render_plain_numbers_blocks() {
        let out = render_plain("<think>a</think>x<think>b</think>y", false);
        assert!(out.contains("[thinking #1 hidden]"));
        assert!(out.contains("[thinking #2 hidden]"));
    }
}
