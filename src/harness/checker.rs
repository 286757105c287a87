//! Output checker
//!
//! Compares an example's expected output with what the interpreter printed, using doctest's rules:
//!
//! - an exact match always passes,
//! - `<BLANKLINE>` in the expected output stands for an empty line (unless `DONT_ACCEPT_BLANKLINE`),
//! - `NORMALIZE_WHITESPACE` treats every run of whitespace as a single space,
//! - `ELLIPSIS` lets `...` in the expected output match any text,
//! - an expected traceback is compared on its exception line only.
//!
//! Failures are rendered in doctest's report layout, as a unified diff when `REPORT_UDIFF` is set.

use std::fmt::Write as _;
use std::path::Path;

use docgate_core::{FlagSet, OptionFlag};
use docgate_syntax::Example;
use similar::TextDiff;

pub const BLANKLINE_MARKER: &str = "<BLANKLINE>";
pub const ELLIPSIS_MARKER: &str = "...";
const TRACEBACK_HEADERS: &[&str] = &["Traceback (most recent call last):", "Traceback (innermost last):"];
const SEPARATOR: &str = "**********************************************************************";

/// Whether `got` is an acceptable rendering of `want` under `flags`.
pub fn check_output(want: &str, got: &str, flags: &FlagSet) -> bool {
    if got == want {
        return true;
    }

    let (want, got) = if flags.contains(OptionFlag::DONT_ACCEPT_BLANKLINE) {
        (want.to_string(), got.to_string())
    } else {
        (expand_blanklines(want), blank_whitespace_lines(got))
    };
    if got == want {
        return true;
    }

    let (want, got) = if flags.contains(OptionFlag::NORMALIZE_WHITESPACE) {
        (normalize_whitespace(&want), normalize_whitespace(&got))
    } else {
        (want, got)
    };
    if got == want {
        return true;
    }

    flags.contains(OptionFlag::ELLIPSIS) && ellipsis_match(&want, &got)
}

/// Check one example's output, comparing only the exception when a traceback is expected.
///
/// Output that does not end in a newline gets one before the comparison.
pub fn check_example(example: &Example, got: &str, flags: &FlagSet) -> bool {
    let got = terminated(got);
    match (exception_message(&example.want), exception_message(&got)) {
        (Some(want_exc), Some(got_exc)) => check_output(&want_exc, &got_exc, flags),
        _ => check_output(&example.want, &got, flags),
    }
}

/// Match `got` against a `want` containing `...` wildcards.
///
/// The pieces between wildcards must appear in order; the first piece anchors at the start and the last at the end.
pub fn ellipsis_match(want: &str, got: &str) -> bool {
    if !want.contains(ELLIPSIS_MARKER) {
        return want == got;
    }

    let pieces: Vec<&str> = want.split(ELLIPSIS_MARKER).collect();
    let (first, rest) = match pieces.split_first() {
        Some(split) => split,
        None => return want == got,
    };
    let (last, middle) = match rest.split_last() {
        Some(split) => split,
        None => return want == got,
    };

    let mut start = 0;
    let mut end = got.len();
    if !first.is_empty() {
        if !got.starts_with(first) {
            return false;
        }
        start = first.len();
    }
    if !last.is_empty() {
        if !got.ends_with(last) {
            return false;
        }
        end -= last.len();
    }
    if start > end {
        return false;
    }

    for piece in middle {
        match got[start..end].find(piece) {
            Some(offset) => start += offset + piece.len(),
            None => return false,
        }
    }
    true
}

/// The exception line(s) of a traceback in `text`, if it contains one.
///
/// Only the last traceback counts; the indented stack lines after its header are skipped.
fn exception_message(text: &str) -> Option<String> {
    let (header_at, header) = TRACEBACK_HEADERS
        .iter()
        .filter_map(|h| text.rfind(h).map(|at| (at, *h)))
        .max_by_key(|&(at, _)| at)?;
    let after = &text[header_at + header.len()..];
    let mut message = String::new();
    let mut in_stack = true;
    for line in after.lines() {
        if in_stack && (line.starts_with(' ') || line.starts_with('\t') || line.is_empty()) {
            continue;
        }
        in_stack = false;
        message.push_str(line);
        message.push('\n');
    }
    Some(message)
}

fn expand_blanklines(want: &str) -> String {
    let mut out = String::with_capacity(want.len());
    for line in want.split_inclusive('\n') {
        let body = line.strip_suffix('\n').unwrap_or(line);
        match body.strip_prefix(BLANKLINE_MARKER) {
            Some(rest) if rest.trim().is_empty() => {}
            _ => out.push_str(body),
        }
        if line.ends_with('\n') {
            out.push('\n');
        }
    }
    out
}

fn blank_whitespace_lines(got: &str) -> String {
    let mut out = String::with_capacity(got.len());
    for line in got.split_inclusive('\n') {
        let body = line.strip_suffix('\n').unwrap_or(line);
        if !body.trim_matches([' ', '\t', '\r']).is_empty() {
            out.push_str(body);
        }
        if line.ends_with('\n') {
            out.push('\n');
        }
    }
    out
}

fn normalize_whitespace(text: &str) -> String {
    text.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// Indent every line of `text` by four spaces.
fn indent(text: &str) -> String {
    let mut out = String::new();
    for line in text.lines() {
        out.push_str("    ");
        out.push_str(line);
        out.push('\n');
    }
    out
}

/// Render a failed example the way doctest does.
///
/// ## Parameters
/// - `path`, `suite_name`: where the example lives; the reported line is 1-based.
/// - `got`: the captured output.
/// - `flags`: the example's effective flags; `REPORT_UDIFF` selects the diff layout.
pub fn format_failure(path: &Path, suite_name: &str, example: &Example, got: &str, flags: &FlagSet) -> String {
    let mut out = String::new();
    let _ = writeln!(out, "{SEPARATOR}");
    let _ = writeln!(out, "File \"{}\", line {}, in {}", path.display(), example.lineno + 1, suite_name);
    out.push_str("Failed example:\n");
    out.push_str(&indent(&example.source));
    out.push_str(&describe_difference(&example.want, got, flags));
    out
}

/// Render an example that could not be run at all (timeout, interpreter exit).
pub fn format_error(path: &Path, suite_name: &str, example: &Example, error: &str) -> String {
    let mut out = String::new();
    let _ = writeln!(out, "{SEPARATOR}");
    let _ = writeln!(out, "File \"{}\", line {}, in {}", path.display(), example.lineno + 1, suite_name);
    out.push_str("Failed example:\n");
    out.push_str(&indent(&example.source));
    out.push_str("Error:\n");
    out.push_str(&indent(error));
    out
}

fn describe_difference(want: &str, got: &str, flags: &FlagSet) -> String {
    let got = if flags.contains(OptionFlag::DONT_ACCEPT_BLANKLINE) {
        got.to_string()
    } else {
        mark_blanklines(got)
    };

    let want_lines = want.lines().count();
    let got_lines = got.lines().count();
    if flags.contains(OptionFlag::REPORT_UDIFF) && want_lines > 2 && got_lines > 2 {
        let want = terminated(want);
        let got = terminated(&got);
        let diff = TextDiff::from_lines(want.as_str(), got.as_str());
        let body = diff.unified_diff().context_radius(2).to_string();
        return format!("Differences (unified diff with -expected +actual):\n{}", indent(&body));
    }

    let mut out = String::new();
    if want.is_empty() {
        out.push_str("Expected nothing\n");
    } else {
        out.push_str("Expected:\n");
        out.push_str(&indent(want));
    }
    if got.is_empty() {
        out.push_str("Got nothing\n");
    } else {
        out.push_str("Got:\n");
        out.push_str(&indent(&got));
    }
    out
}

fn mark_blanklines(got: &str) -> String {
    let mut out = String::with_capacity(got.len());
    for line in got.split_inclusive('\n') {
        let Some(body) = line.strip_suffix('\n') else {
            out.push_str(line);
            continue;
        };
        if body.trim().is_empty() {
            out.push_str(BLANKLINE_MARKER);
        } else {
            out.push_str(body);
        }
        out.push('\n');
    }
    out
}

fn terminated(text: &str) -> String {
    let mut text = text.to_string();
    if !text.is_empty() && !text.ends_with('\n') {
        text.push('\n');
    }
    text
}
