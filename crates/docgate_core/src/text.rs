//! Small text helpers shared by the fixture parser and the scratch-file utilities.

/// Remove the common leading whitespace from every non-blank line.
///
/// ## Notes
/// - Lines holding only spaces/tabs are normalized to empty lines and do not take part in the margin computation.
/// - The margin is compared character by character, so a tab and spaces never count as the same indentation.
///
/// ## Examples
/// ```rust
/// use docgate_core::text::dedent;
///
/// assert_eq!(dedent("    def f():\n        pass\n"), "def f():\n    pass\n");
/// ```
pub fn dedent(text: &str) -> String {
    let mut margin: Option<&str> = None;
    for line in text.split('\n') {
        if is_blank(line) {
            continue;
        }
        let indent_len = line.len() - line.trim_start_matches([' ', '\t']).len();
        let indent = &line[..indent_len];
        margin = Some(match margin {
            None => indent,
            Some(current) => common_prefix(current, indent),
        });
    }
    let margin = margin.unwrap_or("");

    let mut out = String::with_capacity(text.len());
    let mut lines = text.split('\n').peekable();
    while let Some(line) = lines.next() {
        if is_blank(line) {
            // whitespace-only line collapses to nothing
        } else if let Some(rest) = line.strip_prefix(margin) {
            out.push_str(rest);
        } else {
            out.push_str(line);
        }
        if lines.peek().is_some() {
            out.push('\n');
        }
    }
    out
}

fn is_blank(line: &str) -> bool {
    line.chars().all(|c| c == ' ' || c == '\t')
}

fn common_prefix<'a>(a: &'a str, b: &str) -> &'a str {
    let len = a
        .char_indices()
        .zip(b.chars())
        .take_while(|((_, ca), cb)| ca == cb)
        .last()
        .map(|((i, ca), _)| i + ca.len_utf8())
        .unwrap_or(0);
    &a[..len]
}

/// Expand tab characters to the next multiple of `tab_size` columns, line by line.
pub fn expand_tabs(text: &str, tab_size: usize) -> String {
    if !text.contains('\t') {
        return text.to_string();
    }
    let tab_size = tab_size.max(1);
    let mut out = String::with_capacity(text.len());
    let mut column = 0usize;
    for ch in text.chars() {
        match ch {
            '\t' => {
                let pad = tab_size - (column % tab_size);
                out.extend(std::iter::repeat_n(' ', pad));
                column += pad;
            }
            '\n' | '\r' => {
                out.push(ch);
                column = 0;
            }
            _ => {
                out.push(ch);
                column += 1;
            }
        }
    }
    out
}

/// Find a source-encoding declaration (`coding: latin-1`, `coding=utf-8`) in the first two lines.
///
/// ## Returns
/// - (`Option<&str>`): the declared encoding name as written, or `None` when no cookie is present.
pub fn coding_cookie(text: &str) -> Option<&str> {
    for line in text.split('\n').take(2) {
        let mut search_from = 0;
        while let Some(pos) = line[search_from..].find("coding") {
            let after = search_from + pos + "coding".len();
            search_from = after;
            let rest = &line[after..];
            let Some(rest) = rest.strip_prefix(':').or_else(|| rest.strip_prefix('=')) else {
                continue;
            };
            let rest = rest.trim_start();
            let end = rest
                .char_indices()
                .find(|&(_, c)| !(c.is_alphanumeric() || c == '-' || c == '_' || c == '.'))
                .map(|(i, _)| i)
                .unwrap_or(rest.len());
            if end > 0 {
                return Some(&rest[..end]);
            }
        }
    }
    None
}
