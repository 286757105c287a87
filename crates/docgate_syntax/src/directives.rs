//! `:RequireModule:` directives.
//!
//! A fixture declares that it needs an importable capability with a line of the form
//!
//! ```text
//! :RequireModule: docutils
//! ```
//!
//! The directive token is matched case-insensitively, at the start of a line after optional leading spaces. The
//! capability name is the trimmed remainder of the line.

const DIRECTIVE: &str = ":RequireModule:";

/// One requirement declared by a fixture.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Requirement {
    pub name: String,
    /// 1-based line number of the directive.
    pub line: usize,
}

/// Collect the requirement directives of `text` in source order.
///
/// Directives whose name is empty are ignored.
pub fn scan_requirements(text: &str) -> Vec<Requirement> {
    text.lines()
        .enumerate()
        .filter_map(|(index, line)| {
            let name = parse_requirement_line(line)?;
            Some(Requirement {
                name: name.to_string(),
                line: index + 1,
            })
        })
        .collect()
}

fn parse_requirement_line(line: &str) -> Option<&str> {
    let rest = line.trim_start_matches(' ');
    let head = rest.get(..DIRECTIVE.len())?;
    if !head.eq_ignore_ascii_case(DIRECTIVE) {
        return None;
    }
    let name = rest[DIRECTIVE.len()..].trim();
    if name.is_empty() { None } else { Some(name) }
}
