#[cfg(test)]
/// Transcript parser unit tests.
///
/// Cover prompt and continuation handling, expected-output boundaries, option comments and the malformed-input
/// errors.
mod tests {
    use super::*;
    use crate::diagnostics::ParseErrorKind;

    fn registry() -> OptionRegistry {
        OptionRegistry::with_builtins()
    }

    fn examples(text: &str) -> Vec<Example> {
        let registry = registry();
        TranscriptParser::new(&registry)
            .examples(text, "test.doctest")
            .expect("fixture should parse")
    }

    fn parse_err(text: &str) -> ParseError {
        let registry = registry();
        TranscriptParser::new(&registry)
            .parse(text, "bad.doctest")
            .expect_err("fixture should be rejected")
    }

    #[test]
    fn test_single_example() {
        let found = examples(">>> 1 + 1\n2\n");
        assert_eq!(found.len(), 1);
        assert_eq!(found[0].source, "1 + 1\n");
        assert_eq!(found[0].want, "2\n");
        assert_eq!(found[0].lineno, 0);
        assert_eq!(found[0].indent, 0);
    }

    #[test]
    fn test_text_and_examples_interleave() {
        let registry = registry();
        let text = "Intro line.\n\n  >>> x = 1\n  >>> x\n  1\n\nOutro.\n";
        let pieces = TranscriptParser::new(&registry).parse(text, "t").unwrap();
        assert_eq!(pieces.len(), 4);
        assert_eq!(pieces[0], Piece::Text("Intro line.\n\n".to_string()));
        let first = pieces[1].as_example().unwrap();
        assert_eq!((first.source.as_str(), first.want.as_str()), ("x = 1\n", ""));
        assert_eq!((first.lineno, first.indent), (2, 2));
        let second = pieces[2].as_example().unwrap();
        assert_eq!((second.source.as_str(), second.want.as_str()), ("x\n", "1\n"));
        assert_eq!(pieces[3], Piece::Text("\nOutro.\n".to_string()));
    }

    #[test]
    fn test_continuation_lines_join_source() {
        let found = examples(">>> def f():\n...     return 3\n...\n>>> f()\n3\n");
        assert_eq!(found[0].source, "def f():\n    return 3\n\n");
        assert_eq!(found[0].want, "");
        assert_eq!(found[1].source, "f()\n");
    }

    #[test]
    fn test_want_stops_at_blank_line() {
        let found = examples(">>> print('a\\nb')\na\nb\n\nnot output\n");
        assert_eq!(found[0].want, "a\nb\n");
    }

    #[test]
    fn test_want_keeps_relative_indent() {
        let found = examples("    >>> print('  x')\n      x\n");
        assert_eq!(found[0].want, "  x\n");
    }

    #[test]
    fn test_crlf_and_tabs_are_normalized() {
        let found = examples("\t>>> 1\r\n\t1\r\n");
        assert_eq!(found[0].indent, 8);
        assert_eq!(found[0].source, "1\n");
        assert_eq!(found[0].want, "1\n");
    }

    #[test]
    fn test_bare_prompt_is_empty_source_line() {
        let found = examples(">>> def f():\n...\n...     pass\n");
        assert_eq!(found[0].source, "def f():\n\n    pass\n");
    }

    #[test]
    fn test_comment_only_examples_are_dropped() {
        let registry = registry();
        let text = ">>> # set up\n>>> x = 1\n>>>\nignored\n\n>>> x\n1\n";
        let pieces = TranscriptParser::new(&registry).parse(text, "t").unwrap();
        let sources: Vec<&str> = pieces
            .iter()
            .filter_map(Piece::as_example)
            .map(|e| e.source.as_str())
            .collect();
        assert_eq!(sources, vec!["x = 1\n", "x\n"]);
        assert_eq!(pieces.len(), 3);
        assert_eq!(pieces[1], Piece::Text("\n".to_string()));
    }

    #[test]
    fn test_option_comment_sets_flags() {
        let found = examples(">>> print(1)  # doctest: +ELLIPSIS, -SKIP\n1\n");
        assert_eq!(found[0].options.get(&OptionFlag::ELLIPSIS), Some(&true));
        assert_eq!(found[0].options.get(&OptionFlag::SKIP), Some(&false));
    }

    #[test]
    fn test_option_comment_on_continuation_line() {
        let found = examples(">>> for i in range(2):\n...     print(i)  # doctest: +NORMALIZE_WHITESPACE\n0 1\n");
        assert!(found[0].is_set(OptionFlag::NORMALIZE_WHITESPACE));
    }

    #[test]
    fn test_registered_flags_resolve() {
        let mut registry = registry();
        let custom = registry.register("PYMIN3.0");
        let found = TranscriptParser::new(&registry)
            .examples(">>> 1  # doctest: +PYMIN3.0\n1\n", "t")
            .unwrap();
        assert!(found[0].is_set(custom));
    }

    #[test]
    fn test_quoted_directive_is_not_an_option() {
        let found = examples(">>> s = '# doctest: +ELLIPSIS'\n");
        assert!(found[0].options.is_empty());
    }

    #[test]
    fn test_missing_prompt_blank() {
        let err = parse_err("text\n>>>x = 1\n");
        assert_eq!(err.kind, ParseErrorKind::MissingPromptBlank);
        assert_eq!(err.line, 2);
        insta::assert_snapshot!(err.to_string(), @"line 2 of bad.doctest lacks blank after >>>: '>>>x = 1'");
    }

    #[test]
    fn test_misindented_continuation() {
        let err = parse_err("  >>> if True:\n   ...     pass\n");
        assert_eq!(err.kind, ParseErrorKind::InconsistentIndent);
        assert_eq!(err.line, 2);
    }

    #[test]
    fn test_underindented_want() {
        let err = parse_err("    >>> print(1)\n  1\n");
        assert_eq!(err.kind, ParseErrorKind::InconsistentIndent);
        assert_eq!(err.line, 2);
    }

    #[test]
    fn test_unknown_option() {
        let err = parse_err(">>> 1  # doctest: +NOPE\n1\n");
        assert_eq!(err.kind, ParseErrorKind::InvalidOption);
        assert!(err.detail.contains("'+NOPE'"));
    }

    #[test]
    fn test_option_without_sign() {
        let err = parse_err(">>> 1  # doctest: ELLIPSIS\n1\n");
        assert_eq!(err.kind, ParseErrorKind::InvalidOption);
    }

    #[test]
    fn test_option_on_comment_only_example() {
        let err = parse_err(">>> # doctest: +ELLIPSIS\n");
        assert_eq!(err.kind, ParseErrorKind::InvalidOption);
        assert!(err.detail.contains("no example"));
    }

    #[test]
    fn test_error_span_points_at_line() {
        let err = parse_err("ok\n>>>bad\n");
        assert_eq!(err.span.offset(), 3);
        assert_eq!(err.span.len(), ">>>bad".len());
    }

    #[test]
    fn test_fixture_without_examples() {
        let registry = registry();
        let pieces = TranscriptParser::new(&registry).parse("just prose\n", "t").unwrap();
        assert_eq!(pieces, vec![Piece::Text("just prose\n".to_string())]);
        assert!(TranscriptParser::new(&registry).parse("", "t").unwrap().is_empty());
    }
}
