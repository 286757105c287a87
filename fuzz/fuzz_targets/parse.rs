#![no_main]

use docgate_core::{MarkerTable, OptionRegistry};
use docgate_syntax::{ExampleParser, TranscriptParser, scan_requirements};
use libfuzzer_sys::fuzz_target;

fuzz_target!(|data: &[u8]| {
    // Convert bytes to UTF-8 string (ignore invalid UTF-8)
    if let Ok(s) = std::str::from_utf8(data) {
        let _ = scan_requirements(s);

        let mut registry = OptionRegistry::with_builtins();
        MarkerTable::standard(&mut registry);
        let _ = TranscriptParser::new(&registry).parse(s, "fuzz.doctest");
    }
});
