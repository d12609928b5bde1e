// Integration tests for the canonical formatter: every hand-written fixture
// under tests/fixtures/ must format without error, and formatting its own
// output must be a no-op (idempotence), which is what `a0 fmt --write` relies
// on to be safe to run repeatedly.

use a0::formatter::{contains_comment, format_source};

const FIXTURES: &[&str] = &[
    include_str!("fixtures/hello.a0"),
    include_str!("fixtures/spread.a0"),
    include_str!("fixtures/cap_and_budget.a0"),
    include_str!("fixtures/fn_and_control_flow.a0"),
    include_str!("fixtures/match_and_try.a0"),
];

#[test]
fn every_fixture_formats_without_error() {
    for (i, src) in FIXTURES.iter().enumerate() {
        let result = format_source("fixture.a0", src);
        assert!(result.is_ok(), "fixture {i} failed to format: {:?}", result.err());
    }
}

#[test]
fn formatting_is_idempotent_on_every_fixture() {
    for (i, src) in FIXTURES.iter().enumerate() {
        let once = format_source("fixture.a0", src).unwrap_or_else(|e| panic!("fixture {i} failed to format: {e}"));
        let twice = format_source("fixture.a0", &once).unwrap_or_else(|e| panic!("fixture {i} failed to reformat: {e}"));
        assert_eq!(once, twice, "fixture {i} is not idempotent under formatting");
    }
}

#[test]
fn formatted_output_reparses_to_the_same_program() {
    // Round-trip through the formatter should not change what the program
    // does; the cheapest observable proxy for that without re-exporting the
    // formatter's internal span-stripped AST comparison is re-parsing
    // successfully and formatting to a fixed point.
    for (i, src) in FIXTURES.iter().enumerate() {
        let formatted = format_source("fixture.a0", src).unwrap_or_else(|e| panic!("fixture {i} failed to format: {e}"));
        let reparsed = a0::parser::parse_program("fixture.a0", &formatted);
        assert!(reparsed.is_ok(), "fixture {i}'s formatted output failed to reparse: {:?}", reparsed.err());
    }
}

#[test]
fn canonical_output_ends_with_exactly_one_trailing_newline() {
    for (i, src) in FIXTURES.iter().enumerate() {
        let formatted = format_source("fixture.a0", src).unwrap_or_else(|e| panic!("fixture {i} failed to format: {e}"));
        assert!(formatted.ends_with('\n'), "fixture {i} does not end with a newline");
        assert!(!formatted.ends_with("\n\n"), "fixture {i} has trailing blank lines");
    }
}

#[test]
fn none_of_the_fixtures_use_comments() {
    // Comments are not part of the AST and cannot round-trip; the fixture
    // corpus is kept comment-free so idempotence here actually reflects
    // real formatter behavior rather than a warning path.
    for (i, src) in FIXTURES.iter().enumerate() {
        assert!(!contains_comment(src), "fixture {i} contains a comment, which the formatter would silently drop");
    }
}

#[test]
fn fmt_rewrites_shorthand_record_fields_to_themselves_and_stays_stable() {
    let src = "let ys = [1, 2]\nreturn { ys }\n";
    let formatted = format_source("t.a0", src).unwrap();
    let twice = format_source("t.a0", &formatted).unwrap();
    assert_eq!(formatted, twice);
}

#[test]
fn contains_comment_ignores_hash_inside_string_literals() {
    assert!(!contains_comment("return { msg: \"a # b\" }\n"));
    assert!(contains_comment("# a real comment\nreturn {}\n"));
}
