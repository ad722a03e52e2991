use proptest::prelude::*;
use tcl::pattern::{glob_match, MatchMode, Pattern};
use tcl::script::parser::{is_complete, parse_list};
use tcl::script::value::{parse_int, render_list, Value};
use tcl::Interpreter;

// ── Parser robustness ─────────────────────────────────────────────────────────

proptest! {
    /// Evaluating arbitrary text returns a result or an error, never panics.
    #[test]
    fn eval_does_not_panic(s in "\\PC*") {
        let mut interp = Interpreter::with_captured_output();
        let _ = interp.eval(&s);
        prop_assert_eq!(interp.scope().level(), 0);
    }

    #[test]
    fn list_parse_does_not_panic(s in "\\PC*") {
        let _ = parse_list(&s);
        let _ = is_complete(&s);
    }
}

// ── Lists ─────────────────────────────────────────────────────────────────────

proptest! {
    /// Rendering a list and parsing it back yields the same elements.
    #[test]
    fn list_render_parse_round_trip(items in prop::collection::vec("[a-z ]{0,8}", 0..6)) {
        let values: Vec<Value> = items.iter().map(|s| Value::from(s.as_str())).collect();
        let text = render_list(&values);
        let parsed: Vec<String> = parse_list(&text)
            .unwrap()
            .iter()
            .map(|v| v.as_text().to_owned())
            .collect();
        prop_assert_eq!(parsed, items);
    }

    /// `llength [list ...]` counts every argument.
    #[test]
    fn llength_counts_list_arguments(items in prop::collection::vec("[a-z{}]{0,5}", 0..6)) {
        let mut interp = Interpreter::with_captured_output();
        let values: Vec<Value> = items.iter().map(|s| Value::from(s.as_str())).collect();
        interp.set_var("l", Value::from_list(values));
        let n = interp.eval("llength $l").unwrap();
        prop_assert_eq!(n.as_int().unwrap(), items.len() as i64);
    }
}

// ── Integers ──────────────────────────────────────────────────────────────────

proptest! {
    #[test]
    fn decimal_round_trip(n in any::<i64>()) {
        prop_assert_eq!(parse_int(&n.to_string()), Some(n));
    }

    #[test]
    fn hex_and_octal_round_trip(n in 0i64..i64::MAX) {
        prop_assert_eq!(parse_int(&format!("{n:#x}")), Some(n));
        prop_assert_eq!(parse_int(&format!("0{n:o}")), Some(n));
    }
}

// ── Glob patterns ─────────────────────────────────────────────────────────────

proptest! {
    #[test]
    fn star_matches_everything(s in "\\PC*") {
        prop_assert!(glob_match("*", &s, false));
        let p = Pattern::new("*", MatchMode::Glob, false).unwrap();
        prop_assert!(p.matches(&s));
    }

    #[test]
    fn literal_pattern_matches_itself(s in "[a-zA-Z0-9 ._-]{0,12}") {
        prop_assert!(glob_match(&s, &s, false));
        prop_assert!(glob_match(&s.to_uppercase(), &s.to_lowercase(), true));
    }
}
