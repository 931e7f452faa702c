//! Randomized tests for template expansion and parameter binding.
//!
//! These run without a database.

use pgbind::bind::{BindValue, Vars, bind_parameters, expand, prepare, quote_identifier, quote_literal};
use pgbind::config::VarArg;
use pgbind::models::Operation;
use rand::Rng;
use rand::seq::SliceRandom;
use tokio_test::{assert_err, assert_ok};

/// Fragments that exercise every branch of the scanners.
const PIECES: &[&str] = &[
    "$", "$$", "${", "}", "${}", "${$}", "${1}", "$2", "${name}", "${'name'}", "${\"name\"}",
    "${'ids'}", "${missing}", "@name", "@ids", "@missing", "@@name", "x@name", "@1", "'", "\"",
    "--", "\n", " ", "SELECT", "é", "🚀", "\\", "\0", "{", "a_b",
];

fn random_template(pieces: usize) -> String {
    let mut rng = rand::thread_rng();
    (0..pieces)
        .map(|_| *PIECES.choose(&mut rng).unwrap_or(&" "))
        .collect()
}

fn seeded_vars() -> Vars {
    Vars::from_pairs([
        ("name", BindValue::from("o'brien")),
        ("ids", BindValue::from(vec!["a", "b"])),
    ])
}

#[test]
fn fuzz_expand_never_panics() {
    let vars = seeded_vars();
    let mut rng = rand::thread_rng();
    for _ in 0..2000 {
        let template = random_template(rng.gen_range(0..40));
        let _ = expand(&template, &vars);
        let _ = prepare(&template, &vars);
    }
}

#[test]
fn fuzz_text_without_dollar_is_unchanged() {
    let vars = seeded_vars();
    let mut rng = rand::thread_rng();
    for _ in 0..1000 {
        let template: String = random_template(rng.gen_range(0..40)).replace('$', "");
        assert_eq!(expand(&template, &vars), template);
    }
}

#[test]
fn fuzz_bound_ordinals_match_params() {
    let vars = seeded_vars();
    let mut rng = rand::thread_rng();
    for _ in 0..1000 {
        let sql = random_template(rng.gen_range(0..40)).replace('$', "");
        let (out, params) = bind_parameters(&sql, &vars);

        let highest = out
            .split('$')
            .skip(1)
            .filter_map(|rest| {
                let digits: String = rest.chars().take_while(char::is_ascii_digit).collect();
                digits.parse::<usize>().ok()
            })
            .max()
            .unwrap_or(0);
        assert_eq!(highest, params.len(), "sql: {sql:?} -> {out:?}");
        assert!(params.len() <= 2);
    }
}

#[test]
fn fuzz_quote_literal_round_trip() {
    let mut rng = rand::thread_rng();
    for _ in 0..1000 {
        let raw = random_template(rng.gen_range(0..10));
        let quoted = quote_literal(&raw);
        let unquoted = if raw.contains('\\') {
            let inner = quoted
                .strip_prefix(" E'")
                .and_then(|s| s.strip_suffix('\''))
                .unwrap();
            inner.replace("\\\\", "\\").replace("''", "'")
        } else {
            let inner = quoted
                .strip_prefix('\'')
                .and_then(|s| s.strip_suffix('\''))
                .unwrap();
            inner.replace("''", "'")
        };
        assert_eq!(unquoted, raw);
    }
}

#[test]
fn fuzz_quote_identifier_balanced() {
    let mut rng = rand::thread_rng();
    for _ in 0..1000 {
        let raw = random_template(rng.gen_range(0..10));
        let quoted = quote_identifier(&raw);
        assert!(!quoted.contains('\0'));
        let inner = &quoted[1..quoted.len() - 1];
        assert_eq!(inner.matches('"').count() % 2, 0);
    }
}

#[test]
fn test_command_line_values() {
    assert_ok!("table=widgets".parse::<VarArg>());
    assert_err!("table".parse::<VarArg>());
    assert_ok!(Operation::try_from(5u8));
    assert_err!(Operation::try_from(42u8));
}
