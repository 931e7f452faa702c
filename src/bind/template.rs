//! Template substitution.
//!
//! Expands `${...}` placeholders in query text from a [`Vars`] store:
//!
//! | Form        | Output                                                        |
//! |-------------|---------------------------------------------------------------|
//! | `${key}`    | value's display form, unquoted (SQL fragments only)           |
//! | `${'key'}`  | quoted literal; a text list becomes `'a','b','c'`             |
//! | `${"key"}`  | quoted identifier                                             |
//! | `$1`, `${1}`| left as the driver's positional parameter                     |
//! | `$$`, `${$}`| left as `$$`                                                  |
//!
//! Substitution never fails. An unset key renders as an empty string, and
//! malformed placeholders (`${` without `}`, `${}`) are copied verbatim, so
//! any problem surfaces when the statement is executed.
//!
//! After expansion, [`bind_parameters`] rewrites `@key` tokens into `$N`
//! parameters carrying the stored values.

use crate::bind::{BindValue, Vars};
use std::collections::HashMap;
use std::fmt::Write as _;

/// Expand every placeholder in `template`.
pub fn expand(template: &str, vars: &Vars) -> String {
    let mut out = String::with_capacity(template.len());
    let mut rest = template;

    while let Some(pos) = rest.find('$') {
        out.push_str(&rest[..pos]);
        let after = &rest[pos + 1..];

        if let Some(tail) = after.strip_prefix('$') {
            out.push_str("$$");
            rest = tail;
            continue;
        }

        if let Some(body) = after.strip_prefix('{') {
            if let Some(end) = body.find('}').filter(|&end| end > 0) {
                out.push_str(&render(&body[..end], vars));
                rest = &body[end + 1..];
                continue;
            }
        }

        out.push('$');
        rest = after;
    }

    out.push_str(rest);
    out
}

fn render(name: &str, vars: &Vars) -> String {
    if name == "$" {
        return "$$".to_string();
    }
    if name.bytes().all(|b| b.is_ascii_digit()) {
        return format!("${name}");
    }
    if let Some(key) = strip_wrapping(name, '\'') {
        return match vars.get(key) {
            Some(value) => match value.as_text_list() {
                Some(items) => items
                    .into_iter()
                    .map(quote_literal)
                    .collect::<Vec<_>>()
                    .join(","),
                None => quote_literal(&value.to_string()),
            },
            None => quote_literal(""),
        };
    }
    if let Some(key) = strip_wrapping(name, '"') {
        return quote_identifier(&vars.join(key, ","));
    }
    vars.get(name).map(|v| v.to_string()).unwrap_or_default()
}

fn strip_wrapping(name: &str, quote: char) -> Option<&str> {
    name.strip_prefix(quote)?.strip_suffix(quote)
}

/// Quote `value` as a string literal.
///
/// Single quotes are doubled. Backslashes are doubled and the literal gets an
/// `E` prefix so it reads the same whatever `standard_conforming_strings` says.
pub fn quote_literal(value: &str) -> String {
    let escaped = value.replace('\'', "''");
    if escaped.contains('\\') {
        format!(" E'{}'", escaped.replace('\\', "\\\\"))
    } else {
        format!("'{escaped}'")
    }
}

/// Quote `value` as an identifier. NUL bytes are dropped.
pub fn quote_identifier(value: &str) -> String {
    format!("\"{}\"", value.replace('\0', "").replace('"', "\"\""))
}

#[derive(Clone, Copy)]
enum Scan {
    Code,
    Literal,
    Identifier,
    Comment,
}

fn is_ident_byte(b: u8) -> bool {
    b.is_ascii_alphanumeric() || b == b'_'
}

/// Opening tag of a dollar-quoted body at the start of `s`: `$$` or `$tag$`.
fn dollar_tag(s: &str) -> Option<&str> {
    let rest = s.strip_prefix('$')?;
    if rest.as_bytes().first().is_some_and(u8::is_ascii_digit) {
        return None;
    }
    let len = rest.bytes().take_while(|&b| is_ident_byte(b)).count();
    (rest.as_bytes().get(len) == Some(&b'$')).then(|| &s[..len + 2])
}

/// Rewrite `@key` tokens into positional parameters.
///
/// Only keys present in `vars` are rewritten; tokens inside quoted text,
/// dollar-quoted bodies and `--` comments are left alone. Repeated keys share
/// one ordinal. A NULL value is written as the literal `NULL` so the server
/// infers its type from context. Returns the rewritten SQL and the values in
/// ordinal order.
pub fn bind_parameters(sql: &str, vars: &Vars) -> (String, Vec<BindValue>) {
    let bytes = sql.as_bytes();
    let mut out = String::with_capacity(sql.len());
    let mut params = Vec::new();
    let mut ordinals: HashMap<&str, usize> = HashMap::new();
    let mut state = Scan::Code;
    let mut copied = 0;
    let mut i = 0;

    while i < bytes.len() {
        let b = bytes[i];
        match state {
            Scan::Code => match b {
                b'\'' => state = Scan::Literal,
                b'"' => state = Scan::Identifier,
                b'-' if bytes.get(i + 1) == Some(&b'-') => state = Scan::Comment,
                b'$' if i == 0 || !is_ident_byte(bytes[i - 1]) => {
                    if let Some(tag) = dollar_tag(&sql[i..]) {
                        let body = i + tag.len();
                        i = sql[body..]
                            .find(tag)
                            .map_or(bytes.len(), |end| body + end + tag.len());
                        continue;
                    }
                }
                b'@' if i == 0 || !(is_ident_byte(bytes[i - 1]) || bytes[i - 1] == b'@') => {
                    let start = i + 1;
                    let end = start
                        + bytes[start..]
                            .iter()
                            .take_while(|&&c| is_ident_byte(c))
                            .count();
                    let key = &sql[start..end];
                    let starts_alpha = key.bytes().next().is_some_and(|c| !c.is_ascii_digit());
                    if starts_alpha {
                        if let Some(value) = vars.get(key) {
                            out.push_str(&sql[copied..i]);
                            copied = end;
                            i = end;
                            if value.is_null() {
                                out.push_str("NULL");
                                continue;
                            }
                            let ordinal = *ordinals.entry(key).or_insert_with(|| {
                                params.push(value);
                                params.len()
                            });
                            let _ = write!(out, "${ordinal}");
                            continue;
                        }
                    }
                }
                _ => {}
            },
            Scan::Literal if b == b'\'' => state = Scan::Code,
            Scan::Identifier if b == b'"' => state = Scan::Code,
            Scan::Comment if b == b'\n' => state = Scan::Code,
            _ => {}
        }
        i += 1;
    }

    out.push_str(&sql[copied..]);
    (out, params)
}

/// Expand placeholders, then bind `@key` parameters.
pub fn prepare(template: &str, vars: &Vars) -> (String, Vec<BindValue>) {
    bind_parameters(&expand(template, vars), vars)
}
