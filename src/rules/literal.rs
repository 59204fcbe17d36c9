//! Helpers for deciding whether a regexp body is a plain literal and for
//! rendering Ruby string literals in corrections.

/// One matchable unit of regexp source: a bare character or a
/// backslash escape.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Unit {
    Char(char),
    Escape(char),
    /// A trailing lone backslash.
    Dangling,
}

impl Unit {
    /// Characters and escapes that only ever match themselves.
    fn is_literal(self) -> bool {
        match self {
            Unit::Char(c) => {
                c.is_ascii_alphanumeric()
                    || c == '_'
                    || matches!(c, ' ' | '\t' | '\r' | '\n' | '\x0c' | '\x0b')
                    || "-,\"'!#%&<>=;:`~/".contains(c)
            }
            // `\cX`, `\C-X` and `\M-X` spell control and meta characters.
            Unit::Escape(c) => !(c.is_ascii_digit() || "AbBcCdDgGhHkMpPRwWXsSzZ".contains(c)),
            Unit::Dangling => false,
        }
    }
}

fn units(source: &str) -> Vec<Unit> {
    let mut out = Vec::with_capacity(source.len());
    let mut chars = source.chars();
    while let Some(c) = chars.next() {
        if c == '\\' {
            out.push(chars.next().map_or(Unit::Dangling, Unit::Escape));
        } else {
            out.push(Unit::Char(c));
        }
    }
    out
}

fn all_literal(units: &[Unit]) -> bool {
    !units.is_empty() && units.iter().all(|u| u.is_literal())
}

/// True when every unit of a non-empty regexp body matches only itself.
pub fn is_literal(source: &str) -> bool {
    all_literal(&units(source))
}

/// `\Afoo` or `^foo` with a literal remainder.
pub fn literal_at_start(source: &str) -> bool {
    match units(source).split_first() {
        Some((Unit::Escape('A') | Unit::Char('^'), rest)) => all_literal(rest),
        _ => false,
    }
}

/// `foo\z` or `foo$` with a literal prefix.
pub fn literal_at_end(source: &str) -> bool {
    match units(source).split_last() {
        Some((Unit::Escape('z') | Unit::Char('$'), rest)) => all_literal(rest),
        _ => false,
    }
}

pub fn drop_start_anchor(source: &str) -> &str {
    source
        .strip_prefix("\\A")
        .or_else(|| source.strip_prefix('^'))
        .unwrap_or(source)
}

pub fn drop_end_anchor(source: &str) -> &str {
    source
        .strip_suffix("\\z")
        .or_else(|| source.strip_suffix('$'))
        .unwrap_or(source)
}

/// Resolves the backslash escapes of a double-quoted Ruby string body.
///
/// Unknown escapes yield the escaped character itself, so `\.` becomes `.`.
pub fn interpret_string_escapes(source: &str) -> String {
    let mut out = String::with_capacity(source.len());
    let mut chars = source.chars().peekable();
    while let Some(c) = chars.next() {
        if c != '\\' {
            out.push(c);
            continue;
        }
        let Some(escaped) = chars.next() else {
            out.push('\\');
            break;
        };
        match escaped {
            'a' => out.push('\x07'),
            'b' => out.push('\x08'),
            'e' => out.push('\x1b'),
            'f' => out.push('\x0c'),
            'n' => out.push('\n'),
            'r' => out.push('\r'),
            's' => out.push(' '),
            't' => out.push('\t'),
            'v' => out.push('\x0b'),
            '\n' => {}
            '0'..='9' => {
                let mut digits = String::from(escaped);
                while digits.len() < 3 {
                    match chars.peek() {
                        Some(d) if d.is_ascii_digit() => {
                            digits.push(*d);
                            chars.next();
                        }
                        _ => break,
                    }
                }
                push_code(&mut out, u32::from_str_radix(&digits, 8).ok());
            }
            'x' => {
                let digits = take_hex(&mut chars, 2);
                if digits.is_empty() {
                    out.push('x');
                } else {
                    push_code(&mut out, u32::from_str_radix(&digits, 16).ok());
                }
            }
            'u' if chars.peek() == Some(&'{') => {
                chars.next();
                let mut body = String::new();
                for c in chars.by_ref() {
                    if c == '}' {
                        break;
                    }
                    body.push(c);
                }
                for code in body.split_whitespace() {
                    push_code(&mut out, u32::from_str_radix(code, 16).ok());
                }
            }
            'u' => {
                let digits = take_hex(&mut chars, 4);
                if digits.len() == 4 {
                    push_code(&mut out, u32::from_str_radix(&digits, 16).ok());
                } else {
                    out.push('u');
                    out.push_str(&digits);
                }
            }
            other => out.push(other),
        }
    }
    out
}

fn take_hex(chars: &mut std::iter::Peekable<std::str::Chars<'_>>, max: usize) -> String {
    let mut digits = String::new();
    while digits.len() < max {
        match chars.peek() {
            Some(d) if d.is_ascii_hexdigit() => {
                digits.push(*d);
                chars.next();
            }
            _ => break,
        }
    }
    digits
}

fn push_code(out: &mut String, code: Option<u32>) {
    out.push(code.and_then(char::from_u32).unwrap_or(char::REPLACEMENT_CHARACTER));
}

fn needs_double_quotes(value: &str) -> bool {
    value.contains('\'')
        || value.chars().any(char::is_control)
        || value.contains("#{")
        || value.contains("#$")
        || value.contains("#@")
}

/// Renders `value` as a Ruby string literal, preferring single quotes.
pub fn to_string_literal(value: &str) -> String {
    if needs_double_quotes(value) {
        to_double_quoted_literal(value)
    } else {
        format!("'{}'", value.replace('\\', "\\\\"))
    }
}

/// Renders `value` the way Ruby's `String#inspect` does.
pub fn to_double_quoted_literal(value: &str) -> String {
    let mut out = String::with_capacity(value.len() + 2);
    out.push('"');
    let mut chars = value.chars().peekable();
    while let Some(c) = chars.next() {
        match c {
            '"' => out.push_str("\\\""),
            '\\' => out.push_str("\\\\"),
            '\n' => out.push_str("\\n"),
            '\t' => out.push_str("\\t"),
            '\r' => out.push_str("\\r"),
            '\x0c' => out.push_str("\\f"),
            '\x0b' => out.push_str("\\v"),
            '\x08' => out.push_str("\\b"),
            '\x07' => out.push_str("\\a"),
            '\x1b' => out.push_str("\\e"),
            '#' if matches!(chars.peek(), Some('{' | '$' | '@')) => out.push_str("\\#"),
            c if c == '\x7f' => out.push_str("\\x7F"),
            c if c.is_control() => out.push_str(&format!("\\u{:04X}", u32::from(c))),
            c => out.push(c),
        }
    }
    out.push('"');
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_plain_text_is_literal() {
        assert!(is_literal("abc"));
        assert!(is_literal("a b-c,d"));
        assert!(is_literal("\\."));
        assert!(is_literal("\\n"));
        assert!(!is_literal(""));
    }

    #[test]
    fn test_metacharacters_are_not_literal() {
        for source in ["a.c", "a*", "a+", "a?", "(a)", "[ab]", "a|b", "a{2}"] {
            assert!(!is_literal(source), "{source}");
        }
    }

    #[test]
    fn test_character_class_shorthands_are_not_literal() {
        for source in ["\\d", "\\w", "\\s", "\\S", "\\h", "\\R", "\\1", "\\k"] {
            assert!(!is_literal(source), "{source}");
        }
    }

    #[test]
    fn test_control_and_meta_escapes_are_not_literal() {
        for source in ["\\cA", "\\C-a", "\\M-a", "a\\M-\\C-x"] {
            assert!(!is_literal(source), "{source}");
        }
        assert!(!literal_at_start("\\A\\cA"));
        assert!(!literal_at_end("\\C-a\\z"));
    }

    #[test]
    fn test_anchors() {
        assert!(literal_at_start("\\Afoo"));
        assert!(literal_at_start("^foo"));
        assert!(!literal_at_start("\\A"));
        assert!(!literal_at_start("foo"));
        assert!(!literal_at_start("\\A\\d"));

        assert!(literal_at_end("foo\\z"));
        assert!(literal_at_end("foo$"));
        assert!(!literal_at_end("foo\\Z"));
        assert!(!literal_at_end("foo\\$"));
        assert!(!literal_at_end("\\z"));
    }

    #[test]
    fn test_drop_anchors() {
        assert_eq!(drop_start_anchor("\\Afoo"), "foo");
        assert_eq!(drop_start_anchor("^foo"), "foo");
        assert_eq!(drop_end_anchor("foo\\z"), "foo");
        assert_eq!(drop_end_anchor("foo$"), "foo");
    }

    #[test]
    fn test_interpret_string_escapes() {
        assert_eq!(interpret_string_escapes("a\\nb"), "a\nb");
        assert_eq!(interpret_string_escapes("\\."), ".");
        assert_eq!(interpret_string_escapes("\\\\"), "\\");
        assert_eq!(interpret_string_escapes("\\101"), "A");
        assert_eq!(interpret_string_escapes("\\x41"), "A");
        assert_eq!(interpret_string_escapes("\\u00e9"), "é");
        assert_eq!(interpret_string_escapes("\\u{48 49}"), "HI");
        assert_eq!(interpret_string_escapes("a\\\nb"), "ab");
        assert_eq!(interpret_string_escapes("\\s"), " ");
    }

    #[test]
    fn test_string_literal_prefers_single_quotes() {
        assert_eq!(to_string_literal("abc"), "'abc'");
        assert_eq!(to_string_literal("say \"hi\""), "'say \"hi\"'");
        assert_eq!(to_string_literal("\\"), "'\\\\'");
        assert_eq!(to_string_literal("."), "'.'");
    }

    #[test]
    fn test_string_literal_falls_back_to_double_quotes() {
        assert_eq!(to_string_literal("it's"), "\"it's\"");
        assert_eq!(to_string_literal("\x07"), "\"\\a\"");
        assert_eq!(to_string_literal("\t"), "\"\\t\"");
        assert_eq!(to_string_literal("#{x}"), "\"\\#{x}\"");
    }

    #[test]
    fn test_double_quoted_literal() {
        assert_eq!(to_double_quoted_literal("a\"b"), "\"a\\\"b\"");
        assert_eq!(to_double_quoted_literal("\x01"), "\"\\u0001\"");
        assert_eq!(to_double_quoted_literal("\x1b"), "\"\\e\"");
    }
}
