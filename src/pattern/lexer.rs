//! Tokenizer for node patterns.

use super::error::PatternErrorKind;

#[derive(Debug, Clone, PartialEq)]
pub(crate) enum Token {
    LParen,
    RParen,
    LBrace,
    RBrace,
    LBracket,
    RBracket,
    Bang,
    Dollar,
    Caret,
    Backtick,
    Rest,
    Question,
    Star,
    Plus,
    Sym(String),
    Str(String),
    Int(i64),
    Float(f64),
    Nil,
    True,
    False,
    /// Lower-case word, optionally ending in `?` (`send`, `_`, `_recv`, `nil?`).
    Ident(String),
    /// Upper-case word naming a symbol set (`RESTRICT_ON_SEND`).
    Const(String),
    /// `%NAME` set reference.
    SetRef(String),
    /// `%1` positional parameter.
    Param(usize),
    /// `#name` external predicate.
    External(String),
}

impl Token {
    pub(crate) fn describe(&self) -> String {
        match self {
            Token::LParen => "(".into(),
            Token::RParen => ")".into(),
            Token::LBrace => "{".into(),
            Token::RBrace => "}".into(),
            Token::LBracket => "[".into(),
            Token::RBracket => "]".into(),
            Token::Bang => "!".into(),
            Token::Dollar => "$".into(),
            Token::Caret => "^".into(),
            Token::Backtick => "`".into(),
            Token::Rest => "...".into(),
            Token::Question => "?".into(),
            Token::Star => "*".into(),
            Token::Plus => "+".into(),
            Token::Sym(s) => format!(":{s}"),
            Token::Str(s) => format!("{s:?}"),
            Token::Int(n) => n.to_string(),
            Token::Float(x) => x.to_string(),
            Token::Nil => "nil".into(),
            Token::True => "true".into(),
            Token::False => "false".into(),
            Token::Ident(s) | Token::Const(s) => s.clone(),
            Token::SetRef(s) => format!("%{s}"),
            Token::Param(n) => format!("%{n}"),
            Token::External(s) => format!("#{s}"),
        }
    }
}

/// A token with its byte range in the pattern text.
#[derive(Debug, Clone, PartialEq)]
pub(crate) struct Spanned {
    pub token: Token,
    pub start: usize,
    pub end: usize,
}

/// Operator method names accepted after `:`, longest first.
const OPERATOR_SYMBOLS: &[&str] = &[
    "[]=", "<=>", "===", "[]", "==", "=~", "!=", "!~", "<<", ">>", "<=", ">=", "**", "+@", "-@",
    "!", "<", ">", "+", "-", "*", "/", "%", "&", "|", "^", "~",
];

fn is_word_char(c: char) -> bool {
    c.is_ascii_alphanumeric() || c == '_'
}

pub(crate) fn tokenize(src: &str) -> Result<Vec<Spanned>, (PatternErrorKind, usize)> {
    let bytes = src.as_bytes();
    let mut tokens = Vec::new();
    let mut pos = 0;

    while pos < src.len() {
        let rest = &src[pos..];
        let Some(c) = rest.chars().next() else { break };
        if c.is_whitespace() {
            pos += c.len_utf8();
            continue;
        }
        let start = pos;
        let simple = match c {
            '(' => Some(Token::LParen),
            ')' => Some(Token::RParen),
            '{' => Some(Token::LBrace),
            '}' => Some(Token::RBrace),
            '[' => Some(Token::LBracket),
            ']' => Some(Token::RBracket),
            '!' => Some(Token::Bang),
            '$' => Some(Token::Dollar),
            '^' => Some(Token::Caret),
            '`' => Some(Token::Backtick),
            '?' => Some(Token::Question),
            '*' => Some(Token::Star),
            '+' => Some(Token::Plus),
            _ => None,
        };
        if let Some(token) = simple {
            pos += 1;
            tokens.push(Spanned { token, start, end: pos });
            continue;
        }

        let token = if rest.starts_with("...") {
            pos += 3;
            Token::Rest
        } else if c == ':' {
            let (token, len) = lex_symbol(rest).ok_or((PatternErrorKind::UnexpectedChar(':'), start))?;
            pos += len;
            token
        } else if c == '"' {
            let (value, len) = lex_string(rest).ok_or((PatternErrorKind::Unbalanced('"'), start))?;
            pos += len;
            Token::Str(value)
        } else if c.is_ascii_digit() || (c == '-' && bytes.get(pos + 1).is_some_and(u8::is_ascii_digit)) {
            let (token, len) = lex_number(rest).map_err(|text| (PatternErrorKind::InvalidLiteral(text), start))?;
            pos += len;
            token
        } else if c == '%' {
            let word: String = rest[1..].chars().take_while(|c| is_word_char(*c)).collect();
            if word.is_empty() {
                return Err((PatternErrorKind::UnexpectedChar('%'), start));
            }
            pos += 1 + word.len();
            match word.parse::<usize>() {
                Ok(index) if index > 0 => Token::Param(index),
                Ok(_) => return Err((PatternErrorKind::InvalidLiteral(format!("%{word}")), start)),
                Err(_) => Token::SetRef(word),
            }
        } else if c == '#' {
            let word = lex_word(&rest[1..]);
            if word.is_empty() {
                return Err((PatternErrorKind::UnexpectedChar('#'), start));
            }
            pos += 1 + word.len();
            Token::External(word.to_string())
        } else if c.is_ascii_uppercase() {
            let word: String = rest.chars().take_while(|c| is_word_char(*c)).collect();
            pos += word.len();
            Token::Const(word)
        } else if c.is_ascii_lowercase() || c == '_' {
            let word = lex_word(rest);
            pos += word.len();
            match word {
                "nil" => Token::Nil,
                "true" => Token::True,
                "false" => Token::False,
                _ => Token::Ident(word.to_string()),
            }
        } else {
            return Err((PatternErrorKind::UnexpectedChar(c), start));
        };
        tokens.push(Spanned { token, start, end: pos });
    }
    Ok(tokens)
}

/// A word, plus a trailing `?` for predicate names. Wildcards (`_`,
/// `_name`) never take the `?`, so `_?` lexes as a quantified wildcard.
fn lex_word(rest: &str) -> &str {
    let len = rest.chars().take_while(|c| is_word_char(*c)).count();
    let word = &rest[..len];
    if !word.starts_with('_') && rest[len..].starts_with('?') {
        &rest[..len + 1]
    } else {
        word
    }
}

fn lex_symbol(rest: &str) -> Option<(Token, usize)> {
    let body = &rest[1..];
    if body.starts_with('"') {
        let (value, len) = lex_string(body)?;
        return Some((Token::Sym(value), 1 + len));
    }
    let first = body.chars().next()?;
    if first.is_ascii_alphabetic() || first == '_' {
        let mut len = body.chars().take_while(|c| is_word_char(*c)).count();
        if body[len..].starts_with(&['?', '!', '='][..]) && !body[len..].starts_with("=>") {
            len += 1;
        }
        return Some((Token::Sym(body[..len].to_string()), 1 + len));
    }
    OPERATOR_SYMBOLS
        .iter()
        .find(|op| body.starts_with(**op))
        .map(|op| (Token::Sym((*op).to_string()), 1 + op.len()))
}

fn lex_string(rest: &str) -> Option<(String, usize)> {
    let mut value = String::new();
    let mut chars = rest.char_indices().skip(1);
    while let Some((i, c)) = chars.next() {
        match c {
            '"' => return Some((value, i + 1)),
            '\\' => {
                let (_, escaped) = chars.next()?;
                value.push(match escaped {
                    'n' => '\n',
                    't' => '\t',
                    other => other,
                });
            }
            other => value.push(other),
        }
    }
    None
}

fn lex_number(rest: &str) -> Result<(Token, usize), String> {
    let mut len = usize::from(rest.starts_with('-'));
    len += rest[len..].chars().take_while(|c| c.is_ascii_digit() || *c == '_').count();
    let is_float = rest[len..].starts_with('.')
        && rest[len + 1..].chars().next().is_some_and(|c| c.is_ascii_digit());
    if is_float {
        len += 1;
        len += rest[len..].chars().take_while(|c| c.is_ascii_digit() || *c == '_').count();
    }
    let text = &rest[..len];
    let cleaned = text.replace('_', "");
    let token = if is_float {
        cleaned.parse().map(Token::Float).map_err(|_| text.to_string())?
    } else {
        cleaned.parse().map(Token::Int).map_err(|_| text.to_string())?
    };
    Ok((token, len))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn kinds(src: &str) -> Vec<Token> {
        tokenize(src).unwrap().into_iter().map(|s| s.token).collect()
    }

    #[test]
    fn test_sequence_tokens() {
        assert_eq!(
            kinds("(send $_ :push ...)"),
            vec![
                Token::LParen,
                Token::Ident("send".into()),
                Token::Dollar,
                Token::Ident("_".into()),
                Token::Sym("push".into()),
                Token::Rest,
                Token::RParen,
            ]
        );
    }

    #[test]
    fn test_operator_symbols() {
        assert_eq!(
            kinds(":=~ :<=> :[] :[]= :! :<< :match?"),
            vec![
                Token::Sym("=~".into()),
                Token::Sym("<=>".into()),
                Token::Sym("[]".into()),
                Token::Sym("[]=".into()),
                Token::Sym("!".into()),
                Token::Sym("<<".into()),
                Token::Sym("match?".into()),
            ]
        );
    }

    #[test]
    fn test_predicates_and_quantifiers() {
        assert_eq!(
            kinds("nil? _? _name* int+"),
            vec![
                Token::Ident("nil?".into()),
                Token::Ident("_".into()),
                Token::Question,
                Token::Ident("_name".into()),
                Token::Star,
                Token::Ident("int".into()),
                Token::Plus,
            ]
        );
    }

    #[test]
    fn test_literals_params_and_sets() {
        assert_eq!(
            kinds("nil 1 -2 1.5 \"a\\\"b\" :\"x y\" %1 %METHODS ALLOWED #ext?"),
            vec![
                Token::Nil,
                Token::Int(1),
                Token::Int(-2),
                Token::Float(1.5),
                Token::Str("a\"b".into()),
                Token::Sym("x y".into()),
                Token::Param(1),
                Token::SetRef("METHODS".into()),
                Token::Const("ALLOWED".into()),
                Token::External("ext?".into()),
            ]
        );
    }

    #[test]
    fn test_unterminated_string() {
        let err = tokenize("(str \"abc)").unwrap_err();
        assert_eq!(err, (PatternErrorKind::Unbalanced('"'), 5));
    }

    #[test]
    fn test_unknown_character() {
        let err = tokenize("(send @)").unwrap_err();
        assert_eq!(err, (PatternErrorKind::UnexpectedChar('@'), 6));
    }
}
