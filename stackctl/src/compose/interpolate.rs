//! `${VAR}` / `$VAR` substitution in raw descriptor text

use std::collections::HashMap;

use indexmap::IndexSet;

/// A `$` reference found in descriptor text
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Token<'a> {
    /// Text copied through unchanged
    Literal(&'a str),
    /// A substitutable variable and the exact text it was written as
    Variable { name: &'a str, raw: &'a str },
}

/// Names of all substitutable variables, in order of first appearance
pub fn variables(text: &str) -> IndexSet<String> {
    tokenize(text)
        .into_iter()
        .filter_map(|token| match token {
            Token::Variable { name, .. } => Some(name.to_string()),
            Token::Literal(_) => None,
        })
        .collect()
}

/// Replace known variables; unknown ones are left as written.
///
/// `$$` is compose's escape for a literal dollar and passes through untouched,
/// as do forms this substitution does not own (`${VAR:-default}`, `$1`, an
/// unterminated `${`).
pub fn substitute(text: &str, values: &HashMap<String, String>) -> String {
    let mut out = String::with_capacity(text.len());
    for token in tokenize(text) {
        match token {
            Token::Literal(s) => out.push_str(s),
            Token::Variable { name, raw } => match values.get(name) {
                Some(value) => out.push_str(value),
                None => out.push_str(raw),
            },
        }
    }
    out
}

fn tokenize(text: &str) -> Vec<Token<'_>> {
    let bytes = text.as_bytes();
    let mut tokens = Vec::new();
    let mut literal_start = 0;
    let mut i = 0;

    while i < bytes.len() {
        if bytes[i] != b'$' {
            i += 1;
            continue;
        }

        let next = bytes.get(i + 1).copied();
        let (end, name) = match next {
            Some(b'$') => (i + 2, None),
            Some(b'{') => match text[i + 2..].find('}') {
                Some(offset) => {
                    let name = &text[i + 2..i + 2 + offset];
                    let end = i + 2 + offset + 1;
                    (end, Some(name).filter(|n| is_identifier(n)))
                }
                None => (i + 1, None),
            },
            Some(c) if is_identifier_start(c) => {
                let len = bytes[i + 1..]
                    .iter()
                    .take_while(|c| is_identifier_char(**c))
                    .count();
                (i + 1 + len, Some(&text[i + 1..i + 1 + len]))
            }
            _ => (i + 1, None),
        };

        if let Some(name) = name {
            if literal_start < i {
                tokens.push(Token::Literal(&text[literal_start..i]));
            }
            tokens.push(Token::Variable {
                name,
                raw: &text[i..end],
            });
            literal_start = end;
        }
        i = end;
    }

    if literal_start < text.len() {
        tokens.push(Token::Literal(&text[literal_start..]));
    }
    tokens
}

fn is_identifier_start(c: u8) -> bool {
    c.is_ascii_alphabetic() || c == b'_'
}

fn is_identifier_char(c: u8) -> bool {
    c.is_ascii_alphanumeric() || c == b'_'
}

fn is_identifier(name: &str) -> bool {
    let bytes = name.as_bytes();
    match bytes.first() {
        Some(first) if is_identifier_start(*first) => bytes[1..].iter().all(|c| is_identifier_char(*c)),
        _ => false,
    }
}
