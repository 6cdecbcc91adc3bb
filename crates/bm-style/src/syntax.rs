//! Stylesheet and declaration parsing.

use crate::error::StyleError;
use crate::selector::Selector;

/// A single property: `color: red !important`.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Declaration {
    /// Lowercase property name.
    pub name: String,
    /// Value without the `!important` marker.
    pub value: String,
    pub important: bool,
}

/// Selectors sharing one declaration block.
#[derive(Clone, Debug)]
pub struct Rule {
    pub selectors: Vec<Selector>,
    pub declarations: Vec<Declaration>,
}

/// A parsed stylesheet. Rule order is source order.
#[derive(Clone, Debug, Default)]
pub struct Stylesheet {
    pub rules: Vec<Rule>,
}

impl Stylesheet {
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.rules.is_empty()
    }
}

/// Parse a stylesheet.
///
/// At-rules are skipped with their blocks. Selectors that cannot apply to an
/// inline style (dynamic pseudo-classes, unknown pseudo-elements) are dropped
/// individually; a rule left without selectors is dropped. Unterminated
/// comments and blocks are errors.
pub fn parse_stylesheet(css: &str) -> Result<Stylesheet, StyleError> {
    let css = strip_comments(css)?;
    let mut rules = Vec::new();
    let mut rest = css.as_str();

    loop {
        rest = rest.trim_start();
        if rest.is_empty() {
            break;
        }

        if rest.starts_with('@') {
            match find_unquoted(rest, &[';', '{']) {
                Some((i, ';')) => rest = &rest[i + 1..],
                Some((i, _)) => {
                    let close = matching_brace(rest, i)?;
                    rest = &rest[close + 1..];
                }
                None => break,
            }
            continue;
        }

        let Some((open, _)) = find_unquoted(rest, &['{']) else {
            // Trailing garbage without a block
            break;
        };
        let close = matching_brace(rest, open)?;
        let prelude = &rest[..open];
        let body = &rest[open + 1..close];
        rest = &rest[close + 1..];

        let selectors: Vec<Selector> = split_unquoted(prelude, ',')
            .into_iter()
            .filter_map(|text| match Selector::parse(text) {
                Ok(selector) => Some(selector),
                Err(reason) => {
                    tracing::trace!(selector = text.trim(), %reason, "Skipping selector");
                    None
                }
            })
            .collect();
        if selectors.is_empty() {
            continue;
        }
        let declarations = parse_declarations(body);
        if declarations.is_empty() {
            continue;
        }
        rules.push(Rule {
            selectors,
            declarations,
        });
    }

    Ok(Stylesheet { rules })
}

/// Parse a declaration list such as the contents of a `style` attribute.
///
/// Malformed entries (no colon, empty name or value) are skipped.
pub fn parse_declarations(input: &str) -> Vec<Declaration> {
    split_unquoted(input, ';')
        .into_iter()
        .filter_map(|pair| {
            let (name, value) = pair.split_once(':')?;
            let name = name.trim().to_ascii_lowercase();
            if name.is_empty() {
                return None;
            }
            let (value, important) = split_important(value.trim());
            if value.is_empty() {
                return None;
            }
            Some(Declaration {
                name,
                value: value.to_owned(),
                important,
            })
        })
        .collect()
}

/// Serialize declarations back to `style` attribute syntax.
pub fn format_declarations<'a>(declarations: impl IntoIterator<Item = &'a Declaration>) -> String {
    let mut out = String::new();
    for decl in declarations {
        if !out.is_empty() {
            out.push(' ');
        }
        out.push_str(&decl.name);
        out.push_str(": ");
        out.push_str(&decl.value);
        if decl.important {
            out.push_str(" !important");
        }
        out.push(';');
    }
    out
}

fn split_important(value: &str) -> (&str, bool) {
    if let Some(pos) = value.rfind('!') {
        let marker = value[pos + 1..].trim();
        if marker.eq_ignore_ascii_case("important") {
            return (value[..pos].trim_end(), true);
        }
    }
    (value, false)
}

fn strip_comments(css: &str) -> Result<String, StyleError> {
    let mut out = String::with_capacity(css.len());
    let mut chars = css.char_indices().peekable();
    let mut quote: Option<char> = None;

    while let Some((i, ch)) = chars.next() {
        if let Some(q) = quote {
            out.push(ch);
            if ch == '\\' {
                if let Some((_, escaped)) = chars.next() {
                    out.push(escaped);
                }
            } else if ch == q {
                quote = None;
            }
            continue;
        }
        match ch {
            '"' | '\'' => {
                quote = Some(ch);
                out.push(ch);
            }
            '/' if chars.peek().is_some_and(|&(_, next)| next == '*') => {
                let Some(end) = css[i + 2..].find("*/") else {
                    return Err(StyleError::Syntax {
                        offset: i,
                        message: "unterminated comment".to_owned(),
                    });
                };
                let resume = i + 2 + end + 2;
                while chars.peek().is_some_and(|&(j, _)| j < resume) {
                    chars.next();
                }
                out.push(' ');
            }
            _ => out.push(ch),
        }
    }
    Ok(out)
}

/// Byte offset of the first of `targets` outside strings, parentheses and
/// brackets.
fn find_unquoted(text: &str, targets: &[char]) -> Option<(usize, char)> {
    let mut quote: Option<char> = None;
    let mut depth = 0usize;
    let mut escaped = false;
    for (i, ch) in text.char_indices() {
        if escaped {
            escaped = false;
            continue;
        }
        if ch == '\\' {
            escaped = true;
            continue;
        }
        if let Some(q) = quote {
            if ch == q {
                quote = None;
            }
            continue;
        }
        match ch {
            '"' | '\'' => quote = Some(ch),
            '(' | '[' => depth += 1,
            ')' | ']' => depth = depth.saturating_sub(1),
            _ if depth == 0 && targets.contains(&ch) => return Some((i, ch)),
            _ => {}
        }
    }
    None
}

/// Offset of the `}` closing the `{` at `open`.
fn matching_brace(text: &str, open: usize) -> Result<usize, StyleError> {
    let mut depth = 0usize;
    let mut quote: Option<char> = None;
    let mut escaped = false;
    for (i, ch) in text[open..].char_indices() {
        if escaped {
            escaped = false;
            continue;
        }
        if ch == '\\' {
            escaped = true;
            continue;
        }
        if let Some(q) = quote {
            if ch == q {
                quote = None;
            }
            continue;
        }
        match ch {
            '"' | '\'' => quote = Some(ch),
            '{' => depth += 1,
            '}' => {
                depth -= 1;
                if depth == 0 {
                    return Ok(open + i);
                }
            }
            _ => {}
        }
    }
    Err(StyleError::Syntax {
        offset: open,
        message: "unterminated block".to_owned(),
    })
}

/// Split on `sep` outside strings, parentheses and brackets.
pub(crate) fn split_unquoted(text: &str, sep: char) -> Vec<&str> {
    let mut parts = Vec::new();
    let mut rest = text;
    while let Some((i, _)) = find_unquoted(rest, &[sep]) {
        parts.push(&rest[..i]);
        rest = &rest[i + sep.len_utf8()..];
    }
    parts.push(rest);
    parts
}
