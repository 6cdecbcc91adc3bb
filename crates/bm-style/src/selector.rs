//! Selector parsing, matching and specificity.

use bm_tree::Element;

use crate::index::DocumentIndex;

/// Selector specificity as (id, class, type) counts.
#[derive(Copy, Clone, Debug, Default, Eq, PartialEq, Ord, PartialOrd)]
pub struct Specificity(pub u16, pub u16, pub u16);

impl std::ops::Add for Specificity {
    type Output = Self;

    fn add(self, rhs: Self) -> Self {
        Self(self.0 + rhs.0, self.1 + rhs.1, self.2 + rhs.2)
    }
}

/// Relationship between two compound selectors.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum Combinator {
    /// `a b`
    Descendant,
    /// `a > b`
    Child,
    /// `a + b`
    Adjacent,
    /// `a ~ b`
    Sibling,
}

/// Generated content position.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub enum PseudoElement {
    Before,
    After,
}

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
enum AttrOp {
    Equals,
    Includes,
    DashMatch,
    Prefix,
    Suffix,
    Substring,
}

#[derive(Clone, Debug, PartialEq, Eq)]
struct AttrSelector {
    name: String,
    op: Option<(AttrOp, String)>,
    ignore_case: bool,
}

/// `an+b` argument of the `:nth-*` pseudo-classes.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
struct Nth {
    a: i32,
    b: i32,
}

impl Nth {
    fn parse(arg: &str) -> Option<Self> {
        let arg: String = arg.chars().filter(|c| !c.is_whitespace()).collect();
        let arg = arg.to_ascii_lowercase();
        match arg.as_str() {
            "odd" => return Some(Self { a: 2, b: 1 }),
            "even" => return Some(Self { a: 2, b: 0 }),
            _ => {}
        }
        let Some((a, b)) = arg.split_once('n') else {
            return Some(Self {
                a: 0,
                b: arg.parse().ok()?,
            });
        };
        let a = match a {
            "" | "+" => 1,
            "-" => -1,
            other => other.parse().ok()?,
        };
        let b = if b.is_empty() {
            0
        } else {
            b.strip_prefix('+').unwrap_or(b).parse().ok()?
        };
        Some(Self { a, b })
    }

    /// Check a 1-based position.
    fn matches(self, position: usize) -> bool {
        let Ok(pos) = i32::try_from(position) else {
            return false;
        };
        if self.a == 0 {
            return pos == self.b;
        }
        let diff = pos - self.b;
        diff % self.a == 0 && diff / self.a >= 0
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
enum PseudoClass {
    FirstChild,
    LastChild,
    OnlyChild,
    FirstOfType,
    LastOfType,
    OnlyOfType,
    NthChild(Nth),
    NthLastChild(Nth),
    NthOfType(Nth),
    NthLastOfType(Nth),
    Not(Vec<Compound>),
    Empty,
    Root,
}

#[derive(Clone, Debug, PartialEq, Eq)]
enum Simple {
    Id(String),
    Class(String),
    Attr(AttrSelector),
    Pseudo(PseudoClass),
}

#[derive(Clone, Debug, Default, PartialEq, Eq)]
struct Compound {
    /// `None` for `*` or an omitted type.
    tag: Option<String>,
    simple: Vec<Simple>,
}

impl Compound {
    fn is_empty(&self) -> bool {
        self.tag.is_none() && self.simple.is_empty()
    }

    fn specificity(&self) -> Specificity {
        let mut spec = Specificity(0, 0, u16::from(self.tag.is_some()));
        for simple in &self.simple {
            spec = spec
                + match simple {
                    Simple::Id(_) => Specificity(1, 0, 0),
                    Simple::Class(_) | Simple::Attr(_) => Specificity(0, 1, 0),
                    // :not() takes the specificity of its most specific argument
                    Simple::Pseudo(PseudoClass::Not(list)) => list
                        .iter()
                        .map(Self::specificity)
                        .max()
                        .unwrap_or_default(),
                    Simple::Pseudo(_) => Specificity(0, 1, 0),
                };
        }
        spec
    }

    fn matches(&self, index: &DocumentIndex<'_>, id: usize) -> bool {
        let el = index.element(id);
        if let Some(tag) = &self.tag
            && el.tag != *tag
        {
            return false;
        }
        self.simple.iter().all(|simple| match simple {
            Simple::Id(want) => el.attr("id") == Some(want.as_str()),
            Simple::Class(want) => el.has_class(want),
            Simple::Attr(sel) => matches_attr(el, sel),
            Simple::Pseudo(pseudo) => matches_pseudo(index, id, pseudo),
        })
    }
}

/// A complex selector: compounds joined by combinators, optionally ending in
/// a pseudo-element.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Selector {
    compounds: Vec<Compound>,
    /// `combinators[i]` joins `compounds[i]` and `compounds[i + 1]`.
    combinators: Vec<Combinator>,
    pseudo_element: Option<PseudoElement>,
    specificity: Specificity,
}

impl Selector {
    /// Parse a single complex selector.
    ///
    /// Fails for syntax errors and for selectors that can never apply to a
    /// static document (`:hover`, `::selection` and the like).
    pub fn parse(text: &str) -> Result<Self, String> {
        let mut parser = Parser::new(text.trim());
        if parser.at_end() {
            return Err("empty selector".to_owned());
        }

        let mut compounds = Vec::new();
        let mut combinators = Vec::new();
        let mut pseudo_element = None;
        loop {
            let (compound, pseudo) = parser.compound(true)?;
            if compound.is_empty() && pseudo.is_none() && !parser.saw_universal {
                return Err(format!("unexpected {:?}", parser.peek().unwrap_or(' ')));
            }
            compounds.push(compound);
            if pseudo.is_some() {
                pseudo_element = pseudo;
                parser.skip_ws();
                if !parser.at_end() {
                    return Err("pseudo-element must be last".to_owned());
                }
                break;
            }

            let had_ws = parser.skip_ws();
            let Some(next) = parser.peek() else {
                break;
            };
            let combinator = match next {
                '>' => Combinator::Child,
                '+' => Combinator::Adjacent,
                '~' => Combinator::Sibling,
                _ if had_ws => Combinator::Descendant,
                other => return Err(format!("unexpected {other:?}")),
            };
            if combinator != Combinator::Descendant {
                parser.bump();
                parser.skip_ws();
            }
            combinators.push(combinator);
        }

        let mut specificity = compounds
            .iter()
            .map(Compound::specificity)
            .fold(Specificity::default(), |acc, s| acc + s);
        if pseudo_element.is_some() {
            specificity = specificity + Specificity(0, 0, 1);
        }

        Ok(Self {
            compounds,
            combinators,
            pseudo_element,
            specificity,
        })
    }

    #[must_use]
    pub fn specificity(&self) -> Specificity {
        self.specificity
    }

    #[must_use]
    pub fn pseudo_element(&self) -> Option<PseudoElement> {
        self.pseudo_element
    }

    pub(crate) fn matches(&self, index: &DocumentIndex<'_>, id: usize) -> bool {
        self.matches_at(index, self.compounds.len() - 1, id)
    }

    fn matches_at(&self, index: &DocumentIndex<'_>, part: usize, id: usize) -> bool {
        if !self.compounds[part].matches(index, id) {
            return false;
        }
        if part == 0 {
            return true;
        }
        match self.combinators[part - 1] {
            Combinator::Child => index
                .parent(id)
                .is_some_and(|p| self.matches_at(index, part - 1, p)),
            Combinator::Descendant => {
                let mut current = index.parent(id);
                while let Some(ancestor) = current {
                    if self.matches_at(index, part - 1, ancestor) {
                        return true;
                    }
                    current = index.parent(ancestor);
                }
                false
            }
            Combinator::Adjacent => index
                .preceding_siblings(id)
                .last()
                .is_some_and(|&s| self.matches_at(index, part - 1, s)),
            Combinator::Sibling => index
                .preceding_siblings(id)
                .iter()
                .any(|&s| self.matches_at(index, part - 1, s)),
        }
    }
}

fn matches_attr(el: &Element, sel: &AttrSelector) -> bool {
    let Some(value) = el.attrs.get(&sel.name) else {
        return false;
    };
    let Some((op, want)) = &sel.op else {
        return true;
    };
    let value = value.to_attr_string();
    let (value, want) = if sel.ignore_case {
        (value.to_lowercase(), want.to_lowercase())
    } else {
        (value.into_owned(), want.clone())
    };
    match op {
        AttrOp::Equals => value == want,
        AttrOp::Includes => value.split_whitespace().any(|token| token == want),
        AttrOp::DashMatch => value == want || value.starts_with(&format!("{want}-")),
        AttrOp::Prefix => !want.is_empty() && value.starts_with(&want),
        AttrOp::Suffix => !want.is_empty() && value.ends_with(&want),
        AttrOp::Substring => !want.is_empty() && value.contains(&want),
    }
}

fn matches_pseudo(index: &DocumentIndex<'_>, id: usize, pseudo: &PseudoClass) -> bool {
    let before = index.preceding_siblings(id);
    let after = index.following_siblings(id);
    let tag = &index.element(id).tag;
    let same_type = |ids: &[usize]| ids.iter().filter(|&&s| index.element(s).tag == *tag).count();

    match pseudo {
        PseudoClass::FirstChild => before.is_empty(),
        PseudoClass::LastChild => after.is_empty(),
        PseudoClass::OnlyChild => before.is_empty() && after.is_empty(),
        PseudoClass::FirstOfType => same_type(before) == 0,
        PseudoClass::LastOfType => same_type(after) == 0,
        PseudoClass::OnlyOfType => same_type(before) == 0 && same_type(after) == 0,
        PseudoClass::NthChild(nth) => nth.matches(before.len() + 1),
        PseudoClass::NthLastChild(nth) => nth.matches(after.len() + 1),
        PseudoClass::NthOfType(nth) => nth.matches(same_type(before) + 1),
        PseudoClass::NthLastOfType(nth) => nth.matches(same_type(after) + 1),
        PseudoClass::Not(list) => !list.iter().any(|c| c.matches(index, id)),
        PseudoClass::Empty => index.element(id).children.iter().all(|child| match child {
            bm_tree::Node::Text(t) => t.is_empty(),
            bm_tree::Node::Element(_) | bm_tree::Node::Raw(_) => false,
        }),
        PseudoClass::Root => index.parent(id).is_none(),
    }
}

struct Parser {
    chars: Vec<char>,
    pos: usize,
    saw_universal: bool,
}

impl Parser {
    fn new(text: &str) -> Self {
        Self {
            chars: text.chars().collect(),
            pos: 0,
            saw_universal: false,
        }
    }

    fn peek(&self) -> Option<char> {
        self.chars.get(self.pos).copied()
    }

    fn peek_at(&self, offset: usize) -> Option<char> {
        self.chars.get(self.pos + offset).copied()
    }

    fn bump(&mut self) -> Option<char> {
        let ch = self.peek()?;
        self.pos += 1;
        Some(ch)
    }

    fn at_end(&self) -> bool {
        self.pos >= self.chars.len()
    }

    fn skip_ws(&mut self) -> bool {
        let start = self.pos;
        while self.peek().is_some_and(char::is_whitespace) {
            self.pos += 1;
        }
        self.pos > start
    }

    fn is_ident_char(ch: char) -> bool {
        ch.is_alphanumeric() || ch == '-' || ch == '_' || !ch.is_ascii()
    }

    fn ident(&mut self) -> Result<String, String> {
        let mut out = String::new();
        while let Some(ch) = self.peek() {
            if ch == '\\' {
                self.bump();
                match self.bump() {
                    Some(escaped) => out.push(escaped),
                    None => return Err("dangling escape".to_owned()),
                }
            } else if Self::is_ident_char(ch) {
                out.push(ch);
                self.bump();
            } else {
                break;
            }
        }
        if out.is_empty() {
            return Err("expected identifier".to_owned());
        }
        Ok(out)
    }

    /// Text up to the `)` closing an already consumed `(`.
    fn parenthesized(&mut self) -> Result<String, String> {
        let mut depth = 1usize;
        let mut out = String::new();
        while let Some(ch) = self.bump() {
            match ch {
                '(' => depth += 1,
                ')' => {
                    depth -= 1;
                    if depth == 0 {
                        return Ok(out);
                    }
                }
                _ => {}
            }
            out.push(ch);
        }
        Err("unclosed parenthesis".to_owned())
    }

    fn compound(
        &mut self,
        allow_pseudo_element: bool,
    ) -> Result<(Compound, Option<PseudoElement>), String> {
        let mut compound = Compound::default();
        self.saw_universal = false;

        match self.peek() {
            Some('*') => {
                self.bump();
                self.saw_universal = true;
            }
            Some(ch) if Self::is_ident_char(ch) || ch == '\\' => {
                compound.tag = Some(self.ident()?.to_ascii_lowercase());
            }
            _ => {}
        }

        loop {
            match self.peek() {
                Some('#') => {
                    self.bump();
                    compound.simple.push(Simple::Id(self.ident()?));
                }
                Some('.') => {
                    self.bump();
                    compound.simple.push(Simple::Class(self.ident()?));
                }
                Some('[') => {
                    self.bump();
                    compound.simple.push(Simple::Attr(self.attribute()?));
                }
                Some(':') => {
                    self.bump();
                    let double = self.peek() == Some(':');
                    if double {
                        self.bump();
                    }
                    let name = self.ident()?.to_ascii_lowercase();
                    let element = match name.as_str() {
                        "before" => Some(PseudoElement::Before),
                        "after" => Some(PseudoElement::After),
                        _ => None,
                    };
                    if let Some(element) = element {
                        if !allow_pseudo_element {
                            return Err("pseudo-element not allowed here".to_owned());
                        }
                        return Ok((compound, Some(element)));
                    }
                    if double {
                        return Err(format!("unsupported pseudo-element ::{name}"));
                    }
                    compound.simple.push(Simple::Pseudo(self.pseudo_class(&name)?));
                }
                _ => break,
            }
        }
        Ok((compound, None))
    }

    fn attribute(&mut self) -> Result<AttrSelector, String> {
        self.skip_ws();
        let name = self.ident()?.to_ascii_lowercase();
        self.skip_ws();
        let op = match (self.peek(), self.peek_at(1)) {
            (Some(']'), _) => {
                self.bump();
                return Ok(AttrSelector {
                    name,
                    op: None,
                    ignore_case: false,
                });
            }
            (Some('='), _) => {
                self.bump();
                AttrOp::Equals
            }
            (Some(c), Some('=')) => {
                let op = match c {
                    '~' => AttrOp::Includes,
                    '|' => AttrOp::DashMatch,
                    '^' => AttrOp::Prefix,
                    '$' => AttrOp::Suffix,
                    '*' => AttrOp::Substring,
                    other => return Err(format!("unknown attribute operator {other}=")),
                };
                self.pos += 2;
                op
            }
            _ => return Err("malformed attribute selector".to_owned()),
        };
        self.skip_ws();

        let value = match self.peek() {
            Some(q @ ('"' | '\'')) => {
                self.bump();
                let mut value = String::new();
                loop {
                    match self.bump() {
                        Some('\\') => {
                            if let Some(escaped) = self.bump() {
                                value.push(escaped);
                            }
                        }
                        Some(ch) if ch == q => break,
                        Some(ch) => value.push(ch),
                        None => return Err("unterminated string".to_owned()),
                    }
                }
                value
            }
            _ => self.ident()?,
        };

        self.skip_ws();
        let mut ignore_case = false;
        if matches!(self.peek(), Some('i' | 'I')) {
            self.bump();
            ignore_case = true;
            self.skip_ws();
        } else if matches!(self.peek(), Some('s' | 'S')) {
            self.bump();
            self.skip_ws();
        }
        if self.bump() != Some(']') {
            return Err("unclosed attribute selector".to_owned());
        }
        Ok(AttrSelector {
            name,
            op: Some((op, value)),
            ignore_case,
        })
    }

    fn pseudo_class(&mut self, name: &str) -> Result<PseudoClass, String> {
        let simple = match name {
            "first-child" => Some(PseudoClass::FirstChild),
            "last-child" => Some(PseudoClass::LastChild),
            "only-child" => Some(PseudoClass::OnlyChild),
            "first-of-type" => Some(PseudoClass::FirstOfType),
            "last-of-type" => Some(PseudoClass::LastOfType),
            "only-of-type" => Some(PseudoClass::OnlyOfType),
            "empty" => Some(PseudoClass::Empty),
            "root" => Some(PseudoClass::Root),
            _ => None,
        };
        if let Some(pseudo) = simple {
            return Ok(pseudo);
        }

        if self.peek() != Some('(') {
            return Err(format!("unsupported pseudo-class :{name}"));
        }
        self.bump();
        let arg = self.parenthesized()?;
        let nth = || Nth::parse(&arg).ok_or_else(|| format!("bad argument to :{name}"));
        match name {
            "nth-child" => Ok(PseudoClass::NthChild(nth()?)),
            "nth-last-child" => Ok(PseudoClass::NthLastChild(nth()?)),
            "nth-of-type" => Ok(PseudoClass::NthOfType(nth()?)),
            "nth-last-of-type" => Ok(PseudoClass::NthLastOfType(nth()?)),
            "not" => {
                let mut list = Vec::new();
                for part in arg.split(',') {
                    let mut inner = Parser::new(part.trim());
                    let (compound, _) = inner.compound(false)?;
                    if !inner.at_end() || (compound.is_empty() && !inner.saw_universal) {
                        return Err("unsupported :not() argument".to_owned());
                    }
                    list.push(compound);
                }
                Ok(PseudoClass::Not(list))
            }
            _ => Err(format!("unsupported pseudo-class :{name}()")),
        }
    }
}

#[cfg(test)]
mod tests {
    use bm_tree::{Node, parse_fragment};

    use super::*;

    /// Ids of elements matching `selector`, by tag and position.
    fn select(html: &str, selector: &str) -> Vec<String> {
        let nodes: Vec<Node> = parse_fragment(html).unwrap();
        let index = DocumentIndex::build(&nodes);
        let selector = Selector::parse(selector).unwrap();
        (0..index.len())
            .filter(|&id| selector.matches(&index, id))
            .map(|id| {
                let el = index.element(id);
                el.attr("id").unwrap_or(&el.tag).to_owned()
            })
            .collect()
    }

    #[test]
    fn test_specificity() {
        let spec = |s: &str| Selector::parse(s).unwrap().specificity();
        assert_eq!(spec("*"), Specificity(0, 0, 0));
        assert_eq!(spec("p"), Specificity(0, 0, 1));
        assert_eq!(spec("#bm-md p.note"), Specificity(1, 1, 1));
        assert_eq!(spec("ul li:first-child"), Specificity(0, 1, 2));
        assert_eq!(spec("a[href]:not(.x)"), Specificity(0, 2, 1));
        assert_eq!(spec("blockquote::before"), Specificity(0, 0, 2));
    }

    #[test]
    fn test_descendant_and_child() {
        let html = r#"<div id="d"><p id="p1"><span id="s1"></span></p><span id="s2"></span></div>"#;
        assert_eq!(select(html, "div span"), vec!["s1", "s2"]);
        assert_eq!(select(html, "div > span"), vec!["s2"]);
        assert_eq!(select(html, "#d>p>span"), vec!["s1"]);
    }

    #[test]
    fn test_sibling_combinators() {
        let html = r#"<h2 id="h"></h2><p id="a"></p><p id="b"></p>"#;
        assert_eq!(select(html, "h2 + p"), vec!["a"]);
        assert_eq!(select(html, "h2 ~ p"), vec!["a", "b"]);
    }

    #[test]
    fn test_structural_pseudo_classes() {
        let html = r#"<ul><li id="a"></li><li id="b"></li><li id="c"></li></ul>"#;
        assert_eq!(select(html, "li:first-child"), vec!["a"]);
        assert_eq!(select(html, "li:last-child"), vec!["c"]);
        assert_eq!(select(html, "li:nth-child(2n+1)"), vec!["a", "c"]);
        assert_eq!(select(html, "li:nth-child(even)"), vec!["b"]);
        assert_eq!(select(html, "li:nth-last-child(1)"), vec!["c"]);
        assert_eq!(select(html, "li:not(:first-child)"), vec!["b", "c"]);
    }

    #[test]
    fn test_of_type_pseudo_classes() {
        let html = r#"<div><h1 id="h"></h1><p id="a"></p><p id="b"></p></div>"#;
        assert_eq!(select(html, "p:first-of-type"), vec!["a"]);
        assert_eq!(select(html, "p:last-of-type"), vec!["b"]);
        assert_eq!(select(html, "h1:only-of-type"), vec!["h"]);
    }

    #[test]
    fn test_attribute_operators() {
        let html = r#"<a id="x" href="https://a.test/doc.pdf" lang="en-US"></a><a id="y" href="/local"></a>"#;
        assert_eq!(select(html, "a[href^=\"https\"]"), vec!["x"]);
        assert_eq!(select(html, "a[href$='.pdf']"), vec!["x"]);
        assert_eq!(select(html, "a[href*=local]"), vec!["y"]);
        assert_eq!(select(html, "[lang|=en]"), vec!["x"]);
        assert_eq!(select(html, "a[HREF^='HTTPS' i]"), vec!["x"]);
    }

    #[test]
    fn test_empty_pseudo_class() {
        let html = r#"<p id="a"></p><p id="b">x</p>"#;
        assert_eq!(select(html, "p:empty"), vec!["a"]);
    }

    #[test]
    fn test_pseudo_elements() {
        assert_eq!(
            Selector::parse("h2::before").unwrap().pseudo_element(),
            Some(PseudoElement::Before)
        );
        assert_eq!(
            Selector::parse("h2:after").unwrap().pseudo_element(),
            Some(PseudoElement::After)
        );
        assert!(Selector::parse("p::first-line").is_err());
        assert!(Selector::parse("p::before span").is_err());
    }

    #[test]
    fn test_dynamic_pseudo_classes_rejected() {
        assert!(Selector::parse("a:hover").is_err());
        assert!(Selector::parse("input:focus").is_err());
    }

    #[test]
    fn test_nth_parse() {
        assert_eq!(Nth::parse("-n+3"), Some(Nth { a: -1, b: 3 }));
        assert_eq!(Nth::parse("3"), Some(Nth { a: 0, b: 3 }));
        assert_eq!(Nth::parse("2n - 1"), Some(Nth { a: 2, b: -1 }));
        assert!(Nth { a: -1, b: 3 }.matches(3));
        assert!(!Nth { a: -1, b: 3 }.matches(4));
    }
}
