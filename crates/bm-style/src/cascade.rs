//! Cascade resolution and style inlining.
//!
//! Matching runs against a read-only [`DocumentIndex`]; the resolved styles
//! are then written back in a second walk over the same elements in the same
//! order. Candidates for a property are ranked by importance, origin (an
//! element's own `style` attribute beats stylesheet rules), specificity and
//! finally source order.

use bm_tree::{Element, Node};

use crate::index::DocumentIndex;
use crate::selector::{PseudoElement, Specificity};
use crate::syntax::{Declaration, Stylesheet, format_declarations, parse_declarations};

struct Candidate<'d> {
    decl: &'d Declaration,
    inline: bool,
    specificity: Specificity,
    order: (usize, usize),
}

impl Candidate<'_> {
    fn rank(&self) -> (bool, bool, Specificity, (usize, usize)) {
        (self.decl.important, self.inline, self.specificity, self.order)
    }
}

/// Text and style of a `::before` / `::after` box.
#[derive(Debug, Default)]
struct Generated {
    text: String,
    style: String,
}

#[derive(Debug, Default)]
struct Computed {
    style: Option<String>,
    before: Option<Generated>,
    after: Option<Generated>,
}

/// Inlines one stylesheet into node trees.
pub struct Inliner<'s> {
    sheet: &'s Stylesheet,
}

impl<'s> Inliner<'s> {
    #[must_use]
    pub fn new(sheet: &'s Stylesheet) -> Self {
        Self { sheet }
    }

    /// Merge matching declarations into every element's `style` attribute and
    /// materialize generated content as leading/trailing `span` children.
    pub fn apply(&self, nodes: &mut [Node]) {
        let computed: Vec<Computed> = {
            let index = DocumentIndex::build(nodes);
            (0..index.len()).map(|id| self.compute(&index, id)).collect()
        };
        let mut computed = computed.into_iter();
        write_back(nodes, &mut computed);
    }

    fn compute(&self, index: &DocumentIndex<'_>, id: usize) -> Computed {
        let el = index.element(id);
        let inline_decls = el.attr("style").map(parse_declarations).unwrap_or_default();
        let mut own = Vec::new();
        let mut before = Vec::new();
        let mut after = Vec::new();

        for (rule_order, rule) in self.sheet.rules.iter().enumerate() {
            let mut best: [Option<Specificity>; 3] = [None; 3];
            for selector in &rule.selectors {
                if selector.matches(index, id) {
                    let slot = match selector.pseudo_element() {
                        None => 0,
                        Some(PseudoElement::Before) => 1,
                        Some(PseudoElement::After) => 2,
                    };
                    let spec = selector.specificity();
                    best[slot] = Some(best[slot].map_or(spec, |cur| cur.max(spec)));
                }
            }
            for (slot, specificity) in best.into_iter().enumerate() {
                let Some(specificity) = specificity else {
                    continue;
                };
                let target = match slot {
                    0 => &mut own,
                    1 => &mut before,
                    _ => &mut after,
                };
                target.extend(rule.declarations.iter().enumerate().map(|(i, decl)| {
                    Candidate {
                        decl,
                        inline: false,
                        specificity,
                        order: (rule_order, i),
                    }
                }));
            }
        }

        own.extend(inline_decls.iter().enumerate().map(|(i, decl)| Candidate {
            decl,
            inline: true,
            specificity: Specificity::default(),
            order: (usize::MAX, i),
        }));

        let style = if own.is_empty() {
            None
        } else {
            Some(format_declarations(resolve(own)))
        };
        Computed {
            style,
            before: generate(el, before),
            after: generate(el, after),
        }
    }
}

/// Pick one winner per property, emitted lowest-ranked origin first.
fn resolve<'d>(candidates: Vec<Candidate<'d>>) -> Vec<&'d Declaration> {
    let mut winners: Vec<Candidate<'_>> = Vec::new();
    for candidate in candidates {
        match winners
            .iter_mut()
            .find(|w| w.decl.name == candidate.decl.name)
        {
            Some(current) if candidate.rank() >= current.rank() => *current = candidate,
            Some(_) => {}
            None => winners.push(candidate),
        }
    }
    winners.sort_by_key(|w| (w.inline, w.specificity, w.order));
    winners.into_iter().map(|w| w.decl).collect()
}

fn generate(el: &Element, candidates: Vec<Candidate<'_>>) -> Option<Generated> {
    if candidates.is_empty() {
        return None;
    }
    let winners = resolve(candidates);
    let content = *winners.iter().find(|d| d.name == "content")?;
    let text = evaluate_content(&content.value, el)?;
    let style = format_declarations(winners.into_iter().filter(|d| d.name != "content"));
    Some(Generated { text, style })
}

/// Evaluate a `content` value. `None` means no box is generated.
fn evaluate_content(value: &str, el: &Element) -> Option<String> {
    let value = value.trim();
    if value.eq_ignore_ascii_case("none") || value.eq_ignore_ascii_case("normal") {
        return None;
    }

    let mut out = String::new();
    let mut chars = value.chars().peekable();
    while let Some(&ch) = chars.peek() {
        match ch {
            '"' | '\'' => {
                chars.next();
                while let Some(c) = chars.next() {
                    match c {
                        '\\' => push_css_escape(&mut chars, &mut out),
                        c if c == ch => break,
                        c => out.push(c),
                    }
                }
            }
            c if c.is_whitespace() => {
                chars.next();
            }
            _ => {
                let mut word = String::new();
                while let Some(&c) = chars.peek() {
                    if c.is_whitespace() || c == '"' || c == '\'' {
                        break;
                    }
                    word.push(c);
                    chars.next();
                    if c == '(' {
                        for c in chars.by_ref() {
                            word.push(c);
                            if c == ')' {
                                break;
                            }
                        }
                    }
                }
                match word.to_ascii_lowercase().as_str() {
                    "open-quote" => out.push('\u{201c}'),
                    "close-quote" => out.push('\u{201d}'),
                    lower if lower.starts_with("attr(") => {
                        let name = word[5..].trim_end_matches(')').trim();
                        out.push_str(el.attr(name).unwrap_or_default());
                    }
                    // Counters, images and quote toggles produce nothing inline
                    _ => {}
                }
            }
        }
    }
    Some(out)
}

/// Decode a CSS escape after its backslash: up to six hex digits plus one
/// optional whitespace, or a literal character.
fn push_css_escape(chars: &mut std::iter::Peekable<std::str::Chars<'_>>, out: &mut String) {
    let mut hex = String::new();
    while hex.len() < 6 {
        match chars.peek() {
            Some(c) if c.is_ascii_hexdigit() => {
                hex.push(*c);
                chars.next();
            }
            _ => break,
        }
    }
    if hex.is_empty() {
        if let Some(c) = chars.next() {
            out.push(c);
        }
        return;
    }
    if chars.peek().is_some_and(|c| c.is_whitespace()) {
        chars.next();
    }
    let ch = u32::from_str_radix(&hex, 16)
        .ok()
        .and_then(char::from_u32)
        .unwrap_or('\u{fffd}');
    out.push(ch);
}

fn write_back(nodes: &mut [Node], computed: &mut impl Iterator<Item = Computed>) {
    for node in nodes {
        let Node::Element(el) = node else {
            continue;
        };
        let Some(result) = computed.next() else {
            return;
        };
        match result.style {
            Some(style) if !style.is_empty() => el.attrs.set("style", style),
            _ => {
                el.attrs.remove("style");
            }
        }
        write_back(&mut el.children, computed);

        if let Some(generated) = result.before {
            el.children.insert(0, generated_span(generated));
        }
        if let Some(generated) = result.after {
            el.children.push(generated_span(generated));
        }
    }
}

fn generated_span(generated: Generated) -> Node {
    let mut span = Element::new("span");
    if !generated.style.is_empty() {
        span.attrs.set("style", generated.style);
    }
    if !generated.text.is_empty() {
        span.children.push(Node::Text(generated.text));
    }
    Node::Element(span)
}

#[cfg(test)]
mod tests {
    use bm_tree::{parse_fragment, to_html};
    use pretty_assertions::assert_eq;

    use super::*;
    use crate::syntax::parse_stylesheet;

    fn inline(html: &str, css: &str) -> String {
        let sheet = parse_stylesheet(css).unwrap();
        let mut nodes = parse_fragment(html).unwrap();
        Inliner::new(&sheet).apply(&mut nodes);
        to_html(&nodes)
    }

    #[test]
    fn test_simple_rule_inlined() {
        assert_eq!(
            inline("<p>x</p>", "p { color: red; }"),
            "<p style=\"color: red;\">x</p>"
        );
    }

    #[test]
    fn test_specificity_beats_order() {
        let css = "#a { color: blue } p { color: red }";
        assert_eq!(
            inline("<p id=\"a\">x</p>", css),
            "<p id=\"a\" style=\"color: blue;\">x</p>"
        );
    }

    #[test]
    fn test_later_rule_wins_on_tie() {
        let css = "p { color: red } p { color: green }";
        assert_eq!(inline("<p>x</p>", css), "<p style=\"color: green;\">x</p>");
    }

    #[test]
    fn test_existing_inline_style_wins() {
        let html = "<p style=\"color: black\">x</p>";
        assert_eq!(
            inline(html, "p { color: red; margin: 0 }"),
            "<p style=\"margin: 0; color: black;\">x</p>"
        );
    }

    #[test]
    fn test_important_beats_inline_and_is_preserved() {
        let html = "<p style=\"color: black\">x</p>";
        assert_eq!(
            inline(html, "p { color: red !important }"),
            "<p style=\"color: red !important;\">x</p>"
        );
    }

    #[test]
    fn test_unmatched_elements_untouched() {
        assert_eq!(inline("<em>x</em>", "p { color: red }"), "<em>x</em>");
    }

    #[test]
    fn test_before_and_after_generated() {
        let css = "h2::before { content: \"# \"; color: gray } h2::after { content: attr(data-x) }";
        assert_eq!(
            inline("<h2 data-x=\"!\">T</h2>", css),
            "<h2 data-x=\"!\"><span style=\"color: gray;\"># </span>T<span>!</span></h2>"
        );
    }

    #[test]
    fn test_generated_content_none_skipped() {
        assert_eq!(
            inline("<p>x</p>", "p::before { content: none; color: red }"),
            "<p>x</p>"
        );
    }

    #[test]
    fn test_generated_spans_do_not_shift_styles() {
        let css = "li::before { content: \"\\2022 \" } li { color: red } em { color: blue }";
        assert_eq!(
            inline("<li>a</li><li><em>b</em></li>", css),
            "<li style=\"color: red;\"><span>\u{2022}</span>a</li>\
             <li style=\"color: red;\"><span>\u{2022}</span><em style=\"color: blue;\">b</em></li>"
        );
    }

    #[test]
    fn test_output_is_deterministic() {
        let css = "p { margin: 0; color: red } .a { padding: 1px } #b { border: 0 }";
        let html = "<p class=\"a\" id=\"b\">x</p>";
        assert_eq!(inline(html, css), inline(html, css));
        assert_eq!(
            inline(html, css),
            "<p class=\"a\" id=\"b\" style=\"margin: 0; color: red; padding: 1px; border: 0;\">x</p>"
        );
    }
}
