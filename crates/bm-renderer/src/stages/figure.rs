//! Figure wrapping for images and tables.

use bm_tree::{Element, Node};

use super::{Stage, StageContext};
use crate::document::Document;
use crate::error::RenderError;

/// Wraps standalone images, image links and tables in `figure` elements.
///
/// Images with alt text get a `figcaption`. Images already inside a
/// `figure`, `picture` or `a`, tables already inside a `figure`, and the
/// frontmatter table are left alone.
#[derive(Clone, Copy, Debug, Default)]
pub struct FigureWrapper;

impl Stage for FigureWrapper {
    fn name(&self) -> &'static str {
        "figure-wrapper"
    }

    fn apply(&self, doc: &mut Document, _ctx: &mut StageContext<'_>) -> Result<(), RenderError> {
        wrap_children(&mut doc.nodes, None);
        Ok(())
    }
}

fn wrap_children(children: &mut [Node], parent: Option<&str>) {
    for node in children.iter_mut() {
        let Node::Element(el) = node else {
            continue;
        };
        let kind = if is_image_link(el) {
            (parent != Some("figure")).then_some("figure-image")
        } else if el.is("img") {
            (!matches!(parent, Some("figure" | "picture" | "a"))).then_some("figure-image")
        } else if el.is("table") {
            (parent != Some("figure") && !el.has_class("frontmatter-table")).then_some("figure-table")
        } else {
            None
        };

        match kind {
            Some(class) => {
                // Wrapped nodes are not revisited
                let inner = std::mem::take(el);
                *el = figure(class, inner);
            }
            None => {
                let tag = el.tag.clone();
                wrap_children(&mut el.children, Some(&tag));
            }
        }
    }
}

fn figure(class: &str, inner: Element) -> Element {
    let caption = if class == "figure-table" {
        String::new()
    } else {
        image_alt(&inner)
    };
    let mut figure = Element::new("figure").with_class(class).with_child(inner);
    if !caption.is_empty() {
        figure = figure.with_child(Element::new("figcaption").with_text(caption));
    }
    figure
}

/// A link whose only non-blank child is an image.
fn is_image_link(el: &Element) -> bool {
    if !el.is("a") {
        return false;
    }
    let mut significant = el.children.iter().filter(|c| !c.is_whitespace_text());
    matches!(
        (significant.next(), significant.next()),
        (Some(node), None) if node.is_element("img")
    )
}

fn image_alt(el: &Element) -> String {
    let img = if el.is("img") {
        Some(el)
    } else {
        el.element_children().find(|c| c.is("img"))
    };
    img.and_then(|img| img.attr("alt"))
        .map(str::trim)
        .unwrap_or_default()
        .to_owned()
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;

    use super::*;
    use crate::stages::test_support::apply;

    #[test]
    fn test_image_with_alt_gets_caption() {
        assert_eq!(
            apply(&FigureWrapper, r#"<p><img src="a.png" alt=" Cat "></p>"#),
            r#"<p><figure class="figure-image"><img src="a.png" alt=" Cat "><figcaption>Cat</figcaption></figure></p>"#
        );
    }

    #[test]
    fn test_image_without_alt() {
        assert_eq!(
            apply(&FigureWrapper, r#"<img src="a.png" alt="">"#),
            r#"<figure class="figure-image"><img src="a.png" alt=""></figure>"#
        );
    }

    #[test]
    fn test_image_link_wrapped_as_a_whole() {
        assert_eq!(
            apply(&FigureWrapper, r#"<a href="/x"> <img src="a.png" alt="A"> </a>"#),
            r#"<figure class="figure-image"><a href="/x"> <img src="a.png" alt="A"> </a><figcaption>A</figcaption></figure>"#
        );
    }

    #[test]
    fn test_image_inside_text_link_untouched() {
        let html = r#"<a href="/x">see <img src="a.png"></a>"#;
        assert_eq!(apply(&FigureWrapper, html), html);
    }

    #[test]
    fn test_picture_and_figure_untouched() {
        for html in [
            r#"<picture><img src="a.png"></picture>"#,
            r#"<figure><img src="a.png"></figure>"#,
            "<figure><table></table></figure>",
        ] {
            assert_eq!(apply(&FigureWrapper, html), html);
        }
    }

    #[test]
    fn test_table_wrapped_once() {
        let once = apply(&FigureWrapper, "<table><tr><td>1</td></tr></table>");
        assert_eq!(
            once,
            r#"<figure class="figure-table"><table><tr><td>1</td></tr></table></figure>"#
        );
        assert_eq!(apply(&FigureWrapper, &once), once);
    }

    #[test]
    fn test_frontmatter_table_not_wrapped() {
        let html = r#"<table class="frontmatter-table"></table>"#;
        assert_eq!(apply(&FigureWrapper, html), html);
    }
}
