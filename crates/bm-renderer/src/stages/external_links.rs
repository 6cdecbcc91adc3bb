//! Open external links in a new window.

use bm_tree::for_each_element_mut;
use url::Url;

use super::{Stage, StageContext};
use crate::document::Document;
use crate::error::RenderError;

/// Adds `target="_blank"` and `rel="noreferrer noopener"` to absolute
/// `http(s)` links when the request asks for it.
#[derive(Clone, Copy, Debug, Default)]
pub struct ExternalLinks;

impl Stage for ExternalLinks {
    fn name(&self) -> &'static str {
        "external-links"
    }

    fn apply(&self, doc: &mut Document, ctx: &mut StageContext<'_>) -> Result<(), RenderError> {
        if !ctx.request.open_links_in_new_window {
            return Ok(());
        }
        for_each_element_mut(&mut doc.nodes, &mut |el| {
            if el.is("a") && el.attr("href").is_some_and(is_external) {
                el.attrs.set("target", "_blank");
                el.attrs.set("rel", "noreferrer noopener");
            }
        });
        Ok(())
    }
}

/// Absolute `http`/`https` URL.
pub(crate) fn is_external(href: &str) -> bool {
    Url::parse(href.trim()).is_ok_and(|url| matches!(url.scheme(), "http" | "https"))
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;

    use super::*;
    use crate::request::RenderRequest;
    use crate::stages::test_support::{apply, run};

    #[test]
    fn test_external_link_opens_new_window() {
        assert_eq!(
            apply(&ExternalLinks, r#"<a href="https://x.test">x</a>"#),
            r#"<a href="https://x.test" target="_blank" rel="noreferrer noopener">x</a>"#
        );
    }

    #[test]
    fn test_relative_and_mail_links_untouched() {
        for html in [
            r##"<a href="#top">x</a>"##,
            r#"<a href="/docs">x</a>"#,
            r#"<a href="mailto:a@b.c">x</a>"#,
        ] {
            assert_eq!(apply(&ExternalLinks, html), html);
        }
    }

    #[test]
    fn test_disabled_by_request() {
        let request = RenderRequest::default().with_new_window(false);
        let html = r#"<a href="https://x.test">x</a>"#;
        assert_eq!(run(&ExternalLinks, html, &request).0, html);
    }

    #[test]
    fn test_is_external() {
        assert!(is_external("http://a.test/x"));
        assert!(is_external(" HTTPS://a.test "));
        assert!(!is_external("./a"));
        assert!(!is_external("tel:123"));
    }
}
