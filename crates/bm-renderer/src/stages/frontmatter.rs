//! Frontmatter to key/value table.

use bm_tree::{Element, Node};

use super::{Stage, StageContext};
use crate::document::{Document, Frontmatter, FrontmatterKind};
use crate::error::{RenderError, StageError};

/// Replaces a leading YAML/TOML block with a two-column table.
///
/// Values are rendered as inline markdown. Blocks that fail to parse are
/// kept as a code block and reported as a warning.
#[derive(Clone, Copy, Debug, Default)]
pub struct FrontmatterTable;

impl Stage for FrontmatterTable {
    fn name(&self) -> &'static str {
        "frontmatter-table"
    }

    fn apply(&self, doc: &mut Document, ctx: &mut StageContext<'_>) -> Result<(), RenderError> {
        let Some(frontmatter) = doc.frontmatter.take() else {
            return Ok(());
        };

        match entries(&frontmatter) {
            Ok(entries) if entries.is_empty() => {}
            Ok(entries) => {
                let mut rows = Vec::with_capacity(entries.len());
                for (key, value) in entries {
                    let value = ctx.parser.parse_inline(&value);
                    doc.has_math |= value.has_math;
                    rows.push(
                        Element::new("tr")
                            .with_child(
                                Element::new("td")
                                    .with_class("frontmatter-key")
                                    .with_text(key),
                            )
                            .with_child(
                                Element::new("td")
                                    .with_class("frontmatter-value")
                                    .with_children(ctx.sanitizer.sanitize(value.nodes)),
                            )
                            .into(),
                    );
                }
                let table = Element::new("table")
                    .with_class("frontmatter-table")
                    .with_child(Element::new("tbody").with_children(rows));
                doc.nodes.insert(0, table.into());
            }
            Err(e) => {
                ctx.warn(self.name(), &e);
                doc.nodes.insert(0, source_block(&frontmatter));
            }
        }
        Ok(())
    }
}

/// Top-level keys and formatted values in document order.
fn entries(frontmatter: &Frontmatter) -> Result<Vec<(String, String)>, StageError> {
    match frontmatter.kind {
        FrontmatterKind::Yaml => {
            let value: serde_yaml::Value = serde_yaml::from_str(&frontmatter.source)?;
            match value {
                serde_yaml::Value::Null => Ok(Vec::new()),
                serde_yaml::Value::Mapping(map) => map
                    .iter()
                    .map(|(key, value)| Ok((format_yaml(key)?, format_yaml(value)?)))
                    .collect(),
                _ => Err(StageError::NotAMapping),
            }
        }
        FrontmatterKind::Toml => {
            let table: toml::Table = toml::from_str(&frontmatter.source)?;
            table
                .iter()
                .map(|(key, value)| Ok((key.clone(), format_toml(value)?)))
                .collect()
        }
    }
}

fn format_yaml(value: &serde_yaml::Value) -> Result<String, StageError> {
    use serde_yaml::Value;
    Ok(match value {
        Value::Null => String::new(),
        Value::Bool(b) => b.to_string(),
        Value::Number(n) => n.to_string(),
        Value::String(s) => s.clone(),
        Value::Sequence(items) => items
            .iter()
            .map(format_yaml)
            .collect::<Result<Vec<_>, _>>()?
            .join(", "),
        Value::Mapping(_) => serde_json::to_string(value)?,
        Value::Tagged(tagged) => format_yaml(&tagged.value)?,
    })
}

fn format_toml(value: &toml::Value) -> Result<String, StageError> {
    use toml::Value;
    Ok(match value {
        Value::String(s) => s.clone(),
        Value::Integer(i) => i.to_string(),
        Value::Float(f) => f.to_string(),
        Value::Boolean(b) => b.to_string(),
        Value::Datetime(d) => d.to_string(),
        Value::Array(items) => items
            .iter()
            .map(format_toml)
            .collect::<Result<Vec<_>, _>>()?
            .join(", "),
        Value::Table(_) => serde_json::to_string(value)?,
    })
}

fn source_block(frontmatter: &Frontmatter) -> Node {
    Element::new("pre")
        .with_class("frontmatter")
        .with_child(
            Element::new("code")
                .with_class(format!("language-{}", frontmatter.kind.language()))
                .with_text(frontmatter.source.clone()),
        )
        .into()
}

#[cfg(test)]
mod tests {
    use bm_tree::to_html;
    use pretty_assertions::assert_eq;

    use super::*;
    use crate::highlight::NoHighlighter;
    use crate::markdown::MarkdownParser;
    use crate::math::SourceMathRenderer;
    use crate::request::RenderRequest;
    use crate::sanitize::Sanitizer;

    fn run(kind: FrontmatterKind, source: &str) -> (String, Vec<String>) {
        let (doc, warnings) = run_doc(kind, source);
        (to_html(&doc.nodes), warnings)
    }

    fn run_doc(kind: FrontmatterKind, source: &str) -> (Document, Vec<String>) {
        let request = RenderRequest::default();
        let parser =
            MarkdownParser::with_renderers(Box::new(NoHighlighter), Box::new(SourceMathRenderer));
        let sanitizer = Sanitizer::default();
        let mut ctx = StageContext::new(&request, &parser, &sanitizer);
        let mut doc = Document {
            nodes: vec![Element::new("p").with_text("Body").into()],
            frontmatter: Some(Frontmatter {
                kind,
                source: source.to_owned(),
            }),
            has_math: false,
        };
        FrontmatterTable.apply(&mut doc, &mut ctx).unwrap();
        assert!(doc.frontmatter.is_none());
        (doc, ctx.into_warnings())
    }

    #[test]
    fn test_yaml_becomes_table() {
        let (html, warnings) = run(FrontmatterKind::Yaml, "title: Test\n");
        assert!(warnings.is_empty());
        assert_eq!(
            html,
            concat!(
                r#"<table class="frontmatter-table"><tbody><tr>"#,
                r#"<td class="frontmatter-key">title</td><td class="frontmatter-value">Test</td>"#,
                "</tr></tbody></table><p>Body</p>"
            )
        );
    }

    #[test]
    fn test_keys_keep_document_order() {
        let (html, _) = run(FrontmatterKind::Yaml, "zeta: 1\nalpha: 2\n");
        assert!(html.find("zeta").unwrap() < html.find("alpha").unwrap());
    }

    #[test]
    fn test_values_rendered_as_inline_markdown() {
        let (html, _) = run(FrontmatterKind::Yaml, "desc: \"**bold** <script>x</script>\"\n");
        assert!(html.contains("<strong>bold</strong>"), "{html}");
        assert!(!html.contains("script"));
    }

    #[test]
    fn test_value_formatting() {
        let yaml = |s: &str| format_yaml(&serde_yaml::from_str(s).unwrap()).unwrap();
        assert_eq!(yaml("[a, 1, true]"), "a, 1, true");
        assert_eq!(yaml("{a: 1}"), r#"{"a":1}"#);
        assert_eq!(format_yaml(&serde_yaml::Value::Null).unwrap(), "");
    }

    #[test]
    fn test_unprintable_nested_value_reported() {
        let source = "title: T\nmeta:\n  ? [a, b]\n  : 1\n";
        let (html, warnings) = run(FrontmatterKind::Yaml, source);
        assert_eq!(warnings.len(), 1);
        assert!(warnings[0].contains("cannot be displayed"), "{warnings:?}");
        assert!(html.starts_with(r#"<pre class="frontmatter">"#), "{html}");
    }

    #[test]
    fn test_math_value_marks_document() {
        let (doc, warnings) = run_doc(FrontmatterKind::Yaml, "formula: \"$x^2$\"\n");
        assert!(warnings.is_empty());
        assert!(doc.has_math);
        assert!(to_html(&doc.nodes).contains(r#"class="katex""#));
    }

    #[test]
    fn test_plain_values_leave_math_flag_unset() {
        let (doc, _) = run_doc(FrontmatterKind::Yaml, "title: Test\n");
        assert!(!doc.has_math);
    }

    #[test]
    fn test_toml_becomes_table() {
        let (html, warnings) = run(FrontmatterKind::Toml, "title = \"T\"\ntags = [\"a\", \"b\"]\n");
        assert!(warnings.is_empty());
        assert!(html.contains(r#"<td class="frontmatter-value">a, b</td>"#), "{html}");
    }

    #[test]
    fn test_invalid_yaml_kept_as_code() {
        let (html, warnings) = run(FrontmatterKind::Yaml, "title: [unclosed\n");
        assert_eq!(warnings.len(), 1);
        assert!(html.starts_with(r#"<pre class="frontmatter"><code class="language-yaml">title: [unclosed"#));
        assert!(html.ends_with("<p>Body</p>"));
    }

    #[test]
    fn test_scalar_frontmatter_kept_as_code() {
        let (html, warnings) = run(FrontmatterKind::Yaml, "just text\n");
        assert_eq!(warnings, vec!["frontmatter-table: frontmatter is not a mapping".to_owned()]);
        assert!(html.starts_with("<pre"));
    }

    #[test]
    fn test_empty_frontmatter_dropped() {
        let (html, warnings) = run(FrontmatterKind::Yaml, "");
        assert!(warnings.is_empty());
        assert_eq!(html, "<p>Body</p>");
    }
}
