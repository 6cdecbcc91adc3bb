//! HTML tree model for the bm rendering pipeline.
//!
//! Provides the owned [`Node`]/[`Element`] tree every rewrite stage works on,
//! a lenient fragment parser built on `quick-xml`, and a deterministic HTML
//! serializer.
//!
//! ```
//! use bm_tree::{parse_fragment, to_html};
//!
//! let nodes = parse_fragment("<p>Hello&nbsp;<b>world</b></p>").unwrap();
//! assert_eq!(to_html(&nodes), "<p>Hello\u{a0}<b>world</b></p>");
//! ```

mod entities;
mod error;
mod node;
mod parser;
mod serializer;

pub use entities::{decode_entities, decode_entity};
pub use error::TreeError;
pub use node::{
    AttrValue, Attributes, ClassList, Element, Node, VOID_ELEMENTS, for_each_element,
    for_each_element_mut, is_void_element, text_content,
};
pub use parser::{HtmlParser, Token, TreeBuilder, parse_fragment};
pub use serializer::{element_to_html, escape_html, to_html};
