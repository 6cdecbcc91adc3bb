//! Flattened view of a node tree for selector matching.
//!
//! Elements are numbered in document (pre-)order, the same order in which
//! [`bm_tree::for_each_element_mut`] visits them, so results computed against
//! the index can be applied to the tree in a second pass.

use bm_tree::{Element, Node};

struct Entry<'a> {
    el: &'a Element,
    parent: Option<usize>,
    group: usize,
    position: usize,
}

pub(crate) struct DocumentIndex<'a> {
    entries: Vec<Entry<'a>>,
    /// Element ids of each sibling list, in order.
    groups: Vec<Vec<usize>>,
}

impl<'a> DocumentIndex<'a> {
    pub fn build(nodes: &'a [Node]) -> Self {
        let mut index = Self {
            entries: Vec::new(),
            groups: Vec::new(),
        };
        index.visit(nodes, None);
        index
    }

    fn visit(&mut self, nodes: &'a [Node], parent: Option<usize>) {
        let group = self.groups.len();
        self.groups.push(Vec::new());
        for node in nodes {
            if let Node::Element(el) = node {
                let id = self.entries.len();
                let position = self.groups[group].len();
                self.groups[group].push(id);
                self.entries.push(Entry {
                    el,
                    parent,
                    group,
                    position,
                });
                self.visit(&el.children, Some(id));
            }
        }
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn element(&self, id: usize) -> &'a Element {
        self.entries[id].el
    }

    pub fn parent(&self, id: usize) -> Option<usize> {
        self.entries[id].parent
    }

    /// Element siblings before `id`, nearest last.
    pub fn preceding_siblings(&self, id: usize) -> &[usize] {
        let entry = &self.entries[id];
        &self.groups[entry.group][..entry.position]
    }

    /// Element siblings after `id`.
    pub fn following_siblings(&self, id: usize) -> &[usize] {
        let entry = &self.entries[id];
        &self.groups[entry.group][entry.position + 1..]
    }
}

#[cfg(test)]
mod tests {
    use bm_tree::parse_fragment;

    use super::*;

    #[test]
    fn test_index_in_document_order() {
        let nodes = parse_fragment("<div><p>a</p><p>b<em>c</em></p></div><hr>").unwrap();
        let index = DocumentIndex::build(&nodes);
        let tags: Vec<_> = (0..index.len()).map(|i| index.element(i).tag.as_str()).collect();
        assert_eq!(tags, vec!["div", "p", "p", "em", "hr"]);
        assert_eq!(index.parent(3), Some(2));
        assert_eq!(index.preceding_siblings(2), &[1]);
        assert_eq!(index.following_siblings(0), &[4]);
        assert_eq!(index.parent(4), None);
    }
}
