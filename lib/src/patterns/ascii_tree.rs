/*! Functions that return an ASCII representation of pattern trees. */

use ::ascii_tree::Tree;
use ::ascii_tree::Tree::{Leaf, Node};

use crate::patterns::{PatternId, PatternPool};

impl PatternPool {
    /// Returns a representation of the pattern as an ASCII tree.
    pub fn ascii_tree(&self, id: PatternId) -> Option<Tree> {
        let node = self.get(id)?;

        let mut label = match &node.meta.name {
            Some(name) => format!("{} ({})", node.kind, name),
            None => node.kind.to_string(),
        };

        if node.matcher.is_some() {
            label.push_str(" [matcher]");
        }

        if node.kind.is_terminal() {
            return Some(Leaf(vec![label]));
        }

        Some(Node(
            label,
            node.kind
                .subs()
                .iter()
                .filter_map(|sub| self.ascii_tree(*sub))
                .collect(),
        ))
    }

    /// Returns a string with an ASCII tree that represents the pattern.
    pub fn ascii_tree_string(&self, id: PatternId) -> String {
        let mut buf = String::new();
        if let Some(tree) = self.ascii_tree(id) {
            // Writing to a `String` never fails.
            let _ = ::ascii_tree::write_tree(&mut buf, &tree);
        }
        buf
    }
}
