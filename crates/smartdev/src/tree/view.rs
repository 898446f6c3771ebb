//! Expand/collapse and selection state kept consistent across rebuilds.

use std::collections::BTreeSet;
use std::collections::HashMap;
use std::collections::HashSet;

use serde::Deserialize;
use serde::Serialize;
use tracing::debug;
use tracing::trace;

use super::build_tree;
use super::parent_of;
use super::TreeError;
use super::TreeNode;
use super::TreeOptions;
use crate::objects::Objects;

/// User-facing tree state.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TreeState {
    pub expanded: BTreeSet<String>,
    pub selected: Option<String>,
}

impl TreeState {
    pub fn is_expanded(&self, id: &str) -> bool {
        self.expanded.contains(id)
    }

    /// Flip the expansion of `id`, returning whether it is now expanded.
    pub fn toggle(&mut self, id: &str) -> bool {
        if self.expanded.remove(id) {
            false
        } else {
            self.expanded.insert(id.to_string());
            true
        }
    }

    /// Expand every ancestor of `id` so that its row becomes visible.
    pub fn expand_to(&mut self, id: &str) {
        let mut current = parent_of(id);
        while let Some(parent) = current {
            self.expanded.insert(parent.to_string());
            current = parent_of(parent);
        }
    }

    pub fn select(&mut self, id: Option<String>) {
        self.selected = id;
    }

    /// Drop state that refers to nodes no longer present.
    ///
    /// Vanished expanded ids are forgotten; a vanished selection moves to its
    /// nearest surviving ancestor, or is cleared. Returns whether anything
    /// changed.
    pub fn reconcile(&mut self, nodes: &[TreeNode]) -> bool {
        let ids: HashSet<&str> = nodes.iter().map(|node| node.id.as_str()).collect();

        let before = self.expanded.len();
        self.expanded.retain(|id| ids.contains(id.as_str()));
        let mut changed = before != self.expanded.len();

        if let Some(selected) = self.selected.take() {
            if ids.contains(selected.as_str()) {
                self.selected = Some(selected);
            } else {
                let mut current = parent_of(&selected);
                while let Some(parent) = current {
                    if ids.contains(parent) {
                        self.selected = Some(parent.to_string());
                        break;
                    }
                    current = parent_of(parent);
                }
                changed = true;
            }
        }

        changed
    }
}

/// Visible rows: roots in index order, descending only into expanded nodes.
pub fn visible_rows<'a>(nodes: &'a [TreeNode], state: &TreeState) -> Vec<&'a TreeNode> {
    let mut children: HashMap<usize, Vec<usize>> = HashMap::new();
    let mut roots = Vec::new();
    for node in nodes {
        match node.parent_index {
            Some(parent) => children.entry(parent).or_default().push(node.index),
            None => roots.push(node.index),
        }
    }

    let by_index: HashMap<usize, &TreeNode> = nodes.iter().map(|node| (node.index, node)).collect();

    let mut rows = Vec::new();
    let mut stack: Vec<usize> = roots.into_iter().rev().collect();
    while let Some(index) = stack.pop() {
        let Some(node) = by_index.get(&index) else {
            continue;
        };
        rows.push(*node);

        if state.is_expanded(&node.id) {
            if let Some(kids) = children.get(&index) {
                stack.extend(kids.iter().rev().copied());
            }
        }
    }
    rows
}

/// A folder tree that is rebuilt from snapshots and remembers user state.
#[derive(Debug, Clone, Default)]
pub struct TreeView {
    options: TreeOptions,
    nodes: Vec<TreeNode>,
    state: TreeState,
}

impl TreeView {
    pub fn new(options: TreeOptions) -> Self {
        Self::with_state(options, TreeState::default())
    }

    pub fn with_state(options: TreeOptions, state: TreeState) -> Self {
        Self {
            options,
            nodes: Vec::new(),
            state,
        }
    }

    /// Rebuild from `objects`. Returns `true` when the nodes differ from the
    /// previous build, in which case the state is reconciled against them.
    pub fn update(&mut self, objects: &Objects) -> Result<bool, TreeError> {
        let nodes = build_tree(objects, &self.options)?;
        if nodes == self.nodes {
            trace!("Tree unchanged after rebuild");
            return Ok(false);
        }

        self.nodes = nodes;
        if self.state.reconcile(&self.nodes) {
            debug!(
                expanded = self.state.expanded.len(),
                selected = ?self.state.selected,
                "Tree state pruned after rebuild"
            );
        }
        Ok(true)
    }

    pub fn nodes(&self) -> &[TreeNode] {
        &self.nodes
    }

    pub fn state(&self) -> &TreeState {
        &self.state
    }

    pub fn state_mut(&mut self) -> &mut TreeState {
        &mut self.state
    }

    pub fn rows(&self) -> Vec<&TreeNode> {
        visible_rows(&self.nodes, &self.state)
    }
}
