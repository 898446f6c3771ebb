//! Folder tree construction over the flat object namespace.
//!
//! Object ids are dot-separated paths. [`build_tree`] turns a snapshot into an
//! ordered list of [`TreeNode`]s and backfills folder nodes for every ancestor
//! that has no object of its own, so that each non-root node can be attached
//! to its parent.

pub mod view;


use std::cmp::Ordering;
use std::collections::HashMap;
use std::collections::HashSet;

use serde::Serialize;
use tracing::debug;

use crate::objects::display_name;
use crate::objects::in_namespace;
use crate::objects::segment_count;
use crate::objects::ObjectRecord;
use crate::objects::ObjectType;
use crate::objects::Objects;

pub use view::TreeState;
pub use view::TreeView;

/// A row of the folder tree.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TreeNode {
    pub id: String,

    /// Localized display name
    pub title: String,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub icon: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub color: Option<String>,

    /// Segment count minus two; adapter instance roots such as `alias.0` sit at 0.
    pub depth: i32,

    #[serde(rename = "type")]
    pub kind: ObjectType,

    /// Id of the enclosing folder, `None` for ids with two or fewer segments.
    pub parent: Option<String>,

    /// Position in the final ordering
    pub index: usize,

    pub parent_index: Option<usize>,

    /// Folder backfilled for an ancestor that has no object
    pub synthesized: bool,
}

/// Options controlling titles and ordering.
#[derive(Debug, Clone, PartialEq)]
pub struct TreeOptions {
    pub language: String,
    pub default_language: String,

    /// Namespaces that sort after everything else.
    pub reserved: Vec<String>,

    /// Stripped from the titles of synthesized folders.
    pub root_prefix: Option<String>,
}

impl Default for TreeOptions {
    fn default() -> Self {
        Self {
            language: "en".to_string(),
            default_language: "en".to_string(),
            reserved: vec![
                "script.js.common".to_string(),
                "script.js.global".to_string(),
            ],
            root_prefix: None,
        }
    }
}

impl TreeOptions {
    /// Whether `id` is one of the reserved namespaces or lies below one.
    pub fn is_reserved(&self, id: &str) -> bool {
        self.reserved
            .iter()
            .any(|reserved| id == reserved || in_namespace(id, reserved))
    }
}

#[derive(Debug, thiserror::Error)]
pub enum TreeError {
    #[error(
        "folder synthesis did not settle after {passes} passes, unresolved parents: {}",
        pending.join(", ")
    )]
    SynthesisExhausted { passes: usize, pending: Vec<String> },
}

pub(crate) fn depth_of(id: &str) -> i32 {
    segment_count(id) as i32 - 2
}

/// Parent folder id. Ids with two or fewer segments are roots.
pub(crate) fn parent_of(id: &str) -> Option<&str> {
    if segment_count(id) > 2 {
        id.rsplit_once('.').map(|(parent, _)| parent)
    } else {
        None
    }
}

/// Ids of the snapshot, lexicographic, with reserved namespaces last.
pub fn ordered_ids<'a>(objects: &'a Objects, options: &TreeOptions) -> Vec<&'a str> {
    let mut ids: Vec<&str> = objects.keys().map(String::as_str).collect();
    ids.sort_unstable_by(|a, b| {
        options
            .is_reserved(a)
            .cmp(&options.is_reserved(b))
            .then_with(|| a.cmp(b))
    });
    ids
}

fn materialize(id: &str, object: &ObjectRecord, options: &TreeOptions) -> TreeNode {
    TreeNode {
        id: id.to_string(),
        title: display_name(
            Some(object),
            id,
            &options.language,
            &options.default_language,
        ),
        icon: object.common.icon.clone(),
        color: object.common.color.clone(),
        depth: depth_of(id),
        kind: object.kind,
        parent: parent_of(id).map(str::to_string),
        index: 0,
        parent_index: None,
        synthesized: false,
    }
}

/// Parentless non-folders first (by id), then everything else by id with
/// reserved namespaces trailing.
fn display_order(a: &TreeNode, b: &TreeNode, options: &TreeOptions) -> Ordering {
    let pinned = |node: &TreeNode| node.parent.is_none() && node.kind != ObjectType::Folder;

    match (pinned(a), pinned(b)) {
        (true, true) => a.id.cmp(&b.id),
        (true, false) => Ordering::Less,
        (false, true) => Ordering::Greater,
        (false, false) => options
            .is_reserved(&a.id)
            .cmp(&options.is_reserved(&b.id))
            .then_with(|| a.id.cmp(&b.id)),
    }
}

fn synthesized_folder(id: &str, index: usize, options: &TreeOptions) -> TreeNode {
    let title = options
        .root_prefix
        .as_deref()
        .and_then(|root| id.strip_prefix(root))
        .map(|rest| rest.trim_start_matches('.'))
        .filter(|rest| !rest.is_empty())
        .unwrap_or(id);

    TreeNode {
        id: id.to_string(),
        title: title.to_string(),
        icon: None,
        color: None,
        depth: depth_of(id),
        kind: ObjectType::Folder,
        parent: parent_of(id).map(str::to_string),
        index,
        parent_index: None,
        synthesized: true,
    }
}

/// Append folder nodes for parents missing from `nodes` until a pass adds
/// nothing. Each pass only inspects the nodes present when it started, so a
/// chain of missing ancestors is resolved one level per pass.
///
/// Returns the number of folders added, or an error if `max_passes` passes
/// still left parents unresolved.
pub fn synthesize_ancestors(
    nodes: &mut Vec<TreeNode>,
    options: &TreeOptions,
    max_passes: usize,
) -> Result<usize, TreeError> {
    let mut known: HashSet<String> = nodes.iter().map(|node| node.id.clone()).collect();
    let mut added = 0;

    for _ in 0..max_passes {
        let mut modified = false;
        let len = nodes.len();

        for i in 0..len {
            let Some(parent) = nodes[i].parent.clone() else {
                continue;
            };
            if known.contains(&parent) {
                continue;
            }

            let folder = synthesized_folder(&parent, nodes.len(), options);
            known.insert(parent);
            nodes.push(folder);
            modified = true;
            added += 1;
        }

        if !modified {
            return Ok(added);
        }
    }

    let pending: Vec<String> = nodes
        .iter()
        .filter_map(|node| node.parent.as_ref())
        .filter(|parent| !known.contains(*parent))
        .cloned()
        .collect();

    if pending.is_empty() {
        Ok(added)
    } else {
        Err(TreeError::SynthesisExhausted {
            passes: max_passes,
            pending,
        })
    }
}

fn resolve_parent_indices(nodes: &mut [TreeNode]) {
    let positions: HashMap<String, usize> = nodes
        .iter()
        .map(|node| (node.id.clone(), node.index))
        .collect();

    for node in nodes.iter_mut() {
        node.parent_index = node
            .parent
            .as_ref()
            .and_then(|parent| positions.get(parent).copied());
    }
}

/// Build the ordered folder tree for a snapshot.
///
/// Every non-root node's `parent` names another node of the result, `index`
/// equals the position in the returned list, and ids are unique.
pub fn build_tree(objects: &Objects, options: &TreeOptions) -> Result<Vec<TreeNode>, TreeError> {
    if objects.is_empty() {
        return Ok(Vec::new());
    }

    let mut nodes: Vec<TreeNode> = ordered_ids(objects, options)
        .into_iter()
        .filter_map(|id| objects.get(id).map(|object| materialize(id, object, options)))
        .collect();

    nodes.sort_by(|a, b| display_order(a, b, options));
    for (index, node) in nodes.iter_mut().enumerate() {
        node.index = index;
    }

    // A missing ancestor chain is at most one shorter than the longest id.
    let max_passes = nodes
        .iter()
        .map(|node| segment_count(&node.id))
        .max()
        .unwrap_or(0);

    let added = synthesize_ancestors(&mut nodes, options, max_passes)?;
    if added > 0 {
        debug!(added, "Synthesized missing folder nodes");
    }

    resolve_parent_indices(&mut nodes);
    Ok(nodes)
}
