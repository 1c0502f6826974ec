//! File tree building and navigation for the review screen.
//!
//! The tree is rebuilt from the filtered file list whenever files or filters
//! change and flattened for rendering; both results are cached between
//! renders.

use std::collections::HashMap;

use super::types::{TreeItem, TreeNode};
use super::App;

impl App {
    /// Invalidate the tree cache (call when files or filters change)
    pub(super) fn invalidate_tree_cache(&mut self) {
        self.cached_tree = None;
        self.cached_flat_items = None;
    }

    /// Ensure flat items cache is populated (builds if needed)
    pub(super) fn ensure_flat_items_cached(&mut self) {
        if self.cached_flat_items.is_none() {
            let tree = self.build_tree();
            let flat_items = self.flatten_tree(&tree);
            self.cached_tree = Some(tree);
            self.cached_flat_items = Some(flat_items);
        }
    }

    /// Get cached flat items for navigation (call ensure_flat_items_cached first)
    pub(super) fn get_flat_items(&self) -> &[TreeItem] {
        self.cached_flat_items.as_deref().unwrap_or(&[])
    }

    /// Build a tree structure from the filtered file list
    fn build_tree(&self) -> Vec<TreeNode> {
        let mut root: HashMap<String, TreeNode> = HashMap::new();

        for &file_idx in &self.filtered_indices {
            let file = &self.files[file_idx];
            let parts: Vec<&str> = file.path.split('/').collect();
            insert_path(&mut root, &parts, file_idx, &[]);
        }

        let mut nodes: Vec<TreeNode> = root.into_values().collect();
        sort_tree_nodes(&mut nodes);
        nodes
    }

    /// Flatten the tree into a list of items for rendering
    pub(super) fn flatten_tree(&self, nodes: &[TreeNode]) -> Vec<TreeItem> {
        let mut items = Vec::new();
        self.flatten_tree_recursive(nodes, 0, &mut items, &[]);
        items
    }

    fn flatten_tree_recursive(
        &self,
        nodes: &[TreeNode],
        depth: usize,
        items: &mut Vec<TreeItem>,
        ancestors_last: &[bool],
    ) {
        let len = nodes.len();
        for (i, node) in nodes.iter().enumerate() {
            let is_last = i == len - 1;
            let mut current_ancestors: Vec<bool> = ancestors_last.to_vec();

            match node {
                TreeNode::Folder {
                    name,
                    path,
                    children,
                } => {
                    items.push(TreeItem::Folder {
                        path: path.clone(),
                        name: name.clone(),
                        depth,
                        is_last,
                        ancestors_last: current_ancestors.clone(),
                    });

                    // Only show children if the folder is expanded
                    if !self.collapsed_folders.contains(path) {
                        current_ancestors.push(is_last);
                        self.flatten_tree_recursive(children, depth + 1, items, &current_ancestors);
                    }
                }
                TreeNode::File { name, index } => {
                    items.push(TreeItem::File {
                        index: *index,
                        name: name.clone(),
                        depth,
                        is_last,
                        ancestors_last: current_ancestors,
                    });
                }
            }
        }
    }

    /// Get the tree prefix characters for an item's position
    pub(super) fn get_tree_prefix(&self, is_last: bool, ancestors_last: &[bool]) -> String {
        let mut prefix = String::new();

        for &ancestor_is_last in ancestors_last {
            if ancestor_is_last {
                prefix.push_str("  ");
            } else {
                prefix.push_str("│ ");
            }
        }

        if is_last {
            prefix.push_str("└─");
        } else {
            prefix.push_str("├─");
        }

        prefix
    }
}

/// Insert one path into a level of the tree, creating folders as needed
fn insert_path(
    level: &mut HashMap<String, TreeNode>,
    parts: &[&str],
    file_idx: usize,
    prefix: &[&str],
) {
    let Some((first, rest)) = parts.split_first() else {
        return;
    };

    if rest.is_empty() {
        level.insert(
            first.to_string(),
            TreeNode::File {
                name: first.to_string(),
                index: file_idx,
            },
        );
        return;
    }

    let mut full_path: Vec<&str> = prefix.to_vec();
    full_path.push(first);
    let folder_path = full_path.join("/");

    let folder = level
        .entry(first.to_string())
        .or_insert_with(|| TreeNode::Folder {
            name: first.to_string(),
            path: folder_path,
            children: Vec::new(),
        });

    if let TreeNode::Folder { children, .. } = folder {
        let mut child_map: HashMap<String, TreeNode> = children
            .drain(..)
            .map(|n| {
                let key = match &n {
                    TreeNode::Folder { name, .. } => name.clone(),
                    TreeNode::File { name, .. } => name.clone(),
                };
                (key, n)
            })
            .collect();

        insert_path(&mut child_map, rest, file_idx, &full_path);

        *children = child_map.into_values().collect();
    }
}

fn sort_tree_nodes(nodes: &mut [TreeNode]) {
    nodes.sort_by(|a, b| {
        match (a, b) {
            // Folders come before files
            (TreeNode::Folder { name: a, .. }, TreeNode::Folder { name: b, .. }) => a.cmp(b),
            (TreeNode::File { name: a, .. }, TreeNode::File { name: b, .. }) => a.cmp(b),
            (TreeNode::Folder { .. }, TreeNode::File { .. }) => std::cmp::Ordering::Less,
            (TreeNode::File { .. }, TreeNode::Folder { .. }) => std::cmp::Ordering::Greater,
        }
    });

    for node in nodes.iter_mut() {
        if let TreeNode::Folder { children, .. } = node {
            sort_tree_nodes(children);
        }
    }
}
