use std::collections::{HashMap, HashSet};

use tracing::debug;

use crate::models::{FolderNode, FolderRecord};

/// Id Drive accepts as an alias for the user's top-level folder.
pub const ROOT_ID: &str = "root";
pub const DEFAULT_ROOT_LABEL: &str = "My Drive (root)";
pub const PATH_SEPARATOR: &str = " / ";

/// `name` for the first occurrence, `name (N)` for the N-th.
pub fn numbered(name: &str, occurrence: usize) -> String {
    if occurrence <= 1 {
        name.to_string()
    } else {
        format!("{name} ({occurrence})")
    }
}

/// Folder hierarchy with a unique, human readable path for every folder.
/// Built once from a full listing and replaced wholesale on refresh.
#[derive(Debug, Clone)]
pub struct FolderTree {
    nodes: Vec<FolderNode>,
    by_id: HashMap<String, usize>,
    by_path: HashMap<String, usize>,
}

impl FolderTree {
    pub fn build(folders: Vec<FolderRecord>, root_label: &str) -> Self {
        let known: HashSet<String> = folders.iter().map(|f| f.id.clone()).collect();
        let mut children: HashMap<String, Vec<FolderRecord>> = HashMap::new();
        for folder in folders {
            // Shared items and the real root's opaque id are not in the
            // listing, so those folders hang off the synthetic root.
            let parent = match &folder.parent_id {
                Some(p) if known.contains(p) && *p != folder.id => p.clone(),
                _ => ROOT_ID.to_string(),
            };
            children.entry(parent).or_default().push(folder);
        }
        for siblings in children.values_mut() {
            siblings.sort_by(|a, b| {
                a.name
                    .to_lowercase()
                    .cmp(&b.name.to_lowercase())
                    .then_with(|| a.id.cmp(&b.id))
            });
        }

        let mut tree = Self {
            nodes: Vec::new(),
            by_id: HashMap::new(),
            by_path: HashMap::new(),
        };
        tree.push(FolderNode {
            id: ROOT_ID.to_string(),
            name: root_label.to_string(),
            parent_id: None,
            display_path: root_label.to_string(),
        });

        // Each stack entry is a folder whose children still need paths.
        let mut stack = vec![ROOT_ID.to_string()];
        while let Some(parent_id) = stack.pop() {
            let Some(siblings) = children.remove(&parent_id) else {
                continue;
            };
            let parent_path = tree.path_for_id(&parent_id).unwrap_or(root_label).to_string();
            let mut counts: HashMap<&str, usize> = HashMap::new();
            let mut assigned = Vec::with_capacity(siblings.len());
            for child in &siblings {
                if tree.by_id.contains_key(&child.id) {
                    continue;
                }
                let count = counts.entry(child.name.as_str()).or_insert(0);
                let display_path = loop {
                    *count += 1;
                    let path = format!(
                        "{parent_path}{PATH_SEPARATOR}{}",
                        numbered(&child.name, *count)
                    );
                    if !tree.by_path.contains_key(&path) {
                        break path;
                    }
                };
                tree.push(FolderNode {
                    id: child.id.clone(),
                    name: child.name.clone(),
                    parent_id: Some(parent_id.clone()),
                    display_path,
                });
                assigned.push(child.id.clone());
            }
            stack.extend(assigned.into_iter().rev());
        }

        if !children.is_empty() {
            debug!(
                unreachable = children.values().map(Vec::len).sum::<usize>(),
                "skipped folders not reachable from the root"
            );
        }
        tree.sort_for_display();
        tree
    }

    fn push(&mut self, node: FolderNode) {
        let index = self.nodes.len();
        self.by_id.insert(node.id.clone(), index);
        self.by_path.insert(node.display_path.clone(), index);
        self.nodes.push(node);
    }

    /// Paths are assigned a whole sibling group at a time. Reorder the nodes
    /// into pre-order so that `entries` reads like the hierarchy.
    fn sort_for_display(&mut self) {
        let order: Vec<usize> = {
            let mut visit = Vec::with_capacity(self.nodes.len());
            let mut kids: HashMap<&str, Vec<usize>> = HashMap::new();
            for (i, node) in self.nodes.iter().enumerate() {
                if let Some(parent) = node.parent_id.as_deref() {
                    kids.entry(parent).or_default().push(i);
                }
            }
            let mut stack = vec![0usize];
            while let Some(i) = stack.pop() {
                visit.push(i);
                if let Some(children) = kids.get(self.nodes[i].id.as_str()) {
                    stack.extend(children.iter().rev());
                }
            }
            visit
        };
        let mut slots: Vec<Option<FolderNode>> = self.nodes.drain(..).map(Some).collect();
        let nodes: Vec<FolderNode> = order.into_iter().filter_map(|i| slots[i].take()).collect();
        self.nodes.clear();
        self.by_id.clear();
        self.by_path.clear();
        for node in nodes {
            self.push(node);
        }
    }

    /// `(display_path, folder id)` pairs in hierarchy order, root first.
    pub fn entries(&self) -> impl Iterator<Item = (&str, &str)> {
        self.nodes
            .iter()
            .map(|n| (n.display_path.as_str(), n.id.as_str()))
    }

    pub fn nodes(&self) -> &[FolderNode] {
        &self.nodes
    }

    pub fn node(&self, id: &str) -> Option<&FolderNode> {
        self.by_id.get(id).map(|&i| &self.nodes[i])
    }

    pub fn id_for_path(&self, display_path: &str) -> Option<&str> {
        self.by_path
            .get(display_path)
            .map(|&i| self.nodes[i].id.as_str())
    }

    pub fn path_for_id(&self, id: &str) -> Option<&str> {
        self.node(id).map(|n| n.display_path.as_str())
    }

    pub fn contains(&self, id: &str) -> bool {
        self.by_id.contains_key(id)
    }

    /// Number of folders including the synthetic root.
    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    /// True when the listing held no folders at all, leaving only the root.
    pub fn is_empty(&self) -> bool {
        self.nodes.len() <= 1
    }
}
