use std::collections::HashMap;

use super::node::{CatalogNode, FieldValue, NodeKind};
use crate::errinput;
use crate::error::Result;
use crate::Error;

/// The catalog: a typed tree of named nodes resolving cluster, table and
/// column identifiers.
///
/// The tree is mutated by a line-oriented command stream (see
/// [`Catalog::execute`]) and queried by path. It is the identifier source
/// the eviction layer uses for the table names handed to block reads.
pub struct Catalog {
    /// Every node in the tree, keyed by path.
    nodes: HashMap<String, CatalogNode>,
    /// Forward references: target path → (node path, field) pairs waiting
    /// for the target to be added.
    unresolved: HashMap<String, Vec<(String, String)>>,
}

impl Catalog {
    pub fn new() -> Self {
        let mut nodes = HashMap::new();
        nodes.insert(
            "/".to_string(),
            CatalogNode::new(NodeKind::Root, "catalog", "/", 1),
        );
        Self {
            nodes,
            unresolved: HashMap::new(),
        }
    }

    /// Applies a command stream, one statement per line. Blank lines are
    /// skipped. After the whole stream is applied, leftover unresolved
    /// references are reported as an error naming the missing paths.
    pub fn execute(&mut self, stmts: &str) -> Result<()> {
        for line in stmts.lines() {
            let line = line.trim();
            if line.is_empty() {
                continue;
            }
            self.execute_one(line)?;
        }
        if !self.unresolved.is_empty() {
            let mut paths: Vec<String> = self.unresolved.keys().cloned().collect();
            paths.sort();
            tracing::error!(
                count = paths.len(),
                "unresolved references after catalog command stream"
            );
            return Err(Error::UnresolvedReferences(paths));
        }
        Ok(())
    }

    // FORMAT:
    //   add <ref> <collection> <name>
    //   set <ref> <field> <value>
    //   delete <ref> <collection> <name>
    // where ref is a node path; value may contain spaces when quoted.
    fn execute_one(&mut self, stmt: &str) -> Result<()> {
        let mut parts = stmt.splitn(4, ' ');
        let command = parts.next().unwrap_or_default();
        let (Some(reference), Some(a), Some(b)) = (parts.next(), parts.next(), parts.next())
        else {
            return errinput!("invalid catalog statement: {stmt}");
        };
        tracing::debug!(command, reference, a, b, "catalog statement");

        if !self.nodes.contains_key(reference) {
            return Err(Error::UnknownReference(reference.to_string()));
        }

        match command {
            "add" => self.add_child(reference, a, b),
            "set" => self.set_field(reference, a, b),
            "delete" => self.remove_child(reference, a, b),
            _ => errinput!("invalid catalog statement: {stmt}"),
        }
    }

    /// Resolves an exact node path; `"/"` names the root.
    pub fn item_for_ref(&self, path: &str) -> Option<&CatalogNode> {
        self.nodes.get(path)
    }

    /// Child names in a node's collection, e.g. the tables of a cluster.
    pub fn child_names(&self, path: &str, collection: &str) -> Vec<&str> {
        self.nodes
            .get(path)
            .map(|node| node.child_names(collection))
            .unwrap_or_default()
    }

    fn add_child(&mut self, parent: &str, collection: &str, name: &str) -> Result<()> {
        let (parent_kind, parent_path) = match self.nodes.get(parent) {
            Some(node) => (node.kind(), node.path().to_string()),
            None => return Err(Error::UnknownReference(parent.to_string())),
        };
        let child_kind = parent_kind.child_kind(collection).ok_or_else(|| {
            Error::InvalidInput(format!(
                "node {parent_path} has no collection {collection}"
            ))
        })?;
        let child_path = join_path(&parent_path, collection, name);
        if self.nodes.contains_key(&child_path) {
            return Err(Error::DuplicateEntry(child_path));
        }

        let relative_index = match self.nodes.get_mut(parent) {
            Some(node) => node.insert_child(collection, name, child_path.clone())?,
            None => return Err(Error::UnknownReference(parent.to_string())),
        };
        self.nodes.insert(
            child_path.clone(),
            CatalogNode::new(child_kind, name, &child_path, relative_index),
        );

        // Replay any sets that were waiting for this path.
        if let Some(waiters) = self.unresolved.remove(&child_path) {
            for (node_path, field) in waiters {
                self.set_field(&node_path, &field, &child_path)?;
            }
        }
        Ok(())
    }

    fn set_field(&mut self, path: &str, field: &str, raw: &str) -> Result<()> {
        let value = FieldValue::parse(raw)?;
        if let FieldValue::Ref(target) = &value {
            if !self.nodes.contains_key(target) {
                // Forward reference: queue it and replay when the target
                // is added.
                self.unresolved
                    .entry(target.clone())
                    .or_default()
                    .push((path.to_string(), field.to_string()));
                return Ok(());
            }
        }
        let node = self
            .nodes
            .get_mut(path)
            .ok_or_else(|| Error::UnknownReference(path.to_string()))?;
        node.set_field(field, value);
        Ok(())
    }

    fn remove_child(&mut self, parent: &str, collection: &str, name: &str) -> Result<()> {
        let child_path = match self.nodes.get_mut(parent) {
            Some(node) => node.remove_child(collection, name)?,
            None => return Err(Error::UnknownReference(parent.to_string())),
        };
        // Drop the child and its whole subtree.
        let subtree_prefix = format!("{child_path}/");
        self.nodes
            .retain(|path, _| path != &child_path && !path.starts_with(&subtree_prefix));
        Ok(())
    }
}

impl Default for Catalog {
    fn default() -> Self {
        Self::new()
    }
}

fn join_path(parent_path: &str, collection: &str, name: &str) -> String {
    if parent_path == "/" {
        format!("/{collection}[{name}]")
    } else {
        format!("{parent_path}/{collection}[{name}]")
    }
}
