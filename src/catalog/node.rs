use std::collections::{BTreeMap, HashMap};

use crate::errinput;
use crate::error::Result;
use crate::Error;

/// Kind of a catalog node, determining which child collections it carries.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NodeKind {
    Root,
    Cluster,
    Table,
    Column,
}

impl NodeKind {
    /// Child collections this kind carries.
    pub fn collections(&self) -> &'static [&'static str] {
        match self {
            NodeKind::Root => &["clusters"],
            NodeKind::Cluster => &["tables"],
            NodeKind::Table => &["columns"],
            NodeKind::Column => &[],
        }
    }

    /// The node kind stored in the given collection.
    pub fn child_kind(&self, collection: &str) -> Option<NodeKind> {
        match (self, collection) {
            (NodeKind::Root, "clusters") => Some(NodeKind::Cluster),
            (NodeKind::Cluster, "tables") => Some(NodeKind::Table),
            (NodeKind::Table, "columns") => Some(NodeKind::Column),
            _ => None,
        }
    }
}

/// A parsed field value.
#[derive(Debug, Clone, PartialEq)]
pub enum FieldValue {
    Null,
    Bool(bool),
    Int(i64),
    Text(String),
    /// A path reference to another catalog node.
    Ref(String),
}

impl FieldValue {
    /// Parses a raw value token: `null`, `true`/`false`, a quoted string,
    /// a path reference (leading `/`), or a signed integer.
    pub fn parse(raw: &str) -> Result<Self> {
        match raw {
            "null" => Ok(FieldValue::Null),
            "true" => Ok(FieldValue::Bool(true)),
            "false" => Ok(FieldValue::Bool(false)),
            _ if raw.starts_with('"') => {
                if raw.len() < 2 || !raw.ends_with('"') {
                    return errinput!("unterminated string value {raw}");
                }
                Ok(FieldValue::Text(raw[1..raw.len() - 1].to_string()))
            }
            _ if raw.starts_with('/') => Ok(FieldValue::Ref(raw.to_string())),
            _ => raw
                .parse::<i64>()
                .map(FieldValue::Int)
                .map_err(|_| Error::InvalidInput(format!("unparseable value {raw}"))),
        }
    }
}

/// A named node in the catalog tree.
#[derive(Debug, Clone)]
pub struct CatalogNode {
    kind: NodeKind,
    name: String,
    path: String,
    /// 1-based insertion order within the parent collection.
    relative_index: u32,
    fields: HashMap<String, FieldValue>,
    /// Collection name → child name → child path. Ordered by name so
    /// enumeration is deterministic.
    children: HashMap<String, BTreeMap<String, String>>,
}

impl CatalogNode {
    pub(crate) fn new(kind: NodeKind, name: &str, path: &str, relative_index: u32) -> Self {
        let children = kind
            .collections()
            .iter()
            .map(|c| (c.to_string(), BTreeMap::new()))
            .collect();
        Self {
            kind,
            name: name.to_string(),
            path: path.to_string(),
            relative_index,
            fields: HashMap::new(),
            children,
        }
    }

    pub fn kind(&self) -> NodeKind {
        self.kind
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn path(&self) -> &str {
        &self.path
    }

    pub fn relative_index(&self) -> u32 {
        self.relative_index
    }

    pub fn field(&self, name: &str) -> Option<&FieldValue> {
        self.fields.get(name)
    }

    pub(crate) fn set_field(&mut self, name: &str, value: FieldValue) {
        self.fields.insert(name.to_string(), value);
    }

    /// Path of the named child, if present.
    pub fn child_path(&self, collection: &str, name: &str) -> Option<&str> {
        self.children
            .get(collection)?
            .get(name)
            .map(String::as_str)
    }

    /// Child names in a collection, in name order.
    pub fn child_names(&self, collection: &str) -> Vec<&str> {
        self.children
            .get(collection)
            .map(|c| c.keys().map(String::as_str).collect())
            .unwrap_or_default()
    }

    pub(crate) fn insert_child(
        &mut self,
        collection: &str,
        name: &str,
        path: String,
    ) -> Result<u32> {
        let children = self.children.get_mut(collection).ok_or_else(|| {
            Error::InvalidInput(format!(
                "node {} has no collection {collection}",
                self.path
            ))
        })?;
        if children.contains_key(name) {
            return Err(Error::DuplicateEntry(path));
        }
        children.insert(name.to_string(), path);
        Ok(children.len() as u32)
    }

    pub(crate) fn remove_child(&mut self, collection: &str, name: &str) -> Result<String> {
        let children = self.children.get_mut(collection).ok_or_else(|| {
            Error::InvalidInput(format!(
                "node {} has no collection {collection}",
                self.path
            ))
        })?;
        children.remove(name).ok_or_else(|| {
            Error::UnknownReference(format!("{}: {collection}[{name}]", self.path))
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_field_value_parsing() {
        assert_eq!(FieldValue::parse("null").unwrap(), FieldValue::Null);
        assert_eq!(FieldValue::parse("true").unwrap(), FieldValue::Bool(true));
        assert_eq!(FieldValue::parse("false").unwrap(), FieldValue::Bool(false));
        assert_eq!(FieldValue::parse("-42").unwrap(), FieldValue::Int(-42));
        assert_eq!(
            FieldValue::parse("\"hello world\"").unwrap(),
            FieldValue::Text("hello world".to_string())
        );
        assert_eq!(
            FieldValue::parse("/clusters[c0]").unwrap(),
            FieldValue::Ref("/clusters[c0]".to_string())
        );
    }

    #[test]
    fn test_field_value_rejects_garbage() {
        assert!(FieldValue::parse("not-a-number").is_err());
        assert!(FieldValue::parse("\"unterminated").is_err());
    }

    #[test]
    fn test_kind_collections() {
        assert_eq!(NodeKind::Root.collections(), &["clusters"]);
        assert_eq!(NodeKind::Column.collections(), &[] as &[&str]);
        assert_eq!(
            NodeKind::Cluster.child_kind("tables"),
            Some(NodeKind::Table)
        );
        assert_eq!(NodeKind::Cluster.child_kind("columns"), None);
    }

    #[test]
    fn test_insert_and_remove_child() {
        let mut node = CatalogNode::new(NodeKind::Cluster, "c0", "/clusters[c0]", 1);

        let index = node
            .insert_child("tables", "Orders", "/clusters[c0]/tables[Orders]".to_string())
            .expect("Failed to insert child");
        assert_eq!(index, 1);
        assert_eq!(
            node.child_path("tables", "Orders"),
            Some("/clusters[c0]/tables[Orders]")
        );

        let removed = node
            .remove_child("tables", "Orders")
            .expect("Failed to remove child");
        assert_eq!(removed, "/clusters[c0]/tables[Orders]");
        assert!(node.child_path("tables", "Orders").is_none());
    }

    #[test]
    fn test_duplicate_child_rejected() {
        let mut node = CatalogNode::new(NodeKind::Cluster, "c0", "/clusters[c0]", 1);
        node.insert_child("tables", "Orders", "p".to_string())
            .expect("Failed to insert child");

        let result = node.insert_child("tables", "Orders", "p".to_string());
        assert!(matches!(result, Err(Error::DuplicateEntry(_))));
    }
}
