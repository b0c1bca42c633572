//! Structural queries over the stored graph.
//!
//! `GraphQueries` answers who-calls-what, import and inheritance questions
//! on top of [`GraphStore`]. Every file argument is normalized before it is
//! looked up, so callers may pass relative or non-canonical paths.

use std::collections::{BTreeSet, HashSet};
use std::path::{Path, PathBuf};

use serde::Serialize;

use crate::error::Result;
use crate::graph::store::GraphStore;
use crate::paths::{module_name_for_path, normalize_path, resolve_relative_import};
use crate::types::{CodeEntity, EntityKind};

// ---------------------------------------------------------------------------
// Result types
// ---------------------------------------------------------------------------

/// An entity that calls the queried one.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CallerInfo {
    pub entity_id: i64,
    pub qualified_name: String,
    pub file_path: String,
    pub location: Option<String>,
}

/// Something the queried entity calls.
///
/// `target_name` is the resolved qualified name, or the raw call text when
/// the target is not in the graph (in which case `file_path` is `None`).
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CalleeInfo {
    pub target_name: String,
    pub entity_id: Option<i64>,
    pub file_path: Option<String>,
    pub location: Option<String>,
}

/// A direct subclass row, as stored.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct InheritanceChild {
    pub entity_id: Option<i64>,
    pub qualified_name: String,
    pub location: Option<String>,
}

/// A class and, recursively, everything that inherits from it.
///
/// Children that cannot be loaded are name-only stubs with no entity.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct InheritanceNode {
    pub entity: Option<CodeEntity>,
    pub qualified_name: String,
    pub file_path: Option<String>,
    pub children: Vec<InheritanceNode>,
}

impl InheritanceNode {
    fn stub(qualified_name: String) -> Self {
        Self {
            entity: None,
            qualified_name,
            file_path: None,
            children: Vec::new(),
        }
    }

    /// Number of nodes in this subtree, including itself.
    pub fn size(&self) -> usize {
        1 + self.children.iter().map(InheritanceNode::size).sum::<usize>()
    }

    /// Deepest path from this node to a leaf, counted in edges.
    pub fn depth(&self) -> usize {
        self.children
            .iter()
            .map(|c| 1 + c.depth())
            .max()
            .unwrap_or(0)
    }
}

/// An entity argument: a loaded entity or a bare id.
#[derive(Debug, Clone, Copy)]
pub enum EntityRef<'a> {
    Entity(&'a CodeEntity),
    Id(i64),
}

impl<'a> From<&'a CodeEntity> for EntityRef<'a> {
    fn from(entity: &'a CodeEntity) -> Self {
        Self::Entity(entity)
    }
}

impl From<i64> for EntityRef<'_> {
    fn from(id: i64) -> Self {
        Self::Id(id)
    }
}

impl EntityRef<'_> {
    /// The id, if the entity has been stored.
    pub fn id(&self) -> Option<i64> {
        match self {
            Self::Entity(e) => e.id,
            Self::Id(id) => Some(*id),
        }
    }
}

// ---------------------------------------------------------------------------
// GraphQueries
// ---------------------------------------------------------------------------

/// Read-only query facade over a [`GraphStore`].
#[derive(Debug)]
pub struct GraphQueries<'a> {
    store: &'a GraphStore,
    project_root: PathBuf,
}

impl<'a> GraphQueries<'a> {
    pub fn new(store: &'a GraphStore, project_root: impl AsRef<Path>) -> Self {
        Self {
            store,
            project_root: project_root.as_ref().to_path_buf(),
        }
    }

    pub fn project_root(&self) -> &Path {
        &self.project_root
    }

    /// Entities with a resolved call into `entity`.
    pub fn callers<'e>(&self, entity: impl Into<EntityRef<'e>>) -> Result<Vec<CallerInfo>> {
        match entity.into().id() {
            Some(id) => self.store.get_callers_of_entity(id),
            None => Ok(Vec::new()),
        }
    }

    /// Every call made from `entity`, resolved or not.
    pub fn callees<'e>(&self, entity: impl Into<EntityRef<'e>>) -> Result<Vec<CalleeInfo>> {
        match entity.into().id() {
            Some(id) => self.store.get_callees_of_entity(id),
            None => Ok(Vec::new()),
        }
    }

    /// Raw import strings of a file, sorted.
    pub fn imports(&self, file_path: impl AsRef<Path>) -> Result<Vec<String>> {
        self.store
            .get_imports_for_file(&normalize_path(file_path))
    }

    /// Files importing `file_path`, deduplicated and sorted.
    ///
    /// Two strategies are combined: the file's dotted module name (and its
    /// package prefixes) against import text, and `./`/`../` specifiers
    /// resolved against each importer's directory.
    pub fn importers(&self, file_path: impl AsRef<Path>) -> Result<Vec<String>> {
        let key = normalize_path(file_path);
        let root = normalize_path(&self.project_root);
        let mut found = BTreeSet::new();

        if let Some(module) = module_name_for_path(&key, &root) {
            found.extend(self.store.get_importers_of_module(&module)?);
        }

        for (from_file, specifier) in self.store.get_relative_import_rows()? {
            if resolve_relative_import(&from_file, &specifier, &root).as_deref() == Some(key.as_str()) {
                found.insert(from_file);
            }
        }

        Ok(found.into_iter().collect())
    }

    /// Inheritance tree rooted at a class; `None` for unknown ids and
    /// non-class entities.
    pub fn inheritance_tree<'e>(
        &self,
        class: impl Into<EntityRef<'e>>,
    ) -> Result<Option<InheritanceNode>> {
        let root = match class.into() {
            EntityRef::Entity(e) if e.kind != EntityKind::Class => return Ok(None),
            EntityRef::Entity(e) => e.clone(),
            EntityRef::Id(id) => match self.store.get_entity_by_id(id)? {
                Some(e) if e.kind == EntityKind::Class => e,
                _ => return Ok(None),
            },
        };
        let mut visited = HashSet::new();
        self.build_tree(root, &mut visited).map(Some)
    }

    fn build_tree(&self, entity: CodeEntity, visited: &mut HashSet<i64>) -> Result<InheritanceNode> {
        let mut node = InheritanceNode {
            qualified_name: entity.qualified_name.clone(),
            file_path: Some(entity.file_path.clone()),
            entity: None,
            children: Vec::new(),
        };
        let Some(id) = entity.id else {
            node.entity = Some(entity);
            return Ok(node);
        };
        visited.insert(id);

        for child in self.store.get_inheritance_children(id)? {
            let loaded = match child.entity_id {
                Some(cid) if !visited.contains(&cid) => self
                    .store
                    .get_entity_by_id(cid)?
                    .filter(|e| e.kind == EntityKind::Class),
                _ => None,
            };
            node.children.push(match loaded {
                Some(child_entity) => self.build_tree(child_entity, visited)?,
                None => InheritanceNode::stub(child.qualified_name),
            });
        }

        node.entity = Some(entity);
        Ok(node)
    }

    /// Locate definitions by qualified or bare name. Exact qualified-name
    /// matches win; `scope_file` only orders results.
    pub fn find_definition(&self, name: &str, scope_file: Option<&Path>) -> Result<Vec<CodeEntity>> {
        let scope = scope_file.map(normalize_path);
        self.store.get_entities_matching_name(name, scope.as_deref())
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
