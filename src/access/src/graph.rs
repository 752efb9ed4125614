//! Immutable role graph snapshots
//!
//! A [`RoleGraph`] is an arena of role nodes addressed by index. It is loaded
//! from a [`RoleGraphStore`] in one explicit step and never changes afterwards,
//! so every check made against it sees one consistent version of the
//! administrative data.
//!
//! Loading walks parent edges with a visited set, which terminates on any
//! stored graph, cyclic or not. The store's graph version is read before and
//! after the walk; a walk that straddled a write is thrown away and retried.

use crate::error::{AccessError, Result};
use crate::store::RoleGraphStore;
use crate::types::{PermissionName, Role, RoleId, RoleName};
use std::collections::{HashMap, HashSet};
use thiserror::Error;
use tracing::{debug, warn};

/// Graph construction errors
#[derive(Debug, Error, PartialEq)]
pub enum GraphError {
    /// The same role id was added twice
    #[error("Duplicate role: {0}")]
    DuplicateRole(RoleId),

    /// An inheritance edge names a role that is not in the graph
    #[error("Role {child} inherits from unknown role {parent}")]
    UnknownParent { parent: RoleId, child: RoleId },

    /// An inheritance edge starts from a role that is not in the graph
    #[error("Unknown role {0}")]
    UnknownRole(RoleId),
}

impl From<GraphError> for AccessError {
    fn from(err: GraphError) -> Self {
        AccessError::DataIntegrity(err.to_string())
    }
}

/// One role in the arena
#[derive(Debug, Clone)]
pub struct RoleNode {
    pub role: Role,

    /// Directly granted permission names
    pub grants: Vec<PermissionName>,

    /// Arena indices of the roles this one inherits from
    parents: Vec<usize>,
}

/// Immutable snapshot of (part of) the role graph
#[derive(Debug, Clone)]
pub struct RoleGraph {
    nodes: Vec<RoleNode>,
    index: HashMap<RoleId, usize>,
    version: u64,
}

impl RoleGraph {
    /// Load every role reachable from `root` through inheritance.
    ///
    /// # Errors
    ///
    /// - `NotFound` if `root` does not exist
    /// - `DataIntegrity` if a reachable edge or grant points at a missing row
    /// - `InconsistentSnapshot` if the graph changed during every attempt
    pub async fn load(store: &dyn RoleGraphStore, root: RoleId, retries: usize) -> Result<Self> {
        let builder = gather_consistent(store, Scope::Reachable(root), retries).await?;

        if !builder.contains(root) {
            return Err(AccessError::NotFound(format!("role {}", root)));
        }
        Ok(builder.build()?)
    }

    /// Load the whole role graph
    pub async fn load_full(store: &dyn RoleGraphStore, retries: usize) -> Result<Self> {
        let builder = gather_consistent(store, Scope::All, retries).await?;
        Ok(builder.build()?)
    }

    /// Administrative version this snapshot was taken at
    pub fn version(&self) -> u64 {
        self.version
    }

    /// Arena index of a role
    pub fn index_of(&self, role_id: RoleId) -> Option<usize> {
        self.index.get(&role_id).copied()
    }

    /// Node at an arena index
    pub fn node(&self, idx: usize) -> &RoleNode {
        &self.nodes[idx]
    }

    /// Arena indices of a node's parents
    pub fn parents_of(&self, idx: usize) -> &[usize] {
        &self.nodes[idx].parents
    }

    /// Iterate over all nodes
    pub fn nodes(&self) -> impl Iterator<Item = &RoleNode> {
        self.nodes.iter()
    }

    /// Number of roles in the snapshot
    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    /// Whether the snapshot is empty
    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// Find one inheritance cycle, if any.
    ///
    /// Iterative depth-first search with white/grey/black marking. The cycle is
    /// returned as role names in edge order, starting and ending at the same
    /// role.
    pub fn find_cycle(&self) -> Option<Vec<RoleName>> {
        #[derive(Clone, Copy, PartialEq)]
        enum Mark {
            White,
            Grey,
            Black,
        }

        let mut marks = vec![Mark::White; self.nodes.len()];

        for start in 0..self.nodes.len() {
            if marks[start] != Mark::White {
                continue;
            }

            // (node, next parent position)
            let mut stack: Vec<(usize, usize)> = vec![(start, 0)];
            marks[start] = Mark::Grey;

            while let Some(top) = stack.last_mut() {
                let (node, next) = *top;
                top.1 += 1;

                let parents = &self.nodes[node].parents;
                if next < parents.len() {
                    let parent = parents[next];

                    match marks[parent] {
                        Mark::White => {
                            marks[parent] = Mark::Grey;
                            stack.push((parent, 0));
                        }
                        Mark::Grey => {
                            let from = stack.iter().position(|(n, _)| *n == parent).unwrap_or(0);
                            let mut cycle: Vec<RoleName> = stack[from..]
                                .iter()
                                .map(|(n, _)| self.nodes[*n].role.name.clone())
                                .collect();
                            cycle.push(self.nodes[parent].role.name.clone());
                            return Some(cycle);
                        }
                        Mark::Black => {}
                    }
                } else {
                    marks[node] = Mark::Black;
                    stack.pop();
                }
            }
        }

        None
    }
}

/// Builder that checks referential integrity before producing a [`RoleGraph`]
#[derive(Debug, Default)]
pub struct RoleGraphBuilder {
    roles: Vec<(Role, Vec<PermissionName>)>,
    ids: HashSet<RoleId>,
    /// (parent, child)
    edges: Vec<(RoleId, RoleId)>,
    version: u64,
}

impl RoleGraphBuilder {
    /// Create an empty builder
    pub fn new() -> Self {
        Self::default()
    }

    /// Stamp the snapshot with an administrative version
    pub fn version(mut self, version: u64) -> Self {
        self.version = version;
        self
    }

    /// Add a role with its direct grants
    pub fn add_role(&mut self, role: Role, grants: Vec<PermissionName>) -> std::result::Result<(), GraphError> {
        if !self.ids.insert(role.id) {
            return Err(GraphError::DuplicateRole(role.id));
        }
        self.roles.push((role, grants));
        Ok(())
    }

    /// Record that `child` inherits from `parent`
    pub fn add_inheritance(&mut self, parent: RoleId, child: RoleId) {
        self.edges.push((parent, child));
    }

    /// Whether a role id was added
    pub fn contains(&self, role_id: RoleId) -> bool {
        self.ids.contains(&role_id)
    }

    /// Resolve edges to arena indices
    pub fn build(self) -> std::result::Result<RoleGraph, GraphError> {
        let index: HashMap<RoleId, usize> = self
            .roles
            .iter()
            .enumerate()
            .map(|(idx, (role, _))| (role.id, idx))
            .collect();

        let mut nodes: Vec<RoleNode> = self
            .roles
            .into_iter()
            .map(|(role, grants)| RoleNode {
                role,
                grants,
                parents: Vec::new(),
            })
            .collect();

        for (parent, child) in self.edges {
            let child_idx = *index.get(&child).ok_or(GraphError::UnknownRole(child))?;
            let parent_idx = *index
                .get(&parent)
                .ok_or(GraphError::UnknownParent { parent, child })?;

            let parents = &mut nodes[child_idx].parents;
            if !parents.contains(&parent_idx) {
                parents.push(parent_idx);
            }
        }

        Ok(RoleGraph {
            nodes,
            index,
            version: self.version,
        })
    }
}

enum Scope {
    Reachable(RoleId),
    All,
}

async fn gather_consistent(
    store: &dyn RoleGraphStore,
    scope: Scope,
    retries: usize,
) -> Result<RoleGraphBuilder> {
    for attempt in 0..=retries {
        let before = store.graph_version().await?;
        let builder = gather(store, &scope).await;
        let after = store.graph_version().await?;

        if before == after {
            return builder.map(|b| b.version(before));
        }

        debug!(attempt, before, after, "Role graph changed during load, retrying");
    }

    warn!(retries, "Role graph kept changing during load");
    Err(AccessError::InconsistentSnapshot(format!(
        "graph version changed on each of {} attempts",
        retries + 1
    )))
}

/// One walk over the store. Errors from rows that vanished mid-walk are only
/// reported once the version check confirms the walk saw a stable graph.
async fn gather(store: &dyn RoleGraphStore, scope: &Scope) -> Result<RoleGraphBuilder> {
    let mut builder = RoleGraphBuilder::new();

    match scope {
        Scope::Reachable(root) => {
            let mut visited: HashSet<RoleId> = HashSet::new();
            let mut stack = vec![*root];

            while let Some(role_id) = stack.pop() {
                if !visited.insert(role_id) {
                    continue;
                }
                if let Some(parents) = fetch_role(store, role_id, &mut builder).await? {
                    stack.extend(parents.into_iter().filter(|p| !visited.contains(p)));
                }
            }
        }
        Scope::All => {
            for role_id in store.role_ids().await? {
                fetch_role(store, role_id, &mut builder).await?;
            }
        }
    }

    Ok(builder)
}

/// Add one role with its grants and edges; `None` if the role does not exist
async fn fetch_role(
    store: &dyn RoleGraphStore,
    role_id: RoleId,
    builder: &mut RoleGraphBuilder,
) -> Result<Option<Vec<RoleId>>> {
    let Some(role) = store.role(role_id).await? else {
        return Ok(None);
    };

    let grants = store
        .role_grants(role_id)
        .await?
        .into_iter()
        .map(|p| p.name)
        .collect();
    let parents = store.parent_roles(role_id).await?;

    builder.add_role(role, grants)?;
    for parent in &parents {
        builder.add_inheritance(*parent, role_id);
    }

    Ok(Some(parents))
}
