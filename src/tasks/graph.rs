//! Dependency graph over task and subtask ids.
//!
//! Edges point from a dependent to its dependency. The persisted edge list
//! lives in the `dependencies` table; for cycle checks it is loaded into an
//! adjacency list keyed by arena index and walked with an explicit stack.

use crate::error::Result;
use rusqlite::{params, Connection};
use std::collections::HashMap;

/// In-memory adjacency list of "depends on" edges.
#[derive(Debug, Default, Clone)]
pub struct DependencyGraph {
    index: HashMap<String, usize>,
    ids: Vec<String>,
    edges: Vec<Vec<usize>>,
}

impl DependencyGraph {
    /// Create an empty graph.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Load every persisted edge.
    pub fn load(conn: &Connection) -> Result<Self> {
        let mut graph = Self::new();
        let mut stmt = conn.prepare("SELECT dependent, dependency FROM dependencies")?;
        let rows = stmt.query_map([], |row| Ok((row.get::<_, String>(0)?, row.get(1)?)))?;
        for row in rows {
            let (dependent, dependency): (String, String) = row?;
            graph.add_edge(&dependent, &dependency);
        }
        Ok(graph)
    }

    fn node(&mut self, id: &str) -> usize {
        if let Some(&idx) = self.index.get(id) {
            return idx;
        }
        let idx = self.ids.len();
        self.ids.push(id.to_string());
        self.edges.push(Vec::new());
        self.index.insert(id.to_string(), idx);
        idx
    }

    /// Insert an edge without any checks. Duplicate edges are ignored.
    pub fn add_edge(&mut self, dependent: &str, dependency: &str) {
        let from = self.node(dependent);
        let to = self.node(dependency);
        if !self.edges[from].contains(&to) {
            self.edges[from].push(to);
        }
    }

    /// Whether following edges from `from` can arrive at `to`.
    ///
    /// Every node is expanded at most once, so the walk is bounded by the
    /// node count even on malformed input.
    #[must_use]
    pub fn reaches(&self, from: &str, to: &str) -> bool {
        if from == to {
            return true;
        }
        let (Some(&start), Some(&target)) = (self.index.get(from), self.index.get(to)) else {
            return false;
        };

        let mut visited = vec![false; self.ids.len()];
        let mut stack = vec![start];
        while let Some(current) = stack.pop() {
            if current == target {
                return true;
            }
            if std::mem::replace(&mut visited[current], true) {
                continue;
            }
            stack.extend(self.edges[current].iter().copied().filter(|&n| !visited[n]));
        }
        false
    }

    /// Check if adding `dependent -> dependency` would close a cycle.
    #[must_use]
    pub fn would_create_cycle(&self, dependent: &str, dependency: &str) -> bool {
        self.reaches(dependency, dependent)
    }

    /// Check the whole graph for a cycle (three-colour iterative DFS).
    #[must_use]
    pub fn has_cycle(&self) -> bool {
        #[derive(Clone, Copy, PartialEq, Eq)]
        enum Mark {
            Unseen,
            Open,
            Done,
        }

        let mut marks = vec![Mark::Unseen; self.ids.len()];
        for root in 0..self.ids.len() {
            if marks[root] != Mark::Unseen {
                continue;
            }
            // (node, index of the next edge to follow)
            let mut stack = vec![(root, 0usize)];
            marks[root] = Mark::Open;
            while let Some(frame) = stack.last_mut() {
                let (node, next) = *frame;
                if let Some(&child) = self.edges[node].get(next) {
                    frame.1 += 1;
                    match marks[child] {
                        Mark::Open => return true,
                        Mark::Unseen => {
                            marks[child] = Mark::Open;
                            stack.push((child, 0));
                        }
                        Mark::Done => {}
                    }
                } else {
                    marks[node] = Mark::Done;
                    stack.pop();
                }
            }
        }
        false
    }
}

/// Direct dependencies of `id`, in insertion order.
pub fn dependencies(conn: &Connection, id: &str) -> Result<Vec<String>> {
    let mut stmt =
        conn.prepare("SELECT dependency FROM dependencies WHERE dependent = ?1 ORDER BY rowid")?;
    let ids = stmt.query_map(params![id], |row| row.get(0))?.collect::<rusqlite::Result<_>>()?;
    Ok(ids)
}

/// Entities that depend directly on `id`, in insertion order.
pub fn dependents(conn: &Connection, id: &str) -> Result<Vec<String>> {
    let mut stmt =
        conn.prepare("SELECT dependent FROM dependencies WHERE dependency = ?1 ORDER BY rowid")?;
    let ids = stmt.query_map(params![id], |row| row.get(0))?.collect::<rusqlite::Result<_>>()?;
    Ok(ids)
}

/// Dependencies of `id` that are not yet completed.
pub fn blocked_by(conn: &Connection, id: &str) -> Result<Vec<String>> {
    let mut stmt = conn.prepare(
        "SELECT d.dependency FROM dependencies d
         JOIN entities e ON e.id = d.dependency
         WHERE d.dependent = ?1 AND e.status != 'completed'
         ORDER BY d.rowid",
    )?;
    let ids = stmt.query_map(params![id], |row| row.get(0))?.collect::<rusqlite::Result<_>>()?;
    Ok(ids)
}

/// Whether the exact edge is stored.
pub fn edge_exists(conn: &Connection, dependent: &str, dependency: &str) -> Result<bool> {
    let exists = conn.query_row(
        "SELECT EXISTS(SELECT 1 FROM dependencies WHERE dependent = ?1 AND dependency = ?2)",
        params![dependent, dependency],
        |row| row.get(0),
    )?;
    Ok(exists)
}

/// Store an edge. Callers check for cycles first.
pub fn insert_edge(
    conn: &Connection,
    dependent: &str,
    dependency: &str,
    created_at: &str,
) -> Result<()> {
    conn.execute(
        "INSERT INTO dependencies (dependent, dependency, created_at) VALUES (?1, ?2, ?3)",
        params![dependent, dependency, created_at],
    )?;
    Ok(())
}

/// Delete an edge, returning whether one existed.
pub fn delete_edge(conn: &Connection, dependent: &str, dependency: &str) -> Result<bool> {
    let rows = conn.execute(
        "DELETE FROM dependencies WHERE dependent = ?1 AND dependency = ?2",
        params![dependent, dependency],
    )?;
    Ok(rows > 0)
}
