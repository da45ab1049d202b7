//! Foreign-key dependency graph
//!
//! Nodes are entities, edges point from a referenced entity to the entity
//! holding the foreign key. Gives the table creation order and detects
//! foreign-key cycles (SCCs).

use petgraph::algo::{kosaraju_scc, toposort};
use petgraph::graph::{DiGraph, NodeIndex};
use petgraph::visit::EdgeRef;
use petgraph::Direction;
use std::collections::HashMap;

use crate::schema::EntityDef;

/// Foreign-key edge: `column` on the dependent entity
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ForeignKeyEdge {
    pub column: String,
}

/// Dependency graph over a set of entities
#[derive(Debug, Clone)]
pub struct DependencyGraph {
    graph: DiGraph<String, ForeignKeyEdge>,
    index: HashMap<String, NodeIndex>,
    /// Entities with a foreign key to themselves
    self_references: Vec<String>,
}

impl DependencyGraph {
    /// Build from entity definitions; references to unknown entities are skipped
    pub fn from_entities<'a>(entities: impl IntoIterator<Item = &'a EntityDef>) -> Self {
        let entities: Vec<&EntityDef> = entities.into_iter().collect();
        let mut graph = DiGraph::new();
        let mut index = HashMap::new();
        let mut self_references = Vec::new();

        for entity in &entities {
            let idx = graph.add_node(entity.name.clone());
            index.insert(entity.name.clone(), idx);
        }

        for entity in &entities {
            let dependent = index[&entity.name];
            for field in entity.foreign_keys() {
                let Some(target) = field.references.as_ref() else {
                    continue;
                };
                if target.entity == entity.name {
                    if !self_references.contains(&entity.name) {
                        self_references.push(entity.name.clone());
                    }
                    continue;
                }
                if let Some(&referenced) = index.get(&target.entity) {
                    graph.add_edge(
                        referenced,
                        dependent,
                        ForeignKeyEdge {
                            column: field.name.clone(),
                        },
                    );
                }
            }
        }

        Self {
            graph,
            index,
            self_references,
        }
    }

    pub fn entity_count(&self) -> usize {
        self.graph.node_count()
    }

    pub fn edge_count(&self) -> usize {
        self.graph.edge_count()
    }

    /// Entities `entity` references through its foreign keys
    pub fn dependencies(&self, entity: &str) -> Vec<&str> {
        self.neighbors(entity, Direction::Incoming)
    }

    /// Entities holding a foreign key to `entity`
    pub fn dependents(&self, entity: &str) -> Vec<&str> {
        self.neighbors(entity, Direction::Outgoing)
    }

    fn neighbors(&self, entity: &str, direction: Direction) -> Vec<&str> {
        let Some(&idx) = self.index.get(entity) else {
            return Vec::new();
        };
        let mut names: Vec<&str> = self
            .graph
            .edges_directed(idx, direction)
            .map(|edge| match direction {
                Direction::Outgoing => edge.target(),
                Direction::Incoming => edge.source(),
            })
            .map(|n| self.graph[n].as_str())
            .collect();
        names.sort_unstable();
        names.dedup();
        names
    }

    /// Referenced entities before the entities referencing them
    ///
    /// Returns `None` when foreign keys form a cycle.
    pub fn creation_order(&self) -> Option<Vec<String>> {
        toposort(&self.graph, None)
            .ok()
            .map(|order| order.into_iter().map(|n| self.graph[n].clone()).collect())
    }

    /// Groups of entities whose foreign keys reference each other in a cycle
    ///
    /// Self-referencing entities are reported as single-member groups.
    pub fn cycles(&self) -> Vec<Vec<String>> {
        let mut cycles: Vec<Vec<String>> = kosaraju_scc(&self.graph)
            .into_iter()
            .filter(|scc| scc.len() > 1)
            .map(|scc| {
                let mut members: Vec<String> =
                    scc.into_iter().map(|n| self.graph[n].clone()).collect();
                members.sort();
                members
            })
            .collect();

        cycles.extend(self.self_references.iter().map(|name| vec![name.clone()]));
        cycles.sort();
        cycles
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::{FieldDef, PrimaryKey};

    fn entity(name: &str, fks: &[(&str, &str)]) -> EntityDef {
        fks.iter().fold(EntityDef::new(name, PrimaryKey::auto()), |e, (col, target)| {
            e.field(FieldDef::foreign_key(*col, *target))
        })
    }

    #[test]
    fn test_creation_order_puts_parents_first() {
        let entities = vec![
            entity("Posts", &[("user_id", "Users")]),
            entity("Users", &[]),
            entity("Comments", &[("post_id", "Posts"), ("user_id", "Users")]),
        ];
        let graph = DependencyGraph::from_entities(&entities);
        let order = graph.creation_order().unwrap();

        let pos = |n: &str| order.iter().position(|e| e == n).unwrap();
        assert!(pos("Users") < pos("Posts"));
        assert!(pos("Posts") < pos("Comments"));
        assert_eq!(graph.dependents("Users"), vec!["Comments", "Posts"]);
        assert_eq!(graph.dependencies("Comments"), vec!["Posts", "Users"]);
    }

    #[test]
    fn test_cycles_detected() {
        let entities = vec![
            entity("A", &[("b_id", "B")]),
            entity("B", &[("a_id", "A")]),
            entity("Employee", &[("manager_id", "Employee")]),
        ];
        let graph = DependencyGraph::from_entities(&entities);

        assert!(graph.creation_order().is_none());
        assert_eq!(
            graph.cycles(),
            vec![vec!["A".to_string(), "B".to_string()], vec!["Employee".to_string()]]
        );
    }

    #[test]
    fn test_self_reference_keeps_order() {
        let entities = vec![entity("Employee", &[("manager_id", "Employee")])];
        let graph = DependencyGraph::from_entities(&entities);
        assert_eq!(graph.creation_order(), Some(vec!["Employee".to_string()]));
        assert_eq!(graph.edge_count(), 0);
    }
}
