//! Schema validation
//!
//! Declaration-time checks (`check_entity`, `check_via`) fail fast with a
//! single error. The finalize pass (`validate_namespace`) runs every check and
//! collects all violations before deciding whether a snapshot can be built.

use std::collections::{BTreeSet, HashMap};

use crate::config::ValidationConfig;
use crate::dependency::DependencyGraph;
use crate::diagnostics::{Violation, ViolationCode, Violations};
use crate::error::{Result, SchemaError};
use crate::naming::{is_valid_identifier, suggest};
use crate::relationship::{Multiplicity, Relationship, RelationshipSpec, Via};
use crate::schema::{EntityDef, PrimaryKey, ScalarType};

// =============================================================================
// Declaration-time checks
// =============================================================================

/// Structural checks on a single entity definition
pub(crate) fn check_entity(def: &EntityDef) -> Result<()> {
    identifier("entity", &def.name)?;
    identifier("table", &def.table_name)?;

    let mut seen = BTreeSet::new();
    if let Some(column) = def.primary_key.auto_column() {
        identifier("field", column)?;
        seen.insert(column);
    }
    for field in &def.fields {
        identifier("field", &field.name)?;
        if !seen.insert(field.name.as_str()) {
            return Err(SchemaError::DuplicateField {
                entity: def.name.clone(),
                field: field.name.clone(),
            });
        }
        if let Some(target) = &field.references {
            identifier("foreign key target", &target.entity)?;
        }
    }

    if let PrimaryKey::Composite { columns } = &def.primary_key {
        if columns.is_empty() {
            return Err(SchemaError::InvalidPrimaryKey {
                entity: def.name.clone(),
                reason: "composite key has no columns".to_string(),
            });
        }
        let mut key_seen = BTreeSet::new();
        for column in columns {
            if !key_seen.insert(column.as_str()) {
                return Err(SchemaError::InvalidPrimaryKey {
                    entity: def.name.clone(),
                    reason: format!("column '{}' listed twice", column),
                });
            }
            let reason = match def.get_field(column) {
                None => Some(format!("key column '{}' is not a declared field", column)),
                Some(f) if !f.is_foreign_key() => {
                    Some(format!("key column '{}' is not a foreign key", column))
                }
                Some(f) if f.nullable => Some(format!("key column '{}' is nullable", column)),
                Some(_) => None,
            };
            if let Some(reason) = reason {
                return Err(SchemaError::InvalidCompositeKey {
                    entity: def.name.clone(),
                    reason,
                });
            }
        }
    }

    Ok(())
}

/// Checks a many-to-many realization against the entity it goes through
///
/// The via entity's key must be exactly its foreign keys, and those must
/// reference both endpoints. Plain join tables may not carry attributes.
pub(crate) fn check_via(spec: &RelationshipSpec, via: &Via, via_def: &EntityDef) -> Result<()> {
    let invalid = |reason: String| SchemaError::InvalidCompositeKey {
        entity: via_def.name.clone(),
        reason,
    };

    let PrimaryKey::Composite { columns } = &via_def.primary_key else {
        return Err(invalid(
            "primary key is a single auto-assigned column, not a composite of foreign keys".to_string(),
        ));
    };

    if let Some(extra) = via_def.foreign_keys().find(|f| !columns.contains(&f.name)) {
        return Err(invalid(format!(
            "foreign key '{}' is not part of the primary key",
            extra.name
        )));
    }

    let targeting = |entity: &str| {
        columns
            .iter()
            .filter_map(|c| via_def.get_field(c))
            .filter(|f| f.targets(entity))
            .count()
    };
    if spec.from == spec.to {
        if targeting(&spec.from) < 2 {
            return Err(invalid(format!(
                "self-referential link on {} needs two key columns referencing it",
                spec.from
            )));
        }
    } else {
        for endpoint in [&spec.from, &spec.to] {
            if targeting(endpoint) == 0 {
                return Err(invalid(format!("key does not reference {}", endpoint)));
            }
        }
    }

    if via.is_join_table() {
        let attributes: Vec<String> = via_def
            .attribute_fields()
            .into_iter()
            .map(|f| f.name.clone())
            .collect();
        if !attributes.is_empty() {
            return Err(SchemaError::JoinTableHasAttributes {
                entity: via_def.name.clone(),
                fields: attributes,
            });
        }
    }

    Ok(())
}

fn identifier(kind: &'static str, name: &str) -> Result<()> {
    if is_valid_identifier(name) {
        Ok(())
    } else {
        Err(SchemaError::InvalidIdentifier {
            kind,
            name: name.to_string(),
        })
    }
}

// =============================================================================
// Finalize pass
// =============================================================================

/// Output of a finalize pass
#[derive(Debug)]
pub(crate) struct Validated {
    pub relationships: Vec<Relationship>,
    pub creation_order: Vec<String>,
    pub violations: Violations,
}

/// Validate the whole namespace, collecting every violation
pub(crate) fn validate_namespace(
    entities: &[EntityDef],
    sides: &[RelationshipSpec],
    config: &ValidationConfig,
) -> Validated {
    let by_name: HashMap<&str, &EntityDef> = entities.iter().map(|e| (e.name.as_str(), e)).collect();
    let mut violations = Violations::new();

    check_foreign_keys(entities, &by_name, &mut violations);

    let mut relationships = Vec::new();
    for (side, partner) in pair_sides(sides, config, &mut violations) {
        let partner = partner.map(|j| &sides[j]);
        if let Some(edge) = build_edge(&by_name, &sides[side], partner, config, &mut violations) {
            relationships.push(edge);
        }
    }

    check_composite_links(entities, &relationships, &mut violations);

    let graph = DependencyGraph::from_entities(entities);
    for cycle in graph.cycles() {
        violations.push(
            Violation::new(
                &cycle[0],
                ViolationCode::ForeignKeyCycle,
                "foreign keys form a cycle; table creation needs deferred constraints",
            )
            .with_context(format!("Cycle: {}", cycle.join(" -> "))),
        );
    }
    let creation_order = graph
        .creation_order()
        .unwrap_or_else(|| entities.iter().map(|e| e.name.clone()).collect());

    Validated {
        relationships,
        creation_order,
        violations,
    }
}

/// Every foreign key names a defined entity and its single integer key
fn check_foreign_keys(
    entities: &[EntityDef],
    by_name: &HashMap<&str, &EntityDef>,
    violations: &mut Violations,
) {
    for entity in entities {
        for field in entity.foreign_keys() {
            let Some(target) = field.references.as_ref() else {
                continue;
            };
            let qualified = format!("{}.{}", entity.name, field.name);

            if field.ty != ScalarType::Integer {
                violations.report(
                    &entity.name,
                    ViolationCode::ForeignKeyTypeMismatch,
                    format!("{} is {} but keys are integers", qualified, field.ty),
                );
            }

            let Some(target_def) = by_name.get(target.entity.as_str()) else {
                let mut item = Violation::new(
                    &entity.name,
                    ViolationCode::DanglingForeignKey,
                    format!("{} references undefined entity {}", qualified, target.entity),
                );
                if let Some(hint) = suggest(&target.entity, by_name.keys().copied()) {
                    item = item.with_context(format!("did you mean '{}'?", hint));
                }
                violations.push(item);
                continue;
            };

            match (target_def.primary_key.auto_column(), target.column.as_deref()) {
                (None, _) => violations.report(
                    &entity.name,
                    ViolationCode::UnknownKeyColumn,
                    format!(
                        "{} references {}, whose key is composite",
                        qualified, target.entity
                    ),
                ),
                (Some(key), Some(column)) if key != column => violations.report(
                    &entity.name,
                    ViolationCode::UnknownKeyColumn,
                    format!(
                        "{} references {}.{}, which is not its key column '{}'",
                        qualified, target.entity, column, key
                    ),
                ),
                _ => {}
            }
        }
    }
}

/// Group sides into (side, partner) pairs; unmatched or contradictory sides are reported
fn pair_sides(
    sides: &[RelationshipSpec],
    config: &ValidationConfig,
    violations: &mut Violations,
) -> Vec<(usize, Option<usize>)> {
    let mut claimed = vec![false; sides.len()];
    let mut groups = Vec::new();

    for (i, side) in sides.iter().enumerate() {
        if claimed[i] {
            continue;
        }

        let Some(back) = &side.back_populates else {
            let pointed_at = sides.iter().enumerate().any(|(j, other)| {
                j > i
                    && !claimed[j]
                    && other.from == side.to
                    && other.to == side.from
                    && other.back_populates.as_deref() == Some(side.attribute.as_str())
            });
            if pointed_at {
                // the pointing side reports the missing back reference
                continue;
            }
            claimed[i] = true;
            if config.require_back_references {
                violations.report(
                    &side.from,
                    ViolationCode::UnpairedRelationship,
                    format!(
                        "{} ({}) to {} has no back reference",
                        side.qualified_name(),
                        side.multiplicity,
                        side.to
                    ),
                );
            } else {
                groups.push((i, None));
            }
            continue;
        };
        claimed[i] = true;

        let partner = sides
            .iter()
            .enumerate()
            .find(|(j, other)| *j != i && other.from == side.to && &other.attribute == back);

        let Some((j, other)) = partner else {
            violations.report(
                &side.to,
                ViolationCode::MissingBackReference,
                format!(
                    "{} back-populates {}.{}, which is not declared",
                    side.qualified_name(),
                    side.to,
                    back
                ),
            );
            continue;
        };

        let mut mismatches = Vec::new();
        if claimed[j] {
            mismatches.push(format!("{} is already paired elsewhere", other.qualified_name()));
        }
        if other.to != side.from {
            mismatches.push(format!("{} points at {}, not {}", other.qualified_name(), other.to, side.from));
        }
        if other.back_populates.as_deref() != Some(side.attribute.as_str()) {
            mismatches.push(format!(
                "{} back-populates {}, expected '{}'",
                other.qualified_name(),
                other.back_populates.as_deref().unwrap_or("nothing"),
                side.attribute
            ));
        }
        if other.multiplicity != side.multiplicity.inverse() {
            mismatches.push(format!(
                "{} is {} but {} is {}",
                side.qualified_name(),
                side.multiplicity,
                other.qualified_name(),
                other.multiplicity
            ));
        }
        if other.via != side.via {
            mismatches.push(format!("{} and {} are realized differently", side.qualified_name(), other.qualified_name()));
        }
        if let (Some(a), Some(b)) = (&side.foreign_key, &other.foreign_key) {
            if a != b {
                mismatches.push(format!("foreign key '{}' vs '{}'", a, b));
            }
        }

        if mismatches.is_empty() {
            claimed[j] = true;
            groups.push((i, Some(j)));
        } else {
            let mut item = Violation::new(
                &side.from,
                ViolationCode::BackReferenceMismatch,
                format!("{} and {} disagree", side.qualified_name(), other.qualified_name()),
            );
            for m in mismatches {
                item = item.with_context(m);
            }
            violations.push(item);
            claimed[j] = true;
        }
    }

    groups
}

/// Merge a side (and its partner) into one normalized relationship edge
fn build_edge(
    by_name: &HashMap<&str, &EntityDef>,
    side: &RelationshipSpec,
    partner: Option<&RelationshipSpec>,
    config: &ValidationConfig,
    violations: &mut Violations,
) -> Option<Relationship> {
    let (Some(from_def), Some(to_def)) = (by_name.get(side.from.as_str()), by_name.get(side.to.as_str())) else {
        return None;
    };
    let explicit_fk = side
        .foreign_key
        .as_deref()
        .or_else(|| partner.and_then(|p| p.foreign_key.as_deref()));

    // Orient: parent side owns the children, child side holds the key
    let parent_is_side = match side.multiplicity {
        Multiplicity::OneToMany | Multiplicity::ManyToMany => true,
        Multiplicity::ManyToOne => false,
        Multiplicity::OneToOne => {
            match one_to_one_child(from_def, to_def, explicit_fk) {
                Some(child) => child == to_def.name,
                None => {
                    violations.report(
                        &side.from,
                        ViolationCode::MissingForeignKey,
                        format!(
                            "no foreign key between {} and {} realizes {}",
                            side.from,
                            side.to,
                            side.qualified_name()
                        ),
                    );
                    return None;
                }
            }
        }
    };
    let (parent_spec, child_spec) = if parent_is_side {
        (Some(side), partner)
    } else {
        (partner, Some(side))
    };
    let (parent, child) = if parent_is_side {
        (&side.from, &side.to)
    } else {
        (&side.to, &side.from)
    };
    let multiplicity = match side.multiplicity {
        Multiplicity::ManyToOne => Multiplicity::OneToMany,
        other => other,
    };

    let mut ok = true;
    if let Some(spec) = child_spec.filter(|s| s.cascade_delete) {
        ok = false;
        violations.report(
            &spec.from,
            ViolationCode::InvalidCascade,
            format!(
                "{} declares cascade delete but {} does not own {}",
                spec.qualified_name(),
                spec.from,
                spec.to
            ),
        );
    }
    let cascade_delete = parent_spec.is_some_and(|s| s.cascade_delete);
    if cascade_delete && multiplicity == Multiplicity::ManyToMany {
        ok = false;
        violations.report(
            parent,
            ViolationCode::InvalidCascade,
            format!(
                "many-to-many {} cannot cascade; membership rows are removed with either end",
                side.qualified_name()
            ),
        );
    }

    let foreign_key = if multiplicity == Multiplicity::ManyToMany {
        None
    } else {
        let child_def = by_name[child.as_str()];
        let column = resolve_foreign_key(child_def, parent, explicit_fk, side, violations)?;
        if multiplicity == Multiplicity::OneToOne && config.unique_one_to_one {
            let unique = child_def.get_field(&column).is_some_and(|f| f.unique);
            if !unique {
                ok = false;
                violations.report(
                    child,
                    ViolationCode::NonUniqueOneToOne,
                    format!(
                        "{}.{} realizes a one-to-one with {} but is not unique",
                        child, column, parent
                    ),
                );
            }
        }
        if !cascade_delete {
            violations.report(
                child,
                ViolationCode::UncascadedDependent,
                format!(
                    "{} rows keep a dangling {} when their {} is deleted",
                    child, column, parent
                ),
            );
        }
        Some(column)
    };

    ok.then(|| Relationship {
        parent: parent.clone(),
        child: child.clone(),
        multiplicity,
        via: side.via.clone(),
        foreign_key,
        cascade_delete,
        parent_attribute: parent_spec.map(|s| s.attribute.clone()),
        child_attribute: child_spec.map(|s| s.attribute.clone()),
    })
}

/// Which end of a one-to-one holds the foreign key
fn one_to_one_child<'a>(from: &'a EntityDef, to: &'a EntityDef, explicit: Option<&str>) -> Option<&'a str> {
    let holds = |holder: &EntityDef, target: &EntityDef| match explicit {
        Some(column) => holder.get_field(column).is_some_and(|f| f.targets(&target.name)),
        None => !holder.foreign_keys_to(&target.name).is_empty(),
    };
    if holds(to, from) {
        Some(to.name.as_str())
    } else if holds(from, to) {
        Some(from.name.as_str())
    } else {
        None
    }
}

fn resolve_foreign_key(
    child: &EntityDef,
    parent: &str,
    explicit: Option<&str>,
    side: &RelationshipSpec,
    violations: &mut Violations,
) -> Option<String> {
    let candidates = child.foreign_keys_to(parent);

    if let Some(column) = explicit {
        if candidates.iter().any(|f| f.name == column) {
            return Some(column.to_string());
        }
        violations.report(
            &child.name,
            ViolationCode::MissingForeignKey,
            format!("{}.{} is not a foreign key to {}", child.name, column, parent),
        );
        return None;
    }

    match candidates.as_slice() {
        [only] => Some(only.name.clone()),
        [] => {
            violations.push(
                Violation::new(
                    &child.name,
                    ViolationCode::MissingForeignKey,
                    format!("no foreign key on {} references {}", child.name, parent),
                )
                .with_context(format!("required by {}", side.qualified_name())),
            );
            None
        }
        many => {
            let names: Vec<&str> = many.iter().map(|f| f.name.as_str()).collect();
            violations.push(
                Violation::new(
                    &child.name,
                    ViolationCode::AmbiguousForeignKey,
                    format!(
                        "{} has several foreign keys to {}; name one on {}",
                        child.name,
                        parent,
                        side.qualified_name()
                    ),
                )
                .with_context(format!("Candidates: {}", names.join(", "))),
            );
            None
        }
    }
}

/// Key columns of an entity used as a many-to-many realization must each link something
fn check_composite_links(entities: &[EntityDef], relationships: &[Relationship], violations: &mut Violations) {
    for entity in entities {
        let PrimaryKey::Composite { columns } = &entity.primary_key else {
            continue;
        };
        let uses: Vec<&Relationship> = relationships
            .iter()
            .filter(|r| r.via.as_ref().is_some_and(|v| v.entity() == entity.name))
            .collect();
        if uses.is_empty() {
            continue;
        }

        let linked: BTreeSet<&str> = uses
            .iter()
            .flat_map(|r| [r.parent.as_str(), r.child.as_str()])
            .collect();
        for column in columns {
            let Some(target) = entity.get_field(column).and_then(|f| f.references.as_ref()) else {
                continue;
            };
            if !linked.contains(target.entity.as_str()) {
                violations.report(
                    &entity.name,
                    ViolationCode::InvalidCompositeKey,
                    format!(
                        "invalid composite key: {}.{} references {}, which no relationship through {} links",
                        entity.name, column, target.entity, entity.name
                    ),
                );
            }
        }
    }
}
