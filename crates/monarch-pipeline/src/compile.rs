//! # Relation Population Compiler
//!
//! Turns a filter and an ordered list of relation keys into an aggregation
//! pipeline:
//!
//! ```text
//! $match(filter)
//! per relation, in request order:
//!   $lookup  { from, let: { var: "$local" }, pipeline: [...], as: tmp }
//!   $unwind  tmp
//!   $unset   local | key
//!   $set     { key: "$tmp" }
//!   $unset   tmp
//! ```
//!
//! A request for N relations always yields exactly `1 + 5N` stages.
//!
//! ## Local Fields
//!
//! The local field is unset by the last requested relation that joins on
//! it, so relations sharing a local field each see it. `_id` is never
//! unset. A group that leaves its local field in place clears its own key
//! instead, ahead of the `$set` that writes it.
//!
//! Because a replaced local field is gone from the result, selecting it
//! alongside its populated relation is rejected by [`check_selection`].
//!
//! ## Names
//!
//! The join variable and the temporary field are derived from the relation
//! key (and target field), so two relations targeting the same collection
//! never share either name. Both are deterministic: compiling the same
//! request twice yields identical pipelines.
//!
//! ## Missing Targets
//!
//! `$unwind` is strict unless the relation opts into
//! [`MissingTarget::Keep`]. A strict unwind drops a host document whose
//! relation finds nothing.
//!
//! Compilation is purely structural. Every failure is raised before any
//! store round-trip.

use thiserror::Error;
use tracing::{debug, trace};

use monarch_core::{doc, Document, Value, ID_FIELD};
use monarch_schema::{
    compose_projection, MissingTarget, Projection, ProjectionError, ProjectionMode, Relation,
    Schema, SchemaResolver,
};

use crate::stage::{Lookup, Pipeline, Stage, Unwind};

/// Prefix of the temporary field a join writes into.
pub const TEMP_FIELD_PREFIX: &str = "__populate_";

/// Prefix of join variables. Store variables must start with a lowercase
/// letter.
pub const JOIN_VAR_PREFIX: &str = "ref_";

/// Errors raised while compiling a population request.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum PopulateError {
    /// The key is not a relation declared on the schema.
    #[error("collection '{collection}' has no relation '{relation}'")]
    UnknownRelation {
        /// Collection being queried.
        collection: String,
        /// The requested key.
        relation: String,
    },

    /// The relation's target collection has no schema.
    #[error("relation '{collection}.{relation}' targets unresolvable collection '{target}'")]
    UnresolvedTarget {
        /// Collection being queried.
        collection: String,
        /// The relation key.
        relation: String,
        /// The target collection.
        target: String,
    },

    /// The same key was requested twice.
    #[error("relation '{collection}.{relation}' is requested more than once")]
    DuplicateRelation {
        /// Collection being queried.
        collection: String,
        /// The repeated key.
        relation: String,
    },

    /// A select names a local field that populating its relation removes.
    #[error(
        "collection '{collection}': cannot select '{field}' while populating '{relation}', which replaces it"
    )]
    SelectsReplacedField {
        /// Collection being queried.
        collection: String,
        /// The populated relation key.
        relation: String,
        /// The selected local field.
        field: String,
    },

    /// The target schema's default projection could not be composed.
    #[error(transparent)]
    Projection(#[from] ProjectionError),
}

/// Compile `populate` against `schema` into an aggregation pipeline whose
/// first stage matches `filter`.
///
/// # Errors
///
/// Returns a [`PopulateError`] for an unknown, duplicate or unresolvable
/// relation key. Nothing is compiled if any key fails.
pub fn compile_pipeline<R, S>(
    schema: &Schema,
    resolver: &R,
    filter: &Document,
    populate: &[S],
) -> Result<Pipeline, PopulateError>
where
    R: SchemaResolver + ?Sized,
    S: AsRef<str>,
{
    let collection = schema.collection().as_str();
    let mut pipeline = Pipeline::new();
    pipeline.push(Stage::Match(filter.clone()));

    let mut seen: Vec<&str> = Vec::with_capacity(populate.len());
    let mut resolved: Vec<(&str, &Relation, &Schema)> = Vec::with_capacity(populate.len());
    for key in populate {
        let key = key.as_ref();
        if seen.contains(&key) {
            return Err(PopulateError::DuplicateRelation {
                collection: collection.to_string(),
                relation: key.to_string(),
            });
        }
        seen.push(key);

        let relation = schema
            .relation(key)
            .ok_or_else(|| PopulateError::UnknownRelation {
                collection: collection.to_string(),
                relation: key.to_string(),
            })?;
        let target = resolver.resolve(relation.target()).ok_or_else(|| {
            PopulateError::UnresolvedTarget {
                collection: collection.to_string(),
                relation: key.to_string(),
                target: relation.target().to_string(),
            }
        })?;
        resolved.push((key, relation, target));
    }

    let mut temp_names: Vec<String> = Vec::with_capacity(resolved.len());
    for (i, (key, relation, target)) in resolved.iter().enumerate() {
        let local = relation.local_field();
        let read_later = resolved[i + 1..]
            .iter()
            .any(|(_, later, _)| later.local_field() == local);
        let cleared = if local == ID_FIELD || read_later { *key } else { local };

        let temp = unique(temp_field(key), &temp_names);
        let var = join_variable(key, relation.target_field());
        trace!(
            collection,
            relation = *key,
            target = %relation.target(),
            temp = %temp,
            cleared,
            "populating relation"
        );

        pipeline.extend(population_stages(key, relation, target, &var, &temp, cleared)?);
        temp_names.push(temp);
    }

    debug!(
        collection,
        relations = populate.len(),
        stages = pipeline.len(),
        "pipeline compiled"
    );
    Ok(pipeline)
}

fn population_stages(
    key: &str,
    relation: &Relation,
    target: &Schema,
    var: &str,
    temp: &str,
    cleared: &str,
) -> Result<[Stage; 5], PopulateError> {
    let mut join = vec![
        Stage::Match(doc! {
            "$expr": doc! {
                "$eq": vec![
                    Value::from(format!("${}", relation.target_field())),
                    Value::from(format!("$${var}")),
                ],
            },
        }),
        Stage::Limit(1),
    ];
    let target_projection = compose_projection(target, None)?;
    if !target_projection.is_passthrough() {
        join.push(Stage::Project(target_projection.to_document()));
    }

    let mut let_vars = Document::with_capacity(1);
    let_vars.insert(var, format!("${}", relation.local_field()));

    Ok([
        Stage::Lookup(Lookup {
            from: relation.target().clone(),
            let_vars,
            pipeline: join,
            as_field: temp.to_string(),
        }),
        Stage::Unwind(Unwind {
            path: temp.to_string(),
            preserve_null_and_empty_arrays: relation.missing_target() == MissingTarget::Keep,
        }),
        Stage::Unset(vec![cleared.to_string()]),
        Stage::Set({
            let mut set = Document::with_capacity(1);
            set.insert(key, format!("${temp}"));
            set
        }),
        Stage::Unset(vec![temp.to_string()]),
    ])
}

/// Reject a select that names the local field of a populated relation.
///
/// `_id` is exempt: it is never replaced.
///
/// # Errors
///
/// Returns [`PopulateError::SelectsReplacedField`] for the first such
/// field, in population order.
pub fn check_selection<S: AsRef<str>>(
    schema: &Schema,
    projection: &Projection,
    populate: &[S],
) -> Result<(), PopulateError> {
    if projection.mode() != ProjectionMode::Select {
        return Ok(());
    }
    for key in populate {
        let key = key.as_ref();
        let Some(relation) = schema.relation(key) else {
            continue;
        };
        let local = relation.local_field();
        let selected = projection
            .fields()
            .iter()
            .any(|(name, include)| *include && name == local);
        if local != ID_FIELD && selected && !projection.support_fields().iter().any(|s| s == local) {
            return Err(PopulateError::SelectsReplacedField {
                collection: schema.collection().to_string(),
                relation: key.to_string(),
                field: local.to_string(),
            });
        }
    }
    Ok(())
}

/// Name of the temporary field the join for `key` writes into.
pub fn temp_field(key: &str) -> String {
    format!("{TEMP_FIELD_PREFIX}{}", sanitize(key))
}

/// Name of the pipeline-local variable carrying the local field of `key`.
pub fn join_variable(key: &str, target_field: &str) -> String {
    format!("{JOIN_VAR_PREFIX}{}_{}", sanitize(key), sanitize(target_field))
}

fn sanitize(name: &str) -> String {
    name.chars()
        .map(|c| if c.is_ascii_alphanumeric() { c } else { '_' })
        .collect()
}

// Distinct keys can sanitize to the same name ("a-b", "a.b").
fn unique(candidate: String, taken: &[String]) -> String {
    if !taken.contains(&candidate) {
        return candidate;
    }
    let mut n = 2;
    loop {
        let name = format!("{candidate}_{n}");
        if !taken.contains(&name) {
            return name;
        }
        n += 1;
    }
}


#[cfg(test)]
mod proptests {
    use super::*;
    use monarch_core::CollectionName;
    use monarch_schema::{FieldType, SchemaRegistry};
    use proptest::prelude::*;

    const KEYS: [&str; 4] = ["r0", "r1", "r2", "r3"];

    fn registry() -> SchemaRegistry {
        let target = CollectionName::new("targets").unwrap();
        let mut host = Schema::builder(CollectionName::new("hosts").unwrap());
        for (i, key) in KEYS.iter().enumerate() {
            let local = format!("k{i}");
            host = host
                .field(local.clone(), FieldType::any())
                .relation(*key, Relation::to_id(local, target.clone()));
        }
        SchemaRegistry::builder()
            .register(host.build().unwrap())
            .register(Schema::builder(target).build().unwrap())
            .build()
            .unwrap()
    }

    proptest! {
        #[test]
        fn stage_count_is_one_plus_five_n(
            keys in proptest::sample::subsequence(KEYS.to_vec(), 0..=KEYS.len()).prop_shuffle()
        ) {
            let registry = registry();
            let host = registry.get_by_name("hosts").unwrap();
            let pipeline = compile_pipeline(&host, &registry, &Document::new(), &keys).unwrap();
            prop_assert_eq!(pipeline.len(), 1 + 5 * keys.len());
            prop_assert_eq!(pipeline.stages()[0].operator(), "$match");
            for (i, key) in keys.iter().enumerate() {
                let group = &pipeline.stages()[1 + 5 * i..6 + 5 * i];
                let operators: Vec<&str> = group.iter().map(Stage::operator).collect();
                prop_assert_eq!(operators, vec!["$lookup", "$unwind", "$unset", "$set", "$unset"]);
                match &group[3] {
                    Stage::Set(set) => prop_assert!(set.contains_key(key)),
                    other => prop_assert!(false, "expected $set, got {:?}", other),
                }
            }
        }

        #[test]
        fn compile_is_deterministic(
            keys in proptest::sample::subsequence(KEYS.to_vec(), 0..=KEYS.len()).prop_shuffle()
        ) {
            let registry = registry();
            let host = registry.get_by_name("hosts").unwrap();
            let first = compile_pipeline(&host, &registry, &Document::new(), &keys);
            let second = compile_pipeline(&host, &registry, &Document::new(), &keys);
            prop_assert_eq!(first, second);
        }
    }
}
