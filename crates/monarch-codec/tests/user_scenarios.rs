//! End-to-end codec behavior on the `User` schema: defaults, nullability,
//! select projections and the encode/decode round-trip.

use monarch_codec::{decode, decode_default, encode, DecodeError};
use monarch_core::{doc, CollectionName, Document, FieldError, Timestamp, Value};
use monarch_schema::{
    compose_projection, FieldType, ProjectionRequest, Schema, SchemaRegistry,
};
use proptest::prelude::*;

fn user_schema(status: FieldType) -> Schema {
    Schema::builder(CollectionName::new("users").unwrap())
        .field("name", FieldType::string())
        .field("age", FieldType::number().with_default(0))
        .field("status", status)
        .build()
        .unwrap()
}

fn registry(schema: Schema) -> SchemaRegistry {
    SchemaRegistry::builder().register(schema).build().unwrap()
}

fn decode_users(registry: &SchemaRegistry, raw: &Document) -> Result<Document, DecodeError> {
    let users = registry.get_by_name("users").unwrap();
    decode_default(&users, registry, raw)
}

// ── Defaults and nullability ────────────────────────────────────────

#[test]
fn test_nullable_status_decodes_to_null() {
    let registry = registry(user_schema(FieldType::string().nullable()));
    let out = decode_users(&registry, &doc! { "name": "Ana" }).unwrap();
    assert_eq!(out, doc! { "name": "Ana", "age": 0, "status": Value::Null });
}

#[test]
fn test_required_status_fails_decode() {
    let registry = registry(user_schema(FieldType::string()));
    let err = decode_users(&registry, &doc! { "name": "Ana" }).unwrap_err();
    assert_eq!(
        err.field_error(),
        Some(&FieldError::Required { field: "status".into() })
    );
}

#[test]
fn test_nullable_accepts_explicit_null_even_when_required() {
    let registry = registry(user_schema(FieldType::string().required().nullable()));
    let out = decode_users(&registry, &doc! { "name": "Ana", "status": Value::Null }).unwrap();
    assert_eq!(out.get("status"), Some(&Value::Null));
}

// ── Projection ──────────────────────────────────────────────────────

#[test]
fn test_select_name_keeps_id_and_drops_the_rest() {
    let registry = registry(user_schema(FieldType::string().nullable()));
    let users = registry.get_by_name("users").unwrap();
    let projection =
        compose_projection(&users, Some(&ProjectionRequest::select(["name"]))).unwrap();
    let raw = doc! { "_id": "u1", "name": "Ana", "age": 31, "status": "active" };
    let out = decode(&users, &registry, &raw, &projection, &[] as &[&str]).unwrap();
    assert_eq!(out, doc! { "_id": "u1", "name": "Ana" });
    assert!(!out.contains_key("age"));
    assert!(!out.contains_key("status"));
}

#[test]
fn test_omit_removes_field_entirely() {
    let registry = registry(user_schema(FieldType::string().nullable()));
    let users = registry.get_by_name("users").unwrap();
    let projection =
        compose_projection(&users, Some(&ProjectionRequest::omit(["status"]))).unwrap();
    let out = decode(&users, &registry, &doc! { "name": "Ana" }, &projection, &[] as &[&str])
        .unwrap();
    assert_eq!(out, doc! { "name": "Ana", "age": 0 });
}

// ── Round-trip ──────────────────────────────────────────────────────

fn profile_schema() -> Schema {
    Schema::builder(CollectionName::new("profiles").unwrap())
        .field("handle", FieldType::string())
        .field("score", FieldType::number())
        .field("verified", FieldType::boolean())
        .field("seen", FieldType::date().nullable())
        .field("bio", FieldType::string().optional())
        .build()
        .unwrap()
}

fn profile_strategy() -> impl Strategy<Value = Document> {
    (
        "[a-z]{1,12}",
        any::<i64>(),
        any::<bool>(),
        proptest::option::of(0i64..4_102_444_800_000),
        proptest::option::of(".{0,24}"),
    )
        .prop_map(|(handle, score, verified, seen, bio)| {
            let mut d = doc! { "_id": handle.clone(), "handle": handle, "score": score, "verified": verified };
            let seen = match seen {
                Some(millis) => Value::DateTime(Timestamp::from_millis(millis).unwrap()),
                None => Value::Null,
            };
            d.insert("seen", seen);
            if let Some(bio) = bio {
                d.insert("bio", bio);
            }
            d
        })
}

proptest! {
    #[test]
    fn encode_then_decode_returns_input(input in profile_strategy()) {
        let registry = registry(profile_schema());
        let profiles = registry.get_by_name("profiles").unwrap();
        let stored = encode(&profiles, &input).unwrap();
        let decoded = decode_default(&profiles, &registry, &stored).unwrap();
        prop_assert_eq!(decoded, input);
    }

    #[test]
    fn select_round_trip_is_restricted_to_selection(input in profile_strategy()) {
        let registry = registry(profile_schema());
        let profiles = registry.get_by_name("profiles").unwrap();
        let stored = encode(&profiles, &input).unwrap();
        let projection = compose_projection(
            &profiles,
            Some(&ProjectionRequest::select(["handle", "verified"])),
        )
        .unwrap();
        let decoded = decode(&profiles, &registry, &stored, &projection, &[] as &[&str]).unwrap();
        let expected: Document = input
            .iter()
            .filter(|(k, _)| ["_id", "handle", "verified"].contains(k))
            .map(|(k, v)| (k, v.clone()))
            .collect();
        prop_assert_eq!(decoded, expected);
    }
}
