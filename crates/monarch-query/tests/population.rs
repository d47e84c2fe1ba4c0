//! End-to-end reads and writes against the in-memory store: strict
//! relations drop hosts whose target is missing, kept relations decode to
//! null, projections apply to the populated output, and find-and-modify
//! results come back decoded.

use std::sync::Arc;

use futures::StreamExt;
use serde::Deserialize;

use monarch_core::{doc, CollectionName, Document, Value, ID_FIELD};
use monarch_pipeline::PopulateError;
use monarch_query::{Collection, FindOptions, MemoryStore, ModifyOptions, QueryError};
use monarch_schema::{FieldType, Relation, Schema, SchemaRegistry, VirtualField};

fn name(s: &str) -> CollectionName {
    CollectionName::new(s).unwrap()
}

fn registry() -> Arc<SchemaRegistry> {
    let users = Schema::builder(name("users"))
        .field("name", FieldType::string())
        .field("password", FieldType::string().optional())
        .virtual_field(VirtualField::new("greeting", ["name"], |d: &Document| {
            let name = d.get("name").and_then(Value::as_str).unwrap_or_default();
            Value::from(format!("hi {name}"))
        }))
        .omit("password")
        .relation(
            "profile",
            Relation::new(ID_FIELD, name("profiles"), "userId").keep_missing(),
        )
        .build()
        .unwrap();
    let profiles = Schema::builder(name("profiles"))
        .field("userId", FieldType::string())
        .field("bio", FieldType::string())
        .build()
        .unwrap();
    let posts = Schema::builder(name("posts"))
        .field("title", FieldType::string())
        .field("authorId", FieldType::string())
        .field("editorId", FieldType::string().optional())
        .relation("author", Relation::to_id("authorId", name("users")))
        .relation("authorProfile", Relation::new("authorId", name("profiles"), "userId"))
        .relation("editor", Relation::to_id("editorId", name("users")).keep_missing())
        .build()
        .unwrap();
    Arc::new(
        SchemaRegistry::builder()
            .register(users)
            .register(profiles)
            .register(posts)
            .build()
            .unwrap(),
    )
}

async fn seeded() -> (Collection<MemoryStore>, Collection<MemoryStore>) {
    let store = Arc::new(MemoryStore::new());
    store
        .seed(
            "users",
            vec![
                doc! { "_id": "u1", "name": "Ana", "password": "hunter2" },
                doc! { "_id": "u2", "name": "Bo", "password": "swordfish" },
            ],
        )
        .await;
    store
        .seed(
            "posts",
            vec![
                doc! { "_id": "p1", "title": "Hello", "authorId": "u1" },
                doc! { "_id": "p2", "title": "Orphan", "authorId": "ghost" },
                doc! { "_id": "p3", "title": "Edited", "authorId": "u2", "editorId": "u1" },
            ],
        )
        .await;
    store
        .seed(
            "profiles",
            vec![doc! { "_id": "pr1", "userId": "u1", "bio": "Analyst" }],
        )
        .await;
    let registry = registry();
    let users = Collection::new(Arc::clone(&store), Arc::clone(&registry), "users").unwrap();
    let posts = Collection::new(store, registry, "posts").unwrap();
    (users, posts)
}

fn ana() -> Document {
    doc! { "_id": "u1", "name": "Ana", "greeting": "hi Ana" }
}

fn bo() -> Document {
    doc! { "_id": "u2", "name": "Bo", "greeting": "hi Bo" }
}

// ── Strict and kept relations ───────────────────────────────────────

#[tokio::test]
async fn test_strict_relation_drops_post_with_missing_author() {
    let (_, posts) = seeded().await;
    let found = posts
        .find(&FindOptions::new().populate("author").sort(doc! { "_id": 1 }))
        .await
        .unwrap();
    assert_eq!(
        found,
        vec![
            doc! { "_id": "p1", "title": "Hello", "author": ana() },
            doc! { "_id": "p3", "title": "Edited", "editorId": "u1", "author": bo() },
        ]
    );
}

#[tokio::test]
async fn test_kept_relation_decodes_missing_target_to_null() {
    let (_, posts) = seeded().await;
    let found = posts
        .find(&FindOptions::new().populate("editor").sort(doc! { "_id": 1 }))
        .await
        .unwrap();
    assert_eq!(found.len(), 3);
    assert_eq!(found[0].get("editor"), Some(&Value::Null));
    assert_eq!(found[1].get("editor"), Some(&Value::Null));
    assert_eq!(found[2].get("editor"), Some(&Value::Document(ana())));
    assert!(found.iter().all(|p| !p.contains_key("editorId")));
}

#[tokio::test]
async fn test_two_relations_to_the_same_collection() {
    let (_, posts) = seeded().await;
    let found = posts
        .find_one(
            &FindOptions::new()
                .filter(doc! { "_id": "p3" })
                .populate("author")
                .populate("editor"),
        )
        .await
        .unwrap();
    assert_eq!(
        found,
        doc! { "_id": "p3", "title": "Edited", "author": bo(), "editor": ana() }
    );
}

fn ana_profile() -> Document {
    doc! { "_id": "pr1", "userId": "u1", "bio": "Analyst" }
}

#[tokio::test]
async fn test_relations_sharing_a_local_field() {
    let (_, posts) = seeded().await;
    let found = posts
        .find(&FindOptions::new().populate("author").populate("authorProfile"))
        .await
        .unwrap();
    // Only p1's author has a profile; the strict join drops the others.
    assert_eq!(found.len(), 1);
    assert_eq!(found[0].get(ID_FIELD), Some(&Value::from("p1")));
    assert_eq!(found[0].get("author"), Some(&Value::Document(ana())));
    assert_eq!(found[0].get("authorProfile"), Some(&Value::Document(ana_profile())));
    assert!(!found[0].contains_key("authorId"));

    // Request order does not matter.
    let reversed = posts
        .find(&FindOptions::new().populate("authorProfile").populate("author"))
        .await
        .unwrap();
    assert_eq!(reversed.len(), 1);
    assert_eq!(reversed[0].get("author"), Some(&Value::Document(ana())));
}

#[tokio::test]
async fn test_relation_on_id_keeps_host_id() {
    let (users, _) = seeded().await;
    let found = users
        .find(&FindOptions::new().populate("profile").sort(doc! { "_id": 1 }))
        .await
        .unwrap();
    assert_eq!(found.len(), 2);
    assert_eq!(found[0].get(ID_FIELD), Some(&Value::from("u1")));
    assert_eq!(found[0].get("profile"), Some(&Value::Document(ana_profile())));
    assert_eq!(found[1].get(ID_FIELD), Some(&Value::from("u2")));
    assert_eq!(found[1].get("profile"), Some(&Value::Null));
}

#[tokio::test]
async fn test_selecting_replaced_local_field_is_rejected() {
    let (_, posts) = seeded().await;
    let err = posts
        .find(&FindOptions::new().populate("author").select(["authorId", "author"]))
        .await
        .unwrap_err();
    assert!(matches!(
        err,
        QueryError::Populate(PopulateError::SelectsReplacedField { .. })
    ));
}

#[tokio::test]
async fn test_related_password_is_never_returned() {
    let (_, posts) = seeded().await;
    let found = posts
        .find(&FindOptions::new().populate("author"))
        .await
        .unwrap();
    for post in &found {
        let author = post.get("author").and_then(Value::as_document).unwrap();
        assert!(!author.contains_key("password"));
    }
}

// ── Projection ──────────────────────────────────────────────────────

#[tokio::test]
async fn test_select_with_populate_keeps_id() {
    let (_, posts) = seeded().await;
    let found = posts
        .find_one(
            &FindOptions::new()
                .filter(doc! { "_id": "p1" })
                .populate("author")
                .select(["author"]),
        )
        .await
        .unwrap();
    assert_eq!(found, doc! { "_id": "p1", "author": ana() });
}

#[tokio::test]
async fn test_select_name_keeps_id() {
    let (users, _) = seeded().await;
    let found = users
        .find(&FindOptions::new().select(["name"]).sort(doc! { "name": 1 }))
        .await
        .unwrap();
    assert_eq!(
        found,
        vec![doc! { "_id": "u1", "name": "Ana" }, doc! { "_id": "u2", "name": "Bo" }]
    );
}

#[tokio::test]
async fn test_virtual_field_is_computed_on_read() {
    let (users, _) = seeded().await;
    let found = users
        .find_one(&FindOptions::new().filter(doc! { "_id": "u2" }).select(["greeting"]))
        .await
        .unwrap();
    assert_eq!(found, doc! { "_id": "u2", "greeting": "hi Bo" });
}

// ── Typed reads ─────────────────────────────────────────────────────

#[derive(Debug, Deserialize, PartialEq)]
struct Author {
    #[serde(rename = "_id")]
    id: String,
    name: String,
}

#[derive(Debug, Deserialize, PartialEq)]
struct Post {
    #[serde(rename = "_id")]
    id: String,
    title: String,
    author: Author,
}

#[tokio::test]
async fn test_find_as_typed_posts() {
    let (_, posts) = seeded().await;
    let found: Vec<Post> = posts
        .find_as(&FindOptions::new().populate("author").sort(doc! { "title": 1 }))
        .await
        .unwrap();
    assert_eq!(
        found,
        vec![
            Post {
                id: "p3".into(),
                title: "Edited".into(),
                author: Author { id: "u2".into(), name: "Bo".into() },
            },
            Post {
                id: "p1".into(),
                title: "Hello".into(),
                author: Author { id: "u1".into(), name: "Ana".into() },
            },
        ]
    );
}

// ── Writes ──────────────────────────────────────────────────────────

#[tokio::test]
async fn test_relation_key_cannot_be_written() {
    let (_, posts) = seeded().await;
    let err = posts
        .insert_one(&doc! { "title": "x", "authorId": "u1", "author": ana() })
        .await
        .unwrap_err();
    assert!(matches!(err, QueryError::Encode(_)));
}

#[tokio::test]
async fn test_insert_update_delete() {
    let (_, posts) = seeded().await;
    let id = posts
        .insert_one(&doc! { "title": "New", "authorId": "u2" })
        .await
        .unwrap();
    let filter = doc! { "_id": id.clone() };

    let updated = posts
        .update_one(&filter, &doc! { "$set": doc! { "title": "Renamed" } })
        .await
        .unwrap();
    assert_eq!(updated.modified, 1);

    let found = posts
        .find_one(&FindOptions::new().filter(filter.clone()).populate("author"))
        .await
        .unwrap();
    assert_eq!(found, doc! { "_id": id, "title": "Renamed", "author": bo() });

    assert_eq!(posts.delete_many(&doc! { "authorId": "u2" }).await.unwrap(), 2);
    assert_eq!(posts.count(&doc! {}).await.unwrap(), 2);
    let err = posts
        .find_one(&FindOptions::new().filter(filter))
        .await
        .unwrap_err();
    assert!(err.is_not_found());
}

#[tokio::test]
async fn test_corrupt_stored_document_fails_the_read() {
    let (users, _) = seeded().await;
    users
        .update_one(&doc! { "_id": "u1" }, &doc! { "$set": doc! { "name": 42 } })
        .await
        .unwrap();
    let err = users.find(&FindOptions::new()).await.unwrap_err();
    let QueryError::Decode(decode) = err else {
        panic!("expected a decode error, got {err:?}");
    };
    assert_eq!(decode.path(), "name");
}

#[tokio::test]
async fn test_aggregate_returns_raw_documents() {
    let (users, _) = seeded().await;
    let raw = users
        .aggregate(&[doc! { "$match": doc! { "_id": "u1" } }])
        .await
        .unwrap();
    assert_eq!(raw, vec![doc! { "_id": "u1", "name": "Ana", "password": "hunter2" }]);
}

// ── Replace and find-and-modify ─────────────────────────────────────

#[tokio::test]
async fn test_replace_one_encodes_and_keeps_id() {
    let (users, _) = seeded().await;
    let result = users
        .replace_one(&doc! { "_id": "u1" }, &doc! { "name": "Ann", "nickname": "dropped" })
        .await
        .unwrap();
    assert_eq!((result.matched, result.modified), (1, 1));
    let found = users
        .find_one(&FindOptions::new().filter(doc! { "_id": "u1" }))
        .await
        .unwrap();
    assert_eq!(found, doc! { "_id": "u1", "name": "Ann", "greeting": "hi Ann" });

    let err = users
        .replace_one(&doc! { "_id": "u2" }, &doc! { "name": 7 })
        .await
        .unwrap_err();
    assert!(matches!(err, QueryError::Encode(_)));
    let bo_now = users
        .find_one(&FindOptions::new().filter(doc! { "_id": "u2" }))
        .await
        .unwrap();
    assert_eq!(bo_now, bo());
}

#[tokio::test]
async fn test_find_one_and_update_returns_before_by_default() {
    let (users, _) = seeded().await;
    let before = users
        .find_one_and_update(
            &doc! { "_id": "u2" },
            &doc! { "$set": doc! { "name": "Bea" } },
            &ModifyOptions::new(),
        )
        .await
        .unwrap();
    assert_eq!(before, bo());

    let after = users
        .find_one_and_update(
            &doc! { "_id": "u2" },
            &doc! { "$set": doc! { "name": "Bee" } },
            &ModifyOptions::new().return_after(),
        )
        .await
        .unwrap();
    assert_eq!(after, doc! { "_id": "u2", "name": "Bee", "greeting": "hi Bee" });
    assert!(!after.contains_key("password"));
}

#[tokio::test]
async fn test_find_one_and_update_not_found() {
    let (users, _) = seeded().await;
    let err = users
        .find_one_and_update(
            &doc! { "_id": "nobody" },
            &doc! { "$set": doc! { "name": "x" } },
            &ModifyOptions::new(),
        )
        .await
        .unwrap_err();
    assert!(err.is_not_found());
}

#[tokio::test]
async fn test_find_one_and_replace_returns_written_document() {
    let (_, posts) = seeded().await;
    let written = posts
        .find_one_and_replace(
            &doc! { "_id": "p1" },
            &doc! { "title": "Rewritten", "authorId": "u2" },
            &ModifyOptions::new().return_after(),
        )
        .await
        .unwrap();
    assert_eq!(written, doc! { "_id": "p1", "title": "Rewritten", "authorId": "u2" });
}

#[tokio::test]
async fn test_find_one_and_delete() {
    let (_, posts) = seeded().await;
    let deleted = posts
        .find_one_and_delete(&doc! { "authorId": "ghost" }, &ModifyOptions::new())
        .await
        .unwrap();
    assert_eq!(deleted, doc! { "_id": "p2", "title": "Orphan", "authorId": "ghost" });
    assert_eq!(posts.count(&doc! {}).await.unwrap(), 2);
    let err = posts
        .find_one_and_delete(&doc! { "authorId": "ghost" }, &ModifyOptions::new())
        .await
        .unwrap_err();
    assert!(err.is_not_found());
}

// ── Streaming reads ─────────────────────────────────────────────────

#[tokio::test]
async fn test_find_stream_can_stop_early() {
    let (users, _) = seeded().await;
    let first: Vec<Document> = users
        .find_stream(&FindOptions::new().sort(doc! { "name": 1 }))
        .await
        .unwrap()
        .take(1)
        .map(Result::unwrap)
        .collect()
        .await;
    assert_eq!(first, vec![ana()]);
}

#[tokio::test]
async fn test_find_stream_ends_at_first_decode_failure() {
    let (users, _) = seeded().await;
    users.insert_one(&doc! { "_id": "u3", "name": "Cy" }).await.unwrap();
    users
        .update_one(&doc! { "_id": "u2" }, &doc! { "$set": doc! { "name": 42 } })
        .await
        .unwrap();
    let results: Vec<_> = users
        .find_stream(&FindOptions::new().sort(doc! { "_id": 1 }))
        .await
        .unwrap()
        .collect()
        .await;
    assert_eq!(results.len(), 2);
    assert_eq!(results[0].as_ref().unwrap(), &ana());
    assert!(matches!(results[1], Err(QueryError::Decode(_))));
}

#[tokio::test]
async fn test_find_stream_as_typed_posts() {
    let (_, posts) = seeded().await;
    let titles: Vec<String> = posts
        .find_stream_as::<Post>(&FindOptions::new().populate("author").sort(doc! { "title": -1 }))
        .await
        .unwrap()
        .map(|post| post.unwrap().title)
        .collect()
        .await;
    assert_eq!(titles, vec!["Hello".to_string(), "Edited".to_string()]);
}

// ── Typed aggregation ───────────────────────────────────────────────

#[derive(Debug, Deserialize, PartialEq)]
struct PostsPerAuthor {
    #[serde(rename = "_id")]
    author: String,
    posts: i64,
}

#[tokio::test]
async fn test_aggregate_as_with_grouping() {
    let (_, posts) = seeded().await;
    let counts: Vec<PostsPerAuthor> = posts
        .aggregate_as(&[
            doc! { "$group": doc! { "_id": "$authorId", "posts": doc! { "$sum": 1 } } },
            doc! { "$sort": doc! { "_id": 1 } },
        ])
        .await
        .unwrap();
    assert_eq!(
        counts,
        vec![
            PostsPerAuthor { author: "ghost".into(), posts: 1 },
            PostsPerAuthor { author: "u1".into(), posts: 1 },
            PostsPerAuthor { author: "u2".into(), posts: 1 },
        ]
    );
}
