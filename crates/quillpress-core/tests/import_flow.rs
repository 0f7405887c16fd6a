//! Integration tests for the export/import pipeline.

use quillpress_core::export;
use quillpress_core::import::{import, ImportBatch};
use quillpress_core::migration::{MigrationConfig, Migrator};
use quillpress_core::schema::{default_schema, SchemaSpec};
use quillpress_core::store::{
    find_one, int_value, row_from, stamp_insert, str_value, DatabaseAdapter, SqliteAdapter,
};
use serde_json::json;
use std::sync::Arc;

struct TestContext {
    adapter: Arc<SqliteAdapter>,
    spec: SchemaSpec,
    _data_dir: tempfile::TempDir,
}

impl TestContext {
    /// A fully installed blog: all tables, fixtures, settings.
    fn installed() -> Self {
        let ctx = Self::bare();
        let migrator = Migrator::new(
            ctx.adapter.clone(),
            ctx.spec.clone(),
            MigrationConfig::new(ctx._data_dir.path()),
        )
        .unwrap();
        migrator.init().unwrap();
        ctx
    }

    /// Tables plus the role set and an owner user, but no content.
    /// The minimal target an import needs.
    fn empty_with_roles() -> Self {
        let ctx = Self::bare();
        let migrator = Migrator::new(
            ctx.adapter.clone(),
            ctx.spec.clone(),
            MigrationConfig::new(ctx._data_dir.path()),
        )
        .unwrap();
        migrator.migrate_up_fresh(true).unwrap();

        let roles_table = ctx.spec.get_table("roles").unwrap();
        for name in ["Administrator", "Editor", "Author", "Owner"] {
            let mut row = row_from(&[("name", json!(name)), ("description", json!(name))]);
            stamp_insert(roles_table, &mut row);
            ctx.adapter.insert("roles", &row).unwrap();
        }

        let users_table = ctx.spec.get_table("users").unwrap();
        let mut owner = row_from(&[
            ("name", json!("Quillpress Owner")),
            ("slug", json!("quillpress-owner")),
            ("email", json!("owner@example.com")),
            ("password", json!("irrelevant-placeholder-value")),
            ("status", json!("active")),
        ]);
        stamp_insert(users_table, &mut owner);
        let owner_id = ctx.adapter.insert("users", &owner).unwrap();
        let owner_role = find_one(ctx.adapter.as_ref(), "roles", "name", &json!("Owner"))
            .unwrap()
            .unwrap();
        ctx.adapter
            .insert(
                "roles_users",
                &row_from(&[
                    ("role_id", json!(int_value(&owner_role, "id").unwrap())),
                    ("user_id", json!(owner_id)),
                ]),
            )
            .unwrap();
        ctx
    }

    fn bare() -> Self {
        Self {
            adapter: Arc::new(SqliteAdapter::open_in_memory().unwrap()),
            spec: default_schema(),
            _data_dir: tempfile::tempdir().unwrap(),
        }
    }

    fn count(&self, table: &str) -> usize {
        self.adapter.select_all(table).unwrap().len()
    }
}

fn batch(data: serde_json::Value) -> ImportBatch {
    serde_json::from_value(json!({ "data": data })).unwrap()
}

#[test]
fn export_import_round_trip_reproduces_content() {
    let source = TestContext::installed();
    let snapshot = export::export(source.adapter.as_ref()).unwrap();

    let target = TestContext::empty_with_roles();
    let report = import(
        target.adapter.as_ref(),
        &target.spec,
        ImportBatch::from(snapshot.clone()),
    )
    .unwrap();

    assert!(report.problems.is_empty());
    for source_post in &snapshot.data["posts"] {
        let slug = json!(str_value(source_post, "slug").unwrap());
        let imported = find_one(target.adapter.as_ref(), "posts", "slug", &slug)
            .unwrap()
            .expect("post missing after import");
        for field in ["title", "markdown", "html", "status", "language"] {
            assert_eq!(imported.get(field), source_post.get(field), "field {field}");
        }
    }
    for source_tag in &snapshot.data["tags"] {
        let slug = json!(str_value(source_tag, "slug").unwrap());
        let imported = find_one(target.adapter.as_ref(), "tags", "slug", &slug)
            .unwrap()
            .expect("tag missing after import");
        assert_eq!(imported.get("name"), source_tag.get("name"));
    }
    assert_eq!(
        target.count("posts_tags"),
        snapshot.data["posts_tags"].len()
    );
}

#[test]
fn duplicate_posts_are_diverted_not_persisted() {
    let ctx = TestContext::installed();
    let posts_before = ctx.count("posts");

    let report = import(
        ctx.adapter.as_ref(),
        &ctx.spec,
        batch(json!({
            "posts": [
                {
                    "id": 1,
                    "title": "Same Title",
                    "slug": "same-title",
                    "markdown": "first body",
                    "author_id": 1,
                    "created_by": 1
                },
                {
                    "id": 2,
                    "title": "Same Title",
                    "slug": "same-title",
                    "markdown": "second body",
                    "author_id": 1,
                    "created_by": 1
                }
            ]
        })),
    )
    .unwrap();

    assert_eq!(report.problems["posts"].len(), 1);
    assert_eq!(ctx.count("posts"), posts_before + 1);
    let persisted = find_one(ctx.adapter.as_ref(), "posts", "slug", &json!("same-title"))
        .unwrap()
        .unwrap();
    assert_eq!(str_value(&persisted, "markdown"), Some("first body"));
}

#[test]
fn unknown_user_reference_fails_the_whole_import() {
    let ctx = TestContext::installed();
    let posts_before = ctx.count("posts");

    let result = import(
        ctx.adapter.as_ref(),
        &ctx.spec,
        batch(json!({
            "posts": [{
                "title": "Orphan",
                "slug": "orphan",
                "markdown": "body",
                "author_id": 1,
                "created_by": 42
            }]
        })),
    );

    match result {
        Err(quillpress_core::Error::DataImport {
            property, value, ..
        }) => {
            assert_eq!(property, "user.id");
            assert_eq!(value, "42");
        }
        other => panic!("expected DataImport error, got {other:?}"),
    }
    // transaction rolled back in full
    assert_eq!(ctx.count("posts"), posts_before);
}

#[test]
fn core_settings_are_never_imported() {
    let ctx = TestContext::installed();

    import(
        ctx.adapter.as_ref(),
        &ctx.spec,
        batch(json!({
            "settings": [
                { "key": "databaseVersion", "value": "999", "type": "core" },
                { "key": "title", "value": "Imported Title", "type": "blog" }
            ]
        })),
    )
    .unwrap();

    let settings =
        quillpress_core::settings::SettingsStore::new(ctx.adapter.as_ref(), &ctx.spec);
    assert_eq!(
        settings.value("databaseVersion").unwrap().as_deref(),
        Some("004")
    );
    assert_eq!(
        settings.value("title").unwrap().as_deref(),
        Some("Imported Title")
    );
}

#[test]
fn tag_name_collision_reuses_existing_tag() {
    let ctx = TestContext::installed();
    let tags_before = ctx.count("tags");
    let links_before = ctx.count("posts_tags");

    import(
        ctx.adapter.as_ref(),
        &ctx.spec,
        batch(json!({
            "posts": [{
                "id": 7,
                "title": "Tagged",
                "slug": "tagged",
                "markdown": "body",
                "author_id": 1,
                "created_by": 1
            }],
            "tags": [{
                "id": 9,
                "name": "Getting Started",
                "slug": "getting-started-again",
                "created_by": 1
            }],
            "posts_tags": [{ "post_id": 7, "tag_id": 9, "sort_order": 0 }]
        })),
    )
    .unwrap();

    // the existing tag was reused, the link landed on it
    assert_eq!(ctx.count("tags"), tags_before);
    assert_eq!(ctx.count("posts_tags"), links_before + 1);

    let existing_tag = find_one(
        ctx.adapter.as_ref(),
        "tags",
        "slug",
        &json!("getting-started"),
    )
    .unwrap()
    .unwrap();
    let new_post = find_one(ctx.adapter.as_ref(), "posts", "slug", &json!("tagged"))
        .unwrap()
        .unwrap();
    let link = ctx
        .adapter
        .select_where(
            "posts_tags",
            "post_id",
            &json!(int_value(&new_post, "id").unwrap()),
        )
        .unwrap();
    assert_eq!(
        int_value(&link[0], "tag_id"),
        int_value(&existing_tag, "id")
    );
}

#[test]
fn locked_users_are_created_for_unknown_emails() {
    let ctx = TestContext::installed();

    import(
        ctx.adapter.as_ref(),
        &ctx.spec,
        batch(json!({
            "users": [{
                "id": 3,
                "name": "Visiting Author",
                "slug": "visiting-author",
                "email": "visitor@example.com"
            }],
            "posts": [{
                "title": "Guest Post",
                "slug": "guest-post",
                "markdown": "body",
                "author_id": 3,
                "created_by": 3
            }]
        })),
    )
    .unwrap();

    let user = find_one(
        ctx.adapter.as_ref(),
        "users",
        "email",
        &json!("visitor@example.com"),
    )
    .unwrap()
    .unwrap();
    assert_eq!(str_value(&user, "status"), Some("locked"));

    // the post's user references resolved to the new live id
    let post = find_one(ctx.adapter.as_ref(), "posts", "slug", &json!("guest-post"))
        .unwrap()
        .unwrap();
    assert_eq!(int_value(&post, "author_id"), int_value(&user, "id"));
}
