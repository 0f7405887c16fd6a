//! The declared schema for the current software version.
//!
//! Declaration order is load-bearing: referenced tables come before the
//! tables that reference them.

use super::types::{ColumnDef, ColumnType, DefaultValue, SchemaSpec, TableDef};

fn id() -> ColumnDef {
    ColumnDef::new("id", ColumnType::Increments).primary()
}

fn uuid() -> ColumnDef {
    ColumnDef::new("uuid", ColumnType::String { maxlength: 36 })
}

fn string(name: &str, maxlength: usize) -> ColumnDef {
    ColumnDef::new(name, ColumnType::String { maxlength })
}

fn created() -> [ColumnDef; 2] {
    [
        ColumnDef::new("created_at", ColumnType::DateTime),
        ColumnDef::new("created_by", ColumnType::Integer),
    ]
}

fn updated() -> [ColumnDef; 2] {
    [
        ColumnDef::new("updated_at", ColumnType::DateTime).nullable(),
        ColumnDef::new("updated_by", ColumnType::Integer).nullable(),
    ]
}

fn audited(mut table: TableDef) -> TableDef {
    let [created_at, created_by] = created();
    let [updated_at, updated_by] = updated();
    table = table.column(created_at).column(created_by);
    table.column(updated_at).column(updated_by)
}

fn posts() -> TableDef {
    let table = TableDef::new("posts")
        .column(id())
        .column(uuid())
        .column(string("title", 150))
        .column(string("slug", 150).unique())
        .column(ColumnDef::new("markdown", ColumnType::MediumText).nullable())
        .column(ColumnDef::new("html", ColumnType::MediumText).nullable())
        .column(string("image", 2000).nullable())
        .column(ColumnDef::new("featured", ColumnType::Bool).default_to(DefaultValue::Bool(false)))
        .column(ColumnDef::new("page", ColumnType::Bool).default_to(DefaultValue::Bool(false)))
        .column(string("status", 150).default_to(DefaultValue::Text("draft")))
        .column(string("language", 6).default_to(DefaultValue::Text("en_US")))
        .column(string("meta_title", 150).nullable())
        .column(string("meta_description", 200).nullable())
        .column(ColumnDef::new("author_id", ColumnType::Integer));
    audited(table)
        .column(ColumnDef::new("published_at", ColumnType::DateTime).nullable())
        .column(ColumnDef::new("published_by", ColumnType::Integer).nullable())
}

fn users() -> TableDef {
    let table = TableDef::new("users")
        .column(id())
        .column(uuid())
        .column(string("name", 150))
        .column(string("slug", 150).unique())
        .column(string("password", 60))
        .column(string("email", 254).unique())
        .column(string("image", 2000).nullable())
        .column(string("cover", 2000).nullable())
        .column(string("bio", 200).nullable())
        .column(string("website", 2000).nullable())
        .column(ColumnDef::new("location", ColumnType::Text).nullable())
        .column(ColumnDef::new("accessibility", ColumnType::Text).nullable())
        .column(string("status", 150).default_to(DefaultValue::Text("active")))
        .column(string("language", 6).default_to(DefaultValue::Text("en_US")))
        .column(string("meta_title", 150).nullable())
        .column(string("meta_description", 200).nullable())
        .column(ColumnDef::new("last_login", ColumnType::DateTime).nullable());
    audited(table)
}

fn roles() -> TableDef {
    let table = TableDef::new("roles")
        .column(id())
        .column(uuid())
        .column(string("name", 150))
        .column(string("description", 200).nullable());
    audited(table)
}

fn roles_users() -> TableDef {
    TableDef::new("roles_users")
        .column(id())
        .column(ColumnDef::new("role_id", ColumnType::Integer))
        .column(ColumnDef::new("user_id", ColumnType::Integer))
}

fn permissions() -> TableDef {
    let table = TableDef::new("permissions")
        .column(id())
        .column(uuid())
        .column(string("name", 150))
        .column(string("object_type", 150))
        .column(string("action_type", 150))
        .column(ColumnDef::new("object_id", ColumnType::Integer).unsigned().nullable());
    audited(table)
}

fn join_table(name: &str, left: &str, right: &str) -> TableDef {
    TableDef::new(name)
        .column(id())
        .column(ColumnDef::new(left, ColumnType::Integer))
        .column(ColumnDef::new(right, ColumnType::Integer))
}

fn settings() -> TableDef {
    let table = TableDef::new("settings")
        .column(id())
        .column(uuid())
        .column(string("key", 150).unique())
        .column(ColumnDef::new("value", ColumnType::Text).nullable())
        .column(string("type", 150).default_to(DefaultValue::Text("core")));
    audited(table)
}

fn tags() -> TableDef {
    let table = TableDef::new("tags")
        .column(id())
        .column(uuid())
        .column(string("name", 150))
        .column(string("slug", 150).unique())
        .column(string("description", 200).nullable())
        .column(ColumnDef::new("parent_id", ColumnType::Integer).nullable())
        .column(string("meta_title", 150).nullable())
        .column(string("meta_description", 200).nullable())
        .column(string("image", 2000).nullable())
        .column(ColumnDef::new("hidden", ColumnType::Bool).default_to(DefaultValue::Bool(false)));
    audited(table)
}

fn posts_tags() -> TableDef {
    TableDef::new("posts_tags")
        .column(id())
        .column(
            ColumnDef::new("post_id", ColumnType::Integer)
                .unsigned()
                .references("posts.id"),
        )
        .column(
            ColumnDef::new("tag_id", ColumnType::Integer)
                .unsigned()
                .references("tags.id"),
        )
        .column(ColumnDef::new("sort_order", ColumnType::Integer).default_to(DefaultValue::Int(0)))
}

fn apps() -> TableDef {
    let table = TableDef::new("apps")
        .column(id())
        .column(uuid())
        .column(string("name", 150).unique())
        .column(string("slug", 150).unique())
        .column(string("version", 150))
        .column(string("status", 150).default_to(DefaultValue::Text("inactive")));
    audited(table)
}

fn app_settings() -> TableDef {
    let table = TableDef::new("app_settings")
        .column(id())
        .column(uuid())
        .column(string("key", 150).unique())
        .column(ColumnDef::new("value", ColumnType::Text).nullable())
        .column(
            ColumnDef::new("app_id", ColumnType::Integer)
                .unsigned()
                .references("apps.id"),
        );
    audited(table)
}

fn app_fields() -> TableDef {
    let table = TableDef::new("app_fields")
        .column(id())
        .column(uuid())
        .column(string("key", 150))
        .column(ColumnDef::new("value", ColumnType::Text).nullable())
        .column(string("type", 150).default_to(DefaultValue::Text("html")))
        .column(
            ColumnDef::new("app_id", ColumnType::Integer)
                .unsigned()
                .references("apps.id"),
        )
        .column(ColumnDef::new("relatable_id", ColumnType::Integer).unsigned())
        .column(string("relatable_type", 50).default_to(DefaultValue::Text("posts")))
        .column(ColumnDef::new("active", ColumnType::Bool).default_to(DefaultValue::Bool(true)));
    audited(table)
}

fn clients() -> TableDef {
    let table = TableDef::new("clients")
        .column(id())
        .column(uuid())
        .column(string("name", 150).unique())
        .column(string("slug", 150).unique())
        .column(string("secret", 150));
    audited(table)
}

fn client_trusted_domains() -> TableDef {
    TableDef::new("client_trusted_domains")
        .column(id())
        .column(uuid())
        .column(
            ColumnDef::new("client_id", ColumnType::Integer)
                .unsigned()
                .references("clients.id"),
        )
        .column(string("trusted_domain", 2000).nullable())
}

fn token_table(name: &str) -> TableDef {
    TableDef::new(name)
        .column(id())
        .column(string("token", 191).unique())
        .column(
            ColumnDef::new("user_id", ColumnType::Integer)
                .unsigned()
                .references("users.id"),
        )
        .column(
            ColumnDef::new("client_id", ColumnType::Integer)
                .unsigned()
                .references("clients.id"),
        )
        .column(ColumnDef::new("expires", ColumnType::BigInteger))
}

/// The full schema for the current software version.
pub fn default_schema() -> SchemaSpec {
    SchemaSpec::new(vec![
        posts(),
        users(),
        roles(),
        roles_users(),
        permissions(),
        join_table("permissions_users", "user_id", "permission_id"),
        join_table("permissions_roles", "role_id", "permission_id"),
        join_table("permissions_apps", "app_id", "permission_id"),
        settings(),
        tags(),
        posts_tags(),
        apps(),
        app_settings(),
        app_fields(),
        clients(),
        client_trusted_domains(),
        token_table("accesstokens"),
        token_table("refreshtokens"),
    ])
}
