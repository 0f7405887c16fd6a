//! Fixture population and versioned fixture updates.
//!
//! `populate` seeds a fresh install. The versioned steps (`to_003`,
//! `to_004`) are idempotent check-before-write upgrades selected by
//! [`update`]; adding a future step means adding a row to the step table,
//! not new control flow.

pub(crate) mod seed;
pub mod permissions;

pub use seed::{FOOTER_CDN_SNIPPET, PLACEHOLDER_SECRET};

use crate::error::Error;
use crate::schema::SchemaSpec;
use crate::settings::SettingsStore;
use crate::store::{
    find_one, int_value, now_millis, row_from, stamp_insert, str_value, DatabaseAdapter, Row,
};
use crate::util::{random_hex, uid};
use crate::versioning::DatabaseVersion;
use serde_json::json;
use tracing::info;

type StepFn = fn(&dyn DatabaseAdapter, &SchemaSpec) -> Result<(), Error>;

/// A versioned fixture upgrade: one idempotent step per version boundary.
struct VersionedStep {
    target: DatabaseVersion,
    apply: StepFn,
}

const STEPS: &[VersionedStep] = &[
    VersionedStep {
        target: DatabaseVersion::new(3),
        apply: to_003,
    },
    VersionedStep {
        target: DatabaseVersion::new(4),
        apply: to_004,
    },
];

fn insert_stamped(
    adapter: &dyn DatabaseAdapter,
    spec: &SchemaSpec,
    table: &str,
    mut row: Row,
) -> Result<i64, Error> {
    if let Some(def) = spec.get_table(table) {
        stamp_insert(def, &mut row);
    }
    adapter.insert(table, &row)
}

fn role_id(adapter: &dyn DatabaseAdapter, name: &str) -> Result<i64, Error> {
    let role = find_one(adapter, "roles", "name", &json!(name))?
        .ok_or_else(|| Error::not_found(format!("role {name}")))?;
    int_value(&role, "id").ok_or_else(|| Error::not_found(format!("id of role {name}")))
}

/// Create the Owner user with a random unguessable password placeholder and
/// attach the Owner role. The real credential is set later by the setup
/// flow.
fn create_owner(adapter: &dyn DatabaseAdapter, spec: &SchemaSpec) -> Result<(), Error> {
    let owner_role = role_id(adapter, "Owner")?;
    let mut user = seed::owner_user();
    user.insert("password".into(), json!(uid(50)));
    info!("creating owner");
    let user_id = insert_stamped(adapter, spec, "users", user)?;
    adapter.insert(
        "roles_users",
        &row_from(&[("role_id", json!(owner_role)), ("user_id", json!(user_id))]),
    )?;
    Ok(())
}

/// Promote the first Administrator to the Owner role by rewriting their
/// role mapping in place.
fn convert_admin_to_owner(adapter: &dyn DatabaseAdapter) -> Result<(), Error> {
    let admin_role = role_id(adapter, "Administrator")?;
    let owner_role = role_id(adapter, "Owner")?;
    let mappings = adapter.select_where("roles_users", "role_id", &json!(admin_role))?;
    if let Some(mapping) = mappings.first() {
        if let Some(mapping_id) = int_value(mapping, "id") {
            info!("converting admin to owner");
            adapter.update_where(
                "roles_users",
                "id",
                &json!(mapping_id),
                &row_from(&[("role_id", json!(owner_role))]),
            )?;
        }
    }
    Ok(())
}

/// Seed a fresh install: posts, tags, roles, clients, one tag-to-post
/// relationship, the full permission set, and the Owner user.
pub fn populate(adapter: &dyn DatabaseAdapter, spec: &SchemaSpec) -> Result<(), Error> {
    info!("populating fixtures");

    for mut post in seed::posts() {
        post.insert("published_at".into(), json!(now_millis()));
        post.insert("published_by".into(), json!(1));
        insert_stamped(adapter, spec, "posts", post)?;
    }
    for tag in seed::tags() {
        insert_stamped(adapter, spec, "tags", tag)?;
    }
    for role in seed::roles() {
        insert_stamped(adapter, spec, "roles", role)?;
    }
    for mut client in seed::clients() {
        client.insert("secret".into(), json!(random_hex(6)));
        insert_stamped(adapter, spec, "clients", client)?;
    }

    // wire the first tag to the first post
    let first_post_slug = str_value(&seed::posts()[0], "slug").unwrap_or("").to_string();
    let first_tag_slug = str_value(&seed::tags()[0], "slug").unwrap_or("").to_string();
    let post = find_one(adapter, "posts", "slug", &json!(first_post_slug))?
        .ok_or_else(|| Error::not_found("seed post"))?;
    let tag = find_one(adapter, "tags", "slug", &json!(first_tag_slug))?
        .ok_or_else(|| Error::not_found("seed tag"))?;
    let post_id = int_value(&post, "id").ok_or_else(|| Error::not_found("seed post id"))?;
    let tag_id = int_value(&tag, "id").ok_or_else(|| Error::not_found("seed tag id"))?;
    let mut relation = row_from(&[("post_id", json!(post_id)), ("tag_id", json!(tag_id))]);
    let has_sort_order = spec
        .get_table("posts_tags")
        .is_some_and(|t| t.has_column("sort_order"));
    if has_sort_order {
        relation.insert("sort_order".into(), json!(0));
    }
    adapter.insert("posts_tags", &relation)?;

    permissions::populate(adapter, spec)?;
    // promote any pre-existing Administrator before the Owner user is made
    convert_admin_to_owner(adapter)?;
    create_owner(adapter, spec)
}

/// Upgrade fixtures to 003: admin client and Owner role if missing, a full
/// permission rebuild, and the first Administrator promoted to Owner.
fn to_003(adapter: &dyn DatabaseAdapter, spec: &SchemaSpec) -> Result<(), Error> {
    info!("upgrading fixtures to 003");

    let clients = seed::clients();
    let admin_slug = str_value(&clients[0], "slug").unwrap_or("");
    if find_one(adapter, "clients", "slug", &json!(admin_slug))?.is_none() {
        info!("adding admin client fixture");
        insert_stamped(adapter, spec, "clients", clients[0].clone())?;
    }

    let roles = seed::roles();
    let owner_name = str_value(&roles[seed::FIRST_003_ROLE], "name").unwrap_or("");
    if find_one(adapter, "roles", "name", &json!(owner_name))?.is_none() {
        info!("adding owner role fixture");
        for role in roles[seed::FIRST_003_ROLE..].iter().cloned() {
            insert_stamped(adapter, spec, "roles", role)?;
        }
    }

    permissions::rebuild(adapter, spec)?;
    convert_admin_to_owner(adapter)
}

/// Upgrade fixtures to 004: a fixed sequence of independent, idempotent
/// content patches, run strictly in order.
fn to_004(adapter: &dyn DatabaseAdapter, spec: &SchemaSpec) -> Result<(), Error> {
    info!("upgrading fixtures to 004");
    let settings = SettingsStore::new(adapter, spec);

    // add the CDN script to the footer setting, once
    if let Some(setting) = settings.read("site_foot")? {
        let value = str_value(&setting, "value").unwrap_or("");
        if !value.contains(seed::FOOTER_CDN_SNIPPET.trim_end()) {
            info!("adding script link to site_foot");
            settings.edit("site_foot", &format!("{}{}", seed::FOOTER_CDN_SNIPPET, value))?;
        }
    }

    // both private-blog settings become type private
    for key in ["isPrivate", "password"] {
        if settings.read(key)?.is_some() {
            info!(key, "reclassifying setting as private");
            settings.update_fields(key, row_from(&[("type", json!("private"))]))?;
        }
    }

    // rotate the admin client secret
    let clients = seed::clients();
    let admin_slug = str_value(&clients[0], "slug").unwrap_or("");
    if let Some(client) = find_one(adapter, "clients", "slug", &json!(admin_slug))? {
        info!("rotating admin client secret");
        adapter.update_where(
            "clients",
            "id",
            &json!(int_value(&client, "id")),
            &row_from(&[("secret", json!(random_hex(6)))]),
        )?;
    }

    // add the frontend client if missing
    let frontend_slug = str_value(&clients[1], "slug").unwrap_or("");
    if find_one(adapter, "clients", "slug", &json!(frontend_slug))?.is_none() {
        info!("adding frontend client fixture");
        let mut client = clients[1].clone();
        client.insert("secret".into(), json!(random_hex(6)));
        insert_stamped(adapter, spec, "clients", client)?;
    }

    // clean up malformed tag names
    let mut cleaned = 0usize;
    for tag in adapter.select_all("tags")? {
        let name = str_value(&tag, "name").unwrap_or("").to_string();
        let mut updated = name
            .trim_start_matches(|c: char| c == ',' || c.is_whitespace())
            .trim_end()
            .to_string();
        if updated.is_empty() {
            updated = "tag".into();
        }
        if updated != name {
            adapter.update_where(
                "tags",
                "id",
                &json!(int_value(&tag, "id")),
                &row_from(&[("name", json!(updated))]),
            )?;
            cleaned += 1;
        }
    }
    if cleaned > 0 {
        info!(cleaned, "cleaned malformed tags");
    }

    // backfill explicit tag order on every post
    info!("collecting data on tag order for posts");
    for post in adapter.select_all("posts")? {
        let post_id = match int_value(&post, "id") {
            Some(id) => id,
            None => continue,
        };
        let relations = adapter.select_where("posts_tags", "post_id", &json!(post_id))?;
        for (order, relation) in relations.iter().enumerate() {
            if let Some(relation_id) = int_value(relation, "id") {
                adapter.update_where(
                    "posts_tags",
                    "id",
                    &json!(relation_id),
                    &row_from(&[("sort_order", json!(order as i64))]),
                )?;
            }
        }
    }

    // add the one-time upgrade notice draft
    let notice = seed::upgrade_notice_post();
    let notice_slug = str_value(&notice, "slug").unwrap_or("");
    if find_one(adapter, "posts", "slug", &json!(notice_slug))?.is_none() {
        info!("adding upgrade notice post fixture");
        let mut post = notice.clone();
        // published_at stamped now so the draft sorts to the top of drafts
        post.insert("published_at".into(), json!(now_millis()));
        insert_stamped(adapter, spec, "posts", post)?;
    }

    Ok(())
}

/// Run every versioned step whose target lies in the half-open range
/// `(from, to]`, in version order. With `force` set, a step also re-runs
/// when `from == to == target` (development re-seeding).
pub fn update(
    adapter: &dyn DatabaseAdapter,
    spec: &SchemaSpec,
    from: DatabaseVersion,
    to: DatabaseVersion,
    force: bool,
) -> Result<(), Error> {
    info!("updating fixtures");
    for step in STEPS {
        let in_range = from < step.target && step.target <= to;
        let forced = force && from == to && to == step.target;
        if in_range || forced {
            (step.apply)(adapter, spec)?;
        }
    }
    Ok(())
}

/// Regenerate secrets still carrying the seeded placeholder. Run as a
/// best-effort fixup on every up-to-date boot.
pub fn fix_client_secret(adapter: &dyn DatabaseAdapter) -> Result<(), Error> {
    let stale = adapter.select_where("clients", "secret", &json!(PLACEHOLDER_SECRET))?;
    for client in stale {
        if let Some(id) = int_value(&client, "id") {
            info!("updating client secret");
            adapter.update_where(
                "clients",
                "id",
                &json!(id),
                &row_from(&[("secret", json!(random_hex(6)))]),
            )?;
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::migration::run_commands;
    use crate::migration::MigrationCommand;
    use crate::schema::default_schema;
    use crate::settings::SettingsStore;
    use crate::store::SqliteAdapter;

    fn fresh_database() -> (SqliteAdapter, SchemaSpec) {
        let adapter = SqliteAdapter::open_in_memory().unwrap();
        let spec = default_schema();
        let commands: Vec<MigrationCommand> = spec
            .table_names()
            .iter()
            .map(|t| MigrationCommand::CreateTable {
                table: (*t).to_string(),
            })
            .collect();
        run_commands(&adapter, &spec, &commands).unwrap();
        (adapter, spec)
    }

    fn populated_database() -> (SqliteAdapter, SchemaSpec) {
        let (adapter, spec) = fresh_database();
        populate(&adapter, &spec).unwrap();
        SettingsStore::new(&adapter, &spec).populate_defaults().unwrap();
        (adapter, spec)
    }

    #[test]
    fn test_populate_seeds_roles_and_owner() {
        let (adapter, _spec) = populated_database();

        assert_eq!(adapter.select_all("roles").unwrap().len(), 4);
        let users = adapter.select_all("users").unwrap();
        assert_eq!(users.len(), 1);
        // owner carries a random placeholder password
        assert_eq!(str_value(&users[0], "password").unwrap().len(), 50);

        let owner = role_id(&adapter, "Owner").unwrap();
        let mappings = adapter
            .select_where("roles_users", "role_id", &json!(owner))
            .unwrap();
        assert_eq!(mappings.len(), 1);
    }

    #[test]
    fn test_populate_wires_tag_to_post() {
        let (adapter, _spec) = populated_database();
        let relations = adapter.select_all("posts_tags").unwrap();
        assert_eq!(relations.len(), 1);
        assert_eq!(int_value(&relations[0], "sort_order"), Some(0));
    }

    #[test]
    fn test_update_selects_half_open_range() {
        let (adapter, spec) = populated_database();
        let notice_slug = str_value(&seed::upgrade_notice_post(), "slug")
            .unwrap()
            .to_string();

        // (000, 002]: no step targets fall inside, nothing runs
        update(
            &adapter,
            &spec,
            DatabaseVersion::INITIAL,
            DatabaseVersion::new(2),
            false,
        )
        .unwrap();
        // the upgrade notice only appears once to_004 has run
        assert!(find_one(&adapter, "posts", "slug", &json!(notice_slug))
            .unwrap()
            .is_none());

        update(
            &adapter,
            &spec,
            DatabaseVersion::new(2),
            DatabaseVersion::new(4),
            false,
        )
        .unwrap();
        assert!(find_one(&adapter, "posts", "slug", &json!(notice_slug))
            .unwrap()
            .is_some());
    }

    #[test]
    fn test_forced_rerun_when_from_equals_to() {
        let (adapter, spec) = populated_database();
        let three = DatabaseVersion::new(3);

        // without force nothing runs
        update(&adapter, &spec, three, three, false).unwrap();
        let owner_before = role_id(&adapter, "Owner").unwrap();

        // with force, to_003 re-runs and rebuilds permissions without
        // duplicating roles or clients
        update(&adapter, &spec, three, three, true).unwrap();
        assert_eq!(adapter.select_all("roles").unwrap().len(), 4);
        assert_eq!(role_id(&adapter, "Owner").unwrap(), owner_before);
    }

    #[test]
    fn test_to_004_is_idempotent() {
        let (adapter, spec) = populated_database();
        let from = DatabaseVersion::new(3);
        let to = DatabaseVersion::new(4);

        update(&adapter, &spec, from, to, false).unwrap();
        let settings_after_one = adapter.select_all("settings").unwrap();
        let tags_after_one = adapter.select_all("tags").unwrap();
        let posts_after_one = adapter.select_all("posts").unwrap().len();
        let foot_after_one = SettingsStore::new(&adapter, &spec)
            .value("site_foot")
            .unwrap();

        update(&adapter, &spec, from, to, false).unwrap();

        assert_eq!(adapter.select_all("settings").unwrap(), settings_after_one);
        assert_eq!(adapter.select_all("tags").unwrap(), tags_after_one);
        assert_eq!(adapter.select_all("posts").unwrap().len(), posts_after_one);
        assert_eq!(
            SettingsStore::new(&adapter, &spec).value("site_foot").unwrap(),
            foot_after_one
        );
    }

    #[test]
    fn test_to_004_cleans_malformed_tags() {
        let (adapter, spec) = populated_database();
        insert_stamped(
            &adapter,
            &spec,
            "tags",
            row_from(&[("name", json!(",, broken")), ("slug", json!("broken"))]),
        )
        .unwrap();

        update(
            &adapter,
            &spec,
            DatabaseVersion::new(3),
            DatabaseVersion::new(4),
            false,
        )
        .unwrap();

        let cleaned = find_one(&adapter, "tags", "slug", &json!("broken"))
            .unwrap()
            .unwrap();
        assert_eq!(str_value(&cleaned, "name"), Some("broken"));
    }

    #[test]
    fn test_fix_client_secret_replaces_placeholder() {
        let (adapter, spec) = fresh_database();
        insert_stamped(&adapter, &spec, "clients", seed::clients()[0].clone()).unwrap();

        fix_client_secret(&adapter).unwrap();

        let client = find_one(&adapter, "clients", "slug", &json!("quillpress-admin"))
            .unwrap()
            .unwrap();
        assert_ne!(str_value(&client, "secret"), Some(PLACEHOLDER_SECRET));
    }
}
