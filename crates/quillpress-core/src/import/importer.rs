//! Transactional persistence of a sanitized, validated import batch.
//!
//! Every write happens inside one transaction. Grouped inserts follow the
//! settle discipline: each operation runs to completion and failures are
//! collected, then a single commit-or-rollback decision is made at the end.

use super::ImportBatch;
use crate::error::Error;
use crate::schema::SchemaSpec;
use crate::store::{
    find_one, int_value, is_blank, now_millis, row_from, stamp_insert, str_value,
    DatabaseAdapter, Row,
};
use crate::util::uid;
use serde_json::{json, Value};
use std::collections::{BTreeMap, BTreeSet, HashMap};
use tracing::{debug, info, warn};

/// Columns in posts/tags that reference a user by id.
const USER_FK_KEYS: [&str; 4] = ["created_by", "updated_by", "published_by", "author_id"];

/// Settings categories that must never be overwritten by someone else's
/// export: they encode this installation's own configuration.
const SETTINGS_TYPE_BLACKLIST: [&str; 2] = ["core", "theme"];

/// Renamed settings keys from older exports.
const LEGACY_SETTING_KEYS: [(&str, &str); 2] = [
    ("activePlugins", "activeApps"),
    ("installedPlugins", "installedApps"),
];

type TableData = BTreeMap<String, Vec<Row>>;

/// Live users indexed for import reconciliation.
struct LiveUsers {
    by_email: HashMap<String, i64>,
    owner_email: String,
    owner_id: i64,
}

/// One failed operation from a settled group, kept with enough context to
/// translate engine errors into user-facing descriptions.
struct Failure {
    model: &'static str,
    data: Row,
    error: Error,
}

fn are_all_empty(row: &Row, fields: &[&str]) -> bool {
    fields.iter().all(|field| is_blank(row, field))
}

fn without_id(row: &Row) -> Row {
    let mut clone = row.clone();
    clone.remove("id");
    clone
}

/// Email of the import-local user with this id, if the batch carries one.
fn email_of(import_users: &[Row], user_id: i64) -> Option<&str> {
    import_users
        .iter()
        .find(|user| int_value(user, "id") == Some(user_id))
        .and_then(|user| str_value(user, "email"))
}

/// Persists import batches against the live database.
pub struct DataImporter<'a> {
    adapter: &'a dyn DatabaseAdapter,
    spec: &'a SchemaSpec,
}

impl<'a> DataImporter<'a> {
    /// Create an importer over an adapter and the declared schema.
    pub fn new(adapter: &'a dyn DatabaseAdapter, spec: &'a SchemaSpec) -> Self {
        Self { adapter, spec }
    }

    /// Import a batch inside a single transaction: all-or-nothing.
    pub fn import(&self, batch: ImportBatch) -> Result<(), Error> {
        let roles = self.adapter.select_all("roles")?;
        let mut users = self.load_users(&roles)?;

        self.adapter.begin()?;
        match self.run(batch.data, &roles, &mut users) {
            Ok(()) => {
                self.adapter.commit()?;
                Ok(())
            }
            Err(err) => {
                if let Err(rollback_err) = self.adapter.rollback() {
                    warn!(%rollback_err, "rollback after failed import also failed");
                }
                Err(err)
            }
        }
    }

    fn run(
        &self,
        mut data: TableData,
        roles: &[Row],
        users: &mut LiveUsers,
    ) -> Result<(), Error> {
        let mut failures: Vec<Failure> = Vec::new();

        // users first: everything else hangs off their resolved identities
        let assigned_roles = self.reconcile_roles(&data, roles, users)?;
        self.import_users(&data, users, &assigned_roles, roles, &mut failures)?;
        if !failures.is_empty() {
            return Err(translate_failures(failures));
        }

        self.rewrite_user_references(&mut data, users)?;

        let tag_ids = self.import_tags(&data, &mut failures)?;
        let post_ids = self.import_posts(&data, &mut failures)?;
        self.import_post_tags(&data, &post_ids, &tag_ids, &mut failures)?;
        self.import_settings(&data, &mut failures)?;
        // permissions, roles, and their associations are never imported:
        // they are fixed by the installed software version

        if failures.is_empty() {
            Ok(())
        } else {
            Err(translate_failures(failures))
        }
    }

    /// Index live users by email and derive the Owner. Every installation
    /// must have exactly one; failing to find it aborts before any write.
    fn load_users(&self, roles: &[Row]) -> Result<LiveUsers, Error> {
        let owner_role_id = roles
            .iter()
            .find(|role| str_value(role, "name") == Some("Owner"))
            .and_then(|role| int_value(role, "id"))
            .ok_or_else(|| Error::not_found("owner role"))?;

        let mappings = self
            .adapter
            .select_where("roles_users", "role_id", &json!(owner_role_id))?;
        let owner_user_id = mappings
            .first()
            .and_then(|mapping| int_value(mapping, "user_id"));

        let mut by_email = HashMap::new();
        let mut owner_email = None;
        for user in self.adapter.select_all("users")? {
            let (Some(email), Some(id)) = (str_value(&user, "email"), int_value(&user, "id"))
            else {
                continue;
            };
            by_email.insert(email.to_string(), id);
            if Some(id) == owner_user_id {
                owner_email = Some(email.to_string());
            }
        }

        match (owner_user_id, owner_email) {
            (Some(owner_id), Some(owner_email)) => Ok(LiveUsers {
                by_email,
                owner_email,
                owner_id,
            }),
            _ => Err(Error::not_found("owner user")),
        }
    }

    /// Remap the batch's legacy role ids onto the live roles and decide
    /// which role each imported user should get. Unknown role names demote
    /// to Author; an "owner" assignment for anyone but the live Owner
    /// demotes to Administrator.
    fn reconcile_roles(
        &self,
        data: &TableData,
        roles: &[Row],
        users: &LiveUsers,
    ) -> Result<HashMap<i64, i64>, Error> {
        let live_role_id = |name: &str| -> Result<i64, Error> {
            roles
                .iter()
                .find(|role| str_value(role, "name") == Some(name))
                .and_then(|role| int_value(role, "id"))
                .ok_or_else(|| Error::not_found(format!("role {name}")))
        };
        let author_id = live_role_id("Author")?;
        let administrator_id = live_role_id("Administrator")?;
        let owner_id = live_role_id("Owner")?;

        // import role id -> live role id, matched by name
        let mut role_remap: HashMap<i64, i64> = HashMap::new();
        if let Some(import_roles) = data.get("roles") {
            for role in import_roles {
                let Some(import_id) = int_value(role, "id") else {
                    continue;
                };
                let live = str_value(role, "name")
                    .and_then(|name| live_role_id(name).ok())
                    .unwrap_or(author_id);
                role_remap.insert(import_id, live);
            }
        } else {
            // no role data shipped; assume ids already match the live set
            for role in roles {
                if let Some(id) = int_value(role, "id") {
                    role_remap.insert(id, id);
                }
            }
        }

        let import_users = data.get("users").cloned().unwrap_or_default();
        let mut assigned: HashMap<i64, i64> = HashMap::new();
        for mapping in data.get("roles_users").map(Vec::as_slice).unwrap_or(&[]) {
            let (Some(user_id), Some(import_role_id)) = (
                int_value(mapping, "user_id"),
                int_value(mapping, "role_id"),
            ) else {
                continue;
            };
            let mut live_role = role_remap.get(&import_role_id).copied().unwrap_or(author_id);
            if live_role == owner_id {
                let email = email_of(&import_users, user_id);
                if email != Some(users.owner_email.as_str()) {
                    live_role = administrator_id;
                }
            }
            assigned.insert(user_id, live_role);
        }
        Ok(assigned)
    }

    /// Import users missing from the live set. Imported credentials never
    /// survive the crossing: accounts arrive locked with an unusable random
    /// password.
    fn import_users(
        &self,
        data: &TableData,
        users: &mut LiveUsers,
        assigned_roles: &HashMap<i64, i64>,
        roles: &[Row],
        failures: &mut Vec<Failure>,
    ) -> Result<(), Error> {
        let rows = data.get("users").map(Vec::as_slice).unwrap_or(&[]);
        if rows.is_empty() {
            return Ok(());
        }
        let author_role_id = roles
            .iter()
            .find(|role| str_value(role, "name") == Some("Author"))
            .and_then(|role| int_value(role, "id"))
            .ok_or_else(|| Error::not_found("role Author"))?;
        let Some(users_table) = self.spec.get_table("users") else {
            return Err(Error::not_found("users table definition"));
        };

        info!(count = rows.len(), "importing users");
        for source in rows {
            if are_all_empty(source, &["name", "slug", "email"]) {
                continue;
            }
            let Some(email) = str_value(source, "email").map(String::from) else {
                continue;
            };
            if users.by_email.contains_key(&email) {
                // already present, ignore
                continue;
            }

            let import_id = int_value(source, "id");
            let mut row = without_id(source);
            row.insert("password".into(), json!(uid(50)));
            row.insert("status".into(), json!("locked"));
            stamp_insert(users_table, &mut row);

            match self.adapter.insert("users", &row) {
                Ok(new_id) => {
                    users.by_email.insert(email, new_id);
                    let role_id = import_id
                        .and_then(|id| assigned_roles.get(&id).copied())
                        .unwrap_or(author_role_id);
                    if let Err(error) = self.adapter.insert(
                        "roles_users",
                        &row_from(&[("role_id", json!(role_id)), ("user_id", json!(new_id))]),
                    ) {
                        failures.push(Failure {
                            model: "user",
                            data: source.clone(),
                            error,
                        });
                    }
                }
                Err(error) => failures.push(Failure {
                    model: "user",
                    data: source.clone(),
                    error,
                }),
            }
        }
        Ok(())
    }

    /// Rewrite every user foreign key in posts/tags from import-local ids
    /// to live ids. Import id 1 with no matching user row means the
    /// exporting installation's owner; anything else unresolvable is fatal.
    fn rewrite_user_references(
        &self,
        data: &mut TableData,
        users: &LiveUsers,
    ) -> Result<(), Error> {
        let mut referenced: BTreeSet<i64> = BTreeSet::new();
        for table in ["posts", "tags"] {
            for row in data.get(table).map(Vec::as_slice).unwrap_or(&[]) {
                for key in USER_FK_KEYS {
                    if let Some(id) = int_value(row, key) {
                        referenced.insert(id);
                    }
                }
            }
        }

        let import_users = data.get("users").cloned().unwrap_or_default();
        let mut user_map: HashMap<i64, i64> = HashMap::new();
        for id in referenced {
            let email = email_of(&import_users, id);
            let real = match email.and_then(|e| users.by_email.get(e).copied()) {
                Some(real) => real,
                None if id == 1 => users.owner_id,
                None => {
                    return Err(Error::data_import(
                        format!("Attempting to import data linked to unknown user id {id}"),
                        "user.id",
                        id,
                    ))
                }
            };
            user_map.insert(id, real);
        }

        for table in ["posts", "tags"] {
            let Some(rows) = data.get_mut(table) else {
                continue;
            };
            for row in rows {
                for key in USER_FK_KEYS {
                    if let Some(id) = int_value(row, key) {
                        if let Some(real) = user_map.get(&id) {
                            row.insert(key.into(), json!(real));
                        }
                    }
                }
            }
        }
        Ok(())
    }

    /// Import tags, reusing an existing tag on exact name collision.
    /// Returns import tag id -> live tag id.
    fn import_tags(
        &self,
        data: &TableData,
        failures: &mut Vec<Failure>,
    ) -> Result<HashMap<i64, i64>, Error> {
        let rows = data.get("tags").map(Vec::as_slice).unwrap_or(&[]);
        let mut tag_ids = HashMap::new();
        if rows.is_empty() {
            return Ok(tag_ids);
        }
        let Some(tags_table) = self.spec.get_table("tags") else {
            return Err(Error::not_found("tags table definition"));
        };

        info!(count = rows.len(), "importing tags");
        for source in rows {
            if are_all_empty(source, &["name", "slug"]) {
                continue;
            }
            let import_id = int_value(source, "id");
            let name = source.get("name").cloned().unwrap_or(Value::Null);

            let live_id = match find_one(self.adapter, "tags", "name", &name)? {
                Some(existing) => int_value(&existing, "id"),
                None => {
                    let mut row = without_id(source);
                    stamp_insert(tags_table, &mut row);
                    match self.adapter.insert("tags", &row) {
                        Ok(new_id) => Some(new_id),
                        Err(error) => {
                            failures.push(Failure {
                                model: "tag",
                                data: source.clone(),
                                error,
                            });
                            None
                        }
                    }
                }
            };
            if let (Some(import_id), Some(live_id)) = (import_id, live_id) {
                tag_ids.insert(import_id, live_id);
            }
        }
        Ok(tag_ids)
    }

    /// Import posts, silently skipping rows with none of the minimum
    /// fields. Returns import post id -> live post id.
    fn import_posts(
        &self,
        data: &TableData,
        failures: &mut Vec<Failure>,
    ) -> Result<HashMap<i64, i64>, Error> {
        let rows = data.get("posts").map(Vec::as_slice).unwrap_or(&[]);
        let mut post_ids = HashMap::new();
        if rows.is_empty() {
            return Ok(post_ids);
        }
        let Some(posts_table) = self.spec.get_table("posts") else {
            return Err(Error::not_found("posts table definition"));
        };

        info!(count = rows.len(), "importing posts");
        for source in rows {
            if are_all_empty(source, &["title", "slug", "markdown"]) {
                continue;
            }
            let import_id = int_value(source, "id");
            let mut row = without_id(source);
            row.remove("duplicate_of");
            if is_blank(&row, "created_at") {
                row.insert("created_at".into(), json!(now_millis()));
            }
            stamp_insert(posts_table, &mut row);

            match self.adapter.insert("posts", &row) {
                Ok(new_id) => {
                    if let Some(import_id) = import_id {
                        post_ids.insert(import_id, new_id);
                    }
                }
                Err(error) => failures.push(Failure {
                    model: "post",
                    data: source.clone(),
                    error,
                }),
            }
        }
        Ok(post_ids)
    }

    /// Recreate post-tag links against the live ids, preserving sort
    /// order. Links whose endpoints were skipped are dropped.
    fn import_post_tags(
        &self,
        data: &TableData,
        post_ids: &HashMap<i64, i64>,
        tag_ids: &HashMap<i64, i64>,
        failures: &mut Vec<Failure>,
    ) -> Result<(), Error> {
        let rows = data.get("posts_tags").map(Vec::as_slice).unwrap_or(&[]);
        for source in rows {
            let live_post = int_value(source, "post_id").and_then(|id| post_ids.get(&id));
            let live_tag = int_value(source, "tag_id").and_then(|id| tag_ids.get(&id));
            let (Some(post_id), Some(tag_id)) = (live_post, live_tag) else {
                debug!("skipping post-tag link with unresolved endpoint");
                continue;
            };
            let sort_order = int_value(source, "sort_order").unwrap_or(0);
            let row = row_from(&[
                ("post_id", json!(post_id)),
                ("tag_id", json!(tag_id)),
                ("sort_order", json!(sort_order)),
            ]);
            if let Err(error) = self.adapter.insert("posts_tags", &row) {
                failures.push(Failure {
                    model: "posts_tags",
                    data: source.clone(),
                    error,
                });
            }
        }
        Ok(())
    }

    /// Update existing settings in place by key. Rows typed `core` or
    /// `theme` are never written; keys unknown to this installation are
    /// ignored.
    fn import_settings(
        &self,
        data: &TableData,
        failures: &mut Vec<Failure>,
    ) -> Result<(), Error> {
        let rows = data.get("settings").map(Vec::as_slice).unwrap_or(&[]);
        for source in rows {
            let setting_type = str_value(source, "type").unwrap_or("");
            if SETTINGS_TYPE_BLACKLIST.contains(&setting_type) {
                continue;
            }
            let Some(key) = str_value(source, "key") else {
                continue;
            };
            let key = LEGACY_SETTING_KEYS
                .iter()
                .find(|(old, _)| *old == key)
                .map(|(_, new)| *new)
                .unwrap_or(key);

            let value = source.get("value").cloned().unwrap_or(Value::Null);
            let changes = row_from(&[("value", value)]);
            match self
                .adapter
                .update_where("settings", "key", &json!(key), &changes)
            {
                // a key this installation doesn't know: ignore
                Ok(_) => {}
                Err(error) => failures.push(Failure {
                    model: "setting",
                    data: source.clone(),
                    error,
                }),
            }
        }
        Ok(())
    }
}

/// Translate settled failures into the import error shape. Engine
/// unique-constraint messages become a uniform "duplicate entry"
/// description naming the offending column and value.
fn translate_failures(failures: Vec<Failure>) -> Error {
    let mut errors: Vec<Error> = failures.into_iter().map(clean_error).collect();
    if errors.len() == 1 {
        errors.remove(0)
    } else {
        Error::ImportFailed(errors)
    }
}

fn clean_error(failure: Failure) -> Error {
    let Error::Database(db_error) = &failure.error else {
        return failure.error;
    };
    let raw = db_error.to_string();

    if let Some(property) = raw.strip_prefix("UNIQUE constraint failed: ") {
        let property = property.trim().to_string();
        let value = property
            .split('.')
            .nth(1)
            .and_then(|column| failure.data.get(column))
            .and_then(Value::as_str)
            .unwrap_or("unknown")
            .to_string();
        return Error::DataImport {
            message: format!(
                "Duplicate entry found. Multiple values of \"{value}\" found for {property}."
            ),
            property,
            value,
        };
    }
    if raw.to_lowercase().contains("unique") {
        return Error::data_import(
            format!("Duplicate entry found for {}.", failure.model),
            failure.model,
            "unknown",
        );
    }
    Error::data_import(raw, failure.model, "unknown")
}
