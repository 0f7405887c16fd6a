//! Permission fixtures and role associations.

use crate::error::Error;
use crate::schema::SchemaSpec;
use crate::store::{find_one, int_value, row_from, stamp_insert, str_value, DatabaseAdapter};
use serde_json::json;
use tracing::info;

struct PermissionSeed {
    name: &'static str,
    object_type: &'static str,
    action_type: &'static str,
}

const fn perm(
    name: &'static str,
    object_type: &'static str,
    action_type: &'static str,
) -> PermissionSeed {
    PermissionSeed {
        name,
        object_type,
        action_type,
    }
}

const PERMISSIONS: &[PermissionSeed] = &[
    perm("Export database", "db", "exportContent"),
    perm("Import database", "db", "importContent"),
    perm("Delete all content", "db", "deleteAllContent"),
    perm("Send mail", "mail", "send"),
    perm("Browse notifications", "notification", "browse"),
    perm("Add notifications", "notification", "add"),
    perm("Delete notifications", "notification", "destroy"),
    perm("Browse posts", "post", "browse"),
    perm("Read posts", "post", "read"),
    perm("Edit posts", "post", "edit"),
    perm("Add posts", "post", "add"),
    perm("Delete posts", "post", "destroy"),
    perm("Browse settings", "setting", "browse"),
    perm("Read settings", "setting", "read"),
    perm("Edit settings", "setting", "edit"),
    perm("Generate slugs", "slug", "generate"),
    perm("Browse tags", "tag", "browse"),
    perm("Read tags", "tag", "read"),
    perm("Edit tags", "tag", "edit"),
    perm("Add tags", "tag", "add"),
    perm("Delete tags", "tag", "destroy"),
    perm("Browse themes", "theme", "browse"),
    perm("Edit themes", "theme", "edit"),
    perm("Browse users", "user", "browse"),
    perm("Read users", "user", "read"),
    perm("Edit users", "user", "edit"),
    perm("Add users", "user", "add"),
    perm("Delete users", "user", "destroy"),
    perm("Assign a role", "role", "assign"),
    perm("Browse roles", "role", "browse"),
];

enum Grant {
    All,
    Actions(&'static [&'static str]),
}

// Owner is intentionally absent: ownership is resolved in code, not via
// permission rows.
const ROLE_GRANTS: &[(&str, &[(&str, Grant)])] = &[
    (
        "Administrator",
        &[
            ("db", Grant::All),
            ("mail", Grant::All),
            ("notification", Grant::All),
            ("post", Grant::All),
            ("setting", Grant::All),
            ("slug", Grant::All),
            ("tag", Grant::All),
            ("theme", Grant::All),
            ("user", Grant::All),
            ("role", Grant::All),
        ],
    ),
    (
        "Editor",
        &[
            ("post", Grant::All),
            ("setting", Grant::Actions(&["browse", "read"])),
            ("slug", Grant::All),
            ("tag", Grant::All),
            ("theme", Grant::Actions(&["browse"])),
            ("user", Grant::All),
            ("role", Grant::Actions(&["browse"])),
        ],
    ),
    (
        "Author",
        &[
            ("post", Grant::Actions(&["browse", "read", "add"])),
            ("setting", Grant::Actions(&["browse", "read"])),
            ("slug", Grant::Actions(&["generate"])),
            ("tag", Grant::Actions(&["browse", "read", "add"])),
            ("user", Grant::Actions(&["browse", "read"])),
            ("role", Grant::Actions(&["browse"])),
        ],
    ),
];

impl Grant {
    fn covers(&self, action_type: &str) -> bool {
        match self {
            Grant::All => true,
            Grant::Actions(actions) => actions.contains(&action_type),
        }
    }
}

fn add_all_permissions(adapter: &dyn DatabaseAdapter, spec: &SchemaSpec) -> Result<(), Error> {
    let table = spec
        .get_table("permissions")
        .ok_or_else(|| Error::not_found("permissions table definition"))?;
    for seed in PERMISSIONS {
        let mut row = row_from(&[
            ("name", json!(seed.name)),
            ("object_type", json!(seed.object_type)),
            ("action_type", json!(seed.action_type)),
        ]);
        stamp_insert(table, &mut row);
        adapter.insert("permissions", &row)?;
    }
    Ok(())
}

fn add_all_role_permissions(adapter: &dyn DatabaseAdapter) -> Result<(), Error> {
    let permissions = adapter.select_all("permissions")?;
    for (role_name, grants) in ROLE_GRANTS {
        let role = find_one(adapter, "roles", "name", &json!(role_name))?
            .ok_or_else(|| Error::not_found(format!("role {role_name}")))?;
        let role_id = int_value(&role, "id")
            .ok_or_else(|| Error::not_found(format!("id of role {role_name}")))?;
        for permission in &permissions {
            let object_type = str_value(permission, "object_type").unwrap_or("");
            let action_type = str_value(permission, "action_type").unwrap_or("");
            let granted = grants
                .iter()
                .find(|(object, _)| *object == object_type)
                .map(|(_, grant)| grant.covers(action_type))
                .unwrap_or(false);
            if granted {
                let permission_id = int_value(permission, "id")
                    .ok_or_else(|| Error::not_found("permission id"))?;
                adapter.insert(
                    "permissions_roles",
                    &row_from(&[
                        ("role_id", json!(role_id)),
                        ("permission_id", json!(permission_id)),
                    ]),
                )?;
            }
        }
    }
    Ok(())
}

/// Insert the full permission set and the role associations.
pub fn populate(adapter: &dyn DatabaseAdapter, spec: &SchemaSpec) -> Result<(), Error> {
    info!("populating permissions");
    add_all_permissions(adapter, spec)?;
    add_all_role_permissions(adapter)
}

/// Wipe and regenerate the permission set. Permissions cannot be diffed
/// incrementally across the 003 boundary, so the upgrade rebuilds them.
pub fn rebuild(adapter: &dyn DatabaseAdapter, spec: &SchemaSpec) -> Result<(), Error> {
    info!("removing old permissions");
    adapter.delete_all("permissions_roles")?;
    adapter.delete_all("permissions")?;
    populate(adapter, spec)
}
