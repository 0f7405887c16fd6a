//! Hardcoded seed records.
//!
//! Each record has a fixed logical identity (slug or name) that the loaders
//! check before inserting, so repeated runs never duplicate data.

use crate::store::{row_from, Row};
use serde_json::json;

/// Secret value clients are seeded with before a real one is generated.
pub const PLACEHOLDER_SECRET: &str = "not_available";

/// Script reference injected into the `site_foot` setting by the 004
/// upgrade. Themes that bundled the library themselves can delete it.
pub const FOOTER_CDN_SNIPPET: &str = concat!(
    "<!-- You can safely delete this line if your theme does not require jQuery -->\n",
    "<script type=\"text/javascript\" src=\"https://code.jquery.com/jquery-1.11.3.min.js\"></script>\n\n",
);

/// Seed posts. The first one is wired to the first seed tag.
pub fn posts() -> Vec<Row> {
    vec![row_from(&[
        ("title", json!("Welcome to Quillpress")),
        ("slug", json!("welcome-to-quillpress")),
        (
            "markdown",
            json!(
                "You're live! Nice. We've put together a little post to introduce you \
                 to the editor and get you started. Head over to the admin area to \
                 delete this post and write your first real one."
            ),
        ),
        (
            "html",
            json!(
                "<p>You're live! Nice. We've put together a little post to introduce \
                 you to the editor and get you started. Head over to the admin area \
                 to delete this post and write your first real one.</p>"
            ),
        ),
        ("featured", json!(false)),
        ("page", json!(false)),
        ("status", json!("published")),
        ("language", json!("en_US")),
        ("author_id", json!(1)),
    ])]
}

/// Seed tags.
pub fn tags() -> Vec<Row> {
    vec![row_from(&[
        ("name", json!("Getting Started")),
        ("slug", json!("getting-started")),
        ("description", json!(null)),
    ])]
}

/// Seed roles. The Owner role sits at index 3; installations upgraded from
/// before version 003 receive it (and anything after it) during `to_003`.
pub fn roles() -> Vec<Row> {
    vec![
        row_from(&[
            ("name", json!("Administrator")),
            ("description", json!("Administrators")),
        ]),
        row_from(&[("name", json!("Editor")), ("description", json!("Editors"))]),
        row_from(&[("name", json!("Author")), ("description", json!("Authors"))]),
        row_from(&[("name", json!("Owner")), ("description", json!("Blog Owner"))]),
    ]
}

/// Index of the first role introduced in version 003.
pub const FIRST_003_ROLE: usize = 3;

/// Seed clients. Index 0 is the admin client (present since 003), index 1
/// the frontend client (added by `to_004`).
pub fn clients() -> Vec<Row> {
    vec![
        row_from(&[
            ("name", json!("Quillpress Admin")),
            ("slug", json!("quillpress-admin")),
            ("secret", json!(PLACEHOLDER_SECRET)),
        ]),
        row_from(&[
            ("name", json!("Quillpress Frontend")),
            ("slug", json!("quillpress-frontend")),
            ("secret", json!(PLACEHOLDER_SECRET)),
        ]),
    ]
}

/// The seeded Owner user. Its password placeholder is randomized at insert
/// time; the real credential is set later by the setup flow.
pub fn owner_user() -> Row {
    row_from(&[
        ("name", json!("Quillpress Owner")),
        ("slug", json!("quillpress-owner")),
        ("email", json!("owner@example.com")),
        ("status", json!("inactive")),
    ])
}

/// One-time informational draft inserted by the 004 upgrade.
pub fn upgrade_notice_post() -> Row {
    row_from(&[
        ("title", json!("Important changes in this release")),
        ("slug", json!("important-changes-in-this-release")),
        (
            "markdown",
            json!(
                "This draft summarises what changed in the latest upgrade: client \
                 secrets are now generated per installation, tag ordering on posts \
                 is explicit, and private-blog settings are no longer exposed to \
                 themes. You can delete this post at any time."
            ),
        ),
        (
            "html",
            json!(
                "<p>This draft summarises what changed in the latest upgrade: client \
                 secrets are now generated per installation, tag ordering on posts \
                 is explicit, and private-blog settings are no longer exposed to \
                 themes. You can delete this post at any time.</p>"
            ),
        ),
        ("featured", json!(false)),
        ("page", json!(false)),
        ("status", json!("draft")),
        ("language", json!("en_US")),
        ("author_id", json!(1)),
    ])
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::str_value;

    #[test]
    fn test_owner_role_is_at_the_003_boundary() {
        let roles = roles();
        assert_eq!(str_value(&roles[FIRST_003_ROLE], "name"), Some("Owner"));
    }

    #[test]
    fn test_clients_start_with_placeholder_secret() {
        for client in clients() {
            assert_eq!(str_value(&client, "secret"), Some(PLACEHOLDER_SECRET));
        }
    }

    #[test]
    fn test_seed_identities_are_present() {
        assert!(posts().iter().all(|p| !crate::store::is_blank(p, "slug")));
        assert!(tags().iter().all(|t| !crate::store::is_blank(t, "slug")));
        assert!(roles().iter().all(|r| !crate::store::is_blank(r, "name")));
    }
}
