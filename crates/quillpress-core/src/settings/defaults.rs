//! The default settings compiled into this software version.

/// A single default setting.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DefaultSetting {
    /// Settings key.
    pub key: &'static str,
    /// Category, stored in the row's `type` column.
    pub setting_type: &'static str,
    /// Default value; `None` stores NULL.
    pub default_value: Option<&'static str>,
}

const fn setting(
    key: &'static str,
    setting_type: &'static str,
    default_value: Option<&'static str>,
) -> DefaultSetting {
    DefaultSetting {
        key,
        setting_type,
        default_value,
    }
}

/// Every default setting, grouped by category.
///
/// `databaseVersion` doubles as the software's schema version token; bump it
/// together with any change to the declared schema or versioned fixtures.
pub const DEFAULT_SETTINGS: &[DefaultSetting] = &[
    // core
    setting("databaseVersion", "core", Some("004")),
    setting("dbHash", "core", None),
    setting("nextUpdateCheck", "core", None),
    setting("displayUpdateNotification", "core", None),
    // blog
    setting("title", "blog", Some("Quillpress")),
    setting("description", "blog", Some("Just a blogging platform.")),
    setting("logo", "blog", Some("")),
    setting("cover", "blog", Some("")),
    setting("defaultLang", "blog", Some("en_US")),
    setting("postsPerPage", "blog", Some("5")),
    setting("activeTheme", "blog", Some("default")),
    setting("activeApps", "blog", Some("[]")),
    setting("installedApps", "blog", Some("[]")),
    setting("site_head", "blog", Some("")),
    setting("site_foot", "blog", Some("")),
    setting("forceI18n", "blog", Some("true")),
    setting("permalinks", "blog", Some("/:slug/")),
    // private
    setting("isPrivate", "private", Some("false")),
    setting("password", "private", Some("")),
];

/// Look up a default setting by key.
pub fn default_setting(key: &str) -> Option<&'static DefaultSetting> {
    DEFAULT_SETTINGS.iter().find(|s| s.key == key)
}
