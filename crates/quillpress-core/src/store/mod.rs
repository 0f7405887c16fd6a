//! Database access: the adapter seam, the SQLite engine, and row helpers.

mod adapter;
mod row;
mod sqlite;

pub use adapter::{find_one, DatabaseAdapter};
pub use row::{int_value, is_blank, now_millis, row_from, stamp_insert, str_value, Row};
pub use sqlite::SqliteAdapter;
