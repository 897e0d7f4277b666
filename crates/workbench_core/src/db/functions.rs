//! Scalar SQL functions registered on every connection.
//!
//! SQLite's built-in `LIKE`/`lower()` only fold ASCII, while project content
//! is mostly Cyrillic. `icontains(haystack, needle)` performs a Unicode
//! case-insensitive substring test in Rust instead.

use rusqlite::functions::FunctionFlags;
use rusqlite::Connection;

pub(crate) fn register_functions(conn: &Connection) -> rusqlite::Result<()> {
    conn.create_scalar_function(
        "icontains",
        2,
        FunctionFlags::SQLITE_UTF8 | FunctionFlags::SQLITE_DETERMINISTIC,
        |ctx| {
            let haystack = ctx.get::<Option<String>>(0)?;
            let needle = ctx.get::<Option<String>>(1)?;
            Ok(match (haystack, needle) {
                (Some(haystack), Some(needle)) => contains_folded(&haystack, &needle),
                _ => false,
            })
        },
    )
}

fn contains_folded(haystack: &str, needle: &str) -> bool {
    if needle.is_empty() {
        return true;
    }
    haystack.to_lowercase().contains(&needle.to_lowercase())
}

#[cfg(test)]
mod tests {
    use super::{contains_folded, register_functions};
    use rusqlite::Connection;

    #[test]
    fn contains_folded_matches_cyrillic_case_insensitively() {
        assert!(contains_folded("Первая Запись", "запись"));
        assert!(contains_folded("ПРИВЕТ мир", "привет"));
        assert!(!contains_folded("Раздел 1", "тема"));
    }

    #[test]
    fn icontains_is_callable_from_sql_and_treats_null_as_no_match() {
        let conn = Connection::open_in_memory().unwrap();
        register_functions(&conn).unwrap();

        let hit: bool = conn
            .query_row("SELECT icontains('Входящие', 'ВХОД');", [], |row| row.get(0))
            .unwrap();
        assert!(hit);

        let null_hit: bool = conn
            .query_row("SELECT icontains(NULL, 'x');", [], |row| row.get(0))
            .unwrap();
        assert!(!null_hit);
    }
}
