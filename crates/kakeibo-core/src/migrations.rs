use rusqlite::Connection;
use rusqlite_migration::{Migrations, M};

const BOOTSTRAP_SQL: &str = include_str!("migrations/0001_bootstrap.sql");

pub fn run_pending(conn: &mut Connection) -> rusqlite_migration::Result<()> {
    let migrations = Migrations::new(vec![M::up(BOOTSTRAP_SQL)]);
    migrations.to_latest(conn)
}

#[cfg(test)]
mod tests {
    use super::run_pending;
    use rusqlite::Connection;

    #[test]
    fn bootstrap_applies_to_fresh_database() {
        let mut conn = Connection::open_in_memory().expect("in-memory database");
        assert!(run_pending(&mut conn).is_ok());

        let cash = conn.query_row(
            "SELECT account_id FROM accounts WHERE is_cash = 1",
            [],
            |row| row.get::<_, String>(0),
        );
        assert_eq!(cash.ok(), Some("acc_cash".to_string()));
    }
}
