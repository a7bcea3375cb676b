use rusqlite::{Connection, Result, Transaction};
use std::collections::HashSet;

pub mod versions;
use versions::Migration;

fn all_migrations() -> Vec<&'static dyn Migration> {
    vec![&versions::initial_migration_08052026::InitialMigration]
}

pub fn run_migrations(conn: &mut Connection) -> Result<()> {
    let tx = conn.transaction()?;

    tx.execute(
        "CREATE TABLE IF NOT EXISTS __migrations (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            name TEXT UNIQUE NOT NULL,
            applied_at INTEGER NOT NULL DEFAULT (unixepoch())
        )",
        [],
    )?;

    let migrations = all_migrations();

    let mut names = HashSet::new();
    for m in &migrations {
        if !names.insert(m.name()) {
            panic!("Duplicate migration name: {}", m.name());
        }
    }

    let applied = get_applied_names(&tx)?;

    for migration in migrations.iter().filter(|m| !applied.contains(m.name())) {
        migration.up(&tx).unwrap();

        tx.execute(
            "INSERT INTO __migrations (name) VALUES (?1)",
            [migration.name()],
        )?;

        log::info!("[migration] Applied: {}", migration.name());
    }

    tx.commit()
}

pub fn rollback_to(conn: &mut Connection, target_name: &str) -> Result<()> {
    let tx = conn.transaction()?;

    let migrations = all_migrations();

    let target_pos = migrations
        .iter()
        .position(|m| m.name() == target_name)
        .expect("Target migration not found");

    let applied = get_applied_names(&tx)?;

    for migration in migrations
        .iter()
        .rev()
        .skip(migrations.len() - 1 - target_pos)
    {
        if applied.contains(migration.name()) {
            migration.down(&tx).unwrap();

            tx.execute(
                "DELETE FROM __migrations WHERE name = ?1",
                [migration.name()],
            )?;

            log::info!("[migration] Rolled back: {}", migration.name());
        }
    }

    tx.commit()
}

fn get_applied_names(tx: &Transaction) -> Result<HashSet<String>> {
    let mut stmt = tx.prepare("SELECT name FROM __migrations")?;
    let rows = stmt.query_map([], |row| row.get::<_, String>(0))?;

    let mut names = HashSet::new();
    for name in rows {
        names.insert(name?);
    }
    Ok(names)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn table_exists(conn: &Connection, table: &str) -> bool {
        conn.query_row(
            "SELECT COUNT(*) FROM sqlite_master WHERE type = 'table' AND name = ?1",
            [table],
            |row| row.get::<_, i64>(0),
        )
        .map(|count| count > 0)
        .unwrap_or(false)
    }

    #[test]
    fn migrations_apply_once_and_roll_back() {
        let mut conn = Connection::open_in_memory().expect("open");

        run_migrations(&mut conn).expect("apply");
        assert!(table_exists(&conn, "downloads"));
        assert!(table_exists(&conn, "settings"));

        // A second run is a no-op.
        run_migrations(&mut conn).expect("re-apply");

        rollback_to(&mut conn, "Initial Migration").expect("rollback");
        assert!(!table_exists(&conn, "downloads"));
        assert!(!table_exists(&conn, "settings"));

        run_migrations(&mut conn).expect("apply again");
        assert!(table_exists(&conn, "downloads"));
    }
}
