use super::*;

use rusqlite::Connection;
use rusqlite::OptionalExtension;
use rusqlite::params;

use crate::error::PatternError;
use crate::error::validate_name;

const COLUMNS: &str = "name, id, description, content, schema_version,
        tags_json, applies_json, security_json, learning_json, lifecycle_json, extra_json";

fn init_db(conn: &Connection) -> anyhow::Result<()> {
    conn.execute_batch(
        r#"
        PRAGMA journal_mode=WAL;
        CREATE TABLE IF NOT EXISTS patterns (
            name TEXT PRIMARY KEY,
            id TEXT NOT NULL,
            description TEXT NOT NULL,
            content TEXT NOT NULL,
            schema_version INTEGER NOT NULL,
            tags_json TEXT NOT NULL,
            applies_json TEXT NOT NULL,
            security_json TEXT NOT NULL,
            learning_json TEXT NOT NULL,
            lifecycle_json TEXT NOT NULL,
            extra_json TEXT NOT NULL DEFAULT '{}'
        );
        "#,
    )?;
    Ok(())
}

fn open_conn(path: &std::path::Path) -> anyhow::Result<Connection> {
    let conn = Connection::open(path)?;
    init_db(&conn)?;
    Ok(conn)
}

struct JsonColumns {
    tags: String,
    applies: String,
    security: String,
    learning: String,
    lifecycle: String,
    extra: String,
}

fn encode(p: &Pattern) -> anyhow::Result<JsonColumns> {
    Ok(JsonColumns {
        tags: serde_json::to_string(&p.tags)?,
        applies: serde_json::to_string(&p.applies)?,
        security: serde_json::to_string(&p.security)?,
        learning: serde_json::to_string(&p.learning)?,
        lifecycle: serde_json::to_string(&p.lifecycle)?,
        extra: serde_json::to_string(&p.extra)?,
    })
}

fn row_to_pattern(row: &rusqlite::Row<'_>) -> rusqlite::Result<Pattern> {
    use rusqlite::types::Type;
    fn json<T: serde::de::DeserializeOwned>(
        row: &rusqlite::Row<'_>,
        idx: usize,
    ) -> rusqlite::Result<T> {
        let s: String = row.get(idx)?;
        serde_json::from_str(&s)
            .map_err(|e| rusqlite::Error::FromSqlConversionFailure(idx, Type::Text, Box::new(e)))
    }

    Ok(Pattern {
        name: row.get(0)?,
        id: row.get(1)?,
        description: row.get(2)?,
        content: row.get(3)?,
        schema_version: u32::try_from(row.get::<_, i64>(4)?).unwrap_or(SCHEMA_VERSION),
        tags: json(row, 5)?,
        applies: json(row, 6)?,
        security: json(row, 7)?,
        learning: json(row, 8)?,
        lifecycle: json(row, 9)?,
        extra: json(row, 10)?,
    })
}

/// Single-file SQLite store keyed by pattern name.
#[derive(Debug, Clone)]
pub struct SqlitePatternStore {
    path: std::path::PathBuf,
}

impl SqlitePatternStore {
    pub fn new<P: AsRef<std::path::Path>>(path: P) -> Self {
        Self {
            path: path.as_ref().to_path_buf(),
        }
    }

    fn write(&self, conn: &Connection, p: &Pattern, insert: bool) -> anyhow::Result<usize> {
        let cols = encode(p)?;
        let sql = if insert {
            format!("INSERT INTO patterns ({COLUMNS}) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11)")
        } else {
            "UPDATE patterns SET
                id=?2, description=?3, content=?4, schema_version=?5,
                tags_json=?6, applies_json=?7, security_json=?8, learning_json=?9, lifecycle_json=?10,
                extra_json=?11
             WHERE name=?1"
                .to_string()
        };
        let n = conn.execute(
            &sql,
            params![
                p.name,
                p.id,
                p.description,
                p.content,
                i64::from(p.schema_version),
                cols.tags,
                cols.applies,
                cols.security,
                cols.learning,
                cols.lifecycle,
                cols.extra
            ],
        )?;
        Ok(n)
    }
}

impl PatternStore for SqlitePatternStore {
    fn list(&self) -> anyhow::Result<Vec<Pattern>> {
        let conn = open_conn(&self.path)?;
        let mut stmt = conn.prepare(&format!("SELECT {COLUMNS} FROM patterns ORDER BY name"))?;
        let mut rows = stmt.query([])?;
        let mut out = Vec::new();
        while let Some(row) = rows.next()? {
            out.push(row_to_pattern(row)?);
        }
        Ok(out)
    }

    fn get(&self, name: &str) -> anyhow::Result<Option<Pattern>> {
        validate_name(name)?;
        let conn = open_conn(&self.path)?;
        let found = conn
            .query_row(
                &format!("SELECT {COLUMNS} FROM patterns WHERE name=?1"),
                params![name],
                row_to_pattern,
            )
            .optional()?;
        Ok(found)
    }

    fn add(&self, pattern: Pattern) -> anyhow::Result<Pattern> {
        validate_name(&pattern.name)?;
        let conn = open_conn(&self.path)?;
        let exists: bool = conn.query_row(
            "SELECT EXISTS(SELECT 1 FROM patterns WHERE name=?1)",
            params![pattern.name],
            |r| r.get(0),
        )?;
        if exists {
            return Err(PatternError::AlreadyExists(pattern.name).into());
        }
        let pattern = prepare_new(pattern, Utc::now());
        self.write(&conn, &pattern, true)?;
        Ok(pattern)
    }

    fn update(&self, pattern: &Pattern) -> anyhow::Result<()> {
        let Some(existing) = self.get(&pattern.name)? else {
            return Err(PatternError::NotFound(pattern.name.clone()).into());
        };
        let conn = open_conn(&self.path)?;
        let next = prepare_update(&existing, pattern, Utc::now());
        if self.write(&conn, &next, false)? == 0 {
            return Err(PatternError::NotFound(pattern.name.clone()).into());
        }
        Ok(())
    }

    fn delete(&self, name: &str) -> anyhow::Result<()> {
        validate_name(name)?;
        let conn = open_conn(&self.path)?;
        let n = conn.execute("DELETE FROM patterns WHERE name=?1", params![name])?;
        if n == 0 {
            return Err(PatternError::NotFound(name.to_string()).into());
        }
        Ok(())
    }
}
