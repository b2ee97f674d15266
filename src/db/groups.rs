use rusqlite::{params, Connection, OptionalExtension, Row};

use super::models::Group;

pub const TITLE_MAX_LEN: usize = 200;
pub const SLUG_MAX_LEN: usize = 100;

const GROUP_COLUMNS: &str = "id, title, slug, description";

#[derive(Debug, Clone)]
pub struct NewGroup {
    pub title: String,
    pub slug: String,
    pub description: String,
}

impl NewGroup {
    /// Check title and slug limits before they reach the table constraints.
    pub fn validate(&self) -> Result<(), String> {
        if self.title.trim().is_empty() {
            return Err("Group title is required".into());
        }
        if self.title.chars().count() > TITLE_MAX_LEN {
            return Err(format!(
                "Group title must be {} characters or less",
                TITLE_MAX_LEN
            ));
        }
        if self.slug.is_empty() || self.slug.chars().count() > SLUG_MAX_LEN {
            return Err(format!(
                "Group slug must be between 1 and {} characters",
                SLUG_MAX_LEN
            ));
        }
        if !self
            .slug
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_')
        {
            return Err("Group slug may only contain letters, digits, '-' and '_'".into());
        }
        Ok(())
    }
}

fn map_group(row: &Row<'_>) -> rusqlite::Result<Group> {
    Ok(Group {
        id: row.get(0)?,
        title: row.get(1)?,
        slug: row.get(2)?,
        description: row.get(3)?,
    })
}

pub fn create(conn: &Connection, group: &NewGroup) -> rusqlite::Result<Group> {
    conn.execute(
        "INSERT INTO post_groups (title, slug, description) VALUES (?1, ?2, ?3)",
        params![group.title, group.slug, group.description],
    )?;
    Ok(Group {
        id: conn.last_insert_rowid(),
        title: group.title.clone(),
        slug: group.slug.clone(),
        description: group.description.clone(),
    })
}

pub fn get(conn: &Connection, id: i64) -> rusqlite::Result<Option<Group>> {
    conn.query_row(
        &format!("SELECT {} FROM post_groups WHERE id = ?1", GROUP_COLUMNS),
        params![id],
        map_group,
    )
    .optional()
}

pub fn find_by_slug(conn: &Connection, slug: &str) -> rusqlite::Result<Option<Group>> {
    conn.query_row(
        &format!("SELECT {} FROM post_groups WHERE slug = ?1", GROUP_COLUMNS),
        params![slug],
        map_group,
    )
    .optional()
}

pub fn list(conn: &Connection) -> rusqlite::Result<Vec<Group>> {
    let mut stmt = conn.prepare(&format!(
        "SELECT {} FROM post_groups ORDER BY title, id",
        GROUP_COLUMNS
    ))?;
    let groups = stmt.query_map([], map_group)?.collect::<Result<_, _>>()?;
    Ok(groups)
}

pub fn update(conn: &Connection, id: i64, group: &NewGroup) -> rusqlite::Result<bool> {
    let rows = conn.execute(
        "UPDATE post_groups SET title = ?1, slug = ?2, description = ?3 WHERE id = ?4",
        params![group.title, group.slug, group.description, id],
    )?;
    Ok(rows > 0)
}

/// Delete a group. Its posts stay, with their group cleared.
pub fn delete(conn: &Connection, id: i64) -> rusqlite::Result<bool> {
    let rows = conn.execute("DELETE FROM post_groups WHERE id = ?1", params![id])?;
    Ok(rows > 0)
}
