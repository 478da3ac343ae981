use rusqlite::{params, params_from_iter, Connection, Row};

use crate::data::query::BookmarkQuery;
use crate::error::AppError;
use crate::models::bookmark::{
    BookmarkPatch, BookmarkRecord, BookmarkUpdate, Collection, NewBookmark, DEFAULT_CATEGORY,
};
use crate::scope_path::{canonical, normalize};

const SELECT_BOOKMARK: &str =
    "SELECT id, path, file_type, user, collection, category FROM bookmarks";

// Matches a path and everything below it.
const PATH_SUBTREE: &str =
    "(path = ?2 OR substr(path, 1, length(?2) + 1) = ?2 || '/')";

fn row_to_bookmark(row: &Row<'_>) -> rusqlite::Result<BookmarkRecord> {
    let file_type: String = row.get(2)?;
    let collection: String = row.get(4)?;
    Ok(BookmarkRecord {
        id: row.get(0)?,
        path: row.get(1)?,
        file_type: file_type.parse().map_err(|e: String| {
            rusqlite::Error::FromSqlConversionFailure(2, rusqlite::types::Type::Text, e.into())
        })?,
        user: row.get(3)?,
        collection: collection.parse().map_err(|e: String| {
            rusqlite::Error::FromSqlConversionFailure(4, rusqlite::types::Type::Text, e.into())
        })?,
        category: row.get(5)?,
    })
}

fn tuple_label(user: &str, path: &str, collection: Collection, category: &str) -> String {
    format!("{collection}/{category} bookmark on {path} for {user}")
}

fn next_id() -> String {
    uuid::Uuid::new_v4().simple().to_string()
}

pub fn find_by_tuple(
    conn: &Connection,
    user: &str,
    path: &str,
    collection: Collection,
    category: &str,
) -> Result<Option<BookmarkRecord>, AppError> {
    let query = BookmarkQuery::new()
        .user(user)
        .path(path)
        .collection(collection)
        .category(category);
    Ok(query_bookmarks(conn, &query)?.into_iter().next())
}

pub fn insert_bookmark(conn: &Connection, new: &NewBookmark) -> Result<BookmarkRecord, AppError> {
    let path = canonical(&new.path)?;
    let label = tuple_label(&new.user, &path, new.collection, &new.category);
    if find_by_tuple(conn, &new.user, &path, new.collection, &new.category)?.is_some() {
        return Err(AppError::AlreadyExists(label));
    }

    let record = BookmarkRecord {
        id: next_id(),
        path,
        file_type: new.file_type,
        user: new.user.clone(),
        collection: new.collection,
        category: new.category.clone(),
    };
    conn.execute(
        "INSERT INTO bookmarks (id, path, file_type, user, collection, category)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
        params![
            record.id,
            record.path,
            record.file_type.to_string(),
            record.user,
            record.collection.to_string(),
            record.category,
        ],
    )
    .map_err(|e| AppError::from_store(e, &label))?;
    Ok(record)
}

pub fn get_bookmark(
    conn: &Connection,
    id: &str,
    user: &str,
) -> Result<Option<BookmarkRecord>, AppError> {
    let mut stmt = conn.prepare(&format!("{SELECT_BOOKMARK} WHERE id = ?1 AND user = ?2"))?;
    let mut rows = stmt.query_map(params![id, user], row_to_bookmark)?;
    Ok(rows.next().transpose()?)
}

pub fn query_bookmarks(
    conn: &Connection,
    query: &BookmarkQuery,
) -> Result<Vec<BookmarkRecord>, AppError> {
    let (filter, values) = query.to_sql();
    let mut stmt = conn.prepare(&format!(
        "{SELECT_BOOKMARK} {filter} ORDER BY path ASC, collection ASC, category ASC"
    ))?;
    let records = stmt
        .query_map(params_from_iter(values.iter()), row_to_bookmark)?
        .collect::<Result<Vec<_>, _>>()?;
    Ok(records)
}

/// Drops every tag `user` holds on the path, across all collections, then
/// inserts one record per distinct category. Runs as one transaction.
pub fn replace_path_tags(
    conn: &mut Connection,
    user: &str,
    update: &BookmarkUpdate,
) -> Result<Vec<BookmarkRecord>, AppError> {
    let path = canonical(&update.path)?;
    let tx = conn.transaction()?;
    tx.execute(
        "DELETE FROM bookmarks WHERE user = ?1 AND path = ?2",
        params![user, path],
    )?;

    let mut inserted = Vec::new();
    for category in &update.categories {
        if inserted
            .iter()
            .any(|r: &BookmarkRecord| &r.category == category)
        {
            continue;
        }
        let record = insert_bookmark(
            &tx,
            &NewBookmark {
                path: path.clone(),
                file_type: update.file_type,
                user: user.to_string(),
                collection: update.collection,
                category: category.clone(),
            },
        )?;
        inserted.push(record);
    }
    tx.commit()?;
    Ok(inserted)
}

pub fn update_bookmark(
    conn: &mut Connection,
    id: &str,
    user: &str,
    patch: &BookmarkPatch,
) -> Result<BookmarkRecord, AppError> {
    let tx = conn.transaction()?;
    let mut record = get_bookmark(&tx, id, user)?
        .ok_or_else(|| AppError::NotFound(format!("bookmark {id}")))?;

    if let Some(path) = &patch.path {
        record.path = canonical(path)?;
    }
    if let Some(file_type) = patch.file_type {
        record.file_type = file_type;
    }
    if let Some(collection) = patch.collection {
        record.collection = collection;
    }
    if let Some(category) = &patch.category {
        record.category = category.clone();
    }

    let label = tuple_label(user, &record.path, record.collection, &record.category);
    if let Some(existing) =
        find_by_tuple(&tx, user, &record.path, record.collection, &record.category)?
    {
        if existing.id != record.id {
            return Err(AppError::AlreadyExists(label));
        }
    }

    tx.execute(
        "UPDATE bookmarks SET path = ?3, file_type = ?4, collection = ?5, category = ?6
         WHERE id = ?1 AND user = ?2",
        params![
            record.id,
            user,
            record.path,
            record.file_type.to_string(),
            record.collection.to_string(),
            record.category,
        ],
    )
    .map_err(|e| AppError::from_store(e, &label))?;
    tx.commit()?;
    Ok(record)
}

pub fn delete_tag(
    conn: &Connection,
    user: &str,
    path: &str,
    collection: Collection,
    category: &str,
) -> Result<(), AppError> {
    let path = normalize(path);
    let count = conn.execute(
        "DELETE FROM bookmarks WHERE user = ?1 AND path = ?2 AND collection = ?3 AND category = ?4",
        params![user, path, collection.to_string(), category],
    )?;
    if count == 0 {
        return Err(AppError::NotFound(tuple_label(user, &path, collection, category)));
    }
    Ok(())
}

pub fn delete_by_id(conn: &Connection, id: &str, user: &str) -> Result<usize, AppError> {
    let count = conn.execute(
        "DELETE FROM bookmarks WHERE id = ?1 AND user = ?2",
        params![id, user],
    )?;
    Ok(count)
}

/// Removes the tags of a path and of everything below it.
pub fn delete_by_path(conn: &mut Connection, user: &str, path: &str) -> Result<usize, AppError> {
    let path = normalize(path);
    let tx = conn.transaction()?;
    let count = tx.execute(
        &format!("DELETE FROM bookmarks WHERE user = ?1 AND {PATH_SUBTREE}"),
        params![user, path],
    )?;
    tx.commit()?;
    Ok(count)
}

/// Rewrites `old` to `new` on the path's tags and its descendants' tags.
/// Colliding records already stored under `new` are replaced.
pub fn rename_path(
    conn: &mut Connection,
    user: &str,
    old: &str,
    new: &str,
) -> Result<usize, AppError> {
    let (old, new) = (normalize(old), canonical(new)?);
    if old == new {
        return Ok(0);
    }
    let tx = conn.transaction()?;
    let count = tx.execute(
        &format!(
            "UPDATE OR REPLACE bookmarks SET path = ?3 || substr(path, length(?2) + 1)
             WHERE user = ?1 AND {PATH_SUBTREE}"
        ),
        params![user, old, new],
    )?;
    tx.commit()?;
    Ok(count)
}

/// Distinct audio categories, `default` always first.
pub fn list_categories(conn: &Connection, user: &str) -> Result<Vec<String>, AppError> {
    let mut stmt = conn.prepare(
        "SELECT DISTINCT category FROM bookmarks
         WHERE user = ?1 AND collection = ?2 AND category <> ?3
         ORDER BY category ASC",
    )?;
    let mut categories = vec![DEFAULT_CATEGORY.to_string()];
    let rows = stmt.query_map(
        params![user, Collection::Audio.to_string(), DEFAULT_CATEGORY],
        |row| row.get::<_, String>(0),
    )?;
    for category in rows {
        categories.push(category?);
    }
    Ok(categories)
}
