//! Row-level diffing and the SQL it produces.
//!
//! Each table is described once by a [`Table`]; rows are plain value lists in
//! that table's column order so one set of routines can insert, diff, update
//! and delete any child category. Every statement issued is recorded in a
//! [`WriteLog`].

use std::collections::{BTreeMap, HashMap, HashSet};

use serde::Serialize;
use tokio_rusqlite::rusqlite::types::Value;
use tokio_rusqlite::rusqlite::{Connection, OptionalExtension, params_from_iter};

use super::probe::{Entity, Probe};
use crate::Error;

/// Kind of statement issued against a table.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum WriteKind {
    Insert,
    Update,
    Delete,
}

/// One statement issued during reconciliation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Write {
    pub table: &'static str,
    pub kind: WriteKind,
    /// Columns set by an insert or update; empty for deletes.
    pub columns: Vec<&'static str>,
    pub rows: usize,
}

/// Every statement one reconciliation call issued, in order.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct WriteLog {
    writes: Vec<Write>,
}

impl WriteLog {
    pub fn is_empty(&self) -> bool {
        self.writes.is_empty()
    }

    pub fn len(&self) -> usize {
        self.writes.len()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Write> {
        self.writes.iter()
    }

    /// Statements against one table.
    pub fn for_table<'a>(&'a self, table: &'a str) -> impl Iterator<Item = &'a Write> + 'a {
        self.writes.iter().filter(move |w| w.table == table)
    }

    /// Rows touched in `table` by statements of `kind`.
    pub fn rows(&self, table: &str, kind: WriteKind) -> usize {
        self.for_table(table).filter(|w| w.kind == kind).map(|w| w.rows).sum()
    }

    pub fn extend(&mut self, other: WriteLog) {
        self.writes.extend(other.writes);
    }

    fn push(&mut self, table: &'static str, kind: WriteKind, columns: Vec<&'static str>, rows: usize) {
        if rows > 0 {
            self.writes.push(Write { table, kind, columns, rows });
        }
    }
}

/// Which bookkeeping timestamps a table carries.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Stamps {
    None,
    Created,
    Both,
}

/// Static description of a store table.
#[derive(Debug)]
pub(crate) struct Table {
    pub name: &'static str,
    /// Column linking a child row to its owner, if any.
    pub parent: Option<&'static str>,
    pub key: &'static [&'static str],
    pub fields: &'static [&'static str],
    pub stamps: Stamps,
}

/// A row split into identity and payload columns, in [`Table`] order.
#[derive(Debug, Clone, PartialEq)]
pub(crate) struct Row {
    pub key: Vec<Value>,
    pub fields: Vec<Value>,
}

/// Hashable form of a row key.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub(crate) enum KeyPart {
    Int(i64),
    Text(String),
    Null,
}

impl Row {
    pub fn new(key: Vec<Value>, fields: Vec<Value>) -> Self {
        Self { key, fields }
    }

    pub fn identity(&self) -> Vec<KeyPart> {
        self.key
            .iter()
            .map(|v| match v {
                Value::Integer(i) => KeyPart::Int(*i),
                Value::Text(s) => KeyPart::Text(s.clone()),
                Value::Real(f) => KeyPart::Text(f.to_string()),
                Value::Blob(b) => KeyPart::Text(hex::encode(b)),
                Value::Null => KeyPart::Null,
            })
            .collect()
    }

    /// First key column as an integer id.
    pub fn id(&self) -> Option<i64> {
        match self.key.first() {
            Some(Value::Integer(i)) => Some(*i),
            _ => None,
        }
    }
}

/// Column name to JSON value map of a row, for inspection.
pub(crate) fn to_json(table: &Table, row: &Row) -> BTreeMap<&'static str, serde_json::Value> {
    table
        .key
        .iter()
        .zip(&row.key)
        .chain(table.fields.iter().zip(&row.fields))
        .map(|(col, value)| {
            let value = match value {
                Value::Null => serde_json::Value::Null,
                Value::Integer(i) => serde_json::Value::from(*i),
                Value::Real(f) => serde_json::Value::from(*f),
                Value::Text(s) => serde_json::Value::from(s.as_str()),
                Value::Blob(b) => serde_json::Value::from(hex::encode(b)),
            };
            (*col, value)
        })
        .collect()
}

/// Columns whose value differs between `new` and `old`.
pub(crate) fn changed(table: &Table, new: &Row, old: &Row) -> Vec<(&'static str, Value)> {
    table
        .fields
        .iter()
        .zip(new.fields.iter().zip(old.fields.iter()))
        .filter(|(_, (n, o))| n != o)
        .map(|(col, (n, _))| (*col, n.clone()))
        .collect()
}

fn select_columns(table: &Table) -> String {
    table.key.iter().chain(table.fields.iter()).copied().collect::<Vec<_>>().join(", ")
}

fn key_clause(table: &Table, offset: usize) -> String {
    table
        .key
        .iter()
        .enumerate()
        .map(|(i, col)| format!("{col} = ?{}", offset + i + 1))
        .collect::<Vec<_>>()
        .join(" AND ")
}

fn read_row(table: &Table, row: &tokio_rusqlite::rusqlite::Row<'_>, offset: usize) -> Result<Row, Error> {
    let mut key = Vec::with_capacity(table.key.len());
    for i in 0..table.key.len() {
        key.push(row.get::<_, Value>(offset + i)?);
    }
    let mut fields = Vec::with_capacity(table.fields.len());
    for i in 0..table.fields.len() {
        fields.push(row.get::<_, Value>(offset + table.key.len() + i)?);
    }
    Ok(Row { key, fields })
}

/// All rows owned by `parent_id`, ordered by key.
pub(crate) fn load_children(conn: &Connection, table: &Table, parent_id: i64) -> Result<Vec<Row>, Error> {
    let Some(parent) = table.parent else {
        return Err(Error::InvalidPayload(format!("{} has no parent column", table.name)));
    };
    let sql = format!(
        "SELECT {} FROM {} WHERE {parent} = ?1 ORDER BY {}",
        select_columns(table),
        table.name,
        table.key.join(", ")
    );
    let mut stmt = conn.prepare_cached(&sql)?;
    let mut rows = stmt.query([parent_id])?;
    let mut out = Vec::new();
    while let Some(row) = rows.next()? {
        out.push(read_row(table, row, 0)?);
    }
    Ok(out)
}

/// One row by key, with its parent id when the table has one.
pub(crate) fn load_by_key(conn: &Connection, table: &Table, key: &[Value]) -> Result<Option<(Option<i64>, Row)>, Error> {
    let parent_col = table.parent.map_or_else(|| "NULL".to_string(), str::to_string);
    let sql = format!(
        "SELECT {parent_col}, {} FROM {} WHERE {}",
        select_columns(table),
        table.name,
        key_clause(table, 0)
    );
    let mut stmt = conn.prepare_cached(&sql)?;
    let found = stmt
        .query_row(params_from_iter(key.iter()), |row| {
            let parent: Option<i64> = row.get(0)?;
            Ok((parent, row_values(row, 1, table.key.len() + table.fields.len())?))
        })
        .optional()?;
    Ok(found.map(|(parent, values)| {
        let (key, fields) = values.split_at(table.key.len());
        (parent, Row::new(key.to_vec(), fields.to_vec()))
    }))
}

fn row_values(
    row: &tokio_rusqlite::rusqlite::Row<'_>,
    offset: usize,
    count: usize,
) -> tokio_rusqlite::rusqlite::Result<Vec<Value>> {
    (0..count).map(|i| row.get::<_, Value>(offset + i)).collect()
}

/// Issues statements inside a caller-owned transaction and logs them.
pub(crate) struct Writer<'c> {
    conn: &'c Connection,
    now: String,
    log: WriteLog,
}

impl<'c> Writer<'c> {
    pub fn new(conn: &'c Connection, now: String) -> Self {
        Self { conn, now, log: WriteLog::default() }
    }

    pub fn now(&self) -> &str {
        &self.now
    }

    pub fn into_log(self) -> WriteLog {
        self.log
    }

    /// Insert a full row, plus parent, stamps and any `extra` columns.
    pub fn insert(
        &mut self,
        table: &Table,
        parent: Option<i64>,
        row: &Row,
        extra: &[(&'static str, Value)],
    ) -> Result<(), Error> {
        let mut columns: Vec<&'static str> = Vec::new();
        let mut values: Vec<Value> = Vec::new();

        if let (Some(col), Some(id)) = (table.parent, parent) {
            columns.push(col);
            values.push(Value::Integer(id));
        }
        columns.extend(table.key.iter().copied());
        values.extend(row.key.iter().cloned());
        columns.extend(table.fields.iter().copied());
        values.extend(row.fields.iter().cloned());
        for (col, value) in extra {
            columns.push(*col);
            values.push(value.clone());
        }
        if table.stamps != Stamps::None {
            columns.push("created");
            values.push(Value::Text(self.now.clone()));
        }
        if table.stamps == Stamps::Both {
            columns.push("updated");
            values.push(Value::Text(self.now.clone()));
        }

        let placeholders = (1..=values.len()).map(|i| format!("?{i}")).collect::<Vec<_>>().join(", ");
        let sql = format!("INSERT INTO {} ({}) VALUES ({placeholders})", table.name, columns.join(", "));
        let rows = self.conn.prepare_cached(&sql)?.execute(params_from_iter(values.iter()))?;
        self.log.push(table.name, WriteKind::Insert, columns, rows);
        Ok(())
    }

    /// `UPDATE table SET changes WHERE key`, skipped when nothing changed.
    ///
    /// Returns the number of rows updated.
    pub fn update(&mut self, table: &Table, key: &[Value], changes: Vec<(&'static str, Value)>) -> Result<usize, Error> {
        if changes.is_empty() {
            return Ok(0);
        }
        let sets = changes
            .iter()
            .enumerate()
            .map(|(i, (col, _))| format!("{col} = ?{}", i + 1))
            .collect::<Vec<_>>()
            .join(", ");
        let sql = format!("UPDATE {} SET {sets} WHERE {}", table.name, key_clause(table, changes.len()));

        let values: Vec<&Value> = changes.iter().map(|(_, v)| v).chain(key.iter()).collect();
        let rows = self.conn.prepare_cached(&sql)?.execute(params_from_iter(values))?;
        let columns = changes.iter().map(|(col, _)| *col).collect();
        self.log.push(table.name, WriteKind::Update, columns, rows);
        Ok(rows)
    }

    /// Delete one row owned by `parent` (or any owner when `None`).
    pub fn delete(&mut self, table: &Table, parent: Option<i64>, key: &[Value]) -> Result<usize, Error> {
        let mut clause = key_clause(table, 0);
        let mut values: Vec<Value> = key.to_vec();
        if let (Some(col), Some(id)) = (table.parent, parent) {
            clause.push_str(&format!(" AND {col} = ?{}", values.len() + 1));
            values.push(Value::Integer(id));
        }
        let sql = format!("DELETE FROM {} WHERE {clause}", table.name);
        let rows = self.conn.prepare_cached(&sql)?.execute(params_from_iter(values.iter()))?;
        self.log.push(table.name, WriteKind::Delete, Vec::new(), rows);
        Ok(rows)
    }

    /// Delete every row of `table` owned by `parent_id` whose first key
    /// column is greater than `cut`.
    pub fn delete_beyond(&mut self, table: &Table, parent_id: i64, cut: i64) -> Result<usize, Error> {
        let (Some(parent), Some(step)) = (table.parent, table.key.first()) else {
            return Ok(0);
        };
        let sql = format!("DELETE FROM {} WHERE {parent} = ?1 AND {step} > ?2", table.name);
        let rows = self.conn.prepare_cached(&sql)?.execute([parent_id, cut])?;
        self.log.push(table.name, WriteKind::Delete, Vec::new(), rows);
        Ok(rows)
    }

    /// Delete every row of `table` owned by `parent_id`.
    pub fn delete_children(&mut self, table: &Table, parent_id: i64) -> Result<usize, Error> {
        let Some(parent) = table.parent else {
            return Ok(0);
        };
        let sql = format!("DELETE FROM {} WHERE {parent} = ?1", table.name);
        let rows = self.conn.prepare_cached(&sql)?.execute([parent_id])?;
        self.log.push(table.name, WriteKind::Delete, Vec::new(), rows);
        Ok(rows)
    }
}

/// Reconcile a position-keyed list: diff each step, insert new steps and
/// drop everything past the new length in one statement.
pub(crate) fn sync_steps(
    w: &mut Writer<'_>,
    table: &Table,
    parent_id: i64,
    new: &[Row],
    old: &[Row],
) -> Result<(), Error> {
    let by_step: HashMap<Vec<KeyPart>, &Row> = old.iter().map(|r| (r.identity(), r)).collect();

    for row in new {
        match by_step.get(&row.identity()) {
            Some(prev) => {
                let mut key = vec![Value::Integer(parent_id)];
                key.extend(row.key.iter().cloned());
                w.update_child(table, &key, changed(table, row, prev))?;
            }
            None => w.insert(table, Some(parent_id), row, &[])?,
        }
    }

    let stored_max = old.iter().filter_map(Row::id).max().unwrap_or(0);
    let cut = i64::try_from(new.len()).unwrap_or(i64::MAX);
    if stored_max > cut {
        w.delete_beyond(table, parent_id, cut)?;
    }
    Ok(())
}

impl Writer<'_> {
    /// Update a child row addressed by `(parent, key...)`.
    fn update_child(&mut self, table: &Table, key: &[Value], changes: Vec<(&'static str, Value)>) -> Result<usize, Error> {
        if changes.is_empty() {
            return Ok(0);
        }
        let Some(parent) = table.parent else {
            return self.update(table, key, changes);
        };
        let sets = changes
            .iter()
            .enumerate()
            .map(|(i, (col, _))| format!("{col} = ?{}", i + 1))
            .collect::<Vec<_>>()
            .join(", ");
        let offset = changes.len();
        let mut clause = format!("{parent} = ?{}", offset + 1);
        for (i, col) in table.key.iter().enumerate() {
            clause.push_str(&format!(" AND {col} = ?{}", offset + i + 2));
        }
        let sql = format!("UPDATE {} SET {sets} WHERE {clause}", table.name);
        let values: Vec<&Value> = changes.iter().map(|(_, v)| v).chain(key.iter()).collect();
        let rows = self.conn.prepare_cached(&sql)?.execute(params_from_iter(values))?;
        let columns = changes.iter().map(|(col, _)| *col).collect();
        self.log.push(table.name, WriteKind::Update, columns, rows);
        Ok(rows)
    }
}

/// How a set-valued child category treats rows missing from the snapshot.
#[derive(Debug, Clone, Copy, Default)]
pub(crate) struct SetPolicy {
    /// Rows of this entity may already exist under another owner; adopt
    /// them instead of inserting duplicates.
    pub adopt: Option<Entity>,
    /// Rows are identified by their content; never update in place.
    pub immutable: bool,
}

/// Rows a set reconciliation inserted or deleted.
#[derive(Debug, Default)]
pub(crate) struct SetChanges {
    pub inserted: Vec<Row>,
    pub deleted: Vec<Row>,
}

/// Reconcile a key-identified set: insert new keys, diff shared keys,
/// delete keys no longer present. Duplicate incoming keys keep the first.
pub(crate) fn sync_set(
    w: &mut Writer<'_>,
    probe: &mut Probe<'_>,
    table: &Table,
    parent_id: i64,
    new: Vec<Row>,
    old: Vec<Row>,
    policy: SetPolicy,
) -> Result<SetChanges, Error> {
    let mut changes = SetChanges::default();
    let stored: HashMap<Vec<KeyPart>, Row> = old.into_iter().map(|r| (r.identity(), r)).collect();
    let mut seen: HashSet<Vec<KeyPart>> = HashSet::new();

    for row in new {
        let identity = row.identity();
        if !seen.insert(identity.clone()) {
            continue;
        }

        if let Some(prev) = stored.get(&identity) {
            if !policy.immutable {
                let mut key = vec![Value::Integer(parent_id)];
                key.extend(row.key.iter().cloned());
                w.update_child(table, &key, changed(table, &row, prev))?;
            }
            continue;
        }

        if let (Some(entity), Some(id)) = (policy.adopt, row.id())
            && probe.exists(entity, id)?
        {
            let mut all: Vec<(&'static str, Value)> = table.fields.iter().copied().zip(row.fields.iter().cloned()).collect();
            if let Some(parent) = table.parent {
                all.push((parent, Value::Integer(parent_id)));
            }
            if w.update(table, &row.key, all)? > 0 {
                continue;
            }
        }

        w.insert(table, Some(parent_id), &row, &[])?;
        changes.inserted.push(row);
    }

    for (identity, row) in stored {
        if !seen.contains(&identity) {
            w.delete(table, Some(parent_id), &row.key)?;
            changes.deleted.push(row);
        }
    }

    Ok(changes)
}

/// What an [`upsert`] did.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Upsert {
    Inserted,
    Updated,
    Unchanged,
}

/// Insert a row, or update only the columns that differ from the stored one.
///
/// `on_update` receives the stored row and the diff and returns the columns
/// to write, so callers can gate or stamp updates. A stored row under a
/// different parent is moved to `parent`.
pub(crate) fn upsert<F>(
    w: &mut Writer<'_>,
    table: &Table,
    parent: Option<i64>,
    row: &Row,
    on_update: F,
) -> Result<Upsert, Error>
where
    F: FnOnce(&Row, Vec<(&'static str, Value)>) -> Vec<(&'static str, Value)>,
{
    match load_by_key(w.conn, table, &row.key)? {
        None => {
            w.insert(table, parent, row, &[])?;
            Ok(Upsert::Inserted)
        }
        Some((stored_parent, prev)) => {
            let mut diff = changed(table, row, &prev);
            if let (Some(col), Some(id)) = (table.parent, parent)
                && stored_parent != Some(id)
            {
                diff.push((col, Value::Integer(id)));
            }
            let diff = on_update(&prev, diff);
            if w.update(table, &row.key, diff)? > 0 {
                Ok(Upsert::Updated)
            } else {
                Ok(Upsert::Unchanged)
            }
        }
    }
}

/// `on_update` hook that refreshes the `updated` stamp on any change.
pub(crate) fn stamp_updated(now: String) -> impl FnOnce(&Row, Vec<(&'static str, Value)>) -> Vec<(&'static str, Value)> {
    move |_, mut diff| {
        if !diff.is_empty() {
            diff.push(("updated", Value::Text(now)));
        }
        diff
    }
}
