//! Bill texts, amendments and supplements.
//!
//! The metadata row is upserted like any other entity. A non-empty `doc`
//! body is decoded and written to the document cache, and the row is
//! flagged as having a local copy. A body that cannot be decoded or stored
//! fails the whole document.

use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use tokio_rusqlite::rusqlite::types::Value;
use tokio_rusqlite::rusqlite::{OptionalExtension, params};

use super::people::entry_state;
use super::rows::{AMENDMENT, SUPPLEMENT, TEXT};
use super::write::{Row, Table, stamp_updated, upsert};
use super::{EntryState, Outcome, Reconciler, Scope};
use crate::Error;
use crate::cache::document_key;
use crate::model::documents::validate_document;
use crate::model::{Amendment, BillText, Supplement};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum DocumentKind {
    Text,
    Amendment,
    Supplement,
}

impl DocumentKind {
    fn object(self) -> &'static str {
        match self {
            DocumentKind::Text => "text",
            DocumentKind::Amendment => "amendment",
            DocumentKind::Supplement => "supplement",
        }
    }

    fn table(self) -> &'static Table {
        match self {
            DocumentKind::Text => &TEXT,
            DocumentKind::Amendment => &AMENDMENT,
            DocumentKind::Supplement => &SUPPLEMENT,
        }
    }

    fn mime_column(self) -> &'static str {
        match self {
            DocumentKind::Text => "bill_text_mime_id",
            DocumentKind::Amendment => "amendment_mime_id",
            DocumentKind::Supplement => "supplement_mime_id",
        }
    }
}

struct Document {
    kind: DocumentKind,
    id: i64,
    bill_id: i64,
    row: Row,
    doc: String,
}

impl Reconciler {
    pub async fn process_text(&mut self, text: BillText) -> Result<Outcome, Error> {
        self.missing.reset();
        let row = self.columns().text(&text.meta);
        self.process_document(Document {
            kind: DocumentKind::Text,
            id: text.meta.doc_id,
            bill_id: text.bill_id,
            row,
            doc: text.doc,
        })
        .await
    }

    pub async fn process_amendment(&mut self, amendment: Amendment) -> Result<Outcome, Error> {
        self.missing.reset();
        let row = self.columns().amendment(&amendment.meta);
        self.process_document(Document {
            kind: DocumentKind::Amendment,
            id: amendment.meta.amendment_id,
            bill_id: amendment.bill_id,
            row,
            doc: amendment.doc,
        })
        .await
    }

    pub async fn process_supplement(&mut self, supplement: Supplement) -> Result<Outcome, Error> {
        self.missing.reset();
        let row = self.columns().supplement(&supplement.meta);
        self.process_document(Document {
            kind: DocumentKind::Supplement,
            id: supplement.meta.supplement_id,
            bill_id: supplement.bill_id,
            row,
            doc: supplement.doc,
        })
        .await
    }

    async fn process_document(&mut self, document: Document) -> Result<Outcome, Error> {
        let object = document.kind.object();
        validate_document(object, document.id, document.bill_id).map_err(Error::InvalidPayload)?;

        let id = document.id;
        let (state, writes) = self.apply(move |s| apply_document(s, &document)).await?;
        tracing::debug!(object, id, ?state, writes = writes.len(), "document reconciled");
        Ok(Outcome { object, id, state, writes })
    }
}

fn apply_document(s: &mut Scope<'_>, d: &Document) -> Result<EntryState, Error> {
    let table = d.kind.table();
    let now = s.w.now().to_string();
    let state = entry_state(upsert(&mut s.w, table, Some(d.bill_id), &d.row, stamp_updated(now))?);

    if !d.doc.is_empty() {
        store_body(s, d)?;
    }

    s.signals.push((d.kind.object(), d.id));
    Ok(state)
}

/// Decode the body, write it to the document cache and flag the local copy.
fn store_body(s: &mut Scope<'_>, d: &Document) -> Result<(), Error> {
    let object = d.kind.object();
    let table = d.kind.table();
    let id_column = table.key[0];

    let compact: String = d.doc.chars().filter(|c| !c.is_ascii_whitespace()).collect();
    let body = STANDARD
        .decode(compact)
        .map_err(|e| Error::Document(format!("{object} {}: body is not valid base64: {e}", d.id)))?;

    let sql = format!(
        "SELECT st.state_abbr, b.session_id, b.bill_number, d.{mime}
         FROM {table} d
             INNER JOIN ls_bill b ON d.bill_id = b.bill_id
             INNER JOIN ls_state st ON b.state_id = st.state_id
         WHERE d.{id_column} = ?1",
        mime = d.kind.mime_column(),
        table = table.name,
    );
    let location = s
        .conn
        .query_row(&sql, params![d.id], |row| {
            Ok((row.get::<_, String>(0)?, row.get::<_, i64>(1)?, row.get::<_, String>(2)?, row.get::<_, i64>(3)?))
        })
        .optional()?;
    let Some((state_abbr, session_id, bill_number, mime_id)) = location else {
        return Err(Error::Document(format!("{object} {}: parent bill {} is not stored", d.id, d.bill_id)));
    };

    let fragment = document_key(object, &state_abbr, session_id, &bill_number, d.id, mime_id);
    s.documents.set(&fragment, &body)?;

    let (local_copy, stored_fragment): (i64, Option<String>) = s.conn.query_row(
        &format!("SELECT local_copy, local_fragment FROM {} WHERE {id_column} = ?1", table.name),
        params![d.id],
        |row| Ok((row.get(0)?, row.get(1)?)),
    )?;

    let mut changes = Vec::new();
    if local_copy != 1 {
        changes.push(("local_copy", Value::Integer(1)));
    }
    if stored_fragment.as_deref() != Some(fragment.as_str()) {
        changes.push(("local_fragment", Value::Text(fragment)));
    }
    s.w.update(table, &[Value::Integer(d.id)], changes)?;
    Ok(())
}
