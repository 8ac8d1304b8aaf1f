use std::collections::BTreeMap;

use serde::Serialize;
use tokio_rusqlite::rusqlite::types::Value;

use super::people::upsert_person;
use super::probe::Entity;
use super::rows::{
    AMENDMENT, BILL, BILL_SUBJECT, CALENDAR, COMMITTEE, HISTORY, PROGRESS, REASON, REFERRAL, SAST, SESSION, SPONSOR,
    SUBJECT, SUPPLEMENT, TEXT, VOTE, VOTE_DETAIL,
};
use super::write::{
    SetPolicy, Table, Upsert, changed, load_by_key, load_children, sync_set, sync_steps, to_json, upsert,
};
use super::{EntryState, Outcome, Reconciler, Scope};
use crate::Error;
use crate::missing::MissingCategory;
use crate::model::{Bill, Committee, Session};

impl Reconciler {
    /// Reconcile a full bill and everything hanging off it.
    ///
    /// Parent entities (session, committees, subjects, people) are created
    /// on first sight. Newly seen vote, text, amendment and supplement stubs
    /// are queued as missing when the matching toggle is on.
    ///
    /// # Errors
    ///
    /// Returns `Error::InvalidPayload` for a bill without id or session, or
    /// the store error that rolled the transaction back.
    pub async fn process_bill(&mut self, bill: Bill) -> Result<Outcome, Error> {
        self.missing.reset();
        bill.validate().map_err(Error::InvalidPayload)?;

        let bill_id = bill.bill_id;
        let (state, writes) = self.apply(move |s| apply_bill(s, &bill)).await?;
        tracing::debug!(bill_id, ?state, writes = writes.len(), missing = self.missing.len(), "bill reconciled");
        Ok(Outcome { object: "bill", id: bill_id, state, writes })
    }

    /// The stored snapshot a bill payload would be diffed against.
    pub async fn load_bill(&self, bill_id: i64) -> Result<Option<BillSnapshot>, Error> {
        self.db
            .conn
            .call(move |conn| -> Result<Option<BillSnapshot>, Error> {
                let Some((_, row)) = load_by_key(conn, &BILL, &[Value::Integer(bill_id)])? else {
                    return Ok(None);
                };
                let mut snapshot = BillSnapshot { bill: to_json(&BILL, &row), children: BTreeMap::new() };
                for table in BILL_CHILDREN {
                    let rows = load_children(conn, table, bill_id)?;
                    snapshot.children.insert(table.name, rows.iter().map(|r| to_json(table, r)).collect());
                }
                Ok(Some(snapshot))
            })
            .await
            .map_err(Error::from)
    }
}

/// Tables keyed by `bill_id`.
const BILL_CHILDREN: [&Table; 12] = [
    &REFERRAL,
    &HISTORY,
    &PROGRESS,
    &REASON,
    &SPONSOR,
    &SAST,
    &BILL_SUBJECT,
    &CALENDAR,
    &VOTE,
    &TEXT,
    &AMENDMENT,
    &SUPPLEMENT,
];

/// A stored bill row and its child rows, as column maps.
#[derive(Debug, Clone, Default, Serialize)]
pub struct BillSnapshot {
    pub bill: BTreeMap<&'static str, serde_json::Value>,
    /// Child rows per table, in key order.
    pub children: BTreeMap<&'static str, Vec<BTreeMap<&'static str, serde_json::Value>>>,
}

pub(super) fn apply_bill(s: &mut Scope<'_>, bill: &Bill) -> Result<EntryState, Error> {
    let bill_id = bill.bill_id;
    let key = [Value::Integer(bill_id)];

    // A cached "exists" is advisory; the snapshot decides.
    let stored = if s.probe.exists(Entity::Bill, bill_id)? {
        load_by_key(s.conn, &BILL, &key)?.map(|(_, row)| row)
    } else {
        None
    };

    sync_session(s, bill)?;
    sync_committees(s, bill)?;

    let row = s.cols.bill(bill);
    let (state, hash_moved) = match &stored {
        None => {
            s.w.insert(&BILL, None, &row, &[])?;
            (EntryState::New, true)
        }
        Some(prev) => {
            let mut diff = changed(&BILL, &row, prev);
            let hash_moved = diff.iter().any(|(col, _)| *col == "change_hash");
            if hash_moved {
                diff.push(("updated", Value::Text(s.w.now().to_string())));
            }
            s.w.update(&BILL, &key, diff)?;
            (EntryState::Existing, hash_moved)
        }
    };

    sync_steps_lists(s, bill)?;
    sync_set_lists(s, bill)?;
    if hash_moved {
        log_reasons(s, bill)?;
    }

    for sponsor in &bill.sponsors {
        if sponsor.person.people_id > 0 {
            upsert_person(s, &sponsor.person)?;
        }
    }

    s.signals.push(("bill", bill_id));
    Ok(state)
}

/// Create or refresh the bill's session, signalling when it changed.
fn sync_session(s: &mut Scope<'_>, bill: &Bill) -> Result<(), Error> {
    let session_id = bill.effective_session_id();
    let session = match &bill.session {
        Some(session) => Session {
            session_id,
            state_id: if session.state_id > 0 { session.state_id } else { bill.state_id },
            ..session.clone()
        },
        None if s.probe.exists(Entity::Session, session_id)? => return Ok(()),
        None => Session { session_id, state_id: bill.state_id, ..Default::default() },
    };

    let row = s.cols.session(&session);
    if upsert(&mut s.w, &SESSION, None, &row, |_, diff| diff)? != Upsert::Unchanged {
        s.signals.push(("session", session_id));
    }
    Ok(())
}

fn sync_committees(s: &mut Scope<'_>, bill: &Bill) -> Result<(), Error> {
    if bill.pending_committee_id > 0 {
        let committee = match &bill.committee {
            Some(c) => Committee { committee_id: bill.pending_committee_id, ..c.clone() },
            None => Committee { committee_id: bill.pending_committee_id, ..Default::default() },
        };
        let row = s.cols.committee(&committee);
        ensure(s, Entity::Committee, &row)?;
    }

    for referral in bill.referrals.iter().filter(|r| r.committee_id > 0) {
        let row = s.cols.referral_committee(referral);
        ensure(s, Entity::Committee, &row)?;
    }
    Ok(())
}

/// Insert a reference row unless it already exists.
fn ensure(s: &mut Scope<'_>, entity: Entity, row: &super::write::Row) -> Result<(), Error> {
    let Some(id) = row.id() else {
        return Ok(());
    };
    if !s.probe.exists(entity, id)? {
        let table = match entity {
            Entity::Committee => &COMMITTEE,
            Entity::Subject => &SUBJECT,
            _ => return Ok(()),
        };
        s.w.insert(table, None, row, &[])?;
    }
    Ok(())
}

fn sync_steps_lists(s: &mut Scope<'_>, bill: &Bill) -> Result<(), Error> {
    let bill_id = bill.bill_id;
    let lists = [
        (&REFERRAL, s.cols.referrals(&bill.referrals)),
        (&HISTORY, s.cols.history(&bill.history)),
        (&PROGRESS, s.cols.progress(&bill.progress)),
    ];
    for (table, rows) in lists {
        let old = load_children(s.conn, table, bill_id)?;
        sync_steps(&mut s.w, table, bill_id, &rows, &old)?;
    }
    Ok(())
}

/// Record why the bill changed. Reasons accumulate and are never removed.
fn log_reasons(s: &mut Scope<'_>, bill: &Bill) -> Result<(), Error> {
    let mut seen = Vec::with_capacity(bill.reasons.len());
    for row in s.cols.reasons(&bill.reasons) {
        if !seen.contains(&row.key) {
            s.w.insert(&REASON, Some(bill.bill_id), &row, &[])?;
            seen.push(row.key);
        }
    }
    Ok(())
}

fn sync_set_lists(s: &mut Scope<'_>, bill: &Bill) -> Result<(), Error> {
    let bill_id = bill.bill_id;
    let cols = s.cols;
    let plain = SetPolicy::default();

    for (table, rows) in [
        (&SPONSOR, cols.sponsors(&bill.sponsors)),
        (&SAST, cols.sasts(&bill.sasts)),
    ] {
        let old = load_children(s.conn, table, bill_id)?;
        sync_set(&mut s.w, &mut s.probe, table, bill_id, rows, old, plain)?;
    }

    for subject in bill.subjects.iter().filter(|subject| subject.subject_id > 0) {
        let row = cols.subject(bill.state_id, subject);
        ensure(s, Entity::Subject, &row)?;
    }
    let old = load_children(s.conn, &BILL_SUBJECT, bill_id)?;
    sync_set(&mut s.w, &mut s.probe, &BILL_SUBJECT, bill_id, cols.bill_subjects(&bill.subjects), old, plain)?;

    let old = load_children(s.conn, &CALENDAR, bill_id)?;
    let immutable = SetPolicy { immutable: true, ..plain };
    sync_set(&mut s.w, &mut s.probe, &CALENDAR, bill_id, cols.calendar(&bill.calendar), old, immutable)?;

    let votes: Vec<_> = bill.votes.iter().map(|v| cols.vote(v)).collect();
    let texts: Vec<_> = bill.texts.iter().map(|t| cols.text(t)).collect();
    let amendments: Vec<_> = bill.amendments.iter().map(|a| cols.amendment(a)).collect();
    let supplements: Vec<_> = bill.supplements.iter().map(|a| cols.supplement(a)).collect();

    let documents = [
        (&VOTE, votes, Entity::Vote, MissingCategory::Votes, s.options.want_vote_details),
        (&TEXT, texts, Entity::Text, MissingCategory::Texts, s.options.want_bill_text),
        (&AMENDMENT, amendments, Entity::Amendment, MissingCategory::Amendments, s.options.want_amendment),
        (&SUPPLEMENT, supplements, Entity::Supplement, MissingCategory::Supplements, s.options.want_supplement),
    ];
    for (table, rows, entity, category, wanted) in documents {
        let old = load_children(s.conn, table, bill_id)?;
        let policy = SetPolicy { adopt: Some(entity), ..plain };
        let changes = sync_set(&mut s.w, &mut s.probe, table, bill_id, rows, old, policy)?;

        for id in changes.inserted.iter().filter_map(|row| row.id()) {
            s.request_if(wanted, category, id);
        }
        if entity == Entity::Vote {
            for id in changes.deleted.iter().filter_map(|row| row.id()) {
                s.w.delete_children(&VOTE_DETAIL, id)?;
            }
        }
    }
    Ok(())
}
