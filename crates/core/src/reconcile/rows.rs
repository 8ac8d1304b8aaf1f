//! Store tables and the mapping from payload records to their rows.

use tokio_rusqlite::rusqlite::types::Value;

use super::write::{Row, Stamps, Table};
use crate::cache::hash::compute_event_hash;
use crate::model::{
    AmendmentRef, Bill, CalendarEvent, Committee, History, Person, Progress, Referral, Sast, Session, Sponsor,
    Subject, SupplementRef, TextRef, VoteDetail, VoteRef,
};

pub(crate) const BILL: Table = Table {
    name: "ls_bill",
    parent: None,
    key: &["bill_id"],
    fields: &[
        "state_id",
        "session_id",
        "body_id",
        "current_body_id",
        "bill_type_id",
        "bill_number",
        "status_id",
        "status_date",
        "title",
        "description",
        "pending_committee_id",
        "legiscan_url",
        "state_url",
        "change_hash",
    ],
    stamps: Stamps::Both,
};

pub(crate) const SESSION: Table = Table {
    name: "ls_session",
    parent: None,
    key: &["session_id"],
    fields: &[
        "state_id",
        "year_start",
        "year_end",
        "prefile",
        "sine_die",
        "prior",
        "special",
        "session_name",
        "session_title",
        "session_tag",
    ],
    stamps: Stamps::None,
};

pub(crate) const COMMITTEE: Table = Table {
    name: "ls_committee",
    parent: None,
    key: &["committee_id"],
    fields: &["committee_body_id", "committee_name"],
    stamps: Stamps::None,
};

pub(crate) const PERSON: Table = Table {
    name: "ls_people",
    parent: None,
    key: &["people_id"],
    fields: &[
        "state_id",
        "role_id",
        "party_id",
        "name",
        "first_name",
        "middle_name",
        "last_name",
        "suffix",
        "nickname",
        "district",
        "committee_sponsor_id",
        "votesmart_id",
        "followthemoney_eid",
        "opensecrets_id",
        "ballotpedia",
        "knowwho_pid",
        "person_hash",
    ],
    stamps: Stamps::Both,
};

/// Index of `person_hash` within [`PERSON`] fields.
pub(crate) const PERSON_HASH: usize = 16;

pub(crate) const SUBJECT: Table = Table {
    name: "ls_subject",
    parent: None,
    key: &["subject_id"],
    fields: &["state_id", "subject_name"],
    stamps: Stamps::None,
};

pub(crate) const REFERRAL: Table = Table {
    name: "ls_bill_referral",
    parent: Some("bill_id"),
    key: &["referral_step"],
    fields: &["referral_date", "committee_id"],
    stamps: Stamps::None,
};

pub(crate) const HISTORY: Table = Table {
    name: "ls_bill_history",
    parent: Some("bill_id"),
    key: &["history_step"],
    fields: &["history_major", "history_body_id", "history_date", "history_action"],
    stamps: Stamps::None,
};

pub(crate) const PROGRESS: Table = Table {
    name: "ls_bill_progress",
    parent: Some("bill_id"),
    key: &["progress_step"],
    fields: &["progress_date", "progress_event_id"],
    stamps: Stamps::None,
};

pub(crate) const REASON: Table = Table {
    name: "ls_bill_reason",
    parent: Some("bill_id"),
    key: &["reason_id"],
    fields: &[],
    stamps: Stamps::Created,
};

pub(crate) const SPONSOR: Table = Table {
    name: "ls_bill_sponsor",
    parent: Some("bill_id"),
    key: &["people_id"],
    fields: &["sponsor_order", "sponsor_type_id"],
    stamps: Stamps::None,
};

pub(crate) const VOTE: Table = Table {
    name: "ls_bill_vote",
    parent: Some("bill_id"),
    key: &["roll_call_id"],
    fields: &[
        "roll_call_body_id",
        "roll_call_date",
        "roll_call_desc",
        "yea",
        "nay",
        "nv",
        "absent",
        "total",
        "passed",
        "legiscan_url",
        "state_url",
    ],
    stamps: Stamps::Both,
};

pub(crate) const VOTE_DETAIL: Table = Table {
    name: "ls_bill_vote_detail",
    parent: Some("roll_call_id"),
    key: &["people_id"],
    fields: &["vote_id"],
    stamps: Stamps::None,
};

pub(crate) const TEXT: Table = Table {
    name: "ls_bill_text",
    parent: Some("bill_id"),
    key: &["text_id"],
    fields: &[
        "bill_text_date",
        "bill_text_type_id",
        "bill_text_mime_id",
        "legiscan_url",
        "state_url",
        "bill_text_size",
        "bill_text_hash",
    ],
    stamps: Stamps::Both,
};

pub(crate) const AMENDMENT: Table = Table {
    name: "ls_bill_amendment",
    parent: Some("bill_id"),
    key: &["amendment_id"],
    fields: &[
        "adopted",
        "amendment_body_id",
        "amendment_date",
        "amendment_title",
        "amendment_desc",
        "amendment_mime_id",
        "legiscan_url",
        "state_url",
        "amendment_size",
        "amendment_hash",
    ],
    stamps: Stamps::Both,
};

pub(crate) const SUPPLEMENT: Table = Table {
    name: "ls_bill_supplement",
    parent: Some("bill_id"),
    key: &["supplement_id"],
    fields: &[
        "supplement_date",
        "supplement_type_id",
        "supplement_title",
        "supplement_desc",
        "supplement_mime_id",
        "legiscan_url",
        "state_url",
        "supplement_size",
        "supplement_hash",
    ],
    stamps: Stamps::Both,
};

pub(crate) const SAST: Table = Table {
    name: "ls_bill_sast",
    parent: Some("bill_id"),
    key: &["sast_type_id", "sast_bill_id"],
    fields: &["sast_bill_number"],
    stamps: Stamps::None,
};

pub(crate) const BILL_SUBJECT: Table = Table {
    name: "ls_bill_subject",
    parent: Some("bill_id"),
    key: &["subject_id"],
    fields: &[],
    stamps: Stamps::None,
};

pub(crate) const CALENDAR: Table = Table {
    name: "ls_bill_calendar",
    parent: Some("bill_id"),
    key: &["event_hash"],
    fields: &["event_type_id", "event_date", "event_time", "event_location", "event_desc"],
    stamps: Stamps::Both,
};

/// Converts payload values to column values.
#[derive(Debug, Clone, Copy)]
pub(crate) struct Columns {
    /// Store empty and all-zero dates as NULL.
    pub massage_dates: bool,
}

fn int(v: i64) -> Value {
    Value::Integer(v)
}

fn text(v: &str) -> Value {
    Value::Text(v.to_string())
}

fn step(index: usize) -> Value {
    Value::Integer(i64::try_from(index + 1).unwrap_or(i64::MAX))
}

impl Columns {
    fn date(self, v: &str) -> Value {
        if self.massage_dates && (v.is_empty() || v == "0000-00-00") {
            Value::Null
        } else {
            text(v)
        }
    }

    pub fn bill(self, b: &Bill) -> Row {
        Row::new(
            vec![int(b.bill_id)],
            vec![
                int(b.state_id),
                int(b.effective_session_id()),
                int(b.body_id),
                int(b.current_body_id),
                int(b.bill_type_id),
                text(&b.bill_number),
                int(b.status),
                self.date(&b.status_date),
                text(&b.title),
                text(&b.description),
                int(b.pending_committee_id),
                text(&b.url),
                text(&b.state_link),
                text(&b.change_hash),
            ],
        )
    }

    pub fn session(self, s: &Session) -> Row {
        Row::new(
            vec![int(s.session_id)],
            vec![
                int(s.state_id),
                int(s.year_start),
                int(s.year_end),
                int(s.prefile),
                int(s.sine_die),
                int(s.prior),
                int(s.special),
                text(&s.session_name),
                text(&s.session_title),
                text(&s.session_tag),
            ],
        )
    }

    pub fn committee(self, c: &Committee) -> Row {
        Row::new(vec![int(c.committee_id)], vec![int(c.chamber_id), text(&c.name)])
    }

    pub fn referral_committee(self, r: &Referral) -> Row {
        Row::new(vec![int(r.committee_id)], vec![int(r.chamber_id), text(&r.name)])
    }

    pub fn person(self, p: &Person) -> Row {
        Row::new(
            vec![int(p.people_id)],
            vec![
                int(p.state_id),
                int(p.role_id),
                int(p.party_id),
                text(&p.name),
                text(&p.first_name),
                text(&p.middle_name),
                text(&p.last_name),
                text(&p.suffix),
                text(&p.nickname),
                text(&p.district),
                int(p.committee_sponsor_id),
                int(p.votesmart_id),
                int(p.followthemoney_eid),
                text(&p.opensecrets_id),
                text(&p.ballotpedia),
                int(p.knowwho_pid),
                text(&p.person_hash),
            ],
        )
    }

    pub fn subject(self, state_id: i64, s: &Subject) -> Row {
        Row::new(vec![int(s.subject_id)], vec![int(state_id), text(&s.subject_name)])
    }

    pub fn referrals(self, list: &[Referral]) -> Vec<Row> {
        list.iter()
            .enumerate()
            .map(|(i, r)| Row::new(vec![step(i)], vec![self.date(&r.date), int(r.committee_id)]))
            .collect()
    }

    pub fn history(self, list: &[History]) -> Vec<Row> {
        list.iter()
            .enumerate()
            .map(|(i, h)| {
                Row::new(
                    vec![step(i)],
                    vec![int(h.importance), int(h.chamber_id), self.date(&h.date), text(&h.action)],
                )
            })
            .collect()
    }

    pub fn progress(self, list: &[Progress]) -> Vec<Row> {
        list.iter()
            .enumerate()
            .map(|(i, p)| Row::new(vec![step(i)], vec![self.date(&p.date), int(p.event)]))
            .collect()
    }

    pub fn reasons(self, list: &[i64]) -> Vec<Row> {
        list.iter().map(|id| Row::new(vec![int(*id)], Vec::new())).collect()
    }

    pub fn sponsors(self, list: &[Sponsor]) -> Vec<Row> {
        list.iter()
            .map(|s| Row::new(vec![int(s.person.people_id)], vec![int(s.sponsor_order), int(s.sponsor_type_id)]))
            .collect()
    }

    pub fn vote(self, v: &VoteRef) -> Row {
        Row::new(
            vec![int(v.roll_call_id)],
            vec![
                int(v.chamber_id),
                self.date(&v.date),
                text(&v.desc),
                int(v.yea),
                int(v.nay),
                int(v.nv),
                int(v.absent),
                int(v.total),
                int(v.passed),
                text(&v.url),
                text(&v.state_link),
            ],
        )
    }

    pub fn vote_details(self, list: &[VoteDetail]) -> Vec<Row> {
        list.iter()
            .map(|d| Row::new(vec![int(d.people_id)], vec![int(d.vote_id)]))
            .collect()
    }

    pub fn text(self, t: &TextRef) -> Row {
        Row::new(
            vec![int(t.doc_id)],
            vec![
                self.date(&t.date),
                int(t.type_id),
                int(t.mime_id),
                text(&t.url),
                text(&t.state_link),
                int(t.text_size),
                text(&t.text_hash),
            ],
        )
    }

    pub fn amendment(self, a: &AmendmentRef) -> Row {
        Row::new(
            vec![int(a.amendment_id)],
            vec![
                int(a.adopted),
                int(a.chamber_id),
                self.date(&a.date),
                text(&a.title),
                text(&a.description),
                int(a.mime_id),
                text(&a.url),
                text(&a.state_link),
                int(a.amendment_size),
                text(&a.amendment_hash),
            ],
        )
    }

    pub fn supplement(self, s: &SupplementRef) -> Row {
        Row::new(
            vec![int(s.supplement_id)],
            vec![
                self.date(&s.date),
                int(s.type_id),
                text(&s.title),
                text(&s.description),
                int(s.mime_id),
                text(&s.url),
                text(&s.state_link),
                int(s.supplement_size),
                text(&s.supplement_hash),
            ],
        )
    }

    pub fn sasts(self, list: &[Sast]) -> Vec<Row> {
        list.iter()
            .map(|s| Row::new(vec![int(s.type_id), int(s.sast_bill_id)], vec![text(&s.sast_bill_number)]))
            .collect()
    }

    pub fn bill_subjects(self, list: &[Subject]) -> Vec<Row> {
        list.iter().map(|s| Row::new(vec![int(s.subject_id)], Vec::new())).collect()
    }

    pub fn calendar(self, list: &[CalendarEvent]) -> Vec<Row> {
        list.iter()
            .map(|e| {
                let hash = compute_event_hash(&e.event_type, &e.date, &e.time, &e.location, &e.description);
                Row::new(
                    vec![Value::Text(hash)],
                    vec![
                        int(e.type_id),
                        self.date(&e.date),
                        text(&e.time),
                        text(&e.location),
                        text(&e.description),
                    ],
                )
            })
            .collect()
    }
}
