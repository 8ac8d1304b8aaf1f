use super::probe::Entity;
use super::rows::{PERSON, PERSON_HASH, VOTE, VOTE_DETAIL};
use super::write::{SetPolicy, Upsert, load_children, stamp_updated, sync_set, upsert};
use super::{EntryState, Outcome, Reconciler, Scope};
use crate::Error;
use crate::missing::MissingCategory;
use crate::model::{Person, RollCall};

impl Reconciler {
    /// Reconcile a legislator. Stored people are only rewritten when their
    /// `person_hash` differs.
    pub async fn process_person(&mut self, person: Person) -> Result<Outcome, Error> {
        self.missing.reset();
        person.validate().map_err(Error::InvalidPayload)?;

        let people_id = person.people_id;
        let (state, writes) = self
            .apply(move |s| {
                let state = entry_state(upsert_person(s, &person)?);
                s.signals.push(("people", people_id));
                Ok(state)
            })
            .await?;
        Ok(Outcome { object: "people", id: people_id, state, writes })
    }

    /// Reconcile a roll call and its per-legislator detail.
    ///
    /// Voters not yet stored are queued under `sponsors`.
    pub async fn process_roll_call(&mut self, roll_call: RollCall) -> Result<Outcome, Error> {
        self.missing.reset();
        roll_call.validate().map_err(Error::InvalidPayload)?;

        let roll_call_id = roll_call.summary.roll_call_id;
        let (state, writes) = self.apply(move |s| apply_roll_call(s, &roll_call)).await?;
        tracing::debug!(roll_call_id, ?state, writes = writes.len(), "roll call reconciled");
        Ok(Outcome { object: "rollcall", id: roll_call_id, state, writes })
    }
}

pub(super) fn entry_state(upsert: Upsert) -> EntryState {
    match upsert {
        Upsert::Inserted => EntryState::New,
        Upsert::Updated | Upsert::Unchanged => EntryState::Existing,
    }
}

pub(super) fn upsert_person(s: &mut Scope<'_>, person: &Person) -> Result<Upsert, Error> {
    let row = s.cols.person(person);
    let now = s.w.now().to_string();
    let hash = row.fields.get(PERSON_HASH).cloned();
    upsert(&mut s.w, &PERSON, None, &row, move |prev, diff| {
        if prev.fields.get(PERSON_HASH) == hash.as_ref() {
            Vec::new()
        } else {
            stamp_updated(now)(prev, diff)
        }
    })
}

fn apply_roll_call(s: &mut Scope<'_>, roll_call: &RollCall) -> Result<EntryState, Error> {
    let roll_call_id = roll_call.summary.roll_call_id;
    let row = s.cols.vote(&roll_call.summary);
    let now = s.w.now().to_string();
    let state = entry_state(upsert(&mut s.w, &VOTE, Some(roll_call.bill_id), &row, stamp_updated(now))?);

    let details = s.cols.vote_details(&roll_call.votes);
    let old = load_children(s.conn, &VOTE_DETAIL, roll_call_id)?;
    sync_set(&mut s.w, &mut s.probe, &VOTE_DETAIL, roll_call_id, details, old, SetPolicy::default())?;

    for detail in roll_call.votes.iter().filter(|d| d.people_id > 0) {
        if !s.probe.exists(Entity::Person, detail.people_id)? {
            s.missing.request(MissingCategory::Sponsors, detail.people_id);
        }
    }

    s.signals.push(("rollcall", roll_call_id));
    Ok(state)
}
