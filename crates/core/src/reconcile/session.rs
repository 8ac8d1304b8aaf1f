use super::people::entry_state;
use super::rows::SESSION;
use super::write::{Upsert, upsert};
use super::{Outcome, Reconciler};
use crate::Error;
use crate::model::Session;

impl Reconciler {
    /// Reconcile one session, signalling when it was created or changed.
    pub async fn process_session(&mut self, session: Session) -> Result<Outcome, Error> {
        self.missing.reset();
        self.apply_session(session).await
    }

    /// Reconcile every session of a session list, each in its own
    /// transaction.
    pub async fn process_session_list(&mut self, sessions: Vec<Session>) -> Result<Vec<Outcome>, Error> {
        self.missing.reset();
        let mut outcomes = Vec::with_capacity(sessions.len());
        for session in sessions {
            outcomes.push(self.apply_session(session).await?);
        }
        Ok(outcomes)
    }

    async fn apply_session(&mut self, session: Session) -> Result<Outcome, Error> {
        session.validate().map_err(Error::InvalidPayload)?;

        let session_id = session.session_id;
        let row = self.columns().session(&session);
        let (state, writes) = self
            .apply(move |s| {
                let upserted = upsert(&mut s.w, &SESSION, None, &row, |_, diff| diff)?;
                if upserted != Upsert::Unchanged {
                    s.signals.push(("session", session_id));
                }
                Ok(entry_state(upserted))
            })
            .await?;
        Ok(Outcome { object: "session", id: session_id, state, writes })
    }
}
