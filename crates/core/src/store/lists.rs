//! Monitor and ignore lists.
//!
//! A bill is on at most one of the two lists: monitoring a bill removes it
//! from the ignore list and vice versa.

use std::collections::HashSet;

use super::{StoreDb, timestamp};
use crate::Error;
use serde::{Deserialize, Serialize};
use tokio_rusqlite::params;

/// Position taken on a monitored bill.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum Stance {
    #[default]
    Watch,
    Support,
    Oppose,
}

impl Stance {
    pub fn as_i64(self) -> i64 {
        match self {
            Stance::Watch => 0,
            Stance::Support => 1,
            Stance::Oppose => 2,
        }
    }

    pub fn from_i64(value: i64) -> Self {
        match value {
            1 => Stance::Support,
            2 => Stance::Oppose,
            _ => Stance::Watch,
        }
    }
}

/// A monitored bill joined with what the store knows about it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MonitoredBill {
    pub bill_id: i64,
    pub stance: Stance,
    /// `None` until the bill itself has been reconciled.
    pub state_abbr: Option<String>,
    pub change_hash: Option<String>,
}

impl StoreDb {
    /// Add a bill to the monitor list (or change its stance).
    pub async fn monitor(&self, bill_id: i64, stance: Stance) -> Result<(), Error> {
        let now = timestamp();
        self.conn
            .call(move |conn| -> Result<(), Error> {
                let tx = conn.transaction()?;
                tx.execute(
                    "INSERT INTO ls_monitor (bill_id, stance, created) VALUES (?1, ?2, ?3)
                     ON CONFLICT(bill_id) DO UPDATE SET stance = excluded.stance, created = excluded.created",
                    params![bill_id, stance.as_i64(), now],
                )?;
                tx.execute("DELETE FROM ls_ignore WHERE bill_id = ?1", params![bill_id])?;
                tx.commit()?;
                Ok(())
            })
            .await
            .map_err(Error::from)
    }

    /// Remove a bill from the monitor list. Returns whether it was listed.
    pub async fn unmonitor(&self, bill_id: i64) -> Result<bool, Error> {
        self.conn
            .call(move |conn| -> Result<bool, Error> {
                Ok(conn.execute("DELETE FROM ls_monitor WHERE bill_id = ?1", params![bill_id])? > 0)
            })
            .await
            .map_err(Error::from)
    }

    /// Add a bill to the ignore list, leaving an existing entry untouched.
    pub async fn ignore(&self, bill_id: i64) -> Result<(), Error> {
        let now = timestamp();
        self.conn
            .call(move |conn| -> Result<(), Error> {
                let tx = conn.transaction()?;
                tx.execute(
                    "INSERT OR IGNORE INTO ls_ignore (bill_id, created) VALUES (?1, ?2)",
                    params![bill_id, now],
                )?;
                tx.execute("DELETE FROM ls_monitor WHERE bill_id = ?1", params![bill_id])?;
                tx.commit()?;
                Ok(())
            })
            .await
            .map_err(Error::from)
    }

    /// Remove a bill from the ignore list. Returns whether it was listed.
    pub async fn unignore(&self, bill_id: i64) -> Result<bool, Error> {
        self.conn
            .call(move |conn| -> Result<bool, Error> {
                Ok(conn.execute("DELETE FROM ls_ignore WHERE bill_id = ?1", params![bill_id])? > 0)
            })
            .await
            .map_err(Error::from)
    }

    /// All ignored bill ids.
    pub async fn ignored_bills(&self) -> Result<HashSet<i64>, Error> {
        self.conn
            .call(|conn| -> Result<HashSet<i64>, Error> {
                let mut stmt = conn.prepare("SELECT bill_id FROM ls_ignore")?;
                let ids = stmt
                    .query_map([], |row| row.get::<_, i64>(0))?
                    .collect::<Result<HashSet<_>, _>>()?;
                Ok(ids)
            })
            .await
            .map_err(Error::from)
    }

    /// Monitored bills, ordered by bill id.
    pub async fn monitored_bills(&self) -> Result<Vec<MonitoredBill>, Error> {
        self.conn
            .call(|conn| -> Result<Vec<MonitoredBill>, Error> {
                let mut stmt = conn.prepare(
                    "SELECT m.bill_id, m.stance, s.state_abbr, b.change_hash
                     FROM ls_monitor m
                     LEFT JOIN ls_bill b ON b.bill_id = m.bill_id
                     LEFT JOIN ls_state s ON s.state_id = b.state_id
                     ORDER BY m.bill_id",
                )?;
                let bills = stmt
                    .query_map([], |row| {
                        Ok(MonitoredBill {
                            bill_id: row.get(0)?,
                            stance: Stance::from_i64(row.get(1)?),
                            state_abbr: row.get(2)?,
                            change_hash: row.get(3)?,
                        })
                    })?
                    .collect::<Result<Vec<_>, _>>()?;
                Ok(bills)
            })
            .await
            .map_err(Error::from)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_monitor_removes_ignore() {
        let db = StoreDb::open_in_memory().await.unwrap();
        db.ignore(10).await.unwrap();
        assert!(db.ignored_bills().await.unwrap().contains(&10));

        db.monitor(10, Stance::Support).await.unwrap();
        assert!(db.ignored_bills().await.unwrap().is_empty());

        let monitored = db.monitored_bills().await.unwrap();
        assert_eq!(monitored.len(), 1);
        assert_eq!(monitored[0].stance, Stance::Support);
        assert_eq!(monitored[0].state_abbr, None);
    }

    #[tokio::test]
    async fn test_ignore_removes_monitor() {
        let db = StoreDb::open_in_memory().await.unwrap();
        db.monitor(11, Stance::Watch).await.unwrap();
        db.ignore(11).await.unwrap();

        assert!(db.monitored_bills().await.unwrap().is_empty());
        assert!(db.unignore(11).await.unwrap());
        assert!(!db.unignore(11).await.unwrap());
    }

    #[tokio::test]
    async fn test_monitor_updates_stance() {
        let db = StoreDb::open_in_memory().await.unwrap();
        db.monitor(12, Stance::Watch).await.unwrap();
        db.monitor(12, Stance::Oppose).await.unwrap();

        let monitored = db.monitored_bills().await.unwrap();
        assert_eq!(monitored.len(), 1);
        assert_eq!(monitored[0].stance, Stance::Oppose);
        assert!(db.unmonitor(12).await.unwrap());
    }

    #[tokio::test]
    async fn test_monitored_joins_bill_state() {
        let db = StoreDb::open_in_memory().await.unwrap();
        db.conn
            .call(|conn| {
                conn.execute("INSERT INTO ls_bill (bill_id, state_id, change_hash) VALUES (13, 5, 'hhh')", [])
            })
            .await
            .unwrap();
        db.monitor(13, Stance::Watch).await.unwrap();

        let monitored = db.monitored_bills().await.unwrap();
        assert_eq!(monitored[0].state_abbr.as_deref(), Some("CA"));
        assert_eq!(monitored[0].change_hash.as_deref(), Some("hhh"));
    }
}
