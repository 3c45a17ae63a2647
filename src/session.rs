//! Active-tenant session. Every data operation takes the session explicitly
//! instead of reading ambient state; the selection itself is persisted in
//! the store's settings table so it survives a restart.

use crate::db::Db;
use crate::error::{Error, Result};

const SELECTED_COMPANY_KEY: &str = "selected_company_id";

/// The currently selected company. Immutable once constructed; switching
/// companies produces a new session.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Session {
    pub company_id: i64,
}

impl Session {
    /// Select a company and persist the choice.
    pub fn select(db: &Db, company_id: i64) -> Result<Session> {
        let known = db.list_companies()?.iter().any(|c| c.id == company_id);
        if !known {
            return Err(Error::Store(format!("Company {} not found", company_id)));
        }
        db.set_setting(SELECTED_COMPANY_KEY, &company_id.to_string())?;
        Ok(Session { company_id })
    }

    /// Restore the persisted selection, falling back to the first company.
    /// Returns `None` when no companies exist yet.
    pub fn restore(db: &Db) -> Result<Option<Session>> {
        let companies = db.list_companies()?;
        if companies.is_empty() {
            return Ok(None);
        }
        let saved = db
            .get_setting(SELECTED_COMPANY_KEY)?
            .and_then(|v| v.parse::<i64>().ok());
        let company_id = match saved {
            Some(id) if companies.iter().any(|c| c.id == id) => id,
            _ => companies[0].id,
        };
        Ok(Some(Session { company_id }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn restore_prefers_saved_selection() {
        let db = Db::open_in_memory().unwrap();
        let first = db.create_company("First", None, "CNY").unwrap();
        let second = db.create_company("Second", None, "CNY").unwrap();

        assert_eq!(Session::restore(&db).unwrap().unwrap().company_id, first);

        Session::select(&db, second).unwrap();
        assert_eq!(Session::restore(&db).unwrap().unwrap().company_id, second);
    }

    #[test]
    fn restore_falls_back_when_saved_company_is_gone() {
        let db = Db::open_in_memory().unwrap();
        let first = db.create_company("First", None, "CNY").unwrap();
        db.set_setting("selected_company_id", "999").unwrap();
        assert_eq!(Session::restore(&db).unwrap().unwrap().company_id, first);
    }

    #[test]
    fn selecting_an_unknown_company_fails() {
        let db = Db::open_in_memory().unwrap();
        assert!(Session::select(&db, 42).is_err());
        assert!(Session::restore(&db).unwrap().is_none());
    }
}
