use sqlx::PgPool;

use crate::services::{NoteQuery, NoteStore, UserService};

/// Shared handler state. The pool is reference-counted, so cloning is cheap.
#[derive(Clone)]
pub struct AppState {
    pub db: PgPool,
}

impl AppState {
    pub fn new(db: PgPool) -> Self {
        Self { db }
    }

    pub fn notes(&self) -> NoteStore {
        NoteStore::new(self.db.clone())
    }

    pub fn queries(&self) -> NoteQuery {
        NoteQuery::new(self.db.clone())
    }

    pub fn users(&self) -> UserService {
        UserService::new(self.db.clone())
    }
}
