use crate::db::{DbPool, OrmConn};

/// Shared handles: the sqlx pool backs migrations, audit and auth queries,
/// the SeaORM connection backs the entity services.
#[derive(Clone)]
pub struct AppState {
    pub pool: DbPool,
    pub orm: OrmConn,
}

impl AppState {
    pub fn new(pool: DbPool, orm: OrmConn) -> Self {
        Self { pool, orm }
    }
}
