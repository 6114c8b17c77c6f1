use std::marker::PhantomData;

use sea_orm::{DbConn, DbErr, EntityTrait, SqlErr};

use quill_core::error::RepoError;

/// PostgreSQL repository over a single SeaORM entity.
pub struct PostgresBaseRepository<E>
where
    E: EntityTrait,
{
    pub(crate) db: DbConn,
    _entity: PhantomData<E>,
}

impl<E> PostgresBaseRepository<E>
where
    E: EntityTrait,
{
    pub fn new(db: DbConn) -> Self {
        Self {
            db,
            _entity: PhantomData,
        }
    }

    #[cfg(test)]
    pub(crate) fn into_inner(self) -> DbConn {
        self.db
    }
}

/// Map a failed read.
pub(crate) fn query_error(err: DbErr) -> RepoError {
    match err {
        DbErr::Conn(e) => RepoError::Connection(e.to_string()),
        DbErr::ConnectionAcquire(e) => RepoError::Connection(e.to_string()),
        other => RepoError::Query(other.to_string()),
    }
}

/// Map a failed write, surfacing uniqueness violations as constraint errors.
pub(crate) fn write_error(err: DbErr) -> RepoError {
    if let Some(SqlErr::UniqueConstraintViolation(detail)) = err.sql_err() {
        return RepoError::Constraint(detail);
    }

    let err_str = err.to_string();
    if err_str.contains("duplicate") || err_str.contains("unique") {
        RepoError::Constraint(err_str)
    } else {
        query_error(err)
    }
}
