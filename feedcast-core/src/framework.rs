use sqlx::PgPool;

/// Runs relational queries against the shared connection pool.
///
/// Each query is a `kanau::processor::Processor` impl on this type.
#[derive(Debug, Clone)]
pub struct DatabaseProcessor {
    pub pool: PgPool,
}

impl DatabaseProcessor {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}
