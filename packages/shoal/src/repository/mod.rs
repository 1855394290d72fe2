// Repository layer — domain queries live in their own file with
// `impl MessageRepository`.

use sqlx::sqlite::SqlitePool;

mod messages;

#[cfg(test)]
pub(crate) mod test_helpers;

/// The durable, ordered message store. Append and read-all only: the log is
/// immutable once written.
#[derive(Clone)]
pub struct MessageRepository {
    pub(crate) pool: SqlitePool,
}

impl MessageRepository {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }
}
