use ticketry_core::store::StoreError;

pub mod json;
pub mod sqlite;

pub use json::JsonTicketStore;
pub use sqlite::SqliteTicketStore;

fn map_sqlx(error: sqlx::Error) -> StoreError {
    StoreError::Backend(error.to_string())
}
