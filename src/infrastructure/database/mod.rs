pub mod connection_pool;
pub mod sqlite_backend;

pub use connection_pool::ConnectionPool;
pub use sqlite_backend::SqliteBackend;
