mod memory_repo;
#[cfg(feature = "postgres")]
mod postgres_repo;
mod repo;

pub use memory_repo::{MemoryRepo, MemorySession};
#[cfg(feature = "postgres")]
pub use postgres_repo::{
    Conn as PostgresRepoConn, Pool as PostgresRepoPool, PostgresRepo, PostgresRepoRawQueryClient,
    PostgresSession, SQLikeMigrations,
};
pub use repo::{Repo, RepoError, RepoSession};
