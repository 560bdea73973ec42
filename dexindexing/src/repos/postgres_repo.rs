mod migrations;
mod raw_queries;
mod rows;
mod session;

use diesel_async::pooled_connection::AsyncDieselConnectionManager;
use diesel_async::AsyncPgConnection;
use tracing::info;

pub use migrations::SQLikeMigrations;
pub use raw_queries::PostgresRepoRawQueryClient;
pub use session::PostgresSession;

use super::repo::{Repo, RepoError};

pub type Conn = bb8::PooledConnection<'static, AsyncDieselConnectionManager<AsyncPgConnection>>;
pub type Pool = bb8::Pool<AsyncDieselConnectionManager<AsyncPgConnection>>;

#[derive(Clone)]
pub struct PostgresRepo {
    url: String,
    pool: Pool,
}

impl std::fmt::Debug for PostgresRepo {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PostgresRepo").finish_non_exhaustive()
    }
}

impl PostgresRepo {
    /// Connects eagerly: a store that cannot be reached is reported here
    pub async fn new(url: &str) -> Result<Self, RepoError> {
        let manager = AsyncDieselConnectionManager::<AsyncPgConnection>::new(url);
        let pool = bb8::Pool::builder()
            .build(manager)
            .await
            .map_err(|error| RepoError::Unknown(error.to_string()))?;

        pool.get().await.map_err(|_| RepoError::NotConnected)?;

        Ok(Self {
            url: url.to_string(),
            pool,
        })
    }

    pub fn get_pool(&self) -> Pool {
        self.pool.clone()
    }
}

#[async_trait::async_trait]
impl Repo for PostgresRepo {
    type Session = PostgresSession;

    async fn migrate(&self, reset_schema: bool) -> Result<(), RepoError> {
        let client = self.get_raw_query_client().await?;

        if reset_schema {
            info!("Resetting the public schema");
            Self::execute_raw_queries(&client, SQLikeMigrations::reset_schema()).await?;
        }

        Self::execute_raw_queries(&client, &SQLikeMigrations::get_all()).await
    }

    async fn open_session(&self) -> Result<PostgresSession, RepoError> {
        let conn = self.pool.get_owned().await.map_err(|_| RepoError::NotConnected)?;

        PostgresSession::begin(conn).await
    }
}
