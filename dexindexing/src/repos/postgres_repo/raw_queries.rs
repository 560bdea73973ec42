use tokio_postgres::{types::ToSql, Client, NoTls};
use tracing::error;

use super::PostgresRepo;
use crate::repos::RepoError;

pub type PostgresRepoRawQueryClient = Client;

impl PostgresRepo {
    /// A plain client outside the pool, used for DDL
    pub async fn get_raw_query_client(&self) -> Result<PostgresRepoRawQueryClient, RepoError> {
        let (client, conn) = tokio_postgres::connect(&self.url, NoTls)
            .await
            .map_err(|_| RepoError::NotConnected)?;

        tokio::spawn(async move {
            if let Err(error) = conn.await {
                error!(%error, "Raw query connection failed");
            }
        });

        Ok(client)
    }

    pub async fn execute_raw_queries(
        client: &PostgresRepoRawQueryClient,
        queries: &[&str],
    ) -> Result<(), RepoError> {
        for query in queries {
            client
                .execute(*query, &[] as &[&(dyn ToSql + Sync)])
                .await
                .map_err(|error| RepoError::Query(error.to_string()))?;
        }

        Ok(())
    }
}
