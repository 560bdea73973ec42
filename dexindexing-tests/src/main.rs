use dexindexing::{PostgresRepo, Repo};
use dexindexing_tests::db;
use tracing_subscriber::filter::EnvFilter;

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt().with_env_filter(EnvFilter::from_default_env()).init();

    db::setup();
    let repo = PostgresRepo::new(db::database_url().as_str()).await.unwrap();
    repo.migrate(true).await.unwrap();
}
