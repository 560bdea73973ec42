use crate::db;
use dexindexing::{PostgresRepo, Repo};
use dotenvy::dotenv;
use std::env;
use std::future::Future;
use tokio::sync::OnceCell;

static MIGRATED: OnceCell<()> = OnceCell::const_new();

/// Tests share one database and commit for real, so every fixture they
/// merge carries random keys.
pub async fn run_test<TestFn, Fut>(test_fn: TestFn)
where
    TestFn: FnOnce(PostgresRepo) -> Fut,
    Fut: Future<Output = ()>,
{
    if should_setup_test_db() {
        db::setup();
    }

    let repo = new_repo().await;
    MIGRATED.get_or_init(|| async { repo.migrate(false).await.unwrap() }).await;

    test_fn(repo).await;
}

async fn new_repo() -> PostgresRepo {
    PostgresRepo::new(db::database_url().as_str()).await.unwrap()
}

fn should_setup_test_db() -> bool {
    dotenv().ok();

    env::var("SETUP_TEST_DB").is_ok()
}
