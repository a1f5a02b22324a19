use crate::connect;
use migration::Migrator;
use sea_orm_migration::MigratorTrait;
use serial_test::serial;
use tempfile::tempdir;
use util::config::AppConfig;

#[tokio::test]
#[serial]
async fn connect_creates_database_directory() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("nested").join("results.db");
    AppConfig::set_database_path(path.to_string_lossy().to_string());

    let db = connect().await.unwrap();
    Migrator::up(&db, None).await.unwrap();
    assert!(path.exists());

    AppConfig::reset();
}
