pub mod models;
pub mod repositories;
pub mod test_utils;

#[cfg(test)]
mod tests;

use sea_orm::{Database, DatabaseConnection, DbErr};
use std::path::Path;
use util::config::AppConfig;

/// Connects to the configured database. A plain `DATABASE_PATH` is treated as a
/// SQLite file whose parent directory is created if needed.
pub async fn connect() -> Result<DatabaseConnection, DbErr> {
    let (path_or_url, file_url) = {
        let config = AppConfig::global();
        (config.database_path.clone(), config.database_url())
    };
    let url = if path_or_url.starts_with("sqlite:") {
        path_or_url
    } else {
        if let Some(parent) = Path::new(&path_or_url).parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent).map_err(|e| DbErr::Custom(format!("cannot create {}: {e}", parent.display())))?;
            }
        }
        file_url
    };

    Database::connect(&url).await
}
