use std::{fs, path::Path, process};
use util::config::AppConfig;

mod runner;

#[tokio::main]
async fn main() {
    let (db_path, url) = {
        let config = AppConfig::global();
        (config.database_path.clone(), config.database_url())
    };
    let args: Vec<String> = std::env::args().collect();

    let ok = match args.get(1).map(|s| s.as_str()) {
        Some("clean") => {
            remove_db_file(&db_path);
            true
        }
        Some("fresh") => {
            remove_db_file(&db_path);
            migrate(&db_path, &url).await
        }
        _ => migrate(&db_path, &url).await,
    };

    if !ok {
        process::exit(1);
    }
}

async fn migrate(db_path: &str, url: &str) -> bool {
    if let Err(e) = create_db_dir(db_path) {
        eprintln!("Failed to create DB directory: {e}");
        return false;
    }
    match runner::run_all_migrations(url).await {
        Ok(applied) => applied,
        Err(e) => {
            eprintln!("DB connection failed: {e}");
            false
        }
    }
}

fn remove_db_file(path: &str) {
    let db_path = Path::new(path);
    if !db_path.exists() {
        println!("DB file does not exist: {}", db_path.display());
        return;
    }
    match fs::remove_file(db_path) {
        Ok(()) => println!("Deleted DB: {}", db_path.display()),
        Err(e) => eprintln!("Failed to delete {}: {e}", db_path.display()),
    }
}

fn create_db_dir(path: &str) -> std::io::Result<()> {
    match Path::new(path).parent() {
        Some(parent) if !parent.as_os_str().is_empty() => fs::create_dir_all(parent),
        _ => Ok(()),
    }
}
