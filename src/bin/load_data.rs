//! Loads the ingredient catalog: `load-data [path]`.

use std::fs::File;
use std::io::{self, BufReader};
use std::process::ExitCode;

use foodgram::cache::CatalogCache;
use foodgram::config::Config;
use foodgram::seed;
use foodgram::store::MysqlStore;

fn main() -> ExitCode {
    dotenv::dotenv().ok();
    env_logger::init_from_env(env_logger::Env::new().default_filter_or("info"));

    match run() {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            log::error!("{}", err);
            ExitCode::FAILURE
        }
    }
}

fn run() -> Result<(), Box<dyn std::error::Error>> {
    let path = std::env::args()
        .nth(1)
        .unwrap_or_else(|| seed::DEFAULT_PATH.to_string());
    let config = Config::from_env()?;
    let store = MysqlStore::connect(&config.database_url, 1)?;

    let file = File::open(&path)
        .map_err(|err| io::Error::new(err.kind(), format!("{}: {}", path, err)))?;
    let report = seed::load(&store, BufReader::new(file))?;
    log::info!(
        "loaded {}: {} created, {} already present, {} skipped",
        path,
        report.created,
        report.existing,
        report.skipped
    );

    if let Some(redis_url) = &config.redis_url {
        match CatalogCache::connect(redis_url) {
            Ok(cache) => cache.invalidate(),
            Err(err) => log::warn!("could not invalidate ingredient cache: {}", err),
        }
    }
    Ok(())
}
