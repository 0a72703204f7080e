use std::io;
use std::sync::Arc;

use actix_web::{middleware, web, App, HttpServer};

use foodgram::cache::CatalogCache;
use foodgram::config::Config;
use foodgram::routes;
use foodgram::store::{MysqlStore, Store};
use foodgram::views::Paging;

#[actix_web::main]
async fn main() -> io::Result<()> {
    dotenv::dotenv().ok();
    env_logger::init_from_env(env_logger::Env::new().default_filter_or("info"));

    let config = Config::from_env().map_err(|err| io::Error::new(io::ErrorKind::Other, err))?;

    // set up database connection pool
    let store = MysqlStore::connect(&config.database_url, config.db_pool_size)
        .map_err(|err| io::Error::new(io::ErrorKind::Other, err))?;
    let store: Arc<dyn Store> = Arc::new(store);
    let store = web::Data::from(store);

    let cache = match &config.redis_url {
        Some(redis_url) => CatalogCache::connect(redis_url).unwrap_or_else(|err| {
            log::warn!("ingredient cache disabled: {}", err);
            CatalogCache::disabled()
        }),
        None => {
            log::info!("REDIS_URL not set, ingredient cache disabled");
            CatalogCache::disabled()
        }
    };
    let cache = web::Data::new(cache);
    let paging = web::Data::new(Paging {
        page_size: config.page_size.max(1),
    });

    log::info!(
        "starting HTTP server at http://{}:{}",
        config.bind_addr,
        config.port
    );

    // Start HTTP server
    HttpServer::new(move || {
        App::new()
            .app_data(store.clone())
            .app_data(cache.clone())
            .app_data(paging.clone())
            .wrap(middleware::Logger::default())
            .configure(routes::configure)
    })
    .bind((config.bind_addr.as_str(), config.port))?
    .run()
    .await
}
