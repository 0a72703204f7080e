use std::ops::DerefMut;
use std::time::Duration;

use diesel::r2d2;
use r2d2_redis::redis::{Commands, RedisError};
use r2d2_redis::RedisConnectionManager;

use crate::models::Ingredient;

pub type RedisPool = r2d2::Pool<RedisConnectionManager>;

const CACHE_POOL_MAX_OPEN: u32 = 16;
const CACHE_POOL_MIN_IDLE: u32 = 8;
const CACHE_POOL_EXPIRE_SECONDS: u64 = 60;

const ALL_INGREDIENTS_KEY: &str = "ingredients:all";

#[derive(Debug, thiserror::Error)]
pub enum CacheError {
    #[error("redis: {0}")]
    Redis(#[from] RedisError),
    #[error("redis pool: {0}")]
    Pool(#[from] r2d2::PoolError),
}

/// Read-through cache for the ingredient catalog. The catalog is seed data,
/// so the whole list lives under one key until the next seeding run.
/// Failures are logged and treated as a miss; the database stays the source
/// of truth.
#[derive(Clone, Default)]
pub struct CatalogCache {
    pool: Option<RedisPool>,
}

impl CatalogCache {
    pub fn disabled() -> Self {
        Self { pool: None }
    }

    pub fn connect(redis_url: &str) -> Result<Self, CacheError> {
        let manager = RedisConnectionManager::new(redis_url)?;
        let pool = r2d2::Pool::builder()
            .max_size(CACHE_POOL_MAX_OPEN)
            .max_lifetime(Some(Duration::from_secs(CACHE_POOL_EXPIRE_SECONDS)))
            .min_idle(Some(CACHE_POOL_MIN_IDLE))
            .build(manager)?;
        Ok(Self { pool: Some(pool) })
    }

    pub fn is_enabled(&self) -> bool {
        self.pool.is_some()
    }

    pub fn load(&self) -> Option<Vec<Ingredient>> {
        let pool = self.pool.as_ref()?;
        let mut redis_conn = pool
            .get()
            .map_err(|err| log::warn!("catalog cache unavailable: {}", err))
            .ok()?;
        let redis_conn = redis_conn.deref_mut();
        let value: Vec<u8> = redis_conn
            .get(ALL_INGREDIENTS_KEY)
            .map_err(|err| log::warn!("catalog cache read failed: {}", err))
            .ok()?;
        //a missing key reads back as an empty value
        if value.is_empty() {
            return None;
        }
        match Ingredient::list_from_u8(&value) {
            Ok(ingredients) => Some(ingredients),
            Err(err) => {
                log::warn!("dropping unreadable catalog cache entry: {}", err);
                self.invalidate();
                None
            }
        }
    }

    pub fn store(&self, ingredients: &[Ingredient]) {
        let pool = match &self.pool {
            Some(pool) => pool,
            None => return,
        };
        let value = match Ingredient::list_to_u8(ingredients) {
            Ok(value) => value,
            Err(err) => {
                log::warn!("could not encode catalog for caching: {}", err);
                return;
            }
        };
        let written = pool
            .get()
            .map_err(CacheError::from)
            .and_then(|mut redis_conn| {
                let redis_conn = redis_conn.deref_mut();
                redis_conn
                    .set::<_, _, ()>(ALL_INGREDIENTS_KEY, value)
                    .map_err(CacheError::from)
            });
        if let Err(err) = written {
            log::warn!("catalog cache write failed: {}", err);
        }
    }

    pub fn invalidate(&self) {
        let pool = match &self.pool {
            Some(pool) => pool,
            None => return,
        };
        let removed = pool
            .get()
            .map_err(CacheError::from)
            .and_then(|mut redis_conn| {
                let redis_conn = redis_conn.deref_mut();
                redis_conn
                    .del::<_, ()>(ALL_INGREDIENTS_KEY)
                    .map_err(CacheError::from)
            });
        if let Err(err) = removed {
            log::warn!("catalog cache invalidation failed: {}", err);
        }
    }
}
