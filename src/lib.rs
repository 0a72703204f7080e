#[macro_use]
extern crate diesel;

pub mod auth;
pub mod cache;
pub mod config;
pub mod error;
pub mod membership;
pub mod models;
mod query;
pub mod recipes;
pub mod routes;
mod schema;
pub mod seed;
pub mod shopping;
pub mod store;
pub mod views;
