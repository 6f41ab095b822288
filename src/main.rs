mod config;
mod core;
mod error;
mod filters;
mod geocoders;
mod handlers;
mod indexers;
mod models;
mod mutexes;
mod persisters;
#[cfg(test)]
mod testing;

use crate::config::Config;
use crate::handlers::{add_pickup_point, pickup_points};
use actix_web::{
    self,
    middleware::Logger,
    web::{get, post, Data},
};
use anyhow::Context;
use geocoders::NominatimGeocoder;
use indexers::GridIndexer;
use log::info;
use mutexes::RedisMutex;
use persisters::MongoPersister;

#[actix_web::main]
async fn main() -> anyhow::Result<()> {
    dotenv::dotenv().ok();
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let config = Config::from_env()?;
    let gateway = NominatimGeocoder::new(&config.geocoder_url, &config.geocoder_user_agent, config.geocoder_timeout)?;
    let indexer = GridIndexer::new(config.grid_cell_deg)?;
    let mutex = RedisMutex::new(
        redis::Client::open(config.redis_url.as_str()).context("invalid redis url")?,
        config.lock_expire_secs,
        config.lock_timeout_secs,
    );
    let persister = MongoPersister::new(
        mongodb::Client::with_options(
            mongodb::options::ClientOptions::parse(&config.mongodb_uri)
                .await
                .context("invalid mongodb uri")?,
        )?
        .database(&config.mongodb_database),
        &config.pickup_point_collection,
    );
    persister.ensure_indexes().await.context("failed to create location index")?;

    info!("listening on {}", config.bind_addr);
    let bind_addr = config.bind_addr.clone();
    let config = Data::new(config);
    actix_web::HttpServer::new(move || {
        actix_web::App::new()
            .wrap(Logger::default())
            .route(
                "/pickup-points",
                get().to(pickup_points::<NominatimGeocoder, MongoPersister>),
            )
            .route(
                "/pickup-points",
                post().to(add_pickup_point::<String, GridIndexer, RedisMutex, MongoPersister>),
            )
            .app_data(Data::new(gateway.clone()))
            .app_data(Data::new(indexer))
            .app_data(Data::new(mutex.clone()))
            .app_data(Data::new(persister.clone()))
            .app_data(config.clone())
    })
    .bind(&bind_addr)
    .with_context(|| format!("failed to bind {}", bind_addr))?
    .run()
    .await?;
    Ok(())
}
