use anyhow::{Context, Error};
use std::str::FromStr;
use std::time::Duration;

#[derive(Debug, Clone, PartialEq)]
pub(crate) struct Config {
    pub bind_addr: String,
    pub mongodb_uri: String,
    pub mongodb_database: String,
    pub pickup_point_collection: String,
    pub redis_url: String,
    pub geocoder_url: String,
    pub geocoder_user_agent: String,
    pub geocoder_timeout: Duration,
    pub lock_expire_secs: usize,
    pub lock_timeout_secs: usize,
    /// Minimum distance in km between two registered pickup points.
    pub min_spacing_km: f64,
    pub grid_cell_deg: f64,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            bind_addr: "0.0.0.0:8000".to_owned(),
            mongodb_uri: "mongodb://localhost".to_owned(),
            mongodb_database: "educycle".to_owned(),
            pickup_point_collection: "ngos".to_owned(),
            redis_url: "redis://localhost".to_owned(),
            geocoder_url: "https://nominatim.openstreetmap.org".to_owned(),
            geocoder_user_agent: "educycle-pickup/0.1".to_owned(),
            geocoder_timeout: Duration::from_secs(10),
            lock_expire_secs: 60,
            lock_timeout_secs: 5,
            min_spacing_km: 0.05,
            grid_cell_deg: 0.01,
        }
    }
}

fn parse_or<T, F>(lookup: &F, name: &str, default: T) -> Result<T, Error>
where
    T: FromStr,
    T::Err: std::error::Error + Send + Sync + 'static,
    F: Fn(&str) -> Option<String>,
{
    match lookup(name) {
        Some(raw) => raw.trim().parse().with_context(|| format!("invalid value for {}: {:?}", name, raw)),
        None => Ok(default),
    }
}

impl Config {
    pub fn from_env() -> Result<Self, Error> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    pub fn from_lookup<F>(lookup: F) -> Result<Self, Error>
    where
        F: Fn(&str) -> Option<String>,
    {
        let d = Self::default();
        Ok(Self {
            bind_addr: lookup("BIND_ADDR").unwrap_or(d.bind_addr),
            mongodb_uri: lookup("MONGODB_URI").unwrap_or(d.mongodb_uri),
            mongodb_database: lookup("MONGODB_DATABASE").unwrap_or(d.mongodb_database),
            pickup_point_collection: lookup("PICKUP_POINT_COLLECTION").unwrap_or(d.pickup_point_collection),
            redis_url: lookup("REDIS_URL").unwrap_or(d.redis_url),
            geocoder_url: lookup("GEOCODER_URL").unwrap_or(d.geocoder_url),
            geocoder_user_agent: lookup("GEOCODER_USER_AGENT").unwrap_or(d.geocoder_user_agent),
            geocoder_timeout: Duration::from_secs(parse_or(&lookup, "GEOCODER_TIMEOUT_SECS", d.geocoder_timeout.as_secs())?),
            lock_expire_secs: parse_or(&lookup, "LOCK_EXPIRE_SECS", d.lock_expire_secs)?,
            lock_timeout_secs: parse_or(&lookup, "LOCK_TIMEOUT_SECS", d.lock_timeout_secs)?,
            min_spacing_km: parse_or(&lookup, "MIN_SPACING_KM", d.min_spacing_km)?,
            grid_cell_deg: parse_or(&lookup, "GRID_CELL_DEG", d.grid_cell_deg)?,
        })
    }
}
