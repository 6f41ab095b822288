use crate::error::Error;
use crate::models::{
    Address, Coordinate, LocationQuery, LocationSource, PickupPoint, PickupPointCommand, PickupPoints, ResolvedLocation,
    SearchOutcome,
};
use log::{debug, info, warn};
use std::fmt::Display;
use std::future::Future;
use std::pin::Pin;

pub(crate) const FALLBACK_COORDINATE: Coordinate = Coordinate::new(19.0760, 72.8777);

/// Radii tried after the requested one comes back empty.
pub(crate) const ESCALATION_RADII_KM: [f64; 2] = [20.0, 50.0];

pub(crate) fn fallback_address() -> Address {
    Address {
        city: Some("Mumbai".to_owned()),
        area: Some("Maharashtra (IP Detected)".to_owned()),
    }
}

pub(crate) trait Key: Display + Ord + Clone {}

impl Key for String {}

pub(crate) trait GeocodingGateway {
    fn geocode<'a>(&'a self, address: &'a str) -> Pin<Box<dyn Future<Output = Result<Option<Coordinate>, anyhow::Error>> + 'a>>;
    fn reverse_geocode<'a>(&'a self, coordinate: Coordinate) -> Pin<Box<dyn Future<Output = Result<Option<Address>, anyhow::Error>> + 'a>>;
}

pub(crate) trait PickupPointStore {
    fn query_within_radius<'a>(
        &'a self,
        center: Coordinate,
        radius_km: f64,
    ) -> Pin<Box<dyn Future<Output = Result<Vec<PickupPoint>, anyhow::Error>> + 'a>>;
    fn exists_within<'a>(&'a self, center: Coordinate, radius_km: f64) -> Pin<Box<dyn Future<Output = Result<bool, anyhow::Error>> + 'a>>;
    fn insert<'a>(&'a self, point: PickupPointCommand) -> Pin<Box<dyn Future<Output = Result<String, anyhow::Error>> + 'a>>;
}

pub(crate) trait Indexer<K> {
    fn index(&self, latitude: f64, longitude: f64) -> K;
    fn neighbors(&self, index: K, distance: f64) -> Vec<K>;
}

/// Locks over index keys. `multiple_acquire` hands back the token that must be
/// presented to release the same keys.
pub(crate) trait Mutex<K> {
    fn multiple_acquire<'a>(&'a self, keys: &'a [K]) -> Pin<Box<dyn Future<Output = Result<String, anyhow::Error>> + 'a>>
    where
        K: 'a;
    fn multiple_release<'a>(&'a self, keys: &'a [K], token: &'a str) -> Pin<Box<dyn Future<Output = Result<(), anyhow::Error>> + 'a>>
    where
        K: 'a;
}

async fn geocode<G: GeocodingGateway>(gateway: &G, address: &str) -> Result<Option<Coordinate>, Error> {
    gateway.geocode(address).await.map_err(|e| {
        warn!("geocoding {:?} failed: {:#}", address, e);
        Error::GatewayUnavailable(e)
    })
}

pub(crate) async fn resolve_location<G>(gateway: &G, query: &LocationQuery) -> Result<ResolvedLocation, Error>
where
    G: GeocodingGateway,
{
    if let Some(coordinate) = query.coordinate() {
        let detected_address = match gateway.reverse_geocode(coordinate).await {
            Ok(address) => address,
            Err(e) => {
                warn!("reverse geocoding ({}, {}) failed: {:#}", coordinate.latitude, coordinate.longitude, e);
                None
            }
        };
        info!("resolved location from gps ({}, {})", coordinate.latitude, coordinate.longitude);
        return Ok(ResolvedLocation {
            coordinate,
            detected_address,
            source: LocationSource::Gps,
        });
    }

    if let Some((city, area)) = query.city_and_area() {
        let coordinate = match geocode(gateway, &format!("{}, {}", area, city)).await? {
            Some(coordinate) => coordinate,
            None => {
                debug!("no match for {:?} in {:?}, retrying with city only", area, city);
                geocode(gateway, city).await?.ok_or(Error::AddressNotResolvable)?
            }
        };
        info!("resolved location from address {:?}, {:?}", area, city);
        return Ok(ResolvedLocation {
            coordinate,
            detected_address: None,
            source: LocationSource::Geocoded,
        });
    }

    info!("no location input, using fallback location");
    Ok(ResolvedLocation {
        coordinate: FALLBACK_COORDINATE,
        detected_address: Some(fallback_address()),
        source: LocationSource::Fallback,
    })
}

pub(crate) fn escalation_ladder(requested_radius: f64) -> Vec<f64> {
    let mut ladder = vec![requested_radius];
    ladder.extend(ESCALATION_RADII_KM.iter().copied().filter(|r| requested_radius < *r));
    ladder
}

/// Queries the store tier by tier, stopping at the first non-empty answer.
/// Tiers run one after another; a store failure at any tier fails the search.
/// A center off the globe is rejected before the store is asked.
pub(crate) async fn search_pickup_points<S>(store: &S, center: Coordinate, requested_radius: f64) -> Result<SearchOutcome, Error>
where
    S: PickupPointStore,
{
    if !center.is_valid() {
        return Err(Error::InvalidInput(format!(
            "cannot search around ({}, {}): coordinate out of range",
            center.latitude, center.longitude
        )));
    }
    let mut outcome = SearchOutcome {
        points: Vec::new(),
        radius_used: requested_radius,
        expanded: false,
    };
    for (tier, radius) in escalation_ladder(requested_radius).into_iter().enumerate() {
        let points = store.query_within_radius(center, radius).await.map_err(Error::Store)?;
        debug!("{} pickup points within {} km", points.len(), radius);
        outcome = SearchOutcome {
            points,
            radius_used: radius,
            expanded: tier > 0,
        };
        if !outcome.points.is_empty() {
            break;
        }
    }
    Ok(outcome)
}

pub(crate) async fn find_pickup_points<G, S>(gateway: &G, store: &S, query: &LocationQuery) -> Result<PickupPoints, Error>
where
    G: GeocodingGateway,
    S: PickupPointStore,
{
    if !query.radius.is_finite() || query.radius < 0.0 {
        return Err(Error::InvalidInput(format!("radius must be a non-negative number, got {}", query.radius)));
    }
    let user_location = resolve_location(gateway, query).await?;
    let outcome = search_pickup_points(store, user_location.coordinate, query.radius).await?;
    if outcome.expanded {
        info!("search expanded to {} km, found {} pickup points", outcome.radius_used, outcome.points.len());
    }
    Ok(PickupPoints {
        user_location,
        pickup_points: outcome.points,
        search_expanded: outcome.expanded,
    })
}

pub(crate) async fn add_pickup_point<M, I, S, K>(
    mutex: &M,
    indexer: &I,
    store: &S,
    point: PickupPointCommand,
    min_spacing: f64,
) -> Result<String, Error>
where
    M: Mutex<K>,
    I: Indexer<K>,
    S: PickupPointStore,
    K: Key,
{
    if !point.coordinate.is_valid() {
        return Err(Error::InvalidInput(format!(
            "coordinate out of range: ({}, {})",
            point.coordinate.latitude, point.coordinate.longitude
        )));
    }
    if point.name.trim().is_empty() {
        return Err(Error::InvalidInput("name must not be empty".to_owned()));
    }
    let idx = indexer.index(point.coordinate.latitude, point.coordinate.longitude);
    let mut neighbors = indexer.neighbors(idx, min_spacing);
    neighbors.sort();
    neighbors.dedup();
    let token = mutex.multiple_acquire(&neighbors).await.map_err(Error::Lock)?;
    debug!("locked {} cells for {:?}", neighbors.len(), point.name);
    let center = point.coordinate;
    let res = match store.exists_within(center, min_spacing).await {
        Ok(true) => Err(Error::DuplicatePickupPoint),
        Ok(false) => store.insert(point).await.map_err(Error::Store),
        Err(e) => Err(Error::Store(e)),
    };
    if let Err(e) = mutex.multiple_release(&neighbors, &token).await {
        warn!("failed to release pickup point locks: {:#}", e);
    }
    if let Ok(id) = &res {
        info!("registered pickup point {} at ({}, {})", id, center.latitude, center.longitude);
    }
    res
}
