use crate::config::Config;
use crate::core::{self, GeocodingGateway, Indexer, Key, Mutex, PickupPointStore};
use crate::error::Error;
use crate::models::{Address, Coordinate, LocationQuery, LocationSource, PickupPoint, PickupPointCommand};
use actix_header::actix_header;
use actix_web::web::{Data, Header, Json, Query};
use actix_web::HttpResponse;
use serde::{Deserialize, Serialize};

#[actix_header("UID")]
pub struct UID(String);

impl From<String> for UID {
    fn from(s: String) -> Self {
        Self(s)
    }
}

impl From<UID> for String {
    fn from(u: UID) -> Self {
        u.0
    }
}

#[derive(Serialize)]
pub(crate) struct UserLocation {
    lat: f64,
    lon: f64,
    detected_address: Option<Address>,
    source: LocationSource,
}

#[derive(Serialize)]
pub(crate) struct PickupPointsResponse {
    user_location: UserLocation,
    pickup_points: Vec<PickupPoint>,
    search_expanded: bool,
}

pub(crate) async fn pickup_points<G, S>(Query(query): Query<LocationQuery>, gateway: Data<G>, store: Data<S>) -> Result<Json<PickupPointsResponse>, Error>
where
    G: GeocodingGateway + 'static,
    S: PickupPointStore + 'static,
{
    let found = core::find_pickup_points(gateway.get_ref(), store.get_ref(), &query).await?;
    let location = found.user_location;
    Ok(Json(PickupPointsResponse {
        user_location: UserLocation {
            lat: location.coordinate.latitude,
            lon: location.coordinate.longitude,
            detected_address: location.detected_address,
            source: location.source,
        },
        pickup_points: found.pickup_points,
        search_expanded: found.search_expanded,
    }))
}

#[derive(Deserialize)]
pub(crate) struct AddPickupPoint {
    latitude: f64,
    longitude: f64,
    name: String,
    #[serde(flatten)]
    extra: serde_json::Map<String, serde_json::Value>,
}

#[derive(Serialize)]
pub(crate) struct AddPickupPointResponse {
    id: String,
}

pub(crate) async fn add_pickup_point<K, I, M, S>(
    Header(UID(uid)): Header<UID>,
    Json(body): Json<AddPickupPoint>,
    indexer: Data<I>,
    mutex: Data<M>,
    store: Data<S>,
    config: Data<Config>,
) -> Result<HttpResponse, Error>
where
    K: Key + 'static,
    I: Indexer<K> + 'static,
    M: Mutex<K> + 'static,
    S: PickupPointStore + 'static,
{
    let fields = mongodb::bson::to_document(&body.extra).map_err(|e| Error::InvalidInput(e.to_string()))?;
    let point = PickupPointCommand {
        name: body.name,
        coordinate: Coordinate::new(body.latitude, body.longitude),
        registered_by: uid,
        fields,
    };
    let id = core::add_pickup_point(mutex.get_ref(), indexer.get_ref(), store.get_ref(), point, config.min_spacing_km).await?;
    Ok(HttpResponse::Created().json(AddPickupPointResponse { id }))
}
