use crate::core::GeocodingGateway;
use crate::models::{Address, Coordinate};
use anyhow::{Context, Error};
use serde::Deserialize;
use std::future::Future;
use std::pin::Pin;
use std::time::Duration;

/// Forward and reverse geocoding against a Nominatim-compatible HTTP API.
#[derive(Clone)]
pub(crate) struct NominatimGeocoder {
    client: reqwest::Client,
    base_url: String,
}

#[derive(Debug, Deserialize)]
struct SearchPlace {
    lat: String,
    lon: String,
}

impl SearchPlace {
    fn coordinate(&self) -> Result<Coordinate, Error> {
        let latitude = self.lat.parse().with_context(|| format!("invalid latitude {:?}", self.lat))?;
        let longitude = self.lon.parse().with_context(|| format!("invalid longitude {:?}", self.lon))?;
        Ok(Coordinate::new(latitude, longitude))
    }
}

#[derive(Debug, Default, Deserialize)]
struct ReversePlace {
    #[serde(default)]
    address: Option<PlaceAddress>,
    #[serde(default)]
    error: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
struct PlaceAddress {
    city: Option<String>,
    town: Option<String>,
    village: Option<String>,
    county: Option<String>,
    suburb: Option<String>,
    neighbourhood: Option<String>,
    state_district: Option<String>,
    state: Option<String>,
}

impl ReversePlace {
    fn into_address(self) -> Option<Address> {
        if self.error.is_some() {
            return None;
        }
        let a = self.address?;
        let city = a.city.or(a.town).or(a.village).or(a.county);
        let area = a.suburb.or(a.neighbourhood).or(a.state_district).or(a.state);
        if city.is_none() && area.is_none() {
            return None;
        }
        Some(Address { city, area })
    }
}

impl NominatimGeocoder {
    pub fn new(base_url: &str, user_agent: &str, timeout: Duration) -> Result<Self, Error> {
        let client = reqwest::Client::builder()
            .user_agent(user_agent)
            .timeout(timeout)
            .build()
            .context("failed to build geocoding http client")?;
        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_owned(),
        })
    }

    async fn search(&self, address: &str) -> Result<Option<Coordinate>, Error> {
        let places: Vec<SearchPlace> = self
            .client
            .get(format!("{}/search", self.base_url))
            .query(&[("q", address), ("format", "json"), ("limit", "1")])
            .send()
            .await
            .with_context(|| format!("failed to send geocoding request for {:?}", address))?
            .error_for_status()?
            .json()
            .await
            .with_context(|| format!("failed to parse geocoding response for {:?}", address))?;
        places.first().map(SearchPlace::coordinate).transpose()
    }

    async fn reverse(&self, coordinate: Coordinate) -> Result<Option<Address>, Error> {
        let place: ReversePlace = self
            .client
            .get(format!("{}/reverse", self.base_url))
            .query(&[
                ("lat", coordinate.latitude.to_string()),
                ("lon", coordinate.longitude.to_string()),
                ("format", "json".to_owned()),
            ])
            .send()
            .await
            .context("failed to send reverse geocoding request")?
            .error_for_status()?
            .json()
            .await
            .context("failed to parse reverse geocoding response")?;
        Ok(place.into_address())
    }
}

impl GeocodingGateway for NominatimGeocoder {
    fn geocode<'a>(&'a self, address: &'a str) -> Pin<Box<dyn Future<Output = Result<Option<Coordinate>, Error>> + 'a>> {
        Box::pin(self.search(address))
    }

    fn reverse_geocode<'a>(&'a self, coordinate: Coordinate) -> Pin<Box<dyn Future<Output = Result<Option<Address>, Error>> + 'a>> {
        Box::pin(self.reverse(coordinate))
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::core::resolve_location;
    use crate::error::Error as ResolveError;
    use crate::models::LocationQuery;
    use serde_json::json;
    use wiremock::matchers::{method, path, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn geocoder(base_url: &str) -> NominatimGeocoder {
        NominatimGeocoder::new(base_url, "educycle-test/0.1", Duration::from_secs(5)).unwrap()
    }

    fn kothrud() -> LocationQuery {
        LocationQuery {
            city: Some("Pune".into()),
            area: Some("Kothrud".into()),
            ..Default::default()
        }
    }

    #[tokio::test]
    async fn test_search_sends_address_query() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/search"))
            .and(query_param("q", "Kothrud, Pune"))
            .and(query_param("format", "json"))
            .and(query_param("limit", "1"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!([{"lat": "18.5074", "lon": "73.8077"}])))
            .expect(1)
            .mount(&server)
            .await;

        let found = geocoder(&server.uri()).geocode("Kothrud, Pune").await.unwrap();
        assert_eq!(found, Some(Coordinate::new(18.5074, 73.8077)));
    }

    #[tokio::test]
    async fn test_search_without_match_is_none() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/search"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!([])))
            .mount(&server)
            .await;

        assert_eq!(geocoder(&server.uri()).geocode("Nowhere").await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_error_status_is_gateway_unavailable() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/search"))
            .respond_with(ResponseTemplate::new(503))
            .expect(1)
            .mount(&server)
            .await;

        let err = resolve_location(&geocoder(&server.uri()), &kothrud()).await.unwrap_err();
        assert!(matches!(err, ResolveError::GatewayUnavailable(_)));
    }

    #[tokio::test]
    async fn test_transport_failure_is_gateway_unavailable() {
        let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
        let addr = listener.local_addr().unwrap();
        drop(listener);

        let err = resolve_location(&geocoder(&format!("http://{}", addr)), &kothrud()).await.unwrap_err();
        assert!(matches!(err, ResolveError::GatewayUnavailable(_)));
    }

    #[tokio::test]
    async fn test_reverse_sends_coordinate() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/reverse"))
            .and(query_param("lat", "18.5074"))
            .and(query_param("lon", "73.8077"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({"address": {"city": "Pune", "suburb": "Kothrud"}})))
            .mount(&server)
            .await;

        let address = geocoder(&format!("{}/", server.uri()))
            .reverse_geocode(Coordinate::new(18.5074, 73.8077))
            .await
            .unwrap();
        assert_eq!(
            address,
            Some(Address {
                city: Some("Pune".into()),
                area: Some("Kothrud".into()),
            })
        );
    }

    #[test]
    fn test_search_place_coordinate() {
        let places: Vec<SearchPlace> =
            serde_json::from_str(r#"[{"place_id": 1, "lat": "18.5074", "lon": "73.8077", "display_name": "Kothrud, Pune"}]"#).unwrap();
        assert_eq!(places[0].coordinate().unwrap(), Coordinate::new(18.5074, 73.8077));
    }

    #[test]
    fn test_search_place_garbage() {
        let place = SearchPlace {
            lat: "north".into(),
            lon: "73.8".into(),
        };
        assert!(place.coordinate().is_err());
    }

    #[test]
    fn test_reverse_prefers_city_and_suburb() {
        let place: ReversePlace = serde_json::from_str(
            r#"{"address": {"suburb": "Kothrud", "city": "Pune", "state": "Maharashtra", "country": "India"}}"#,
        )
        .unwrap();
        assert_eq!(
            place.into_address(),
            Some(Address {
                city: Some("Pune".into()),
                area: Some("Kothrud".into()),
            })
        );
    }

    #[test]
    fn test_reverse_falls_back_to_town_and_state() {
        let place: ReversePlace = serde_json::from_str(r#"{"address": {"town": "Lonavala", "state": "Maharashtra"}}"#).unwrap();
        assert_eq!(
            place.into_address(),
            Some(Address {
                city: Some("Lonavala".into()),
                area: Some("Maharashtra".into()),
            })
        );
    }

    #[test]
    fn test_reverse_error() {
        let place: ReversePlace = serde_json::from_str(r#"{"error": "Unable to geocode"}"#).unwrap();
        assert_eq!(place.into_address(), None);
        assert_eq!(ReversePlace::default().into_address(), None);
    }
}
