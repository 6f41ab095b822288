//! In-memory collaborators for unit tests.

use crate::core::{GeocodingGateway, Indexer, Mutex, PickupPointStore};
use crate::models::{Address, Coordinate, PickupPoint, PickupPointCommand};
use anyhow::Error;
use mongodb::bson::doc;
use std::cell::RefCell;
use std::collections::{BTreeSet, HashMap};
use std::future::Future;
use std::pin::Pin;

pub(crate) fn point(id: &str) -> PickupPoint {
    PickupPoint {
        id: id.to_owned(),
        coordinate: Coordinate::new(19.0, 72.8),
        fields: doc! { "name": format!("NGO {}", id) },
    }
}

#[derive(Default)]
pub(crate) struct FakeGateway {
    answers: HashMap<String, Coordinate>,
    unavailable: bool,
    failing: Vec<String>,
    reverse: Option<Address>,
    reverse_fails: bool,
    calls: RefCell<Vec<String>>,
}

impl FakeGateway {
    pub fn with_answer(mut self, address: &str, coordinate: Coordinate) -> Self {
        self.answers.insert(address.to_owned(), coordinate);
        self
    }

    pub fn with_reverse(mut self, address: Address) -> Self {
        self.reverse = Some(address);
        self
    }

    pub fn unavailable(mut self) -> Self {
        self.unavailable = true;
        self
    }

    /// Fails only when asked for `address`.
    pub fn failing_for(mut self, address: &str) -> Self {
        self.failing.push(address.to_owned());
        self
    }

    pub fn reverse_fails(mut self) -> Self {
        self.reverse_fails = true;
        self
    }

    pub fn geocoded(&self) -> Vec<String> {
        self.calls.borrow().clone()
    }
}

impl GeocodingGateway for FakeGateway {
    fn geocode<'a>(&'a self, address: &'a str) -> Pin<Box<dyn Future<Output = Result<Option<Coordinate>, Error>> + 'a>> {
        Box::pin(async move {
            self.calls.borrow_mut().push(address.to_owned());
            if self.unavailable {
                return Err(Error::msg("connection refused"));
            }
            if self.failing.iter().any(|a| a == address) {
                return Err(Error::msg("down"));
            }
            Ok(self.answers.get(address).copied())
        })
    }

    fn reverse_geocode<'a>(&'a self, _coordinate: Coordinate) -> Pin<Box<dyn Future<Output = Result<Option<Address>, Error>> + 'a>> {
        Box::pin(async move {
            if self.reverse_fails {
                return Err(Error::msg("reverse lookup timed out"));
            }
            Ok(self.reverse.clone())
        })
    }
}

#[derive(Default)]
pub(crate) struct FakeStore {
    tiers: Vec<(f64, Vec<PickupPoint>)>,
    failing_at: Option<f64>,
    existing: bool,
    queries: RefCell<Vec<(Coordinate, f64)>>,
    inserted: RefCell<Vec<PickupPointCommand>>,
}

impl FakeStore {
    pub fn with_tier(mut self, radius: f64, points: Vec<PickupPoint>) -> Self {
        self.tiers.push((radius, points));
        self
    }

    pub fn failing_at(mut self, radius: f64) -> Self {
        self.failing_at = Some(radius);
        self
    }

    pub fn with_existing(mut self) -> Self {
        self.existing = true;
        self
    }

    pub fn queried(&self) -> Vec<f64> {
        self.queries.borrow().iter().map(|(_, r)| *r).collect()
    }

    pub fn centers(&self) -> Vec<Coordinate> {
        self.queries.borrow().iter().map(|(c, _)| *c).collect()
    }

    pub fn inserted(&self) -> Vec<PickupPointCommand> {
        self.inserted.borrow().clone()
    }
}

impl PickupPointStore for FakeStore {
    fn query_within_radius<'a>(
        &'a self,
        center: Coordinate,
        radius_km: f64,
    ) -> Pin<Box<dyn Future<Output = Result<Vec<PickupPoint>, Error>> + 'a>> {
        Box::pin(async move {
            self.queries.borrow_mut().push((center, radius_km));
            if self.failing_at == Some(radius_km) {
                return Err(Error::msg("store offline"));
            }
            Ok(self
                .tiers
                .iter()
                .find(|(r, _)| *r == radius_km)
                .map(|(_, points)| points.clone())
                .unwrap_or_default())
        })
    }

    fn exists_within<'a>(&'a self, _center: Coordinate, _radius_km: f64) -> Pin<Box<dyn Future<Output = Result<bool, Error>> + 'a>> {
        Box::pin(async move { Ok(self.existing) })
    }

    fn insert<'a>(&'a self, point: PickupPointCommand) -> Pin<Box<dyn Future<Output = Result<String, Error>> + 'a>> {
        Box::pin(async move {
            let mut inserted = self.inserted.borrow_mut();
            inserted.push(point);
            Ok(format!("generated-{}", inserted.len()))
        })
    }
}

pub(crate) struct FakeIndexer;

impl Indexer<String> for FakeIndexer {
    fn index(&self, latitude: f64, longitude: f64) -> String {
        format!("{}:{}", latitude as i64, longitude as i64)
    }

    fn neighbors(&self, index: String, _distance: f64) -> Vec<String> {
        vec![index.clone(), "cell".to_owned(), index]
    }
}

#[derive(Default)]
pub(crate) struct FakeMutex {
    acquired: RefCell<Vec<String>>,
    held: RefCell<BTreeSet<String>>,
}

impl FakeMutex {
    pub fn acquired(&self) -> Vec<String> {
        self.acquired.borrow().clone()
    }

    pub fn held(&self) -> BTreeSet<String> {
        self.held.borrow().clone()
    }
}

impl Mutex<String> for FakeMutex {
    fn multiple_acquire<'a>(&'a self, keys: &'a [String]) -> Pin<Box<dyn Future<Output = Result<String, Error>> + 'a>>
    where
        String: 'a,
    {
        Box::pin(async move {
            for key in keys {
                self.acquired.borrow_mut().push(key.clone());
                self.held.borrow_mut().insert(key.clone());
            }
            Ok("token".to_owned())
        })
    }

    fn multiple_release<'a>(&'a self, keys: &'a [String], _token: &'a str) -> Pin<Box<dyn Future<Output = Result<(), Error>> + 'a>>
    where
        String: 'a,
    {
        Box::pin(async move {
            for key in keys {
                self.held.borrow_mut().remove(key);
            }
            Ok(())
        })
    }
}
