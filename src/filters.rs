use crate::models::Coordinate;
use mongodb::bson::{doc, Bson, Document};

const METERS_PER_KM: f64 = 1000.0;

/// A single `(field, condition)` pair of a store query.
#[derive(Debug, Clone, PartialEq)]
pub(crate) enum Predicate {
    Eq(String, Bson),
    NearSphere { field: String, center: Coordinate, max_distance_km: f64 },
}

#[derive(Debug, Clone, Default, PartialEq)]
pub(crate) struct Filter {
    predicates: Vec<Predicate>,
}

pub(crate) fn geo_point(coordinate: Coordinate) -> Document {
    doc! {
        "type": "Point",
        "coordinates": [coordinate.longitude, coordinate.latitude],
    }
}

impl Filter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn eq(mut self, field: &str, value: impl Into<Bson>) -> Self {
        self.predicates.push(Predicate::Eq(field.to_owned(), value.into()));
        self
    }

    /// Nearest-first match on a GeoJSON point field backed by a 2dsphere index.
    pub fn near_sphere(mut self, field: &str, center: Coordinate, max_distance_km: f64) -> Self {
        self.predicates.push(Predicate::NearSphere {
            field: field.to_owned(),
            center,
            max_distance_km,
        });
        self
    }

    pub fn into_document(self) -> Document {
        let mut filter = Document::new();
        for predicate in self.predicates {
            match predicate {
                Predicate::Eq(field, value) => {
                    filter.insert(field, value);
                }
                Predicate::NearSphere {
                    field,
                    center,
                    max_distance_km,
                } => {
                    let max_distance_m = max_distance_km * METERS_PER_KM;
                    filter.insert(
                        field,
                        doc! {
                            "$nearSphere": {
                                "$geometry": geo_point(center),
                                "$maxDistance": max_distance_m,
                            }
                        },
                    );
                }
            }
        }
        filter
    }
}
