use crate::core::PickupPointStore;
use crate::filters::{geo_point, Filter};
use crate::models::*;
use anyhow::Error;
use futures::TryStreamExt;
use mongodb::bson::{doc, Bson, DateTime, Document};
use mongodb::IndexModel;
use std::future::Future;
use std::pin::Pin;

const LOCATION_FIELD: &str = "location";

#[derive(Clone)]
pub(crate) struct MongoPersister {
    coll: mongodb::Collection<Document>,
}

impl MongoPersister {
    pub fn new(db: mongodb::Database, collection: &str) -> Self {
        Self {
            coll: db.collection(collection),
        }
    }

    pub async fn ensure_indexes(&self) -> Result<(), Error> {
        let index = IndexModel::builder().keys(doc! { "location": "2dsphere" }).build();
        self.coll.create_index(index, None).await?;
        Ok(())
    }
}

fn active_near(center: Coordinate, radius_km: f64) -> Document {
    Filter::new()
        .eq("active", true)
        .near_sphere(LOCATION_FIELD, center, radius_km)
        .into_document()
}

fn as_f64(value: &Bson) -> Option<f64> {
    match value {
        Bson::Double(v) => Some(*v),
        Bson::Int32(v) => Some(*v as f64),
        Bson::Int64(v) => Some(*v as f64),
        _ => None,
    }
}

/// Splits a stored document into id, coordinate and the untouched remainder.
fn into_pickup_point(mut doc: Document) -> Result<PickupPoint, Error> {
    let id = match doc.remove("_id") {
        Some(Bson::ObjectId(oid)) => oid.to_hex(),
        Some(Bson::String(s)) => s,
        Some(other) => other.to_string(),
        None => return Err(Error::msg("pickup point without _id")),
    };
    let coordinates = match doc.remove(LOCATION_FIELD) {
        Some(Bson::Document(location)) => location.get_array("coordinates")?.iter().map(as_f64).collect::<Option<Vec<f64>>>(),
        _ => None,
    };
    match coordinates.as_deref() {
        Some([longitude, latitude]) => Ok(PickupPoint {
            id,
            coordinate: Coordinate::new(*latitude, *longitude),
            fields: doc,
        }),
        _ => Err(Error::msg(format!("pickup point {} has no valid location", id))),
    }
}

fn into_document(point: PickupPointCommand) -> Document {
    let mut doc = point.fields;
    doc.insert("name", point.name);
    doc.insert(LOCATION_FIELD, geo_point(point.coordinate));
    doc.insert("registered_by", point.registered_by);
    doc.insert("registered_at", DateTime::from_millis(chrono::Utc::now().timestamp_millis()));
    doc.insert("active", true);
    doc
}

impl PickupPointStore for MongoPersister {
    fn query_within_radius<'a>(
        &'a self,
        center: Coordinate,
        radius_km: f64,
    ) -> Pin<Box<dyn Future<Output = Result<Vec<PickupPoint>, Error>> + 'a>> {
        Box::pin(async move {
            let cursor = self.coll.find(active_near(center, radius_km), None).await?;
            let docs: Vec<Document> = cursor.try_collect().await?;
            docs.into_iter().map(into_pickup_point).collect()
        })
    }

    fn exists_within<'a>(&'a self, center: Coordinate, radius_km: f64) -> Pin<Box<dyn Future<Output = Result<bool, Error>> + 'a>> {
        Box::pin(async move {
            let found = self.coll.find_one(active_near(center, radius_km), None).await?;
            Ok(found.is_some())
        })
    }

    fn insert<'a>(&'a self, point: PickupPointCommand) -> Pin<Box<dyn Future<Output = Result<String, Error>> + 'a>> {
        Box::pin(async move {
            let res = self.coll.insert_one(into_document(point), None).await?;
            match res.inserted_id {
                Bson::ObjectId(oid) => Ok(oid.to_hex()),
                other => Ok(other.to_string()),
            }
        })
    }
}
