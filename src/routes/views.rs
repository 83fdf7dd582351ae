use serde::Serialize;

use crate::models::trip::Trip;

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TripView {
    pub id: i64,
    #[serde(rename = "destino")]
    pub destination: String,
    #[serde(rename = "detalhes")]
    pub details: String,
    pub rating: f64,
    /// Comma-joined absolute photo URLs, in upload order.
    #[serde(rename = "fotos")]
    pub photos: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct TripListView {
    #[serde(rename = "viagem")]
    pub trips: Vec<TripView>,
}

#[derive(Debug, Clone, Serialize)]
pub struct MessageView {
    pub message: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct DeletedView {
    pub id: i64,
}

pub fn present_trip(trip: &Trip) -> TripView {
    TripView {
        id: trip.id,
        destination: trip.destination.clone(),
        details: trip.details.clone(),
        rating: trip.rating,
        photos: trip
            .photos
            .iter()
            .map(|photo| photo.url.as_str())
            .collect::<Vec<_>>()
            .join(","),
    }
}

pub fn present_trips(trips: &[Trip]) -> TripListView {
    TripListView {
        trips: trips.iter().map(present_trip).collect(),
    }
}
