use chrono::{DateTime, Utc};
use sqlx::FromRow;

#[derive(Debug, Clone, FromRow)]
pub struct Trip {
    #[sqlx(rename = "pk_viagem")]
    pub id: i64,
    #[sqlx(rename = "destino")]
    pub destination: String,
    #[sqlx(rename = "detalhes")]
    pub details: String,
    pub rating: f64,
    #[sqlx(rename = "data_insercao")]
    pub inserted_at: DateTime<Utc>,
    #[sqlx(skip)]
    pub photos: Vec<TripPhoto>,
}

impl Trip {
    pub fn photo_filenames(&self) -> Vec<String> {
        self.photos.iter().map(|p| p.filename.clone()).collect()
    }
}

#[derive(Debug, Clone, FromRow)]
pub struct TripPhoto {
    pub viagem_id: i64,
    pub position: i64,
    pub filename: String,
    pub url: String,
}

/// A stored file plus the public URL it is reachable under.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewPhoto {
    pub filename: String,
    pub url: String,
}

#[derive(Debug, Clone)]
pub struct NewTrip {
    pub destination: String,
    pub details: String,
    pub rating: f64,
    pub photos: Vec<NewPhoto>,
    pub inserted_at: Option<DateTime<Utc>>,
}

/// Partial update: `None` leaves the stored value untouched.
#[derive(Debug, Clone, Default)]
pub struct TripChanges {
    pub destination: Option<String>,
    pub details: Option<String>,
    pub rating: Option<f64>,
    pub photos: Option<Vec<NewPhoto>>,
}
