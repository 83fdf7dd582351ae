//! Persistence for trips and their photos.
//!
//! Every function works on a borrowed connection so callers can run a whole
//! request inside one transaction and let it roll back on drop.

use std::collections::HashMap;

use chrono::Utc;
use sqlx::SqliteConnection;

use crate::{
    error::AppError,
    models::trip::{NewPhoto, NewTrip, Trip, TripChanges, TripPhoto},
};

const TRIP_COLUMNS: &str = "pk_viagem, destino, detalhes, rating, data_insercao";

pub async fn insert_trip(conn: &mut SqliteConnection, new: NewTrip) -> Result<Trip, AppError> {
    let inserted_at = new.inserted_at.unwrap_or_else(Utc::now);
    let id = sqlx::query(
        "INSERT INTO viagem (destino, detalhes, rating, data_insercao) VALUES (?1, ?2, ?3, ?4)",
    )
    .bind(&new.destination)
    .bind(&new.details)
    .bind(new.rating)
    .bind(inserted_at)
    .execute(&mut *conn)
    .await?
    .last_insert_rowid();

    let photos = insert_photos(conn, id, new.photos).await?;

    Ok(Trip {
        id,
        destination: new.destination,
        details: new.details,
        rating: new.rating,
        inserted_at,
        photos,
    })
}

pub async fn list_trips(conn: &mut SqliteConnection) -> Result<Vec<Trip>, AppError> {
    let mut trips: Vec<Trip> =
        sqlx::query_as(&format!("SELECT {TRIP_COLUMNS} FROM viagem ORDER BY pk_viagem"))
            .fetch_all(&mut *conn)
            .await?;

    let photos: Vec<TripPhoto> = sqlx::query_as(
        "SELECT viagem_id, position, filename, url FROM viagem_foto ORDER BY viagem_id, position",
    )
    .fetch_all(&mut *conn)
    .await?;

    let mut by_trip: HashMap<i64, Vec<TripPhoto>> = HashMap::new();
    for photo in photos {
        by_trip.entry(photo.viagem_id).or_default().push(photo);
    }
    for trip in &mut trips {
        trip.photos = by_trip.remove(&trip.id).unwrap_or_default();
    }

    Ok(trips)
}

pub async fn find_trip(conn: &mut SqliteConnection, id: i64) -> Result<Option<Trip>, AppError> {
    let trip: Option<Trip> = sqlx::query_as(&format!(
        "SELECT {TRIP_COLUMNS} FROM viagem WHERE pk_viagem = ?1"
    ))
    .bind(id)
    .fetch_optional(&mut *conn)
    .await?;

    let Some(mut trip) = trip else {
        return Ok(None);
    };
    trip.photos = load_photos(conn, id).await?;
    Ok(Some(trip))
}

/// Applies `changes` to a trip loaded in the same transaction.
///
/// Returns the updated trip and the filenames of photos that were replaced.
pub async fn update_trip(
    conn: &mut SqliteConnection,
    mut trip: Trip,
    changes: TripChanges,
) -> Result<(Trip, Vec<String>), AppError> {
    if let Some(destination) = changes.destination {
        trip.destination = destination;
    }
    if let Some(details) = changes.details {
        trip.details = details;
    }
    if let Some(rating) = changes.rating {
        trip.rating = rating;
    }

    sqlx::query("UPDATE viagem SET destino = ?1, detalhes = ?2, rating = ?3 WHERE pk_viagem = ?4")
        .bind(&trip.destination)
        .bind(&trip.details)
        .bind(trip.rating)
        .bind(trip.id)
        .execute(&mut *conn)
        .await?;

    let mut superseded = Vec::new();
    if let Some(photos) = changes.photos {
        superseded = trip.photo_filenames();
        sqlx::query("DELETE FROM viagem_foto WHERE viagem_id = ?1")
            .bind(trip.id)
            .execute(&mut *conn)
            .await?;
        trip.photos = insert_photos(conn, trip.id, photos).await?;
    }

    Ok((trip, superseded))
}

/// Deletes a trip and its photo rows. `None` when no trip had this id.
pub async fn delete_trip(
    conn: &mut SqliteConnection,
    id: i64,
) -> Result<Option<Vec<String>>, AppError> {
    let filenames: Vec<String> =
        sqlx::query_scalar("SELECT filename FROM viagem_foto WHERE viagem_id = ?1")
            .bind(id)
            .fetch_all(&mut *conn)
            .await?;

    let deleted = sqlx::query("DELETE FROM viagem WHERE pk_viagem = ?1")
        .bind(id)
        .execute(&mut *conn)
        .await?
        .rows_affected();

    Ok((deleted > 0).then_some(filenames))
}

async fn load_photos(conn: &mut SqliteConnection, id: i64) -> Result<Vec<TripPhoto>, AppError> {
    let photos = sqlx::query_as(
        "SELECT viagem_id, position, filename, url FROM viagem_foto WHERE viagem_id = ?1 ORDER BY position",
    )
    .bind(id)
    .fetch_all(&mut *conn)
    .await?;
    Ok(photos)
}

async fn insert_photos(
    conn: &mut SqliteConnection,
    viagem_id: i64,
    photos: Vec<NewPhoto>,
) -> Result<Vec<TripPhoto>, AppError> {
    let mut stored = Vec::with_capacity(photos.len());
    for (position, photo) in photos.into_iter().enumerate() {
        let position = position as i64;
        sqlx::query(
            "INSERT INTO viagem_foto (viagem_id, position, filename, url) VALUES (?1, ?2, ?3, ?4)",
        )
        .bind(viagem_id)
        .bind(position)
        .bind(&photo.filename)
        .bind(&photo.url)
        .execute(&mut *conn)
        .await?;
        stored.push(TripPhoto {
            viagem_id,
            position,
            filename: photo.filename,
            url: photo.url,
        });
    }
    Ok(stored)
}

#[cfg(test)]
mod tests {
    use sqlx::Connection;
    use tempfile::TempDir;

    use super::*;
    use crate::db::{init_pool, run_migrations};

    async fn pool() -> (crate::db::DbPool, TempDir) {
        let dir = TempDir::new().unwrap();
        let url = format!("sqlite://{}", dir.path().join("trips.sqlite").display());
        let pool = init_pool(&url).await.unwrap();
        run_migrations(&pool).await.unwrap();
        (pool, dir)
    }

    fn photo(name: &str) -> NewPhoto {
        NewPhoto {
            filename: name.to_string(),
            url: format!("http://localhost/static/images/{name}"),
        }
    }

    fn paris() -> NewTrip {
        NewTrip {
            destination: "Paris".into(),
            details: "City of lights".into(),
            rating: 4.5,
            photos: vec![photo("a.jpg"), photo("b.png")],
            inserted_at: None,
        }
    }

    #[tokio::test]
    async fn insert_then_find_keeps_photo_order() {
        let (pool, _dir) = pool().await;
        let mut conn = pool.acquire().await.unwrap();

        let created = insert_trip(&mut conn, paris()).await.unwrap();
        let found = find_trip(&mut conn, created.id).await.unwrap().unwrap();

        assert_eq!(found.destination, "Paris");
        assert_eq!(found.photo_filenames(), vec!["a.jpg", "b.png"]);
    }

    #[tokio::test]
    async fn partial_update_only_touches_given_fields() {
        let (pool, _dir) = pool().await;
        let mut conn = pool.acquire().await.unwrap();
        let created = insert_trip(&mut conn, paris()).await.unwrap();

        let changes = TripChanges {
            rating: Some(3.0),
            ..TripChanges::default()
        };
        let (updated, superseded) = update_trip(&mut conn, created, changes).await.unwrap();

        assert!(superseded.is_empty());
        let found = find_trip(&mut conn, updated.id).await.unwrap().unwrap();
        assert_eq!(found.rating, 3.0);
        assert_eq!(found.details, "City of lights");
        assert_eq!(found.photos.len(), 2);
    }

    #[tokio::test]
    async fn replacing_photos_reports_superseded_files() {
        let (pool, _dir) = pool().await;
        let mut conn = pool.acquire().await.unwrap();
        let created = insert_trip(&mut conn, paris()).await.unwrap();

        let changes = TripChanges {
            photos: Some(vec![photo("c.jpeg")]),
            ..TripChanges::default()
        };
        let (_, superseded) = update_trip(&mut conn, created.clone(), changes)
            .await
            .unwrap();

        assert_eq!(superseded, vec!["a.jpg", "b.png"]);
        let found = find_trip(&mut conn, created.id).await.unwrap().unwrap();
        assert_eq!(found.photo_filenames(), vec!["c.jpeg"]);
    }

    #[tokio::test]
    async fn delete_cascades_to_photos() {
        let (pool, _dir) = pool().await;
        let mut conn = pool.acquire().await.unwrap();
        let created = insert_trip(&mut conn, paris()).await.unwrap();

        let removed = delete_trip(&mut conn, created.id).await.unwrap();
        assert_eq!(removed, Some(vec!["a.jpg".to_string(), "b.png".to_string()]));
        assert!(list_trips(&mut conn).await.unwrap().is_empty());
        let orphans: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM viagem_foto")
            .fetch_one(&mut *conn)
            .await
            .unwrap();
        assert_eq!(orphans, 0);

        assert_eq!(delete_trip(&mut conn, created.id).await.unwrap(), None);
    }

    #[tokio::test]
    async fn duplicate_filenames_are_integrity_violations() {
        let (pool, _dir) = pool().await;
        let mut conn = pool.acquire().await.unwrap();
        insert_trip(&mut conn, paris()).await.unwrap();

        let mut tx = conn.begin().await.unwrap();
        let err = insert_trip(&mut tx, paris()).await.unwrap_err();
        tx.rollback().await.unwrap();

        let err = err.or_failed("Não foi possível salvar a nova viagem :/");
        assert!(matches!(err, AppError::Conflict(_)));
        assert_eq!(list_trips(&mut conn).await.unwrap().len(), 1);
    }
}
