use axum::{
    extract::{Host, Query, State},
    routing::get,
    Json, Router,
};
use tracing::{debug, warn};
use url::Url;

use crate::{
    error::AppError,
    models::trip::{NewPhoto, NewTrip, TripChanges},
    routes::{
        forms::{parse_id, parse_rating, required, IdForm, TripForm},
        views::{present_trip, present_trips, DeletedView, MessageView, TripListView, TripView},
    },
    services::{images, trips},
    state::AppState,
};

const CREATE_FAILED: &str = "Não foi possível salvar a nova viagem :/";
const UPDATE_FAILED: &str = "Não foi possível atualizar a viagem :/";
const DELETE_FAILED: &str = "Não foi possível remover a viagem :/";
const LOAD_FAILED: &str = "Não foi possível carregar as viagens :/";
const TRIP_NOT_FOUND: &str = "Viagem não encontrada na base de dados :/";

pub fn router() -> Router<AppState> {
    Router::new()
        .route(
            "/viagem",
            get(get_trip)
                .post(create_trip)
                .put(update_trip)
                .delete(delete_trip),
        )
        .route("/viagens", get(list_trips))
}

async fn create_trip(
    State(state): State<AppState>,
    Host(host): Host,
    form: TripForm,
) -> Result<Json<TripView>, AppError> {
    let destination = required(form.destination, "destino")?;
    let details = required(form.details, "detalhes")?;
    let rating = parse_rating(&required(form.rating, "rating")?)?;
    let base = state.base_url(&host).map_err(|err| err.or_failed(CREATE_FAILED))?;

    debug!("adding trip to '{destination}'");
    let filenames = state
        .images
        .ingest(form.photos)
        .await
        .map_err(|err| err.or_failed(CREATE_FAILED))?;

    let stored = async {
        let new = NewTrip {
            destination,
            details,
            rating,
            photos: photo_links(&base, &filenames)?,
            inserted_at: None,
        };
        let mut tx = state.db.begin().await?;
        let trip = trips::insert_trip(&mut tx, new).await?;
        tx.commit().await?;
        Ok::<_, AppError>(trip)
    }
    .await;

    match stored {
        Ok(trip) => {
            debug!("added trip #{} to '{}'", trip.id, trip.destination);
            Ok(Json(present_trip(&trip)))
        }
        Err(err) => {
            state.images.remove(&filenames).await;
            Err(err.or_failed(CREATE_FAILED))
        }
    }
}

async fn list_trips(State(state): State<AppState>) -> Result<Json<TripListView>, AppError> {
    debug!("collecting trip list");
    let mut conn = state
        .db
        .acquire()
        .await
        .map_err(|err| AppError::from(err).or_failed(LOAD_FAILED))?;
    let all = trips::list_trips(&mut conn)
        .await
        .map_err(|err| err.or_failed(LOAD_FAILED))?;

    if all.is_empty() {
        return Err(AppError::NotFound(
            "Nenhuma viagem encontrada na base :/".into(),
        ));
    }
    Ok(Json(present_trips(&all)))
}

async fn get_trip(
    State(state): State<AppState>,
    Query(query): Query<IdForm>,
) -> Result<Json<TripView>, AppError> {
    let id = parse_id(query.id)?;
    let mut conn = state
        .db
        .acquire()
        .await
        .map_err(|err| AppError::from(err).or_failed(LOAD_FAILED))?;
    let trip = trips::find_trip(&mut conn, id)
        .await
        .map_err(|err| err.or_failed(LOAD_FAILED))?
        .ok_or_else(|| AppError::NotFound(TRIP_NOT_FOUND.into()))?;
    Ok(Json(present_trip(&trip)))
}

async fn update_trip(
    State(state): State<AppState>,
    Host(host): Host,
    form: TripForm,
) -> Result<Json<MessageView>, AppError> {
    let id = parse_id(form.id)?;
    let rating = form.rating.as_deref().map(parse_rating).transpose()?;

    // No transaction stays open while photos are decoded and written.
    let mut conn = state
        .db
        .acquire()
        .await
        .map_err(|err| AppError::from(err).or_failed(UPDATE_FAILED))?;
    let found = trips::find_trip(&mut conn, id)
        .await
        .map_err(|err| err.or_failed(UPDATE_FAILED))?;
    drop(conn);
    if found.is_none() {
        warn!("update of trip #{id} failed: not found");
        return Err(AppError::NotFound("Viagem não encontrada".into()));
    }

    let mut written = Vec::new();
    let mut changes = TripChanges {
        destination: form.destination,
        details: form.details,
        rating,
        photos: None,
    };
    if !form.photos.is_empty() {
        let base = state.base_url(&host).map_err(|err| err.or_failed(UPDATE_FAILED))?;
        written = state
            .images
            .ingest(form.photos)
            .await
            .map_err(|err| err.or_failed(UPDATE_FAILED))?;
        match photo_links(&base, &written) {
            Ok(links) => changes.photos = Some(links),
            Err(err) => {
                state.images.remove(&written).await;
                return Err(err.or_failed(UPDATE_FAILED));
            }
        }
    }

    let updated = async {
        let mut tx = state.db.begin().await?;
        let Some(existing) = trips::find_trip(&mut tx, id).await? else {
            return Err(AppError::NotFound("Viagem não encontrada".into()));
        };
        let (trip, superseded) = trips::update_trip(&mut tx, existing, changes).await?;
        tx.commit().await?;
        Ok::<_, AppError>((trip, superseded))
    }
    .await;

    match updated {
        Ok((trip, superseded)) => {
            state.images.remove(&superseded).await;
            debug!("updated trip #{} to '{}'", trip.id, trip.destination);
            Ok(Json(MessageView {
                message: "Viagem atualizada com sucesso".into(),
            }))
        }
        Err(err) => {
            state.images.remove(&written).await;
            Err(err.or_failed(UPDATE_FAILED))
        }
    }
}

async fn delete_trip(
    State(state): State<AppState>,
    Query(query): Query<IdForm>,
    form: TripForm,
) -> Result<Json<DeletedView>, AppError> {
    let id = parse_id(form.id.or(query.id)).map_err(|err| {
        warn!("delete without a usable id: {err}");
        err
    })?;
    debug!("deleting trip #{id}");

    let removed = async {
        let mut tx = state.db.begin().await?;
        let removed = trips::delete_trip(&mut tx, id).await?;
        tx.commit().await?;
        Ok::<_, AppError>(removed)
    }
    .await
    .map_err(|err| err.or_failed(DELETE_FAILED))?;

    let Some(filenames) = removed else {
        warn!("delete of trip #{id} failed: not found");
        return Err(AppError::Failed(TRIP_NOT_FOUND.into()));
    };
    state.images.remove(&filenames).await;
    debug!("deleted trip #{id}");
    Ok(Json(DeletedView { id }))
}

fn photo_links(base: &Url, filenames: &[String]) -> Result<Vec<NewPhoto>, AppError> {
    filenames
        .iter()
        .map(|filename| {
            Ok(NewPhoto {
                filename: filename.clone(),
                url: images::public_url(base, filename)?.to_string(),
            })
        })
        .collect()
}
