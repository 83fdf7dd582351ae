use async_trait::async_trait;
use axum::{
    extract::{FromRequest, Multipart, Request},
    http::header,
    Form,
};
use serde::Deserialize;
use tracing::debug;

use crate::{error::AppError, services::images::UploadedPhoto};

/// Fields of the trip form, as submitted. Blank text counts as absent.
///
/// Read from a `multipart/form-data` or `application/x-www-form-urlencoded`
/// body. Any other body, or none, yields an empty form.
#[derive(Debug, Default)]
pub struct TripForm {
    pub id: Option<String>,
    pub destination: Option<String>,
    pub details: Option<String>,
    pub rating: Option<String>,
    pub photos: Vec<UploadedPhoto>,
}

#[derive(Debug, Default, Deserialize)]
struct UrlencodedTripForm {
    id: Option<String>,
    destino: Option<String>,
    detalhes: Option<String>,
    rating: Option<String>,
}

#[async_trait]
impl<S> FromRequest<S> for TripForm
where
    S: Send + Sync,
{
    type Rejection = AppError;

    async fn from_request(req: Request, state: &S) -> Result<Self, Self::Rejection> {
        let content_type = req
            .headers()
            .get(header::CONTENT_TYPE)
            .and_then(|value| value.to_str().ok())
            .unwrap_or_default()
            .to_ascii_lowercase();

        if content_type.starts_with("multipart/form-data") {
            let multipart = Multipart::from_request(req, state).await.map_err(|err| {
                AppError::Unprocessable(format!("corpo multipart inválido: {}", err.body_text()))
            })?;
            Self::from_multipart(multipart).await
        } else if content_type.starts_with("application/x-www-form-urlencoded") {
            let Form(fields) = Form::<UrlencodedTripForm>::from_request(req, state)
                .await
                .map_err(|err| {
                    AppError::Unprocessable(format!("formulário inválido: {}", err.body_text()))
                })?;
            Ok(Self {
                id: normalize_optional(fields.id),
                destination: normalize_optional(fields.destino),
                details: normalize_optional(fields.detalhes),
                rating: normalize_optional(fields.rating),
                photos: Vec::new(),
            })
        } else {
            Ok(Self::default())
        }
    }
}

impl TripForm {
    pub async fn from_multipart(mut multipart: Multipart) -> Result<Self, AppError> {
        let mut form = Self::default();
        while let Some(field) = multipart.next_field().await.map_err(invalid_body)? {
            let Some(name) = field.name().map(str::to_owned) else {
                continue;
            };
            match name.as_str() {
                "fotos" | "fotos[]" => {
                    let file_name = field.file_name().unwrap_or_default().to_owned();
                    let bytes = field.bytes().await.map_err(invalid_body)?;
                    // Browsers send an empty part when no file was picked.
                    if file_name.is_empty() && bytes.is_empty() {
                        continue;
                    }
                    form.photos.push(UploadedPhoto { file_name, bytes });
                }
                "id" => form.id = normalize_text(field.text().await.map_err(invalid_body)?),
                "destino" => {
                    form.destination = normalize_text(field.text().await.map_err(invalid_body)?)
                }
                "detalhes" => {
                    form.details = normalize_text(field.text().await.map_err(invalid_body)?)
                }
                "rating" => {
                    form.rating = normalize_text(field.text().await.map_err(invalid_body)?)
                }
                other => debug!("ignoring unknown form field {other}"),
            }
        }
        Ok(form)
    }
}

/// `id` as sent in a query string.
#[derive(Debug, Default, Deserialize)]
pub struct IdForm {
    pub id: Option<String>,
}

pub fn required(value: Option<String>, field: &str) -> Result<String, AppError> {
    value.ok_or_else(|| AppError::Unprocessable(format!("Campo obrigatório ausente: {field}")))
}

pub fn parse_rating(raw: &str) -> Result<f64, AppError> {
    raw.trim()
        .parse::<f64>()
        .ok()
        .filter(|rating| rating.is_finite())
        .ok_or_else(|| AppError::Unprocessable(format!("rating inválido: {raw}")))
}

/// A missing, blank, zero or non-numeric id is rejected. Negative ids parse
/// and simply match no trip.
pub fn parse_id(raw: Option<String>) -> Result<i64, AppError> {
    let raw = normalize_optional(raw)
        .ok_or_else(|| AppError::Unprocessable("Viagem não encontrada na base de dados :/".into()))?;
    match raw.parse::<i64>() {
        Ok(id) if id != 0 => Ok(id),
        _ => Err(AppError::Unprocessable(format!("id inválido: {raw}"))),
    }
}

pub fn normalize_optional(input: Option<String>) -> Option<String> {
    input.and_then(normalize_text)
}

fn normalize_text(value: String) -> Option<String> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        None
    } else {
        Some(trimmed.to_string())
    }
}

fn invalid_body(err: axum::extract::multipart::MultipartError) -> AppError {
    AppError::Unprocessable(format!("corpo multipart inválido: {err}"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_or_zero_ids_are_unprocessable() {
        assert!(matches!(parse_id(None), Err(AppError::Unprocessable(_))));
        assert!(matches!(
            parse_id(Some("  ".into())),
            Err(AppError::Unprocessable(_))
        ));
        assert!(matches!(
            parse_id(Some("0".into())),
            Err(AppError::Unprocessable(_))
        ));
        assert!(matches!(
            parse_id(Some("abc".into())),
            Err(AppError::Unprocessable(_))
        ));
        assert_eq!(parse_id(Some(" 12 ".into())).unwrap(), 12);
        assert_eq!(parse_id(Some("-1".into())).unwrap(), -1);
    }

    #[test]
    fn rating_must_be_a_finite_number() {
        assert_eq!(parse_rating("4.5").unwrap(), 4.5);
        assert!(parse_rating("NaN").is_err());
        assert!(parse_rating("cinco").is_err());
    }
}
