//! Extraktoren mit einheitlichen JSON-Fehlerantworten

use axum::extract::{FromRequest, FromRequestParts};

use crate::error::ApiError;

/// JSON-Body; Parse-Fehler werden zu 400 mit JSON-Fehlerobjekt
#[derive(Debug, FromRequest)]
#[from_request(via(axum::Json), rejection(ApiError))]
pub struct JsonBody<T>(pub T);

/// Pfad-Parameter
#[derive(Debug, FromRequestParts)]
#[from_request(via(axum::extract::Path), rejection(ApiError))]
pub struct Pfad<T>(pub T);

/// Query-Parameter
#[derive(Debug, FromRequestParts)]
#[from_request(via(axum::extract::Query), rejection(ApiError))]
pub struct Abfrage<T>(pub T);
