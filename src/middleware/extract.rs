use axum::extract::{FromRequest, FromRequestParts};

use crate::error::ApiError;

// Extractors whose rejections render as the regular JSON error body.

/// `axum::Json` with `ApiError` rejections
#[derive(FromRequest)]
#[from_request(via(axum::Json), rejection(ApiError))]
pub struct ApiJson<T>(pub T);

/// `axum::Form` with `ApiError` rejections
#[derive(FromRequest)]
#[from_request(via(axum::Form), rejection(ApiError))]
pub struct ApiForm<T>(pub T);

/// `axum::extract::Path` with `ApiError` rejections
#[derive(FromRequestParts)]
#[from_request(via(axum::extract::Path), rejection(ApiError))]
pub struct ApiPath<T>(pub T);
