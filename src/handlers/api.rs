//! JSON API handler: record access by HTTP method.

use crate::error::AppError;
use crate::extractors::{AdminSession, UserId};
use crate::module::{ApiOutcome, Module};
use crate::request::{FormData, Method, RequestContext};
use crate::response::{success_many, success_one, success_one_ok};
use crate::state::AppState;
use axum::{
    extract::{Path, Query, State},
    response::{IntoResponse, Response},
    Json,
};
use serde_json::{json, Value};
use std::collections::HashMap;

fn parse_id(id_str: &str) -> Result<i64, AppError> {
    id_str
        .parse::<i64>()
        .map_err(|_| AppError::BadRequest("invalid id".into()))
}

fn body_to_form(body: Option<Json<Value>>) -> Result<FormData, AppError> {
    match body {
        None => Ok(FormData::new()),
        Some(Json(Value::Object(m))) => Ok(FormData::from_map(m)),
        Some(Json(Value::Null)) => Ok(FormData::new()),
        Some(_) => Err(AppError::BadRequest("body must be a JSON object".into())),
    }
}

/// GET/PUT/POST/DELETE `/api/:module[/:id]`.
pub async fn api_request(
    State(state): State<AppState>,
    Path(params): Path<HashMap<String, String>>,
    method: axum::http::Method,
    AdminSession(session_id): AdminSession,
    UserId(user): UserId,
    Query(query): Query<Vec<(String, String)>>,
    body: Option<Json<Value>>,
) -> Result<Response, AppError> {
    let module_type = params
        .get("module")
        .ok_or_else(|| AppError::BadRequest("missing module".into()))?;
    let mut request = RequestContext::new(Method::try_from(&method)?)
        .with_query(FormData::from_pairs(query))
        .with_post(body_to_form(body)?);
    if let Some(id) = params.get("id") {
        request = request.with_id(parse_id(id)?);
    }

    let collaborators = state.collaborators(&session_id, user.as_deref());
    let mut module = Module::open(state.env.clone(), collaborators, module_type, request).await?;
    let outcome = module.process_api().await;
    module.finish().await;

    Ok(match outcome? {
        ApiOutcome::List(rows) => success_many(rows).into_response(),
        ApiOutcome::Item(item) => success_one_ok(item).into_response(),
        ApiOutcome::Created(item) => success_one(item).into_response(),
        ApiOutcome::Hint(next) => success_one_ok(json!({ "next": next })).into_response(),
    })
}
