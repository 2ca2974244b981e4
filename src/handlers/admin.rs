//! Admin page handler: open the module, check the action, prepare template data, resolve the template.

use crate::config::Action;
use crate::error::AppError;
use crate::extractors::{AdminSession, UserId};
use crate::module::Module;
use crate::request::{FormData, Method, RequestContext};
use crate::response::{error_body, success_one_ok};
use crate::state::AppState;
use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    Form, Json,
};
use serde_json::json;
use std::collections::HashMap;

type Pairs = Vec<(String, String)>;

/// GET/POST `/admin/:module[/*rest]` where rest is `[id][/action[/subAction]]`.
pub async fn admin_page(
    State(state): State<AppState>,
    Path(params): Path<HashMap<String, String>>,
    method: axum::http::Method,
    AdminSession(session_id): AdminSession,
    UserId(user): UserId,
    Query(query): Query<Pairs>,
    body: Option<Form<Pairs>>,
) -> Result<Response, AppError> {
    let module_type = params
        .get("module")
        .ok_or_else(|| AppError::BadRequest("missing module".into()))?;
    let rest = params.get("rest").map(String::as_str).unwrap_or("");
    let segments: Vec<&str> = rest.split('/').collect();

    let method = Method::try_from(&method)?;
    let post = match (method, body) {
        (Method::Post, Some(Form(pairs))) => FormData::from_pairs(pairs),
        _ => FormData::new(),
    };
    let request = RequestContext::new(method)
        .apply_segments(&segments)
        .with_query(FormData::from_pairs(query))
        .with_post(post);

    let collaborators = state.collaborators(&session_id, user.as_deref());
    let mut module = Module::open(state.env.clone(), collaborators, module_type, request).await?;
    let action = module.current_action();
    if !module.allow(action.as_str()).await {
        let module_type = module.module_type().to_string();
        module.finish().await;
        return Ok(denied(&module_type, action));
    }

    module.prepare_template().await;
    let template = module.resolve_template().await;
    let values = module.template_data().clone();
    let module_type = module.module_type().to_string();
    module.finish().await;

    let Some(template) = template? else {
        return Ok(denied(&module_type, action));
    };
    Ok(success_one_ok(json!({
        "template": template,
        "action": action.as_str(),
        "values": values,
    }))
    .into_response())
}

fn denied(module_type: &str, action: Action) -> Response {
    tracing::debug!(module = %module_type, action = %action, "page denied");
    let message = format!("Action ({}) not allowed", action);
    (StatusCode::FORBIDDEN, Json(error_body("permission_denied", message, None))).into_response()
}
