use std::sync::Arc;
use std::time::Duration;

use axum::{
    extract::{DefaultBodyLimit, Multipart, Path, Query, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
    Router,
};
use chrono::{NaiveDate, Utc};
use serde::Deserialize;
use tracing::info;

use super::domain::{EmployeeId, PeriodCode, TenantId};
use super::service::{SgkIngestService, SgkUpload};
use crate::deadline::Deadline;
use crate::error::{error_response, ErrorKind};

/// Uploads larger than this are rejected before parsing.
pub const MAX_UPLOAD_BYTES: usize = 20 * 1024 * 1024;

#[derive(Clone)]
pub(crate) struct SgkRouterState {
    service: Arc<SgkIngestService>,
    request_deadline: Duration,
}

/// `POST /sgk/upload` and `GET /sgk/employees/:employee_id/compliance`.
pub fn sgk_router(service: Arc<SgkIngestService>, request_deadline: Duration) -> Router {
    Router::new()
        .route("/sgk/upload", post(upload_handler))
        .route(
            "/sgk/employees/:employee_id/compliance",
            get(compliance_handler),
        )
        .layer(DefaultBodyLimit::max(MAX_UPLOAD_BYTES))
        .with_state(SgkRouterState {
            service,
            request_deadline,
        })
}

#[derive(Default)]
struct UploadForm {
    file: Option<Vec<u8>>,
    period_code: Option<String>,
    tenant_id: Option<String>,
    uploaded_by: Option<String>,
    reference_date: Option<String>,
}

impl UploadForm {
    async fn read(mut multipart: Multipart) -> Result<Self, String> {
        let mut form = UploadForm::default();
        while let Some(field) = multipart
            .next_field()
            .await
            .map_err(|err| format!("failed to read multipart field: {err}"))?
        {
            let name = field.name().unwrap_or_default().to_string();
            if name == "file" {
                let bytes = field
                    .bytes()
                    .await
                    .map_err(|err| format!("failed to read uploaded file: {err}"))?;
                form.file = Some(bytes.to_vec());
                continue;
            }
            let value = field
                .text()
                .await
                .map_err(|err| format!("failed to read field '{name}': {err}"))?;
            match name.as_str() {
                "period_code" => form.period_code = Some(value),
                "tenant_id" => form.tenant_id = Some(value),
                "uploaded_by" => form.uploaded_by = Some(value),
                "reference_date" => form.reference_date = Some(value),
                _ => {}
            }
        }
        Ok(form)
    }
}

fn required(value: Option<String>, name: &str) -> Result<String, Response> {
    value
        .map(|value| value.trim().to_string())
        .filter(|value| !value.is_empty())
        .ok_or_else(|| error_response(ErrorKind::InvalidRequest, format!("'{name}' is required")))
}

fn upload_from_form(form: UploadForm) -> Result<SgkUpload, Response> {
    let period_code: PeriodCode = required(form.period_code, "period_code")?
        .parse()
        .map_err(|err| error_response(ErrorKind::PeriodCodeInvalid, err))?;
    let tenant_id = TenantId(required(form.tenant_id, "tenant_id")?);
    let uploaded_by = required(form.uploaded_by, "uploaded_by")?;
    let bytes = form
        .file
        .filter(|bytes| !bytes.is_empty())
        .ok_or_else(|| error_response(ErrorKind::InvalidRequest, "'file' is required"))?;
    let reference_date = form
        .reference_date
        .map(|raw| raw.trim().parse::<NaiveDate>())
        .transpose()
        .map_err(|err| error_response(ErrorKind::InvalidRequest, err))?;

    Ok(SgkUpload {
        tenant_id,
        period_code,
        uploaded_by,
        bytes,
        reference_date,
    })
}

pub(crate) async fn upload_handler(
    State(state): State<SgkRouterState>,
    multipart: Multipart,
) -> Response {
    let form = match UploadForm::read(multipart).await {
        Ok(form) => form,
        Err(detail) => return error_response(ErrorKind::InvalidRequest, detail),
    };
    let upload = match upload_from_form(form) {
        Ok(upload) => upload,
        Err(response) => return response,
    };
    info!(
        tenant_id = %upload.tenant_id,
        period = %upload.period_code,
        size = upload.bytes.len(),
        "sgk list uploaded"
    );

    match state
        .service
        .ingest(upload, Deadline::after(state.request_deadline))
        .await
    {
        Ok(outcome) => (StatusCode::OK, axum::Json(outcome)).into_response(),
        Err(error) => error_response(error.kind(), error),
    }
}

#[derive(Debug, Deserialize)]
pub(crate) struct ComplianceQuery {
    date: Option<NaiveDate>,
}

pub(crate) async fn compliance_handler(
    State(state): State<SgkRouterState>,
    Path(employee_id): Path<String>,
    Query(query): Query<ComplianceQuery>,
) -> Response {
    let date = query.date.unwrap_or_else(|| Utc::now().date_naive());
    let deadline = Deadline::after(state.request_deadline);
    let decision = deadline
        .run(
            state
                .service
                .compliance()
                .authorize_gate_entry(&EmployeeId(employee_id), date),
        )
        .await;
    match decision {
        Ok(Ok(decision)) => (StatusCode::OK, axum::Json(decision)).into_response(),
        Ok(Err(error)) => error_response(error.kind(), error),
        Err(expired) => error_response(ErrorKind::DeadlineExceeded, expired),
    }
}
