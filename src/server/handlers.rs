//! Request handlers for the visitor API.

use std::convert::Infallible;
use std::sync::Arc;

use bytes::BufMut;
use futures_util::TryStreamExt;
use serde_json::json;
use tracing::{error, warn};
use uuid::Uuid;
use warp::http::StatusCode;
use warp::multipart::FormData;
use warp::{Rejection, Reply};

use crate::domain::{AudioClip, NewVisitor};
use crate::enrich::{draft_follow_up, generate_summary};
use crate::notify::{Attachment, OutgoingEmail};

use super::AppContext;

/// Typed rejection carried through warp to the recover handler.
#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    #[error("visitor not found")]
    NotFound,

    #[error("{0}")]
    BadRequest(String),

    #[error("{0}")]
    Internal(String),
}

impl warp::reject::Reject for ApiError {}

impl ApiError {
    fn reject(self) -> Rejection {
        warp::reject::custom(self)
    }
}

/// One drained multipart part.
struct RawPart {
    name: String,
    filename: Option<String>,
    content_type: Option<String>,
    data: Vec<u8>,
}

async fn collect_parts(form: FormData) -> Result<Vec<RawPart>, Rejection> {
    form.and_then(|mut part| async move {
        let name = part.name().to_string();
        let filename = part.filename().map(str::to_string);
        let content_type = part.content_type().map(str::to_string);

        let mut data: Vec<u8> = Vec::new();
        // data() yields one chunk at a time until None
        while let Some(chunk) = part.data().await {
            data.put(chunk?);
        }

        Ok(RawPart {
            name,
            filename,
            content_type,
            data,
        })
    })
    .try_collect::<Vec<_>>()
    .await
    .map_err(|e| ApiError::BadRequest(format!("invalid multipart payload: {}", e)).reject())
}

fn part_text(name: &str, data: Vec<u8>) -> Result<String, Rejection> {
    String::from_utf8(data)
        .map_err(|_| ApiError::BadRequest(format!("field '{}' is not valid UTF-8", name)).reject())
}

/// POST /api/visitor - create a visitor from a multipart submission.
///
/// The follow-up draft runs inline before the insert; its failures are
/// swallowed so a reachable store always means a saved visitor.
pub async fn create_visitor(
    form: FormData,
    ctx: Arc<AppContext>,
) -> Result<impl Reply, Rejection> {
    let mut new = NewVisitor::default();

    for part in collect_parts(form).await? {
        let RawPart {
            name,
            content_type,
            data,
            ..
        } = part;

        match name.as_str() {
            "name" => new.fields.name = part_text(&name, data)?,
            "position" => new.fields.position = part_text(&name, data)?,
            "email" => new.fields.email = part_text(&name, data)?,
            "phone" => new.fields.phone = part_text(&name, data)?,
            "company" => new.fields.company = part_text(&name, data)?,
            "domain" => new.fields.domain = part_text(&name, data)?,
            "transcript" => {
                let text = part_text(&name, data)?;
                if !text.trim().is_empty() {
                    new.transcript = Some(text);
                }
            }
            "audio" => {
                new.audio = Some(AudioClip {
                    mime_type: content_type
                        .unwrap_or_else(|| "application/octet-stream".to_string()),
                    data,
                });
            }
            other => warn!(field = other, "ignoring unknown form field"),
        }
    }

    // Presence-only validation, and only on name/email
    if new.fields.name.trim().is_empty() || new.fields.email.trim().is_empty() {
        return Err(ApiError::BadRequest("name and email are required".to_string()).reject());
    }

    let draft = draft_follow_up(
        ctx.extractor.as_ref(),
        &new.fields,
        new.transcript.as_deref(),
    )
    .await;

    let id = ctx
        .store
        .insert(&new, &draft)
        .map_err(|e| ApiError::Internal(format!("could not save visitor: {}", e)).reject())?;

    Ok(warp::reply::with_status(
        warp::reply::json(&json!({ "id": id })),
        StatusCode::CREATED,
    ))
}

/// GET /api/visitor - all visitors, newest first.
pub async fn list_visitors(ctx: Arc<AppContext>) -> Result<impl Reply, Rejection> {
    let records = ctx
        .store
        .list()
        .map_err(|e| ApiError::Internal(format!("failed to fetch visitors: {}", e)).reject())?;

    Ok(warp::reply::json(&records))
}

/// GET /api/visitor/{id}
pub async fn get_visitor(id: Uuid, ctx: Arc<AppContext>) -> Result<impl Reply, Rejection> {
    let record = ctx
        .store
        .get(id)
        .map_err(|e| ApiError::Internal(format!("failed to fetch visitor: {}", e)).reject())?
        .ok_or_else(|| ApiError::NotFound.reject())?;

    Ok(warp::reply::json(&record))
}

/// POST /api/visitor/{id}/enrich - generate and persist a conversation summary.
///
/// Preconditions are checked before the extraction service is contacted:
/// unknown id is 404, missing/empty transcript is 400. A malformed service
/// answer is a hard 500 and leaves any previously stored summary untouched.
pub async fn enrich_visitor(id: Uuid, ctx: Arc<AppContext>) -> Result<impl Reply, Rejection> {
    let record = ctx
        .store
        .get(id)
        .map_err(|e| ApiError::Internal(format!("failed to fetch visitor: {}", e)).reject())?
        .ok_or_else(|| ApiError::NotFound.reject())?;

    if !record.has_transcript() {
        return Err(ApiError::BadRequest("visitor transcript is missing".to_string()).reject());
    }
    let transcript = record.transcript.as_deref().unwrap_or_default();

    let summary = generate_summary(ctx.extractor.as_ref(), transcript)
        .await
        .map_err(|e| {
            error!(%id, error = %e, "summary generation failed");
            ApiError::Internal("failed to generate summary".to_string()).reject()
        })?;

    let updated = ctx
        .store
        .save_enrichment(id, &summary)
        .map_err(|e| ApiError::Internal(format!("failed to save summary: {}", e)).reject())?;
    if !updated {
        return Err(ApiError::NotFound.reject());
    }

    Ok(warp::reply::json(&summary))
}

/// POST /api/visitor/{id}/email - dispatch the follow-up with attachments.
pub async fn send_follow_up_email(
    id: Uuid,
    form: FormData,
    ctx: Arc<AppContext>,
) -> Result<impl Reply, Rejection> {
    let record = ctx
        .store
        .get(id)
        .map_err(|e| ApiError::Internal(format!("failed to fetch visitor: {}", e)).reject())?
        .ok_or_else(|| ApiError::NotFound.reject())?;

    let attachments: Vec<Attachment> = collect_parts(form)
        .await?
        .into_iter()
        .filter(|part| part.name == "attachments")
        .map(|part| Attachment {
            filename: part
                .filename
                .unwrap_or_else(|| "attachment".to_string()),
            content: part.data,
        })
        .collect();

    let email = OutgoingEmail {
        to: record.email.clone(),
        subject: format!("{}, {}!", record.subject, record.name),
        html_body: record.body.clone(),
        attachments,
    };

    ctx.mailer.send(email).await.map_err(|e| {
        error!(%id, error = %e, "email dispatch failed");
        ApiError::Internal("failed to send email".to_string()).reject()
    })?;

    Ok(warp::reply::json(&json!({ "message": "Email sent successfully" })))
}

/// Map rejections to JSON error bodies with the right status code.
pub async fn handle_rejection(err: Rejection) -> Result<impl Reply, Infallible> {
    let (status, message) = if let Some(api) = err.find::<ApiError>() {
        match api {
            ApiError::NotFound => (StatusCode::NOT_FOUND, api.to_string()),
            ApiError::BadRequest(_) => (StatusCode::BAD_REQUEST, api.to_string()),
            ApiError::Internal(_) => {
                error!(error = %api, "request failed");
                (StatusCode::INTERNAL_SERVER_ERROR, api.to_string())
            }
        }
    } else if err.is_not_found() {
        (StatusCode::NOT_FOUND, "not found".to_string())
    } else if err.find::<warp::reject::PayloadTooLarge>().is_some() {
        (StatusCode::PAYLOAD_TOO_LARGE, "payload too large".to_string())
    } else if err.find::<warp::reject::InvalidHeader>().is_some()
        || err.find::<warp::reject::MissingHeader>().is_some()
        || err.find::<warp::reject::UnsupportedMediaType>().is_some()
    {
        (StatusCode::BAD_REQUEST, "invalid request".to_string())
    } else if err.find::<warp::reject::MethodNotAllowed>().is_some() {
        (
            StatusCode::METHOD_NOT_ALLOWED,
            "method not allowed".to_string(),
        )
    } else {
        error!(?err, "unhandled rejection");
        (
            StatusCode::INTERNAL_SERVER_ERROR,
            "internal server error".to_string(),
        )
    };

    Ok(warp::reply::with_status(
        warp::reply::json(&json!({ "error": message })),
        status,
    ))
}
