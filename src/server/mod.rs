//! HTTP API for the visitor service.
//!
//! Five endpoints over one shared context: create (multipart, runs the
//! follow-up draft inline), read one, read all, enrich (conversation
//! summary), and email dispatch. Every handler funnels failures through
//! `ApiError` so status codes and `{"error": ...}` bodies stay uniform.

pub mod handlers;

use std::convert::Infallible;
use std::net::SocketAddr;
use std::sync::Arc;

use tracing::info;
use uuid::Uuid;
use warp::filters::BoxedFilter;
use warp::{Filter, Reply};

use crate::extraction::Extractor;
use crate::notify::Mailer;
use crate::store::VisitorStore;

pub use handlers::ApiError;

/// Uploads are capped; a visitor submission is one photo's worth of fields
/// plus a short audio clip.
const MAX_UPLOAD_BYTES: u64 = 32 * 1024 * 1024;

/// Shared state for all request handlers.
pub struct AppContext {
    pub store: Arc<VisitorStore>,
    pub extractor: Arc<dyn Extractor>,
    pub mailer: Arc<dyn Mailer>,
}

fn with_ctx(
    ctx: Arc<AppContext>,
) -> impl Filter<Extract = (Arc<AppContext>,), Error = Infallible> + Clone {
    warp::any().map(move || Arc::clone(&ctx))
}

/// Build the full route tree.
pub fn routes(ctx: Arc<AppContext>) -> BoxedFilter<(impl Reply,)> {
    let create = warp::path!("api" / "visitor")
        .and(warp::post())
        .and(warp::multipart::form().max_length(MAX_UPLOAD_BYTES))
        .and(with_ctx(Arc::clone(&ctx)))
        .and_then(handlers::create_visitor);

    let list = warp::path!("api" / "visitor")
        .and(warp::get())
        .and(with_ctx(Arc::clone(&ctx)))
        .and_then(handlers::list_visitors);

    let get = warp::path!("api" / "visitor" / Uuid)
        .and(warp::get())
        .and(with_ctx(Arc::clone(&ctx)))
        .and_then(handlers::get_visitor);

    let enrich = warp::path!("api" / "visitor" / Uuid / "enrich")
        .and(warp::post())
        .and(with_ctx(Arc::clone(&ctx)))
        .and_then(handlers::enrich_visitor);

    let email = warp::path!("api" / "visitor" / Uuid / "email")
        .and(warp::post())
        .and(warp::multipart::form().max_length(MAX_UPLOAD_BYTES))
        .and(with_ctx(ctx))
        .and_then(handlers::send_follow_up_email);

    let cors = warp::cors()
        .allow_any_origin()
        .allow_headers(vec!["content-type"])
        .allow_methods(vec!["GET", "POST"]);

    create
        .or(list)
        .or(get)
        .or(enrich)
        .or(email)
        .recover(handlers::handle_rejection)
        .with(cors)
        .boxed()
}

/// Serve the API until the task is dropped.
pub async fn run(ctx: Arc<AppContext>, addr: SocketAddr) {
    info!(%addr, "visitor API listening");
    warp::serve(routes(ctx)).run(addr).await;
}
