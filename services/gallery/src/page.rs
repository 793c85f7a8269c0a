//! Gallery page: a static document whose script polls `/photos` every
//! 10 seconds and renders one `<img>` per record from `/image/:id`.

use axum::response::Html;

pub const INDEX_HTML: &str = include_str!("../static/index.html");

/// Serve the gallery page
pub async fn index() -> Html<&'static str> {
    Html(INDEX_HTML)
}
