//! The scope page, embedded at compile time and served verbatim.

use axum::response::Html;

/// The fixed page document. Embedding it keeps the binary self-contained;
/// there is no templating and no per-request variation.
pub const PAGE_HTML: &str = include_str!("../../web/index.html");

/// Serves the scope page on the root path.
pub async fn serve_page() -> Html<&'static str> {
    Html(PAGE_HTML)
}
