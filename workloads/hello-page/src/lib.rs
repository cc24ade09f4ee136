//! Reference workload streaming an HTML page.
//!
//! This workload shows:
//! - Shell fragments queued as literal text
//! - An async status fragment resolved concurrently with the rest of the page
//! - A pre-chunked section forwarded as a sub-stream
//! - The output stream used directly as an `http::Response` body

use std::sync::Arc;
use std::time::Duration;

use anyhow::Result;
use fanin_sdk::prelude::*;
use http::header::CONTENT_TYPE;
use http::{Response, StatusCode};
use tracing::debug;

/// Content type of the streamed page.
pub const HTML_CONTENT_TYPE: &str = "text/html; charset=utf-8";

async fn fetch_status_message() -> Result<String> {
    tokio::time::sleep(Duration::from_millis(10)).await;
    Ok("ready to stream".to_string())
}

/// Minimal escaping for text interpolated into the page.
fn html_escape(s: &str) -> String {
    s.replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
        .replace('"', "&quot;")
}

/// Queue the home page for `name`.
pub fn home_page(name: &str) -> StreamBuilder {
    let mut builder = StreamBuilder::from_iter([
        Source::from("<!doctype html><html><head><meta charset=\"utf-8\"><title>"),
        Source::from(format!("Welcome {}", html_escape(name))),
        Source::from("</title></head><body>"),
    ]);

    builder
        .push(Source::factory(|| {
            Source::try_deferred(async {
                let status = fetch_status_message().await?;
                Ok::<_, anyhow::Error>(format!("<p>{}</p>", status))
            })
        }))
        .push(Source::iter([
            "<section>",
            "<p>Fragments look like tidy chunks.</p>",
            "</section>",
        ]))
        .push("<footer>powered by fanin</footer>");

    builder.push("</body></html>");
    builder
}

/// Render the home page as an output stream.
pub fn render_home_page(name: &str) -> OutputStream {
    let builder = home_page(name);
    debug!(sources = builder.len(), "rendering home page");
    builder.build()
}

/// Render the home page as a streaming HTTP response.
pub fn home_page_response(name: Option<&str>) -> Result<Response<OutputStream>> {
    let name = name.unwrap_or("visitor");
    let body = home_page(name)
        .with_observer(Arc::new(TracingObserver::new("home")))
        .build();

    Ok(Response::builder()
        .status(StatusCode::OK)
        .header(CONTENT_TYPE, HTML_CONTENT_TYPE)
        .body(body)?)
}
