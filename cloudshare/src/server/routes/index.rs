use std::sync::Arc;

use axum::{response::Html, Extension};
use tracing::instrument;

use crate::{
    server::{Catalog, PublishedLink},
    types::AppError,
};

/// Lists every published object, newest first
#[instrument(skip(catalog))]
pub async fn handler(
    Extension(catalog): Extension<Arc<dyn Catalog>>,
) -> Result<Html<String>, AppError> {
    let objects = catalog.list(catalog.key_prefix()).await?;

    let links: Vec<PublishedLink> = objects
        .iter()
        .map(|object| PublishedLink::new(catalog.as_ref(), &object.key))
        .collect();

    Ok(Html(render_index(&links)))
}

/// Renders the index page for `links`
#[must_use]
pub fn render_index(links: &[PublishedLink]) -> String {
    let mut page = String::from(
        "<!doctype html>\n<html>\n<head>\n<meta charset=\"utf-8\">\n<title>cloudshare</title>\n</head>\n<body>\n<h1>Shared files</h1>\n",
    );

    if links.is_empty() {
        page.push_str("<p>Nothing shared yet.</p>\n");
    }

    for link in links {
        let url = escape_html(&link.url);
        page.push_str("<div class=\"link\">\n");
        if link.is_image {
            page.push_str(&format!("<img src=\"{url}\" width=\"320\">\n"));
        } else if link.is_video {
            page.push_str(&format!(
                "<video src=\"{url}\" width=\"320\" controls></video>\n"
            ));
        }
        page.push_str(&format!("<a href=\"{url}\">{url}</a>\n"));
        page.push_str(&format!(
            "<form method=\"post\" action=\"/delete\"><input type=\"hidden\" name=\"url\" value=\"{url}\"><button type=\"submit\">Delete</button></form>\n"
        ));
        page.push_str("</div>\n");
    }

    page.push_str("</body>\n</html>\n");
    page
}

fn escape_html(value: &str) -> String {
    let mut escaped = String::with_capacity(value.len());
    for c in value.chars() {
        match c {
            '&' => escaped.push_str("&amp;"),
            '<' => escaped.push_str("&lt;"),
            '>' => escaped.push_str("&gt;"),
            '"' => escaped.push_str("&quot;"),
            '\'' => escaped.push_str("&#39;"),
            _ => escaped.push(c),
        }
    }
    escaped
}
