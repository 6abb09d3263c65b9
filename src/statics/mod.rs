//! Static files and HTML pages served from [`AppConfig::static_root`](crate::config::AppConfig).
//!
//! [`serve_static`] is a global middleware: a request whose path ends in a file extension
//! (`/css/site.css`) is answered with that file when it exists under the root. Anything
//! else, including a missing file, falls through to routing.
//!
//! [`render`] is for handlers: it finishes the response with an HTML page from the root.

use std::io;
use std::path::{Component, Path, PathBuf};

use tracing::debug;

use crate::context::Context;
use crate::exception::{Error, HttpException};
use crate::http::StatusCode;
use crate::router::HandlerResult;

/// Content type for a file, from its extension.
pub fn mime_type(path: &Path) -> &'static str {
    let Some(ext) = path.extension().and_then(|e| e.to_str()) else {
        return "application/octet-stream";
    };
    match ext.to_ascii_lowercase().as_str() {
        "html" | "htm" => "text/html",
        "css" => "text/css",
        "js" | "mjs" => "application/javascript",
        "json" => "application/json",
        "png" => "image/png",
        "jpg" | "jpeg" => "image/jpeg",
        "gif" => "image/gif",
        "svg" => "image/svg+xml",
        "ico" => "image/x-icon",
        "webp" => "image/webp",
        "woff" => "font/woff",
        "woff2" => "font/woff2",
        "pdf" => "application/pdf",
        "txt" => "text/plain",
        "xml" => "application/xml",
        "wasm" => "application/wasm",
        _ => "application/octet-stream",
    }
}

/// `true` when `path` ends in `.` followed by one or more ASCII alphanumerics.
fn has_extension(path: &str) -> bool {
    path.rsplit_once('.').is_some_and(|(_, ext)| {
        !ext.is_empty() && ext.chars().all(|c| c.is_ascii_alphanumeric())
    })
}

/// Joins a request path onto `root`. `None` if the path tries to leave the root.
fn resolve(root: &Path, path: &str) -> Option<PathBuf> {
    let mut resolved = root.to_path_buf();
    for component in Path::new(path.trim_start_matches('/')).components() {
        match component {
            Component::Normal(part) => resolved.push(part),
            Component::CurDir => {}
            Component::ParentDir | Component::RootDir | Component::Prefix(_) => return None,
        }
    }
    Some(resolved)
}

/// Global middleware serving files from the static root.
pub async fn serve_static(mut ctx: Context) -> HandlerResult {
    let Some(root) = ctx.app().static_root.clone() else {
        return Ok(ctx);
    };
    if !has_extension(ctx.request().path()) {
        return Ok(ctx);
    }
    let Some(file) = resolve(&root, ctx.request().path()) else {
        debug!(path = %ctx.request().path(), "static path escapes the root");
        return Ok(ctx);
    };

    match tokio::fs::read(&file).await {
        Ok(contents) => {
            ctx.response_mut()
                .header("Content-Type", mime_type(&file))
                .send(contents);
        }
        Err(e) => {
            debug!(file = %file.display(), error = %e, "static file not served");
        }
    }
    Ok(ctx)
}

/// Finishes the response with the HTML page `name` from the static root.
///
/// `.html` is appended when `name` has no extension, so `render(ctx, "index")` serves
/// `<root>/index.html`.
///
/// # Errors
///
/// `404 Not Found` when the page does not exist. An unexpected error when no static root
/// is configured or the file cannot be read.
pub async fn render(ctx: &mut Context, name: &str) -> Result<(), Error> {
    let Some(root) = ctx.app().static_root.clone() else {
        return Err(Error::unexpected("render called without a configured static_root"));
    };

    let name = if has_extension(name) {
        name.to_owned()
    } else {
        format!("{name}.html")
    };
    let Some(file) = resolve(&root, &name) else {
        return Err(HttpException::not_found(format!("Page {name} not found")).into());
    };

    let html = match tokio::fs::read(&file).await {
        Ok(html) => html,
        Err(e) if e.kind() == io::ErrorKind::NotFound => {
            return Err(HttpException::not_found(format!("Page {name} not found")).into());
        }
        Err(e) => return Err(e.into()),
    };

    ctx.response_mut()
        .status(StatusCode::OK)
        .header("Content-Type", "text/html")
        .send(html);
    Ok(())
}
