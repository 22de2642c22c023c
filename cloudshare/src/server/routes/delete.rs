use std::sync::Arc;

use axum::{
    extract::rejection::FormRejection,
    response::Redirect,
    Extension, Form,
};
use serde::Deserialize;
use share_storage::DeleteOutcome;
use tracing::{info, instrument, warn};

use crate::{server::Catalog, types::AppError};

#[derive(Debug, Deserialize)]
pub struct DeleteForm {
    url: Option<String>,
}

/// Deletes the object behind the submitted public URL, then returns to the index
#[instrument(skip(catalog, form))]
pub async fn handler(
    Extension(catalog): Extension<Arc<dyn Catalog>>,
    form: Result<Form<DeleteForm>, FormRejection>,
) -> Result<Redirect, AppError> {
    let url = form
        .ok()
        .and_then(|Form(form)| form.url)
        .map(|url| url.trim().to_string())
        .filter(|url| !url.is_empty())
        .ok_or_else(AppError::missing_url)?;

    let key = catalog.key_from_url(&url);
    if key.is_empty() {
        return Err(AppError::missing_url());
    }
    if !is_managed(key, catalog.key_prefix()) {
        warn!("Refusing to delete {key} outside '{}/'", catalog.key_prefix());
        return Err(AppError::unmanaged_key());
    }

    match catalog.delete(key).await? {
        DeleteOutcome::Deleted => info!("Deleted {key}"),
        DeleteOutcome::AlreadyAbsent => info!("Nothing to delete for {key}"),
    }

    Ok(Redirect::to("/"))
}

/// Whether `key` lives strictly below `prefix/`
fn is_managed(key: &str, prefix: &str) -> bool {
    key.strip_prefix(prefix)
        .and_then(|rest| rest.strip_prefix('/'))
        .is_some_and(|name| !name.is_empty())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_is_managed() {
        assert!(is_managed("shots/abc.png", "shots"));
        assert!(!is_managed("unmanaged/readme.txt", "shots"));
        assert!(!is_managed("shotsabc.png", "shots"));
        assert!(!is_managed("shots/", "shots"));
        assert!(!is_managed("shots", "shots"));
    }
}
