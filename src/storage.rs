//! Locations: local paths, `file://` and S3 URLs.
//!
//! DataFusion resolves locations through the object stores registered on the
//! [`SessionContext`]. Local files work out of the box; S3 buckets get an
//! `AmazonS3` store configured from the usual `AWS_*` environment variables.

use std::collections::BTreeSet;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use datafusion::datasource::listing::ListingTableUrl;
use datafusion::prelude::SessionContext;
use futures::TryStreamExt;
use object_store::aws::AmazonS3Builder;
use object_store::path::Path as ObjectPath;
use object_store::{ObjectStore, PutPayload};
use tracing::{debug, info, warn};
use url::Url;

use crate::config::InputFormat;
use crate::error::{JobError, Result};

const S3_SCHEMES: [&str; 2] = ["s3", "s3a"];
const GLOB_CHARS: [char; 3] = ['*', '?', '['];

/// URL scheme of a location, `None` for a plain filesystem path.
pub fn scheme(location: &str) -> Option<&str> {
    let (scheme, _) = location.split_once("://")?;
    let valid = !scheme.is_empty()
        && scheme
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || matches!(c, '+' | '-' | '.'));
    valid.then_some(scheme)
}

pub fn is_s3(location: &str) -> bool {
    scheme(location).is_some_and(|s| S3_SCHEMES.contains(&s.to_ascii_lowercase().as_str()))
}

/// Registers one S3 store per bucket referenced by `locations`.
pub fn register_object_stores(ctx: &SessionContext, locations: &[&str]) -> Result<()> {
    let mut registered = BTreeSet::new();

    for location in locations.iter().copied().filter(|l| is_s3(l)) {
        let url = Url::parse(location).map_err(|e| JobError::Location {
            location: location.to_string(),
            message: e.to_string(),
        })?;
        let bucket = url.host_str().ok_or_else(|| JobError::Location {
            location: location.to_string(),
            message: "missing bucket name".to_string(),
        })?;
        let store_url = format!("{}://{}", url.scheme(), bucket);
        if !registered.insert(store_url.clone()) {
            continue;
        }

        let store = AmazonS3Builder::from_env()
            .with_bucket_name(bucket)
            .build()
            .map_err(|source| JobError::Storage {
                location: store_url.clone(),
                source,
            })?;
        let store_url = Url::parse(&store_url).map_err(|e| JobError::Location {
            location: location.to_string(),
            message: e.to_string(),
        })?;
        ctx.register_object_store(&store_url, Arc::new(store));
        info!(bucket, scheme = url.scheme(), "registered S3 object store");
    }

    Ok(())
}

/// Checks that a local input location exists before DataFusion is asked to
/// list it. Remote locations are left to the object store.
///
/// A directory without any file of the expected format only warns: DataFusion
/// reports the empty table itself.
pub fn validate_local_input(location: &str, format: InputFormat) -> Result<()> {
    let path = match scheme(location) {
        None => PathBuf::from(location),
        Some("file") => PathBuf::from(&location["file://".len()..]),
        Some(_) => return Ok(()),
    };

    if let Some(glob_start) = location_glob_start(&path) {
        let dir = glob_start.unwrap_or_else(|| Path::new("."));
        if !dir.is_dir() {
            return Err(JobError::Config(format!(
                "Input directory does not exist: {}",
                dir.display()
            )));
        }
        return Ok(());
    }

    if !path.exists() {
        return Err(JobError::Config(format!(
            "Input location does not exist: {}",
            path.display()
        )));
    }

    if path.is_dir() {
        let extension = match format {
            InputFormat::Parquet => "parquet",
            InputFormat::Csv | InputFormat::Auto => "csv",
        };
        let has_match = std::fs::read_dir(&path)
            .map_err(|e| JobError::Config(format!("Cannot list {}: {e}", path.display())))?
            .filter_map(|entry| entry.ok())
            .any(|entry| {
                entry
                    .path()
                    .extension()
                    .is_some_and(|ext| ext.eq_ignore_ascii_case(extension))
            });
        if !has_match {
            warn!(
                dir = %path.display(),
                extension,
                "input directory has no files with the expected extension"
            );
        }
    }

    Ok(())
}

/// For a globbed path, the directory that precedes the first glob segment.
fn location_glob_start(path: &Path) -> Option<Option<&Path>> {
    let text = path.to_str()?;
    let glob_at = text.find(|c| GLOB_CHARS.contains(&c))?;
    let dir = text[..glob_at].rfind('/').map(|slash| Path::new(&text[..slash.max(1)]));
    Some(dir)
}

/// Deletes every object under `location` so the next write replaces the
/// previous fact table instead of adding files next to it.
///
/// Returns the number of objects removed. Refuses to clear the root of a
/// store.
pub async fn clear_prefix(ctx: &SessionContext, location: &str) -> Result<usize> {
    let (store, prefix) = resolve_store(ctx, location)?;
    if prefix.as_ref().is_empty() {
        return Err(JobError::Location {
            location: location.to_string(),
            message: "refusing to overwrite the root of an object store".to_string(),
        });
    }

    let storage_err = |source: object_store::Error| JobError::Storage {
        location: location.to_string(),
        source,
    };

    let listing = store.list(Some(&prefix)).try_collect::<Vec<_>>().await;
    let mut doomed: Vec<ObjectPath> = match listing {
        Ok(objects) => objects.into_iter().map(|meta| meta.location).collect(),
        Err(object_store::Error::NotFound { .. }) => Vec::new(),
        Err(e) => return Err(storage_err(e)),
    };
    // Without a trailing slash the location may name a single object.
    if !location.ends_with('/') {
        match store.head(&prefix).await {
            Ok(meta) => doomed.push(meta.location),
            Err(object_store::Error::NotFound { .. }) => {}
            Err(e) => return Err(storage_err(e)),
        }
    }

    for path in &doomed {
        debug!(object = %path, "deleting previous output");
        store.delete(path).await.map_err(storage_err)?;
    }

    Ok(doomed.len())
}

/// Store and path prefix DataFusion uses for `location`.
fn resolve_store(
    ctx: &SessionContext,
    location: &str,
) -> Result<(Arc<dyn ObjectStore>, ObjectPath)> {
    let location_err = |message: String| JobError::Location {
        location: location.to_string(),
        message,
    };
    let url = ListingTableUrl::parse(location).map_err(|e| location_err(e.to_string()))?;
    let store = ctx
        .runtime_env()
        .object_store(url.object_store())
        .map_err(|e| location_err(e.to_string()))?;
    Ok((store, url.prefix().clone()))
}

/// Stores `bytes` as a single object.
///
/// A location ending in `file_name`'s extension names the object itself;
/// anything else is a directory-like prefix and the object goes under it.
pub async fn put_object(
    ctx: &SessionContext,
    location: &str,
    file_name: &str,
    bytes: Vec<u8>,
) -> Result<ObjectPath> {
    let (store, prefix) = resolve_store(ctx, location)?;
    let extension = Path::new(file_name).extension().unwrap_or_default();
    let names_object = !location.ends_with('/')
        && Path::new(location)
            .extension()
            .is_some_and(|ext| ext.eq_ignore_ascii_case(extension));
    let path = if names_object {
        prefix
    } else {
        prefix.child(file_name)
    };

    store
        .put(&path, PutPayload::from(bytes))
        .await
        .map_err(|source| JobError::Storage {
            location: location.to_string(),
            source,
        })?;
    debug!(object = %path, "stored object");
    Ok(path)
}
