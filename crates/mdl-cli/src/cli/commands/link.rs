//! `mdl link` – print where a finished job's file can be fetched.

use anyhow::Result;
use mdl_core::backend::{Backend, HttpBackend};
use mdl_core::model::JobId;

pub async fn run_link(backend: &HttpBackend, id: &str) -> Result<()> {
    let artifact = backend.fetch_artifact(&JobId::new(id)).await?;
    println!("{}", backend.absolute_link(&artifact.download_url));
    println!("  save as: {}", artifact.suggested_filename());
    Ok(())
}
