//! `mdl status` – one status poll for a job.

use anyhow::Result;
use mdl_core::backend::{Backend, HttpBackend};
use mdl_core::model::JobId;

pub async fn run_status(backend: &HttpBackend, id: &str) -> Result<()> {
    let job = JobId::new(id);
    let status = backend.check_status(&job).await?;
    println!("{:<20} {:<6} {:<12} {}", "JOB", "PCT", "STATUS", "ERROR");
    println!(
        "{:<20} {:<6} {:<12} {}",
        job.as_str(),
        status.percent.to_string(),
        status.status.as_deref().unwrap_or("-"),
        status.error.as_deref().unwrap_or("-")
    );
    Ok(())
}
