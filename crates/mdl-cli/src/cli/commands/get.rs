//! `mdl get` – look up, download and report the link of one media URL.

use anyhow::{bail, Result};
use mdl_core::backend::HttpBackend;
use mdl_core::config::MdlConfig;
use mdl_core::model::{MediaFormat, Quality};
use mdl_core::session::{JobOutcome, Session};
use std::sync::Arc;

use super::info::print_info;
use crate::cli::terminal::TerminalObserver;

pub async fn run_get(
    backend: HttpBackend,
    cfg: &MdlConfig,
    url: &str,
    format: Option<MediaFormat>,
    quality: Option<String>,
) -> Result<()> {
    let mut session = Session::new(
        Arc::new(backend),
        Arc::new(TerminalObserver::default()),
        cfg,
    );
    if let Some(format) = format {
        session.select_format(format);
    }
    if let Some(quality) = quality {
        session.select_quality(Quality::new(quality));
    }

    let info = session.fetch_info(url).await?;
    print_info(&info);
    session.start_download(url).await?;

    // Direct links are presented by start_download; nothing to watch.
    let Some(job) = session.active_job().map(|j| j.id.clone()) else {
        return Ok(());
    };
    println!("job {job} ({})", session.format());

    let outcome = tokio::select! {
        outcome = session.wait() => outcome,
        _ = tokio::signal::ctrl_c() => None,
    };
    let Some(outcome) = outcome else {
        session.teardown();
        println!();
        bail!("interrupted; the job may still finish on the server (`mdl status {job}`)");
    };

    match outcome {
        JobOutcome::Complete(_) => Ok(()),
        JobOutcome::Failed { message, .. } => bail!("{message}"),
        JobOutcome::Cancelled => bail!("download of job {job} was cancelled"),
    }
}
