//! `mdl info` – show media metadata.

use anyhow::Result;
use mdl_core::backend::HttpBackend;
use mdl_core::config::MdlConfig;
use mdl_core::session::{InfoView, NullObserver, Session, Thumbnail};
use std::sync::Arc;

pub async fn run_info(backend: HttpBackend, cfg: &MdlConfig, url: &str) -> Result<()> {
    let mut session = Session::new(Arc::new(backend), Arc::new(NullObserver), cfg);
    let info = session.fetch_info(url).await?;
    print_info(&info);
    Ok(())
}

pub(crate) fn print_info(info: &InfoView) {
    println!("{}", info.title);
    println!("  by {}", info.author);
    if !info.platform_label.is_empty() {
        println!("  platform: {}", info.platform_label);
    }
    if let Some(duration) = &info.duration {
        println!("  {duration}");
    }
    match &info.thumbnail {
        Thumbnail::Image(src) => println!("  thumbnail: {src}"),
        Thumbnail::InstagramPlaceholder => println!("  thumbnail: (instagram post)"),
        Thumbnail::Hidden => {}
    }
    if let Some(note) = &info.note {
        println!("  note: {note}");
    }
    if !info.alternatives.is_empty() {
        println!("  alternatives:");
        for alt in &info.alternatives {
            println!("    {alt}");
        }
    }
}
