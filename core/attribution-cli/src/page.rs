//! One simulated page load: config + store + navigation → tracker.

use std::path::PathBuf;

use attribution_core::{
    default_store_path, FileStore, Navigation, Result, Tracker, TrackerConfig,
};
use clap::Args;
use tracing::debug;

#[derive(Args, Debug)]
pub struct PageArgs {
    /// Full URL of the page being visited
    #[arg(long, value_name = "URL")]
    pub url: String,

    /// Referrer the browser reported for this visit
    #[arg(long, value_name = "URL")]
    pub referrer: Option<String>,
}

#[derive(Args, Debug)]
pub struct StorageArgs {
    /// Config file (defaults to the platform config directory)
    #[arg(long, global = true, value_name = "PATH")]
    pub config: Option<PathBuf>,

    /// Attribution store file (defaults to the platform data directory)
    #[arg(long, global = true, value_name = "PATH")]
    pub store: Option<PathBuf>,
}

pub fn open_tracker(page: &PageArgs, storage: &StorageArgs) -> Result<Tracker<FileStore>> {
    let config = TrackerConfig::load(storage.config.as_deref())?;
    let store_path = match &storage.store {
        Some(path) => path.clone(),
        None => default_store_path()?,
    };
    debug!(store = %store_path.display(), "Opening attribution store");

    let navigation = Navigation::new(&page.url, page.referrer.as_deref())?;
    Ok(Tracker::new(config, navigation, FileStore::load(&store_path)))
}

/// Prints the resolved record as a single JSON line.
pub fn resolve(page: &PageArgs, storage: &StorageArgs) -> Result<()> {
    let mut tracker = open_tracker(page, storage)?;
    println!("{}", tracker.attribution().to_value());
    Ok(())
}

/// Prints each rewritten embed URL on its own line, in input order.
pub fn augment(page: &PageArgs, storage: &StorageArgs, embeds: &[String]) -> Result<()> {
    let mut tracker = open_tracker(page, storage)?;
    let record = tracker.attribution();
    let page_url = tracker.resolver().navigation().page_url();
    let rewritten = attribution_core::augment_all(embeds, &record, page_url)?;
    for url in rewritten {
        println!("{}", url);
    }
    Ok(())
}
