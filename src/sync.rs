use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::Context;
use indicatif::{ProgressBar, ProgressStyle};

use crate::download;
use crate::flickr::{Collection, MediaApi, MetadataKind};
use crate::index::ExistenceIndex;
use crate::metadata::{self, MetadataBundle};
use crate::model::{MediaRef, SizesDoc};
use crate::naming;
use crate::report::{self, ManifestEntry};

/// Pause between listing pages; the API enforces call quotas.
const PAGE_PAUSE: Duration = Duration::from_millis(500);

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RunSummary {
    pub downloaded: u64,
    pub skipped: u64,
    pub failed: u64,
}

/// Drives one mirroring run: page through the remote collection, skip items
/// the existence index already knows, download and annotate the rest, then
/// emit the listing page.
pub struct Syncer<A: MediaApi> {
    api: A,
    collection: Collection,
    root: PathBuf,
}

impl<A: MediaApi> Syncer<A> {
    pub fn new(api: A, output_directory: &Path, collection: Collection) -> Syncer<A> {
        Syncer {
            api,
            collection,
            root: output_directory.join(collection.dir_name()),
        }
    }

    pub async fn run(&self) -> anyhow::Result<RunSummary> {
        // Credentials are checked up front so a bad token fails the run
        // before any item is touched.
        let nsid = self
            .api
            .verify_credentials()
            .await
            .context("credential check failed")?;
        log::info!("authorized as {nsid}");

        let photos_dir = self.root.join("photos");
        let data_dir = self.root.join("data");
        std::fs::create_dir_all(&photos_dir)
            .with_context(|| format!("can't create {}", photos_dir.display()))?;
        std::fs::create_dir_all(&data_dir)
            .with_context(|| format!("can't create {}", data_dir.display()))?;

        // One scan up front; treated as the immutable skip-set for the run,
        // with completions added so in-run duplicates are skipped too.
        let mut index = ExistenceIndex::scan(&photos_dir);
        log::info!(
            "{count} items already in {dir}",
            count = index.len(),
            dir = photos_dir.display()
        );

        let mut summary = RunSummary::default();
        let mut manifest: Vec<ManifestEntry> = Vec::new();
        let mut progress: Option<ProgressBar> = None;
        let mut page = 1;

        loop {
            let listing = self
                .api
                .list_page(self.collection, page)
                .await
                .with_context(|| format!("fetching listing page {page}"))?;
            let pages = listing.pages.max(1);

            let bar = progress.get_or_insert_with(|| make_progress_bar(listing.total));

            for item in &listing.items {
                if !item.id.is_empty() && index.contains(&item.id) {
                    summary.skipped += 1;
                    bar.inc(1);
                    continue;
                }

                match self.process_item(item, &photos_dir, &data_dir).await {
                    Ok(entry) => {
                        index.insert(item.id.clone());
                        manifest.push(entry);
                        summary.downloaded += 1;
                    }
                    Err(e) => {
                        log::warn!("skipping item {id}: {e:#}", id = item.id);
                        summary.failed += 1;
                    }
                }
                bar.inc(1);
            }

            if page >= pages {
                break;
            }
            page += 1;
            tokio::time::sleep(PAGE_PAUSE).await;
        }

        if let Some(bar) = progress {
            bar.finish_and_clear();
        }

        // A broken listing page is reported but never costs downloaded files.
        if let Err(e) = report::write_index(&self.root, self.collection.dir_name(), &manifest) {
            log::error!("couldn't write index.html: {e:#}");
        }

        Ok(summary)
    }

    /// One item, end to end. Any error here is confined to the item: the
    /// caller logs it, counts it, and moves on.
    async fn process_item(
        &self,
        item: &MediaRef,
        photos_dir: &Path,
        data_dir: &Path,
    ) -> anyhow::Result<ManifestEntry> {
        if item.id.is_empty() {
            anyhow::bail!("malformed listing entry (no id)");
        }

        let stem = naming::filename_stem(item);

        // The sizes document doubles as input to representation selection,
        // so it is fetched before the binary.
        let sizes_doc = metadata::fetch_document(&self.api, MetadataKind::Sizes, &item.id).await;
        let parsed_sizes: Option<SizesDoc> = sizes_doc
            .as_ref()
            .and_then(|doc| serde_json::from_value(doc.clone()).ok());

        let source = download::choose_source(item, parsed_sizes.as_ref())
            .context("no downloadable representation")?;
        let file_name = download::fetch_to_disk(&self.api, item, &source, photos_dir, &stem).await?;
        log::info!("downloaded {file_name}");

        // Binary is safe on disk; from here on everything is best-effort.
        let info_doc = metadata::fetch_document(&self.api, MetadataKind::Info, &item.id).await;
        let exif_doc = metadata::fetch_document(&self.api, MetadataKind::Exif, &item.id).await;

        let mut bundle = MetadataBundle::default();
        for (kind, doc) in [
            (MetadataKind::Exif, &exif_doc),
            (MetadataKind::Info, &info_doc),
            (MetadataKind::Sizes, &sizes_doc),
        ] {
            if let Some(doc) = doc {
                bundle.set(kind, metadata::write_document(data_dir, &stem, kind, doc));
            }
        }

        Ok(ManifestEntry::from_run(
            item,
            &stem,
            &file_name,
            info_doc.as_ref(),
            bundle,
        ))
    }
}

fn make_progress_bar(total: u64) -> ProgressBar {
    let bar = if total > 0 {
        ProgressBar::new(total)
    } else {
        ProgressBar::no_length()
    };
    bar.set_style(
        ProgressStyle::with_template("{bar:40.cyan/blue} {pos}/{len} {msg}")
            .unwrap_or_else(|_| ProgressStyle::default_bar()),
    );
    bar
}
