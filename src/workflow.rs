//! The upload pipeline: discover corrected wells, resolve their masks and
//! attach each mask to the image of its field.
//!
//! Everything runs sequentially and the first error ends the run. Mask
//! existence is checked for every field even in dry-run mode.

use crate::config::{Config, LayoutConfig, UploadConfig};
use crate::masks::MaskLayout;
use crate::model::{FileAnnotation, ImageRef, Well};
use crate::repository::Repository;
use crate::ui;
use crate::{Error, Result};
use std::path::Path;

#[derive(Debug, Clone, Copy, Default)]
pub struct RunOptions {
    pub dry_run: bool,
    pub progress: bool,
}

/// Counts reported at the end of a run.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RunSummary {
    pub plates_skipped: usize,
    pub wells_processed: usize,
    pub masks_verified: usize,
    pub annotations_linked: usize,
}

/// Wells of the corrected plates, plus the number of plates skipped.
#[derive(Debug)]
pub struct CorrectedWells {
    pub wells: Vec<Well>,
    pub plates_skipped: usize,
}

pub fn get_corrected_wells<R: Repository>(
    repo: &R,
    layout: &LayoutConfig,
) -> Result<CorrectedWells> {
    let screen = repo.find_screen(&layout.screen_name)?;
    let mut wells = Vec::new();
    let mut plates_skipped = 0;
    for plate in repo.list_plates(&screen)? {
        if !plate.name.ends_with(&layout.plate_suffix) {
            log::info!("Skipping plate {}", plate.name);
            plates_skipped += 1;
            continue;
        }
        wells.extend(repo.list_wells(&plate)?);
    }
    Ok(CorrectedWells { wells, plates_skipped })
}

/// Upload `path`, wrap it in a file annotation and link it to `image`.
pub fn upload_and_link<R: Repository>(
    repo: &R,
    upload: &UploadConfig,
    path: &Path,
    image: &ImageRef,
) -> Result<FileAnnotation> {
    let file = repo.upload_file(path, &upload.data_dir, &upload.mimetype)?;
    log::debug!(
        "Stored {} as file {} under {} ({})",
        file.name,
        file.id,
        file.path,
        file.mimetype
    );
    let annotation = repo.create_file_annotation(&file, &upload.namespace)?;
    repo.link_annotation(image, &annotation)?;
    log::debug!(
        "Linked annotation {} to image {} {}",
        annotation.id,
        image.id,
        image.name.as_deref().unwrap_or("")
    );
    Ok(annotation)
}

pub fn process_well<R: Repository>(
    repo: &R,
    config: &Config,
    layout: &MaskLayout,
    well: &Well,
    dry_run: bool,
    summary: &mut RunSummary,
) -> Result<()> {
    log::info!(
        "Processing well {} of plate {}",
        well.well_pos(),
        well.plate.name
    );
    for field in 0..config.layout.fields_per_well {
        let paths = layout.resolve(well, field)?;
        summary.masks_verified += 2;
        if dry_run {
            continue;
        }
        let image = well.image(field).ok_or_else(|| Error::MissingImage {
            well: well.well_pos(),
            field,
        })?;
        for path in [&paths.cell, &paths.nuclei] {
            log::info!("Uploading and linking {}", path.display());
            upload_and_link(repo, &config.upload, path, image)?;
            summary.annotations_linked += 1;
        }
    }
    summary.wells_processed += 1;
    Ok(())
}

/// Process every corrected well of the configured screen.
pub fn run<R: Repository>(repo: &R, config: &Config, options: RunOptions) -> Result<RunSummary> {
    let layout = MaskLayout::from_config(&config.layout);
    log::debug!("Reading masks from {}", layout.root().display());

    let corrected = get_corrected_wells(repo, &config.layout)?;
    let mut summary = RunSummary {
        plates_skipped: corrected.plates_skipped,
        ..RunSummary::default()
    };

    let pb = ui::well_progress(corrected.wells.len(), options.progress);
    for well in &corrected.wells {
        pb.set_message(well.well_pos());
        process_well(repo, config, &layout, well, options.dry_run, &mut summary)?;
        pb.inc(1);
    }
    pb.finish_and_clear();
    Ok(summary)
}
