//! Workflow tests against an in-memory repository.
//!
//! Mask files are created in a temporary fileset directory; the fake
//! repository records every upload, annotation and link call.

use idr_mask_upload::config::Config;
use idr_mask_upload::masks::MaskLayout;
use idr_mask_upload::model::{
    FileAnnotation, ImageRef, NamingConvention, OriginalFile, Plate, Screen, Well,
};
use idr_mask_upload::repository::Repository;
use idr_mask_upload::workflow::{
    get_corrected_wells, process_well, run, upload_and_link, RunOptions, RunSummary,
};
use idr_mask_upload::{Error, Result};
use std::cell::RefCell;
use std::fs;
use std::path::{Path, PathBuf};
use std::rc::Rc;
use tempfile::TempDir;

#[derive(Debug, Clone, PartialEq)]
enum Call {
    Upload { path: PathBuf, dir: String, mimetype: String },
    Annotate { file_id: i64, namespace: String },
    Link { image_id: i64, annotation_id: i64 },
}

struct FakeRepository {
    screen: Screen,
    plates: Vec<Plate>,
    /// (plate id, row, column, image count)
    wells: Vec<(i64, usize, usize, usize)>,
    calls: RefCell<Vec<Call>>,
    next_id: RefCell<i64>,
}

impl FakeRepository {
    fn new(plate_names: &[&str]) -> Self {
        let plates = plate_names
            .iter()
            .enumerate()
            .map(|(i, name)| Plate {
                id: i as i64 + 1,
                name: name.to_string(),
                row_naming: NamingConvention::Letter,
                column_naming: NamingConvention::Number,
            })
            .collect();
        FakeRepository {
            screen: Screen {
                id: 1,
                name: "idr0033-rohban-pathways/screenA".into(),
            },
            plates,
            wells: Vec::new(),
            calls: RefCell::new(Vec::new()),
            next_id: RefCell::new(1000),
        }
    }

    fn with_well(mut self, plate_id: i64, row: usize, column: usize, images: usize) -> Self {
        self.wells.push((plate_id, row, column, images));
        self
    }

    fn id(&self) -> i64 {
        let mut next = self.next_id.borrow_mut();
        *next += 1;
        *next
    }

    fn calls(&self) -> Vec<Call> {
        self.calls.borrow().clone()
    }

    fn count(&self, pred: impl Fn(&Call) -> bool) -> usize {
        self.calls.borrow().iter().filter(|c| pred(*c)).count()
    }
}

impl Repository for FakeRepository {
    fn find_screen(&self, name: &str) -> Result<Screen> {
        if name == self.screen.name {
            Ok(self.screen.clone())
        } else {
            Err(Error::ScreenNotFound(name.to_string()))
        }
    }

    fn list_plates(&self, _screen: &Screen) -> Result<Vec<Plate>> {
        Ok(self.plates.clone())
    }

    fn list_wells(&self, plate: &Plate) -> Result<Vec<Well>> {
        let parent = Rc::new(plate.clone());
        Ok(self
            .wells
            .iter()
            .filter(|(pid, ..)| *pid == plate.id)
            .map(|&(_, row, column, images)| Well {
                id: (row * 100 + column) as i64,
                row,
                column,
                images: (0..images)
                    .map(|f| {
                        Some(ImageRef {
                            id: plate.id * 10_000 + (row * 100 + column) as i64 * 10 + f as i64,
                            name: None,
                        })
                    })
                    .collect(),
                plate: Rc::clone(&parent),
            })
            .collect())
    }

    fn upload_file(&self, path: &Path, dir: &str, mimetype: &str) -> Result<OriginalFile> {
        self.calls.borrow_mut().push(Call::Upload {
            path: path.to_path_buf(),
            dir: dir.to_string(),
            mimetype: mimetype.to_string(),
        });
        Ok(OriginalFile {
            id: self.id(),
            name: path.file_name().unwrap().to_string_lossy().into_owned(),
            path: dir.to_string(),
            mimetype: mimetype.to_string(),
        })
    }

    fn create_file_annotation(
        &self,
        file: &OriginalFile,
        namespace: &str,
    ) -> Result<FileAnnotation> {
        self.calls.borrow_mut().push(Call::Annotate {
            file_id: file.id,
            namespace: namespace.to_string(),
        });
        Ok(FileAnnotation {
            id: self.id(),
            namespace: namespace.to_string(),
            file_id: file.id,
        })
    }

    fn link_annotation(&self, image: &ImageRef, annotation: &FileAnnotation) -> Result<()> {
        self.calls.borrow_mut().push(Call::Link {
            image_id: image.id,
            annotation_id: annotation.id,
        });
        Ok(())
    }
}

/// Config pointing the fileset at a temporary directory.
fn config_in(dir: &TempDir) -> Config {
    let mut config = Config::default();
    config.layout.fileset_path = dir.path().to_path_buf();
    config
}

fn seg_root(config: &Config) -> PathBuf {
    config
        .layout
        .fileset_path
        .join(&config.layout.segmentation_subdir)
}

/// Create both masks for fields `1..=fields` of a well.
fn write_masks(config: &Config, prefix: &str, pos: &str, fields: usize) {
    let dir = seg_root(config).join(prefix);
    fs::create_dir_all(&dir).unwrap();
    for field in 1..=fields {
        for kind in ["Cell", "Nuclei"] {
            fs::write(dir.join(format!("{pos}_s{field}_{kind}Outlines.png")), b"\x89PNG").unwrap();
        }
    }
}

#[test]
fn uncorrected_plates_are_excluded() {
    let dir = TempDir::new().unwrap();
    let config = config_in(&dir);
    let repo = FakeRepository::new(&["41744", "41744_illum_corrected", "41745_other"])
        .with_well(1, 0, 0, 9)
        .with_well(2, 0, 0, 9)
        .with_well(2, 0, 1, 9)
        .with_well(3, 0, 0, 9);

    let corrected = get_corrected_wells(&repo, &config.layout).unwrap();
    assert_eq!(corrected.plates_skipped, 2);
    assert_eq!(corrected.wells.len(), 2);
    assert!(corrected
        .wells
        .iter()
        .all(|w| w.plate.name == "41744_illum_corrected"));
}

#[test]
fn unknown_screen_aborts_discovery() {
    let dir = TempDir::new().unwrap();
    let mut config = config_in(&dir);
    config.layout.screen_name = "idr0000/screenZ".into();
    let repo = FakeRepository::new(&["41744_illum_corrected"]);

    let err = get_corrected_wells(&repo, &config.layout).unwrap_err();
    assert!(matches!(err, Error::ScreenNotFound(name) if name == "idr0000/screenZ"));
}

#[test]
fn upload_and_link_uses_configured_namespace_and_mimetype() {
    let dir = TempDir::new().unwrap();
    let config = config_in(&dir);
    let repo = FakeRepository::new(&[]);
    let image = ImageRef { id: 42, name: None };
    let path = dir.path().join("a01_s1_CellOutlines.png");

    let annotation = upload_and_link(&repo, &config.upload, &path, &image).unwrap();

    let calls = repo.calls();
    assert_eq!(calls.len(), 3);
    assert_eq!(
        calls[0],
        Call::Upload {
            path: path.clone(),
            dir: "/data/OMERO".into(),
            mimetype: "image/png".into(),
        }
    );
    assert!(matches!(
        &calls[1],
        Call::Annotate { namespace, .. } if namespace == "openmicroscopy.org/idr/analysis/original"
    ));
    assert_eq!(
        calls[2],
        Call::Link { image_id: 42, annotation_id: annotation.id }
    );
}

#[test]
fn well_uploads_both_masks_for_every_field() {
    let dir = TempDir::new().unwrap();
    let config = config_in(&dir);
    write_masks(&config, "platefoo", "b13", 9);
    let repo = FakeRepository::new(&["platefoo_illum_corrected"]).with_well(1, 1, 12, 9);
    let wells = repo.list_wells(&repo.plates[0]).unwrap();
    let layout = MaskLayout::from_config(&config.layout);
    let mut summary = RunSummary::default();

    process_well(&repo, &config, &layout, &wells[0], false, &mut summary).unwrap();

    assert_eq!(repo.count(|c| matches!(c, Call::Upload { .. })), 18);
    assert_eq!(repo.count(|c| matches!(c, Call::Link { .. })), 18);
    assert_eq!(summary.annotations_linked, 18);
    assert_eq!(summary.masks_verified, 18);
    assert_eq!(summary.wells_processed, 1);

    // Field index 2 uploads cell then nuclei mask, both linked to the third image.
    let uploads: Vec<PathBuf> = repo
        .calls()
        .into_iter()
        .filter_map(|c| match c {
            Call::Upload { path, .. } => Some(path),
            _ => None,
        })
        .collect();
    let root = seg_root(&config).join("platefoo");
    assert_eq!(uploads[4], root.join("b13_s3_CellOutlines.png"));
    assert_eq!(uploads[5], root.join("b13_s3_NucleiOutlines.png"));

    let third_image = wells[0].image(2).unwrap().id;
    assert_eq!(
        repo.count(|c| matches!(c, Call::Link { image_id, .. } if *image_id == third_image)),
        2
    );
}

#[test]
fn dry_run_checks_masks_without_uploading() {
    let dir = TempDir::new().unwrap();
    let config = config_in(&dir);
    write_masks(&config, "platefoo", "a01", 9);
    let repo = FakeRepository::new(&["platefoo_illum_corrected"]).with_well(1, 0, 0, 9);

    let summary = run(&repo, &config, RunOptions { dry_run: true, progress: false }).unwrap();

    assert!(repo.calls().is_empty());
    assert_eq!(summary.wells_processed, 1);
    assert_eq!(summary.masks_verified, 18);
    assert_eq!(summary.annotations_linked, 0);
}

#[test]
fn dry_run_still_aborts_on_missing_mask() {
    let dir = TempDir::new().unwrap();
    let config = config_in(&dir);
    write_masks(&config, "platefoo", "a01", 8);
    let repo = FakeRepository::new(&["platefoo_illum_corrected"]).with_well(1, 0, 0, 9);

    let err = run(&repo, &config, RunOptions { dry_run: true, progress: false }).unwrap_err();

    match err {
        Error::MissingMask(path) => assert!(path.ends_with("platefoo/a01_s9_CellOutlines.png")),
        other => panic!("expected a missing mask, got {other:?}"),
    }
    assert!(repo.calls().is_empty());
}

#[test]
fn missing_mask_stops_after_earlier_fields() {
    let dir = TempDir::new().unwrap();
    let config = config_in(&dir);
    write_masks(&config, "platefoo", "a01", 9);
    fs::remove_file(seg_root(&config).join("platefoo/a01_s4_NucleiOutlines.png")).unwrap();
    let repo = FakeRepository::new(&["platefoo_illum_corrected"]).with_well(1, 0, 0, 9);

    let err = run(&repo, &config, RunOptions::default()).unwrap_err();

    assert!(matches!(err, Error::MissingMask(_)));
    // Fields 1-3 were linked before field 4 failed its check.
    assert_eq!(repo.count(|c| matches!(c, Call::Link { .. })), 6);
}

#[test]
fn bad_well_halts_the_remaining_wells() {
    let dir = TempDir::new().unwrap();
    let config = config_in(&dir);
    write_masks(&config, "platefoo", "a02", 9);
    write_masks(&config, "platefoo", "a03", 9);
    let repo = FakeRepository::new(&["platefoo_illum_corrected"])
        .with_well(1, 0, 0, 9)
        .with_well(1, 0, 1, 9)
        .with_well(1, 0, 2, 9);

    let err = run(&repo, &config, RunOptions::default()).unwrap_err();

    match err {
        Error::MissingMask(path) => assert!(path.ends_with("platefoo/a01_s1_CellOutlines.png")),
        other => panic!("expected a missing mask, got {other:?}"),
    }
    assert!(repo.calls().is_empty());
}

#[test]
fn well_without_enough_images_is_fatal() {
    let dir = TempDir::new().unwrap();
    let config = config_in(&dir);
    write_masks(&config, "platefoo", "a01", 9);
    let repo = FakeRepository::new(&["platefoo_illum_corrected"]).with_well(1, 0, 0, 2);

    let err = run(&repo, &config, RunOptions::default()).unwrap_err();

    assert!(matches!(err, Error::MissingImage { field: 2, .. }));
    assert_eq!(repo.count(|c| matches!(c, Call::Link { .. })), 4);
}

#[test]
fn full_run_reports_counts() {
    let dir = TempDir::new().unwrap();
    let mut config = config_in(&dir);
    config.layout.fields_per_well = 2;
    write_masks(&config, "41744", "a01", 2);
    write_masks(&config, "41744", "h12", 2);
    let repo = FakeRepository::new(&["41744", "41744_illum_corrected"])
        .with_well(1, 0, 0, 2)
        .with_well(2, 0, 0, 2)
        .with_well(2, 7, 11, 2);

    let summary = run(&repo, &config, RunOptions::default()).unwrap();

    assert_eq!(
        summary,
        RunSummary {
            plates_skipped: 1,
            wells_processed: 2,
            masks_verified: 8,
            annotations_linked: 8,
        }
    );
}

#[test]
fn well_sample_without_image_is_not_filled_by_the_next_field() {
    let dir = TempDir::new().unwrap();
    let config = config_in(&dir);
    write_masks(&config, "platefoo", "a01", 9);
    let repo = FakeRepository::new(&["platefoo_illum_corrected"]).with_well(1, 0, 0, 9);
    let mut well = repo.list_wells(&repo.plates[0]).unwrap().remove(0);
    let next_field_image = well.image(2).unwrap().id;
    well.images[1] = None;
    let layout = MaskLayout::from_config(&config.layout);
    let mut summary = RunSummary::default();

    let err = process_well(&repo, &config, &layout, &well, false, &mut summary).unwrap_err();

    assert!(matches!(err, Error::MissingImage { field: 1, .. }));
    assert_eq!(repo.count(|c| matches!(c, Call::Link { .. })), 2);
    assert_eq!(
        repo.count(|c| matches!(c, Call::Link { image_id, .. } if *image_id == next_field_image)),
        0
    );
}
