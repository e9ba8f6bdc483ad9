//! Mask path resolution.
//!
//! Masks for a well live under
//! `{fileset}/{subdir}/{plate-prefix}/{row}{col}_s{field}_{Kind}Outlines.png`
//! where the plate prefix is the plate name without the corrected-plate
//! suffix, the row is the lowercased row label, the column is the column
//! label padded to two digits and the field is one-based.

use crate::config::LayoutConfig;
use crate::model::Well;
use crate::{Error, Result};
use std::fmt;
use std::path::PathBuf;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MaskKind {
    Cell,
    Nuclei,
}

impl MaskKind {
    fn as_str(self) -> &'static str {
        match self {
            MaskKind::Cell => "Cell",
            MaskKind::Nuclei => "Nuclei",
        }
    }
}

impl fmt::Display for MaskKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// The two masks of one field.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MaskPaths {
    pub cell: PathBuf,
    pub nuclei: PathBuf,
}

#[derive(Debug, Clone)]
pub struct MaskLayout {
    root: PathBuf,
    plate_suffix: String,
}

impl MaskLayout {
    pub fn new(root: impl Into<PathBuf>, plate_suffix: impl Into<String>) -> Self {
        MaskLayout {
            root: root.into(),
            plate_suffix: plate_suffix.into(),
        }
    }

    pub fn from_config(layout: &LayoutConfig) -> Self {
        Self::new(
            layout.fileset_path.join(&layout.segmentation_subdir),
            layout.plate_suffix.clone(),
        )
    }

    pub fn root(&self) -> &std::path::Path {
        &self.root
    }

    pub fn plate_prefix<'a>(&self, plate_name: &'a str) -> Result<&'a str> {
        plate_name
            .strip_suffix(self.plate_suffix.as_str())
            .ok_or_else(|| Error::UnexpectedPlateName {
                name: plate_name.to_string(),
                suffix: self.plate_suffix.clone(),
            })
    }

    /// File path of one mask, without checking it exists.
    pub fn mask_path(&self, well: &Well, field: usize, kind: MaskKind) -> Result<PathBuf> {
        let prefix = self.plate_prefix(&well.plate.name)?;
        let file_name = format!(
            "{}_s{}_{}Outlines.png",
            well_position(well),
            field + 1,
            kind
        );
        Ok(self.root.join(prefix).join(file_name))
    }

    /// Paths of both masks of a field. Fails on the first missing file.
    pub fn resolve(&self, well: &Well, field: usize) -> Result<MaskPaths> {
        let cell = self.mask_path(well, field, MaskKind::Cell)?;
        let nuclei = self.mask_path(well, field, MaskKind::Nuclei)?;
        for path in [&cell, &nuclei] {
            if !path.exists() {
                return Err(Error::MissingMask(path.clone()));
            }
        }
        Ok(MaskPaths { cell, nuclei })
    }
}

/// Lowercased row label followed by the column label, e.g. `a01`.
pub fn well_position(well: &Well) -> String {
    let row = well.plate.row_label(well.row).to_lowercase();
    let column = well.plate.column_label(well.column);
    match column.parse::<u32>() {
        Ok(n) => format!("{}{:02}", row, n),
        Err(_) => format!("{}{}", row, column.to_lowercase()),
    }
}
