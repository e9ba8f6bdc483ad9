//! Repository objects the upload workflow works with.
//!
//! These are the client-side views of screens, plates, wells and
//! annotations. The HTTP layer in `api` maps its wire types into them.

use serde::Deserialize;
use std::rc::Rc;

/// How a plate labels its rows or columns.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum NamingConvention {
    Letter,
    Number,
}

impl NamingConvention {
    /// Label for a zero-based index: `A..Z, AA, AB..` or `1, 2, 3..`.
    pub fn label(self, index: usize) -> String {
        match self {
            NamingConvention::Number => (index + 1).to_string(),
            NamingConvention::Letter => {
                let mut n = index + 1;
                let mut out = Vec::new();
                while n > 0 {
                    let rem = (n - 1) % 26;
                    out.push(b'A' + rem as u8);
                    n = (n - 1) / 26;
                }
                out.reverse();
                String::from_utf8_lossy(&out).into_owned()
            }
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Screen {
    pub id: i64,
    pub name: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Plate {
    pub id: i64,
    pub name: String,
    pub row_naming: NamingConvention,
    pub column_naming: NamingConvention,
}

impl Plate {
    pub fn row_label(&self, row: usize) -> String {
        self.row_naming.label(row)
    }

    pub fn column_label(&self, column: usize) -> String {
        self.column_naming.label(column)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImageRef {
    pub id: i64,
    pub name: Option<String>,
}

/// A well and the images of its fields, one entry per well sample. A
/// sample without an image keeps its slot so later fields do not shift.
#[derive(Debug, Clone)]
pub struct Well {
    pub id: i64,
    pub row: usize,
    pub column: usize,
    pub images: Vec<Option<ImageRef>>,
    pub plate: Rc<Plate>,
}

impl Well {
    /// Position as the repository displays it, e.g. `A1`.
    pub fn well_pos(&self) -> String {
        format!(
            "{}{}",
            self.plate.row_label(self.row),
            self.plate.column_label(self.column)
        )
    }

    pub fn image(&self, field: usize) -> Option<&ImageRef> {
        self.images.get(field).and_then(Option::as_ref)
    }
}

/// Server record of an uploaded file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OriginalFile {
    pub id: i64,
    pub name: String,
    pub path: String,
    pub mimetype: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileAnnotation {
    pub id: i64,
    pub namespace: String,
    pub file_id: i64,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn plate() -> Rc<Plate> {
        Rc::new(Plate {
            id: 1,
            name: "platefoo_illum_corrected".into(),
            row_naming: NamingConvention::Letter,
            column_naming: NamingConvention::Number,
        })
    }

    #[test]
    fn letter_labels_roll_over_after_z() {
        assert_eq!(NamingConvention::Letter.label(0), "A");
        assert_eq!(NamingConvention::Letter.label(25), "Z");
        assert_eq!(NamingConvention::Letter.label(26), "AA");
        assert_eq!(NamingConvention::Letter.label(27), "AB");
    }

    #[test]
    fn number_labels_are_one_based() {
        assert_eq!(NamingConvention::Number.label(0), "1");
        assert_eq!(NamingConvention::Number.label(23), "24");
    }

    #[test]
    fn well_pos_joins_row_and_column_labels() {
        let well = Well {
            id: 7,
            row: 1,
            column: 12,
            images: vec![],
            plate: plate(),
        };
        assert_eq!(well.well_pos(), "B13");
        assert!(well.image(0).is_none());
    }

    #[test]
    fn empty_sample_keeps_field_indices() {
        let well = Well {
            id: 8,
            row: 0,
            column: 0,
            images: vec![None, Some(ImageRef { id: 502, name: None })],
            plate: plate(),
        };
        assert!(well.image(0).is_none());
        assert_eq!(well.image(1).map(|i| i.id), Some(502));
        assert!(well.image(2).is_none());
    }
}
