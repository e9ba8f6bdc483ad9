//! The remote operations the workflow needs from the imaging repository.
//! `api::ApiClient` is the HTTP implementation.

use crate::model::{FileAnnotation, ImageRef, OriginalFile, Plate, Screen, Well};
use crate::Result;
use std::path::Path;

pub trait Repository {
    /// Screen with exactly this name.
    fn find_screen(&self, name: &str) -> Result<Screen>;

    fn list_plates(&self, screen: &Screen) -> Result<Vec<Plate>>;

    fn list_wells(&self, plate: &Plate) -> Result<Vec<Well>>;

    /// Upload a local file into `dir` on the server.
    fn upload_file(&self, path: &Path, dir: &str, mimetype: &str) -> Result<OriginalFile>;

    /// Persist a file annotation wrapping an uploaded file.
    fn create_file_annotation(
        &self,
        file: &OriginalFile,
        namespace: &str,
    ) -> Result<FileAnnotation>;

    fn link_annotation(&self, image: &ImageRef, annotation: &FileAnnotation) -> Result<()>;
}
