use serde::{Deserialize, Serialize};

/// Fixed for COCO consumers; boxes here never describe crowds.
pub const ISCROWD: u8 = 0;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExportCategory {
    pub id: String,
    pub name: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExportImage {
    pub id: String,
    pub filename: String,
    pub width: i32,
    pub height: i32,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExportAnnotation {
    pub id: String,
    pub image_id: String,
    pub category_id: String,
    pub iscrowd: u8,
    pub area: f64,
    /// `[x, y, width, height]`
    pub bbox: [f64; 4],
}

/// Contents of `annotations.json`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AnnotationManifest {
    pub categories: Vec<ExportCategory>,
    pub images: Vec<ExportImage>,
    pub annotations: Vec<ExportAnnotation>,
}

/// Denormalized transfer form of one project.
///
/// `image_urls[i]` is where the bytes of `manifest.images[i]` live.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ExportRecord {
    pub name: String,
    #[serde(flatten)]
    pub manifest: AnnotationManifest,
    pub image_urls: Vec<String>,
}

impl ExportRecord {
    /// Splits off the parts that do not belong in the manifest.
    pub fn into_parts(self) -> (String, Vec<String>, AnnotationManifest) {
        (self.name, self.image_urls, self.manifest)
    }
}
