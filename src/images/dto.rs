use serde::Serialize;
use uuid::Uuid;

use super::repo::Image;

#[derive(Debug, Serialize)]
pub struct ImageItem {
    pub id: Uuid,
    pub url: String,
    pub filename: String,
    pub width: i32,
    pub height: i32,
}

impl From<Image> for ImageItem {
    fn from(i: Image) -> Self {
        Self {
            id: i.id,
            url: i.url,
            filename: i.filename,
            width: i.width,
            height: i.height,
        }
    }
}
