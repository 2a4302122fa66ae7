use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::repo::{Annotation, BoxGeometry};
use crate::categories::Category;

#[derive(Debug, Deserialize)]
pub struct CategoryRef {
    pub name: String,
}

/// One box as sent by the labelling client.
#[derive(Debug, Deserialize)]
pub struct AnnotationInput {
    pub x: f64,
    pub y: f64,
    pub width: f64,
    pub height: f64,
    pub category: CategoryRef,
}

impl AnnotationInput {
    pub fn geometry(&self) -> BoxGeometry {
        BoxGeometry {
            x: self.x,
            y: self.y,
            width: self.width,
            height: self.height,
        }
    }
}

#[derive(Debug, Serialize)]
pub struct AnnotationItem {
    pub id: Uuid,
    pub x: f64,
    pub y: f64,
    pub width: f64,
    pub height: f64,
    pub category: CategoryItem,
}

#[derive(Debug, Clone, Serialize)]
pub struct CategoryItem {
    pub id: Uuid,
    pub name: String,
    pub color: String,
}

impl From<&Category> for CategoryItem {
    fn from(c: &Category) -> Self {
        Self {
            id: c.id,
            name: c.name.clone(),
            color: c.color.clone(),
        }
    }
}

impl AnnotationItem {
    pub fn new(a: Annotation, category: CategoryItem) -> Self {
        Self {
            id: a.id,
            x: a.x,
            y: a.y,
            width: a.width,
            height: a.height,
            category,
        }
    }
}
