use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use time::OffsetDateTime;
use uuid::Uuid;

use crate::annotations::repo::Annotation;
use crate::categories::Category;
use crate::images::repo::Image;

/// Project record in the database.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct Project {
    pub id: Uuid,
    pub user_id: Uuid,
    pub name: String,
    /// Storage folder fixed at creation and unique; blobs live under `{folder}/`.
    pub folder: String,
    pub created_at: OffsetDateTime,
}

/// Values for a new `projects` row.
#[derive(Debug, Clone, Copy)]
pub struct NewProjectRow<'a> {
    pub id: Uuid,
    pub user_id: Uuid,
    pub name: &'a str,
    pub folder: &'a str,
}

/// One image with its annotations in insertion order.
#[derive(Debug, Clone)]
pub struct ImageNode {
    pub image: Image,
    pub annotations: Vec<Annotation>,
}

/// Everything a project owns, as loaded from the database.
#[derive(Debug, Clone)]
pub struct ProjectGraph {
    pub project: Project,
    pub categories: Vec<Category>,
    pub images: Vec<ImageNode>,
}

impl ProjectGraph {
    /// Attach each annotation to its image, keeping both orders.
    pub fn assemble(
        project: Project,
        categories: Vec<Category>,
        images: Vec<Image>,
        annotations: Vec<Annotation>,
    ) -> Self {
        let mut nodes: Vec<ImageNode> = images
            .into_iter()
            .map(|image| ImageNode {
                image,
                annotations: Vec::new(),
            })
            .collect();
        let index: std::collections::HashMap<Uuid, usize> = nodes
            .iter()
            .enumerate()
            .map(|(i, n)| (n.image.id, i))
            .collect();

        for a in annotations {
            if let Some(&i) = index.get(&a.image_id) {
                nodes[i].annotations.push(a);
            }
        }

        Self {
            project,
            categories,
            images: nodes,
        }
    }

    pub fn annotation_count(&self) -> usize {
        self.images.iter().map(|n| n.annotations.len()).sum()
    }
}
