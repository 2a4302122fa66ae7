use std::collections::HashMap;

use serde::{Deserialize, Serialize};
use time::OffsetDateTime;
use tracing::warn;
use uuid::Uuid;

use super::repo_types::{Project, ProjectGraph};
use crate::annotations::dto::{AnnotationItem, CategoryItem};

/// One entry of the `classes` multipart field.
#[derive(Debug, Clone, Deserialize)]
pub struct ClassInput {
    pub name: String,
    pub color: String,
}

#[derive(Debug, Deserialize)]
pub struct RenameProjectRequest {
    pub name: String,
}

#[derive(Debug, Serialize)]
pub struct ProjectItem {
    pub id: Uuid,
    pub name: String,
    #[serde(with = "time::serde::rfc3339")]
    pub created_at: OffsetDateTime,
}

impl From<Project> for ProjectItem {
    fn from(p: Project) -> Self {
        Self {
            id: p.id,
            name: p.name,
            created_at: p.created_at,
        }
    }
}

#[derive(Debug, Serialize)]
pub struct ImageDetails {
    pub id: Uuid,
    pub url: String,
    pub filename: String,
    pub width: i32,
    pub height: i32,
    pub annotations: Vec<AnnotationItem>,
}

#[derive(Debug, Serialize)]
pub struct ProjectDetails {
    pub id: Uuid,
    pub name: String,
    #[serde(with = "time::serde::rfc3339")]
    pub created_at: OffsetDateTime,
    pub categories: Vec<CategoryItem>,
    pub images: Vec<ImageDetails>,
}

impl From<ProjectGraph> for ProjectDetails {
    fn from(graph: ProjectGraph) -> Self {
        let categories: Vec<CategoryItem> = graph.categories.iter().map(CategoryItem::from).collect();
        let by_id: HashMap<Uuid, &CategoryItem> = categories.iter().map(|c| (c.id, c)).collect();

        let images = graph
            .images
            .into_iter()
            .map(|node| {
                let annotations = node
                    .annotations
                    .into_iter()
                    .filter_map(|a| match by_id.get(&a.category_id) {
                        Some(c) => Some(AnnotationItem::new(a, (*c).clone())),
                        None => {
                            warn!(annotation_id = %a.id, "annotation without project category");
                            None
                        }
                    })
                    .collect();
                ImageDetails {
                    id: node.image.id,
                    url: node.image.url,
                    filename: node.image.filename,
                    width: node.image.width,
                    height: node.image.height,
                    annotations,
                }
            })
            .collect();

        Self {
            id: graph.project.id,
            name: graph.project.name,
            created_at: graph.project.created_at,
            categories,
            images,
        }
    }
}
