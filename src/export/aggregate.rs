use std::collections::HashSet;

use sqlx::PgPool;
use tracing::{debug, instrument, warn};
use uuid::Uuid;

use super::types::{
    AnnotationManifest, ExportAnnotation, ExportCategory, ExportImage, ExportRecord, ISCROWD,
};
use crate::annotations::repo::Annotation;
use crate::categories::Category;
use crate::error::{AppError, AppResult};
use crate::images::repo::Image;
use crate::projects::repo::load_graph;
use crate::projects::repo_types::ProjectGraph;

/// Loads one project and flattens it into an [`ExportRecord`].
#[instrument(skip(db))]
pub async fn export_project_data(db: &PgPool, project_id: Uuid) -> AppResult<ExportRecord> {
    let graph = load_graph(db, project_id)
        .await?
        .ok_or_else(|| AppError::not_found("Project", project_id))?;
    debug!(
        images = graph.images.len(),
        annotations = graph.annotation_count(),
        "project graph loaded"
    );
    Ok(build_export_record(graph))
}

pub fn build_export_record(graph: ProjectGraph) -> ExportRecord {
    let ProjectGraph {
        project,
        categories,
        images,
    } = graph;

    let known: HashSet<Uuid> = categories.iter().map(|c| c.id).collect();

    let mut manifest = AnnotationManifest {
        categories: categories.iter().map(export_category).collect(),
        images: Vec::with_capacity(images.len()),
        annotations: Vec::new(),
    };
    let mut image_urls = Vec::with_capacity(images.len());

    for node in images {
        for a in &node.annotations {
            if !known.contains(&a.category_id) {
                warn!(
                    project_id = %project.id,
                    annotation_id = %a.id,
                    category_id = %a.category_id,
                    "annotation references a category outside its project"
                );
            }
            manifest.annotations.push(export_annotation(a));
        }
        image_urls.push(node.image.url.clone());
        manifest.images.push(export_image(&node.image));
    }

    ExportRecord {
        name: project.name.to_lowercase(),
        manifest,
        image_urls,
    }
}

fn export_category(c: &Category) -> ExportCategory {
    ExportCategory {
        id: c.id.to_string(),
        name: c.name.clone(),
    }
}

fn export_image(i: &Image) -> ExportImage {
    ExportImage {
        id: i.id.to_string(),
        filename: i.filename.clone(),
        width: i.width,
        height: i.height,
    }
}

fn export_annotation(a: &Annotation) -> ExportAnnotation {
    ExportAnnotation {
        id: a.id.to_string(),
        image_id: a.image_id.to_string(),
        category_id: a.category_id.to_string(),
        iscrowd: ISCROWD,
        area: a.width * a.height,
        bbox: [a.x, a.y, a.width, a.height],
    }
}
