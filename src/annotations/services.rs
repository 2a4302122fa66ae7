use tracing::{info, instrument};
use uuid::Uuid;

use super::dto::{AnnotationInput, AnnotationItem, CategoryItem};
use super::repo::{Annotation, BoxGeometry};
use crate::categories::Category;
use crate::error::{AppError, AppResult};
use crate::images::repo::Image;
use crate::state::AppState;

/// Rejects boxes that no consumer could draw.
pub fn validate_geometry(g: &BoxGeometry) -> AppResult<()> {
    let finite = [g.x, g.y, g.width, g.height].iter().all(|v| v.is_finite());
    if !finite {
        return Err(AppError::BadRequest("coordinates must be finite numbers".into()));
    }
    if g.width < 0.0 || g.height < 0.0 {
        return Err(AppError::BadRequest("width and height must not be negative".into()));
    }
    Ok(())
}

/// Replaces every annotation of an image with `inputs`.
///
/// Categories are looked up by name inside the image's own project, so an
/// annotation can never point at another project's category.
#[instrument(skip(st, inputs), fields(count = inputs.len()))]
pub async fn replace_annotations(
    st: &AppState,
    user_id: Uuid,
    image_id: Uuid,
    inputs: Vec<AnnotationInput>,
) -> AppResult<Vec<AnnotationItem>> {
    for input in &inputs {
        validate_geometry(&input.geometry())?;
    }

    let image = Image::find_for_user(&st.db, image_id, user_id)
        .await?
        .ok_or_else(|| AppError::not_found("Image", image_id))?;

    let mut tx = st.db.begin().await?;
    let removed = Annotation::delete_for_image_tx(&mut tx, image.id).await?;

    let mut out = Vec::with_capacity(inputs.len());
    for input in &inputs {
        let category = Category::find_by_name(&mut *tx, image.project_id, &input.category.name)
            .await?
            .ok_or_else(|| {
                AppError::BadRequest(format!("unknown category {:?}", input.category.name))
            })?;
        let row = Annotation::insert_tx(&mut tx, image.id, category.id, input.geometry()).await?;
        out.push(AnnotationItem::new(row, CategoryItem::from(&category)));
    }
    tx.commit().await?;

    info!(%image_id, removed, added = out.len(), "annotations replaced");
    Ok(out)
}
