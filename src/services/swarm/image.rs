//! Image provisioning
//!
//! Built images are tagged from their own name, pulled images from their
//! public tag. Either way the image ends up as `<registry>/<name>` and is
//! only tracked once the push succeeded.

use crate::domain::{Image, ImageSource, ValidationErrors};
use crate::error::HornetResult;
use crate::infra::{docker, BuildContext};

use super::SwarmEngine;

impl SwarmEngine {
    /// Build or pull an image, push it to the registry and start tracking it.
    ///
    /// `context` is the staging directory prepared for a build source (a
    /// fresh one is allocated when absent); it is removed before returning
    /// whatever the outcome. `archive_staged` tells the build to extract the
    /// uploaded archive first.
    pub async fn add_image(
        &self,
        image: &Image,
        context: Option<BuildContext>,
        archive_staged: bool,
        log_id: Option<&str>,
    ) -> HornetResult<Image> {
        let image = match self.admit_image(image).await {
            Ok(image) => image,
            Err(e) => {
                if let Some(context) = context {
                    self.builds.discard(context).await;
                }
                return Err(e);
            }
        };

        let source_ref = match image.source() {
            Some(ImageSource::Build(build)) => {
                let context = match context {
                    Some(context) => context,
                    None => self.builds.create().await?,
                };
                let has_archive = archive_staged || build.archive.is_some();
                self.builds
                    .build(context, &image.name, &build.dockerfile, has_archive, log_id)
                    .await?;
                image.name.clone()
            }
            Some(ImageSource::PublicTag(tag)) => {
                if let Some(context) = context {
                    self.builds.discard(context).await;
                }
                self.try_docker(
                    docker::pull(tag),
                    format!("Failed to pull public image \"{}\"", tag),
                    log_id,
                )
                .await?;
                tag.to_string()
            }
            // validated() guarantees exactly one source
            None => {
                let mut errors = ValidationErrors::new();
                errors.push("source", "image has no usable source");
                return Err(errors.into());
            }
        };

        let target = docker::registry_tag(&self.registry_address, &image.name);
        self.try_docker(
            docker::tag(&source_ref, &target),
            format!("Failed to tag image \"{}\" as \"{}\"", source_ref, target),
            log_id,
        )
        .await?;
        self.try_docker(
            docker::push(&target),
            format!("Failed to push image \"{}\"", target),
            log_id,
        )
        .await?;

        self.registry.images.insert(image.clone()).await;
        tracing::info!(image = %image.name, target = %target, "Image pushed to registry");
        Ok(image)
    }

    async fn admit_image(&self, image: &Image) -> HornetResult<Image> {
        let image = image.validated()?;
        self.registry.images.ensure_absent(&image.name).await?;
        Ok(image)
    }

    pub async fn remove_images(&self, names: &[String], log_id: Option<&str>) -> HornetResult<()> {
        self.remove_tracked(
            &self.registry.images,
            names,
            docker::image_rm(names, &self.registry_address),
            "images",
            log_id,
        )
        .await
    }
}
