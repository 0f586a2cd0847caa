use tracing::info;
use tsuzuri_api_types::{PostStatusRequest, PostWriteRequest};

use crate::domain::entities::BlogPost;
use crate::domain::error::DomainError;
use crate::domain::placeholders::Placeholder;
use crate::domain::posts::{apply_transition, validate_image_url, validate_post};
use crate::domain::slug::{generate_unique_slug, validate_slug};
use crate::domain::types::PostStatus;

use super::service::PostService;
use super::types::{PostServiceError, apply_write_fields, canonical_image_keys};

const SOURCE: &str = "application::posts::commands";

impl PostService {
    /// Manual-entry path. Without a slug one is derived from the title.
    ///
    /// A non-draft `status` goes through the same transition rules as
    /// [`PostService::set_status`].
    pub async fn create_manual(&self, request: PostWriteRequest) -> Result<BlogPost, PostServiceError> {
        let today = self.today();
        let default_author = self.default_author.clone();

        let post = self
            .store
            .mutate(move |collection| {
                let slug = match request.slug.as_deref().map(str::trim) {
                    Some(slug) if !slug.is_empty() => {
                        validate_slug(slug)?;
                        if collection.contains(slug) {
                            return Err(DomainError::duplicate_slug(slug).into());
                        }
                        slug.to_string()
                    }
                    _ => generate_unique_slug(&request.title, |candidate| {
                        !collection.contains(candidate)
                    })?,
                };

                let mut post = BlogPost::draft(slug, String::new(), String::new());
                apply_write_fields(&mut post, &request, &default_author);
                canonical_image_keys(&mut post)?;
                if request.status == PostStatus::Draft {
                    post.publish_date = request.publish_date;
                } else {
                    apply_transition(&mut post, request.status, request.publish_date, today)?;
                }
                validate_post(&post)?;

                collection.insert(post.clone())?;
                Ok::<_, PostServiceError>(post)
            })
            .await?;

        info!(target = SOURCE, slug = %post.slug, status = %post.status, "post created");
        self.notifier.post_upserted(&post.slug).await;
        self.reload(&post.slug).await
    }

    /// Replace every editable field of an existing post.
    ///
    /// `slug` and `createdAt` are kept. Image bindings whose placeholder no
    /// longer appears in the new content are dropped.
    pub async fn update_full_record(
        &self,
        slug: &str,
        request: PostWriteRequest,
    ) -> Result<BlogPost, PostServiceError> {
        let today = self.today();
        let default_author = self.default_author.clone();
        let key = slug.to_string();

        let post = self
            .store
            .mutate(move |collection| {
                let current = collection
                    .find(&key)
                    .cloned()
                    .ok_or_else(|| PostServiceError::not_found(&key))?;

                let mut next = current.clone();
                apply_write_fields(&mut next, &request, &default_author);
                canonical_image_keys(&mut next)?;
                next.prune_stale_images();

                if request.status == current.status {
                    next.publish_date = request.publish_date;
                } else {
                    apply_transition(&mut next, request.status, request.publish_date, today)?;
                }
                validate_post(&next)?;

                let slot = collection
                    .find_mut(&key)
                    .ok_or_else(|| PostServiceError::not_found(&key))?;
                *slot = next.clone();
                Ok::<_, PostServiceError>(next)
            })
            .await?;

        info!(target = SOURCE, slug = %post.slug, status = %post.status, "post updated");
        self.notifier.post_upserted(&post.slug).await;
        self.reload(&post.slug).await
    }

    /// Permanently remove a post. Unknown slugs trigger no invalidation.
    pub async fn delete(&self, slug: &str) -> Result<BlogPost, PostServiceError> {
        let key = slug.to_string();
        let removed = self
            .store
            .mutate(move |collection| {
                collection
                    .remove(&key)
                    .ok_or_else(|| PostServiceError::not_found(&key))
            })
            .await?;

        info!(target = SOURCE, slug = %removed.slug, "post deleted");
        self.notifier.post_deleted(&removed.slug).await;
        Ok(removed)
    }

    /// Move a post through the publication state machine.
    pub async fn set_status(
        &self,
        slug: &str,
        request: PostStatusRequest,
    ) -> Result<BlogPost, PostServiceError> {
        let today = self.today();
        let key = slug.to_string();

        let (from, post) = self
            .store
            .mutate(move |collection| {
                let post = collection
                    .find_mut(&key)
                    .ok_or_else(|| PostServiceError::not_found(&key))?;
                let from = post.status;
                let mut next = post.clone();
                apply_transition(&mut next, request.status, request.publish_date, today)?;
                validate_post(&next)?;
                *post = next.clone();
                Ok::<_, PostServiceError>((from, next))
            })
            .await?;

        info!(
            target = SOURCE,
            slug = %post.slug,
            from = %from,
            to = %post.status,
            publish_date = ?post.publish_date,
            "post status changed"
        );
        self.notifier.post_upserted(&post.slug).await;
        self.reload(&post.slug).await
    }

    /// Bind an image URL to a placeholder present in the post content.
    pub async fn bind_image(
        &self,
        slug: &str,
        placeholder: &str,
        url: &str,
    ) -> Result<BlogPost, PostServiceError> {
        let url = url.trim().to_string();
        validate_image_url(&url)?;
        let placeholder = parse_placeholder(placeholder)?;
        let key = slug.to_string();

        let post = self
            .store
            .mutate(move |collection| {
                let post = collection
                    .find_mut(&key)
                    .ok_or_else(|| PostServiceError::not_found(&key))?;
                if !post.placeholders().contains(&placeholder) {
                    return Err(DomainError::UnknownPlaceholder {
                        placeholder: placeholder.key(),
                    }
                    .into());
                }
                post.images.insert(placeholder.key(), url);
                Ok::<_, PostServiceError>(post.clone())
            })
            .await?;

        info!(target = SOURCE, slug = %post.slug, placeholder = %placeholder, "image bound");
        self.notifier.post_upserted(&post.slug).await;
        self.reload(&post.slug).await
    }

    /// Remove an image binding. Visible posts must stay fully bound.
    pub async fn unbind_image(
        &self,
        slug: &str,
        placeholder: &str,
    ) -> Result<BlogPost, PostServiceError> {
        let placeholder = parse_placeholder(placeholder)?;
        let key = slug.to_string();

        let post = self
            .store
            .mutate(move |collection| {
                let post = collection
                    .find_mut(&key)
                    .ok_or_else(|| PostServiceError::not_found(&key))?;
                let mut next = post.clone();
                next.images.remove(&placeholder.key());
                validate_post(&next)?;
                *post = next.clone();
                Ok::<_, PostServiceError>(next)
            })
            .await?;

        info!(target = SOURCE, slug = %post.slug, placeholder = %placeholder, "image unbound");
        self.notifier.post_upserted(&post.slug).await;
        self.reload(&post.slug).await
    }

    /// Re-read a committed post so callers see the stamped timestamps.
    async fn reload(&self, slug: &str) -> Result<BlogPost, PostServiceError> {
        self.get_by_slug(slug).await
    }
}

fn parse_placeholder(value: &str) -> Result<Placeholder, PostServiceError> {
    Placeholder::from_key(value).ok_or_else(|| {
        DomainError::UnknownPlaceholder {
            placeholder: value.to_string(),
        }
        .into()
    })
}
