use time::OffsetDateTime;
use tsuzuri_api_types::{PublicPost, PublicPostSummary};

use crate::domain::entities::BlogPost;
use crate::domain::placeholders::{UnboundPolicy, resolve};
use crate::domain::visibility::{is_new, is_visible, reference_day, visible_posts};

use super::service::PostService;
use super::types::PostServiceError;

impl PostService {
    /// Every stored post, in collection order.
    pub async fn list_all(&self) -> Result<Vec<BlogPost>, PostServiceError> {
        Ok(self.store.load().await?.into_posts())
    }

    pub async fn get_by_slug(&self, slug: &str) -> Result<BlogPost, PostServiceError> {
        self.store
            .load()
            .await?
            .find(slug)
            .cloned()
            .ok_or_else(|| PostServiceError::not_found(slug))
    }

    /// Visible posts at `reference`, newest first.
    pub async fn visible_at(&self, reference: OffsetDateTime) -> Result<Vec<BlogPost>, PostServiceError> {
        let collection = self.store.load().await?;
        Ok(visible_posts(collection.iter(), reference, self.offset)
            .into_iter()
            .cloned()
            .collect())
    }

    /// Public listing entries at the service clock's current instant.
    pub async fn public_listing(&self) -> Result<Vec<PublicPostSummary>, PostServiceError> {
        let reference = self.clock.now();
        let day = reference_day(reference, self.offset);
        Ok(self
            .visible_at(reference)
            .await?
            .iter()
            .map(|post| summarize(post, is_new(post, day)))
            .collect())
    }

    /// A single visible post with placeholders resolved. Hidden posts are
    /// reported as not found.
    pub async fn public_post(&self, slug: &str) -> Result<PublicPost, PostServiceError> {
        let day = reference_day(self.clock.now(), self.offset);
        let post = self.get_by_slug(slug).await?;
        if !is_visible(&post, day) {
            return Err(PostServiceError::not_found(slug));
        }

        Ok(PublicPost {
            summary: summarize(&post, is_new(&post, day)),
            description: post.description.clone(),
            keywords: post.keywords.clone(),
            tool_link: post.tool_link.clone(),
            content: resolve(&post.content, &post.images, UnboundPolicy::Remove),
        })
    }
}

fn summarize(post: &BlogPost, is_new: bool) -> PublicPostSummary {
    PublicPostSummary {
        slug: post.slug.clone(),
        title: post.title.clone(),
        excerpt: post.excerpt.clone(),
        category: post.category.clone(),
        tags: post.tags.clone(),
        author: post.author.clone(),
        publish_date: post.publish_date,
        read_time: post.read_time.clone(),
        hero_image: post.hero_image().map(str::to_string),
        is_new,
    }
}

#[cfg(test)]
mod tests {
    use std::collections::BTreeMap;
    use std::sync::Arc;

    use tempfile::TempDir;
    use time::macros::{date, datetime};
    use time::{Duration, UtcOffset};

    use super::*;
    use crate::application::repos::ManualClock;
    use crate::cache::InvalidationNotifier;
    use crate::domain::types::PostStatus;
    use crate::infra::store::PostStore;

    #[tokio::test]
    async fn public_post_hides_future_schedule_until_its_day() {
        let dir = TempDir::new().expect("tempdir");
        let store = Arc::new(PostStore::new(dir.path().join("posts.json")));
        let clock = Arc::new(ManualClock::new(datetime!(2026-10-18 10:00 UTC)));
        let service = PostService::new(
            store.clone(),
            InvalidationNotifier::disabled(),
            clock.clone(),
            UtcOffset::UTC,
            "Editorial Team",
        );

        store
            .mutate(|collection| {
                let mut post = BlogPost::draft("later", "Later", "[IMAGE_HERO] text [IMAGE_1]");
                post.status = PostStatus::Scheduled;
                post.publish_date = Some(date!(2026 - 10 - 19));
                post.images = BTreeMap::from([
                    ("hero".to_string(), "/media/h.png".to_string()),
                    ("1".to_string(), "/media/1.png".to_string()),
                ]);
                collection
                    .insert(post)
                    .map_err(PostServiceError::from)
            })
            .await
            .expect("seed");

        assert!(matches!(
            service.public_post("later").await,
            Err(PostServiceError::NotFound { .. })
        ));
        assert!(service.public_listing().await.expect("listing").is_empty());

        clock.advance(Duration::days(1));

        let post = service.public_post("later").await.expect("visible");
        assert!(post.content.contains("![hero image](/media/h.png)"));
        assert!(post.content.contains("![image 1](/media/1.png)"));
        assert!(post.summary.is_new);
        assert_eq!(service.public_listing().await.expect("listing").len(), 1);
    }
}
