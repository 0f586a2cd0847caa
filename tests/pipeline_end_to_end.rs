mod support;

use std::collections::HashSet;

use bytes::Bytes;
use futures::future::join_all;
use tempfile::TempDir;
use time::{Duration, macros::date};
use tsuzuri::application::generation::GenerateError;
use tsuzuri::application::posts::PostServiceError;
use tsuzuri::application::repos::GenerationError;
use tsuzuri::cache::PageKey;
use tsuzuri::domain::types::PostStatus;
use tsuzuri_api_types::{GeneratePostRequest, PostStatusRequest};

use support::{FOUR_PLACEHOLDER_ARTICLE, Pipeline, ScriptedGenerator, article_answer};

fn generate_request(topic: &str) -> GeneratePostRequest {
    GeneratePostRequest {
        topic: topic.to_string(),
        category: "workspace".to_string(),
        style: None,
    }
}

#[tokio::test]
async fn generated_post_goes_live_once_its_scheduled_day_arrives() {
    let dir = TempDir::new().expect("tempdir");
    let pipeline = Pipeline::new(
        dir.path(),
        ScriptedGenerator::answering(vec![Ok(article_answer(
            "Desk lighting that works",
            FOUR_PLACEHOLDER_ARTICLE,
        ))]),
    );

    let draft = pipeline
        .generation
        .generate(generate_request("Home office lighting"))
        .await
        .expect("generate");
    let slug = draft.post.slug.clone();
    assert_eq!(slug, "home-office-lighting");
    assert_eq!(draft.post.status, PostStatus::Draft);
    assert!(draft.post.images.is_empty());
    assert_eq!(draft.image_prompts.len(), 4);

    let uploads = join_all((0..4u8).map(|index| {
        pipeline.uploads.ingest(
            Some("photo.png"),
            Some("image/png"),
            Bytes::from(vec![index + 1; 32]),
        )
    }))
    .await;
    let urls: Vec<String> = uploads
        .into_iter()
        .map(|result| result.expect("upload").url)
        .collect();

    for (placeholder, url) in ["hero", "1", "2", "3"].iter().zip(&urls) {
        pipeline
            .posts
            .bind_image(&slug, placeholder, url)
            .await
            .expect("bind");
    }

    let scheduled = pipeline
        .posts
        .set_status(
            &slug,
            PostStatusRequest {
                status: PostStatus::Scheduled,
                publish_date: Some(date!(2026 - 10 - 19)),
            },
        )
        .await
        .expect("schedule");
    assert_eq!(scheduled.status, PostStatus::Scheduled);

    assert!(pipeline.posts.public_listing().await.expect("listing").is_empty());
    assert!(matches!(
        pipeline.posts.public_post(&slug).await,
        Err(PostServiceError::NotFound { .. })
    ));

    pipeline.clock.advance(Duration::days(1));

    let listing = pipeline.posts.public_listing().await.expect("listing");
    assert_eq!(listing.len(), 1);
    assert_eq!(listing[0].slug, slug);
    assert_eq!(listing[0].hero_image.as_deref(), Some(urls[0].as_str()));
    assert!(listing[0].is_new);

    let post = pipeline.posts.public_post(&slug).await.expect("visible post");
    assert!(!post.content.contains("[IMAGE_"));
    for url in &urls {
        assert!(post.content.contains(&format!("]({url})")), "missing {url}");
    }

    let calls = pipeline.invalidations.calls();
    // generate + four binds + schedule
    assert_eq!(calls.len(), 6);
    assert!(calls.iter().all(|pages| pages == &PageKey::for_post(&slug)));
}

#[tokio::test]
async fn failed_generation_leaves_no_record() {
    let dir = TempDir::new().expect("tempdir");
    let pipeline = Pipeline::new(
        dir.path(),
        ScriptedGenerator::answering(vec![Err(GenerationError::Status {
            status: 529,
            body: "overloaded".to_string(),
        })]),
    );

    let err = pipeline
        .generation
        .generate(generate_request("Home office lighting"))
        .await
        .expect_err("upstream failure");
    assert!(matches!(err, GenerateError::Upstream(_)));

    assert!(pipeline.posts.list_all().await.expect("list").is_empty());
    assert!(!pipeline.store.path().exists());
    assert!(pipeline.invalidations.calls().is_empty());
}

#[tokio::test]
async fn concurrent_uploads_get_distinct_keys() {
    let dir = TempDir::new().expect("tempdir");
    let pipeline = Pipeline::new(dir.path(), ScriptedGenerator::default());

    let results = join_all((0..16u8).map(|index| {
        pipeline
            .uploads
            .ingest(Some("same-name.webp"), None, Bytes::from(vec![index; 8]))
    }))
    .await;

    let keys: HashSet<String> = results
        .into_iter()
        .map(|result| result.expect("upload").key)
        .collect();
    assert_eq!(keys.len(), 16);
    assert_eq!(pipeline.storage.keys().len(), 16);
}

#[tokio::test]
async fn deleting_a_missing_slug_is_not_found_without_invalidation() {
    let dir = TempDir::new().expect("tempdir");
    let pipeline = Pipeline::new(dir.path(), ScriptedGenerator::default());

    let err = pipeline.posts.delete("nope").await.expect_err("missing");
    assert!(matches!(err, PostServiceError::NotFound { ref slug } if slug == "nope"));
    assert!(pipeline.invalidations.calls().is_empty());
}
