mod support;

use std::collections::BTreeSet;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use tempfile::TempDir;
use time::UtcOffset;
use tsuzuri::application::posts::{PostService, PostServiceError};
use tsuzuri::application::repos::{InvalidationError, ManualClock, RenderInvalidator};
use tsuzuri::cache::{InvalidationNotifier, PageKey};
use tsuzuri::domain::entities::BlogPost;
use tsuzuri::domain::error::DomainError;
use tsuzuri::domain::posts::PostCollection;
use tsuzuri::infra::store::{PostStore, StoreError};
use tsuzuri_api_types::PostWriteRequest;

use support::{AUTHOR, Pipeline, START, ScriptedGenerator};

fn write_request(slug: &str) -> PostWriteRequest {
    PostWriteRequest {
        slug: Some(slug.to_string()),
        title: format!("Title for {slug}"),
        content: "Body text with [IMAGE_1] in it.".to_string(),
        ..Default::default()
    }
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn concurrent_creates_with_distinct_slugs_are_all_kept() {
    let dir = TempDir::new().expect("tempdir");
    let pipeline = Pipeline::new(dir.path(), ScriptedGenerator::default());

    let mut handles = Vec::new();
    for index in 0..24 {
        let posts = pipeline.posts.clone();
        handles.push(tokio::spawn(async move {
            posts.create_manual(write_request(&format!("post-{index}"))).await
        }));
    }
    for handle in handles {
        handle.await.expect("join").expect("create");
    }

    let stored: BTreeSet<String> = pipeline
        .posts
        .list_all()
        .await
        .expect("list")
        .into_iter()
        .map(|post| post.slug)
        .collect();
    let expected: BTreeSet<String> = (0..24).map(|index| format!("post-{index}")).collect();
    assert_eq!(stored, expected);
    assert_eq!(pipeline.invalidations.calls().len(), 24);
}

#[tokio::test]
async fn duplicate_create_fails_and_leaves_collection_unchanged() {
    let dir = TempDir::new().expect("tempdir");
    let pipeline = Pipeline::new(dir.path(), ScriptedGenerator::default());

    pipeline
        .posts
        .create_manual(write_request("same"))
        .await
        .expect("first create");
    let before = std::fs::read(pipeline.store.path()).expect("read store");

    let mut second = write_request("same");
    second.title = "Another title".to_string();
    let err = pipeline
        .posts
        .create_manual(second)
        .await
        .expect_err("duplicate");

    assert!(matches!(
        err,
        PostServiceError::Domain(DomainError::DuplicateSlug { ref slug }) if slug == "same"
    ));
    let after = std::fs::read(pipeline.store.path()).expect("read store");
    assert_eq!(before, after);
    assert_eq!(pipeline.invalidations.calls().len(), 1);
}

#[tokio::test]
async fn save_then_load_round_trips_including_empty() {
    let dir = TempDir::new().expect("tempdir");
    let store = PostStore::new(dir.path().join("nested").join("posts.json"));

    assert!(store.load().await.expect("absent file").is_empty());

    store.save(&PostCollection::new()).await.expect("save empty");
    assert!(store.load().await.expect("load empty").is_empty());

    let mut post = BlogPost::draft("hello", "Hello", "Body [IMAGE_HERO]");
    post.tags = BTreeSet::from(["intro".to_string()]);
    post.images.insert("hero".to_string(), "/media/h.png".to_string());
    let collection = PostCollection::from_posts(vec![post.clone()]).expect("collection");
    store.save(&collection).await.expect("save");

    let loaded = store.load().await.expect("load");
    assert_eq!(loaded.posts(), &[post][..]);
}

#[tokio::test]
async fn corrupt_file_is_reported_not_replaced() {
    let dir = TempDir::new().expect("tempdir");
    let path = dir.path().join("posts.json");
    std::fs::write(&path, b"[{\"slug\": ").expect("write");
    let store = PostStore::new(&path);

    let err = store.load().await.expect_err("corrupt");
    assert!(matches!(err, StoreError::Corrupt { .. }));

    let result: Result<(), StoreError> = store.mutate(|_| Ok(())).await;
    assert!(matches!(result, Err(StoreError::Corrupt { .. })));
    assert_eq!(std::fs::read(&path).expect("read"), b"[{\"slug\": ");
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn concurrent_updates_and_binds_on_distinct_slugs_are_all_kept() {
    let dir = TempDir::new().expect("tempdir");
    let pipeline = Pipeline::new(dir.path(), ScriptedGenerator::default());

    for index in 0..16 {
        pipeline
            .posts
            .create_manual(write_request(&format!("post-{index}")))
            .await
            .expect("seed");
    }

    let mut handles = Vec::new();
    for index in 0..16 {
        let posts = pipeline.posts.clone();
        handles.push(tokio::spawn(async move {
            let slug = format!("post-{index}");
            if index % 2 == 0 {
                posts
                    .bind_image(&slug, "1", &format!("/media/{index}.png"))
                    .await
            } else {
                let mut update = write_request(&slug);
                update.title = format!("Revised {index}");
                posts.update_full_record(&slug, update).await
            }
        }));
    }
    for handle in handles {
        handle.await.expect("join").expect("change");
    }

    for post in pipeline.posts.list_all().await.expect("list") {
        let index: usize = post
            .slug
            .trim_start_matches("post-")
            .parse()
            .expect("index");
        if index % 2 == 0 {
            assert_eq!(
                post.images.get("1").map(String::as_str),
                Some(format!("/media/{index}.png").as_str()),
                "{}",
                post.slug
            );
        } else {
            assert_eq!(post.title, format!("Revised {index}"));
        }
    }
    assert_eq!(pipeline.invalidations.calls().len(), 32);
}

/// Reads the store while being notified, recording what each post page
/// would render at that moment.
struct SnapshotInvalidator {
    store: Arc<PostStore>,
    seen: Mutex<Vec<(String, Option<String>)>>,
}

#[async_trait]
impl RenderInvalidator for SnapshotInvalidator {
    fn name(&self) -> &'static str {
        "snapshot"
    }

    async fn invalidate(&self, pages: &[PageKey]) -> Result<(), InvalidationError> {
        let collection = self
            .store
            .load()
            .await
            .map_err(|err| InvalidationError::new("snapshot", err.to_string()))?;
        let mut seen = self.seen.lock().expect("seen lock");
        for page in pages {
            if let PageKey::Post(slug) = page {
                let title = collection.find(slug).map(|post| post.title.clone());
                seen.push((slug.clone(), title));
            }
        }
        Ok(())
    }
}

#[tokio::test]
async fn invalidation_observes_the_committed_state() {
    let dir = TempDir::new().expect("tempdir");
    let store = Arc::new(PostStore::new(dir.path().join("posts.json")));
    let snapshots = Arc::new(SnapshotInvalidator {
        store: store.clone(),
        seen: Mutex::new(Vec::new()),
    });
    let posts = PostService::new(
        store,
        InvalidationNotifier::default().with_target(snapshots.clone()),
        Arc::new(ManualClock::new(START)),
        UtcOffset::UTC,
        AUTHOR,
    );

    posts.create_manual(write_request("alpha")).await.expect("create");
    let mut update = write_request("alpha");
    update.title = "Alpha, revised".to_string();
    posts.update_full_record("alpha", update).await.expect("update");
    posts.delete("alpha").await.expect("delete");

    let seen = snapshots.seen.lock().expect("seen lock").clone();
    assert_eq!(
        seen,
        vec![
            ("alpha".to_string(), Some("Title for alpha".to_string())),
            ("alpha".to_string(), Some("Alpha, revised".to_string())),
            ("alpha".to_string(), None),
        ]
    );
}
