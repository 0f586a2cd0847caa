//! Cache trigger service.
//!
//! Fans committed change events out to every configured rendering target.
//! Targets are signalled concurrently and all of them are awaited; a failing
//! target is logged and counted and never surfaces to the caller, whose
//! mutation has already been committed.

use std::sync::Arc;

use futures::future::join_all;
use metrics::counter;
use tracing::{debug, warn};

use crate::application::repos::RenderInvalidator;

use super::events::EventKind;
use super::keys::PageKey;

const SOURCE: &str = "cache::trigger";

#[derive(Clone, Default)]
pub struct InvalidationNotifier {
    targets: Vec<Arc<dyn RenderInvalidator>>,
}

impl InvalidationNotifier {
    pub fn new(targets: Vec<Arc<dyn RenderInvalidator>>) -> Self {
        Self { targets }
    }

    /// A notifier with no targets.
    pub fn disabled() -> Self {
        Self::default()
    }

    pub fn with_target(mut self, target: Arc<dyn RenderInvalidator>) -> Self {
        self.targets.push(target);
        self
    }

    pub fn target_count(&self) -> usize {
        self.targets.len()
    }

    /// Publish an event to all targets.
    pub async fn trigger(&self, kind: EventKind) {
        let pages = kind.affected_pages();
        debug!(
            target = SOURCE,
            event = kind.name(),
            slug = kind.slug(),
            targets = self.targets.len(),
            "invalidating rendered pages"
        );
        self.notify(&pages).await;
    }

    /// Signal every target that `pages` are stale.
    pub async fn notify(&self, pages: &[PageKey]) {
        let outcomes = join_all(
            self.targets
                .iter()
                .map(|target| async move { (target.name(), target.invalidate(pages).await) }),
        )
        .await;

        for (name, outcome) in outcomes {
            if let Err(err) = outcome {
                counter!("tsuzuri_invalidation_failure_total", "target" => name).increment(1);
                warn!(
                    target = SOURCE,
                    invalidator = name,
                    pages = %join_pages(pages),
                    error = %err,
                    "invalidation failed"
                );
            }
        }
    }

    pub async fn post_upserted(&self, slug: &str) {
        self.trigger(EventKind::PostUpserted {
            slug: slug.to_string(),
        })
        .await;
    }

    pub async fn post_deleted(&self, slug: &str) {
        self.trigger(EventKind::PostDeleted {
            slug: slug.to_string(),
        })
        .await;
    }
}

fn join_pages(pages: &[PageKey]) -> String {
    pages
        .iter()
        .map(PageKey::to_string)
        .collect::<Vec<_>>()
        .join(",")
}

#[cfg(test)]
mod tests {
    use std::sync::Mutex;

    use async_trait::async_trait;

    use super::*;
    use crate::application::repos::InvalidationError;

    #[derive(Default)]
    struct Recording {
        calls: Mutex<Vec<Vec<PageKey>>>,
    }

    #[async_trait]
    impl RenderInvalidator for Recording {
        fn name(&self) -> &'static str {
            "recording"
        }

        async fn invalidate(&self, pages: &[PageKey]) -> Result<(), InvalidationError> {
            self.calls.lock().expect("calls").push(pages.to_vec());
            Ok(())
        }
    }

    struct Failing;

    #[async_trait]
    impl RenderInvalidator for Failing {
        fn name(&self) -> &'static str {
            "failing"
        }

        async fn invalidate(&self, _pages: &[PageKey]) -> Result<(), InvalidationError> {
            Err(InvalidationError::new("failing", "unreachable"))
        }
    }

    #[tokio::test]
    async fn failing_target_does_not_block_others() {
        let recording = Arc::new(Recording::default());
        let notifier = InvalidationNotifier::new(vec![Arc::new(Failing), recording.clone()]);

        notifier.post_upserted("hello").await;

        let calls = recording.calls.lock().expect("calls");
        assert_eq!(calls.len(), 1);
        assert_eq!(calls[0], PageKey::for_post("hello"));
    }

    #[tokio::test]
    async fn disabled_notifier_is_a_no_op() {
        let notifier = InvalidationNotifier::disabled();
        notifier.post_deleted("gone").await;
        assert_eq!(notifier.target_count(), 0);
    }
}
