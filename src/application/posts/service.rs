use std::sync::Arc;

use time::{Date, UtcOffset};

use crate::application::repos::Clock;
use crate::cache::InvalidationNotifier;
use crate::domain::visibility::reference_day;
use crate::infra::store::PostStore;

/// Publication controller and CRUD surface over the post collection.
#[derive(Clone)]
pub struct PostService {
    pub(crate) store: Arc<PostStore>,
    pub(crate) notifier: InvalidationNotifier,
    pub(crate) clock: Arc<dyn Clock>,
    pub(crate) offset: UtcOffset,
    pub(crate) default_author: String,
}

impl PostService {
    pub fn new(
        store: Arc<PostStore>,
        notifier: InvalidationNotifier,
        clock: Arc<dyn Clock>,
        offset: UtcOffset,
        default_author: impl Into<String>,
    ) -> Self {
        Self {
            store,
            notifier,
            clock,
            offset,
            default_author: default_author.into(),
        }
    }

    /// Current calendar day in the site offset.
    pub fn today(&self) -> Date {
        reference_day(self.clock.now(), self.offset)
    }

    pub fn offset(&self) -> UtcOffset {
        self.offset
    }
}
