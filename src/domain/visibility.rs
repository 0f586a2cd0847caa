//! Public visibility derived from status and date.
//!
//! Everything here is pure: the reference instant is always passed in, never
//! read from the system clock.

use std::cmp::Ordering;

use time::{Date, Duration, OffsetDateTime, UtcOffset};

use super::entities::BlogPost;
use super::types::PostStatus;

/// Posts published within this many days are flagged as new in listings.
pub const NEW_POST_WINDOW_DAYS: i64 = 7;

/// Calendar day of `reference` in the site's offset.
pub fn reference_day(reference: OffsetDateTime, offset: UtcOffset) -> Date {
    reference.to_offset(offset).date()
}

/// Whether `post` is publicly visible on `day`.
///
/// A scheduled post is visible for the whole of its publish day, so comparing
/// calendar dates is the same as comparing against the end of `day`.
pub fn is_visible(post: &BlogPost, day: Date) -> bool {
    match post.status {
        PostStatus::Published => true,
        PostStatus::Scheduled => post.publish_date.is_some_and(|date| date <= day),
        PostStatus::Draft => false,
    }
}

/// Visible posts ordered newest `publishDate` first, ties by slug ascending.
pub fn visible_posts<'a, I>(posts: I, reference: OffsetDateTime, offset: UtcOffset) -> Vec<&'a BlogPost>
where
    I: IntoIterator<Item = &'a BlogPost>,
{
    let day = reference_day(reference, offset);
    let mut visible: Vec<&BlogPost> = posts
        .into_iter()
        .filter(|post| is_visible(post, day))
        .collect();
    visible.sort_by(|a, b| listing_order(a, b));
    visible
}

fn listing_order(a: &BlogPost, b: &BlogPost) -> Ordering {
    // `None` sorts before `Some`, so undated posts land last.
    b.publish_date
        .cmp(&a.publish_date)
        .then_with(|| a.slug.cmp(&b.slug))
}

pub fn is_new(post: &BlogPost, day: Date) -> bool {
    post.publish_date.is_some_and(|date| {
        let age = day - date;
        age >= Duration::ZERO && age <= Duration::days(NEW_POST_WINDOW_DAYS)
    })
}
