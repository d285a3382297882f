//! Feed ranking engine
//!
//! Pure functions from a raw candidate batch to a scored, sorted,
//! truncated page. Deterministic given identical inputs: all sorts are
//! stable (`Vec::sort_by`), so ties keep the newest-first order the
//! candidates were fetched in.
//!
//! Scoring:
//! - home:  engagement (likes + 2*comments + 3*reposts + 0.1*views)
//!          plus a linear recency bonus that fades to zero at 24h
//! - watch: 0.5*views + likes + 2*comments + 3*reposts
//! - reels: likes + 2*comments + 3*reposts + 0.3*views

use chrono::{DateTime, Duration, Utc};

use crate::models::{Post, PostKind};

/// Home feed only considers posts from the last week.
pub const HOME_WINDOW_DAYS: i64 = 7;

const MS_PER_HOUR: f64 = 3_600_000.0;

pub fn home_score(post: &Post, now: DateTime<Utc>) -> f64 {
    let engagement = post.likes as f64
        + 2.0 * post.comments as f64
        + 3.0 * post.reposts as f64
        + 0.1 * post.views as f64;
    let age_hours = (now - post.created_at).num_milliseconds() as f64 / MS_PER_HOUR;
    let recency = (24.0 - age_hours).max(0.0);
    engagement + recency
}

pub fn watch_score(post: &Post) -> f64 {
    0.5 * post.views as f64
        + post.likes as f64
        + 2.0 * post.comments as f64
        + 3.0 * post.reposts as f64
}

pub fn reel_score(post: &Post) -> f64 {
    post.likes as f64
        + 2.0 * post.comments as f64
        + 3.0 * post.reposts as f64
        + 0.3 * post.views as f64
}

fn sort_scored_desc(scored: &mut Vec<(Post, f64)>) {
    scored.sort_by(|a, b| b.1.partial_cmp(&a.1).unwrap_or(std::cmp::Ordering::Equal));
}

/// Score and order home-feed candidates. Candidates older than the home
/// window are dropped before scoring.
pub fn rank_home(candidates: Vec<Post>, now: DateTime<Utc>, limit: usize) -> Vec<Post> {
    let cutoff = now - Duration::days(HOME_WINDOW_DAYS);
    let mut scored: Vec<(Post, f64)> = candidates
        .into_iter()
        .filter(|post| post.created_at >= cutoff)
        .map(|post| {
            let score = home_score(&post, now);
            (post, score)
        })
        .collect();
    sort_scored_desc(&mut scored);
    scored.into_iter().take(limit).map(|(post, _)| post).collect()
}

/// Watch feed: posts with a video reference, reels excluded.
pub fn rank_watch(candidates: Vec<Post>, limit: usize) -> Vec<Post> {
    let mut scored: Vec<(Post, f64)> = candidates
        .into_iter()
        .filter(|post| post.has_video() && post.kind != PostKind::Reel)
        .map(|post| {
            let score = watch_score(&post);
            (post, score)
        })
        .collect();
    sort_scored_desc(&mut scored);
    scored.into_iter().take(limit).map(|(post, _)| post).collect()
}

/// Reels feed: reels only.
pub fn rank_reels(candidates: Vec<Post>, limit: usize) -> Vec<Post> {
    let mut scored: Vec<(Post, f64)> = candidates
        .into_iter()
        .filter(|post| post.kind == PostKind::Reel)
        .map(|post| {
            let score = reel_score(&post);
            (post, score)
        })
        .collect();
    sort_scored_desc(&mut scored);
    scored.into_iter().take(limit).map(|(post, _)| post).collect()
}

/// Following feed: reverse-chronological, followed authors only.
pub fn rank_following(candidates: Vec<Post>, followed_ids: &[String], limit: usize) -> Vec<Post> {
    let mut posts: Vec<Post> = candidates
        .into_iter()
        .filter(|post| followed_ids.iter().any(|id| id == &post.author_id))
        .collect();
    posts.sort_by(|a, b| b.created_at.cmp(&a.created_at));
    posts.truncate(limit);
    posts
}

/// News feed: reverse-chronological, news posts only.
pub fn rank_news(candidates: Vec<Post>, limit: usize) -> Vec<Post> {
    let mut posts: Vec<Post> = candidates
        .into_iter()
        .filter(|post| post.kind == PostKind::News)
        .collect();
    posts.sort_by(|a, b| b.created_at.cmp(&a.created_at));
    posts.truncate(limit);
    posts
}

/// Default feed: reverse-chronological, no filter.
pub fn rank_default(candidates: Vec<Post>, limit: usize) -> Vec<Post> {
    let mut posts = candidates;
    posts.sort_by(|a, b| b.created_at.cmp(&a.created_at));
    posts.truncate(limit);
    posts
}
