//! Category and tag grouping, and the orderings used by every listing.

use std::collections::HashMap;

use serde::Serialize;

use crate::model::{Group, Page, Post};

pub const UNCATEGORIZED: &str = "uncategorized";

/// Which posts a list view shows.
#[derive(Serialize, Debug, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum ListKind {
    /// Every post.
    Posts,
    Category,
    Tag,
}

pub fn category_path(name: &str) -> String {
    let name = name.trim();
    match name {
        "" => format!("/category/{}", UNCATEGORIZED),
        name => format!("/category/{}", name),
    }
}

pub fn tag_path(name: &str) -> String {
    format!("/tag/{}", name.trim())
}

pub fn category_group(name: &str) -> Group {
    Group {
        name: name.trim().to_string(),
        path: category_path(name),
        count: 0,
    }
}

pub fn tag_group(name: &str) -> Group {
    Group {
        name: name.trim().to_string(),
        path: tag_path(name),
        count: 0,
    }
}

/// Counts posts per category (the empty category included) and per tag,
/// returning `(categories, tags)` sorted by name.
pub fn group_posts(posts: &[Post]) -> (Vec<Group>, Vec<Group>) {
    let mut categories: HashMap<&str, usize> = HashMap::new();
    let mut tags: HashMap<&str, usize> = HashMap::new();

    for post in posts {
        *categories.entry(post.category.trim()).or_default() += 1;

        for tag in &post.tags {
            let tag = tag.trim();
            if !tag.is_empty() {
                *tags.entry(tag).or_default() += 1;
            }
        }
    }

    let mut categories: Vec<Group> = categories
        .into_iter()
        .map(|(name, count)| Group {
            count,
            ..category_group(name)
        })
        .collect();

    let mut tags: Vec<Group> = tags
        .into_iter()
        .map(|(name, count)| Group {
            count,
            ..tag_group(name)
        })
        .collect();

    log::debug!("Sorting categories");
    categories.sort_by(|a, b| a.name.cmp(&b.name));
    log::debug!("Sorting tags");
    tags.sort_by(|a, b| a.name.cmp(&b.name));

    (categories, tags)
}

/// Most recently updated first. Stable, so posts updated at the same instant
/// keep their relative order.
pub fn sort_posts(posts: &mut [Post]) {
    posts.sort_by(|a, b| b.updated.cmp(&a.updated));
}

pub fn sort_pages(pages: &mut [Page]) {
    pages.sort_by(|a, b| a.title.cmp(&b.title));
}

/// Posts shown by a list of the given kind. For categories, `uncategorized`
/// selects the posts without a category.
pub fn posts_in<'a>(posts: &'a [Post], kind: ListKind, name: &str) -> Vec<&'a Post> {
    let name = name.trim();
    match kind {
        ListKind::Posts => posts.iter().collect(),
        ListKind::Category => {
            let name = if name == UNCATEGORIZED { "" } else { name };
            posts.iter().filter(|p| p.category.trim() == name).collect()
        }
        ListKind::Tag => posts
            .iter()
            .filter(|p| p.tags.iter().any(|t| t.trim() == name))
            .collect(),
    }
}
