//! Values handed to theme templates. `Layout` is flattened into every view,
//! so a template reads `{{ website_title }}` next to `{{ html | safe }}`.

use serde::Serialize;

use crate::config::Config;
use crate::model::{Group, Page, Post};
use crate::taxonomy::{ListKind, category_group, tag_group};

/// Site-wide fields shared by every view.
#[derive(Serialize, Debug, Clone)]
pub struct Layout<'a> {
    pub website_title: &'a str,
    pub website_owner: &'a str,
    pub website_description: &'a str,
    pub base_url: &'a str,
    pub content_title: String,
    pub content_desc: String,
    pub content_author: String,
    pub categories: &'a [Group],
    pub tags: &'a [Group],
    pub pages: &'a [Page],
}

impl<'a> Layout<'a> {
    pub fn new(config: &'a Config, categories: &'a [Group], tags: &'a [Group], pages: &'a [Page]) -> Self {
        Self {
            website_title: &config.title,
            website_owner: &config.owner,
            website_description: &config.description,
            base_url: &config.base_url,
            content_title: config.title.clone(),
            content_desc: config.description.clone(),
            content_author: config.owner.clone(),
            categories,
            tags,
            pages,
        }
    }

    pub fn content(mut self, title: &str, desc: &str, author: &str) -> Self {
        self.content_title = title.to_string();
        self.content_desc = desc.to_string();
        self.content_author = author.to_string();
        self
    }
}

#[derive(Serialize, Debug)]
pub struct ListLayout<'a> {
    #[serde(flatten)]
    pub layout: Layout<'a>,
    pub kind: ListKind,
    /// Base path of the list; page *n* lives at `<path>/<n>`.
    pub path: String,
    pub posts: Vec<&'a Post>,
    pub current_page: usize,
    pub max_page: usize,
}

#[derive(Serialize, Debug)]
pub struct PageLayout<'a> {
    #[serde(flatten)]
    pub layout: Layout<'a>,
    pub path: &'a str,
    pub thumbnail: Option<&'a str>,
    pub html: &'a str,
}

impl<'a> PageLayout<'a> {
    pub fn new(layout: Layout<'a>, page: &'a Page) -> Self {
        Self {
            layout: layout.content(&page.title, &page.excerpt, ""),
            path: &page.path,
            thumbnail: page.thumbnail.as_deref(),
            html: &page.html,
        }
    }
}

#[derive(Serialize, Debug)]
pub struct PostLayout<'a> {
    #[serde(flatten)]
    pub layout: Layout<'a>,
    pub path: &'a str,
    pub created_at: &'a str,
    pub updated_at: &'a str,
    pub category: Group,
    pub tags: Vec<Group>,
    pub thumbnail: Option<&'a str>,
    pub html: &'a str,
    pub older: Option<&'a Post>,
    pub newer: Option<&'a Post>,
}

impl<'a> PostLayout<'a> {
    pub fn new(layout: Layout<'a>, post: &'a Post, older: Option<&'a Post>, newer: Option<&'a Post>) -> Self {
        let author = match post.author.trim() {
            "" => layout.website_owner,
            author => author,
        };

        Self {
            layout: layout.content(&post.title, &post.excerpt, author),
            path: &post.path,
            created_at: &post.created_at,
            updated_at: &post.updated_at,
            category: category_group(&post.category),
            tags: post.tags.iter().map(|t| tag_group(t)).collect(),
            thumbnail: post.thumbnail.as_deref(),
            html: &post.html,
            older,
            newer,
        }
    }
}
