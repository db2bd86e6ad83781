use std::path::Path;

use crate::model::{Group, Page, Post};
use crate::parser::{ContentParser, ParseError, Skipped};

/// Everything parsed from a site root, ready for rendering.
#[derive(Debug, Default)]
pub struct Site {
    /// Most recently updated first.
    pub posts: Vec<Post>,
    pub pages: Vec<Page>,
    pub categories: Vec<Group>,
    pub tags: Vec<Group>,
    pub skipped: Vec<Skipped>,
}

impl Site {
    pub fn load<P: AsRef<Path>>(root: P) -> Result<Self, ParseError> {
        let parser = ContentParser::new(root);

        let posts = parser.parse_posts()?;
        let pages = parser.parse_pages()?;

        let mut skipped = posts.skipped;
        skipped.extend(pages.skipped);

        Ok(Self {
            posts: posts.posts,
            pages: pages.pages,
            categories: posts.categories,
            tags: posts.tags,
            skipped,
        })
    }

    pub fn find_post(&self, slug: &str) -> Option<usize> {
        self.posts.iter().position(|p| p.slug == slug)
    }

    pub fn find_page(&self, slug: &str) -> Option<&Page> {
        self.pages.iter().find(|p| p.slug == slug)
    }

    /// Post at `index` with its `(older, newer)` neighbours.
    pub fn post_with_neighbours(&self, index: usize) -> Option<(&Post, Option<&Post>, Option<&Post>)> {
        let post = self.posts.get(index)?;
        let older = self.posts.get(index + 1);
        let newer = index.checked_sub(1).and_then(|i| self.posts.get(i));
        Some((post, older, newer))
    }
}
