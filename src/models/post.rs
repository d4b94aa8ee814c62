use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::ids::Identified;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PostStatus {
    #[default]
    Draft,
    Published,
}

/// Fixed set of blog categories.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum PostCategory {
    WebDevelopment,
    Design,
    ECommerce,
    Seo,
    Marketing,
    Technology,
}

impl PostCategory {
    pub const ALL: [PostCategory; 6] = [
        PostCategory::WebDevelopment,
        PostCategory::Design,
        PostCategory::ECommerce,
        PostCategory::Seo,
        PostCategory::Marketing,
        PostCategory::Technology,
    ];

    pub fn label(&self) -> &'static str {
        match self {
            PostCategory::WebDevelopment => "Web Development",
            PostCategory::Design => "Design",
            PostCategory::ECommerce => "E-commerce",
            PostCategory::Seo => "SEO",
            PostCategory::Marketing => "Marketing",
            PostCategory::Technology => "Technology",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SeoMeta {
    #[serde(default)]
    pub meta_title: String,
    #[serde(default)]
    pub meta_description: String,
    #[serde(default)]
    pub keywords: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub og_image: Option<String>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BlogPost {
    pub id: i64,
    pub title: String,
    pub slug: String,
    #[serde(default)]
    pub excerpt: String,
    /// HTML body.
    #[serde(default)]
    pub content: String,
    #[serde(default)]
    pub author: String,
    pub category: PostCategory,
    #[serde(default)]
    pub tags: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub featured_image: Option<String>,
    pub published_at: String,
    #[serde(default)]
    pub status: PostStatus,
    #[serde(default)]
    pub seo: SeoMeta,
    /// Fields this editor does not manage, preserved on write-back.
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl BlogPost {
    pub fn published_time(&self) -> Option<DateTime<Utc>> {
        super::parse_timestamp(&self.published_at)
    }

    pub fn is_published(&self) -> bool {
        self.status == PostStatus::Published
    }
}

impl Identified for BlogPost {
    fn id(&self) -> i64 {
        self.id
    }
}

/// Editor input for creating or updating a post.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PostForm {
    pub title: String,
    /// Derived from the title when absent or blank.
    pub slug: Option<String>,
    #[serde(default)]
    pub excerpt: String,
    #[serde(default)]
    pub content: String,
    #[serde(default)]
    pub author: String,
    pub category: PostCategory,
    #[serde(default)]
    pub tags: Vec<String>,
    pub featured_image: Option<String>,
    /// Defaults to the time of the write.
    pub published_at: Option<String>,
    #[serde(default)]
    pub status: PostStatus,
    pub seo: Option<SeoMeta>,
}

impl PostForm {
    pub fn validate(&self) -> Result<(), String> {
        if self.title.trim().is_empty() {
            return Err("Title is required".to_string());
        }
        if let Some(at) = &self.published_at {
            if super::parse_timestamp(at).is_none() {
                return Err(format!("Unrecognised publication date: {}", at));
            }
        }
        Ok(())
    }

    /// Slug requested by the form, or one derived from the title.
    pub fn base_slug(&self) -> String {
        let requested = self.slug.as_deref().map(str::trim).unwrap_or("");
        let source = if requested.is_empty() {
            self.title.as_str()
        } else {
            requested
        };
        let slug = slug::slugify(source);
        if slug.is_empty() {
            "post".to_string()
        } else {
            slug
        }
    }

    /// Tags trimmed, blanks dropped, duplicates removed keeping first spelling.
    pub fn clean_tags(&self) -> Vec<String> {
        let mut out: Vec<String> = Vec::new();
        for tag in &self.tags {
            let tag = tag.trim();
            if tag.is_empty() || out.iter().any(|t| t.eq_ignore_ascii_case(tag)) {
                continue;
            }
            out.push(tag.to_string());
        }
        out
    }

    pub fn into_post(self, id: i64, slug: String, now: &str) -> BlogPost {
        let tags = self.clean_tags();
        let seo = self.seo.unwrap_or_else(|| SeoMeta {
            meta_title: self.title.clone(),
            meta_description: self.excerpt.clone(),
            keywords: tags.clone(),
            og_image: self.featured_image.clone(),
            extra: Map::new(),
        });
        BlogPost {
            id,
            title: self.title.trim().to_string(),
            slug,
            excerpt: self.excerpt,
            content: self.content,
            author: self.author,
            category: self.category,
            tags,
            featured_image: self.featured_image,
            published_at: self.published_at.unwrap_or_else(|| now.to_string()),
            status: self.status,
            seo,
            extra: Map::new(),
        }
    }
}

/// `base`, or `base-2`, `base-3`, … whichever is not taken by another post.
pub fn unique_slug(base: &str, posts: &[BlogPost], exclude_id: Option<i64>) -> String {
    let taken = |candidate: &str| {
        posts
            .iter()
            .any(|p| p.slug == candidate && Some(p.id) != exclude_id)
    };
    if !taken(base) {
        return base.to_string();
    }
    let mut n = 2;
    loop {
        let candidate = format!("{}-{}", base, n);
        if !taken(&candidate) {
            return candidate;
        }
        n += 1;
    }
}
