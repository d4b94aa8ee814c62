use serde_json::Map;

use crate::models::post::{BlogPost, PostCategory, PostStatus, SeoMeta};

fn post(
    id: i64,
    title: &str,
    slug: &str,
    excerpt: &str,
    content: &str,
    category: PostCategory,
    tags: &[&str],
    published_at: &str,
) -> BlogPost {
    let tags: Vec<String> = tags.iter().map(|t| t.to_string()).collect();
    let image = format!("/images/blog/{}.jpg", slug);
    BlogPost {
        id,
        title: title.to_string(),
        slug: slug.to_string(),
        excerpt: excerpt.to_string(),
        content: content.to_string(),
        author: "Studio Team".to_string(),
        category,
        tags: tags.clone(),
        featured_image: Some(image.clone()),
        published_at: published_at.to_string(),
        status: PostStatus::Published,
        seo: SeoMeta {
            meta_title: title.to_string(),
            meta_description: excerpt.to_string(),
            keywords: tags,
            og_image: Some(image),
            extra: Map::new(),
        },
        extra: Map::new(),
    }
}

/// Built-in posts written to `blogPosts` the first time the key is found absent.
pub fn blog_posts() -> Vec<BlogPost> {
    vec![
        post(
            1,
            "Choosing the Right Stack for Your Next Web Project",
            "choosing-the-right-stack",
            "How we weigh performance, hiring and hosting costs before writing a line of code.",
            "<p>Every project starts with the same question: what do we build it with?</p>\
             <p>We look at traffic expectations, the team that will maintain the site and the hosting budget.</p>",
            PostCategory::WebDevelopment,
            &["architecture", "performance"],
            "2024-01-15T09:00:00.000Z",
        ),
        post(
            2,
            "Design Systems That Survive the Second Release",
            "design-systems-that-survive",
            "Tokens, components and the review habits that keep a design system consistent.",
            "<p>A design system is only as good as its adoption.</p>\
             <p>We share the token structure and review checklist we hand to every client.</p>",
            PostCategory::Design,
            &["design-systems", "ux"],
            "2024-02-05T09:00:00.000Z",
        ),
        post(
            3,
            "Technical SEO Checklist for Launch Day",
            "technical-seo-checklist",
            "Sitemaps, canonical tags and structured data to verify before going live.",
            "<p>Launch day is the worst time to discover a noindex tag.</p>\
             <p>This checklist covers what we verify on every release.</p>",
            PostCategory::Seo,
            &["seo", "launch"],
            "2024-03-01T09:00:00.000Z",
        ),
    ]
}
