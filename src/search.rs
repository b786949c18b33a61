//! Free-text and IMDb lookups, plus raw production details. Thin cached
//! passthroughs over the provider.

use crate::cache::TieredCache;
use crate::error::{CastmatchError, Result};
use crate::metrics;
use crate::models::{MediaKind, Production};
use crate::provider::MetadataProvider;
use crate::tmdb::models::SearchItem;
use futures_util::future::join_all;
use serde_json::Value;
use std::sync::Arc;
use tracing::{debug, warn};

pub const DEFAULT_MAX_PAGES: u32 = 10;

pub struct SearchService {
    provider: Arc<dyn MetadataProvider>,
    cache: TieredCache,
    max_pages: u32,
}

impl SearchService {
    pub fn new(provider: Arc<dyn MetadataProvider>, cache: TieredCache) -> Self {
        Self {
            provider,
            cache,
            max_pages: DEFAULT_MAX_PAGES,
        }
    }

    pub fn with_max_pages(mut self, max_pages: u32) -> Self {
        self.max_pages = max_pages.max(1);
        self
    }

    /// Movies and series matching `query`, across up to `max_pages` pages.
    ///
    /// Page 1 must succeed; a later page that fails is logged and left out.
    pub async fn search_multi(&self, query: &str) -> Result<Arc<Vec<SearchItem>>> {
        let query = query.trim();
        if query.is_empty() {
            return Err(CastmatchError::BadRequest(
                "Query parameter is required".to_string(),
            ));
        }

        let key = format!("search_multi_{query}");
        if let Some(cached) = self.cache.get::<Vec<SearchItem>>(&key) {
            return Ok(cached);
        }

        let first = self.provider.search_multi(query, 1).await?;
        let last_page = first.total_pages.min(self.max_pages);
        let mut items = first.results;

        if last_page > 1 {
            let pages = join_all(
                (2..=last_page).map(|page| async move {
                    (page, self.provider.search_multi(query, page).await)
                }),
            )
            .await;
            for (page, result) in pages {
                match result {
                    Ok(found) => items.extend(found.results),
                    Err(e) => {
                        warn!("Search page {} for '{}' failed: {}", page, query, e);
                        metrics::record_enrichment_skipped("search_page");
                    }
                }
            }
        }

        items.retain(SearchItem::is_production);
        debug!(
            "Search '{}': {} results from {} pages",
            query,
            items.len(),
            last_page.max(1)
        );

        let items = Arc::new(items);
        self.cache.set(&key, Arc::clone(&items));
        Ok(items)
    }

    /// Productions carrying IMDb id `imdb_id`: movies first, then series,
    /// each tagged with its media type.
    pub async fn find_by_imdb(&self, imdb_id: &str) -> Result<Arc<Vec<SearchItem>>> {
        let imdb_id = imdb_id.trim();
        if imdb_id.is_empty() {
            return Err(CastmatchError::BadRequest(
                "IMDb id is required".to_string(),
            ));
        }
        if !is_imdb_id(imdb_id) {
            return Err(CastmatchError::BadRequest(format!(
                "Invalid IMDb id: {imdb_id}"
            )));
        }

        let key = format!("search_imdb_{imdb_id}");
        if let Some(cached) = self.cache.get::<Vec<SearchItem>>(&key) {
            return Ok(cached);
        }

        let found = self.provider.find_by_imdb_id(imdb_id).await?;
        let tagged = |kind: MediaKind| {
            move |mut item: SearchItem| {
                item.media_type = Some(kind.as_str().to_string());
                item
            }
        };
        let items: Vec<SearchItem> = found
            .movie_results
            .into_iter()
            .map(tagged(MediaKind::Movie))
            .chain(found.tv_results.into_iter().map(tagged(MediaKind::Tv)))
            .collect();

        let items = Arc::new(items);
        self.cache.set(&key, Arc::clone(&items));
        Ok(items)
    }

    /// Provider details for `production` with `media_type` added.
    pub async fn project_details(&self, production: Production) -> Result<Arc<Value>> {
        let key = format!("project_{}", production.composite_id());
        if let Some(cached) = self.cache.get::<Value>(&key) {
            return Ok(cached);
        }

        let mut details = self.provider.details(production).await?;
        if let Value::Object(fields) = &mut details {
            fields.insert(
                "media_type".to_string(),
                Value::String(production.media_type.to_string()),
            );
        }

        let details = Arc::new(details);
        self.cache.set(&key, Arc::clone(&details));
        Ok(details)
    }
}

/// `tt` or `nm` followed by digits
fn is_imdb_id(id: &str) -> bool {
    id.strip_prefix("tt")
        .or_else(|| id.strip_prefix("nm"))
        .is_some_and(|digits| !digits.is_empty() && digits.bytes().all(|b| b.is_ascii_digit()))
}
