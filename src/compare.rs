//! Cross-production person index.

use crate::cache::TieredCache;
use crate::credits::CreditFetcher;
use crate::enrich::IdentityEnricher;
use crate::error::{CastmatchError, Result};
use crate::models::{ComparisonResult, Person, PersonRef, Production, ProductionCredits};
use futures_util::future::try_join_all;
use std::collections::HashMap;
use std::sync::Arc;
use tracing::{debug, info};

/// Cache key for a comparison: productions sorted by `(kind, id)`, so the
/// same set always maps to the same key.
pub fn cache_key(productions: &[Production]) -> String {
    let mut sorted = productions.to_vec();
    sorted.sort_by_key(Production::sort_key);
    let ids: Vec<String> = sorted.iter().map(Production::composite_id).collect();
    format!("comparison_{}", ids.join("_"))
}

/// Drop repeated productions, keeping first occurrences in order.
fn distinct(productions: &[Production]) -> Vec<Production> {
    let mut seen = Vec::with_capacity(productions.len());
    for production in productions {
        if !seen.contains(production) {
            seen.push(*production);
        }
    }
    seen
}

fn find_or_create<'a>(
    people: &'a mut Vec<Person>,
    index: &mut HashMap<u64, usize>,
    person: &PersonRef,
) -> &'a mut Person {
    let slot = *index.entry(person.id).or_insert_with(|| {
        people.push(Person::from_ref(person));
        people.len() - 1
    });
    let entry = &mut people[slot];
    if entry.imdb_id.is_none() {
        entry.imdb_id = person.imdb_id.clone();
    }
    entry
}

/// Fold per-production credits into one list of people, most appearances
/// first. Ties keep first-seen order.
pub fn merge_people<'a>(credits: impl IntoIterator<Item = &'a ProductionCredits>) -> Vec<Person> {
    let mut people: Vec<Person> = Vec::new();
    let mut index: HashMap<u64, usize> = HashMap::new();

    for production in credits {
        for credit in &production.cast {
            let person = find_or_create(&mut people, &mut index, &credit.person);
            if !person.cast_appearances.contains(&credit.appearance) {
                person.cast_appearances.push(credit.appearance.clone());
            }
        }
        for credit in &production.crew {
            let person = find_or_create(&mut people, &mut index, &credit.person);
            if !person.crew_appearances.contains(&credit.appearance) {
                person.crew_appearances.push(credit.appearance.clone());
            }
        }
    }

    // stable
    people.sort_by(|a, b| b.appearance_count().cmp(&a.appearance_count()));
    people
}

pub struct ComparisonEngine {
    fetcher: Arc<CreditFetcher>,
    enricher: Arc<IdentityEnricher>,
    cache: TieredCache,
}

impl ComparisonEngine {
    pub fn new(
        fetcher: Arc<CreditFetcher>,
        enricher: Arc<IdentityEnricher>,
        cache: TieredCache,
    ) -> Self {
        Self {
            fetcher,
            enricher,
            cache,
        }
    }

    /// Everyone credited on any of `productions`, with their appearances.
    ///
    /// Requires at least two distinct productions. Fails if any
    /// production's base credits cannot be fetched.
    pub async fn compare(&self, productions: &[Production]) -> Result<Arc<ComparisonResult>> {
        let projects = distinct(productions);
        if projects.len() < 2 {
            return Err(CastmatchError::BadRequest(
                "At least two distinct projects are required for comparison".to_string(),
            ));
        }

        let key = cache_key(&projects);
        if let Some(cached) = self.cache.get::<ComparisonResult>(&key) {
            return Ok(cached);
        }

        info!("Comparing {} projects ({})", projects.len(), key);

        let credits = try_join_all(projects.iter().map(|&production| async move {
            self.fetcher
                .fetch_credits(production)
                .await
                .map_err(|e| e.in_stage(format!("Fetching credits for {production}")))
        }))
        .await?;

        let mut people = merge_people(credits.iter().map(Arc::as_ref));

        let missing: Vec<u64> = people
            .iter()
            .filter(|p| p.imdb_id.is_none())
            .map(|p| p.id)
            .collect();
        if !missing.is_empty() {
            let resolved = self.enricher.resolve(&missing).await;
            for person in people.iter_mut().filter(|p| p.imdb_id.is_none()) {
                person.imdb_id = resolved.get(&person.id).cloned();
            }
            debug!(
                "Backfilled {} of {} missing IMDb ids",
                resolved.len(),
                missing.len()
            );
        }

        let result = Arc::new(ComparisonResult { projects, people });
        info!(
            "Comparison {} complete: {} people",
            key,
            result.people.len()
        );
        self.cache.set(&key, Arc::clone(&result));
        Ok(result)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::CacheTier;
    use crate::error::ErrorKind;
    use crate::models::MediaKind;
    use crate::provider::fake::{FakeProvider, cast, credits, crew};
    use serde_json::json;
    use std::time::Duration;

    fn engine(provider: &Arc<FakeProvider>, cache: &TieredCache) -> ComparisonEngine {
        let fetcher = CreditFetcher::new(provider.clone(), cache.clone());
        let enricher = IdentityEnricher::new(provider.clone(), cache.clone())
            .with_batching(10, Duration::ZERO);
        ComparisonEngine::new(Arc::new(fetcher), Arc::new(enricher), cache.clone())
    }

    /// P1 credits X and Y, P2 credits Y and Z.
    fn overlapping(provider: &FakeProvider) {
        provider
            .respond(
                "/movie/1/credits",
                credits(
                    vec![cast(10, "X", "Hero", 0), cast(20, "Y", "Mentor", 1)],
                    vec![],
                ),
            )
            .respond(
                "/movie/2/credits",
                credits(
                    vec![cast(20, "Y", "Villain", 0), cast(30, "Z", "Sidekick", 1)],
                    vec![],
                ),
            );
    }

    #[test]
    fn cache_key_ignores_input_order() {
        let a = Production::movie(5);
        let b = Production::tv(7);
        let c = Production::movie(12);

        assert_eq!(cache_key(&[a, b]), cache_key(&[b, a]));
        assert_eq!(cache_key(&[c, b, a]), "comparison_movie_5_movie_12_tv_7");
    }

    #[tokio::test]
    async fn overlapping_person_has_both_appearances() {
        let provider = FakeProvider::new();
        overlapping(&provider);
        let cache = TieredCache::default();

        let result = engine(&provider, &cache)
            .compare(&[Production::movie(1), Production::movie(2)])
            .await
            .unwrap();

        let ids: Vec<u64> = result.people.iter().map(|p| p.id).collect();
        assert_eq!(ids, vec![20, 10, 30]);

        let y = &result.people[0];
        assert_eq!(y.cast_appearances.len(), 2);
        assert_eq!(y.cast_appearances[0].production_id, 1);
        assert_eq!(y.cast_appearances[1].production_id, 2);

        for person in &result.people[1..] {
            assert_eq!(person.appearance_count(), 1);
        }
    }

    #[tokio::test]
    async fn people_never_reference_foreign_productions() {
        let provider = FakeProvider::new();
        overlapping(&provider);
        let inputs = [Production::movie(1), Production::movie(2)];

        let result = engine(&provider, &TieredCache::default())
            .compare(&inputs)
            .await
            .unwrap();

        for person in &result.people {
            let productions = person.productions();
            assert!(!productions.is_empty());
            assert!(productions.len() <= inputs.len());
            assert!(productions.iter().all(|p| inputs.contains(p)));
        }
    }

    #[tokio::test]
    async fn reversed_input_hits_cache() {
        let provider = FakeProvider::new();
        overlapping(&provider);
        let cache = TieredCache::default();
        let engine = engine(&provider, &cache);

        let first = engine
            .compare(&[Production::movie(1), Production::movie(2)])
            .await
            .unwrap();
        let calls = provider.total_calls();
        let second = engine
            .compare(&[Production::movie(2), Production::movie(1)])
            .await
            .unwrap();

        assert!(Arc::ptr_eq(&first, &second));
        assert_eq!(provider.total_calls(), calls);
        assert_eq!(cache.len(CacheTier::Comparison), 1);
    }

    #[tokio::test]
    async fn needs_two_distinct_productions() {
        let provider = FakeProvider::new();
        let engine = engine(&provider, &TieredCache::default());

        let single = engine.compare(&[Production::movie(1)]).await.unwrap_err();
        assert_eq!(single.kind(), ErrorKind::BadRequest);

        let repeated = engine
            .compare(&[Production::movie(1), Production::movie(1)])
            .await
            .unwrap_err();
        assert_eq!(repeated.kind(), ErrorKind::BadRequest);
        assert_eq!(provider.total_calls(), 0);
    }

    #[tokio::test]
    async fn duplicate_inputs_are_collapsed() {
        let provider = FakeProvider::new();
        overlapping(&provider);

        let result = engine(&provider, &TieredCache::default())
            .compare(&[Production::movie(1), Production::movie(2), Production::movie(1)])
            .await
            .unwrap();

        assert_eq!(result.projects, vec![Production::movie(1), Production::movie(2)]);
        assert_eq!(result.people[0].cast_appearances.len(), 2);
    }

    #[tokio::test]
    async fn base_failure_fails_comparison_with_stage() {
        let provider = FakeProvider::new();
        provider.respond("/movie/1/credits", credits(vec![], vec![]));
        let cache = TieredCache::default();

        let err = engine(&provider, &cache)
            .compare(&[Production::movie(1), Production::tv(404)])
            .await
            .unwrap_err();

        assert_eq!(err.kind(), ErrorKind::NotFound);
        assert!(err.to_string().contains("tv 404"));
        assert_eq!(cache.len(CacheTier::Comparison), 0);
    }

    #[tokio::test]
    async fn missing_imdb_ids_are_backfilled() {
        let provider = FakeProvider::new();
        overlapping(&provider);
        provider
            .respond("/person/10/external_ids", json!({"imdb_id": "nm10"}))
            .fail("/person/20/external_ids")
            .respond("/person/30/external_ids", json!({"imdb_id": "nm30"}));

        let result = engine(&provider, &TieredCache::default())
            .compare(&[Production::movie(1), Production::movie(2)])
            .await
            .unwrap();

        let imdb: HashMap<u64, Option<&str>> = result
            .people
            .iter()
            .map(|p| (p.id, p.imdb_id.as_deref()))
            .collect();
        assert_eq!(imdb[&10], Some("nm10"));
        assert_eq!(imdb[&20], None, "Failed lookup leaves the person unresolved");
        assert_eq!(imdb[&30], Some("nm30"));
    }

    #[tokio::test]
    async fn cast_and_crew_of_one_person_are_kept_apart() {
        let provider = FakeProvider::new();
        provider
            .respond(
                "/movie/1/credits",
                credits(
                    vec![cast(5, "Auteur", "Cameo", 9)],
                    vec![crew(5, "Auteur", "Directing", "Director")],
                ),
            )
            .respond(
                "/tv/2/credits",
                credits(vec![], vec![crew(5, "Auteur", "Writing", "Writer")]),
            )
            .respond(
                "/tv/2",
                json!({"id": 2, "aggregate_credits": {"cast": [], "crew": []}}),
            );

        let result = engine(&provider, &TieredCache::default())
            .compare(&[Production::movie(1), Production::tv(2)])
            .await
            .unwrap();

        let auteur = &result.people[0];
        assert_eq!(auteur.cast_appearances.len(), 1);
        assert_eq!(auteur.crew_appearances.len(), 2);
        assert_eq!(auteur.crew_appearances[1].media_type, MediaKind::Tv);
    }

    #[test]
    fn merge_skips_exact_duplicate_appearances() {
        let credits: ProductionCredits = serde_json::from_value(json!({
            "cast": [
                {"id": 1, "name": "A", "profile_path": null, "project_id": 3,
                 "media_type": "movie", "character": "Twin", "order": 0},
                {"id": 1, "name": "A", "profile_path": null, "project_id": 3,
                 "media_type": "movie", "character": "Twin", "order": 0}
            ],
            "crew": []
        }))
        .unwrap();

        let people = merge_people([&credits]);
        assert_eq!(people.len(), 1);
        assert_eq!(people[0].cast_appearances.len(), 1);
    }

    #[test]
    fn later_credit_fills_missing_imdb_id() {
        let first: ProductionCredits = serde_json::from_value(json!({
            "cast": [{"id": 1, "name": "A", "profile_path": null, "project_id": 3,
                      "media_type": "movie", "character": "X", "order": 0}],
            "crew": []
        }))
        .unwrap();
        let second: ProductionCredits = serde_json::from_value(json!({
            "cast": [],
            "crew": [{"id": 1, "name": "A", "profile_path": null, "imdb_id": "nm1",
                      "project_id": 4, "media_type": "tv", "department": "Writing", "job": "Writer"}]
        }))
        .unwrap();

        let people = merge_people([&first, &second]);
        assert_eq!(people[0].imdb_id.as_deref(), Some("nm1"));
    }
}
