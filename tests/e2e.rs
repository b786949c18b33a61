//! End-to-end tests for the comparison pipeline
//!
//! Starts a real Axum server on a random port in front of a wiremock TMDB
//! and drives the full HTTP pipeline: per-production credit fetch, series
//! enrichment, person merge, identity backfill and the comparison cache.

use castmatch::config::Config;
use castmatch::server::build_router;
use serde_json::{Value, json};
use std::net::SocketAddr;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

// ── Test server helpers ───────────────────────────────────────────────────────

/// Spin up a test server talking to `tmdb`.
async fn start_server(tmdb: &MockServer) -> SocketAddr {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
        .await
        .expect("Failed to bind test server");
    let addr = listener.local_addr().unwrap();

    let config = Config {
        port: 0,
        is_dev: true,
        tmdb_api_key: "test-key".to_string(),
        tmdb_base_url: tmdb.uri(),
        tmdb_language: "en-US".to_string(),
        tmdb_request_delay_ms: 0,
        tmdb_timeout_secs: 5,
        tmdb_max_rate_limit_retries: 5,
        project_cache_ttl_secs: 86_400,
        comparison_cache_ttl_secs: 43_200,
        search_cache_ttl_secs: 3_600,
        external_id_cache_ttl_secs: 604_800,
        enrich_batch_size: 10,
        enrich_batch_delay_ms: 0,
        episode_credits_limit: 5,
        search_max_pages: 10,
    };

    let app = build_router(config).await.expect("router should build");

    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });

    addr
}

async fn mount_json(tmdb: &MockServer, route: &str, body: Value) {
    Mock::given(method("GET"))
        .and(path(route))
        .respond_with(ResponseTemplate::new(200).set_body_json(body))
        .mount(tmdb)
        .await;
}

fn cast(id: u64, name: &str, character: &str) -> Value {
    json!({"id": id, "name": name, "character": character, "order": 0, "profile_path": null})
}

fn crew(id: u64, name: &str, department: &str, job: &str) -> Value {
    json!({"id": id, "name": name, "department": department, "job": job, "profile_path": null})
}

/// Movie 10 and a three-season series 20 without aggregate credits.
///
/// - Person 1 acts in both
/// - Person 2 only in the movie
/// - Person 3 guest stars in season 3
/// - Person 4 is a stunt performer in season 1, episode 1, and also
///   the movie's stunt coordinator
/// - Season 2 fails upstream
async fn mount_fixture(tmdb: &MockServer) {
    mount_json(
        tmdb,
        "/movie/10/credits",
        json!({
            "cast": [cast(1, "Lead Actor", "Sam"), cast(2, "Movie Only", "Clerk")],
            "crew": [crew(4, "Stunt Person", "Crew", "Stunt Coordinator")]
        }),
    )
    .await;

    mount_json(
        tmdb,
        "/tv/20/credits",
        json!({"cast": [cast(1, "Lead Actor", "Sam")], "crew": []}),
    )
    .await;
    mount_json(
        tmdb,
        "/tv/20",
        json!({"id": 20, "number_of_seasons": 3, "external_ids": {"imdb_id": null}}),
    )
    .await;

    mount_json(
        tmdb,
        "/tv/20/season/1/credits",
        json!({
            "cast": [cast(1, "Lead Actor", "Samantha Carter")],
            "crew": [crew(5, "Showrunner", "Writing", "Writer")]
        }),
    )
    .await;
    mount_json(
        tmdb,
        "/tv/20/season/1",
        json!({"episodes": [{"episode_number": 1}]}),
    )
    .await;
    mount_json(
        tmdb,
        "/tv/20/season/1/episode/1/credits",
        json!({"cast": [], "crew": [crew(4, "Stunt Person", "Crew", "Stunt Double")]}),
    )
    .await;

    Mock::given(method("GET"))
        .and(path("/tv/20/season/2/credits"))
        .respond_with(ResponseTemplate::new(500))
        .mount(tmdb)
        .await;

    mount_json(
        tmdb,
        "/tv/20/season/3/credits",
        json!({"cast": [], "crew": [], "guest_stars": [cast(3, "Guest", "Visitor")]}),
    )
    .await;
    mount_json(tmdb, "/tv/20/season/3", json!({"episodes": []})).await;

    mount_json(tmdb, "/person/1/external_ids", json!({"imdb_id": "nm0000001"})).await;
}

async fn compare(addr: SocketAddr, projects: Value) -> reqwest::Response {
    reqwest::Client::new()
        .post(format!("http://{}/api/compare", addr))
        .json(&json!({"projects": projects}))
        .send()
        .await
        .expect("Failed to reach test server")
}

fn person(result: &Value, id: u64) -> &Value {
    result["people"]
        .as_array()
        .unwrap()
        .iter()
        .find(|p| p["id"] == id)
        .unwrap_or_else(|| panic!("person {id} missing"))
}

// ── Tests ─────────────────────────────────────────────────────────────────────

#[tokio::test]
async fn health_check() {
    let tmdb = MockServer::start().await;
    let addr = start_server(&tmdb).await;

    let resp = reqwest::get(format!("http://{}/health", addr))
        .await
        .expect("Failed to reach test server");

    assert_eq!(resp.status(), 200);
    let body: Value = resp.json().await.unwrap();
    assert_eq!(body["status"], "ok");
}

#[tokio::test]
async fn compare_movie_with_series_pipeline() {
    let tmdb = MockServer::start().await;
    mount_fixture(&tmdb).await;
    let addr = start_server(&tmdb).await;

    let resp = compare(
        addr,
        json!([{"id": 10, "media_type": "movie"}, {"id": 20, "media_type": "tv"}]),
    )
    .await;
    assert_eq!(resp.status(), 200);
    let result: Value = resp.json().await.unwrap();

    // Person 1 appears once per production and got their IMDb id backfilled
    let lead = person(&result, 1);
    let appearances = lead["cast_appearances"].as_array().unwrap();
    assert_eq!(appearances.len(), 2);
    assert_eq!(appearances[0]["project_id"], 10);
    assert_eq!(appearances[1]["project_id"], 20);
    assert_eq!(appearances[1]["media_type"], "tv");
    assert_eq!(lead["imdb_id"], "nm0000001");
    assert_eq!(result["people"][0]["id"], 1);

    // Season 3 guest survives the season 2 failure
    let guest = person(&result, 3);
    assert_eq!(guest["cast_appearances"][0]["project_id"], 20);

    // Season 1 crew plus stunt crew from the episode walk
    assert_eq!(person(&result, 5)["crew_appearances"][0]["job"], "Writer");
    let stunts = person(&result, 4)["crew_appearances"].as_array().unwrap();
    assert_eq!(stunts.len(), 2);

    // Nobody references a production outside the comparison
    for p in result["people"].as_array().unwrap() {
        for appearance in p["cast_appearances"]
            .as_array()
            .unwrap()
            .iter()
            .chain(p["crew_appearances"].as_array().unwrap())
        {
            let id = appearance["project_id"].as_u64().unwrap();
            assert!(id == 10 || id == 20);
        }
    }
}

#[tokio::test]
async fn reversed_comparison_is_served_from_cache() {
    let tmdb = MockServer::start().await;
    mount_fixture(&tmdb).await;
    let addr = start_server(&tmdb).await;

    let first = compare(
        addr,
        json!([{"id": 10, "media_type": "movie"}, {"id": 20, "media_type": "tv"}]),
    )
    .await;
    assert_eq!(first.status(), 200);
    let upstream_calls = tmdb.received_requests().await.unwrap().len();

    let second = compare(
        addr,
        json!([{"id": 20, "media_type": "tv"}, {"id": 10, "media_type": "movie"}]),
    )
    .await;
    assert_eq!(second.status(), 200);

    assert_eq!(
        tmdb.received_requests().await.unwrap().len(),
        upstream_calls,
        "Order-swapped comparison must not touch TMDB"
    );
}

#[tokio::test]
async fn rate_limited_credit_fetch_is_retried_transparently() {
    let tmdb = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/movie/1/credits"))
        .respond_with(ResponseTemplate::new(429).insert_header("retry-after", "1"))
        .up_to_n_times(1)
        .with_priority(1)
        .mount(&tmdb)
        .await;
    mount_json(
        &tmdb,
        "/movie/1/credits",
        json!({"cast": [cast(7, "Shared", "First")], "crew": []}),
    )
    .await;
    mount_json(
        &tmdb,
        "/movie/2/credits",
        json!({"cast": [cast(7, "Shared", "Second")], "crew": []}),
    )
    .await;

    let addr = start_server(&tmdb).await;
    let resp = compare(
        addr,
        json!([{"id": 1, "media_type": "movie"}, {"id": 2, "media_type": "movie"}]),
    )
    .await;

    assert_eq!(resp.status(), 200);
    let result: Value = resp.json().await.unwrap();
    assert_eq!(person(&result, 7)["cast_appearances"].as_array().unwrap().len(), 2);

    let credit_calls = tmdb
        .received_requests()
        .await
        .unwrap()
        .iter()
        .filter(|r| r.url.path() == "/movie/1/credits")
        .count();
    assert_eq!(credit_calls, 2, "Exactly one retry after the 429");
}

#[tokio::test]
async fn failed_base_fetch_fails_the_comparison() {
    let tmdb = MockServer::start().await;
    mount_json(&tmdb, "/movie/1/credits", json!({"cast": [], "crew": []})).await;
    Mock::given(method("GET"))
        .and(path("/movie/2/credits"))
        .respond_with(ResponseTemplate::new(503))
        .mount(&tmdb)
        .await;

    let addr = start_server(&tmdb).await;
    let resp = compare(
        addr,
        json!([{"id": 1, "media_type": "movie"}, {"id": 2, "media_type": "movie"}]),
    )
    .await;

    assert_eq!(resp.status(), 502);
    let body: Value = resp.json().await.unwrap();
    assert!(body["error"].as_str().unwrap().contains("movie 2"));
}
