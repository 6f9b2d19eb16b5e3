use axum::extract::{Query, State};
use axum::http::HeaderMap;
use axum::http::header::LINK;
use axum::routing::get;
use axum::{Json, Router};
use serde::Deserialize;
use serde_json::{Value, json};
use std::time::Duration;

/// A commit listing served over HTTP as `pages` pages of one commit each, hashes `p1..pN`.
#[derive(Clone)]
struct Listing {
    base: String,
    pages: usize,
    latency: Duration,
}

#[derive(Deserialize)]
struct PageQuery {
    page: Option<usize>,
}

fn listed_commit(hash: &str, page: usize) -> Value {
    let date = format!("2024-01-{:02}T00:00:00Z", 28 - page.min(27));
    json!({
        "sha": hash,
        "html_url": null,
        "commit": {
            "author": {"name": "Mona", "email": "mona@example.com", "date": date},
            "committer": {"name": "Mona", "email": "mona@example.com", "date": date},
            "message": hash,
        },
        "author": {"login": "mona", "id": 7},
    })
}

async fn commits_page(
    State(listing): State<Listing>,
    Query(query): Query<PageQuery>,
) -> (HeaderMap, Json<Value>) {
    tokio::time::sleep(listing.latency).await;
    let page = query.page.unwrap_or(1);
    let mut headers = HeaderMap::new();
    if page < listing.pages {
        let next = format!(
            r#"<{}/repos/a/b/commits?page={}>; rel="next""#,
            listing.base,
            page + 1
        );
        headers.insert(LINK, next.parse().unwrap());
    }
    (headers, Json(json!([listed_commit(&format!("p{page}"), page)])))
}

/// Serves `/repos/a/b/commits` on an ephemeral port and returns its base URL.
pub async fn serve_commit_pages(pages: usize, latency: Duration) -> String {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let base = format!("http://{}", listener.local_addr().unwrap());
    let app = Router::new()
        .route("/repos/{owner}/{name}/commits", get(commits_page))
        .with_state(Listing {
            base: base.clone(),
            pages,
            latency,
        });
    tokio::spawn(async move { axum::serve(listener, app).await.unwrap() });
    base
}
