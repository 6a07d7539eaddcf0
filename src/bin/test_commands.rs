//! Live smoke test against the GitHub API
//! Run with: cargo run --bin test_commands [login]
//! Set GITHUB_TOKEN to avoid the anonymous rate limit.

use release_finder::config::Config;
use release_finder::github::{paginate, FetchOutcome, GithubClient, PageItems, PageQuery};
use std::ops::ControlFlow;

async fn run(client: &GithubClient, max_pages: u32, query: PageQuery) -> (usize, FetchOutcome, Option<PageItems>) {
    let mut total = 0;
    let mut first = None;
    let outcome = paginate(
        client.per_page,
        query.page_limit(max_pages),
        |page| {
            let client = client.clone();
            let query = query.clone();
            async move { client.fetch_page(&query, page).await }
        },
        |page, items| {
            println!("  page {page}: {} items", items.len());
            total += items.len();
            if first.is_none() {
                first = Some(items);
            }
            ControlFlow::Continue(())
        },
    )
    .await;
    (total, outcome, first)
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    println!("=== release-finder API Tests ===\n");

    let config = Config::load(None);
    let login = std::env::args().nth(1).unwrap_or_else(|| "octocat".to_string());

    let mut client = GithubClient::new(
        &config.github.api_base,
        config.settings.api_timeout,
        config.settings.per_page,
    )?;
    match std::env::var("GITHUB_TOKEN") {
        Ok(token) if !token.is_empty() => {
            client = client.with_token(token);
            println!("Using GITHUB_TOKEN\n");
        }
        _ => println!("No GITHUB_TOKEN set, requests are anonymous\n"),
    }
    let max_pages = config.settings.max_pages;

    // Test 1: search users
    println!("--- Test 1: search users '{login}' ---");
    let (total, outcome, _) = run(&client, 1, PageQuery::SearchUsers { query: login.clone() }).await;
    println!("  {total} users, {outcome:?}\n");

    // Test 2: repositories of the user
    println!("--- Test 2: repositories of {login} ---");
    let query = PageQuery::SearchRepos { owner: login.clone(), query: String::new() };
    let (total, outcome, first) = run(&client, max_pages, query).await;
    println!("  {total} repositories, {outcome:?}\n");

    let Some(PageItems::Repos(repos)) = first else {
        println!("No repositories, stopping");
        return Ok(());
    };

    // Test 3: releases of each of the first few repositories
    for repo in repos.iter().take(3) {
        println!("--- Test 3: releases of {}/{} ---", login, repo.name);
        let query = PageQuery::ListReleases { owner: login.clone(), repo: repo.name.clone() };
        let (total, outcome, first) = run(&client, max_pages, query).await;
        println!("  {total} releases, {outcome:?}");
        if let Some(PageItems::Releases(releases)) = first {
            if let Some(latest) = releases.first() {
                println!("  latest: {} ({} assets)", latest.tag_name, latest.assets.len());
            }
        }
        println!();
    }

    println!("=== Done ===");
    Ok(())
}
