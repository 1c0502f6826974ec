mod alerts;
mod cache;
mod config;
mod feedback;
mod github;
mod monitor;
mod parser;
mod sanitize;
mod syntax;
mod types;
mod ui;

use anyhow::{anyhow, Result};
use clap::{Parser, Subcommand};

use crate::config::Config;
use crate::github::{parse_pr_url, parse_repo_url, GithubClient};
use crate::types::RepoInfo;
use crate::ui::App;

const LOGO: &str = r#"
  監視
  kanshi
"#;

#[derive(Parser)]
#[command(name = "kanshi")]
#[command(about = "A TUI for watching automated review feedback on GitHub PRs")]
#[command(version)]
struct Args {
    /// GitHub repository or PR URL (e.g., https://github.com/owner/repo
    /// or https://github.com/owner/repo/pull/123).
    /// If not provided, the repository from the config file is used.
    url: Option<String>,

    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand)]
enum Command {
    /// Run the simulated asset monitor (readings on stdout, commands on stdin)
    Monitor,
    /// Poll the alerts endpoint and print the latest rows
    Alerts,
}

#[tokio::main]
async fn main() -> Result<()> {
    env_logger::init();

    let args = Args::parse();
    let config = Config::load();

    match args.command {
        Some(Command::Monitor) => return monitor::run(config.monitor).await,
        Some(Command::Alerts) => return alerts::run(config.alerts).await,
        None => {}
    }

    // Show logo
    eprintln!("{}", LOGO);

    let token = config.resolve_token();
    if token.is_none() {
        eprintln!("No token configured; only public repositories will work.");
    }

    // A PR URL jumps straight to the review screen
    if let Some(url) = &args.url {
        if let Ok((repo, number)) = parse_pr_url(url) {
            let client = GithubClient::new(repo, token)?;
            eprintln!(
                "Fetching PR #{} from {}...",
                number,
                client.repo().full_name()
            );
            let pr = client.get_pull_request(number).await?;

            let mut app = App::new_for_pr(config, client, pr);
            return app.run();
        }
    }

    let repo = match &args.url {
        Some(url) => parse_repo_url(url)?,
        None => {
            if config.github.owner.is_empty() || config.github.repo.is_empty() {
                return Err(anyhow!(
                    "No repository configured. Pass a GitHub URL or set github.owner and \
                     github.repo in ~/.config/kanshi/config.toml"
                ));
            }
            RepoInfo {
                owner: config.github.owner.clone(),
                repo: config.github.repo.clone(),
            }
        }
    };

    let client = GithubClient::new(repo, token)?;

    // Cached list renders instantly; a fresh fetch replaces it in the background
    if let Some(cached) = cache::load_cache(&client.repo().full_name()) {
        eprintln!(
            "Loaded {} pull requests from cache. Refreshing...",
            cached.len()
        );
        let mut app = App::new_with_prs(config, client, cached, true);
        return app.run();
    }

    eprintln!("Fetching pull requests from {}...", client.repo().full_name());
    let per_page = config.github.per_page;
    let prs = client.list_pull_requests(per_page).await?;

    if prs.is_empty() {
        eprintln!("No pull requests found.");
        return Ok(());
    }

    eprintln!("Found {} pull requests. Starting viewer...", prs.len());
    cache::save_cache(&client.repo().full_name(), &prs);

    let mut app = App::new_with_prs(config, client, prs, false);
    app.run()
}
