use clap::{Parser, Subcommand};
use eyre::Context;
use ncpd::config::{CLIENT_ID_VAR, PLATFORM_VAR, REFRESH_TOKEN_VAR};
use ncpd::{Config, Error, FanclubClient};
use serde::Serialize;
use std::io::{IsTerminal, Write};
use std::path::{Path, PathBuf};
use tokio_stream::{Stream, StreamExt};
use tracing::level_filters::LevelFilter;
use tracing_subscriber::EnvFilter;

/// Command-line access to Nicochannel+ and QloveR fanclub sites.
#[derive(Debug, Parser)]
#[command(name = "ncpd-cli", version)]
struct Cli {
    /// Platform to talk to: nicochannel or qlover [env: NCPD_PLATFORM]
    #[arg(long, global = true)]
    platform: Option<String>,

    /// OAuth client id of the platform's web front [env: NICO_CLIENT_ID]
    #[arg(long, global = true)]
    client_id: Option<String>,

    /// Refresh token to start from [env: NICO_REFRESH_TOKEN]
    #[arg(long, global = true)]
    refresh_token: Option<String>,

    /// File holding the latest refresh token; read at start, rewritten at exit
    #[arg(long, global = true)]
    token_file: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Refresh the access token and print when it expires
    Auth,
    /// List every channel on the platform
    Channels {
        /// Only the channel served under this URL
        #[arg(long)]
        domain: Option<String>,
    },
    /// Show a channel's name, description and artwork
    Site { site_id: u64 },
    /// List a channel's videos, one JSON object per line
    Videos { site_id: u64 },
    /// Show one video in full
    Video { site_id: u64, content_code: String },
    /// List a channel's news articles, one JSON object per line
    Articles { site_id: u64 },
    /// Show one article with its full contents
    Article { site_id: u64, article_code: String },
    /// Open a playback session and print its id
    SessionId { content_code: String },
    /// List the renditions of a video
    Streams {
        content_code: String,
        /// Print only the highest-bandwidth rendition
        #[arg(long)]
        best: bool,
    },
    /// Download the complete comment history of one or more videos
    Comments {
        site_id: u64,
        #[arg(required = true)]
        content_codes: Vec<String>,
        /// Write `<content_code>.json` files here instead of printing
        #[arg(long)]
        out_dir: Option<PathBuf>,
    },
}

#[tokio::main]
async fn main() -> eyre::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::builder()
                .with_default_directive(LevelFilter::INFO.into())
                .from_env_lossy(),
        )
        .with_ansi(std::io::stderr().is_terminal())
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    let mut refresh_token = cli.refresh_token.clone();
    if let Some(path) = &cli.token_file {
        // a saved token is newer than whatever the environment holds
        if tokio::fs::try_exists(path).await.unwrap_or(false) {
            let token = tokio::fs::read_to_string(path)
                .await
                .with_context(|| format!("read refresh token from {}", path.display()))?;
            refresh_token = Some(token.trim().to_string());
        }
    }

    let config = Config::from_env_with(|key| match key {
        PLATFORM_VAR => cli.platform.clone(),
        CLIENT_ID_VAR => cli.client_id.clone(),
        REFRESH_TOKEN_VAR => refresh_token.clone(),
        _ => None,
    })
    .context("load configuration")?;
    tracing::debug!(?config, "starting");

    let client = FanclubClient::from_config(&config).context("build fanclub client")?;

    let outcome = run(&client, cli.command).await;

    if let Some(path) = &cli.token_file {
        let token = client.refresh_token().await;
        tokio::fs::write(path, format!("{token}\n"))
            .await
            .with_context(|| format!("save refresh token to {}", path.display()))?;
        tracing::debug!(path = %path.display(), "saved refresh token");
    }

    outcome
}

async fn run(client: &FanclubClient, command: Command) -> eyre::Result<()> {
    match command {
        Command::Auth => {
            client.access_token().await.context("refresh access token")?;
            print_json(&serde_json::json!({
                "platform": client.gateway().platform().name,
                "expires_at": client.token_expiry().await,
            }))
        }
        Command::Channels { domain: None } => {
            let channels = client.list_channels().await.context("list channels")?;
            print_json(&channels)
        }
        Command::Channels {
            domain: Some(domain),
        } => {
            let channel = client
                .channel_by_domain(&domain)
                .await
                .with_context(|| format!("look up channel at {domain}"))?;
            print_json(&channel)
        }
        Command::Site { site_id } => {
            let info = client
                .site_info(site_id)
                .await
                .with_context(|| format!("fetch info of site {site_id}"))?;
            print_json(&info)
        }
        Command::Videos { site_id } => print_lines(client.videos(site_id))
            .await
            .with_context(|| format!("list videos of site {site_id}")),
        Command::Video {
            site_id,
            content_code,
        } => {
            let video = client
                .video_details(site_id, &content_code)
                .await
                .with_context(|| format!("fetch video {content_code}"))?;
            print_json(&video)
        }
        Command::Articles { site_id } => print_lines(client.articles(site_id))
            .await
            .with_context(|| format!("list articles of site {site_id}")),
        Command::Article {
            site_id,
            article_code,
        } => {
            let article = client
                .article(site_id, &article_code)
                .await
                .with_context(|| format!("fetch article {article_code}"))?;
            if !article.has_contents() {
                tracing::warn!(article_code, "article has no contents, it may be for subscribers only");
            }
            print_json(&article)
        }
        Command::SessionId { content_code } => {
            let session_id = client
                .session_id(&content_code)
                .await
                .map_err(explain_forbidden)
                .with_context(|| format!("open playback session for {content_code}"))?;
            println!("{session_id}");
            Ok(())
        }
        Command::Streams {
            content_code,
            best: true,
        } => {
            let best = client
                .best_stream(&content_code)
                .await
                .map_err(explain_forbidden)
                .with_context(|| format!("pick best stream of {content_code}"))?;
            print_json(&best)
        }
        Command::Streams {
            content_code,
            best: false,
        } => {
            let variants = client
                .stream_variants(&content_code)
                .await
                .map_err(explain_forbidden)
                .with_context(|| format!("list streams of {content_code}"))?;
            print_json(&variants)
        }
        Command::Comments {
            site_id,
            content_codes,
            out_dir,
        } => download_comments(client, site_id, &content_codes, out_dir.as_deref()).await,
    }
}

/// Fetches each video's comments in turn; one failing video does not stop the
/// others.
async fn download_comments(
    client: &FanclubClient,
    site_id: u64,
    content_codes: &[String],
    out_dir: Option<&Path>,
) -> eyre::Result<()> {
    if let Some(dir) = out_dir {
        tokio::fs::create_dir_all(dir)
            .await
            .with_context(|| format!("create {}", dir.display()))?;
    }

    let mut failed = 0;
    for code in content_codes {
        let result = async {
            let comments = client
                .all_comments(site_id, code)
                .await
                .with_context(|| format!("collect comments of {code}"))?;
            match out_dir {
                Some(dir) => {
                    let path = dir.join(format!("{code}.json"));
                    let json = serde_json::to_vec_pretty(&comments).context("encode comments")?;
                    tokio::fs::write(&path, json)
                        .await
                        .with_context(|| format!("write {}", path.display()))?;
                    tracing::info!(code, count = comments.len(), path = %path.display(), "saved comments");
                }
                None => print_json(&comments)?,
            }
            Ok::<_, eyre::Report>(())
        }
        .await;

        if let Err(e) = result {
            failed += 1;
            tracing::error!(code, error = ?e, "failed to download comments");
        }
    }

    if failed > 0 {
        eyre::bail!("{failed} of {} videos failed", content_codes.len());
    }
    Ok(())
}

fn explain_forbidden(e: Error) -> eyre::Report {
    if e.is_subscriber_only() {
        eyre::Report::new(e).wrap_err("this video is for subscribers only")
    } else {
        eyre::Report::new(e)
    }
}

fn print_json<T: Serialize + ?Sized>(value: &T) -> eyre::Result<()> {
    let mut stdout = std::io::stdout().lock();
    serde_json::to_writer_pretty(&mut stdout, value).context("write JSON")?;
    writeln!(stdout).context("write JSON")?;
    Ok(())
}

async fn print_lines<T: Serialize>(items: impl Stream<Item = ncpd::Result<T>>) -> eyre::Result<()> {
    let mut items = std::pin::pin!(items);
    let mut count = 0usize;
    while let Some(item) = items.next().await {
        let line = serde_json::to_string(&item?).context("encode item")?;
        println!("{line}");
        count += 1;
    }
    tracing::info!(count, "listed");
    Ok(())
}
