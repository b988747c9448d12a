use anyhow::{anyhow, Context, Result};
use clap::{Parser, Subcommand};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{info, warn};

use tody_press::api::{ApiClient, ArticleApi, Transition};
use tody_press::config;
use tody_press::content::{parse_blocks, render_blocks, ContentBlock, HtmlFragmentParser};
use tody_press::model::ArticleStatus;
use tody_press::payload::ArticleDraft;
use tody_press::publisher::Publisher;

#[derive(Debug, Parser)]
#[command(author, version, about)]
struct Args {
    /// Path to YAML config file
    #[arg(long, default_value = "config.yaml")]
    config: PathBuf,

    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Parse editor markup into content blocks (JSON on stdout)
    Parse { file: PathBuf },
    /// Rebuild editor markup from a JSON array of content blocks
    Render { file: PathBuf },
    /// Create or update a draft from editor markup
    Save {
        /// Editor markup file
        #[arg(long)]
        markup: PathBuf,
        /// Existing article id; omit to create a new draft
        #[arg(long)]
        id: Option<i64>,
        #[arg(long)]
        title: Option<String>,
        #[arg(long)]
        description: Option<String>,
        #[arg(long)]
        rubric: Option<i64>,
        /// Tag id, repeatable. The full list is sent on every save, so
        /// re-saving an article without `--tag` clears its tags.
        #[arg(long = "tag")]
        tags: Vec<i64>,
        #[arg(long)]
        cover: Option<i64>,
        /// Submit for review once saved
        #[arg(long)]
        submit: bool,
    },
    /// Upload a media file and print the markup to insert
    Upload { file: PathBuf },
    /// Show an article and its editor markup
    Show { id: i64 },
    Approve { id: i64 },
    Publish { id: i64 },
    Reject {
        id: i64,
        #[arg(long)]
        reason: String,
    },
    Archive { id: i64 },
    Delete { id: i64 },
    /// List the configured author's drafts
    Drafts {
        /// List published articles instead
        #[arg(long)]
        published: bool,
    },
    /// Page through all of the configured author's articles
    Mine {
        #[arg(long, default_value_t = 0)]
        page: u32,
        #[arg(long, default_value_t = 20)]
        size: u32,
    },
    /// List articles in a given status (e.g. PENDING_REVIEW)
    Queue {
        status: String,
        #[arg(long, default_value_t = 0)]
        page: u32,
        #[arg(long, default_value_t = 20)]
        size: u32,
    },
    /// Print the rubric tree
    Rubrics,
    /// Create a top-level rubric
    AddRubric { name: String },
    /// List editorial staff with their stats
    Team {
        /// List every user account instead
        #[arg(long)]
        all: bool,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_target(false)
        .compact()
        .init();

    let args = Args::parse();
    match args.command {
        Command::Parse { file } => parse_file(&file),
        Command::Render { file } => render_file(&file),
        command => run(&args.config, command).await,
    }
}

/// Offline: editor markup file -> blocks JSON.
fn parse_file(file: &Path) -> Result<()> {
    let markup = std::fs::read_to_string(file)
        .with_context(|| format!("failed to read {}", file.display()))?;
    let blocks = parse_blocks(&HtmlFragmentParser, &markup)?;
    println!("{}", serde_json::to_string_pretty(&blocks)?);
    Ok(())
}

/// Offline: blocks JSON file -> editor markup.
fn render_file(file: &Path) -> Result<()> {
    let raw = std::fs::read_to_string(file)
        .with_context(|| format!("failed to read {}", file.display()))?;
    let blocks: Vec<ContentBlock> =
        serde_json::from_str(&raw).context("expected a JSON array of content blocks")?;
    println!("{}", render_blocks(&blocks));
    Ok(())
}

async fn run(config_path: &Path, command: Command) -> Result<()> {
    let cfg = config::load(Some(config_path))?;
    let client = ApiClient::from_config(&cfg)?;
    let publisher = Publisher::new(Arc::new(client.clone()), Arc::new(HtmlFragmentParser));

    match command {
        Command::Parse { file } => parse_file(&file)?,
        Command::Render { file } => render_file(&file)?,
        Command::Save {
            markup,
            id,
            title,
            description,
            rubric,
            tags,
            cover,
            submit,
        } => {
            let markup = tokio::fs::read_to_string(&markup)
                .await
                .with_context(|| format!("failed to read {}", markup.display()))?;
            let mut draft = match id {
                Some(id) => publisher.open_for_edit(id).await?.0,
                None => ArticleDraft::new(cfg.author.id, cfg.author.region.clone()),
            };
            if let Some(title) = title {
                draft.title = title;
            }
            if let Some(description) = description {
                draft.description = description;
            }
            if rubric.is_some() {
                draft.rubric_id = rubric;
            }
            if cover.is_some() {
                draft.cover_media_id = cover;
            }
            draft.tag_ids.extend(tags);
            if !draft.tags_to_clear().is_empty() {
                warn!(
                    tags = ?draft.tags_to_clear(),
                    "saving without --tag clears the article's current tags"
                );
            }

            let record = publisher.save_markup(&mut draft, &markup).await?;
            info!(id = record.id, status = %record.status, "draft saved");
            println!("saved article {} ({})", record.id, record.status);
            if submit {
                let record = publisher.submit(&mut draft).await?;
                println!("article {} is now {}", record.id, record.status);
            }
        }
        Command::Upload { file } => {
            let name = file
                .file_name()
                .and_then(|n| n.to_str())
                .ok_or_else(|| anyhow!("invalid file name: {}", file.display()))?
                .to_string();
            let bytes = tokio::fs::read(&file)
                .await
                .with_context(|| format!("failed to read {}", file.display()))?;
            let mime = tody_press::api::content_type_for(&file);
            let (asset, markup) = publisher.upload_image(&name, mime, bytes).await?;
            println!("{}", serde_json::to_string_pretty(&asset)?);
            println!("{markup}");
        }
        Command::Show { id } => {
            let record = client.get_article(id).await?;
            println!(
                "#{} {} [{}] rubric={}",
                record.id,
                record.title,
                record.status,
                record.rubric_name.as_deref().unwrap_or("-")
            );
            println!("{}", render_blocks(&record.blocks));
        }
        Command::Approve { id } => transition(&client, &publisher, id, Transition::Approve).await?,
        Command::Publish { id } => transition(&client, &publisher, id, Transition::Publish).await?,
        Command::Reject { id, reason } => {
            transition(&client, &publisher, id, Transition::Reject { reason }).await?
        }
        Command::Archive { id } => transition(&client, &publisher, id, Transition::Archive).await?,
        Command::Delete { id } => {
            client.delete_article(id).await?;
            println!("deleted article {id}");
        }
        Command::Drafts { published } => {
            let articles = if published {
                client.author_published(cfg.author.id).await?
            } else {
                client.author_drafts(cfg.author.id).await?
            };
            for a in articles {
                println!("#{}\t{}\t{}", a.id, a.status, a.title);
            }
        }
        Command::Mine { page, size } => {
            let listing = client.author_articles(cfg.author.id, page, size).await?;
            for a in &listing.content {
                println!("#{}\t{}\t{}", a.id, a.status, a.title);
            }
            if let (Some(number), Some(pages)) = (listing.number, listing.total_pages) {
                println!("(page {} of {})", number + 1, pages);
            }
        }
        Command::Queue { status, page, size } => {
            let status = ArticleStatus::parse_status(&status)
                .ok_or_else(|| anyhow!("unknown status '{status}'"))?;
            let listing = client.articles_by_status(status, page, size).await?;
            for a in &listing.content {
                println!(
                    "#{}\t{}\t{}",
                    a.id,
                    a.author_name.as_deref().unwrap_or("-"),
                    a.title
                );
            }
            if let Some(total) = listing.total_elements {
                println!("({} of {} total)", listing.content.len(), total);
            }
        }
        Command::Rubrics => {
            for root in client.rubric_tree().await? {
                for (depth, rubric) in root.walk() {
                    println!("{}{} (id {})", "  ".repeat(depth), rubric.name, rubric.id);
                }
            }
        }
        Command::AddRubric { name } => {
            let rubric = client.create_rubric(&name).await?;
            println!("created rubric {} (id {})", rubric.name, rubric.id);
        }
        Command::Team { all: true } => {
            for user in client.all_users().await? {
                let state = if user.active == Some(false) { "inactive" } else { "active" };
                println!("{}\t{}\t{}\t{}", user.display_name(), user.email, user.role, state);
            }
        }
        Command::Team { all: false } => {
            for member in client.team_directory().await? {
                println!(
                    "{}\t{}\t{} articles\t{} views",
                    member.user.display_name(),
                    member.user.role,
                    member.stats.total_articles,
                    member.stats.views
                );
            }
        }
    }

    Ok(())
}

async fn transition(
    client: &ApiClient,
    publisher: &Publisher,
    id: i64,
    transition: Transition,
) -> Result<()> {
    let current = client.get_article(id).await?;
    let fresh = publisher.transition(&current, transition).await?;
    println!("article {} is now {}", fresh.id, fresh.status);
    Ok(())
}
