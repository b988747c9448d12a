use anyhow::{Context, Result};
use clap::Parser;
use std::path::PathBuf;
use tody_press::api::{ApiClient, ArticleApi};
use tody_press::config::{self, Config};
use tody_press::content::render::{html_attr, html_escape};
use tody_press::content::{render_blocks, BlockKind, ContentBlock};
use tody_press::model::ArticleRecord;

#[derive(Debug, Parser)]
#[command(
    about = "Export a stored article to a local HTML preview. Media render via their resolved URLs."
)]
struct Args {
    /// Path to YAML config file
    #[arg(long, default_value = "config.yaml")]
    config: PathBuf,

    /// Article id on the persistence API
    #[arg(long)]
    id: i64,
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_target(false)
        .compact()
        .init();

    let args = Args::parse();
    let cfg = config::load(Some(&args.config))?;
    run(&cfg, args.id).await
}

async fn run(cfg: &Config, id: i64) -> Result<()> {
    let client = ApiClient::from_config(cfg)?;
    let article = client
        .get_article(id)
        .await
        .with_context(|| format!("failed to fetch article {id}"))?;

    cfg.ensure_dirs()
        .with_context(|| format!("failed to create {}", cfg.app.data_dir))?;
    let out_dir = cfg.resolved_data_dir().join("html");
    let static_dir = out_dir.join("static");
    tokio::fs::create_dir_all(&static_dir)
        .await
        .with_context(|| format!("failed to create {}", static_dir.display()))?;

    let page_path = out_dir.join(format!("{id}.html"));
    tokio::fs::write(&page_path, render_html(&article))
        .await
        .with_context(|| format!("failed to write {}", page_path.display()))?;

    let css_path = static_dir.join("style.css");
    tokio::fs::write(&css_path, DEFAULT_STYLE)
        .await
        .with_context(|| format!("failed to write {}", css_path.display()))?;

    println!("Wrote {} and {}", page_path.display(), css_path.display());
    println!("================================");
    println!("Page full path: {}", absolute_path(&page_path).display());
    Ok(())
}

fn render_html(article: &ArticleRecord) -> String {
    let mut sorted: Vec<&ContentBlock> = article.blocks.iter().collect();
    sorted.sort_by_key(|b| b.order);

    let mut body = String::new();
    for block in sorted {
        body.push_str(&format!(
            "<div class=\"row {}\"><div class=\"seq noselect\">#{}</div>",
            block.kind.as_str().to_ascii_lowercase(),
            block.order
        ));
        body.push_str(&render_blocks(std::slice::from_ref(block)));
        if matches!(block.kind, BlockKind::Image | BlockKind::Video) && !block.caption.is_empty() {
            body.push_str(&format!(
                "<div class=\"caption\">{}</div>",
                html_escape(&block.caption)
            ));
        }
        body.push_str("</div>\n");
    }

    let cover = article
        .cover_url
        .as_deref()
        .filter(|u| !u.is_empty())
        .map(|u| format!("<img class=\"cover\" src=\"{}\" alt=\"\" />", html_attr(u)))
        .unwrap_or_default();

    format!(
        r#"<!doctype html>
<html lang="fr">
  <head>
    <meta charset="utf-8">
    <meta name="viewport" content="width=device-width, initial-scale=1">
    <title>{title}</title>
    <link rel="stylesheet" href="static/style.css">
  </head>
  <body>
    <header>
      <h1 class="noselect">{title}</h1>
      <p class="hint">{status} · {rubric}</p>
      {cover}
      <p class="lede">{description}</p>
    </header>
    <main>
      {body}
    </main>
  </body>
</html>"#,
        title = html_escape(&article.title),
        status = article.status,
        rubric = html_escape(article.rubric_name.as_deref().unwrap_or("-")),
        cover = cover,
        description = html_escape(&article.description),
        body = body
    )
}

fn absolute_path(p: &std::path::Path) -> std::path::PathBuf {
    if p.is_absolute() {
        return p.to_path_buf();
    }
    match std::env::current_dir() {
        Ok(cwd) => cwd.join(p),
        Err(_) => p.to_path_buf(),
    }
}

const DEFAULT_STYLE: &str = r#"
:root {
  color-scheme: light dark;
  --fg: #222;
  --bg: #fff;
  --muted: #666;
}

@media (prefers-color-scheme: dark) {
  :root {
    --fg: #eee;
    --bg: #121212;
    --muted: #aaa;
  }
}

html,
body {
  margin: 0;
  padding: 0;
  background: var(--bg);
  color: var(--fg);
  font: 16px/1.6 Georgia, 'Times New Roman', serif;
}

header {
  padding: 16px;
  max-width: 820px;
  margin: 0 auto;
  border-bottom: 1px solid #ddd4;
}

main {
  padding: 16px;
  max-width: 820px;
  margin: 0 auto;
}

.hint,
.caption {
  color: var(--muted);
  font-size: 0.9em;
}

.lede {
  font-style: italic;
}

.row {
  margin: 8px 0 16px;
  padding-bottom: 10px;
  border-bottom: 1px dashed #ddd3;
}

.row .seq {
  font-weight: 600;
  color: var(--muted);
}

blockquote {
  margin: 0;
  padding-left: 12px;
  border-left: 3px solid var(--muted);
}

img,
iframe {
  max-width: 100%;
  display: block;
  margin: 8px 0;
}

iframe {
  width: 100%;
  aspect-ratio: 16 / 9;
  border: 0;
}

.noselect {
  user-select: none;
  -webkit-user-select: none;
}
"#;
