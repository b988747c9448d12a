use std::path::PathBuf;

use anyhow::Result;
use clap::Parser;
use tody_press::api::ApiClient;
use tody_press::config;

#[derive(Parser, Debug)]
struct Args {
    /// Path to YAML config
    #[arg(long, default_value = "config.yaml")]
    config: PathBuf,

    /// Only show rubrics marked visible
    #[arg(long)]
    visible_only: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    let cfg = config::load(Some(&args.config))?;
    let client = ApiClient::from_config(&cfg)?;

    let roots = client.rubric_tree().await?;
    println!("Rubrics ({} roots):", roots.len());
    for root in &roots {
        for (depth, rubric) in root.walk() {
            if args.visible_only && rubric.visible == Some(false) {
                continue;
            }
            println!(
                "{}{} -> {{ id: {}, slug: {}, articles: {} }}",
                "  ".repeat(depth + 1),
                rubric.name,
                rubric.id,
                rubric.slug.as_deref().unwrap_or("-"),
                rubric.article_count.unwrap_or(0)
            );
        }
    }
    Ok(())
}
