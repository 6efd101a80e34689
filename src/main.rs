use std::{path::PathBuf, sync::Arc, time::Duration};
use anyhow::{bail, Context, Result};
use clap::{Args, Parser, Subcommand};
use indicatif::{ProgressBar, ProgressStyle};
use tracing_subscriber::EnvFilter;

use promptforge::{
    api::{self, AppState},
    config::AppConfig,
    generate::{self, TextRequest},
    io::save_image,
    learn,
    modifiers,
    prompts::GenerationRequest,
    providers::{build_image_provider, build_text_model},
    store::{FileStore, PathStore, StoredPath},
};

#[derive(Parser)]
#[command(name = "promptforge", version, about = "Styled image, chat and learning-path generation")]
struct Cli {
    /// YAML config file; environment variables override its values.
    #[arg(long, global = true, env = "PROMPTFORGE_CONFIG")]
    config: Option<PathBuf>,
    #[command(subcommand)]
    command: Command,
}

#[derive(Args, Clone)]
struct ModifierArgs {
    #[arg(long)]
    style: Option<String>,
    #[arg(long)]
    camera_angle: Option<String>,
    #[arg(long)]
    lighting: Option<String>,
}

impl ModifierArgs {
    fn request(self, prompt: String) -> GenerationRequest {
        GenerationRequest {
            base_prompt: prompt,
            style: self.style,
            camera_angle: self.camera_angle,
            lighting: self.lighting,
        }
    }
}

#[derive(Subcommand)]
enum Command {
    /// Run the HTTP API.
    Serve {
        #[arg(long)]
        bind: Option<String>,
    },
    /// Print the composed prompt without generating anything.
    Compose {
        prompt: String,
        #[command(flatten)]
        modifiers: ModifierArgs,
    },
    /// Print a random scene prompt.
    Random,
    /// Add quality phrases to a prompt, or rewrite it with the model when --ai is set.
    Enhance {
        prompt: String,
        #[arg(long)]
        ai: bool,
    },
    /// List the accepted style, camera angle and lighting values.
    Modifiers,
    /// Chat-style text generation.
    Text {
        prompt: String,
        #[arg(long)]
        model: Option<String>,
    },
    /// Generate an image; with --out the image is decoded and saved there.
    Image {
        prompt: String,
        #[command(flatten)]
        modifiers: ModifierArgs,
        #[arg(long)]
        out: Option<PathBuf>,
    },
    /// Generate and store a learning path for a topic.
    Learn {
        topic: Option<String>,
        #[arg(long, conflicts_with_all = ["topic", "clear"])]
        show: bool,
        #[arg(long, conflicts_with = "topic")]
        clear: bool,
    },
    /// Generate theory and assignments for a chapter of the stored learning path.
    Chapter { number: usize },
}

fn spinner(msg: &'static str) -> ProgressBar {
    let pb = ProgressBar::new_spinner();
    if let Ok(style) = ProgressStyle::with_template("{spinner} {msg}") {
        pb.set_style(style);
    }
    pb.enable_steady_tick(Duration::from_millis(100));
    pb.set_message(msg);
    pb
}

fn print_path(stored: &StoredPath) {
    println!("{} (saved {})", stored.topic, stored.saved_at.to_rfc3339());
    for (i, c) in stored.path.chapters.iter().enumerate() {
        println!("{:>3}. {} - {}", i + 1, c.title, c.description);
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("promptforge=info,tower_http=info")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    // Commands that never touch a provider do not need a valid config.
    match &cli.command {
        Command::Compose { prompt, modifiers } => {
            println!("{}", modifiers.clone().request(prompt.clone()).compose());
            return Ok(());
        }
        Command::Random => {
            println!("{}", modifiers::random_prompt(&mut rand::rng()));
            return Ok(());
        }
        Command::Enhance { prompt, ai: false } => {
            if prompt.trim().is_empty() {
                bail!("prompt is required");
            }
            println!("{}", modifiers::enhance_prompt(prompt, &mut rand::rng()));
            return Ok(());
        }
        Command::Modifiers => {
            let c = modifiers::catalog();
            for (name, list) in [("style", &c.styles), ("camera-angle", &c.camera_angles), ("lighting", &c.lighting)] {
                let values: Vec<_> = list.iter().map(|o| o.value).collect();
                println!("{name}: {}", values.join(", "));
            }
            return Ok(());
        }
        _ => {}
    }

    let cfg = AppConfig::load(cli.config.as_deref()).await?;
    let store = FileStore::new(cfg.state_dir.clone());

    match cli.command {
        Command::Serve { bind } => {
            let bind = bind.unwrap_or_else(|| cfg.bind.clone());
            let images = build_image_provider(&cfg)?;
            let text = build_text_model(&cfg)?;
            tracing::info!(image = images.name(), text = text.name(), state = %cfg.state_dir.display(), "providers ready");
            let state = AppState::new(cfg, images, text, Arc::new(store));
            api::serve(&bind, state).await?;
        }
        Command::Enhance { prompt, .. } => {
            let model = build_text_model(&cfg)?;
            let pb = spinner("Enhancing prompt...");
            let out = generate::ai_enhance(model.as_ref(), &cfg.text.models, &prompt).await;
            pb.finish_and_clear();
            println!("{}", out?);
        }
        Command::Text { prompt, model } => {
            let text_model = build_text_model(&cfg)?;
            let pb = spinner("Generating...");
            let out = generate::text(text_model.as_ref(), &cfg.text.models, &TextRequest { prompt, model }).await;
            pb.finish_and_clear();
            println!("{}", out?);
        }
        Command::Image { prompt, modifiers, out } => {
            let provider = build_image_provider(&cfg)?;
            let pb = spinner("Generating image...");
            let outcome = generate::image(provider.as_ref(), &modifiers.request(prompt)).await;
            pb.finish_and_clear();
            let outcome = outcome?;
            eprintln!("prompt: {}", outcome.prompt);
            if outcome.fallback {
                bail!("image generation failed (placeholder {})", outcome.image);
            }
            match out {
                Some(dir) => println!("{}", save_image(&dir, &outcome.image).await?.display()),
                None => println!("{}", outcome.image),
            }
        }
        Command::Learn { topic, show, clear } => {
            if clear {
                store.clear().await?;
                println!("learning path cleared");
            } else if show {
                match store.get().await? {
                    Some(stored) => print_path(&stored),
                    None => println!("no learning path stored"),
                }
            } else {
                let topic = topic.context("a topic is required (or use --show / --clear)")?;
                let model = build_text_model(&cfg)?;
                let pb = spinner("Generating your learning path...");
                let path = learn::generate_path(model.as_ref(), &cfg.text.models, &topic).await;
                pb.finish_and_clear();
                let stored = StoredPath::new(topic.trim(), path?);
                store.set(stored.clone()).await?;
                print_path(&stored);
            }
        }
        Command::Chapter { number } => {
            let stored = store
                .get()
                .await?
                .context("no learning path stored; run `promptforge learn <topic>` first")?;
            let model = build_text_model(&cfg)?;
            let pb = spinner("Generating chapter...");
            let res = learn::generate_chapter(model.as_ref(), &cfg.text.models, &stored.path, number).await;
            pb.finish_and_clear();
            let (chapter, content) = res?;
            println!("# {}\n\n{}\n", chapter.title, chapter.description);
            println!("{}\n", content.theory.description);
            if !content.theory.resources.is_empty() {
                println!("## Resources");
                for r in &content.theory.resources {
                    println!("- {r}");
                }
                println!();
            }
            println!("## Assignments");
            for (i, a) in content.assignments.iter().enumerate() {
                println!("{}. {}\n   {}", i + 1, a.question, a.answer);
            }
        }
        Command::Compose { .. } | Command::Random | Command::Modifiers => {}
    }
    Ok(())
}
