use std::path::PathBuf;
use std::time::Instant;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use log::info;
use serde::Serialize;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};

use food_identifier::nutrition::{NutritionClient, NutritionCredentials};
use food_identifier::pokedex;
use food_identifier::{
    AnnotatedResult, BuiltinModel, ImageFetcher, ImageReference, MobileNetLoader, ModelHandle,
    ModelManager, ModelState, RuntimeConfig, SessionController, SessionError, SessionView,
};

#[derive(Parser)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Custom ONNX model file (requires --labels-path)
    #[arg(long, global = true, requires = "labels_path")]
    model_path: Option<PathBuf>,

    /// Labels file for the custom model, one label per line
    #[arg(long, global = true, requires = "model_path")]
    labels_path: Option<PathBuf>,

    /// Intra-op threads for ONNX Runtime (0 lets the runtime decide)
    #[arg(long, global = true, default_value_t = 0)]
    threads: usize,

    /// Number of predictions shown per image
    #[arg(long, global = true, default_value_t = food_identifier::DEFAULT_TOP_K)]
    top_k: usize,

    /// Never download the built-in model, fail if it is not cached
    #[arg(long, global = true)]
    offline: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Classify one or more images (paths or URLs)
    Identify {
        #[arg(required = true)]
        images: Vec<String>,
        /// Print results as JSON
        #[arg(long)]
        json: bool,
    },
    /// Line-based session: open, identify, recent, pick, clear, retry, quit
    Interactive,
    /// Download and verify the built-in model
    Download {
        /// Force a fresh download of the model files
        #[arg(short, long)]
        fresh: bool,
    },
    /// Look up nutrition hints for a food (needs EDAMAM_APP_ID and EDAMAM_APP_KEY)
    Nutrition { food: String },
    /// Print the monster names listed on pokedex.org
    Scrape {
        #[arg(long, default_value = pokedex::POKEDEX_URL)]
        url: String,
    },
}

#[derive(Serialize)]
struct Report<'a> {
    image: &'a ImageReference,
    #[serde(flatten)]
    annotated: &'a AnnotatedResult,
}

fn build_loader(args: &Args) -> Result<MobileNetLoader> {
    let runtime_config = RuntimeConfig::default().with_threads(args.threads);
    let loader = match (&args.model_path, &args.labels_path) {
        (Some(model), Some(labels)) => MobileNetLoader::from_files(model, labels),
        _ => MobileNetLoader::builtin(ModelManager::new_default()?, BuiltinModel::MobileNetV2, !args.offline),
    };
    Ok(loader.with_runtime_config(runtime_config).with_top_k(args.top_k))
}

fn render_results(annotated: &AnnotatedResult) {
    for (prediction, category) in annotated.rows() {
        let mut line = format!(
            "  {}  Confidence level: {}",
            prediction.label,
            prediction.confidence_percent()
        );
        if let Some(annotation) = category.and_then(|c| c.annotation()) {
            line.push_str(&format!("  [{}]", annotation));
        }
        println!("{}", line);
    }
}

fn render(view: &SessionView<'_>) {
    match view.current {
        Some(image) => println!("Image: {} ({:?})", image, view.state),
        None => println!("No image selected"),
    }
    if let Some(error) = view.error {
        println!("Error: {}", error);
    }
    if let Some(results) = view.results {
        render_results(results);
    }
    if !view.recent.is_empty() {
        println!("RECENT IMAGES");
        for (i, image) in view.recent.iter().enumerate() {
            println!("  {}. {}", i + 1, image);
        }
    }
}

async fn identify(model: &ModelHandle, images: &[String], json: bool) -> Result<()> {
    let fetcher = ImageFetcher::new();
    let mut session = SessionController::new();
    let mut reports = Vec::new();

    for input in images {
        let Some(reference) = ImageReference::parse(input) else {
            continue;
        };
        session.select_image(reference.clone());
        let start = Instant::now();
        match session.classify(model, &fetcher).await {
            Ok(annotated) => {
                info!("Classified in {:.2?}", start.elapsed());
                if json {
                    reports.push(serde_json::to_value(Report {
                        image: &reference,
                        annotated,
                    })?);
                }
            }
            Err(e) => eprintln!("{}: {}", input, e),
        }
        if !json {
            render(&session.view());
            println!();
        }
    }

    if json {
        println!("{}", serde_json::to_string_pretty(&reports)?);
    }
    Ok(())
}

async fn interactive(model: ModelHandle, loader: MobileNetLoader) -> Result<()> {
    let background = model.clone();
    let background_loader = loader.clone();
    tokio::spawn(async move {
        background.load(&background_loader).await;
    });

    println!("Loading Please Wait...");
    if let ModelState::LoadFailed(reason) = model.wait_until_settled().await {
        println!("Model unavailable: {} (type `retry` to try again)", reason);
    }

    let fetcher = ImageFetcher::new();
    let mut session = SessionController::new();
    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    let mut stdout = tokio::io::stdout();

    loop {
        stdout.write_all(b"> ").await?;
        stdout.flush().await?;
        let Some(line) = lines.next_line().await? else {
            break;
        };
        let (command, rest) = line.trim().split_once(' ').unwrap_or((line.trim(), ""));

        match command {
            "" => continue,
            "quit" | "exit" => break,
            "open" => match ImageReference::parse(rest) {
                Some(reference) => session.select_image(reference),
                None => session.clear(),
            },
            "clear" => session.clear(),
            "identify" => {
                if let Err(e) = session.classify(&model, &fetcher).await {
                    if !matches!(e, SessionError::Classifier(_)) {
                        println!("{}", e);
                    }
                }
            }
            "pick" => match rest.trim().parse::<usize>() {
                Ok(n) if n >= 1 => {
                    if let Err(e) = session.select_history_item(n - 1) {
                        println!("{}", e);
                    }
                }
                _ => println!("usage: pick <number from RECENT IMAGES>"),
            },
            "recent" => {}
            "retry" => {
                println!("Loading Please Wait...");
                let state = model.retry(&loader).await;
                println!("Model {}", state);
            }
            other => {
                println!("unknown command `{}`", other);
                println!("commands: open <path|url>, identify, recent, pick <n>, clear, retry, quit");
                continue;
            }
        }
        render(&session.view());
    }
    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    food_identifier::init_logger();
    let args = Args::parse();

    match &args.command {
        Command::Identify { images, json } => {
            let model = ModelHandle::new();
            let loader = build_loader(&args)?;
            let start = Instant::now();
            if let ModelState::LoadFailed(reason) = model.load(&loader).await {
                anyhow::bail!("Model unavailable: {}", reason);
            }
            info!("Model loaded in {:.2?}", start.elapsed());
            identify(&model, images, *json).await
        }
        Command::Interactive => interactive(ModelHandle::new(), build_loader(&args)?).await,
        Command::Download { fresh } => {
            let manager = ModelManager::new_default()?;
            let model = BuiltinModel::MobileNetV2;
            if *fresh {
                info!("Fresh download requested - removing any existing model files...");
                manager.remove_download(model)?;
            }
            manager.ensure_model_downloaded(model).await?;
            println!("Model ready in {}", manager.models_dir().display());
            Ok(())
        }
        Command::Nutrition { food } => {
            let client = NutritionClient::new(NutritionCredentials::from_env()?);
            let hints = client.lookup(food).await?;
            println!("{}", serde_json::to_string_pretty(&hints)?);
            Ok(())
        }
        Command::Scrape { url } => {
            let names = pokedex::fetch_names(&reqwest::Client::new(), url)
                .await
                .context("crawl failed")?;
            for name in names {
                println!("{}", name);
            }
            Ok(())
        }
    }
}
