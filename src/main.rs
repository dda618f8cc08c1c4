mod cache;
mod client;
mod config;
mod course;
mod history;
mod session;
mod tui;

use anyhow::Result;
use clap::{CommandFactory, Parser};
use config::{ConfigFile, ResolvedConfig};

#[derive(Parser, Debug)]
#[command(
    name = "courser",
    about = "An interactive terminal course explorer driven by an LLM course generator",
    long_about = None,
)]
struct Args {
    /// Topic to generate directly to stdout (omit to enter interactive TUI mode)
    topic: Option<String>,

    /// Profile to use from config file
    #[arg(short, long, env = "COURSER_PROFILE")]
    profile: Option<String>,

    /// Override generator endpoint URL
    #[arg(long, env = "COURSER_ENDPOINT")]
    endpoint: Option<String>,

    /// Override API key
    #[arg(long, env = "COURSER_API_KEY")]
    api_key: Option<String>,

    /// Write a default config file to ~/.config/courser/config.toml and exit
    #[arg(long)]
    init: bool,

    /// List available profiles and exit
    #[arg(long)]
    profiles: bool,

    /// Generate shell completions and print to stdout (bash, zsh, fish, elvish)
    #[arg(long, value_name = "SHELL")]
    completions: Option<String>,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    // ── --init ────────────────────────────────────────────────────────────────
    if args.init {
        let path = ConfigFile::write_default_if_missing()?;
        println!("Config written to: {}", path.display());
        println!("Edit it, then run: courser");
        return Ok(());
    }

    // ── --completions ─────────────────────────────────────────────────────────
    if let Some(shell_name) = &args.completions {
        return generate_completions(shell_name);
    }

    let file = ConfigFile::load()?;

    // ── --profiles ────────────────────────────────────────────────────────────
    if args.profiles {
        print_profiles(&file);
        return Ok(());
    }

    let resolved = ResolvedConfig::resolve(
        &file,
        args.profile.as_deref(),
        args.endpoint.as_deref(),
        args.api_key.as_deref(),
    );

    // ── Single-shot mode (plain stdout, no TUI) ───────────────────────────────
    if let Some(topic) = args.topic {
        return run_single_shot(topic, resolved).await;
    }

    // ── Interactive TUI mode ──────────────────────────────────────────────────
    tui::run(resolved).await
}

// ── Single-shot mode ──────────────────────────────────────────────────────────

async fn run_single_shot(topic: String, resolved: ResolvedConfig) -> Result<()> {
    use session::{Dispatch, SessionController};

    println!();
    println!("  ▲ courser  {}  ·  {}", resolved.profile_name, resolved.endpoint);
    println!();
    println!("  topic: {topic}");
    println!();

    let mut client = client::GenerateClient::new(resolved.endpoint.clone(), resolved.timeout_secs)?;
    if let Some(key) = &resolved.api_key {
        client.set_api_key(key.clone());
    }

    let mut controller = SessionController::new(resolved.default_topic.clone());
    match controller.start(&topic) {
        Dispatch::Fetch(req) => {
            let result = client.generate(&req.prompt).await.map_err(|e| e.to_string());
            controller.resolve(req.ticket, result);
        }
        // A fresh controller has an empty cache, and start() is never Ignored
        // outside Loading — nothing to do on these arms.
        Dispatch::Ready | Dispatch::Ignored => {}
    }

    if let Some(msg) = controller.error() {
        eprintln!("  ✗ {msg}");
        std::process::exit(1);
    }

    if let Some(course) = controller.current_course() {
        print_course(course);
    }
    Ok(())
}

fn print_course(course: &course::Course) {
    println!("  {}", course.course_title);
    println!("  {}", "─".repeat(course.course_title.chars().count().max(8)));
    for section in &course.sections {
        println!();
        println!("  ## {}", section.heading);
        for para in &section.paragraphs {
            println!();
            println!("  {para}");
        }
    }
    if !course.choices.is_empty() {
        println!();
        println!("  Where to next:");
        for choice in &course.choices {
            println!("    [{}] {}", choice.key, choice.text);
        }
        println!();
        println!("  (run without a topic for the interactive explorer)");
    }
}

// ── Profiles listing (non-TUI) ────────────────────────────────────────────────

fn print_profiles(file: &ConfigFile) {
    let mut entries: Vec<(String, String, u64)> = file
        .profiles
        .iter()
        .map(|(name, p)| (name.clone(), p.endpoint.clone(), p.timeout_secs))
        .collect();
    entries.sort_by(|a, b| a.0.cmp(&b.0));
    println!();
    println!("  Profiles");
    for (name, endpoint, timeout) in &entries {
        let marker = if *name == file.default_profile { " ←" } else { "" };
        println!("  {name}{marker}");
        println!("    endpoint  {endpoint}");
        println!("    timeout   {timeout}s");
        println!();
    }
}

// ── Shell completions ─────────────────────────────────────────────────────────

fn generate_completions(shell_name: &str) -> Result<()> {
    use clap_complete::{Shell, generate};

    let shell: Shell = match shell_name.to_lowercase().as_str() {
        "bash"    => Shell::Bash,
        "zsh"     => Shell::Zsh,
        "fish"    => Shell::Fish,
        "elvish"  => Shell::Elvish,
        _ => {
            eprintln!("Unknown shell: {shell_name}");
            eprintln!("Supported: bash, zsh, fish, elvish");
            std::process::exit(1);
        }
    };

    let mut cmd = Args::command();
    generate(shell, &mut cmd, "courser", &mut std::io::stdout());
    Ok(())
}
