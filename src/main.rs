//! nvshu CLI
//!
//! Usage:
//!   nvshu --poem "江永女书奇，闺中秘语稀。"   # Single negotiation
//!   nvshu --interactive                       # One poem per line
//!   nvshu --serve                             # HTTP API server
//!   nvshu --poem "..." --json                 # JSON output
//!   nvshu --poem "..." --commit               # Merge the glyph into the registry

use clap::Parser;
use colored::Colorize;
use rand::rngs::StdRng;
use rand::SeedableRng;
use std::io::{self, BufRead, Write};
use std::path::PathBuf;
use std::sync::Arc;
use tracing::{error, info, warn};

use nvshu::core::{
    init_tracing, run_server, AppState, GlyphRegistry, LogOptions, NegotiationController,
    TableGateway,
};
use nvshu::types::{
    ConfigError, GatewayError, Negotiation, NegotiationConfig, NegotiationOutcome,
    GENERIC_FAILURE_MESSAGE,
};
use nvshu::{DEFAULT_POEM, VERSION};

#[derive(Parser, Debug)]
#[command(
    name = "nvshu",
    version = VERSION,
    about = "Negotiate novel Nüshu-style glyph codes for poem characters",
    long_about = "A Sender masks one character of a poem that has no glyph yet; a\n\
                  Receiver guesses it from the embedding vocabulary under a retry\n\
                  budget. When the Receiver converges, or the Sender reveals the\n\
                  character, the character's vector is projected onto a 3-component\n\
                  glyph code.\n\n\
                  Modes:\n  \
                  --poem         Single negotiation\n  \
                  --interactive  One poem per line from stdin\n  \
                  --serve        HTTP API server mode\n\n\
                  States:\n  \
                  CONVERGED - Receiver found the character\n  \
                  REVEALED  - Sender revealed it after the retry budget\n  \
                  SKIPPED   - Every character already has a glyph"
)]
struct Args {
    /// Poem to negotiate on (single mode)
    #[arg(short, long)]
    poem: Option<String>,

    /// Interactive mode - read poems from stdin
    #[arg(short, long)]
    interactive: bool,

    /// Run as HTTP API server
    #[arg(short, long)]
    serve: bool,

    /// Server address
    #[arg(long, default_value = "127.0.0.1:3000")]
    addr: String,

    /// Vocabulary JSON file (built-in demo vocabulary when absent)
    #[arg(long)]
    vocab: Option<PathBuf>,

    /// Glyph registry file
    #[arg(long, default_value = "./knowledge/registry.json")]
    registry: PathBuf,

    /// Negotiation config JSON file
    #[arg(long)]
    config: Option<PathBuf>,

    /// Seed for reproducible runs
    #[arg(long)]
    seed: Option<u64>,

    /// Retry budget
    #[arg(long)]
    max_tries: Option<usize>,

    /// Relative slack of the transition band
    #[arg(long)]
    band_slack: Option<f32>,

    /// Merge concluded glyphs into the registry
    #[arg(long)]
    commit: bool,

    /// Translation stored with a committed glyph
    #[arg(long)]
    translation: Option<String>,

    /// Output as JSON
    #[arg(long)]
    json: bool,

    /// Disable colors in output
    #[arg(long)]
    no_color: bool,

    /// Show the attempt table and debug logs
    #[arg(long)]
    verbose: bool,

    /// Print the poem with known glyphs before negotiating
    #[arg(long)]
    hints: bool,
}

#[tokio::main]
async fn main() {
    let args = Args::parse();

    init_tracing(LogOptions {
        verbose: args.verbose,
        no_color: args.no_color,
    });
    if args.no_color {
        colored::control::set_override(false);
    }

    let config = match load_config(&args) {
        Ok(config) => config,
        Err(e) => {
            error!(reason = %e.reason(), error = %e, "configuration rejected");
            eprintln!("Configuration error: {}", e);
            std::process::exit(2);
        }
    };

    let gateway = match load_gateway(&args, &config) {
        Ok(gateway) => gateway,
        Err(e) => {
            error!(error = %e, "vocabulary unavailable");
            eprintln!("{}", GENERIC_FAILURE_MESSAGE);
            std::process::exit(1);
        }
    };

    let registry = match GlyphRegistry::load_or_default(&args.registry) {
        Ok(registry) => registry,
        Err(e) => {
            error!(reason = %e.reason(), error = %e, "registry unreadable");
            eprintln!("{}", GENERIC_FAILURE_MESSAGE);
            std::process::exit(1);
        }
    };

    if args.serve {
        run_serve(&args, gateway, registry, config).await;
    } else if args.interactive {
        run_interactive(&args, &gateway, registry, &config);
    } else {
        let poem = args.poem.clone().unwrap_or_else(|| DEFAULT_POEM.to_string());
        let code = run_single(&poem, &args, &gateway, registry, &config);
        std::process::exit(code);
    }
}

/// Config file (or defaults) with command-line overrides, validated
fn load_config(args: &Args) -> Result<NegotiationConfig, ConfigError> {
    let mut config = match &args.config {
        Some(path) => NegotiationConfig::from_json_file(path)?,
        None => NegotiationConfig::default(),
    };
    if let Some(seed) = args.seed {
        config.seed = Some(seed);
    }
    if let Some(max_tries) = args.max_tries {
        config.max_tries = max_tries;
    }
    if let Some(slack) = args.band_slack {
        config.band_slack = slack;
    }
    config.validate()?;
    Ok(config)
}

fn load_gateway(args: &Args, config: &NegotiationConfig) -> Result<TableGateway, GatewayError> {
    match &args.vocab {
        Some(path) => {
            let gateway = TableGateway::from_file(path)?;
            info!(path = %path.display(), "vocabulary loaded");
            Ok(gateway)
        }
        None => {
            warn!("no --vocab given, using the built-in demo vocabulary");
            TableGateway::demo(config.seed.unwrap_or(0))
        }
    }
}

fn make_rng(config: &NegotiationConfig, offset: u64) -> StdRng {
    match config.seed {
        Some(seed) => StdRng::seed_from_u64(seed.wrapping_add(offset)),
        None => StdRng::from_entropy(),
    }
}

/// Negotiate once and print the result. Returns the exit code.
fn negotiate_and_print(
    poem: &str,
    args: &Args,
    gateway: &TableGateway,
    registry: &mut GlyphRegistry,
    config: &NegotiationConfig,
    rng: &mut StdRng,
) -> i32 {
    if args.hints && !args.json {
        println!("{}", registry.render_hints(poem).text.dimmed());
    }

    let controller = NegotiationController::new(gateway, config);
    let outcome = match controller.negotiate(poem, &registry.known_mapping(), rng) {
        Ok(Negotiation::Concluded(outcome)) => outcome,
        Ok(Negotiation::Skipped(reason)) => {
            if args.json {
                println!(
                    "{}",
                    serde_json::json!({ "status": "skipped", "message": reason.user_message() })
                );
            } else {
                println!("{}", reason.user_message().yellow());
            }
            return 0;
        }
        Err(e) => {
            error!(reason = %e.reason(), error = %e, "negotiation failed");
            eprintln!("{}", e.user_message().red());
            return 1;
        }
    };

    if args.json {
        match serde_json::to_string_pretty(&outcome) {
            Ok(json) => println!("{}", json),
            Err(e) => {
                error!(error = %e, "outcome not serializable");
                return 1;
            }
        }
    } else if args.verbose {
        print_verbose(&outcome);
    } else if args.no_color {
        println!("{}", outcome.to_parseable_string());
    } else {
        println!("{}", outcome.to_terminal_string());
    }

    if args.commit {
        let translation = args.translation.as_deref().unwrap_or("");
        let status = registry.merge_outcome(&outcome, translation);
        if let Err(e) = registry.save(&args.registry) {
            error!(reason = %e.reason(), error = %e, "registry save failed");
            eprintln!("{}", GENERIC_FAILURE_MESSAGE.red());
            return 1;
        }
        if !args.json {
            println!("  registry: {:?} ({})", status, args.registry.display());
        }
    }
    0
}

/// Run single negotiation
fn run_single(
    poem: &str,
    args: &Args,
    gateway: &TableGateway,
    mut registry: GlyphRegistry,
    config: &NegotiationConfig,
) -> i32 {
    let mut rng = make_rng(config, 0);
    negotiate_and_print(poem, args, gateway, &mut registry, config, &mut rng)
}

/// Run interactive mode
fn run_interactive(
    args: &Args,
    gateway: &TableGateway,
    mut registry: GlyphRegistry,
    config: &NegotiationConfig,
) {
    print_header("Interactive", args.no_color);
    println!("Type a poem and press Enter. Type 'quit' to exit.");
    println!("Known glyphs: {}", registry.len());
    println!();

    let stdin = io::stdin();
    let mut stdout = io::stdout();
    let mut count = 0u64;

    loop {
        print!("{} ", "诗 >".bold());
        let _ = stdout.flush();

        let mut line = String::new();
        match stdin.lock().read_line(&mut line) {
            Ok(0) => break,
            Ok(_) => {}
            Err(_) => break,
        }

        let line = line.trim();
        if line.eq_ignore_ascii_case("quit") || line.eq_ignore_ascii_case("exit") {
            println!("\nSession ended. Negotiations: {}", count);
            break;
        }
        if line.is_empty() {
            continue;
        }

        let mut rng = make_rng(config, count);
        negotiate_and_print(line, args, gateway, &mut registry, config, &mut rng);
        count += 1;
    }
}

/// Print header
fn print_header(mode: &str, no_color: bool) {
    let title = format!("  nvshu v{} - {}", VERSION, mode);
    if no_color {
        println!("========================================");
        println!("{}", title);
        println!("========================================");
    } else {
        println!("{}", "╔════════════════════════════════════════╗".bold());
        println!("{}", format!("{:<40}", title).bold());
        println!("{}", "╚════════════════════════════════════════╝".bold());
    }
    println!();
}

/// Print the attempt table
fn print_verbose(outcome: &NegotiationOutcome) {
    let color = outcome.state.color();
    println!("{}", "┌──────────────────────────────────────┐".color(color));
    println!(
        "{}",
        format!(
            "│ {} → {}  (position {})",
            outcome.target_character, outcome.glyph, outcome.target_position
        )
        .color(color)
    );
    println!("{}", "├──────────────────────────────────────┤".color(color));
    for (record, poem) in outcome.history.iter().zip(outcome.guess_poems()) {
        let mark = if record.correct { "✓" } else { "✗" };
        println!("│ #{} {} {}  {}", record.attempt, record.character, mark, poem);
    }
    println!("{}", "├──────────────────────────────────────┤".color(color));
    println!(
        "{}",
        format!("│ State: {} | Reason: {}", outcome.state, outcome.reason().code()).color(color)
    );
    println!("│ Final: {}", outcome.final_reconstruction);
    println!("│ Digest: {}", &outcome.digest[..outcome.digest.len().min(16)]);
    println!("{}", "└──────────────────────────────────────┘".color(color));
}

/// Run HTTP API server
async fn run_serve(
    args: &Args,
    gateway: TableGateway,
    registry: GlyphRegistry,
    config: NegotiationConfig,
) {
    print_header("API Server", args.no_color);

    let state = AppState::new(
        Arc::new(gateway),
        registry,
        Some(args.registry.clone()),
        config,
    );
    if let Err(e) = run_server(&args.addr, state).await {
        error!(error = %e, "server stopped");
        eprintln!("Server error: {}", e);
        std::process::exit(1);
    }
}
