use anyhow::{bail, Context, Result};
use clap::Parser;
use discuss_embed_core::{
    lookup_from_settings, Command, ConfigError, Configurator, DirectConfig, Event, Mapping,
    NoopObserver, Session, Settings, Snapshot, Theme,
};
use std::fs;
use std::io::{self, Write};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tokio::io::{AsyncBufReadExt, BufReader};

#[derive(Parser)]
#[command(name = "discuss-embed")]
#[command(about = "Build the embed snippet for a repository's discussion widget", long_about = None)]
#[command(version, author = "Rotko Networks <hq@rotko.net>")]
struct Cli {
    /// Repository in owner/name form
    repo: Option<String>,

    /// How pages are mapped to discussions
    #[arg(short, long, value_enum, default_value = "pathname")]
    mapping: MappingArg,

    /// Search term or discussion number (specific and number mappings only)
    #[arg(short, long)]
    term: Option<String>,

    /// Discussion category, by name or id
    #[arg(short, long)]
    category: Option<String>,

    /// Widget theme
    #[arg(long, value_parser = parse_theme, default_value = "preferred_color_scheme")]
    theme: Theme,

    /// Disable reactions on the main post
    #[arg(long)]
    no_reactions: bool,

    /// Categories lookup endpoint (overrides DISCUSS_EMBED_LOOKUP_URL)
    #[arg(long)]
    lookup_url: Option<String>,

    /// Lookup timeout in seconds
    #[arg(long)]
    timeout: Option<u64>,

    /// Quiet period before a typed identifier is looked up, in milliseconds
    #[arg(long)]
    debounce_ms: Option<u64>,

    /// Output file (default: stdout)
    #[arg(short, long)]
    output: Option<PathBuf>,

    /// Print the full configuration as JSON instead of the snippet
    #[arg(long)]
    json: bool,

    /// Read identifiers and :commands from stdin, one per line
    #[arg(short, long, conflicts_with = "repo")]
    interactive: bool,

    /// List available themes
    #[arg(long)]
    list_themes: bool,

    /// List available mappings
    #[arg(long)]
    list_mappings: bool,

    /// Quiet mode (no category hints on stderr)
    #[arg(short = 'q', long)]
    quiet: bool,
}

#[derive(clap::ValueEnum, Clone, Copy, Debug)]
enum MappingArg {
    Pathname,
    Url,
    Title,
    #[value(name = "og:title")]
    OgTitle,
    Specific,
    Number,
}

impl From<MappingArg> for Mapping {
    fn from(arg: MappingArg) -> Self {
        match arg {
            MappingArg::Pathname => Mapping::Pathname,
            MappingArg::Url => Mapping::Url,
            MappingArg::Title => Mapping::Title,
            MappingArg::OgTitle => Mapping::OgTitle,
            MappingArg::Specific => Mapping::Specific,
            MappingArg::Number => Mapping::Number,
        }
    }
}

fn parse_theme(value: &str) -> Result<Theme, String> {
    value.parse().map_err(|e: ConfigError| e.to_string())
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_writer(io::stderr)
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "warn".into()),
        )
        .init();

    let cli = Cli::parse();

    if cli.list_themes {
        for theme in Theme::ALL {
            println!("{:<24} {}", theme.as_str(), theme.label());
        }
        return Ok(());
    }

    if cli.list_mappings {
        for mapping in Mapping::ALL {
            println!("{:<10} {}", mapping.as_str(), mapping.description());
        }
        return Ok(());
    }

    let settings = settings_for(&cli);

    if cli.interactive {
        run_interactive(&cli, &settings).await
    } else {
        run_once(&cli, &settings).await
    }
}

fn settings_for(cli: &Cli) -> Settings {
    let mut settings = Settings::from_env();
    if let Some(url) = &cli.lookup_url {
        settings.lookup_url = url.clone();
    }
    if let Some(secs) = cli.timeout {
        settings.lookup_timeout = Duration::from_secs(secs);
    }
    if let Some(ms) = cli.debounce_ms {
        settings.debounce = Duration::from_millis(ms);
    }
    settings
}

fn direct_config(cli: &Cli) -> DirectConfig {
    DirectConfig {
        theme: cli.theme,
        reactions_enabled: !cli.no_reactions,
    }
}

fn open_output(cli: &Cli) -> Result<Box<dyn Write + Send>> {
    Ok(match cli.output {
        Some(ref path) => Box::new(
            fs::File::create(path).with_context(|| format!("Failed to create {}", path.display()))?,
        ),
        None => Box::new(io::stdout()),
    })
}

async fn run_once(cli: &Cli, settings: &Settings) -> Result<()> {
    let lookup = lookup_from_settings(settings).context("Failed to build lookup client")?;
    let mut configurator = Configurator::with_direct(direct_config(cli));

    configurator.apply(Event::Command(Command::SetMapping {
        mapping: cli.mapping.into(),
    }))?;
    if let Some(term) = &cli.term {
        configurator.apply(Event::Command(Command::SetTerm {
            term: term.clone(),
        }))?;
    }

    let mut failure = None;
    if let Some(repo) = &cli.repo {
        match configurator.validate_now(&lookup, repo).await {
            Ok(()) => {
                if let Some(category) = &cli.category {
                    select_category(&mut configurator, category)?;
                } else if !cli.quiet {
                    show_categories(&configurator);
                }
            }
            Err(e) => {
                eprintln!("ℹ️  The repository must be public, have the app installed and discussions enabled");
                failure = Some(format!("{repo} cannot host the widget: {e}"));
            }
        }
    }

    let mut output = open_output(cli)?;
    write_snapshot(&mut output, &configurator.snapshot(), cli.json)?;

    match failure {
        Some(failure) => bail!(failure),
        None => Ok(()),
    }
}

fn select_category(configurator: &mut Configurator, category: &str) -> Result<()> {
    let by_id = configurator.apply(Event::Command(
        Command::SelectCategory {
            id: category.to_string(),
        },
    ));
    if by_id.is_ok() {
        return Ok(());
    }
    configurator
        .select_category_by_name(category)
        .with_context(|| format!("Category '{category}' not found"))
}

fn show_categories(configurator: &Configurator) {
    let categories = configurator.validator().categories();
    eprintln!("ℹ️  No category chosen, pick one with --category:");
    for category in categories {
        eprintln!("    {} {:<24} {}", category.emoji, category.name, category.id);
    }
}

fn write_snapshot(output: &mut dyn Write, snapshot: &Snapshot, json: bool) -> Result<()> {
    if json {
        writeln!(output, "{}", serde_json::to_string_pretty(snapshot)?)?;
    } else {
        write!(output, "{}", snapshot.snippet)?;
    }
    output.flush()?;
    Ok(())
}

/// Prints interactive snapshots: every rejected command, and the snippet
/// whenever it changes outside a pending lookup.
struct Printer {
    last: String,
    json: bool,
}

impl Printer {
    fn new(json: bool) -> Self {
        Self {
            last: String::new(),
            json,
        }
    }

    fn print(&mut self, snapshot: &Snapshot, output: &mut dyn Write, errors: &mut dyn Write) -> Result<()> {
        if let Some(error) = &snapshot.error {
            writeln!(errors, "Error: {error}")?;
        }
        if snapshot.status == "pending" || snapshot.snippet == self.last {
            return Ok(());
        }

        writeln!(errors, "# status: {}", snapshot.status)?;
        write_snapshot(output, snapshot, self.json)?;
        self.last.clone_from(&snapshot.snippet);
        Ok(())
    }
}

async fn run_interactive(cli: &Cli, settings: &Settings) -> Result<()> {
    let lookup = lookup_from_settings(settings).context("Failed to build lookup client")?;
    let (session, handle) = Session::spawn(
        Arc::new(lookup),
        Arc::new(NoopObserver),
        settings.debounce,
        direct_config(cli),
    );

    session.send(Command::SetMapping {
        mapping: cli.mapping.into(),
    });
    if let Some(term) = &cli.term {
        session.send(Command::SetTerm { term: term.clone() });
    }

    let mut snapshots = session.subscribe();
    let json = cli.json;
    let mut output = open_output(cli)?;
    let printer = tokio::spawn(async move {
        let mut printer = Printer::new(json);
        let mut errors = io::stderr();
        while snapshots.changed().await.is_ok() {
            let snapshot = snapshots.borrow_and_update().clone();
            if printer.print(&snapshot, &mut output, &mut errors).is_err() {
                break;
            }
        }
    });

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    while let Some(line) = lines.next_line().await? {
        match parse_line(&line) {
            Ok(command) => {
                session.send(command);
            }
            Err(e) => eprintln!("Error: {e}"),
        }
    }

    // let the last identifier settle and its lookup finish
    tokio::time::sleep(settings.debounce).await;
    let mut settled = session.subscribe();
    let _ = tokio::time::timeout(
        settings.lookup_timeout,
        settled.wait_for(|s| s.status != "pending"),
    )
    .await;

    drop(settled);
    drop(session);
    handle.await?;
    printer.await?;

    Ok(())
}

/// Plain lines are repository input; `:verb value` lines change settings.
fn parse_line(line: &str) -> Result<Command> {
    let line = line.trim_end_matches(['\r', '\n']);
    let Some(rest) = line.strip_prefix(':') else {
        return Ok(Command::RepositoryInput {
            value: line.to_string(),
        });
    };

    let (verb, value) = rest.split_once(' ').unwrap_or((rest, ""));
    let value = value.trim();

    Ok(match verb {
        "category" => Command::SelectCategory {
            id: value.to_string(),
        },
        "mapping" => Command::SetMapping {
            mapping: value.parse()?,
        },
        "term" => Command::SetTerm {
            term: value.to_string(),
        },
        "theme" => Command::SetTheme {
            theme: value.parse()?,
        },
        "reactions" => Command::SetReactions {
            enabled: matches!(value, "on" | "1" | "true" | "yes"),
        },
        other => anyhow::bail!("Unknown command ':{other}'"),
    })
}
