mod commands;

use clap::{CommandFactory, Parser};
use clap_complete::{Shell, generate};
use commands::SiteSource;
use std::io;
use std::path::PathBuf;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[derive(Parser)]
#[command(name = "sitekit")]
#[command(version, about = "Assemble, preview and regenerate AI-generated websites", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Parser)]
enum Command {
    /// Configure the generation backend URL and API token
    ///
    /// Settings are stored in ~/.sitekit/config.toml. SITEKIT_API_URL and
    /// SITEKIT_TOKEN override them for a single run.
    Configure,

    /// Generate a new website from a description
    Generate {
        /// What the website should be about
        description: String,

        /// Generation preference as key=value (repeatable)
        #[arg(long = "pref", value_parser = commands::parse_preference)]
        preferences: Vec<(String, String)>,
    },

    /// Expand a short description into a detailed generation prompt
    Improve {
        /// Prompt to improve
        prompt: String,
    },

    /// Show generation suggestions for a description
    Suggest {
        /// What the website should be about
        description: String,
    },

    /// List previously generated websites
    List,

    /// Show a website's pages and files
    Show {
        /// Website id
        id: String,
    },

    /// Print one page as a self-contained HTML document
    Assemble {
        #[command(flatten)]
        source: SiteSource,

        /// Page to assemble (defaults to the entry point)
        #[arg(short, long)]
        page: Option<String>,

        /// Write to a file instead of stdout
        #[arg(short, long)]
        output: Option<PathBuf>,
    },

    /// Regenerate a website from a modification request
    Regenerate {
        /// Website id
        id: String,

        /// What to change
        request: String,

        /// Page being viewed, re-resolved against the new file set
        #[arg(short, long)]
        page: Option<String>,
    },

    /// Delete a website from the backend
    Delete {
        /// Website id
        id: String,

        /// Skip confirmation prompt
        #[arg(long)]
        force: bool,
    },

    /// Download a website's zip archive from the backend
    Download {
        /// Website id
        id: String,

        /// Path of the zip file to write
        #[arg(short, long)]
        output: PathBuf,
    },

    /// Write every page as a self-contained HTML file
    Export {
        #[command(flatten)]
        source: SiteSource,

        /// Output directory
        #[arg(short, long)]
        output: PathBuf,

        /// Also package the output directory as <output>.zip
        #[arg(long)]
        zip: bool,
    },

    /// Preview a website locally with page navigation and regeneration
    Preview {
        #[command(flatten)]
        source: SiteSource,

        /// Port to serve on (defaults to preview.port from the config)
        #[arg(short, long)]
        port: Option<u16>,
    },

    /// Generate shell completion scripts
    Completions {
        /// Shell to generate completions for
        #[arg(value_enum)]
        shell: Shell,
    },
}

fn init_tracing() {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "warn,sitekit=info".into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(io::stderr))
        .init();
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    init_tracing();

    match cli.command {
        Command::Configure => commands::configure::run(),
        Command::Generate {
            description,
            preferences,
        } => commands::sites::generate(&commands::settings()?, &description, preferences).await,
        Command::Improve { prompt } => commands::sites::improve(&commands::settings()?, &prompt).await,
        Command::Suggest { description } => {
            commands::sites::suggest(&commands::settings()?, &description).await
        }
        Command::List => commands::sites::list(&commands::settings()?).await,
        Command::Show { id } => commands::sites::show(&commands::settings()?, &id).await,
        Command::Assemble {
            source,
            page,
            output,
        } => commands::assemble::run(&commands::settings()?, &source, page, output).await,
        Command::Regenerate { id, request, page } => {
            commands::sites::regenerate(&commands::settings()?, &id, &request, page).await
        }
        Command::Delete { id, force } => {
            commands::sites::delete(&commands::settings()?, &id, force).await
        }
        Command::Download { id, output } => {
            commands::sites::download(&commands::settings()?, &id, output).await
        }
        Command::Export {
            source,
            output,
            zip,
        } => commands::export::run(&commands::settings()?, &source, output, zip).await,
        Command::Preview { source, port } => {
            commands::preview::run(&commands::settings()?, source, port).await
        }
        Command::Completions { shell } => {
            let mut cmd = Cli::command();
            generate(shell, &mut cmd, "sitekit", &mut io::stdout());
            Ok(())
        }
    }
}
