use clap::{Parser, Subcommand};
use site_tools::channel::{Credentials, HttpChannelClient};
use site_tools::copier::ScanCopier;
use site_tools::importer::{self, SiteLayout};
use site_tools::markup::{self, DocumentError, Node, Registry};
use site_tools::reference::MessageRef;
use site_tools::signals::{Signal, Signals, SiteContext};
use site_tools::{config, gallery, output};
use std::io::Write;
use std::path::{Path, PathBuf};
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "site-tools")]
#[command(about = "Automation for a static personal site")]
#[command(long_about = "\
Automation for a static personal site

Imports channel messages as posts, mirrors scanned documents into the
generator's output folder, and renders scan gallery entries.

Site structure:

  site/
  ├── site.toml                    # Optional config (see gen-config)
  ├── posts/                       # Imported posts: YYYY-MM-DD_HH-MM-SS-mmm.rst
  ├── images/                      # Imported media, one file per basename
  ├── scans/
  │   ├── Quorum_64/               # Page gallery (p001.jpg, p001.thumbnail.jpg, ...)
  │   ├── Quorum_64.pdf            # Download next to its gallery
  │   └── Quorum_64.djvu
  └── output/                      # Generator output; scans/ is mirrored here

Credentials for import come from --api-id/--api-hash, TG_API_ID/TG_API_HASH
(a .env file is read), or an interactive prompt.

Run 'site-tools gen-config' to generate a documented site.toml.")]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(clap::Args)]
struct ImportArgs {
    /// Message link, e.g. https://t.me/channel/236
    message_url: Option<String>,

    /// Site root that holds posts/ and images/
    #[arg(default_value = ".")]
    site_root: PathBuf,

    /// Platform API id (overrides TG_API_ID)
    #[arg(long)]
    api_id: Option<String>,

    /// Platform API hash (overrides TG_API_HASH)
    #[arg(long)]
    api_hash: Option<String>,
}

#[derive(Subcommand)]
enum Command {
    /// Import one channel message (and its album) as a post
    Import(ImportArgs),
    /// Copy new or updated PDF/DJVU scans into the output folder
    CopyScans {
        /// Site root
        #[arg(long, default_value = ".")]
        root: PathBuf,
    },
    /// Render one scan gallery entry as HTML
    ScanEntry {
        /// Book title
        title: String,
        /// Gallery directory under the scans root
        #[arg(long)]
        path: String,
        /// Description, inserted as raw HTML
        #[arg(long)]
        desc: Option<String>,
        /// Site root
        #[arg(long, default_value = ".")]
        root: PathBuf,
    },
    /// Expand scan directives and roles in a reST document
    Render {
        /// Document to expand
        file: PathBuf,
        /// Site root
        #[arg(long, default_value = ".")]
        root: PathBuf,
    },
    /// Print a stock site.toml with all options documented
    GenConfig,
}

#[tokio::main]
async fn main() {
    dotenvy::dotenv().ok();
    init_tracing();
    let cli = Cli::parse();

    if let Err(e) = run(cli).await {
        eprintln!("Error: {e}");
        std::process::exit(1);
    }
}

async fn run(cli: Cli) -> Result<(), Box<dyn std::error::Error>> {
    match cli.command {
        Command::Import(args) => {
            let Some(url) = args.message_url else {
                eprintln!("Usage: site-tools import <message-url> [site-root]");
                std::process::exit(1);
            };
            let config = config::load_config(&args.site_root)?;
            let layout = SiteLayout::new(&args.site_root, &config.import)?;
            let reference = MessageRef::parse(&url)?;
            let credentials = Credentials::resolve(
                (args.api_id, args.api_hash),
                |name| std::env::var(name).ok(),
                &mut std::io::stdin().lock(),
                &mut std::io::stdout(),
            )?;
            let mut client = HttpChannelClient::new(
                &config.import.api_base,
                credentials,
                &config.import.session_name,
            );
            let outcome =
                importer::import_message(&mut client, &reference, &layout, &config.import).await?;
            output::print_import_output(&outcome);
        }
        Command::CopyScans { root } => {
            let context = SiteContext::new(&root, config::load_config(&root)?);
            let mut signals = Signals::new();
            ScanCopier::connect(&mut signals);
            signals.emit(Signal::Initialized, &context);
        }
        Command::ScanEntry {
            title,
            path,
            desc,
            root,
        } => {
            let registry = registry(&root)?;
            let mut options = vec![("path".to_string(), path)];
            if let Some(desc) = desc {
                options.push(("desc".to_string(), desc));
            }
            let nodes = registry
                .invoke(gallery::NAME, &title, options, Vec::new(), 1)
                .unwrap_or_default();
            let mut errors = Vec::new();
            for node in nodes {
                match node {
                    Node::Raw { content, .. } => println!("{}", content),
                    Node::Error { message, line } => errors.push(DocumentError { line, message }),
                }
            }
            if !errors.is_empty() {
                exit_with_document_errors(Path::new(gallery::NAME), &errors)?;
            }
        }
        Command::Render { file, root } => {
            let source = std::fs::read_to_string(&file)?;
            let registry = registry(&root)?;
            let expanded = markup::expand(&registry, &source);
            print!("{}", expanded.text);
            if !expanded.errors.is_empty() {
                exit_with_document_errors(&file, &expanded.errors)?;
            }
        }
        Command::GenConfig => {
            print!("{}", config::stock_config_toml());
        }
    }

    Ok(())
}

/// Diagnostics go to stderr; `RUST_LOG` overrides the default `warn` level.
fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

/// Registry with the site's gallery directive and role.
fn registry(root: &Path) -> Result<Registry, config::ConfigError> {
    let config = config::load_config(root)?;
    let mut registry = Registry::new();
    gallery::register(&mut registry, root, &config);
    Ok(registry)
}

/// Report document errors and exit non-zero, after flushing what was printed.
fn exit_with_document_errors(file: &Path, errors: &[DocumentError]) -> std::io::Result<()> {
    std::io::stdout().flush()?;
    output::print_document_errors(file, errors);
    std::process::exit(1);
}
