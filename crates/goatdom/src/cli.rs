//! Command-line front end.

use std::io::{self, Write};
use std::path::PathBuf;
use std::str::FromStr;
use std::sync::Arc;

use anyhow::{Context, Result, bail};
use clap::{ArgAction, CommandFactory, Parser, Subcommand};
use clap_complete::Shell;

use crate::app::artifact::ArtifactOptions;
use crate::app::builder::TreeBuilder;
use crate::app::coordinator::BuildState;
use crate::app::report::{self, ReportFormat, Reporter};
use crate::app::session::AuthoringSession;
use crate::app::tree::TreeModel;
use crate::domain::model::NodeId;
use crate::infra::client::ServiceClient;
use crate::infra::config::Config;

#[derive(Debug, Parser)]
#[command(
    name = "goatdom",
    author,
    version,
    about = "Browse page element trees and author retrieval instructions",
    long_about = None
)]
pub struct Cli {
    /// Base URL of the tree-building service, overriding configuration.
    #[arg(long, global = true, value_name = "URL")]
    service_url: Option<String>,
    /// Increase log detail on stderr; repeat for more.
    #[arg(short, long, global = true, action = ArgAction::Count)]
    verbose: u8,
    #[command(subcommand)]
    command: Commands,
}

#[derive(Debug, Subcommand)]
enum Commands {
    /// Build the element tree of a page and print it as an outline
    Tree {
        url: String,
        /// Deepest level to expand; everything when omitted
        #[arg(long)]
        depth: Option<usize>,
    },
    /// Mark nodes of a page and write the resulting artifact
    Author {
        url: String,
        /// Node to mark, optionally with its output key
        #[arg(long = "pick", value_name = "ID[=KEY]")]
        picks: Vec<Pick>,
        /// Mark every node with this tag
        #[arg(long = "pick-tag", value_name = "TAG")]
        tags: Vec<String>,
        /// Destination file; `.goat` is appended when it has no extension
        #[arg(short, long)]
        output: Option<PathBuf>,
    },
    /// Render an artifact as a readable report
    Show {
        file: PathBuf,
        #[arg(long, value_enum)]
        format: Option<ReportFormat>,
    },
    /// Send an artifact to the scrape endpoint and print the response
    Scrape { file: PathBuf },
    /// Print shell completions
    Completions {
        #[arg(value_enum)]
        shell: Shell,
    },
}

/// A node id with an optional output key override.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Pick {
    pub id: NodeId,
    pub key: Option<String>,
}

impl FromStr for Pick {
    type Err = String;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        let (id, key) = match value.split_once('=') {
            Some((id, key)) => (id, Some(key.to_owned())),
            None => (value, None),
        };
        let id = id
            .trim()
            .parse()
            .map_err(|_| format!("'{id}' is not a node id"))?;
        Ok(Self { id, key })
    }
}

impl Cli {
    /// Default log directive for the requested verbosity.
    pub fn log_level(&self) -> &'static str {
        match self.verbose {
            0 => "info",
            1 => "debug",
            _ => "trace",
        }
    }
}

/// Execute the parsed command.
pub async fn run(cli: Cli) -> Result<()> {
    if let Commands::Completions { shell } = cli.command {
        let mut command = Cli::command();
        clap_complete::generate(shell, &mut command, "goatdom", &mut io::stdout());
        return Ok(());
    }

    let mut config = Config::load()?;
    if let Some(url) = cli.service_url {
        config.service.base_url = Some(url);
    }

    let stdout = io::stdout();
    let mut out = stdout.lock();

    match cli.command {
        Commands::Tree { url, depth } => {
            let tree = build_once(&config, &url).await?;
            let mut session = AuthoringSession::new();
            session.set_url(url);
            session.attach_tree(Arc::clone(&tree));
            match depth {
                Some(depth) => session.expansion_mut().expand_to_depth(&tree, depth),
                None => session.expansion_mut().expand_all(&tree),
            }
            write!(out, "{}", report::render_outline(&tree, session.expansion()))?;
        }
        Commands::Author {
            url,
            picks,
            tags,
            output,
        } => {
            if picks.is_empty() && tags.is_empty() {
                bail!("nothing to mark; pass --pick or --pick-tag");
            }
            let tree = build_once(&config, &url).await?;
            let mut session = AuthoringSession::new();
            session.set_url(url);
            session.attach_tree(tree);

            for pick in picks {
                let index = session
                    .mark(pick.id)
                    .with_context(|| format!("cannot mark node {}", pick.id))?;
                if let Some(key) = pick.key {
                    session.set_key(index, key)?;
                }
            }
            for tag in &tags {
                let marked = session.mark_tag(tag)?;
                if marked.is_empty() {
                    tracing::warn!(tag = %tag, "no nodes with this tag");
                }
            }
            let mut err = io::stderr().lock();
            for warning in session.key_warnings() {
                writeln!(err, "warning: {warning}")?;
            }

            let options = ArtifactOptions::from_config(&config);
            match output {
                Some(path) => {
                    let written = session.save(path, options)?;
                    writeln!(out, "{}", written.display())?;
                }
                None => writeln!(out, "{}", session.export_artifact(options)?)?,
            }
        }
        Commands::Show { file, format } => {
            let mut session = AuthoringSession::new();
            session.load(&file)?;
            let format = format.unwrap_or_else(|| config.report.format());
            let rendered = Reporter::new()?.render(
                session.url(),
                &session.instructions(),
                &session.key_warnings(),
                format,
            )?;
            write!(out, "{rendered}")?;
        }
        Commands::Scrape { file } => {
            let mut session = AuthoringSession::new();
            session.load(&file)?;
            let client = ServiceClient::from_config(&config.service)?;
            let dataset = client.scrape(&session.scrape_request()).await?;
            let pretty =
                serde_json::to_string_pretty(&dataset).context("failed to format response")?;
            writeln!(out, "{pretty}")?;
        }
        Commands::Completions { .. } => {}
    }
    Ok(())
}

/// Build the tree for `url` immediately and wait for the result.
async fn build_once(config: &Config, url: &str) -> Result<Arc<TreeModel>> {
    let client = ServiceClient::from_config(&config.service)?;
    let mut builder = TreeBuilder::spawn(Arc::new(client), config.builder.debounce());
    builder.set_url(url)?;
    builder.rebuild()?;
    let snapshot = builder.settled().await?;
    builder.shutdown().await;

    match snapshot.state {
        BuildState::Ready(tree) => Ok(tree),
        BuildState::Failed(err) => {
            Err(err).with_context(|| format!("failed to build tree for {url}"))
        }
        _ => bail!("no tree built; the URL is empty"),
    }
}
