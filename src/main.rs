use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand};
use external_importer::api::{NewProject, ProjectQuery, ProjectsApi, ServerClient};
use external_importer::app::ImportPanel;
use external_importer::upload::AssetKind;
use external_importer::utils::curl_parser::CurlRequest;
use external_importer::ImportConfig;
use std::fs;
use std::path::PathBuf;
use std::sync::Arc;
use tracing::info;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "external-importer", version, about = "Import external assets into a project")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Upload assets and create a task from them
    Import(ImportArgs),
    /// Browse or create projects
    #[command(subcommand)]
    Projects(ProjectsCommand),
}

#[derive(Subcommand)]
enum ProjectsCommand {
    List {
        #[command(flatten)]
        connection: ConnectionArgs,
        #[arg(long)]
        search: Option<String>,
        #[arg(long, default_value_t = 1)]
        page: u32,
    },
    Create {
        #[command(flatten)]
        connection: ConnectionArgs,
        #[arg(long)]
        name: String,
        #[arg(long, default_value = "")]
        description: String,
        #[arg(long = "tag")]
        tags: Vec<String>,
    },
}

#[derive(Args)]
struct ConnectionArgs {
    /// TOML file with server, project and retry settings
    #[arg(long)]
    config: Option<PathBuf>,
    /// File holding a "Copy as cURL" command from a logged-in browser
    #[arg(long)]
    curl: Option<PathBuf>,
    #[arg(long)]
    server: Option<String>,
    #[arg(long)]
    project: Option<u64>,
}

#[derive(Args)]
struct ImportArgs {
    #[command(flatten)]
    connection: ConnectionArgs,
    #[arg(long)]
    orthophoto: Option<PathBuf>,
    #[arg(long)]
    dsm: Option<PathBuf>,
    #[arg(long)]
    dtm: Option<PathBuf>,
    #[arg(long)]
    pointcloud: Option<PathBuf>,
    #[arg(long)]
    texturedmodel: Option<PathBuf>,
    /// Task name (defaults to "Task of <timestamp>")
    #[arg(long)]
    name: Option<String>,
}

impl ImportArgs {
    fn selections(&self) -> Vec<(AssetKind, &PathBuf)> {
        [
            (AssetKind::Orthophoto, &self.orthophoto),
            (AssetKind::Dsm, &self.dsm),
            (AssetKind::Dtm, &self.dtm),
            (AssetKind::PointCloud, &self.pointcloud),
            (AssetKind::TexturedModel, &self.texturedmodel),
        ]
        .into_iter()
        .filter_map(|(kind, path)| path.as_ref().map(|p| (kind, p)))
        .collect()
    }
}

fn load_config(args: &ConnectionArgs) -> Result<ImportConfig> {
    let mut config = match &args.config {
        Some(path) => ImportConfig::from_file(path)
            .with_context(|| format!("loading {}", path.display()))?,
        None => ImportConfig::default(),
    };

    if let Some(path) = &args.curl {
        let text = fs::read_to_string(path)
            .with_context(|| format!("reading curl command from {}", path.display()))?;
        CurlRequest::parse(&text)
            .context("parsing curl command")?
            .apply_to(&mut config);
    }
    if let Some(server) = &args.server {
        config.server = server.clone();
    }
    if let Some(project) = args.project {
        config.project_id = project;
    }

    Ok(config)
}

async fn run_import(args: ImportArgs) -> Result<()> {
    let config = load_config(&args.connection)?;
    config.validate()?;
    let client = Arc::new(ServerClient::new(&config)?);
    let mut panel = ImportPanel::new(client, &config);

    for (kind, path) in args.selections() {
        panel.select_path(kind, path)?;
    }

    let cancel = async {
        let _ = tokio::signal::ctrl_c().await;
    };
    let task = panel
        .start_upload(args.name.clone(), cancel)
        .await
        .map_err(|e| anyhow::anyhow!(e.user_message()))?;

    info!(task = %task.id, name = %task.name, "import finished");
    println!("{}", task.id);
    Ok(())
}

async fn run_projects(command: ProjectsCommand) -> Result<()> {
    match command {
        ProjectsCommand::List {
            connection,
            search,
            page,
        } => {
            let client = ServerClient::new(&load_config(&connection)?)?;
            let page = client
                .list_projects(&ProjectQuery { search, page })
                .await?;
            for project in &page.results {
                println!("{}\t{}", project.id, project.name);
            }
            info!(
                shown = page.results.len(),
                total = page.count,
                more = page.next.is_some(),
                "listed projects"
            );
        }
        ProjectsCommand::Create {
            connection,
            name,
            description,
            tags,
        } => {
            let client = ServerClient::new(&load_config(&connection)?)?;
            let project = client
                .create_project(&NewProject {
                    name,
                    description,
                    tags,
                })
                .await?;
            info!(id = project.id, name = %project.name, "project created");
            println!("{}", project.id);
        }
    }
    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    match Cli::parse().command {
        Command::Import(args) => run_import(args).await,
        Command::Projects(command) => run_projects(command).await,
    }
}
