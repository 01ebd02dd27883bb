use std::sync::Arc;

use anyhow::{Context, Result, anyhow};
use clap::{Parser, Subcommand};
use projectlist::{
    DirectoryManager, HttpContactService, HttpProjectService, Metadata, Project, Scope,
    ServiceConfig, SessionCredentials,
};
use tracing_subscriber::{EnvFilter, layer::SubscriberExt, util::SubscriberInitExt};

const ENV_ACCESS_TOKEN: &str = "PROJECTLIST_ACCESS_TOKEN";

#[derive(Parser)]
#[command(name = "projectlist")]
#[command(about = "List and manage projects of the project service")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// List projects
    List {
        #[arg(long, default_value = "mine")]
        scope: Scope,
        #[arg(long)]
        search: Option<String>,
    },
    /// List groups of the contact service
    Groups,
    /// Create a project linked to a group
    Create {
        name: String,
        /// Id of the group to link
        #[arg(long)]
        group: String,
    },
    /// Delete a project
    Delete { name: String },
    /// Link a project to another group
    Relink { name: String, group: String },
    /// Merge a JSON object into a project's metadata
    Metadata { name: String, json: String },
}

#[tokio::main]
async fn main() -> Result<()> {
    // RUST_LOG may come from .env
    dotenvy::dotenv().ok();
    init_tracing();

    let cli = Cli::parse();
    let config = ServiceConfig::from_env().context("failed to load configuration")?;
    let directory = build_directory(&config)?;

    match cli.command {
        Command::List { scope, search } => {
            directory.load_directory(scope).await?;
            if let Some(search) = search {
                directory.set_search(&search);
            }
            for project in directory.view() {
                print_project(&project);
            }
        }
        Command::Groups => {
            for group in directory.load_groups().await? {
                println!("{}\t{}", group.id, group.name);
            }
        }
        Command::Create { name, group } => {
            directory.create_project(&name, &group).await?;
            println!("created project '{name}'");
        }
        Command::Delete { name } => {
            directory.delete_project(&name).await?;
            println!("deleted project '{name}'");
        }
        Command::Relink { name, group } => {
            directory.load_directory(widest_scope(&config)).await?;
            let project = directory.relink_group(&name, &group).await?;
            print_project(&project);
        }
        Command::Metadata { name, json } => {
            let metadata: Metadata =
                serde_json::from_str(&json).context("metadata must be a JSON object")?;
            directory.load_directory(widest_scope(&config)).await?;
            directory.change_metadata(&name, metadata).await?;
            let project = directory
                .project(&name)
                .ok_or_else(|| anyhow!("project '{name}' disappeared"))?;
            print_project(&project);
        }
    }

    Ok(())
}

fn build_directory(config: &ServiceConfig) -> Result<DirectoryManager> {
    let credentials = match std::env::var(ENV_ACCESS_TOKEN) {
        Ok(token) if !token.trim().is_empty() => SessionCredentials::with_token(token.trim()),
        _ => SessionCredentials::new(),
    };

    let projects = HttpProjectService::from_config(config)
        .context("failed to build project service client")?;
    let contacts = HttpContactService::from_config(config)
        .context("failed to build contact service client")?;

    Ok(DirectoryManager::new(
        Arc::new(projects),
        Arc::new(contacts),
        Arc::new(credentials),
        Default::default(),
    )
    .disable_all_projects(config.disable_all_projects))
}

fn widest_scope(config: &ServiceConfig) -> Scope {
    if config.disable_all_projects {
        Scope::Mine
    } else {
        Scope::All
    }
}

fn print_project(project: &Project) {
    let marker = if project.is_member { "*" } else { " " };
    let group = project.group_name.as_deref().unwrap_or("-");
    match &project.metadata {
        Some(metadata) if !metadata.is_empty() => println!(
            "{marker} {}\t{group}\t{}",
            project.name,
            serde_json::Value::Object(metadata.clone())
        ),
        _ => println!("{marker} {}\t{group}", project.name),
    }
}

fn init_tracing() {
    tracing_subscriber::registry()
        .with(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("projectlist=info")),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();
}
