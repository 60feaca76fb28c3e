use std::sync::Arc;

use clap::{Parser, Subcommand};
use groupgate::authz::web::{self, AppState};
use groupgate::authz::{Action, Authorizer, Permission, ResourceType};
use groupgate::directory::StaticDirectory;
use groupgate::session::SessionStore;
use groupgate::{jobs, settings, store};
use miette::{IntoDiagnostic, Result};
use tracing_subscriber::{fmt, EnvFilter};

#[derive(Parser, Debug)]
#[command(
    name = "groupgate",
    version,
    about = "Group-scoped permission grants and authorization checks"
)]
struct Cli {
    /// Path to configuration file
    #[arg(short, long, default_value = "config.toml")]
    config: String,

    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Serve the HTTP API (default)
    Serve,
    /// Print whether a user may perform an action on a resource
    Check {
        user: String,
        resource: String,
        #[arg(long = "type", default_value = "group")]
        resource_type: ResourceType,
        #[arg(long, default_value = "update")]
        action: Action,
    },
    /// Grant a group actions on resources matching a pattern
    Grant {
        group: String,
        pattern: String,
        #[arg(long = "type", default_value = "group")]
        resource_type: ResourceType,
        /// Repeat for several actions
        #[arg(long = "action", required = true)]
        actions: Vec<Action>,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    // logging
    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    fmt().with_env_filter(env_filter).init();

    let cli = Cli::parse();

    // load settings
    let settings = settings::Settings::load(&cli.config)?;
    tracing::info!(?settings, "Loaded configuration");

    // init permission store (database)
    let permissions = store::connect(&settings.database).await?;

    // load group directory
    let directory = StaticDirectory::load(
        &settings.directory.path,
        settings.directory.admin_group.clone(),
    )?;

    let authorizer = Authorizer::new(permissions, Arc::new(directory));

    match cli.command.unwrap_or(Command::Serve) {
        Command::Serve => {
            let sessions = Arc::new(SessionStore::from_settings(&settings.session));
            let _scheduler = jobs::init_scheduler(sessions.clone()).await?;
            let state = AppState {
                authorizer,
                sessions,
                session_cfg: Arc::new(settings.session.clone()),
            };
            web::serve(&settings.listen_addr(), state).await?;
        }
        Command::Check {
            user,
            resource,
            resource_type,
            action,
        } => {
            let allowed = authorizer
                .can_perform_action(&user, &resource, resource_type, Permission::from(action))
                .await?;
            println!(
                "{} {} {} {}: {}",
                user,
                action,
                resource_type,
                resource,
                if allowed { "allowed" } else { "denied" }
            );
        }
        Command::Grant {
            group,
            pattern,
            resource_type,
            actions,
        } => {
            let permission: Permission = actions.into_iter().collect();
            let outcome = authorizer
                .grant(&group, resource_type, &pattern, permission)
                .await?;
            println!(
                "{}",
                serde_json::to_string(&outcome).into_diagnostic()?
            );
        }
    }

    Ok(())
}
