use anyhow::Result;
use clap::{Parser, Subcommand};
use rabbit_registry::auth::{NewUser, UserStore};
use rabbit_registry::config::{DEFAULT_BIND, parse_origins};
use rabbit_registry::{AppConfig, AuthSettings, CredentialHash, DatabaseConfig};
use tracing::{Level, info};
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "rabbit-registry")]
#[command(about = "Rabbit sheet registry for the SPI LOEN association")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Start the REST API
    Serve {
        /// Bind address
        #[arg(long, env = "RABBIT_BIND", default_value = DEFAULT_BIND)]
        bind: String,
        #[arg(long, env = "RABBIT_DB_URL", default_value = "memory")]
        db_url: String,
        /// Comma-separated list of allowed browser origins
        #[arg(long, env = "RABBIT_CORS_ORIGINS")]
        cors_origins: Option<String>,
    },
    /// Initialize the database
    Init {
        #[arg(long, env = "RABBIT_DB_URL", default_value = "memory")]
        db_url: String,
    },
    /// Print the stored form of a password
    HashPassword {
        password: String,
        /// PBKDF2 iteration count (defaults to the server setting)
        #[arg(long)]
        iterations: Option<u32>,
    },
    /// Create a user directly in the database
    CreateUser {
        username: String,
        #[arg(long)]
        password: String,
        #[arg(long, default_value = "benevole")]
        role: String,
        #[arg(long)]
        email: Option<String>,
        #[arg(long, env = "RABBIT_DB_URL", default_value = "memory")]
        db_url: String,
    },
    /// List registered users
    ListUsers {
        #[arg(long, env = "RABBIT_DB_URL", default_value = "memory")]
        db_url: String,
        #[arg(long, default_value_t = 0)]
        skip: u32,
        #[arg(long, default_value_t = 100)]
        limit: u32,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::from_default_env()
                .add_directive("rabbit_registry=info".parse()?)
                .add_directive("surrealdb=warn".parse()?),
        )
        .with_max_level(Level::INFO)
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Serve {
            bind,
            db_url,
            cors_origins,
        } => {
            let mut config = AppConfig {
                bind,
                database: DatabaseConfig {
                    url: db_url,
                    ..Default::default()
                },
                auth: AuthSettings::from_env()?,
                ..Default::default()
            };
            if let Some(raw) = cors_origins {
                config.cors_origins = parse_origins(&raw);
            }

            info!("Starting rabbit registry on {}", config.bind);
            rabbit_registry::serve(config).await?;
        }
        Commands::Init { db_url } => {
            let db_config = DatabaseConfig {
                url: db_url,
                ..Default::default()
            };
            info!("Initializing database at {}", db_config.url);

            let db = rabbit_registry::create_connection(db_config).await?;
            rabbit_registry::ensure_schema(&db).await?;
            println!("Database schema is up to date.");
        }
        Commands::HashPassword {
            password,
            iterations,
        } => {
            let iterations = match iterations {
                Some(n) => n,
                None => AuthSettings::from_env()?.password_iterations,
            };
            let hash =
                tokio::task::spawn_blocking(move || CredentialHash::derive(&password, iterations))
                    .await?;
            println!("{}", hash);
        }
        Commands::CreateUser {
            username,
            password,
            role,
            email,
            db_url,
        } => {
            let settings = AuthSettings::from_env()?;
            let db = connect(db_url).await?;
            let store = UserStore::new(db, settings.password_iterations);

            let user = store
                .create_user(NewUser {
                    username,
                    password,
                    first_name: None,
                    last_name: None,
                    email,
                    role: Some(role),
                })
                .await?;

            println!("User created successfully!");
            println!();
            println!("  Id:       {}", user.id);
            println!("  Username: {}", user.username);
            println!("  Role:     {}", user.role);
        }
        Commands::ListUsers {
            db_url,
            skip,
            limit,
        } => {
            let settings = AuthSettings::from_env()?;
            let db = connect(db_url).await?;
            let store = UserStore::new(db, settings.password_iterations);

            let users = store.list_users(skip, limit).await?;
            if users.is_empty() {
                println!("No users found.");
                return Ok(());
            }

            println!(
                "{:<30} {:<20} {:<12} {:<30}",
                "ID", "USERNAME", "ROLE", "EMAIL"
            );
            println!("{}", "-".repeat(92));

            for user in users {
                let email = user.email.unwrap_or_else(|| "-".to_string());
                println!(
                    "{:<30} {:<20} {:<12} {:<30}",
                    user.id.to_string(),
                    user.username,
                    user.role,
                    email
                );
            }
        }
    }

    Ok(())
}

async fn connect(db_url: String) -> Result<rabbit_registry::Db> {
    let db_config = DatabaseConfig {
        url: db_url,
        ..Default::default()
    };
    let db = rabbit_registry::create_connection(db_config).await?;
    rabbit_registry::ensure_schema(&db).await?;
    Ok(db)
}
