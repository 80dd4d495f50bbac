//! Instance Store - workflow instance administration CLI

use clap::Parser;
use tracing::{error, info};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use instance_store::{
    config::{Args, Command, LogFormat},
    db::MongoClient,
    InstanceQuery, InstanceStore,
};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load environment variables from .env file if present
    let _ = dotenvy::dotenv();

    let args = Args::parse();

    let log_level = args.log_level.clone();
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| format!("instance_store={},warn", log_level).into());
    match args.log_format {
        LogFormat::Json => tracing_subscriber::registry()
            .with(filter)
            .with(tracing_subscriber::fmt::layer().json().with_writer(std::io::stderr))
            .init(),
        LogFormat::Text => tracing_subscriber::registry()
            .with(filter)
            .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
            .init(),
    }

    if let Err(e) = args.validate() {
        error!("Configuration error: {}", e);
        std::process::exit(1);
    }

    let config = args.store_config();
    info!("MongoDB: {} (db '{}')", args.mongodb_uri, args.mongodb_db);
    info!("Collection: {}", config.collection_name);

    let mongo = MongoClient::new(&args.mongodb_uri, &args.mongodb_db).await?;
    let store = InstanceStore::connect(&mongo, &config).await?;

    match args.command {
        Command::Get { id } => match store.find_by_id(&id).await? {
            Some(instance) => println!("{}", serde_json::to_string_pretty(&instance)?),
            None => {
                error!("Workflow instance {} not found", id);
                std::process::exit(2);
            }
        },
        Command::List {
            filter,
            order_by,
            desc,
            skip,
            limit,
        } => {
            let query = Command::list_query(&filter, order_by, desc, skip, limit);
            let instances = store.find_many(&query).await?;
            println!("{}", serde_json::to_string_pretty(&instances)?);
        }
        Command::Count { filter } => {
            println!("{}", store.count(&filter.to_query()).await?);
        }
        Command::Delete { id } => {
            if store.delete_by_id(&id).await? {
                info!("Deleted workflow instance {}", id);
            } else {
                info!("Workflow instance {} not found, nothing deleted", id);
            }
        }
        Command::Purge { filter, dry_run } => {
            let query: InstanceQuery = filter.to_query();
            if dry_run {
                println!("{}", store.count(&query).await?);
            } else {
                let deleted = store.delete_many(&query).await?;
                println!("{}", deleted);
            }
        }
    }

    Ok(())
}
