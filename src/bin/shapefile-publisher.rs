//! Shapefile Publisher CLI
//!
//! Imports zipped shapefiles into PostGIS and publishes them on GeoServer

use anyhow::Result;
use clap::{ArgAction, Parser, Subcommand};
use serde::Serialize;
use shapefile_publisher::core::naming::parse_toggle;
use shapefile_publisher::logging::init_logging;
use shapefile_publisher::{
    AppConfig, ConfigLoadOptions, ConfigLoader, PublishError, RetryManager, RetryOptions,
    ShapefileService, UploadRequest,
};
use std::path::PathBuf;
use std::process;

/// Import zipped shapefiles into PostGIS and publish them on GeoServer
#[derive(Parser)]
#[command(name = "shapefile-publisher")]
#[command(version)]
#[command(
    about = "Import zipped shapefiles into PostGIS and publish them on GeoServer",
    long_about = None
)]
struct Cli {
    /// Configuration file (defaults to config/publisher.<PUBLISHER_ENV>.yaml)
    #[arg(long, global = true, value_name = "PATH")]
    config: Option<PathBuf>,

    /// Increase log verbosity (repeatable)
    #[arg(short, long, action = ArgAction::Count, global = true)]
    verbose: u8,

    /// Emit logs as JSON lines on stderr
    #[arg(long, global = true)]
    log_json: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Import a zipped shapefile and publish it
    Publish {
        /// Zip archive holding the .shp/.shx/.dbf (and optional .prj/.sld)
        #[arg(value_name = "ZIP")]
        archive: PathBuf,

        /// Primary workspace (defaults to geoserver.workspace)
        #[arg(short, long)]
        workspace: Option<String>,

        /// Primary datastore (defaults to geoserver.datastore)
        #[arg(short, long)]
        datastore: Option<String>,

        /// Target SRID (defaults to import.defaultSrid)
        #[arg(long)]
        srid: Option<i32>,

        /// Also publish on the INDE mirror (`--inde` or `--inde=<1/true/yes/on>`)
        #[arg(
            long,
            value_name = "BOOL",
            num_args = 0..=1,
            require_equals = true,
            default_missing_value = "true"
        )]
        inde: Option<String>,

        /// Publish an already imported table
        #[arg(long)]
        skip_import: bool,

        /// Total attempts for retryable failures (overrides retry.maxAttempts)
        #[arg(long)]
        retries: Option<u32>,
    },

    /// List geometry tables registered in PostGIS
    Layers {
        /// Schema to list (defaults to the import schema)
        #[arg(long)]
        schema: Option<String>,
    },

    /// Validate the configuration
    Check,
}

#[tokio::main]
async fn main() {
    let result = run().await;

    match result {
        Ok(exit_code) => process::exit(exit_code),
        Err(e) => {
            eprintln!("Error: {:#}", e);
            process::exit(1);
        }
    }
}

async fn run() -> Result<i32> {
    let cli = Cli::parse();
    init_logging(cli.verbose, cli.log_json);

    let config = match ConfigLoader::load(ConfigLoadOptions::from_process(cli.config)).await {
        Ok(config) => config,
        Err(e) => return report_error(&e),
    };

    match cli.command {
        Commands::Publish {
            archive,
            workspace,
            datastore,
            srid,
            inde,
            skip_import,
            retries,
        } => {
            let request = UploadRequest {
                archive,
                workspace,
                datastore,
                srid,
                publish_on_inde: inde.as_deref().is_some_and(parse_toggle),
                skip_import,
            };
            publish_command(config, request, retries).await
        }
        Commands::Layers { schema } => layers_command(config, schema).await,
        Commands::Check => check_command(&config),
    }
}

async fn publish_command(
    mut config: AppConfig,
    request: UploadRequest,
    retries: Option<u32>,
) -> Result<i32> {
    if let Some(attempts) = retries {
        config.retry.max_attempts = attempts;
    }
    let retry = RetryManager::new(RetryOptions::from(&config.retry));

    let service = match ShapefileService::from_config(config) {
        Ok(service) => service,
        Err(e) => return report_error(&e),
    };

    match retry.retry(|| service.process_upload(&request)).await {
        Ok(result) => {
            tracing::info!(
                layer = %result.layer,
                workspace = %result.workspace,
                mirror = result.geoserver.mirror.is_some(),
                "upload published"
            );
            print_json(&result)?;
            Ok(0)
        }
        Err(e) => report_error(&e),
    }
}

async fn layers_command(config: AppConfig, schema: Option<String>) -> Result<i32> {
    let service = match ShapefileService::from_config(config) {
        Ok(service) => service,
        Err(e) => return report_error(&e),
    };

    match service.list_layers(schema.as_deref()).await {
        Ok(layers) => {
            print_json(&layers)?;
            Ok(0)
        }
        Err(e) => report_error(&e),
    }
}

fn check_command(config: &AppConfig) -> Result<i32> {
    let result = ConfigLoader::validate(config);
    println!("{}", ConfigLoader::format_validation_result(&result));

    Ok(if result.valid { 0 } else { 2 })
}

fn print_json<T: Serialize>(value: &T) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

/// Print the structured error on stdout and hints on stderr
fn report_error(error: &PublishError) -> Result<i32> {
    tracing::error!(code = error.code(), error = %error, "command failed");

    print_json(&error.to_payload())?;
    for action in error.suggested_actions() {
        eprintln!("  - {}", action);
    }

    Ok(error.exit_code())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse_publish(args: &[&str]) -> (PathBuf, Option<String>) {
        let cli = Cli::try_parse_from(args.iter().copied()).unwrap();
        match cli.command {
            Commands::Publish { archive, inde, .. } => (archive, inde),
            _ => panic!("expected publish"),
        }
    }

    #[test]
    fn test_bare_inde_flag_keeps_archive_positional() {
        let (archive, inde) =
            parse_publish(&["shapefile-publisher", "publish", "--inde", "rio.zip"]);

        assert_eq!(archive, PathBuf::from("rio.zip"));
        assert!(inde.as_deref().is_some_and(parse_toggle));
    }

    #[test]
    fn test_inde_value_requires_equals() {
        let (archive, inde) =
            parse_publish(&["shapefile-publisher", "publish", "rio.zip", "--inde=false"]);
        assert_eq!(archive, PathBuf::from("rio.zip"));
        assert_eq!(inde.as_deref(), Some("false"));
        assert!(!inde.as_deref().is_some_and(parse_toggle));

        let (_, inde) =
            parse_publish(&["shapefile-publisher", "publish", "--inde=yes", "rio.zip"]);
        assert!(inde.as_deref().is_some_and(parse_toggle));
    }

    #[test]
    fn test_inde_defaults_to_off() {
        let (_, inde) = parse_publish(&["shapefile-publisher", "publish", "rio.zip"]);

        assert_eq!(inde, None);
    }

    #[test]
    fn test_publish_requires_archive() {
        assert!(Cli::try_parse_from(["shapefile-publisher", "publish", "--inde"]).is_err());
    }
}
