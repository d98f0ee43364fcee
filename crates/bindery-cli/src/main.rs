//! bindery CLI - compile declarative function apps.

mod build;
mod clean;
mod colors;
mod openapi;
mod project;

use clap::{Parser, Subcommand};

#[derive(Parser)]
#[command(name = "bindery")]
#[command(about = "Compile declarative function apps into loadable modules")]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Compile a manifest into a module
    Build {
        /// Path to the manifest (.json, .yaml or .yml)
        manifest: String,

        /// Project directory (default: the manifest's directory)
        #[arg(long)]
        project_dir: Option<String>,

        /// Namespace of the compiled module
        #[arg(long)]
        namespace: Option<String>,

        /// Output directory for the module (default: <project>/bin)
        #[arg(short, long)]
        output: Option<String>,

        /// Output directory for OpenAPI files (default: <project>/.bindery/openapi)
        #[arg(long)]
        openapi_output: Option<String>,

        /// Build with optimizations and deny warnings
        #[arg(long)]
        release: bool,

        /// Do not touch the network while building
        #[arg(long)]
        offline: bool,
    },

    /// Generate OpenAPI documents without compiling
    Openapi {
        /// Path to the manifest (.json, .yaml or .yml)
        manifest: String,

        /// Output directory (default: <project>/.bindery/openapi)
        #[arg(short, long)]
        output: Option<String>,

        /// Namespace used for route defaults
        #[arg(long)]
        namespace: Option<String>,
    },

    /// Remove generated crates, sources and documents
    Clean {
        /// Project directory
        #[arg(default_value = ".")]
        project_dir: String,
    },
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let filter = if cli.verbose {
        tracing_subscriber::EnvFilter::from_default_env()
            .add_directive(tracing::Level::DEBUG.into())
    } else {
        tracing_subscriber::EnvFilter::from_default_env().add_directive(tracing::Level::WARN.into())
    };

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();

    // Attach recovery hints to pipeline errors
    let format_error = |err: anyhow::Error| -> anyhow::Error {
        if let Some(bindery_err) = err.downcast_ref::<bindery_core::Error>() {
            anyhow::anyhow!("{}", bindery_err.with_hint())
        } else {
            err
        }
    };

    match cli.command {
        Commands::Build {
            manifest,
            project_dir,
            namespace,
            output,
            openapi_output,
            release,
            offline,
        } => {
            let options = build::BuildOptions {
                project_dir: project_dir.as_deref(),
                namespace: namespace.as_deref(),
                output: output.as_deref(),
                openapi_output: openapi_output.as_deref(),
                release,
                offline,
            };
            build::execute(&manifest, &options).map_err(format_error)?;
        }

        Commands::Openapi {
            manifest,
            output,
            namespace,
        } => {
            openapi::execute(&manifest, output.as_deref(), namespace.as_deref())
                .map_err(format_error)?;
        }

        Commands::Clean { project_dir } => {
            clean::execute(&project_dir).map_err(format_error)?;
        }
    }

    Ok(())
}
