//! # Quill
//!
//! Command line entry point: run the collaborative editing server, or drive
//! an in-process coordinator with many concurrent clients.

use clap::{Parser, Subcommand};
use quill_log::MemoryStore;
use quill_server::{AllowAll, Coordinator, ServerConfigBuilder};
use std::sync::Arc;
use stress_test::{stress_test_scaling, stress_test_sessions};
use tracing_subscriber::EnvFilter;

pub mod stress_test;

#[derive(Parser)]
#[command(name = "quill")]
#[command(about = "Real-time collaborative text editing server")]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Serve documents over line-delimited JSON on TCP
    Serve {
        /// Address to listen on
        #[arg(long, default_value = "127.0.0.1:9001")]
        bind: String,

        /// Maximum sessions attached to one document
        #[arg(long, default_value_t = 64)]
        max_sessions: usize,

        /// Keep a blank line at the end of every document
        #[arg(long)]
        blank_line_padding: bool,

        /// Text of newly created documents
        #[arg(long, default_value = "")]
        default_text: String,
    },
    /// Concurrent clients editing one document, then a convergence check
    Stress {
        /// Number of clients
        #[arg(long, default_value_t = 4)]
        clients: usize,

        /// Local edits per client
        #[arg(long, default_value_t = 200)]
        edits: usize,

        /// Also run the scaling series up to this many clients
        #[arg(long)]
        scale_to: Option<usize>,
    },
}

#[tokio::main]
async fn main() -> quill_server::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::from_default_env().add_directive(tracing::Level::INFO.into()),
        )
        .with_writer(std::io::stderr)
        .init();

    match Cli::parse().command {
        Commands::Serve {
            bind,
            max_sessions,
            blank_line_padding,
            default_text,
        } => {
            let config = ServerConfigBuilder::new()
                .bind_addr(bind)
                .max_sessions_per_document(max_sessions)
                .blank_line_padding(blank_line_padding)
                .default_text(default_text)
                .build();
            let coordinator = Arc::new(Coordinator::new(
                config,
                Arc::new(MemoryStore::new()),
                Arc::new(AllowAll::new()),
            ));
            let listener = quill_server::bind(&coordinator).await?;
            quill_server::serve(coordinator, listener).await
        }
        Commands::Stress {
            clients,
            edits,
            scale_to,
        } => {
            let stats = stress_test_sessions(clients, edits).await?;
            stats.print();

            if let Some(max_clients) = scale_to {
                stress_test_scaling(max_clients, 2).await?;
            }
            Ok(())
        }
    }
}
