// Copyright (c) 2026 supernote-server contributors
// SPDX-License-Identifier: AGPL-3.0
//! Process configuration: one `clap::Parser` struct with every field bound
//! to a `SUPERNOTE_*` environment variable and a sane default, so the
//! binary runs out of the box against in-memory storage and only needs
//! flags/env for production deployment (spec §10's Configuration section).

use clap::{Parser, Subcommand};

#[derive(Parser)]
#[command(name = "supernote-server")]
#[command(version, about = "Self-hosted sync server for Supernote-compatible e-ink tablets", long_about = None)]
#[command(propagate_version = true)]
pub struct Cli {
    /// HTTP bind address.
    #[arg(long, global = true, env = "SUPERNOTE_HOST", default_value = "0.0.0.0")]
    pub host: String,

    /// HTTP bind port.
    #[arg(long, global = true, env = "SUPERNOTE_PORT", default_value_t = 8080)]
    pub port: u16,

    /// Postgres connection string. Omit to run entirely against in-memory
    /// repositories (data is lost on restart).
    #[arg(long, global = true, env = "SUPERNOTE_DATABASE_URL")]
    pub database_url: Option<String>,

    /// Root directory for the local content-addressed blob store.
    #[arg(long, global = true, env = "SUPERNOTE_BLOB_ROOT", default_value = "./data/blobs")]
    pub blob_root: String,

    /// Secret key used to HMAC-sign OSS URLs. Required in production; the
    /// default is only safe for local experimentation.
    #[arg(long, global = true, env = "SUPERNOTE_HMAC_SECRET", default_value = "change-me-in-production")]
    pub hmac_secret: String,

    /// How long a signed URL remains valid, in seconds.
    #[arg(long, global = true, env = "SUPERNOTE_SIGNED_URL_MAX_AGE_SECS", default_value_t = 900)]
    pub signed_url_max_age_secs: u64,

    /// How long a device holds an exclusive sync lease, in seconds.
    #[arg(long, global = true, env = "SUPERNOTE_SYNC_LEASE_TTL_SECS", default_value_t = 300)]
    pub sync_lease_ttl_secs: u64,

    /// Number of files the content-processing pipeline works on concurrently.
    #[arg(long, global = true, env = "SUPERNOTE_PROCESSOR_CONCURRENCY", default_value_t = 4)]
    pub processor_concurrency: usize,

    /// Maximum simultaneous outbound calls to the inference service.
    #[arg(long, global = true, env = "SUPERNOTE_INFERENCE_CONCURRENCY", default_value_t = 2)]
    pub inference_concurrency: usize,

    /// Base URL of an OpenAI-compatible inference API (chat completions +
    /// embeddings). Required for OCR, embedding and summarization to work;
    /// without it the processor still runs hashing/PNG and records the
    /// remaining stages as failed, to be retried on next start.
    #[arg(long, global = true, env = "SUPERNOTE_INFERENCE_ENDPOINT", default_value = "http://localhost:11434/v1")]
    pub inference_endpoint: String,

    /// API key for the inference endpoint.
    #[arg(long, global = true, env = "SUPERNOTE_INFERENCE_API_KEY", default_value = "")]
    pub inference_api_key: String,

    /// Chat-completion model used for OCR and summarization.
    #[arg(long, global = true, env = "SUPERNOTE_INFERENCE_CHAT_MODEL", default_value = "gpt-4o-mini")]
    pub inference_chat_model: String,

    /// Embedding model used for semantic search.
    #[arg(long, global = true, env = "SUPERNOTE_INFERENCE_EMBEDDING_MODEL", default_value = "text-embedding-3-small")]
    pub inference_embedding_model: String,

    /// Whether new accounts may self-register. The very first registration
    /// always succeeds and becomes the admin, regardless of this flag.
    #[arg(long, global = true, env = "SUPERNOTE_REGISTRATION_ENABLED", default_value_t = true)]
    pub registration_enabled: bool,

    /// Log level passed to `tracing_subscriber::EnvFilter` when
    /// `RUST_LOG` is unset.
    #[arg(long, global = true, env = "SUPERNOTE_LOG_LEVEL", default_value = "info")]
    pub log_level: String,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Run the HTTP server.
    Serve,
    /// Apply the SQL schema to the configured Postgres database.
    Migrate,
    /// Administer user accounts.
    User {
        #[command(subcommand)]
        command: UserCommand,
    },
}

#[derive(Subcommand)]
pub enum UserCommand {
    /// Register a new account.
    Add {
        #[arg(long)]
        email: String,
        #[arg(long)]
        password: String,
        #[arg(long, default_value = "")]
        display_name: String,
    },
    /// List every account.
    List,
    /// Deactivate an account, blocking future logins.
    Deactivate {
        #[arg(long)]
        email: String,
    },
}
