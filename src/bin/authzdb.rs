//! authzdb CLI
//!
//! Administrative tool for credential tables: add users, check passwords,
//! inspect data files and rebuild indexes.

use std::path::PathBuf;
use std::process::ExitCode;

use authzdb::datalog;
use authzdb::record::registry;
use authzdb::{
    AnyRecord, AuthzRecord, LoadStrategy, PasswordHasher, RecordKind, Sha256Hasher, SyncStrategy,
    Table, TableConfig,
};
use clap::{Parser, Subcommand};
use tracing_subscriber::{fmt, EnvFilter};

/// authzdb CLI
#[derive(Parser, Debug)]
#[command(name = "authzdb")]
#[command(about = "Inspect and maintain authzdb credential tables")]
#[command(version)]
struct Args {
    /// Data file (the index lives next to it as <data>.idx)
    #[arg(short, long, default_value = "./authz.db")]
    data: PathBuf,

    /// Skip fsync when flushing
    #[arg(long)]
    no_sync: bool,

    /// Build a missing index from key peeks instead of loading every record
    #[arg(long)]
    rebuild_index: bool,

    /// Enable debug logging (RUST_LOG overrides)
    #[arg(short, long)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Add a user
    Add {
        username: String,
        password: String,
    },

    /// Check a password against the stored hash
    Check {
        username: String,
        password: String,
    },

    /// Show a user's stored hash
    Get {
        username: String,
    },

    /// List every persisted user
    List,

    /// Show table statistics
    Stats,

    /// Check data file framing and record encoding
    Verify {
        #[arg(short, long, default_value = "authz")]
        kind: RecordKind,
    },

    /// Rebuild the index from the data file
    Reindex {
        #[arg(short, long, default_value = "authz")]
        kind: RecordKind,
    },

    /// Print every record of a data file
    Dump {
        #[arg(short, long, default_value = "authz")]
        kind: RecordKind,
    },
}

fn main() -> ExitCode {
    let args = Args::parse();
    init_tracing(args.verbose);

    tracing::debug!("authzdb v{}", authzdb::VERSION);

    match run(&args) {
        Ok(code) => code,
        Err(e) => {
            tracing::error!("{}", e);
            eprintln!("error: {}", e);
            ExitCode::FAILURE
        }
    }
}

fn init_tracing(verbose: bool) {
    let default = if verbose { "info,authzdb=debug" } else { "warn" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));

    fmt()
        .with_env_filter(filter)
        .with_target(true)
        .with_writer(std::io::stderr)
        .init();
}

fn table_config(args: &Args, read_only: bool) -> TableConfig {
    let sync = if args.no_sync {
        SyncStrategy::Never
    } else {
        SyncStrategy::EveryFlush
    };
    let load = if args.rebuild_index {
        LoadStrategy::RebuildIndex
    } else {
        LoadStrategy::Eager
    };

    TableConfig::builder()
        .sync_strategy(sync)
        .load_strategy(load)
        .read_only(read_only)
        .build()
}

fn open_table(args: &Args, read_only: bool) -> authzdb::Result<Table<AuthzRecord>> {
    Table::open_with_config(&args.data, table_config(args, read_only))
}

fn run(args: &Args) -> authzdb::Result<ExitCode> {
    match &args.command {
        Commands::Add { username, password } => {
            let table = open_table(args, false)?;
            table.add_record(AuthzRecord::with_hasher(&Sha256Hasher, username, password))?;
            let stats = table.flush()?;
            println!(
                "added {} ({} bytes written, data file now {} bytes)",
                username, stats.bytes_written, stats.data_size
            );
        }

        Commands::Check { username, password } => {
            let table = open_table(args, true)?;
            let matches = table
                .get_record_lazily(username)?
                .map(|r| r.password_hash() == Sha256Hasher.hex_digest(password))
                .unwrap_or(false);
            if !matches {
                println!("denied");
                return Ok(ExitCode::FAILURE);
            }
            println!("ok");
        }

        Commands::Get { username } => {
            let table = open_table(args, true)?;
            match table.get_record_lazily(username)? {
                Some(record) => println!("{}\t{}", record.username(), record.password_hash()),
                None => {
                    println!("not found");
                    return Ok(ExitCode::FAILURE);
                }
            }
        }

        Commands::List => {
            let table = open_table(args, true)?;
            for item in table.scan()? {
                let (record, _offset) = item?;
                println!("{}", record.username());
            }
        }

        Commands::Stats => {
            let table = open_table(args, true)?;
            println!("data file:   {}", table.data_path().display());
            println!("index file:  {}", table.index_path().display());
            println!("mode:        {}", table.mode());
            println!("records:     {}", table.record_count());
            println!("indexed:     {}", table.index_size());
            println!("data size:   {} bytes", table.data_size()?);
        }

        Commands::Verify { kind } => {
            let report = datalog::inspect(&args.data)?;
            let mut corrupt = 0u64;
            for item in registry::read_all(*kind, &args.data)? {
                if let Err(e) = item {
                    corrupt += 1;
                    tracing::warn!("{}", e);
                }
            }

            println!("frames:        {}", report.frames);
            println!("committed:     {} bytes", report.committed_len);
            println!("trailing:      {} bytes", report.trailing_bytes);
            println!("corrupt:       {}", corrupt);
            println!("crc32:         {:08x}", report.crc32);

            if corrupt > 0 || report.was_truncated() {
                return Ok(ExitCode::FAILURE);
            }
        }

        Commands::Reindex { kind } => {
            let index_path = table_config(args, false).index_path_for(&args.data);
            let count = registry::rebuild_index(*kind, &args.data, &index_path, !args.no_sync)?;
            println!("indexed {} frames into {}", count, index_path.display());
        }

        Commands::Dump { kind } => {
            for item in registry::read_all(*kind, &args.data)? {
                let (record, offset) = item?;
                match record {
                    AnyRecord::Authz(r) => {
                        println!("{:>10}  {}  {}  {}", offset, r.username(), r.password_hash(), kind)
                    }
                }
            }
        }
    }

    Ok(ExitCode::SUCCESS)
}
