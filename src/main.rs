use clap::{Parser, Subcommand};
use maparchive::backend::{EntryStore, SqliteStore};
use maparchive::config::{ArchiveConfig, SearchMode};
use maparchive::edit::{edit_matching, EntryEdit};
use maparchive::entry::Entry;
use maparchive::error::ArchiveError;
use maparchive::output::{
    format_entry_detail, format_entry_list, is_json_format, render_json, EntryView,
    ErrorResponse, OutputFormat, SearchResponse,
};
use maparchive::query::{build_filter, execute_query_paged, join_args, parse_tokens};
use serde::Serialize;
use std::path::{Path, PathBuf};
use tracing_subscriber::EnvFilter;

const DEFAULT_DB: &str = "map_art.db";

#[derive(Parser)]
#[command(
    name = "maparchive",
    version = env!("CARGO_PKG_VERSION"),
    about = "Search and curate an archive of map-art builds"
)]
struct Cli {
    #[arg(long, global = true, default_value_t = OutputFormat::Human)]
    output: OutputFormat,

    /// Archive database (defaults to $MAPARCHIVE_DB, then map_art.db)
    #[arg(long, global = true)]
    db: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Search the archive, oldest first
    #[command(after_help = SEARCH_EXAMPLES)]
    Search {
        #[arg(allow_hyphen_values = true, trailing_var_arg = true)]
        args: Vec<String>,
    },

    /// Rank the biggest builds
    #[command(alias = "largest", after_help = BIGGEST_EXAMPLES)]
    Biggest {
        #[arg(allow_hyphen_values = true, trailing_var_arg = true)]
        args: Vec<String>,
    },

    /// Add or update entries from a JSON array
    Import { file: PathBuf },

    /// Edit the fields of entries selected by a search
    #[command(after_help = EDIT_EXAMPLES)]
    Edit {
        #[command(flatten)]
        fields: EditFields,

        /// Edit every match instead of requiring a single one
        #[arg(long)]
        all: bool,

        /// Search arguments selecting the entries (after the options)
        #[arg(required = true, allow_hyphen_values = true, trailing_var_arg = true)]
        args: Vec<String>,
    },

    /// Show one entry
    Show { id: i64 },

    /// Delete one entry
    Delete { id: i64 },

    /// Mark an entry's image as sensitive
    Flag {
        id: i64,
        /// Clear the flag instead
        #[arg(long)]
        off: bool,
    },

    /// Create the archive database
    Init,
}

#[derive(clap::Args)]
struct EditFields {
    #[arg(long)]
    name: Option<String>,

    /// Comma separated, in credit order
    #[arg(long, value_delimiter = ',')]
    artists: Option<Vec<String>>,

    #[arg(long)]
    notes: Option<String>,

    #[arg(long)]
    width: Option<u32>,

    #[arg(long)]
    height: Option<u32>,

    /// Map type, e.g. flat, staircased, semi
    #[arg(long = "type")]
    technique: Option<String>,

    #[arg(long)]
    palette: Option<String>,

    #[arg(long)]
    message_id: Option<i64>,

    #[arg(long)]
    author_id: Option<i64>,

    #[arg(long)]
    image_url: Option<String>,

    /// RFC 3339 timestamp, e.g. 2022-03-01T10:00:00Z
    #[arg(long)]
    create_date: Option<String>,
}

impl EditFields {
    fn to_edit(&self) -> Result<EntryEdit, ArchiveError> {
        let mut edit = EntryEdit {
            name: self.name.clone(),
            contributors: self.artists.clone(),
            notes: self.notes.clone(),
            width: self.width,
            height: self.height,
            source_message_id: self.message_id,
            author_id: self.author_id,
            image_url: self.image_url.clone(),
            ..EntryEdit::default()
        };
        if let Some(label) = &self.technique {
            edit = edit.technique_label(label)?;
        }
        if let Some(label) = &self.palette {
            edit = edit.palette_label(label)?;
        }
        if let Some(date) = &self.create_date {
            edit = edit.create_date_text(date)?;
        }
        Ok(edit)
    }
}

const SEARCH_EXAMPLES: &str = r#"
EXAMPLES:
  # Everything, oldest first
  maparchive search

  # Keyword search, second page
  maparchive search castle 2

  # Filter by artist and type, exclude a word
  maparchive search artist:"Jane Doe" type:staircased -dragon

  # Size bounds and ordering
  maparchive search ">=64" "<=256" order:-size

  # Entries posted together with other entries
  maparchive search -dup
"#;

const BIGGEST_EXAMPLES: &str = r#"
EXAMPLES:
  # Largest builds (32 maps and up)
  maparchive biggest

  # Without flat and carpet-only builds
  maparchive biggest -f -c

  # JSON output for programmatic use
  maparchive --output json biggest palette:greyscale
"#;

const EDIT_EXAMPLES: &str = r#"
EXAMPLES:
  # Rename the single entry matching a search
  maparchive edit --name "Spawn Keep" spawn castle

  # Fix size and type
  maparchive edit --width 4 --height 2 --type staircased artist:"Jane Doe" harbour

  # Apply the same palette to every match
  maparchive edit --all --palette greyscale -- artist:Bob type:flat
"#;

#[derive(Serialize)]
struct ImportSummary {
    file: String,
    ids: Vec<i64>,
}

#[derive(Serialize)]
struct DeleteSummary {
    id: i64,
    deleted: bool,
}

#[derive(Serialize)]
struct InitSummary {
    database: String,
}

fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| "maparchive=warn".into()),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    if let Err(err) = dispatch(&cli) {
        emit_error(&cli, &err);
        std::process::exit(1);
    }
}

fn dispatch(cli: &Cli) -> Result<(), ArchiveError> {
    let config = ArchiveConfig::from_env()?;
    let db_path = db_path(cli);

    match &cli.command {
        Command::Search { args } => run_search(cli, &config, &db_path, SearchMode::Search, args),
        Command::Biggest { args } => run_search(cli, &config, &db_path, SearchMode::Biggest, args),
        Command::Import { file } => run_import(cli, &db_path, file),
        Command::Edit { fields, all, args } => {
            let edit = fields.to_edit()?;
            let store = SqliteStore::open(&db_path)?;
            let edited = edit_matching(&store, &join_args(args), &edit, *all)?;
            if is_json_format(cli.output) {
                let views: Vec<EntryView> = edited
                    .iter()
                    .map(|entry| EntryView::new(entry, &config))
                    .collect();
                println!("{}", render_json(views, cli.output)?);
            } else if let [only] = edited.as_slice() {
                println!("{}", format_entry_detail(only, &config));
            } else {
                println!("Edited {} entries", edited.len());
            }
            Ok(())
        }
        Command::Show { id } => run_show(cli, &config, &db_path, *id),
        Command::Delete { id } => {
            let store = SqliteStore::open(&db_path)?;
            store.delete_entry(*id)?;
            emit(cli, DeleteSummary { id: *id, deleted: true }, || {
                format!("Deleted entry {}", id)
            })
        }
        Command::Flag { id, off } => {
            let store = SqliteStore::open(&db_path)?;
            let mut entry = store
                .get_entry(*id)?
                .ok_or(ArchiveError::EntryNotFound { id: *id })?;
            entry.provenance.flagged = !off;
            store.update_entry(&mut entry)?;
            let view = EntryView::new(&entry, &config);
            emit(cli, view, || {
                format!(
                    "Entry {} {}",
                    id,
                    if *off { "unflagged" } else { "flagged" }
                )
            })
        }
        Command::Init => {
            SqliteStore::create(&db_path)?;
            let database = db_path.display().to_string();
            emit(cli, InitSummary { database: database.clone() }, || {
                format!("Initialised {}", database)
            })
        }
    }
}

fn db_path(cli: &Cli) -> PathBuf {
    cli.db
        .clone()
        .or_else(|| std::env::var_os("MAPARCHIVE_DB").map(PathBuf::from))
        .unwrap_or_else(|| PathBuf::from(DEFAULT_DB))
}

fn run_search(
    cli: &Cli,
    config: &ArchiveConfig,
    db_path: &Path,
    mode: SearchMode,
    args: &[String],
) -> Result<(), ArchiveError> {
    let raw = join_args(args);
    let tokens = parse_tokens(&raw)?;
    let filters = build_filter(&tokens, config.defaults_for(mode))?;

    let store = SqliteStore::open(db_path)?;
    let result = execute_query_paged(&store, &filters, config.page_size)?;

    if is_json_format(cli.output) {
        let response = SearchResponse::new(&result, filters, config);
        println!("{}", render_json(response, cli.output)?);
        return Ok(());
    }

    if let [only] = result.results.as_slice() {
        println!("{}", format_entry_detail(only, config));
        return Ok(());
    }

    let (title, command, ranked) = match mode {
        SearchMode::Search => ("Search Results".to_string(), "maparchive search", false),
        SearchMode::Biggest => {
            let mut title = "Biggest map-art in the archive".to_string();
            if filters.is_filtered() {
                title.push_str(" (filtered)");
            }
            (title, "maparchive biggest", true)
        }
    };
    println!(
        "{}",
        format_entry_list(&result, &title, command, ranked, config)
    );
    Ok(())
}

fn run_import(cli: &Cli, db_path: &Path, file: &Path) -> Result<(), ArchiveError> {
    let import_failed = |reason: String| ArchiveError::ImportFailed {
        path: file.display().to_string(),
        reason,
    };
    let text = std::fs::read_to_string(file).map_err(|e| import_failed(e.to_string()))?;
    let mut entries: Vec<Entry> =
        serde_json::from_str(&text).map_err(|e| import_failed(e.to_string()))?;

    let store = SqliteStore::create(db_path)?;
    store.add_entries(&mut entries)?;

    let ids: Vec<i64> = entries.iter().filter_map(|entry| entry.id).collect();
    let count = ids.len();
    emit(
        cli,
        ImportSummary {
            file: file.display().to_string(),
            ids,
        },
        || format!("Imported {} entries from {}", count, file.display()),
    )
}

fn run_show(cli: &Cli, config: &ArchiveConfig, db_path: &Path, id: i64) -> Result<(), ArchiveError> {
    let store = SqliteStore::open(db_path)?;
    let entry = store
        .get_entry(id)?
        .ok_or(ArchiveError::EntryNotFound { id })?;
    if is_json_format(cli.output) {
        println!("{}", render_json(EntryView::new(&entry, config), cli.output)?);
    } else {
        println!("{}", format_entry_detail(&entry, config));
    }
    Ok(())
}

/// Print a JSON payload or a one-line human summary.
fn emit<T, F>(cli: &Cli, data: T, human: F) -> Result<(), ArchiveError>
where
    T: Serialize,
    F: FnOnce() -> String,
{
    if is_json_format(cli.output) {
        println!("{}", render_json(data, cli.output)?);
    } else {
        println!("{}", human());
    }
    Ok(())
}

fn emit_error(cli: &Cli, err: &ArchiveError) {
    match cli.output {
        OutputFormat::Human => {
            eprintln!("ERROR [{}]: {}", err.error_code(), err);
            if let Some(hint) = err.remediation() {
                eprintln!("Hint: {}", hint);
            }
        }
        OutputFormat::Json | OutputFormat::Pretty => match render_json(ErrorResponse::from(err), cli.output) {
            Ok(payload) => println!("{}", payload),
            Err(ser_err) => eprintln!("ERROR: {}", ser_err),
        },
    }
}
