use std::fs;
use std::future::Future;
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{anyhow, bail, Context, Result};
use clap::{ArgAction, Parser, Subcommand};
use parking_lot::Mutex;
use serde::Deserialize;
use serde_json::{json, Value};
use tokio::io::{AsyncBufRead, AsyncBufReadExt, BufReader, Lines};
use tracing::debug;
use tracing_subscriber::EnvFilter;

use readingtype_core::{Codec, DecodeReport, Dictionary, SearchIndex, SparseFields};
use readingtype_llm::{
    ChatFileConfig, ChatMessage, ChatRequest, ChatStreamClient, ClientConfig, Conversation,
    SessionState, StreamCallbacks,
};

const VERSION: &str = env!("CARGO_PKG_VERSION");
const DEFAULT_CONFIG: &str = "readingtype.toml";

#[derive(Parser, Debug)]
#[command(name = "rtc", version = VERSION, about = "ReadingType code toolkit and chat client")]
struct Cli {
    #[arg(long, global = true)]
    config: Option<PathBuf>,
    /// JSON dictionary to use instead of the built-in table
    #[arg(long, global = true)]
    dictionary: Option<PathBuf>,
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Build a code from field assignments; unassigned fields are 0
    Encode {
        /// Field identifier, display name or position, e.g. `uom=29`
        #[arg(long = "set", value_name = "KEY=CODE", value_parser = parse_assignment)]
        set: Vec<(String, String)>,
    },
    /// Explain a dot-separated code field by field
    Decode {
        code: String,
        #[arg(long, action = ArgAction::SetTrue)]
        json: bool,
    },
    Search {
        query: String,
        #[arg(long, action = ArgAction::SetTrue)]
        json: bool,
    },
    /// List fields, or the admissible values of one field
    Fields { position: Option<u8> },
    ExportDictionary {
        #[arg(short = 'o', long = "out")]
        out: PathBuf,
    },
    /// Send one question to the assistant and print the streamed answer
    Ask {
        prompt: String,
        #[command(flatten)]
        chat: ChatArgs,
    },
    /// Interactive multi-turn session; Ctrl-C cancels the running answer
    Chat {
        #[command(flatten)]
        chat: ChatArgs,
    },
}

#[derive(clap::Args, Debug)]
struct ChatArgs {
    #[arg(long)]
    endpoint: Option<String>,
    #[arg(long = "no-stream", action = ArgAction::SetTrue)]
    no_stream: bool,
}

#[derive(Debug, Default, Deserialize)]
struct AppConfig {
    #[serde(default)]
    chat: ChatFileConfig,
    #[serde(default)]
    dictionary: DictionarySection,
}

#[derive(Debug, Default, Deserialize)]
struct DictionarySection {
    path: Option<PathBuf>,
}

fn main() -> Result<()> {
    init_tracing();
    let cli = Cli::parse();
    let config_path = cli
        .config
        .clone()
        .unwrap_or_else(|| PathBuf::from(DEFAULT_CONFIG));
    let file_config = load_config(&config_path)?;
    let dictionary_path = cli.dictionary.clone().or(file_config.dictionary.path.clone());
    let dictionary = load_dictionary(dictionary_path.as_deref())?;
    let codec = Codec::new(&dictionary);

    match cli.command {
        Commands::Encode { set } => {
            let fields = resolve_assignments(&codec, &set)?;
            println!("{}", codec.encode(&fields));
        }
        Commands::Decode { code, json } => {
            let report = codec.decode(&code);
            if json {
                println!("{}", serde_json::to_string_pretty(&report_json(&code, &report))?);
            } else {
                for line in report.describe() {
                    println!("{line}");
                }
            }
            if !report.is_valid() {
                for issue in &report.issues {
                    eprintln!("warning: {issue}");
                }
                bail!("{} issue(s) in {code}", report.issues.len());
            }
        }
        Commands::Search { query, json } => {
            let index = SearchIndex::new(&dictionary);
            let hits = index.search(&query);
            if json {
                let rows: Vec<Value> = hits
                    .iter()
                    .map(|hit| {
                        json!({
                            "position": hit.field.position,
                            "field": hit.field.name,
                            "code": hit.value.code,
                            "english": hit.value.english,
                            "native": hit.value.native,
                            "matched_on": hit.matched_on,
                        })
                    })
                    .collect();
                println!("{}", serde_json::to_string_pretty(&rows)?);
            } else if hits.is_empty() {
                eprintln!("no matches for {query:?}");
            } else {
                for hit in &hits {
                    println!(
                        "{:>2} {:<22} {:>7}  {} / {}",
                        hit.field.position,
                        hit.field.name,
                        hit.value.code,
                        hit.value.english,
                        hit.value.native
                    );
                }
            }
        }
        Commands::Fields { position } => print_fields(&dictionary, position)?,
        Commands::ExportDictionary { out } => {
            let json = dictionary.to_json_pretty()?;
            fs::write(&out, json).with_context(|| format!("failed to write {}", out.display()))?;
            println!(
                "wrote {} fields to {}",
                dictionary.fields().len(),
                out.display()
            );
        }
        Commands::Ask { prompt, chat } => {
            let client_config = resolve_client_config(&file_config.chat, &chat);
            let runtime = build_runtime()?;
            runtime.block_on(async {
                let client = ChatStreamClient::from_config(&client_config)?;
                let request = ChatRequest::new(vec![ChatMessage::user(prompt)])
                    .streaming(client_config.stream);
                run_turn(&client, request).await.map(|_| ())
            })?;
        }
        Commands::Chat { chat } => {
            let client_config = resolve_client_config(&file_config.chat, &chat);
            let runtime = build_runtime()?;
            runtime.block_on(chat_loop(client_config))?;
        }
    }
    Ok(())
}

fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(io::stderr)
        .try_init();
}

fn load_config(path: &Path) -> Result<AppConfig> {
    if !path.exists() {
        return Ok(AppConfig::default());
    }
    let contents = fs::read_to_string(path)
        .with_context(|| format!("failed to read config {}", path.display()))?;
    toml::from_str(&contents).map_err(|e| anyhow!("invalid config: {e}"))
}

fn load_dictionary(path: Option<&Path>) -> Result<Dictionary> {
    match path {
        Some(path) => Dictionary::load(path)
            .with_context(|| format!("failed to load dictionary {}", path.display())),
        None => Ok(Dictionary::standard()),
    }
}

fn build_runtime() -> Result<tokio::runtime::Runtime> {
    tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
        .context("failed to start async runtime")
}

fn parse_assignment(raw: &str) -> Result<(String, String), String> {
    let (key, code) = raw
        .split_once('=')
        .ok_or_else(|| format!("expected KEY=CODE, got `{raw}`"))?;
    let key = key.trim();
    let code = code.trim();
    if key.is_empty() || code.is_empty() {
        return Err(format!("expected KEY=CODE, got `{raw}`"));
    }
    Ok((key.to_string(), code.to_string()))
}

fn resolve_assignments(
    codec: &Codec<'_>,
    assignments: &[(String, String)],
) -> Result<SparseFields> {
    let mut fields = SparseFields::new();
    for (key, code) in assignments {
        let position = codec
            .resolve_key(key)
            .ok_or_else(|| anyhow!("unknown field `{key}`"))?;
        if codec.dictionary().lookup(position, code).is_none() {
            eprintln!("warning: code {code} is not defined for field {key}");
        }
        if fields.insert(position, code.clone()).is_some() {
            debug!(position, "field assigned more than once, keeping the last value");
        }
    }
    Ok(fields)
}

fn report_json(code: &str, report: &DecodeReport<'_>) -> Value {
    let fields: Vec<Value> = report
        .fields
        .iter()
        .map(|parsed| {
            json!({
                "position": parsed.field.position,
                "name": parsed.field.name,
                "display_name": parsed.field.display_name,
                "token": parsed.token,
                "english": parsed.value.map(|entry| entry.english.as_str()),
                "native": parsed.value.map(|entry| entry.native.as_str()),
            })
        })
        .collect();
    json!({
        "code": code,
        "valid": report.is_valid(),
        "token_count": report.token_count,
        "fields": fields,
        "issues": report.issues.iter().map(ToString::to_string).collect::<Vec<_>>(),
    })
}

fn print_fields(dictionary: &Dictionary, position: Option<u8>) -> Result<()> {
    let Some(position) = position else {
        for field in dictionary.fields() {
            println!(
                "{:>2} {:<22} {} ({} values)",
                field.position,
                field.name,
                field.display_name,
                field.values.len()
            );
        }
        return Ok(());
    };
    let field = dictionary
        .field(position)
        .ok_or_else(|| anyhow!("no field at position {position}"))?;
    println!("{}. {} ({})", field.position, field.name, field.display_name);
    println!("{}", field.description);
    for entry in &field.values {
        println!("  {:>7}  {} / {}", entry.code, entry.english, entry.native);
    }
    Ok(())
}

fn resolve_client_config(file: &ChatFileConfig, args: &ChatArgs) -> ClientConfig {
    let mut config = ClientConfig::from_env().merge(file);
    if let Some(endpoint) = &args.endpoint {
        config.endpoint = endpoint.clone();
    }
    if args.no_stream {
        config.stream = false;
    }
    config
}

/// Prints the reply as it grows. Returns the final text, or `None` when the
/// user cancelled the turn.
async fn run_turn(client: &ChatStreamClient, request: ChatRequest) -> Result<Option<String>> {
    let text = Arc::new(Mutex::new(String::new()));
    let failure = Arc::new(Mutex::new(None));
    let callbacks = {
        let text = Arc::clone(&text);
        let failure = Arc::clone(&failure);
        StreamCallbacks::new(
            move |current| {
                let mut shown = text.lock();
                let mut stdout = io::stdout().lock();
                let _ = stdout.write_all(current[shown.len()..].as_bytes());
                let _ = stdout.flush();
                *shown = current.to_string();
            },
            move |message| *failure.lock() = Some(message),
            || {},
        )
    };
    let handle = client.open(request, callbacks);
    let canceller = handle.canceller();
    let join = handle.join();
    tokio::pin!(join);
    let state = tokio::select! {
        state = &mut join => state,
        _ = tokio::signal::ctrl_c() => {
            canceller.cancel();
            join.await
        }
    };
    println!();
    match state {
        SessionState::Completed => {
            let reply = text.lock().clone();
            Ok(Some(reply))
        }
        SessionState::Cancelled => {
            eprintln!("[cancelled]");
            Ok(None)
        }
        _ => {
            let message = failure
                .lock()
                .take()
                .unwrap_or_else(|| "chat session ended unexpectedly".to_string());
            Err(anyhow!(message))
        }
    }
}

/// Reads the next prompt line. `None` means end of input or an interrupt.
async fn next_prompt<R, F>(lines: &mut Lines<R>, interrupt: F) -> Result<Option<String>>
where
    R: AsyncBufRead + Unpin,
    F: Future,
{
    tokio::select! {
        line = lines.next_line() => Ok(line?),
        _ = interrupt => Ok(None),
    }
}

async fn chat_loop(config: ClientConfig) -> Result<()> {
    let client = ChatStreamClient::from_config(&config)?;
    let mut conversation = Conversation::new();
    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    eprintln!("connected to {} (/clear resets, /exit quits)", config.endpoint);
    loop {
        eprint!("> ");
        let Some(line) = next_prompt(&mut lines, tokio::signal::ctrl_c()).await? else {
            eprintln!();
            break;
        };
        let line = line.trim();
        match line {
            "" => continue,
            "/exit" | "/quit" => break,
            "/clear" => {
                conversation.clear();
                eprintln!("history cleared");
                continue;
            }
            _ => {}
        }
        let request = conversation.ask(line, config.stream);
        match run_turn(&client, request).await {
            Ok(Some(reply)) => conversation.record_reply(reply),
            Ok(None) => conversation.abandon_turn(),
            Err(err) => {
                eprintln!("error: {err}");
                conversation.abandon_turn();
            }
        }
    }
    Ok(())
}
