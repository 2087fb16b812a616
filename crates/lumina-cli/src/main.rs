use std::fs;
use std::io::{self, BufRead, ErrorKind, Write};
use std::path::{Path, PathBuf};

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use lumina_contracts::chat::{parse_intent, ChatMessage, Intent, CHAT_HELP_COMMANDS};
use lumina_contracts::events::EventWriter;
use lumina_contracts::ratio::{
    extract_dimensions, resolve_closest_ratio, AspectRatio, Dimensions, SizeTier,
};
use lumina_contracts::store::{GeneratedArtifact, SavedPrompt};
use lumina_contracts::{StoreWarning, UpstreamError};
use lumina_engine::{
    decode_payload, payload_from_file, ChatReply, EditOptions, GenerateOptions, LogoOptions,
    LuminaConfig, Quality, Studio, StudioImage,
};
use serde_json::{json, Value};

#[derive(Debug, Parser)]
#[command(name = "lumina", version, about = "Lumina image studio")]
struct Cli {
    /// Storage directory; defaults to LUMINA_HOME or ~/.lumina.
    #[arg(long, global = true)]
    home: Option<PathBuf>,
    /// Activity log; defaults to <home>/events.jsonl.
    #[arg(long, global = true)]
    events: Option<PathBuf>,
    /// Work offline with placeholder images and canned replies.
    #[arg(long, global = true)]
    dryrun: bool,
    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    Generate(GenerateArgs),
    Edit(EditArgs),
    Logo(LogoArgs),
    Enhance(EnhanceArgs),
    Chat(ChatArgs),
    History {
        #[command(subcommand)]
        command: HistoryCommand,
    },
    Prompts {
        #[command(subcommand)]
        command: PromptsCommand,
    },
    Ratio(RatioArgs),
}

#[derive(Debug, Parser)]
struct GenerateArgs {
    #[arg(long)]
    prompt: String,
    #[arg(long)]
    ratio: Option<AspectRatio>,
    #[arg(long, requires = "height")]
    width: Option<u32>,
    #[arg(long, requires = "width")]
    height: Option<u32>,
    #[arg(long)]
    pro: bool,
    #[arg(long)]
    reference: Option<PathBuf>,
    #[arg(long)]
    negative: Option<String>,
    #[arg(long)]
    out: Option<PathBuf>,
}

#[derive(Debug, Parser)]
struct EditArgs {
    #[arg(long)]
    image: PathBuf,
    #[arg(long)]
    prompt: String,
    #[arg(long)]
    ratio: Option<AspectRatio>,
    #[arg(long)]
    pro: bool,
    #[arg(long)]
    out: Option<PathBuf>,
}

#[derive(Debug, Parser)]
struct LogoArgs {
    #[arg(long)]
    brand: String,
    #[arg(long)]
    style: Option<String>,
    #[arg(long)]
    colors: Option<String>,
    #[arg(long)]
    pro: bool,
    #[arg(long)]
    out: Option<PathBuf>,
}

#[derive(Debug, Parser)]
struct EnhanceArgs {
    #[arg(long)]
    prompt: String,
    #[arg(long)]
    think: bool,
}

#[derive(Debug, Parser)]
struct ChatArgs {
    #[arg(long)]
    ratio: Option<AspectRatio>,
    #[arg(long)]
    pro: bool,
    #[arg(long)]
    think: bool,
}

#[derive(Debug, Subcommand)]
enum HistoryCommand {
    List {
        #[arg(long)]
        json: bool,
    },
    Delete {
        id: String,
    },
    Clear,
    Export {
        id: String,
        #[arg(long)]
        out: PathBuf,
    },
}

#[derive(Debug, Subcommand)]
enum PromptsCommand {
    List,
    Add {
        text: String,
        #[arg(long = "tag")]
        tags: Vec<String>,
    },
    Delete {
        id: String,
    },
}

#[derive(Debug, Parser)]
struct RatioArgs {
    #[arg(long, requires = "height", conflicts_with = "text")]
    width: Option<u32>,
    #[arg(long, requires = "width")]
    height: Option<u32>,
    #[arg(long)]
    text: Option<String>,
}

const PROMPT_PREVIEW_CHARS: usize = 60;

fn main() {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("warn"))
        .format_timestamp_millis()
        .init();

    match run() {
        Ok(code) => std::process::exit(code),
        Err(err) => {
            eprintln!("lumina error: {}", describe_error(&err));
            std::process::exit(1);
        }
    }
}

fn run() -> Result<i32> {
    let cli = Cli::parse();
    let stdin = io::stdin();
    let stdout = io::stdout();
    let mut input = stdin.lock();
    let mut out = stdout.lock();
    execute(cli, &mut input, &mut out)
}

fn execute(cli: Cli, input: &mut dyn BufRead, out: &mut dyn Write) -> Result<i32> {
    if let Command::Ratio(args) = &cli.command {
        return run_ratio(args, out);
    }
    let mut studio = open_studio(&cli)?;

    match cli.command {
        Command::Generate(args) => {
            let dimensions = match (args.width, args.height) {
                (Some(width), Some(height)) => Some(Dimensions::new(width, height)),
                _ => None,
            };
            let reference = args
                .reference
                .as_deref()
                .map(payload_from_file)
                .transpose()?;
            let image = studio.generate(GenerateOptions {
                prompt: args.prompt,
                ratio: args.ratio,
                dimensions,
                quality: args.pro.then_some(Quality::Pro),
                reference,
                negative_prompt: args.negative,
            })?;
            report_image(out, &image, args.out.as_deref())?;
        }
        Command::Edit(args) => {
            let image = studio.edit(EditOptions {
                image: payload_from_file(&args.image)?,
                prompt: args.prompt,
                ratio: args.ratio,
                quality: args.pro.then_some(Quality::Pro),
            })?;
            report_image(out, &image, args.out.as_deref())?;
        }
        Command::Logo(args) => {
            let image = studio.design_logo(LogoOptions {
                brand: args.brand,
                style: args.style,
                colors: args.colors,
                quality: args.pro.then_some(Quality::Pro),
            })?;
            report_image(out, &image, args.out.as_deref())?;
        }
        Command::Enhance(args) => {
            studio.settings_mut().extended_reasoning = args.think;
            let reply = studio.enhance_prompt(&args.prompt)?;
            report_reply(out, &reply)?;
        }
        Command::Chat(args) => {
            let settings = studio.settings_mut();
            if let Some(ratio) = args.ratio {
                settings.aspect_ratio = ratio;
            }
            if args.pro {
                settings.quality = Quality::Pro;
            }
            settings.extended_reasoning = args.think;
            run_chat(&mut studio, input, out)?;
        }
        Command::History { command } => run_history(&mut studio, command, out)?,
        Command::Prompts { command } => run_prompts(&mut studio, command, out)?,
        Command::Ratio(_) => {}
    }
    Ok(0)
}

fn open_studio(cli: &Cli) -> Result<Studio> {
    let mut config = LuminaConfig::from_env();
    if let Some(home) = cli.home.clone() {
        config = config.with_home(home);
    }
    let events_path = cli
        .events
        .clone()
        .unwrap_or_else(|| config.default_events_path());
    let events = EventWriter::for_new_session(events_path);
    log::debug!(
        "store {} events {} session {}",
        config.storage_path().display(),
        events.path().display(),
        events.session_id()
    );
    Studio::from_config(&config, cli.dryrun, Some(events))
}

fn run_history(studio: &mut Studio, command: HistoryCommand, out: &mut dyn Write) -> Result<()> {
    match command {
        HistoryCommand::List { json } => {
            let history = studio.history();
            if json {
                let rows: Vec<Value> = history.iter().map(artifact_summary).collect();
                writeln!(out, "{}", serde_json::to_string_pretty(&rows)?)?;
            } else {
                print_history(out, &history)?;
            }
        }
        HistoryCommand::Delete { id } => delete_artifact(studio, &id, out)?,
        HistoryCommand::Clear => {
            let outcome = studio.clear_history();
            report_warning(out, outcome.warning.as_ref())?;
            writeln!(out, "History cleared.")?;
        }
        HistoryCommand::Export { id, out: path } => {
            let Some(artifact) = studio.artifact(&id) else {
                bail!("no artifact with id {id}");
            };
            write_payload(&artifact.payload, &path)?;
            writeln!(out, "Wrote {}", path.display())?;
        }
    }
    Ok(())
}

fn run_prompts(studio: &mut Studio, command: PromptsCommand, out: &mut dyn Write) -> Result<()> {
    match command {
        PromptsCommand::List => print_prompts(out, &studio.saved_prompts())?,
        PromptsCommand::Add { text, tags } => {
            let outcome = studio.save_prompt(&text, tags)?;
            report_warning(out, outcome.warning.as_ref())?;
            writeln!(out, "Saved prompt {}", outcome.item.id)?;
        }
        PromptsCommand::Delete { id } => delete_prompt(studio, &id, out)?,
    }
    Ok(())
}

fn run_ratio(args: &RatioArgs, out: &mut dyn Write) -> Result<i32> {
    let dimensions = match (args.width, args.height, args.text.as_deref()) {
        (Some(width), Some(height), _) => Some(Dimensions::new(width, height)),
        (_, _, Some(text)) => extract_dimensions(text),
        _ => bail!("pass --width and --height, or --text"),
    };
    match dimensions {
        Some(dims) => {
            writeln!(out, "{}", ratio_report(dims))?;
            Ok(0)
        }
        None => {
            writeln!(out, "No dimensions found.")?;
            Ok(2)
        }
    }
}

fn ratio_report(dims: Dimensions) -> String {
    format!(
        "{}x{} -> {} {}",
        dims.width,
        dims.height,
        resolve_closest_ratio(dims.width, dims.height),
        SizeTier::for_dimensions(dims.width, dims.height)
    )
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ChatFlow {
    Continue,
    Quit,
}

#[derive(Debug, Default)]
struct ChatSession {
    history: Vec<ChatMessage>,
    last_enhanced: Option<String>,
}

fn run_chat(studio: &mut Studio, input: &mut dyn BufRead, out: &mut dyn Write) -> Result<()> {
    let mut session = ChatSession::default();
    let mut line = String::new();

    writeln!(
        out,
        "Lumina chat started ({}). Type /help for commands.",
        studio.provider()
    )?;

    loop {
        write!(out, "> ")?;
        out.flush()?;

        line.clear();
        let read = match input.read_line(&mut line) {
            Ok(read) => read,
            Err(err) if err.kind() == ErrorKind::Interrupted => continue,
            Err(err) => return Err(err.into()),
        };
        if read == 0 {
            break;
        }

        let intent = parse_intent(line.trim_end_matches(['\n', '\r']));
        match session.handle(studio, &intent, out) {
            Ok(ChatFlow::Continue) => {}
            Ok(ChatFlow::Quit) => break,
            Err(err) => writeln!(out, "error: {}", describe_error(&err))?,
        }
    }
    Ok(())
}

impl ChatSession {
    fn handle(&mut self, studio: &mut Studio, intent: &Intent, out: &mut dyn Write) -> Result<ChatFlow> {
        match intent.action.as_str() {
            "noop" => {}
            "quit" => return Ok(ChatFlow::Quit),
            "help" => {
                writeln!(out, "Commands:")?;
                for command in CHAT_HELP_COMMANDS {
                    writeln!(out, "  {command}")?;
                }
            }
            "chat" => {
                let Some(message) = intent.prompt.as_deref() else {
                    return Ok(ChatFlow::Continue);
                };
                let reply = studio.chat(&self.history, message)?;
                writeln!(out, "{}", reply.message.text.trim())?;
                self.remember(&reply, out)?;
                self.history.push(ChatMessage::user(message));
                self.history.push(reply.message);
            }
            "enhance" => {
                let Some(prompt) = self.prompt_or_last(intent) else {
                    writeln!(out, "/enhance requires a prompt")?;
                    return Ok(ChatFlow::Continue);
                };
                let reply = studio.enhance_prompt(&prompt)?;
                report_reply(out, &reply)?;
                self.remember(&reply, out)?;
            }
            "generate" => {
                let Some(prompt) = self.prompt_or_last(intent) else {
                    writeln!(
                        out,
                        "/image requires a prompt (or chat until an Enhanced Prompt is suggested)"
                    )?;
                    return Ok(ChatFlow::Continue);
                };
                let image = studio.generate(GenerateOptions::new(prompt))?;
                report_image(out, &image, None)?;
            }
            "edit" => {
                let path = intent.arg_str("path").unwrap_or_default();
                let Some(prompt) = intent.prompt.clone().filter(|_| !path.is_empty()) else {
                    writeln!(out, "usage: /edit <path> <prompt>")?;
                    return Ok(ChatFlow::Continue);
                };
                let image = studio.edit(EditOptions {
                    image: payload_from_file(Path::new(path))?,
                    prompt,
                    ..EditOptions::default()
                })?;
                report_image(out, &image, None)?;
            }
            "logo" => {
                let brand = intent.arg_str("brand").unwrap_or_default();
                if brand.is_empty() {
                    writeln!(out, "usage: /logo <brand> [-- <style>]")?;
                    return Ok(ChatFlow::Continue);
                }
                let image = studio.design_logo(LogoOptions {
                    brand: brand.to_string(),
                    style: intent.arg_str("style").map(str::to_string),
                    ..LogoOptions::default()
                })?;
                report_image(out, &image, None)?;
            }
            "save_prompt" => {
                let Some(prompt) = self.prompt_or_last(intent) else {
                    writeln!(out, "/save requires a prompt")?;
                    return Ok(ChatFlow::Continue);
                };
                let outcome = studio.save_prompt(&prompt, Vec::new())?;
                report_warning(out, outcome.warning.as_ref())?;
                writeln!(out, "Saved prompt {}", outcome.item.id)?;
            }
            "list_prompts" => print_prompts(out, &studio.saved_prompts())?,
            "delete_prompt" => {
                delete_prompt(studio, intent.arg_str("id").unwrap_or_default(), out)?
            }
            "list_history" => print_history(out, &studio.history())?,
            "delete_artifact" => {
                delete_artifact(studio, intent.arg_str("id").unwrap_or_default(), out)?
            }
            "clear_history" => {
                let outcome = studio.clear_history();
                report_warning(out, outcome.warning.as_ref())?;
                writeln!(out, "History cleared.")?;
            }
            "set_ratio" => {
                let ratio = intent
                    .settings_update
                    .get("aspect_ratio")
                    .and_then(Value::as_str)
                    .and_then(|value| value.parse::<AspectRatio>().ok());
                match ratio {
                    Some(ratio) => {
                        studio.settings_mut().aspect_ratio = ratio;
                        writeln!(out, "Aspect ratio: {ratio}")?;
                    }
                    None => {
                        let supported: Vec<&str> =
                            AspectRatio::ALL.iter().map(|ratio| ratio.as_str()).collect();
                        writeln!(
                            out,
                            "Unsupported ratio '{}'. Use one of: {}",
                            intent.arg_str("value").unwrap_or_default(),
                            supported.join(", ")
                        )?;
                    }
                }
            }
            "set_quality" => {
                let preset = intent
                    .settings_update
                    .get("quality_preset")
                    .and_then(Value::as_str)
                    .and_then(Quality::from_preset);
                if let Some(quality) = preset {
                    studio.settings_mut().quality = quality;
                }
                let quality = studio.settings().quality;
                writeln!(out, "Image model: {}", quality.image_model())?;
            }
            "set_thinking" => {
                let current = studio.settings().extended_reasoning;
                let enabled = match intent.settings_update.get("extended_reasoning") {
                    Some(Value::Bool(enabled)) => *enabled,
                    _ => !current,
                };
                studio.settings_mut().extended_reasoning = enabled;
                writeln!(
                    out,
                    "Extended reasoning: {}",
                    if enabled { "on" } else { "off" }
                )?;
            }
            _ => {
                writeln!(
                    out,
                    "Unknown command /{}. Type /help for commands.",
                    intent.arg_str("command").unwrap_or_default()
                )?;
            }
        }
        Ok(ChatFlow::Continue)
    }

    fn prompt_or_last(&self, intent: &Intent) -> Option<String> {
        intent.prompt.clone().or_else(|| self.last_enhanced.clone())
    }

    fn remember(&mut self, reply: &ChatReply, out: &mut dyn Write) -> Result<()> {
        if let Some(enhanced) = reply.parsed.enhanced_prompt.as_ref() {
            self.last_enhanced = Some(enhanced.clone());
            writeln!(
                out,
                "(Enhanced prompt captured: /image or /save without text will use it.)"
            )?;
        }
        Ok(())
    }
}

fn delete_artifact(studio: &mut Studio, id: &str, out: &mut dyn Write) -> Result<()> {
    if studio.artifact(id).is_none() {
        writeln!(out, "No artifact {id}.")?;
        return Ok(());
    }
    let outcome = studio.delete_artifact(id);
    report_warning(out, outcome.warning.as_ref())?;
    writeln!(out, "Deleted {id}; {} left.", outcome.value.len())?;
    Ok(())
}

fn delete_prompt(studio: &mut Studio, id: &str, out: &mut dyn Write) -> Result<()> {
    let before = studio.saved_prompts().len();
    let outcome = studio.delete_saved_prompt(id);
    report_warning(out, outcome.warning.as_ref())?;
    if outcome.value.len() == before {
        writeln!(out, "No saved prompt {id}.")?;
    } else {
        writeln!(out, "Deleted prompt {id}.")?;
    }
    Ok(())
}

fn report_image(out: &mut dyn Write, image: &StudioImage, save_to: Option<&Path>) -> Result<()> {
    writeln!(out, "{}", artifact_line(&image.artifact))?;
    report_warning(out, image.warning.as_ref())?;
    if !image.persisted {
        writeln!(out, "(shown only; not saved to history)")?;
    }
    if let Some(path) = save_to {
        write_payload(&image.artifact.payload, path)?;
        writeln!(out, "Wrote {}", path.display())?;
    }
    Ok(())
}

fn report_reply(out: &mut dyn Write, reply: &ChatReply) -> Result<()> {
    let Some(enhanced) = reply.parsed.enhanced_prompt.as_deref() else {
        writeln!(out, "{}", reply.message.text.trim())?;
        return Ok(());
    };
    writeln!(out, "Enhanced prompt: {enhanced}")?;
    if !reply.parsed.style_options.is_empty() {
        writeln!(out, "Style suggestions:")?;
        for option in &reply.parsed.style_options {
            writeln!(out, "  - {option}")?;
        }
    }
    Ok(())
}

fn report_warning(out: &mut dyn Write, warning: Option<&StoreWarning>) -> Result<()> {
    if let Some(warning) = warning {
        writeln!(out, "warning: {warning}")?;
    }
    Ok(())
}

fn print_history(out: &mut dyn Write, history: &[GeneratedArtifact]) -> Result<()> {
    if history.is_empty() {
        writeln!(out, "History is empty.")?;
    }
    for artifact in history {
        writeln!(out, "{}", artifact_line(artifact))?;
    }
    Ok(())
}

fn print_prompts(out: &mut dyn Write, prompts: &[SavedPrompt]) -> Result<()> {
    if prompts.is_empty() {
        writeln!(out, "No saved prompts.")?;
    }
    for prompt in prompts {
        let tags = if prompt.tags.is_empty() {
            String::new()
        } else {
            format!("  [{}]", prompt.tags.join(", "))
        };
        writeln!(out, "{}  {}{tags}", prompt.id, prompt.text)?;
    }
    Ok(())
}

fn artifact_line(artifact: &GeneratedArtifact) -> String {
    format!(
        "{}  {:<9}  {}  {}",
        artifact.id,
        artifact.kind.as_str(),
        artifact.metadata.as_deref().unwrap_or("-"),
        truncate_text(&artifact.prompt, PROMPT_PREVIEW_CHARS)
    )
}

fn artifact_summary(artifact: &GeneratedArtifact) -> Value {
    json!({
        "id": artifact.id,
        "type": artifact.kind,
        "prompt": artifact.prompt,
        "timestamp": artifact.timestamp,
        "metadata": artifact.metadata,
    })
}

fn write_payload(payload: &str, path: &Path) -> Result<()> {
    let decoded = decode_payload(payload)?;
    if let Some(parent) = path.parent().filter(|parent| !parent.as_os_str().is_empty()) {
        fs::create_dir_all(parent)
            .with_context(|| format!("failed to create {}", parent.display()))?;
    }
    fs::write(path, decoded.bytes).with_context(|| format!("failed to write {}", path.display()))
}

fn describe_error(err: &anyhow::Error) -> String {
    match err.downcast_ref::<UpstreamError>() {
        Some(upstream) => upstream.user_message(),
        None => format!("{err:#}"),
    }
}

fn truncate_text(value: &str, max_chars: usize) -> String {
    let flat = value.split_whitespace().collect::<Vec<_>>().join(" ");
    if flat.chars().count() <= max_chars {
        return flat;
    }
    flat.chars().take(max_chars).collect::<String>() + "…"
}

#[cfg(test)]
mod tests {
    use std::io::Cursor;

    use lumina_contracts::store::{ArtifactStore, MemoryStore};
    use lumina_engine::DryrunClient;

    use super::*;

    fn run_cli(args: &[&str]) -> Result<(i32, String)> {
        let cli = Cli::try_parse_from(args)?;
        let mut input = Cursor::new(Vec::new());
        let mut out = Vec::new();
        let code = execute(cli, &mut input, &mut out)?;
        Ok((code, String::from_utf8(out)?))
    }

    fn dryrun_studio() -> Studio {
        Studio::new(
            Box::new(DryrunClient::new()),
            ArtifactStore::new(Box::new(MemoryStore::new())),
        )
    }

    fn run_script(studio: &mut Studio, script: &str) -> Result<String> {
        let mut input = Cursor::new(script.as_bytes().to_vec());
        let mut out = Vec::new();
        run_chat(studio, &mut input, &mut out)?;
        Ok(String::from_utf8(out)?)
    }

    #[test]
    fn parses_ratio_aliases_and_requires_both_dimensions() {
        let cli = Cli::try_parse_from(["lumina", "generate", "--prompt", "x", "--ratio", "wide"]);
        assert!(matches!(
            cli.map(|cli| cli.command),
            Ok(Command::Generate(GenerateArgs {
                ratio: Some(AspectRatio::Wide),
                ..
            }))
        ));
        assert!(
            Cli::try_parse_from(["lumina", "generate", "--prompt", "x", "--width", "10"]).is_err()
        );
        assert!(
            Cli::try_parse_from(["lumina", "generate", "--prompt", "x", "--ratio", "5:4"]).is_err()
        );
    }

    #[test]
    fn ratio_command_reports_ratio_and_tier() -> Result<()> {
        let (code, out) = run_cli(&["lumina", "ratio", "--width", "1920", "--height", "1080"])?;
        assert_eq!(code, 0);
        assert_eq!(out.trim(), "1920x1080 -> 16:9 2K");

        let (_, out) = run_cli(&["lumina", "ratio", "--text", "poster at 768 by 1024"])?;
        assert_eq!(out.trim(), "768x1024 -> 3:4 1K");

        let (code, _) = run_cli(&["lumina", "ratio", "--text", "a 4x4 grid"])?;
        assert_eq!(code, 2);
        Ok(())
    }

    #[test]
    fn generate_list_export_and_prompts_round_trip() -> Result<()> {
        let temp = tempfile::tempdir()?;
        let home = temp.path().join("home");
        let home_arg = home.to_string_lossy().to_string();
        let base = ["lumina", "--dryrun", "--home", home_arg.as_str()];
        let with = |extra: &[&str]| -> Vec<String> {
            base.iter()
                .chain(extra.iter())
                .map(|value| value.to_string())
                .collect()
        };
        let run = |args: Vec<String>| -> Result<String> {
            let refs: Vec<&str> = args.iter().map(String::as_str).collect();
            Ok(run_cli(&refs)?.1)
        };

        let out = run(with(&["generate", "--prompt", "a lighthouse 1024x768"]))?;
        assert!(out.contains("GENERATED"));
        assert!(out.contains("dryrun-image-1 · 4:3"));

        let listed = run(with(&["history", "list", "--json"]))?;
        let rows: Vec<Value> = serde_json::from_str(&listed)?;
        assert_eq!(rows.len(), 1);
        assert!(rows[0].get("data").is_none());
        let id = rows[0]["id"].as_str().unwrap_or_default().to_string();

        let exported = temp.path().join("out").join("image.png");
        let exported_arg = exported.to_string_lossy().to_string();
        run(with(&[
            "history",
            "export",
            id.as_str(),
            "--out",
            exported_arg.as_str(),
        ]))?;
        let image = image_dimensions(&exported)?;
        assert_eq!(image, (128, 96));

        run(with(&["prompts", "add", "misty forest", "--tag", "Mood"]))?;
        let prompts = run(with(&["prompts", "list"]))?;
        assert!(prompts.contains("misty forest  [mood]"));

        let deleted = run(with(&["history", "delete", "missing"]))?;
        assert!(deleted.contains("No artifact missing."));

        assert!(home.join("events.jsonl").exists());
        Ok(())
    }

    fn image_dimensions(path: &Path) -> Result<(u32, u32)> {
        let bytes = fs::read(path)?;
        // PNG IHDR: width and height are big-endian u32 at offsets 16 and 20.
        if bytes.len() < 24 {
            bail!("not a png");
        }
        let width = u32::from_be_bytes([bytes[16], bytes[17], bytes[18], bytes[19]]);
        let height = u32::from_be_bytes([bytes[20], bytes[21], bytes[22], bytes[23]]);
        Ok((width, height))
    }

    #[test]
    fn chat_session_uses_captured_enhanced_prompt() -> Result<()> {
        let mut studio = dryrun_studio();
        let out = run_script(
            &mut studio,
            "/ratio 16:9\na fox in snow\n/image\n/history\n/think\n/bogus\n/quit\nignored\n",
        )?;
        assert!(out.contains("Aspect ratio: 16:9"));
        assert!(out.contains("Enhanced prompt captured"));
        assert!(out.contains("Extended reasoning: on"));
        assert!(out.contains("Unknown command /bogus."));

        let history = studio.history();
        assert_eq!(history.len(), 1);
        assert!(history[0].prompt.starts_with("a fox in snow, rendered with"));
        assert_eq!(history[0].metadata.as_deref(), Some("dryrun-image-1 · 16:9"));
        Ok(())
    }

    #[test]
    fn chat_session_reports_errors_and_keeps_going() -> Result<()> {
        let mut studio = dryrun_studio();
        let out = run_script(
            &mut studio,
            "/image\n/edit /does/not/exist.png brighten\n/ratio 5:4\n/logo Acme -- bold\n/save\n/prompts\n",
        )?;
        assert!(out.contains("/image requires a prompt"));
        assert!(out.contains("error: failed reading /does/not/exist.png"));
        assert!(out.contains("Unsupported ratio '5:4'"));
        assert!(out.contains("LOGO"));
        assert!(out.contains("/save requires a prompt"));
        assert!(out.contains("No saved prompts."));
        Ok(())
    }

    #[test]
    fn upstream_errors_render_user_message() {
        let err = anyhow::Error::new(UpstreamError::RateLimited {
            message: "429".to_string(),
        });
        assert!(describe_error(&err).contains("wait"));

        let plain = anyhow::anyhow!("disk full").context("failed to write out.png");
        assert_eq!(describe_error(&plain), "failed to write out.png: disk full");
    }

    #[test]
    fn truncate_text_flattens_whitespace() {
        assert_eq!(truncate_text("a\n  b   c", 10), "a b c");
        assert_eq!(truncate_text("abcdef", 3), "abc…");
    }
}
