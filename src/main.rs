use std::io::{self, BufRead, IsTerminal, Read, Write};
use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{Context, Result, anyhow};
use clap::{Args, Parser, Subcommand};
use serde::Serialize;

use blogging_pro_rust::keyword::KeywordAnalysis;
use blogging_pro_rust::parser::{DisplayLine, Platform};
use blogging_pro_rust::prompts::{BlogImageKind, TopicKind, WritingStyle};
use blogging_pro_rust::providers::{ImageSize, ImageStyle};
use blogging_pro_rust::state::{ImageRecord, PostDraft, SnsCopy, TopicResult};
use blogging_pro_rust::storage::{HistoryKind, Theme};
use blogging_pro_rust::{
    Config, Credential, Credentials, PostRequest, Studio, StudioError, StudioResult,
    ThumbnailEdit,
};

#[derive(Parser, Debug)]
#[command(
    name = "blogging-pro-rust",
    version,
    about = "Draft blog topics, posts, SNS copy and thumbnails with generative models"
)]
struct Cli {
    /// Gemini API key (overrides environment variables and stored keys)
    #[arg(short = 'k', long = "key", global = true)]
    key: Option<String>,

    /// Read extra settings from a local TOML file
    #[arg(short = 'r', long = "read-settings", global = true)]
    read_settings: Option<String>,

    /// Store file for credentials, theme and history
    #[arg(long = "store", global = true)]
    store: Option<String>,

    /// Print results as JSON
    #[arg(long = "json", global = true)]
    json: bool,

    /// Enable verbose logging
    #[arg(long = "verbose", global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Suggest blog topics (category, eeat, evergreen, longtail, memo)
    Topics {
        #[arg(short = 't', long = "kind", default_value = "category")]
        kind: String,
        /// Read the input from a file (memo topics)
        #[arg(short = 'f', long = "file")]
        file: Option<PathBuf>,
        /// Input text; stdin when omitted
        input: Vec<String>,
    },
    /// Score a keyword's competition
    Keyword {
        term: String,
        /// Draft a post from the analysis right away
        #[arg(long = "draft")]
        draft: bool,
        #[command(flatten)]
        post: PostFlags,
    },
    /// Draft a blog post
    Post {
        title: String,
        /// Extra instructions for the draft
        #[arg(long = "request")]
        request: Option<String>,
        #[command(flatten)]
        post: PostFlags,
    },
    /// Write platform copy (defaults to the post drafted in this session)
    Sns {
        #[arg(long = "title")]
        title: Option<String>,
        #[arg(long = "summary")]
        summary: Option<String>,
    },
    /// Generate an image
    Image {
        prompt: String,
        /// realistic, illustration, minimal, artistic, cartoon
        #[arg(long = "style", default_value = "realistic")]
        style: String,
        /// 1024x1024, 1792x1024, 1024x1792
        #[arg(long = "size", default_value = "1024x1024")]
        size: String,
        /// Treat the prompt as a blog topic (main or sub)
        #[arg(long = "blog")]
        blog: Option<String>,
        #[arg(short = 'o', long = "output")]
        output: Option<PathBuf>,
    },
    /// Compose a thumbnail; use '/' in the text for line breaks
    Thumbnail {
        text: String,
        #[arg(long = "background")]
        background: Option<PathBuf>,
        /// Generate the background from a description instead
        #[arg(long = "generate")]
        generate: Option<String>,
        #[command(flatten)]
        controls: ThumbnailFlags,
        #[arg(short = 'o', long = "output", default_value = "thumbnail.png")]
        output: PathBuf,
    },
    /// Show or clear history
    History {
        /// topic, keyword, post, sns, image
        #[arg(long = "kind")]
        kind: Option<String>,
        #[arg(long = "clear")]
        clear: bool,
    },
    /// Show, set or toggle the theme
    Theme { value: Option<String> },
    /// Save API credentials
    Credentials {
        #[arg(long = "gemini")]
        gemini: Option<String>,
        #[arg(long = "naver-id")]
        naver_id: Option<String>,
        #[arg(long = "naver-secret")]
        naver_secret: Option<String>,
    },
    /// Serve the dashboard API over HTTP
    Serve {
        #[arg(long = "addr", default_value = "127.0.0.1:3000")]
        addr: String,
    },
}

#[derive(Args, Debug)]
struct PostFlags {
    /// friendly or expert
    #[arg(long = "style")]
    style: Option<String>,
    /// Generate a main image and place it above the post
    #[arg(long = "main-image")]
    main_image: bool,
    /// Print the post's script blocks separately
    #[arg(long = "interactive-code")]
    interactive_code: bool,
    /// Write SNS copy for the post afterwards
    #[arg(long = "sns")]
    sns: bool,
}

#[derive(Args, Debug, Default)]
struct ThumbnailFlags {
    /// 16:9, 1:1, 4:3, original
    #[arg(long = "ratio")]
    ratio: Option<String>,
    #[arg(long = "font")]
    font: Option<String>,
    #[arg(long = "font-size")]
    font_size: Option<u32>,
    #[arg(long = "fill")]
    fill_color: Option<String>,
    #[arg(long = "stroke")]
    stroke_color: Option<String>,
    #[arg(long = "stroke-width")]
    stroke_width: Option<u32>,
}

impl ThumbnailFlags {
    fn to_edit(&self, text: Option<String>) -> Result<ThumbnailEdit> {
        let mut edit = ThumbnailEdit::parse(self.ratio.as_deref(), self.font.as_deref())?;
        edit.text = text;
        edit.font_size = self.font_size;
        edit.fill_color = self.fill_color.clone();
        edit.stroke_color = self.stroke_color.clone();
        edit.stroke_width = self.stroke_width;
        Ok(edit)
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    blogging_pro_rust::logging::init(cli.verbose)?;
    let studio = Arc::new(blogging_pro_rust::open_studio(&Config {
        key: cli.key.clone(),
        settings_path: cli.read_settings.clone(),
        store_path: cli.store.clone(),
    })?);
    let output = Output { json: cli.json };

    match cli.command {
        Some(command) => run_command(&studio, command, output).await,
        None => run_interactive(&studio, output).await,
    }
}

#[derive(Debug, Clone, Copy)]
struct Output {
    json: bool,
}

impl Output {
    fn emit<T: Serialize>(&self, value: &T, render: impl FnOnce(&T) -> String) -> Result<()> {
        if self.json {
            println!("{}", serde_json::to_string_pretty(value)?);
        } else {
            println!("{}", render(value));
        }
        Ok(())
    }
}

async fn run_command(studio: &Arc<Studio>, command: Command, output: Output) -> Result<()> {
    match command {
        Command::Topics { kind, file, input } => {
            let kind = parse_topic_kind(&kind)?;
            let input = read_topic_input(file.as_deref(), input)?;
            let result = with_credentials(studio, || studio.generate_topics(kind, &input)).await?;
            output.emit(&result, render_topics)
        }
        Command::Keyword { term, draft, post } => {
            let analysis = with_credentials(studio, || studio.analyze_keyword(&term)).await?;
            output.emit(&analysis, render_keyword)?;
            if draft {
                let mut request = studio.post_request_from_keyword()?;
                apply_post_flags(&mut request, &post)?;
                draft_post(studio, request, &post, output).await?;
            }
            Ok(())
        }
        Command::Post {
            title,
            request,
            post,
        } => {
            let mut draft = PostRequest {
                title,
                additional_requests: request,
                ..PostRequest::default()
            };
            apply_post_flags(&mut draft, &post)?;
            draft_post(studio, draft, &post, output).await
        }
        Command::Sns { title, summary } => {
            let copy = with_credentials(studio, || {
                studio.generate_sns(title.clone(), summary.clone())
            })
            .await?;
            output.emit(&copy, render_sns)
        }
        Command::Image {
            prompt,
            style,
            size,
            blog,
            output: path,
        } => {
            let record = match blog.as_deref() {
                Some(kind) => {
                    let kind = parse_blog_image_kind(kind)?;
                    with_credentials(studio, || studio.generate_blog_image(&prompt, kind)).await?
                }
                None => {
                    let (style, size) = (ImageStyle::parse(&style), ImageSize::parse(&size));
                    with_credentials(studio, || studio.generate_image(&prompt, style, size))
                        .await?
                }
            };
            if let Some(path) = path {
                write_data_uri(&record.data_uri, &path)?;
            }
            output.emit(&record, render_image)
        }
        Command::Thumbnail {
            text,
            background,
            generate,
            controls,
            output: path,
        } => {
            if let Some(description) = generate {
                with_credentials(studio, || {
                    studio.generate_thumbnail_background(&description)
                })
                .await?;
            }
            let edit = controls.to_edit(Some(text))?;
            studio.with_thumbnail(|compositor| -> StudioResult<()> {
                if let Some(path) = &background {
                    compositor.set_background_file(path)?;
                }
                compositor.apply(edit)
            })?;
            export_thumbnail(studio, &path)
        }
        Command::History { kind, clear } => {
            if clear {
                studio.clear_history()?;
                println!("history cleared");
                return Ok(());
            }
            let kind = kind.as_deref().map(parse_history_kind).transpose()?;
            let entries = studio.histories(kind)?;
            output.emit(&entries, |entries| {
                entries
                    .iter()
                    .map(|entry| format!("{}\t{}\t{}", entry.timestamp, entry.kind.as_str(), entry.payload))
                    .collect::<Vec<_>>()
                    .join("\n")
            })
        }
        Command::Theme { value } => {
            let theme = match value.as_deref().map(str::trim) {
                None | Some("") => studio.theme(),
                Some("toggle") => studio.toggle_theme()?,
                Some(value) => studio.set_theme(
                    Theme::parse(value).ok_or_else(|| anyhow!("unknown theme: {}", value))?,
                )?,
            };
            println!("theme: {}", theme.as_str());
            Ok(())
        }
        Command::Credentials {
            gemini,
            naver_id,
            naver_secret,
        } => {
            let incoming = Credentials {
                gemini,
                naver_id,
                naver_secret,
            };
            if incoming == Credentials::default() {
                return Err(anyhow!(
                    "nothing to save (use --gemini, --naver-id, --naver-secret)"
                ));
            }
            studio.save_credentials(incoming)?;
            println!("credentials saved");
            Ok(())
        }
        Command::Serve { addr } => {
            blogging_pro_rust::server::run_server(Arc::clone(studio), addr).await
        }
    }
}

async fn draft_post(
    studio: &Studio,
    request: PostRequest,
    flags: &PostFlags,
    output: Output,
) -> Result<()> {
    let draft = with_credentials(studio, || studio.generate_post(request.clone())).await?;
    output.emit(&draft, render_post)?;
    if flags.interactive_code {
        match studio.interactive_code()? {
            Some(code) => println!("{}", code),
            None => eprintln!("no script blocks in this post"),
        }
    }
    if flags.sns {
        let copy = with_credentials(studio, || studio.generate_sns(None, None)).await?;
        output.emit(&copy, render_sns)?;
    }
    Ok(())
}

fn apply_post_flags(request: &mut PostRequest, flags: &PostFlags) -> Result<()> {
    if let Some(style) = flags.style.as_deref() {
        request.style = Some(parse_writing_style(style)?);
    }
    request.main_image = flags.main_image;
    Ok(())
}

/// Runs `op`; when a credential is missing and stdin is a terminal, asks for
/// it once, saves it, and retries.
async fn with_credentials<T, F, Fut>(studio: &Studio, mut op: F) -> Result<T>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = StudioResult<T>>,
{
    match op().await {
        Err(StudioError::MissingCredential(credential)) if io::stdin().is_terminal() => {
            let credentials = prompt_credentials(credential)?;
            studio.save_credentials(credentials)?;
            Ok(op().await?)
        }
        result => Ok(result?),
    }
}

fn prompt_credentials(credential: Credential) -> Result<Credentials> {
    match credential {
        Credential::Gemini => Ok(Credentials {
            gemini: Some(prompt_line("Gemini API key")?),
            ..Credentials::default()
        }),
        Credential::Naver => Ok(Credentials {
            naver_id: Some(prompt_line("Naver client ID")?),
            naver_secret: Some(prompt_line("Naver client secret")?),
            ..Credentials::default()
        }),
    }
}

fn prompt_line(label: &str) -> Result<String> {
    eprint!("{}: ", label);
    io::stderr().flush()?;
    let mut line = String::new();
    io::stdin().lock().read_line(&mut line)?;
    let value = line.trim().to_string();
    if value.is_empty() {
        return Err(anyhow!("{} is required", label));
    }
    Ok(value)
}

fn read_topic_input(file: Option<&Path>, words: Vec<String>) -> Result<String> {
    if let Some(path) = file {
        return std::fs::read_to_string(path)
            .with_context(|| format!("failed to read {}", path.display()));
    }
    if !words.is_empty() {
        return Ok(words.join(" "));
    }
    if io::stdin().is_terminal() {
        return Err(anyhow!("topic input is required"));
    }
    let mut buffer = String::new();
    io::stdin().read_to_string(&mut buffer)?;
    Ok(buffer)
}

fn write_data_uri(data_uri: &str, path: &Path) -> Result<()> {
    use base64::Engine;
    use base64::engine::general_purpose::STANDARD as BASE64;

    let (_, payload) = data_uri
        .split_once(";base64,")
        .ok_or_else(|| anyhow!("image is not a base64 data URI"))?;
    let bytes = BASE64.decode(payload)?;
    std::fs::write(path, bytes).with_context(|| format!("failed to write {}", path.display()))?;
    eprintln!("saved {}", path.display());
    Ok(())
}

fn export_thumbnail(studio: &Studio, path: &Path) -> Result<()> {
    let mime = match path.extension().and_then(|ext| ext.to_str()) {
        Some("jpg") | Some("jpeg") => "image/jpeg",
        Some("webp") => "image/webp",
        _ => "image/png",
    };
    let job = studio.with_thumbnail(|compositor| compositor.export_job(mime))?;
    let bytes = job.render()?;
    std::fs::write(path, bytes).with_context(|| format!("failed to write {}", path.display()))?;
    eprintln!("saved {}", path.display());
    Ok(())
}

fn parse_topic_kind(value: &str) -> Result<TopicKind> {
    TopicKind::parse(value).ok_or_else(|| anyhow!("unknown topic kind: {}", value))
}

fn parse_writing_style(value: &str) -> Result<WritingStyle> {
    WritingStyle::parse(value).ok_or_else(|| anyhow!("unknown writing style: {}", value))
}

fn parse_history_kind(value: &str) -> Result<HistoryKind> {
    HistoryKind::parse(value).ok_or_else(|| anyhow!("unknown history kind: {}", value))
}

fn parse_blog_image_kind(value: &str) -> Result<BlogImageKind> {
    match value.trim().to_lowercase().as_str() {
        "main" => Ok(BlogImageKind::Main),
        "sub" => Ok(BlogImageKind::Sub),
        _ => Err(anyhow!("unknown blog image kind: {} (main or sub)", value)),
    }
}

fn render_topics(result: &TopicResult) -> String {
    let mut lines = vec![format!("[{}]", result.heading)];
    for line in &result.topics.lines {
        match line {
            DisplayLine::Item(text) => lines.push(format!("  {}", text)),
            DisplayLine::Paragraph(text) => lines.push(text.clone()),
        }
    }
    if !result.topics.actionable.is_empty() {
        lines.push(String::new());
        lines.push("draft with: blogging-pro-rust post \"<title>\"".to_string());
    }
    lines.join("\n")
}

fn render_keyword(analysis: &KeywordAnalysis) -> String {
    let mut lines = vec![
        format!("keyword: {}", analysis.keyword),
        format!("results: {}", analysis.total_count),
        format!("competition: {}", analysis.competition.as_str()),
        format!("score: {}/100", analysis.score),
        format!("monthly searches: {}", analysis.monthly_searches),
        format!("related: {}", analysis.related_keywords.join(", ")),
        String::new(),
        analysis.strategy.clone(),
    ];
    if analysis.is_demo {
        lines.push("(demo data: keyword search was unavailable)".to_string());
    }
    lines.join("\n")
}

fn render_post(draft: &PostDraft) -> String {
    let mut sections = vec![draft.html.clone()];
    if !draft.tags.is_empty() {
        sections.push(format!("tags: {}", draft.tags.join(", ")));
    }
    for warning in &draft.warnings {
        sections.push(format!("warning: {}", warning));
    }
    sections.join("\n\n")
}

fn render_sns(copy: &SnsCopy) -> String {
    Platform::ALL
        .iter()
        .map(|platform| format!("{}\n{}", platform.marker(), copy.sections.get(*platform)))
        .collect::<Vec<_>>()
        .join("\n\n")
}

fn render_image(record: &ImageRecord) -> String {
    format!(
        "prompt: {}\nstyle: {:?}\nsize: {}\nbytes: {}",
        record.revised_prompt,
        record.style,
        record.size.as_str(),
        record.data_uri.len()
    )
}

async fn run_interactive(studio: &Studio, output: Output) -> Result<()> {
    println!("Interactive mode. Use /quit or /exit to finish.");
    println!("Type /help to see available commands.");

    let mut line = String::new();
    let stdin = io::stdin();
    let mut stdin_lock = stdin.lock();
    loop {
        line.clear();
        print!("> ");
        io::stdout().flush()?;
        if stdin_lock.read_line(&mut line)? == 0 {
            break;
        }
        let input = line.trim();
        if input.is_empty() {
            continue;
        }
        match handle_interactive_command(studio, input, output).await {
            Ok(true) => break,
            Ok(false) => {}
            Err(err) => eprintln!("error: {:#}", err),
        }
    }
    Ok(())
}

async fn handle_interactive_command(studio: &Studio, input: &str, output: Output) -> Result<bool> {
    let (command, arg) = input.split_once(' ').unwrap_or((input, ""));
    let arg = arg.trim();
    match command {
        "/quit" | "/exit" => return Ok(true),
        "/help" => print_interactive_help(),
        "/topics" => {
            let (kind, text) = arg.split_once(' ').unwrap_or((arg, ""));
            let kind = parse_topic_kind(kind)?;
            let result = with_credentials(studio, || studio.generate_topics(kind, text)).await?;
            output.emit(&result, render_topics)?;
        }
        "/clear-topics" => {
            studio.clear_topics();
            println!("topics cleared");
        }
        "/keyword" => {
            let analysis = with_credentials(studio, || studio.analyze_keyword(arg)).await?;
            output.emit(&analysis, render_keyword)?;
        }
        "/style" => {
            if arg.is_empty() {
                println!("style: {}", studio.snapshot().writing_style.as_str());
            } else {
                studio.set_writing_style(parse_writing_style(arg)?);
                println!("style set to {}", arg);
            }
        }
        "/post" => {
            let request = if arg.is_empty() {
                studio.post_request_from_keyword()?
            } else {
                PostRequest {
                    title: arg.to_string(),
                    ..PostRequest::default()
                }
            };
            let draft = with_credentials(studio, || studio.generate_post(request.clone())).await?;
            output.emit(&draft, render_post)?;
        }
        "/code" => match studio.interactive_code()? {
            Some(code) => println!("{}", code),
            None => println!("no script blocks in this post"),
        },
        "/sns" => {
            let copy = with_credentials(studio, || studio.generate_sns(None, None)).await?;
            output.emit(&copy, render_sns)?;
        }
        "/image" => {
            let record = with_credentials(studio, || {
                studio.generate_image(arg, ImageStyle::Realistic, ImageSize::Square)
            })
            .await?;
            output.emit(&record, render_image)?;
        }
        "/background" => {
            if arg.is_empty() {
                studio.use_latest_image_for_thumbnail()?;
            } else {
                with_credentials(studio, || studio.generate_thumbnail_background(arg)).await?;
            }
            println!("thumbnail background set");
        }
        "/thumbnail" => {
            let edit = ThumbnailFlags::default().to_edit(Some(arg.to_string()))?;
            studio.with_thumbnail(|compositor| compositor.apply(edit))?;
            println!("thumbnail text set");
        }
        "/ratio" => {
            let edit = ThumbnailEdit::parse(Some(arg), None)?;
            studio.with_thumbnail(|compositor| compositor.apply(edit))?;
            println!("ratio set to {}", arg);
        }
        "/export" => {
            let path = if arg.is_empty() { "thumbnail.png" } else { arg };
            export_thumbnail(studio, Path::new(path))?;
        }
        "/theme" => {
            let theme = studio.toggle_theme()?;
            println!("theme: {}", theme.as_str());
        }
        "/history" => {
            let kind = if arg.is_empty() {
                None
            } else {
                Some(parse_history_kind(arg)?)
            };
            for entry in studio.histories(kind)? {
                println!("{}\t{}\t{}", entry.timestamp, entry.kind.as_str(), entry.payload);
            }
        }
        _ => eprintln!("unknown command: {}", input),
    }
    Ok(false)
}

fn print_interactive_help() {
    println!("Commands:");
    println!("  /quit, /exit                 Exit interactive mode");
    println!("  /topics <kind> <input>       Suggest topics");
    println!("  /clear-topics                Forget suggested topics");
    println!("  /keyword <term>              Analyze a keyword");
    println!("  /style [friendly|expert]     Set writing style (or show current)");
    println!("  /post [title]                Draft a post (from the keyword when empty)");
    println!("  /code                        Show the post's script blocks");
    println!("  /sns                         Write SNS copy for the last post");
    println!("  /image <prompt>              Generate an image");
    println!("  /background [description]    Set the thumbnail background");
    println!("  /thumbnail <text>            Set thumbnail text ('/' breaks lines)");
    println!("  /ratio <16:9|1:1|4:3|original>  Set thumbnail ratio");
    println!("  /export [path]               Save the thumbnail");
    println!("  /theme                       Toggle the theme");
    println!("  /history [kind]              Show history");
}
