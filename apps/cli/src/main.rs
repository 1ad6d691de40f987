use std::{
    path::{Path, PathBuf},
    time::{Duration, Instant},
};

use anyhow::{Context, Result, bail};
use autoshorts_core::{
    ApiClient, CaptionStyle, ClientConfig, Clip, ClipDuration, Credentials, ProcessForm,
    RegenerateOptions, ResultsPanel, SharePlatform, StoredSession, UploadProgress, Workflow,
    WorkflowState, format_clip_card, format_rocket_content, get_root_cache_dir, get_session_path,
    load_session, media::is_video_file, request::DEFAULT_NUM_SHORTS, save_session,
    shell::{Downloader, FileChooser, connection_error_page, validate_selection},
};
use clap::{Args, Parser, Subcommand, ValueEnum};
use console::{Term, style};
use indicatif::{ProgressBar, ProgressStyle};
use tokio::{sync::watch, task::JoinHandle};
use tracing::debug;
use tracing_subscriber::EnvFilter;

fn format_duration(d: Duration) -> String {
    let secs = d.as_secs_f64();
    if secs < 60.0 {
        format!("{:.1}s", secs)
    } else {
        format!("{:.0}m {:.0}s", (secs / 60.0).floor(), secs % 60.0)
    }
}

/// CLI wrapper for CaptionStyle (needed for clap ValueEnum)
#[derive(Clone, Copy, Default, ValueEnum)]
enum CliCaptionStyle {
    #[default]
    Karaoke,
    DeepDiver,
    Mozi,
    Glitch,
    Classic,
}

impl From<CliCaptionStyle> for CaptionStyle {
    fn from(cli: CliCaptionStyle) -> Self {
        match cli {
            CliCaptionStyle::Karaoke => CaptionStyle::Karaoke,
            CliCaptionStyle::DeepDiver => CaptionStyle::DeepDiver,
            CliCaptionStyle::Mozi => CaptionStyle::Mozi,
            CliCaptionStyle::Glitch => CaptionStyle::Glitch,
            CliCaptionStyle::Classic => CaptionStyle::Classic,
        }
    }
}

#[derive(Clone, Copy, Default, ValueEnum)]
enum CliDuration {
    #[value(name = "30")]
    Thirty,
    #[default]
    #[value(name = "60")]
    Sixty,
    #[value(name = "90")]
    Ninety,
    #[value(name = "120")]
    OneTwenty,
}

impl From<CliDuration> for ClipDuration {
    fn from(cli: CliDuration) -> Self {
        match cli {
            CliDuration::Thirty => ClipDuration::Seconds30,
            CliDuration::Sixty => ClipDuration::Seconds60,
            CliDuration::Ninety => ClipDuration::Seconds90,
            CliDuration::OneTwenty => ClipDuration::Seconds120,
        }
    }
}

#[derive(Clone, Copy, ValueEnum)]
enum CliPlatform {
    Instagram,
    Youtube,
}

impl From<CliPlatform> for SharePlatform {
    fn from(cli: CliPlatform) -> Self {
        match cli {
            CliPlatform::Instagram => SharePlatform::Instagram,
            CliPlatform::Youtube => SharePlatform::Youtube,
        }
    }
}

#[derive(Parser)]
#[command(name = "autoshorts")]
#[command(about = "Turn long videos into captioned shorts, then tweak, promote and share them")]
struct Cli {
    /// Processing API base URL (overrides AUTOSHORTS_API_URL)
    #[arg(long, global = true)]
    api_url: Option<String>,

    /// Whole-request timeout in seconds (overrides AUTOSHORTS_TIMEOUT_SECS)
    #[arg(long, global = true)]
    timeout: Option<u64>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Upload a video (or point at a URL) and generate shorts
    Run(RunArgs),
    /// Show the clips of the last run
    Clips,
    /// Re-render the captions of one clip
    Regenerate(RegenerateArgs),
    /// Generate titles, hashtags and captions for one clip
    Rocket {
        /// Clip number as shown by `clips`
        clip: usize,
    },
    /// Publish one clip
    Share(ShareArgs),
    /// Save one clip to disk
    Download {
        /// Clip number as shown by `clips`
        clip: usize,

        /// Target directory (defaults to the system downloads folder)
        #[arg(short, long)]
        dir: Option<PathBuf>,
    },
    /// Write the offline page shown when the server cannot be reached
    OfflinePage {
        #[arg(short, long)]
        output: Option<PathBuf>,
    },
}

#[derive(Args)]
struct RunArgs {
    /// Local video file. Without it (and without --url) a picker is shown.
    file: Option<PathBuf>,

    /// Process a remote video instead of uploading a file
    #[arg(short, long, conflicts_with = "file")]
    url: Option<String>,

    /// Number of shorts to generate (1-10)
    #[arg(short = 'n', long, default_value_t = DEFAULT_NUM_SHORTS)]
    shorts: u8,

    #[arg(short, long, default_value = "karaoke")]
    style: CliCaptionStyle,

    /// Spoken language code; "auto" or omitted lets the server detect it
    #[arg(short, long)]
    lang: Option<String>,

    /// Target clip length in seconds
    #[arg(short, long, default_value = "60")]
    duration: CliDuration,

    /// Only look at the video from here (HH:MM:SS, MM:SS or seconds)
    #[arg(long)]
    start: Option<String>,

    /// Only look at the video up to here
    #[arg(long)]
    end: Option<String>,

    /// Caption text color
    #[arg(long)]
    color: Option<String>,

    /// Caption background color
    #[arg(long)]
    bg_color: Option<String>,

    /// Caption font size
    #[arg(long)]
    size: Option<u32>,

    #[arg(long)]
    watermark_text: Option<String>,

    #[arg(long)]
    watermark_image: Option<String>,
}

impl RunArgs {
    fn form(&self) -> ProcessForm {
        let defaults = ProcessForm::default();
        ProcessForm {
            num_shorts: self.shorts,
            caption_style: self.style.into(),
            language: self.lang.clone(),
            clip_duration: self.duration.into(),
            start_time: self.start.clone().unwrap_or_default(),
            end_time: self.end.clone().unwrap_or_default(),
            text_color: self.color.clone().unwrap_or(defaults.text_color),
            bg_color: self.bg_color.clone().unwrap_or(defaults.bg_color),
            font_size: self.size.unwrap_or(defaults.font_size),
            watermark_text: self.watermark_text.clone(),
            watermark_image_path: self.watermark_image.clone(),
        }
    }
}

#[derive(Args)]
struct RegenerateArgs {
    /// Clip number as shown by `clips`
    clip: usize,

    /// Caption style (defaults to the one the clips were generated with)
    #[arg(short, long)]
    style: Option<CliCaptionStyle>,

    #[arg(long)]
    color: Option<String>,

    #[arg(long)]
    bg_color: Option<String>,

    #[arg(long)]
    size: Option<u32>,
}

#[derive(Args)]
struct ShareArgs {
    /// Clip number as shown by `clips`
    clip: usize,

    #[arg(short, long)]
    platform: CliPlatform,

    #[arg(short, long)]
    username: String,

    /// Caption to post instead of the generated one
    #[arg(short, long)]
    caption: Option<String>,
}

fn create_spinner(msg: &str) -> ProgressBar {
    let pb = ProgressBar::new_spinner();
    pb.set_style(
        ProgressStyle::with_template("{spinner:.cyan} {msg}")
            .unwrap_or_else(|_| ProgressStyle::default_spinner())
            .tick_chars("⠁⠂⠄⡀⢀⠠⠐⠈ "),
    );
    pb.set_message(msg.to_string());
    pb.enable_steady_tick(Duration::from_millis(80));
    pb
}

fn create_upload_bar() -> ProgressBar {
    let pb = ProgressBar::new(100);
    pb.set_style(
        ProgressStyle::with_template("{spinner:.cyan} Uploading [{bar:30.cyan/dim}] {pos:>3}%")
            .unwrap_or_else(|_| ProgressStyle::default_bar())
            .progress_chars("█▉▊▋▌▍▎▏ "),
    );
    pb.enable_steady_tick(Duration::from_millis(80));
    pb
}

fn check() -> console::StyledObject<&'static str> {
    style("✓").green().bold()
}

fn fail(message: impl std::fmt::Display) -> ! {
    eprintln!("{} {}", style("Error:").red().bold(), message);
    std::process::exit(1);
}

fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();
}

fn build_client(cli: &Cli) -> Result<ApiClient> {
    let mut config = ClientConfig::from_env();
    if let Some(url) = &cli.api_url {
        config = config.with_base_url(url);
    }
    if let Some(secs) = cli.timeout {
        config = config.with_timeout(Some(Duration::from_secs(secs)).filter(|d| !d.is_zero()));
    }
    Ok(ApiClient::new(config)?)
}

/// Clip numbers on the command line start at 1.
fn clip_index(number: usize) -> Result<usize> {
    number
        .checked_sub(1)
        .context("Clip numbers start at 1")
}

async fn load_last_session(path: &Path) -> Result<StoredSession> {
    match load_session(path).await? {
        Some(stored) if !stored.cards.is_empty() || !stored.workflow.clips().is_empty() => {
            Ok(stored)
        }
        _ => bail!("No clips yet. Run `autoshorts run <video>` first."),
    }
}

/// Let the user pick one of the videos in the current directory.
async fn pick_video() -> Result<PathBuf> {
    let chooser = FileChooser::new();
    let (plan, selection) = chooser.request(&["video/*"]);
    debug!("File chooser plan: {:?}", plan);

    let mut candidates: Vec<PathBuf> = std::fs::read_dir(".")?
        .flatten()
        .map(|entry| entry.path())
        .filter(|path| path.is_file() && is_video_file(path))
        .collect();
    candidates.sort();

    if candidates.is_empty() {
        chooser.resolve(None);
    } else {
        let term = Term::stderr();
        for (i, path) in candidates.iter().enumerate() {
            term.write_line(&format!(
                "  {} {}",
                style(format!("{:>2}.", i + 1)).cyan(),
                path.display()
            ))?;
        }
        term.write_str(&format!("Pick a video [1-{}]: ", candidates.len()))?;
        let answer = term.read_line()?;
        let picked = answer
            .trim()
            .parse::<usize>()
            .ok()
            .and_then(|n| n.checked_sub(1))
            .and_then(|i| candidates.get(i).cloned());
        chooser.resolve(picked);
    }

    match selection.await? {
        Some(path) => Ok(validate_selection(path)?),
        None => bail!("No video selected"),
    }
}

/// Mirror upload progress onto a bar, then switch to a processing spinner.
fn watch_progress(mut rx: watch::Receiver<u8>, upload: bool) -> JoinHandle<Option<ProgressBar>> {
    tokio::spawn(async move {
        if upload {
            let bar = create_upload_bar();
            while rx.changed().await.is_ok() {
                let percent = *rx.borrow_and_update();
                bar.set_position(percent.into());
                if percent >= 100 {
                    break;
                }
            }
            if bar.position() < 100 {
                bar.abandon();
                return None;
            }
            bar.finish_and_clear();
            println!("{} Uploaded", check());
        }
        Some(create_spinner("Processing video (this can take a while)..."))
    })
}

/// A run that never left the client leaves the last session as it was.
fn panel_to_save(outcome: &autoshorts_core::Result<Vec<Clip>>) -> Option<ResultsPanel> {
    match outcome {
        Ok(clips) => Some(ResultsPanel::new(clips.clone())),
        Err(e) if e.is_validation() => None,
        Err(_) => Some(ResultsPanel::default()),
    }
}

async fn run(client: &ApiClient, args: RunArgs, session_path: &Path) -> Result<()> {
    let mut workflow = Workflow::new(args.form());
    match (&args.file, &args.url) {
        (Some(file), _) => workflow.select_file(file.clone())?,
        (None, Some(url)) => workflow.enter_url(url.clone())?,
        (None, None) => workflow.select_file(pick_video().await?)?,
    }

    // Surface form mistakes before anything is sent.
    if let Err(e) = workflow.form.validate() {
        fail(e);
    }

    println!(
        "\n{}  {}\n",
        style("autoshorts").cyan().bold(),
        style(client.base_url()).dim()
    );

    let started = Instant::now();
    let progress = UploadProgress::new();
    let upload = args.url.is_none();
    let watcher = watch_progress(progress.subscribe(), upload);

    let outcome = workflow.run(client, &progress).await.map(<[_]>::to_vec);
    drop(progress);
    let spinner = watcher.await?;

    if let Some(panel) = panel_to_save(&outcome) {
        save_session(&StoredSession::capture(&workflow, &panel).await, session_path).await?;
    }

    let clips = match outcome {
        Ok(clips) => clips,
        Err(e) => {
            if let Some(spinner) = spinner {
                spinner.abandon();
            }
            fail(e.user_message());
        }
    };

    let done = format!(
        "{} Generated {} shorts {}",
        check(),
        clips.len(),
        style(format!("[{}]", format_duration(started.elapsed()))).dim()
    );
    match spinner {
        Some(spinner) => spinner.finish_with_message(done),
        None => println!("{}", done),
    }

    println!("{}", style("─".repeat(60)).dim());
    for (i, clip) in clips.iter().enumerate() {
        println!("{}", format_clip_card(i, clip));
    }
    Ok(())
}

async fn show_clips(session_path: &Path) -> Result<()> {
    let Some(stored) = load_session(session_path).await? else {
        println!("No session yet.");
        return Ok(());
    };

    if let WorkflowState::Error { message, .. } = stored.workflow.state() {
        println!("{} Last run failed: {}", style("✗").red().bold(), message);
    }

    for (i, card) in stored.panel().cards().await.iter().enumerate() {
        println!("{}", format_clip_card(i, &card.clip));
        if let Some(rocket) = &card.rocket {
            println!("   {} {}\n", style("🚀").bold(), rocket.title);
        }
    }
    Ok(())
}

async fn regenerate(client: &ApiClient, args: RegenerateArgs, session_path: &Path) -> Result<()> {
    let index = clip_index(args.clip)?;
    let stored = load_last_session(session_path).await?;
    let panel = stored.panel();

    let style = args
        .style
        .map(CaptionStyle::from)
        .unwrap_or(stored.workflow.form.caption_style);
    let defaults = RegenerateOptions::for_style(style);
    let options = RegenerateOptions {
        text_color: args.color.unwrap_or(defaults.text_color),
        bg_color: args.bg_color.unwrap_or(defaults.bg_color),
        font_size: args.size.unwrap_or(defaults.font_size),
        ..defaults
    };

    let spinner = create_spinner(&format!("Regenerating clip {}...", args.clip));
    let result = panel.regenerate(client, index, &options).await;
    match result {
        Ok(clip) => {
            spinner.finish_with_message(format!("{} Regenerated clip {}", check(), args.clip));
            save_session(&StoredSession::capture(&stored.workflow, &panel).await, session_path)
                .await?;
            println!("{}", format_clip_card(index, &clip));
            Ok(())
        }
        Err(e) => {
            spinner.abandon();
            fail(e.user_message())
        }
    }
}

async fn rocket(client: &ApiClient, clip: usize, session_path: &Path) -> Result<()> {
    let index = clip_index(clip)?;
    let stored = load_last_session(session_path).await?;
    let panel = stored.panel();

    let spinner = create_spinner("Generating viral content...");
    match panel.generate_rocket(client, index).await {
        Ok(content) => {
            spinner.finish_with_message(format!("{} Content ready", check()));
            save_session(&StoredSession::capture(&stored.workflow, &panel).await, session_path)
                .await?;
            println!("{}", style("─".repeat(60)).dim());
            println!("{}", format_rocket_content(&content));
            Ok(())
        }
        Err(e) => {
            spinner.abandon();
            fail(e.user_message())
        }
    }
}

async fn share(client: &ApiClient, args: ShareArgs, session_path: &Path) -> Result<()> {
    let index = clip_index(args.clip)?;
    let stored = load_last_session(session_path).await?;
    let panel = stored.panel();
    let platform: SharePlatform = args.platform.into();

    let term = Term::stderr();
    term.write_str(&format!("{} password for {}: ", platform, args.username))?;
    let password = term.read_secure_line()?;
    let credentials = Credentials::new(args.username, password);

    let spinner = create_spinner(&format!("Sharing to {}...", platform));
    match panel
        .share(client, index, platform, credentials, args.caption)
        .await
    {
        Ok(response) => {
            let id = response
                .media_id
                .map(|id| format!(" (media {})", id))
                .unwrap_or_default();
            spinner.finish_with_message(format!(
                "{} Shared to {}{}",
                check(),
                platform,
                style(id).dim()
            ));
            Ok(())
        }
        Err(e) => {
            spinner.abandon();
            fail(e.user_message())
        }
    }
}

async fn download(
    client: &ApiClient,
    clip: usize,
    dir: Option<PathBuf>,
    session_path: &Path,
) -> Result<()> {
    let index = clip_index(clip)?;
    let stored = load_last_session(session_path).await?;
    let cards = stored.panel().cards().await;
    let Some(card) = cards.get(index) else {
        bail!("No clip {} ({} clips in session)", clip, cards.len());
    };

    let downloader = Downloader::new(
        client.http().clone(),
        dir.unwrap_or_else(Downloader::default_dir),
    );
    let url = client.absolute_url(&card.clip.url)?;

    let spinner = create_spinner(&format!("Downloading clip {}...", clip));
    match downloader.download(url.as_str()).await {
        Ok(path) => {
            spinner.finish_with_message(format!(
                "{} Saved to {}",
                check(),
                style(path.display()).dim()
            ));
            Ok(())
        }
        Err(e) => {
            spinner.abandon();
            fail(e.user_message())
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();
    init_tracing();

    let cli = Cli::parse();
    let client = build_client(&cli)?;
    let session_path = get_session_path(&get_root_cache_dir());

    match cli.command {
        Command::Run(args) => run(&client, args, &session_path).await,
        Command::Clips => show_clips(&session_path).await,
        Command::Regenerate(args) => regenerate(&client, args, &session_path).await,
        Command::Rocket { clip } => rocket(&client, clip, &session_path).await,
        Command::Share(args) => share(&client, args, &session_path).await,
        Command::Download { clip, dir } => download(&client, clip, dir, &session_path).await,
        Command::OfflinePage { output } => {
            let page = connection_error_page(client.base_url());
            match output {
                Some(path) => {
                    tokio::fs::write(&path, page).await?;
                    println!("{} Wrote {}", check(), path.display());
                }
                None => print!("{}", page),
            }
            Ok(())
        }
    }
}

#[cfg(test)]
mod tests {
    use autoshorts_core::AutoShortsError;

    use super::*;

    #[test]
    fn test_validation_failure_keeps_previous_session() {
        let outcome = Err(AutoShortsError::Validation("Please select a video".into()));
        assert!(panel_to_save(&outcome).is_none());
    }

    #[tokio::test]
    async fn test_server_failure_replaces_session() {
        let outcome = Err(AutoShortsError::NoClips);
        let panel = panel_to_save(&outcome).unwrap();
        assert_eq!(panel.len().await, 0);
    }
}
