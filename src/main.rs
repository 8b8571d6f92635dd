use clap::Parser;
use std::io::IsTerminal;
use std::path::{Path, PathBuf};
use tracing::{debug, level_filters::LevelFilter};

mod downloader;
use downloader::{DEFAULT_NAME_TEMPLATE, DownloadEngine, NameTemplate, worker_count};

mod error;
use error::{Error, Result};

mod filter;
use filter::FileFilter;

mod thread;
use thread::{RemoteFile, Thread, ThreadClient, ThreadUrl};

mod utils;
use utils::{interrupt::InterruptRouter, multierr::MultiError, text::make_filename};

#[cfg(test)]
mod test_helpers;

#[derive(Parser)]
#[command(name = "chandl")]
#[command(about = "A lightweight tool for parsing and downloading 4chan threads")]
#[command(version)]
struct Cli {
    #[arg(required = true, help = "the URL(s) of the thread(s) whose files to download")]
    url: Vec<String>,
    #[arg(short, long, help = "download to the working directory")]
    cwd: bool,
    #[arg(
        short,
        long,
        default_value = ".",
        help = "directory to create per-thread directories in"
    )]
    output: PathBuf,
    #[arg(
        short,
        long,
        default_value_t = 5,
        help = "the maximum number of concurrent downloads per core"
    )]
    parallelism: usize,
    #[arg(
        short,
        long,
        help = "extensions or categories (images, videos) to download, comma-separated"
    )]
    filter: Vec<String>,
    #[arg(
        short = 'm',
        long = "match",
        help = "only download files whose original name matches this regex"
    )]
    pattern: Option<String>,
    #[arg(
        short,
        long,
        default_value = DEFAULT_NAME_TEMPLATE,
        help = "file name template using {id}, {name} and {extension}"
    )]
    name: NameTemplate,
    #[arg(short, long, help = "don't show a progress bar")]
    quiet: bool,
    #[arg(short, long, action = clap::ArgAction::Count, help = "increase output verbosity")]
    verbose: u8,
}

fn level_from_verbosity(verbosity: u8) -> LevelFilter {
    match verbosity {
        0 => LevelFilter::WARN,
        1 => LevelFilter::INFO,
        _ => LevelFilter::DEBUG,
    }
}

/// Where a thread's files go: the output directory itself with `--cwd`,
/// otherwise a directory named after the thread.
fn thread_directory(cli: &Cli, thread: &Thread) -> PathBuf {
    if cli.cwd {
        return PathBuf::from(".");
    }
    let name = thread
        .subject
        .as_deref()
        .and_then(|subject| make_filename(subject).ok())
        .filter(|name| name != "." && name != "..")
        .unwrap_or_else(|| thread.id.to_string());
    cli.output.join(name)
}

async fn download_thread(
    cli: &Cli,
    url: &str,
    client: &reqwest::Client,
    filter: &FileFilter,
    interrupts: &InterruptRouter,
) -> Result<()> {
    let thread = ThreadClient::new(client.clone())
        .fetch(&ThreadUrl::parse(url)?)
        .await?;
    println!("Downloading {}", thread.subject.as_deref().unwrap_or(&thread.title));

    let files = thread
        .files()
        .filter(|file| filter.matches(file))
        .cloned()
        .collect::<Vec<RemoteFile>>();
    debug!(
        "{} of {} posts have files to download",
        files.len(),
        thread.posts.len()
    );

    let directory = thread_directory(cli, &thread);
    ensure_directory(&directory).await?;
    debug!("Downloading to {}", directory.display());

    let interactive = !cli.quiet && std::io::stderr().is_terminal();
    let result = DownloadEngine::new(&directory, cli.name.clone(), client.clone())
        .with_interrupts(interrupts.clone())
        .download(&files, worker_count(cli.parallelism), interactive)
        .await?;
    println!("{}", result);
    Ok(())
}

async fn ensure_directory(directory: &Path) -> Result<()> {
    tokio::fs::create_dir_all(directory)
        .await
        .map_err(|_| Error::DirectoryUnavailable(directory.to_path_buf()))
}

#[tokio::main]
async fn main() -> std::result::Result<(), Box<dyn std::error::Error + Send + Sync>> {
    let cli = Cli::parse();

    tracing_subscriber::fmt()
        .with_max_level(level_from_verbosity(cli.verbose))
        .with_target(false)
        .without_time()
        .init();

    let interrupts = InterruptRouter::new();
    let _listener = interrupts.listen();

    let filter = FileFilter::new(&cli.filter, cli.pattern.as_deref())?;
    let client = reqwest::Client::builder()
        .user_agent(concat!("chandl/", env!("CARGO_PKG_VERSION")))
        .build()?;

    let mut errs = Vec::new();
    for url in &cli.url {
        if let Err(err) = download_thread(&cli, url, &client, &filter, &interrupts).await {
            eprintln!("{}: {}", url, err);
            errs.push(err);
        }
    }

    if errs.is_empty() {
        Ok(())
    } else {
        Err(MultiError::new(errs).into())
    }
}
