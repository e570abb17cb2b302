//! Command-line shell for blogtool.
//!
//! Each subcommand maps onto one session operation: list content, show repository
//! status, commit and push, create or delete content, and run the preview server.

use std::io::{BufRead, Read, Write};
use std::path::{Path, PathBuf};
use std::sync::mpsc;
use std::time::Duration;

use anyhow::{Context, Result, bail};
use blogtool::core::derive::{micropost_filename, slugify};
use blogtool::core::templates::TemplateContext;
use blogtool::core::types::{ContentKind, ServerState};
use blogtool::error::CommitStep;
use blogtool::exit_codes;
use blogtool::io::config::{BlogConfig, default_config_path, load_config, write_config};
use blogtool::io::content::{DeleteOutcome, Listing};
use blogtool::io::desktop;
use blogtool::io::drafter::MessageDrafter;
use blogtool::io::git::CommitOutcome;
use blogtool::io::hugo::NewBundle;
use blogtool::logging;
use blogtool::session::{PreviewOutcome, Session};
use clap::{Args, Parser, Subcommand};

#[derive(Parser)]
#[command(
    name = "blogtool",
    version,
    about = "Write, preview and publish a Hugo blog kept in git"
)]
struct Cli {
    /// Config file (default: the per-user config directory).
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Hugo site root, overriding the config and auto-detection.
    #[arg(long, global = true)]
    site: Option<PathBuf>,

    /// Log debug output to stderr.
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// List content, newest first.
    List {
        /// Only this kind: micropost, post, or conversation.
        #[arg(long)]
        kind: Option<ContentKind>,
        #[arg(long)]
        json: bool,
    },
    /// Show branch, changed files and unpushed commits.
    Status {
        #[arg(long)]
        json: bool,
    },
    /// Stage everything, commit, and push.
    Commit(CommitArgs),
    /// Push committed changes (retry after a failed push).
    Push,
    /// Create new content with `hugo new content`.
    #[command(subcommand)]
    New(NewCommand),
    /// Delete a content file or page bundle.
    Delete {
        path: PathBuf,
        /// Do not ask for confirmation.
        #[arg(short, long)]
        yes: bool,
    },
    /// Run the preview server until interrupted.
    Serve,
    /// Open the site in a browser, starting the preview server if needed.
    Preview {
        /// Start the server without asking.
        #[arg(short, long)]
        yes: bool,
    },
    /// Open a content folder in the file manager.
    Open { path: PathBuf },
    /// List commit message templates.
    Templates,
    /// Check that hugo runs and the site is a git repository.
    Check,
    /// Show or create the config file.
    #[command(subcommand)]
    Config(ConfigCommand),
}

#[derive(Args)]
struct CommitArgs {
    /// Commit message.
    #[arg(short, long, conflicts_with_all = ["template", "draft"])]
    message: Option<String>,

    /// Render a named template instead of `-m`.
    #[arg(long, conflicts_with = "draft")]
    template: Option<String>,

    /// Title substituted into the template.
    #[arg(long, requires = "template")]
    title: Option<String>,

    /// Ask the configured summarizer to draft the message from the diff.
    #[arg(long)]
    draft: bool,

    /// Commit locally without pushing.
    #[arg(long)]
    no_push: bool,
}

#[derive(Subcommand)]
enum NewCommand {
    /// Create `content/microposts/<date>-<slug>.md`.
    Micropost {
        /// Used for the file name only.
        #[arg(long, default_value = "")]
        title: String,
        /// Body text; read from stdin when omitted.
        body: Option<String>,
    },
    /// Create a post page bundle.
    Post(BundleArgs),
    /// Create a conversation page bundle.
    Conversation(BundleArgs),
}

#[derive(Args)]
struct BundleArgs {
    #[arg(long)]
    title: String,
    /// Directory name (default: derived from the title).
    #[arg(long)]
    slug: Option<String>,
    /// Language code (default: `site.default_language`).
    #[arg(long)]
    lang: Option<String>,
    #[arg(long, default_value = "")]
    description: String,
    #[arg(long = "tag")]
    tags: Vec<String>,
    #[arg(long = "keyword")]
    keywords: Vec<String>,
}

#[derive(Subcommand)]
enum ConfigCommand {
    /// Print the effective config as TOML.
    Show,
    /// Write a default config file.
    Init {
        /// Overwrite an existing file.
        #[arg(short, long)]
        force: bool,
    },
}

fn main() {
    let cli = Cli::parse();
    logging::init(cli.verbose);
    match run(cli) {
        Ok(code) => std::process::exit(code),
        Err(err) => {
            eprintln!("{:#}", err);
            std::process::exit(exit_codes::ERROR);
        }
    }
}

fn run(cli: Cli) -> Result<i32> {
    let config_path = match &cli.config {
        Some(path) => Some(path.clone()),
        None => default_config_path(),
    };
    let mut config = match &config_path {
        Some(path) => load_config(path)?,
        None => BlogConfig::default(),
    };
    if let Some(site) = &cli.site {
        config.site.path = Some(site.clone());
    }

    match cli.command {
        Command::Config(cmd) => cmd_config(cmd, config_path.as_deref(), &config),
        command => {
            let cwd = std::env::current_dir().context("read current directory")?;
            let session = Session::start(config, &cwd)?;
            dispatch(&session, command)
        }
    }
}

fn dispatch(session: &Session, command: Command) -> Result<i32> {
    match command {
        Command::List { kind, json } => cmd_list(session, kind, json),
        Command::Status { json } => cmd_status(session, json),
        Command::Commit(args) => cmd_commit(session, args),
        Command::Push => cmd_push(session),
        Command::New(cmd) => cmd_new(session, cmd),
        Command::Delete { path, yes } => cmd_delete(session, &path, yes),
        Command::Serve => cmd_serve(session),
        Command::Preview { yes } => cmd_preview(session, yes),
        Command::Open { path } => cmd_open(session, &path),
        Command::Check => cmd_check(session),
        Command::Templates => {
            for name in session.templates().names() {
                println!("{name}");
            }
            Ok(exit_codes::OK)
        }
        Command::Config(_) => unreachable!("config is handled before the session starts"),
    }
}

fn cmd_list(session: &Session, kind: Option<ContentKind>, json: bool) -> Result<i32> {
    let listing = match kind {
        Some(kind) => session.content().list(kind),
        None => session.content().list_all(),
    };
    report_warnings(&listing);
    if json {
        let entries: Vec<_> = listing.iter().collect();
        println!("{}", serde_json::to_string_pretty(&entries).context("serialize listing")?);
        return Ok(exit_codes::OK);
    }
    for item in &listing {
        let draft = if item.draft { " [draft]" } else { "" };
        println!(
            "{}  {:<12} {:<3} {}{draft}",
            item.date.format("%Y-%m-%d"),
            item.kind,
            item.language,
            item.title
        );
        if !item.preview.is_empty() {
            println!("            {}", item.preview);
        }
    }
    Ok(exit_codes::OK)
}

fn report_warnings(listing: &Listing) {
    let warnings = listing.warnings();
    if warnings.is_empty() {
        return;
    }
    eprintln!("skipped {} file(s):", warnings.len());
    for warning in warnings {
        eprintln!("  {}: {}", warning.path.display(), warning.reason);
    }
}

fn cmd_status(session: &Session, json: bool) -> Result<i32> {
    let status = session.git()?.status()?;
    if json {
        println!("{}", serde_json::to_string_pretty(&status).context("serialize status")?);
        return Ok(exit_codes::OK);
    }
    let upstream = status
        .upstream
        .as_deref()
        .map(|u| format!(" -> {u}"))
        .unwrap_or_default();
    println!("branch {}{upstream}", status.branch);
    println!(
        "{} changed ({} staged, {} modified, {} untracked)",
        status.changed_files, status.staged, status.modified, status.untracked
    );
    println!("{} unpushed commit(s)", status.unpushed_commits);
    Ok(exit_codes::OK)
}

fn cmd_commit(session: &Session, args: CommitArgs) -> Result<i32> {
    let git = session.git()?;
    let message = if let Some(message) = args.message {
        message
    } else if let Some(name) = &args.template {
        let ctx = TemplateContext {
            title: args.title.clone().unwrap_or_default(),
            ..TemplateContext::default()
        };
        session.templates().render(name, &ctx)?
    } else if args.draft {
        let drafter = session
            .drafter()
            .context("drafting is disabled (commit.drafter is empty)")?;
        let diff = git.diff_for_drafting()?;
        let Some(drafted) = drafter.draft(&diff) else {
            bail!("could not draft a commit message; pass -m instead");
        };
        println!("drafted: {drafted}");
        drafted
    } else {
        bail!("pass -m <message>, --template <name>, or --draft");
    };

    let result = if args.no_push {
        git.commit_only(&message)
    } else {
        git.commit_and_push(&message)
    };
    match result {
        Ok(CommitOutcome::NothingToCommit) => {
            println!("nothing to commit");
            Ok(exit_codes::NOTHING_TO_DO)
        }
        Ok(CommitOutcome::Committed) => {
            println!("committed");
            Ok(exit_codes::OK)
        }
        Ok(CommitOutcome::Pushed) => {
            println!("committed and pushed");
            Ok(exit_codes::OK)
        }
        Err(err) if err.step == CommitStep::Push => {
            eprintln!("commit created locally, but {err}");
            if err.is_auth_failure() {
                eprintln!("check your git credentials, then run `blogtool push`");
            }
            Ok(exit_codes::PUSH_FAILED)
        }
        Err(err) => Err(err.into()),
    }
}

fn cmd_push(session: &Session) -> Result<i32> {
    match session.git()?.push() {
        Ok(()) => {
            println!("pushed");
            Ok(exit_codes::OK)
        }
        Err(err) => {
            eprintln!("{err}");
            if err.is_auth_failure() {
                eprintln!("check your git credentials and try again");
            }
            Ok(exit_codes::PUSH_FAILED)
        }
    }
}

fn cmd_new(session: &Session, cmd: NewCommand) -> Result<i32> {
    let created = match cmd {
        NewCommand::Micropost { title, body } => {
            let body = match body {
                Some(body) => body,
                None => {
                    let mut buf = String::new();
                    std::io::stdin()
                        .read_to_string(&mut buf)
                        .context("read micropost body from stdin")?;
                    buf
                }
            };
            if body.trim().is_empty() {
                bail!("micropost body is empty");
            }
            let filename = micropost_filename(chrono::Local::now().fixed_offset(), &title);
            session.hugo().create_micropost(&filename, &body)?
        }
        NewCommand::Post(args) => session.hugo().create_post(&bundle(session, args))?,
        NewCommand::Conversation(args) => {
            session.hugo().create_conversation(&bundle(session, args))?
        }
    };
    println!("{}", created.display());
    Ok(exit_codes::OK)
}

fn bundle(session: &Session, args: BundleArgs) -> NewBundle {
    NewBundle {
        slug: args.slug.unwrap_or_else(|| slugify(&args.title)),
        language: args
            .lang
            .unwrap_or_else(|| session.config().site.default_language.clone()),
        title: args.title,
        description: args.description,
        tags: args.tags,
        keywords: args.keywords,
    }
}

fn cmd_delete(session: &Session, path: &Path, yes: bool) -> Result<i32> {
    let outcome = session
        .content()
        .delete(path, |target| yes || confirm(&format!("Delete {}?", target.display())))?;
    match outcome {
        DeleteOutcome::Deleted { removed } => {
            println!("deleted {}", removed.display());
            Ok(exit_codes::OK)
        }
        DeleteOutcome::Cancelled => {
            println!("cancelled");
            Ok(exit_codes::NOTHING_TO_DO)
        }
    }
}

fn cmd_serve(session: &Session) -> Result<i32> {
    let interrupts = interrupt_channel()?;
    match session.server().start() {
        ServerState::Running { url } => {
            println!("serving at {url} (Ctrl-C to stop)");
            wait_for_interrupt(session, &interrupts)
        }
        state => {
            eprintln!("{state}");
            Ok(exit_codes::ERROR)
        }
    }
}

fn cmd_preview(session: &Session, yes: bool) -> Result<i32> {
    // Installed once the user agreed, so Ctrl-C still aborts the prompt itself.
    let mut interrupts = None;
    let outcome = session.preview(|| {
        let agreed = yes || confirm("The preview server is not running. Start it?");
        if agreed {
            interrupts = Some(interrupt_channel());
        }
        agreed
    });
    match outcome {
        PreviewOutcome::Opened { url, launcher } => {
            println!("opened {url} with {launcher} (Ctrl-C to stop the server)");
        }
        PreviewOutcome::Declined => return Ok(exit_codes::NOTHING_TO_DO),
        PreviewOutcome::ServerUnavailable(state) => {
            eprintln!("{state}");
            return Ok(exit_codes::ERROR);
        }
        PreviewOutcome::LaunchFailed { url, error } => {
            eprintln!("{error}");
            println!("open {url} manually (Ctrl-C to stop the server)");
        }
    }
    let interrupts = match interrupts {
        Some(installed) => installed?,
        None => interrupt_channel()?,
    };
    wait_for_interrupt(session, &interrupts)
}

/// Route Ctrl-C and SIGTERM into a channel instead of the default exit.
fn interrupt_channel() -> Result<mpsc::Receiver<()>> {
    let (tx, rx) = mpsc::channel();
    ctrlc::set_handler(move || {
        let _ = tx.send(());
    })
    .context("install signal handler")?;
    Ok(rx)
}

/// Keep the server running until interrupted or until it dies.
///
/// A signal that arrived while the server was still starting is already
/// queued and stops it on the first pass.
fn wait_for_interrupt(session: &Session, interrupts: &mpsc::Receiver<()>) -> Result<i32> {
    loop {
        match interrupts.recv_timeout(Duration::from_secs(1)) {
            Ok(()) | Err(mpsc::RecvTimeoutError::Disconnected) => {
                session.shutdown();
                println!("server stopped");
                return Ok(exit_codes::OK);
            }
            Err(mpsc::RecvTimeoutError::Timeout) => {}
        }
        if let state @ ServerState::Failed { .. } = session.server().state() {
            eprintln!("{state}");
            return Ok(exit_codes::ERROR);
        }
    }
}

fn cmd_open(session: &Session, path: &Path) -> Result<i32> {
    let full = if path.is_absolute() {
        path.to_path_buf()
    } else {
        session.site_root().join(path)
    };
    let folder = if full.is_dir() {
        full
    } else {
        full.parent()
            .map(Path::to_path_buf)
            .with_context(|| format!("{} has no parent folder", path.display()))?
    };
    if !folder.is_dir() {
        bail!("{} does not exist", folder.display());
    }
    let launcher = desktop::open_folder(&folder)?;
    println!("opened {} with {launcher}", folder.display());
    Ok(exit_codes::OK)
}

fn cmd_check(session: &Session) -> Result<i32> {
    println!("site   {}", session.site_root().display());
    let mut healthy = true;
    match session.hugo().version() {
        Ok(version) => println!("hugo   {version}"),
        Err(err) => {
            println!("hugo   {err}");
            healthy = false;
        }
    }
    match session.git().and_then(|git| git.status()) {
        Ok(status) => println!("git    on {}, {} changed", status.branch, status.changed_files),
        Err(err) => println!("git    {err}"),
    }
    Ok(if healthy { exit_codes::OK } else { exit_codes::ERROR })
}

fn cmd_config(cmd: ConfigCommand, path: Option<&Path>, config: &BlogConfig) -> Result<i32> {
    match cmd {
        ConfigCommand::Show => {
            if let Some(path) = path {
                println!("# {}", path.display());
            }
            print!("{}", toml::to_string_pretty(config).context("serialize config")?);
            Ok(exit_codes::OK)
        }
        ConfigCommand::Init { force } => {
            let path = path.context("no config directory on this platform; pass --config")?;
            if path.exists() && !force {
                println!("{} already exists (use --force to overwrite)", path.display());
                return Ok(exit_codes::NOTHING_TO_DO);
            }
            write_config(path, &BlogConfig::default())?;
            println!("wrote {}", path.display());
            Ok(exit_codes::OK)
        }
    }
}

/// Ask a yes/no question on the terminal. Anything but `y`/`yes` is no.
fn confirm(question: &str) -> bool {
    print!("{question} [y/N] ");
    if std::io::stdout().flush().is_err() {
        return false;
    }
    let mut answer = String::new();
    if std::io::stdin().lock().read_line(&mut answer).is_err() {
        return false;
    }
    matches!(answer.trim().to_lowercase().as_str(), "y" | "yes")
}
