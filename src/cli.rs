use std::fmt::Display;
use std::future::Future;
use std::path::PathBuf;
use std::time::Duration;

use anyhow::{bail, Context, Result};
use clap::{Args, Parser, Subcommand};
use futures::{pin_mut, TryStreamExt};
use indexmap::IndexMap;
use log::{debug, info, warn};

use crate::auth::Token;
use crate::config::{Config, ConfigPaths, Credentials, Job, JobParam, View, Workspace};
use crate::jenkins::types::{BuildNumber, JobParameters, QueueId};
use crate::jenkins::{
    collect_log, log_stream, BuildWorkflow, JenkinsClient, StageOutcome, WorkflowOutcome,
};
use crate::output::{self, bright_green, bright_yellow, cyan, dim, Spinner, StageProgress};
use crate::prompt;

/// Form field names used when parameter names cannot be read from the job.
const FALLBACK_CHOICE_PARAM: &str = "pro";
const FALLBACK_BRANCH_PARAM: &str = "tag";

#[derive(Parser)]
#[command(name = "jenkins-cli")]
#[command(author, version, about = "Trigger and watch Jenkins builds", long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    command: Option<Commands>,

    /// Directory holding the jenkins-cli and workspace files (yaml, yml, toml or json)
    #[arg(long, global = true, env = "JENKINS_CLI_HOME")]
    home: Option<PathBuf>,
}

#[derive(Subcommand)]
enum Commands {
    /// Store the server URL and credentials
    Init,

    /// Refresh the cached views and jobs
    Sync {
        /// Also cache each job's choice and branch options
        #[arg(long)]
        params: bool,
    },

    /// Pick a job and start a build (the default command)
    Build(BuildArgs),

    /// Show queued and running builds
    Queue,

    /// Follow the stages of a pipeline build
    Stages { job: String, build: String },

    /// Print the console log of a build
    Log {
        job: String,
        build: String,

        /// Wait between log fetches while the build is still writing; 0 disables
        #[arg(long, default_value_t = 1000)]
        follow_interval_ms: u64,

        /// Write the whole log to a file instead of the terminal
        #[arg(short, long)]
        output: Option<PathBuf>,
    },

    /// Abort a running build
    Stop { job: String, build: String },

    /// Remove an item from the build queue
    Cancel { queue_id: String },
}

#[derive(Args, Default)]
struct BuildArgs {
    #[arg(long)]
    view: Option<String>,

    /// Job name; `folder/job` for jobs inside folders
    #[arg(long)]
    job: Option<String>,

    #[arg(long)]
    choice: Option<String>,

    #[arg(long)]
    branch: Option<String>,

    /// Follow the pipeline stages once the build has started
    #[arg(long, default_value_t = false)]
    watch: bool,
}

impl Cli {
    pub async fn execute(self) -> Result<()> {
        let paths = ConfigPaths::resolve(self.home.as_deref())?;
        debug!("Using configuration in {}", paths.dir().display());

        match self.command.unwrap_or(Commands::Build(BuildArgs::default())) {
            Commands::Init => execute_init(&paths),
            Commands::Sync { params } => execute_sync(&paths, params).await,
            Commands::Build(args) => execute_build(&paths, args).await,
            Commands::Queue => execute_queue(&paths).await,
            Commands::Stages { job, build } => {
                execute_stages(&paths, &job, &BuildNumber::new(build)).await
            }
            Commands::Log {
                job,
                build,
                follow_interval_ms,
                output: save_to,
            } => {
                let interval =
                    (follow_interval_ms > 0).then(|| Duration::from_millis(follow_interval_ms));
                execute_log(&paths, &job, &BuildNumber::new(build), interval, save_to).await
            }
            Commands::Stop { job, build } => {
                execute_stop(&paths, &job, &BuildNumber::new(build)).await
            }
            Commands::Cancel { queue_id } => execute_cancel(&paths, &QueueId::new(queue_id)).await,
        }
    }
}

fn connect(paths: &ConfigPaths) -> Result<(Config, JenkinsClient)> {
    let config = Config::load(paths).context("Failed to load configuration")?;
    let client = JenkinsClient::new(&config).context("Failed to create Jenkins client")?;
    info!("Connected to {}", client.base_url());
    Ok((config, client))
}

/// Runs `task` behind a spinner labelled `message`.
async fn spin<T, F>(message: impl Display, task: F) -> crate::error::Result<T>
where
    F: Future<Output = crate::error::Result<T>>,
{
    let spinner = Spinner::start(&message);
    let result = task.await;
    match &result {
        Ok(_) => spinner.succeed(&message),
        Err(_) => spinner.fail(&message),
    }
    result
}

fn execute_init(paths: &ConfigPaths) -> Result<()> {
    let existing = Config::load(paths).ok();
    let current = existing
        .as_ref()
        .map(|config| config.credentials.clone())
        .unwrap_or_default();

    let username = prompt::input("Username", Some(current.username.as_str()))?;
    let token = prompt::secret("API token (empty keeps the current one)")?;
    let base_api = prompt::input("Jenkins URL", Some(current.base_api.as_str()))?;

    let credentials = Credentials {
        username,
        token: if token.is_empty() {
            current.token
        } else {
            Token::from(token)
        },
        base_api: base_api.trim_end_matches('/').to_string(),
    };

    let mut config = existing.unwrap_or_else(|| Config::new(Credentials::default()));
    config.credentials = credentials;
    JenkinsClient::new(&config).context("Invalid configuration")?;

    config.save(paths).context("Failed to write configuration")?;
    if !paths.workspace_file().exists() {
        Workspace::default()
            .save(paths)
            .context("Failed to create workspace file")?;
    }

    println!(
        "{} {}",
        bright_green("✅ Configuration saved to"),
        cyan(paths.credentials_file().display())
    );
    println!("   Run {} next to load views and jobs", cyan("jenkins-cli sync"));
    Ok(())
}

async fn execute_sync(paths: &ConfigPaths, with_params: bool) -> Result<()> {
    let (_, client) = connect(paths)?;

    let view_names = spin("Fetching views", client.list_views())
        .await
        .context("Failed to list views")?;

    let mut workspace = Workspace::default();
    for view_name in view_names {
        let listing = spin(
            format!("Fetching jobs of {view_name}"),
            client.list_jobs(&view_name),
        );
        let jobs = match listing.await {
            Ok(jobs) => jobs,
            Err(e) => {
                warn!("Skipping view {view_name}: {e}");
                eprintln!("{}", bright_yellow(format!("⚠️ Skipping view {view_name}: {e}")));
                continue;
            }
        };

        let mut view = View {
            name: view_name,
            job: Vec::with_capacity(jobs.len()),
        };
        for name in jobs {
            let job_param = if with_params {
                cached_params(&client, &name).await
            } else {
                JobParam::default()
            };
            view.job.push(Job { name, job_param });
        }
        workspace.views.push(view);
    }

    workspace.save(paths).context("Failed to write workspace file")?;

    let job_count: usize = workspace.views.iter().map(|view| view.job.len()).sum();
    println!(
        "{} {} views, {} jobs",
        bright_green("✅ Workspace synced:"),
        workspace.views.len(),
        job_count
    );
    Ok(())
}

async fn cached_params(client: &JenkinsClient, job: &str) -> JobParam {
    match client.job_parameters(job).await {
        Ok(parameters) => JobParam {
            choices: parameters.choices,
            branch: parameters.branches,
        },
        Err(e) => {
            warn!("No parameters cached for {job}: {e}");
            JobParam::default()
        }
    }
}

async fn execute_build(paths: &ConfigPaths, args: BuildArgs) -> Result<()> {
    let (config, client) = connect(paths)?;

    let (job, cached) = match args.job {
        Some(job) => {
            let cached = Workspace::load(paths).ok().and_then(|workspace| {
                let view = args.view.as_deref()?;
                workspace.find_job(view, &job).map(|j| j.job_param.clone())
            });
            (job, cached)
        }
        None => {
            let workspace = Workspace::load(paths).context("Failed to load workspace")?;
            let view = match args.view {
                Some(view) => view,
                None => prompt::select_item("Select View", &workspace.view_names())?
                    .context("No view selected, please try again")?,
            };
            let job = prompt::select_item("Select Job", &workspace.job_names(&view))?
                .context("No job selected, please try again")?;
            let cached = workspace.find_job(&view, &job).map(|j| j.job_param.clone());
            (job, cached)
        }
    };

    let lookup = spin(
        format!("Reading parameters of {job}"),
        client.job_parameters(&job),
    );
    let parameters = match lookup.await {
        Ok(parameters) => parameters,
        Err(e) if e.is_network() && cached.is_some() => {
            warn!("Using cached parameters for {job}: {e}");
            from_cache(cached.unwrap_or_default())
        }
        Err(e) => return Err(e).with_context(|| format!("Failed to read parameters of {job}")),
    };

    let choice = pick("Select Choices", args.choice, &parameters.choices)?;
    let branch = pick("Select Branch", args.branch, &parameters.branches)?;
    let params = build_params(&parameters, choice, branch);

    let mut workflow = BuildWorkflow::new(&client, config.poll.policy());
    let outcome = spin(format!("Building {job}"), workflow.trigger(&job, &params))
        .await
        .with_context(|| format!("Failed to build {job}"))?;
    debug!("Workflow ended in {:?}", workflow.phase());

    match outcome {
        WorkflowOutcome::Abandoned { queue_id, attempts } => {
            println!("{}", output::render_abandoned(&job, &queue_id, attempts));
            Ok(())
        }
        WorkflowOutcome::Completed(report) => {
            print!("{}", output::render_build_report(&report));
            if args.watch {
                watch(&workflow, &job, &report.build.number).await?;
            }
            Ok(())
        }
    }
}

/// Uses the given value, or asks when the job offers options.
fn pick(label: &str, given: Option<String>, options: &[String]) -> Result<Option<String>> {
    if given.is_some() || options.is_empty() {
        return Ok(given);
    }
    match prompt::select_item(label, options)? {
        Some(value) => Ok(Some(value)),
        None => bail!("Selection incomplete, please try again"),
    }
}

fn from_cache(cached: JobParam) -> JobParameters {
    JobParameters {
        choice_name: Some(FALLBACK_CHOICE_PARAM.to_string()),
        choices: cached.choices,
        branch_name: Some(FALLBACK_BRANCH_PARAM.to_string()),
        branches: cached.branch,
    }
}

fn build_params(
    parameters: &JobParameters,
    choice: Option<String>,
    branch: Option<String>,
) -> IndexMap<String, String> {
    let mut params = IndexMap::new();
    if let Some(choice) = choice {
        let name = parameters.choice_name.as_deref().unwrap_or(FALLBACK_CHOICE_PARAM);
        params.insert(name.to_string(), choice);
    }
    if let Some(branch) = branch {
        let name = parameters.branch_name.as_deref().unwrap_or(FALLBACK_BRANCH_PARAM);
        params.insert(name.to_string(), branch);
    }
    params
}

async fn watch(workflow: &BuildWorkflow<'_>, job: &str, number: &BuildNumber) -> Result<()> {
    let mut progress = StageProgress::new();
    let result = workflow
        .watch_stages(job, number, |event| progress.on_event(event))
        .await;

    let outcome = match result {
        Ok(outcome) => outcome,
        Err(e) => {
            progress.abandon("Stopped watching");
            return Err(e).with_context(|| format!("Failed to watch stages of {job} #{number}"));
        }
    };

    match &outcome {
        StageOutcome::Finished(_) => {}
        StageOutcome::Halted(status) => progress.abandon(format!("Run ended with {status}")),
        StageOutcome::TimedOut { stage } => progress.abandon(format!("Still running: {stage}")),
    }
    println!("{}", output::render_stage_outcome(&outcome));
    Ok(())
}

async fn execute_queue(paths: &ConfigPaths) -> Result<()> {
    let (_, client) = connect(paths)?;

    let items = spin("Fetching build queue", client.queue())
        .await
        .context("Failed to fetch the build queue")?;
    if items.is_empty() {
        println!("🥚  Build queue is empty");
    } else {
        println!("{}", output::queue_table(&items));
    }

    let running = spin("Fetching running builds", client.running_builds())
        .await
        .context("Failed to fetch executors")?;
    if running.is_empty() {
        println!("🥚  No builds are running");
    } else {
        println!("{}", output::running_table(&running));
    }

    Ok(())
}

async fn execute_stages(paths: &ConfigPaths, job: &str, number: &BuildNumber) -> Result<()> {
    let (config, client) = connect(paths)?;

    let run = client
        .workflow_describe(job, number)
        .await
        .with_context(|| format!("Failed to describe {job} #{number}"))?;
    println!("{}", output::render_run_header(job, &run));

    let workflow = BuildWorkflow::new(&client, config.poll.policy());
    watch(&workflow, job, number).await
}

async fn execute_log(
    paths: &ConfigPaths,
    job: &str,
    number: &BuildNumber,
    interval: Option<Duration>,
    save_to: Option<PathBuf>,
) -> Result<()> {
    let (_, client) = connect(paths)?;
    let chunks = log_stream(&client, job, number, interval);

    if let Some(path) = save_to {
        let log = collect_log(chunks)
            .await
            .with_context(|| format!("Failed to fetch log of {job} #{number}"))?;
        std::fs::write(&path, log)
            .with_context(|| format!("Failed to write {}", path.display()))?;
        println!("{} {}", bright_green("✅ Log written to"), cyan(path.display()));
        return Ok(());
    }

    pin_mut!(chunks);
    let mut pending = String::new();
    while let Some(chunk) = chunks
        .try_next()
        .await
        .with_context(|| format!("Failed to stream log of {job} #{number}"))?
    {
        output::print_log_chunk(&mut pending, &chunk);
    }
    output::flush_log(&mut pending);

    eprintln!("{}", dim("Log output is complete"));
    Ok(())
}

async fn execute_stop(paths: &ConfigPaths, job: &str, number: &BuildNumber) -> Result<()> {
    let (_, client) = connect(paths)?;
    client
        .stop_build(job, number)
        .await
        .with_context(|| format!("Failed to stop {job} #{number}"))?;
    println!("{}", bright_green(format!("🛑 Stopped {job} #{number}")));
    Ok(())
}

async fn execute_cancel(paths: &ConfigPaths, queue_id: &QueueId) -> Result<()> {
    let (_, client) = connect(paths)?;
    client
        .cancel_queue_item(queue_id)
        .await
        .with_context(|| format!("Failed to cancel queue item {queue_id}"))?;
    println!("{}", bright_green(format!("🗑  Cancelled queue item {queue_id}")));
    Ok(())
}
