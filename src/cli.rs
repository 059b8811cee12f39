use anyhow::{bail, Context, Result};
use clap::{Args, Parser, Subcommand};
use log::{info, warn};
use serde::Serialize;
use std::path::{Path, PathBuf};

use crate::config::Config;
use crate::harvest::{self, analyze_build, HarvestRequest, RunSummary};
use crate::jenkins::BuildDirectory;
use crate::output::{print_summary, PhaseProgress};
use crate::store::{JsonSink, MongoSink, StoreSettings};

#[derive(Parser)]
#[command(name = "oelens")]
#[command(author, version, about = "Yocto build metrics harvester", long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Configuration file (defaults to ./oelens.toml or the user config dir)
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    #[arg(short, long, global = true)]
    output: Option<PathBuf>,

    #[arg(short, long, global = true, default_value_t = false)]
    pretty: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Harvest every build of a Jenkins job into the build store
    Scan(ScanArgs),

    /// Analyze a single build directory and print its record
    Inspect {
        /// Build directory, e.g. <jenkins home>/jobs/<job>/builds/42
        build_dir: PathBuf,
    },
}

#[derive(Args, Debug, Default)]
struct ScanArgs {
    #[arg(long)]
    jenkins_home: Option<PathBuf>,

    #[arg(short, long)]
    job: Option<String>,

    /// Number of builds analyzed at the same time
    #[arg(short = 'n', long)]
    threads: Option<usize>,

    #[arg(long)]
    db_host: Option<String>,

    #[arg(long)]
    db_port: Option<u16>,

    #[arg(long)]
    db_name: Option<String>,

    #[arg(long)]
    db_coll: Option<String>,

    #[arg(long)]
    db_user: Option<String>,

    #[arg(long, env = "OELENS_DB_PASS", hide_env_values = true)]
    db_pass: Option<String>,

    /// Re-harvest builds that are already stored
    #[arg(long, default_value_t = false)]
    no_skip_existing: bool,

    /// Harvest without a build store and write the records as JSON
    #[arg(long, default_value_t = false)]
    dry_run: bool,
}

impl ScanArgs {
    fn request(&self, config: &Config) -> Result<HarvestRequest> {
        let threads = self.threads.unwrap_or(config.scan.threads);
        if threads == 0 {
            bail!("--threads must be at least 1");
        }

        Ok(HarvestRequest {
            jenkins_home: self
                .jenkins_home
                .clone()
                .unwrap_or_else(|| config.jenkins.home.clone()),
            job: self.job.clone().unwrap_or_else(|| config.jenkins.job.clone()),
            threads,
            skip_existing: config.scan.skip_existing && !self.no_skip_existing,
        })
    }

    fn store_settings(&self, config: &Config) -> Result<StoreSettings> {
        let store = &config.store;
        let required = |flag: Option<&String>, file: Option<&String>, flag_name: &str, key: &str| {
            flag.or(file).cloned().with_context(|| {
                format!("No store {key} given (--db-{flag_name} or [store] {key})")
            })
        };

        Ok(StoreSettings {
            host: required(self.db_host.as_ref(), store.host.as_ref(), "host", "host")?,
            port: self.db_port.unwrap_or(store.port),
            database: required(
                self.db_name.as_ref(),
                store.database.as_ref(),
                "name",
                "database",
            )?,
            collection: required(
                self.db_coll.as_ref(),
                store.collection.as_ref(),
                "coll",
                "collection",
            )?,
            username: self.db_user.clone().or_else(|| store.username.clone()),
            password: self.db_pass.clone().or_else(|| store.password.clone()),
        })
    }
}

impl Cli {
    fn write_json(&self, value: &impl Serialize) -> Result<()> {
        let json_output = if self.pretty {
            serde_json::to_string_pretty(value)?
        } else {
            serde_json::to_string(value)?
        };

        if let Some(output_path) = &self.output {
            std::fs::write(output_path, json_output)
                .with_context(|| format!("Failed to write {}", output_path.display()))?;
            info!("Results written to: {}", output_path.display());
        } else {
            println!("{json_output}");
        }

        Ok(())
    }

    async fn execute_scan(&self, args: &ScanArgs) -> Result<()> {
        let config = Config::load(self.config.as_deref())?;
        let request = args.request(&config)?;
        info!(
            "Harvesting {} from {} with {} workers",
            request.job,
            request.jenkins_home.display(),
            request.threads
        );

        if args.dry_run {
            let progress = PhaseProgress::start_phase_1().finish_phase_1_start_phase_2();
            let sink = JsonSink::new();
            let summary = harvest::run(&request, &sink, progress.bar()).await?;
            let progress = progress.finish_phase_2_start_phase_3();

            let records = sink.records();
            self.write_json(&records)?;
            progress.finish_phase_3();
            print_summary(&summary, &records);
            return Ok(());
        }

        let settings = args.store_settings(&config)?;
        let progress = PhaseProgress::start_phase_1();
        let sink = MongoSink::connect(&settings)
            .await
            .with_context(|| format!("Cannot connect to {}:{}", settings.host, settings.port))?;
        let progress = progress.finish_phase_1_start_phase_2();

        let summary = harvest::run(&request, &sink, progress.bar()).await?;
        let progress = progress.finish_phase_2_start_phase_3();

        self.write_summary(&summary)?;
        progress.finish_phase_3();
        print_summary(&summary, &[]);
        Ok(())
    }

    fn write_summary(&self, summary: &RunSummary) -> Result<()> {
        if self.output.is_some() {
            self.write_json(summary)?;
        }
        Ok(())
    }

    fn execute_inspect(&self, build_dir: &Path) -> Result<()> {
        let build_dir = build_dir
            .canonicalize()
            .with_context(|| format!("Cannot open build directory {}", build_dir.display()))?;
        let dir = BuildDirectory::from_path(&build_dir)?;
        info!("Inspecting {} #{}", dir.job_name, dir.number);

        let normalized = analyze_build(&dir)?;
        for warning in &normalized.warnings {
            warn!("{warning}");
        }

        self.write_json(&normalized.record)
    }

    pub async fn execute(&self) -> Result<()> {
        match &self.command {
            Commands::Scan(args) => self.execute_scan(args).await,
            Commands::Inspect { build_dir } => self.execute_inspect(build_dir),
        }
    }
}
