use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

use anyhow::{anyhow, bail, Context, Result};
use crossbeam_channel::Receiver;
use loader::{
    AtlasLoader, Drain, FileAtlasLoader, ImageFileDecoder, MemoryFrameCache, MemoryTextureCache,
    ResourceNaming, ShutdownReport, StatsSnapshot,
};
use loaderconfig::LoaderConfig;
use scheduler::FrameScheduler;
use serde::Serialize;
use tracing_subscriber::EnvFilter;

use crate::cli::PreloadArgs;
use crate::paths::AppPaths;

pub fn initialise_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();
}

/// Configuration file in effect and whether it was read from disk.
#[derive(Debug, Clone)]
pub struct ResolvedConfig {
    pub path: PathBuf,
    pub from_file: bool,
    pub config: LoaderConfig,
}

pub fn resolve_config(explicit: Option<&Path>) -> Result<ResolvedConfig> {
    if let Some(path) = explicit {
        let config = LoaderConfig::load(path)
            .with_context(|| format!("failed to load config {}", path.display()))?;
        return Ok(ResolvedConfig {
            path: path.to_path_buf(),
            from_file: true,
            config,
        });
    }

    let paths = AppPaths::discover()?;
    let path = paths.config_file();
    let from_file = path.is_file();
    let config = LoaderConfig::load_or_default(&path)
        .with_context(|| format!("failed to load config {}", path.display()))?;
    tracing::debug!(path = %path.display(), from_file, "resolved loader configuration");
    Ok(ResolvedConfig {
        path,
        from_file,
        config,
    })
}

#[derive(Debug, Clone, Serialize)]
pub struct RejectedManifest {
    pub name: String,
    pub reason: String,
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct PassSummary {
    pub pass: u32,
    pub submitted: usize,
    pub completed: Vec<String>,
    pub incomplete: Vec<String>,
    pub frames: u64,
    pub elapsed_ms: u64,
    pub timed_out: bool,
}

#[derive(Debug, Clone, Serialize)]
pub struct PreloadSummary {
    pub manifests: Vec<String>,
    pub rejected: Vec<RejectedManifest>,
    pub passes: Vec<PassSummary>,
    pub textures: usize,
    pub resident_bytes: u64,
    pub sheets: Vec<String>,
    pub stats: StatsSnapshot,
    pub shutdown: ShutdownReport,
}

impl PreloadSummary {
    pub fn incomplete(&self) -> usize {
        self.passes.iter().map(|pass| pass.incomplete.len()).sum()
    }

    pub fn timed_out(&self) -> bool {
        self.passes.iter().any(|pass| pass.timed_out)
    }
}

pub fn preload(config_path: Option<&Path>, args: PreloadArgs) -> Result<()> {
    let resolved = resolve_config(config_path)?;
    let mut config = resolved.config;
    if let Some(mode) = args.fast_path {
        config.fast_path = mode;
    }

    let naming = ResourceNaming::from_config(&config.naming);
    let manifests = collect_manifests(&args.paths, &naming)?;
    if manifests.is_empty() {
        bail!(
            "no manifests ending in '{}' found in the given paths",
            naming.manifest_suffix()
        );
    }
    tracing::info!(
        manifests = manifests.len(),
        passes = args.passes,
        fast_path = ?config.fast_path,
        "preloading sprite sheets"
    );

    let summary = run_preload(&config, &manifests, &args)?;
    if args.json {
        let json =
            serde_json::to_string_pretty(&summary).context("failed to serialise summary")?;
        println!("{json}");
    } else {
        print_summary(&summary);
    }

    if summary.timed_out() {
        bail!("preload timed out after {:?}", args.timeout);
    }
    let failed = summary.incomplete() + summary.rejected.len();
    if failed > 0 {
        bail!("{failed} sprite sheet load(s) did not complete");
    }
    Ok(())
}

fn run_preload(
    config: &LoaderConfig,
    manifests: &[String],
    args: &PreloadArgs,
) -> Result<PreloadSummary> {
    let scheduler = Arc::new(FrameScheduler::<Drain>::new());
    let mut loader: FileAtlasLoader = AtlasLoader::start(
        config,
        ImageFileDecoder::new(PathBuf::new()),
        MemoryTextureCache::new(),
        MemoryFrameCache::with_manifest_root(PathBuf::new()),
        Arc::clone(&scheduler),
    )
    .context("failed to start sprite sheet loader")?;

    let frame = Duration::from_millis(args.frame_ms);
    let mut rejected = Vec::new();
    let mut passes = Vec::new();

    for pass in 1..=args.passes {
        let (tx, rx) = crossbeam_channel::unbounded::<String>();
        let mut accepted = Vec::new();
        for name in manifests {
            let tx = tx.clone();
            match loader.submit(name, move |done| {
                let _ = tx.send(done.to_string());
            }) {
                Ok(()) => accepted.push(name.clone()),
                Err(err) => {
                    tracing::warn!(%name, error = %err, "skipping manifest");
                    if pass == 1 {
                        rejected.push(RejectedManifest {
                            name: name.clone(),
                            reason: err.to_string(),
                        });
                    }
                }
            }
        }

        let summary = drive_pass(
            &mut loader,
            &scheduler,
            &rx,
            pass,
            accepted,
            frame,
            args.timeout,
        );
        tracing::info!(
            pass,
            completed = summary.completed.len(),
            incomplete = summary.incomplete.len(),
            frames = summary.frames,
            "pass finished"
        );
        let timed_out = summary.timed_out;
        passes.push(summary);
        if timed_out {
            break;
        }
    }

    let stats = loader.stats();
    let textures = loader.textures().len();
    let resident_bytes = loader.textures().resident_bytes();
    let sheets = loader.frames().manifests();
    let shutdown = loader
        .shutdown()
        .context("sprite sheet loader did not shut down cleanly")?;

    Ok(PreloadSummary {
        manifests: manifests.to_vec(),
        rejected,
        passes,
        textures,
        resident_bytes,
        sheets,
        stats,
        shutdown,
    })
}

/// Runs the simulated host frame loop until the loader is idle or `timeout`
/// elapses.
fn drive_pass(
    loader: &mut FileAtlasLoader,
    scheduler: &FrameScheduler<Drain>,
    completions: &Receiver<String>,
    pass: u32,
    accepted: Vec<String>,
    frame: Duration,
    timeout: Duration,
) -> PassSummary {
    let started = Instant::now();
    let deadline = started + timeout;
    let mut summary = PassSummary {
        pass,
        submitted: accepted.len(),
        ..PassSummary::default()
    };

    while !loader.is_idle() {
        let tick = Instant::now();
        if tick >= deadline {
            tracing::warn!(pass, backlog = ?loader.backlog(), "pass did not settle before the timeout");
            summary.timed_out = true;
            break;
        }

        for drain in scheduler.due(tick) {
            loader.poll(drain);
        }
        summary.frames += 1;
        summary.completed.extend(completions.try_iter());

        let spent = tick.elapsed();
        if spent < frame {
            thread::sleep(frame - spent);
        }
    }
    summary.completed.extend(completions.try_iter());

    let mut outstanding = accepted;
    for name in &summary.completed {
        if let Some(index) = outstanding.iter().position(|pending| pending == name) {
            outstanding.swap_remove(index);
        }
    }
    outstanding.sort();
    summary.incomplete = outstanding;
    summary.elapsed_ms = u64::try_from(started.elapsed().as_millis()).unwrap_or(u64::MAX);
    summary
}

/// Expands the given paths into manifest names. Directories contribute their
/// immediate entries carrying the manifest suffix, sorted by name.
pub fn collect_manifests(paths: &[PathBuf], naming: &ResourceNaming) -> Result<Vec<String>> {
    let mut manifests = Vec::new();
    for path in paths {
        if path.is_dir() {
            let mut found = Vec::new();
            let entries = fs::read_dir(path)
                .with_context(|| format!("failed to read directory {}", path.display()))?;
            for entry in entries {
                let entry = entry
                    .with_context(|| format!("failed to read entry in {}", path.display()))?;
                let entry_path = entry.path();
                if !entry_path.is_file() {
                    continue;
                }
                let name = path_to_name(&entry_path)?;
                if naming.is_manifest(&name) {
                    found.push(name);
                }
            }
            found.sort();
            tracing::debug!(dir = %path.display(), manifests = found.len(), "scanned directory");
            manifests.extend(found);
        } else {
            manifests.push(path_to_name(path)?);
        }
    }
    Ok(manifests)
}

fn path_to_name(path: &Path) -> Result<String> {
    path.to_str()
        .map(str::to_string)
        .ok_or_else(|| anyhow!("path {} is not valid UTF-8", path.display()))
}

fn print_summary(summary: &PreloadSummary) {
    for pass in &summary.passes {
        println!(
            "Pass {}: {}/{} sprite sheets loaded in {} frames ({} ms){}",
            pass.pass,
            pass.completed.len(),
            pass.submitted,
            pass.frames,
            pass.elapsed_ms,
            if pass.timed_out { " [timed out]" } else { "" }
        );
        for name in &pass.completed {
            println!("  {:<10} {name}", "loaded");
        }
        for name in &pass.incomplete {
            println!("  {:<10} {name}", "failed");
        }
    }
    for rejected in &summary.rejected {
        println!("  {:<10} {} ({})", "rejected", rejected.name, rejected.reason);
    }

    let stats = &summary.stats;
    println!(
        "Textures resident: {} ({} bytes); sheets registered: {}",
        summary.textures,
        summary.resident_bytes,
        summary.sheets.len()
    );
    println!(
        "Decoded {} (failed {}), uploaded {} (failed {}), registered {} (failed {}), fast-path hits {}",
        stats.decoded,
        stats.decode_failures,
        stats.uploaded,
        stats.upload_failures,
        stats.registered,
        stats.register_failures,
        stats.fast_path_hits
    );
    if summary.shutdown.discarded() > 0 {
        println!(
            "Discarded on shutdown: {} item(s)",
            summary.shutdown.discarded()
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn collects_manifests_from_directories_and_files() {
        let dir = TempDir::new().unwrap();
        fs::write(dir.path().join("b.plist"), "").unwrap();
        fs::write(dir.path().join("a.plist"), "").unwrap();
        fs::write(dir.path().join("a.png"), "").unwrap();
        fs::create_dir(dir.path().join("nested.plist")).unwrap();
        let extra = PathBuf::from("elsewhere/c.plist");

        let naming = ResourceNaming::default();
        let manifests =
            collect_manifests(&[dir.path().to_path_buf(), extra], &naming).unwrap();

        let expected: Vec<String> = ["a.plist", "b.plist"]
            .iter()
            .map(|name| dir.path().join(name).to_str().unwrap().to_string())
            .chain(std::iter::once("elsewhere/c.plist".to_string()))
            .collect();
        assert_eq!(manifests, expected);
    }

    #[test]
    fn explicit_config_must_exist() {
        let dir = TempDir::new().unwrap();
        let missing = dir.path().join("missing.toml");
        assert!(resolve_config(Some(&missing)).is_err());

        let present = dir.path().join("loader.toml");
        fs::write(&present, "version = 1\nfast_path = \"duplicate\"\n").unwrap();
        let resolved = resolve_config(Some(&present)).unwrap();
        assert!(resolved.from_file);
        assert_eq!(
            resolved.config.fast_path,
            loaderconfig::FastPathMode::Duplicate
        );
    }
}
