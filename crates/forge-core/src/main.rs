use anyhow::Context;
use clap::{value_parser, Arg, ArgAction, ArgMatches, Command};
use forge_core::{ForgeConfig, GateOutcome, PipelineController, ProjectResult};
use std::path::{Path, PathBuf};
use std::process::ExitCode;

const SUMMARY_FILE: &str = "project-summary.json";

fn cli() -> Command {
    let config_arg = Arg::new("config")
        .long("config")
        .short('c')
        .value_parser(value_parser!(PathBuf))
        .help("TOML configuration file");

    Command::new("forge")
        .version(forge_core::VERSION)
        .about("Quality-gated project generation over a generative text model")
        .subcommand_required(true)
        .arg_required_else_help(true)
        .subcommand(
            Command::new("generate")
                .about("Generate a project from a natural-language request (exits 2 on a degraded accept)")
                .arg(Arg::new("request").required(true).help("What to build"))
                .arg(config_arg.clone())
                .arg(
                    Arg::new("output")
                        .long("output")
                        .short('o')
                        .default_value("generated")
                        .value_parser(value_parser!(PathBuf))
                        .help("Directory receiving <project_id>/<category>/..."),
                )
                .arg(
                    Arg::new("max-iterations")
                        .long("max-iterations")
                        .value_parser(value_parser!(u32))
                        .help("Generate/review cycles for the code stage"),
                )
                .arg(
                    Arg::new("threshold")
                        .long("threshold")
                        .value_parser(value_parser!(f64))
                        .help("Acceptance threshold, 0-100"),
                )
                .arg(
                    Arg::new("log-json")
                        .long("log-json")
                        .action(ArgAction::SetTrue)
                        .help("Emit logs as JSON lines"),
                ),
        )
        .subcommand(
            Command::new("show-config")
                .about("Print the effective configuration as TOML")
                .arg(config_arg),
        )
}

fn init_tracing(json: bool) {
    use tracing_subscriber::{fmt, prelude::*, EnvFilter};

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let registry = tracing_subscriber::registry().with(filter);
    if json {
        registry.with(fmt::layer().json().with_target(false)).init();
    } else {
        registry.with(fmt::layer().with_target(false)).init();
    }
}

/// Defaults, then the optional file, then the environment, then CLI flags
fn load_config(args: &ArgMatches) -> anyhow::Result<ForgeConfig> {
    load_config_with(args, |var| std::env::var(var).ok())
}

/// Defaults, then the config file, then `env`, then command-line flags
fn load_config_with<F>(args: &ArgMatches, env: F) -> anyhow::Result<ForgeConfig>
where
    F: Fn(&str) -> Option<String>,
{
    let mut config = match args.get_one::<PathBuf>("config") {
        Some(path) => {
            let text = std::fs::read_to_string(path)
                .with_context(|| format!("reading config file {}", path.display()))?;
            ForgeConfig::from_toml_str(&text).with_context(|| format!("parsing {}", path.display()))?
        }
        None => ForgeConfig::default(),
    }
    .apply_env_from(env)?;

    if let Ok(Some(n)) = args.try_get_one::<u32>("max-iterations") {
        config.max_iterations = *n;
    }
    if let Ok(Some(t)) = args.try_get_one::<f64>("threshold") {
        config.acceptance_threshold = *t;
    }
    config.validate()?;
    Ok(config)
}

/// Write the projection and summary under `root/<project_id>/`
fn write_project(root: &Path, result: &ProjectResult) -> anyhow::Result<PathBuf> {
    let dir = root.join(result.project_id.to_string());
    for (category, files) in result.projection() {
        for (path, content) in files {
            let target = dir.join(category.dir()).join(&path);
            if let Some(parent) = target.parent() {
                std::fs::create_dir_all(parent)
                    .with_context(|| format!("creating {}", parent.display()))?;
            }
            std::fs::write(&target, content).with_context(|| format!("writing {}", target.display()))?;
        }
    }
    std::fs::create_dir_all(&dir)?;
    let summary = serde_json::to_string_pretty(&result.summary())?;
    std::fs::write(dir.join(SUMMARY_FILE), summary)?;
    Ok(dir)
}

async fn generate(args: &ArgMatches) -> anyhow::Result<ExitCode> {
    let config = load_config(args)?;
    let request = args
        .get_one::<String>("request")
        .context("missing request")?;
    let output = args
        .get_one::<PathBuf>("output")
        .cloned()
        .unwrap_or_else(|| PathBuf::from("generated"));

    let controller = PipelineController::from_config(config)?;
    let result = controller.run(request).await?;
    let dir = write_project(&output, &result)?;

    println!("Project: {}", result.project_id);
    println!("Requirement: {}", result.requirement.name);
    println!("Outcome: {} after {} iteration(s)", result.outcome, result.gated.history().len());
    if let Some(verdict) = result.gated.final_verdict() {
        println!("Final score: {:.1}/100", verdict.score());
    }
    for (stage, failure) in result.fan_out_failures() {
        println!("  {stage} failed: {failure}");
    }
    println!("Written to {}", dir.display());

    Ok(match result.outcome {
        GateOutcome::Accepted => ExitCode::SUCCESS,
        GateOutcome::Exhausted => ExitCode::from(2),
    })
}

#[tokio::main]
async fn main() -> anyhow::Result<ExitCode> {
    let matches = cli().get_matches();

    match matches.subcommand() {
        Some(("generate", args)) => {
            init_tracing(args.get_flag("log-json"));
            generate(args).await
        }
        Some(("show-config", args)) => {
            let config = load_config(args)?;
            print!("{}", config.to_toml_string()?);
            Ok(ExitCode::SUCCESS)
        }
        _ => Ok(ExitCode::FAILURE),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use forge_artifact::StageKind;
    use forge_core::config::ENV_MAX_ITERATIONS;
    use forge_core::REVIEW_REPORT_FILE;
    use forge_test_utils::{files_json, requirement_json, stage_marker, ScriptedBackend, ScriptedGate};
    use std::sync::Arc;

    #[test]
    fn generate_flags_parse() {
        let matches = cli()
            .try_get_matches_from([
                "forge",
                "generate",
                "build a calculator",
                "--max-iterations",
                "5",
                "--threshold",
                "80",
                "--log-json",
            ])
            .unwrap();
        let (name, args) = matches.subcommand().unwrap();
        assert_eq!(name, "generate");
        assert_eq!(args.get_one::<u32>("max-iterations"), Some(&5));
        assert_eq!(args.get_one::<f64>("threshold"), Some(&80.0));
        assert!(args.get_flag("log-json"));
        assert_eq!(args.get_one::<PathBuf>("output"), Some(&PathBuf::from("generated")));
    }

    #[test]
    fn config_file_and_flags_layer() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("forge.toml");
        std::fs::write(&path, "max_iterations = 4\nacceptance_threshold = 60.0\n").unwrap();
        let matches = cli()
            .try_get_matches_from([
                "forge",
                "generate",
                "x",
                "--config",
                path.to_str().unwrap(),
                "--threshold",
                "75",
            ])
            .unwrap();
        let (_, args) = matches.subcommand().unwrap();
        let config = load_config_with(args, |_| None).unwrap();
        assert_eq!(config.acceptance_threshold, 75.0);
        assert_eq!(config.max_iterations, 4);

        let config =
            load_config_with(args, |var| (var == ENV_MAX_ITERATIONS).then(|| "6".to_string())).unwrap();
        assert_eq!(config.max_iterations, 6);
        assert_eq!(config.acceptance_threshold, 75.0);
    }

    #[test]
    fn invalid_threshold_flag_is_rejected() {
        let matches = cli()
            .try_get_matches_from(["forge", "generate", "x", "--threshold", "150"])
            .unwrap();
        let (_, args) = matches.subcommand().unwrap();
        assert!(load_config_with(args, |_| None).is_err());
    }

    #[tokio::test]
    async fn project_is_written_by_category() {
        let mut backend = ScriptedBackend::new()
            .reply_when(stage_marker(StageKind::Requirements), requirement_json("Calculator App"))
            .reply_when(stage_marker(StageKind::Code), files_json("calc", &[("main.py", "print(1)")]))
            .reply_when(stage_marker(StageKind::Tests), files_json("calc", &[("test_main.py", "assert True")]));
        for kind in [StageKind::Docs, StageKind::Deployment, StageKind::Ui] {
            backend = backend.reply_when(stage_marker(kind), files_json("calc", &[("notes/readme.md", "# x")]));
        }
        let controller = PipelineController::new(
            ForgeConfig::default().with_retry_policy(forge_model::RetryPolicy::immediate()),
            Arc::new(backend.repeat_last()),
            Arc::new(ScriptedGate::new([90.0])),
        )
        .unwrap();
        let result = controller.run("build a calculator").await.unwrap();

        let out = tempfile::tempdir().unwrap();
        let dir = write_project(out.path(), &result).unwrap();
        assert!(dir.join("src/main.py").is_file());
        assert!(dir.join("tests/test_main.py").is_file());
        assert!(dir.join("deployment/notes/readme.md").is_file());
        assert!(dir.join("docs").join(REVIEW_REPORT_FILE).is_file());

        let summary: serde_json::Value =
            serde_json::from_str(&std::fs::read_to_string(dir.join(SUMMARY_FILE)).unwrap()).unwrap();
        assert_eq!(summary["outcome"], "accepted");
        assert_eq!(summary["requirement_name"], "Calculator App");
    }
}
