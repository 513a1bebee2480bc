use std::path::PathBuf;

use crate::demo::{run_demo, run_eligibility, DemoArgs, EligibilityArgs};
use crate::server;
use admission_engine::error::AppError;
use clap::{Args, Parser, Subcommand};

#[derive(Parser, Debug)]
#[command(
    name = "Admission Engine",
    about = "Run the admission allocation engine or walk through it from the command line",
    version
)]
struct Cli {
    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Start the HTTP service (default command)
    Serve(ServeArgs),
    /// Run the apply, decide, publish, accept, and promote walkthrough in memory
    Demo(DemoArgs),
    /// Check a set of grades against a course requirement
    Eligibility(EligibilityArgs),
}

#[derive(Args, Debug, Default)]
pub(crate) struct ServeArgs {
    /// Override the configured host for the HTTP server
    #[arg(long)]
    pub(crate) host: Option<String>,
    /// Override the configured port for the HTTP server
    #[arg(long)]
    pub(crate) port: Option<u16>,
    /// JSON file with students and courses to load into the directory
    #[arg(long)]
    pub(crate) seed: Option<PathBuf>,
}

pub(crate) async fn run() -> Result<(), AppError> {
    let cli = Cli::parse();
    let command = cli
        .command
        .unwrap_or_else(|| Command::Serve(ServeArgs::default()));

    match command {
        Command::Serve(args) => server::run(args).await,
        Command::Demo(args) => run_demo(args),
        Command::Eligibility(args) => run_eligibility(args),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use admission_engine::workflows::admissions::Grade;

    #[test]
    fn serve_is_optional_and_accepts_seed() {
        let cli = Cli::try_parse_from(["admission-engine-api"]).expect("bare invocation parses");
        assert!(cli.command.is_none());

        let cli = Cli::try_parse_from([
            "admission-engine-api",
            "serve",
            "--port",
            "4100",
            "--seed",
            "catalog.json",
        ])
        .expect("serve parses");
        match cli.command {
            Some(Command::Serve(args)) => {
                assert_eq!(args.port, Some(4100));
                assert_eq!(args.seed, Some(PathBuf::from("catalog.json")));
            }
            other => panic!("expected serve, got {other:?}"),
        }
    }

    #[test]
    fn eligibility_parses_grade_lists() {
        let cli = Cli::try_parse_from([
            "admission-engine-api",
            "eligibility",
            "--subjects",
            "Math=A*, English=b",
            "--requires",
            "Math=B",
        ])
        .expect("eligibility parses");
        match cli.command {
            Some(Command::Eligibility(args)) => {
                assert_eq!(args.subjects.get("Math"), Some(&Grade::AStar));
                assert_eq!(args.subjects.get("English"), Some(&Grade::B));
                assert_eq!(
                    args.requires.and_then(|req| req.get("Math").copied()),
                    Some(Grade::B)
                );
            }
            other => panic!("expected eligibility, got {other:?}"),
        }
    }

    #[test]
    fn malformed_grade_list_is_rejected() {
        let result = Cli::try_parse_from([
            "admission-engine-api",
            "eligibility",
            "--subjects",
            "Math=Z",
        ]);
        assert!(result.is_err());
    }
}
