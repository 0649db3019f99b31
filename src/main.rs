use std::process;

use anyhow::{Result, anyhow};
use clap::builder::NonEmptyStringValueParser;
use clap::{Arg, ArgAction, ArgMatches, Command};
use tracing::debug;
use tracing_subscriber::EnvFilter;

use ask::command_router::CommandRouter;
use ask::config::{self, Config};

fn cli() -> Command {
    Command::new("ask")
        .about("Translate a natural-language request into a shell command")
        .long_about(
            "ask sends your request to a local or hosted AI model and prints the single \
             shell command it suggests. Nothing is executed.",
        )
        .arg(
            Arg::new("prompt")
                .help("What you want to do, in plain language")
                .required_unless_present("show-config")
                .value_parser(NonEmptyStringValueParser::new()),
        )
        .arg(
            Arg::new("model")
                .long("model")
                .short('m')
                .help("Provider to use, optionally with a model: ollama, grok:grok-3, ...")
                .value_name("PROVIDER[:MODEL]")
                .num_args(1),
        )
        .arg(
            Arg::new("verbose")
                .long("verbose")
                .short('v')
                .help("Log debug information to stderr")
                .action(ArgAction::SetTrue),
        )
        .arg(
            Arg::new("show-config")
                .long("show-config")
                .help("Show configuration information")
                .action(ArgAction::SetTrue),
        )
}

fn init_logging(verbose: bool) {
    let filter = if verbose {
        EnvFilter::new("ask=debug")
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"))
    };
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

async fn run(matches: &ArgMatches) -> Result<()> {
    let config = Config::load()?;

    if matches.get_flag("show-config") {
        let detected = config::default_provider(&config).await;
        println!("{}", config.describe(detected.as_deref()));
        return Ok(());
    }

    let prompt = matches
        .get_one::<String>("prompt")
        .ok_or_else(|| anyhow!("No prompt provided. Use 'ask --help' for usage information."))?;
    let model = matches.get_one::<String>("model").map(String::as_str);
    debug!("Prompt: {:?}, model: {:?}", prompt, model);

    let router = CommandRouter::new(config);
    let command = router.process_prompt(prompt, model).await?;
    println!("{command}");
    Ok(())
}

#[tokio::main(flavor = "current_thread")]
async fn main() {
    let matches = cli().get_matches();
    init_logging(matches.get_flag("verbose"));

    if let Err(err) = run(&matches).await {
        eprintln!("{err}");
        process::exit(1);
    }
}
