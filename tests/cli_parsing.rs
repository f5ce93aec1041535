use cartographer::cli::commands::run::RunCommands;
use cartographer::cli::{Cli, Commands};
use clap::Parser;

#[test]
fn test_parse_tick_with_global_flags() {
    let cli = Cli::try_parse_from(["cartographer", "tick", "--json", "--config", "/etc/cartographer.yaml"]).unwrap();
    assert!(matches!(cli.command, Commands::Tick));
    assert!(cli.json);
    assert_eq!(cli.config.unwrap().to_str(), Some("/etc/cartographer.yaml"));
}

#[test]
fn test_parse_process_requires_principal() {
    let cli = Cli::try_parse_from(["cartographer", "process", "3f2a9c1e", "--principal", "alice"]).unwrap();
    match cli.command {
        Commands::Process { run_id, principal } => {
            assert_eq!(run_id, "3f2a9c1e");
            assert_eq!(principal, "alice");
        }
        _ => panic!("Wrong top-level command"),
    }

    assert!(Cli::try_parse_from(["cartographer", "process", "3f2a9c1e"]).is_err());
}

#[test]
fn test_parse_daemon_interval() {
    let cli = Cli::try_parse_from(["cartographer", "daemon", "--interval-secs", "15"]).unwrap();
    assert!(matches!(cli.command, Commands::Daemon { interval_secs: Some(15) }));

    let cli = Cli::try_parse_from(["cartographer", "daemon"]).unwrap();
    assert!(matches!(cli.command, Commands::Daemon { interval_secs: None }));
}

#[test]
fn test_parse_run_create() {
    let cli = Cli::try_parse_from([
        "cartographer",
        "run",
        "create",
        "--owner",
        "alice",
        "--target-steps",
        "25",
        "--strategy",
        "cycling",
        "--early-stop",
        "--no-auto-select",
    ])
    .unwrap();

    match cli.command {
        Commands::Run(args) => match args.command {
            RunCommands::Create { owner, target_steps, rounds, strategy, early_stop, no_auto_select, research_mode, .. } => {
                assert_eq!(owner, "alice");
                assert_eq!(target_steps, 25);
                assert_eq!(rounds, 3);
                assert_eq!(strategy, "cycling");
                assert!(early_stop);
                assert!(no_auto_select);
                assert!(!research_mode);
            }
            _ => panic!("Wrong run command"),
        },
        _ => panic!("Wrong top-level command"),
    }
}

#[test]
fn test_parse_run_list_and_events() {
    let cli = Cli::try_parse_from(["cartographer", "run", "list", "--status", "failed", "--limit", "5"]).unwrap();
    match cli.command {
        Commands::Run(args) => match args.command {
            RunCommands::List { status, owner, limit } => {
                assert_eq!(status.as_deref(), Some("failed"));
                assert!(owner.is_none());
                assert_eq!(limit, 5);
            }
            _ => panic!("Wrong run command"),
        },
        _ => panic!("Wrong top-level command"),
    }

    let cli = Cli::try_parse_from(["cartographer", "run", "events", "abc123", "-l", "10"]).unwrap();
    assert!(matches!(
        cli.command,
        Commands::Run(args) if matches!(args.command, RunCommands::Events { limit: Some(10), .. })
    ));
}
