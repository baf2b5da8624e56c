use super::*;
use clap::Parser;
use std::path::PathBuf;
use std::time::Duration;

#[test]
fn test_parse_command_play() {
    assert_eq!(parse_command("play").unwrap(), Command::Play(None));
    assert_eq!(parse_command("play 3").unwrap(), Command::Play(Some(3)));
    assert_eq!(parse_command("  p   2 ").unwrap(), Command::Play(Some(2)));

    match parse_command("play 0") {
        Err(ParseError::InvalidArgument { value, .. }) => assert_eq!(value, "0"),
        other => panic!("Expected InvalidArgument, got {:?}", other),
    }
    assert!(parse_command("play first").is_err());
}

#[test]
fn test_parse_command_basic_controls() {
    assert_eq!(parse_command("pause").unwrap(), Command::Pause);
    assert_eq!(parse_command("resume").unwrap(), Command::Resume);
    assert_eq!(parse_command("toggle").unwrap(), Command::Toggle);
    assert_eq!(parse_command("stop").unwrap(), Command::Stop);
    assert_eq!(parse_command("next").unwrap(), Command::Next);
    assert_eq!(parse_command("prev").unwrap(), Command::Prev);
    assert_eq!(parse_command("previous").unwrap(), Command::Prev);
    assert_eq!(parse_command("list").unwrap(), Command::List);
    assert_eq!(parse_command("status").unwrap(), Command::Status);
    assert_eq!(parse_command("help").unwrap(), Command::Help);
    assert_eq!(parse_command("exit").unwrap(), Command::Quit);
    assert_eq!(parse_command("quit").unwrap(), Command::Quit);
}

#[test]
fn test_parse_command_loop() {
    assert_eq!(parse_command("loop on").unwrap(), Command::Loop(true));
    assert_eq!(parse_command("loop off").unwrap(), Command::Loop(false));

    match parse_command("loop") {
        Err(ParseError::MissingArgument { command, .. }) => assert_eq!(command, "loop"),
        other => panic!("Expected MissingArgument, got {:?}", other),
    }
    assert!(matches!(
        parse_command("loop maybe"),
        Err(ParseError::InvalidArgument { .. })
    ));
}

#[test]
fn test_parse_command_volume() {
    assert_eq!(parse_command("volume 0").unwrap(), Command::Volume(0));
    assert_eq!(parse_command("volume 75").unwrap(), Command::Volume(75));
    assert_eq!(parse_command("vol 100").unwrap(), Command::Volume(100));

    match parse_command("volume 101") {
        Err(ParseError::InvalidArgument { expected, .. }) => assert_eq!(expected, "0-100"),
        other => panic!("Expected InvalidArgument, got {:?}", other),
    }
    match parse_command("volume loud") {
        Err(ParseError::InvalidArgument { expected, .. }) => assert_eq!(expected, "number 0-100"),
        other => panic!("Expected InvalidArgument, got {:?}", other),
    }
    assert!(matches!(
        parse_command("volume"),
        Err(ParseError::MissingArgument { .. })
    ));
}

#[test]
fn test_parse_command_errors() {
    assert!(matches!(parse_command(""), Err(ParseError::EmptyCommand)));
    assert!(matches!(parse_command("   "), Err(ParseError::EmptyCommand)));

    match parse_command("seek 1:30") {
        Err(ParseError::UnknownCommand { command }) => assert_eq!(command, "seek"),
        other => panic!("Expected UnknownCommand, got {:?}", other),
    }
}

#[test]
fn test_parse_error_display() {
    let error = ParseError::MissingArgument {
        command: "volume".to_string(),
        argument: "level".to_string(),
    };
    assert_eq!(error.to_string(), "Missing argument for volume: level");

    let error = ParseError::UnknownCommand {
        command: "dance".to_string(),
    };
    assert_eq!(error.to_string(), "Unknown command: dance");
}

#[test]
fn test_format_duration() {
    assert_eq!(format_duration(Duration::from_secs(0)), "00:00");
    assert_eq!(format_duration(Duration::from_secs(65)), "01:05");
    assert_eq!(format_duration(Duration::from_millis(3_599_900)), "59:59");
}

#[test]
fn test_expand_path() {
    let expanded = expand_path("~/Music/song.flac");
    assert!(!expanded.to_string_lossy().starts_with('~'));
    assert!(expanded.ends_with("Music/song.flac"));

    assert_ne!(expand_path("~").to_string_lossy(), "~");
    assert_eq!(expand_path("/absolute/path"), PathBuf::from("/absolute/path"));
    assert_eq!(expand_path("relative/path"), PathBuf::from("relative/path"));
}

#[test]
fn test_cli_args() {
    let args = CliArgs::try_parse_from([
        "clip-player",
        "--null-output",
        "--loop",
        "--volume",
        "40",
        "a.flac",
        "b.wav",
    ])
    .unwrap();

    assert!(args.null_output);
    assert!(args.looping);
    assert!(!args.no_auto_advance);
    assert_eq!(args.volume, Some(40));
    assert_eq!(args.paths, vec![PathBuf::from("a.flac"), PathBuf::from("b.wav")]);

    assert!(!args.list_devices);

    assert!(CliArgs::try_parse_from(["clip-player"]).is_err());
    let listing = CliArgs::try_parse_from(["clip-player", "--list-devices"]).unwrap();
    assert!(listing.list_devices);
    assert!(listing.paths.is_empty());
    assert!(CliArgs::try_parse_from(["clip-player", "--volume", "150", "a.flac"]).is_err());
}
