use clap::Parser;
use std::path::PathBuf;
use std::time::Duration;

pub mod events;
pub mod status;

pub use events::{ChannelListener, PlayerEvent};
pub use status::StatusDisplay;

/// Clip Player command line
#[derive(Debug, Parser)]
#[command(name = "clip-player")]
#[command(about = "An interactive command line audio player")]
#[command(version = "0.1.0")]
pub struct CliArgs {
    /// Play without an audio device (timing is still real time)
    #[arg(long)]
    pub null_output: bool,

    /// Repeat the current item when it finishes
    #[arg(long = "loop")]
    pub looping: bool,

    /// Do not continue with the next playlist entry after an item finishes
    #[arg(long)]
    pub no_auto_advance: bool,

    /// Initial volume (0-100), overrides the configured default
    #[arg(long, value_parser = clap::value_parser!(u8).range(0..=100))]
    pub volume: Option<u8>,

    /// Configuration file to use instead of the default location
    #[arg(long)]
    pub config: Option<PathBuf>,

    /// Print the available output devices and exit
    #[arg(long)]
    pub list_devices: bool,

    /// Audio files or directories to load into the playlist
    #[arg(required_unless_present = "list_devices")]
    pub paths: Vec<PathBuf>,
}

impl CliArgs {
    /// Paths with `~` expanded
    pub fn expanded_paths(&self) -> Vec<PathBuf> {
        self.paths
            .iter()
            .map(|path| expand_path(&path.to_string_lossy()))
            .collect()
    }
}

/// Interactive commands
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    /// Play the numbered playlist entry (1 based), or resume/restart the current one
    Play(Option<usize>),
    Pause,
    Resume,
    Toggle,
    Stop,
    Next,
    Prev,
    Loop(bool),
    Volume(u8),
    List,
    Status,
    Help,
    Quit,
}

/// Parse one line of interactive input
pub fn parse_command(input: &str) -> Result<Command, ParseError> {
    let args: Vec<&str> = input.split_whitespace().collect();
    let Some(&name) = args.first() else {
        return Err(ParseError::EmptyCommand);
    };

    match name {
        "play" | "p" => match args.get(1) {
            None => Ok(Command::Play(None)),
            Some(value) => match value.parse::<usize>() {
                Ok(number) if number >= 1 => Ok(Command::Play(Some(number))),
                _ => Err(ParseError::InvalidArgument {
                    argument: "track number".to_string(),
                    value: value.to_string(),
                    expected: "a number starting at 1".to_string(),
                }),
            },
        },
        "pause" => Ok(Command::Pause),
        "resume" => Ok(Command::Resume),
        "toggle" | "t" => Ok(Command::Toggle),
        "stop" | "s" => Ok(Command::Stop),
        "next" | "n" => Ok(Command::Next),
        "prev" | "previous" => Ok(Command::Prev),
        "loop" => match args.get(1) {
            Some(&"on") => Ok(Command::Loop(true)),
            Some(&"off") => Ok(Command::Loop(false)),
            Some(value) => Err(ParseError::InvalidArgument {
                argument: "loop mode".to_string(),
                value: value.to_string(),
                expected: "on or off".to_string(),
            }),
            None => Err(ParseError::MissingArgument {
                command: "loop".to_string(),
                argument: "on|off".to_string(),
            }),
        },
        "volume" | "vol" => {
            let Some(value) = args.get(1) else {
                return Err(ParseError::MissingArgument {
                    command: "volume".to_string(),
                    argument: "level".to_string(),
                });
            };
            match value.parse::<u8>() {
                Ok(level) if level <= 100 => Ok(Command::Volume(level)),
                Ok(_) => Err(ParseError::InvalidArgument {
                    argument: "volume level".to_string(),
                    value: value.to_string(),
                    expected: "0-100".to_string(),
                }),
                Err(_) => Err(ParseError::InvalidArgument {
                    argument: "volume level".to_string(),
                    value: value.to_string(),
                    expected: "number 0-100".to_string(),
                }),
            }
        }
        "list" | "ls" => Ok(Command::List),
        "status" => Ok(Command::Status),
        "help" | "?" => Ok(Command::Help),
        "quit" | "exit" | "q" => Ok(Command::Quit),
        _ => Err(ParseError::UnknownCommand {
            command: name.to_string(),
        }),
    }
}

/// Expand tilde (~) in path to home directory
pub fn expand_path(path: &str) -> PathBuf {
    if let Some(rest) = path.strip_prefix("~/") {
        if let Some(home_dir) = dirs::home_dir() {
            return home_dir.join(rest);
        }
    } else if path == "~" {
        if let Some(home_dir) = dirs::home_dir() {
            return home_dir;
        }
    }
    PathBuf::from(path)
}

/// Format duration as MM:SS
pub fn format_duration(duration: Duration) -> String {
    let total_seconds = duration.as_secs();
    format!("{:02}:{:02}", total_seconds / 60, total_seconds % 60)
}

pub fn display_help() {
    println!("Clip Player - Available Commands:");
    println!();
    println!("Playback Control:");
    println!("  play [n]        - Play entry n, or resume the paused item");
    println!("  pause           - Pause playback");
    println!("  resume          - Resume from the paused position");
    println!("  toggle          - Pause or resume");
    println!("  stop            - Stop playback and reset position");
    println!("  next            - Next entry");
    println!("  prev            - Previous entry");
    println!();
    println!("Settings:");
    println!("  loop on|off     - Repeat the current item");
    println!("  volume <0-100>  - Set volume level");
    println!();
    println!("Information:");
    println!("  list            - Show the playlist");
    println!("  status          - Show current player status");
    println!();
    println!("General:");
    println!("  help            - Show this help message");
    println!("  quit, exit      - Exit the player");
}

/// Command parsing errors
#[derive(Debug, thiserror::Error)]
pub enum ParseError {
    #[error("Empty command")]
    EmptyCommand,

    #[error("Unknown command: {command}")]
    UnknownCommand { command: String },

    #[error("Missing argument for {command}: {argument}")]
    MissingArgument { command: String, argument: String },

    #[error("Invalid argument {argument}: got '{value}', expected {expected}")]
    InvalidArgument {
        argument: String,
        value: String,
        expected: String,
    },
}

#[cfg(test)]
mod tests;
