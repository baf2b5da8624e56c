use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use clap::Parser;
use log::{debug, error, info, log, warn};
use tokio::sync::mpsc::UnboundedReceiver;

use clip_player::audio::{
    AudioOutput, CpalOutput, EngineSettings, FileAudioSource, NullOutput, OutputSettings, PlaybackEngine,
};
use clip_player::cli::{self, ChannelListener, CliArgs, Command, PlayerEvent, StatusDisplay};
use clip_player::config::{ConfigManager, PlayerConfig};
use clip_player::error::{PlayerError, QueueError};
use clip_player::logging::AudioLogger;
use clip_player::models::PlaybackState;
use clip_player::player::Player;
use clip_player::queue::Playlist;

/// Wires the player to the terminal: reads commands, prints notifications
pub struct AppController {
    player: Arc<Player>,
    /// `None` when the configuration file could not be read; settings are
    /// then not written back so a broken file is left for the user to fix
    config_manager: Option<ConfigManager>,
    events: Option<UnboundedReceiver<PlayerEvent>>,
}

impl AppController {
    pub fn new(args: &CliArgs) -> Result<Self, PlayerError> {
        let config_manager = match &args.config {
            Some(path) => ConfigManager::at_path(cli::expand_path(&path.to_string_lossy())),
            None => ConfigManager::new(),
        };
        let config_manager = match config_manager {
            Ok(manager) => Some(manager),
            Err(e) => {
                warn!("Using default configuration: {}", e);
                StatusDisplay::display_error(&PlayerError::Config(e));
                None
            }
        };
        let mut config = config_manager
            .as_ref()
            .map(|manager| manager.get_config().clone())
            .unwrap_or_else(PlayerConfig::default);

        if let Some(level) = args.volume {
            config.default_volume = level as f32 / 100.0;
        }
        if args.looping {
            config.loop_enabled = true;
        }
        if args.no_auto_advance {
            config.auto_advance = false;
        }

        let playlist = Playlist::from_paths(&args.expanded_paths())?;
        info!("Loaded {} playlist entries", playlist.len());

        let output: Arc<dyn AudioOutput> = if args.null_output {
            Arc::new(NullOutput::new(true))
        } else {
            Arc::new(CpalOutput::new(OutputSettings::from(&config)))
        };

        let (listener, events) = ChannelListener::channel();
        let engine = PlaybackEngine::new(
            Arc::new(FileAudioSource::new()),
            output,
            Arc::new(listener),
            EngineSettings::from(&config),
        );
        let player = Player::new(engine, playlist, config.auto_advance);

        Ok(Self {
            player: Arc::new(player),
            config_manager,
            events: Some(events),
        })
    }

    /// Execute a single command
    pub fn execute_command(&mut self, command: Command) -> Result<(), PlayerError> {
        match command {
            Command::Play(Some(number)) => {
                self.player.play_or_resume_index(number - 1)?;
            }
            Command::Play(None) => match self.player.engine().state() {
                PlaybackState::Paused { .. } => self.player.resume(),
                PlaybackState::Playing(item) => println!("Already playing: {}", item.display_name()),
                PlaybackState::Idle | PlaybackState::Stopped => {
                    if self.player.playlist().is_empty() {
                        return Err(PlayerError::Queue(QueueError::EmptyQueue));
                    }
                    self.player.play_index(0)?;
                }
            },
            Command::Pause => self.player.pause(),
            Command::Resume => self.player.resume(),
            Command::Toggle => self.player.toggle(),
            Command::Stop => self.player.stop(),
            Command::Next => {
                if self.player.next()?.is_none() {
                    println!("End of playlist");
                }
            }
            Command::Prev => {
                if self.player.previous()?.is_none() {
                    println!("Start of playlist");
                }
            }
            Command::Loop(enabled) => {
                self.player.set_loop(enabled);
                if let Some(manager) = self.config_manager.as_mut() {
                    manager.set_loop_enabled(enabled)?;
                }
                println!("OK: Loop {}", if enabled { "on" } else { "off" });
            }
            Command::Volume(level) => {
                let volume = self.player.set_volume(level as f32 / 100.0);
                if let Some(manager) = self.config_manager.as_mut() {
                    manager.set_volume(volume)?;
                }
                println!("OK: Volume {}%", level);
            }
            Command::List => {
                let current = self.player.current_item().and(self.player.current_index());
                for line in StatusDisplay::render_playlist(self.player.playlist(), current) {
                    println!("{}", line);
                }
            }
            Command::Status => StatusDisplay::display_full_status(&self.player.status()),
            Command::Help => cli::display_help(),
            Command::Quit => {}
        }

        Ok(())
    }

    fn handle_event(&self, event: PlayerEvent) {
        match event {
            PlayerEvent::StateChanged { state, position } => {
                println!("{}", StatusDisplay::describe_state(&state, position));
            }
            PlayerEvent::Error { item, message } => {
                eprintln!("✗ {}: {}", item.display_name(), message);
            }
        }
    }

    fn handle_error(&self, error: &PlayerError) {
        log!(error.severity().log_level(), "{}", error);
        StatusDisplay::display_error(error);
    }

    /// Run interactive mode
    pub async fn run_interactive_mode(&mut self) -> Result<(), PlayerError> {
        println!("Clip Player v0.1.0 - {} entries loaded", self.player.playlist().len());
        println!("Type 'help' for available commands, 'exit' or 'quit' to quit.");
        println!();

        let interrupted = Arc::new(AtomicBool::new(false));
        {
            let interrupted = interrupted.clone();
            let player = self.player.clone();
            let handler = ctrlc::set_handler(move || {
                println!("\nReceived interrupt signal. Shutting down...");
                player.shutdown();
                interrupted.store(true, Ordering::Release);
            });
            if let Err(e) = handler {
                warn!("Could not install Ctrl-C handler: {}", e);
            }
        }

        let (tx, mut rx) = tokio::sync::mpsc::unbounded_channel::<String>();
        std::thread::spawn(move || {
            let stdin = std::io::stdin();
            let mut line = String::new();
            loop {
                line.clear();
                match stdin.read_line(&mut line) {
                    Ok(0) | Err(_) => break,
                    Ok(_) => {
                        if tx.send(line.trim().to_string()).is_err() {
                            break;
                        }
                    }
                }
            }
        });

        let Some(mut events) = self.events.take() else {
            return Ok(());
        };
        let mut interval = tokio::time::interval(Duration::from_millis(100));
        let mut awaiting_input = false;

        loop {
            if interrupted.load(Ordering::Acquire) {
                break;
            }

            if !awaiting_input {
                print!("> ");
                let _ = std::io::Write::flush(&mut std::io::stdout());
                awaiting_input = true;
            }

            tokio::select! {
                biased;

                Some(event) = events.recv() => {
                    println!();
                    self.handle_event(event);
                    awaiting_input = false;
                }

                line = rx.recv() => {
                    awaiting_input = false;
                    let Some(line) = line else {
                        println!();
                        break;
                    };
                    if line.is_empty() {
                        continue;
                    }
                    match cli::parse_command(&line) {
                        Ok(Command::Quit) => {
                            println!("Goodbye!");
                            break;
                        }
                        Ok(command) => {
                            debug!("Executing {:?}", command);
                            if let Err(e) = self.execute_command(command) {
                                self.handle_error(&e);
                            }
                        }
                        Err(e) => {
                            eprintln!("Error: {}", e);
                            println!("Type 'help' for available commands.");
                        }
                    }
                }

                _ = interval.tick() => {}
            }
        }

        self.shutdown();
        Ok(())
    }

    /// Stop playback and persist the current settings
    pub fn shutdown(&mut self) {
        println!("Shutting down...");
        self.player.shutdown();

        let volume = self.player.volume();
        let looping = self.player.is_looping();
        if let Some(manager) = self.config_manager.as_mut() {
            let saved = manager.update_config(|config| {
                config.default_volume = volume;
                config.loop_enabled = looping;
            });
            if let Err(e) = saved {
                warn!("Could not save configuration: {}", e);
            }
        }

        let stats = self.player.engine().logger().get_event_statistics();
        if stats.timeout_anomalies > 0 {
            warn!("{} worker timeout anomalies this session", stats.timeout_anomalies);
        }
        println!("Shutdown complete.");
    }
}

#[tokio::main]
async fn main() {
    let args = CliArgs::parse();

    if std::env::var("CLIP_PLAYER_LOG_LEVEL").is_err() {
        std::env::set_var("CLIP_PLAYER_LOG_LEVEL", "warn");
    }
    if let Err(e) = AudioLogger::init() {
        eprintln!("Warning: Failed to initialize logging: {}", e);
    }

    if args.list_devices {
        match CpalOutput::list_devices() {
            Ok(devices) if devices.is_empty() => println!("No output devices found"),
            Ok(devices) => devices.iter().for_each(|name| println!("  {}", name)),
            Err(e) => {
                StatusDisplay::display_error(&PlayerError::Playback(e.into()));
                std::process::exit(1);
            }
        }
        return;
    }

    let mut app = match AppController::new(&args) {
        Ok(app) => app,
        Err(e) => {
            error!("Failed to initialize application: {}", e);
            StatusDisplay::display_error(&e);
            std::process::exit(1);
        }
    };

    if let Err(e) = app.run_interactive_mode().await {
        app.handle_error(&e);
        std::process::exit(1);
    }

    info!("Application shutdown complete");
}
