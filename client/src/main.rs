use clap::Parser;
use client::config::{ClientConfig, TournamentConfig, DEFAULT_HOST, DEFAULT_PORT};
use client::driver::{FrameInput, RenderDriver, ServiceConnector};
use client::game::{Difficulty, GameMode};
use client::rendering::Renderer;
use log::{error, info};
use macroquad::prelude::*;
use std::sync::Arc;
use std::time::Instant;

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Game service host
    #[arg(short = 's', long, default_value = DEFAULT_HOST)]
    host: String,

    /// Game service port
    #[arg(short = 'p', long, default_value_t = DEFAULT_PORT)]
    port: u16,

    /// Bearer credential; a guest token is fetched when absent
    #[arg(short = 't', long, env = "ASTROPONG_TOKEN")]
    token: Option<String>,

    /// Reject self-signed certificates
    #[arg(long)]
    strict_tls: bool,

    /// Window width
    #[arg(short = 'w', long, default_value = "1280")]
    width: u32,

    /// Window height (no short flag to avoid conflict with --help)
    #[arg(long, default_value = "720")]
    height: u32,

    /// Tournament match player names, `p1,p2`
    #[arg(long, value_delimiter = ',')]
    tournament: Option<Vec<String>>,

    /// Tournament AI difficulty (easy, medium, hard, easy_p1, medium_p1, hard_p1)
    #[arg(long, default_value = "medium")]
    difficulty: String,

    /// The tournament match is played against the AI
    #[arg(long)]
    versus_ai: bool,
}

impl Args {
    fn into_config(self) -> ClientConfig {
        let tournament = self.tournament.and_then(|names| match names.as_slice() {
            [p1, p2] => Some(TournamentConfig {
                names: [p1.clone(), p2.clone()],
                difficulty: Difficulty::from_name(&self.difficulty),
                versus_ai: self.versus_ai,
            }),
            _ => None,
        });
        ClientConfig {
            host: self.host,
            port: self.port,
            token: self.token,
            insecure_tls: !self.strict_tls,
            window_width: self.width,
            window_height: self.height,
            tournament,
            ..ClientConfig::default()
        }
    }
}

fn window_conf() -> Conf {
    let args = Args::parse();
    Conf {
        window_title: "AstroPong".to_string(),
        window_width: args.width as i32,
        window_height: args.height as i32,
        high_dpi: true,
        ..Default::default()
    }
}

/// Browser-style key name, matching the configured bindings.
fn key_name(key: KeyCode) -> Option<&'static str> {
    let name = match key {
        KeyCode::W => "w",
        KeyCode::S => "s",
        KeyCode::A => "a",
        KeyCode::D => "d",
        KeyCode::Z => "z",
        KeyCode::Up => "ArrowUp",
        KeyCode::Down => "ArrowDown",
        KeyCode::Left => "ArrowLeft",
        KeyCode::Right => "ArrowRight",
        _ => return None,
    };
    Some(name)
}

fn menu_choice(key: KeyCode, config: &ClientConfig) -> Option<GameMode> {
    match key {
        KeyCode::Key1 => Some(GameMode::Pve(Difficulty::Easy)),
        KeyCode::Key2 => Some(GameMode::Pve(Difficulty::Medium)),
        KeyCode::Key3 => Some(GameMode::Pve(Difficulty::Hard)),
        KeyCode::Key4 => Some(GameMode::PvpLan),
        KeyCode::Key5 => Some(GameMode::PvpKeyboard),
        KeyCode::Key6 => config.tournament.as_ref().map(TournamentConfig::mode),
        _ => None,
    }
}

fn collect_input(config: &ClientConfig) -> FrameInput {
    let mut input = FrameInput::at(Instant::now());
    let clicked = is_mouse_button_pressed(MouseButton::Left);
    let pressed = get_keys_pressed();

    for key in &pressed {
        if let Some(name) = key_name(*key) {
            input.key_events.push((name.to_string(), true));
        }
        if input.start.is_none() {
            input.start = menu_choice(*key, config);
        }
    }
    for key in get_keys_released() {
        if let Some(name) = key_name(key) {
            input.key_events.push((name.to_string(), false));
        }
    }

    input.gesture = clicked || !pressed.is_empty();
    input.dismiss = clicked || pressed.contains(&KeyCode::Enter);
    input.leave = pressed.contains(&KeyCode::Escape);
    input
}

#[macroquad::main(window_conf)]
async fn main() {
    env_logger::init();

    if std::env::var("RUST_LOG").is_err() {
        eprintln!("Set RUST_LOG=info for detailed logging");
    }

    let config = Args::parse().into_config();

    let runtime = match tokio::runtime::Builder::new_multi_thread()
        .worker_threads(2)
        .enable_all()
        .build()
    {
        Ok(runtime) => runtime,
        Err(e) => {
            error!("Failed to start the network runtime: {}", e);
            return;
        }
    };

    info!("Starting client...");
    info!("Game service: {}:{}", config.host, config.port);
    if config.token().is_none() {
        info!("No credential given, a guest token will be requested");
    }
    info!("Controls: W/S and Up/Down to move, Escape to leave a match");

    let connector = match ServiceConnector::new(&config) {
        Ok(connector) => Arc::new(connector),
        Err(e) => {
            error!("Failed to set up the game service client: {}", e);
            return;
        }
    };
    let mut surface = match Renderer::new(config.window_width as f32, config.window_height as f32) {
        Ok(surface) => surface,
        Err(e) => {
            error!("Unsupported window size: {}", e);
            return;
        }
    };

    let input_config = config.clone();
    let mut driver = RenderDriver::new(config, runtime.handle().clone(), connector);

    loop {
        let input = collect_input(&input_config);
        driver.tick(&input, &mut surface);
        next_frame().await;
    }
}
