use std::env;
use std::io::{self, BufRead, Write};
use std::sync::Arc;
use std::time::Duration;

use anyhow::Result;
use tracing_subscriber::EnvFilter;

use vivace::config::Settings;
use vivace::engine::{MusicPlayer, PlayerObserver};
use vivace::playlist::Playlist;
use vivace::track::Track;

/// Console stand-in for the GUI layer: prints what a window would render.
struct ConsoleUi;

impl PlayerObserver for ConsoleUi {
    fn track_changed(&self, track: &Track) {
        println!("now playing: {} [{}]", track.display, track.length_display());
    }

    fn position_changed(&self, elapsed: Duration) {
        print!("\r  {:>4}s", elapsed.as_secs());
        let _ = io::stdout().flush();
    }

    fn playback_ended(&self) {
        println!("\nend of playlist");
    }

    fn error(&self, message: &str) {
        eprintln!("\nvivace: {message}");
    }
}

fn load_settings() -> Settings {
    match Settings::load() {
        Ok(s) => {
            if let Err(msg) = s.validate() {
                eprintln!("vivace: invalid config, using defaults: {msg}");
                Settings::default()
            } else {
                s
            }
        }
        Err(e) => {
            // Config is optional; failures should not prevent startup.
            eprintln!("vivace: failed to load config, using defaults: {e}");
            Settings::default()
        }
    }
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_writer(io::stderr)
        .init();

    let args: Vec<String> = env::args().skip(1).collect();
    if args.is_empty() {
        eprintln!("usage: vivace <playlist.txt | track...>");
        return Ok(());
    }

    let settings = load_settings();
    let player = MusicPlayer::with_default_output(Arc::new(ConsoleUi), settings);

    if args.len() == 1 && args[0].ends_with(".txt") {
        player.load_playlist(args[0].clone());
    } else {
        player.load_queue(Playlist::from_paths(&args));
    }

    // Line-oriented transport commands until EOF or quit.
    for line in io::stdin().lock().lines() {
        let line = line?;
        let mut parts = line.split_whitespace();
        match parts.next() {
            Some("play") => player.play(),
            Some("pause") => player.pause(),
            Some("stop") => player.stop(),
            Some("next") => player.next(),
            Some("prev") => player.previous(),
            Some("seek") => match parts.next().and_then(|s| s.parse::<u64>().ok()) {
                Some(secs) => player.seek(Duration::from_secs(secs)),
                None => eprintln!("usage: seek <seconds>"),
            },
            Some("shuffle") => player.toggle_shuffle(),
            Some("repeat") => player.toggle_repeat(),
            Some("vol+") => player.volume_up(),
            Some("vol-") => player.volume_down(),
            Some("q") | Some("quit") => break,
            Some(other) => eprintln!("unknown command: {other}"),
            None => {}
        }
    }

    player.shutdown();
    Ok(())
}
