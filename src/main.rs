//! bramble - a floating, reparenting window manager for X11.
//!
//! Clients get a frame with a title strip and a resize handle at the
//! bottom, workspaces map onto monitors, and everything is driven from
//! keyboard shortcuts and pointer drags.

mod atoms;
mod client;
mod config;
mod event;
mod geometry;
mod monitor;
mod startup;
mod types;
mod window_query;
mod wm;

use anyhow::Result;
use clap::Parser;
use x11rb::rust_connection::RustConnection;

use config::Config;
use wm::Wm;

#[derive(Parser, Debug)]
#[command(name = "bramble", about = "A floating window manager for X11", version)]
struct Args {
    /// Path to a startup script run once after initialization
    #[arg(short = 'c', long = "autostart")]
    autostart: Option<std::path::PathBuf>,

    /// X core font used for title strips
    #[arg(short = 'f', long = "font")]
    font: Option<String>,

    /// Enable debug logging
    #[arg(short = 'd', long = "debug")]
    debug: bool,
}

fn main() -> Result<()> {
    let args = Args::parse();

    let default_level = if args.debug { "debug" } else { "info" };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(default_level))
        .init();

    {
        let (conn, screen_num) = RustConnection::connect(None)?;
        if wm::already_running(&conn, screen_num)? {
            log::warn!("{} is already running on this display", wm::WM_NAME);
            return Ok(());
        }
    }

    startup::ignore_sigchld();

    let file_config = Config::load();
    let mut wm = Wm::new(&file_config, args.font.as_deref())?;
    log::info!("{} started", wm::WM_NAME);

    let autostart = args.autostart.unwrap_or_else(Config::autostart_path);
    startup::run_autostart(&autostart);

    event::run(&mut wm)?;

    wm.shutdown()?;
    Ok(())
}
