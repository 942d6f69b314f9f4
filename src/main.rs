//! Casement demo
//!
//! Opens a window on the headless backend, animates it for a fixed number
//! of frames and closes it through a window action.

use log::info;

use casement::backend::{Headless, HeadlessConfig};
use casement::gpu::Ops;
use casement::input::Requests;
use casement::unit::Dp;
use casement::window::{Event, Frame, Window};
use casement::{Actions, WindowOption};

const FRAMES: u32 = 60;

fn run() -> anyhow::Result<()> {
    info!("Starting casement demo");

    let headless = Headless::spawn(HeadlessConfig::default())?;
    let (window, pending) = Window::new([
        WindowOption::Title("casement demo".into()),
        WindowOption::Size(Dp(640.0), Dp(480.0)),
    ])?;
    let native = headless.open(pending)?;

    let mut frames = 0u32;
    while let Some(event) = window.next_event() {
        match event {
            Event::Stage(stage) => info!("Stage: {:?}", stage),
            Event::Config(config) => info!("Config: {:?} {:?}", config.title, config.size),
            Event::Frame(frame) => {
                frames += 1;
                for routed in &frame.input {
                    info!("Input: {:?}", routed.event);
                }
                if frames < FRAMES {
                    window.invalidate();
                } else if frames == FRAMES {
                    window.perform(Actions::CLOSE);
                }
                let requests = Requests {
                    profiling: frames % 20 == 0,
                    ..Default::default()
                };
                let ops = Ops::from_bytes(frames.to_le_bytes().to_vec());
                frame.submit(Frame::new(ops).with_requests(requests));
            }
            Event::Destroy { err: Some(err) } => return Err(err.into()),
            Event::Destroy { err: None } => info!("Window closed"),
        }
    }

    let stats = native.gpu();
    info!(
        "Rendered {} frames, presented {}, {} context(s)",
        stats.frames, stats.presents, stats.contexts
    );
    Ok(())
}

fn main() -> anyhow::Result<()> {
    // Initialize logging
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    run()
}
