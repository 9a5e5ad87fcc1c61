use clap::{Parser, Subcommand};
use crossbeam::channel::{Receiver, RecvTimeoutError};
use std::path::PathBuf;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::{Duration, Instant};
use tether_camera::{
    CameraConfig, ExecutionEngine, Notification, PropertyId, SessionController, SimulatedCamera,
};

fn install_shutdown_handler(running: Arc<AtomicBool>) -> Result<(), String> {
    ctrlc::set_handler(move || {
        println!("\n\nReceived Ctrl+C, stopping...");
        running.store(false, Ordering::SeqCst);
    })
    .map_err(|e| format!("Failed to set Ctrl+C handler: {}", e))
}

#[derive(Parser)]
#[command(name = "tether_camera")]
#[command(about = "Tethered camera session against the simulated body", long_about = None)]
struct Cli {
    /// YAML configuration file (engine and session sections)
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// List connected cameras
    Devices,

    /// Print the main exposure properties of the first camera
    Properties,

    /// Run live view and print frame statistics
    #[command(name = "live-view")]
    LiveView {
        /// How long to run, in seconds
        #[arg(short, long, default_value_t = 5)]
        seconds: u64,
    },

    /// Take a picture and download it to the host
    Shoot {
        /// Where to save the picture
        #[arg(short, long, value_name = "DIR")]
        output: Option<PathBuf>,

        /// Bulb exposure length in milliseconds instead of a normal release
        #[arg(long)]
        bulb_ms: Option<u64>,
    },

    /// Record a movie and download it once recording stops
    Film {
        /// How long to record, in seconds
        #[arg(short, long, default_value_t = 3)]
        seconds: u64,

        /// Where to save the movie
        #[arg(short, long, value_name = "DIR")]
        output: Option<PathBuf>,
    },
}

fn load_config(path: Option<&PathBuf>) -> Result<CameraConfig, String> {
    match path {
        Some(path) => CameraConfig::from_yaml_file(path).map_err(|e| e.to_string()),
        None => Ok(CameraConfig::default()),
    }
}

fn print_notification(notification: &Notification) {
    match notification {
        Notification::CameraAdded => println!("Camera added"),
        Notification::Progress { percent } => println!("  download {:>3}%", percent),
        Notification::LiveViewFrame(_) => {}
        Notification::ImageDownloaded(image) => println!(
            "Image saved: {} ({}x{})",
            image.path.display(),
            image.image.width,
            image.image.height
        ),
        Notification::FileDownloaded { path } => println!("File saved: {}", path.display()),
        Notification::PropertyChanged { name, .. } => println!("Property changed: {}", name),
        Notification::SessionStateChanged(state) => println!("Session: {:?}", state),
        Notification::CameraShutDown => println!("Camera shut down"),
        Notification::SdkError(record) => {
            eprintln!("SDK error {} ({:?}): {}", record.name, record.severity, record.context)
        }
    }
}

/// Print notifications until one matches `done` or `timeout` passes.
fn wait_for<F>(
    rx: &Receiver<Notification>,
    running: &AtomicBool,
    timeout: Duration,
    done: F,
) -> bool
where
    F: Fn(&Notification) -> bool,
{
    let deadline = Instant::now() + timeout;
    while running.load(Ordering::SeqCst) {
        match rx.recv_deadline(deadline) {
            Ok(notification) => {
                print_notification(&notification);
                if done(&notification) {
                    return true;
                }
            }
            Err(RecvTimeoutError::Timeout) | Err(RecvTimeoutError::Disconnected) => return false,
        }
    }
    false
}

fn run(cli: Cli, running: Arc<AtomicBool>) -> Result<(), String> {
    let config = load_config(cli.config.as_ref())?;
    let camera = Arc::new(SimulatedCamera::new());
    let engine = ExecutionEngine::new(camera, config.engine.clone());
    let controller =
        SessionController::new(engine.clone(), config.session.clone()).map_err(|e| e.to_string())?;
    let rx = controller.subscribe();

    match cli.command {
        Commands::Devices => {
            let devices = controller.devices().map_err(|e| e.to_string())?;
            println!("Found {} camera(s):", devices.len());
            for device in devices {
                println!("  [{}] {} on {}", device.id, device.name, device.port);
            }
        }
        Commands::Properties => {
            let device = controller.open_first().map_err(|e| e.to_string())?;
            println!("{}:", device.name);
            let product = controller
                .get_text(PropertyId::PRODUCT_NAME)
                .map_err(|e| e.to_string())?;
            println!("  {:<24} {}", PropertyId::PRODUCT_NAME.name(), product);
            for id in [
                PropertyId::AE_MODE,
                PropertyId::ISO_SPEED,
                PropertyId::AV,
                PropertyId::TV,
                PropertyId::EXPOSURE_COMPENSATION,
                PropertyId::BATTERY_LEVEL,
            ] {
                match controller.get_u32(id) {
                    Ok(value) => println!("  {:<24} 0x{:X}", id.name(), value),
                    Err(e) => println!("  {:<24} <{}>", id.name(), e),
                }
            }
        }
        Commands::LiveView { seconds } => {
            controller.open_first().map_err(|e| e.to_string())?;
            controller.start_live_view().map_err(|e| e.to_string())?;
            let started = Instant::now();
            let deadline = started + Duration::from_secs(seconds);
            let mut frames = 0u64;
            let mut bytes = 0usize;
            while running.load(Ordering::SeqCst) && Instant::now() < deadline {
                match rx.recv_deadline(deadline) {
                    Ok(Notification::LiveViewFrame(frame)) => {
                        frames += 1;
                        bytes += frame.data.len();
                    }
                    Ok(other) => print_notification(&other),
                    Err(_) => break,
                }
            }
            controller.stop_live_view().map_err(|e| e.to_string())?;
            let elapsed = started.elapsed().as_secs_f64();
            println!(
                "{} frames in {:.1} s ({:.1} fps, {} KiB)",
                frames,
                elapsed,
                frames as f64 / elapsed.max(f64::EPSILON),
                bytes / 1024
            );
        }
        Commands::Shoot { output, bulb_ms } => {
            controller.open_first().map_err(|e| e.to_string())?;
            let dir = output.unwrap_or_else(|| controller.download_dir());
            controller
                .set_save_to_host(&dir)
                .map_err(|e| e.to_string())?;
            let shot = match bulb_ms {
                Some(ms) => controller.bulb_exposure(Duration::from_millis(ms)),
                None => controller.take_picture(),
            };
            shot.map_err(|e| e.to_string())?;
            let timeout = Duration::from_millis(bulb_ms.unwrap_or(0)) + Duration::from_secs(10);
            let saved = wait_for(&rx, &running, timeout, |n| {
                matches!(
                    n,
                    Notification::ImageDownloaded(_) | Notification::FileDownloaded { .. }
                )
            });
            if !saved {
                return Err("No image arrived".to_string());
            }
        }
        Commands::Film { seconds, output } => {
            controller.open_first().map_err(|e| e.to_string())?;
            let dir = output.unwrap_or_else(|| controller.download_dir());
            controller
                .set_save_to_host(&dir)
                .map_err(|e| e.to_string())?;
            controller.start_filming().map_err(|e| e.to_string())?;
            println!("Recording for {} s...", seconds);
            wait_for(&rx, &running, Duration::from_secs(seconds), |_| false);
            controller.stop_filming().map_err(|e| e.to_string())?;
            let saved = wait_for(&rx, &running, Duration::from_secs(10), |n| {
                matches!(n, Notification::FileDownloaded { .. })
            });
            if !saved {
                return Err("No movie arrived".to_string());
            }
        }
    }

    controller.close().map_err(|e| e.to_string())?;
    drop(controller);
    engine.shutdown();
    Ok(())
}

fn main() {
    tether_camera::init_logging();
    let cli = Cli::parse();

    let running = Arc::new(AtomicBool::new(true));
    if let Err(e) = install_shutdown_handler(running.clone()) {
        eprintln!("Warning: {}", e);
    }

    if let Err(e) = run(cli, running) {
        eprintln!("Error: {}", e);
        std::process::exit(1);
    }
}
