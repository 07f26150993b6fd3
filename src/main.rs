use std::fs::OpenOptions;
use std::path::PathBuf;

#[derive(Debug, Default)]
struct CliArgs {
    paths: Vec<PathBuf>,
}

fn main() -> anyhow::Result<()> {
    let args = parse_args(std::env::args().skip(1).collect())?;
    init_logging();

    std::panic::set_hook(Box::new(|panic_info| {
        let current_thread = std::thread::current();
        let thread_name = current_thread.name().unwrap_or("unnamed");
        log::error!("panic in thread '{thread_name}': {panic_info}");
    }));

    let settings = match cazic::config::load_settings() {
        Ok(settings) => settings,
        Err(err) => {
            log::warn!("using default settings: {err:#}");
            cazic::model::Settings::default()
        }
    };
    log::info!("starting with theme {}", settings.theme.key());

    cazic::app::run_with_startup(cazic::app::AppStartupOptions {
        paths: args.paths,
        settings,
    })
}

/// The terminal belongs to the UI, so records go to `cazic.log` in the
/// config directory. Without a writable log file logging stays off.
fn init_logging() {
    let log_file = cazic::config::ensure_config_dir()
        .and_then(|_| cazic::config::log_path())
        .and_then(|path| {
            OpenOptions::new()
                .create(true)
                .append(true)
                .open(&path)
                .map_err(anyhow::Error::from)
        });
    let Ok(log_file) = log_file else {
        return;
    };

    let mut clog = colog::default_builder();
    clog.filter(None, log::LevelFilter::Info);
    clog.parse_default_env();
    clog.write_style(env_logger::WriteStyle::Never);
    clog.target(env_logger::Target::Pipe(Box::new(log_file)));
    clog.init();
}

fn parse_args(args: Vec<String>) -> anyhow::Result<CliArgs> {
    let mut out = CliArgs::default();
    for arg in args {
        match arg.as_str() {
            "-h" | "--help" => {
                print_help();
                std::process::exit(0);
            }
            other if other.starts_with('-') => anyhow::bail!("unknown argument {other}"),
            path => out.paths.push(PathBuf::from(path)),
        }
    }
    Ok(out)
}

fn print_help() {
    println!("cazic");
    println!("  cazic [PATH...]   Queue audio files or folders and start the player");
    println!("  -h, --help        Show this help");
    println!();
    println!("Logs go to cazic.log in the config directory; RUST_LOG sets the level.");
}
