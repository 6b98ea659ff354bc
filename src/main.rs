mod animation;
mod app;
mod colors;
mod config;
mod error;
mod event;
mod geo;
mod geometry;
mod help;
mod land;
mod logging;
mod render;
mod scene;
mod settings;
mod stream;
mod terminal;

use clap::{Args, Parser, Subcommand};
use config::{RunConfig, SourceKind};
use geometry::globe::MAX_SUBDIVISIONS;
use logging::LogTarget;
use settings::Settings;
use std::path::PathBuf;
use std::process::ExitCode;

#[derive(Parser)]
#[command(name = "netglobe")]
#[command(author = "Terminal Art Generator")]
#[command(version = "0.1.0")]
#[command(about = "Network traffic on a spinning braille globe", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Option<Commands>,

    #[command(flatten)]
    options: GlobeArgs,
}

#[derive(Subcommand)]
enum Commands {
    /// Animate live traffic (default)
    Run {
        #[command(flatten)]
        options: GlobeArgs,
    },

    /// Render one frame to stdout
    Print {
        #[command(flatten)]
        options: GlobeArgs,

        /// Width in columns
        #[arg(long, default_value = "80")]
        width: u16,

        /// Height in rows
        #[arg(long, default_value = "40")]
        height: u16,

        /// Plain text without colour escapes
        #[arg(long)]
        plain: bool,
    },

    /// Show mesh statistics
    Info {
        #[command(flatten)]
        options: GlobeArgs,
    },
}

#[derive(Args, Clone, Default)]
struct GlobeArgs {
    /// Event source
    #[arg(short = 'S', long, value_enum)]
    source: Option<SourceKind>,

    /// Server-sent events endpoint
    #[arg(short, long)]
    url: Option<String>,

    /// Recording to replay (NDJSON or SSE transcript)
    #[arg(short, long)]
    file: Option<PathBuf>,

    /// MaxMind GeoLite2-City database
    #[arg(long)]
    geoip_db: Option<PathBuf>,

    /// GeoJSON file with country polygons
    #[arg(long)]
    countries: Option<PathBuf>,

    /// Icosphere subdivision level (0-7)
    #[arg(long)]
    subdivisions: Option<u8>,

    /// Animation step delay in seconds
    #[arg(short, long)]
    time: Option<f32>,

    /// Random seed for reproducibility
    #[arg(short, long)]
    seed: Option<u64>,

    /// Log file for interactive mode
    #[arg(long)]
    log_file: Option<PathBuf>,

    /// Debug logging
    #[arg(short, long)]
    verbose: bool,
}

impl GlobeArgs {
    /// Subcommand flags win over the ones given before it
    fn or(self, outer: GlobeArgs) -> GlobeArgs {
        GlobeArgs {
            source: self.source.or(outer.source),
            url: self.url.or(outer.url),
            file: self.file.or(outer.file),
            geoip_db: self.geoip_db.or(outer.geoip_db),
            countries: self.countries.or(outer.countries),
            subdivisions: self.subdivisions.or(outer.subdivisions),
            time: self.time.or(outer.time),
            seed: self.seed.or(outer.seed),
            log_file: self.log_file.or(outer.log_file),
            verbose: self.verbose || outer.verbose,
        }
    }

    fn apply(&self, config: &mut RunConfig) {
        if let Some(source) = self.source {
            config.stream.source = source;
        }
        if let Some(url) = &self.url {
            config.stream.url = url.clone();
        }
        if let Some(file) = &self.file {
            config.stream.file = Some(file.clone());
            // A recording implies replay unless a source was named
            if self.source.is_none() {
                config.stream.source = SourceKind::Replay;
            }
        }
        if let Some(db) = &self.geoip_db {
            config.globe.geoip_db = Some(db.clone());
        }
        if let Some(countries) = &self.countries {
            config.globe.countries = Some(countries.clone());
        }
        if let Some(subdivisions) = self.subdivisions {
            config.globe.subdivisions = subdivisions;
        }
        if let Some(time) = self.time {
            config.time_step = time.max(0.001);
        }
        if self.seed.is_some() {
            config.stream.seed = self.seed;
        }
        config.globe.subdivisions = config.globe.subdivisions.min(MAX_SUBDIVISIONS);
    }
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    let command = cli.command.unwrap_or(Commands::Run {
        options: GlobeArgs::default(),
    });

    let (options, interactive) = match &command {
        Commands::Run { options } => (options.clone().or(cli.options), true),
        Commands::Print { options, .. } | Commands::Info { options } => {
            (options.clone().or(cli.options), false)
        }
    };

    let target = if interactive {
        LogTarget::File(options.log_file.clone().unwrap_or_else(logging::default_log_path))
    } else {
        LogTarget::Stderr
    };
    if let Err(e) = logging::init(options.verbose, target) {
        eprintln!("Cannot open log file: {e}");
    }

    let mut config = RunConfig::default();
    Settings::load().apply(&mut config);
    options.apply(&mut config);
    log::debug!("Using {} source", config.stream.source.name());

    let result = match command {
        Commands::Run { .. } => app::run(config),
        Commands::Print {
            width, height, plain, ..
        } => app::print(config, width.max(1), height.max(1), plain),
        Commands::Info { .. } => app::info(config),
    };

    match result {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            log::error!("{e}");
            eprintln!("netglobe: {e}");
            ExitCode::FAILURE
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn subcommand_flags_override_global_ones() {
        let cli = Cli::parse_from(["netglobe", "--seed", "1", "--verbose", "info", "--seed", "2"]);
        let Some(Commands::Info { options }) = cli.command else {
            panic!("expected info");
        };
        let merged = options.or(cli.options);
        assert_eq!(merged.seed, Some(2));
        assert!(merged.verbose);
    }

    #[test]
    fn file_implies_replay() {
        let args = GlobeArgs {
            file: Some(PathBuf::from("capture.ndjson")),
            ..GlobeArgs::default()
        };
        let mut config = RunConfig::default();
        args.apply(&mut config);
        assert_eq!(config.stream.source, SourceKind::Replay);
    }

    #[test]
    fn subdivisions_are_clamped() {
        let args = GlobeArgs {
            subdivisions: Some(12),
            ..GlobeArgs::default()
        };
        let mut config = RunConfig::default();
        args.apply(&mut config);
        assert_eq!(config.globe.subdivisions, MAX_SUBDIVISIONS);
    }

    #[test]
    fn source_names_parse() {
        let cli = Cli::parse_from(["netglobe", "--source", "demo"]);
        assert_eq!(cli.options.source, Some(SourceKind::Demo));
        assert!(cli.command.is_none());
    }
}
