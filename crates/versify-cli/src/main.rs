use anyhow::{bail, Context, Result};
use audio_timeline::Waveform;
use clap::{Parser, Subcommand};
use poem_features::{analyze, AnalyzeOptions, FeatureRecord};
use poem_pipeline::{artifact_names, sanitize_filename, Pipeline, PipelineConfig, RendererKind, SongOutput};
use std::fs;
use std::io::{self, Read};
use std::path::{Path, PathBuf};
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

/// versify: set a recited poem to music.
///   - features --text "..."             (or the poem on STDIN)
///   - map --features record.json        (feature record → music parameters)
///   - compose --recitation poem.wav ... (two mixed songs + MIDI)
#[derive(Parser, Debug)]
#[command(name = "versify", version, about = "Poem features in, accompanied recitation out")]
struct Cli {
    /// Directory the results are written to
    #[arg(long, global = true, default_value = "output")]
    out_dir: PathBuf,

    #[command(subcommand)]
    cmd: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Derive a feature record from poem text and print it as JSON
    Features {
        /// The poem; read from STDIN when absent
        #[arg(long)]
        text: Option<String>,
    },

    /// Map a feature record (JSON file, or STDIN) to music parameters
    Map {
        #[arg(long)]
        features: Option<PathBuf>,
    },

    /// Generate both plans, render them and mix each with the recitation
    Compose {
        /// Feature record JSON; derived from --poem when absent
        #[arg(long, conflicts_with = "poem")]
        features: Option<PathBuf>,
        /// Poem text file to analyze instead of a feature record
        #[arg(long)]
        poem: Option<PathBuf>,
        /// Recitation audio (WAV, MP3, FLAC...)
        #[arg(long)]
        recitation: PathBuf,
        /// Pipeline configuration JSON
        #[arg(long)]
        config: Option<PathBuf>,
        /// Used for output file names
        #[arg(long, default_value = "untitled")]
        title: String,
        /// Seed for Plan A's walk
        #[arg(long)]
        seed: Option<u64>,
        /// fluidsynth | oscillator
        #[arg(long)]
        renderer: Option<RendererKind>,
        #[arg(long)]
        soundfont: Option<PathBuf>,
    },
}

fn init_tracing() {
    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with(tracing_subscriber::fmt::layer().with_writer(io::stderr))
        .init();
}

fn read_stdin_string() -> Result<String> {
    let mut buf = String::new();
    io::stdin().read_to_string(&mut buf).context("failed reading STDIN")?;
    Ok(buf)
}

fn load_features(path: Option<&Path>) -> Result<FeatureRecord> {
    let text = match path {
        Some(p) => fs::read_to_string(p).with_context(|| format!("failed reading features: {}", p.display()))?,
        None => read_stdin_string()?,
    };
    serde_json::from_str(&text).context("feature record is not valid JSON")
}

fn write_song(out_dir: &Path, title: &str, song: &SongOutput) -> Result<()> {
    fs::create_dir_all(out_dir).with_context(|| format!("failed creating {}", out_dir.display()))?;

    let params_path = out_dir.join(format!("{}_params.json", sanitize_filename(title)));
    fs::write(&params_path, serde_json::to_string_pretty(&song.params)?)?;
    eprintln!("✓ wrote {}", params_path.display());

    for plan in song.plans() {
        let (wav, mid) = artifact_names(title, plan.plan);
        let wav_path = out_dir.join(wav);
        plan.final_waveform()
            .write_wav(&wav_path)
            .with_context(|| format!("failed writing {}", wav_path.display()))?;
        eprintln!("✓ wrote {}", wav_path.display());

        let mid_path = out_dir.join(mid);
        fs::write(&mid_path, &plan.midi).with_context(|| format!("failed writing {}", mid_path.display()))?;
        eprintln!("✓ wrote {}", mid_path.display());

        if plan.is_degraded() {
            eprintln!("! {} was degraded (see warnings above)", plan.plan);
        }
    }
    Ok(())
}

fn main() -> Result<()> {
    init_tracing();
    let cli = Cli::parse();

    match cli.cmd {
        Commands::Features { text } => {
            let txt = match text {
                Some(t) => t,
                None => read_stdin_string()?,
            };
            let record = analyze(&txt, &AnalyzeOptions::default());
            println!("{}", serde_json::to_string_pretty(&record)?);
        }

        Commands::Map { features } => {
            let record = load_features(features.as_deref())?;
            let params = music_mapping::map_features(&record);
            params.validate()?;
            println!("{}", serde_json::to_string_pretty(&params)?);
        }

        Commands::Compose { features, poem, recitation, config, title, seed, renderer, soundfont } => {
            let mut cfg = match &config {
                Some(p) => PipelineConfig::load(p)?,
                None => PipelineConfig::default(),
            };
            if seed.is_some() {
                cfg.melody_generation.seed = seed;
            }
            if let Some(r) = renderer {
                cfg.music_synthesis.renderer = r;
            }
            if soundfont.is_some() {
                cfg.music_synthesis.soundfont_path = soundfont;
            }

            let record = match (features, poem) {
                (Some(f), _) => load_features(Some(&f))?,
                (None, Some(p)) => {
                    let txt = fs::read_to_string(&p).with_context(|| format!("failed reading poem: {}", p.display()))?;
                    analyze(&txt, &AnalyzeOptions::default())
                }
                (None, None) => bail!("compose needs --features or --poem"),
            };

            let voice = Waveform::read(&recitation)
                .with_context(|| format!("failed reading recitation: {}", recitation.display()))?;
            info!(duration_ms = voice.duration_ms(), sample_rate = voice.sample_rate(), "loaded recitation");

            let song = Pipeline::from_config(&cfg)?.run(&record, &voice)?;
            write_song(&cli.out_dir, &title, &song)?;
        }
    }

    Ok(())
}
