use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use std::fs::File;
use std::io::{self, BufReader, Write};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use vizbind::logging::{init_logging, LogConfig};
use vizbind::parser::parse_script;
use vizbind::surface::surface_for;
use vizbind::{
    ColumnManifest, Command, ComponentCatalog, Config, Dataset, DatasetId, FormBinder, Introspector,
    OutputFormat, Session, Value,
};

#[derive(Parser, Debug)]
#[command(name = "vizbind")]
#[command(about = "Bind tabular data to visualization components and render them", long_about = None)]
struct Args {
    /// JSON configuration file (render and introspection settings)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// JSON catalog replacing the built-in components
    #[arg(long, global = true)]
    catalog: Option<PathBuf>,

    /// Increase log verbosity (-v info, -vv debug, -vvv trace)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// List component names in catalog order
    List,
    /// Print the form generated for a component as JSON
    Describe {
        component: String,
        /// CSV file whose columns populate the selects
        #[arg(long)]
        data: Option<PathBuf>,
    },
    /// Print the inferred column manifest of a CSV file as JSON
    Manifest {
        #[arg(long)]
        data: PathBuf,
    },
    /// Run a command script (e.g. 'select(BarChart) | set(x: region) | set(y: sales) | submit()')
    Run {
        script: String,
        /// CSV input; stdin when omitted
        #[arg(long)]
        data: Option<PathBuf>,
        /// Output file; stdout when omitted
        #[arg(long)]
        output: Option<PathBuf>,
        /// png, svg or scene; overrides the config file
        #[arg(long)]
        format: Option<OutputFormat>,
    },
}

fn main() -> Result<()> {
    let args = Args::parse();
    init_logging(&LogConfig::from_verbosity(args.verbose))?;

    let config = match &args.config {
        Some(path) => {
            let file = File::open(path).with_context(|| format!("Failed to open config {}", path.display()))?;
            Config::from_json(BufReader::new(file))
                .with_context(|| format!("Failed to read config {}", path.display()))?
        }
        None => Config::default(),
    };

    let catalog = match &args.catalog {
        Some(path) => {
            let file = File::open(path).with_context(|| format!("Failed to open catalog {}", path.display()))?;
            ComponentCatalog::from_json(BufReader::new(file))
                .with_context(|| format!("Failed to load catalog {}", path.display()))?
        }
        None => ComponentCatalog::builtin(),
    };
    let catalog = Arc::new(catalog);

    match args.command {
        Commands::List => {
            let stdout = io::stdout();
            let mut handle = stdout.lock();
            for name in catalog.list() {
                writeln!(handle, "{}", name).context("Failed to write to stdout")?;
            }
        }
        Commands::Describe { component, data } => {
            let manifest = match data {
                Some(path) => introspect_file(&config, &path)?,
                None => Arc::new(ColumnManifest {
                    dataset: String::new(),
                    row_count: 0,
                    columns: Vec::new(),
                }),
            };
            let descriptor = catalog.get(&component)?;
            let binder = FormBinder::bind(descriptor, manifest);
            print_json(binder.model())?;
        }
        Commands::Manifest { data } => {
            let manifest = introspect_file(&config, &data)?;
            print_json(manifest.as_ref())?;
        }
        Commands::Run {
            script,
            data,
            output,
            format,
        } => {
            let commands = parse_script(&script)?;
            let dataset = match &data {
                Some(path) => read_dataset(path)?,
                None => Dataset::from_csv(DatasetId::new("stdin"), io::stdin().lock())
                    .context("Failed to read CSV from stdin")?,
            };

            let format = format.unwrap_or_else(|| config.render.format.clone());
            let mut surface = surface_for(&format);
            let mut session = Session::new(Arc::clone(&catalog), Introspector::new(config.introspect.clone()));
            session.upload(dataset)?;

            for command in commands {
                let selected = matches!(command, Command::SelectComponent(_));
                session.apply(command, surface.as_mut())?;
                if selected {
                    apply_render_size(&mut session, &config)?;
                }
            }

            let bytes = surface
                .export()
                .context("Failed to export surface")?
                .context("Nothing was rendered; end the script with submit()")?;
            write_output(output.as_deref(), &bytes)?;
        }
    }

    Ok(())
}

/// Configured width/height become the initial size of a freshly bound form.
fn apply_render_size(session: &mut Session, config: &Config) -> Result<()> {
    for (key, size) in [("width", config.render.width), ("height", config.render.height)] {
        let has_input = session.form().is_some_and(|form| form.input(key).is_some());
        if has_input {
            session.set_value(key, Some(Value::Number(size as f64)))?;
        }
    }
    Ok(())
}

fn read_dataset(path: &Path) -> Result<Dataset> {
    let file = File::open(path).with_context(|| format!("Failed to open {}", path.display()))?;
    let dataset = Dataset::from_csv(DatasetId::new(path.display().to_string()), BufReader::new(file))
        .with_context(|| format!("Failed to read CSV from {}", path.display()))?;
    Ok(dataset)
}

fn introspect_file(config: &Config, path: &Path) -> Result<Arc<ColumnManifest>> {
    let dataset = read_dataset(path)?;
    let mut session = Session::new(Arc::new(ComponentCatalog::new()), Introspector::new(config.introspect.clone()));
    let manifest = session.upload(dataset)?;
    Ok(manifest)
}

fn print_json<T: serde::Serialize + ?Sized>(value: &T) -> Result<()> {
    let json = serde_json::to_string_pretty(value).context("Failed to serialize output")?;
    let stdout = io::stdout();
    let mut handle = stdout.lock();
    writeln!(handle, "{}", json).context("Failed to write to stdout")?;
    Ok(())
}

fn write_output(path: Option<&Path>, bytes: &[u8]) -> Result<()> {
    match path {
        Some(path) => {
            std::fs::write(path, bytes).with_context(|| format!("Failed to write {}", path.display()))?;
        }
        None => {
            let stdout = io::stdout();
            let mut handle = stdout.lock();
            handle.write_all(bytes).context("Failed to write output to stdout")?;
            handle.flush().context("Failed to flush stdout")?;
        }
    }
    Ok(())
}
