use clap::{Args, Parser, Subcommand};
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use studymap::logging::init_logging;
use studymap::{
    AdminLevel, BasemapSource, BoundaryDataset, InsetPosition, MapConfig, MapRequest, MapService,
    Selection,
};
use tracing::info;

/// Генератор карт района исследования
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Подробный лог (уровень debug, если не задан RUST_LOG)
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Построить карту и вывести путь к PNG
    Render(RenderArgs),
    /// Вывести варианты выбора для следующего уровня
    List(ListArgs),
}

#[derive(Args, Debug)]
struct RenderArgs {
    /// Путь к конфигурационному файлу в формате TOML
    #[arg(short, long)]
    config: PathBuf,

    #[arg(long, default_value = "")]
    country: String,

    #[arg(long, default_value = "")]
    region: String,

    #[arg(long, default_value = "")]
    department: String,

    #[arg(long, default_value = "")]
    municipality: String,

    /// Положение врезки: "upper right" или "bottom right"
    #[arg(long, default_value_t = InsetPosition::UpperRight)]
    inset: InsetPosition,

    /// Заголовок карты
    #[arg(long, default_value = "Fig. 1 Study Area Map")]
    title: String,

    /// Подложка основной карты: "OSM" или "Google Hybrid"
    #[arg(long, default_value_t = BasemapSource::Osm)]
    basemap: BasemapSource,

    /// Поле вокруг территории в градусах (по умолчанию 0.1)
    #[arg(long)]
    zoom_radius: Option<f64>,

    /// Проверять, что выбранные уровни вложены друг в друга
    #[arg(long)]
    strict: bool,
}

#[derive(Args, Debug)]
struct ListArgs {
    /// Путь к конфигурационному файлу в формате TOML
    #[arg(short, long)]
    config: PathBuf,

    #[arg(long)]
    country: Option<String>,

    #[arg(long)]
    region: Option<String>,

    #[arg(long)]
    department: Option<String>,
}

fn load(config_path: &Path) -> Result<(MapConfig, BoundaryDataset), Box<dyn std::error::Error>> {
    info!(path = %config_path.display(), "Загрузка конфигурации");
    let config = MapConfig::from_toml_file(config_path)?;
    let dataset = BoundaryDataset::load(&config.data)?;
    Ok((config, dataset))
}

fn render(args: RenderArgs) -> Result<(), Box<dyn std::error::Error>> {
    let (config, dataset) = load(&args.config)?;
    let service = MapService::with_default_client(config, dataset)?.with_strict_hierarchy(args.strict);

    let request = MapRequest {
        selection: Selection {
            country: args.country,
            region: args.region,
            department: args.department,
            municipality: args.municipality,
        },
        inset: args.inset,
        title: args.title,
        basemap: args.basemap,
        zoom_radius: args.zoom_radius,
    };
    let artifact = service.generate(&request)?;

    println!("{}", artifact.path.display());
    Ok(())
}

fn list(args: ListArgs) -> Result<(), Box<dyn std::error::Error>> {
    let (_, dataset) = load(&args.config)?;

    // следующий уровень после самого детального заданного
    let given = [
        (AdminLevel::Country, args.country),
        (AdminLevel::Region, args.region),
        (AdminLevel::Department, args.department),
    ];
    let deepest = given
        .into_iter()
        .rev()
        .find_map(|(level, name)| name.filter(|n| !n.is_empty()).map(|n| (level, n)));
    let (level, parent) = match deepest {
        None => (AdminLevel::Country, None),
        Some((level, name)) => match level.child() {
            Some(child) => (child, Some(name)),
            None => return Ok(()),
        },
    };

    for name in dataset.child_names(level, parent.as_deref()) {
        println!("{name}");
    }
    Ok(())
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    let result = match cli.command {
        Command::Render(args) => render(args),
        Command::List(args) => list(args),
    };

    match result {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("Error: {e}");
            ExitCode::FAILURE
        }
    }
}
