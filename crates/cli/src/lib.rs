use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use page_editor::{
    ArtifactStore, DocumentLocation, EditorConfig, EditorEvent, EditorSession, SessionContext,
};
use pdf_engine::{OpenSource, PdfEngine, RenderRequest};
use serde::Serialize;
use std::ffi::OsString;
use std::fs;
use std::path::{Path, PathBuf};
use storage::{LocalArtifactStore, Storage, StorageError};

#[derive(Debug, Parser)]
#[command(name = "annotate-cli")]
#[command(about = "Rasterize, annotate and re-export PDF pages")]
pub struct Cli {
    /// Editor configuration file (JSON). Defaults to the stored configuration.
    #[arg(long, global = true, value_name = "FILE")]
    config: Option<PathBuf>,
    #[command(subcommand)]
    command: Commands,
}

#[derive(Debug, Subcommand)]
enum Commands {
    /// Print machine-readable page geometry.
    Info {
        #[arg(value_name = "FILE")]
        file: PathBuf,
    },
    /// Render one page to PNG at the configured scale.
    Render {
        #[arg(value_name = "FILE")]
        file: PathBuf,
        #[arg(long, default_value_t = 1)]
        page: u32,
        #[arg(long)]
        output: Option<PathBuf>,
    },
    /// Replay an event script against a PDF and write the flattened result.
    Annotate {
        #[arg(value_name = "FILE")]
        file: PathBuf,
        /// JSON array of editor events (zero-based page indices).
        #[arg(long, value_name = "EVENTS")]
        script: PathBuf,
        #[arg(long)]
        output: Option<PathBuf>,
    },
    /// Annotate a stored document and save it back through the artifact store.
    Save {
        #[arg(long, value_name = "DIR")]
        store: PathBuf,
        #[arg(long)]
        owner: String,
        #[arg(long)]
        container: String,
        /// Artifact id, `<owner>/<container>/<name>`.
        #[arg(long)]
        document: String,
        #[arg(long, value_name = "EVENTS")]
        script: PathBuf,
    },
    /// Print where a stored document can be downloaded from.
    Download {
        #[arg(long, value_name = "DIR")]
        store: PathBuf,
        #[arg(long)]
        container: String,
        /// Artifact id, `<owner>/<container>/<name>`.
        #[arg(long)]
        document: String,
    },
    /// Print CLI version.
    Version,
}

#[derive(Debug, Serialize)]
struct InfoOutput {
    path: String,
    page_count: u32,
    render_scale: f32,
    pages: Vec<PageOutput>,
}

#[derive(Debug, Serialize)]
struct PageOutput {
    index: u32,
    width_pt: f32,
    height_pt: f32,
    width_px: u32,
    height_px: u32,
}

#[derive(Debug, Serialize)]
struct SaveOutput {
    name: String,
    document: String,
    location: String,
}

#[derive(Debug, Serialize)]
struct DownloadOutput {
    document: String,
    location: String,
}

pub fn run<I, T>(args: I) -> Result<()>
where
    I: IntoIterator<Item = T>,
    T: Into<OsString> + Clone,
{
    let cli = Cli::parse_from(args);

    match cli.command {
        Commands::Info { file } => run_info(&file, &load_config(cli.config.as_deref())?),
        Commands::Render { file, page, output } => {
            run_render(&file, page, output.as_deref(), &load_config(cli.config.as_deref())?)
        }
        Commands::Annotate { file, script, output } => run_annotate(
            &file,
            &script,
            output.as_deref(),
            load_config(cli.config.as_deref())?,
        ),
        Commands::Save { store, owner, container, document, script } => {
            let context =
                SessionContext { document_id: document, container_id: container, owner_id: owner };
            run_save(&store, context, &script, load_config(cli.config.as_deref())?)
        }
        Commands::Download { store, container, document } => {
            run_download(&store, &container, document)
        }
        Commands::Version => {
            println!("{}", env!("CARGO_PKG_VERSION"));
            Ok(())
        }
    }
}

fn load_config(path: Option<&Path>) -> Result<EditorConfig> {
    if let Some(path) = path {
        return storage::read_config_file(path)
            .with_context(|| format!("failed to read config {}", path.display()));
    }

    match Storage::from_default_project() {
        Ok(storage) => storage.load_config().context("failed to load stored config"),
        Err(StorageError::NoDataDirectory) => Ok(EditorConfig::default()),
        Err(err) => Err(err.into()),
    }
}

#[cfg(feature = "pdfium")]
fn engine() -> Result<impl PdfEngine> {
    pdf_engine::pdfium_backend::PdfiumEngine::from_system_library()
        .context("failed to load PDFium")
}

#[cfg(not(feature = "pdfium"))]
fn engine() -> Result<impl PdfEngine> {
    Ok(pdf_engine::default_engine())
}

fn run_info(file: &Path, config: &EditorConfig) -> Result<()> {
    ensure_pdf_exists(file)?;

    let mut engine = engine()?;
    let handle = engine.open(OpenSource::from(file)).context("failed to open PDF")?;

    let page_count = engine.page_count(handle)?;
    let pages = (0..page_count)
        .map(|index| -> Result<PageOutput> {
            let size = engine.page_size(handle, index)?;
            let (width_px, height_px) = size.to_pixels(config.render_scale);
            Ok(PageOutput {
                index,
                width_pt: size.width_pt,
                height_pt: size.height_pt,
                width_px,
                height_px,
            })
        })
        .collect::<Result<Vec<_>>>()?;

    let payload = InfoOutput {
        path: file.display().to_string(),
        page_count,
        render_scale: config.render_scale,
        pages,
    };

    let json = serde_json::to_string_pretty(&payload)?;
    println!("{json}");

    engine.close(handle)?;

    Ok(())
}

fn run_render(file: &Path, page: u32, output: Option<&Path>, config: &EditorConfig) -> Result<()> {
    ensure_pdf_exists(file)?;

    if page == 0 {
        anyhow::bail!("--page is 1-based and must be >= 1");
    }

    let mut engine = engine()?;
    let handle = engine.open(OpenSource::from(file)).context("failed to open PDF")?;

    let image = engine
        .render_page(handle, RenderRequest { page_index: page - 1, scale: config.render_scale })
        .context("failed to render page")?;

    let output = output
        .map(ToOwned::to_owned)
        .unwrap_or_else(|| sibling_output(file, &format!("page-{page}.png")));
    ensure_parent(&output)?;

    image
        .save(&output)
        .with_context(|| format!("failed to write image to {}", output.display()))?;

    println!("{}", output.display());

    engine.close(handle)?;

    Ok(())
}

fn run_annotate(
    file: &Path,
    script: &Path,
    output: Option<&Path>,
    config: EditorConfig,
) -> Result<()> {
    ensure_pdf_exists(file)?;
    let events = read_script(script)?;

    let document_id = file.file_name().and_then(|name| name.to_str()).unwrap_or_default();
    let context =
        SessionContext { document_id: document_id.to_owned(), ..SessionContext::default() };

    let mut engine = engine()?;
    let mut session = EditorSession::open(&mut engine, OpenSource::from(file), context, config)
        .context("failed to open PDF")?;
    replay(&mut session, events)?;

    let bytes = session.export().context("failed to export PDF")?;
    let output = output
        .map(ToOwned::to_owned)
        .unwrap_or_else(|| sibling_output(file, "annotated.pdf"));
    ensure_parent(&output)?;
    fs::write(&output, bytes)
        .with_context(|| format!("failed to write PDF to {}", output.display()))?;

    println!("{}", output.display());

    Ok(())
}

fn run_save(
    store_root: &Path,
    context: SessionContext,
    script: &Path,
    config: EditorConfig,
) -> Result<()> {
    let events = read_script(script)?;
    let store = LocalArtifactStore::new(store_root);
    let document = context.document_id.clone();

    let mut engine = engine()?;
    let mut session = EditorSession::open_from_store(&mut engine, &store, context, config)
        .with_context(|| format!("failed to open stored document {document}"))?;
    replay(&mut session, events)?;

    let name = session.save(&store).context("failed to save annotated PDF")?;
    let location = session.artifact_location(&store).context("failed to locate saved PDF")?;
    let document = session.last_saved_id().map_or(document, ToOwned::to_owned);

    let output = SaveOutput { name, document, location: describe_location(&location) };
    println!("{}", serde_json::to_string_pretty(&output)?);

    Ok(())
}

fn run_download(store_root: &Path, container: &str, document: String) -> Result<()> {
    let store = LocalArtifactStore::new(store_root);
    let location = store
        .fetch_document_url(&document, container)
        .with_context(|| format!("failed to locate stored document {document}"))?;

    let output = DownloadOutput { document, location: describe_location(&location) };
    println!("{}", serde_json::to_string_pretty(&output)?);

    Ok(())
}

fn describe_location(location: &DocumentLocation) -> String {
    match location {
        DocumentLocation::Url(url) => url.clone(),
        DocumentLocation::Path(path) => path.display().to_string(),
        DocumentLocation::Bytes(bytes) => format!("<{} bytes in memory>", bytes.len()),
    }
}

fn read_script(path: &Path) -> Result<Vec<EditorEvent>> {
    let json = fs::read_to_string(path)
        .with_context(|| format!("failed to read script {}", path.display()))?;
    page_editor::parse_script(&json)
        .with_context(|| format!("invalid event script {}", path.display()))
}

fn replay(session: &mut EditorSession, events: Vec<EditorEvent>) -> Result<()> {
    let total = events.len();
    page_editor::replay(session, events).map_err(|(position, err)| {
        anyhow::Error::new(err).context(format!("event #{position} rejected"))
    })?;

    tracing::info!(events = total, "script replayed");
    Ok(())
}

fn ensure_pdf_exists(path: &Path) -> Result<()> {
    if !path.exists() {
        anyhow::bail!("file does not exist: {}", path.display());
    }

    if !path.is_file() {
        anyhow::bail!("path is not a file: {}", path.display());
    }

    Ok(())
}

fn ensure_parent(path: &Path) -> Result<()> {
    if let Some(parent) = path.parent().filter(|parent| !parent.as_os_str().is_empty()) {
        fs::create_dir_all(parent)?;
    }
    Ok(())
}

fn sibling_output(file: &Path, suffix: &str) -> PathBuf {
    let stem = file.file_stem().and_then(|name| name.to_str()).unwrap_or("document");

    file.with_file_name(format!("{stem}-{suffix}"))
}
