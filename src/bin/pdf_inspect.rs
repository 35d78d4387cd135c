//! Print a JSON summary of a PDF file.
//!
//! Usage: `pdf_inspect <file.pdf> [--password <password>]`
//!
//! Set `RUST_LOG=debug` to see recovery and decoding diagnostics.

use pdf_engine::{Document, FileSource, OpenOptions};
use pdf_engine::resources::FontRegistry;
use serde::Serialize;
use std::path::PathBuf;

/// One page of the summary
#[derive(Debug, Clone, Serialize)]
struct PageSummary {
    index: usize,
    object: String,
    media_box: [f32; 4],
    crop_box: [f32; 4],
    rotate: i32,
}

/// Whole-file summary
#[derive(Debug, Clone, Serialize)]
struct FileSummary {
    file: String,
    file_size: u64,
    version: String,
    encrypted: bool,
    authenticated: bool,
    permissions: Option<u32>,
    object_count: usize,
    page_count: usize,
    pages: Vec<PageSummary>,
    page_errors: Vec<String>,
}

struct Args {
    path: PathBuf,
    password: Option<String>,
}

impl Args {
    fn from_env() -> Result<Self, String> {
        let mut path = None;
        let mut password = None;
        let mut args = std::env::args().skip(1);
        while let Some(arg) = args.next() {
            match arg.as_str() {
                "--password" | "-p" => {
                    password = Some(args.next().ok_or("--password needs a value")?);
                },
                "--help" | "-h" => return Err(String::new()),
                _ if path.is_none() => path = Some(PathBuf::from(arg)),
                _ => return Err(format!("unexpected argument: {}", arg)),
            }
        }
        Ok(Self {
            path: path.ok_or("missing input file")?,
            password,
        })
    }
}

fn inspect(args: &Args) -> pdf_engine::Result<FileSummary> {
    let file_size = std::fs::metadata(&args.path)?.len();
    let source = FileSource::open(&args.path)?;
    let doc = Document::open_with(
        Box::new(source),
        args.password.as_deref().map(str::as_bytes),
        OpenOptions::default(),
        FontRegistry::new(),
    )?;

    let (major, minor) = doc.version();
    let page_count = doc.page_count()?;
    let mut pages = Vec::with_capacity(page_count);
    let mut page_errors = Vec::new();
    for index in 0..page_count {
        match doc.get_page(index) {
            Ok(page) => pages.push(PageSummary {
                index,
                object: page.reference.to_string(),
                media_box: [page.media_box.x0, page.media_box.y0, page.media_box.x1, page.media_box.y1],
                crop_box: [page.crop_box.x0, page.crop_box.y0, page.crop_box.x1, page.crop_box.y1],
                rotate: page.rotate,
            }),
            Err(e) => {
                log::warn!("Page {} could not be read: {}", index, e);
                page_errors.push(format!("page {}: {}", index, e));
            },
        }
    }

    let encrypted = doc.is_encrypted();
    Ok(FileSummary {
        file: args.path.display().to_string(),
        file_size,
        version: format!("{}.{}", major, minor),
        encrypted,
        authenticated: doc.is_authenticated(),
        permissions: encrypted.then(|| doc.permissions().bits()),
        object_count: doc.object_count(),
        page_count,
        pages,
        page_errors,
    })
}

fn main() {
    env_logger::init();

    let args = match Args::from_env() {
        Ok(args) => args,
        Err(message) => {
            if !message.is_empty() {
                eprintln!("Error: {}", message);
            }
            eprintln!("Usage: pdf_inspect <file.pdf> [--password <password>]");
            std::process::exit(2);
        },
    };

    match inspect(&args).map(|summary| serde_json::to_string_pretty(&summary)) {
        Ok(Ok(json)) => println!("{}", json),
        Ok(Err(e)) => {
            eprintln!("Failed to serialize summary: {}", e);
            std::process::exit(1);
        },
        Err(e) => {
            eprintln!("Failed to inspect {}: {}", args.path.display(), e);
            std::process::exit(1);
        },
    }
}
