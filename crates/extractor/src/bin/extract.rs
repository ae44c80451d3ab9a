// ABOUTME: CLI binary for the digests article extractor.
// ABOUTME: Extracts a saved HTML page against its URL and prints the result as JSON.

use std::fs;
use std::io::{self, Write};
use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;
use std::time::Instant;

use clap::Parser;
use digests_extractor::{
    load_registry_file, parse_document, ExtractOptions, ExtractResult, Extractor,
};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};
use url::Url;

#[derive(Parser, Debug)]
#[command(name = "digests-extract")]
#[command(about = "Extract article content and metadata from a saved HTML page")]
struct Args {
    /// HTML file to extract
    #[arg(long = "html")]
    html: PathBuf,

    /// URL the page was fetched from
    #[arg(long = "url")]
    url: String,

    /// Content format: html (default) or text/txt
    #[arg(short = 'f', long = "format", default_value = "html")]
    format: String,

    /// Rule table JSON to use instead of the builtin rules
    #[arg(long = "rules")]
    rules: Option<PathBuf>,

    /// Ignore site content selectors and score the page
    #[arg(long = "force-fallback")]
    force_fallback: bool,

    /// Extract only the content field
    #[arg(long = "content-only")]
    content_only: bool,

    /// Probe content detectors concurrently
    #[arg(long = "concurrent")]
    concurrent: bool,

    /// Single-line JSON instead of pretty-printed
    #[arg(long = "compact")]
    compact: bool,

    /// Output file path (default: stdout)
    #[arg(short = 'o', long = "output")]
    output: Option<PathBuf>,

    /// Print elapsed time in ms to stderr
    #[arg(long = "timing")]
    timing: bool,
}

fn content_as_html(format: &str) -> bool {
    !matches!(format.to_lowercase().as_str(), "text" | "txt")
}

fn format_output(result: &ExtractResult, compact: bool) -> serde_json::Result<String> {
    if compact {
        serde_json::to_string(result)
    } else {
        serde_json::to_string_pretty(result)
    }
}

#[tokio::main]
async fn main() -> ExitCode {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "warn".into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(io::stderr))
        .init();

    let args = Args::parse();

    let mut builder = Extractor::builder();
    if let Some(path) = &args.rules {
        match load_registry_file(path) {
            Ok(registry) => builder = builder.registry(registry),
            Err(e) => {
                eprintln!("error loading rules {:?}: {}", path, e);
                return ExitCode::from(1);
            }
        }
    }
    let extractor = builder.build();

    let html = match fs::read_to_string(&args.html) {
        Ok(html) => html,
        Err(e) => {
            eprintln!("error reading file {:?}: {}", args.html, e);
            return ExitCode::from(1);
        }
    };

    let page = match Url::parse(&args.url) {
        Ok(page) => page,
        Err(e) => {
            eprintln!("error: invalid url {:?}: {}", args.url, e);
            return ExitCode::from(1);
        }
    };

    let options = ExtractOptions::new()
        .force_fallback(args.force_fallback)
        .content_only(args.content_only)
        .extract_html("content", content_as_html(&args.format));

    let start = Instant::now();
    let hostname = page.host_str().unwrap_or_default();
    let doc = parse_document(&html);
    let rule_set = if args.concurrent {
        extractor
            .resolve_concurrent(hostname, Arc::from(html.as_str()))
            .await
    } else {
        extractor.resolve(hostname, &doc)
    };
    let result = extractor.extract(&doc, &page, &rule_set, &options);
    let elapsed = start.elapsed();

    let output = match format_output(&result, args.compact) {
        Ok(output) => output,
        Err(e) => {
            eprintln!("error serializing result: {}", e);
            return ExitCode::from(1);
        }
    };

    let mut had_error = false;
    if let Some(path) = &args.output {
        if let Err(e) = fs::write(path, &output) {
            eprintln!("error writing to {:?}: {}", path, e);
            had_error = true;
        }
    } else {
        println!("{}", output);
    }

    if args.timing {
        let _ = writeln!(io::stderr(), "elapsed: {}ms", elapsed.as_millis());
    }

    if had_error {
        ExitCode::from(1)
    } else {
        ExitCode::SUCCESS
    }
}
