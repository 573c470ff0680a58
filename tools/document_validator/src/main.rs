use cardionote_core::locale::Language;
use cardionote_core::validator::StructuredValidator;
use cardionote_core::{CoreConfig, DocumentNormalizer, Provenance, RawGenerationResult};
use serde_json::json;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

const USAGE: &str = "usage: document_validator [--language en|es|fr] <path/to/response.txt>";

fn main() {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "cardionote=info".into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    let args: Vec<String> = std::env::args().skip(1).collect();
    let (language, path) = match args.as_slice() {
        [path] => (Language::En, path),
        [flag, code, path] if flag == "--language" => match code.parse::<Language>() {
            Ok(l) => (l, path),
            Err(e) => {
                eprintln!("{}", e);
                std::process::exit(2);
            }
        },
        _ => {
            eprintln!("{}", USAGE);
            std::process::exit(2);
        }
    };

    let config = match std::env::var("CARDIONOTE_CONFIG") {
        Ok(p) => match CoreConfig::from_path(&p) {
            Ok(c) => c,
            Err(e) => {
                eprintln!("config error ({}): {}", p, e);
                std::process::exit(2);
            }
        },
        Err(_) => CoreConfig::default(),
    };

    let response = match std::fs::read_to_string(path) {
        Ok(s) => s,
        Err(e) => {
            eprintln!("cannot read {}: {}", path, e);
            std::process::exit(2);
        }
    };

    let raw = RawGenerationResult::from_response(&response);
    let violations = match StructuredValidator::new(language).validate(&raw) {
        Ok(_) => Vec::new(),
        Err(list) => list.violations,
    };
    let normalized = DocumentNormalizer::from_config(&config, language).normalize(&raw);
    tracing::debug!(shape = raw.shape(), provenance = normalized.provenance.as_str(), "normalized");

    let report = json!({
        "shape": raw.shape(),
        "language": language.code(),
        "violations": violations,
        "document": normalized,
    });
    match serde_json::to_string_pretty(&report) {
        Ok(s) => println!("{}", s),
        Err(e) => {
            eprintln!("cannot serialize report: {}", e);
            std::process::exit(2);
        }
    }

    match normalized.provenance {
        Provenance::Structured => std::process::exit(0),
        Provenance::Fallback => std::process::exit(1),
    }
}
