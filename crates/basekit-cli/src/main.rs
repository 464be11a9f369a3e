//! basekit Command-Line Client
//!
//! Loads a schema file and shows the SQL that filter, sort and rule
//! expressions compile to.

mod error;
mod explain;
mod formatter;
mod request_file;

use std::path::{Path, PathBuf};
use std::sync::Arc;

use basekit_core::{Catalog, ResolverConfig, RuleKind, SchemaBundle, DEFAULT_MAX_RELATION_DEPTH};
use clap::{Parser, Subcommand, ValueEnum};
use comfy_table::Table;
use tracing::info;

use error::CliError;
use explain::{explain, ExplainRequest};
use formatter::{format_explanation, OutputFormat};
use request_file::RequestFile;

/// basekit Command-Line Client
#[derive(Parser, Debug)]
#[command(name = "basekit")]
#[command(version, about = "basekit filter compiler")]
pub struct Args {
    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Compile a search over a collection and print the SQL
    Explain(ExplainArgs),
    /// List the collections of a schema file
    Collections {
        /// Schema JSON file
        #[arg(short, long)]
        schema: PathBuf,
    },
}

#[derive(clap::Args, Debug)]
pub struct ExplainArgs {
    /// Schema JSON file
    #[arg(short, long)]
    pub schema: PathBuf,

    /// Collection to search
    #[arg(short, long)]
    pub collection: String,

    /// Filter expression, may be repeated
    #[arg(short, long)]
    pub filter: Vec<String>,

    /// Sort expression, e.g. `-created,title`
    #[arg(long)]
    pub sort: Option<String>,

    /// Request JSON file for `@request.*` values
    #[arg(short, long)]
    pub request: Option<PathBuf>,

    /// Resolve as a superuser: hidden fields allowed, no collection rules
    #[arg(long)]
    pub superuser: bool,

    /// Maximum number of relation hops per path
    #[arg(long, default_value_t = DEFAULT_MAX_RELATION_DEPTH)]
    pub max_depth: usize,

    /// Which collection rule restricts joined collections
    #[arg(long, default_value = "list", value_enum)]
    pub rule: RuleArg,

    #[arg(long)]
    pub limit: Option<u64>,

    #[arg(long)]
    pub offset: Option<u64>,

    /// Output format
    #[arg(long, default_value = "text", value_enum)]
    pub format: OutputFormat,
}

/// Rule kinds selectable on the command line.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum RuleArg {
    List,
    View,
}

impl From<RuleArg> for RuleKind {
    fn from(arg: RuleArg) -> Self {
        match arg {
            RuleArg::List => RuleKind::List,
            RuleArg::View => RuleKind::View,
        }
    }
}

fn main() {
    // Initialize tracing
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive("basekit_cli=info".parse().unwrap()),
        )
        .with_writer(std::io::stderr)
        .init();

    let args = Args::parse();

    match run(args) {
        Ok(output) => println!("{}", output),
        Err(e) => {
            eprintln!("Error: {}", e);
            std::process::exit(e.exit_code());
        }
    }
}

fn run(args: Args) -> Result<String, CliError> {
    match args.command {
        Command::Explain(args) => run_explain(args),
        Command::Collections { schema } => {
            let catalog = load_catalog(&schema)?;
            let snapshot = catalog.snapshot();
            let mut table = Table::new();
            table.set_header(vec!["name", "id", "type", "fields"]);
            for collection in &snapshot.collections {
                table.add_row(vec![
                    collection.name.clone(),
                    collection.id.clone(),
                    format!("{:?}", collection.kind).to_lowercase(),
                    collection.fields.len().to_string(),
                ]);
            }
            Ok(table.to_string())
        }
    }
}

fn run_explain(args: ExplainArgs) -> Result<String, CliError> {
    let schema = load_catalog(&args.schema)?.snapshot();
    let request = match &args.request {
        Some(path) => Some(RequestFile::load(path)?.into_request_info(&schema)?),
        None => None,
    };

    let explanation = explain(
        schema,
        ExplainRequest {
            collection: args.collection,
            filters: args.filter,
            sort: args.sort,
            limit: args.limit,
            offset: args.offset,
            request,
            superuser: args.superuser,
            config: ResolverConfig::new()
                .with_max_relation_depth(args.max_depth)
                .with_rule(args.rule.into()),
        },
    )?;
    Ok(format_explanation(args.format, &explanation))
}

fn load_catalog(path: &Path) -> Result<Arc<Catalog>, CliError> {
    let bundle = SchemaBundle::from_path(path)?;
    let catalog = Catalog::with_schema(bundle)?;
    info!(
        path = %path.display(),
        version = catalog.current_version(),
        collections = catalog.list_collections().len(),
        "schema loaded"
    );
    Ok(Arc::new(catalog))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    const SCHEMA: &str = r#"[
        {"name": "users", "type": "auth", "listRule": ""},
        {
            "name": "posts",
            "listRule": "",
            "fields": [
                {"name": "title", "type": "text"},
                {"name": "author", "type": "relation", "collectionId": "users", "maxSelect": 1}
            ]
        }
    ]"#;

    fn write_file(contents: &str) -> tempfile::NamedTempFile {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(contents.as_bytes()).unwrap();
        file
    }

    fn parse(argv: &[&str]) -> Args {
        Args::try_parse_from(std::iter::once("basekit").chain(argv.iter().copied())).unwrap()
    }

    #[test]
    fn test_parse_args() {
        let args = parse(&[
            "explain", "-s", "schema.json", "-c", "posts", "-f", "title = 1", "-f", "id != ''",
            "--rule", "view", "--format", "json",
        ]);
        let Command::Explain(explain) = args.command else {
            panic!("expected explain");
        };
        assert_eq!(explain.filter, vec!["title = 1", "id != ''"]);
        assert_eq!(explain.rule, RuleArg::View);
        assert_eq!(explain.max_depth, DEFAULT_MAX_RELATION_DEPTH);
        assert_eq!(explain.format, OutputFormat::Json);
    }

    #[test]
    fn test_run_explain() {
        let schema = write_file(SCHEMA);
        let request = write_file(
            r#"{"auth": {"collection": "users", "record": {"id": "u1", "email": "a@b.c"}}}"#,
        );
        let path = schema.path().to_str().unwrap();
        let request_path = request.path().to_str().unwrap();

        let output = run(parse(&[
            "explain", "-s", path, "-c", "posts", "-f", "author = @request.auth.id", "-r",
            request_path,
        ]))
        .unwrap();
        assert_eq!(
            output,
            "SELECT `posts`.* FROM `posts` WHERE `posts`.`author` = {:p0}\n  p0 = 'u1'"
        );

        let err = run(parse(&["explain", "-s", path, "-c", "posts", "-f", "missing = 1"]))
            .unwrap_err();
        assert_eq!(err.exit_code(), 2);
    }

    #[test]
    fn test_run_collections() {
        let schema = write_file(SCHEMA);
        let output = run(parse(&[
            "collections",
            "-s",
            schema.path().to_str().unwrap(),
        ]))
        .unwrap();
        assert!(output.contains("posts"));
        assert!(output.contains("auth"));
    }
}
