//! `routescope`: map HTTP routes to the source files that serve them.

use std::path::{Path, PathBuf};
use std::time::Duration;

use routescope::search::default_search;
use routescope::selection::discover_tests_for_http_paths;
use routescope::util::git_root;
use routescope::{IndexOptions, RouteIndexStore};
use tracing_subscriber::EnvFilter;

#[derive(Debug, Default)]
struct CliArgs {
    root: Option<PathBuf>,
    routes: Vec<String>,
    sources: Vec<String>,
    tests: bool,
    list: bool,
    timeout: Option<Duration>,
}

fn parse_args(args: &[String]) -> Result<CliArgs, String> {
    let mut cli = CliArgs::default();
    let mut i = 0;

    let value = |i: usize, flag: &str| -> Result<String, String> {
        args.get(i)
            .cloned()
            .ok_or_else(|| format!("{flag} requires an argument"))
    };

    while i < args.len() {
        match args[i].as_str() {
            "--root" | "-r" => {
                i += 1;
                cli.root = Some(PathBuf::from(value(i, "--root")?));
            }
            "--route" => {
                i += 1;
                cli.routes.push(value(i, "--route")?);
            }
            "--source" | "-s" => {
                i += 1;
                cli.sources.push(value(i, "--source")?);
            }
            "--timeout" => {
                i += 1;
                let raw = value(i, "--timeout")?;
                let ms: u64 = raw
                    .parse()
                    .map_err(|_| format!("--timeout: invalid milliseconds '{raw}'"))?;
                cli.timeout = Some(Duration::from_millis(ms));
            }
            "--tests" | "-t" => cli.tests = true,
            "--list" | "-l" => cli.list = true,
            arg if arg.starts_with('-') => {
                return Err(format!("unknown option: {arg}"));
            }
            // Bare arguments are routes when they look like one, sources otherwise.
            arg if arg.starts_with('/') && !Path::new(arg).exists() => cli.routes.push(arg.to_string()),
            arg => cli.sources.push(arg.to_string()),
        }
        i += 1;
    }

    if cli.routes.is_empty() && cli.sources.is_empty() && !cli.list {
        return Err("nothing to do: pass --route, --source or --list".to_string());
    }
    if cli.list && cli.tests {
        return Err("--list and --tests are mutually exclusive".to_string());
    }

    Ok(cli)
}

fn init_logging() {
    let filter = std::env::var("ROUTESCOPE_LOG")
        .ok()
        .and_then(|v| EnvFilter::try_new(v).ok())
        .or_else(|| EnvFilter::try_from_default_env().ok())
        .unwrap_or_else(|| EnvFilter::new("warn"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();
}

fn main() {
    let raw: Vec<String> = std::env::args().skip(1).collect();

    if raw.is_empty() || raw[0] == "-h" || raw[0] == "--help" {
        print_help();
        std::process::exit(0);
    }

    let args = match parse_args(&raw) {
        Ok(a) => a,
        Err(msg) => {
            eprintln!("routescope: {msg}");
            std::process::exit(1);
        }
    };

    init_logging();

    let cwd = match std::env::current_dir() {
        Ok(dir) => dir,
        Err(e) => {
            eprintln!("routescope: cannot read current directory: {e}");
            std::process::exit(1);
        }
    };
    let root = args
        .root
        .clone()
        .or_else(|| git_root(&cwd))
        .unwrap_or_else(|| cwd.clone());

    let mut options = IndexOptions::from_env();
    if let Some(timeout) = args.timeout {
        options = options.with_timeout(timeout);
    }
    let search = default_search(&options.search_binary);
    let store = RouteIndexStore::new(options.clone());

    if args.list {
        let index = store.index_for(&root);
        for (route, methods) in index.routes() {
            let methods: Vec<String> = methods
                .iter()
                .map(|m| if *m == "*" { "ALL".to_string() } else { m.to_uppercase() })
                .collect();
            println!("{:<8} {route}", methods.join(","));
        }
        return;
    }

    let mut routes_for_tests: Vec<String> = args.routes.clone();

    for route in &args.routes {
        let sources = store.resolve_sources_for_http_routes(&root, std::slice::from_ref(route));
        println!("{route}");
        if sources.is_empty() {
            println!("  (no sources)");
        }
        for source in sources {
            println!("  {}", display_path(&source, &root));
        }
    }

    for source in &args.sources {
        let source_path = if Path::new(source).is_absolute() {
            PathBuf::from(source)
        } else {
            cwd.join(source)
        };
        let routes = store.http_routes_for_source(&root, &source_path);
        println!("{source}");
        if routes.is_empty() {
            println!("  (no routes)");
        }
        for route in &routes {
            println!("  {route}");
        }
        routes_for_tests.extend(routes);
    }

    if args.tests {
        routes_for_tests.sort();
        routes_for_tests.dedup();
        let tests = discover_tests_for_http_paths(
            &search,
            &root,
            &routes_for_tests,
            &options.exclude_globs,
            options.search_timeout,
        );
        println!("tests");
        if tests.is_empty() {
            println!("  (none)");
        }
        for test in tests {
            println!("  {}", display_path(&test, &root));
        }
    }
}

/// Repo-relative when the path lives under `root`.
fn display_path(path: &str, root: &Path) -> String {
    let root = routescope::util::canonical_posix(root);
    path.strip_prefix(&root)
        .map(|rest| rest.trim_start_matches('/').to_string())
        .unwrap_or_else(|| path.to_string())
}

fn print_help() {
    eprintln!("routescope: map HTTP routes to the files that serve them");
    eprintln!("Usage: routescope [options] [/route ...] [file ...]");
    eprintln!();
    eprintln!("Options:");
    eprintln!("  --route PATH         Files serving PATH (e.g. /api/users/42)");
    eprintln!("  --source, -s FILE    Routes served by FILE");
    eprintln!("  --tests, -t          Also list test files mentioning the routes");
    eprintln!("  --list, -l           List every discovered route");
    eprintln!("  --root, -r DIR       Repository root (default: git root or cwd)");
    eprintln!("  --timeout MS         Search budget in milliseconds");
    eprintln!("  -h, --help           Show help");
    eprintln!();
    eprintln!("Environment:");
    eprintln!("  ROUTESCOPE_LOG                 Log filter (falls back to RUST_LOG, default warn)");
    eprintln!("  ROUTESCOPE_RG                  Search binary (default rg)");
    eprintln!("  ROUTESCOPE_SEARCH_TIMEOUT_MS   Search budget in milliseconds");
}
