use std::env;
use std::path::PathBuf;
use std::process;
use std::sync::Arc;

use anyhow::{anyhow, bail, Context, Result};
use fusion_executor::{execute_query_plan, ExecutionOptions, SubgraphTransportMap};
use fusion_package::{
    read_subgraph_package, write_subgraph_package, FusionGraphPackage, PackageAccess,
    SubgraphFiles,
};
use fusion_query_planner::{parse_operation, CancellationToken, Planner, QueryPlan};
use fusion_router_config::log::{LogFormat, LoggingConfig};
use fusion_router_config::FusionRouterConfig;
use serde_json::{Map, Value as JsonValue};
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

const USAGE: &str = "Usage: fusion-dev-cli <command> [...]

Commands:
  subgraph-package <out> <schema> <transport-config> [extension...]
  compose <fusion-package> <subgraph-package>...
  remove <fusion-package> <subgraph-name>
  schema <fusion-package>
  plan <fusion-package> <operation-file> [--json]
  execute <fusion-package> <operation-file> [variables-file]";

fn init_logger(config: &LoggingConfig) {
    let filter = EnvFilter::new(config.env_filter_str());

    let (tree_layer, json_layer) = match config.format {
        LogFormat::Text => (
            Some(
                tracing_tree::HierarchicalLayer::new(2)
                    .with_bracketed_fields(true)
                    .with_deferred_spans(false)
                    .with_wraparound(25)
                    .with_indent_lines(true)
                    .with_timer(tracing_tree::time::Uptime::default())
                    .with_thread_names(false)
                    .with_thread_ids(false)
                    .with_targets(false)
                    .with_writer(std::io::stderr),
            ),
            None,
        ),
        LogFormat::Json => (
            None,
            Some(
                tracing_subscriber::fmt::layer()
                    .json()
                    .with_writer(std::io::stderr),
            ),
        ),
    };

    tracing_subscriber::registry()
        .with(tree_layer)
        .with(json_layer)
        .with(filter)
        .init();
}

#[tokio::main]
async fn main() {
    let config = match fusion_router_config::load_config(env::var("FUSION_CONFIG").ok()) {
        Ok(config) => config,
        Err(err) => {
            eprintln!("{}", err);
            process::exit(1);
        }
    };
    init_logger(&config.log);

    let args: Vec<String> = env::args().collect();

    if args.len() < 3 {
        eprintln!("{}", USAGE);
        process::exit(1);
    }

    if let Err(err) = run(&config, &args).await {
        eprintln!("{:#}", err);
        process::exit(1);
    }
}

async fn run(config: &FusionRouterConfig, args: &[String]) -> Result<()> {
    match args[1].as_str() {
        "subgraph-package" => {
            let [output, schema, transport_config, extensions @ ..] = &args[2..] else {
                bail!("{}", USAGE);
            };
            let files = SubgraphFiles {
                schema_file: PathBuf::from(schema),
                transport_config_file: PathBuf::from(transport_config),
                extension_files: extensions.iter().map(PathBuf::from).collect(),
            };
            write_subgraph_package(output, &files).await?;
            info!(path = %output, "subgraph package created");
        }
        "compose" => {
            let [package_path, subgraph_paths @ ..] = &args[2..] else {
                bail!("{}", USAGE);
            };
            let mut subgraphs = Vec::with_capacity(subgraph_paths.len());
            for path in subgraph_paths {
                subgraphs.push(read_subgraph_package(path).await?);
            }

            let mut package = FusionGraphPackage::open(package_path, PackageAccess::ReadWrite).await?;
            package.compose(subgraphs)?;
            package.flush().await?;
            info!(
                path = %package_path,
                subgraphs = package.subgraph_configurations().len(),
                "fusion package composed"
            );
        }
        "remove" => {
            let [package_path, name] = &args[2..] else {
                bail!("{}", USAGE);
            };
            let mut package = FusionGraphPackage::open(package_path, PackageAccess::ReadWrite).await?;
            if !package.remove_subgraph(name)? {
                bail!("subgraph \"{}\" is not part of \"{}\"", name, package_path);
            }
            package.flush().await?;
        }
        "schema" => {
            let package = FusionGraphPackage::open(&args[2], PackageAccess::Read).await?;
            println!("{}", package.schema().unwrap_or_default());
        }
        "plan" => {
            let [package_path, operation_path, ..] = &args[2..] else {
                bail!("{}", USAGE);
            };
            let (_, plan) = plan(config, package_path, operation_path, &Map::new()).await?;
            if args.contains(&"--json".into()) {
                println!("{}", serde_json::to_string_pretty(&plan)?);
            } else {
                println!("{}", plan);
            }
        }
        "execute" => {
            let [package_path, operation_path, rest @ ..] = &args[2..] else {
                bail!("{}", USAGE);
            };
            let variables = match rest.first() {
                Some(path) => read_variables(path).await?,
                None => Map::new(),
            };
            let (package, plan) = plan(config, package_path, operation_path, &variables).await?;

            let traffic_shaping = &config.traffic_shaping;
            let transports = SubgraphTransportMap::from_subgraph_configurations(
                package.subgraph_configurations(),
                Some(traffic_shaping.subgraph_timeout),
            )?;
            let options = ExecutionOptions {
                max_concurrency: traffic_shaping.max_concurrency,
                request_timeout: traffic_shaping.request_timeout,
            };
            let response = execute_query_plan(
                &plan,
                &variables,
                &transports,
                &options,
                &tokio_util::sync::CancellationToken::new(),
            )
            .await;

            println!("{}", serde_json::to_string_pretty(&response)?);
        }
        _ => {
            bail!(
                "Unknown command. Available commands: subgraph-package, compose, remove, schema, plan, execute"
            );
        }
    };

    Ok(())
}

async fn plan(
    config: &FusionRouterConfig,
    package_path: &str,
    operation_path: &str,
    variables: &Map<String, JsonValue>,
) -> Result<(FusionGraphPackage, QueryPlan)> {
    let package = FusionGraphPackage::open(package_path, PackageAccess::Read).await?;
    let graph = package
        .fusion_graph()
        .cloned()
        .ok_or_else(|| anyhow!("package \"{}\" has no subgraphs", package_path))?;

    let document_text = tokio::fs::read_to_string(operation_path)
        .await
        .with_context(|| format!("Unable to read \"{}\"", operation_path))?;
    let document = parse_operation(&document_text)?;

    let planner = Planner::new(Arc::new(graph));
    let cancellation_token = CancellationToken::with_timeout(config.query_planner.timeout);
    let plan = planner.plan(&document, None, variables, &cancellation_token)?;

    Ok((package, plan))
}

async fn read_variables(path: &str) -> Result<Map<String, JsonValue>> {
    let raw = tokio::fs::read_to_string(path)
        .await
        .with_context(|| format!("Unable to read \"{}\"", path))?;

    match serde_json::from_str(&raw)? {
        JsonValue::Object(variables) => Ok(variables),
        JsonValue::Null => Ok(Map::new()),
        _ => bail!("variables in \"{}\" must be a JSON object", path),
    }
}
