//! StayPoints CLI - Command-line interface for stay-point detection
//!
//! Commands:
//! - detect: Find stay points in a trajectory file
//! - validate: Check every position of a trajectory file
//! - schema: Describe the input and output formats

use clap::{Parser, Subcommand, ValueEnum};
use std::fs;
use std::io::{self, Read};
use std::path::{Path, PathBuf};
use std::process::ExitCode;

use tracing::{debug, info, warn};
use tracing_subscriber::EnvFilter;

use staypoints::encoder::{StayPointReport, OUTPUT_SCHEMA};
use staypoints::schema::{PositionAdapter, RawPosition, INPUT_SCHEMA};
use staypoints::{
    ComputeError, StayPointDetector, StayPointParams, TrailingWindow, PRODUCER_NAME,
    STAYPOINTS_VERSION,
};

/// StayPoints - find where a trajectory stopped
#[derive(Parser)]
#[command(name = "staypoints")]
#[command(version = STAYPOINTS_VERSION)]
#[command(about = "Detect stay points in GPS trajectories", long_about = None)]
struct Cli {
    /// Enable debug logging (overridden by RUST_LOG)
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Detect stay points in a trajectory
    Detect {
        /// Input file path (use - for stdin)
        #[arg(short, long)]
        input: PathBuf,

        /// Output file path (use - for stdout)
        #[arg(short, long, default_value = "-")]
        output: PathBuf,

        /// Input format (inferred from the file extension when omitted)
        #[arg(long)]
        input_format: Option<InputFormat>,

        /// Output format
        #[arg(long, default_value = "json-pretty")]
        output_format: OutputFormat,

        /// Radius in meters a stay must remain within
        #[arg(long)]
        radius: Option<f64>,

        /// Duration in seconds a stay must exceed
        #[arg(long)]
        min_duration: Option<f64>,

        /// Parameters file (JSON); flags take precedence
        #[arg(long)]
        config: Option<PathBuf>,

        /// Close a stay that is still open when the trajectory ends
        #[arg(long)]
        emit_trailing: bool,
    },

    /// Validate every position of a trajectory
    Validate {
        /// Input file path (use - for stdin)
        #[arg(short, long)]
        input: PathBuf,

        /// Input format (inferred from the file extension when omitted)
        #[arg(long)]
        input_format: Option<InputFormat>,

        /// Output validation report as JSON
        #[arg(long)]
        json: bool,
    },

    /// Print schema information
    Schema {
        /// Schema to print (input or output)
        #[arg(value_enum)]
        schema_type: SchemaType,

        /// Output as JSON schema
        #[arg(long)]
        json_schema: bool,
    },
}

#[derive(Clone, Copy, Debug, ValueEnum)]
enum InputFormat {
    /// JSON array of positions
    Json,
    /// Newline-delimited JSON (one position per line)
    Ndjson,
    /// GPX document (first track)
    Gpx,
}

#[derive(Clone, ValueEnum)]
enum OutputFormat {
    /// Compact JSON report
    Json,
    /// Pretty-printed JSON report
    JsonPretty,
    /// One stay point record per line
    Ndjson,
}

#[derive(Clone, ValueEnum)]
enum SchemaType {
    /// Input schema (staypoints.position.v1)
    Input,
    /// Output schema (staypoints.v1)
    Output,
}

fn main() -> ExitCode {
    let cli = Cli::parse();

    let default_level = if cli.verbose { "debug" } else { "info" };
    tracing_subscriber::fmt()
        .with_writer(io::stderr)
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level)),
        )
        .init();

    match run(cli) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!(
                "{}",
                serde_json::to_string(&CliError::from(e))
                    .unwrap_or_else(|_| "Unknown error".to_string())
            );
            ExitCode::FAILURE
        }
    }
}

fn run(cli: Cli) -> Result<(), StayPointsCliError> {
    match cli.command {
        Commands::Detect {
            input,
            output,
            input_format,
            output_format,
            radius,
            min_duration,
            config,
            emit_trailing,
        } => {
            let params = resolve_params(config.as_deref(), radius, min_duration, emit_trailing)?;
            cmd_detect(&input, &output, input_format, output_format, params)
        }

        Commands::Validate {
            input,
            input_format,
            json,
        } => cmd_validate(&input, input_format, json),

        Commands::Schema {
            schema_type,
            json_schema,
        } => cmd_schema(schema_type, json_schema),
    }
}

fn resolve_params(
    config: Option<&Path>,
    radius: Option<f64>,
    min_duration: Option<f64>,
    emit_trailing: bool,
) -> Result<StayPointParams, StayPointsCliError> {
    let mut params = match config {
        Some(path) => {
            debug!(path = %path.display(), "loading parameters");
            StayPointParams::from_json(&fs::read_to_string(path)?)?
        }
        None => StayPointParams::default(),
    };

    if let Some(r) = radius {
        params.radius_meters = r;
    }
    if let Some(s) = min_duration {
        params.min_duration_seconds = s;
    }
    if emit_trailing {
        params.trailing_window = TrailingWindow::Emit;
    }

    params.validate()?;
    Ok(params)
}

fn cmd_detect(
    input: &Path,
    output: &Path,
    input_format: Option<InputFormat>,
    output_format: OutputFormat,
    params: StayPointParams,
) -> Result<(), StayPointsCliError> {
    let positions = read_positions(input, input_format)?;
    let output_data = detect_to_string(&positions, params, &output_format)?;

    if is_stdio(output) {
        print!("{}", output_data);
    } else {
        fs::write(output, output_data)?;
    }

    Ok(())
}

/// Run detection on parsed positions and render the report.
///
/// An empty trajectory is valid and renders an empty report.
fn detect_to_string(
    positions: &[RawPosition],
    params: StayPointParams,
    output_format: &OutputFormat,
) -> Result<String, StayPointsCliError> {
    let points = PositionAdapter::to_trajectory(positions)?;
    info!(
        points = points.len(),
        radius_meters = params.radius_meters,
        min_duration_seconds = params.min_duration_seconds,
        "detecting stay points"
    );

    let detector = StayPointDetector::new(params)?;
    let report = detector.detect_report(&points)?;
    info!(stay_points = report.stay_points.len(), "detection finished");

    format_output(&report, output_format)
}

fn cmd_validate(
    input: &Path,
    input_format: Option<InputFormat>,
    json: bool,
) -> Result<(), StayPointsCliError> {
    let positions = read_positions(input, input_format)?;
    let issues = PositionAdapter::validate_positions(&positions);

    let report = ValidationReport {
        total_positions: positions.len(),
        invalid_positions: issues.len(),
        errors: issues
            .into_iter()
            .map(|issue| ValidationErrorDetail {
                index: issue.index,
                error: issue.message,
            })
            .collect(),
    };

    if json {
        println!("{}", serde_json::to_string_pretty(&report)?);
    } else {
        println!("Validation Report");
        println!("=================");
        println!("Total positions:   {}", report.total_positions);
        println!("Invalid positions: {}", report.invalid_positions);

        if !report.errors.is_empty() {
            println!("\nErrors:");
            for err in &report.errors {
                println!("  - Position {}: {}", err.index, err.error);
            }
        }
    }

    if report.invalid_positions > 0 {
        Err(StayPointsCliError::ValidationFailed(report.invalid_positions))
    } else {
        Ok(())
    }
}

fn cmd_schema(schema_type: SchemaType, json_schema: bool) -> Result<(), StayPointsCliError> {
    match schema_type {
        SchemaType::Input => {
            if json_schema {
                println!("{}", get_input_json_schema());
            } else {
                println!("Input Schema: {}", INPUT_SCHEMA);
                println!();
                println!("A trajectory is a time-ordered list of positions:");
                println!();
                println!("- latitude  (alias: lat)            degrees, [-90, 90]");
                println!("- longitude (aliases: lon, lng)     degrees, [-180, 180]");
                println!("- timestamp (alias: time)           RFC 3339 string or epoch milliseconds (integer or float)");
                println!();
                println!("Accepted containers: JSON array, NDJSON, GPX (first track).");
                println!("Timestamps must never decrease from one position to the next.");
            }
        }
        SchemaType::Output => {
            if json_schema {
                println!("{}", get_output_json_schema());
            } else {
                println!("Output Schema: {}", OUTPUT_SCHEMA);
                println!();
                println!("- schema: {}", OUTPUT_SCHEMA);
                println!("- producer: {{ name, version }}");
                println!("- parameters: {{ radius_meters, min_duration_seconds, trailing_window }}");
                println!("- input_points: number of positions scanned");
                println!("- stay_points: array, in arrival order, of");
                println!("  {{ latitude, longitude, arrival, departure, dwell_seconds, radius_meters }}");
            }
        }
    }

    Ok(())
}

// Helper functions

fn is_stdio(path: &Path) -> bool {
    path.to_string_lossy() == "-"
}

fn read_input(input: &Path) -> Result<Vec<u8>, StayPointsCliError> {
    if is_stdio(input) {
        if atty::is(atty::Stream::Stdin) {
            warn!("reading trajectory from an interactive terminal; end input with Ctrl-D");
        }
        let mut buffer = Vec::new();
        io::stdin().read_to_end(&mut buffer)?;
        Ok(buffer)
    } else {
        Ok(fs::read(input)?)
    }
}

fn infer_format(input: &Path, explicit: Option<InputFormat>) -> InputFormat {
    if let Some(format) = explicit {
        return format;
    }
    match input
        .extension()
        .and_then(|ext| ext.to_str())
        .map(|ext| ext.to_ascii_lowercase())
        .as_deref()
    {
        Some("gpx") => InputFormat::Gpx,
        Some("ndjson") | Some("jsonl") => InputFormat::Ndjson,
        _ => InputFormat::Json,
    }
}

fn read_positions(
    input: &Path,
    input_format: Option<InputFormat>,
) -> Result<Vec<RawPosition>, StayPointsCliError> {
    let format = infer_format(input, input_format);
    debug!(input = %input.display(), ?format, "reading positions");
    parse_positions(read_input(input)?, format)
}

fn parse_positions(
    data: Vec<u8>,
    format: InputFormat,
) -> Result<Vec<RawPosition>, StayPointsCliError> {
    let positions = match format {
        InputFormat::Json => PositionAdapter::parse_array(&utf8(data)?)?,
        InputFormat::Ndjson => PositionAdapter::parse_ndjson(&utf8(data)?)?,
        #[cfg(feature = "gpx")]
        InputFormat::Gpx => PositionAdapter::parse_gpx(&data)?,
        #[cfg(not(feature = "gpx"))]
        InputFormat::Gpx => {
            return Err(StayPointsCliError::ParseError(
                "built without GPX support (enable the `gpx` feature)".to_string(),
            ))
        }
    };
    Ok(positions)
}

fn utf8(data: Vec<u8>) -> Result<String, StayPointsCliError> {
    String::from_utf8(data)
        .map_err(|e| StayPointsCliError::ParseError(format!("Input is not UTF-8: {}", e)))
}

fn format_output(
    report: &StayPointReport,
    format: &OutputFormat,
) -> Result<String, StayPointsCliError> {
    match format {
        OutputFormat::Ndjson => {
            let mut out = String::new();
            for record in &report.stay_points {
                out.push_str(&serde_json::to_string(record)?);
                out.push('\n');
            }
            Ok(out)
        }
        OutputFormat::Json => Ok(serde_json::to_string(report)? + "\n"),
        OutputFormat::JsonPretty => Ok(serde_json::to_string_pretty(report)? + "\n"),
    }
}

fn get_input_json_schema() -> String {
    serde_json::json!({
        "$schema": "https://json-schema.org/draft/2020-12/schema",
        "title": INPUT_SCHEMA,
        "description": "A single trajectory position",
        "type": "object",
        "properties": {
            "latitude": { "type": "number", "minimum": -90, "maximum": 90 },
            "lat": { "type": "number", "minimum": -90, "maximum": 90 },
            "longitude": { "type": "number", "minimum": -180, "maximum": 180 },
            "lon": { "type": "number", "minimum": -180, "maximum": 180 },
            "lng": { "type": "number", "minimum": -180, "maximum": 180 },
            "timestamp": {
                "oneOf": [
                    { "type": "string", "format": "date-time" },
                    { "type": "number", "description": "epoch milliseconds" }
                ]
            },
            "time": {
                "oneOf": [
                    { "type": "string", "format": "date-time" },
                    { "type": "number", "description": "epoch milliseconds" }
                ]
            }
        }
    })
    .to_string()
}

fn get_output_json_schema() -> String {
    serde_json::json!({
        "$schema": "https://json-schema.org/draft/2020-12/schema",
        "title": OUTPUT_SCHEMA,
        "description": "Stay point detection report",
        "type": "object",
        "required": ["schema", "producer", "parameters", "input_points", "stay_points"],
        "properties": {
            "schema": { "type": "string", "const": OUTPUT_SCHEMA },
            "producer": {
                "type": "object",
                "properties": {
                    "name": { "type": "string", "const": PRODUCER_NAME },
                    "version": { "type": "string" }
                }
            },
            "parameters": {
                "type": "object",
                "properties": {
                    "radius_meters": { "type": "number", "exclusiveMinimum": 0 },
                    "min_duration_seconds": { "type": "number", "exclusiveMinimum": 0 },
                    "trailing_window": { "type": "string", "enum": ["discard", "emit"] }
                }
            },
            "input_points": { "type": "integer", "minimum": 0 },
            "stay_points": {
                "type": "array",
                "items": {
                    "type": "object",
                    "required": ["latitude", "longitude", "arrival", "departure", "dwell_seconds", "radius_meters"],
                    "properties": {
                        "latitude": { "type": "number" },
                        "longitude": { "type": "number" },
                        "arrival": { "type": "string", "format": "date-time" },
                        "departure": { "type": "string", "format": "date-time" },
                        "dwell_seconds": { "type": "number", "minimum": 0 },
                        "radius_meters": { "type": "number" }
                    }
                }
            }
        }
    })
    .to_string()
}

// Error types

#[derive(Debug)]
enum StayPointsCliError {
    Io(io::Error),
    Compute(ComputeError),
    Json(serde_json::Error),
    ValidationFailed(usize),
    ParseError(String),
}

impl From<io::Error> for StayPointsCliError {
    fn from(e: io::Error) -> Self {
        StayPointsCliError::Io(e)
    }
}

impl From<ComputeError> for StayPointsCliError {
    fn from(e: ComputeError) -> Self {
        StayPointsCliError::Compute(e)
    }
}

impl From<serde_json::Error> for StayPointsCliError {
    fn from(e: serde_json::Error) -> Self {
        StayPointsCliError::Json(e)
    }
}

#[derive(serde::Serialize)]
struct CliError {
    code: String,
    message: String,
    hint: Option<String>,
}

impl From<StayPointsCliError> for CliError {
    fn from(e: StayPointsCliError) -> Self {
        match e {
            StayPointsCliError::Io(e) => CliError {
                code: "IO_ERROR".to_string(),
                message: e.to_string(),
                hint: Some("Check file paths and permissions".to_string()),
            },
            StayPointsCliError::Compute(e) => compute_error(e),
            StayPointsCliError::Json(e) => CliError {
                code: "JSON_ERROR".to_string(),
                message: e.to_string(),
                hint: Some("Check JSON syntax".to_string()),
            },
            StayPointsCliError::ValidationFailed(count) => CliError {
                code: "VALIDATION_FAILED".to_string(),
                message: format!("{} positions failed validation", count),
                hint: Some("Fix validation errors and retry".to_string()),
            },
            StayPointsCliError::ParseError(msg) => CliError {
                code: "PARSE_ERROR".to_string(),
                message: msg,
                hint: Some("Check input format".to_string()),
            },
        }
    }
}

fn compute_error(e: ComputeError) -> CliError {
    let (code, hint) = match &e {
        ComputeError::InvalidParameter { .. } => (
            "INVALID_PARAMETER",
            "--radius and --min-duration must be positive numbers",
        ),
        ComputeError::MalformedPoint { .. } => (
            "MALFORMED_POINT",
            "Run 'staypoints validate' for details",
        ),
        ComputeError::Cancelled => ("CANCELLED", "Retry the detection"),
        ComputeError::GpxError(_) => ("GPX_ERROR", "Ensure input is a GPX 1.0/1.1 document"),
        ComputeError::MissingField(_) => ("MISSING_FIELD", "Ensure the GPX file has a <trk>"),
        ComputeError::EncodingError(_) => ("ENCODING_ERROR", "Report this as a bug"),
        _ => ("PARSE_ERROR", "Ensure input matches the staypoints.position.v1 schema"),
    };
    CliError {
        code: code.to_string(),
        message: e.to_string(),
        hint: Some(hint.to_string()),
    }
}

// Report types

#[derive(serde::Serialize)]
struct ValidationReport {
    total_positions: usize,
    invalid_positions: usize,
    errors: Vec<ValidationErrorDetail>,
}

#[derive(serde::Serialize)]
struct ValidationErrorDetail {
    index: usize,
    error: String,
}
