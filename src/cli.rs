//! Subcommand implementations for the smartroute CLI.

use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use clap::{Args, Subcommand, ValueEnum};
use serde::Serialize;
use smartroute_config::{
    CliOverrides, LoggingConfig, ProxyIndex, Settings, apply_overrides, build_profile,
    build_routing_config, load_settings, validate_settings,
};
use smartroute_rules::rule::RuleKind;
use smartroute_rules::{
    CompiledMatcher, DecisionEngine, ProxifiedStatus, RequestContext, RoutingDecision,
    compile_pattern,
};
use tracing::{debug, info};
use tracing_subscriber::{EnvFilter, fmt, layer::SubscriberExt, util::SubscriberInitExt};

type CliResult = Result<(), Box<dyn std::error::Error>>;

#[derive(Args, Debug, Clone)]
pub struct GlobalArgs {
    /// Settings file path (toml/json/jsonc/yaml).
    #[arg(short, long, global = true, default_value = "smartroute.toml")]
    pub config: PathBuf,

    #[command(flatten)]
    pub overrides: CliOverrides,
}

#[derive(Subcommand, Debug, Clone)]
pub enum Command {
    /// Validate settings and print compiled rule counts per profile.
    Check,

    /// Decide a single URL against the active profile.
    Decide(DecideArgs),

    /// Emit the decision script for the active profile.
    Pac(PacArgs),

    /// Show how a single pattern is classified.
    Compile(CompileArgs),
}

#[derive(Args, Debug, Clone)]
pub struct DecideArgs {
    /// URL to decide.
    pub url: String,

    /// Host name reported with the request; taken from the URL when absent.
    #[arg(long)]
    pub host: Option<String>,

    /// Decide as a private-browsing request.
    #[arg(long)]
    pub incognito: bool,

    /// Print the decision as JSON.
    #[arg(long)]
    pub json: bool,
}

#[derive(Args, Debug, Clone)]
pub struct PacArgs {
    /// Emit the incognito profile's script.
    #[arg(long)]
    pub incognito: bool,

    /// Write the script to a file instead of stdout.
    #[arg(short, long)]
    pub output: Option<PathBuf>,
}

#[derive(Args, Debug, Clone)]
pub struct CompileArgs {
    /// Pattern or host to compile.
    pub pattern: String,

    /// Interpretation of the pattern.
    #[arg(long, value_enum, default_value_t = PatternKind::Auto)]
    pub kind: PatternKind,
}

/// Command-line spelling of [`RuleKind`], named as in settings files.
#[derive(Clone, Copy, Debug, PartialEq, Eq, ValueEnum)]
#[value(rename_all = "snake_case")]
pub enum PatternKind {
    Auto,
    Domain,
    DomainSubdomain,
    DomainAndPath,
    DomainSubdomainAndPath,
    Url,
    Exact,
    RegexHost,
    RegexUrl,
    MatchPattern,
}

impl From<PatternKind> for RuleKind {
    fn from(kind: PatternKind) -> Self {
        match kind {
            PatternKind::Auto => RuleKind::Auto,
            PatternKind::Domain => RuleKind::Domain,
            PatternKind::DomainSubdomain => RuleKind::DomainSubdomain,
            PatternKind::DomainAndPath => RuleKind::DomainAndPath,
            PatternKind::DomainSubdomainAndPath => RuleKind::DomainSubdomainAndPath,
            PatternKind::Url => RuleKind::Url,
            PatternKind::Exact => RuleKind::Exact,
            PatternKind::RegexHost => RuleKind::RegexHost,
            PatternKind::RegexUrl => RuleKind::RegexUrl,
            PatternKind::MatchPattern => RuleKind::MatchPattern,
        }
    }
}

/// Run a subcommand.
pub fn run(global: GlobalArgs, command: Command) -> CliResult {
    if let Command::Compile(args) = &command {
        init_tracing(&logging_from_overrides(&global.overrides));
        return compile(args);
    }

    let settings = load(&global)?;
    init_tracing(&settings.logging);
    let base_dir = global.config.parent();
    match command {
        Command::Check => check(&settings, base_dir),
        Command::Decide(args) => decide(&settings, base_dir, &args),
        Command::Pac(args) => pac(&settings, base_dir, &args),
        Command::Compile(args) => compile(&args),
    }
}

fn load(global: &GlobalArgs) -> Result<Settings, Box<dyn std::error::Error>> {
    let mut settings = load_settings(&global.config)?;
    apply_overrides(&mut settings, &global.overrides);
    validate_settings(&settings)?;
    Ok(settings)
}

fn logging_from_overrides(overrides: &CliOverrides) -> LoggingConfig {
    LoggingConfig {
        level: overrides.log_level.clone(),
        format: overrides.log_format.clone(),
        ..LoggingConfig::default()
    }
}

fn engine(settings: &Settings, base_dir: Option<&Path>) -> DecisionEngine {
    DecisionEngine::new(build_routing_config(settings, base_dir))
}

fn check(settings: &Settings, base_dir: Option<&Path>) -> CliResult {
    let proxies = ProxyIndex::new(&settings.proxies);
    println!("proxies: {}", settings.proxies.len());
    for profile in &settings.profiles {
        let compiled = build_profile(profile, &proxies, base_dir);
        let summary = compiled.compiled_rules.summary();
        let active = if settings.active_profile.as_deref() == Some(profile.id.as_str()) {
            " (active)"
        } else {
            ""
        };
        println!(
            "{}{active}: {} whitelist={} rules={} whitelist_subscription={} subscription_rules={}",
            profile.id,
            profile.profile_type.as_str(),
            summary.whitelist,
            summary.rules,
            summary.whitelist_subscription,
            summary.subscription_rules,
        );
    }
    info!(profiles = settings.profiles.len(), "settings are valid");
    Ok(())
}

#[derive(Serialize)]
struct DecisionReport<'a> {
    url: &'a str,
    directive: String,
    proxified: ProxifiedStatus,
    #[serde(flatten)]
    decision: &'a RoutingDecision,
}

fn decide(settings: &Settings, base_dir: Option<&Path>, args: &DecideArgs) -> CliResult {
    let url = url::Url::parse(&args.url)?;
    let host = args
        .host
        .clone()
        .or_else(|| url.host_str().map(str::to_string));
    debug!(url = %url, host = ?host, "canonicalized request");

    let engine = engine(settings, base_dir);
    let mut ctx = RequestContext::new(url.as_str()).incognito(args.incognito);
    ctx.host = host.as_deref();
    let decision = engine.decide_with_context(&ctx);

    if args.json {
        let report = DecisionReport {
            url: url.as_str(),
            directive: decision.directive(),
            proxified: decision.proxified(),
            decision: &decision,
        };
        println!("{}", serde_json::to_string_pretty(&report)?);
        return Ok(());
    }

    println!("directive: {}", decision.directive());
    println!("status: {}", decision.status.as_str());
    if let Some(rule) = &decision.matched_rule {
        println!(
            "rule: {} [{} {:?}] {}",
            rule.rule_id, rule.source, rule.rule_type, rule.pattern
        );
    }
    Ok(())
}

fn pac(settings: &Settings, base_dir: Option<&Path>, args: &PacArgs) -> CliResult {
    let engine = engine(settings, base_dir);
    let script = engine
        .emit_script(args.incognito)
        .ok_or("no active profile to emit a script for")?;
    match &args.output {
        Some(path) => {
            fs::write(path, &script)?;
            info!(path = %path.display(), bytes = script.len(), "decision script written");
        }
        None => print!("{script}"),
    }
    Ok(())
}

fn compile(args: &CompileArgs) -> CliResult {
    let matcher = compile_pattern(&args.pattern, args.kind.into())?;
    println!("type: {:?}", matcher.rule_type());
    match &matcher {
        CompiledMatcher::RegexUrl(regex) | CompiledMatcher::RegexHost(regex) => {
            let flags = if regex.ignore_case() { " (ignore case)" } else { "" };
            println!("regex: {}{flags}", regex.source());
        }
        _ => println!("search: {}", matcher.search().unwrap_or_default()),
    }
    if let Some(host) = matcher.host_name() {
        println!("host: {host}");
    }
    Ok(())
}

/// Install the global tracing subscriber.
pub fn init_tracing(config: &LoggingConfig) {
    let base_level = config.level.as_deref().unwrap_or("info");
    let mut filter_str = base_level.to_string();

    for (module, level) in &config.filters {
        filter_str.push(',');
        filter_str.push_str(module);
        filter_str.push('=');
        filter_str.push_str(level);
    }

    let filter = EnvFilter::try_new(&filter_str).unwrap_or_else(|_| EnvFilter::new("info"));

    let format = config.format.as_deref().unwrap_or("pretty");
    let output = config.output.as_deref().unwrap_or("stderr");

    // A subscriber already installed (e.g. by a test harness) wins.
    let _ = match (format, output) {
        ("json", "stdout") => {
            tracing_subscriber::registry()
                .with(filter)
                .with(fmt::layer().json().with_writer(io::stdout))
                .try_init()
        }
        ("json", _) => {
            tracing_subscriber::registry()
                .with(filter)
                .with(fmt::layer().json().with_writer(io::stderr))
                .try_init()
        }
        ("compact", "stdout") => {
            tracing_subscriber::registry()
                .with(filter)
                .with(fmt::layer().compact().with_writer(io::stdout))
                .try_init()
        }
        ("compact", _) => {
            tracing_subscriber::registry()
                .with(filter)
                .with(fmt::layer().compact().with_writer(io::stderr))
                .try_init()
        }
        (_, "stdout") => {
            tracing_subscriber::registry()
                .with(filter)
                .with(fmt::layer().with_writer(io::stdout))
                .try_init()
        }
        _ => {
            tracing_subscriber::registry()
                .with(filter)
                .with(fmt::layer().with_writer(io::stderr))
                .try_init()
        }
    };
}
