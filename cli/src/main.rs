use std::sync::Arc;
use std::time::Duration;

use clap::{Args, Parser, Subcommand};
use tracing_subscriber::EnvFilter;

use wishkart::auth::notify::Severity;
use wishkart::auth::{AuthErrorKind, AuthHolder, AuthState, Notice, Notifier, ProfilePoll, SignupOutcome};
use wishkart::config::{
    ConfigError, DEFAULT_PROFILE_POLL_ATTEMPTS, DEFAULT_PROFILE_POLL_BASE_MS, DEFAULT_PROFILE_POLL_MAX_MS,
    SupabaseConfig,
};
use wishkart::data::{DataError, RestDataStore};
use wishkart::session_store::{AuthApi, HostedSessionStore, Identity, StoreError};

const SETTLE_TIMEOUT: Duration = Duration::from_secs(5);

#[derive(Debug, thiserror::Error)]
enum CliError {
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error("auth client init failed: {0}")]
    Store(#[from] StoreError),
    #[error("data client init failed: {0}")]
    Data(#[from] DataError),
    #[error(transparent)]
    Auth(#[from] AuthErrorKind),
    #[error("not signed in")]
    NotSignedIn,
}

#[derive(Parser, Debug)]
#[command(name = "wishkart-cli", about = "WishKart account CLI")]
struct Cli {
    #[arg(long, env = "WISHKART_SUPABASE_URL")]
    supabase_url: String,

    #[arg(long, env = "WISHKART_SUPABASE_ANON_KEY", hide_env_values = true)]
    anon_key: String,

    /// Where the signed-in session is kept between runs.
    #[arg(long, env = "WISHKART_SESSION_FILE", default_value = ".wishkart-session.json")]
    session_file: String,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Sign in with email and password.
    Signin(Credentials),
    /// Create an account.
    Signup(SignupArgs),
    /// Sign out and forget the stored session.
    Signout,
    /// Show the signed-in user.
    Whoami,
}

#[derive(Args, Debug)]
struct Credentials {
    #[arg(long)]
    email: String,
    #[arg(long, env = "WISHKART_PASSWORD", hide_env_values = true)]
    password: String,
}

#[derive(Args, Debug)]
struct SignupArgs {
    #[command(flatten)]
    credentials: Credentials,
    /// Display name stored on the profile.
    #[arg(long)]
    name: String,
}

/// Prints notices to stderr so stdout stays scriptable.
struct ConsoleNotifier;

impl Notifier for ConsoleNotifier {
    fn notify(&self, notice: Notice) {
        match notice.severity {
            Severity::Info => eprintln!("{}: {}", notice.title, notice.description),
            Severity::Destructive => eprintln!("error: {}: {}", notice.title, notice.description),
        }
    }
}

#[tokio::main]
async fn main() -> Result<(), CliError> {
    let _ = dotenvy::dotenv();
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")))
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let config = SupabaseConfig::from_lookup(&|key: &str| match key {
        "WISHKART_SUPABASE_URL" => Some(cli.supabase_url.clone()),
        "WISHKART_SUPABASE_ANON_KEY" => Some(cli.anon_key.clone()),
        _ => std::env::var(key).ok(),
    })?;

    let gateway = Arc::new(AuthApi::new(&config)?);
    let data = Arc::new(RestDataStore::new(&config)?);
    let store = Arc::new(HostedSessionStore::open(gateway, &cli.session_file).await);
    let poll = ProfilePoll {
        attempts: DEFAULT_PROFILE_POLL_ATTEMPTS,
        base_delay: Duration::from_millis(DEFAULT_PROFILE_POLL_BASE_MS),
        max_delay: Duration::from_millis(DEFAULT_PROFILE_POLL_MAX_MS),
    };
    let holder = AuthHolder::new(store, Arc::new(ConsoleNotifier)).with_profile_check(data, poll);
    let _subscription = holder.start().await;

    match cli.command {
        Command::Signin(creds) => run_signin(&holder, creds).await,
        Command::Signup(args) => run_signup(&holder, args).await,
        Command::Signout => run_signout(&holder).await,
        Command::Whoami => run_whoami(&holder),
    }
}

async fn run_signin(holder: &AuthHolder, creds: Credentials) -> Result<(), CliError> {
    holder.sign_in(&creds.email, &creds.password).await?;
    let identity = settle(holder, |s| s.is_signed_in_as(&creds.email))
        .await
        .and_then(|s| s.identity)
        .ok_or(CliError::NotSignedIn)?;
    print_identity(&identity);
    Ok(())
}

async fn run_signup(holder: &AuthHolder, args: SignupArgs) -> Result<(), CliError> {
    let email = &args.credentials.email;
    let outcome = holder
        .sign_up(email, &args.credentials.password, &args.name)
        .await?;
    match outcome {
        SignupOutcome::AccountCreatedWithSession => {
            let identity = settle(holder, |s| s.is_signed_in_as(email))
                .await
                .and_then(|s| s.identity)
                .ok_or(CliError::NotSignedIn)?;
            print_identity(&identity);
        }
        SignupOutcome::AccountCreatedPendingConfirmation => println!("pending confirmation"),
    }
    Ok(())
}

async fn run_signout(holder: &AuthHolder) -> Result<(), CliError> {
    holder.sign_out().await?;
    settle(holder, |s| s.identity.is_none()).await;
    println!("signed out");
    Ok(())
}

fn run_whoami(holder: &AuthHolder) -> Result<(), CliError> {
    let identity = holder.state().identity.ok_or(CliError::NotSignedIn)?;
    print_identity(&identity);
    Ok(())
}

/// Wait until the holder has applied the store's event for the call just made.
///
/// `done` must only hold for the new state: a restored session for another
/// user is already in the holder when a sign-in returns.
async fn settle(holder: &AuthHolder, done: impl FnMut(&AuthState) -> bool) -> Option<AuthState> {
    let settled = tokio::time::timeout(SETTLE_TIMEOUT, holder.wait_until(done))
        .await
        .ok();
    if settled.is_none() {
        eprintln!("warning: timed out waiting for session change");
    }
    settled
}

fn print_identity(identity: &Identity) {
    match &identity.display_name {
        Some(name) => println!("{} <{}> {}", name, identity.email, identity.id),
        None => println!("{} {}", identity.email, identity.id),
    }
}
