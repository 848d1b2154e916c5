use std::path::{Path, PathBuf};
use std::sync::Arc;

use clap::{Args, Parser, Subcommand};
use serde::Serialize;

use clawphones::api::{ApiError, Role};
use clawphones::config::{ConfigError, parse_base_url};
use clawphones::device::StoreError;
use clawphones::vision::{DEFAULT_CONFIDENCE_THRESHOLD, FixtureFrame, ReplayBackend, VisionError};
use clawphones::{
    AuthSignal, AuthState, ChatState, ClientConfig, ConversationListState, DeviceStore, FileDeviceStore, HttpApi,
    RemoteApi, VisionDetector,
};

#[derive(Debug, thiserror::Error)]
enum CliError {
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error(transparent)]
    Store(#[from] StoreError),
    #[error("client setup failed: {0}")]
    Api(#[from] ApiError),
    #[error(transparent)]
    Vision(#[from] VisionError),
    #[error("{0}")]
    Rejected(String),
    #[error("invalid JSON payload: {0}")]
    InvalidJson(#[from] serde_json::Error),
}

#[derive(Parser, Debug)]
#[command(name = "clawphones", about = "ClawPhones client core CLI")]
struct Cli {
    #[arg(long, env = "CLAWPHONES_BASE_URL")]
    base_url: Option<String>,

    #[arg(long, env = "CLAWPHONES_TOKEN_PATH")]
    token_path: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Show the configured server and whether a session token is stored.
    Status,
    Login {
        email: String,
        #[arg(long, env = "CLAWPHONES_PASSWORD")]
        password: String,
    },
    Register {
        email: String,
        #[arg(long, env = "CLAWPHONES_PASSWORD")]
        password: String,
        #[arg(long)]
        name: Option<String>,
    },
    /// Sign in with an Apple identity token.
    Apple {
        identity_token: String,
    },
    Logout,
    Conversations(ConversationsCommand),
    /// Send one chat turn, starting a new conversation unless one is given.
    Chat {
        #[arg(long)]
        conversation: Option<String>,
        message: String,
    },
    /// Run the detector over a recorded frame.
    Detect {
        #[arg(long)]
        fixture: PathBuf,
        #[arg(long, default_value_t = DEFAULT_CONFIDENCE_THRESHOLD)]
        threshold: f32,
    },
}

#[derive(Args, Debug)]
struct ConversationsCommand {
    #[command(subcommand)]
    command: ConversationsSubcommand,
}

#[derive(Subcommand, Debug)]
enum ConversationsSubcommand {
    List,
    Show { id: String },
    Delete { id: String },
}

struct CliContext {
    config: ClientConfig,
    store: Arc<dyn DeviceStore>,
    signal: AuthSignal,
    api: Arc<dyn RemoteApi>,
}

impl CliContext {
    fn build(cli_base_url: Option<String>, cli_token_path: Option<PathBuf>) -> Result<Self, CliError> {
        let mut config = ClientConfig::from_env()?;
        if let Some(raw) = cli_base_url {
            config.base_url = parse_base_url(&raw)?;
        }
        if let Some(path) = cli_token_path {
            config.token_path = path;
        }

        let store: Arc<dyn DeviceStore> = Arc::new(FileDeviceStore::open(&config.token_path)?);
        let signal = AuthSignal::new();
        let api: Arc<dyn RemoteApi> = Arc::new(HttpApi::new(&config, store.clone(), signal.clone())?);
        Ok(Self { config, store, signal, api })
    }

    fn auth(&self) -> AuthState {
        AuthState::new(self.api.clone(), self.store.clone(), &self.signal)
    }

    fn chat(&self) -> ChatState {
        match &self.config.system_prompt {
            Some(prompt) => ChatState::with_system_prompt(self.api.clone(), prompt.clone()),
            None => ChatState::new(self.api.clone()),
        }
    }
}

#[tokio::main]
async fn main() -> Result<(), CliError> {
    if let Err(e) = dotenvy::dotenv() {
        // A missing .env is the normal case.
        tracing::debug!(error = %e, "no .env loaded");
    }
    tracing_subscriber::fmt().with_writer(std::io::stderr).init();

    let Cli { base_url, token_path, command } = Cli::parse();
    let context = move || CliContext::build(base_url, token_path);

    match command {
        Command::Detect { fixture, threshold } => run_detect(&fixture, threshold),
        Command::Status => run_status(&context()?),
        Command::Login { email, password } => {
            let mut auth = context()?.auth();
            auth.login(&email, &password).await;
            finish_auth(&auth)
        }
        Command::Register { email, password, name } => {
            let mut auth = context()?.auth();
            auth.register(&email, &password, name.as_deref()).await;
            finish_auth(&auth)
        }
        Command::Apple { identity_token } => {
            let mut auth = context()?.auth();
            auth.login_with_apple(&identity_token).await;
            finish_auth(&auth)
        }
        Command::Logout => {
            context()?.auth().logout();
            println!("signed out");
            Ok(())
        }
        Command::Conversations(conversations) => run_conversations(&context()?, conversations).await,
        Command::Chat { conversation, message } => run_chat(&context()?, conversation, &message).await,
    }
}

fn run_status(ctx: &CliContext) -> Result<(), CliError> {
    let auth = ctx.auth();
    println!("server: {}", ctx.config.base_url);
    println!("token store: {}", ctx.config.token_path.display());
    println!("authenticated: {}", auth.is_authenticated());
    Ok(())
}

fn finish_auth(auth: &AuthState) -> Result<(), CliError> {
    if let Some(message) = auth.error_message() {
        return Err(CliError::Rejected(message.to_string()));
    }
    println!("signed in");
    Ok(())
}

async fn run_conversations(ctx: &CliContext, conversations: ConversationsCommand) -> Result<(), CliError> {
    match conversations.command {
        ConversationsSubcommand::List => {
            let mut list = ConversationListState::new(ctx.api.clone());
            list.load_conversations().await;
            check(list.error_message())?;
            print_json(list.conversations())
        }
        ConversationsSubcommand::Show { id } => {
            let mut chat = ctx.chat();
            chat.load_conversation(&id).await;
            check(chat.error_message())?;
            eprintln!("{}", chat.conversation_title().unwrap_or_default());
            print_json(chat.messages())
        }
        ConversationsSubcommand::Delete { id } => {
            let mut list = ConversationListState::new(ctx.api.clone());
            list.load_conversations().await;
            check(list.error_message())?;
            list.delete_conversation(&id).await;
            check(list.error_message())?;
            if list.conversations().iter().any(|c| c.id == id) {
                return Err(CliError::Rejected(format!("server kept conversation {id}")));
            }
            println!("deleted {id}");
            Ok(())
        }
    }
}

async fn run_chat(ctx: &CliContext, conversation: Option<String>, message: &str) -> Result<(), CliError> {
    let mut chat = ctx.chat();
    if let Some(id) = conversation {
        chat.load_conversation(&id).await;
        check(chat.error_message())?;
    }

    chat.send_message(message).await;
    check(chat.error_message())?;

    if let Some(id) = chat.conversation_id() {
        eprintln!("conversation: {id}");
    }
    if let Some(reply) = chat.messages().iter().rev().find(|m| m.role == Role::Assistant) {
        println!("{}", reply.content);
    }
    Ok(())
}

fn run_detect(fixture: &Path, threshold: f32) -> Result<(), CliError> {
    let frame = FixtureFrame::load(fixture)?;
    let detector = VisionDetector::new(ReplayBackend::from_env(), threshold);
    detector.probe(&frame)?;
    print_json(&detector.detect(&frame))
}

fn check(error_message: Option<&str>) -> Result<(), CliError> {
    match error_message {
        Some(message) => Err(CliError::Rejected(message.to_string())),
        None => Ok(()),
    }
}

fn print_json<T: Serialize + ?Sized>(value: &T) -> Result<(), CliError> {
    let rendered = serde_json::to_string_pretty(value)?;
    println!("{rendered}");
    Ok(())
}
