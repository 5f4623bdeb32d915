//! Runtime services and shared state for the checkin-bot.

use std::time::Duration;

use tokio::net::TcpListener;
use tracing::{Instrument, info, instrument};

use crate::{
    base::{
        config::Config,
        types::{Res, Void},
    },
    intent::{classifier::IntentClassifier, confirmation::ConfirmationGate},
    interaction::{
        admin,
        bot::{Bot, BotInner},
        dedup::DedupCache,
    },
    schedule::{calendar::WorkingDayService, reminder::ReminderScheduler, runner::ScheduleRunner},
    service::{
        chat::{
            ChatClient,
            teams::{self, TeamsState},
        },
        conversation::ConversationStore,
        db::DbClient,
        directory::DirectoryClient,
        holiday::HolidayClient,
        llm::LlmClient,
    },
};

/// How often expired deduplication and confirmation entries are swept.
const SWEEP_INTERVAL: Duration = Duration::from_secs(60);

/// Runtime service context that can be shared across the application.
///
/// This struct holds the clients, the orchestrator, the scheduler and the configuration.
/// It is designed to be trivially cloneable, allowing it to be passed around
/// without the need for `Arc` or `Mutex`.
#[derive(Clone)]
pub struct Runtime {
    /// The configuration for the application.
    pub config: Config,
    /// The database client instance.
    pub db: DbClient,
    /// The Teams client instance.
    pub chat: ChatClient,
    /// Where proactive messages are delivered.
    pub conversations: ConversationStore,
    /// The message orchestrator.
    pub bot: Bot,
    /// The daily prompt and reminder triggers.
    pub scheduler: ReminderScheduler,
}

impl Runtime {
    /// Create a new runtime instance.
    #[instrument(skip_all)]
    pub async fn new(config: Config) -> Res<Self> {
        // Initialize the database.
        let db = DbClient::surreal(&config).await?;

        // Initialize the optional external clients.
        let llm = LlmClient::openai(&config);
        let holidays = HolidayClient::nager(&config)?;
        let directory = DirectoryClient::graph(&config)?;

        info!(ai = llm.is_some(), holiday_api = holidays.is_some(), directory_sync = directory.is_some(), "Optional integrations resolved.");

        // Initialize the Teams client.
        let conversations = ConversationStore::memory();
        let chat = ChatClient::teams(&config, conversations.clone())?;

        let calendar = WorkingDayService::new(&config, holidays);

        let bot = Bot::from(BotInner {
            db: db.clone(),
            calendar: calendar.clone(),
            classifier: IntentClassifier::new(&config, llm),
            gate: ConfirmationGate::new(config.confirmation_ttl),
            dedup: DedupCache::new(config.dedup_window),
            directory,
        });

        let scheduler = ReminderScheduler::new(db.clone(), chat.clone(), calendar);

        Ok(Self {
            config,
            db,
            chat,
            conversations,
            bot,
            scheduler,
        })
    }

    /// Starts the background tasks and serves HTTP until shutdown.
    pub async fn start(&self) -> Void {
        self.spawn_sweeper();

        let runner = ScheduleRunner::new(&self.config, self.scheduler.clone())?;
        tokio::spawn(runner.run().in_current_span());

        let app = teams::routes(TeamsState {
            bot: self.bot.clone(),
            chat: self.chat.clone(),
            conversations: self.conversations.clone(),
        })
        .merge(admin::routes(self.scheduler.clone(), self.config.admin_token.clone()));

        let listener = TcpListener::bind(&self.config.listen_address).await?;
        info!("Listening on http://{} ...", self.config.listen_address);

        axum::serve(listener, app).with_graceful_shutdown(shutdown_signal()).await?;

        info!("Shut down.");

        Ok(())
    }

    fn spawn_sweeper(&self) {
        let bot = self.bot.clone();

        tokio::spawn(
            async move {
                loop {
                    tokio::time::sleep(SWEEP_INTERVAL).await;

                    bot.dedup.purge_expired();
                    bot.gate.purge_expired();
                }
            }
            .in_current_span(),
        );
    }
}

async fn shutdown_signal() {
    if let Err(err) = tokio::signal::ctrl_c().await {
        tracing::error!("Failed to listen for shutdown signal: {err}");
        std::future::pending::<()>().await;
    }

    info!("Shutdown signal received ...");
}
