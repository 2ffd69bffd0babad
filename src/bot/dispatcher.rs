//! Bot run loop and message dispatch.
//!
//! Messages fan in from every channel. Each conversation gets its own worker
//! task so one slow chat never holds up another, while a single chat's
//! messages are still handled strictly in order.

use std::collections::HashMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::{Duration, Instant};

use futures::StreamExt;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;

use super::action::Action;
use super::feedback::{FeedbackLog, PendingFeedback};
use super::{share, texts};
use crate::channels::{ChannelManager, IncomingMessage, OutgoingResponse};
use crate::config::BotConfig;
use crate::error::{Error, FeedbackError};
use crate::quiz::{
    Identity, PromptPayload, QuizController, QuizReply, ResultPayload, spawn_expiry_task,
};

/// How long shutdown waits for in-flight conversations to finish.
const DRAIN_TIMEOUT: Duration = Duration::from_secs(5);

/// The zoo bot: routes actions to the quiz controller and static pages.
pub struct ZooBot {
    config: BotConfig,
    controller: Arc<QuizController>,
    feedback: FeedbackLog,
    pending: PendingFeedback,
    channels: Arc<ChannelManager>,
}

impl ZooBot {
    pub fn new(
        config: BotConfig,
        controller: Arc<QuizController>,
        channels: ChannelManager,
    ) -> Self {
        let feedback = FeedbackLog::new(config.feedback_path.clone());
        Self {
            config,
            controller,
            feedback,
            pending: PendingFeedback::new(),
            channels: Arc::new(channels),
        }
    }

    pub fn controller(&self) -> &Arc<QuizController> {
        &self.controller
    }

    /// Run until Ctrl+C or until every channel stream ends.
    pub async fn run(self) -> Result<(), Error> {
        let bot = Arc::new(self);
        let mut message_stream = bot.channels.start_all().await?;

        let expiry_handle = spawn_expiry_task(
            Arc::clone(&bot.controller),
            bot.config.session_idle_timeout,
            bot.config.session_sweep_interval,
        );

        let mut workers: HashMap<Identity, IdentityWorker> = HashMap::new();
        let mut sweep = tokio::time::interval(bot.config.session_sweep_interval);
        sweep.tick().await; // Skip immediate first tick

        tracing::info!("Bot {} ready and listening", bot.config.name);

        loop {
            tokio::select! {
                biased;
                _ = tokio::signal::ctrl_c() => {
                    tracing::info!("Ctrl+C received, shutting down...");
                    break;
                }
                msg = message_stream.next() => {
                    match msg {
                        Some(message) => bot.enqueue(&mut workers, message),
                        None => {
                            tracing::info!("All channel streams ended, shutting down...");
                            break;
                        }
                    }
                }
                _ = sweep.tick() => {
                    retire_idle_workers(&mut workers, bot.config.session_sweep_interval);
                    bot.pending.expire(bot.config.session_idle_timeout);
                }
            }
        }

        tracing::info!("Bot shutting down...");
        expiry_handle.abort();

        // Closing the queues lets each worker finish what it already has.
        let handles: Vec<JoinHandle<()>> = workers.into_values().map(|w| w.handle).collect();
        if tokio::time::timeout(DRAIN_TIMEOUT, futures::future::join_all(handles))
            .await
            .is_err()
        {
            tracing::warn!("Timed out waiting for conversations to finish");
        }

        bot.channels.shutdown_all().await?;
        Ok(())
    }

    fn enqueue(
        self: &Arc<Self>,
        workers: &mut HashMap<Identity, IdentityWorker>,
        message: IncomingMessage,
    ) {
        let identity = message.identity();
        tracing::debug!(
            "Received message from {} on {} ({} chars)",
            message.user_id,
            message.channel,
            message.content.len()
        );

        let worker = workers
            .entry(identity.clone())
            .or_insert_with(|| IdentityWorker::spawn(Arc::clone(self), identity.clone()));
        worker.last_seen = Instant::now();
        worker.queued.fetch_add(1, Ordering::AcqRel);

        if let Err(mpsc::error::SendError(message)) = worker.tx.send(message) {
            // The worker died (a panic in a handler); replace it.
            tracing::warn!(identity = %identity, "Conversation worker gone, restarting");
            let worker = IdentityWorker::spawn(Arc::clone(self), identity.clone());
            worker.queued.fetch_add(1, Ordering::AcqRel);
            let _ = worker.tx.send(message);
            workers.insert(identity, worker);
        }
    }

    /// Handle one message fully: acknowledge, compute responses, send them.
    async fn process(&self, message: &IncomingMessage) {
        if message.is_callback() {
            if let Err(e) = self.channels.acknowledge(message).await {
                tracing::warn!("Failed to acknowledge button press: {}", e);
            }
        }

        for response in self.handle(message).await {
            if let Err(e) = self.channels.respond(message, response).await {
                tracing::error!(channel = %message.channel, "Failed to send response: {}", e);
                break;
            }
        }
    }

    /// Turn one inbound message into the responses to send, in order.
    pub async fn handle(&self, message: &IncomingMessage) -> Vec<OutgoingResponse> {
        let identity = message.identity();
        let action = Action::parse(message);

        if action.cancels_feedback() {
            self.pending.take(&identity);
        }

        match action {
            Action::Welcome => {
                self.controller.cancel(&identity).await;
                vec![
                    OutgoingResponse::text(texts::WELCOME),
                    OutgoingResponse::text(texts::MAIN_MENU).with_keyboard(texts::main_menu()),
                ]
            }
            Action::Help => vec![OutgoingResponse::text(texts::HELP)],
            Action::StartQuiz => self
                .controller
                .handle_start(&identity)
                .await
                .map(|prompt| vec![prompt_response(&prompt)])
                .unwrap_or_default(),
            Action::Answer(token) => match self.controller.handle_answer(&identity, &token).await {
                Some(QuizReply::Prompt(prompt)) => vec![prompt_response(&prompt)],
                Some(QuizReply::Result(result)) => self.result_responses(&result).await,
                None => Vec::new(),
            },
            Action::Guardianship => vec![
                OutgoingResponse::text(texts::GUARDIANSHIP)
                    .with_keyboard(texts::guardianship_keyboard()),
            ],
            Action::Contact => vec![
                OutgoingResponse::text(texts::CONTACT).with_keyboard(texts::contact_keyboard()),
            ],
            Action::Feedback => {
                self.pending.wait_for(&identity);
                vec![OutgoingResponse::text(texts::ASK_FEEDBACK)]
            }
            Action::MessageStaff => {
                self.pending.wait_for(&identity);
                vec![OutgoingResponse::text(texts::ASK_STAFF_MESSAGE)]
            }
            Action::Text(text) => {
                if self.pending.take(&identity) {
                    vec![self.save_feedback(message, &identity, &text).await]
                } else {
                    vec![OutgoingResponse::text(texts::UNRECOGNIZED)]
                }
            }
            Action::Unknown(data) => {
                tracing::debug!(identity = %identity, data = %data, "Ignoring unknown button");
                Vec::new()
            }
        }
    }

    async fn save_feedback(
        &self,
        message: &IncomingMessage,
        identity: &Identity,
        text: &str,
    ) -> OutgoingResponse {
        match self.feedback.append(&message.user_id, text).await {
            Ok(()) => OutgoingResponse::text(texts::feedback_saved(text)),
            Err(FeedbackError::Empty) => {
                self.pending.wait_for(identity);
                OutgoingResponse::text(texts::ASK_FEEDBACK)
            }
            Err(e) => {
                tracing::error!(
                    path = %self.feedback.path().display(),
                    "Failed to save feedback: {}",
                    e
                );
                OutgoingResponse::text(texts::FEEDBACK_FAILED)
            }
        }
    }

    /// Result card, follow-up actions and share links.
    async fn result_responses(&self, result: &ResultPayload) -> Vec<OutgoingResponse> {
        let image = match &result.image {
            Some(path) if tokio::fs::try_exists(path).await.unwrap_or(false) => Some(path.clone()),
            Some(path) => {
                tracing::warn!(path = %path.display(), "Result image missing");
                None
            }
            None => None,
        };

        let without_image = texts::result_caption(result, false);
        let card = match image {
            Some(path) => OutgoingResponse::text(texts::result_caption(result, true))
                .with_photo(path)
                .with_photo_fallback(without_image),
            None => OutgoingResponse::text(without_image),
        };

        vec![
            card,
            OutgoingResponse::text(texts::CHOOSE_ACTION).with_keyboard(texts::result_actions()),
            OutgoingResponse::text(texts::SHARE_PROMPT)
                .with_keyboard(share::share_keyboard(&self.config.bot_link, &result.name)),
        ]
    }
}

fn prompt_response(prompt: &PromptPayload) -> OutgoingResponse {
    OutgoingResponse::text(texts::prompt_text(prompt)).with_keyboard(texts::prompt_keyboard(prompt))
}

/// Queue and task serving one conversation.
struct IdentityWorker {
    tx: mpsc::UnboundedSender<IncomingMessage>,
    /// Messages sent but not yet fully handled.
    queued: Arc<AtomicUsize>,
    last_seen: Instant,
    handle: JoinHandle<()>,
}

impl IdentityWorker {
    fn spawn(bot: Arc<ZooBot>, identity: Identity) -> Self {
        let (tx, mut rx) = mpsc::unbounded_channel::<IncomingMessage>();
        let queued = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&queued);

        let handle = tokio::spawn(async move {
            while let Some(message) = rx.recv().await {
                bot.process(&message).await;
                counter.fetch_sub(1, Ordering::AcqRel);
            }
            tracing::trace!(identity = %identity, "Conversation worker stopped");
        });

        Self {
            tx,
            queued,
            last_seen: Instant::now(),
            handle,
        }
    }

    fn is_idle(&self, max_idle: Duration) -> bool {
        self.queued.load(Ordering::Acquire) == 0 && self.last_seen.elapsed() >= max_idle
    }
}

/// Drop workers with nothing queued that have been quiet for `max_idle`.
fn retire_idle_workers(workers: &mut HashMap<Identity, IdentityWorker>, max_idle: Duration) {
    let before = workers.len();
    workers.retain(|_, worker| !worker.is_idle(max_idle));
    let retired = before - workers.len();
    if retired > 0 {
        tracing::debug!(count = retired, "Retired idle conversation workers");
    }
}
