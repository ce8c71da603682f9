use std::{future::Future, time::Duration};

use {
    async_trait::async_trait,
    herald_delivery::{MessageSender, SendFailure},
    secrecy::{ExposeSecret, Secret},
    teloxide::{
        RequestError,
        prelude::*,
        types::{ChatId, Recipient},
    },
    thiserror::Error,
    tracing::warn,
};

#[cfg(feature = "metrics")]
use herald_metrics::{counter, telegram as telegram_metrics};

/// Flood-wait responses honored per request before the send is given up.
const RETRY_AFTER_MAX_RETRIES: usize = 4;

#[derive(Debug, Error)]
pub enum SendError {
    #[error("invalid chat id {value:?}")]
    InvalidChatId { value: String },

    #[error(transparent)]
    Request(#[from] RequestError),
}

/// Plain-text broadcast sender backed by the Bot API.
#[derive(Clone)]
pub struct TelegramSender {
    bot: Bot,
}

impl TelegramSender {
    pub fn new(bot: Bot) -> Self {
        Self { bot }
    }

    /// Sender for one-shot runs that do not poll.
    pub fn from_token(token: &Secret<String>) -> Self {
        Self::new(Bot::new(token.expose_secret()))
    }
}

#[async_trait]
impl MessageSender for TelegramSender {
    type Error = SendError;

    async fn send(&self, destination_id: &str, body: &str) -> Result<(), SendError> {
        let recipient = parse_recipient(destination_id)?;
        send_with_retry_after(destination_id, || {
            let request = self.bot.send_message(recipient.clone(), body);
            async move { request.await }
        })
        .await?;
        Ok(())
    }

    fn classify(&self, error: &SendError) -> SendFailure {
        classify(error)
    }
}

/// Numeric chat ids and `@channel` usernames are accepted.
pub(crate) fn parse_recipient(destination_id: &str) -> Result<Recipient, SendError> {
    let trimmed = destination_id.trim();
    if let Some(name) = trimmed.strip_prefix('@')
        && !name.is_empty()
    {
        return Ok(Recipient::ChannelUsername(trimmed.to_string()));
    }
    trimmed
        .parse::<i64>()
        .map(|id| Recipient::Id(ChatId(id)))
        .map_err(|_| SendError::InvalidChatId {
            value: destination_id.to_string(),
        })
}

pub(crate) fn classify(error: &SendError) -> SendFailure {
    match error {
        SendError::InvalidChatId { .. } => SendFailure::permanent(error.to_string()),
        SendError::Request(request) => match request {
            RequestError::MigrateToChatId(chat_id) => SendFailure::Migrated {
                new_destination_id: chat_id.0.to_string(),
            },
            RequestError::RetryAfter(_) | RequestError::Network(_) | RequestError::Io(_) => {
                SendFailure::transient(request.to_string())
            },
            RequestError::Api(_) => SendFailure::permanent(request.to_string()),
            other => SendFailure::permanent(other.to_string()),
        },
    }
}

async fn send_with_retry_after<T, F, Fut>(
    destination_id: &str,
    mut request: F,
) -> Result<T, RequestError>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, RequestError>>,
{
    let mut retries = 0usize;

    loop {
        match request().await {
            Ok(value) => return Ok(value),
            Err(err) => {
                let Some(wait) = retry_after_duration(&err) else {
                    return Err(err);
                };

                if retries >= RETRY_AFTER_MAX_RETRIES {
                    warn!(
                        chat_id = destination_id,
                        retries,
                        retry_after_secs = wait.as_secs(),
                        "telegram rate limit persisted after retries"
                    );
                    return Err(err);
                }

                retries += 1;
                #[cfg(feature = "metrics")]
                counter!(telegram_metrics::RETRY_AFTER_TOTAL).increment(1);
                warn!(
                    chat_id = destination_id,
                    retries,
                    max_retries = RETRY_AFTER_MAX_RETRIES,
                    retry_after_secs = wait.as_secs(),
                    "telegram rate limited, waiting before retry"
                );
                tokio::time::sleep(wait).await;
            },
        }
    }
}

fn retry_after_duration(error: &RequestError) -> Option<Duration> {
    match error {
        RequestError::RetryAfter(wait) => Some(wait.duration()),
        _ => None,
    }
}

#[allow(clippy::unwrap_used, clippy::expect_used)]
#[cfg(test)]
mod tests {
    use {
        super::*,
        rstest::rstest,
        std::sync::atomic::{AtomicUsize, Ordering},
        teloxide::{ApiError, types::Seconds},
    };

    #[rstest]
    #[case("-1001234567890", Recipient::Id(ChatId(-1001234567890)))]
    #[case(" 42 ", Recipient::Id(ChatId(42)))]
    #[case("@deals_channel", Recipient::ChannelUsername("@deals_channel".into()))]
    fn parses_recipients(#[case] input: &str, #[case] expected: Recipient) {
        assert_eq!(parse_recipient(input).unwrap(), expected);
    }

    #[rstest]
    #[case("")]
    #[case("@")]
    #[case("group-one")]
    fn rejects_bad_recipients(#[case] input: &str) {
        assert!(matches!(
            parse_recipient(input),
            Err(SendError::InvalidChatId { .. })
        ));
    }

    #[test]
    fn migrate_error_carries_new_id() {
        let err = SendError::Request(RequestError::MigrateToChatId(ChatId(-100999)));
        assert_eq!(classify(&err), SendFailure::Migrated {
            new_destination_id: "-100999".into()
        });
    }

    #[test]
    fn rate_limit_and_io_are_transient() {
        let retry = SendError::Request(RequestError::RetryAfter(Seconds::from_seconds(3)));
        assert!(matches!(classify(&retry), SendFailure::Transient { .. }));
        let io = SendError::Request(RequestError::Io(std::io::Error::other("reset")));
        assert!(matches!(classify(&io), SendFailure::Transient { .. }));
    }

    #[test]
    fn api_errors_and_bad_ids_are_permanent() {
        let blocked = SendError::Request(RequestError::Api(ApiError::BotBlocked));
        assert!(matches!(classify(&blocked), SendFailure::Permanent { .. }));
        let bad = parse_recipient("abc").unwrap_err();
        assert!(matches!(classify(&bad), SendFailure::Permanent { .. }));
    }

    #[tokio::test]
    async fn retry_after_is_honored_then_succeeds() {
        let calls = AtomicUsize::new(0);
        let result = send_with_retry_after("1", || {
            let n = calls.fetch_add(1, Ordering::SeqCst);
            async move {
                if n < 2 {
                    Err(RequestError::RetryAfter(Seconds::from_seconds(0)))
                } else {
                    Ok(n)
                }
            }
        })
        .await;
        assert_eq!(result.unwrap(), 2);
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn retry_after_gives_up_after_limit() {
        let calls = AtomicUsize::new(0);
        let result: Result<(), _> = send_with_retry_after("1", || {
            calls.fetch_add(1, Ordering::SeqCst);
            async { Err(RequestError::RetryAfter(Seconds::from_seconds(0))) }
        })
        .await;
        assert!(matches!(result, Err(RequestError::RetryAfter(_))));
        assert_eq!(calls.load(Ordering::SeqCst), RETRY_AFTER_MAX_RETRIES + 1);
    }

    #[tokio::test]
    async fn other_errors_are_not_retried() {
        let calls = AtomicUsize::new(0);
        let result: Result<(), _> = send_with_retry_after("1", || {
            calls.fetch_add(1, Ordering::SeqCst);
            async { Err(RequestError::Api(ApiError::ChatNotFound)) }
        })
        .await;
        assert!(result.is_err());
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }
}
