//! Forum poster configuration and the background "test post" operation.
//!
//! Play-by-forum games post a turn summary to a forum thread after each
//! turn. The settings editor hands us a [`ForumPosterConfig`] and a
//! [`ForumPoster`] implementation; [`spawn_test_post`] checks the settings
//! and posts a throwaway summary off the calling task, reporting the
//! outcome through a oneshot channel.

use std::fmt;
use std::future::Future;
use std::sync::Arc;

use chrono::{DateTime, Local};
use lobbyforge_interrupt::{await_result, Completion, InterruptToken, Interruption};
use serde::{Deserialize, Serialize};
use tokio::sync::oneshot;

/// Version string embedded in test posts.
pub const ENGINE_VERSION: &str = env!("CARGO_PKG_VERSION");

// ---------------------------------------------------------------------------
// Errors
// ---------------------------------------------------------------------------

#[derive(Debug, thiserror::Error)]
pub enum ForumError {
    /// A required setting is empty. The payload names it.
    #[error("invalid forum poster config: {0} must not be empty")]
    InvalidConfig(&'static str),

    /// The forum rejected or failed the post.
    #[error("forum post failed: {0}")]
    PostFailed(String),
}

// ---------------------------------------------------------------------------
// Configuration
// ---------------------------------------------------------------------------

/// Settings for posting turn summaries to a forum.
#[derive(Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ForumPosterConfig {
    pub username: String,
    pub password: String,
    /// Thread to post into. Only required when the poster can link to
    /// what it posted (`can_view_posted`).
    pub topic_id: String,
    pub include_save_game: bool,
    pub also_post_after_combat_move: bool,
    /// Whether the password may be written to disk with the rest of the
    /// settings. It is stored unencrypted.
    pub password_saved: bool,
    pub can_view_posted: bool,
}

/// The password is never printed.
impl fmt::Debug for ForumPosterConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ForumPosterConfig")
            .field("username", &self.username)
            .field("password", &"<redacted>")
            .field("topic_id", &self.topic_id)
            .field("include_save_game", &self.include_save_game)
            .field("also_post_after_combat_move", &self.also_post_after_combat_move)
            .field("password_saved", &self.password_saved)
            .field("can_view_posted", &self.can_view_posted)
            .finish()
    }
}

impl ForumPosterConfig {
    /// Checks that login, password, and (when needed) topic id are set.
    pub fn validate(&self) -> Result<(), ForumError> {
        if self.username.is_empty() {
            return Err(ForumError::InvalidConfig("login"));
        }
        if self.password.is_empty() {
            return Err(ForumError::InvalidConfig("password"));
        }
        if self.can_view_posted && self.topic_id.is_empty() {
            return Err(ForumError::InvalidConfig("topic id"));
        }
        Ok(())
    }

    /// The copy of these settings that may be persisted: the password is
    /// dropped unless the user opted into saving it.
    pub fn for_storage(&self) -> Self {
        if self.password_saved {
            tracing::warn!(
                username = %self.username,
                "forum password will be stored unencrypted"
            );
            self.clone()
        } else {
            Self {
                password: String::new(),
                ..self.clone()
            }
        }
    }
}

// ---------------------------------------------------------------------------
// Poster
// ---------------------------------------------------------------------------

/// A file attached to a turn summary.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Attachment {
    pub file_name: String,
    pub contents: Vec<u8>,
}

/// One post to a forum thread.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TurnSummary {
    pub title: String,
    pub summary: String,
    pub attachment: Option<Attachment>,
}

impl TurnSummary {
    /// The throwaway post used to check forum settings. The time is
    /// rendered as local `HH:MM:SS`.
    pub fn test_post(config: &ForumPosterConfig, now: DateTime<Local>) -> Self {
        let attachment = config.include_save_game.then(|| Attachment {
            file_name: "test.txt".to_string(),
            contents: b"Test upload".to_vec(),
        });

        Self {
            title: "Testing Forum poster".to_string(),
            summary: format!(
                "Test summary from lobbyforge, engine version: {ENGINE_VERSION}, time: {}",
                now.format("%H:%M:%S")
            ),
            attachment,
        }
    }
}

/// Posts turn summaries to some forum.
///
/// Implementations own the HTTP client and any login state. Posting may
/// block for a long time, so callers run it under an [`InterruptToken`].
pub trait ForumPoster: Send + Sync + 'static {
    /// Posts `post` using `config`'s credentials and topic. Returns a
    /// reference to the created post (usually a URL) for display.
    fn post_turn_summary(
        &self,
        config: &ForumPosterConfig,
        post: &TurnSummary,
    ) -> impl Future<Output = Result<String, ForumError>> + Send;
}

/// Outcome delivered by [`spawn_test_post`]: `completed == false` means the
/// post was interrupted, not that it failed.
pub type TestPostOutcome = Result<Completion<String>, ForumError>;

/// Validates `config`, then posts a test summary on a background task.
///
/// The returned receiver yields exactly one [`TestPostOutcome`]. The post
/// stops early if `token` is interrupted.
///
/// # Errors
/// [`ForumError::InvalidConfig`] if the settings are incomplete; nothing is
/// spawned in that case.
pub fn spawn_test_post<P: ForumPoster>(
    poster: Arc<P>,
    config: ForumPosterConfig,
    token: InterruptToken,
) -> Result<oneshot::Receiver<TestPostOutcome>, ForumError> {
    config.validate()?;

    let (tx, rx) = oneshot::channel();
    tokio::spawn(async move {
        let post = TurnSummary::test_post(&config, Local::now());
        tracing::info!(username = %config.username, topic = %config.topic_id, "posting forum test summary");

        let outcome = await_result(&token, async {
            let reference = poster.post_turn_summary(&config, &post).await?;
            Ok::<_, Interruption<ForumError>>(Some(reference))
        })
        .await;

        match &outcome {
            Ok(c) if c.is_completed() => tracing::info!("forum test post succeeded"),
            Ok(_) => tracing::debug!("forum test post interrupted"),
            Err(e) => tracing::warn!(error = %e, "forum test post failed"),
        }

        // The receiver may have been dropped; nobody is waiting then.
        let _ = tx.send(outcome);
    });

    Ok(rx)
}

#[cfg(test)]
mod tests {
    use std::sync::Mutex;
    use std::time::Duration;

    use chrono::TimeZone;

    use super::*;

    fn valid_config() -> ForumPosterConfig {
        ForumPosterConfig {
            username: "general".into(),
            password: "hunter2".into(),
            topic_id: "1234".into(),
            can_view_posted: true,
            ..ForumPosterConfig::default()
        }
    }

    /// Records every post and answers with a fixed URL.
    #[derive(Default)]
    struct RecordingPoster {
        posts: Mutex<Vec<TurnSummary>>,
    }

    impl ForumPoster for RecordingPoster {
        async fn post_turn_summary(
            &self,
            config: &ForumPosterConfig,
            post: &TurnSummary,
        ) -> Result<String, ForumError> {
            self.posts.lock().unwrap().push(post.clone());
            Ok(format!("https://forum.example/t/{}", config.topic_id))
        }
    }

    /// Never finishes posting.
    struct HangingPoster;

    impl ForumPoster for HangingPoster {
        async fn post_turn_summary(
            &self,
            _config: &ForumPosterConfig,
            _post: &TurnSummary,
        ) -> Result<String, ForumError> {
            std::future::pending().await
        }
    }

    struct FailingPoster;

    impl ForumPoster for FailingPoster {
        async fn post_turn_summary(
            &self,
            _config: &ForumPosterConfig,
            _post: &TurnSummary,
        ) -> Result<String, ForumError> {
            Err(ForumError::PostFailed("401 unauthorized".into()))
        }
    }

    // =====================================================================
    // validate() / for_storage()
    // =====================================================================

    #[test]
    fn test_validate_missing_login_is_invalid() {
        let cfg = ForumPosterConfig {
            username: String::new(),
            ..valid_config()
        };
        assert!(matches!(cfg.validate(), Err(ForumError::InvalidConfig("login"))));
    }

    #[test]
    fn test_validate_missing_password_is_invalid() {
        let cfg = ForumPosterConfig {
            password: String::new(),
            ..valid_config()
        };
        assert!(matches!(cfg.validate(), Err(ForumError::InvalidConfig("password"))));
    }

    #[test]
    fn test_validate_topic_required_only_when_viewable() {
        let viewable = ForumPosterConfig {
            topic_id: String::new(),
            ..valid_config()
        };
        assert!(matches!(viewable.validate(), Err(ForumError::InvalidConfig("topic id"))));

        let not_viewable = ForumPosterConfig {
            can_view_posted: false,
            ..viewable
        };
        assert!(not_viewable.validate().is_ok());
    }

    #[test]
    fn test_for_storage_drops_password_unless_saved() {
        assert_eq!(valid_config().for_storage().password, "");

        let saved = ForumPosterConfig {
            password_saved: true,
            ..valid_config()
        };
        assert_eq!(saved.for_storage().password, "hunter2");
    }

    #[test]
    fn test_debug_redacts_password() {
        let rendered = format!("{:?}", valid_config());
        assert!(!rendered.contains("hunter2"));
        assert!(rendered.contains("<redacted>"));
    }

    // =====================================================================
    // TurnSummary::test_post()
    // =====================================================================

    #[test]
    fn test_test_post_includes_version_and_time() {
        let at = Local.with_ymd_and_hms(2024, 1, 2, 13, 5, 9).unwrap();

        let post = TurnSummary::test_post(&valid_config(), at);

        assert_eq!(post.title, "Testing Forum poster");
        assert!(post.summary.contains(ENGINE_VERSION));
        assert!(post.summary.ends_with("time: 13:05:09"));
        assert!(post.attachment.is_none());
    }

    #[test]
    fn test_test_post_attaches_save_when_requested() {
        let cfg = ForumPosterConfig {
            include_save_game: true,
            ..valid_config()
        };

        let post = TurnSummary::test_post(&cfg, Local::now());

        assert_eq!(post.attachment.unwrap().file_name, "test.txt");
    }

    // =====================================================================
    // spawn_test_post()
    // =====================================================================

    #[tokio::test]
    async fn test_spawn_test_post_invalid_config_fails_before_spawning() {
        let poster = Arc::new(RecordingPoster::default());
        let cfg = ForumPosterConfig::default();

        let result = spawn_test_post(Arc::clone(&poster), cfg, InterruptToken::new());

        assert!(matches!(result, Err(ForumError::InvalidConfig(_))));
        assert!(poster.posts.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_spawn_test_post_reports_reference_asynchronously() {
        let poster = Arc::new(RecordingPoster::default());

        let rx = spawn_test_post(Arc::clone(&poster), valid_config(), InterruptToken::new())
            .unwrap();
        let completion = rx.await.unwrap().unwrap();

        assert!(completion.is_completed());
        assert_eq!(completion.value().map(String::as_str), Some("https://forum.example/t/1234"));
        assert_eq!(poster.posts.lock().unwrap().len(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_spawn_test_post_interrupted_reports_not_completed() {
        let token = InterruptToken::new();
        let rx = spawn_test_post(Arc::new(HangingPoster), valid_config(), token.clone())
            .unwrap();

        tokio::time::sleep(Duration::from_millis(10)).await;
        token.interrupt();
        let completion = rx.await.unwrap().unwrap();

        assert!(!completion.is_completed());
        assert!(token.is_interrupted());
    }

    #[tokio::test]
    async fn test_spawn_test_post_failure_is_passed_through() {
        let rx = spawn_test_post(Arc::new(FailingPoster), valid_config(), InterruptToken::new())
            .unwrap();

        let outcome = rx.await.unwrap();

        assert!(matches!(outcome, Err(ForumError::PostFailed(ref m)) if m.contains("401")));
    }
}
