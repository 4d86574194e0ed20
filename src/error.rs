use thiserror::Error;

#[derive(Debug, Error)]
pub enum BotError {
    #[error("this command only works inside a server")]
    NotInGuild,

    #[error("you need to be in a voice channel")]
    NotInVoice,

    #[error("voice client is not available")]
    VoiceUnavailable,

    #[error("I'm not connected to a voice channel here")]
    NotConnected,

    #[error("invalid duration `{0}`")]
    InvalidDuration(String),

    #[error("config: {0}")]
    Config(String),

    #[error("database pool: {0}")]
    Pool(#[from] r2d2::Error),

    #[error("database: {0}")]
    Sqlite(#[from] rusqlite::Error),

    #[error("http: {0}")]
    Http(#[from] reqwest::Error),

    #[error("unexpected response: {0}")]
    Json(#[from] serde_json::Error),

    #[error("{service} responded with status {status}")]
    Api { service: &'static str, status: u16 },

    #[error("image: {0}")]
    Image(String),

    #[error("cluster: {0}")]
    Cluster(String),

    #[error("this channel is not an open ticket")]
    NotATicket,

    #[error("rating must be between 1 and 5, got {0}")]
    InvalidRating(i64),

    #[error("you cannot review yourself")]
    SelfReview,

    #[error("{0} not found")]
    NotFound(String),

    #[error("io: {0}")]
    Io(#[from] std::io::Error),
}

impl From<image::ImageError> for BotError {
    fn from(err: image::ImageError) -> Self {
        BotError::Image(err.to_string())
    }
}

impl BotError {
    /// Whether the message is safe and useful to show to the invoking user.
    pub fn is_user_facing(&self) -> bool {
        matches!(
            self,
            BotError::NotInGuild
                | BotError::NotInVoice
                | BotError::NotConnected
                | BotError::InvalidDuration(_)
                | BotError::NotATicket
                | BotError::InvalidRating(_)
                | BotError::SelfReview
                | BotError::NotFound(_)
                | BotError::Image(_)
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_voice_connection_reads_naturally() {
        let err = BotError::NotConnected;
        assert!(err.is_user_facing());
        assert_eq!(err.to_string(), "I'm not connected to a voice channel here");
    }

    #[test]
    fn internal_failures_stay_private() {
        assert!(!BotError::Cluster("spawn failed".to_owned()).is_user_facing());
        assert!(!BotError::VoiceUnavailable.is_user_facing());
    }
}
