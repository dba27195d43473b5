use thiserror::Error;

#[derive(Error, Debug)]
pub enum Error {
    #[error("Dbus connection error: {0}")]
    DbusError(#[from] zbus::Error),
    #[error("Queue service is unavailable: {0}")]
    RemoteUnavailable(String),
    #[error("Queue entry {index} could not be decoded: {reason}")]
    DecodeAnomaly { index: usize, reason: String },
    #[error("Notification source is unavailable: {0}")]
    PresenterUnavailable(String),
}

pub type Result<T> = std::result::Result<T, Error>;

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn test_dbus_error_keeps_its_cause() {
        let err = Error::from(zbus::Error::Failure("connection refused".to_string()));
        assert!(err.to_string().starts_with("Dbus connection error: "));
        assert!(err.to_string().contains("connection refused"));
    }
}
