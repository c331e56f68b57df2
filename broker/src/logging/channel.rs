use crossbeam::channel::{Receiver, Sender, unbounded};
use log::{Level, LevelFilter, Metadata, Record, SetLoggerError};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LogMessage {
    pub level: Level,
    pub target: String,
    pub message: String,
}

/// A [`log::Log`] implementation that forwards records over a channel.
///
/// Records above the configured level are discarded. Sending never blocks;
/// records are dropped once the receiver is gone.
pub struct ChannelLogger {
    sender: Sender<LogMessage>,
    level: LevelFilter,
}

impl log::Log for ChannelLogger {
    fn enabled(&self, metadata: &Metadata) -> bool {
        metadata.level() <= self.level
    }

    fn log(&self, record: &Record) {
        if self.enabled(record.metadata()) {
            let _ = self.sender.try_send(LogMessage {
                level: record.metadata().level(),
                target: record.target().to_string(),
                message: format!("{}", record.args()),
            });
        }
    }

    fn flush(&self) {}
}

impl ChannelLogger {
    pub fn new(sender: Sender<LogMessage>) -> Self {
        Self {
            sender,
            level: LevelFilter::Info,
        }
    }

    pub fn with_receiver() -> (Self, Receiver<LogMessage>) {
        let (sender, receiver) = unbounded();
        (Self::new(sender), receiver)
    }

    /// Sets the most verbose level that is forwarded. Defaults to `Info`.
    pub fn with_level(mut self, level: LevelFilter) -> Self {
        self.level = level;
        self
    }

    /// Installs this logger as the global `log` backend.
    ///
    /// Fails if another logger was installed first.
    pub fn install(self) -> Result<(), SetLoggerError> {
        let level = self.level;
        log::set_boxed_logger(Box::new(self))?;
        log::set_max_level(level);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use log::Log;

    use super::*;

    fn record(logger: &ChannelLogger, level: Level, message: &str) {
        logger.log(
            &Record::builder()
                .level(level)
                .target("rusty_broker::broker")
                .args(format_args!("{message}"))
                .build(),
        );
    }

    #[test]
    fn forwards_enabled_records() {
        // Given
        let (logger, receiver) = ChannelLogger::with_receiver();

        // When
        record(&logger, Level::Warn, "hierarchy revisits a type");

        // Then
        assert_eq!(
            receiver.try_recv().unwrap(),
            LogMessage {
                level: Level::Warn,
                target: "rusty_broker::broker".to_string(),
                message: "hierarchy revisits a type".to_string(),
            }
        );
    }

    #[test]
    fn discards_records_above_level() {
        // Given
        let (logger, receiver) = ChannelLogger::with_receiver();
        let logger = logger.with_level(LevelFilter::Debug);

        // When
        record(&logger, Level::Trace, "published");
        record(&logger, Level::Debug, "subscribed");

        // Then
        assert_eq!(receiver.try_recv().unwrap().message, "subscribed");
        assert!(receiver.try_recv().is_err());
    }

    #[test]
    fn survives_dropped_receiver() {
        let (logger, receiver) = ChannelLogger::with_receiver();
        drop(receiver);

        record(&logger, Level::Error, "nobody listens");
    }
}
