//! Process telemetry: logging and metrics.
use anyhow::Result;
use slog::o;
use slog::Drain;
use slog::Level;
use slog::Logger;
use slog::OwnedKVList;
use slog::Record;

use clustermap_conf::LogMode;
use clustermap_conf::LoggingConf;

/// Container for the process telemetry resources.
pub struct Telemetry {
    pub logger: Logger,
    pub metrics: prometheus::Registry,
}

/// Initialise process telemetry from the logging configuration.
pub fn initialise(conf: &LoggingConf) -> Result<Telemetry> {
    let logger = logger(conf);
    let metrics = prometheus::Registry::new();
    clustermap_refresh::register_metrics(&metrics)?;
    Ok(Telemetry { logger, metrics })
}

/// Build the root logger writing to stdout in the configured format.
fn logger(conf: &LoggingConf) -> Logger {
    let drain = match conf.mode {
        LogMode::Terminal => {
            let decorator = slog_term::TermDecorator::new().build();
            let drain = slog_term::FullFormat::new(decorator).build().fuse();
            slog_async::Async::new(drain).build().fuse()
        }
        LogMode::Json => {
            let drain = slog_json::Json::default(std::io::stdout()).fuse();
            slog_async::Async::new(drain).build().fuse()
        }
    };
    let drain = LevelFilter(drain, conf.level.into());
    Logger::root(
        drain,
        o!("version" => env!("CARGO_PKG_VERSION")),
    )
}

/// Alternative implementation of slog's [`LevelFilter`] with `Ok == ()`.
///
/// The default [`LevelFilter`] implementation wraps `D::Ok` into an [`Option`].
/// This makes it impossible to wrap a filtering drain into a [`Logger`].
///
/// [`LevelFilter`]: slog/struct.LevelFilter.html
/// [`Logger`]: slog/struct.Logger.html
/// [`Option`]: core/option/enum.Option.html
#[derive(Debug, Clone)]
struct LevelFilter<D: Drain>(pub D, pub Level);
impl<D: Drain> Drain for LevelFilter<D> {
    type Ok = ();
    type Err = D::Err;
    fn log(
        &self,
        record: &Record,
        logger_values: &OwnedKVList,
    ) -> std::result::Result<Self::Ok, Self::Err> {
        if record.level().is_at_least(self.1) {
            self.0.log(record, logger_values)?;
        }
        Ok(())
    }
}
