use std::sync::Arc;

use time::{format_description, UtcOffset};
use tracing_subscriber::filter::dynamic_filter_fn;
use tracing_subscriber::fmt::time::OffsetTime;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{EnvFilter, Layer};

const DEFAULT_FILTER: &str = "burrow=info,burrow_protocol_sftp=info";

pub fn init_logging() {
    let env_filter = Arc::new(
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(DEFAULT_FILTER)),
    );

    let offset = UtcOffset::current_local_offset().unwrap_or(UtcOffset::UTC);
    let enable_colors = console::user_attended();

    let full_fmt_layer = {
        let env_filter = env_filter.clone();
        let format = format_description::parse("[day].[month].[year] [hour]:[minute]:[second]")
            .unwrap_or_default();
        tracing_subscriber::fmt::layer()
            .with_ansi(enable_colors)
            .with_timer(OffsetTime::new(offset, format))
            .with_filter(dynamic_filter_fn(move |m, c| {
                env_filter.enabled(m, c.clone())
            }))
    };
    let compact_fmt_layer = {
        let format = format_description::parse("[hour]:[minute]:[second]").unwrap_or_default();
        tracing_subscriber::fmt::layer()
            .compact()
            .with_ansi(enable_colors)
            .with_target(false)
            .with_timer(OffsetTime::new(offset, format))
            .with_filter(dynamic_filter_fn(move |m, c| {
                env_filter.enabled(m, c.clone())
            }))
    };

    let r = tracing_subscriber::registry();
    let r = r.with(if !console::user_attended() {
        Some(full_fmt_layer)
    } else {
        None
    });
    let r = r.with(if console::user_attended() {
        Some(compact_fmt_layer)
    } else {
        None
    });

    r.init();
}
