use std::future::Future;

use crux_core::capability::Operation;
use crux_core::command::NotificationBuilder;
use crux_core::{Command, Request};

/// Periodic callback driving the visit timer.
///
/// The shell answers a `Start` by sending `Event::Tick` every `interval_ms` until it receives a `Stop`.
#[derive(serde::Serialize, serde::Deserialize, Clone, Debug, PartialEq)]
pub enum TickerOperation {
    Start { interval_ms: u64 },
    Stop,
}

impl Operation for TickerOperation {
    type Output = ();
}

pub fn start_builder<Effect, Event>(interval_ms: u64) -> NotificationBuilder<Effect, Event, impl Future<Output = ()>>
where
    Effect: From<Request<TickerOperation>> + Send + 'static,
    Event: Send + 'static,
{
    Command::notify_shell(TickerOperation::Start {
        interval_ms,
    })
}

pub fn start<Effect, Event>(interval_ms: u64) -> Command<Effect, Event>
where
    Effect: From<Request<TickerOperation>> + Send + 'static,
    Event: Send + 'static,
{
    start_builder(interval_ms).into()
}

pub fn stop<Effect, Event>() -> Command<Effect, Event>
where
    Effect: From<Request<TickerOperation>> + Send + 'static,
    Event: Send + 'static,
{
    Command::notify_shell(TickerOperation::Stop).into()
}
