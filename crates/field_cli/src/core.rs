use std::sync::Arc;

use anyhow::anyhow;
use crossbeam_channel::Sender;
use crux_core::Request;
use field_app::effects::ticker::TickerOperation;
use field_app::effects::visit_api::{VisitApiOperation, VisitApiResult};
use field_app::{Effect, Event, FieldService, FieldViewModel};
use tracing::{debug, trace};

pub type Core = Arc<crux_core::Core<FieldService>>;

pub fn new() -> Core {
    Arc::new(crux_core::Core::new())
}

pub fn view(core: &Core) -> FieldViewModel {
    core.view()
}

pub fn update(core: &Core, event: Event, tx: &Arc<Sender<Effect>>) -> anyhow::Result<()> {
    trace!("event: {:?}", event);

    let effects = core.process_event(event);
    debug!("Event processed. effects: {}", effects.len());

    for effect in effects {
        process_effect(core, effect, tx)?;
    }
    Ok(())
}

/// Feeds a visit service result back into the core, queueing whatever the core asks for next.
pub fn resolve_visit_api(
    core: &Core,
    request: &mut Request<VisitApiOperation>,
    result: VisitApiResult,
    tx: &Arc<Sender<Effect>>,
) -> anyhow::Result<()> {
    trace!("resolve. operation: {:?}, result: {:?}", request.operation, result);
    if let VisitApiResult::Err {
        error,
    } = &result
    {
        debug!("Resolving with transport failure. error: {}", error);
    }

    let effects = core
        .resolve(request, result)
        .map_err(|e| anyhow!("Unable to resolve visit API request. cause: {:?}", e))?;

    for effect in effects {
        process_effect(core, effect, tx)?;
    }
    Ok(())
}

/// Ticker notifications need no response and are consumed here, everything else is queued for the run loop.
pub fn process_effect(_core: &Core, effect: Effect, tx: &Arc<Sender<Effect>>) -> anyhow::Result<()> {
    trace!("effect: {:?}", effect);

    match effect {
        // The CLI has no clock of its own, scripts send `Tick` events instead.
        Effect::Ticker(request) => match request.operation {
            TickerOperation::Start {
                interval_ms,
            } => debug!("Ticker start ignored. interval_ms: {}", interval_ms),
            TickerOperation::Stop => debug!("Ticker stop ignored"),
        },
        effect => tx
            .send(effect)
            .map_err(|e| anyhow!("{:?}", e))?,
    }

    Ok(())
}
