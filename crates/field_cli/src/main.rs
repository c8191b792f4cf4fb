use std::fs::read_to_string;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{bail, Context};
use clap::Parser;
use crossbeam_channel::unbounded;
use field_app::{Effect, Event, FieldViewModel, ReferenceKind};
use tracing::{info, trace};

use crate::core::Core;
use crate::http::VisitApiClient;
use crate::opts::{ModeCommand, Opts};

mod core;
mod http;
mod opts;

fn main() -> anyhow::Result<()> {
    let args = argfile::expand_args(argfile::parse_fromfile, argfile::PREFIX)?;

    let opts = Opts::parse_from(args);

    cli::tracing::configure_tracing(opts.trace.clone(), opts.verbose.clone())?;

    let api = VisitApiClient::new(&opts.api_url, Duration::from_secs(opts.timeout_secs))?;
    let core = core::new();

    if let Some((technician, role)) = opts.sign_in() {
        run_loop(&core, &api, Event::SignIn {
            technician,
            role,
        })?;
    }

    match opts.command {
        ModeCommand::RunScript {
            script,
        } => {
            let content =
                read_to_string(&script).with_context(|| format!("Unable to read script. path: {}", script.display()))?;
            let events: Vec<Event> = serde_json::from_str(&content)
                .with_context(|| format!("Unable to parse script. path: {}", script.display()))?;
            info!("Running script. path: {}, events: {}", script.display(), events.len());

            for event in events {
                run_loop(&core, &api, event)?;
            }

            let view = core::view(&core);
            println!("{}", serde_json::to_string_pretty(&view)?);
        }
        ModeCommand::Report {
            visit_id,
        } => {
            run_loop(&core, &api, Event::LoadReferences {
                kind: ReferenceKind::Chemicals,
            })?;
            run_loop(&core, &api, Event::ViewReport {
                visit_id,
            })?;

            let view = core::view(&core);
            match view.report {
                Some(report) => print!("{}", report),
                None => bail!(notice_message(&view)),
            }
        }
        ModeCommand::References {
            kind,
        } => {
            let kind = ReferenceKind::from(kind);
            run_loop(&core, &api, Event::LoadReferences {
                kind,
            })?;

            let view = core::view(&core);
            if let Some(notice) = &view.notice {
                bail!(notice.message.clone())
            }
            match kind {
                ReferenceKind::BaitTypes => {
                    for name in view.bait_types {
                        println!("{}", name);
                    }
                }
                ReferenceKind::Chemicals => {
                    for item in view.chemicals {
                        println!(
                            "{}\t{}\t{}",
                            item.name,
                            item.active_ingredient
                                .unwrap_or_default(),
                            item.antidote.unwrap_or_default()
                        );
                    }
                }
            }
        }
    }

    Ok(())
}

fn notice_message(view: &FieldViewModel) -> String {
    view.notice
        .as_ref()
        .map(|notice| notice.message.clone())
        .unwrap_or_else(|| "No report available".to_string())
}

fn run_loop(core: &Core, api: &VisitApiClient, event: Event) -> Result<(), anyhow::Error> {
    let (tx, rx) = unbounded::<Effect>();
    let tx = Arc::new(tx);

    core::update(core, event, &tx)?;

    // resolving a request may queue further effects, so the sender stays alive and the queue is drained
    while let Ok(effect) = rx.try_recv() {
        trace!("run_loop. effect: {:?}", effect);
        match effect {
            _render @ Effect::Render(_) => {
                let view = core::view(core);

                if let Some((_, error)) = view.error {
                    bail!(error)
                }
            }
            Effect::VisitApi(mut request) => {
                let result = api.perform(&request.operation);
                core::resolve_visit_api(core, &mut request, result, &tx)?;
            }
            // consumed by `core::process_effect`
            Effect::Ticker(_) => {}
        }
    }
    Ok(())
}
