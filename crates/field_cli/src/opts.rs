#![deny(missing_docs)]

use std::path::PathBuf;

use clap::{Parser, Subcommand};
use clap_verbosity_flag::{InfoLevel, Verbosity};
use cli::args::{ReferenceKindArg, RoleArg};
use field_app::{Role, Technician, TechnicianId, VisitId};

#[derive(Parser, Debug)]
#[command(name = "field_cli")]
#[command(bin_name = "field_cli")]
#[command(version, about, long_about = None)]
pub(crate) struct Opts {
    #[command(subcommand)]
    pub(crate) command: ModeCommand,

    /// Base URL of the visit services, e.g. 'https://example.org/api'
    #[arg(long, env = "FIELD_API_URL", default_value = "http://localhost:8080/api")]
    pub(crate) api_url: String,

    /// Sign in as this technician before running the command
    #[arg(long, env = "FIELD_TECHNICIAN_ID", value_name = "TECHNICIAN_ID")]
    pub(crate) technician_id: Option<TechnicianId>,

    /// Display name of the technician
    #[arg(long, requires = "technician_id", value_name = "NAME")]
    pub(crate) technician_name: Option<String>,

    /// Role used when signing in
    #[arg(long, value_enum, default_value_t = RoleArg::Technician)]
    pub(crate) role: RoleArg,

    /// HTTP request timeout, in seconds
    #[arg(long, default_value_t = 30)]
    pub(crate) timeout_secs: u64,

    /// Trace log file
    #[arg(long, num_args = 0..=1, default_missing_value = "trace.log")]
    pub(crate) trace: Option<PathBuf>,

    #[command(flatten)]
    pub(crate) verbose: Verbosity<InfoLevel>,
}

impl Opts {
    pub(crate) fn sign_in(&self) -> Option<(Technician, Role)> {
        self.technician_id
            .clone()
            .map(|id| {
                let name = self
                    .technician_name
                    .clone()
                    .unwrap_or_else(|| id.to_string());

                (
                    Technician {
                        id,
                        name,
                    },
                    self.role.into(),
                )
            })
    }
}

#[derive(Debug, Subcommand)]
pub(crate) enum ModeCommand {
    /// Run a JSON array of events through the core and print the resulting view
    RunScript {
        /// Path to the script, e.g. 'visit.json'
        #[arg(long, value_name = "SCRIPT_FILE")]
        script: PathBuf,
    },
    /// Fetch and print the service report of a visit
    Report {
        /// Visit identifier
        #[arg(long, value_name = "VISIT_ID")]
        visit_id: VisitId,
    },
    /// Fetch and print a reference list
    References {
        /// Kind of list
        #[arg(long, value_enum)]
        kind: ReferenceKindArg,
    },
}
