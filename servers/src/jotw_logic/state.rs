use std::sync::Arc;

use lib_jotw::connections::LoopbackTransport;
use lib_jotw::core::{PollCycleController, SubmissionGate};

/// Everything the HTTP handlers need, cheap to clone per request.
#[derive(Clone)]
pub struct AppState {
    pub gate: SubmissionGate,
    pub controller: Arc<PollCycleController>,
    pub transport: Arc<LoopbackTransport>,
}

impl AppState {
    pub fn new(controller: Arc<PollCycleController>, transport: Arc<LoopbackTransport>) -> Self {
        Self {
            gate: SubmissionGate::new(Arc::clone(controller.registry())),
            controller,
            transport,
        }
    }
}
